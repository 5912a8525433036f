pub mod acquisition;
pub mod background;
pub mod camera;
pub mod channel;
pub mod config;
pub mod consts;
pub mod enhance;
pub mod error;
pub mod events;
pub mod frame;
pub mod io;
pub mod measure;
pub mod pipeline;
pub mod processing;
pub mod stack;
pub mod state;
