pub mod frame_stack;
pub mod mean;

pub use frame_stack::FrameStack;
pub use mean::{int_mean, mean_stack};
