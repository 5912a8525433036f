pub mod histogram;
pub mod intensity;
pub mod profile;

pub use histogram::{histogram, Histogram};
pub use intensity::{mean_intensity, roi_mean};
pub use profile::line_profile;
