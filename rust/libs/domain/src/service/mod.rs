mod fit_policy;
mod image_source;
mod image_transform;

pub use fit_policy::*;
pub use image_source::*;
pub use image_transform::*;
