mod image_acquisition;
mod pool_seeding;
mod random_image;

pub use image_acquisition::*;
pub use pool_seeding::*;
pub use random_image::*;
