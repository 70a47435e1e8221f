mod authenticator;
mod image_transformer;
mod pool_directory;
mod remote_fetcher;

pub use authenticator::*;
pub use image_transformer::*;
pub use pool_directory::*;
pub use remote_fetcher::*;
