mod candidate;
mod canvas;
mod provider_config;

pub use candidate::*;
pub use canvas::*;
pub use provider_config::*;
