pub mod config;
pub mod error;
pub mod frame;
pub mod vitals;

pub use config::Config;
pub use error::*;
pub use frame::FeatureFrame;
pub use vitals::*;
