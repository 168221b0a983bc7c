pub mod config;
pub mod error;
pub mod types;

pub use config::CarepathConfig;
pub use error::{CarepathError, Result};
pub use types::*;
