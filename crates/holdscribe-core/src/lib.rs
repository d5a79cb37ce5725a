pub mod config;
pub mod dsp;
pub mod error;
pub mod types;

pub use config::HoldscribeConfig;
pub use error::{HoldscribeError, Result};
pub use types::*;
