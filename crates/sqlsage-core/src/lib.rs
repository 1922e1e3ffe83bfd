//! SQLSage Core — error taxonomy and configuration.

pub mod config;
pub mod error;

pub use config::{DataPaths, SqlSageConfig};
pub use error::{Error, Result};
