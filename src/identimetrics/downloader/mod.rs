pub mod auth;
pub mod client;
pub mod config;
pub mod errlog;
pub mod error;
pub mod export;
pub mod fetch;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod sanitize;

pub use error::{DownloaderError, Result};
