pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod orchestrator;
pub mod services;

pub use config::Config;
pub use error::{EngineError, EngineResult};
