//! assetline library
//!
//! Pipeline tasks, their composition and the development server behind the
//! `assetline` binary.

pub mod cli;
pub mod config;
pub mod error;
pub mod runner;
pub mod server;
pub mod tasks;
pub mod transform;
pub mod utils;
pub mod watch;

pub use cli::Cli;
pub use config::{Config, Mode};
pub use error::{PipelineError, Result};
pub use runner::{build_pipeline, dev_pipeline, Pipeline};
pub use tasks::{Task, TaskContext, TaskReport};
