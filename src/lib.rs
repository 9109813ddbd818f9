pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::DeployArgs;
pub use config::{ProjectContext, Settings};

pub use adapters::http::HttpBackendClient;
pub use core::orchestrator::{DeployReport, Orchestrator, Submission};
pub use core::steps::StepRegistry;
pub use utils::error::{DeployError, Result};
