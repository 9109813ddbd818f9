#[cfg(feature = "cli")]
pub mod cli;
pub mod project;
pub mod settings;

#[cfg(feature = "cli")]
pub use cli::DeployArgs;
pub use project::ProjectContext;
pub use settings::Settings;
