pub mod orchestrator;
pub mod schedule;
pub mod selector;
pub mod steps;
pub mod template;

pub use crate::domain::model::{DeploymentDeclaration, DeploymentDefinition, StepSpec};
pub use crate::domain::ports::{BackendClient, Prompt, Step};
pub use crate::utils::error::Result;
