#[cfg(feature = "cli")]
pub mod deploy;
