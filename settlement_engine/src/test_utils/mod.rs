//! Helpers shared by the unit tests, the integration tests and the cucumber suite.
pub mod fixtures;
#[cfg(feature = "sqlite")]
pub mod prepare_env;
