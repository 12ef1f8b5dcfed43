//! Small helpers shared by the workspace binaries.

pub mod env;

pub use env::{EnvError, get_env_var};
