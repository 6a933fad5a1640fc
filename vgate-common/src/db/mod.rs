//! Database initialization and shared accessors

pub mod init;
pub mod settings;

pub use init::*;
pub use settings::{ensure_setting, get_setting, set_setting};
