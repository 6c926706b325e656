//! Core configuration and output helpers shared by every subsystem.

mod config;
mod output;

pub use config::{
    find_project_config, BackendConfig, Config, GeneralConfig, PROJECT_CONFIG_FILE, PROJECT_DIR,
};
pub use output::{strip_ansi_codes, truncate};
