// src/config/mod.rs
pub mod watch;

pub use watch::{
    Config, ConfigSummary, EmailConfig, MessageConfig, PollConfig, PortalConfig, RenderConfig,
    StoreConfig,
};
