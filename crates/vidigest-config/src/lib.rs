//! Configuration loading for the Vidigest binaries.
//!
//! This crate provides:
//! - The [`Parameters`] trait over the parameter store, with SSM and
//!   in-memory backends
//! - Typed settings: channel list, LLM provider config, email config,
//!   proxy credentials
//! - Shared tracing initialization for the binaries

pub mod error;
pub mod logging;
pub mod params;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use logging::init_tracing;
pub use params::{keys, MemoryParameters, Parameters, SsmParameters};
pub use settings::{
    load_channel_list, load_email_config, load_llm_config, EmailConfig, EmailTransport,
    LlmConfig, LlmProvider, ProxyConfig,
};
