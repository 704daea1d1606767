//! Parameter store access.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::{ConfigError, ConfigResult};

/// Well-known parameter names.
pub mod keys {
    pub const YOUTUBE_CHANNELS: &str = "/vidigest/youtube_channels";
    pub const YOUTUBE_API_KEY: &str = "/vidigest/youtube_api_key";
    pub const LLM_CONFIG: &str = "/vidigest/llm_config";
    pub const LLM_API_KEY: &str = "/vidigest/llm_api_key";
    pub const SENDER_EMAIL: &str = "/vidigest/sender_email";
    pub const DESTINATION_EMAIL: &str = "/vidigest/destination_email";
    pub const EMAIL_PROVIDER: &str = "/vidigest/email_provider";
    pub const GMAIL_APP_PASSWORD: &str = "/vidigest/gmail_app_password";
}

/// String key → value lookups against the parameter store. Loaded once per
/// invocation; values are not cached across invocations.
#[async_trait]
pub trait Parameters: Send + Sync {
    /// Fetch a parameter, decrypting if it is stored encrypted.
    async fn get(&self, name: &str) -> ConfigResult<String>;

    /// Fetch a parameter, returning None when it is not defined.
    async fn get_optional(&self, name: &str) -> ConfigResult<Option<String>> {
        match self.get(name).await {
            Ok(v) => Ok(Some(v)),
            Err(ConfigError::MissingParameter(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// SSM Parameter Store backend.
#[derive(Clone)]
pub struct SsmParameters {
    client: aws_sdk_ssm::Client,
}

impl SsmParameters {
    pub fn new(client: aws_sdk_ssm::Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_ssm::Client::new(&config))
    }
}

#[async_trait]
impl Parameters for SsmParameters {
    async fn get(&self, name: &str) -> ConfigResult<String> {
        let result = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await;
        match result {
            Ok(output) => output
                .parameter()
                .and_then(|p| p.value())
                .map(|v| v.to_string())
                .ok_or_else(|| ConfigError::missing(name)),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_parameter_not_found() {
                    Err(ConfigError::missing(name))
                } else {
                    Err(ConfigError::request_failed(service_err.to_string()))
                }
            }
        }
    }
}

/// In-memory parameter backend for tests.
#[derive(Default)]
pub struct MemoryParameters {
    values: HashMap<String, String>,
}

impl MemoryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl Parameters for MemoryParameters {
    async fn get(&self, name: &str) -> ConfigResult<String> {
        self.values
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::missing(name))
    }
}
