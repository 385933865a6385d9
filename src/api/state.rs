//! Shared application state attached to every request.

use std::sync::Arc;

use crate::auth::token::TokenCodec;
use crate::blob::BlobStore;

use super::notify::{EmailSender, PushSender};

/// Application configuration, immutable after startup.
#[derive(Clone, Debug)]
pub struct AppConfig {
    frontend_base_url: String,
    reset_token_ttl_seconds: i64,
}

const DEFAULT_RESET_TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

impl AppConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            reset_token_ttl_seconds: DEFAULT_RESET_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_reset_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.reset_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    #[must_use]
    pub fn reset_token_ttl_seconds(&self) -> i64 {
        self.reset_token_ttl_seconds
    }
}

/// State shared by all handlers: the token codec with its injected
/// signing secret, configuration, and the outbound collaborators.
pub struct AppState {
    codec: TokenCodec,
    config: AppConfig,
    email: Arc<dyn EmailSender>,
    push: Arc<dyn PushSender>,
    blobs: Arc<dyn BlobStore>,
}

impl AppState {
    #[must_use]
    pub fn new(
        codec: TokenCodec,
        config: AppConfig,
        email: Arc<dyn EmailSender>,
        push: Arc<dyn PushSender>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            codec,
            config,
            email,
            push,
            blobs,
        }
    }

    #[must_use]
    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn email(&self) -> Arc<dyn EmailSender> {
        self.email.clone()
    }

    #[must_use]
    pub fn push(&self) -> Arc<dyn PushSender> {
        self.push.clone()
    }

    #[must_use]
    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_and_overrides() {
        let config = AppConfig::new("https://agora.dev".to_string());
        assert_eq!(config.frontend_base_url(), "https://agora.dev");
        assert_eq!(
            config.reset_token_ttl_seconds(),
            DEFAULT_RESET_TOKEN_TTL_SECONDS
        );

        let config = config.with_reset_token_ttl_seconds(60);
        assert_eq!(config.reset_token_ttl_seconds(), 60);
    }
}
