//! Service configuration loaded via OrthoConfig.
//!
//! Values layer CLI flags over `DISBURSEMENT_*` environment variables over
//! configuration files. Only the binary and the application builder read
//! them; the domain never does.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::cqrs::AttributePolicy;
use crate::outbound::persistence::PoolConfig;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_QUEUE_TOPIC: &str = "disbursements";
const DEFAULT_POOL_MAX_SIZE: u32 = 10;
const DEFAULT_POOL_TIMEOUT_SECS: u64 = 30;

/// Errors raised when settings cannot be turned into runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    /// No database URL was supplied by any layer.
    #[error("database URL missing: set DISBURSEMENT_DATABASE_URL or --database-url")]
    MissingDatabaseUrl,
}

/// Configuration values for the disbursement service.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "DISBURSEMENT")]
pub struct ServiceSettings {
    /// PostgreSQL connection URL.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    pub pool_max_size: Option<u32>,
    /// Idle connections kept open.
    pub pool_min_idle: Option<u32>,
    /// Seconds to wait for a pooled connection.
    pub pool_timeout_secs: Option<u64>,
    /// HTTP listen address.
    pub bind_addr: Option<String>,
    /// Topic consumed by the queue processor.
    pub queue_topic: Option<String>,
    /// Open a span per decorated operation. Defaults to on.
    pub tracing_enabled: Option<bool>,
    /// Attach projected inputs to spans. Defaults to off.
    pub capture_input: Option<bool>,
    /// Cap projected attributes in size and count. Defaults to on.
    pub truncate_attributes: Option<bool>,
}

impl ServiceSettings {
    /// Pool configuration derived from the database settings.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::MissingDatabaseUrl`] when no URL was set.
    pub fn pool_config(&self) -> Result<PoolConfig, SettingsError> {
        let url = self
            .database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(SettingsError::MissingDatabaseUrl)?;
        let config = PoolConfig::new(url)
            .with_max_size(self.pool_max_size.unwrap_or(DEFAULT_POOL_MAX_SIZE))
            .with_connection_timeout(Duration::from_secs(
                self.pool_timeout_secs.unwrap_or(DEFAULT_POOL_TIMEOUT_SECS),
            ));
        Ok(match self.pool_min_idle {
            Some(min_idle) => config.with_min_idle(Some(min_idle)),
            None => config,
        })
    }

    /// Return the HTTP listen address, falling back to `0.0.0.0:8080`.
    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    /// Return the queue topic, falling back to `disbursements`.
    pub fn queue_topic(&self) -> &str {
        self.queue_topic.as_deref().unwrap_or(DEFAULT_QUEUE_TOPIC)
    }

    /// Whether decorated operations open spans, falling back to `true`.
    pub fn tracing_enabled(&self) -> bool {
        self.tracing_enabled.unwrap_or(true)
    }

    /// Span attribute policy for the decorator pipeline.
    ///
    /// Unset flags take the values of [`AttributePolicy::default`].
    pub fn attribute_policy(&self) -> AttributePolicy {
        let defaults = AttributePolicy::default();
        AttributePolicy {
            capture_input: self.capture_input.unwrap_or(defaults.capture_input),
            truncate: self.truncate_attributes.unwrap_or(defaults.truncate),
        }
    }
}
