//! YAML run configuration.
//!
//! ```yaml
//! rules:
//!   business_min_hrs: 10
//!   premium_min_hrs: 6
//! attendees:
//!   - city: NYC
//!     travelers: 1
//! service:
//!   base_url: http://localhost:8080
//!   max_concurrent_fetches: 8
//! ```

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::{
    error::ConfigError,
    model::{Attendee, ClassificationRules, Currency},
};

/// What a run does when one origin fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Cancel every in-flight call and abort the run on the first error.
    #[default]
    FailFast,
    /// Record the failure for that origin and keep pricing the others.
    Isolate,
}

/// What the class selector does when the probe has no usable duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbePolicy {
    #[default]
    EconomyFallback,
    Strict,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    pub max_concurrent_fetches: usize,
    // 0 launches one worker per attendee
    pub workers: usize,
    pub failure_policy: FailurePolicy,
    pub probe_policy: ProbePolicy,
    pub currency: Currency,
    pub language: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            api_key: None,
            request_timeout_ms: 30_000,
            max_concurrent_fetches: 8,
            workers: 0,
            failure_policy: FailurePolicy::FailFast,
            probe_policy: ProbePolicy::EconomyFallback,
            currency: Currency::default(),
            language: "en".to_string(),
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    // A zero limit would never hand out a fetch permit
    pub fn fetch_limit(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }

    pub fn worker_count(&self, attendees: usize) -> usize {
        if self.workers == 0 {
            attendees.max(1)
        } else {
            self.workers
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rules: ClassificationRules,
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub service: ServiceConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.attendees.is_empty() {
            return Err(ConfigError::Invalid("no attendees configured".to_string()));
        }
        for attendee in &self.attendees {
            if attendee.city.trim().is_empty() {
                return Err(ConfigError::Invalid("attendee city is empty".to_string()));
            }
            if attendee.travelers == 0 {
                return Err(ConfigError::Invalid(format!(
                    "attendee {} has no travelers",
                    attendee.city
                )));
            }
        }
        if self.rules.premium_min_hours >= self.rules.business_min_hours {
            return Err(ConfigError::Invalid(format!(
                "premium_min_hrs ({}) must be below business_min_hrs ({})",
                self.rules.premium_min_hours, self.rules.business_min_hours
            )));
        }
        if self.service.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_ms must be positive".to_string(),
            ));
        }
        if self.service.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_fetches must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
