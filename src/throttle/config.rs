//! Throttle configuration loading and validation.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Pacing settings for a [`ThrottlingBatcher`](super::ThrottlingBatcher).
///
/// Serializable so it can live in an application's config file:
///
/// ```yaml
/// burst_size: 25
/// tick_interval_ms: 250
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Messages delivered per pump tick. Must be positive.
    #[serde(default = "default_burst_size")]
    pub burst_size: usize,
    /// Delay between ticks in milliseconds; 0 pumps back-to-back.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

fn default_burst_size() -> usize {
    10
}

fn default_tick_interval_ms() -> u64 {
    100
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            burst_size: default_burst_size(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl ThrottleConfig {
    pub fn new(burst_size: usize, tick_interval: Duration) -> Self {
        Self::default()
            .with_burst_size(burst_size)
            .with_tick_interval(tick_interval)
    }

    pub fn with_burst_size(mut self, burst_size: usize) -> Self {
        self.burst_size = burst_size;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.burst_size == 0 {
            return Err(Error::configuration_with_context(
                "burst_size must be positive",
                ErrorContext::new()
                    .with_field_path("burst_size")
                    .with_details("got 0")
                    .with_source("throttle_config"),
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Copy with `burst_size` clamped to at least 1.
    pub(crate) fn normalized(&self) -> Self {
        Self {
            burst_size: self.burst_size.max(1),
            tick_interval_ms: self.tick_interval_ms,
        }
    }
}

/// Equality predicate used for in-burst deduplication.
pub type EqualityFn<M> = Arc<dyn Fn(&M, &M) -> bool + Send + Sync>;

/// Deduplication setting. Enabling it always carries the predicate.
pub enum Dedup<M> {
    Disabled,
    Enabled(EqualityFn<M>),
}

impl<M> Dedup<M> {
    /// Deduplicate with a custom predicate. It should be an equivalence relation.
    pub fn by<F>(eq: F) -> Self
    where
        F: Fn(&M, &M) -> bool + Send + Sync + 'static,
    {
        Dedup::Enabled(Arc::new(eq))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Dedup::Enabled(_))
    }

    /// True when `candidate` equals something already in `buffered`.
    pub(crate) fn is_duplicate(&self, buffered: &[M], candidate: &M) -> bool {
        match self {
            Dedup::Disabled => false,
            Dedup::Enabled(eq) => buffered.iter().any(|m| eq(m, candidate)),
        }
    }
}

impl<M: PartialEq + 'static> Dedup<M> {
    /// Deduplicate by value equality.
    pub fn by_eq() -> Self {
        Self::by(|a: &M, b: &M| a == b)
    }
}

impl<M> Default for Dedup<M> {
    fn default() -> Self {
        Dedup::Disabled
    }
}

impl<M> Clone for Dedup<M> {
    fn clone(&self) -> Self {
        match self {
            Dedup::Disabled => Dedup::Disabled,
            Dedup::Enabled(eq) => Dedup::Enabled(Arc::clone(eq)),
        }
    }
}

impl<M> fmt::Debug for Dedup<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dedup::Disabled => f.write_str("Disabled"),
            Dedup::Enabled(_) => f.write_str("Enabled(..)"),
        }
    }
}
