//! Runtime configuration for machine instances.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default frame interval, one sixtieth of a second.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_micros(16_667);

/// How structural errors are reported.
///
/// Structural errors are transitions to unknown targets and transition
/// loops. In development they are returned to the caller; in production
/// they are logged and the offending chain stops.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Development,
    Production,
}

impl Default for Mode {
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Development
        } else {
            Self::Production
        }
    }
}

/// Configuration of a [`Designer`](super::Designer).
///
/// # Example
///
/// ```rust
/// use statecraft::designer::{DesignerConfig, Mode};
///
/// let config = DesignerConfig::default()
///     .with_mode(Mode::Production)
///     .with_max_transitions(50);
/// assert_eq!(config.max_transitions, 50);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignerConfig {
    pub mode: Mode,
    /// Transitions, and separately queued events, allowed while handling one
    /// `send`, timer or async result
    pub max_transitions: usize,
    /// Tick interval for per-frame repeaters
    pub frame_interval: Duration,
    /// Number of transitions kept in the transition log
    pub log_capacity: usize,
}

impl Default for DesignerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            max_transitions: 200,
            frame_interval: DEFAULT_FRAME_INTERVAL,
            log_capacity: 100,
        }
    }
}

impl DesignerConfig {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_max_transitions(mut self, max: usize) -> Self {
        self.max_transitions = max;
        self
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = DesignerConfig::default();
        assert_eq!(config.max_transitions, 200);
        assert_eq!(config.frame_interval, DEFAULT_FRAME_INTERVAL);
        assert_eq!(config.log_capacity, 100);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: DesignerConfig =
            serde_json::from_str(r#"{"mode": "production", "max_transitions": 10}"#).unwrap();

        assert_eq!(config.mode, Mode::Production);
        assert_eq!(config.max_transitions, 10);
        assert_eq!(config.log_capacity, 100);
    }

    #[test]
    fn builder_methods_override() {
        let config = DesignerConfig::default()
            .with_frame_interval(Duration::from_millis(10))
            .with_log_capacity(5);

        assert_eq!(config.frame_interval, Duration::from_millis(10));
        assert_eq!(config.log_capacity, 5);
    }
}
