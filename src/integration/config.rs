//! Configuration for the integration layer
//!
//! Provides centralized configuration for all components. Every section is
//! optional in the TOML file; missing values take their defaults.

use crate::llm::{ModelConfig, PromptConfig, ShortcutRule, ShortcutTable};
use crate::speech::{RecognitionOptions, DEFAULT_LOCALE};
use crate::{ParleyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Speech capture settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Keep listening across pauses and rely on the silence debouncer
    pub continuous: bool,

    /// Ask the recognizer for interim hypotheses
    pub interim_results: bool,

    /// Recognition locale
    pub locale: String,

    /// Quiet period after the last result before capture is force-stopped
    pub quiet_period_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            continuous: true,
            interim_results: false,
            locale: DEFAULT_LOCALE.to_string(),
            quiet_period_ms: 2000,
        }
    }
}

impl CaptureConfig {
    pub fn quiet_period(&self) -> Duration {
        Duration::from_millis(self.quiet_period_ms)
    }

    pub fn recognition_options(&self) -> RecognitionOptions {
        RecognitionOptions {
            continuous: self.continuous,
            interim_results: self.interim_results,
            locale: self.locale.clone(),
        }
    }
}

/// Speech playback settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Speak replies to voice turns
    pub enabled: bool,

    /// Synthesis locale
    pub locale: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locale: DEFAULT_LOCALE.to_string(),
        }
    }
}

/// Configuration for the complete assistant
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub capture: CaptureConfig,

    pub playback: PlaybackConfig,

    pub model: ModelConfig,

    pub prompts: PromptConfig,

    /// Extra shortcut rules, checked after the built-in ones
    pub shortcuts: Vec<ShortcutRule>,

    /// Capacity of the command and event channels
    pub channel_buffer_size: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            playback: PlaybackConfig::default(),
            model: ModelConfig::default(),
            prompts: PromptConfig::default(),
            shortcuts: Vec::new(),
            channel_buffer_size: 100,
        }
    }
}

impl AssistantConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents).map_err(|e| {
            ParleyError::ConfigError(format!("{}: {}", path.display(), e))
        })?;
        config.validate().map_err(ParleyError::ConfigError)?;
        Ok(config)
    }

    /// Set the model configuration
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// Set the silence quiet period
    pub fn with_quiet_period(mut self, quiet_period: Duration) -> Self {
        self.capture.quiet_period_ms = quiet_period.as_millis() as u64;
        self
    }

    /// Stop capture on the first final result instead of debouncing
    pub fn single_shot(mut self) -> Self {
        self.capture.continuous = false;
        self
    }

    /// Add a shortcut rule
    pub fn with_shortcut(mut self, rule: ShortcutRule) -> Self {
        self.shortcuts.push(rule);
        self
    }

    /// Never speak replies, even to voice turns
    pub fn without_playback(mut self) -> Self {
        self.playback.enabled = false;
        self
    }

    /// Built-in shortcut rules followed by the configured ones
    pub fn shortcut_table(&self) -> ShortcutTable {
        let mut table = ShortcutTable::default();
        table.extend(self.shortcuts.iter().cloned());
        table
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.capture.quiet_period_ms == 0 {
            return Err("capture.quiet_period_ms must be positive".to_string());
        }
        if self.capture.locale.trim().is_empty() {
            return Err("capture.locale must not be empty".to_string());
        }
        if self.playback.locale.trim().is_empty() {
            return Err("playback.locale must not be empty".to_string());
        }
        if self.channel_buffer_size == 0 {
            return Err("channel_buffer_size must be positive".to_string());
        }
        for rule in &self.shortcuts {
            if rule.patterns.is_empty() {
                return Err(format!("shortcut rule '{}' has no patterns", rule.reply));
            }
            if rule.patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(format!("shortcut rule '{}' has a blank pattern", rule.reply));
            }
        }
        self.model.validate()
    }
}
