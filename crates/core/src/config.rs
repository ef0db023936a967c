//! Filter settings, settings stores, and engine tunables.
//!
//! Two kinds of configuration live here:
//!
//! - [`FilterSettings`]: what the user chose (enabled flag, strict mode,
//!   selected languages, which item kinds to filter). It is loaded from a
//!   [`ConfigStore`] at startup and afterwards only changes through
//!   [`ConfigChange`] notifications.
//! - [`ScanConfig`]: how the engine runs (debounce window, length
//!   thresholds, classifier tolerances, the structural tables used to find
//!   items). Built once with [`ScanConfig::builder`].
//!
//! # Example
//!
//! ```rust
//! use langfilter_core::config::{ConfigChange, FilterSettings, LanguageCode};
//!
//! let mut settings = FilterSettings::default();
//! assert!(settings.enabled);
//!
//! settings.apply(ConfigChange::SelectedLanguages(vec![LanguageCode::new("EN"), LanguageCode::new("ru")]));
//! assert_eq!(settings.selected_languages, vec![LanguageCode::new("en"), LanguageCode::new("ru")]);
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::ClassifierConfig;
use crate::extract::KindSpec;
use crate::{FilterError, Result};

/// Short language identifier such as `en` or `ru`.
///
/// Codes are normalized to trimmed lowercase on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageCode(String);

impl LanguageCode {
    /// The base language whose short fragments pass through unclassified.
    pub const BASE: &'static str = "en";

    pub fn new(code: &str) -> Self {
        Self(code.trim().to_lowercase())
    }

    /// The base language code.
    pub fn base() -> Self {
        Self(Self::BASE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_base(&self) -> bool {
        self.0 == Self::BASE
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LanguageCode {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Parses a comma separated list such as `"en, ru,ja"` into codes.
pub fn parse_language_list(list: &str) -> Vec<LanguageCode> {
    let codes = list.split(',').filter(|c| !c.trim().is_empty()).map(LanguageCode::new).collect();
    dedup_languages(codes)
}

fn dedup_languages(codes: Vec<LanguageCode>) -> Vec<LanguageCode> {
    let mut seen = Vec::with_capacity(codes.len());
    for code in codes {
        let code = LanguageCode::new(code.as_str());
        if !code.as_str().is_empty() && !seen.contains(&code) {
            seen.push(code);
        }
    }
    seen
}

/// User-facing filter settings.
///
/// Serialized with the camelCase keys the settings store uses
/// (`enabled`, `strictMode`, `selectedLanguages`, `hideVideos`, `hideChannels`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    /// Master switch. When off, every hidden container is restored.
    pub enabled: bool,
    /// Zero tolerance for foreign-script characters.
    pub strict_mode: bool,
    /// Ordered set of languages the user reads.
    pub selected_languages: Vec<LanguageCode>,
    /// Filter video cards.
    pub hide_videos: bool,
    /// Filter channel cards.
    pub hide_channels: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            strict_mode: true,
            selected_languages: vec![LanguageCode::base()],
            hide_videos: true,
            hide_channels: true,
        }
    }
}

impl FilterSettings {
    /// Settings used when the stored ones could not be loaded: filtering off
    /// and no languages selected, so nothing is hidden until real settings
    /// arrive.
    pub fn unavailable() -> Self {
        Self { enabled: false, selected_languages: Vec::new(), ..Self::default() }
    }

    /// Applies a change notification. Returns whether anything changed.
    pub fn apply(&mut self, change: ConfigChange) -> bool {
        match change {
            ConfigChange::Enabled(value) => replace(&mut self.enabled, value),
            ConfigChange::StrictMode(value) => replace(&mut self.strict_mode, value),
            ConfigChange::SelectedLanguages(codes) => replace(&mut self.selected_languages, dedup_languages(codes)),
            ConfigChange::HideVideos(value) => replace(&mut self.hide_videos, value),
            ConfigChange::HideChannels(value) => replace(&mut self.hide_channels, value),
        }
    }

    /// Normalizes language codes after deserialization.
    pub fn normalized(mut self) -> Self {
        self.selected_languages = dedup_languages(std::mem::take(&mut self.selected_languages));
        self
    }

    /// Whether scanning should run at all.
    ///
    /// An empty language selection means the user has not opted into
    /// filtering anything yet.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.selected_languages.is_empty()
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// A settings change notification, keyed by field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChange {
    Enabled(bool),
    StrictMode(bool),
    SelectedLanguages(Vec<LanguageCode>),
    HideVideos(bool),
    HideChannels(bool),
}

impl ConfigChange {
    /// The settings key this change targets.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Enabled(_) => "enabled",
            Self::StrictMode(_) => "strictMode",
            Self::SelectedLanguages(_) => "selectedLanguages",
            Self::HideVideos(_) => "hideVideos",
            Self::HideChannels(_) => "hideChannels",
        }
    }

    /// Builds a change from a store notification (`key` + new JSON value).
    pub fn from_key_value(key: &str, value: serde_json::Value) -> Result<Self> {
        let change = match key {
            "enabled" => Self::Enabled(serde_json::from_value(value)?),
            "strictMode" => Self::StrictMode(serde_json::from_value(value)?),
            "selectedLanguages" => Self::SelectedLanguages(serde_json::from_value(value)?),
            "hideVideos" => Self::HideVideos(serde_json::from_value(value)?),
            "hideChannels" => Self::HideChannels(serde_json::from_value(value)?),
            other => return Err(FilterError::ConfigError(format!("Unknown settings key: {}", other))),
        };
        Ok(change)
    }

    /// Whether previously made hide decisions are invalidated by this change.
    pub fn invalidates_decisions(&self) -> bool {
        matches!(self, Self::StrictMode(_) | Self::SelectedLanguages(_))
    }
}

/// A key-value settings store.
pub trait ConfigStore {
    /// Loads the current settings.
    ///
    /// An `Err` means the settings could not be read; callers must not
    /// substitute defaults in that case.
    fn load(&self) -> Result<FilterSettings>;

    /// Persists settings.
    fn save(&mut self, settings: &FilterSettings) -> Result<()>;
}

/// Settings stored as a JSON file.
///
/// A missing file yields the first-run defaults; an unreadable or malformed
/// file is an error.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Store backed by the given file.
    pub fn at<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Store at `<config dir>/langfilter/settings.json`.
    pub fn default_location() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| FilterError::ConfigError("No configuration directory on this platform".to_string()))?;
        Ok(Self::at(dir.join("langfilter").join("settings.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for JsonFileStore {
    fn load(&self) -> Result<FilterSettings> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no settings file, using first-run defaults");
            return Ok(FilterSettings::default());
        }

        let raw = fs::read_to_string(&self.path).map_err(|e| {
            FilterError::ConfigError(format!("Cannot read settings {}: {}", self.path.display(), e))
        })?;
        let settings: FilterSettings = serde_json::from_str(&raw).map_err(|e| {
            FilterError::ConfigError(format!("Invalid settings in {}: {}", self.path.display(), e))
        })?;
        Ok(settings.normalized())
    }

    fn save(&mut self, settings: &FilterSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(settings)?)?;
        Ok(())
    }
}

/// In-memory settings store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    settings: Option<FilterSettings>,
}

impl MemoryStore {
    pub fn new(settings: FilterSettings) -> Self {
        Self { settings: Some(settings) }
    }

    /// A store with nothing in it; loading fails.
    pub fn empty() -> Self {
        Self { settings: None }
    }
}

impl ConfigStore for MemoryStore {
    fn load(&self) -> Result<FilterSettings> {
        self.settings
            .clone()
            .ok_or_else(|| FilterError::ConfigError("No settings stored".to_string()))
    }

    fn save(&mut self, settings: &FilterSettings) -> Result<()> {
        self.settings = Some(settings.clone());
        Ok(())
    }
}

/// Engine tunables.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use langfilter_core::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .debounce(Duration::from_millis(50))
///     .min_title_len(8)
///     .build();
/// assert_eq!(config.min_title_len, 8);
/// ```
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Delay between a trigger and the scan it schedules (default: 100ms).
    pub debounce: Duration,

    /// Delay before the first scan of a new page (default: 1000ms).
    pub initial_delay: Duration,

    /// Periodic rescan interval, as a backstop for missed notifications
    /// (default: 2000ms, `None` disables it).
    pub tick_interval: Option<Duration>,

    /// Minimum title length in characters (default: 6).
    pub min_title_len: usize,

    /// Classifier thresholds.
    pub classifier: ClassifierConfig,

    /// Item kinds to discover, with their structural probe tables.
    pub kinds: Vec<KindSpec>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            initial_delay: Duration::from_millis(1000),
            tick_interval: Some(Duration::from_millis(2000)),
            min_title_len: 6,
            classifier: ClassifierConfig::default(),
            kinds: vec![KindSpec::videos(), KindSpec::channels()],
        }
    }
}

impl ScanConfig {
    /// Creates a new builder for ScanConfig.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::new()
    }
}

/// Builder for ScanConfig.
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl ScanConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: ScanConfig::default() }
    }

    /// Sets the debounce window.
    pub fn debounce(mut self, value: Duration) -> Self {
        self.config.debounce = value;
        self
    }

    /// Sets the delay before the first scan.
    pub fn initial_delay(mut self, value: Duration) -> Self {
        self.config.initial_delay = value;
        self
    }

    /// Sets (or disables) the periodic rescan.
    pub fn tick_interval(mut self, value: Option<Duration>) -> Self {
        self.config.tick_interval = value;
        self
    }

    /// Sets the minimum title length.
    pub fn min_title_len(mut self, value: usize) -> Self {
        self.config.min_title_len = value;
        self
    }

    /// Sets the minimum text length the classifier will judge.
    pub fn min_text_len(mut self, value: usize) -> Self {
        self.config.classifier.min_text_len = value;
        self
    }

    /// Sets the foreign-letter ratio tolerated by lenient Latin recognizers.
    pub fn lenient_foreign_ratio(mut self, value: f64) -> Self {
        self.config.classifier.lenient_foreign_ratio = value;
        self
    }

    /// Sets the script share required by lenient script recognizers.
    pub fn lenient_min_script_share(mut self, value: f64) -> Self {
        self.config.classifier.lenient_min_script_share = value;
        self
    }

    /// Replaces the item kind tables.
    pub fn kinds(mut self, value: Vec<KindSpec>) -> Self {
        self.config.kinds = value;
        self
    }

    /// Builds the config.
    pub fn build(self) -> ScanConfig {
        self.config
    }
}

impl Default for ScanConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = FilterSettings::default();
        assert!(settings.enabled);
        assert!(settings.strict_mode);
        assert_eq!(settings.selected_languages, vec![LanguageCode::base()]);
        assert!(settings.is_active());
    }

    #[test]
    fn test_empty_selection_is_inactive() {
        let settings = FilterSettings { selected_languages: vec![], ..Default::default() };
        assert!(!settings.is_active());
    }

    #[test]
    fn test_apply_reports_changes() {
        let mut settings = FilterSettings::default();
        assert!(!settings.apply(ConfigChange::Enabled(true)));
        assert!(settings.apply(ConfigChange::Enabled(false)));
        assert!(!settings.enabled);
    }

    #[test]
    fn test_language_list_dedup() {
        let codes = parse_language_list("en, RU ,en,,ja");
        assert_eq!(codes, vec![LanguageCode::new("en"), LanguageCode::new("ru"), LanguageCode::new("ja")]);
    }

    #[rstest]
    #[case("enabled", serde_json::json!(false), ConfigChange::Enabled(false))]
    #[case("strictMode", serde_json::json!(true), ConfigChange::StrictMode(true))]
    #[case("hideChannels", serde_json::json!(false), ConfigChange::HideChannels(false))]
    #[case("selectedLanguages", serde_json::json!(["en", "tr"]), ConfigChange::SelectedLanguages(vec!["en".into(), "tr".into()]))]
    fn test_change_from_key_value(#[case] key: &str, #[case] value: serde_json::Value, #[case] expected: ConfigChange) {
        let change = ConfigChange::from_key_value(key, value).unwrap();
        assert_eq!(change.key(), key);
        assert_eq!(change, expected);
    }

    #[test]
    fn test_change_unknown_key() {
        let result = ConfigChange::from_key_value("sortBy", serde_json::json!("popularity"));
        assert!(matches!(result, Err(FilterError::ConfigError(_))));
    }

    #[test]
    fn test_settings_camel_case() {
        let json = serde_json::to_value(FilterSettings::default()).unwrap();
        assert_eq!(json["strictMode"], serde_json::json!(true));
        assert_eq!(json["selectedLanguages"], serde_json::json!(["en"]));
    }

    #[test]
    fn test_json_store_missing_file_defaults() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::at(dir.path().join("settings.json"));
        assert_eq!(store.load().unwrap(), FilterSettings::default());
    }

    #[test]
    fn test_json_store_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut store = JsonFileStore::at(dir.path().join("nested").join("settings.json"));
        let settings = FilterSettings { strict_mode: false, selected_languages: vec!["ru".into()], ..Default::default() };

        store.save(&settings).unwrap();
        assert_eq!(store.load().unwrap(), settings);
    }

    #[test]
    fn test_json_store_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"selectedLanguages": ["JA", "ja"]}"#).unwrap();

        let settings = JsonFileStore::at(&path).load().unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.selected_languages, vec![LanguageCode::new("ja")]);
    }

    #[test]
    fn test_json_store_malformed_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(JsonFileStore::at(&path).load(), Err(FilterError::ConfigError(_))));
    }

    #[test]
    fn test_memory_store_empty_is_error() {
        assert!(MemoryStore::empty().load().is_err());
    }

    #[test]
    fn test_scan_config_builder() {
        let config = ScanConfig::builder()
            .debounce(Duration::from_millis(20))
            .tick_interval(None)
            .min_text_len(4)
            .build();

        assert_eq!(config.debounce, Duration::from_millis(20));
        assert!(config.tick_interval.is_none());
        assert_eq!(config.classifier.min_text_len, 4);
        assert_eq!(config.kinds.len(), 2);
    }
}
