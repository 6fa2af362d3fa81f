//! Editor configuration
//!
//! Tunables for hit testing, default annotation style and the capture
//! history. Configuration can be loaded from a TOML file, environment
//! variables, or created programmatically.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::annotation::{Color, DEFAULT_FONT_SIZE, DEFAULT_STROKE_WIDTH, HIT_THRESHOLD};

/// Default radius around a resize handle that still grabs it
pub const HANDLE_THRESHOLD: f32 = 8.0;

/// Default number of history entries offered to the user
pub const HISTORY_LIMIT: usize = 25;

const HISTORY_DIR_NAME: &str = "CaptureAndEdit_history";

/// Editor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Distance from a shape's outline that still counts as a hit
    pub hit_threshold: f32,
    /// Radius around a resize handle that grabs it
    pub handle_threshold: f32,
    /// Stroke width for new line-like annotations
    pub stroke_width: f32,
    /// Font size for new text annotations
    pub font_size: f32,
    /// Color selected when the editor starts
    pub default_color: Color,
    /// Maximum number of history entries listed
    pub history_limit: usize,
    /// Directory holding saved captures
    pub history_dir: PathBuf,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            hit_threshold: HIT_THRESHOLD,
            handle_threshold: HANDLE_THRESHOLD,
            stroke_width: DEFAULT_STROKE_WIDTH,
            font_size: DEFAULT_FONT_SIZE,
            default_color: Color::default(),
            history_limit: HISTORY_LIMIT,
            history_dir: Self::default_history_dir(),
        }
    }
}

impl EditorConfig {
    pub fn with_hit_threshold(mut self, threshold: f32) -> Self {
        self.hit_threshold = threshold;
        self
    }

    pub fn with_handle_threshold(mut self, threshold: f32) -> Self {
        self.handle_threshold = threshold;
        self
    }

    pub fn with_stroke_width(mut self, width: f32) -> Self {
        self.stroke_width = width;
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_default_color(mut self, color: Color) -> Self {
        self.default_color = color;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    pub fn with_history_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.history_dir = path.as_ref().to_path_buf();
        self
    }

    /// Returns the default history directory: `~/CaptureAndEdit_history`
    pub fn default_history_dir() -> PathBuf {
        match dirs::home_dir() {
            Some(home) => home.join(HISTORY_DIR_NAME),
            None => PathBuf::from(HISTORY_DIR_NAME),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Environment variables:
    /// - `CAPTURE_EDIT_HIT_THRESHOLD`
    /// - `CAPTURE_EDIT_HANDLE_THRESHOLD`
    /// - `CAPTURE_EDIT_STROKE_WIDTH`
    /// - `CAPTURE_EDIT_FONT_SIZE`
    /// - `CAPTURE_EDIT_COLOR`: palette name, case-insensitive
    /// - `CAPTURE_EDIT_HISTORY_LIMIT`
    /// - `CAPTURE_EDIT_HISTORY_DIR`
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    /// Returns an error if any variable holds an unparsable or non-positive value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(v) = env_positive("CAPTURE_EDIT_HIT_THRESHOLD")? {
            config.hit_threshold = v;
        }
        if let Some(v) = env_positive("CAPTURE_EDIT_HANDLE_THRESHOLD")? {
            config.handle_threshold = v;
        }
        if let Some(v) = env_positive("CAPTURE_EDIT_STROKE_WIDTH")? {
            config.stroke_width = v;
        }
        if let Some(v) = env_positive("CAPTURE_EDIT_FONT_SIZE")? {
            config.font_size = v;
        }

        if let Ok(val) = std::env::var("CAPTURE_EDIT_COLOR") {
            config.default_color = Color::ALL
                .into_iter()
                .find(|c| c.name().eq_ignore_ascii_case(val.trim()))
                .ok_or_else(|| ConfigError::InvalidValue("CAPTURE_EDIT_COLOR".to_string()))?;
        }

        if let Ok(val) = std::env::var("CAPTURE_EDIT_HISTORY_LIMIT") {
            config.history_limit = val
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    ConfigError::InvalidValue("CAPTURE_EDIT_HISTORY_LIMIT".to_string())
                })?;
        }

        if let Ok(val) = std::env::var("CAPTURE_EDIT_HISTORY_DIR") {
            config.history_dir = PathBuf::from(val);
        }

        Ok(config)
    }

    /// Loads configuration from a TOML file. Missing keys keep their defaults.
    ///
    /// ```toml
    /// hit_threshold = 10.0
    /// handle_threshold = 8.0
    /// stroke_width = 3.0
    /// font_size = 16.0
    /// default_color = "Red"
    /// history_limit = 25
    /// history_dir = "/home/me/CaptureAndEdit_history"
    /// ```
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml(&contents)
    }

    fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.to_toml()?)?;
        Ok(())
    }

    fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("hit_threshold", self.hit_threshold),
            ("handle_threshold", self.handle_threshold),
            ("stroke_width", self.stroke_width),
            ("font_size", self.font_size),
        ];
        if let Some((key, _)) = checks.iter().find(|(_, v)| v.is_nan() || *v <= 0.0) {
            return Err(ConfigError::InvalidValue(key.to_string()));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::InvalidValue("history_limit".to_string()));
        }
        Ok(())
    }
}

fn env_positive(name: &str) -> Result<Option<f32>, ConfigError> {
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| *v > 0.0)
            .map(Some)
            .ok_or_else(|| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(None),
    }
}

/// Errors that can occur during configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid value for a configuration parameter
    #[error("Invalid value for configuration key: {0}")]
    InvalidValue(String),

    /// I/O error reading or writing the configuration file
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "CAPTURE_EDIT_HIT_THRESHOLD",
        "CAPTURE_EDIT_HANDLE_THRESHOLD",
        "CAPTURE_EDIT_STROKE_WIDTH",
        "CAPTURE_EDIT_FONT_SIZE",
        "CAPTURE_EDIT_COLOR",
        "CAPTURE_EDIT_HISTORY_LIMIT",
        "CAPTURE_EDIT_HISTORY_DIR",
    ];

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.hit_threshold, 10.0);
        assert_eq!(config.handle_threshold, 8.0);
        assert_eq!(config.stroke_width, 3.0);
        assert_eq!(config.font_size, 16.0);
        assert_eq!(config.default_color, Color::Red);
        assert_eq!(config.history_limit, 25);
        assert!(config.history_dir.ends_with("CaptureAndEdit_history"));
    }

    #[test]
    fn test_builder_methods() {
        let config = EditorConfig::default()
            .with_hit_threshold(4.0)
            .with_handle_threshold(6.0)
            .with_stroke_width(5.0)
            .with_font_size(24.0)
            .with_default_color(Color::Blue)
            .with_history_limit(10)
            .with_history_dir("/custom/path");

        assert_eq!(config.hit_threshold, 4.0);
        assert_eq!(config.handle_threshold, 6.0);
        assert_eq!(config.stroke_width, 5.0);
        assert_eq!(config.font_size, 24.0);
        assert_eq!(config.default_color, Color::Blue);
        assert_eq!(config.history_limit, 10);
        assert_eq!(config.history_dir, PathBuf::from("/custom/path"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        let _guard = EnvGuard::new(ENV_VARS);

        env::set_var("CAPTURE_EDIT_HIT_THRESHOLD", "12");
        env::set_var("CAPTURE_EDIT_STROKE_WIDTH", "2.5");
        env::set_var("CAPTURE_EDIT_COLOR", "green");
        env::set_var("CAPTURE_EDIT_HISTORY_LIMIT", "5");
        env::set_var("CAPTURE_EDIT_HISTORY_DIR", "/tmp/captures");

        let config = EditorConfig::from_env().unwrap();
        assert_eq!(config.hit_threshold, 12.0);
        assert_eq!(config.stroke_width, 2.5);
        assert_eq!(config.default_color, Color::Green);
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.history_dir, PathBuf::from("/tmp/captures"));
    }

    #[test]
    #[serial]
    fn test_from_env_partial() {
        let _guard = EnvGuard::new(ENV_VARS);
        for name in ENV_VARS {
            env::remove_var(name);
        }
        env::set_var("CAPTURE_EDIT_FONT_SIZE", "20");

        let config = EditorConfig::from_env().unwrap();
        assert_eq!(config.font_size, 20.0);
        assert_eq!(config.hit_threshold, 10.0); // default
        assert_eq!(config.history_limit, 25); // default
    }

    #[test]
    #[serial]
    fn test_from_env_invalid() {
        let _guard = EnvGuard::new(ENV_VARS);
        for name in ENV_VARS {
            env::remove_var(name);
        }

        env::set_var("CAPTURE_EDIT_HIT_THRESHOLD", "not_a_number");
        assert!(EditorConfig::from_env().is_err());

        env::set_var("CAPTURE_EDIT_HIT_THRESHOLD", "-3");
        assert!(EditorConfig::from_env().is_err());

        env::remove_var("CAPTURE_EDIT_HIT_THRESHOLD");
        env::set_var("CAPTURE_EDIT_COLOR", "purple");
        assert!(matches!(
            EditorConfig::from_env(),
            Err(ConfigError::InvalidValue(key)) if key == "CAPTURE_EDIT_COLOR"
        ));
    }

    // Helper to save and restore environment variables
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(var_names: &[&str]) -> Self {
            let vars = var_names
                .iter()
                .map(|name| (name.to_string(), env::var(name).ok()))
                .collect();
            Self { vars }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.vars {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = EditorConfig::default()
            .with_font_size(20.0)
            .with_default_color(Color::Yellow)
            .with_history_dir("/tmp/captures");
        let toml = config.to_toml().unwrap();
        let parsed = EditorConfig::from_toml(&toml).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
            # Only override the pen
            stroke_width = 6.0
            default_color = "Black"
        "#;

        let config = EditorConfig::from_toml(toml).unwrap();
        assert_eq!(config.stroke_width, 6.0);
        assert_eq!(config.default_color, Color::Black);
        assert_eq!(config.font_size, 16.0); // default
    }

    #[test]
    fn test_from_toml_rejects_zero_limit() {
        let result = EditorConfig::from_toml("history_limit = 0");
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == "history_limit"));
    }

    #[test]
    fn test_from_toml_rejects_malformed() {
        assert!(matches!(
            EditorConfig::from_toml("stroke_width = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_file_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("editor.toml");

        let config = EditorConfig::default().with_hit_threshold(7.5);
        config.save_to_file(&config_path).unwrap();

        let loaded = EditorConfig::from_file(&config_path).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = EditorConfig::from_file(temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
