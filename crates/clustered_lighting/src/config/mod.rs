//! Configuration system
//!
//! Lighting settings are plain serde structs that can live in TOML or RON
//! files next to the area data. The file extension picks the format.

use std::path::Path;

pub use serde::{Deserialize, Serialize};

mod lighting_config;

pub use lighting_config::{ClusterConfig, LightingConfig};

/// On-disk configuration formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.toml`
    Toml,
    /// `.ron`
    Ron,
}

impl ConfigFormat {
    /// Format implied by a file extension
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    /// Parse a configuration document
    pub fn parse<T: for<'de> Deserialize<'de>>(self, contents: &str) -> Result<T, ConfigError> {
        match self {
            Self::Toml => toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Self::Ron => ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Render a configuration document
    pub fn render<T: Serialize>(self, value: &T) -> Result<String, ConfigError> {
        match self {
            Self::Toml => toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string())),
            Self::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string())),
        }
    }
}

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from a `.toml` or `.ron` file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let contents = std::fs::read_to_string(path)?;
        format.parse(&contents)
    }

    /// Save configuration to a `.toml` or `.ron` file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = ConfigFormat::from_path(path)?.render(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values that parse but cannot drive the lighting system
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_path(Path::new("area/lighting.toml")).unwrap(), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("lighting.ron")).unwrap(), ConfigFormat::Ron);
        assert!(matches!(
            ConfigFormat::from_path(Path::new("lighting")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_ron_document() {
        let config: LightingConfig = ConfigFormat::Ron
            .parse("(max_lights: 48, cluster: (dimensions: (8, 8, 16)))")
            .unwrap();
        assert_eq!(config.max_lights, 48);
        assert_eq!(config.cluster.dimensions, [8, 8, 16]);
        assert_eq!(config.cluster.max_lights_per_cluster, ClusterConfig::default().max_lights_per_cluster);

        let rendered = ConfigFormat::Ron.render(&config).unwrap();
        assert!(rendered.contains("max_lights: 48"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = LightingConfig::load_from_file("definitely/not/here.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
