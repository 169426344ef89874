//! # Lighting Configuration
//!
//! Capacity limits and cluster-grid geometry for a [`LightingSystem`]. Both
//! structures are plain serde data so they can live in the same TOML/RON files
//! as the rest of an application's settings.
//!
//! [`LightingSystem`]: crate::lighting::LightingSystem

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// Default cap on lights owned by one registry
pub const DEFAULT_MAX_LIGHTS: usize = 256;

/// Default per-cluster light list capacity
pub const DEFAULT_MAX_LIGHTS_PER_CLUSTER: u32 = 128;

/// Default shadow map resolution for directional lights that cast shadows
pub const DEFAULT_SHADOW_RESOLUTION: u32 = 2048;

/// # Cluster Grid Configuration
///
/// Dimensions of the view-frustum partition and the depth range used for
/// logarithmic Z slicing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Grid size along screen X, screen Y and depth
    pub dimensions: [u32; 3],
    /// Maximum light identities stored per cluster
    pub max_lights_per_cluster: u32,
    /// Near bound of the depth slicing, in view-space units
    pub near: f32,
    /// Far bound of the depth slicing, in view-space units
    pub far: f32,
}

impl ClusterConfig {
    /// Create a cluster configuration with the given grid size and default depth range
    pub fn new(x: u32, y: u32, z: u32) -> Self {
        Self {
            dimensions: [x, y, z],
            ..Self::default()
        }
    }

    /// Set the per-cluster light cap
    pub fn with_max_lights_per_cluster(mut self, max: u32) -> Self {
        self.max_lights_per_cluster = max;
        self
    }

    /// Set the depth range used for Z slicing
    pub fn with_depth_range(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    /// Total number of clusters in the grid
    pub fn cluster_count(&self) -> usize {
        self.dimensions.iter().map(|&d| d as usize).product()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimensions.contains(&0) {
            return Err(ConfigError::Invalid(format!(
                "Cluster dimensions must be non-zero, got {:?}",
                self.dimensions
            )));
        }

        if self.max_lights_per_cluster == 0 {
            return Err(ConfigError::Invalid(
                "Max lights per cluster must be at least 1".to_string(),
            ));
        }

        if !(self.near > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "Near plane must be positive, got {}",
                self.near
            )));
        }

        if !(self.far > self.near) {
            return Err(ConfigError::Invalid(format!(
                "Far plane ({}) must lie beyond near plane ({})",
                self.far, self.near
            )));
        }

        Ok(())
    }
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            dimensions: [16, 8, 24],
            max_lights_per_cluster: DEFAULT_MAX_LIGHTS_PER_CLUSTER,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// # Lighting Configuration
///
/// Top-level configuration handed to [`LightingSystem::new`].
///
/// [`LightingSystem::new`]: crate::lighting::LightingSystem::new
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightingConfig {
    /// Maximum number of lights the registry will own, sun and moon included
    pub max_lights: usize,
    /// Cluster grid geometry
    pub cluster: ClusterConfig,
    /// Shadow map resolution assigned to shadow-casting sun/moon lights
    pub default_shadow_resolution: u32,
}

impl LightingConfig {
    /// Create a new lighting configuration with defaults
    pub fn new() -> Self {
        Self {
            max_lights: DEFAULT_MAX_LIGHTS,
            cluster: ClusterConfig::default(),
            default_shadow_resolution: DEFAULT_SHADOW_RESOLUTION,
        }
    }

    /// Set the registry capacity
    pub fn with_max_lights(mut self, max_lights: usize) -> Self {
        self.max_lights = max_lights;
        self
    }

    /// Set the cluster grid configuration
    pub fn with_cluster(mut self, cluster: ClusterConfig) -> Self {
        self.cluster = cluster;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_lights == 0 {
            return Err(ConfigError::Invalid("Max lights must be at least 1".to_string()));
        }

        self.cluster.validate()
    }
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for LightingConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LightingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.cluster.cluster_count(), 16 * 8 * 24);
    }

    #[test]
    fn test_rejects_bad_depth_range() {
        let config = LightingConfig::new()
            .with_cluster(ClusterConfig::default().with_depth_range(10.0, 5.0));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = LightingConfig::new()
            .with_cluster(ClusterConfig::default().with_depth_range(0.0, 5.0));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_zero_dimensions() {
        let config = LightingConfig::new().with_cluster(ClusterConfig::new(16, 0, 24));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: LightingConfig = toml::from_str("max_lights = 32").unwrap();
        assert_eq!(config.max_lights, 32);
        assert_eq!(config.cluster, ClusterConfig::default());
        assert_eq!(config.default_shadow_resolution, DEFAULT_SHADOW_RESOLUTION);
    }

    #[test]
    fn test_save_and_load_toml_file() {
        let path = std::env::temp_dir().join("clustered_lighting_config_test.toml");
        let path = path.to_string_lossy().to_string();

        let config = LightingConfig::new()
            .with_max_lights(64)
            .with_cluster(ClusterConfig::new(8, 4, 12).with_max_lights_per_cluster(32));
        config.save_to_file(&path).unwrap();

        let loaded = LightingConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = LightingConfig::default().save_to_file("lighting.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
