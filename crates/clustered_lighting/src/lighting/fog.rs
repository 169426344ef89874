//! Fog state
//!
//! Plain parameters for the fog renderer. Nothing here is validated; callers
//! own the meaning of the values.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;

/// Fog falloff model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FogMode {
    /// Linear ramp between `start` and `end`
    Linear,
    /// Exponential falloff driven by `density`
    Exponential,
}

/// Atmospheric fog parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FogSettings {
    /// Whether fog is rendered
    pub enabled: bool,
    /// Falloff model
    pub mode: FogMode,
    /// Linear RGB fog color
    pub color: Vec3,
    /// Density for exponential fog
    pub density: f32,
    /// Distance where linear fog begins
    pub start: f32,
    /// Distance where linear fog is fully opaque
    pub end: f32,
    /// Whether fog thickens toward the ground
    pub height_fog: bool,
    /// Whether the renderer should raymarch volumetric fog
    pub volumetric: bool,
}

impl FogSettings {
    /// Linear fog between two distances
    pub fn linear(color: Vec3, start: f32, end: f32) -> Self {
        Self {
            enabled: true,
            mode: FogMode::Linear,
            color,
            start,
            end,
            ..Self::default()
        }
    }

    /// Exponential fog with the given density
    pub fn exponential(color: Vec3, density: f32) -> Self {
        Self {
            enabled: true,
            mode: FogMode::Exponential,
            color,
            density,
            ..Self::default()
        }
    }
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: FogMode::Linear,
            color: Vec3::new(0.5, 0.5, 0.5),
            density: 0.01,
            start: 10.0,
            end: 100.0,
            height_fog: false,
            volumetric: false,
        }
    }
}
