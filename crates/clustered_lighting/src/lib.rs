//! # Clustered Lighting
//!
//! Dynamic light management and clustered light culling for real-time 3D
//! renderers.
//!
//! ## Features
//!
//! - **Light Registry**: Generational handles, capacity limits, point queries
//! - **Clustered Culling**: Screen tiles × logarithmic depth slices with capped per-cluster lists
//! - **Lazy Recompute**: Cluster lists rebuild only when lights or the camera change
//! - **Day/Night**: Permanent sun and moon with a single primary directional light
//! - **GPU Layout**: `bytemuck`-ready light, cluster and header records
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clustered_lighting::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut lighting = LightingSystem::new(LightingConfig::default())?;
//!     lighting.add_light(Light::point(
//!         Vec3::new(0.0, 2.0, -10.0),
//!         Vec3::new(1.0, 0.8, 0.6),
//!         2.0,
//!         8.0,
//!     ))?;
//!
//!     let view = Mat4::look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::zeros(), Vec3::y());
//!     let projection = Mat4::perspective(1.0, 16.0 / 9.0, 0.1, 1000.0);
//!     lighting.update_clustering(&view, &projection);
//!
//!     let frame = lighting.frame_data();
//!     println!("{} lights, {} cluster entries", frame.lights.len(), frame.cluster_light_indices.len());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod lighting;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        config::{ClusterConfig, Config, ConfigError, ConfigFormat, LightingConfig},
        foundation::{
            collections::LightHandle,
            math::{Mat4, Mat4Ext, Vec3},
        },
        lighting::{
            AreaLightingData, ClusterCoord, FogMode, FogSettings, GpuResource, Light,
            LightDataSink, LightFrameData, LightType, LightView, LightingError, LightingSystem,
            PackedColor, ShadowSettings,
        },
    };
}
