//! Clustered dynamic lighting
//!
//! Light ownership, frustum clustering, sun/moon switching and fog state for
//! one scene. [`LightingSystem`] is the entry point; the pieces it is built
//! from are public for renderers that want to drive them directly.

pub mod cluster;
pub mod day_night;
pub mod fog;
pub mod gpu;
pub mod light;
pub mod registry;

mod error;
mod system;

pub use cluster::{ClusterCoord, ClusterGrid, ClusterState, ClusterStats};
pub use day_night::{AreaLightingData, DayNightLightController, PackedColor};
pub use error::LightingError;
pub use fog::{FogMode, FogSettings};
pub use gpu::{ClusterRange, GpuLight, LightDataSink, LightFlags, LightFrameData, LightingHeader};
pub use light::{GpuResource, Light, LightType, LightView, ResourceReleaser, ShadowSettings};
pub use registry::LightRegistry;
pub use system::LightingSystem;
