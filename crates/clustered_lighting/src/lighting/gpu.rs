//! GPU-layout light data and the submission seam
//!
//! [`LightFrameData`] is the per-frame package handed to the renderer: a header,
//! a packed array of enabled lights, one `(offset, count)` range per cluster and
//! a flat list of indices into the light array. Every record is `#[repr(C)]`
//! with 16-byte aligned rows so a backend can copy it straight into std430
//! storage buffers.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use slotmap::SecondaryMap;

use crate::foundation::collections::LightHandle;
use crate::foundation::math::Vec3;

use super::cluster::ClusterGrid;
use super::fog::{FogMode, FogSettings};
use super::light::{Light, LightType};
use super::registry::LightRegistry;

/// Marker for "no primary directional light" in [`LightingHeader::primary_light_index`]
pub const NO_PRIMARY_LIGHT: u32 = u32::MAX;

bitflags! {
    /// Per-light shader flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LightFlags: u32 {
        /// Directional light
        const DIRECTIONAL = 1 << 0;
        /// Point light
        const POINT = 1 << 1;
        /// Spot light
        const SPOT = 1 << 2;
        /// Area light
        const AREA = 1 << 3;
        /// Light samples a shadow map
        const CASTS_SHADOWS = 1 << 4;
        /// Light is the primary directional light
        const PRIMARY = 1 << 5;
    }
}

impl From<LightType> for LightFlags {
    fn from(light_type: LightType) -> Self {
        match light_type {
            LightType::Directional => Self::DIRECTIONAL,
            LightType::Point => Self::POINT,
            LightType::Spot => Self::SPOT,
            LightType::Area => Self::AREA,
        }
    }
}

bitflags! {
    /// Fog shader flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FogFlags: u32 {
        /// Fog is rendered
        const ENABLED = 1 << 0;
        /// Exponential falloff instead of linear
        const EXPONENTIAL = 1 << 1;
        /// Height fog
        const HEIGHT = 1 << 2;
        /// Volumetric fog
        const VOLUMETRIC = 1 << 3;
    }
}

impl From<&FogSettings> for FogFlags {
    fn from(fog: &FogSettings) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::ENABLED, fog.enabled);
        flags.set(Self::EXPONENTIAL, fog.mode == FogMode::Exponential);
        flags.set(Self::HEIGHT, fog.height_fog);
        flags.set(Self::VOLUMETRIC, fog.volumetric);
        flags
    }
}

/// One light in the GPU light array
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    /// Light position and range [x, y, z, range]
    pub position: [f32; 4],
    /// Light direction and intensity [x, y, z, intensity]
    pub direction: [f32; 4],
    /// Light color and shadow softness [r, g, b, softness]
    pub color: [f32; 4],
    /// Cone angles and shadow biases [inner, outer, depth_bias, normal_bias]
    pub cone_and_bias: [f32; 4],
    /// [`LightFlags`] bits
    pub flags: u32,
    /// Shadow map resolution in texels
    pub shadow_resolution: u32,
    /// Padding for 16-byte alignment
    pub _padding: [u32; 2],
}

impl GpuLight {
    fn from_light(light: &Light, flags: LightFlags) -> Self {
        let position = light.position;
        let direction = light.direction;
        let color = light.color;
        let shadow = &light.shadow;
        Self {
            position: [position.x, position.y, position.z, light.range],
            direction: [direction.x, direction.y, direction.z, light.intensity],
            color: [color.x, color.y, color.z, shadow.softness],
            cone_and_bias: [light.inner_cone_angle, light.outer_cone_angle, shadow.depth_bias, shadow.normal_bias],
            flags: flags.bits(),
            shadow_resolution: shadow.resolution,
            _padding: [0; 2],
        }
    }
}

/// Slice of [`LightFrameData::cluster_light_indices`] belonging to one cluster
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ClusterRange {
    /// First index in the flat index list
    pub offset: u32,
    /// Number of indices
    pub count: u32,
}

/// Frame-global lighting constants
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightingHeader {
    /// Ambient light color and shadow opacity [r, g, b, shadow_opacity]
    pub ambient_color: [f32; 4],
    /// Fog color and density [r, g, b, density]
    pub fog_color: [f32; 4],
    /// Fog distances [start, end, unused, unused]
    pub fog_range: [f32; 4],
    /// Cluster grid [Nx, Ny, Nz, max_lights_per_cluster]
    pub cluster_dimensions: [u32; 4],
    /// Depth slicing and GI [near, far, gi_intensity, unused]
    pub depth_range: [f32; 4],
    /// Number of entries in the light array
    pub light_count: u32,
    /// Index of the primary directional light, or [`NO_PRIMARY_LIGHT`]
    pub primary_light_index: u32,
    /// Number of entries in the flat cluster index list
    pub cluster_index_count: u32,
    /// [`FogFlags`] bits
    pub fog_flags: u32,
}

/// Frame-global inputs that do not live in the registry or the grid
#[derive(Debug, Clone)]
pub struct FrameEnvironment<'a> {
    /// Ambient light color
    pub ambient_color: Vec3,
    /// Shadow opacity in `[0, 1]`
    pub shadow_opacity: f32,
    /// Current fog
    pub fog: &'a FogSettings,
    /// Global illumination probe intensity
    pub gi_intensity: f32,
}

/// Everything the renderer needs to shade one frame
#[derive(Debug, Clone, PartialEq)]
pub struct LightFrameData {
    /// Frame-global constants
    pub header: LightingHeader,
    /// Enabled lights in registry order
    pub lights: Vec<GpuLight>,
    /// Handle of each entry in `lights`
    pub light_handles: Vec<LightHandle>,
    /// One range per cluster, in flat cluster index order
    pub cluster_ranges: Vec<ClusterRange>,
    /// Indices into `lights`, grouped per cluster
    pub cluster_light_indices: Vec<u32>,
}

#[allow(clippy::cast_possible_truncation)]
impl LightFrameData {
    /// Pack the registry and the current cluster lists
    ///
    /// Cluster entries whose light has since been removed or disabled are
    /// skipped, so a stale grid never references a missing light.
    pub fn build(registry: &LightRegistry, grid: &ClusterGrid, environment: &FrameEnvironment<'_>) -> Self {
        let primary = registry.primary_directional_handle();
        let mut lights = Vec::new();
        let mut light_handles = Vec::new();
        let mut light_indices: SecondaryMap<LightHandle, u32> = SecondaryMap::new();
        let mut primary_light_index = NO_PRIMARY_LIGHT;

        for (handle, light) in registry.lights() {
            if !light.enabled {
                continue;
            }

            let mut flags = LightFlags::from(light.light_type);
            flags.set(LightFlags::CASTS_SHADOWS, light.shadow.cast_shadows);
            if primary == Some(handle) {
                flags.insert(LightFlags::PRIMARY);
                primary_light_index = lights.len() as u32;
            }

            light_indices.insert(handle, lights.len() as u32);
            lights.push(GpuLight::from_light(light, flags));
            light_handles.push(handle);
        }

        let mut cluster_ranges = Vec::with_capacity(grid.cluster_count());
        let mut cluster_light_indices = Vec::new();
        for list in grid.cluster_lists() {
            let offset = cluster_light_indices.len() as u32;
            cluster_light_indices.extend(list.iter().filter_map(|handle| light_indices.get(*handle).copied()));
            cluster_ranges.push(ClusterRange {
                offset,
                count: cluster_light_indices.len() as u32 - offset,
            });
        }

        let [nx, ny, nz] = grid.dimensions();
        let cluster = grid.config();
        let fog = environment.fog;
        let ambient = environment.ambient_color;

        let header = LightingHeader {
            ambient_color: [ambient.x, ambient.y, ambient.z, environment.shadow_opacity],
            fog_color: [fog.color.x, fog.color.y, fog.color.z, fog.density],
            fog_range: [fog.start, fog.end, 0.0, 0.0],
            cluster_dimensions: [nx, ny, nz, cluster.max_lights_per_cluster],
            depth_range: [cluster.near, cluster.far, environment.gi_intensity, 0.0],
            light_count: lights.len() as u32,
            primary_light_index,
            cluster_index_count: cluster_light_indices.len() as u32,
            fog_flags: FogFlags::from(fog).bits(),
        };

        Self {
            header,
            lights,
            light_handles,
            cluster_ranges,
            cluster_light_indices,
        }
    }

    /// Light indices for one flat cluster index
    pub fn cluster_lights(&self, cluster_index: usize) -> &[u32] {
        self.cluster_ranges.get(cluster_index).map_or(&[], |range| {
            let start = range.offset as usize;
            &self.cluster_light_indices[start..start + range.count as usize]
        })
    }

    /// Header as raw bytes
    pub fn header_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.header)
    }

    /// Light array as raw bytes
    pub fn light_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.lights)
    }

    /// Cluster ranges as raw bytes
    pub fn cluster_range_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.cluster_ranges)
    }

    /// Cluster index list as raw bytes
    pub fn cluster_index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.cluster_light_indices)
    }
}

/// Receiver of per-frame light data, implemented by the rendering collaborator
pub trait LightDataSink {
    /// Take this frame's light data; upload is the sink's business
    fn submit(&mut self, frame: &LightFrameData);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_records_are_16_byte_rows() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 80);
        assert_eq!(std::mem::size_of::<LightingHeader>(), 96);
        assert_eq!(std::mem::size_of::<ClusterRange>(), 8);
    }

    #[test]
    fn test_light_flags_from_type() {
        assert_eq!(LightFlags::from(LightType::Spot), LightFlags::SPOT);
        assert_eq!(LightFlags::from(LightType::Directional).bits(), 1);
    }

    #[test]
    fn test_fog_flags() {
        let mut fog = FogSettings::exponential(Vec3::new(0.2, 0.2, 0.3), 0.05);
        fog.volumetric = true;

        let flags = FogFlags::from(&fog);
        assert!(flags.contains(FogFlags::ENABLED | FogFlags::EXPONENTIAL | FogFlags::VOLUMETRIC));
        assert!(!flags.contains(FogFlags::HEIGHT));
        assert_eq!(FogFlags::from(&FogSettings::default()), FogFlags::empty());
    }
}
