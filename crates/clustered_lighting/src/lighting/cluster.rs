//! Cluster grid and light assignment
//!
//! The view frustum is split into `Nx × Ny` screen tiles and `Nz` depth slices.
//! Slices are spaced logarithmically between the configured near and far
//! bounds so that each slice covers a similar screen-space volume.
//!
//! The grid is a two-state cache. Any change to the light set or the camera
//! moves it to [`ClusterState::Dirty`]; [`ClusterGrid::update`] is the only
//! transition back to [`ClusterState::Clean`].
//!
//! ## Assignment
//!
//! Directional lights land in every cluster. Point, spot and area lights are
//! projected to find a center cluster and then written into the cuboid
//! `[cx ± r] × [cy ± r] × [cz ± 2]`, where `r` is a conservative screen-space
//! estimate of the light's radius padded by one cluster. The estimate is an
//! approximation and may over- or under-cover at cluster boundaries.
//!
//! Each cluster holds at most `max_lights_per_cluster` identities. Assignments
//! past that cap are dropped in registry order and only show up in
//! [`ClusterStats::dropped_assignments`].

use std::ops::RangeInclusive;

use crate::config::{ClusterConfig, ConfigError};
use crate::foundation::collections::LightHandle;
use crate::foundation::math::{utils, Mat4, Mat4Ext, Vec3, Vec4};

use super::light::LightView;
use super::registry::LightRegistry;

/// Depth slices on either side of the center slice that a light touches
const DEPTH_SLICE_SPREAD: i64 = 2;

/// Cache state of the cluster lists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    /// Cluster lists match the current lights and camera
    Clean,
    /// Cluster lists must be recomputed before use
    Dirty,
}

/// Integer coordinate of one cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterCoord {
    /// Screen tile column
    pub x: u32,
    /// Screen tile row
    pub y: u32,
    /// Depth slice
    pub z: u32,
}

impl ClusterCoord {
    /// Create a cluster coordinate
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// Counters from the most recent recompute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClusterStats {
    /// Enabled lights examined
    pub lights_processed: usize,
    /// Light identities written into cluster lists
    pub assignments: usize,
    /// Assignments discarded because the target cluster was full
    pub dropped_assignments: usize,
    /// Lights skipped because they project behind the camera
    pub culled_behind_camera: usize,
}

/// Projected center of a light, before clamping to the grid
struct ProjectedCenter {
    x: i64,
    y: i64,
    z: u32,
    depth: f32,
}

/// Frustum cluster grid with per-cluster light lists
#[derive(Debug)]
pub struct ClusterGrid {
    config: ClusterConfig,
    clusters: Vec<Vec<LightHandle>>,
    state: ClusterState,
    log_depth_ratio: f32,
    last_view: Option<Mat4>,
    last_projection: Option<Mat4>,
    stats: ClusterStats,
    recompute_count: u64,
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
impl ClusterGrid {
    /// Create a grid for the given configuration
    ///
    /// The grid starts dirty with every cluster empty.
    pub fn new(config: ClusterConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let clusters = vec![Vec::new(); config.cluster_count()];
        let log_depth_ratio = (config.far / config.near).ln();

        Ok(Self {
            config,
            clusters,
            state: ClusterState::Dirty,
            log_depth_ratio,
            last_view: None,
            last_projection: None,
            stats: ClusterStats::default(),
            recompute_count: 0,
        })
    }

    /// Grid configuration
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Grid dimensions `[Nx, Ny, Nz]`
    pub fn dimensions(&self) -> [u32; 3] {
        self.config.dimensions
    }

    /// Total number of clusters
    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    /// Per-cluster light cap
    pub fn max_lights_per_cluster(&self) -> u32 {
        self.config.max_lights_per_cluster
    }

    /// Current cache state
    pub fn state(&self) -> ClusterState {
        self.state
    }

    /// Whether the lists need recomputing
    pub fn is_dirty(&self) -> bool {
        self.state == ClusterState::Dirty
    }

    /// Invalidate the cluster lists
    pub fn mark_dirty(&mut self) {
        if self.state == ClusterState::Clean {
            log::trace!("Cluster grid marked dirty");
        }
        self.state = ClusterState::Dirty;
    }

    /// Counters from the most recent recompute
    pub fn stats(&self) -> ClusterStats {
        self.stats
    }

    /// Number of full recomputes performed so far
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    /// Flat index of a cluster, `x + y·Nx + z·Nx·Ny`
    pub fn cluster_index(&self, coord: ClusterCoord) -> Option<usize> {
        let [nx, ny, nz] = self.config.dimensions;
        if coord.x >= nx || coord.y >= ny || coord.z >= nz {
            return None;
        }
        let (nx, ny) = (nx as usize, ny as usize);
        Some(coord.x as usize + coord.y as usize * nx + coord.z as usize * nx * ny)
    }

    /// Coordinate of a flat cluster index
    pub fn cluster_coord(&self, index: usize) -> Option<ClusterCoord> {
        if index >= self.clusters.len() {
            return None;
        }
        let [nx, ny, _] = self.config.dimensions;
        let (nx, ny) = (nx as usize, ny as usize);
        Some(ClusterCoord::new(
            (index % nx) as u32,
            ((index / nx) % ny) as u32,
            (index / (nx * ny)) as u32,
        ))
    }

    /// Light identities assigned to a cluster; empty for out-of-range coordinates
    pub fn lights_in_cluster(&self, coord: ClusterCoord) -> &[LightHandle] {
        self.cluster_index(coord)
            .map_or(&[], |index| self.clusters[index].as_slice())
    }

    /// Every cluster list in flat index order
    pub fn cluster_lists(&self) -> impl Iterator<Item = &[LightHandle]> + '_ {
        self.clusters.iter().map(Vec::as_slice)
    }

    /// Depth slice for a positive view-space depth
    ///
    /// Depths at or before `near` map to slice 0 and depths at or beyond `far`
    /// map to the last slice.
    pub fn depth_slice(&self, depth: f32) -> u32 {
        let nz = self.config.dimensions[2];
        if !(depth > self.config.near) {
            return 0;
        }
        if depth >= self.config.far {
            return nz - 1;
        }

        let t = (depth / self.config.near).ln() / self.log_depth_ratio;
        let slice = (t * nz as f32).floor() as i64;
        utils::clamp_index(slice, nz).unwrap_or(0)
    }

    /// Cluster containing a view-space position, if it is in front of the camera and on screen
    pub fn cluster_for_view_position(&self, view_position: &Vec3, projection: &Mat4) -> Option<ClusterCoord> {
        let center = self.project(&view_position.push(1.0), projection)?;
        let [nx, ny, _] = self.config.dimensions;
        if center.x < 0 || center.y < 0 || center.x >= i64::from(nx) || center.y >= i64::from(ny) {
            return None;
        }
        Some(ClusterCoord::new(center.x as u32, center.y as u32, center.z))
    }

    fn project(&self, view_position: &Vec4, projection: &Mat4) -> Option<ProjectedCenter> {
        let clip = projection * view_position;
        if clip.w <= 0.0 {
            return None;
        }

        let [nx, ny, _] = self.config.dimensions;
        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let depth = -view_position.z;

        Some(ProjectedCenter {
            x: ((ndc_x * 0.5 + 0.5) * nx as f32).floor() as i64,
            y: ((ndc_y * 0.5 + 0.5) * ny as f32).floor() as i64,
            z: self.depth_slice(depth),
            depth,
        })
    }

    /// Recompute cluster lists if the grid is dirty or the camera moved
    ///
    /// Returns whether a recompute happened.
    pub fn update(&mut self, view: &Mat4, projection: &Mat4, registry: &LightRegistry) -> bool {
        if self.last_view.as_ref() != Some(view) || self.last_projection.as_ref() != Some(projection) {
            self.mark_dirty();
        }

        if self.state == ClusterState::Clean {
            return false;
        }

        for cluster in &mut self.clusters {
            cluster.clear();
        }
        self.stats = ClusterStats::default();

        for (handle, light) in registry.iter() {
            if !light.is_enabled() {
                continue;
            }
            self.stats.lights_processed += 1;

            if light.light_type().is_directional() {
                for index in 0..self.clusters.len() {
                    self.push(index, handle);
                }
            } else {
                self.assign_local_light(handle, light, view, projection);
            }
        }

        self.last_view = Some(*view);
        self.last_projection = Some(*projection);
        self.state = ClusterState::Clean;
        self.recompute_count += 1;

        log::trace!(
            "Clustered {} lights: {} assignments, {} dropped, {} behind camera",
            self.stats.lights_processed,
            self.stats.assignments,
            self.stats.dropped_assignments,
            self.stats.culled_behind_camera
        );
        if self.stats.dropped_assignments > 0 {
            log::debug!(
                "{} light assignments dropped (cluster cap {})",
                self.stats.dropped_assignments,
                self.config.max_lights_per_cluster
            );
        }

        true
    }

    fn assign_local_light(&mut self, handle: LightHandle, light: &dyn LightView, view: &Mat4, projection: &Mat4) {
        let view_position = view.transform_position(&light.position());
        let Some(center) = self.project(&view_position, projection) else {
            self.stats.culled_behind_camera += 1;
            return;
        };

        let [nx, ny, nz] = self.config.dimensions;
        let screen_radius = (light.range() / center.depth.max(f32::MIN_POSITIVE)) * nx as f32 * 0.5;
        let cluster_radius = (screen_radius.ceil() as i64).saturating_add(1);

        let (Some(xs), Some(ys), Some(zs)) = (
            span(center.x, cluster_radius, nx),
            span(center.y, cluster_radius, ny),
            span(i64::from(center.z), DEPTH_SLICE_SPREAD, nz),
        ) else {
            return;
        };

        for z in zs {
            for y in ys.clone() {
                for x in xs.clone() {
                    if let Some(index) = self.cluster_index(ClusterCoord::new(x, y, z)) {
                        self.push(index, handle);
                    }
                }
            }
        }
    }

    fn push(&mut self, index: usize, handle: LightHandle) {
        let cluster = &mut self.clusters[index];
        if cluster.len() < self.config.max_lights_per_cluster as usize {
            cluster.push(handle);
            self.stats.assignments += 1;
        } else {
            self.stats.dropped_assignments += 1;
        }
    }

    /// Empty every cluster and forget the last camera
    pub(crate) fn reset(&mut self) {
        for cluster in &mut self.clusters {
            cluster.clear();
        }
        self.last_view = None;
        self.last_projection = None;
        self.stats = ClusterStats::default();
        self.state = ClusterState::Dirty;
    }
}

/// Inclusive index range `[center ± radius]` clipped to `[0, count)`
fn span(center: i64, radius: i64, count: u32) -> Option<RangeInclusive<u32>> {
    let low = center.saturating_sub(radius);
    let high = center.saturating_add(radius);
    if high < 0 || low >= i64::from(count) {
        return None;
    }
    Some(utils::clamp_index(low, count)?..=utils::clamp_index(high, count)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::utils::deg_to_rad;
    use crate::lighting::light::{Light, LightType};

    fn projection() -> Mat4 {
        Mat4::perspective(deg_to_rad(60.0), 16.0 / 9.0, 0.1, 1000.0)
    }

    fn white() -> Vec3 {
        Vec3::new(1.0, 1.0, 1.0)
    }

    #[test]
    fn test_new_grid_is_dirty_and_empty() {
        let grid = ClusterGrid::new(ClusterConfig::default()).unwrap();
        assert_eq!(grid.state(), ClusterState::Dirty);
        assert_eq!(grid.cluster_count(), 3072);
        assert!(grid.cluster_lists().all(<[LightHandle]>::is_empty));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(ClusterGrid::new(ClusterConfig::new(0, 8, 24)).is_err());
    }

    #[test]
    fn test_index_coord_round_trip() {
        let grid = ClusterGrid::new(ClusterConfig::new(4, 3, 2)).unwrap();
        let coord = ClusterCoord::new(3, 1, 1);
        let index = grid.cluster_index(coord).unwrap();

        assert_eq!(index, 3 + 4 + 12);
        assert_eq!(grid.cluster_coord(index), Some(coord));
        assert_eq!(grid.cluster_index(ClusterCoord::new(4, 0, 0)), None);
        assert_eq!(grid.cluster_coord(24), None);
    }

    #[test]
    fn test_depth_slices() {
        let grid = ClusterGrid::new(ClusterConfig::default()).unwrap();

        assert_eq!(grid.depth_slice(0.05), 0);
        assert_eq!(grid.depth_slice(0.1), 0);
        assert_eq!(grid.depth_slice(-3.0), 0);
        assert_eq!(grid.depth_slice(1000.0), 23);
        assert_eq!(grid.depth_slice(5000.0), 23);
        // ln(500) / ln(10000) * 24 = 16.19
        assert_eq!(grid.depth_slice(50.0), 16);
    }

    #[test]
    fn test_update_is_noop_when_clean() {
        let mut grid = ClusterGrid::new(ClusterConfig::default()).unwrap();
        let registry = LightRegistry::new(4);
        let view = Mat4::identity();

        assert!(grid.update(&view, &projection(), &registry));
        assert_eq!(grid.state(), ClusterState::Clean);
        assert!(!grid.update(&view, &projection(), &registry));
        assert_eq!(grid.recompute_count(), 1);

        grid.mark_dirty();
        assert!(grid.update(&view, &projection(), &registry));
        assert_eq!(grid.recompute_count(), 2);
    }

    #[test]
    fn test_camera_change_triggers_recompute() {
        let mut grid = ClusterGrid::new(ClusterConfig::default()).unwrap();
        let registry = LightRegistry::new(4);

        grid.update(&Mat4::identity(), &projection(), &registry);
        let moved = Mat4::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::zeros(), Vec3::new(0.0, 1.0, 0.0));
        assert!(grid.update(&moved, &projection(), &registry));
    }

    #[test]
    fn test_directional_light_fills_every_cluster() {
        let mut grid = ClusterGrid::new(ClusterConfig::new(4, 4, 4)).unwrap();
        let mut registry = LightRegistry::new(4);
        let sun = registry
            .add_light(Light::directional(Vec3::new(0.0, -1.0, 0.0), white(), 1.0))
            .unwrap();

        grid.update(&Mat4::identity(), &projection(), &registry);

        assert!(grid.cluster_lists().all(|list| list == [sun]));
        assert_eq!(grid.stats().assignments, 64);
    }

    #[test]
    fn test_disabled_lights_are_ignored() {
        let mut grid = ClusterGrid::new(ClusterConfig::new(4, 4, 4)).unwrap();
        let mut registry = LightRegistry::new(4);
        registry
            .add_light(Light::directional(Vec3::new(0.0, -1.0, 0.0), white(), 1.0).with_enabled(false))
            .unwrap();

        grid.update(&Mat4::identity(), &projection(), &registry);
        assert!(grid.cluster_lists().all(<[LightHandle]>::is_empty));
        assert_eq!(grid.stats().lights_processed, 0);
    }

    #[test]
    fn test_light_behind_camera_is_skipped() {
        let mut grid = ClusterGrid::new(ClusterConfig::default()).unwrap();
        let mut registry = LightRegistry::new(4);
        registry
            .add_light(Light::point(Vec3::new(0.0, 0.0, 20.0), white(), 1.0, 5.0))
            .unwrap();

        grid.update(&Mat4::identity(), &projection(), &registry);

        assert!(grid.cluster_lists().all(<[LightHandle]>::is_empty));
        assert_eq!(grid.stats().culled_behind_camera, 1);
    }

    #[test]
    fn test_overflow_drops_newest_assignments() {
        let config = ClusterConfig::new(2, 2, 2).with_max_lights_per_cluster(2);
        let mut grid = ClusterGrid::new(config).unwrap();
        let mut registry = LightRegistry::new(8);
        let handles: Vec<_> = (0..3)
            .map(|_| registry.create_light(LightType::Directional).unwrap())
            .collect();

        grid.update(&Mat4::identity(), &projection(), &registry);

        for list in grid.cluster_lists() {
            assert_eq!(list.len(), 2);
            assert!(!list.contains(&handles[2]));
        }
        assert_eq!(grid.stats().dropped_assignments, 8);
    }

    #[test]
    fn test_off_screen_light_near_edge_still_reaches_border_clusters() {
        let mut grid = ClusterGrid::new(ClusterConfig::default()).unwrap();
        let mut registry = LightRegistry::new(4);

        // Just beyond the right edge of the frustum at depth 50
        let half_width = 50.0 * (deg_to_rad(30.0)).tan() * 16.0 / 9.0;
        let handle = registry
            .add_light(Light::point(Vec3::new(half_width * 1.05, 0.0, -50.0), white(), 1.0, 5.0))
            .unwrap();

        grid.update(&Mat4::identity(), &projection(), &registry);

        assert!(!grid.lights_in_cluster(ClusterCoord::new(15, 4, 16)).is_empty());
        assert!(grid.lights_in_cluster(ClusterCoord::new(15, 4, 16)).contains(&handle));
        assert!(grid.lights_in_cluster(ClusterCoord::new(0, 4, 16)).is_empty());
    }

    #[test]
    fn test_cluster_for_view_position() {
        let grid = ClusterGrid::new(ClusterConfig::default()).unwrap();

        let coord = grid.cluster_for_view_position(&Vec3::new(0.0, 0.0, -50.0), &projection());
        assert_eq!(coord, Some(ClusterCoord::new(8, 4, 16)));
        assert_eq!(grid.cluster_for_view_position(&Vec3::new(0.0, 0.0, 50.0), &projection()), None);
    }

    #[test]
    fn test_span_clipping() {
        assert_eq!(span(8, 2, 16), Some(6..=10));
        assert_eq!(span(-1, 2, 16), Some(0..=1));
        assert_eq!(span(-5, 2, 16), None);
        assert_eq!(span(20, 2, 16), None);
        assert_eq!(span(3, i64::MAX, 16), Some(0..=15));
    }
}
