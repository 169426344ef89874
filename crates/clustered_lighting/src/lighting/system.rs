//! Lighting system facade
//!
//! [`LightingSystem`] is what an area owns. It wires the registry, the cluster
//! grid and the day/night controller together so that every mutation of the
//! light set reaches the grid as a dirty transition.
//!
//! Per frame the renderer calls [`LightingSystem::update_clustering`] with the
//! camera matrices and then [`LightingSystem::submit_light_data`].

use crate::config::{ConfigError, LightingConfig};
use crate::foundation::collections::LightHandle;
use crate::foundation::math::{Mat4, Vec3};

use super::cluster::ClusterGrid;
use super::day_night::{AreaLightingData, DayNightLightController};
use super::error::LightingError;
use super::fog::FogSettings;
use super::gpu::{FrameEnvironment, LightDataSink, LightFrameData};
use super::light::{GpuResource, Light, LightType, LightView, ResourceReleaser};
use super::registry::LightRegistry;

/// Scene-wide owner of lights, clusters, fog and GI probe state
pub struct LightingSystem {
    config: LightingConfig,
    registry: LightRegistry,
    clusters: ClusterGrid,
    day_night: DayNightLightController,
    fog: FogSettings,
    gi_probe: Option<GpuResource>,
    gi_intensity: f32,
    releaser: Box<dyn ResourceReleaser>,
    disposed: bool,
}

impl LightingSystem {
    /// Create a lighting system for one area
    pub fn new(config: LightingConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        log::info!(
            "Creating lighting system: {} max lights, {:?} clusters, {} lights per cluster",
            config.max_lights,
            config.cluster.dimensions,
            config.cluster.max_lights_per_cluster
        );

        Ok(Self {
            registry: LightRegistry::new(config.max_lights),
            clusters: ClusterGrid::new(config.cluster.clone())?,
            day_night: DayNightLightController::new(config.default_shadow_resolution),
            fog: FogSettings::default(),
            gi_probe: None,
            gi_intensity: 0.0,
            releaser: Box::new(|resource: GpuResource| {
                log::trace!("Dropping GPU resource {:?}, no releaser installed", resource);
            }),
            disposed: false,
            config,
        })
    }

    /// Install the graphics collaborator's release hook
    pub fn with_releaser(mut self, releaser: impl ResourceReleaser + 'static) -> Self {
        self.releaser = Box::new(releaser);
        self
    }

    /// Configuration this system was built with
    pub fn config(&self) -> &LightingConfig {
        &self.config
    }

    /// Read access to the light registry
    pub fn registry(&self) -> &LightRegistry {
        &self.registry
    }

    /// Read access to the cluster grid
    pub fn cluster_grid(&self) -> &ClusterGrid {
        &self.clusters
    }

    /// Read access to the sun/moon controller
    pub fn day_night(&self) -> &DayNightLightController {
        &self.day_night
    }

    /// Whether [`dispose`](Self::dispose) has run
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ------------------------------------------------------------------
    // Light lifecycle
    // ------------------------------------------------------------------

    /// Create a default light of the given type
    pub fn create_light(&mut self, light_type: LightType) -> Result<LightHandle, LightingError> {
        self.ensure_live()?;
        let handle = self.registry.create_light(light_type)?;
        self.clusters.mark_dirty();
        Ok(handle)
    }

    /// Hand an externally built light to the registry
    ///
    /// Re-adding a light the registry already owns returns its handle and
    /// leaves the clusters untouched.
    pub fn add_light(&mut self, light: Light) -> Result<LightHandle, LightingError> {
        self.ensure_live()?;
        let count = self.registry.len();
        let handle = self.registry.add_light(light)?;
        if self.registry.len() != count {
            self.clusters.mark_dirty();
        }
        Ok(handle)
    }

    /// Remove a light and release its shadow map
    ///
    /// Unknown handles, and the permanent sun and moon, are left alone.
    /// Returns whether a light was removed.
    pub fn remove_light(&mut self, handle: LightHandle) -> bool {
        if self.day_night.is_reserved(handle) {
            log::warn!("Ignoring removal of permanent directional light {:?}", handle);
            return false;
        }

        let Some(mut light) = self.registry.remove_light(handle) else {
            return false;
        };
        if let Some(shadow_map) = light.replace_shadow_map(None) {
            self.releaser.release(shadow_map);
        }
        self.clusters.mark_dirty();
        true
    }

    /// Read-only view of one light
    pub fn get_light(&self, handle: LightHandle) -> Option<&dyn LightView> {
        self.registry.get(handle)
    }

    /// Mutate a light through the registry; the clusters are invalidated
    ///
    /// The sun and moon stay directional whatever the closure does.
    pub fn update_light<R>(&mut self, handle: LightHandle, f: impl FnOnce(&mut Light) -> R) -> Option<R> {
        let reserved = self.day_night.is_reserved(handle);
        let result = self.registry.update_light(handle, |light| {
            let result = f(light);
            if reserved && !light.light_type.is_directional() {
                log::warn!(
                    "Ignoring {:?} type change of permanent directional light {:?}",
                    light.light_type,
                    handle
                );
                light.light_type = LightType::Directional;
            }
            result
        })?;
        self.clusters.mark_dirty();
        Some(result)
    }

    /// Toggle a light; returns whether its flag changed
    pub fn set_light_enabled(&mut self, handle: LightHandle, enabled: bool) -> bool {
        let changed = self.get_light(handle).is_some_and(|light| light.is_enabled() != enabled);
        if changed {
            self.update_light(handle, |light| light.enabled = enabled);
        }
        changed
    }

    /// Attach (or detach with `None`) a shadow map token to a light
    ///
    /// A token being replaced is released. Returns whether the light exists;
    /// when it does not, the caller keeps ownership of `shadow_map`.
    pub fn attach_shadow_map(&mut self, handle: LightHandle, shadow_map: Option<GpuResource>) -> bool {
        let Some(light) = self.registry.light_mut(handle) else {
            return false;
        };
        if let Some(previous) = light.replace_shadow_map(shadow_map) {
            if Some(previous) != shadow_map {
                self.releaser.release(previous);
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Snapshot of enabled lights
    pub fn active_lights(&self) -> Vec<&dyn LightView> {
        self.registry.active_lights()
    }

    /// Number of enabled lights
    pub fn active_light_count(&self) -> usize {
        self.registry.active_light_count()
    }

    /// Number of owned lights, enabled or not
    pub fn light_count(&self) -> usize {
        self.registry.len()
    }

    /// Enabled lights that can influence a sphere at `position`
    pub fn lights_affecting_point(&self, position: &Vec3, radius: f32) -> Vec<&dyn LightView> {
        self.registry.lights_affecting_point(position, radius)
    }

    /// Override the primary directional light
    pub fn set_primary_directional_light(&mut self, handle: Option<LightHandle>) -> bool {
        self.registry.set_primary_directional_light(handle)
    }

    /// The primary directional light, if any
    pub fn primary_directional_light(&self) -> Option<&dyn LightView> {
        self.registry.primary_directional_light()
    }

    /// Handle of the primary directional light, if any
    pub fn primary_directional_handle(&self) -> Option<LightHandle> {
        self.registry.primary_directional_handle()
    }

    // ------------------------------------------------------------------
    // Area state
    // ------------------------------------------------------------------

    /// Apply the area's sun, moon, ambient and fog parameters
    pub fn initialize_from_area_data(&mut self, area: &AreaLightingData) -> Result<(), LightingError> {
        self.ensure_live()?;
        let result = self.day_night.initialize_from_area_data(&mut self.registry, area);
        // A failed init may still have created the sun
        self.clusters.mark_dirty();
        result?;

        self.fog = area.fog_settings();
        Ok(())
    }

    /// Switch between day and night
    pub fn set_night(&mut self, is_night: bool) -> bool {
        let changed = self.day_night.set_night(&mut self.registry, is_night);
        if changed {
            self.clusters.mark_dirty();
        }
        changed
    }

    /// Current fog
    pub fn fog(&self) -> &FogSettings {
        &self.fog
    }

    /// Replace the fog
    pub fn set_fog(&mut self, fog: FogSettings) {
        self.fog = fog;
    }

    /// Set the GI probe token and its intensity
    ///
    /// A different probe being replaced is released. After
    /// [`dispose`](Self::dispose) the incoming probe is released straight away.
    pub fn set_global_illumination_probe(&mut self, probe: Option<GpuResource>, intensity: f32) {
        if self.disposed {
            if let Some(probe) = probe {
                log::warn!("Lighting system disposed, releasing GI probe {:?}", probe);
                self.releaser.release(probe);
            }
            return;
        }
        if let Some(previous) = self.gi_probe {
            if Some(previous) != probe {
                self.releaser.release(previous);
            }
        }
        self.gi_probe = probe;
        self.gi_intensity = intensity;
    }

    /// Current GI probe token
    pub fn global_illumination_probe(&self) -> Option<GpuResource> {
        self.gi_probe
    }

    /// Current GI probe intensity
    pub fn global_illumination_intensity(&self) -> f32 {
        self.gi_intensity
    }

    // ------------------------------------------------------------------
    // Per-frame
    // ------------------------------------------------------------------

    /// Recompute cluster lists if anything changed; returns whether work was done
    pub fn update_clustering(&mut self, view: &Mat4, projection: &Mat4) -> bool {
        if self.disposed {
            return false;
        }
        self.clusters.update(view, projection, &self.registry)
    }

    /// Pack the current light and cluster data
    pub fn frame_data(&self) -> LightFrameData {
        let environment = FrameEnvironment {
            ambient_color: self.day_night.ambient_color(),
            shadow_opacity: self.day_night.shadow_opacity(),
            fog: &self.fog,
            gi_intensity: self.gi_intensity,
        };
        LightFrameData::build(&self.registry, &self.clusters, &environment)
    }

    /// Push this frame's light data to the renderer
    pub fn submit_light_data(&self, sink: &mut dyn LightDataSink) {
        if self.disposed {
            return;
        }
        if self.clusters.is_dirty() {
            log::debug!("Submitting light data from a dirty cluster grid");
        }
        sink.submit(&self.frame_data());
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Release every light and GPU token; safe to call repeatedly
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }

        let lights = self.registry.drain();
        let released_lights = lights.len();
        for mut light in lights {
            if let Some(shadow_map) = light.replace_shadow_map(None) {
                self.releaser.release(shadow_map);
            }
        }
        if let Some(probe) = self.gi_probe.take() {
            self.releaser.release(probe);
        }

        self.clusters.reset();
        self.day_night.reset();
        self.disposed = true;
        log::info!("Lighting system disposed, released {} lights", released_lights);
    }

    fn ensure_live(&self) -> Result<(), LightingError> {
        if self.disposed {
            return Err(LightingError::Disposed);
        }
        Ok(())
    }
}

impl Drop for LightingSystem {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::cluster::ClusterState;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording_system() -> (LightingSystem, Rc<RefCell<Vec<u64>>>) {
        let released = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&released);
        let system = LightingSystem::new(LightingConfig::default())
            .unwrap()
            .with_releaser(move |resource: GpuResource| sink.borrow_mut().push(resource.raw()));
        (system, released)
    }

    fn clean(system: &mut LightingSystem) {
        system.update_clustering(&Mat4::identity(), &Mat4::identity());
        assert_eq!(system.cluster_grid().state(), ClusterState::Clean);
    }

    #[test]
    fn test_every_mutation_marks_dirty() {
        let (mut system, _) = recording_system();

        clean(&mut system);
        let handle = system.create_light(LightType::Point).unwrap();
        assert!(system.cluster_grid().is_dirty());

        clean(&mut system);
        assert!(system.set_light_enabled(handle, false));
        assert!(system.cluster_grid().is_dirty());

        clean(&mut system);
        assert!(!system.set_light_enabled(handle, false));
        assert!(!system.cluster_grid().is_dirty());

        clean(&mut system);
        system.update_light(handle, |light| light.range = 20.0);
        assert!(system.cluster_grid().is_dirty());

        clean(&mut system);
        assert!(system.remove_light(handle));
        assert!(system.cluster_grid().is_dirty());

        clean(&mut system);
        assert!(!system.remove_light(handle));
        assert!(!system.cluster_grid().is_dirty());
    }

    #[test]
    fn test_duplicate_add_keeps_grid_clean() {
        let (mut system, _) = recording_system();
        let handle = system
            .add_light(Light::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0, 3.0))
            .unwrap();
        clean(&mut system);

        let copy = system.registry().lights().find(|(h, _)| *h == handle).unwrap().1.clone();
        assert_eq!(system.add_light(copy), Ok(handle));
        assert!(!system.cluster_grid().is_dirty());
        assert_eq!(system.light_count(), 1);
    }

    #[test]
    fn test_sun_and_moon_cannot_be_removed() {
        let (mut system, _) = recording_system();
        system.initialize_from_area_data(&AreaLightingData::default()).unwrap();

        let sun = system.day_night().sun().unwrap();
        assert!(!system.remove_light(sun));
        assert!(system.get_light(sun).is_some());
    }

    #[test]
    fn test_remove_releases_shadow_map() {
        let (mut system, released) = recording_system();
        let handle = system.create_light(LightType::Spot).unwrap();

        assert!(system.attach_shadow_map(handle, Some(GpuResource::new(1))));
        assert!(system.attach_shadow_map(handle, Some(GpuResource::new(2))));
        assert_eq!(*released.borrow(), vec![1]);

        system.remove_light(handle);
        assert_eq!(*released.borrow(), vec![1, 2]);
        assert!(!system.attach_shadow_map(handle, Some(GpuResource::new(3))));
    }

    #[test]
    fn test_gi_probe_replacement_releases_previous() {
        let (mut system, released) = recording_system();
        system.set_global_illumination_probe(Some(GpuResource::new(10)), 0.5);
        system.set_global_illumination_probe(Some(GpuResource::new(10)), 0.8);
        assert!(released.borrow().is_empty());

        system.set_global_illumination_probe(Some(GpuResource::new(11)), 1.0);
        assert_eq!(*released.borrow(), vec![10]);
        assert_eq!(system.global_illumination_probe(), Some(GpuResource::new(11)));
        assert!((system.global_illumination_intensity() - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_dispose_is_idempotent() {
        let (mut system, released) = recording_system();
        let handle = system.create_light(LightType::Point).unwrap();
        system.attach_shadow_map(handle, Some(GpuResource::new(5)));
        system.set_global_illumination_probe(Some(GpuResource::new(6)), 1.0);

        system.dispose();
        system.dispose();

        assert_eq!(*released.borrow(), vec![5, 6]);
        assert!(system.is_disposed());
        assert_eq!(system.light_count(), 0);
        assert_eq!(system.create_light(LightType::Point), Err(LightingError::Disposed));
    }

    #[test]
    fn test_drop_disposes() {
        let (mut system, released) = recording_system();
        system.set_global_illumination_probe(Some(GpuResource::new(42)), 1.0);
        drop(system);

        assert_eq!(*released.borrow(), vec![42]);
    }

    #[test]
    fn test_area_init_sets_fog() {
        let (mut system, _) = recording_system();
        let area = AreaLightingData {
            fog_enabled: true,
            fog_near: 5.0,
            fog_far: 50.0,
            ..AreaLightingData::default()
        };
        system.initialize_from_area_data(&area).unwrap();

        assert!(system.fog().enabled);
        assert!((system.fog().end - 50.0).abs() < f32::EPSILON);

        system.set_fog(FogSettings::default());
        assert!(!system.fog().enabled);
    }

    #[test]
    fn test_overwriting_light_keeps_shadow_map_for_release() {
        let (mut system, released) = recording_system();
        let handle = system.create_light(LightType::Spot).unwrap();
        system.attach_shadow_map(handle, Some(GpuResource::new(9)));

        system.update_light(handle, |light| *light = Light::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0, 4.0));
        assert_eq!(system.get_light(handle).unwrap().handle(), Some(handle));
        assert_eq!(system.get_light(handle).unwrap().light_type(), LightType::Point);

        assert!(system.remove_light(handle));
        assert_eq!(*released.borrow(), vec![9]);
    }

    #[test]
    fn test_sun_cannot_be_retyped() {
        let (mut system, _) = recording_system();
        system.initialize_from_area_data(&AreaLightingData::default()).unwrap();
        let sun = system.day_night().sun().unwrap();

        system.update_light(sun, |light| light.light_type = LightType::Point);
        assert_eq!(system.get_light(sun).unwrap().light_type(), LightType::Directional);
        assert_eq!(system.primary_directional_handle(), Some(sun));
    }

    #[test]
    fn test_failed_area_init_leaves_no_sun() {
        let mut system = LightingSystem::new(LightingConfig::new().with_max_lights(1)).unwrap();

        assert_eq!(
            system.initialize_from_area_data(&AreaLightingData::default()),
            Err(LightingError::CapacityExceeded { max: 1 })
        );
        assert_eq!(system.light_count(), 0);
        assert!(system.day_night().sun().is_none());
        assert!(system.primary_directional_light().is_none());
    }

    #[test]
    fn test_gi_probe_after_dispose_is_released() {
        let (mut system, released) = recording_system();
        system.dispose();

        system.set_global_illumination_probe(Some(GpuResource::new(77)), 1.0);
        assert_eq!(*released.borrow(), vec![77]);
        assert_eq!(system.global_illumination_probe(), None);

        drop(system);
        assert_eq!(*released.borrow(), vec![77]);
    }
}
