//! Light registry
//!
//! Owns every light in the scene inside a generational arena. Handles given out
//! here stay valid until the light is removed and never alias a later light.
//! The registry knows nothing about clusters; whoever drives the cluster grid
//! is responsible for marking it dirty after a successful mutation.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::foundation::collections::{LightArena, LightHandle};
use crate::foundation::math::Vec3;

use super::error::LightingError;
use super::light::{Light, LightType, LightView};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique registry identity, stamped on every light it owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RegistryId(u64);

impl RegistryId {
    fn next() -> Self {
        Self(NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Owner of all scene lights
#[derive(Debug)]
pub struct LightRegistry {
    id: RegistryId,
    lights: LightArena<Light>,
    max_lights: usize,
    primary_directional: Option<LightHandle>,
}

impl LightRegistry {
    /// Create an empty registry holding at most `max_lights` lights
    pub fn new(max_lights: usize) -> Self {
        Self {
            id: RegistryId::next(),
            lights: LightArena::with_capacity_and_key(max_lights.min(1024)),
            max_lights,
            primary_directional: None,
        }
    }

    /// Configured capacity
    pub fn max_lights(&self) -> usize {
        self.max_lights
    }

    /// Number of lights owned, enabled or not
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Whether the registry owns no lights
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Number of enabled lights
    pub fn active_light_count(&self) -> usize {
        self.lights.values().filter(|light| light.enabled).count()
    }

    /// Whether `handle` refers to a light owned by this registry
    pub fn contains(&self, handle: LightHandle) -> bool {
        self.lights.contains_key(handle)
    }

    /// Allocate a new default light of the given type
    pub fn create_light(&mut self, light_type: LightType) -> Result<LightHandle, LightingError> {
        self.insert(Light::new(light_type))
    }

    /// Take ownership of an externally constructed light
    ///
    /// Adding a light that this registry already owns (a copy carrying one of
    /// its live handles) is a no-op returning the existing handle. Handles
    /// stamped by another registry are ignored and the light is inserted fresh.
    pub fn add_light(&mut self, light: Light) -> Result<LightHandle, LightingError> {
        if let Some(existing) = light
            .handle()
            .filter(|&handle| light.is_owned_by(self.id, handle) && self.contains(handle))
        {
            log::debug!("Light {:?} already registered, ignoring add", existing);
            return Ok(existing);
        }
        self.insert(light)
    }

    fn insert(&mut self, mut light: Light) -> Result<LightHandle, LightingError> {
        if self.lights.len() >= self.max_lights {
            log::warn!(
                "Cannot add {:?} light: registry is full ({} lights)",
                light.light_type,
                self.max_lights
            );
            return Err(LightingError::CapacityExceeded { max: self.max_lights });
        }

        // Shadow map tokens belong to the light they were attached to, not to copies
        light.replace_shadow_map(None);
        let id = self.id;
        let handle = self.lights.insert_with_key(|key| {
            light.assign_handle(id, key);
            light
        });
        log::debug!("Registered light {:?}", handle);
        Ok(handle)
    }

    /// Detach a light from the registry and hand it back
    ///
    /// Unknown handles return `None`. Removing the primary directional light
    /// clears the primary reference. The returned light no longer carries a
    /// handle; its shadow map token is left attached for the caller to release.
    pub fn remove_light(&mut self, handle: LightHandle) -> Option<Light> {
        let mut light = self.lights.remove(handle)?;
        light.clear_handle();
        if self.primary_directional == Some(handle) {
            self.primary_directional = None;
        }
        log::debug!("Removed light {:?}", handle);
        Some(light)
    }

    /// Read-only view of one light
    pub fn get(&self, handle: LightHandle) -> Option<&dyn LightView> {
        self.lights.get(handle).map(|light| light as &dyn LightView)
    }

    /// Mutate a light in place
    ///
    /// The light's identity and its attached shadow map survive the closure,
    /// even if it overwrites the whole record. The primary directional
    /// reference is dropped if the change leaves it pointing at something other
    /// than an enabled directional light.
    pub fn update_light<R>(&mut self, handle: LightHandle, f: impl FnOnce(&mut Light) -> R) -> Option<R> {
        let id = self.id;
        let light = self.lights.get_mut(handle)?;
        let shadow_map = light.shadow_map();
        let result = f(light);
        light.assign_handle(id, handle);
        light.replace_shadow_map(shadow_map);

        if self.primary_directional == Some(handle) && !self.is_enabled_directional(handle) {
            log::debug!("Primary directional light {:?} no longer qualifies, clearing", handle);
            self.primary_directional = None;
        }
        Some(result)
    }

    pub(crate) fn light_mut(&mut self, handle: LightHandle) -> Option<&mut Light> {
        self.lights.get_mut(handle)
    }

    /// Snapshot of every enabled light, in registry order
    pub fn active_lights(&self) -> Vec<&dyn LightView> {
        self.lights
            .values()
            .filter(|light| light.enabled)
            .map(|light| light as &dyn LightView)
            .collect()
    }

    /// Enabled lights whose influence touches a sphere at `position` of `radius`
    ///
    /// Directional lights always match.
    pub fn lights_affecting_point(&self, position: &Vec3, radius: f32) -> Vec<&dyn LightView> {
        self.lights
            .values()
            .filter(|light| light.enabled && light.reaches(position, radius))
            .map(|light| light as &dyn LightView)
            .collect()
    }

    /// Iterate every owned light with its handle
    pub fn iter(&self) -> impl Iterator<Item = (LightHandle, &dyn LightView)> + '_ {
        self.lights
            .iter()
            .map(|(handle, light)| (handle, light as &dyn LightView))
    }

    pub(crate) fn lights(&self) -> impl Iterator<Item = (LightHandle, &Light)> + '_ {
        self.lights.iter()
    }

    /// Override the primary directional light
    ///
    /// `None` clears the reference. A handle that is unknown, disabled or not
    /// directional is rejected and the current reference is kept. Returns
    /// whether the reference now matches the request.
    pub fn set_primary_directional_light(&mut self, handle: Option<LightHandle>) -> bool {
        match handle {
            None => {
                self.primary_directional = None;
                true
            }
            Some(handle) if self.is_enabled_directional(handle) => {
                self.primary_directional = Some(handle);
                true
            }
            Some(handle) => {
                log::warn!(
                    "Rejected primary directional light {:?}: not an enabled directional light",
                    handle
                );
                false
            }
        }
    }

    /// Handle of the primary directional light, if any
    pub fn primary_directional_handle(&self) -> Option<LightHandle> {
        self.primary_directional
    }

    /// The primary directional light, if any
    pub fn primary_directional_light(&self) -> Option<&dyn LightView> {
        self.primary_directional.and_then(|handle| self.get(handle))
    }

    fn is_enabled_directional(&self, handle: LightHandle) -> bool {
        self.lights
            .get(handle)
            .is_some_and(|light| light.enabled && light.light_type.is_directional())
    }

    /// Remove and return every light
    pub(crate) fn drain(&mut self) -> Vec<Light> {
        self.primary_directional = None;
        self.lights
            .drain()
            .map(|(_, mut light)| {
                light.clear_handle();
                light
            })
            .collect()
    }
}
