//! Light source state and the read-only view handed to consumers
//!
//! A [`Light`] is pure data. It only becomes an identified scene light once a
//! [`LightRegistry`](super::LightRegistry) owns it; from then on consumers see
//! it through [`LightView`], and mutation goes through the registry.

use crate::foundation::collections::LightHandle;
use crate::foundation::math::Vec3;

use super::registry::RegistryId;

/// Light types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightType {
    /// Directional light (like sunlight), affects the whole scene
    Directional,
    /// Point light (like a lightbulb)
    Point,
    /// Spot light (like a flashlight)
    Spot,
    /// Area light, culled like a point light of the same range
    Area,
}

impl LightType {
    /// Whether this type has global influence and ignores its range
    pub const fn is_directional(self) -> bool {
        matches!(self, Self::Directional)
    }
}

/// Opaque token for a GPU-affine resource owned by the graphics collaborator
///
/// Shadow maps and GI probe textures are tracked as tokens only; the lighting
/// system hands them back through a [`ResourceReleaser`] when it lets go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GpuResource(u64);

impl GpuResource {
    /// Wrap a raw collaborator-defined resource id
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw collaborator-defined resource id
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Release hook supplied by the graphics collaborator
pub trait ResourceReleaser {
    /// Give a resource back to its owner
    fn release(&mut self, resource: GpuResource);
}

impl<F: FnMut(GpuResource)> ResourceReleaser for F {
    fn release(&mut self, resource: GpuResource) {
        self(resource);
    }
}

/// Shadow configuration for a light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    /// Whether the light casts shadows
    pub cast_shadows: bool,
    /// Shadow map resolution in texels (0 when not casting)
    pub resolution: u32,
    /// Constant depth bias
    pub depth_bias: f32,
    /// Bias along the surface normal
    pub normal_bias: f32,
    /// Penumbra softness in `[0, 1]`
    pub softness: f32,
}

impl ShadowSettings {
    /// Settings for a light that does not cast shadows
    pub const fn disabled() -> Self {
        Self {
            cast_shadows: false,
            resolution: 0,
            depth_bias: 0.005,
            normal_bias: 0.02,
            softness: 0.5,
        }
    }

    /// Settings for a shadow-casting light at the given resolution
    pub const fn casting(resolution: u32) -> Self {
        Self {
            cast_shadows: true,
            resolution,
            ..Self::disabled()
        }
    }

    /// Set the softness, clamped to `[0, 1]`
    pub fn with_softness(mut self, softness: f32) -> Self {
        self.softness = softness.clamp(0.0, 1.0);
        self
    }
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Read-only capability view over a registered light
///
/// This is the only face of a light that leaves the registry.
pub trait LightView {
    /// Stable identity, `None` until the light is owned by a registry
    fn handle(&self) -> Option<LightHandle>;
    /// Light type
    fn light_type(&self) -> LightType;
    /// World-space position (meaningless for directional lights)
    fn position(&self) -> Vec3;
    /// World-space direction (directional and spot lights)
    fn direction(&self) -> Vec3;
    /// Linear RGB color
    fn color(&self) -> Vec3;
    /// Intensity multiplier
    fn intensity(&self) -> f32;
    /// Influence radius (ignored for directional lights)
    fn range(&self) -> f32;
    /// Whether the light currently contributes
    fn is_enabled(&self) -> bool;
    /// Whether the light casts shadows
    fn casts_shadows(&self) -> bool;
}

/// Light source
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Light type
    pub light_type: LightType,
    /// Light position (for point/spot/area lights)
    pub position: Vec3,
    /// Light direction (for directional/spot/area lights)
    pub direction: Vec3,
    /// Light color, linear RGB
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Light range (ignored for directional lights)
    pub range: f32,
    /// Inner cone angle for spot lights (in radians)
    pub inner_cone_angle: f32,
    /// Outer cone angle for spot lights (in radians)
    pub outer_cone_angle: f32,
    /// Shadow configuration
    pub shadow: ShadowSettings,
    /// Whether the light contributes to shading and clustering
    pub enabled: bool,
    handle: Option<LightHandle>,
    owner: Option<RegistryId>,
    shadow_map: Option<GpuResource>,
}

impl Light {
    /// Create an enabled white light of the given type with neutral defaults
    pub fn new(light_type: LightType) -> Self {
        Self {
            light_type,
            position: Vec3::zeros(),
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            range: if light_type.is_directional() { 0.0 } else { 10.0 },
            inner_cone_angle: 0.0,
            outer_cone_angle: 0.0,
            shadow: ShadowSettings::disabled(),
            enabled: true,
            handle: None,
            owner: None,
            shadow_map: None,
        }
    }

    /// Create a directional light
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize(),
            color,
            intensity,
            ..Self::new(LightType::Directional)
        }
    }

    /// Create a point light
    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            range,
            ..Self::new(LightType::Point)
        }
    }

    /// Create a spot light
    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
        inner_cone_angle: f32,
        outer_cone_angle: f32,
    ) -> Self {
        Self {
            position,
            direction: direction.normalize(),
            color,
            intensity,
            range,
            inner_cone_angle,
            outer_cone_angle,
            ..Self::new(LightType::Spot)
        }
    }

    /// Create an area light facing `direction`
    pub fn area(position: Vec3, direction: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            position,
            direction: direction.normalize(),
            color,
            intensity,
            range,
            ..Self::new(LightType::Area)
        }
    }

    /// Set shadow configuration
    pub fn with_shadows(mut self, shadow: ShadowSettings) -> Self {
        self.shadow = shadow;
        self
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Shadow map token currently attached to this light
    pub fn shadow_map(&self) -> Option<GpuResource> {
        self.shadow_map
    }

    /// Whether `registry` owns this light under `handle`
    pub(crate) fn is_owned_by(&self, registry: RegistryId, handle: LightHandle) -> bool {
        self.owner == Some(registry) && self.handle == Some(handle)
    }

    pub(crate) fn assign_handle(&mut self, registry: RegistryId, handle: LightHandle) {
        self.owner = Some(registry);
        self.handle = Some(handle);
    }

    pub(crate) fn clear_handle(&mut self) {
        self.owner = None;
        self.handle = None;
    }

    pub(crate) fn replace_shadow_map(&mut self, resource: Option<GpuResource>) -> Option<GpuResource> {
        std::mem::replace(&mut self.shadow_map, resource)
    }

    /// Whether this light can influence a sphere at `point` with `radius`
    ///
    /// Directional lights always can; every other type needs the two spheres
    /// to touch (boundary inclusive).
    pub fn reaches(&self, point: &Vec3, radius: f32) -> bool {
        if self.light_type.is_directional() {
            return true;
        }
        (self.position - point).norm() <= self.range + radius
    }
}

impl LightView for Light {
    fn handle(&self) -> Option<LightHandle> {
        self.handle
    }

    fn light_type(&self) -> LightType {
        self.light_type
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn direction(&self) -> Vec3 {
        self.direction
    }

    fn color(&self) -> Vec3 {
        self.color
    }

    fn intensity(&self) -> f32 {
        self.intensity
    }

    fn range(&self) -> f32 {
        self.range
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn casts_shadows(&self) -> bool {
        self.shadow.cast_shadows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_directional_light_normalizes_direction() {
        let light = Light::directional(Vec3::new(0.0, -2.0, 0.0), Vec3::new(1.0, 0.9, 0.8), 1.5);

        assert_eq!(light.light_type, LightType::Directional);
        assert_relative_eq!(light.direction, Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-6);
        assert!(light.enabled);
        assert!(light.handle().is_none());
    }

    #[test]
    fn test_reaches_is_boundary_inclusive() {
        let light = Light::point(Vec3::zeros(), Vec3::new(1.0, 1.0, 1.0), 1.0, 5.0);

        assert!(light.reaches(&Vec3::new(7.0, 0.0, 0.0), 2.0));
        assert!(!light.reaches(&Vec3::new(7.5, 0.0, 0.0), 2.0));
    }

    #[test]
    fn test_directional_reaches_everywhere() {
        let light = Light::directional(Vec3::new(0.0, -1.0, 0.0), Vec3::new(1.0, 1.0, 1.0), 1.0);
        assert!(light.reaches(&Vec3::new(1.0e6, -3.0e5, 42.0), 0.0));
    }

    #[test]
    fn test_shadow_softness_is_clamped() {
        let shadow = ShadowSettings::casting(1024).with_softness(3.0);
        assert!(shadow.cast_shadows);
        assert_eq!(shadow.resolution, 1024);
        assert_relative_eq!(shadow.softness, 1.0);
    }

    #[test]
    fn test_closure_releaser() {
        let mut released = Vec::new();
        {
            let mut releaser = |resource: GpuResource| released.push(resource.raw());
            releaser.release(GpuResource::new(7));
        }
        assert_eq!(released, vec![7]);
    }
}
