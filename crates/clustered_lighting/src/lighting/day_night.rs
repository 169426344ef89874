//! Sun and moon management
//!
//! Every area has exactly two permanent directional lights. Only one of them
//! is enabled at a time, and that one is the primary directional light.

use crate::foundation::collections::LightHandle;
use crate::foundation::math::Vec3;

use super::error::LightingError;
use super::fog::FogSettings;
use super::light::{Light, LightType, ShadowSettings};
use super::registry::LightRegistry;

/// Default sun direction (pointing from the sun toward the scene)
const DEFAULT_SUN_DIRECTION: [f32; 3] = [-0.3, -1.0, -0.4];

/// Default moon direction (pointing from the moon toward the scene)
const DEFAULT_MOON_DIRECTION: [f32; 3] = [0.4, -1.0, 0.3];

/// Area shadow opacity is stored as a percentage
const SHADOW_OPACITY_SCALE: f32 = 100.0;

/// Byte-packed color as stored in area data
///
/// Layout is `0x00BBGGRR`: red in the lowest byte, then green, then blue.
/// The top byte is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedColor(pub u32);

impl PackedColor {
    /// Pack 8-bit channels
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(r as u32 | (g as u32) << 8 | (b as u32) << 16)
    }

    /// Normalized color with each channel in `[0, 1]`
    pub fn to_linear(self) -> Vec3 {
        let channel = |shift: u32| f32::from(((self.0 >> shift) & 0xFF) as u8) / 255.0;
        Vec3::new(channel(0), channel(8), channel(16))
    }
}

/// Lighting parameters supplied by the area loader
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AreaLightingData {
    /// Ambient color while the sun is up
    pub sun_ambient: PackedColor,
    /// Sun light color
    pub sun_diffuse: PackedColor,
    /// Whether the sun casts shadows
    pub sun_shadows: bool,
    /// Ambient color while the moon is up
    pub moon_ambient: PackedColor,
    /// Moon light color
    pub moon_diffuse: PackedColor,
    /// Whether the moon casts shadows
    pub moon_shadows: bool,
    /// Ambient applied to dynamic objects
    pub dynamic_ambient: PackedColor,
    /// Shadow opacity percentage, 0 to 100
    pub shadow_opacity: u8,
    /// Whether the area has fog
    pub fog_enabled: bool,
    /// Fog color
    pub fog_color: PackedColor,
    /// Distance where fog begins
    pub fog_near: f32,
    /// Distance where fog is opaque
    pub fog_far: f32,
    /// Whether the area starts at night
    pub is_night: bool,
}

impl AreaLightingData {
    /// Linear fog described by the area
    pub fn fog_settings(&self) -> FogSettings {
        FogSettings {
            enabled: self.fog_enabled,
            ..FogSettings::linear(self.fog_color.to_linear(), self.fog_near, self.fog_far)
        }
    }
}

/// Owner of the sun/moon pair and of the time-of-day switch
#[derive(Debug, Clone)]
pub struct DayNightLightController {
    sun: Option<LightHandle>,
    moon: Option<LightHandle>,
    is_night: bool,
    sun_ambient: Vec3,
    moon_ambient: Vec3,
    dynamic_ambient: Vec3,
    shadow_opacity: f32,
    shadow_resolution: u32,
}

impl DayNightLightController {
    /// Create a controller; shadow-casting sun/moon get `shadow_resolution` texels
    pub fn new(shadow_resolution: u32) -> Self {
        Self {
            sun: None,
            moon: None,
            is_night: false,
            sun_ambient: Vec3::zeros(),
            moon_ambient: Vec3::zeros(),
            dynamic_ambient: Vec3::zeros(),
            shadow_opacity: 1.0,
            shadow_resolution,
        }
    }

    /// Configure sun and moon from area data
    ///
    /// The two lights are created in `registry` on first use and reused
    /// afterwards. On success exactly one of them is enabled and it is the
    /// registry's primary directional light. If the registry lacks room for
    /// the missing lights nothing is created or changed.
    pub fn initialize_from_area_data(
        &mut self,
        registry: &mut LightRegistry,
        area: &AreaLightingData,
    ) -> Result<(), LightingError> {
        let missing = [self.sun, self.moon]
            .into_iter()
            .filter(|handle| !matches!(handle, Some(handle) if registry.contains(*handle)))
            .count();
        if registry.len() + missing > registry.max_lights() {
            log::warn!(
                "No room for {} permanent directional lights ({} of {} used)",
                missing,
                registry.len(),
                registry.max_lights()
            );
            return Err(LightingError::CapacityExceeded { max: registry.max_lights() });
        }

        let sun = Self::ensure_light(registry, self.sun, DEFAULT_SUN_DIRECTION)?;
        self.sun = Some(sun);
        let moon = Self::ensure_light(registry, self.moon, DEFAULT_MOON_DIRECTION)?;
        self.moon = Some(moon);

        let resolution = self.shadow_resolution;
        let configure = |light: &mut Light, diffuse: PackedColor, direction: [f32; 3], shadows: bool| {
            light.light_type = LightType::Directional;
            light.position = Vec3::zeros();
            light.range = 0.0;
            light.color = diffuse.to_linear();
            light.direction = Vec3::from(direction).normalize();
            light.intensity = 1.0;
            light.shadow = if shadows {
                ShadowSettings::casting(resolution)
            } else {
                ShadowSettings::disabled()
            };
        };
        registry.update_light(sun, |light| {
            configure(light, area.sun_diffuse, DEFAULT_SUN_DIRECTION, area.sun_shadows);
        });
        registry.update_light(moon, |light| {
            configure(light, area.moon_diffuse, DEFAULT_MOON_DIRECTION, area.moon_shadows);
        });

        self.sun_ambient = area.sun_ambient.to_linear();
        self.moon_ambient = area.moon_ambient.to_linear();
        self.dynamic_ambient = area.dynamic_ambient.to_linear();
        self.shadow_opacity = (f32::from(area.shadow_opacity) / SHADOW_OPACITY_SCALE).clamp(0.0, 1.0);
        self.is_night = area.is_night;
        self.apply_time_of_day(registry);

        log::debug!(
            "Day/night lighting initialized ({}), sun {:?}, moon {:?}",
            if self.is_night { "night" } else { "day" },
            sun,
            moon
        );
        Ok(())
    }

    fn ensure_light(
        registry: &mut LightRegistry,
        existing: Option<LightHandle>,
        direction: [f32; 3],
    ) -> Result<LightHandle, LightingError> {
        match existing {
            Some(handle) if registry.contains(handle) => Ok(handle),
            _ => registry.add_light(Light::directional(Vec3::from(direction), Vec3::new(1.0, 1.0, 1.0), 1.0)),
        }
    }

    /// Switch between day and night
    ///
    /// Returns whether any light changed. Before initialization this only
    /// records the flag.
    pub fn set_night(&mut self, registry: &mut LightRegistry, is_night: bool) -> bool {
        if self.is_night == is_night && self.is_consistent(registry) {
            return false;
        }
        self.is_night = is_night;
        self.apply_time_of_day(registry)
    }

    fn apply_time_of_day(&self, registry: &mut LightRegistry) -> bool {
        let (Some(sun), Some(moon)) = (self.sun, self.moon) else {
            return false;
        };

        let night = self.is_night;
        registry.update_light(sun, |light| light.enabled = !night);
        registry.update_light(moon, |light| light.enabled = night);
        registry.set_primary_directional_light(Some(if night { moon } else { sun }))
    }

    fn is_consistent(&self, registry: &LightRegistry) -> bool {
        let enabled = |handle: Option<LightHandle>| {
            handle
                .and_then(|handle| registry.get(handle))
                .is_some_and(|light| light.is_enabled())
        };
        enabled(self.sun) != self.is_night && enabled(self.moon) == self.is_night
    }

    /// Sun light handle, once initialized
    pub fn sun(&self) -> Option<LightHandle> {
        self.sun
    }

    /// Moon light handle, once initialized
    pub fn moon(&self) -> Option<LightHandle> {
        self.moon
    }

    /// Whether `handle` is the sun or the moon
    pub fn is_reserved(&self, handle: LightHandle) -> bool {
        self.sun == Some(handle) || self.moon == Some(handle)
    }

    /// Whether it is currently night
    pub fn is_night(&self) -> bool {
        self.is_night
    }

    /// The directional light that should be enabled right now
    pub fn active_directional(&self) -> Option<LightHandle> {
        if self.is_night {
            self.moon
        } else {
            self.sun
        }
    }

    /// Scene ambient color for the current time of day
    pub fn ambient_color(&self) -> Vec3 {
        if self.is_night {
            self.moon_ambient
        } else {
            self.sun_ambient
        }
    }

    /// Ambient color for dynamic objects
    pub fn dynamic_ambient(&self) -> Vec3 {
        self.dynamic_ambient
    }

    /// Shadow opacity in `[0, 1]`
    pub fn shadow_opacity(&self) -> f32 {
        self.shadow_opacity
    }

    /// Forget the sun and moon; used when the owning registry is emptied
    pub(crate) fn reset(&mut self) {
        self.sun = None;
        self.moon = None;
    }
}
