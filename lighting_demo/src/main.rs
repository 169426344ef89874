//! Clustered lighting demo application
//!
//! Builds an area with a sun, a moon and a field of point and spot lights,
//! then orbits a camera around it for a handful of frames and logs what the
//! cluster grid and the submitted frame data look like.
//!
//! Usage: `lighting_demo [config.toml|config.ron]`

use clustered_lighting::foundation::math::utils::deg_to_rad;
use clustered_lighting::prelude::*;
use rand::Rng;

const FRAME_COUNT: u32 = 12;
const ORBIT_RADIUS: f32 = 40.0;
const FIELD_HALF_EXTENT: f32 = 60.0;

/// Sink that logs a summary of each submitted frame
#[derive(Default)]
struct LogSink {
    frames: u32,
}

impl LightDataSink for LogSink {
    fn submit(&mut self, frame: &LightFrameData) {
        self.frames += 1;
        let busiest = frame.cluster_ranges.iter().map(|range| range.count).max().unwrap_or(0);
        let occupied = frame.cluster_ranges.iter().filter(|range| range.count > 0).count();
        log::info!(
            "Frame {}: {} lights, {} of {} clusters lit, busiest cluster has {} lights, {} bytes of indices",
            self.frames,
            frame.header.light_count,
            occupied,
            frame.cluster_ranges.len(),
            busiest,
            frame.cluster_index_bytes().len()
        );
    }
}

pub struct DemoApp {
    lighting: LightingSystem,
    projection: Mat4,
    sink: LogSink,
    frame: u32,
}

impl DemoApp {
    pub fn new(config: LightingConfig) -> Result<Self, ConfigError> {
        log::info!("Creating lighting demo...");
        Ok(Self {
            lighting: LightingSystem::new(config)?,
            projection: Mat4::perspective(deg_to_rad(60.0), 16.0 / 9.0, 0.1, 1000.0),
            sink: LogSink::default(),
            frame: 0,
        })
    }

    pub fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("Initializing area lighting...");
        let area = AreaLightingData {
            sun_ambient: PackedColor::from_rgb(60, 60, 70),
            sun_diffuse: PackedColor::from_rgb(255, 244, 214),
            sun_shadows: true,
            moon_ambient: PackedColor::from_rgb(15, 18, 30),
            moon_diffuse: PackedColor::from_rgb(110, 120, 160),
            dynamic_ambient: PackedColor::from_rgb(40, 40, 40),
            shadow_opacity: 70,
            fog_enabled: true,
            fog_color: PackedColor::from_rgb(120, 130, 140),
            fog_near: 30.0,
            fog_far: 250.0,
            ..AreaLightingData::default()
        };
        self.lighting.initialize_from_area_data(&area)?;

        let mut rng = rand::thread_rng();
        let capacity = self.lighting.config().max_lights.saturating_sub(self.lighting.light_count());
        let count = capacity.min(64);
        for i in 0..count {
            let position = Vec3::new(
                rng.gen_range(-FIELD_HALF_EXTENT..FIELD_HALF_EXTENT),
                rng.gen_range(0.5..6.0),
                rng.gen_range(-FIELD_HALF_EXTENT..FIELD_HALF_EXTENT),
            );
            let color = Vec3::new(rng.gen_range(0.4..1.0), rng.gen_range(0.4..1.0), rng.gen_range(0.4..1.0));
            let light = if i % 4 == 0 {
                Light::spot(position, Vec3::new(0.0, -1.0, 0.0), color, 3.0, 12.0, 0.35, 0.6)
                    .with_shadows(ShadowSettings::casting(1024))
            } else {
                Light::point(position, color, 1.5, rng.gen_range(3.0..10.0))
            };
            self.lighting.add_light(light)?;
        }
        log::info!("Area has {} lights", self.lighting.light_count());
        Ok(())
    }

    pub fn run(&mut self) {
        log::info!("Running {} frames...", FRAME_COUNT);
        while self.frame < FRAME_COUNT {
            self.update_frame();
            self.frame += 1;
        }

        let probe = Vec3::new(0.0, 1.0, 0.0);
        let nearby = self.lighting.lights_affecting_point(&probe, 2.0);
        log::info!("{} lights reach the origin", nearby.len());
    }

    fn update_frame(&mut self) {
        let angle = self.frame as f32 / FRAME_COUNT as f32 * std::f32::consts::TAU;
        let eye = Vec3::new(angle.cos() * ORBIT_RADIUS, 12.0, angle.sin() * ORBIT_RADIUS);
        let view = Mat4::look_at(eye, Vec3::zeros(), Vec3::y());

        // Nightfall halfway through the orbit
        if self.frame == FRAME_COUNT / 2 {
            self.lighting.set_night(true);
            log::info!("Night has fallen");
        }

        if self.lighting.update_clustering(&view, &self.projection) {
            let stats = self.lighting.cluster_grid().stats();
            log::debug!(
                "Reclustered: {} lights, {} assignments, {} dropped, {} behind camera",
                stats.lights_processed,
                stats.assignments,
                stats.dropped_assignments,
                stats.culled_behind_camera
            );
        }

        self.lighting.submit_light_data(&mut self.sink);
    }
}

fn load_config() -> Result<LightingConfig, ConfigError> {
    match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading lighting config from {}", path);
            LightingConfig::load_from_file(&path)
        }
        None => Ok(LightingConfig::default()),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Starting clustered lighting demo");

    let mut app = DemoApp::new(load_config()?)?;
    app.initialize()?;
    app.run();

    log::info!("Lighting demo finished successfully");
    Ok(())
}
