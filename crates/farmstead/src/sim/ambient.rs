use engine::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::config::AmbientConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlyingKind {
    Bird,
    Plane,
    Balloon,
}

struct FlyingProfile {
    width: f32,
    height: f32,
    /// Pixels per tick.
    speed: (f32, f32),
    /// Fraction of the ground surface height.
    band: (f32, f32),
}

impl FlyingKind {
    fn profile(self) -> FlyingProfile {
        match self {
            Self::Bird => FlyingProfile {
                width: 16.0,
                height: 10.0,
                speed: (1.5, 3.0),
                band: (0.25, 0.6),
            },
            Self::Plane => FlyingProfile {
                width: 72.0,
                height: 24.0,
                speed: (4.0, 7.0),
                band: (0.05, 0.2),
            },
            Self::Balloon => FlyingProfile {
                width: 40.0,
                height: 56.0,
                speed: (0.3, 0.8),
                band: (0.15, 0.45),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlyingObject {
    pub kind: FlyingKind,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub width: f32,
    pub height: f32,
}

impl FlyingObject {
    fn has_left_world(&self, world_width: f32) -> bool {
        (self.vx > 0.0 && self.x > world_width) || (self.vx < 0.0 && self.x + self.width < 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cloud {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub vx: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParticleKind {
    Soil,
    Seed,
    Harvest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub kind: ParticleKind,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub size: f32,
    pub age_s: f32,
    pub lifetime_s: f32,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spawner {
    pub since_last_s: f32,
    pub next_interval_s: f32,
}

impl Spawner {
    pub fn new(config: &AmbientConfig, rng: &mut impl Rng) -> Self {
        Self {
            since_last_s: 0.0,
            next_interval_s: draw_interval(config, rng),
        }
    }

    /// Returns true when the current interval ran out; the next one is
    /// redrawn immediately.
    fn tick(&mut self, dt_seconds: f32, config: &AmbientConfig, rng: &mut impl Rng) -> bool {
        self.since_last_s += dt_seconds;
        if self.since_last_s < self.next_interval_s {
            return false;
        }
        self.since_last_s = 0.0;
        self.next_interval_s = draw_interval(config, rng);
        true
    }
}

fn draw_interval(config: &AmbientConfig, rng: &mut impl Rng) -> f32 {
    rng.gen_range(config.spawn_interval_min_s..=config.spawn_interval_max_s)
}

pub fn pick_flying_kind(config: &AmbientConfig, rng: &mut impl Rng) -> Option<FlyingKind> {
    let weighted = [
        (FlyingKind::Bird, config.bird_weight),
        (FlyingKind::Plane, config.plane_weight),
        (FlyingKind::Balloon, config.balloon_weight),
    ];
    let total: u32 = weighted.iter().map(|(_, weight)| weight).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.gen_range(0..total);
    for (kind, weight) in weighted {
        if roll < weight {
            return Some(kind);
        }
        roll -= weight;
    }
    None
}

/// Horizontal extent and sky height the ambient layer lives in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyBounds {
    pub world_width: f32,
    pub ground_y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmbientState {
    pub clouds: Vec<Cloud>,
    pub flying: Vec<FlyingObject>,
    pub particles: Vec<Particle>,
    pub spawner: Spawner,
}

impl AmbientState {
    pub fn new(config: &AmbientConfig, bounds: SkyBounds, rng: &mut impl Rng) -> Self {
        let clouds = (0..config.cloud_count)
            .map(|_| {
                let width = rng.gen_range(80.0..=200.0);
                Cloud {
                    x: rng.gen_range(0.0..=bounds.world_width),
                    y: rng.gen_range(0.02f32..=0.3) * bounds.ground_y,
                    width,
                    height: width * 0.4,
                    vx: rng.gen_range(0.1..=0.5),
                }
            })
            .collect();
        Self {
            clouds,
            flying: Vec::new(),
            particles: Vec::new(),
            spawner: Spawner::new(config, rng),
        }
    }

    /// Advances clouds, the spawner, flying objects and particles by one tick.
    /// Returns the kind spawned this tick, if any.
    pub fn update(
        &mut self,
        dt_seconds: f32,
        config: &AmbientConfig,
        bounds: SkyBounds,
        gravity: f32,
        rng: &mut impl Rng,
    ) -> Option<FlyingKind> {
        for cloud in &mut self.clouds {
            cloud.x += cloud.vx;
            if cloud.x > bounds.world_width {
                cloud.x = -cloud.width;
            } else if cloud.x + cloud.width < 0.0 {
                cloud.x = bounds.world_width;
            }
        }

        let spawned = if self.spawner.tick(dt_seconds, config, rng) {
            pick_flying_kind(config, rng).map(|kind| {
                self.flying.push(spawn_flying(kind, bounds, rng));
                kind
            })
        } else {
            None
        };

        for object in &mut self.flying {
            object.x += object.vx;
        }
        self.flying
            .retain(|object| !object.has_left_world(bounds.world_width));

        let drift = gravity * config.particle_gravity_factor;
        for particle in &mut self.particles {
            particle.vy += drift;
            particle.x += particle.vx;
            particle.y += particle.vy;
            particle.age_s += dt_seconds;
            particle.opacity = (1.0 - particle.age_s / particle.lifetime_s).clamp(0.0, 1.0);
        }
        self.particles
            .retain(|particle| particle.age_s < particle.lifetime_s);

        spawned
    }

    pub fn emit_burst(
        &mut self,
        kind: ParticleKind,
        origin: Vec2,
        spread: f32,
        config: &AmbientConfig,
        rng: &mut impl Rng,
    ) {
        let half = spread.max(0.0) * 0.5;
        for _ in 0..config.burst_size {
            self.particles.push(Particle {
                kind,
                x: origin.x + rng.gen_range(-half..=half),
                y: origin.y + rng.gen_range(-half..=half),
                vx: rng.gen_range(-1.5..=1.5),
                vy: rng.gen_range(-3.0..=-1.0),
                size: rng.gen_range(2.0..=5.0),
                age_s: 0.0,
                lifetime_s: config.particle_lifetime_s,
                opacity: 1.0,
            });
        }
    }
}

fn spawn_flying(kind: FlyingKind, bounds: SkyBounds, rng: &mut impl Rng) -> FlyingObject {
    let profile = kind.profile();
    let speed = rng.gen_range(profile.speed.0..=profile.speed.1);
    let y = rng.gen_range(profile.band.0..=profile.band.1) * bounds.ground_y;
    let (x, vx) = if rng.gen_bool(0.5) {
        (-profile.width, speed)
    } else {
        (bounds.world_width, -speed)
    };
    FlyingObject {
        kind,
        x,
        y,
        vx,
        width: profile.width,
        height: profile.height,
    }
}
