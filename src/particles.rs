use cgmath::{InnerSpace, Vector3, Zero};
use rand::Rng;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Particle {
    pub position: Vector3<f32>,
    // Added to position once per tick.
    pub velocity: Vector3<f32>,
    pub size: f32,
    pub color: [u8; 4],
}

#[derive(Debug, thiserror::Error)]
pub enum PopulationError {
    #[error("Unable to allocate {count} particles: {source}")]
    Allocation {
        count: usize,
        source: std::collections::TryReserveError,
    },
}

// Fixed size population. A particle's index is its identity: nothing is ever
// spawned, removed or moved to another slot after init.
#[derive(Debug)]
pub struct ParticleStore {
    particles: Vec<Particle>,
}

impl ParticleStore {
    pub fn init<R: Rng>(
        count: usize,
        init_speed: f32,
        size: f32,
        color: [u8; 4],
        rng: &mut R,
    ) -> Result<Self, PopulationError> {
        let mut particles = Vec::new();
        particles
            .try_reserve_exact(count)
            .map_err(|source| PopulationError::Allocation { count, source })?;
        let mut centered = |scale: f32| rng.gen_range(-0.5f32..=0.5) * scale;
        for _ in 0..count {
            let position = Vector3::new(centered(1.0), centered(1.0), centered(1.0));
            let velocity = Vector3::new(
                centered(init_speed),
                centered(init_speed),
                centered(init_speed),
            );
            particles.push(Particle {
                position,
                velocity,
                size,
                color,
            });
        }
        Ok(ParticleStore { particles })
    }

    pub fn from_params<R: Rng>(
        params: &super::swarm_params::ParticleParams,
        rng: &mut R,
    ) -> Result<Self, PopulationError> {
        let store = ParticleStore::init(
            params.max_particles,
            params.init_speed,
            params.size,
            params.color,
            rng,
        )?;
        log::info!("Num particles: {}", store.len());
        Ok(store)
    }

    /// Takes ownership of an already built population, for callers that build
    /// their own instead of a random one.
    pub fn from_particles(particles: Vec<Particle>) -> Self {
        ParticleStore { particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Pulls every particle toward the origin by `accel * dt` and then moves it by
    /// its updated velocity. `dt` is in milliseconds. Does nothing when physics is
    /// disabled.
    ///
    /// A particle sitting exactly on the origin has no direction to accelerate in,
    /// so it only moves by its current velocity that tick.
    pub fn advance(&mut self, dt: f32, physics_enabled: bool, accel: f32) {
        if !physics_enabled {
            return;
        }
        let step = accel * dt;
        for p in self.particles.iter_mut() {
            let to_center = -p.position;
            if to_center.magnitude2() > 0.0 {
                p.velocity += to_center.normalize() * step;
            }
            // The updated velocity moves the particle, not the one from last tick.
            p.position += p.velocity;
        }
    }
}

impl Default for Particle {
    fn default() -> Self {
        Particle {
            position: Vector3::zero(),
            velocity: Vector3::zero(),
            size: 0.0,
            color: [0, 0, 0, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    const EPSILON: f32 = 1e-5;

    fn assert_near(actual: Vector3<f32>, expected: Vector3<f32>) {
        assert!(
            (actual - expected).magnitude() < EPSILON,
            "{:?} != {:?}",
            actual,
            expected
        );
    }

    fn seeded_store(count: usize, init_speed: f32) -> ParticleStore {
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        ParticleStore::init(count, init_speed, 0.025, [255, 60, 60, 170], &mut rng).unwrap()
    }

    #[test]
    fn population_size() {
        for count in [0, 1, 2, 17, 1000].iter() {
            let store = seeded_store(*count, 0.07);
            assert_eq!(store.len(), *count);
            assert_eq!(store.is_empty(), *count == 0);
        }
    }

    #[test]
    fn init_bounds() {
        let init_speed = 0.07;
        let store = seeded_store(10000, init_speed);
        for p in store.particles() {
            for axis in 0..3 {
                assert!(p.position[axis] >= -0.5 && p.position[axis] <= 0.5);
                assert!(p.velocity[axis] >= -init_speed / 2.0);
                assert!(p.velocity[axis] <= init_speed / 2.0);
            }
            assert_eq!(p.size, 0.025);
            assert_eq!(p.color, [255, 60, 60, 170]);
        }
    }

    #[test]
    fn physics_off_is_idempotent() {
        let mut store = seeded_store(500, 0.07);
        let before = store.particles().to_vec();
        for _ in 0..10 {
            store.advance(16.0, false, 0.5);
        }
        assert_eq!(store.particles(), &before[..]);
    }

    #[test]
    fn origin_guard() {
        let mut store = ParticleStore::from_particles(vec![Particle {
            velocity: Vector3::new(0.01, -0.02, 0.0),
            ..Particle::default()
        }]);
        store.advance(1.0, true, 0.1);
        let p = store.particles()[0];
        assert_near(p.velocity, Vector3::new(0.01, -0.02, 0.0));
        assert_near(p.position, Vector3::new(0.01, -0.02, 0.0));
        assert!(p.position.x.is_finite() && p.velocity.x.is_finite());
    }

    #[test]
    fn pull_toward_origin() {
        let mut store = ParticleStore::from_particles(vec![
            Particle {
                position: Vector3::new(1.0, 0.0, 0.0),
                size: 0.5,
                color: [1, 2, 3, 4],
                ..Particle::default()
            },
            Particle {
                size: 0.25,
                color: [5, 6, 7, 8],
                ..Particle::default()
            },
        ]);
        store.advance(1.0, true, 0.1);
        let particles = store.particles();
        assert_near(particles[0].velocity, Vector3::new(-0.1, 0.0, 0.0));
        assert_near(particles[0].position, Vector3::new(0.9, 0.0, 0.0));
        assert_eq!(particles[1].velocity, Vector3::zero());
        assert_eq!(particles[1].position, Vector3::zero());
    }

    #[test]
    fn acceleration_scales_with_dt_and_accumulates() {
        let mut store = ParticleStore::from_particles(vec![Particle {
            position: Vector3::new(0.0, 0.0, 10.0),
            ..Particle::default()
        }]);
        store.advance(2.0, true, 0.01);
        assert_near(store.particles()[0].velocity, Vector3::new(0.0, 0.0, -0.02));
        store.advance(2.0, true, 0.01);
        assert_near(store.particles()[0].velocity, Vector3::new(0.0, 0.0, -0.04));
        assert_near(store.particles()[0].position, Vector3::new(0.0, 0.0, 9.94));
    }

    #[test]
    fn stays_bounded() {
        // Default constants at ~60fps for a simulated minute.
        let mut store = seeded_store(200, 0.07);
        for _ in 0..3600 {
            store.advance(16.0, true, 0.00001);
        }
        for p in store.particles() {
            assert!(p.position.magnitude().is_finite());
            assert!(p.position.magnitude() < 1000.0);
        }
    }
}
