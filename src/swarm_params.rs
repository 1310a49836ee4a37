use cgmath::InnerSpace;
use serde::{Deserialize, Serialize};

// Parameters that define the swarm. These don't change at runtime.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SwarmParams {
    pub window_width: u32,
    pub window_height: u32,

    pub physics_starts_on: bool,
    pub vsync: bool,
    pub msaa_samples: u32,

    // Image to use for each particle. A soft round sprite is generated when unset.
    #[serde(default)]
    pub particle_texture: Option<String>,

    #[serde(default)]
    pub particles: ParticleParams,

    #[serde(default)]
    pub camera: CameraParams,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct ParticleParams {
    pub max_particles: usize,
    // Pull toward the origin, in world units per millisecond squared.
    pub acceleration: f32,
    pub init_speed: f32,
    pub size: f32,
    pub color: [u8; 4],
}

impl Default for ParticleParams {
    fn default() -> Self {
        ParticleParams {
            max_particles: 50000,
            acceleration: 0.00001,
            init_speed: 0.07,
            size: 0.025,
            color: [255, 60, 60, 170],
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct CameraParams {
    // Vertical field of view in radians.
    pub fov: f32,
    // World units per millisecond.
    pub move_speed: f32,
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub near: f32,
    pub far: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        CameraParams {
            fov: 0.7,
            move_speed: 0.01,
            position: [0.0, 0.0, -10.0],
            direction: [0.0, 0.0, 1.0],
            near: 0.001,
            far: 1000.0,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParamsError {
    #[error("particles.max_particles must be at least 1")]
    EmptyPopulation,
    #[error("{0} must be finite")]
    NotFinite(&'static str),
    #[error("msaa_samples must be 1 or 4, got {0}")]
    UnsupportedSampleCount(u32),
    #[error("window size must be non-zero, got {0}x{1}")]
    EmptyWindow(u32, u32),
    #[error("camera.direction must be non-zero")]
    ZeroDirection,
    #[error("camera.direction must not be vertical, got {0:?}")]
    VerticalDirection([f32; 3]),
}

impl SwarmParams {
    // Rejects configurations the renderer can't start with.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.particles.max_particles == 0 {
            return Err(ParamsError::EmptyPopulation);
        }
        if self.window_width == 0 || self.window_height == 0 {
            return Err(ParamsError::EmptyWindow(
                self.window_width,
                self.window_height,
            ));
        }
        if self.msaa_samples != 1 && self.msaa_samples != 4 {
            return Err(ParamsError::UnsupportedSampleCount(self.msaa_samples));
        }
        let scalars = [
            ("particles.acceleration", self.particles.acceleration),
            ("particles.init_speed", self.particles.init_speed),
            ("particles.size", self.particles.size),
            ("camera.fov", self.camera.fov),
            ("camera.move_speed", self.camera.move_speed),
            ("camera.near", self.camera.near),
            ("camera.far", self.camera.far),
        ];
        for (name, value) in scalars.iter() {
            if !value.is_finite() {
                return Err(ParamsError::NotFinite(name));
            }
        }
        if self.camera.position.iter().any(|v| !v.is_finite()) {
            return Err(ParamsError::NotFinite("camera.position"));
        }
        if self.camera.direction.iter().any(|v| !v.is_finite()) {
            return Err(ParamsError::NotFinite("camera.direction"));
        }
        if self.camera.direction.iter().all(|v| *v == 0.0) {
            return Err(ParamsError::ZeroDirection);
        }
        // The camera's right vector is direction x world up.
        let direction = cgmath::Vector3::from(self.camera.direction).normalize();
        if direction.cross(cgmath::Vector3::unit_y()).magnitude2() < 1e-8 {
            return Err(ParamsError::VerticalDirection(self.camera.direction));
        }
        Ok(())
    }
}

impl std::str::FromStr for SwarmParams {
    type Err = toml::de::Error;
    fn from_str(serialized: &str) -> Result<Self, Self::Err> {
        let params = toml::from_str(serialized)?;
        Ok(params)
    }
}

impl Default for SwarmParams {
    fn default() -> Self {
        SwarmParams {
            window_width: 640,
            window_height: 480,
            physics_starts_on: true,
            vsync: true,
            msaa_samples: 4,
            particle_texture: None,
            particles: ParticleParams::default(),
            camera: CameraParams::default(),
        }
    }
}

pub fn read_params_from_file(path: &str) -> anyhow::Result<SwarmParams> {
    let params = std::fs::read_to_string(path)?.parse()?;
    Ok(params)
}

// Falls back to the defaults if the file is missing or malformed.
pub fn get_swarm_config(path: &str) -> SwarmParams {
    match read_params_from_file(path) {
        Ok(params) => params,
        Err(e) => {
            log::error!("Failed to parse config file({}): {:?}", path, e);
            SwarmParams::default()
        }
    }
}
