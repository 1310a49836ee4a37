pub mod buffer_util;
pub mod camera;
pub mod frame_clock;
pub mod framework;
pub mod particle_renderer;
pub mod particles;
pub mod shader_utils;
pub mod sprite;
pub mod streaming;
pub mod swarm_params;
