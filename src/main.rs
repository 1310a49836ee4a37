use log::{info, warn};
use swarm::framework;

gflags::define! {
    --config: &str = "swarm_config.toml"
}

const TARGET_FPS: f64 = 60.0;

#[derive(Debug, Default, Copy, Clone)]
struct InputState {
    movement: swarm::camera::MoveInput,
    toggle_physics: bool,
    toggle_grab: bool,
}

#[derive(Debug)]
struct SwarmState {
    input_state: InputState,
    prev_input_state: InputState,
    physics_enabled: bool,
    cursor_grabbed: bool,
}

struct Swarm {
    params: swarm::swarm_params::SwarmParams,
    clock: swarm::frame_clock::FrameClock,
    state: SwarmState,
    camera: swarm::camera::Camera,
    store: swarm::particles::ParticleStore,
    uploader: swarm::streaming::StreamingUploader<wgpu::Buffer>,
    renderer: swarm::particle_renderer::ParticleRenderer,
}

impl Swarm {
    // Reacts to toggle keys on the press, not while held.
    fn apply_toggles(&mut self, window: &winit::window::Window) {
        let input_state = self.state.input_state;
        let prev_input_state = self.state.prev_input_state;
        if input_state.toggle_physics && !prev_input_state.toggle_physics {
            self.state.physics_enabled = !self.state.physics_enabled;
            info!(
                "Physics {}",
                if self.state.physics_enabled { "on" } else { "off" }
            );
        }
        if input_state.toggle_grab && !prev_input_state.toggle_grab {
            let grab = !self.state.cursor_grabbed;
            match window.set_cursor_grab(grab) {
                Ok(()) => {
                    window.set_cursor_visible(!grab);
                    self.state.cursor_grabbed = grab;
                }
                Err(e) => warn!("Unable to change cursor grab: {}", e),
            }
        }
        self.state.prev_input_state = input_state;
    }
}

impl framework::Example for Swarm {
    type Params = swarm::swarm_params::SwarmParams;

    fn init(
        params: Self::Params,
        config: &wgpu::SurfaceConfiguration,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> anyhow::Result<Self> {
        let store =
            swarm::particles::ParticleStore::from_params(&params.particles, &mut rand::thread_rng())?;
        let uploader = swarm::streaming::StreamingUploader::new(
            &swarm::buffer_util::WgpuStreamDevice::new(device),
            params.particles.max_particles,
        )?;
        let camera = swarm::camera::Camera::from_params(&params.camera, (config.width, config.height));
        let renderer =
            swarm::particle_renderer::ParticleRenderer::init(config, device, queue, &params, &camera)?;
        let physics_enabled = params.physics_starts_on;
        Ok(Swarm {
            params,
            clock: swarm::frame_clock::FrameClock::new(TARGET_FPS),
            state: SwarmState {
                input_state: InputState::default(),
                prev_input_state: InputState::default(),
                physics_enabled,
                cursor_grabbed: false,
            },
            camera,
            store,
            uploader,
            renderer,
        })
    }

    fn resize(&mut self, config: &wgpu::SurfaceConfiguration, device: &wgpu::Device) {
        info!("Resizing: ({}, {})", config.width, config.height);
        self.camera.screen_size = (config.width, config.height);
        self.renderer.resize(config, device);
    }

    fn handle_event(&mut self, event: winit::event::WindowEvent, window: &winit::window::Window) {
        macro_rules! bind_keys {
            ($input:expr, $($pat:pat => $result:expr),*) => (
                match $input {
                    $(
                        winit::event::KeyboardInput {
                            virtual_keycode: Some($pat),
                            state,
                            ..
                        } => match state {
                            winit::event::ElementState::Pressed => $result = true,
                            winit::event::ElementState::Released => $result = false,
                        }
                    ),*
                    _ => (),
                }
            );
        }
        if let winit::event::WindowEvent::KeyboardInput { input, .. } = event {
            let input_state = &mut self.state.input_state;
            bind_keys!(input,
                winit::event::VirtualKeyCode::W => input_state.movement.forward,
                winit::event::VirtualKeyCode::S => input_state.movement.back,
                winit::event::VirtualKeyCode::A => input_state.movement.left,
                winit::event::VirtualKeyCode::D => input_state.movement.right,
                winit::event::VirtualKeyCode::Q => input_state.movement.up,
                winit::event::VirtualKeyCode::E => input_state.movement.down,
                winit::event::VirtualKeyCode::Space => input_state.toggle_physics,
                winit::event::VirtualKeyCode::F4 => input_state.toggle_grab);
            self.apply_toggles(window);
        }
    }

    fn render(&mut self, view: &wgpu::TextureView, device: &wgpu::Device, queue: &wgpu::Queue) {
        let dt = self.clock.delta_ms();
        self.camera
            .update_state(dt, &self.state.input_state.movement);
        self.store.advance(
            dt,
            self.state.physics_enabled,
            self.params.particles.acceleration,
        );

        let stream_device = swarm::buffer_util::WgpuStreamDevice::new(device);
        let instances = match self.uploader.frame(&stream_device, &self.store) {
            Ok(_) => Some(&self.uploader),
            Err(e) => {
                warn!("Skipping particle draw: {}", e);
                None
            }
        };
        self.renderer
            .render(view, device, queue, &self.camera, instances);
    }

    fn frame_presented(&mut self) {
        self.clock.tick();
    }
}

fn run() -> anyhow::Result<()> {
    framework::init()?;
    let params = swarm::swarm_params::get_swarm_config(CONFIG.flag);
    params.validate()?;
    let settings = framework::WindowSettings {
        width: params.window_width,
        height: params.window_height,
        vsync: params.vsync,
    };
    framework::run::<Swarm>("Particles", settings, params)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Fatal: {:?}", e);
        std::process::exit(1);
    }
}
