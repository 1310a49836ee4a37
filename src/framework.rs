use winit::event::WindowEvent;

gflags::define! {
    --log_filter: &str = "warn,swarm=info"
}
gflags::define! {
    -h, --help = false
}

pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

// "Framework" for a windowed executable.
pub trait Example: 'static + Sized {
    type Params;

    fn init(
        params: Self::Params,
        config: &wgpu::SurfaceConfiguration,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> anyhow::Result<Self>;
    fn resize(&mut self, config: &wgpu::SurfaceConfiguration, device: &wgpu::Device);
    fn handle_event(&mut self, event: WindowEvent, window: &winit::window::Window);
    fn render(&mut self, view: &wgpu::TextureView, device: &wgpu::Device, queue: &wgpu::Queue);
    // Called right after the frame was handed to the display.
    fn frame_presented(&mut self) {}
}

// Parses the command line and sets up logging. Returns the positional arguments.
pub fn init() -> anyhow::Result<Vec<&'static str>> {
    let args = gflags::parse();
    if HELP.flag {
        gflags::print_help_and_exit(0);
    }
    scrub_log::init_with_filter_string(LOG_FILTER.flag)
        .map_err(|e| anyhow::anyhow!("Unable to initialize logging: {:?}", e))?;
    Ok(args)
}

struct Setup {
    window: winit::window::Window,
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
}

async fn setup(
    title: &str,
    settings: &WindowSettings,
    event_loop: &winit::event_loop::EventLoop<()>,
) -> anyhow::Result<Setup> {
    log::info!("Initializing the window...");
    let window = winit::window::WindowBuilder::new()
        .with_title(title)
        .with_inner_size(winit::dpi::LogicalSize::new(
            settings.width,
            settings.height,
        ))
        .build(event_loop)
        .map_err(|e| anyhow::anyhow!("Failed to create window: {}", e))?;
    let size = window.inner_size();

    let instance = wgpu::Instance::new(wgpu::Backends::PRIMARY);
    let surface = unsafe { instance.create_surface(&window) };
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        })
        .await
        .ok_or_else(|| anyhow::anyhow!("No compatible graphics adapter"))?;
    log::info!("Using adapter: {:?}", adapter.get_info());

    let (device, queue) = adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: None,
                features: wgpu::Features::empty(),
                limits: wgpu::Limits::default(),
            },
            None,
        )
        .await?;
    device.on_uncaptured_error(|e: wgpu::Error| log::error!("Graphics error: {}", e));

    let format = surface
        .get_preferred_format(&adapter)
        .ok_or_else(|| anyhow::anyhow!("Surface is incompatible with the adapter"))?;
    let config = wgpu::SurfaceConfiguration {
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        format,
        width: size.width.max(1),
        height: size.height.max(1),
        present_mode: if settings.vsync {
            wgpu::PresentMode::Fifo
        } else {
            wgpu::PresentMode::Immediate
        },
    };
    surface.configure(&device, &config);

    Ok(Setup {
        window,
        surface,
        device,
        queue,
        config,
    })
}

/// Opens the window and runs `E` until the window is closed. Only returns if
/// startup fails.
pub fn run<E: Example>(
    title: &str,
    settings: WindowSettings,
    params: E::Params,
) -> anyhow::Result<()> {
    use winit::{
        event,
        event_loop::{ControlFlow, EventLoop},
    };

    let event_loop = EventLoop::new();
    let Setup {
        window,
        surface,
        device,
        queue,
        mut config,
    } = futures::executor::block_on(setup(title, &settings, &event_loop))?;

    log::info!("Initializing the example...");
    let mut example = E::init(params, &config, &device, &queue)?;

    log::info!("Entering render loop...");
    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        match event {
            event::Event::WindowEvent {
                event: WindowEvent::Resized(size),
                ..
            }
            | event::Event::WindowEvent {
                event:
                    WindowEvent::ScaleFactorChanged {
                        new_inner_size: &mut size,
                        ..
                    },
                ..
            } => {
                // Minimized.
                if size.width == 0 || size.height == 0 {
                    return;
                }
                log::info!("Resizing to {:?}", size);
                config.width = size.width;
                config.height = size.height;
                surface.configure(&device, &config);
                example.resize(&config, &device);
            }
            event::Event::WindowEvent { event, .. } => match event {
                WindowEvent::KeyboardInput {
                    input:
                        event::KeyboardInput {
                            virtual_keycode: Some(event::VirtualKeyCode::Escape),
                            state: event::ElementState::Pressed,
                            ..
                        },
                    ..
                }
                | WindowEvent::CloseRequested => {
                    *control_flow = ControlFlow::Exit;
                }
                _ => {
                    example.handle_event(event, &window);
                }
            },
            event::Event::MainEventsCleared => window.request_redraw(),
            event::Event::RedrawRequested(_) => {
                let frame = match surface.get_current_texture() {
                    Ok(frame) => frame,
                    Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                        surface.configure(&device, &config);
                        return;
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of memory acquiring the next frame");
                        *control_flow = ControlFlow::Exit;
                        return;
                    }
                    Err(e) => {
                        log::warn!("Dropped frame: {:?}", e);
                        return;
                    }
                };
                let view = frame
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                let cpu_time_start = std::time::Instant::now();
                example.render(&view, &device, &queue);
                let cpu_time = cpu_time_start.elapsed();
                // Blocks until the display takes the frame.
                frame.present();
                example.frame_presented();
                log::debug!("CPU time: {:?}", cpu_time);
            }
            _ => (),
        }
    })
}
