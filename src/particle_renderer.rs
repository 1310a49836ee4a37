use super::buffer_util::with_error_scope;
use super::camera::Camera;
use super::streaming::{StreamingUploader, COLOR_STRIDE, POSITION_SIZE_STRIDE};
use super::swarm_params::SwarmParams;

use bytemuck::{Pod, Zeroable};
use std::mem;
use wgpu::util::DeviceExt;

// Vertex buffer slots, also used as shader locations. The build script passes the
// same numbers to the shader template.
pub const QUAD_SLOT: u32 = 0;
pub const POSITION_SIZE_SLOT: u32 = 1;
pub const COLOR_SLOT: u32 = 2;

const SPRITE_SIZE: u32 = 64;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    _corner: [f32; 2],
}

// Triangle strip order.
pub const QUAD_CORNERS: [[f32; 2]; 4] = [[-0.5, -0.5], [0.5, -0.5], [-0.5, 0.5], [0.5, 0.5]];

fn create_vertices() -> Vec<Vertex> {
    QUAD_CORNERS
        .iter()
        .map(|corner| Vertex { _corner: *corner })
        .collect()
}

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
    shader_location: QUAD_SLOT,
}];
const POSITION_SIZE_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x4,
    offset: 0,
    shader_location: POSITION_SIZE_SLOT,
}];
// Normalized to [0, 1] in the shader.
const COLOR_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Unorm8x4,
    offset: 0,
    shader_location: COLOR_SLOT,
}];

// Layouts indexed by slot: the quad advances per vertex, the particle streams per instance.
fn vertex_buffer_layouts() -> [wgpu::VertexBufferLayout<'static>; 3] {
    [
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &QUAD_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: POSITION_SIZE_STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &POSITION_SIZE_ATTRIBUTES,
        },
        wgpu::VertexBufferLayout {
            array_stride: COLOR_STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &COLOR_ATTRIBUTES,
        },
    ]
}

fn make_msaa_target(
    device: &wgpu::Device,
    config: &wgpu::SurfaceConfiguration,
    sample_count: u32,
) -> Option<wgpu::TextureView> {
    if sample_count <= 1 {
        return None;
    }
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Multisampled frame"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count,
        dimension: wgpu::TextureDimension::D2,
        format: config.format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
    });
    Some(texture.create_view(&wgpu::TextureViewDescriptor::default()))
}

pub struct ParticleRenderer {
    camera_uniform_buf: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    draw_pipeline: wgpu::RenderPipeline,
    quad_buf: wgpu::Buffer,

    sample_count: u32,
    msaa_target: Option<wgpu::TextureView>,
}

impl ParticleRenderer {
    pub fn init(
        config: &wgpu::SurfaceConfiguration,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        params: &SwarmParams,
        camera: &Camera,
    ) -> anyhow::Result<Self> {
        let sprite = match &params.particle_texture {
            Some(path) => super::sprite::load_sprite(path)?,
            None => super::sprite::create_soft_disc(SPRITE_SIZE),
        };

        let renderer = with_error_scope(device, || {
            let raw_uniforms = camera.to_uniform_data();
            let camera_uniform_buf =
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Camera uniform buffer"),
                    contents: bytemuck::cast_slice(&raw_uniforms),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });

            let quad_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Quad vertex buffer"),
                contents: bytemuck::cast_slice(&create_vertices()),
                usage: wgpu::BufferUsages::VERTEX,
            });

            let shader = super::shader_utils::create_wgsl_module(
                device,
                "Particle shader",
                crate::include_shader!("particles.wgsl"),
            );
            let vertex_buffers = vertex_buffer_layouts();
            let draw_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Particles"),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &vertex_buffers,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[wgpu::ColorTargetState {
                        format: config.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    }],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: params.msaa_samples,
                    ..Default::default()
                },
                multiview: None,
            });

            let sprite_view = super::sprite::create_sprite_texture(device, queue, &sprite);
            let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some("Sprite sampler"),
                address_mode_u: wgpu::AddressMode::Repeat,
                address_mode_v: wgpu::AddressMode::Repeat,
                address_mode_w: wgpu::AddressMode::Repeat,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            });

            let bind_group_layout = draw_pipeline.get_bind_group_layout(0);
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: camera_uniform_buf.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(&sprite_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                ],
                label: Some("Particle bind group"),
            });

            ParticleRenderer {
                camera_uniform_buf,
                bind_group,
                draw_pipeline,
                quad_buf,
                sample_count: params.msaa_samples,
                msaa_target: make_msaa_target(device, config, params.msaa_samples),
            }
        })
        .map_err(|message| anyhow::anyhow!("Unable to create particle renderer: {}", message))?;
        log::info!("Particle renderer ready, {}x MSAA", renderer.sample_count);
        Ok(renderer)
    }

    pub fn resize(&mut self, config: &wgpu::SurfaceConfiguration, device: &wgpu::Device) {
        self.msaa_target = make_msaa_target(device, config, self.sample_count);
    }

    /// Clears the frame and draws one instance per particle. With no instances
    /// only the clear happens.
    pub fn render(
        &self,
        view: &wgpu::TextureView,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        camera: &Camera,
        instances: Option<&StreamingUploader<wgpu::Buffer>>,
    ) {
        let raw_uniforms = camera.to_uniform_data();
        queue.write_buffer(
            &self.camera_uniform_buf,
            0,
            bytemuck::cast_slice(&raw_uniforms),
        );

        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
        {
            let (attachment, resolve_target) = match &self.msaa_target {
                Some(msaa_view) => (msaa_view, Some(view)),
                None => (view, None),
            };
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Particles"),
                color_attachments: &[wgpu::RenderPassColorAttachment {
                    view: attachment,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: true,
                    },
                }],
                depth_stencil_attachment: None,
            });
            if let Some(uploader) = instances.filter(|u| u.active_count() > 0) {
                rpass.set_pipeline(&self.draw_pipeline);
                rpass.set_bind_group(0, &self.bind_group, &[]);
                rpass.set_vertex_buffer(QUAD_SLOT, self.quad_buf.slice(..));
                rpass.set_vertex_buffer(
                    POSITION_SIZE_SLOT,
                    uploader.position_buffer().buffer.slice(..),
                );
                rpass.set_vertex_buffer(COLOR_SLOT, uploader.color_buffer().buffer.slice(..));
                rpass.draw(
                    0..QUAD_CORNERS.len() as u32,
                    0..uploader.active_count() as u32,
                );
            }
        }
        queue.submit(Some(encoder.finish()));
    }
}
