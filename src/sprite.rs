use log::info;

// RGBA8 pixels, rows bottom to top.
pub struct SpriteImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

// White disc whose alpha fades out toward the edge.
pub fn create_soft_disc(size: u32) -> SpriteImage {
    let extent = size.max(2);
    let data = (0..extent * extent)
        .flat_map(|id| {
            let x = 2.0 * (id % extent) as f32 / (extent - 1) as f32 - 1.0;
            let y = 2.0 * (id / extent) as f32 / (extent - 1) as f32 - 1.0;
            let r = (x * x + y * y).sqrt().min(1.0);
            // smoothstep from the rim to the center.
            let t = 1.0 - r;
            let alpha = t * t * (3.0 - 2.0 * t);
            let a = (alpha * 255.0).round() as u8;
            std::iter::once(0xFF)
                .chain(std::iter::once(0xFF))
                .chain(std::iter::once(0xFF))
                .chain(std::iter::once(a))
        })
        .collect();
    SpriteImage {
        width: extent,
        height: extent,
        data,
    }
}

// Reads an image file, flipped so that the first row is the bottom of the image.
pub fn load_sprite(path: &str) -> Result<SpriteImage, image::ImageError> {
    let image = image::open(path)?.flipv().into_rgba8();
    let width = image.width();
    let height = image.height();
    info!(
        "Loading sprite {} with (width, height) = ({}, {})",
        path, width, height
    );
    Ok(SpriteImage {
        width,
        height,
        data: image.into_raw(),
    })
}

pub fn create_sprite_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    sprite: &SpriteImage,
) -> wgpu::TextureView {
    let texture_extent = wgpu::Extent3d {
        width: sprite.width,
        height: sprite.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        size: texture_extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        label: Some("Particle sprite"),
    });
    let nonzero_width = core::num::NonZeroU32::new(4 * sprite.width);
    if let Some(nonzero_width) = nonzero_width {
        let data_layout = wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(nonzero_width),
            rows_per_image: None,
        };
        queue.write_texture(
            texture.as_image_copy(),
            &sprite.data,
            data_layout,
            texture_extent,
        );
    }
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
