use super::buffer_util::{SizedBuffer, StreamDevice, UploadError};
use super::particles::ParticleStore;

pub const POSITION_SIZE_LABEL: &str = "Particle position/size buffer";
pub const COLOR_LABEL: &str = "Particle color buffer";

// Bytes per instance in each stream.
pub const POSITION_SIZE_STRIDE: usize = std::mem::size_of::<[f32; 4]>();
pub const COLOR_STRIDE: usize = std::mem::size_of::<[u8; 4]>();

fn zeroed<T: Copy + Default>(label: &str, len: usize) -> Result<Vec<T>, UploadError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|source| UploadError::Allocation {
            label: label.to_string(),
            source,
        })?;
    data.resize(len, T::default());
    Ok(data)
}

// Streams the particle population to the GPU as two per-instance vertex buffers.
//
// The CPU side arrays are allocated once at full capacity and rewritten every
// frame. The GPU side buffers get fresh storage every frame (see
// `StreamDevice::discard_and_write`), and both are only replaced once both
// writes went through, so a draw never sees positions from one frame and colors
// from another.
pub struct StreamingUploader<B> {
    position_size: Vec<[f32; 4]>,
    color: Vec<[u8; 4]>,
    active_count: usize,

    position_buffer: SizedBuffer<B>,
    color_buffer: SizedBuffer<B>,
}

impl<B> StreamingUploader<B> {
    pub fn new<D: StreamDevice<Buffer = B>>(
        device: &D,
        max_particles: usize,
    ) -> Result<Self, UploadError> {
        let position_size = zeroed(POSITION_SIZE_LABEL, max_particles)?;
        let color = zeroed(COLOR_LABEL, max_particles)?;
        let position_bytes = (max_particles * POSITION_SIZE_STRIDE) as wgpu::BufferAddress;
        let color_bytes = (max_particles * COLOR_STRIDE) as wgpu::BufferAddress;
        let position_buffer = SizedBuffer {
            buffer: device.create_stream_buffer(POSITION_SIZE_LABEL, position_bytes)?,
            size: position_bytes,
        };
        let color_buffer = SizedBuffer {
            buffer: device.create_stream_buffer(COLOR_LABEL, color_bytes)?,
            size: color_bytes,
        };
        log::info!(
            "Instance buffers: {} bytes position/size, {} bytes color",
            position_bytes,
            color_bytes
        );
        Ok(StreamingUploader {
            position_size,
            color,
            active_count: 0,
            position_buffer,
            color_buffer,
        })
    }

    pub fn capacity(&self) -> usize {
        self.position_size.len()
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn position_size(&self) -> &[[f32; 4]] {
        &self.position_size[..self.active_count]
    }

    pub fn colors(&self) -> &[[u8; 4]] {
        &self.color[..self.active_count]
    }

    pub fn position_buffer(&self) -> &SizedBuffer<B> {
        &self.position_buffer
    }

    pub fn color_buffer(&self) -> &SizedBuffer<B> {
        &self.color_buffer
    }

    /// Copies the current state of every particle into the instance arrays, slot
    /// `i` holding particle `i`. Returns the number of instances written.
    pub fn snapshot(&mut self, store: &ParticleStore) -> Result<usize, UploadError> {
        let particles = store.particles();
        if particles.len() > self.capacity() {
            return Err(UploadError::PopulationTooLarge {
                count: particles.len(),
                capacity: self.capacity(),
            });
        }
        for ((p, position_size), color) in particles
            .iter()
            .zip(self.position_size.iter_mut())
            .zip(self.color.iter_mut())
        {
            *position_size = [p.position.x, p.position.y, p.position.z, p.size];
            *color = p.color;
        }
        self.active_count = particles.len();
        Ok(self.active_count)
    }

    /// Pushes the active part of the instance arrays to the GPU.
    pub fn upload<D: StreamDevice<Buffer = B>>(&mut self, device: &D) -> Result<(), UploadError> {
        let positions = device.discard_and_write(
            POSITION_SIZE_LABEL,
            self.position_buffer.size,
            0,
            bytemuck::cast_slice(self.position_size()),
        )?;
        let colors = device.discard_and_write(
            COLOR_LABEL,
            self.color_buffer.size,
            0,
            bytemuck::cast_slice(self.colors()),
        )?;
        self.position_buffer.buffer = positions;
        self.color_buffer.buffer = colors;
        Ok(())
    }

    // Snapshot and upload in one go, returning the instance count to draw.
    pub fn frame<D: StreamDevice<Buffer = B>>(
        &mut self,
        device: &D,
        store: &ParticleStore,
    ) -> Result<usize, UploadError> {
        let count = self.snapshot(store)?;
        self.upload(device)?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::super::buffer_util::check_write;
    use super::super::particles::Particle;
    use super::*;
    use cgmath::Vector3;
    use std::cell::{Cell, RefCell};

    #[derive(Debug, PartialEq)]
    struct MemoryBuffer {
        generation: usize,
        bytes: Vec<u8>,
    }

    #[derive(Debug)]
    struct Write {
        label: String,
        size: wgpu::BufferAddress,
        len: usize,
    }

    // Host memory stand-in for the GPU.
    #[derive(Default)]
    struct MemoryDevice {
        generation: Cell<usize>,
        writes: RefCell<Vec<Write>>,
        fail_on: Option<&'static str>,
    }

    impl MemoryDevice {
        fn failing_on(label: &'static str) -> Self {
            MemoryDevice {
                fail_on: Some(label),
                ..MemoryDevice::default()
            }
        }

        fn next_generation(&self) -> usize {
            self.generation.set(self.generation.get() + 1);
            self.generation.get()
        }
    }

    impl StreamDevice for MemoryDevice {
        type Buffer = MemoryBuffer;

        fn create_stream_buffer(
            &self,
            _label: &str,
            size: wgpu::BufferAddress,
        ) -> Result<MemoryBuffer, UploadError> {
            Ok(MemoryBuffer {
                generation: self.next_generation(),
                bytes: vec![0; size as usize],
            })
        }

        fn discard_and_write(
            &self,
            label: &str,
            size: wgpu::BufferAddress,
            offset: wgpu::BufferAddress,
            data: &[u8],
        ) -> Result<MemoryBuffer, UploadError> {
            self.writes.borrow_mut().push(Write {
                label: label.to_string(),
                size,
                len: data.len(),
            });
            check_write(label, size, offset, data.len())?;
            if self.fail_on.map_or(false, |failing| failing == label) {
                return Err(UploadError::Gpu {
                    label: label.to_string(),
                    message: "out of memory".to_string(),
                });
            }
            let mut bytes = vec![0xAB; size as usize];
            let start = offset as usize;
            bytes[start..start + data.len()].copy_from_slice(data);
            Ok(MemoryBuffer {
                generation: self.next_generation(),
                bytes,
            })
        }
    }

    fn two_particle_store() -> ParticleStore {
        ParticleStore::from_particles(vec![
            Particle {
                position: Vector3::new(1.0, 0.0, 0.0),
                size: 0.5,
                color: [255, 60, 60, 170],
                ..Particle::default()
            },
            Particle {
                size: 0.25,
                color: [1, 2, 3, 4],
                ..Particle::default()
            },
        ])
    }

    fn uniform_store(count: usize) -> ParticleStore {
        ParticleStore::from_particles(
            (0..count)
                .map(|i| Particle {
                    position: Vector3::new(i as f32, -(i as f32), 0.5),
                    size: 0.025,
                    color: [i as u8, 0, 255, 170],
                    ..Particle::default()
                })
                .collect(),
        )
    }

    #[test]
    fn snapshot_matches_particles() {
        let device = MemoryDevice::default();
        let store = uniform_store(100);
        let mut uploader = StreamingUploader::new(&device, 128).unwrap();
        assert_eq!(uploader.snapshot(&store).unwrap(), 100);
        assert_eq!(uploader.position_size().len(), 100);
        assert_eq!(uploader.colors().len(), 100);
        for (i, p) in store.particles().iter().enumerate() {
            assert_eq!(
                uploader.position_size()[i],
                [p.position.x, p.position.y, p.position.z, p.size]
            );
            assert_eq!(uploader.colors()[i], p.color);
        }
    }

    #[test]
    fn snapshot_after_advance() {
        let device = MemoryDevice::default();
        let mut store = two_particle_store();
        store.advance(1.0, true, 0.1);
        let mut uploader = StreamingUploader::new(&device, 2).unwrap();
        assert_eq!(uploader.frame(&device, &store).unwrap(), 2);

        let expected = [0.9, 0.0, 0.0, 0.5, 0.0, 0.0, 0.0, 0.25];
        let flat: &[f32] = bytemuck::cast_slice(uploader.position_size());
        assert_eq!(flat.len(), expected.len());
        for (actual, expected) in flat.iter().zip(expected.iter()) {
            assert!((actual - expected).abs() < 1e-6, "{} != {}", actual, expected);
        }
        let colors: &[u8] = bytemuck::cast_slice(uploader.colors());
        assert_eq!(colors, &[255, 60, 60, 170, 1, 2, 3, 4]);

        // The GPU copy holds the same bytes.
        let gpu_positions = &uploader.position_buffer().buffer.bytes;
        assert_eq!(&gpu_positions[..32], bytemuck::cast_slice::<f32, u8>(flat));
        assert_eq!(&uploader.color_buffer().buffer.bytes[..8], colors);
    }

    #[test]
    fn writes_never_exceed_capacity() {
        let capacity = 64;
        let device = MemoryDevice::default();
        let mut uploader = StreamingUploader::new(&device, capacity).unwrap();
        for count in 0..=capacity {
            uploader.frame(&device, &uniform_store(count)).unwrap();
        }
        let writes = device.writes.borrow();
        assert_eq!(writes.len(), 2 * (capacity + 1));
        for (i, write) in writes.iter().enumerate() {
            let count = i / 2;
            let stride = if write.label == POSITION_SIZE_LABEL {
                POSITION_SIZE_STRIDE
            } else {
                COLOR_STRIDE
            };
            // Every frame discards the whole buffer and writes only the active part.
            assert_eq!(write.size, (capacity * stride) as wgpu::BufferAddress);
            assert_eq!(write.len, count * stride);
            assert!(write.len as wgpu::BufferAddress <= write.size);
        }
    }

    #[test]
    fn fresh_storage_every_frame() {
        let device = MemoryDevice::default();
        let store = uniform_store(8);
        let mut uploader = StreamingUploader::new(&device, 8).unwrap();
        let mut seen = vec![uploader.position_buffer().buffer.generation];
        for _ in 0..3 {
            uploader.frame(&device, &store).unwrap();
            let generation = uploader.position_buffer().buffer.generation;
            assert!(!seen.contains(&generation));
            seen.push(generation);
        }
    }

    #[test]
    fn no_per_frame_allocation() {
        let device = MemoryDevice::default();
        let mut store = uniform_store(32);
        let mut uploader = StreamingUploader::new(&device, 32).unwrap();
        let positions_ptr = uploader.position_size.as_ptr();
        let colors_ptr = uploader.color.as_ptr();
        for _ in 0..10 {
            store.advance(16.0, true, 0.00001);
            uploader.frame(&device, &store).unwrap();
        }
        assert_eq!(uploader.position_size.as_ptr(), positions_ptr);
        assert_eq!(uploader.color.as_ptr(), colors_ptr);
        assert_eq!(uploader.capacity(), 32);
    }

    #[test]
    fn failed_upload_keeps_previous_frame() {
        let device = MemoryDevice::failing_on(COLOR_LABEL);
        let store = two_particle_store();
        let mut uploader = StreamingUploader::new(&device, 2).unwrap();
        let positions_before = uploader.position_buffer().buffer.generation;
        let colors_before = uploader.color_buffer().buffer.generation;

        let result = uploader.frame(&device, &store);
        assert!(matches!(result, Err(UploadError::Gpu { .. })));
        // The position write went through, but it must not be committed alone.
        assert_eq!(device.writes.borrow().len(), 2);
        assert_eq!(uploader.position_buffer().buffer.generation, positions_before);
        assert_eq!(uploader.color_buffer().buffer.generation, colors_before);
    }

    #[test]
    fn population_larger_than_capacity() {
        let device = MemoryDevice::default();
        let mut uploader = StreamingUploader::new(&device, 4).unwrap();
        assert_eq!(
            uploader.snapshot(&uniform_store(5)),
            Err(UploadError::PopulationTooLarge {
                count: 5,
                capacity: 4
            })
        );
        assert_eq!(uploader.active_count(), 0);
        assert!(device.writes.borrow().is_empty());
    }

    #[test]
    fn empty_population() {
        let device = MemoryDevice::default();
        let mut uploader = StreamingUploader::new(&device, 4).unwrap();
        assert_eq!(uploader.frame(&device, &uniform_store(0)).unwrap(), 0);
        assert!(uploader.position_size().is_empty());
    }
}
