// A buffer handle together with the capacity it was allocated with.
#[derive(Debug)]
pub struct SizedBuffer<B> {
    pub buffer: B,
    pub size: wgpu::BufferAddress,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum UploadError {
    #[error("Write of {len} bytes at offset {offset} overflows {label} ({capacity} bytes)")]
    Overflow {
        label: String,
        offset: wgpu::BufferAddress,
        len: wgpu::BufferAddress,
        capacity: wgpu::BufferAddress,
    },
    #[error("Write of {len} bytes at offset {offset} into {label} is misaligned")]
    Misaligned {
        label: String,
        offset: wgpu::BufferAddress,
        len: wgpu::BufferAddress,
    },
    #[error("GPU error on {label}: {message}")]
    Gpu { label: String, message: String },
    #[error("Unable to allocate {label}: {source}")]
    Allocation {
        label: String,
        source: std::collections::TryReserveError,
    },
    #[error("{count} particles don't fit in {capacity} instance slots")]
    PopulationTooLarge { count: usize, capacity: usize },
}

// The graphics buffer operations the streaming uploader needs.
pub trait StreamDevice {
    type Buffer;

    fn create_stream_buffer(
        &self,
        label: &str,
        size: wgpu::BufferAddress,
    ) -> Result<Self::Buffer, UploadError>;

    /// Allocates fresh storage of `size` bytes and writes `data` at `offset`,
    /// returning the replacement for the buffer's previous storage. Contents
    /// outside the written range are undefined.
    ///
    /// Handing out new storage instead of writing in place means a draw that is
    /// still reading the old storage never has to be waited on.
    fn discard_and_write(
        &self,
        label: &str,
        size: wgpu::BufferAddress,
        offset: wgpu::BufferAddress,
        data: &[u8],
    ) -> Result<Self::Buffer, UploadError>;
}

// Rejects writes that don't fit in `capacity` or that the mapping API can't express.
pub fn check_write(
    label: &str,
    capacity: wgpu::BufferAddress,
    offset: wgpu::BufferAddress,
    len: usize,
) -> Result<(), UploadError> {
    let len = len as wgpu::BufferAddress;
    if offset % wgpu::MAP_ALIGNMENT != 0 || len % wgpu::COPY_BUFFER_ALIGNMENT != 0 {
        return Err(UploadError::Misaligned {
            label: label.to_string(),
            offset,
            len,
        });
    }
    match offset.checked_add(len) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(UploadError::Overflow {
            label: label.to_string(),
            offset,
            len,
            capacity,
        }),
    }
}

// Runs `f` inside validation and out of memory error scopes. GPU errors raised
// by `f` are returned instead of reaching the uncaptured error handler.
pub fn with_error_scope<T>(device: &wgpu::Device, f: impl FnOnce() -> T) -> Result<T, String> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = futures::executor::block_on(device.pop_error_scope());
    let out_of_memory = futures::executor::block_on(device.pop_error_scope());
    match validation.or(out_of_memory) {
        Some(e) => Err(e.to_string()),
        None => Ok(value),
    }
}

pub struct WgpuStreamDevice<'a> {
    device: &'a wgpu::Device,
}

impl<'a> WgpuStreamDevice<'a> {
    pub fn new(device: &'a wgpu::Device) -> Self {
        WgpuStreamDevice { device }
    }

    fn make_buffer(
        &self,
        label: &str,
        size: wgpu::BufferAddress,
        mapped_at_creation: bool,
    ) -> wgpu::Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation,
        })
    }

    fn scoped<T>(&self, label: &str, f: impl FnOnce() -> T) -> Result<T, UploadError> {
        with_error_scope(self.device, f).map_err(|message| UploadError::Gpu {
            label: label.to_string(),
            message,
        })
    }
}

impl StreamDevice for WgpuStreamDevice<'_> {
    type Buffer = wgpu::Buffer;

    fn create_stream_buffer(
        &self,
        label: &str,
        size: wgpu::BufferAddress,
    ) -> Result<wgpu::Buffer, UploadError> {
        self.scoped(label, || self.make_buffer(label, size, false))
    }

    fn discard_and_write(
        &self,
        label: &str,
        size: wgpu::BufferAddress,
        offset: wgpu::BufferAddress,
        data: &[u8],
    ) -> Result<wgpu::Buffer, UploadError> {
        check_write(label, size, offset, data.len())?;
        self.scoped(label, || {
            // The old storage is dropped by the caller; wgpu keeps it alive until
            // any submitted draw reading it has finished.
            let buffer = self.make_buffer(label, size, true);
            if !data.is_empty() {
                let end = offset + data.len() as wgpu::BufferAddress;
                buffer
                    .slice(offset..end)
                    .get_mapped_range_mut()
                    .copy_from_slice(data);
            }
            buffer.unmap();
            buffer
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_within_capacity() {
        assert_eq!(check_write("positions", 64, 0, 64), Ok(()));
        assert_eq!(check_write("positions", 64, 0, 0), Ok(()));
        assert_eq!(check_write("positions", 64, 8, 16), Ok(()));
    }

    #[test]
    fn write_past_capacity() {
        assert_eq!(
            check_write("colors", 16, 0, 20),
            Err(UploadError::Overflow {
                label: "colors".to_string(),
                offset: 0,
                len: 20,
                capacity: 16,
            })
        );
        assert!(check_write("colors", 16, 16, 4).is_err());
        assert!(check_write("colors", 16, u64::MAX - 7, 8).is_err());
    }

    #[test]
    fn misaligned_write() {
        assert!(matches!(
            check_write("colors", 16, 0, 3),
            Err(UploadError::Misaligned { .. })
        ));
        assert!(matches!(
            check_write("colors", 16, 4, 4),
            Err(UploadError::Misaligned { .. })
        ));
    }
}
