//! GPU buffer resource.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::GpuBuffer;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{BufferDescriptor, BufferUsage};

use super::{Resource, ResourceBase, ResourceType};

/// Required alignment of buffer write offsets and sizes.
pub const COPY_BUFFER_ALIGNMENT: u64 = 4;

/// A GPU buffer resource.
///
/// Buffers are created by [`GraphicsDevice::create_buffer`] and are reference-counted.
/// They hold a weak reference back to their parent device.
///
/// # Example
///
/// ```ignore
/// let buffer = device.create_buffer(&BufferDescriptor::new(1024, BufferUsage::UNIFORM))?;
/// buffer.set_sub_data(0, &params_bytes)?;
/// buffer.destroy();
/// ```
pub struct Buffer {
    base: ResourceBase,
    descriptor: BufferDescriptor,
    gpu_handle: Mutex<Option<GpuBuffer>>,
}

impl Buffer {
    /// Create a new buffer (called by GraphicsDevice).
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        descriptor: BufferDescriptor,
        gpu_handle: GpuBuffer,
    ) -> Self {
        Self {
            base: ResourceBase::new(device, ResourceType::Buffer, descriptor.label.clone()),
            descriptor,
            gpu_handle: Mutex::new(Some(gpu_handle)),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.base.device()
    }

    /// Get the buffer descriptor.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Get the buffer size in bytes.
    pub fn size(&self) -> u64 {
        self.descriptor.size
    }

    /// Get the buffer usage flags.
    pub fn usage(&self) -> BufferUsage {
        self.descriptor.usage
    }

    /// Get the backend handle, or `None` once destroyed.
    pub(crate) fn gpu_handle(&self) -> Option<GpuBuffer> {
        self.gpu_handle.lock().clone()
    }

    /// Write `data` at `offset` through the device queue.
    ///
    /// Offset and length must be multiples of 4 and the range must lie
    /// inside the buffer.
    pub fn set_sub_data(&self, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        let Some(handle) = self.gpu_handle() else {
            return Err(GraphicsError::ResourceDestroyed(format!("buffer {}", self.id())));
        };
        let len = data.len() as u64;
        if offset % COPY_BUFFER_ALIGNMENT != 0 || len % COPY_BUFFER_ALIGNMENT != 0 {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "buffer write at offset {offset} with length {len} is not {COPY_BUFFER_ALIGNMENT}-byte aligned"
            )));
        }
        if offset.checked_add(len).is_none_or(|end| end > self.descriptor.size) {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "buffer write of {len} bytes at offset {offset} exceeds size {}",
                self.descriptor.size
            )));
        }
        if !self.descriptor.usage.contains(BufferUsage::COPY_DST) {
            return Err(GraphicsError::InvalidDescriptor(
                "buffer writes require COPY_DST usage".to_string(),
            ));
        }
        let device = self.device().ok_or(GraphicsError::DeviceLost)?;
        device.backend().write_buffer(&handle, offset, data)
    }

    /// Write a slice of plain-old-data values at `offset`.
    pub fn set_sub_data_pod<T: bytemuck::Pod>(&self, offset: u64, data: &[T]) -> GraphicsResult<()> {
        self.set_sub_data(offset, bytemuck::cast_slice(data))
    }
}

impl Resource for Buffer {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn destroy(&self) {
        if self.base.mark_destroyed()
            && let Some(handle) = self.gpu_handle.lock().take()
        {
            handle.release();
        }
    }
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.base.id())
            .field("size", &self.descriptor.size)
            .field("usage", &self.descriptor.usage)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Buffer is Send + Sync
static_assertions::assert_impl_all!(Buffer: Send, Sync);
