//! Buffer usage flags and the buffer descriptor.

use bitflags::bitflags;

bitflags! {
    /// What a buffer may be bound or copied as. Bindings and passes check
    /// these before the backend sees the buffer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Vertex input for `set_vertex_input`.
        const VERTEX = 1 << 0;
        /// Index input for indexed draws.
        const INDEX = 1 << 1;
        /// Partition 0 uniform binding.
        const UNIFORM = 1 << 2;
        /// Partition 0 storage binding.
        const STORAGE = 1 << 3;
        /// Indirect draw arguments.
        const INDIRECT = 1 << 4;
        const COPY_SRC = 1 << 5;
        /// Target of queue writes (`set_sub_data`).
        const COPY_DST = 1 << 6;
        /// Host-readable; used by query staging buffers.
        const MAP_READ = 1 << 7;
        const MAP_WRITE = 1 << 8;
        /// Destination of query set resolves.
        const QUERY_RESOLVE = 1 << 9;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Size, usage and label of a buffer to create.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    /// Size in bytes; must be non-zero.
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self {
            label: None,
            size,
            usage,
        }
    }

    /// Attach a debug label, also used as the registry name.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_descriptor_builder() {
        let desc = BufferDescriptor::new(256, BufferUsage::UNIFORM | BufferUsage::COPY_DST)
            .with_label("params");
        assert_eq!(desc.size, 256);
        assert!(desc.usage.contains(BufferUsage::UNIFORM));
        assert_eq!(desc.label.as_deref(), Some("params"));
        assert_eq!(BufferUsage::default(), BufferUsage::empty());
    }
}
