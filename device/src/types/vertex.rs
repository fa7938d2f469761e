//! Vertex input layout descriptors.
//!
//! An input layout describes how vertex buffers bound to slots 0, 1, 2, ...
//! feed shader locations. Attributes reference the slot they read from via
//! `buffer_index`.

use crate::error::{GraphicsError, GraphicsResult};

/// Data format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexFormat {
    /// Single 32-bit float.
    Float32,
    /// Two 32-bit floats.
    Float32x2,
    /// Three 32-bit floats.
    Float32x3,
    /// Four 32-bit floats.
    Float32x4,
    /// Single 32-bit signed integer.
    Sint32,
    /// Single 32-bit unsigned integer.
    Uint32,
    /// Four 8-bit unsigned integers, normalized to 0.0-1.0.
    Unorm8x4,
}

impl VertexFormat {
    /// Get the size in bytes of this format.
    pub fn size(&self) -> u32 {
        match self {
            Self::Float32 | Self::Sint32 | Self::Uint32 | Self::Unorm8x4 => 4,
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
        }
    }
}

/// Index buffer element format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexFormat {
    /// 16-bit indices.
    Uint16,
    /// 32-bit indices.
    #[default]
    Uint32,
}

/// How the vertex buffer advances: per-vertex or per-instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VertexStepMode {
    /// Buffer advances once per vertex (default).
    #[default]
    Vertex,
    /// Buffer advances once per instance.
    Instance,
}

/// Describes a single vertex buffer slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexBufferDescriptor {
    /// Stride in bytes between consecutive elements.
    pub byte_stride: u32,
    /// How the buffer advances.
    pub step_mode: VertexStepMode,
}

impl VertexBufferDescriptor {
    /// Create a per-vertex buffer slot.
    pub fn new(byte_stride: u32) -> Self {
        Self {
            byte_stride,
            step_mode: VertexStepMode::Vertex,
        }
    }

    /// Create a per-instance buffer slot.
    pub fn per_instance(byte_stride: u32) -> Self {
        Self {
            byte_stride,
            step_mode: VertexStepMode::Instance,
        }
    }
}

/// A single vertex attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexAttributeDescriptor {
    /// Shader location.
    pub location: u32,
    /// Index of the vertex buffer slot this attribute reads from.
    pub buffer_index: u32,
    /// Byte offset within one element of the buffer.
    pub buffer_byte_offset: u32,
    /// Data format.
    pub format: VertexFormat,
}

impl VertexAttributeDescriptor {
    /// Create a new vertex attribute.
    pub fn new(location: u32, buffer_index: u32, buffer_byte_offset: u32, format: VertexFormat) -> Self {
        Self {
            location,
            buffer_index,
            buffer_byte_offset,
            format,
        }
    }
}

/// Descriptor for an input layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct InputLayoutDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Vertex buffer slots, in slot order.
    pub vertex_buffers: Vec<VertexBufferDescriptor>,
    /// Attributes across all slots.
    pub attributes: Vec<VertexAttributeDescriptor>,
    /// Index format, if indexed draws are used.
    pub index_format: Option<IndexFormat>,
}

impl InputLayoutDescriptor {
    /// Create an empty input layout (no vertex inputs).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a vertex buffer slot.
    pub fn with_buffer(mut self, buffer: VertexBufferDescriptor) -> Self {
        self.vertex_buffers.push(buffer);
        self
    }

    /// Add an attribute.
    pub fn with_attribute(mut self, attribute: VertexAttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Set the index format.
    pub fn with_index_format(mut self, format: IndexFormat) -> Self {
        self.index_format = Some(format);
        self
    }

    /// Check that every attribute fits inside its buffer slot and that no
    /// shader location is used twice.
    pub fn validate(&self) -> GraphicsResult<()> {
        let mut locations = Vec::with_capacity(self.attributes.len());
        for attribute in &self.attributes {
            let Some(buffer) = self.vertex_buffers.get(attribute.buffer_index as usize) else {
                return Err(GraphicsError::InvalidDescriptor(format!(
                    "attribute at location {} reads buffer {} but only {} buffers are declared",
                    attribute.location,
                    attribute.buffer_index,
                    self.vertex_buffers.len()
                )));
            };
            let end = attribute.buffer_byte_offset + attribute.format.size();
            if buffer.byte_stride != 0 && end > buffer.byte_stride {
                return Err(GraphicsError::InvalidDescriptor(format!(
                    "attribute at location {} ends at byte {end}, past stride {}",
                    attribute.location, buffer.byte_stride
                )));
            }
            if locations.contains(&attribute.location) {
                return Err(GraphicsError::InvalidDescriptor(format!(
                    "shader location {} is used twice",
                    attribute.location
                )));
            }
            locations.push(attribute.location);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_color_layout() -> InputLayoutDescriptor {
        InputLayoutDescriptor::new()
            .with_buffer(VertexBufferDescriptor::new(12))
            .with_buffer(VertexBufferDescriptor::per_instance(16))
            .with_attribute(VertexAttributeDescriptor::new(0, 0, 0, VertexFormat::Float32x3))
            .with_attribute(VertexAttributeDescriptor::new(1, 1, 0, VertexFormat::Float32x4))
    }

    #[test]
    fn test_valid_layout() {
        assert!(position_color_layout().validate().is_ok());
    }

    #[test]
    fn test_attribute_buffer_out_of_range() {
        let layout = position_color_layout()
            .with_attribute(VertexAttributeDescriptor::new(2, 2, 0, VertexFormat::Float32));
        assert!(matches!(
            layout.validate(),
            Err(GraphicsError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_attribute_past_stride() {
        let layout = InputLayoutDescriptor::new()
            .with_buffer(VertexBufferDescriptor::new(8))
            .with_attribute(VertexAttributeDescriptor::new(0, 0, 0, VertexFormat::Float32x3));
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_duplicate_location() {
        let layout = position_color_layout()
            .with_attribute(VertexAttributeDescriptor::new(0, 1, 0, VertexFormat::Float32));
        assert!(layout.validate().is_err());
    }
}
