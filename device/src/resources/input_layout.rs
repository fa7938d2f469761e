//! Vertex input layout resource.

use std::sync::{Arc, Weak};

use crate::device::GraphicsDevice;
use crate::types::{IndexFormat, InputLayoutDescriptor, VertexBufferDescriptor};

use super::{Resource, ResourceBase, ResourceType};

/// A validated vertex input layout.
///
/// Input layouts are CPU-only: they own no backend handle and are consumed
/// when pipelines are created and vertex input is bound. They still go
/// through the registry so that a forgotten `destroy()` shows up as a leak.
pub struct InputLayout {
    base: ResourceBase,
    descriptor: InputLayoutDescriptor,
}

impl InputLayout {
    pub(crate) fn new(device: Weak<GraphicsDevice>, descriptor: InputLayoutDescriptor) -> Self {
        Self {
            base: ResourceBase::new(device, ResourceType::InputLayout, descriptor.label.clone()),
            descriptor,
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.base.device()
    }

    /// Get the layout descriptor.
    pub fn descriptor(&self) -> &InputLayoutDescriptor {
        &self.descriptor
    }

    /// Vertex buffer slots.
    pub fn vertex_buffers(&self) -> &[VertexBufferDescriptor] {
        &self.descriptor.vertex_buffers
    }

    /// Index format, if the layout declares one.
    pub fn index_format(&self) -> Option<IndexFormat> {
        self.descriptor.index_format
    }
}

impl Resource for InputLayout {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn destroy(&self) {
        self.base.mark_destroyed();
    }
}

impl std::fmt::Debug for InputLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputLayout")
            .field("id", &self.base.id())
            .field("buffers", &self.descriptor.vertex_buffers.len())
            .field("attributes", &self.descriptor.attributes.len())
            .field("index_format", &self.descriptor.index_format)
            .finish()
    }
}

// Ensure InputLayout is Send + Sync
static_assertions::assert_impl_all!(InputLayout: Send, Sync);
