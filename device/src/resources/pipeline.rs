//! Render and compute pipeline resources.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::GpuPipeline;
use crate::device::GraphicsDevice;
use crate::registry::ResourceId;
use crate::types::{ComputePipelineDescriptor, RenderPipelineDescriptor};

use super::{InputLayout, Resource, ResourceBase, ResourceType};

/// A render pipeline.
pub struct RenderPipeline {
    base: ResourceBase,
    descriptor: RenderPipelineDescriptor,
    gpu_handle: Mutex<Option<GpuPipeline>>,
}

impl RenderPipeline {
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        descriptor: RenderPipelineDescriptor,
        gpu_handle: GpuPipeline,
    ) -> Self {
        Self {
            base: ResourceBase::new(
                device,
                ResourceType::RenderPipeline,
                descriptor.label.clone(),
            ),
            descriptor,
            gpu_handle: Mutex::new(Some(gpu_handle)),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.base.device()
    }

    /// Get the pipeline descriptor.
    pub fn descriptor(&self) -> &RenderPipelineDescriptor {
        &self.descriptor
    }

    /// Input layout the pipeline was created with.
    pub fn input_layout(&self) -> &Arc<InputLayout> {
        &self.descriptor.input_layout
    }

    pub(crate) fn gpu_handle(&self) -> Option<GpuPipeline> {
        self.gpu_handle.lock().clone()
    }
}

impl Resource for RenderPipeline {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn destroy(&self) {
        if self.base.mark_destroyed() {
            self.gpu_handle.lock().take();
        }
    }
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("id", &self.base.id())
            .field("topology", &self.descriptor.topology)
            .field("color_formats", &self.descriptor.color_formats)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

/// A compute pipeline.
pub struct ComputePipeline {
    base: ResourceBase,
    descriptor: ComputePipelineDescriptor,
    gpu_handle: Mutex<Option<GpuPipeline>>,
}

impl ComputePipeline {
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        descriptor: ComputePipelineDescriptor,
        gpu_handle: GpuPipeline,
    ) -> Self {
        Self {
            base: ResourceBase::new(
                device,
                ResourceType::ComputePipeline,
                descriptor.label.clone(),
            ),
            descriptor,
            gpu_handle: Mutex::new(Some(gpu_handle)),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.base.device()
    }

    /// Get the pipeline descriptor.
    pub fn descriptor(&self) -> &ComputePipelineDescriptor {
        &self.descriptor
    }

    pub(crate) fn gpu_handle(&self) -> Option<GpuPipeline> {
        self.gpu_handle.lock().clone()
    }
}

impl Resource for ComputePipeline {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn destroy(&self) {
        if self.base.mark_destroyed() {
            self.gpu_handle.lock().take();
        }
    }
}

impl std::fmt::Debug for ComputePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputePipeline")
            .field("id", &self.base.id())
            .field("label", &self.descriptor.label)
            .finish()
    }
}

/// Either kind of pipeline, as accepted by bindings descriptors.
#[derive(Debug, Clone)]
pub enum Pipeline {
    /// A render pipeline.
    Render(Arc<RenderPipeline>),
    /// A compute pipeline.
    Compute(Arc<ComputePipeline>),
}

impl Pipeline {
    /// Id of the wrapped pipeline.
    pub fn id(&self) -> ResourceId {
        match self {
            Self::Render(pipeline) => pipeline.id(),
            Self::Compute(pipeline) => pipeline.id(),
        }
    }

    /// Returns true once the wrapped pipeline has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        match self {
            Self::Render(pipeline) => pipeline.is_destroyed(),
            Self::Compute(pipeline) => pipeline.is_destroyed(),
        }
    }

    pub(crate) fn gpu_handle(&self) -> Option<GpuPipeline> {
        match self {
            Self::Render(pipeline) => pipeline.gpu_handle(),
            Self::Compute(pipeline) => pipeline.gpu_handle(),
        }
    }
}

impl From<Arc<RenderPipeline>> for Pipeline {
    fn from(pipeline: Arc<RenderPipeline>) -> Self {
        Self::Render(pipeline)
    }
}

impl From<Arc<ComputePipeline>> for Pipeline {
    fn from(pipeline: Arc<ComputePipeline>) -> Self {
        Self::Compute(pipeline)
    }
}

// Ensure pipelines are Send + Sync
static_assertions::assert_impl_all!(RenderPipeline: Send, Sync);
static_assertions::assert_impl_all!(ComputePipeline: Send, Sync);
