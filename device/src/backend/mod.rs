//! GPU backend abstraction layer.
//!
//! Every device talks to exactly one backend through the [`GpuBackend`]
//! trait. Backends hand out opaque handle enums ([`GpuBuffer`],
//! [`GpuTexture`], ...) that the resource wrappers own and release.
//!
//! # Available Backends
//!
//! - `dummy` (default): headless backend that tracks handle counts and
//!   simulates query results; its binding model is configurable
//! - `wgpu-backend`: WebGPU semantics over wgpu (Vulkan, Metal, DX12, GL)

pub mod dummy;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_impl;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::bindings::BindingPartition;
use crate::error::GraphicsResult;
use crate::instance::{BackendType, BindingModel, InstanceParameters};
use crate::pass::{ComputePass, RenderPass};
use crate::types::{
    BufferDescriptor, ComputePipelineDescriptor, ProgramDescriptor, QueryPoolDescriptor,
    RenderPipelineDescriptor, SamplerDescriptor, TextureDescriptor, TextureDimension,
};

/// Counted placeholder for a native allocation on the dummy backend.
///
/// Clones share one allocation; the backend's live count drops when the last
/// clone is released.
#[derive(Clone)]
pub struct DummyHandle(Arc<DummyAllocation>);

struct DummyAllocation {
    live: Arc<AtomicUsize>,
    mapped: AtomicBool,
}

impl DummyHandle {
    pub(crate) fn new(live: &Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::AcqRel);
        Self(Arc::new(DummyAllocation {
            live: live.clone(),
            mapped: AtomicBool::new(false),
        }))
    }

    /// Mark the allocation as mapped. Returns false if a map is already in progress.
    pub(crate) fn begin_map(&self) -> bool {
        self.0
            .mapped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn end_map(&self) {
        self.0.mapped.store(false, Ordering::Release);
    }
}

impl Drop for DummyAllocation {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for DummyHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DummyHandle({:p})", Arc::as_ptr(&self.0))
    }
}

/// Handle to a GPU buffer resource.
#[derive(Debug, Clone)]
pub enum GpuBuffer {
    /// Dummy backend allocation.
    Dummy(DummyHandle),
    /// wgpu backend buffer.
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu::Buffer),
}

impl GpuBuffer {
    /// Release the native allocation.
    pub(crate) fn release(self) {
        match self {
            Self::Dummy(_) => {}
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu(buffer) => buffer.destroy(),
        }
    }
}

/// Handle to a GPU texture resource and its default view.
#[derive(Debug, Clone)]
pub enum GpuTexture {
    /// Dummy backend allocation.
    Dummy(DummyHandle),
    /// wgpu backend texture.
    #[cfg(feature = "wgpu-backend")]
    Wgpu {
        /// The texture.
        texture: wgpu::Texture,
        /// View matching the descriptor's dimension.
        view: wgpu::TextureView,
    },
}

impl GpuTexture {
    /// Release the native allocation.
    pub(crate) fn release(self) {
        match self {
            Self::Dummy(_) => {}
            #[cfg(feature = "wgpu-backend")]
            Self::Wgpu { texture, .. } => texture.destroy(),
        }
    }
}

/// Handle to a GPU sampler resource.
#[derive(Debug, Clone)]
pub enum GpuSampler {
    /// Dummy backend allocation.
    Dummy(DummyHandle),
    /// wgpu backend sampler.
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu::Sampler),
}

/// Handle to compiled shader stages.
#[derive(Debug, Clone)]
pub enum GpuProgram {
    /// Dummy backend allocation.
    Dummy(DummyHandle),
    /// wgpu shader modules, one per stage.
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu_impl::WgpuProgram),
}

/// Handle to a render or compute pipeline.
#[derive(Debug, Clone)]
pub enum GpuPipeline {
    /// Dummy backend allocation.
    Dummy(DummyHandle),
    /// wgpu render pipeline.
    #[cfg(feature = "wgpu-backend")]
    WgpuRender(wgpu::RenderPipeline),
    /// wgpu compute pipeline.
    #[cfg(feature = "wgpu-backend")]
    WgpuCompute(wgpu::ComputePipeline),
}

/// Handle to a native binding group (or the single table of a flat backend).
#[derive(Debug, Clone)]
pub enum GpuBindGroup {
    /// Dummy backend allocation.
    Dummy(DummyHandle),
    /// wgpu bind group.
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu::BindGroup),
}

/// Handle to a query set.
#[derive(Debug, Clone)]
pub enum GpuQuerySet {
    /// Dummy query set with simulated values.
    Dummy {
        /// Allocation counter.
        handle: DummyHandle,
        /// Values written by submitted passes.
        values: Arc<parking_lot::Mutex<Vec<u64>>>,
    },
    /// wgpu query set.
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu::QuerySet),
}

/// An in-flight query resolution.
#[derive(Debug)]
pub enum QueryReadback {
    /// Values captured at resolve time.
    Dummy(dummy::DummyReadback),
    /// Staging buffer waiting for its map to complete.
    #[cfg(feature = "wgpu-backend")]
    Wgpu(wgpu_impl::WgpuReadback),
}

/// Resource bound at one slot of a native binding group.
#[derive(Debug, Clone)]
pub enum GpuBindingResource {
    /// Uniform or storage buffer range.
    Buffer {
        /// Buffer handle.
        buffer: GpuBuffer,
        /// Byte offset.
        offset: u64,
        /// Byte size, or the rest of the buffer.
        size: Option<u64>,
    },
    /// Sampled texture view.
    TextureView {
        /// Texture handle.
        texture: GpuTexture,
        /// View dimension expected by the binding.
        dimension: TextureDimension,
    },
    /// Sampler.
    Sampler(GpuSampler),
    /// Storage texture view.
    StorageTexture(GpuTexture),
}

/// One slot of a native binding group.
#[derive(Debug, Clone)]
pub struct GpuBindingEntry {
    /// Slot number within the partition's namespace.
    pub binding: u32,
    /// Partition the slot belongs to.
    pub partition: BindingPartition,
    /// Bound resource.
    pub resource: GpuBindingResource,
}

/// GPU backend trait for abstracting different GPU APIs.
pub trait GpuBackend: Send + Sync + 'static {
    /// Get the backend name.
    fn name(&self) -> &'static str;

    /// How binding groups are laid out on this backend.
    fn binding_model(&self) -> BindingModel;

    /// Create a buffer resource.
    fn create_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<GpuBuffer>;

    /// Create a texture resource.
    fn create_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<GpuTexture>;

    /// Create a sampler resource.
    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> GraphicsResult<GpuSampler>;

    /// Compile the stages of a program.
    fn create_program(&self, descriptor: &ProgramDescriptor) -> GraphicsResult<GpuProgram>;

    /// Create a render pipeline. The binding layout is derived from the program.
    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
        program: &GpuProgram,
    ) -> GraphicsResult<GpuPipeline>;

    /// Create a compute pipeline. The binding layout is derived from the program.
    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
        program: &GpuProgram,
    ) -> GraphicsResult<GpuPipeline>;

    /// Create one binding group against the layout the pipeline reports for
    /// `group_index`.
    fn create_bind_group(
        &self,
        pipeline: &GpuPipeline,
        group_index: u32,
        label: Option<&str>,
        entries: &[GpuBindingEntry],
    ) -> GraphicsResult<GpuBindGroup>;

    /// Create a query set.
    fn create_query_set(&self, descriptor: &QueryPoolDescriptor) -> GraphicsResult<GpuQuerySet>;

    /// Write data to a buffer through the queue.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> GraphicsResult<()>;

    /// Write the full first mip level of a texture through the queue.
    fn write_texture(
        &self,
        texture: &GpuTexture,
        descriptor: &TextureDescriptor,
        data: &[u8],
    ) -> GraphicsResult<()>;

    /// Encode and submit a recorded render pass as one command buffer.
    fn submit_render_pass(&self, pass: &RenderPass) -> GraphicsResult<()>;

    /// Encode and submit a recorded compute pass as one command buffer.
    fn submit_compute_pass(&self, pass: &ComputePass) -> GraphicsResult<()>;

    /// Resolve `count` queries into `resolve`, copy them to `staging` and
    /// start mapping it.
    fn begin_query_readback(
        &self,
        query_set: &GpuQuerySet,
        resolve: &GpuBuffer,
        staging: &GpuBuffer,
        count: u32,
    ) -> GraphicsResult<QueryReadback>;

    /// Non-blocking check of a readback. Returns the values once available.
    fn poll_query_readback(&self, readback: &QueryReadback) -> GraphicsResult<Option<Vec<u64>>>;

    /// Number of native handles currently alive, if the backend tracks it.
    fn live_handle_count(&self) -> Option<usize> {
        None
    }
}

/// Selects and creates the backend requested by the parameters.
///
/// `BackendType::Auto` tries wgpu first and falls back to the dummy backend.
pub fn create_backend(params: &InstanceParameters) -> GraphicsResult<Arc<dyn GpuBackend>> {
    match params.backend {
        BackendType::Dummy => create_dummy_backend(params),
        BackendType::Wgpu => create_wgpu_backend(params),
        BackendType::Auto => {
            #[cfg(feature = "wgpu-backend")]
            {
                match create_wgpu_backend(params) {
                    Ok(backend) => return Ok(backend),
                    Err(e) => {
                        log::warn!("Failed to create wgpu backend: {}", e);
                    }
                }
            }
            create_dummy_backend(params)
        }
    }
}

#[cfg(feature = "dummy")]
fn create_dummy_backend(params: &InstanceParameters) -> GraphicsResult<Arc<dyn GpuBackend>> {
    log::info!(
        "Using dummy backend ({:?} binding model)",
        params.binding_model
    );
    Ok(Arc::new(
        dummy::DummyBackend::with_binding_model(params.binding_model)
            .with_readback_polls(params.dummy_readback_polls),
    ))
}

#[cfg(not(feature = "dummy"))]
fn create_dummy_backend(_params: &InstanceParameters) -> GraphicsResult<Arc<dyn GpuBackend>> {
    Err(crate::error::GraphicsError::InitializationFailed(
        "dummy backend is disabled (enable the `dummy` feature)".to_string(),
    ))
}

#[cfg(feature = "wgpu-backend")]
fn create_wgpu_backend(params: &InstanceParameters) -> GraphicsResult<Arc<dyn GpuBackend>> {
    if params.binding_model != BindingModel::Grouped {
        log::warn!("wgpu backend always uses grouped bindings; ignoring requested flat model");
    }
    let backend = wgpu_impl::WgpuBackend::with_params(params)?;
    log::info!("Using wgpu backend");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "wgpu-backend"))]
fn create_wgpu_backend(_params: &InstanceParameters) -> GraphicsResult<Arc<dyn GpuBackend>> {
    Err(crate::error::GraphicsError::InitializationFailed(
        "wgpu backend is disabled (enable the `wgpu-backend` feature)".to_string(),
    ))
}

/// Check if a real GPU backend is compiled in.
pub fn has_gpu_backend() -> bool {
    cfg!(feature = "wgpu-backend")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dummy_handle_counts_allocations() {
        let live = Arc::new(AtomicUsize::new(0));
        let a = DummyHandle::new(&live);
        let b = a.clone();
        let c = DummyHandle::new(&live);
        assert_eq!(live.load(Ordering::Acquire), 2);
        drop(a);
        assert_eq!(live.load(Ordering::Acquire), 2);
        drop(b);
        drop(c);
        assert_eq!(live.load(Ordering::Acquire), 0);
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_create_dummy_backend() {
        let params = InstanceParameters::new().with_backend(BackendType::Dummy);
        let backend = create_backend(&params).unwrap();
        assert_eq!(backend.name(), "Dummy Backend");
        assert_eq!(backend.live_handle_count(), Some(0));
    }
}
