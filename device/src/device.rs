//! Graphics device.
//!
//! The [`GraphicsDevice`] is the main interface for creating GPU resources.
//! It is created by [`GraphicsInstance::create_device`]. Every resource it
//! creates is entered into the device's registry until the resource is
//! explicitly destroyed, so [`GraphicsDevice::check_for_leaks`] can report
//! anything that was forgotten.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::GpuBackend;
use crate::bindings::{BindingPlan, BindingsDescriptor, FallbackProvider};
use crate::error::{GraphicsError, GraphicsResult};
use crate::fallback::FallbackCache;
use crate::instance::{BindingModel, GraphicsInstance};
use crate::pass::{ComputePass, ComputePassDescriptor, Pass, RenderPass, RenderPassDescriptor};
use crate::registry::{LeakReport, ResourceId, ResourceRegistry};
use crate::resources::{
    Bindings, Buffer, COPY_BUFFER_ALIGNMENT, ComputePipeline, InputLayout, Program, QueryPool,
    RenderPipeline, Resource, ResourceType, Sampler, Texture,
};
use crate::types::{
    BufferDescriptor, BufferUsage, ComputePipelineDescriptor, InputLayoutDescriptor,
    ProgramDescriptor, QueryPoolDescriptor, RenderPipelineDescriptor, RenderTargetDescriptor,
    SamplerBindingType, SamplerDescriptor, SamplerFormatKind, TextureDescriptor,
    TextureDimension,
};

/// Limits enforced by the device before calling into the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum texture dimension.
    pub max_texture_dimension: u32,
    /// Maximum buffer size.
    pub max_buffer_size: u64,
    /// Maximum number of slots in one query pool.
    pub max_query_count: u32,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_dimension: 8192,
            max_buffer_size: 1 << 28, // 256 MB
            max_query_count: 4096,
        }
    }
}

/// A graphics device for creating GPU resources.
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync`. The registry and the fallback cache
/// are guarded by mutexes; there is no background work.
///
/// # Example
///
/// ```ignore
/// let device = instance.create_device()?;
/// let buffer = device.create_buffer(&BufferDescriptor::new(256, BufferUsage::UNIFORM))?;
/// // ...
/// buffer.destroy();
/// assert!(device.check_for_leaks().is_empty());
/// ```
pub struct GraphicsDevice {
    self_ref: Weak<GraphicsDevice>,
    instance: Arc<GraphicsInstance>,
    capabilities: DeviceCapabilities,
    registry: Mutex<ResourceRegistry>,
    fallbacks: Mutex<FallbackCache>,
    destroyed: AtomicBool,
}

impl GraphicsDevice {
    /// Create a new graphics device (called by GraphicsInstance).
    pub(crate) fn new(instance: Arc<GraphicsInstance>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            instance,
            capabilities: DeviceCapabilities::default(),
            registry: Mutex::new(ResourceRegistry::new()),
            fallbacks: Mutex::new(FallbackCache::default()),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Get the parent instance.
    pub fn instance(&self) -> &Arc<GraphicsInstance> {
        &self.instance
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Binding model of the backend.
    pub fn binding_model(&self) -> BindingModel {
        self.backend().binding_model()
    }

    pub(crate) fn backend(&self) -> &Arc<dyn GpuBackend> {
        self.instance.backend()
    }

    /// Number of native handles alive on the backend, if it tracks them.
    pub fn live_handle_count(&self) -> Option<usize> {
        self.backend().live_handle_count()
    }

    fn check_alive(&self) -> GraphicsResult<()> {
        if self.is_destroyed() {
            return Err(GraphicsError::DeviceLost);
        }
        Ok(())
    }

    fn register<R: Resource>(&self, resource: R) -> Arc<R> {
        self.registry
            .lock()
            .register(resource.id(), resource.resource_type(), resource.name());
        log::trace!(
            "GraphicsDevice: created {} {} {:?}",
            resource.resource_type(),
            resource.id(),
            resource.name()
        );
        Arc::new(resource)
    }

    pub(crate) fn unregister_resource(&self, id: ResourceId) {
        if !self.registry.lock().unregister(id) {
            log::warn!("Resource {} was not registered with this device", id);
        }
    }

    /// Create a GPU buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the size is zero or exceeds device limits, or if
    /// the backend allocation fails.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<Arc<Buffer>> {
        self.check_alive()?;
        if descriptor.size == 0 {
            return Err(GraphicsError::InvalidDescriptor(
                "buffer size cannot be zero".to_string(),
            ));
        }
        if descriptor.size > self.capabilities.max_buffer_size {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "buffer size {} exceeds maximum {}",
                descriptor.size, self.capabilities.max_buffer_size
            )));
        }
        let handle = self.backend().create_buffer(descriptor)?;
        Ok(self.register(Buffer::new(
            self.self_ref.clone(),
            descriptor.clone(),
            handle,
        )))
    }

    /// Create a buffer and upload `data` into it.
    ///
    /// `COPY_DST` is added to the usage. The buffer is at least as large as
    /// `data` rounded up to the copy alignment.
    pub fn create_buffer_init(
        &self,
        descriptor: &BufferDescriptor,
        data: &[u8],
    ) -> GraphicsResult<Arc<Buffer>> {
        let padded_len = (data.len() as u64).next_multiple_of(COPY_BUFFER_ALIGNMENT);
        let mut descriptor = descriptor.clone();
        descriptor.size = descriptor.size.max(padded_len);
        descriptor.usage |= BufferUsage::COPY_DST;

        let buffer = self.create_buffer(&descriptor)?;
        let result = if padded_len == data.len() as u64 {
            buffer.set_sub_data(0, data)
        } else {
            let mut padded = data.to_vec();
            padded.resize(padded_len as usize, 0);
            buffer.set_sub_data(0, &padded)
        };
        if let Err(e) = result {
            buffer.destroy();
            return Err(e);
        }
        Ok(buffer)
    }

    fn validate_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<()> {
        let size = descriptor.size;
        if size.width == 0 || size.height == 0 || size.depth == 0 {
            return Err(GraphicsError::InvalidDescriptor(
                "texture dimensions cannot be zero".to_string(),
            ));
        }
        let max_dim = self.capabilities.max_texture_dimension;
        if size.width > max_dim || size.height > max_dim || size.depth > max_dim {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "texture dimension exceeds maximum {max_dim}"
            )));
        }
        if descriptor.mip_level_count == 0 || descriptor.sample_count == 0 {
            return Err(GraphicsError::InvalidDescriptor(
                "mip level and sample counts must be at least 1".to_string(),
            ));
        }
        if descriptor.sample_count > 1 && descriptor.mip_level_count > 1 {
            return Err(GraphicsError::InvalidDescriptor(
                "multisampled textures cannot have mip levels".to_string(),
            ));
        }
        if matches!(
            descriptor.dimension,
            TextureDimension::Cube | TextureDimension::CubeArray
        ) && (size.width != size.height || size.depth % 6 != 0)
        {
            return Err(GraphicsError::InvalidDescriptor(
                "cube textures need square faces and a multiple of 6 layers".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a GPU texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor is inconsistent or exceeds device
    /// limits, or if the backend allocation fails.
    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<Arc<Texture>> {
        self.check_alive()?;
        self.validate_texture(descriptor)?;
        let handle = self.backend().create_texture(descriptor)?;
        Ok(self.register(Texture::new(
            self.self_ref.clone(),
            ResourceType::Texture,
            descriptor.clone(),
            handle,
        )))
    }

    /// Create a 2D texture usable as a render pass attachment.
    pub fn create_render_target(
        &self,
        descriptor: &RenderTargetDescriptor,
    ) -> GraphicsResult<Arc<Texture>> {
        self.check_alive()?;
        let descriptor = descriptor.to_texture_descriptor();
        self.validate_texture(&descriptor)?;
        let handle = self.backend().create_texture(&descriptor)?;
        Ok(self.register(Texture::new(
            self.self_ref.clone(),
            ResourceType::RenderTarget,
            descriptor,
            handle,
        )))
    }

    /// Create a texture sampler.
    pub fn create_sampler(&self, descriptor: &SamplerDescriptor) -> GraphicsResult<Arc<Sampler>> {
        self.check_alive()?;
        let handle = self.backend().create_sampler(descriptor)?;
        Ok(self.register(Sampler::new(
            self.self_ref.clone(),
            descriptor.clone(),
            handle,
        )))
    }

    /// Compile a shader program.
    ///
    /// A program holds either a vertex stage (with an optional fragment
    /// stage) or a compute stage.
    pub fn create_program(&self, descriptor: &ProgramDescriptor) -> GraphicsResult<Arc<Program>> {
        self.check_alive()?;
        match (descriptor.is_render(), descriptor.is_compute()) {
            (true, true) => {
                return Err(GraphicsError::InvalidDescriptor(
                    "program cannot mix render and compute stages".to_string(),
                ));
            }
            (false, false) => {
                return Err(GraphicsError::InvalidDescriptor(
                    "program needs a vertex or a compute stage".to_string(),
                ));
            }
            _ => {}
        }
        if descriptor.fragment.is_some() && !descriptor.is_render() {
            return Err(GraphicsError::InvalidDescriptor(
                "fragment stage given without a vertex stage".to_string(),
            ));
        }
        let handle = self.backend().create_program(descriptor)?;
        Ok(self.register(Program::new(
            self.self_ref.clone(),
            descriptor.clone(),
            handle,
        )))
    }

    /// Create a vertex input layout.
    pub fn create_input_layout(
        &self,
        descriptor: &InputLayoutDescriptor,
    ) -> GraphicsResult<Arc<InputLayout>> {
        self.check_alive()?;
        descriptor.validate()?;
        Ok(self.register(InputLayout::new(self.self_ref.clone(), descriptor.clone())))
    }

    /// Create a render pipeline.
    pub fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
    ) -> GraphicsResult<Arc<RenderPipeline>> {
        self.check_alive()?;
        let program = &descriptor.program;
        if !program.descriptor().is_render() {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "program {} has no vertex stage",
                program.id()
            )));
        }
        if descriptor.input_layout.is_destroyed() {
            return Err(GraphicsError::ResourceDestroyed(format!(
                "input layout {}",
                descriptor.input_layout.id()
            )));
        }
        if let Some(format) = descriptor
            .color_formats
            .iter()
            .find(|format| format.is_depth_stencil())
        {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "{format:?} is not a color format"
            )));
        }
        if let Some(format) = descriptor.depth_stencil_format
            && !format.is_depth_stencil()
        {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "{format:?} is not a depth-stencil format"
            )));
        }
        let gpu_program = program.gpu_handle().ok_or_else(|| {
            GraphicsError::ResourceDestroyed(format!("program {}", program.id()))
        })?;
        let handle = self
            .backend()
            .create_render_pipeline(descriptor, &gpu_program)?;
        Ok(self.register(RenderPipeline::new(
            self.self_ref.clone(),
            descriptor.clone(),
            handle,
        )))
    }

    /// Create a compute pipeline.
    pub fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
    ) -> GraphicsResult<Arc<ComputePipeline>> {
        self.check_alive()?;
        let program = &descriptor.program;
        if !program.descriptor().is_compute() {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "program {} has no compute stage",
                program.id()
            )));
        }
        let gpu_program = program.gpu_handle().ok_or_else(|| {
            GraphicsError::ResourceDestroyed(format!("program {}", program.id()))
        })?;
        let handle = self
            .backend()
            .create_compute_pipeline(descriptor, &gpu_program)?;
        Ok(self.register(ComputePipeline::new(
            self.self_ref.clone(),
            descriptor.clone(),
            handle,
        )))
    }

    /// Create bindings against the descriptor's pipeline.
    ///
    /// Missing textures and samplers in sampler bindings are replaced by
    /// device fallbacks. Creation is all-or-nothing: if any native group
    /// fails, the groups created so far are dropped and nothing is
    /// registered.
    pub fn create_bindings(&self, descriptor: &BindingsDescriptor) -> GraphicsResult<Arc<Bindings>> {
        self.check_alive()?;
        let plan = BindingPlan::build(descriptor, self)?;
        let pipeline = descriptor.pipeline.as_ref().ok_or_else(|| {
            GraphicsError::InvalidDescriptor("bindings require a pipeline".to_string())
        })?;
        let gpu_pipeline = pipeline.gpu_handle().ok_or_else(|| {
            GraphicsError::ResourceDestroyed(format!("pipeline {}", pipeline.id()))
        })?;

        let backend = self.backend();
        let label = descriptor.label.as_deref();
        let gpu_groups = match backend.binding_model() {
            BindingModel::Grouped => plan
                .groups()
                .iter()
                .map(|group| {
                    let entries = group.gpu_entries()?;
                    let handle = backend.create_bind_group(
                        &gpu_pipeline,
                        group.group_index,
                        label,
                        &entries,
                    )?;
                    Ok((group.group_index, handle))
                })
                .collect::<GraphicsResult<Vec<_>>>()?,
            BindingModel::Flat if plan.is_empty() => Vec::new(),
            BindingModel::Flat => {
                let entries = plan
                    .flatten()
                    .iter()
                    .map(|entry| entry.gpu_entry())
                    .collect::<GraphicsResult<Vec<_>>>()?;
                vec![(0, backend.create_bind_group(&gpu_pipeline, 0, label, &entries)?)]
            }
        };

        Ok(self.register(Bindings::new(
            self.self_ref.clone(),
            descriptor.label.clone(),
            pipeline.id(),
            plan,
            gpu_groups,
        )))
    }

    /// Create a query pool with its resolve and staging buffers.
    pub fn create_query_pool(
        &self,
        descriptor: &QueryPoolDescriptor,
    ) -> GraphicsResult<Arc<QueryPool>> {
        self.check_alive()?;
        if descriptor.elem_count == 0 || descriptor.elem_count > self.capabilities.max_query_count
        {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "query pool size {} must be between 1 and {}",
                descriptor.elem_count, self.capabilities.max_query_count
            )));
        }
        let backend = self.backend();
        let query_set = backend.create_query_set(descriptor)?;
        let size = descriptor.result_buffer_size();
        let resolve = backend.create_buffer(
            &BufferDescriptor::new(size, BufferUsage::QUERY_RESOLVE | BufferUsage::COPY_SRC)
                .with_label("query resolve"),
        )?;
        let staging = match backend.create_buffer(
            &BufferDescriptor::new(size, BufferUsage::COPY_DST | BufferUsage::MAP_READ)
                .with_label("query staging"),
        ) {
            Ok(staging) => staging,
            Err(e) => {
                resolve.release();
                return Err(e);
            }
        };
        Ok(self.register(QueryPool::new(
            self.self_ref.clone(),
            descriptor.clone(),
            query_set,
            resolve,
            staging,
        )))
    }

    /// Start recording a render pass.
    pub fn create_render_pass(&self, descriptor: RenderPassDescriptor) -> GraphicsResult<RenderPass> {
        self.check_alive()?;
        RenderPass::new(descriptor)
    }

    /// Start recording a compute pass.
    pub fn create_compute_pass(
        &self,
        descriptor: ComputePassDescriptor,
    ) -> GraphicsResult<ComputePass> {
        self.check_alive()?;
        ComputePass::new(descriptor)
    }

    /// Encode and submit a recorded pass.
    pub fn submit_pass(&self, pass: impl Into<Pass>) -> GraphicsResult<()> {
        self.check_alive()?;
        match pass.into() {
            Pass::Render(pass) => {
                pass.check_finished()?;
                log::trace!(
                    "GraphicsDevice: submitting render pass {:?}",
                    pass.descriptor().label
                );
                self.backend().submit_render_pass(&pass)
            }
            Pass::Compute(pass) => {
                log::trace!(
                    "GraphicsDevice: submitting compute pass {:?}",
                    pass.descriptor().label
                );
                self.backend().submit_compute_pass(&pass)
            }
        }
    }

    /// Start reading back every slot of a query pool.
    ///
    /// The readback completes asynchronously; observe it through
    /// [`QueryPool::query_result_occlusion`] or [`QueryPool::results`].
    pub fn resolve_query_pool(&self, pool: &QueryPool) -> GraphicsResult<()> {
        self.check_alive()?;
        pool.begin_resolve(self.backend().as_ref())
    }

    /// Set the debug name of a resource and of its registry entry.
    pub fn set_resource_name(&self, resource: &dyn Resource, name: &str) {
        resource.base().set_name(name);
        self.registry.lock().set_name(resource.id(), name);
    }

    /// Number of resources created and not yet destroyed.
    pub fn live_resource_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// Returns true if the id belongs to a live resource of this device.
    pub fn is_registered(&self, id: ResourceId) -> bool {
        self.registry.lock().contains(id)
    }

    /// Number of fallback textures and samplers created so far.
    pub fn fallback_count(&self) -> usize {
        self.fallbacks.lock().len()
    }

    /// Report every resource that was created but never destroyed.
    ///
    /// Each leak is logged as a warning; nothing is freed.
    pub fn check_for_leaks(&self) -> LeakReport {
        let report = self.registry.lock().leak_report();
        for leaked in report.iter() {
            log::warn!("Leaked {}", leaked);
        }
        report
    }

    /// Returns true once [`GraphicsDevice::destroy`] has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Release the fallback resources and stop accepting new work.
    ///
    /// Calling this more than once is a no-op. The registry is kept so leaks
    /// stay reportable after teardown.
    pub fn destroy(&self) {
        if self
            .destroyed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        self.fallbacks.lock().release_all();
        log::info!(
            "GraphicsDevice destroyed ({} resources still registered)",
            self.live_resource_count()
        );
    }
}

impl FallbackProvider for GraphicsDevice {
    fn fallback_texture(
        &self,
        dimension: TextureDimension,
        kind: SamplerFormatKind,
    ) -> GraphicsResult<Arc<Texture>> {
        self.check_alive()?;
        self.fallbacks
            .lock()
            .texture(&self.self_ref, self.backend().as_ref(), dimension, kind)
    }

    fn fallback_sampler(&self, ty: SamplerBindingType) -> GraphicsResult<Arc<Sampler>> {
        self.check_alive()?;
        self.fallbacks
            .lock()
            .sampler(&self.self_ref, self.backend().as_ref(), ty)
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("backend", &self.backend().name())
            .field("live_resources", &self.live_resource_count())
            .field("fallbacks", &self.fallback_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

// Ensure GraphicsDevice is Send + Sync
static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);
