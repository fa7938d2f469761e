//! wgpu GPU backend implementation.
//!
//! This backend uses wgpu for cross-platform GPU access, supporting
//! Vulkan, Metal, DX12, GL and WebGPU. Pipelines derive their binding
//! layouts from the shaders, so bind groups are created against
//! `get_bind_group_layout` of the pipeline they will be used with.

pub(crate) mod conversion;
mod pass_encoding;
mod resources;

use std::sync::Arc;

use crate::error::{GraphicsError, GraphicsResult};
use crate::instance::{BindingModel, InstanceParameters};
use crate::pass::{ComputePass, RenderPass};
use crate::types::{
    BufferDescriptor, ComputePipelineDescriptor, ProgramDescriptor, QueryPoolDescriptor,
    RenderPipelineDescriptor, SamplerDescriptor, TextureDescriptor,
};

use super::{
    GpuBackend, GpuBindGroup, GpuBindingEntry, GpuBuffer, GpuPipeline, GpuProgram, GpuQuerySet,
    GpuSampler, GpuTexture, QueryReadback,
};

/// A compiled shader module and the entry point used from it.
#[derive(Debug, Clone)]
pub struct WgpuStage {
    pub(crate) module: wgpu::ShaderModule,
    pub(crate) entry_point: String,
}

/// Compiled stages of a program.
#[derive(Debug, Clone)]
pub struct WgpuProgram {
    pub(crate) vertex: Option<WgpuStage>,
    pub(crate) fragment: Option<WgpuStage>,
    pub(crate) compute: Option<WgpuStage>,
}

#[derive(Debug)]
pub(crate) enum MapState {
    Pending,
    Mapped,
    Consumed,
    Failed(String),
}

/// Query values on their way back from the GPU.
#[derive(Debug)]
pub struct WgpuReadback {
    staging: wgpu::Buffer,
    size: u64,
    state: Arc<parking_lot::Mutex<MapState>>,
}

impl Drop for WgpuReadback {
    fn drop(&mut self) {
        // Abandoned readbacks must give the staging buffer back for the next resolve.
        let mapped = matches!(*self.state.lock(), MapState::Pending | MapState::Mapped);
        // The map callback takes the state lock, and unmap may run it inline.
        if mapped {
            self.staging.unmap();
        }
    }
}

/// wgpu-based GPU backend.
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    adapter: wgpu::Adapter,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    timestamp_queries: bool,
}

impl std::fmt::Debug for WgpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBackend")
            .field("adapter", &self.adapter.get_info().name)
            .field("timestamp_queries", &self.timestamp_queries)
            .finish()
    }
}

impl WgpuBackend {
    /// Create a new wgpu backend with default parameters.
    pub fn new() -> GraphicsResult<Self> {
        Self::with_params(&InstanceParameters::default())
    }

    /// Create a new wgpu backend with custom parameters.
    pub fn with_params(params: &InstanceParameters) -> GraphicsResult<Self> {
        let backends = params.wgpu_backend.to_wgpu_backends();

        // Configure instance flags based on validation/debug settings
        let mut flags = wgpu::InstanceFlags::default();
        if params.validation {
            flags |= wgpu::InstanceFlags::VALIDATION;
            flags |= wgpu::InstanceFlags::GPU_BASED_VALIDATION;
        }
        if params.debug {
            flags |= wgpu::InstanceFlags::DEBUG;
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            flags,
            backend_options: wgpu::BackendOptions::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        });

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("No compatible GPU adapter: {e}")))?;

        log::info!("wgpu adapter: {:?}", adapter.get_info());

        // Timestamps are optional; pools of that type fail on adapters without them.
        let timestamp_queries = adapter.features().contains(wgpu::Features::TIMESTAMP_QUERY);
        let required_features = if timestamp_queries {
            wgpu::Features::TIMESTAMP_QUERY
        } else {
            log::debug!("wgpu adapter does not support timestamp queries");
            wgpu::Features::empty()
        };

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Prism Device"),
            required_features,
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::default(),
            experimental_features: wgpu::ExperimentalFeatures::default(),
            trace: wgpu::Trace::Off,
        }))
        .map_err(|e| GraphicsError::InitializationFailed(format!("Device creation failed: {e}")))?;

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            timestamp_queries,
        })
    }

    /// Get the wgpu adapter.
    pub fn adapter(&self) -> &wgpu::Adapter {
        &self.adapter
    }

    /// Get the wgpu device.
    pub fn device(&self) -> &Arc<wgpu::Device> {
        &self.device
    }

    /// Get the wgpu queue.
    pub fn queue(&self) -> &Arc<wgpu::Queue> {
        &self.queue
    }

    /// Returns true if timestamp query pools can be created.
    pub fn supports_timestamp_queries(&self) -> bool {
        self.timestamp_queries
    }
}

impl GpuBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu Backend"
    }

    fn binding_model(&self) -> BindingModel {
        BindingModel::Grouped
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<GpuBuffer> {
        WgpuBackend::create_buffer(self, descriptor)
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<GpuTexture> {
        WgpuBackend::create_texture(self, descriptor)
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> GraphicsResult<GpuSampler> {
        WgpuBackend::create_sampler(self, descriptor)
    }

    fn create_program(&self, descriptor: &ProgramDescriptor) -> GraphicsResult<GpuProgram> {
        WgpuBackend::create_program(self, descriptor)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
        program: &GpuProgram,
    ) -> GraphicsResult<GpuPipeline> {
        WgpuBackend::create_render_pipeline(self, descriptor, program)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
        program: &GpuProgram,
    ) -> GraphicsResult<GpuPipeline> {
        WgpuBackend::create_compute_pipeline(self, descriptor, program)
    }

    fn create_bind_group(
        &self,
        pipeline: &GpuPipeline,
        group_index: u32,
        label: Option<&str>,
        entries: &[GpuBindingEntry],
    ) -> GraphicsResult<GpuBindGroup> {
        WgpuBackend::create_bind_group(self, pipeline, group_index, label, entries)
    }

    fn create_query_set(&self, descriptor: &QueryPoolDescriptor) -> GraphicsResult<GpuQuerySet> {
        WgpuBackend::create_query_set(self, descriptor)
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        WgpuBackend::write_buffer(self, buffer, offset, data)
    }

    fn write_texture(
        &self,
        texture: &GpuTexture,
        descriptor: &TextureDescriptor,
        data: &[u8],
    ) -> GraphicsResult<()> {
        WgpuBackend::write_texture(self, texture, descriptor, data)
    }

    fn submit_render_pass(&self, pass: &RenderPass) -> GraphicsResult<()> {
        WgpuBackend::submit_render_pass(self, pass)
    }

    fn submit_compute_pass(&self, pass: &ComputePass) -> GraphicsResult<()> {
        WgpuBackend::submit_compute_pass(self, pass)
    }

    fn begin_query_readback(
        &self,
        query_set: &GpuQuerySet,
        resolve: &GpuBuffer,
        staging: &GpuBuffer,
        count: u32,
    ) -> GraphicsResult<QueryReadback> {
        WgpuBackend::begin_query_readback(self, query_set, resolve, staging, count)
    }

    fn poll_query_readback(&self, readback: &QueryReadback) -> GraphicsResult<Option<Vec<u64>>> {
        WgpuBackend::poll_query_readback(self, readback)
    }
}

// Ensure the backend and readbacks can cross threads
static_assertions::assert_impl_all!(WgpuBackend: Send, Sync);
static_assertions::assert_impl_all!(WgpuReadback: Send, Sync);
