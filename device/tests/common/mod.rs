//! Common utilities for device integration tests.
//!
//! This module provides shared test infrastructure that can be reused
//! across different backend implementations.

use std::sync::Arc;

use prism_device::{
    BackendType, BindingModel, Buffer, BufferDescriptor, BufferUsage, ComputePipeline,
    ComputePipelineDescriptor, GraphicsDevice, GraphicsInstance, InputLayoutDescriptor,
    InstanceParameters, ProgramDescriptor, QueryPool, QueryPoolDescriptor, QueryPoolType,
    RenderPipeline, RenderPipelineDescriptor, RenderTargetDescriptor, Sampler, SamplerDescriptor,
    ShaderStageSource, Texture, TextureDescriptor, TextureFormat, TextureUsage, WgpuBackendType,
};

/// Vertex + fragment shader drawing a single triangle without vertex buffers.
pub const TRIANGLE_WGSL: &str = r#"
@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> @builtin(position) vec4<f32> {
    let x = f32(i32(index) - 1);
    let y = f32(i32(index & 1u) * 2 - 1);
    return vec4<f32>(x, y, 0.0, 1.0);
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(1.0, 1.0, 1.0, 1.0);
}
"#;

/// Compute shader that does nothing.
pub const EMPTY_COMPUTE_WGSL: &str = r#"
@compute @workgroup_size(1)
fn cs_main() {
}
"#;

// ============================================================================
// Backend Enumeration
// ============================================================================

/// Available GPU backends for testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Dummy backend with grouped bindings.
    Dummy,
    /// Dummy backend emulating a flat binding table.
    DummyFlat,
    /// Dummy backend whose query readbacks stay in flight for two polls.
    DummySlowReadback,
    /// WebGPU backend (via wgpu).
    WebGpu,
}

impl Backend {
    /// Check if this backend is compiled in.
    pub fn is_available(&self) -> bool {
        match self {
            #[cfg(feature = "dummy")]
            Backend::Dummy | Backend::DummyFlat | Backend::DummySlowReadback => true,
            #[cfg(not(feature = "dummy"))]
            Backend::Dummy | Backend::DummyFlat | Backend::DummySlowReadback => false,
            #[cfg(feature = "wgpu-backend")]
            Backend::WebGpu => true,
            #[cfg(not(feature = "wgpu-backend"))]
            Backend::WebGpu => false,
        }
    }

    /// Convert to InstanceParameters for creating a GraphicsInstance.
    pub fn to_instance_parameters(self) -> InstanceParameters {
        match self {
            Backend::Dummy => InstanceParameters::new().with_backend(BackendType::Dummy),
            Backend::DummyFlat => InstanceParameters::new()
                .with_backend(BackendType::Dummy)
                .with_binding_model(BindingModel::Flat),
            Backend::DummySlowReadback => InstanceParameters::new()
                .with_backend(BackendType::Dummy)
                .with_dummy_readback_polls(2),
            Backend::WebGpu => InstanceParameters::new()
                .with_backend(BackendType::Wgpu)
                .with_wgpu_backend(WgpuBackendType::Auto),
        }
    }
}

// ============================================================================
// Test Context
// ============================================================================

/// Test context owning an instance and one device.
pub struct TestContext {
    /// The backend being tested.
    #[allow(dead_code)]
    pub backend: Backend,
    /// Graphics instance (Arc-wrapped).
    #[allow(dead_code)]
    pub instance: Arc<GraphicsInstance>,
    /// Graphics device for creating resources.
    pub device: Arc<GraphicsDevice>,
}

impl TestContext {
    /// Create a new test context for the given backend.
    ///
    /// Returns `None` if the backend is not available (not compiled in, or
    /// no adapter on this machine).
    pub fn new(backend: Backend) -> Option<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        if !backend.is_available() {
            return None;
        }

        let instance = GraphicsInstance::with_parameters(backend.to_instance_parameters()).ok()?;
        let device = instance.create_device().ok()?;

        Some(Self {
            backend,
            instance,
            device,
        })
    }

    /// Create a buffer with the given size and usage flags.
    pub fn create_buffer(&self, size: u64, usage: BufferUsage) -> Arc<Buffer> {
        self.device
            .create_buffer(&BufferDescriptor::new(size, usage))
            .expect("Failed to create buffer")
    }

    /// Create a 2D sampled texture.
    #[allow(dead_code)]
    pub fn create_texture(&self, width: u32, height: u32, format: TextureFormat) -> Arc<Texture> {
        self.device
            .create_texture(&TextureDescriptor::new_2d(
                width,
                height,
                format,
                TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            ))
            .expect("Failed to create texture")
    }

    /// Create a color render target.
    #[allow(dead_code)]
    pub fn create_render_target(&self, width: u32, height: u32) -> Arc<Texture> {
        self.device
            .create_render_target(&RenderTargetDescriptor::new(
                TextureFormat::Rgba8Unorm,
                width,
                height,
            ))
            .expect("Failed to create render target")
    }

    /// Create a linear sampler.
    #[allow(dead_code)]
    pub fn create_sampler(&self) -> Arc<Sampler> {
        self.device
            .create_sampler(&SamplerDescriptor::linear())
            .expect("Failed to create sampler")
    }

    /// Create a triangle pipeline writing one Rgba8Unorm attachment.
    #[allow(dead_code)]
    pub fn create_triangle_pipeline(&self) -> Arc<RenderPipeline> {
        let program = self
            .device
            .create_program(&ProgramDescriptor::render(
                ShaderStageSource::new(TRIANGLE_WGSL, "vs_main"),
                Some(ShaderStageSource::new(TRIANGLE_WGSL, "fs_main")),
            ))
            .expect("Failed to create program");
        let layout = self
            .device
            .create_input_layout(&InputLayoutDescriptor::new())
            .expect("Failed to create input layout");
        self.device
            .create_render_pipeline(
                &RenderPipelineDescriptor::new(program, layout)
                    .with_color_format(TextureFormat::Rgba8Unorm),
            )
            .expect("Failed to create render pipeline")
    }

    /// Create a compute pipeline from an empty kernel.
    #[allow(dead_code)]
    pub fn create_compute_pipeline(&self) -> Arc<ComputePipeline> {
        let program = self
            .device
            .create_program(&ProgramDescriptor::compute(ShaderStageSource::new(
                EMPTY_COMPUTE_WGSL,
                "cs_main",
            )))
            .expect("Failed to create program");
        self.device
            .create_compute_pipeline(&ComputePipelineDescriptor::new(program))
            .expect("Failed to create compute pipeline")
    }

    /// Create an occlusion query pool.
    #[allow(dead_code)]
    pub fn create_occlusion_pool(&self, count: u32) -> Arc<QueryPool> {
        self.device
            .create_query_pool(&QueryPoolDescriptor::new(QueryPoolType::Occlusion, count))
            .expect("Failed to create query pool")
    }
}
