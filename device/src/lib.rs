//! # Prism Device
//!
//! Backend-agnostic GPU device layer: resource lifecycle tracking and
//! translation of abstract resource bindings into backend binding groups.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`GraphicsInstance`] - Backend selection from [`InstanceParameters`]
//! - [`GraphicsDevice`] - Resource factories, fallbacks and leak reports
//! - [`BindingsDescriptor`] / [`BindingPlan`] - Partitioned, auto-numbered bindings
//! - [`QueryPool`] - Occlusion and timestamp queries with non-blocking readback
//! - [`RenderPass`] / [`ComputePass`] - Recorded passes submitted to the backend
//! - Backends: wgpu (Vulkan, Metal, DX12, GL, WebGPU) and Dummy (for testing)
//!
//! ## Example
//!
//! ```ignore
//! use prism_device::*;
//!
//! let instance = GraphicsInstance::with_parameters(InstanceParameters::from_env())?;
//! let device = instance.create_device()?;
//!
//! let params = device.create_buffer(&BufferDescriptor::new(256, BufferUsage::UNIFORM))?;
//! let bindings = device.create_bindings(
//!     &BindingsDescriptor::new(pipeline.clone())
//!         .with_uniform_buffer(BufferBinding::new(params.clone()))
//!         .with_sampler(SamplerBinding::default()),
//! )?;
//!
//! bindings.destroy();
//! params.destroy();
//! assert!(device.check_for_leaks().is_empty());
//! ```

pub mod backend;
pub mod bindings;
pub mod device;
pub mod error;
mod fallback;
pub mod instance;
pub mod pass;
pub mod registry;
pub mod resources;
pub mod types;

// Re-export main types for convenience
pub use bindings::{
    BindingEntry, BindingGroupPlan, BindingPartition, BindingPlan, BindingsDescriptor,
    BoundResource, BufferBinding, FallbackProvider, FlatBindingEntry, SamplerBinding,
    SamplerBindingLayout, StorageTextureBinding,
};
pub use device::{DeviceCapabilities, GraphicsDevice};
pub use error::{GraphicsError, GraphicsResult};
pub use instance::{
    BackendType, BindingModel, GraphicsInstance, InstanceParameters, WgpuBackendType,
};
pub use pass::{
    ColorAttachment, ComputePass, ComputePassDescriptor, DepthStencilAttachment, Pass,
    PassTimestampWrites, RenderPass, RenderPassDescriptor,
};
pub use registry::{LeakReport, LeakedResource, ResourceId};
pub use resources::{
    Bindings, Buffer, ComputePipeline, InputLayout, Pipeline, Program, QueryPool, RenderPipeline,
    Resource, ResourceType, Sampler, Texture,
};
pub use types::*;

/// Device library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_dummy_instance() {
        let instance =
            GraphicsInstance::with_parameters(InstanceParameters::new().with_backend(BackendType::Dummy))
                .unwrap();
        assert_eq!(instance.backend_name(), "Dummy Backend");
    }
}
