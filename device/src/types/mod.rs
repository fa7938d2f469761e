//! Common types and descriptors for device resources.
//!
//! This module contains format enums, usage flags, and descriptor structs
//! consumed by the [`GraphicsDevice`](crate::GraphicsDevice) factories.

mod buffer;
mod common;
mod pipeline;
mod program;
mod query;
mod sampler;
mod texture;
mod vertex;

pub use buffer::{BufferDescriptor, BufferUsage};
pub use common::{ClearColor, Extent3d, ScissorRect, Viewport};
pub use pipeline::{
    ComputePipelineDescriptor, CullMode, PrimitiveTopology, RenderPipelineDescriptor,
};
pub use program::{ProgramDescriptor, ShaderStageSource};
pub use query::{QueryPoolDescriptor, QueryPoolType};
pub use sampler::{AddressMode, CompareFunction, FilterMode, SamplerBindingType, SamplerDescriptor};
pub use texture::{
    RenderTargetDescriptor, SamplerFormatKind, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsage,
};
pub use vertex::{
    IndexFormat, InputLayoutDescriptor, VertexAttributeDescriptor, VertexBufferDescriptor,
    VertexFormat, VertexStepMode,
};
