//! Backend-neutral resource bindings.
//!
//! A [`BindingsDescriptor`] lists uniform buffers, storage buffers, sampled
//! textures and storage textures without committing to any backend layout.
//! [`BindingPlan::build`] turns it into concrete binding groups:
//!
//! - group partition 0 holds storage buffers followed by uniform buffers;
//! - partition 1 holds (texture view, sampler) slot pairs, with device
//!   fallbacks standing in for missing textures or samplers;
//! - partition 2 holds storage textures.
//!
//! Empty partitions are dropped and the remaining ones are numbered
//! consecutively. Flat-table backends merge the partitions into one table
//! via [`BindingPlan::flatten`].

mod plan;

pub use plan::{
    BindingEntry, BindingGroupPlan, BindingPartition, BindingPlan, BoundResource,
    FallbackProvider, FlatBindingEntry,
};

use std::sync::Arc;

use crate::resources::{Buffer, Pipeline, Sampler, Texture};
use crate::types::{SamplerFormatKind, TextureDimension};

/// A uniform or storage buffer binding.
#[derive(Debug, Clone)]
pub struct BufferBinding {
    /// Explicit slot; `None` takes the next auto-numbered slot.
    pub binding: Option<u32>,
    /// Bound buffer.
    pub buffer: Arc<Buffer>,
    /// Byte offset into the buffer.
    pub offset: u64,
    /// Byte size of the range, or the rest of the buffer.
    pub size: Option<u64>,
}

impl BufferBinding {
    /// Bind the whole buffer at the next auto-numbered slot.
    pub fn new(buffer: Arc<Buffer>) -> Self {
        Self {
            binding: None,
            buffer,
            offset: 0,
            size: None,
        }
    }

    /// Bind the whole buffer at an explicit slot.
    pub fn at(binding: u32, buffer: Arc<Buffer>) -> Self {
        Self {
            binding: Some(binding),
            ..Self::new(buffer)
        }
    }

    /// Restrict the binding to a byte range.
    pub fn with_range(mut self, offset: u64, size: u64) -> Self {
        self.offset = offset;
        self.size = Some(size);
        self
    }
}

/// Declared shape of a sampled texture slot, used when no texture is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplerBindingLayout {
    /// View dimension (default 2D).
    pub dimension: TextureDimension,
    /// Sample kind (default float).
    pub format_kind: SamplerFormatKind,
}

impl SamplerBindingLayout {
    /// Create a layout.
    pub fn new(dimension: TextureDimension, format_kind: SamplerFormatKind) -> Self {
        Self {
            dimension,
            format_kind,
        }
    }
}

/// A texture + sampler pair occupying two consecutive slots.
#[derive(Debug, Clone, Default)]
pub struct SamplerBinding {
    /// Sampled texture; the device fallback is used when `None`.
    pub texture: Option<Arc<Texture>>,
    /// Sampler; the device fallback is used when `None`.
    pub sampler: Option<Arc<Sampler>>,
    /// Shape used for fallbacks when no texture is bound.
    pub layout: SamplerBindingLayout,
}

impl SamplerBinding {
    /// Bind a texture with a sampler.
    pub fn new(texture: Arc<Texture>, sampler: Arc<Sampler>) -> Self {
        Self {
            texture: Some(texture),
            sampler: Some(sampler),
            layout: SamplerBindingLayout::default(),
        }
    }

    /// An unbound slot pair of the given shape.
    pub fn empty(layout: SamplerBindingLayout) -> Self {
        Self {
            texture: None,
            sampler: None,
            layout,
        }
    }

    /// Set the texture.
    pub fn with_texture(mut self, texture: Arc<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Set the sampler.
    pub fn with_sampler(mut self, sampler: Arc<Sampler>) -> Self {
        self.sampler = Some(sampler);
        self
    }
}

/// A storage texture binding.
#[derive(Debug, Clone, Default)]
pub struct StorageTextureBinding {
    /// Bound texture. There is no fallback, so this must be set.
    pub texture: Option<Arc<Texture>>,
}

impl StorageTextureBinding {
    /// Bind a storage texture.
    pub fn new(texture: Arc<Texture>) -> Self {
        Self {
            texture: Some(texture),
        }
    }
}

/// Descriptor for [`GraphicsDevice::create_bindings`](crate::GraphicsDevice::create_bindings).
#[derive(Debug, Clone, Default)]
pub struct BindingsDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Pipeline whose layout the bindings are built against. Required.
    pub pipeline: Option<Pipeline>,
    /// Uniform buffers, placed after storage buffers in partition 0.
    pub uniform_buffer_bindings: Vec<BufferBinding>,
    /// Storage buffers, placed first in partition 0.
    pub storage_buffer_bindings: Vec<BufferBinding>,
    /// Texture + sampler pairs (partition 1).
    pub sampler_bindings: Vec<SamplerBinding>,
    /// Storage textures (partition 2).
    pub storage_texture_bindings: Vec<StorageTextureBinding>,
}

impl BindingsDescriptor {
    /// Create a descriptor for the given pipeline.
    pub fn new(pipeline: impl Into<Pipeline>) -> Self {
        Self {
            pipeline: Some(pipeline.into()),
            ..Default::default()
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a uniform buffer binding.
    pub fn with_uniform_buffer(mut self, binding: BufferBinding) -> Self {
        self.uniform_buffer_bindings.push(binding);
        self
    }

    /// Add a storage buffer binding.
    pub fn with_storage_buffer(mut self, binding: BufferBinding) -> Self {
        self.storage_buffer_bindings.push(binding);
        self
    }

    /// Add a texture + sampler binding.
    pub fn with_sampler(mut self, binding: SamplerBinding) -> Self {
        self.sampler_bindings.push(binding);
        self
    }

    /// Add a storage texture binding.
    pub fn with_storage_texture(mut self, binding: StorageTextureBinding) -> Self {
        self.storage_texture_bindings.push(binding);
        self
    }
}
