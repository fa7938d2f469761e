//! Translation of a [`BindingsDescriptor`] into concrete binding groups.

use std::collections::HashSet;
use std::sync::Arc;

use crate::backend::{GpuBindingEntry, GpuBindingResource};
use crate::error::{GraphicsError, GraphicsResult};
use crate::registry::ResourceId;
use crate::resources::{Buffer, Resource, Sampler, Texture};
use crate::types::{
    BufferUsage, SamplerBindingType, SamplerFormatKind, TextureDimension, TextureUsage,
};

use super::{BindingsDescriptor, BufferBinding};

/// Group partition a binding lands in.
///
/// The discriminant is the partition's position before empty partitions are
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum BindingPartition {
    /// Storage buffers followed by uniform buffers.
    Buffers = 0,
    /// Texture view + sampler pairs.
    Samplers = 1,
    /// Storage textures.
    StorageTextures = 2,
}

/// Supplies placeholder textures and samplers for unbound sampler slots.
///
/// Implemented by the device, which memoizes one fallback per key.
pub trait FallbackProvider {
    /// A 1x1 texture of the given dimension and sample kind.
    fn fallback_texture(
        &self,
        dimension: TextureDimension,
        kind: SamplerFormatKind,
    ) -> GraphicsResult<Arc<Texture>>;

    /// A sampler of the given binding type.
    fn fallback_sampler(&self, ty: SamplerBindingType) -> GraphicsResult<Arc<Sampler>>;
}

/// A resource assigned to one slot.
#[derive(Debug, Clone)]
pub enum BoundResource {
    /// Uniform or storage buffer range.
    Buffer {
        /// Bound buffer.
        buffer: Arc<Buffer>,
        /// Byte offset.
        offset: u64,
        /// Byte size, or the rest of the buffer.
        size: Option<u64>,
    },
    /// Sampled texture view.
    TextureView(Arc<Texture>),
    /// Sampler.
    Sampler(Arc<Sampler>),
    /// Storage texture view.
    StorageTexture(Arc<Texture>),
}

impl BoundResource {
    /// Id of the bound resource.
    pub fn resource_id(&self) -> ResourceId {
        match self {
            Self::Buffer { buffer, .. } => buffer.id(),
            Self::TextureView(texture) | Self::StorageTexture(texture) => texture.id(),
            Self::Sampler(sampler) => sampler.id(),
        }
    }

    /// Returns true if a device fallback was substituted here.
    pub fn is_fallback(&self) -> bool {
        match self {
            Self::TextureView(texture) => texture.is_fallback(),
            Self::Sampler(sampler) => sampler.is_fallback(),
            _ => false,
        }
    }

    fn to_gpu(&self) -> GraphicsResult<GpuBindingResource> {
        let destroyed = || {
            GraphicsError::ResourceDestroyed(format!("bound resource {}", self.resource_id()))
        };
        Ok(match self {
            Self::Buffer {
                buffer,
                offset,
                size,
            } => GpuBindingResource::Buffer {
                buffer: buffer.gpu_handle().ok_or_else(destroyed)?,
                offset: *offset,
                size: *size,
            },
            Self::TextureView(texture) => GpuBindingResource::TextureView {
                texture: texture.gpu_handle().ok_or_else(destroyed)?,
                dimension: texture.dimension(),
            },
            Self::Sampler(sampler) => {
                GpuBindingResource::Sampler(sampler.gpu_handle().ok_or_else(destroyed)?)
            }
            Self::StorageTexture(texture) => {
                GpuBindingResource::StorageTexture(texture.gpu_handle().ok_or_else(destroyed)?)
            }
        })
    }
}

/// One slot of a binding group.
#[derive(Debug, Clone)]
pub struct BindingEntry {
    /// Slot number within the group.
    pub binding: u32,
    /// Bound resource.
    pub resource: BoundResource,
}

/// A non-empty partition and the group index it was assigned.
#[derive(Debug, Clone)]
pub struct BindingGroupPlan {
    /// Consecutive index among the non-empty partitions.
    pub group_index: u32,
    /// Partition the group was built from.
    pub partition: BindingPartition,
    /// Slots in declaration order.
    pub entries: Vec<BindingEntry>,
}

impl BindingGroupPlan {
    /// Native entries for this group.
    pub(crate) fn gpu_entries(&self) -> GraphicsResult<Vec<GpuBindingEntry>> {
        self.entries
            .iter()
            .map(|entry| {
                Ok(GpuBindingEntry {
                    binding: entry.binding,
                    partition: self.partition,
                    resource: entry.resource.to_gpu()?,
                })
            })
            .collect()
    }
}

/// One entry of the merged table used by flat-binding backends.
#[derive(Debug, Clone)]
pub struct FlatBindingEntry {
    /// Partition the entry came from; slots are only unique within it.
    pub partition: BindingPartition,
    /// Slot number within the partition.
    pub binding: u32,
    /// Bound resource.
    pub resource: BoundResource,
}

impl FlatBindingEntry {
    pub(crate) fn gpu_entry(&self) -> GraphicsResult<GpuBindingEntry> {
        Ok(GpuBindingEntry {
            binding: self.binding,
            partition: self.partition,
            resource: self.resource.to_gpu()?,
        })
    }
}

/// Backend-neutral layout of a bindings object.
#[derive(Debug, Clone, Default)]
pub struct BindingPlan {
    groups: Vec<BindingGroupPlan>,
    uniform_buffer_count: usize,
}

impl BindingPlan {
    /// Validate a descriptor and assign every binding to a group and slot.
    ///
    /// The whole descriptor is validated before any fallback is requested,
    /// so a rejected descriptor never allocates.
    pub fn build(
        descriptor: &BindingsDescriptor,
        fallbacks: &dyn FallbackProvider,
    ) -> GraphicsResult<Self> {
        validate(descriptor)?;
        let buffers = buffer_entries(descriptor)?;

        let mut samplers = Vec::with_capacity(descriptor.sampler_bindings.len() * 2);
        let mut slot = 0u32;
        for binding in &descriptor.sampler_bindings {
            let (dimension, kind) = match &binding.texture {
                Some(texture) => (texture.dimension(), texture.sample_kind()),
                None => (binding.layout.dimension, binding.layout.format_kind),
            };
            let texture = match &binding.texture {
                Some(texture) => texture.clone(),
                None => fallbacks.fallback_texture(dimension, kind)?,
            };
            let sampler = match &binding.sampler {
                Some(sampler) => sampler.clone(),
                None => fallbacks.fallback_sampler(SamplerBindingType::for_format_kind(kind))?,
            };
            samplers.push(BindingEntry {
                binding: slot,
                resource: BoundResource::TextureView(texture),
            });
            samplers.push(BindingEntry {
                binding: slot + 1,
                resource: BoundResource::Sampler(sampler),
            });
            slot += 2;
        }

        let storage_textures = descriptor
            .storage_texture_bindings
            .iter()
            .filter_map(|binding| binding.texture.clone())
            .zip(0u32..)
            .map(|(texture, binding)| BindingEntry {
                binding,
                resource: BoundResource::StorageTexture(texture),
            })
            .collect::<Vec<_>>();

        let groups = [
            (BindingPartition::Buffers, buffers),
            (BindingPartition::Samplers, samplers),
            (BindingPartition::StorageTextures, storage_textures),
        ]
        .into_iter()
        .filter(|(_, entries)| !entries.is_empty())
        .zip(0u32..)
        .map(|((partition, entries), group_index)| BindingGroupPlan {
            group_index,
            partition,
            entries,
        })
        .collect();

        Ok(Self {
            groups,
            uniform_buffer_count: descriptor.uniform_buffer_bindings.len(),
        })
    }

    /// Non-empty groups in index order.
    pub fn groups(&self) -> &[BindingGroupPlan] {
        &self.groups
    }

    /// Group built from the given partition, if it is non-empty.
    pub fn group(&self, partition: BindingPartition) -> Option<&BindingGroupPlan> {
        self.groups.iter().find(|group| group.partition == partition)
    }

    /// Number of uniform buffer bindings in the descriptor.
    pub fn uniform_buffer_count(&self) -> usize {
        self.uniform_buffer_count
    }

    /// Returns true if no partition holds any binding.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Merge all groups into one table, keeping each entry's partition.
    pub fn flatten(&self) -> Vec<FlatBindingEntry> {
        self.groups
            .iter()
            .flat_map(|group| {
                group.entries.iter().map(|entry| FlatBindingEntry {
                    partition: group.partition,
                    binding: entry.binding,
                    resource: entry.resource.clone(),
                })
            })
            .collect()
    }
}

fn validate(descriptor: &BindingsDescriptor) -> GraphicsResult<()> {
    let pipeline = descriptor.pipeline.as_ref().ok_or_else(|| {
        GraphicsError::InvalidDescriptor("bindings require a pipeline".to_string())
    })?;
    if pipeline.is_destroyed() {
        return Err(GraphicsError::ResourceDestroyed(format!(
            "pipeline {}",
            pipeline.id()
        )));
    }

    let buffers = descriptor
        .storage_buffer_bindings
        .iter()
        .map(|b| (b, BufferUsage::STORAGE))
        .chain(
            descriptor
                .uniform_buffer_bindings
                .iter()
                .map(|b| (b, BufferUsage::UNIFORM)),
        );
    for (binding, usage) in buffers {
        validate_buffer(binding, usage)?;
    }

    for binding in &descriptor.sampler_bindings {
        if let Some(texture) = &binding.texture {
            check_live(texture.as_ref())?;
            if !texture.usage().contains(TextureUsage::TEXTURE_BINDING) {
                return Err(GraphicsError::InvalidDescriptor(format!(
                    "texture {} is bound for sampling without TEXTURE_BINDING usage",
                    texture.id()
                )));
            }
        }
        if let Some(sampler) = &binding.sampler {
            check_live(sampler.as_ref())?;
        }
    }

    for (index, binding) in descriptor.storage_texture_bindings.iter().enumerate() {
        let texture = binding.texture.as_ref().ok_or_else(|| {
            GraphicsError::InvalidDescriptor(format!("storage texture binding {index} is empty"))
        })?;
        check_live(texture.as_ref())?;
        if !texture.usage().contains(TextureUsage::STORAGE_BINDING) {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "texture {} is bound as storage without STORAGE_BINDING usage",
                texture.id()
            )));
        }
    }
    Ok(())
}

fn validate_buffer(binding: &BufferBinding, usage: BufferUsage) -> GraphicsResult<()> {
    let buffer = &binding.buffer;
    check_live(buffer.as_ref())?;
    if !buffer.usage().contains(usage) {
        return Err(GraphicsError::InvalidDescriptor(format!(
            "buffer {} lacks {usage:?} usage",
            buffer.id()
        )));
    }
    let end = binding.offset.checked_add(binding.size.unwrap_or(0));
    match end {
        Some(end) if binding.offset < buffer.size() && end <= buffer.size() => Ok(()),
        _ => Err(GraphicsError::InvalidDescriptor(format!(
            "binding range at offset {} (size {:?}) exceeds buffer {} of {} bytes",
            binding.offset,
            binding.size,
            buffer.id(),
            buffer.size()
        ))),
    }
}

fn check_live(resource: &dyn Resource) -> GraphicsResult<()> {
    if resource.is_destroyed() {
        return Err(GraphicsError::ResourceDestroyed(format!(
            "{} {}",
            resource.resource_type(),
            resource.id()
        )));
    }
    Ok(())
}

/// Partition 0: storage buffers then uniform buffers, sharing one counter
/// that only auto-numbered entries advance.
fn buffer_entries(descriptor: &BindingsDescriptor) -> GraphicsResult<Vec<BindingEntry>> {
    let mut next = 0u32;
    let mut used = HashSet::new();
    let mut entries = Vec::new();
    for binding in descriptor
        .storage_buffer_bindings
        .iter()
        .chain(&descriptor.uniform_buffer_bindings)
    {
        let slot = match binding.binding {
            Some(slot) => slot,
            None => {
                next += 1;
                next - 1
            }
        };
        if !used.insert(slot) {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "buffer binding slot {slot} is assigned twice"
            )));
        }
        entries.push(BindingEntry {
            binding: slot,
            resource: BoundResource::Buffer {
                buffer: binding.buffer.clone(),
                offset: binding.offset,
                size: binding.size,
            },
        });
    }
    Ok(entries)
}
