//! GPU sampler resource.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::GpuSampler;
use crate::device::GraphicsDevice;
use crate::types::{SamplerBindingType, SamplerDescriptor};

use super::{Resource, ResourceBase, ResourceType};

/// A GPU sampler resource.
///
/// Samplers define how textures are sampled (filtering, addressing, etc.).
pub struct Sampler {
    base: ResourceBase,
    descriptor: SamplerDescriptor,
    gpu_handle: Mutex<Option<GpuSampler>>,
}

impl Sampler {
    /// Create a new sampler (called by GraphicsDevice).
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        descriptor: SamplerDescriptor,
        gpu_handle: GpuSampler,
    ) -> Self {
        Self {
            base: ResourceBase::new(device, ResourceType::Sampler, descriptor.label.clone()),
            descriptor,
            gpu_handle: Mutex::new(Some(gpu_handle)),
        }
    }

    /// Create a device-owned fallback sampler.
    pub(crate) fn new_fallback(
        device: Weak<GraphicsDevice>,
        descriptor: SamplerDescriptor,
        gpu_handle: GpuSampler,
    ) -> Self {
        Self {
            base: ResourceBase::untracked(device, ResourceType::Sampler, descriptor.label.clone()),
            descriptor,
            gpu_handle: Mutex::new(Some(gpu_handle)),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.base.device()
    }

    /// Get the sampler descriptor.
    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    /// The binding type this sampler satisfies.
    pub fn binding_type(&self) -> SamplerBindingType {
        self.descriptor.binding_type()
    }

    /// Returns true for placeholder samplers owned by the device.
    pub fn is_fallback(&self) -> bool {
        !self.base.is_tracked()
    }

    pub(crate) fn gpu_handle(&self) -> Option<GpuSampler> {
        self.gpu_handle.lock().clone()
    }
}

impl Resource for Sampler {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn destroy(&self) {
        if self.base.mark_destroyed() {
            self.gpu_handle.lock().take();
        }
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("id", &self.base.id())
            .field("mag_filter", &self.descriptor.mag_filter)
            .field("min_filter", &self.descriptor.min_filter)
            .field("compare", &self.descriptor.compare)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Sampler is Send + Sync
static_assertions::assert_impl_all!(Sampler: Send, Sync);
