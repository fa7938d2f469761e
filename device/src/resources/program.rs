//! Shader program resource.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::GpuProgram;
use crate::device::GraphicsDevice;
use crate::types::ProgramDescriptor;

use super::{Resource, ResourceBase, ResourceType};

/// Compiled shader stages, either vertex/fragment or compute.
pub struct Program {
    base: ResourceBase,
    descriptor: ProgramDescriptor,
    gpu_handle: Mutex<Option<GpuProgram>>,
}

impl Program {
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        descriptor: ProgramDescriptor,
        gpu_handle: GpuProgram,
    ) -> Self {
        Self {
            base: ResourceBase::new(device, ResourceType::Program, descriptor.label.clone()),
            descriptor,
            gpu_handle: Mutex::new(Some(gpu_handle)),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.base.device()
    }

    /// Get the program descriptor.
    pub fn descriptor(&self) -> &ProgramDescriptor {
        &self.descriptor
    }

    pub(crate) fn gpu_handle(&self) -> Option<GpuProgram> {
        self.gpu_handle.lock().clone()
    }
}

impl Resource for Program {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn destroy(&self) {
        if self.base.mark_destroyed() {
            self.gpu_handle.lock().take();
        }
    }
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("id", &self.base.id())
            .field("render", &self.descriptor.is_render())
            .field("compute", &self.descriptor.is_compute())
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Program is Send + Sync
static_assertions::assert_impl_all!(Program: Send, Sync);
