//! Bindings resource: binding groups built against one pipeline.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::GpuBindGroup;
use crate::bindings::{BindingGroupPlan, BindingPlan};
use crate::device::GraphicsDevice;
use crate::registry::ResourceId;

use super::{Resource, ResourceBase, ResourceType};

/// Resources bound for a pipeline, split into binding groups.
///
/// On grouped backends each non-empty partition owns one native group at
/// its group index. Flat backends own a single table at index 0.
pub struct Bindings {
    base: ResourceBase,
    pipeline_id: ResourceId,
    plan: BindingPlan,
    gpu_groups: Mutex<Option<Vec<(u32, GpuBindGroup)>>>,
}

impl Bindings {
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        label: Option<String>,
        pipeline_id: ResourceId,
        plan: BindingPlan,
        gpu_groups: Vec<(u32, GpuBindGroup)>,
    ) -> Self {
        Self {
            base: ResourceBase::new(device, ResourceType::Bindings, label),
            pipeline_id,
            plan,
            gpu_groups: Mutex::new(Some(gpu_groups)),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.base.device()
    }

    /// Id of the pipeline these bindings were built against.
    pub fn pipeline_id(&self) -> ResourceId {
        self.pipeline_id
    }

    /// Get the binding plan.
    pub fn plan(&self) -> &BindingPlan {
        &self.plan
    }

    /// Non-empty binding groups in index order.
    pub fn groups(&self) -> &[BindingGroupPlan] {
        self.plan.groups()
    }

    /// Number of uniform buffer bindings.
    pub fn uniform_buffer_count(&self) -> usize {
        self.plan.uniform_buffer_count()
    }

    /// Number of native groups, or 0 once destroyed.
    pub fn native_group_count(&self) -> usize {
        self.gpu_groups.lock().as_ref().map_or(0, Vec::len)
    }

    pub(crate) fn gpu_groups(&self) -> Option<Vec<(u32, GpuBindGroup)>> {
        self.gpu_groups.lock().clone()
    }
}

impl Resource for Bindings {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn destroy(&self) {
        if self.base.mark_destroyed() {
            self.gpu_groups.lock().take();
        }
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("id", &self.base.id())
            .field("pipeline", &self.pipeline_id)
            .field("groups", &self.plan.groups().len())
            .field("uniform_buffers", &self.plan.uniform_buffer_count())
            .finish()
    }
}

// Ensure Bindings is Send + Sync
static_assertions::assert_impl_all!(Bindings: Send, Sync);
