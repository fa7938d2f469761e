//! GPU resources.
//!
//! This module contains the resource types created by [`GraphicsDevice`]:
//! - [`Buffer`] - GPU memory buffer
//! - [`Texture`] - GPU texture or render target
//! - [`Sampler`] - Texture sampler
//! - [`Program`] - Compiled shader stages
//! - [`InputLayout`] - Vertex input description (CPU only)
//! - [`RenderPipeline`] / [`ComputePipeline`] - Pipeline state objects
//! - [`Bindings`] - Binding groups built against a pipeline
//! - [`QueryPool`] - Occlusion or timestamp queries with readback
//!
//! Resources are handed out as [`Arc`]s and hold a weak reference back to
//! their parent device. Destruction is explicit: [`Resource::destroy`]
//! releases the native handles and unregisters the resource. A resource that
//! is dropped without being destroyed frees its native memory but stays in
//! the device's registry and is reported by
//! [`GraphicsDevice::check_for_leaks`].
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`GraphicsDevice::check_for_leaks`]: crate::GraphicsDevice::check_for_leaks
//! [`Arc`]: std::sync::Arc

mod bindings;
mod buffer;
mod input_layout;
mod pipeline;
mod program;
mod query_pool;
mod sampler;
mod texture;

pub use bindings::Bindings;
pub use buffer::{Buffer, COPY_BUFFER_ALIGNMENT};
pub use input_layout::InputLayout;
pub use pipeline::{ComputePipeline, Pipeline, RenderPipeline};
pub use program::Program;
pub use query_pool::QueryPool;
pub use sampler::Sampler;
pub use texture::Texture;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::device::GraphicsDevice;
use crate::registry::ResourceId;

/// Kind of a registered resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// [`Buffer`].
    Buffer,
    /// [`Texture`] created with `create_texture`.
    Texture,
    /// [`Texture`] created with `create_render_target`.
    RenderTarget,
    /// [`Sampler`].
    Sampler,
    /// [`Program`].
    Program,
    /// [`InputLayout`].
    InputLayout,
    /// [`RenderPipeline`].
    RenderPipeline,
    /// [`ComputePipeline`].
    ComputePipeline,
    /// [`Bindings`].
    Bindings,
    /// [`QueryPool`].
    QueryPool,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Buffer => "Buffer",
            Self::Texture => "Texture",
            Self::RenderTarget => "RenderTarget",
            Self::Sampler => "Sampler",
            Self::Program => "Program",
            Self::InputLayout => "InputLayout",
            Self::RenderPipeline => "RenderPipeline",
            Self::ComputePipeline => "ComputePipeline",
            Self::Bindings => "Bindings",
            Self::QueryPool => "QueryPool",
        };
        f.write_str(name)
    }
}

/// State shared by every resource: identity, owning device, one-shot destroy
/// flag and debug name.
pub struct ResourceBase {
    id: ResourceId,
    resource_type: ResourceType,
    device: Weak<GraphicsDevice>,
    destroyed: AtomicBool,
    name: Mutex<Option<String>>,
    tracked: bool,
}

impl ResourceBase {
    /// Base for a resource that is registered with its device.
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        resource_type: ResourceType,
        name: Option<String>,
    ) -> Self {
        Self {
            id: ResourceId::next(),
            resource_type,
            device,
            destroyed: AtomicBool::new(false),
            name: Mutex::new(name),
            tracked: true,
        }
    }

    /// Base for a device-internal resource that never enters the registry.
    pub(crate) fn untracked(
        device: Weak<GraphicsDevice>,
        resource_type: ResourceType,
        name: Option<String>,
    ) -> Self {
        Self {
            tracked: false,
            ..Self::new(device, resource_type, name)
        }
    }

    /// Resource id.
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Resource kind.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.device.upgrade()
    }

    /// Current debug name.
    pub fn name(&self) -> Option<String> {
        self.name.lock().clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.name.lock() = Some(name.to_string());
    }

    /// Returns true once the resource has been destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Returns true if the resource is registered with its device.
    pub fn is_tracked(&self) -> bool {
        self.tracked
    }

    /// Flip the destroyed flag and unregister.
    ///
    /// Returns true only for the call that performed the transition; the
    /// caller then releases its native handles.
    pub(crate) fn mark_destroyed(&self) -> bool {
        if self
            .destroyed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        if self.tracked
            && let Some(device) = self.device.upgrade()
        {
            device.unregister_resource(self.id);
        }
        log::trace!("{} {} destroyed", self.resource_type, self.id);
        true
    }
}

impl fmt::Debug for ResourceBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceBase")
            .field("id", &self.id)
            .field("type", &self.resource_type)
            .field("name", &*self.name.lock())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

/// Common interface of all device resources.
pub trait Resource: Send + Sync + fmt::Debug {
    /// Shared resource state.
    fn base(&self) -> &ResourceBase;

    /// Release every native handle and unregister from the device.
    ///
    /// Calling this more than once is a no-op.
    fn destroy(&self);

    /// Resource id.
    fn id(&self) -> ResourceId {
        self.base().id()
    }

    /// Resource kind.
    fn resource_type(&self) -> ResourceType {
        self.base().resource_type()
    }

    /// Debug name, if set.
    fn name(&self) -> Option<String> {
        self.base().name()
    }

    /// Returns true once [`Resource::destroy`] has run.
    fn is_destroyed(&self) -> bool {
        self.base().is_destroyed()
    }
}

// Ensure ResourceBase is Send + Sync
static_assertions::assert_impl_all!(ResourceBase: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_destroyed_once() {
        let base = ResourceBase::new(Weak::new(), ResourceType::Buffer, None);
        assert!(!base.is_destroyed());
        assert!(base.mark_destroyed());
        assert!(!base.mark_destroyed());
        assert!(base.is_destroyed());
    }

    #[test]
    fn test_untracked_base() {
        let base = ResourceBase::untracked(Weak::new(), ResourceType::Sampler, None);
        assert!(!base.is_tracked());
        let tracked = ResourceBase::new(Weak::new(), ResourceType::Sampler, None);
        assert!(tracked.is_tracked());
        assert!(tracked.id() > base.id());
    }

    #[test]
    fn test_set_name() {
        let base = ResourceBase::new(Weak::new(), ResourceType::Texture, None);
        base.set_name("shadow map");
        assert_eq!(base.name().as_deref(), Some("shadow map"));
        assert_eq!(ResourceType::RenderTarget.to_string(), "RenderTarget");
    }
}
