//! Query pool resource with asynchronous readback.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::{GpuBackend, GpuBuffer, GpuQuerySet, QueryReadback};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{QueryPoolDescriptor, QueryPoolType};

use super::{Resource, ResourceBase, ResourceType};

/// A fixed-size pool of occlusion or timestamp queries.
///
/// Results travel through a resolve buffer and a mappable staging buffer.
/// After [`GraphicsDevice::resolve_query_pool`] starts a readback, reads are
/// non-blocking: they return `Ok(None)` until the values have arrived.
///
/// [`GraphicsDevice::resolve_query_pool`]: crate::GraphicsDevice::resolve_query_pool
pub struct QueryPool {
    base: ResourceBase,
    descriptor: QueryPoolDescriptor,
    query_set: Mutex<Option<GpuQuerySet>>,
    resolve_buffer: Mutex<Option<GpuBuffer>>,
    staging_buffer: Mutex<Option<GpuBuffer>>,
    pending: Mutex<Option<QueryReadback>>,
    results: Mutex<Option<Vec<u64>>>,
}

impl QueryPool {
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        descriptor: QueryPoolDescriptor,
        query_set: GpuQuerySet,
        resolve_buffer: GpuBuffer,
        staging_buffer: GpuBuffer,
    ) -> Self {
        Self {
            base: ResourceBase::new(device, ResourceType::QueryPool, descriptor.label.clone()),
            descriptor,
            query_set: Mutex::new(Some(query_set)),
            resolve_buffer: Mutex::new(Some(resolve_buffer)),
            staging_buffer: Mutex::new(Some(staging_buffer)),
            pending: Mutex::new(None),
            results: Mutex::new(None),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.base.device()
    }

    /// Get the pool descriptor.
    pub fn descriptor(&self) -> &QueryPoolDescriptor {
        &self.descriptor
    }

    /// Number of query slots.
    pub fn capacity(&self) -> u32 {
        self.descriptor.elem_count
    }

    /// Query kind.
    pub fn ty(&self) -> QueryPoolType {
        self.descriptor.ty
    }

    pub(crate) fn gpu_query_set(&self) -> Option<GpuQuerySet> {
        self.query_set.lock().clone()
    }

    /// Start reading the pool back, discarding any previous results and
    /// abandoning a readback that is still in flight.
    pub(crate) fn begin_resolve(&self, backend: &dyn GpuBackend) -> GraphicsResult<()> {
        let destroyed = || GraphicsError::ResourceDestroyed(format!("query pool {}", self.id()));
        let query_set = self.gpu_query_set().ok_or_else(destroyed)?;
        let resolve = self.resolve_buffer.lock().clone().ok_or_else(destroyed)?;
        let staging = self.staging_buffer.lock().clone().ok_or_else(destroyed)?;

        // The staging buffer must be unmapped before it is copied into again.
        let mut pending = self.pending.lock();
        drop(pending.take());
        self.results.lock().take();
        *pending = Some(backend.begin_query_readback(
            &query_set,
            &resolve,
            &staging,
            self.capacity(),
        )?);
        Ok(())
    }

    /// Move a finished readback into the result cache.
    fn poll(&self) -> GraphicsResult<()> {
        let mut pending = self.pending.lock();
        let Some(readback) = pending.as_ref() else {
            return Ok(());
        };
        let device = self.device().ok_or(GraphicsError::DeviceLost)?;
        if let Some(values) = device.backend().poll_query_readback(readback)? {
            pending.take();
            *self.results.lock() = Some(values);
        }
        Ok(())
    }

    /// All resolved values, or `None` while the readback is still in flight
    /// (or before the pool was ever resolved).
    pub fn results(&self) -> GraphicsResult<Option<Vec<u64>>> {
        if self.is_destroyed() {
            return Err(GraphicsError::ResourceDestroyed(format!(
                "query pool {}",
                self.id()
            )));
        }
        self.poll()?;
        Ok(self.results.lock().clone())
    }

    /// Resolved occlusion value of one slot.
    ///
    /// Fails with [`GraphicsError::OutOfRange`] if `slot` is not below the
    /// pool's capacity.
    pub fn query_result_occlusion(&self, slot: u32) -> GraphicsResult<Option<u64>> {
        if slot >= self.capacity() {
            return Err(GraphicsError::OutOfRange {
                index: slot,
                capacity: self.capacity(),
            });
        }
        Ok(self
            .results()?
            .and_then(|values| values.get(slot as usize).copied()))
    }
}

impl Resource for QueryPool {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn destroy(&self) {
        if !self.base.mark_destroyed() {
            return;
        }
        self.pending.lock().take();
        self.results.lock().take();
        self.query_set.lock().take();
        for buffer in [&self.resolve_buffer, &self.staging_buffer] {
            if let Some(handle) = buffer.lock().take() {
                handle.release();
            }
        }
    }
}

impl std::fmt::Debug for QueryPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPool")
            .field("id", &self.base.id())
            .field("type", &self.descriptor.ty)
            .field("capacity", &self.descriptor.elem_count)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure QueryPool is Send + Sync
static_assertions::assert_impl_all!(QueryPool: Send, Sync);
