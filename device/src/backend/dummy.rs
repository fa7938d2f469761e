//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations but counts every
//! native handle it hands out, so tests can observe that destroy releases
//! each handle exactly once. Occlusion queries report the number of vertices
//! (times instances) drawn inside the query scope, and timestamps come from a
//! monotonically increasing tick counter. Readbacks can be held back for a
//! number of polls to exercise callers that wait on in-flight resolves.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

use crate::error::{GraphicsError, GraphicsResult};
use crate::instance::BindingModel;
use crate::pass::{ComputeCommand, ComputePass, PassTimestampWrites, RenderCommand, RenderPass};
use crate::resources::{QueryPool, Resource};
use crate::types::{
    BufferDescriptor, ComputePipelineDescriptor, ProgramDescriptor, QueryPoolDescriptor,
    RenderPipelineDescriptor, SamplerDescriptor, TextureDescriptor,
};

use super::{
    DummyHandle, GpuBackend, GpuBindGroup, GpuBindingEntry, GpuBindingResource, GpuBuffer,
    GpuPipeline, GpuProgram, GpuQuerySet, GpuSampler, GpuTexture, QueryReadback,
};

/// Dummy GPU backend.
#[derive(Debug)]
pub struct DummyBackend {
    binding_model: BindingModel,
    live: Arc<AtomicUsize>,
    ticks: AtomicU64,
    readback_polls: u32,
}

/// Query values on their way back from the simulated GPU.
///
/// Holds the staging allocation mapped until the values are consumed or
/// the readback is dropped.
#[derive(Debug)]
pub struct DummyReadback {
    values: Vec<u64>,
    staging: DummyHandle,
    remaining_polls: AtomicU32,
    holds_map: AtomicBool,
}

impl DummyReadback {
    fn unmap(&self) {
        if self.holds_map.swap(false, Ordering::AcqRel) {
            self.staging.end_map();
        }
    }
}

impl Drop for DummyReadback {
    fn drop(&mut self) {
        self.unmap();
    }
}

impl DummyBackend {
    /// Create a new dummy backend with grouped bindings.
    pub fn new() -> Self {
        Self::with_binding_model(BindingModel::Grouped)
    }

    /// Create a dummy backend that lays out bindings like the given model.
    pub fn with_binding_model(binding_model: BindingModel) -> Self {
        Self {
            binding_model,
            live: Arc::new(AtomicUsize::new(0)),
            ticks: AtomicU64::new(0),
            readback_polls: 0,
        }
    }

    /// Report each query readback as in flight for `polls` polls before
    /// its values arrive.
    pub fn with_readback_polls(mut self, polls: u32) -> Self {
        self.readback_polls = polls;
        self
    }

    fn allocate(&self) -> DummyHandle {
        DummyHandle::new(&self.live)
    }

    fn next_tick(&self) -> u64 {
        // Pretend each timestamp is one microsecond apart.
        self.ticks.fetch_add(1_000, Ordering::Relaxed) + 1_000
    }

    fn write_timestamps(
        &self,
        writes: Option<&PassTimestampWrites>,
        at_end: bool,
    ) -> GraphicsResult<()> {
        let Some(writes) = writes else {
            return Ok(());
        };
        let index = if at_end {
            writes.end_of_pass_index
        } else {
            writes.beginning_of_pass_index
        };
        if let Some(index) = index {
            let tick = self.next_tick();
            with_query_values(&writes.query_pool, |values| {
                if let Some(slot) = values.get_mut(index as usize) {
                    *slot = tick;
                }
            })?;
        }
        Ok(())
    }
}

impl Default for DummyBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn with_query_values(
    pool: &QueryPool,
    f: impl FnOnce(&mut Vec<u64>),
) -> GraphicsResult<()> {
    match pool.gpu_query_set() {
        Some(GpuQuerySet::Dummy { values, .. }) => {
            f(&mut values.lock());
            Ok(())
        }
        Some(_) => Err(GraphicsError::Internal(
            "dummy backend received a foreign query set".to_string(),
        )),
        None => Err(GraphicsError::ResourceDestroyed(format!(
            "query pool {}",
            pool.id()
        ))),
    }
}

fn check_dummy_entry(entry: &GpuBindingEntry) -> GraphicsResult<()> {
    let is_dummy = match &entry.resource {
        GpuBindingResource::Buffer { buffer, .. } => matches!(buffer, GpuBuffer::Dummy(_)),
        GpuBindingResource::TextureView { texture, .. } => matches!(texture, GpuTexture::Dummy(_)),
        GpuBindingResource::Sampler(sampler) => matches!(sampler, GpuSampler::Dummy(_)),
        GpuBindingResource::StorageTexture(texture) => matches!(texture, GpuTexture::Dummy(_)),
    };
    if is_dummy {
        Ok(())
    } else {
        Err(GraphicsError::Internal(format!(
            "dummy backend received a foreign handle at binding {}",
            entry.binding
        )))
    }
}

impl GpuBackend for DummyBackend {
    fn name(&self) -> &'static str {
        "Dummy Backend"
    }

    fn binding_model(&self) -> BindingModel {
        self.binding_model
    }

    fn create_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<GpuBuffer> {
        log::trace!(
            "DummyBackend: creating buffer {:?} (size: {})",
            descriptor.label,
            descriptor.size
        );
        Ok(GpuBuffer::Dummy(self.allocate()))
    }

    fn create_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<GpuTexture> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            descriptor.size.depth
        );
        Ok(GpuTexture::Dummy(self.allocate()))
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> GraphicsResult<GpuSampler> {
        log::trace!("DummyBackend: creating sampler {:?}", descriptor.label);
        Ok(GpuSampler::Dummy(self.allocate()))
    }

    fn create_program(&self, descriptor: &ProgramDescriptor) -> GraphicsResult<GpuProgram> {
        log::trace!("DummyBackend: creating program {:?}", descriptor.label);
        Ok(GpuProgram::Dummy(self.allocate()))
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
        program: &GpuProgram,
    ) -> GraphicsResult<GpuPipeline> {
        let GpuProgram::Dummy(_) = program else {
            return Err(GraphicsError::Internal(
                "dummy backend received a foreign program".to_string(),
            ));
        };
        log::trace!(
            "DummyBackend: creating render pipeline {:?}",
            descriptor.label
        );
        Ok(GpuPipeline::Dummy(self.allocate()))
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
        program: &GpuProgram,
    ) -> GraphicsResult<GpuPipeline> {
        let GpuProgram::Dummy(_) = program else {
            return Err(GraphicsError::Internal(
                "dummy backend received a foreign program".to_string(),
            ));
        };
        log::trace!(
            "DummyBackend: creating compute pipeline {:?}",
            descriptor.label
        );
        Ok(GpuPipeline::Dummy(self.allocate()))
    }

    fn create_bind_group(
        &self,
        pipeline: &GpuPipeline,
        group_index: u32,
        label: Option<&str>,
        entries: &[GpuBindingEntry],
    ) -> GraphicsResult<GpuBindGroup> {
        let GpuPipeline::Dummy(_) = pipeline else {
            return Err(GraphicsError::Internal(
                "dummy backend received a foreign pipeline".to_string(),
            ));
        };
        for entry in entries {
            check_dummy_entry(entry)?;
        }
        log::trace!(
            "DummyBackend: creating bind group {:?} at index {} ({} entries)",
            label,
            group_index,
            entries.len()
        );
        Ok(GpuBindGroup::Dummy(self.allocate()))
    }

    fn create_query_set(&self, descriptor: &QueryPoolDescriptor) -> GraphicsResult<GpuQuerySet> {
        log::trace!(
            "DummyBackend: creating {:?} query set {:?} ({} slots)",
            descriptor.ty,
            descriptor.label,
            descriptor.elem_count
        );
        Ok(GpuQuerySet::Dummy {
            handle: self.allocate(),
            values: Arc::new(parking_lot::Mutex::new(vec![
                0;
                descriptor.elem_count as usize
            ])),
        })
    }

    fn write_buffer(&self, _buffer: &GpuBuffer, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        log::trace!(
            "DummyBackend: write_buffer offset={} len={}",
            offset,
            data.len()
        );
        Ok(())
    }

    fn write_texture(
        &self,
        _texture: &GpuTexture,
        descriptor: &TextureDescriptor,
        data: &[u8],
    ) -> GraphicsResult<()> {
        log::trace!(
            "DummyBackend: write_texture {:?} ({}x{}) len={}",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height,
            data.len()
        );
        Ok(())
    }

    fn submit_render_pass(&self, pass: &RenderPass) -> GraphicsResult<()> {
        let descriptor = pass.descriptor();
        log::trace!(
            "DummyBackend: submitting render pass {:?} ({} commands)",
            descriptor.label,
            pass.commands().len()
        );
        self.write_timestamps(descriptor.timestamp_writes.as_ref(), false)?;

        let mut active_query: Option<u32> = None;
        for command in pass.commands() {
            match command {
                RenderCommand::SetPipeline(pipeline) => {
                    if pipeline.gpu_handle().is_none() {
                        return Err(GraphicsError::ResourceDestroyed(format!(
                            "render pipeline {}",
                            pipeline.id()
                        )));
                    }
                }
                RenderCommand::SetBindings(bindings) => {
                    if bindings.is_destroyed() {
                        return Err(GraphicsError::ResourceDestroyed(format!(
                            "bindings {}",
                            bindings.id()
                        )));
                    }
                }
                RenderCommand::BeginOcclusionQuery(slot) => {
                    if let Some(pool) = &descriptor.occlusion_query_pool {
                        with_query_values(pool, |values| {
                            if let Some(value) = values.get_mut(*slot as usize) {
                                *value = 0;
                            }
                        })?;
                    }
                    active_query = Some(*slot);
                }
                RenderCommand::EndOcclusionQuery => active_query = None,
                RenderCommand::Draw {
                    vertex_count,
                    instance_count,
                    ..
                } => {
                    if let (Some(slot), Some(pool)) =
                        (active_query, &descriptor.occlusion_query_pool)
                    {
                        let samples = *vertex_count as u64 * *instance_count as u64;
                        with_query_values(pool, |values| {
                            if let Some(value) = values.get_mut(slot as usize) {
                                *value += samples;
                            }
                        })?;
                    }
                }
                RenderCommand::DrawIndexed {
                    index_count,
                    instance_count,
                    ..
                } => {
                    if let (Some(slot), Some(pool)) =
                        (active_query, &descriptor.occlusion_query_pool)
                    {
                        let samples = *index_count as u64 * *instance_count as u64;
                        with_query_values(pool, |values| {
                            if let Some(value) = values.get_mut(slot as usize) {
                                *value += samples;
                            }
                        })?;
                    }
                }
                RenderCommand::SetVertexInput { .. }
                | RenderCommand::SetViewport(_)
                | RenderCommand::SetScissorRect(_) => {}
            }
        }

        self.write_timestamps(descriptor.timestamp_writes.as_ref(), true)
    }

    fn submit_compute_pass(&self, pass: &ComputePass) -> GraphicsResult<()> {
        let descriptor = pass.descriptor();
        log::trace!(
            "DummyBackend: submitting compute pass {:?} ({} commands)",
            descriptor.label,
            pass.commands().len()
        );
        self.write_timestamps(descriptor.timestamp_writes.as_ref(), false)?;
        for command in pass.commands() {
            match command {
                ComputeCommand::SetPipeline(pipeline) => {
                    if pipeline.gpu_handle().is_none() {
                        return Err(GraphicsError::ResourceDestroyed(format!(
                            "compute pipeline {}",
                            pipeline.id()
                        )));
                    }
                }
                ComputeCommand::SetBindings(bindings) => {
                    if bindings.is_destroyed() {
                        return Err(GraphicsError::ResourceDestroyed(format!(
                            "bindings {}",
                            bindings.id()
                        )));
                    }
                }
                ComputeCommand::DispatchWorkgroups { x, y, z } => {
                    log::trace!("DummyBackend: dispatch {}x{}x{}", x, y, z);
                }
            }
        }
        self.write_timestamps(descriptor.timestamp_writes.as_ref(), true)
    }

    fn begin_query_readback(
        &self,
        query_set: &GpuQuerySet,
        _resolve: &GpuBuffer,
        staging: &GpuBuffer,
        count: u32,
    ) -> GraphicsResult<QueryReadback> {
        let (GpuQuerySet::Dummy { values, .. }, GpuBuffer::Dummy(staging)) = (query_set, staging)
        else {
            return Err(GraphicsError::Internal(
                "dummy backend received a foreign query set or staging buffer".to_string(),
            ));
        };
        // Same rule as a real queue: no copies into a buffer that is mapped.
        if !staging.begin_map() {
            return Err(GraphicsError::Internal(
                "query staging buffer is still mapped by an earlier readback".to_string(),
            ));
        }
        let resolved: Vec<u64> = values.lock().iter().copied().take(count as usize).collect();
        log::trace!("DummyBackend: resolved {} queries", resolved.len());
        Ok(QueryReadback::Dummy(DummyReadback {
            values: resolved,
            staging: staging.clone(),
            remaining_polls: AtomicU32::new(self.readback_polls),
            holds_map: AtomicBool::new(true),
        }))
    }

    fn poll_query_readback(&self, readback: &QueryReadback) -> GraphicsResult<Option<Vec<u64>>> {
        match readback {
            QueryReadback::Dummy(readback) => {
                let in_flight = readback
                    .remaining_polls
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
                    .is_ok();
                if in_flight {
                    return Ok(None);
                }
                readback.unmap();
                Ok(Some(readback.values.clone()))
            }
            #[cfg(feature = "wgpu-backend")]
            QueryReadback::Wgpu(_) => Err(GraphicsError::Internal(
                "dummy backend received a foreign readback".to_string(),
            )),
        }
    }

    fn live_handle_count(&self) -> Option<usize> {
        Some(self.live.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BufferUsage, QueryPoolType};

    #[test]
    fn test_handles_are_counted() {
        let backend = DummyBackend::new();
        let buffer = backend
            .create_buffer(&BufferDescriptor::new(64, BufferUsage::UNIFORM))
            .unwrap();
        let sampler = backend.create_sampler(&SamplerDescriptor::new()).unwrap();
        assert_eq!(backend.live_handle_count(), Some(2));

        buffer.release();
        drop(sampler);
        assert_eq!(backend.live_handle_count(), Some(0));
    }

    #[test]
    fn test_binding_model_is_configurable() {
        assert_eq!(DummyBackend::new().binding_model(), BindingModel::Grouped);
        assert_eq!(
            DummyBackend::with_binding_model(BindingModel::Flat).binding_model(),
            BindingModel::Flat
        );
    }

    #[test]
    fn test_query_readback_truncates_to_count() {
        let backend = DummyBackend::new();
        let set = backend
            .create_query_set(&QueryPoolDescriptor::new(QueryPoolType::Occlusion, 4))
            .unwrap();
        if let GpuQuerySet::Dummy { values, .. } = &set {
            values.lock().copy_from_slice(&[1, 2, 3, 4]);
        }
        let staging = backend
            .create_buffer(&BufferDescriptor::new(32, BufferUsage::MAP_READ))
            .unwrap();
        let readback = backend
            .begin_query_readback(&set, &staging, &staging, 2)
            .unwrap();
        assert_eq!(
            backend.poll_query_readback(&readback).unwrap(),
            Some(vec![1, 2])
        );
    }

    #[test]
    fn test_deferred_readback_holds_staging_mapped() {
        let backend = DummyBackend::new().with_readback_polls(2);
        let set = backend
            .create_query_set(&QueryPoolDescriptor::new(QueryPoolType::Timestamp, 2))
            .unwrap();
        let staging = backend
            .create_buffer(&BufferDescriptor::new(16, BufferUsage::MAP_READ))
            .unwrap();

        let readback = backend
            .begin_query_readback(&set, &staging, &staging, 2)
            .unwrap();
        assert_eq!(backend.poll_query_readback(&readback).unwrap(), None);

        // A second copy into the mapped staging buffer is refused.
        assert!(matches!(
            backend.begin_query_readback(&set, &staging, &staging, 2),
            Err(GraphicsError::Internal(_))
        ));

        assert_eq!(backend.poll_query_readback(&readback).unwrap(), None);
        assert_eq!(
            backend.poll_query_readback(&readback).unwrap(),
            Some(vec![0, 0])
        );

        // Consuming the values unmapped the staging buffer.
        let next = backend
            .begin_query_readback(&set, &staging, &staging, 2)
            .unwrap();
        drop(next);
        let abandoned = backend.begin_query_readback(&set, &staging, &staging, 2);
        assert!(abandoned.is_ok());
    }
}
