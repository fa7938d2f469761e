//! Render and compute pass recording.
//!
//! Passes are recorded on the CPU into a command list and validated as they
//! are recorded. [`GraphicsDevice::submit_pass`] hands the finished pass to
//! the backend, which encodes it into one command buffer.
//!
//! [`GraphicsDevice::submit_pass`]: crate::GraphicsDevice::submit_pass

use std::ops::Range;
use std::sync::Arc;

use crate::error::{GraphicsError, GraphicsResult};
use crate::registry::ResourceId;
use crate::resources::{
    Bindings, Buffer, ComputePipeline, InputLayout, QueryPool, RenderPipeline, Resource, Texture,
};
use crate::types::{
    BufferUsage, ClearColor, IndexFormat, QueryPoolType, ScissorRect, TextureUsage, Viewport,
};

/// A color attachment of a render pass.
#[derive(Debug, Clone)]
pub struct ColorAttachment {
    /// Texture rendered into.
    pub texture: Arc<Texture>,
    /// Single-sampled texture a multisampled attachment resolves into.
    pub resolve_target: Option<Arc<Texture>>,
    /// Clear color; the previous contents are loaded when `None`.
    pub clear_color: Option<ClearColor>,
}

impl ColorAttachment {
    /// Create a color attachment that loads existing contents.
    pub fn new(texture: Arc<Texture>) -> Self {
        Self {
            texture,
            resolve_target: None,
            clear_color: None,
        }
    }

    /// Clear the attachment when the pass begins.
    pub fn with_clear_color(mut self, color: ClearColor) -> Self {
        self.clear_color = Some(color);
        self
    }

    /// Resolve into the given texture when the pass ends.
    pub fn with_resolve_target(mut self, target: Arc<Texture>) -> Self {
        self.resolve_target = Some(target);
        self
    }
}

/// The depth-stencil attachment of a render pass.
#[derive(Debug, Clone)]
pub struct DepthStencilAttachment {
    /// Depth texture.
    pub texture: Arc<Texture>,
    /// Depth clear value; loaded when `None`.
    pub clear_depth: Option<f32>,
    /// Stencil clear value; loaded when `None`.
    pub clear_stencil: Option<u32>,
}

impl DepthStencilAttachment {
    /// Create a depth attachment that loads existing contents.
    pub fn new(texture: Arc<Texture>) -> Self {
        Self {
            texture,
            clear_depth: None,
            clear_stencil: None,
        }
    }

    /// Clear depth when the pass begins.
    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.clear_depth = Some(depth);
        self
    }

    /// Clear stencil when the pass begins.
    pub fn with_clear_stencil(mut self, stencil: u32) -> Self {
        self.clear_stencil = Some(stencil);
        self
    }
}

/// Timestamps written at the start and end of a pass.
#[derive(Debug, Clone)]
pub struct PassTimestampWrites {
    /// Timestamp query pool.
    pub query_pool: Arc<QueryPool>,
    /// Slot written when the pass begins.
    pub beginning_of_pass_index: Option<u32>,
    /// Slot written when the pass ends.
    pub end_of_pass_index: Option<u32>,
}

impl PassTimestampWrites {
    /// Write the start and end of the pass into two slots.
    pub fn new(query_pool: Arc<QueryPool>, beginning: u32, end: u32) -> Self {
        Self {
            query_pool,
            beginning_of_pass_index: Some(beginning),
            end_of_pass_index: Some(end),
        }
    }

    fn validate(&self) -> GraphicsResult<()> {
        let pool = &self.query_pool;
        if pool.ty() != QueryPoolType::Timestamp {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "query pool {} is not a timestamp pool",
                pool.id()
            )));
        }
        check_live(pool.as_ref())?;
        for index in [self.beginning_of_pass_index, self.end_of_pass_index]
            .into_iter()
            .flatten()
        {
            check_slot(pool, index)?;
        }
        Ok(())
    }
}

/// Descriptor for a render pass.
#[derive(Debug, Clone, Default)]
pub struct RenderPassDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Color attachments in location order.
    pub color_attachments: Vec<ColorAttachment>,
    /// Depth-stencil attachment.
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,
    /// Pool receiving occlusion query results.
    pub occlusion_query_pool: Option<Arc<QueryPool>>,
    /// Timestamps around the pass.
    pub timestamp_writes: Option<PassTimestampWrites>,
}

impl RenderPassDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a color attachment.
    pub fn with_color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    /// Set the depth-stencil attachment.
    pub fn with_depth_stencil_attachment(mut self, attachment: DepthStencilAttachment) -> Self {
        self.depth_stencil_attachment = Some(attachment);
        self
    }

    /// Set the occlusion query pool.
    pub fn with_occlusion_query_pool(mut self, pool: Arc<QueryPool>) -> Self {
        self.occlusion_query_pool = Some(pool);
        self
    }

    /// Write timestamps around the pass.
    pub fn with_timestamp_writes(mut self, writes: PassTimestampWrites) -> Self {
        self.timestamp_writes = Some(writes);
        self
    }

    fn validate(&self) -> GraphicsResult<()> {
        if self.color_attachments.is_empty() && self.depth_stencil_attachment.is_none() {
            return Err(GraphicsError::InvalidDescriptor(
                "render pass needs at least one attachment".to_string(),
            ));
        }
        for attachment in &self.color_attachments {
            check_attachment(&attachment.texture)?;
            if attachment.texture.format().is_depth_stencil() {
                return Err(GraphicsError::InvalidDescriptor(format!(
                    "texture {} has a depth format but is used as a color attachment",
                    attachment.texture.id()
                )));
            }
            if let Some(resolve) = &attachment.resolve_target {
                check_attachment(resolve)?;
                if attachment.texture.descriptor().sample_count <= 1 {
                    return Err(GraphicsError::InvalidDescriptor(format!(
                        "resolve target given for single-sampled texture {}",
                        attachment.texture.id()
                    )));
                }
            }
        }
        if let Some(depth) = &self.depth_stencil_attachment {
            check_attachment(&depth.texture)?;
            if !depth.texture.format().is_depth_stencil() {
                return Err(GraphicsError::InvalidDescriptor(format!(
                    "texture {} is not a depth-stencil format",
                    depth.texture.id()
                )));
            }
        }
        if let Some(pool) = &self.occlusion_query_pool {
            check_live(pool.as_ref())?;
            if pool.ty() != QueryPoolType::Occlusion {
                return Err(GraphicsError::InvalidDescriptor(format!(
                    "query pool {} is not an occlusion pool",
                    pool.id()
                )));
            }
        }
        if let Some(writes) = &self.timestamp_writes {
            writes.validate()?;
        }
        Ok(())
    }
}

/// Descriptor for a compute pass.
#[derive(Debug, Clone, Default)]
pub struct ComputePassDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Timestamps around the pass.
    pub timestamp_writes: Option<PassTimestampWrites>,
}

impl ComputePassDescriptor {
    /// Create an empty descriptor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Write timestamps around the pass.
    pub fn with_timestamp_writes(mut self, writes: PassTimestampWrites) -> Self {
        self.timestamp_writes = Some(writes);
        self
    }
}

/// A recorded render command.
#[derive(Debug, Clone)]
pub enum RenderCommand {
    /// Bind a render pipeline.
    SetPipeline(Arc<RenderPipeline>),
    /// Bind every group of a bindings object.
    SetBindings(Arc<Bindings>),
    /// Bind vertex buffers and an optional index buffer.
    SetVertexInput {
        /// Layout the buffers follow.
        input_layout: Arc<InputLayout>,
        /// One buffer per layout slot.
        vertex_buffers: Vec<Arc<Buffer>>,
        /// Index buffer and its format.
        index_buffer: Option<(Arc<Buffer>, IndexFormat)>,
    },
    /// Set the viewport.
    SetViewport(Viewport),
    /// Set the scissor rectangle.
    SetScissorRect(ScissorRect),
    /// Non-indexed draw.
    Draw {
        /// Number of vertices.
        vertex_count: u32,
        /// Number of instances.
        instance_count: u32,
        /// First vertex.
        first_vertex: u32,
        /// First instance.
        first_instance: u32,
    },
    /// Indexed draw.
    DrawIndexed {
        /// Number of indices.
        index_count: u32,
        /// Number of instances.
        instance_count: u32,
        /// First index.
        first_index: u32,
        /// Value added to each index.
        base_vertex: i32,
        /// First instance.
        first_instance: u32,
    },
    /// Start counting samples into a slot of the pass's occlusion pool.
    BeginOcclusionQuery(u32),
    /// Stop the active occlusion query.
    EndOcclusionQuery,
}

/// A recorded compute command.
#[derive(Debug, Clone)]
pub enum ComputeCommand {
    /// Bind a compute pipeline.
    SetPipeline(Arc<ComputePipeline>),
    /// Bind every group of a bindings object.
    SetBindings(Arc<Bindings>),
    /// Dispatch workgroups.
    DispatchWorkgroups {
        /// Workgroups in X.
        x: u32,
        /// Workgroups in Y.
        y: u32,
        /// Workgroups in Z.
        z: u32,
    },
}

/// A render pass being recorded.
#[derive(Debug)]
pub struct RenderPass {
    descriptor: RenderPassDescriptor,
    commands: Vec<RenderCommand>,
    pipeline: Option<Arc<RenderPipeline>>,
    has_index_buffer: bool,
    active_query: Option<u32>,
}

impl RenderPass {
    pub(crate) fn new(descriptor: RenderPassDescriptor) -> GraphicsResult<Self> {
        descriptor.validate()?;
        Ok(Self {
            descriptor,
            commands: Vec::new(),
            pipeline: None,
            has_index_buffer: false,
            active_query: None,
        })
    }

    /// Get the pass descriptor.
    pub fn descriptor(&self) -> &RenderPassDescriptor {
        &self.descriptor
    }

    /// Commands recorded so far.
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Currently bound pipeline.
    pub fn pipeline(&self) -> Option<&Arc<RenderPipeline>> {
        self.pipeline.as_ref()
    }

    /// Bind a render pipeline.
    pub fn set_pipeline(&mut self, pipeline: &Arc<RenderPipeline>) -> GraphicsResult<()> {
        check_live(pipeline.as_ref())?;
        self.pipeline = Some(pipeline.clone());
        self.commands
            .push(RenderCommand::SetPipeline(pipeline.clone()));
        Ok(())
    }

    /// Bind a bindings object built against the current pipeline.
    pub fn set_bindings(&mut self, bindings: &Arc<Bindings>) -> GraphicsResult<()> {
        let pipeline = self.pipeline.as_ref().ok_or_else(|| {
            GraphicsError::InvalidDescriptor("set_bindings called before set_pipeline".to_string())
        })?;
        check_bindings(bindings, pipeline.id())?;
        self.commands
            .push(RenderCommand::SetBindings(bindings.clone()));
        Ok(())
    }

    /// Bind vertex buffers (one per layout slot) and an optional index buffer.
    pub fn set_vertex_input(
        &mut self,
        input_layout: &Arc<InputLayout>,
        vertex_buffers: &[Arc<Buffer>],
        index_buffer: Option<&Arc<Buffer>>,
    ) -> GraphicsResult<()> {
        check_live(input_layout.as_ref())?;
        let expected = input_layout.vertex_buffers().len();
        if vertex_buffers.len() != expected {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "input layout {} expects {expected} vertex buffers, got {}",
                input_layout.id(),
                vertex_buffers.len()
            )));
        }
        for buffer in vertex_buffers {
            check_buffer(buffer, BufferUsage::VERTEX)?;
        }
        if let Some(buffer) = index_buffer {
            check_buffer(buffer, BufferUsage::INDEX)?;
        }
        let index_format = input_layout.index_format().unwrap_or_default();
        self.has_index_buffer = index_buffer.is_some();
        self.commands.push(RenderCommand::SetVertexInput {
            input_layout: input_layout.clone(),
            vertex_buffers: vertex_buffers.to_vec(),
            index_buffer: index_buffer.map(|buffer| (buffer.clone(), index_format)),
        });
        Ok(())
    }

    /// Set the viewport.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.commands.push(RenderCommand::SetViewport(viewport));
    }

    /// Set the scissor rectangle.
    pub fn set_scissor_rect(&mut self, rect: ScissorRect) {
        self.commands.push(RenderCommand::SetScissorRect(rect));
    }

    /// Draw non-indexed primitives.
    pub fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) -> GraphicsResult<()> {
        self.require_pipeline("draw")?;
        self.commands.push(RenderCommand::Draw {
            vertex_count: vertices.len() as u32,
            instance_count: instances.len() as u32,
            first_vertex: vertices.start,
            first_instance: instances.start,
        });
        Ok(())
    }

    /// Draw indexed primitives from the bound index buffer.
    pub fn draw_indexed(
        &mut self,
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    ) -> GraphicsResult<()> {
        self.require_pipeline("draw_indexed")?;
        if !self.has_index_buffer {
            return Err(GraphicsError::InvalidDescriptor(
                "draw_indexed called without an index buffer".to_string(),
            ));
        }
        self.commands.push(RenderCommand::DrawIndexed {
            index_count: indices.len() as u32,
            instance_count: instances.len() as u32,
            first_index: indices.start,
            base_vertex,
            first_instance: instances.start,
        });
        Ok(())
    }

    /// Start an occlusion query in `slot` of the pass's occlusion pool.
    pub fn begin_occlusion_query(&mut self, slot: u32) -> GraphicsResult<()> {
        let pool = self.descriptor.occlusion_query_pool.as_ref().ok_or_else(|| {
            GraphicsError::InvalidDescriptor(
                "render pass has no occlusion query pool".to_string(),
            )
        })?;
        check_slot(pool, slot)?;
        if let Some(active) = self.active_query {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "occlusion query {active} is still active"
            )));
        }
        self.active_query = Some(slot);
        self.commands.push(RenderCommand::BeginOcclusionQuery(slot));
        Ok(())
    }

    /// End the active occlusion query.
    pub fn end_occlusion_query(&mut self) -> GraphicsResult<()> {
        if self.active_query.take().is_none() {
            return Err(GraphicsError::InvalidDescriptor(
                "no occlusion query is active".to_string(),
            ));
        }
        self.commands.push(RenderCommand::EndOcclusionQuery);
        Ok(())
    }

    fn require_pipeline(&self, call: &str) -> GraphicsResult<()> {
        if self.pipeline.is_none() {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "{call} called before set_pipeline"
            )));
        }
        Ok(())
    }

    pub(crate) fn check_finished(&self) -> GraphicsResult<()> {
        if let Some(slot) = self.active_query {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "occlusion query {slot} was never ended"
            )));
        }
        Ok(())
    }
}

/// A compute pass being recorded.
#[derive(Debug)]
pub struct ComputePass {
    descriptor: ComputePassDescriptor,
    commands: Vec<ComputeCommand>,
    pipeline: Option<Arc<ComputePipeline>>,
}

impl ComputePass {
    pub(crate) fn new(descriptor: ComputePassDescriptor) -> GraphicsResult<Self> {
        if let Some(writes) = &descriptor.timestamp_writes {
            writes.validate()?;
        }
        Ok(Self {
            descriptor,
            commands: Vec::new(),
            pipeline: None,
        })
    }

    /// Get the pass descriptor.
    pub fn descriptor(&self) -> &ComputePassDescriptor {
        &self.descriptor
    }

    /// Commands recorded so far.
    pub fn commands(&self) -> &[ComputeCommand] {
        &self.commands
    }

    /// Bind a compute pipeline.
    pub fn set_pipeline(&mut self, pipeline: &Arc<ComputePipeline>) -> GraphicsResult<()> {
        check_live(pipeline.as_ref())?;
        self.pipeline = Some(pipeline.clone());
        self.commands
            .push(ComputeCommand::SetPipeline(pipeline.clone()));
        Ok(())
    }

    /// Bind a bindings object built against the current pipeline.
    pub fn set_bindings(&mut self, bindings: &Arc<Bindings>) -> GraphicsResult<()> {
        let pipeline = self.pipeline.as_ref().ok_or_else(|| {
            GraphicsError::InvalidDescriptor("set_bindings called before set_pipeline".to_string())
        })?;
        check_bindings(bindings, pipeline.id())?;
        self.commands
            .push(ComputeCommand::SetBindings(bindings.clone()));
        Ok(())
    }

    /// Dispatch `x * y * z` workgroups.
    pub fn dispatch_workgroups(&mut self, x: u32, y: u32, z: u32) -> GraphicsResult<()> {
        if self.pipeline.is_none() {
            return Err(GraphicsError::InvalidDescriptor(
                "dispatch_workgroups called before set_pipeline".to_string(),
            ));
        }
        self.commands
            .push(ComputeCommand::DispatchWorkgroups { x, y, z });
        Ok(())
    }
}

/// A recorded pass of either kind, accepted by
/// [`GraphicsDevice::submit_pass`](crate::GraphicsDevice::submit_pass).
#[derive(Debug)]
pub enum Pass {
    /// A render pass.
    Render(RenderPass),
    /// A compute pass.
    Compute(ComputePass),
}

impl From<RenderPass> for Pass {
    fn from(pass: RenderPass) -> Self {
        Self::Render(pass)
    }
}

impl From<ComputePass> for Pass {
    fn from(pass: ComputePass) -> Self {
        Self::Compute(pass)
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

fn check_slot(pool: &QueryPool, slot: u32) -> GraphicsResult<()> {
    if slot >= pool.capacity() {
        return Err(GraphicsError::OutOfRange {
            index: slot,
            capacity: pool.capacity(),
        });
    }
    Ok(())
}

fn check_attachment(texture: &Texture) -> GraphicsResult<()> {
    check_live(texture)?;
    if !texture.usage().contains(TextureUsage::RENDER_ATTACHMENT) {
        return Err(GraphicsError::InvalidDescriptor(format!(
            "texture {} lacks RENDER_ATTACHMENT usage",
            texture.id()
        )));
    }
    Ok(())
}

fn check_buffer(buffer: &Buffer, usage: BufferUsage) -> GraphicsResult<()> {
    check_live(buffer)?;
    if !buffer.usage().contains(usage) {
        return Err(GraphicsError::InvalidDescriptor(format!(
            "buffer {} lacks {usage:?} usage",
            buffer.id()
        )));
    }
    Ok(())
}

fn check_bindings(bindings: &Bindings, pipeline: ResourceId) -> GraphicsResult<()> {
    check_live(bindings)?;
    if bindings.pipeline_id() != pipeline {
        return Err(GraphicsError::InvalidDescriptor(format!(
            "bindings {} were built for pipeline {}, but pipeline {} is bound",
            bindings.id(),
            bindings.pipeline_id(),
            pipeline
        )));
    }
    Ok(())
}
