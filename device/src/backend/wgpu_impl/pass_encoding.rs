//! Pass encoding for the wgpu backend.

use crate::error::{GraphicsError, GraphicsResult};
use crate::pass::{ComputeCommand, ComputePass, PassTimestampWrites, RenderCommand, RenderPass};
use crate::resources::{Bindings, Buffer, QueryPool, Resource, Texture};

use super::super::{GpuBindGroup, GpuBuffer, GpuPipeline, GpuQuerySet, GpuTexture};
use super::WgpuBackend;
use super::conversion::{convert_clear_load_op, convert_color_load_op, convert_index_format};

fn destroyed(resource: &dyn Resource) -> GraphicsError {
    GraphicsError::ResourceDestroyed(format!(
        "{} {} used in a submitted pass",
        resource.resource_type(),
        resource.id()
    ))
}

fn foreign(what: &str) -> GraphicsError {
    GraphicsError::Internal(format!("pass references a non-Wgpu {what}"))
}

fn texture_view(texture: &Texture) -> GraphicsResult<wgpu::TextureView> {
    match texture.gpu_handle() {
        Some(GpuTexture::Wgpu { view, .. }) => Ok(view),
        Some(_) => Err(foreign("texture")),
        None => Err(destroyed(texture)),
    }
}

fn wgpu_buffer(buffer: &Buffer) -> GraphicsResult<wgpu::Buffer> {
    match buffer.gpu_handle() {
        Some(GpuBuffer::Wgpu(buffer)) => Ok(buffer),
        Some(_) => Err(foreign("buffer")),
        None => Err(destroyed(buffer)),
    }
}

fn query_set(pool: &QueryPool) -> GraphicsResult<wgpu::QuerySet> {
    match pool.gpu_query_set() {
        Some(GpuQuerySet::Wgpu(set)) => Ok(set),
        Some(_) => Err(foreign("query set")),
        None => Err(destroyed(pool)),
    }
}

fn bind_groups(bindings: &Bindings) -> GraphicsResult<Vec<(u32, wgpu::BindGroup)>> {
    let groups = bindings.gpu_groups().ok_or_else(|| destroyed(bindings))?;
    groups
        .into_iter()
        .map(|(index, group)| match group {
            GpuBindGroup::Wgpu(group) => Ok((index, group)),
            _ => Err(foreign("bind group")),
        })
        .collect()
}

fn timestamp_set(
    writes: Option<&PassTimestampWrites>,
) -> GraphicsResult<Option<(wgpu::QuerySet, &PassTimestampWrites)>> {
    writes
        .map(|w| Ok((query_set(&w.query_pool)?, w)))
        .transpose()
}

impl WgpuBackend {
    /// Encode a render pass and submit it as one command buffer.
    pub fn submit_render_pass(&self, pass: &RenderPass) -> GraphicsResult<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: pass.descriptor().label.as_deref(),
            });
        self.encode_render_pass(&mut encoder, pass)?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Encode a compute pass and submit it as one command buffer.
    pub fn submit_compute_pass(&self, pass: &ComputePass) -> GraphicsResult<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: pass.descriptor().label.as_deref(),
            });
        self.encode_compute_pass(&mut encoder, pass)?;
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn encode_render_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &RenderPass,
    ) -> GraphicsResult<()> {
        let descriptor = pass.descriptor();

        // Resolve every native handle up front; the pass descriptor borrows them.
        let color_views = descriptor
            .color_attachments
            .iter()
            .map(|attachment| {
                let view = texture_view(&attachment.texture)?;
                let resolve = attachment
                    .resolve_target
                    .as_deref()
                    .map(texture_view)
                    .transpose()?;
                Ok((view, resolve, attachment.clear_color))
            })
            .collect::<GraphicsResult<Vec<_>>>()?;

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = color_views
            .iter()
            .map(|(view, resolve, clear)| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: resolve.as_ref(),
                    ops: wgpu::Operations {
                        load: convert_color_load_op(*clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
            })
            .collect();

        let depth = descriptor
            .depth_stencil_attachment
            .as_ref()
            .map(|attachment| Ok((texture_view(&attachment.texture)?, attachment)))
            .transpose()?;

        let depth_stencil_attachment = depth.as_ref().map(|(view, attachment)| {
            let stencil_ops = if attachment.texture.format().has_stencil() {
                Some(wgpu::Operations {
                    load: convert_clear_load_op(attachment.clear_stencil),
                    store: wgpu::StoreOp::Store,
                })
            } else {
                None
            };
            wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: convert_clear_load_op(attachment.clear_depth),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops,
            }
        });

        let occlusion_set = descriptor
            .occlusion_query_pool
            .as_deref()
            .map(query_set)
            .transpose()?;

        let timestamps = timestamp_set(descriptor.timestamp_writes.as_ref())?;
        let timestamp_writes = timestamps
            .as_ref()
            .map(|(set, writes)| wgpu::RenderPassTimestampWrites {
                query_set: set,
                beginning_of_pass_write_index: writes.beginning_of_pass_index,
                end_of_pass_write_index: writes.end_of_pass_index,
            });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: descriptor.label.as_deref(),
            color_attachments: &color_attachments,
            depth_stencil_attachment,
            timestamp_writes,
            occlusion_query_set: occlusion_set.as_ref(),
            multiview_mask: None,
        });

        for command in pass.commands() {
            match command {
                RenderCommand::SetPipeline(pipeline) => {
                    match pipeline.gpu_handle() {
                        Some(GpuPipeline::WgpuRender(p)) => render_pass.set_pipeline(&p),
                        Some(_) => return Err(foreign("render pipeline")),
                        None => return Err(destroyed(pipeline.as_ref())),
                    }
                }
                RenderCommand::SetBindings(bindings) => {
                    for (index, group) in bind_groups(bindings)? {
                        render_pass.set_bind_group(index, &group, &[]);
                    }
                }
                RenderCommand::SetVertexInput {
                    vertex_buffers,
                    index_buffer,
                    ..
                } => {
                    for (slot, buffer) in (0u32..).zip(vertex_buffers) {
                        let buffer = wgpu_buffer(buffer)?;
                        render_pass.set_vertex_buffer(slot, buffer.slice(..));
                    }
                    if let Some((buffer, format)) = index_buffer {
                        let buffer = wgpu_buffer(buffer)?;
                        render_pass
                            .set_index_buffer(buffer.slice(..), convert_index_format(*format));
                    }
                }
                RenderCommand::SetViewport(vp) => {
                    render_pass.set_viewport(
                        vp.x,
                        vp.y,
                        vp.width,
                        vp.height,
                        vp.min_depth,
                        vp.max_depth,
                    );
                }
                RenderCommand::SetScissorRect(rect) => {
                    render_pass.set_scissor_rect(rect.x, rect.y, rect.width, rect.height);
                }
                RenderCommand::Draw {
                    vertex_count,
                    instance_count,
                    first_vertex,
                    first_instance,
                } => {
                    render_pass.draw(
                        *first_vertex..*first_vertex + *vertex_count,
                        *first_instance..*first_instance + *instance_count,
                    );
                }
                RenderCommand::DrawIndexed {
                    index_count,
                    instance_count,
                    first_index,
                    base_vertex,
                    first_instance,
                } => {
                    render_pass.draw_indexed(
                        *first_index..*first_index + *index_count,
                        *base_vertex,
                        *first_instance..*first_instance + *instance_count,
                    );
                }
                RenderCommand::BeginOcclusionQuery(slot) => {
                    render_pass.begin_occlusion_query(*slot);
                }
                RenderCommand::EndOcclusionQuery => {
                    render_pass.end_occlusion_query();
                }
            }
        }

        Ok(())
    }

    fn encode_compute_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &ComputePass,
    ) -> GraphicsResult<()> {
        let descriptor = pass.descriptor();

        let timestamps = timestamp_set(descriptor.timestamp_writes.as_ref())?;
        let timestamp_writes = timestamps
            .as_ref()
            .map(|(set, writes)| wgpu::ComputePassTimestampWrites {
                query_set: set,
                beginning_of_pass_write_index: writes.beginning_of_pass_index,
                end_of_pass_write_index: writes.end_of_pass_index,
            });

        let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: descriptor.label.as_deref(),
            timestamp_writes,
        });

        for command in pass.commands() {
            match command {
                ComputeCommand::SetPipeline(pipeline) => match pipeline.gpu_handle() {
                    Some(GpuPipeline::WgpuCompute(p)) => compute_pass.set_pipeline(&p),
                    Some(_) => return Err(foreign("compute pipeline")),
                    None => return Err(destroyed(pipeline.as_ref())),
                },
                ComputeCommand::SetBindings(bindings) => {
                    for (index, group) in bind_groups(bindings)? {
                        compute_pass.set_bind_group(index, &group, &[]);
                    }
                }
                ComputeCommand::DispatchWorkgroups { x, y, z } => {
                    compute_pass.dispatch_workgroups(*x, *y, *z);
                }
            }
        }

        Ok(())
    }
}
