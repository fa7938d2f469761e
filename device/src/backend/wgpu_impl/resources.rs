//! Resource creation for the wgpu backend.

use std::sync::Arc;

use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{
    BufferDescriptor, ComputePipelineDescriptor, PrimitiveTopology, ProgramDescriptor,
    QueryPoolDescriptor, QueryPoolType, RenderPipelineDescriptor, SamplerDescriptor,
    ShaderStageSource, TextureDescriptor,
};

use super::super::{
    GpuBindGroup, GpuBindingEntry, GpuBindingResource, GpuBuffer, GpuPipeline, GpuProgram,
    GpuQuerySet, GpuSampler, GpuTexture, QueryReadback,
};
use super::conversion::{
    convert_address_mode, convert_buffer_usage, convert_compare_function, convert_cull_mode,
    convert_filter_mode, convert_index_format, convert_mipmap_filter_mode, convert_step_mode,
    convert_texture_dimension, convert_texture_format, convert_texture_usage, convert_topology,
    convert_vertex_format, convert_view_dimension,
};
use super::{MapState, WgpuBackend, WgpuProgram, WgpuReadback, WgpuStage};

impl WgpuBackend {
    /// Create a buffer resource.
    pub fn create_buffer(&self, descriptor: &BufferDescriptor) -> GraphicsResult<GpuBuffer> {
        let usage = convert_buffer_usage(descriptor.usage);

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: descriptor.label.as_deref(),
            size: descriptor.size,
            usage,
            mapped_at_creation: false,
        });

        Ok(GpuBuffer::Wgpu(buffer))
    }

    /// Create a texture resource and its default view.
    pub fn create_texture(&self, descriptor: &TextureDescriptor) -> GraphicsResult<GpuTexture> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: descriptor.label.as_deref(),
            size: wgpu::Extent3d {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth_or_array_layers: descriptor.size.depth,
            },
            mip_level_count: descriptor.mip_level_count,
            sample_count: descriptor.sample_count,
            dimension: convert_texture_dimension(descriptor.dimension),
            format: convert_texture_format(descriptor.format),
            usage: convert_texture_usage(descriptor.usage),
            view_formats: &[],
        });

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(convert_view_dimension(descriptor.dimension)),
            ..Default::default()
        });

        Ok(GpuTexture::Wgpu { texture, view })
    }

    /// Create a sampler resource.
    pub fn create_sampler(&self, descriptor: &SamplerDescriptor) -> GraphicsResult<GpuSampler> {
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: descriptor.label.as_deref(),
            address_mode_u: convert_address_mode(descriptor.address_mode_u),
            address_mode_v: convert_address_mode(descriptor.address_mode_v),
            address_mode_w: convert_address_mode(descriptor.address_mode_w),
            mag_filter: convert_filter_mode(descriptor.mag_filter),
            min_filter: convert_filter_mode(descriptor.min_filter),
            mipmap_filter: convert_mipmap_filter_mode(descriptor.mipmap_filter),
            lod_min_clamp: descriptor.lod_min_clamp,
            lod_max_clamp: descriptor.lod_max_clamp,
            compare: descriptor.compare.map(convert_compare_function),
            anisotropy_clamp: descriptor.anisotropy_clamp,
            border_color: None,
        });

        Ok(GpuSampler::Wgpu(sampler))
    }

    fn compile_stage(&self, label: Option<&str>, source: &ShaderStageSource) -> WgpuStage {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label,
                source: wgpu::ShaderSource::Wgsl(source.wgsl.as_str().into()),
            });
        WgpuStage {
            module,
            entry_point: source.entry_point.clone(),
        }
    }

    /// Compile every stage of a program into shader modules.
    pub fn create_program(&self, descriptor: &ProgramDescriptor) -> GraphicsResult<GpuProgram> {
        let label = descriptor.label.as_deref();
        Ok(GpuProgram::Wgpu(WgpuProgram {
            vertex: descriptor
                .vertex
                .as_ref()
                .map(|s| self.compile_stage(label, s)),
            fragment: descriptor
                .fragment
                .as_ref()
                .map(|s| self.compile_stage(label, s)),
            compute: descriptor
                .compute
                .as_ref()
                .map(|s| self.compile_stage(label, s)),
        }))
    }

    /// Create a render pipeline with a layout derived from the shaders.
    pub fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor,
        program: &GpuProgram,
    ) -> GraphicsResult<GpuPipeline> {
        let GpuProgram::Wgpu(program) = program else {
            return Err(GraphicsError::Internal(
                "create_render_pipeline called with non-Wgpu program".to_string(),
            ));
        };
        let Some(vertex) = &program.vertex else {
            return Err(GraphicsError::InvalidDescriptor(
                "render pipeline needs a vertex stage".to_string(),
            ));
        };

        let layout = descriptor.input_layout.descriptor();

        // Vertex attributes per buffer
        let buffer_count = layout.vertex_buffers.len();
        let mut vertex_attrs: Vec<Vec<wgpu::VertexAttribute>> = vec![Vec::new(); buffer_count];
        for attr in &layout.attributes {
            if let Some(attrs) = vertex_attrs.get_mut(attr.buffer_index as usize) {
                attrs.push(wgpu::VertexAttribute {
                    format: convert_vertex_format(attr.format),
                    offset: attr.buffer_byte_offset as u64,
                    shader_location: attr.location,
                });
            }
        }

        let vertex_buffer_layouts: Vec<wgpu::VertexBufferLayout> = layout
            .vertex_buffers
            .iter()
            .zip(&vertex_attrs)
            .map(|(buffer, attributes)| wgpu::VertexBufferLayout {
                array_stride: buffer.byte_stride as u64,
                step_mode: convert_step_mode(buffer.step_mode),
                attributes,
            })
            .collect();

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = descriptor
            .color_formats
            .iter()
            .map(|format| {
                Some(wgpu::ColorTargetState {
                    format: convert_texture_format(*format),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        // Strip topologies need the index format up front for primitive restart.
        let strip_index_format = match descriptor.topology {
            PrimitiveTopology::LineStrip | PrimitiveTopology::TriangleStrip => {
                layout.index_format.map(convert_index_format)
            }
            _ => None,
        };

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: descriptor.label.as_deref(),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some(vertex.entry_point.as_str()),
                    buffers: &vertex_buffer_layouts,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: program.fragment.as_ref().map(|fragment| wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: Some(fragment.entry_point.as_str()),
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: convert_topology(descriptor.topology),
                    strip_index_format,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: convert_cull_mode(descriptor.cull_mode),
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: descriptor.depth_stencil_format.map(|format| {
                    wgpu::DepthStencilState {
                        format: convert_texture_format(format),
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::LessEqual,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }
                }),
                multisample: wgpu::MultisampleState {
                    count: descriptor.sample_count.max(1),
                    ..Default::default()
                },
                multiview_mask: None,
                cache: None,
            });

        Ok(GpuPipeline::WgpuRender(pipeline))
    }

    /// Create a compute pipeline with a layout derived from the shader.
    pub fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor,
        program: &GpuProgram,
    ) -> GraphicsResult<GpuPipeline> {
        let GpuProgram::Wgpu(program) = program else {
            return Err(GraphicsError::Internal(
                "create_compute_pipeline called with non-Wgpu program".to_string(),
            ));
        };
        let Some(compute) = &program.compute else {
            return Err(GraphicsError::InvalidDescriptor(
                "compute pipeline needs a compute stage".to_string(),
            ));
        };

        let pipeline = self
            .device
            .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: descriptor.label.as_deref(),
                layout: None,
                module: &compute.module,
                entry_point: Some(compute.entry_point.as_str()),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                cache: None,
            });

        Ok(GpuPipeline::WgpuCompute(pipeline))
    }

    /// Create a bind group against the layout the pipeline derived for `group_index`.
    pub fn create_bind_group(
        &self,
        pipeline: &GpuPipeline,
        group_index: u32,
        label: Option<&str>,
        entries: &[GpuBindingEntry],
    ) -> GraphicsResult<GpuBindGroup> {
        let layout = match pipeline {
            GpuPipeline::WgpuRender(pipeline) => pipeline.get_bind_group_layout(group_index),
            GpuPipeline::WgpuCompute(pipeline) => pipeline.get_bind_group_layout(group_index),
            _ => {
                return Err(GraphicsError::Internal(
                    "create_bind_group called with non-Wgpu pipeline".to_string(),
                ));
            }
        };

        // Sampled views take the dimension the binding expects, which may
        // differ from the texture's default view.
        let views = entries
            .iter()
            .map(|entry| match &entry.resource {
                GpuBindingResource::TextureView {
                    texture: GpuTexture::Wgpu { texture, .. },
                    dimension,
                } => Ok(Some(texture.create_view(&wgpu::TextureViewDescriptor {
                    dimension: Some(convert_view_dimension(*dimension)),
                    ..Default::default()
                }))),
                GpuBindingResource::TextureView { .. } => Err(GraphicsError::Internal(
                    "create_bind_group called with non-Wgpu texture".to_string(),
                )),
                _ => Ok(None),
            })
            .collect::<GraphicsResult<Vec<_>>>()?;

        let wgpu_entries = entries
            .iter()
            .zip(&views)
            .map(|(entry, view)| {
                let resource = match (&entry.resource, view) {
                    (_, Some(view)) => wgpu::BindingResource::TextureView(view),
                    (
                        GpuBindingResource::Buffer {
                            buffer: GpuBuffer::Wgpu(buffer),
                            offset,
                            size,
                        },
                        None,
                    ) => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer,
                        offset: *offset,
                        size: size.and_then(wgpu::BufferSize::new),
                    }),
                    (GpuBindingResource::Sampler(GpuSampler::Wgpu(sampler)), None) => {
                        wgpu::BindingResource::Sampler(sampler)
                    }
                    (GpuBindingResource::StorageTexture(GpuTexture::Wgpu { view, .. }), None) => {
                        wgpu::BindingResource::TextureView(view)
                    }
                    _ => {
                        return Err(GraphicsError::Internal(format!(
                            "binding {} holds a non-Wgpu resource",
                            entry.binding
                        )));
                    }
                };
                Ok(wgpu::BindGroupEntry {
                    binding: entry.binding,
                    resource,
                })
            })
            .collect::<GraphicsResult<Vec<_>>>()?;

        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label,
            layout: &layout,
            entries: &wgpu_entries,
        });

        Ok(GpuBindGroup::Wgpu(group))
    }

    /// Create a query set. Timestamp sets need the adapter's timestamp feature.
    pub fn create_query_set(&self, descriptor: &QueryPoolDescriptor) -> GraphicsResult<GpuQuerySet> {
        let ty = match descriptor.ty {
            QueryPoolType::Occlusion => wgpu::QueryType::Occlusion,
            QueryPoolType::Timestamp if self.timestamp_queries => wgpu::QueryType::Timestamp,
            QueryPoolType::Timestamp => {
                return Err(GraphicsError::FeatureNotSupported(
                    "timestamp queries are not supported by this adapter".to_string(),
                ));
            }
        };

        let set = self.device.create_query_set(&wgpu::QuerySetDescriptor {
            label: descriptor.label.as_deref(),
            ty,
            count: descriptor.elem_count,
        });

        Ok(GpuQuerySet::Wgpu(set))
    }

    /// Write data to a buffer.
    pub fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) -> GraphicsResult<()> {
        if let GpuBuffer::Wgpu(wgpu_buffer) = buffer {
            self.queue.write_buffer(wgpu_buffer, offset, data);
            Ok(())
        } else {
            Err(GraphicsError::Internal(
                "write_buffer called with non-Wgpu buffer".to_string(),
            ))
        }
    }

    /// Write the first mip level of every layer of a texture.
    pub fn write_texture(
        &self,
        texture: &GpuTexture,
        descriptor: &TextureDescriptor,
        data: &[u8],
    ) -> GraphicsResult<()> {
        let GpuTexture::Wgpu {
            texture: wgpu_texture,
            ..
        } = texture
        else {
            return Err(GraphicsError::Internal(
                "write_texture called with non-Wgpu texture".to_string(),
            ));
        };

        let bytes_per_row = descriptor.size.width * descriptor.format.block_size();

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: wgpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(descriptor.size.height),
            },
            wgpu::Extent3d {
                width: descriptor.size.width,
                height: descriptor.size.height,
                depth_or_array_layers: descriptor.size.depth,
            },
        );

        Ok(())
    }

    /// Resolve queries, copy them to the staging buffer and start mapping it.
    pub fn begin_query_readback(
        &self,
        query_set: &GpuQuerySet,
        resolve: &GpuBuffer,
        staging: &GpuBuffer,
        count: u32,
    ) -> GraphicsResult<QueryReadback> {
        let (GpuQuerySet::Wgpu(set), GpuBuffer::Wgpu(resolve), GpuBuffer::Wgpu(staging)) =
            (query_set, resolve, staging)
        else {
            return Err(GraphicsError::Internal(
                "begin_query_readback called with non-Wgpu handles".to_string(),
            ));
        };

        let size = count as u64 * QueryPoolDescriptor::RESULT_SIZE;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Query Resolve Encoder"),
            });
        encoder.resolve_query_set(set, 0..count, resolve, 0);
        encoder.copy_buffer_to_buffer(resolve, 0, staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let state = Arc::new(parking_lot::Mutex::new(MapState::Pending));
        let callback_state = state.clone();
        staging
            .slice(0..size)
            .map_async(wgpu::MapMode::Read, move |result| {
                *callback_state.lock() = match result {
                    Ok(()) => MapState::Mapped,
                    Err(e) => MapState::Failed(e.to_string()),
                };
            });

        Ok(QueryReadback::Wgpu(WgpuReadback {
            staging: staging.clone(),
            size,
            state,
        }))
    }

    /// Check a readback without blocking; returns the values once mapped.
    pub fn poll_query_readback(&self, readback: &QueryReadback) -> GraphicsResult<Option<Vec<u64>>> {
        let QueryReadback::Wgpu(readback) = readback else {
            return Err(GraphicsError::Internal(
                "poll_query_readback called with non-Wgpu readback".to_string(),
            ));
        };

        if let Err(e) = self.device.poll(wgpu::PollType::Poll) {
            log::warn!("wgpu: device poll failed: {e}");
        }

        let mut state = readback.state.lock();
        if matches!(*state, MapState::Mapped) {
            let values = {
                let data = readback.staging.slice(0..readback.size).get_mapped_range();
                bytemuck::pod_collect_to_vec::<u8, u64>(&data)
            };
            readback.staging.unmap();
            *state = MapState::Consumed;
            return Ok(Some(values));
        }
        match &*state {
            MapState::Pending => Ok(None),
            MapState::Mapped => Ok(None),
            MapState::Consumed => Err(GraphicsError::Internal(
                "query readback was already consumed".to_string(),
            )),
            MapState::Failed(e) => Err(GraphicsError::Internal(format!(
                "query readback mapping failed: {e}"
            ))),
        }
    }
}
