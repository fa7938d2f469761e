//! Pipeline descriptors.

use std::sync::Arc;

use super::TextureFormat;
use crate::resources::{InputLayout, Program};

/// Primitive assembly topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Point list.
    PointList,
    /// Line list.
    LineList,
    /// Line strip.
    LineStrip,
    /// Triangle list.
    #[default]
    TriangleList,
    /// Triangle strip.
    TriangleStrip,
}

/// Face culling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    /// No culling.
    #[default]
    None,
    /// Cull front faces.
    Front,
    /// Cull back faces.
    Back,
}

/// Descriptor for a render pipeline.
///
/// The binding-group layout is derived from the program; bindings are later
/// built against the created pipeline.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Program providing the vertex and fragment stages.
    pub program: Arc<Program>,
    /// Vertex input layout.
    pub input_layout: Arc<InputLayout>,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Color attachment formats, one per attachment.
    pub color_formats: Vec<TextureFormat>,
    /// Depth-stencil attachment format.
    pub depth_stencil_format: Option<TextureFormat>,
    /// Face culling.
    pub cull_mode: CullMode,
    /// Sample count of every attachment.
    pub sample_count: u32,
}

impl RenderPipelineDescriptor {
    /// Create a render pipeline descriptor with triangle-list topology.
    pub fn new(program: Arc<Program>, input_layout: Arc<InputLayout>) -> Self {
        Self {
            label: None,
            program,
            input_layout,
            topology: PrimitiveTopology::TriangleList,
            color_formats: Vec::new(),
            depth_stencil_format: None,
            cull_mode: CullMode::None,
            sample_count: 1,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a color attachment format.
    pub fn with_color_format(mut self, format: TextureFormat) -> Self {
        self.color_formats.push(format);
        self
    }

    /// Set the depth-stencil format.
    pub fn with_depth_stencil_format(mut self, format: TextureFormat) -> Self {
        self.depth_stencil_format = Some(format);
        self
    }

    /// Set the topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Set the cull mode.
    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Set the attachment sample count.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }
}

/// Descriptor for a compute pipeline.
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Program providing the compute stage.
    pub program: Arc<Program>,
}

impl ComputePipelineDescriptor {
    /// Create a compute pipeline descriptor.
    pub fn new(program: Arc<Program>) -> Self {
        Self {
            label: None,
            program,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
