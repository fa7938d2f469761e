//! Shader program descriptors.

/// WGSL source for one shader stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderStageSource {
    /// WGSL module source.
    pub wgsl: String,
    /// Entry point name.
    pub entry_point: String,
}

impl ShaderStageSource {
    /// Create a stage from WGSL source and an entry point.
    pub fn new(wgsl: impl Into<String>, entry_point: impl Into<String>) -> Self {
        Self {
            wgsl: wgsl.into(),
            entry_point: entry_point.into(),
        }
    }
}

/// Descriptor for a program: either a vertex (+ optional fragment) pair or a
/// compute stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProgramDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Vertex stage.
    pub vertex: Option<ShaderStageSource>,
    /// Fragment stage.
    pub fragment: Option<ShaderStageSource>,
    /// Compute stage.
    pub compute: Option<ShaderStageSource>,
}

impl ProgramDescriptor {
    /// Create a render program.
    pub fn render(vertex: ShaderStageSource, fragment: Option<ShaderStageSource>) -> Self {
        Self {
            label: None,
            vertex: Some(vertex),
            fragment,
            compute: None,
        }
    }

    /// Create a compute program.
    pub fn compute(compute: ShaderStageSource) -> Self {
        Self {
            label: None,
            vertex: None,
            fragment: None,
            compute: Some(compute),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Returns true if the program can back a render pipeline.
    pub fn is_render(&self) -> bool {
        self.vertex.is_some()
    }

    /// Returns true if the program can back a compute pipeline.
    pub fn is_compute(&self) -> bool {
        self.compute.is_some()
    }
}
