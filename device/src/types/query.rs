//! Query pool types.

/// Kind of query a pool records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QueryPoolType {
    /// Number of samples that passed depth and stencil tests.
    #[default]
    Occlusion,
    /// GPU timestamp in ticks.
    Timestamp,
}

/// Descriptor for creating a query pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPoolDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Number of query slots.
    pub elem_count: u32,
    /// Query kind.
    pub ty: QueryPoolType,
}

impl QueryPoolDescriptor {
    /// Size in bytes of one resolved query value.
    pub const RESULT_SIZE: u64 = 8;

    /// Create a new query pool descriptor.
    pub fn new(ty: QueryPoolType, elem_count: u32) -> Self {
        Self {
            label: None,
            elem_count,
            ty,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Size of the resolve and staging buffers.
    pub fn result_buffer_size(&self) -> u64 {
        self.elem_count as u64 * Self::RESULT_SIZE
    }
}
