//! Texture types and descriptors.

use super::Extent3d;
use bitflags::bitflags;

/// Texture format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    // 8-bit formats
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 8-bit red channel, unsigned integer.
    R8Uint,
    /// 8-bit red channel, signed integer.
    R8Sint,

    // 16-bit formats
    /// 16-bit red channel, float.
    R16Float,
    /// 8-bit RG channels, unsigned normalized.
    Rg8Unorm,

    // 32-bit formats
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 32-bit red channel, signed integer.
    R32Sint,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 8-bit BGRA channels, unsigned normalized.
    Bgra8Unorm,
    /// 8-bit BGRA channels, sRGB.
    Bgra8UnormSrgb,

    // 64-bit formats
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RG channels, float.
    Rg32Float,

    // 128-bit formats
    /// 32-bit RGBA channels, float.
    Rgba32Float,

    // Depth/stencil formats
    /// 16-bit depth.
    Depth16Unorm,
    /// 24-bit depth.
    Depth24Plus,
    /// 24-bit depth with 8-bit stencil.
    Depth24PlusStencil8,
    /// 32-bit depth, float.
    Depth32Float,
}

impl TextureFormat {
    /// Returns true if this is a depth or stencil format.
    pub fn is_depth_stencil(&self) -> bool {
        matches!(
            self,
            Self::Depth16Unorm | Self::Depth24Plus | Self::Depth24PlusStencil8 | Self::Depth32Float
        )
    }

    /// Returns true if this format has a stencil component.
    pub fn has_stencil(&self) -> bool {
        matches!(self, Self::Depth24PlusStencil8)
    }

    /// Returns the size in bytes per texel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm | Self::R8Uint | Self::R8Sint => 1,
            Self::R16Float | Self::Rg8Unorm | Self::Depth16Unorm => 2,
            Self::R32Float
            | Self::R32Uint
            | Self::R32Sint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Depth24Plus
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => 4,
            Self::Rgba16Float | Self::Rg32Float => 8,
            Self::Rgba32Float => 16,
        }
    }

    /// The kind of value a shader reads when sampling this format.
    ///
    /// 32-bit float formats are not filterable without an optional
    /// device feature, so they report [`SamplerFormatKind::UnfilterableFloat`].
    pub fn sample_kind(&self) -> SamplerFormatKind {
        match self {
            Self::R8Uint | Self::R32Uint => SamplerFormatKind::Uint,
            Self::R8Sint | Self::R32Sint => SamplerFormatKind::Sint,
            Self::R32Float | Self::Rg32Float | Self::Rgba32Float => {
                SamplerFormatKind::UnfilterableFloat
            }
            Self::Depth16Unorm
            | Self::Depth24Plus
            | Self::Depth24PlusStencil8
            | Self::Depth32Float => SamplerFormatKind::Depth,
            _ => SamplerFormatKind::Float,
        }
    }
}

/// Shape of the values a sampled texture binding produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SamplerFormatKind {
    /// Filterable floating-point values.
    #[default]
    Float,
    /// Floating-point values that cannot be filtered.
    UnfilterableFloat,
    /// Depth values, read through a comparison sampler.
    Depth,
    /// Signed integer values.
    Sint,
    /// Unsigned integer values.
    Uint,
}

impl SamplerFormatKind {
    /// Format used for a 1x1 placeholder texture of this kind.
    pub fn fallback_format(&self) -> TextureFormat {
        match self {
            Self::Float => TextureFormat::Rgba8Unorm,
            Self::UnfilterableFloat => TextureFormat::R32Float,
            Self::Depth => TextureFormat::Depth32Float,
            Self::Sint => TextureFormat::R32Sint,
            Self::Uint => TextureFormat::R32Uint,
        }
    }
}

/// Dimensionality of a texture view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureDimension {
    /// One-dimensional texture.
    D1,
    /// Two-dimensional texture.
    #[default]
    D2,
    /// Array of two-dimensional layers.
    D2Array,
    /// Three-dimensional texture.
    D3,
    /// Cube map (six layers).
    Cube,
    /// Array of cube maps.
    CubeArray,
}

impl TextureDimension {
    /// Number of array layers a minimal texture of this dimension needs.
    pub fn min_layers(&self) -> u32 {
        match self {
            Self::Cube | Self::CubeArray => 6,
            _ => 1,
        }
    }
}

bitflags! {
    /// Usage flags for textures.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        /// Texture can be copied from.
        const COPY_SRC = 1 << 0;
        /// Texture can be copied to.
        const COPY_DST = 1 << 1;
        /// Texture can be sampled in a shader.
        const TEXTURE_BINDING = 1 << 2;
        /// Texture can be used as a storage texture.
        const STORAGE_BINDING = 1 << 3;
        /// Texture can be used as a render attachment.
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

impl Default for TextureUsage {
    fn default() -> Self {
        Self::empty()
    }
}

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    /// Debug label for the texture.
    pub label: Option<String>,
    /// Size of the texture. `depth` holds array layers for layered dimensions.
    pub size: Extent3d,
    /// View dimension.
    pub dimension: TextureDimension,
    /// Mip level count.
    pub mip_level_count: u32,
    /// Sample count for multisampling.
    pub sample_count: u32,
    /// Texture format.
    pub format: TextureFormat,
    /// Usage flags.
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Create a new 2D texture descriptor.
    pub fn new_2d(width: u32, height: u32, format: TextureFormat, usage: TextureUsage) -> Self {
        Self {
            label: None,
            size: Extent3d::new_2d(width, height),
            dimension: TextureDimension::D2,
            mip_level_count: 1,
            sample_count: 1,
            format,
            usage,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the view dimension and the depth or layer count.
    pub fn with_dimension(mut self, dimension: TextureDimension, depth: u32) -> Self {
        self.dimension = dimension;
        self.size.depth = depth.max(dimension.min_layers());
        self
    }

    /// Set the mip level count.
    pub fn with_mip_levels(mut self, count: u32) -> Self {
        self.mip_level_count = count;
        self
    }

    /// Set the sample count for multisampling.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            size: Extent3d::default(),
            dimension: TextureDimension::D2,
            mip_level_count: 1,
            sample_count: 1,
            format: TextureFormat::default(),
            usage: TextureUsage::empty(),
        }
    }
}

/// Descriptor for a render target: a 2D texture usable as a color or depth
/// attachment and, when single-sampled, as a shader input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderTargetDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Attachment format.
    pub format: TextureFormat,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Sample count (1 disables multisampling).
    pub sample_count: u32,
}

impl RenderTargetDescriptor {
    /// Create a single-sampled render target descriptor.
    pub fn new(format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            label: None,
            format,
            width,
            height,
            sample_count: 1,
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the sample count.
    pub fn with_sample_count(mut self, count: u32) -> Self {
        self.sample_count = count;
        self
    }

    /// Translate into the texture descriptor the backend allocates.
    pub fn to_texture_descriptor(&self) -> TextureDescriptor {
        let mut usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::COPY_SRC;
        if self.sample_count <= 1 {
            usage |= TextureUsage::TEXTURE_BINDING;
        }
        TextureDescriptor {
            label: self.label.clone(),
            size: Extent3d::new_2d(self.width, self.height),
            dimension: TextureDimension::D2,
            mip_level_count: 1,
            sample_count: self.sample_count.max(1),
            format: self.format,
            usage,
        }
    }
}
