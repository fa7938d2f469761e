//! GPU texture resource.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::GpuTexture;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::types::{
    Extent3d, SamplerFormatKind, TextureDescriptor, TextureDimension, TextureFormat, TextureUsage,
};

use super::{Resource, ResourceBase, ResourceType};

/// A GPU texture resource.
///
/// Textures are created by [`GraphicsDevice::create_texture`] or
/// [`GraphicsDevice::create_render_target`]. Fallback textures substituted
/// into bindings are also `Texture`s, but they belong to the device and are
/// not listed in its registry.
pub struct Texture {
    base: ResourceBase,
    descriptor: TextureDescriptor,
    gpu_handle: Mutex<Option<GpuTexture>>,
}

impl Texture {
    /// Create a new texture (called by GraphicsDevice).
    pub(crate) fn new(
        device: Weak<GraphicsDevice>,
        resource_type: ResourceType,
        descriptor: TextureDescriptor,
        gpu_handle: GpuTexture,
    ) -> Self {
        Self {
            base: ResourceBase::new(device, resource_type, descriptor.label.clone()),
            descriptor,
            gpu_handle: Mutex::new(Some(gpu_handle)),
        }
    }

    /// Create a device-owned fallback texture.
    pub(crate) fn new_fallback(
        device: Weak<GraphicsDevice>,
        descriptor: TextureDescriptor,
        gpu_handle: GpuTexture,
    ) -> Self {
        Self {
            base: ResourceBase::untracked(device, ResourceType::Texture, descriptor.label.clone()),
            descriptor,
            gpu_handle: Mutex::new(Some(gpu_handle)),
        }
    }

    /// Get the parent device, if it still exists.
    pub fn device(&self) -> Option<Arc<GraphicsDevice>> {
        self.base.device()
    }

    /// Get the texture descriptor.
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.descriptor
    }

    /// Get the texture size.
    pub fn size(&self) -> Extent3d {
        self.descriptor.size
    }

    /// Get the texture format.
    pub fn format(&self) -> TextureFormat {
        self.descriptor.format
    }

    /// Get the view dimension.
    pub fn dimension(&self) -> TextureDimension {
        self.descriptor.dimension
    }

    /// Get the usage flags.
    pub fn usage(&self) -> TextureUsage {
        self.descriptor.usage
    }

    /// Kind of value a shader reads when sampling this texture.
    pub fn sample_kind(&self) -> SamplerFormatKind {
        self.descriptor.format.sample_kind()
    }

    /// Returns true for placeholder textures owned by the device.
    pub fn is_fallback(&self) -> bool {
        !self.base.is_tracked()
    }

    /// Get the backend handle, or `None` once destroyed.
    pub(crate) fn gpu_handle(&self) -> Option<GpuTexture> {
        self.gpu_handle.lock().clone()
    }

    /// Upload the full first mip level.
    ///
    /// `data` must hold exactly `width * height * depth` tightly packed texels.
    pub fn set_image_data(&self, data: &[u8]) -> GraphicsResult<()> {
        let Some(handle) = self.gpu_handle() else {
            return Err(GraphicsError::ResourceDestroyed(format!("texture {}", self.id())));
        };
        let desc = &self.descriptor;
        if desc.format.is_depth_stencil() || desc.sample_count > 1 {
            return Err(GraphicsError::FeatureNotSupported(format!(
                "uploading to {:?} textures with {} samples",
                desc.format, desc.sample_count
            )));
        }
        if !desc.usage.contains(TextureUsage::COPY_DST) {
            return Err(GraphicsError::InvalidDescriptor(
                "texture uploads require COPY_DST usage".to_string(),
            ));
        }
        let expected = desc.size.width as u64
            * desc.size.height as u64
            * desc.size.depth as u64
            * desc.format.block_size() as u64;
        if data.len() as u64 != expected {
            return Err(GraphicsError::InvalidDescriptor(format!(
                "texture upload has {} bytes, expected {expected}",
                data.len()
            )));
        }
        let device = self.device().ok_or(GraphicsError::DeviceLost)?;
        device.backend().write_texture(&handle, desc, data)
    }
}

impl Resource for Texture {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn destroy(&self) {
        if self.base.mark_destroyed()
            && let Some(handle) = self.gpu_handle.lock().take()
        {
            handle.release();
        }
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.base.id())
            .field("size", &self.descriptor.size)
            .field("dimension", &self.descriptor.dimension)
            .field("format", &self.descriptor.format)
            .field("label", &self.descriptor.label)
            .finish()
    }
}

// Ensure Texture is Send + Sync
static_assertions::assert_impl_all!(Texture: Send, Sync);

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::GpuBackend;
    use crate::backend::dummy::DummyBackend;

    fn detached_texture(backend: &DummyBackend, desc: TextureDescriptor) -> Texture {
        let handle = backend.create_texture(&desc).unwrap();
        Texture::new(Weak::new(), ResourceType::Texture, desc, handle)
    }

    #[test]
    fn test_texture_accessors() {
        let backend = DummyBackend::new();
        let texture = detached_texture(
            &backend,
            TextureDescriptor::new_2d(
                512,
                256,
                TextureFormat::R32Float,
                TextureUsage::TEXTURE_BINDING,
            ),
        );
        assert_eq!(texture.size(), Extent3d::new_2d(512, 256));
        assert_eq!(texture.sample_kind(), SamplerFormatKind::UnfilterableFloat);
        assert!(!texture.is_fallback());
    }

    #[test]
    fn test_set_image_data_checks_length() {
        let backend = DummyBackend::new();
        let texture = detached_texture(
            &backend,
            TextureDescriptor::new_2d(
                2,
                2,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            ),
        );
        assert!(matches!(
            texture.set_image_data(&[0; 15]),
            Err(GraphicsError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_depth_upload_not_supported() {
        let backend = DummyBackend::new();
        let texture = detached_texture(
            &backend,
            TextureDescriptor::new_2d(
                1,
                1,
                TextureFormat::Depth32Float,
                TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
            ),
        );
        assert!(matches!(
            texture.set_image_data(&[0; 4]),
            Err(GraphicsError::FeatureNotSupported(_))
        ));
    }
}
