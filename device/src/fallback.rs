//! Memoized placeholder textures and samplers.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::backend::GpuBackend;
use crate::device::GraphicsDevice;
use crate::error::GraphicsResult;
use crate::resources::{Resource, Sampler, Texture};
use crate::types::{
    SamplerBindingType, SamplerFormatKind, TextureDescriptor, TextureDimension, TextureUsage,
};

/// Device-owned fallbacks, created on first use and kept until the device is
/// destroyed. They never enter the resource registry.
#[derive(Default)]
pub(crate) struct FallbackCache {
    textures: HashMap<(TextureDimension, SamplerFormatKind), Arc<Texture>>,
    samplers: HashMap<SamplerBindingType, Arc<Sampler>>,
}

impl FallbackCache {
    pub(crate) fn texture(
        &mut self,
        device: &Weak<GraphicsDevice>,
        backend: &dyn GpuBackend,
        dimension: TextureDimension,
        kind: SamplerFormatKind,
    ) -> GraphicsResult<Arc<Texture>> {
        if let Some(texture) = self.textures.get(&(dimension, kind)) {
            return Ok(texture.clone());
        }
        let descriptor = TextureDescriptor::new_2d(
            1,
            1,
            kind.fallback_format(),
            TextureUsage::TEXTURE_BINDING,
        )
        .with_dimension(dimension, 1)
        .with_label(format!("fallback {dimension:?} {kind:?} texture"));
        let handle = backend.create_texture(&descriptor)?;
        log::debug!("Created fallback texture for {:?}/{:?}", dimension, kind);
        let texture = Arc::new(Texture::new_fallback(device.clone(), descriptor, handle));
        self.textures.insert((dimension, kind), texture.clone());
        Ok(texture)
    }

    pub(crate) fn sampler(
        &mut self,
        device: &Weak<GraphicsDevice>,
        backend: &dyn GpuBackend,
        ty: SamplerBindingType,
    ) -> GraphicsResult<Arc<Sampler>> {
        if let Some(sampler) = self.samplers.get(&ty) {
            return Ok(sampler.clone());
        }
        let descriptor = ty
            .descriptor()
            .with_label(format!("fallback {ty:?} sampler"));
        let handle = backend.create_sampler(&descriptor)?;
        log::debug!("Created fallback sampler for {:?}", ty);
        let sampler = Arc::new(Sampler::new_fallback(device.clone(), descriptor, handle));
        self.samplers.insert(ty, sampler.clone());
        Ok(sampler)
    }

    pub(crate) fn len(&self) -> usize {
        self.textures.len() + self.samplers.len()
    }

    /// Destroy every fallback and empty the cache.
    pub(crate) fn release_all(&mut self) {
        for (_, texture) in self.textures.drain() {
            texture.destroy();
        }
        for (_, sampler) in self.samplers.drain() {
            sampler.destroy();
        }
    }
}

#[cfg(all(test, feature = "dummy"))]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    #[test]
    fn test_fallbacks_are_memoized() {
        let backend = DummyBackend::new();
        let mut cache = FallbackCache::default();
        let device = Weak::new();

        let a = cache
            .texture(&device, &backend, TextureDimension::Cube, SamplerFormatKind::Depth)
            .unwrap();
        let b = cache
            .texture(&device, &backend, TextureDimension::Cube, SamplerFormatKind::Depth)
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.size().depth, 6);
        assert!(a.is_fallback());

        let s = cache
            .sampler(&device, &backend, SamplerBindingType::Comparison)
            .unwrap();
        assert!(s.descriptor().compare.is_some());
        assert_eq!(cache.len(), 2);
        assert_eq!(backend.live_handle_count(), Some(2));

        cache.release_all();
        assert_eq!(cache.len(), 0);
        assert!(a.is_destroyed());
        drop((a, b, s));
        assert_eq!(backend.live_handle_count(), Some(0));
    }
}
