//! Resource lifecycle integration tests.
//!
//! Verify idempotent destruction, registry bookkeeping and leak reports
//! against every available backend.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{Backend, TestContext};
use prism_device::{
    BufferUsage, GraphicsError, Resource, ResourceType, SamplerBindingType, SamplerFormatKind,
    TextureDimension, TextureFormat,
};

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_destroy_twice_is_noop(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let buffer = ctx.create_buffer(256, BufferUsage::UNIFORM);
    let before = ctx.device.live_resource_count();

    buffer.destroy();
    assert!(buffer.is_destroyed());
    assert_eq!(ctx.device.live_resource_count(), before - 1);

    buffer.destroy();
    assert!(buffer.is_destroyed());
    assert_eq!(ctx.device.live_resource_count(), before - 1);
    assert!(!ctx.device.is_registered(buffer.id()));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_all_destroyed_reports_no_leaks(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let buffers: Vec<_> = (0..8)
        .map(|i| ctx.create_buffer(64 * (i + 1), BufferUsage::STORAGE))
        .collect();
    let texture = ctx.create_texture(4, 4, TextureFormat::Rgba8Unorm);
    let sampler = ctx.create_sampler();

    for buffer in &buffers {
        buffer.destroy();
    }
    texture.destroy();
    sampler.destroy();

    assert!(ctx.device.check_for_leaks().is_empty());
    assert_eq!(ctx.device.live_resource_count(), 0);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_single_leak_is_reported_by_id(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let buffers: Vec<_> = (0..5)
        .map(|_| ctx.create_buffer(128, BufferUsage::VERTEX))
        .collect();
    let leaked = buffers[3].id();
    ctx.device.set_resource_name(buffers[3].as_ref(), "forgotten vertices");

    for (i, buffer) in buffers.iter().enumerate() {
        if i != 3 {
            buffer.destroy();
        }
    }

    let report = ctx.device.check_for_leaks();
    assert_eq!(report.len(), 1);
    assert!(report.contains(leaked));
    let entry = report.iter().next().unwrap();
    assert_eq!(entry.resource_type, ResourceType::Buffer);
    assert_eq!(entry.name.as_deref(), Some("forgotten vertices"));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_dropped_without_destroy_still_leaks(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let id = {
        let texture = ctx.create_render_target(16, 16);
        texture.id()
    };

    let report = ctx.device.check_for_leaks();
    assert!(report.contains(id));
    assert_eq!(
        report.iter().next().map(|leak| leak.resource_type),
        Some(ResourceType::RenderTarget)
    );
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_fallbacks_are_memoized(#[case] backend: Backend) {
    use prism_device::FallbackProvider;

    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let device = &ctx.device;

    let a = device
        .fallback_texture(TextureDimension::D2, SamplerFormatKind::Float)
        .unwrap();
    let b = device
        .fallback_texture(TextureDimension::D2, SamplerFormatKind::Float)
        .unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert!(a.is_fallback());

    let cube = device
        .fallback_texture(TextureDimension::Cube, SamplerFormatKind::Float)
        .unwrap();
    assert!(!Arc::ptr_eq(&a, &cube));
    assert_eq!(cube.size().depth, 6);

    let depth = device
        .fallback_texture(TextureDimension::D2, SamplerFormatKind::Depth)
        .unwrap();
    assert_eq!(depth.format(), TextureFormat::Depth32Float);

    let s1 = device
        .fallback_sampler(SamplerBindingType::Comparison)
        .unwrap();
    let s2 = device
        .fallback_sampler(SamplerBindingType::Comparison)
        .unwrap();
    assert!(Arc::ptr_eq(&s1, &s2));

    assert_eq!(device.fallback_count(), 4);
    // Fallbacks belong to the device and never show up as leaks.
    assert!(device.check_for_leaks().is_empty());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_destroyed_device_rejects_work(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let buffer = ctx.create_buffer(64, BufferUsage::UNIFORM);
    ctx.device.destroy();
    ctx.device.destroy();
    assert!(ctx.device.is_destroyed());
    assert_eq!(ctx.device.fallback_count(), 0);

    let result = ctx.device.create_buffer(&prism_device::BufferDescriptor::new(
        64,
        BufferUsage::UNIFORM,
    ));
    assert!(matches!(result, Err(GraphicsError::DeviceLost)));

    // Resources created before teardown still report as leaks until destroyed.
    assert!(ctx.device.check_for_leaks().contains(buffer.id()));
    buffer.destroy();
    assert!(ctx.device.check_for_leaks().is_empty());
}

#[test]
fn test_destroy_releases_native_handles() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    assert_eq!(ctx.device.live_handle_count(), Some(0));

    let buffer = ctx.create_buffer(64, BufferUsage::STORAGE);
    let texture = ctx.create_texture(2, 2, TextureFormat::R32Float);
    assert_eq!(ctx.device.live_handle_count(), Some(2));

    buffer.destroy();
    texture.destroy();
    texture.destroy();
    assert_eq!(ctx.device.live_handle_count(), Some(0));
}
