//! Binding translation integration tests.
//!
//! Bindings are built against real pipelines on the dummy backend in both
//! of its binding models.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{Backend, TestContext};
use prism_device::{
    BindingModel, BindingPartition, BindingsDescriptor, BoundResource, BufferBinding,
    BufferUsage, GraphicsError, Resource, SamplerBinding, SamplerBindingLayout,
    SamplerFormatKind, StorageTextureBinding, TextureDescriptor, TextureDimension,
    TextureFormat, TextureUsage,
};

fn slots(entries: &[prism_device::BindingEntry]) -> Vec<u32> {
    entries.iter().map(|entry| entry.binding).collect()
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::dummy_flat(Backend::DummyFlat)]
fn test_buffer_slots_storage_before_uniform(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };
    let pipeline = ctx.create_compute_pipeline();
    let s0 = ctx.create_buffer(64, BufferUsage::STORAGE);
    let s1 = ctx.create_buffer(64, BufferUsage::STORAGE);
    let u0 = ctx.create_buffer(64, BufferUsage::UNIFORM);

    let bindings = ctx
        .device
        .create_bindings(
            &BindingsDescriptor::new(pipeline)
                .with_uniform_buffer(BufferBinding::new(u0.clone()))
                .with_storage_buffer(BufferBinding::new(s0.clone()))
                .with_storage_buffer(BufferBinding::new(s1.clone())),
        )
        .unwrap();

    assert_eq!(bindings.groups().len(), 1);
    let group = &bindings.groups()[0];
    assert_eq!(group.group_index, 0);
    assert_eq!(group.partition, BindingPartition::Buffers);
    assert_eq!(slots(&group.entries), vec![0, 1, 2]);

    let ids: Vec<_> = group.entries.iter().map(|e| e.resource.resource_id()).collect();
    assert_eq!(ids, vec![s0.id(), s1.id(), u0.id()]);
    assert_eq!(bindings.uniform_buffer_count(), 1);
}

#[test]
fn test_explicit_slots_do_not_advance_counter() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let pipeline = ctx.create_compute_pipeline();
    let storage = ctx.create_buffer(64, BufferUsage::STORAGE);
    let uniform_a = ctx.create_buffer(64, BufferUsage::UNIFORM);
    let uniform_b = ctx.create_buffer(64, BufferUsage::UNIFORM);

    let bindings = ctx
        .device
        .create_bindings(
            &BindingsDescriptor::new(pipeline)
                .with_storage_buffer(BufferBinding::at(5, storage))
                .with_uniform_buffer(BufferBinding::new(uniform_a))
                .with_uniform_buffer(BufferBinding::new(uniform_b)),
        )
        .unwrap();

    assert_eq!(slots(&bindings.groups()[0].entries), vec![5, 0, 1]);
}

#[test]
fn test_duplicate_slot_is_rejected() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let pipeline = ctx.create_compute_pipeline();
    let a = ctx.create_buffer(64, BufferUsage::STORAGE);
    let b = ctx.create_buffer(64, BufferUsage::UNIFORM);
    let live_before = ctx.device.live_resource_count();

    let result = ctx.device.create_bindings(
        &BindingsDescriptor::new(pipeline)
            .with_storage_buffer(BufferBinding::new(a))
            .with_uniform_buffer(BufferBinding::at(0, b)),
    );

    assert!(matches!(result, Err(GraphicsError::InvalidDescriptor(_))));
    assert_eq!(ctx.device.live_resource_count(), live_before);
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::dummy_flat(Backend::DummyFlat)]
fn test_sampler_pairs_take_two_slots(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        return;
    };
    let pipeline = ctx.create_triangle_pipeline();
    let albedo = ctx.create_texture(4, 4, TextureFormat::Rgba8Unorm);
    let sampler = ctx.create_sampler();
    let normal = ctx.create_texture(4, 4, TextureFormat::Rgba8Unorm);

    let bindings = ctx
        .device
        .create_bindings(
            &BindingsDescriptor::new(pipeline)
                .with_sampler(SamplerBinding::new(albedo.clone(), sampler.clone()))
                .with_sampler(SamplerBinding::default().with_texture(normal.clone())),
        )
        .unwrap();

    // Only the sampler partition is populated, so it becomes group 0.
    assert_eq!(bindings.groups().len(), 1);
    let group = &bindings.groups()[0];
    assert_eq!(group.group_index, 0);
    assert_eq!(group.partition, BindingPartition::Samplers);
    assert_eq!(slots(&group.entries), vec![0, 1, 2, 3]);

    assert!(matches!(&group.entries[0].resource, BoundResource::TextureView(t) if Arc::ptr_eq(t, &albedo)));
    assert!(matches!(&group.entries[1].resource, BoundResource::Sampler(s) if Arc::ptr_eq(s, &sampler)));
    assert!(matches!(&group.entries[2].resource, BoundResource::TextureView(t) if Arc::ptr_eq(t, &normal)));
    assert!(matches!(&group.entries[3].resource, BoundResource::Sampler(_)));
    assert!(group.entries[3].resource.is_fallback());
}

#[test]
fn test_missing_texture_uses_layout_fallback() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let pipeline = ctx.create_triangle_pipeline();

    let descriptor = BindingsDescriptor::new(pipeline)
        .with_sampler(SamplerBinding::empty(SamplerBindingLayout::new(
            TextureDimension::Cube,
            SamplerFormatKind::Depth,
        )))
        .with_sampler(SamplerBinding::empty(SamplerBindingLayout::new(
            TextureDimension::Cube,
            SamplerFormatKind::Depth,
        )));

    let first = ctx.device.create_bindings(&descriptor).unwrap();
    let second = ctx.device.create_bindings(&descriptor).unwrap();

    let entries = &first.groups()[0].entries;
    let BoundResource::TextureView(texture) = &entries[0].resource else {
        panic!("expected a texture view at slot 0");
    };
    assert!(texture.is_fallback());
    assert_eq!(texture.dimension(), TextureDimension::Cube);
    assert_eq!(texture.format(), TextureFormat::Depth32Float);

    // Same key, same fallback: across slots and across bindings objects.
    assert_eq!(
        entries[0].resource.resource_id(),
        entries[2].resource.resource_id()
    );
    assert_eq!(
        entries[1].resource.resource_id(),
        second.groups()[0].entries[1].resource.resource_id()
    );
    assert_eq!(ctx.device.fallback_count(), 2);
}

#[test]
fn test_empty_partitions_are_skipped() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let pipeline = ctx.create_compute_pipeline();
    let uniform = ctx.create_buffer(64, BufferUsage::UNIFORM);
    let image = ctx
        .device
        .create_texture(&TextureDescriptor::new_2d(
            8,
            8,
            TextureFormat::Rgba8Unorm,
            TextureUsage::STORAGE_BINDING,
        ))
        .unwrap();

    let bindings = ctx
        .device
        .create_bindings(
            &BindingsDescriptor::new(pipeline)
                .with_uniform_buffer(BufferBinding::new(uniform))
                .with_storage_texture(StorageTextureBinding::new(image.clone())),
        )
        .unwrap();

    let groups = bindings.groups();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].partition, BindingPartition::Buffers);
    assert_eq!(groups[1].partition, BindingPartition::StorageTextures);
    assert_eq!(groups[1].group_index, 1);
    assert_eq!(slots(&groups[1].entries), vec![0]);
    assert_eq!(bindings.native_group_count(), 2);
    assert!(bindings.plan().group(BindingPartition::Samplers).is_none());
}

#[test]
fn test_flat_model_builds_one_native_table() {
    let Some(ctx) = TestContext::new(Backend::DummyFlat) else {
        return;
    };
    assert_eq!(ctx.device.binding_model(), BindingModel::Flat);
    let pipeline = ctx.create_triangle_pipeline();
    let uniform = ctx.create_buffer(64, BufferUsage::UNIFORM);

    let bindings = ctx
        .device
        .create_bindings(
            &BindingsDescriptor::new(pipeline)
                .with_uniform_buffer(BufferBinding::new(uniform))
                .with_sampler(SamplerBinding::default()),
        )
        .unwrap();

    assert_eq!(bindings.groups().len(), 2);
    assert_eq!(bindings.native_group_count(), 1);

    let flat = bindings.plan().flatten();
    let layout: Vec<_> = flat.iter().map(|e| (e.partition, e.binding)).collect();
    assert_eq!(
        layout,
        vec![
            (BindingPartition::Buffers, 0),
            (BindingPartition::Samplers, 0),
            (BindingPartition::Samplers, 1),
        ]
    );
}

#[test]
fn test_invalid_bindings_are_rejected() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let pipeline = ctx.create_compute_pipeline();

    // Wrong usage.
    let vertex_only = ctx.create_buffer(64, BufferUsage::VERTEX);
    let result = ctx.device.create_bindings(
        &BindingsDescriptor::new(pipeline.clone())
            .with_uniform_buffer(BufferBinding::new(vertex_only)),
    );
    assert!(matches!(result, Err(GraphicsError::InvalidDescriptor(_))));

    // Range past the end of the buffer.
    let small = ctx.create_buffer(64, BufferUsage::STORAGE);
    let result = ctx.device.create_bindings(
        &BindingsDescriptor::new(pipeline.clone())
            .with_storage_buffer(BufferBinding::new(small.clone()).with_range(32, 64)),
    );
    assert!(matches!(result, Err(GraphicsError::InvalidDescriptor(_))));

    // Range whose end does not fit in u64.
    let uniform = ctx.create_buffer(64, BufferUsage::UNIFORM);
    let result = ctx.device.create_bindings(
        &BindingsDescriptor::new(pipeline.clone())
            .with_uniform_buffer(BufferBinding::new(uniform).with_range(16, u64::MAX)),
    );
    assert!(matches!(result, Err(GraphicsError::InvalidDescriptor(_))));

    // Destroyed buffer.
    small.destroy();
    let result = ctx.device.create_bindings(
        &BindingsDescriptor::new(pipeline.clone())
            .with_storage_buffer(BufferBinding::new(small)),
    );
    assert!(matches!(result, Err(GraphicsError::ResourceDestroyed(_))));

    // Empty storage texture slot.
    let result = ctx.device.create_bindings(
        &BindingsDescriptor::new(pipeline.clone())
            .with_storage_texture(StorageTextureBinding::default()),
    );
    assert!(matches!(result, Err(GraphicsError::InvalidDescriptor(_))));

    // Destroyed pipeline.
    pipeline.destroy();
    let result = ctx
        .device
        .create_bindings(&BindingsDescriptor::new(pipeline));
    assert!(matches!(result, Err(GraphicsError::ResourceDestroyed(_))));

    // No pipeline at all.
    let result = ctx.device.create_bindings(&BindingsDescriptor::default());
    assert!(matches!(result, Err(GraphicsError::InvalidDescriptor(_))));

    assert_eq!(ctx.device.fallback_count(), 0);
}

#[test]
fn test_bindings_destroy_releases_groups() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let pipeline = ctx.create_compute_pipeline();
    let uniform = ctx.create_buffer(64, BufferUsage::UNIFORM);
    let bindings = ctx
        .device
        .create_bindings(
            &BindingsDescriptor::new(pipeline.clone())
                .with_uniform_buffer(BufferBinding::new(uniform.clone())),
        )
        .unwrap();
    let handles = ctx.device.live_handle_count().unwrap();

    bindings.destroy();
    bindings.destroy();
    assert_eq!(bindings.native_group_count(), 0);
    assert_eq!(ctx.device.live_handle_count(), Some(handles - 1));

    uniform.destroy();
    pipeline.destroy();
    // The program backing the pipeline is still alive.
    let report = ctx.device.check_for_leaks();
    assert_eq!(report.len(), 1);
    assert!(!report.contains(bindings.id()));
}
