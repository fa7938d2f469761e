//! Pass recording and query pool integration tests.
//!
//! Occlusion counts and timestamps are checked against the dummy backend,
//! which simulates them deterministically. Recording rules are checked on
//! every available backend.

mod common;

use std::sync::Arc;

use rstest::rstest;

use common::{Backend, TestContext};
use prism_device::{
    BindingsDescriptor, BufferBinding, BufferUsage, ColorAttachment, ComputePassDescriptor,
    GraphicsError, PassTimestampWrites, QueryPool, QueryPoolDescriptor, QueryPoolType,
    RenderPass, RenderPassDescriptor, Resource, Texture,
};

fn occlusion_pass(ctx: &TestContext, target: &Arc<Texture>, pool: &Arc<QueryPool>) -> RenderPass {
    ctx.device
        .create_render_pass(
            RenderPassDescriptor::new()
                .with_label("occlusion")
                .with_color_attachment(ColorAttachment::new(target.clone()))
                .with_occlusion_query_pool(pool.clone()),
        )
        .expect("Failed to create render pass")
}

#[test]
fn test_occlusion_results_per_slot() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let target = ctx.create_render_target(8, 8);
    let pipeline = ctx.create_triangle_pipeline();
    let pool = ctx.create_occlusion_pool(4);

    // Nothing was resolved yet.
    assert_eq!(pool.query_result_occlusion(0).unwrap(), None);

    let mut pass = occlusion_pass(&ctx, &target, &pool);
    pass.set_pipeline(&pipeline).unwrap();
    for (slot, vertices) in [(0u32, 5u32), (1, 6), (2, 7), (3, 8)] {
        pass.begin_occlusion_query(slot).unwrap();
        pass.draw(0..vertices, 0..1).unwrap();
        pass.end_occlusion_query().unwrap();
    }
    ctx.device.submit_pass(pass).unwrap();
    ctx.device.resolve_query_pool(&pool).unwrap();

    assert_eq!(pool.query_result_occlusion(2).unwrap(), Some(7));
    assert_eq!(pool.results().unwrap(), Some(vec![5, 6, 7, 8]));
    assert!(matches!(
        pool.query_result_occlusion(5),
        Err(GraphicsError::OutOfRange {
            index: 5,
            capacity: 4
        })
    ));
}

#[test]
fn test_occlusion_counts_instances_and_restarts() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let target = ctx.create_render_target(8, 8);
    let pipeline = ctx.create_triangle_pipeline();
    let pool = ctx.create_occlusion_pool(2);

    let mut pass = occlusion_pass(&ctx, &target, &pool);
    pass.set_pipeline(&pipeline).unwrap();
    pass.begin_occlusion_query(0).unwrap();
    pass.draw(0..3, 0..4).unwrap();
    pass.draw(0..3, 0..1).unwrap();
    pass.end_occlusion_query().unwrap();
    // Draws outside a query are not counted.
    pass.draw(0..30, 0..1).unwrap();
    ctx.device.submit_pass(pass).unwrap();
    ctx.device.resolve_query_pool(&pool).unwrap();
    assert_eq!(pool.results().unwrap(), Some(vec![15, 0]));

    // A second pass restarts the slot instead of accumulating.
    let mut pass = occlusion_pass(&ctx, &target, &pool);
    pass.set_pipeline(&pipeline).unwrap();
    pass.begin_occlusion_query(0).unwrap();
    pass.draw(0..3, 0..1).unwrap();
    pass.end_occlusion_query().unwrap();
    ctx.device.submit_pass(pass).unwrap();
    ctx.device.resolve_query_pool(&pool).unwrap();
    assert_eq!(pool.query_result_occlusion(0).unwrap(), Some(3));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_query_slot_out_of_range(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let target = ctx.create_render_target(8, 8);
    let pool = ctx.create_occlusion_pool(4);

    assert!(matches!(
        pool.query_result_occlusion(4),
        Err(GraphicsError::OutOfRange {
            index: 4,
            capacity: 4
        })
    ));

    let mut pass = occlusion_pass(&ctx, &target, &pool);
    assert!(matches!(
        pass.begin_occlusion_query(4),
        Err(GraphicsError::OutOfRange { .. })
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_query_pool_size_limits(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let empty = ctx
        .device
        .create_query_pool(&QueryPoolDescriptor::new(QueryPoolType::Occlusion, 0));
    assert!(matches!(empty, Err(GraphicsError::InvalidDescriptor(_))));

    let pool = ctx.create_occlusion_pool(16);
    assert_eq!(pool.capacity(), 16);
    assert_eq!(pool.ty(), QueryPoolType::Occlusion);
    pool.destroy();
    assert!(matches!(
        pool.results(),
        Err(GraphicsError::ResourceDestroyed(_))
    ));
    assert!(ctx.device.check_for_leaks().is_empty());
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_occlusion_query_nesting_rules(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let target = ctx.create_render_target(8, 8);
    let pipeline = ctx.create_triangle_pipeline();
    let pool = ctx.create_occlusion_pool(2);

    let mut pass = occlusion_pass(&ctx, &target, &pool);
    pass.set_pipeline(&pipeline).unwrap();

    assert!(matches!(
        pass.end_occlusion_query(),
        Err(GraphicsError::InvalidDescriptor(_))
    ));
    pass.begin_occlusion_query(0).unwrap();
    assert!(matches!(
        pass.begin_occlusion_query(1),
        Err(GraphicsError::InvalidDescriptor(_))
    ));

    // A query left open makes the pass unsubmittable.
    assert!(matches!(
        ctx.device.submit_pass(pass),
        Err(GraphicsError::InvalidDescriptor(_))
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_occlusion_query_requires_pool(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let target = ctx.create_render_target(8, 8);
    let mut pass = ctx
        .device
        .create_render_pass(
            RenderPassDescriptor::new().with_color_attachment(ColorAttachment::new(target)),
        )
        .unwrap();
    assert!(matches!(
        pass.begin_occlusion_query(0),
        Err(GraphicsError::InvalidDescriptor(_))
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_render_pass_descriptor_validation(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };

    let no_attachments = ctx.device.create_render_pass(RenderPassDescriptor::new());
    assert!(matches!(
        no_attachments,
        Err(GraphicsError::InvalidDescriptor(_))
    ));

    // Sampled-only textures cannot be rendered to.
    let sampled = ctx.create_texture(8, 8, prism_device::TextureFormat::Rgba8Unorm);
    let result = ctx.device.create_render_pass(
        RenderPassDescriptor::new().with_color_attachment(ColorAttachment::new(sampled)),
    );
    assert!(matches!(result, Err(GraphicsError::InvalidDescriptor(_))));

    // A timestamp pool is not an occlusion pool.
    let target = ctx.create_render_target(8, 8);
    let timestamps = ctx
        .device
        .create_query_pool(&QueryPoolDescriptor::new(QueryPoolType::Timestamp, 2));
    if let Ok(timestamps) = timestamps {
        let result = ctx.device.create_render_pass(
            RenderPassDescriptor::new()
                .with_color_attachment(ColorAttachment::new(target.clone()))
                .with_occlusion_query_pool(timestamps),
        );
        assert!(matches!(result, Err(GraphicsError::InvalidDescriptor(_))));
    }

    // Destroyed attachments are rejected.
    target.destroy();
    let result = ctx.device.create_render_pass(
        RenderPassDescriptor::new().with_color_attachment(ColorAttachment::new(target)),
    );
    assert!(matches!(result, Err(GraphicsError::ResourceDestroyed(_))));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_draw_requires_pipeline(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let target = ctx.create_render_target(8, 8);
    let mut pass = ctx
        .device
        .create_render_pass(
            RenderPassDescriptor::new().with_color_attachment(ColorAttachment::new(target)),
        )
        .unwrap();

    assert!(matches!(
        pass.draw(0..3, 0..1),
        Err(GraphicsError::InvalidDescriptor(_))
    ));
    assert!(pass.commands().is_empty());

    let pipeline = ctx.create_triangle_pipeline();
    pass.set_pipeline(&pipeline).unwrap();
    // No index buffer was bound.
    assert!(matches!(
        pass.draw_indexed(0..3, 0, 0..1),
        Err(GraphicsError::InvalidDescriptor(_))
    ));
    pass.draw(0..3, 0..1).unwrap();
    assert_eq!(pass.commands().len(), 2);
    ctx.device.submit_pass(pass).unwrap();
}

#[test]
fn test_bindings_must_match_bound_pipeline() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let first = ctx.create_compute_pipeline();
    let second = ctx.create_compute_pipeline();
    let buffer = ctx.create_buffer(64, BufferUsage::STORAGE);
    let bindings = ctx
        .device
        .create_bindings(
            &BindingsDescriptor::new(first.clone())
                .with_storage_buffer(BufferBinding::new(buffer)),
        )
        .unwrap();

    let mut pass = ctx
        .device
        .create_compute_pass(ComputePassDescriptor::new())
        .unwrap();
    assert!(matches!(
        pass.set_bindings(&bindings),
        Err(GraphicsError::InvalidDescriptor(_))
    ));

    pass.set_pipeline(&second).unwrap();
    assert!(matches!(
        pass.set_bindings(&bindings),
        Err(GraphicsError::InvalidDescriptor(_))
    ));

    pass.set_pipeline(&first).unwrap();
    pass.set_bindings(&bindings).unwrap();
    pass.dispatch_workgroups(1, 1, 1).unwrap();
    ctx.device.submit_pass(pass).unwrap();

    bindings.destroy();
    let mut pass = ctx
        .device
        .create_compute_pass(ComputePassDescriptor::new())
        .unwrap();
    pass.set_pipeline(&first).unwrap();
    assert!(matches!(
        pass.set_bindings(&bindings),
        Err(GraphicsError::ResourceDestroyed(_))
    ));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_compute_dispatch(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let mut pass = ctx
        .device
        .create_compute_pass(ComputePassDescriptor::new().with_label("empty kernel"))
        .unwrap();
    assert!(matches!(
        pass.dispatch_workgroups(1, 1, 1),
        Err(GraphicsError::InvalidDescriptor(_))
    ));

    let pipeline = ctx.create_compute_pipeline();
    pass.set_pipeline(&pipeline).unwrap();
    pass.dispatch_workgroups(4, 1, 1).unwrap();
    ctx.device.submit_pass(pass).unwrap();
}

#[test]
fn test_timestamps_increase_across_pass() {
    let Some(ctx) = TestContext::new(Backend::Dummy) else {
        return;
    };
    let pool = ctx
        .device
        .create_query_pool(&QueryPoolDescriptor::new(QueryPoolType::Timestamp, 4))
        .unwrap();
    let pipeline = ctx.create_compute_pipeline();

    let mut pass = ctx
        .device
        .create_compute_pass(
            ComputePassDescriptor::new()
                .with_timestamp_writes(PassTimestampWrites::new(pool.clone(), 0, 1)),
        )
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();
    pass.dispatch_workgroups(1, 1, 1).unwrap();
    ctx.device.submit_pass(pass).unwrap();
    ctx.device.resolve_query_pool(&pool).unwrap();

    let values = pool.results().unwrap().expect("dummy readback is immediate");
    assert_eq!(values.len(), 4);
    assert!(values[1] > values[0]);
    assert!(values[0] > 0);

    // Timestamp slots must exist in the pool.
    let result = ctx.device.create_compute_pass(
        ComputePassDescriptor::new().with_timestamp_writes(PassTimestampWrites::new(pool, 0, 9)),
    );
    assert!(matches!(result, Err(GraphicsError::OutOfRange { .. })));
}

#[rstest]
#[case::dummy(Backend::Dummy)]
#[case::webgpu(Backend::WebGpu)]
fn test_submit_after_device_destroyed(#[case] backend: Backend) {
    let Some(ctx) = TestContext::new(backend) else {
        eprintln!("Backend {:?} not available, skipping", backend);
        return;
    };
    let pipeline = ctx.create_compute_pipeline();
    let mut pass = ctx
        .device
        .create_compute_pass(ComputePassDescriptor::new())
        .unwrap();
    pass.set_pipeline(&pipeline).unwrap();

    ctx.device.destroy();
    assert!(matches!(
        ctx.device.submit_pass(pass),
        Err(GraphicsError::DeviceLost)
    ));
    pipeline.destroy();
}

fn record_occlusion(ctx: &TestContext, pool: &Arc<QueryPool>, vertices: u32) {
    let target = ctx.create_render_target(8, 8);
    let pipeline = ctx.create_triangle_pipeline();
    let mut pass = occlusion_pass(ctx, &target, pool);
    pass.set_pipeline(&pipeline).unwrap();
    pass.begin_occlusion_query(0).unwrap();
    pass.draw(0..vertices, 0..1).unwrap();
    pass.end_occlusion_query().unwrap();
    ctx.device.submit_pass(pass).unwrap();
}

#[test]
fn test_results_absent_while_readback_in_flight() {
    let Some(ctx) = TestContext::new(Backend::DummySlowReadback) else {
        return;
    };
    let pool = ctx.create_occlusion_pool(2);

    record_occlusion(&ctx, &pool, 5);
    ctx.device.resolve_query_pool(&pool).unwrap();
    assert_eq!(pool.query_result_occlusion(0).unwrap(), None);

    // Resolving again while the first readback is pending replaces it.
    record_occlusion(&ctx, &pool, 9);
    ctx.device.resolve_query_pool(&pool).unwrap();
    assert_eq!(pool.query_result_occlusion(0).unwrap(), None);
    assert_eq!(pool.query_result_occlusion(0).unwrap(), None);
    assert_eq!(pool.query_result_occlusion(0).unwrap(), Some(9));

    // Completed values stay readable until the next resolve.
    assert_eq!(pool.results().unwrap(), Some(vec![9, 0]));
    ctx.device.resolve_query_pool(&pool).unwrap();
    assert_eq!(pool.results().unwrap(), None);
}

#[test]
fn test_destroy_pool_with_readback_in_flight() {
    let Some(ctx) = TestContext::new(Backend::DummySlowReadback) else {
        return;
    };
    let pool = ctx.create_occlusion_pool(2);
    ctx.device.resolve_query_pool(&pool).unwrap();
    assert_eq!(pool.results().unwrap(), None);

    pool.destroy();
    assert!(matches!(
        pool.results(),
        Err(GraphicsError::ResourceDestroyed(_))
    ));
    assert!(matches!(
        ctx.device.resolve_query_pool(&pool),
        Err(GraphicsError::ResourceDestroyed(_))
    ));
    assert_eq!(ctx.device.live_handle_count(), Some(0));
}
