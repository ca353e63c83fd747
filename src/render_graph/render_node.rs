//! The core render node trait for the render graph.

use crate::frame::FrameState;
use crate::gpu::GpuContext;
use crate::render_graph::{RenderContext, SceneTargets};

/// A stage of the frame: one or more compute or render passes.
///
/// # Execution Flow
///
/// 1. [`prepare`](Self::prepare) is called once per frame on every node,
///    before any commands are recorded. Nodes upload their uniforms here.
/// 2. [`execute`](Self::execute) is called in graph order, wrapped in a
///    debug group and profiler range named after the node.
/// 3. [`resize`](Self::resize) is called after the scene targets were
///    recreated so nodes can rebuild bind groups that reference them.
///
/// # Implementing Custom Nodes
///
/// ```ignore
/// struct ClearNode;
///
/// impl RenderNode for ClearNode {
///     fn name(&self) -> &str {
///         "Clear"
///     }
///
///     fn execute(&self, ctx: &mut RenderContext) {
///         let _pass = ctx.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
///             color_attachments: &[Some(wgpu::RenderPassColorAttachment {
///                 view: &ctx.targets.colour.view,
///                 // ... clear to the frame's clear colour
///             })],
///             // ...
///         });
///     }
/// }
/// ```
pub trait RenderNode {
    /// Debug-group and profiler-range name.
    fn name(&self) -> &str;

    /// Uploads per-frame data. The default does nothing.
    fn prepare(&mut self, _gpu: &GpuContext, _frame: &FrameState) {}

    /// Records this node's passes.
    fn execute(&self, ctx: &mut RenderContext);

    /// Rebuilds anything bound to the scene targets.
    fn resize(&mut self, _gpu: &GpuContext, _targets: &SceneTargets) {}
}
