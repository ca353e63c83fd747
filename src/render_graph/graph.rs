//! The render graph and its builder.

use crate::frame::FrameState;
use crate::gpu::GpuContext;
use crate::render_graph::{RenderContext, RenderNode, SceneTargets};

/// Builder for constructing render graphs with a fluent API.
///
/// Nodes are executed in the order they are added.
///
/// # Example
///
/// ```ignore
/// let graph = RenderGraph::builder()
///     .node(depth_pass)
///     .node(colour_pass)
///     .node(composite)
///     .build();
/// ```
pub struct RenderGraphBuilder {
    nodes: Vec<Box<dyn RenderNode>>,
}

impl RenderGraphBuilder {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Appends a node; it runs after every node added before it.
    pub fn node<N: RenderNode + 'static>(mut self, node: N) -> Self {
        self.nodes.push(Box::new(node));
        self
    }

    pub fn build(self) -> RenderGraph {
        RenderGraph { nodes: self.nodes }
    }
}

impl Default for RenderGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An ordered chain of [`RenderNode`]s sharing one command encoder.
pub struct RenderGraph {
    nodes: Vec<Box<dyn RenderNode>>,
}

impl RenderGraph {
    pub fn builder() -> RenderGraphBuilder {
        RenderGraphBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node names in execution order.
    pub fn node_names(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.name()).collect()
    }

    /// Lets every node upload its per-frame uniforms.
    pub fn prepare(&mut self, gpu: &GpuContext, frame: &FrameState) {
        for node in &mut self.nodes {
            node.prepare(gpu, frame);
        }
    }

    /// Tells every node the scene targets were recreated.
    pub fn resize(&mut self, gpu: &GpuContext, targets: &SceneTargets) {
        for node in &mut self.nodes {
            node.resize(gpu, targets);
        }
    }

    /// Records every node in order, each inside its own named scope.
    pub fn execute(&self, ctx: &mut RenderContext) {
        for node in &self.nodes {
            ctx.scope(node.name(), |ctx| node.execute(ctx));
        }
    }
}
