//! Render graph for the fog demo's frame.
//!
//! The frame is a fixed chain of nodes, each of which records compute or
//! render passes into one shared command encoder:
//!
//! ```text
//! ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌──────────┐  ┌───────┐  ┌────────┐  ┌───────────┐
//! │  Shadow  │─▶│  Shadow  │─▶│   Fog    │─▶│   Fog    │─▶│ Depth │─▶│ Colour │─▶│    Fog    │
//! │ moments  │  │   blur   │  │ scatter  │  │  accum   │  │ pass  │  │  pass  │  │ composite │
//! └──────────┘  └──────────┘  └──────────┘  └──────────┘  └───────┘  └────────┘  └───────────┘
//! ```
//!
//! Every node runs inside a debug group and a profiler range carrying its
//! [`name`](RenderNode::name), so GPU captures and performance reports use
//! the same labels. Nodes may open nested ranges with
//! [`RenderContext::scope`].
//!
//! Nodes that produce intermediate images write into [`SceneTargets`],
//! which the graph resizes with the surface.

mod graph;
mod render_node;
mod render_target;

pub use graph::{RenderGraph, RenderGraphBuilder};
pub use render_node::RenderNode;
pub use render_target::{
    COLOUR_FORMAT, DEPTH_FORMAT, LINEAR_DEPTH_FORMAT, RenderContext, RenderTarget, SceneTargets,
};
