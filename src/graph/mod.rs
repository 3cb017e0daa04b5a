mod planar_graph;

pub use planar_graph::{DirEdgeId, DirectedEdge, Node, NodeId, NodeKey, PlanarGraph};
