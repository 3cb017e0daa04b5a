use geo_types::{Coord, Line, LineString};
use smallvec::SmallVec;
use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub type NodeId = usize;
pub type DirEdgeId = usize;

#[derive(Clone, Debug)]
pub struct Node {
    pub coordinate: Coord<f64>,
    /// Outgoing half-edges. Sorted CCW by angle once `sort_edges` has run.
    pub outgoing: SmallVec<[DirEdgeId; 4]>,
    /// Live (not pruned) incident edges.
    pub degree: usize,
    pub removed: bool,
}

#[derive(Clone, Debug)]
pub struct DirectedEdge {
    pub src: NodeId,
    pub dst: NodeId,
    /// The opposite half-edge.
    pub sym: DirEdgeId,
    pub angle: f64,
    pub visited: bool,
    pub removed: bool,
}

// f64 is not Hash; key nodes by bit pattern. Callers snap beforehand, so
// equal positions are bit-identical.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct NodeKey(u64, u64);

impl From<Coord<f64>> for NodeKey {
    fn from(c: Coord<f64>) -> Self {
        NodeKey((c.x + 0.0).to_bits(), (c.y + 0.0).to_bits())
    }
}

/// Half-edge planar graph over already-noded segments.
#[derive(Default)]
pub struct PlanarGraph {
    pub nodes: Vec<Node>,
    pub directed_edges: Vec<DirectedEdge>,
    node_map: HashMap<NodeKey, NodeId>,
}

impl PlanarGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments<I>(segments: I) -> Self
    where
        I: IntoIterator<Item = Line<f64>>,
    {
        let mut graph = Self::new();
        for seg in segments {
            graph.add_segment(seg);
        }
        graph
    }

    pub fn node_id(&self, coord: Coord<f64>) -> Option<NodeId> {
        self.node_map.get(&NodeKey::from(coord)).copied()
    }

    pub fn add_node(&mut self, coord: Coord<f64>) -> NodeId {
        let key = NodeKey::from(coord);
        if let Some(&id) = self.node_map.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            coordinate: coord,
            outgoing: SmallVec::new(),
            degree: 0,
            removed: false,
        });
        self.node_map.insert(key, id);
        id
    }

    /// Adds one undirected edge as a pair of half-edges. Zero-length
    /// segments are ignored.
    pub fn add_segment(&mut self, seg: Line<f64>) {
        let (p0, p1) = (seg.start, seg.end);
        if NodeKey::from(p0) == NodeKey::from(p1) {
            return;
        }
        let u = self.add_node(p0);
        let v = self.add_node(p1);

        let forward = self.directed_edges.len();
        let backward = forward + 1;
        self.directed_edges.push(DirectedEdge {
            src: u,
            dst: v,
            sym: backward,
            angle: (p1.y - p0.y).atan2(p1.x - p0.x),
            visited: false,
            removed: false,
        });
        self.directed_edges.push(DirectedEdge {
            src: v,
            dst: u,
            sym: forward,
            angle: (p0.y - p1.y).atan2(p0.x - p1.x),
            visited: false,
            removed: false,
        });

        self.nodes[u].outgoing.push(forward);
        self.nodes[u].degree += 1;
        self.nodes[v].outgoing.push(backward);
        self.nodes[v].degree += 1;
    }

    pub fn add_line_string(&mut self, ls: &LineString<f64>) {
        for seg in ls.lines() {
            self.add_segment(seg);
        }
    }

    pub fn sort_edges(&mut self) {
        let edges = &self.directed_edges;
        let by_angle = |node: &mut Node| {
            node.outgoing.sort_by(|&a, &b| edges[a].angle.total_cmp(&edges[b].angle));
        };
        #[cfg(feature = "parallel")]
        self.nodes.par_iter_mut().for_each(by_angle);
        #[cfg(not(feature = "parallel"))]
        self.nodes.iter_mut().for_each(by_angle);
    }

    /// Iteratively removes degree-1 nodes together with their edge.
    /// Returns the number of nodes removed.
    pub fn prune_dangles(&mut self) -> usize {
        let mut stack: Vec<NodeId> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].degree == 1)
            .collect();
        let mut removed = 0;

        while let Some(id) = stack.pop() {
            if self.nodes[id].degree != 1 || self.nodes[id].removed {
                continue;
            }
            let live = self.nodes[id]
                .outgoing
                .iter()
                .copied()
                .find(|&de| !self.directed_edges[de].removed);

            self.nodes[id].removed = true;
            self.nodes[id].degree = 0;
            removed += 1;

            let Some(de) = live else { continue };
            let sym = self.directed_edges[de].sym;
            self.directed_edges[de].removed = true;
            self.directed_edges[sym].removed = true;

            let neighbor = self.directed_edges[de].dst;
            let node = &mut self.nodes[neighbor];
            node.degree = node.degree.saturating_sub(1);
            if node.degree == 1 && !node.removed {
                stack.push(neighbor);
            }
        }
        removed
    }

    /// Traces every face boundary, keeping the face on the left. Bounded
    /// faces come out counter-clockwise, the boundary of each connected
    /// component's outside comes out clockwise. Requires `sort_edges`.
    pub fn face_rings(&mut self) -> Vec<LineString<f64>> {
        for de in &mut self.directed_edges {
            de.visited = false;
        }

        let mut rings = Vec::new();
        for start in 0..self.directed_edges.len() {
            if self.directed_edges[start].visited || self.directed_edges[start].removed {
                continue;
            }
            if let Some(edges) = self.trace_from(start) {
                let mut coords = Vec::with_capacity(edges.len() + 1);
                coords.push(self.nodes[self.directed_edges[edges[0]].src].coordinate);
                coords.extend(edges.iter().map(|&de| self.nodes[self.directed_edges[de].dst].coordinate));
                rings.push(LineString::new(coords));
            }
        }
        rings
    }

    fn trace_from(&mut self, start: DirEdgeId) -> Option<Vec<DirEdgeId>> {
        let mut ring = Vec::new();
        let mut current = start;
        loop {
            self.directed_edges[current].visited = true;
            ring.push(current);

            let next = self.next_in_face(current)?;
            if next == start {
                return Some(ring);
            }
            if self.directed_edges[next].visited {
                return None;
            }
            current = next;
        }
    }

    /// The half-edge leaving `de`'s destination immediately clockwise of
    /// `de`'s sym, i.e. the sharpest left turn.
    fn next_in_face(&self, de: DirEdgeId) -> Option<DirEdgeId> {
        let edge = &self.directed_edges[de];
        let outgoing = &self.nodes[edge.dst].outgoing;
        let pos = outgoing.iter().position(|&e| e == edge.sym)?;
        let len = outgoing.len();
        (1..=len)
            .map(|i| outgoing[(pos + len - i) % len])
            .find(|&e| !self.directed_edges[e].removed)
    }
}
