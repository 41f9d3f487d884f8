pub mod graph_builder;
pub mod kmer_index;

use std::collections::HashMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_derive::{Deserialize, Serialize};

use crate::model::allele_index::AlleleIndex;
use crate::model::allele_set::AlleleSet;
use crate::msa::alignment_element::Position;
use crate::utils::errors::TypingError;

/// Vertex of the allele graph. The graph is a DAG in reference position:
/// every edge points at a node whose position is >= its source's, so a
/// position-keyed priority queue visits nodes in topological order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeLabel {
    /// An allele segment begins here. Never the target of read alignment.
    Start { pos: Position },
    /// An allele segment ends strictly before this position.
    End { pos: Position },
    Boundary { index: usize, pos: Position },
    /// Residue run shared by every allele whose edge reaches it.
    Sequence { pos: Position, seq: String },
}

impl NodeLabel {
    pub fn position(&self) -> Position {
        match self {
            NodeLabel::Start { pos } => *pos,
            NodeLabel::End { pos } => *pos,
            NodeLabel::Boundary { pos, .. } => *pos,
            NodeLabel::Sequence { pos, .. } => *pos,
        }
    }

    /// Exclusive end of the span this node occupies on the reference axis.
    pub fn end_position(&self) -> Position {
        match self {
            NodeLabel::Start { pos } => *pos,
            NodeLabel::End { pos } => *pos,
            NodeLabel::Boundary { pos, .. } => *pos + 1,
            NodeLabel::Sequence { pos, seq } => *pos + seq.len() as Position,
        }
    }

    /// Tie-break rank for nodes sharing a position: S, E, B, N.
    pub fn tag_rank(&self) -> u8 {
        match self {
            NodeLabel::Start { .. } => 0,
            NodeLabel::End { .. } => 1,
            NodeLabel::Boundary { .. } => 2,
            NodeLabel::Sequence { .. } => 3,
        }
    }

    pub fn sort_key(&self) -> (Position, u8) {
        (self.position(), self.tag_rank())
    }
}

/// Seed frontier returned by `adjacents_at`: the (edge label, node) pairs
/// reachable at an anchor position and the union of allele bits present on
/// them. Alleles absent from `seen` have no path near the anchor.
#[derive(Debug, Clone)]
pub struct Adjacents {
    pub seeds: Vec<(AlleleSet, NodeIndex)>,
    pub seen: AlleleSet,
}

/// The allele string graph: nodes labeled with sentinels/boundaries/residue
/// runs, edges labeled with the set of alleles that traverse them.
#[derive(Debug, Serialize, Deserialize)]
pub struct AlleleGraph {
    pub graph: StableDiGraph<NodeLabel, AlleleSet>,
    pub allele_index: AlleleIndex,
    /// Exclusive end of the reference allele's last segment.
    pub reference_end: Position,
    #[serde(skip)]
    seed_edges: HashMap<Position, Vec<EdgeIndex>>,
    #[serde(skip)]
    bounds: Option<(Position, Position)>,
}

impl AlleleGraph {
    pub fn new(
        graph: StableDiGraph<NodeLabel, AlleleSet>,
        allele_index: AlleleIndex,
        reference_end: Position,
    ) -> AlleleGraph {
        let mut built = AlleleGraph {
            graph,
            allele_index,
            reference_end,
            seed_edges: HashMap::new(),
            bounds: None,
        };
        built.build_seed_index();
        built
    }

    pub fn label(&self, node: NodeIndex) -> &NodeLabel {
        self.graph
            .node_weight(node)
            .expect("stale node index in allele graph")
    }

    pub fn successors(
        &self,
        node: NodeIndex,
    ) -> impl Iterator<Item = (&AlleleSet, NodeIndex)> + '_ {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .map(|edge| (edge.weight(), edge.target()))
    }

    /// Rebuild the position-indexed seed table. Must run after
    /// deserialization and after any structural change to the graph.
    pub fn build_seed_index(&mut self) {
        self.seed_edges.clear();

        let mut min_pos = Position::MAX;
        let mut max_pos = Position::MIN;
        for node in self.graph.node_indices() {
            let label = &self.graph[node];
            min_pos = min_pos.min(label.position());
            max_pos = max_pos.max(label.end_position());
        }
        self.bounds = if min_pos <= max_pos {
            Some((min_pos, max_pos))
        } else {
            None
        };

        for edge in self.graph.edge_indices() {
            let (source, target) = self
                .graph
                .edge_endpoints(edge)
                .expect("stale edge index in allele graph");
            let source_end = self.graph[source].end_position();
            let target_label = &self.graph[target];
            // Positions the edge jumps over (gap edges), then positions the
            // target node itself covers. An empty range means no jump.
            for pos in source_end..target_label.position() {
                self.seed_edges.entry(pos).or_insert_with(Vec::new).push(edge);
            }
            for pos in target_label.position()..target_label.end_position() {
                self.seed_edges.entry(pos).or_insert_with(Vec::new).push(edge);
            }
        }
    }

    /// Seed frontier for a read anchored at `pos`.
    pub fn adjacents_at(&self, pos: Position) -> Result<Adjacents, TypingError> {
        let (min_pos, max_pos) = self.bounds.ok_or_else(|| {
            TypingError::Other("allele graph has no nodes".to_string())
        })?;
        if pos < min_pos || pos >= max_pos {
            return Err(TypingError::Other(format!(
                "anchor position {} outside graph span {}..{}",
                pos, min_pos, max_pos
            )));
        }

        let mut seeds = Vec::new();
        let mut seen = AlleleSet::empty(self.allele_index.size());
        if let Some(edges) = self.seed_edges.get(&pos) {
            for edge in edges {
                let set = self
                    .graph
                    .edge_weight(*edge)
                    .expect("stale edge index in allele graph");
                let (_, target) = self.graph.edge_endpoints(*edge).unwrap();
                seen.union_with(set);
                seeds.push((set.clone(), target));
            }
        }

        Ok(Adjacents { seeds, seen })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
