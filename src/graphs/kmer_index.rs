use std::collections::HashMap;

use petgraph::stable_graph::NodeIndex;
use serde_derive::{Deserialize, Serialize};

use crate::graphs::{AlleleGraph, NodeLabel};
use crate::model::allele_set::AlleleSet;
use crate::msa::alignment_element::Position;
use crate::utils::errors::TypingError;

/// K-mer anchor index over the allele graph. Every k-length string readable
/// along a real allele path is recorded under the reference position of its
/// first residue; read lookup anchors the read's leading k-mer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmerIndex {
    k: usize,
    positions: HashMap<String, Vec<Position>>,
}

impl KmerIndex {
    pub fn build(graph: &AlleleGraph, k: usize) -> KmerIndex {
        assert!(k > 0, "k-mer size must be positive");
        let mut positions: HashMap<String, Vec<Position>> = HashMap::new();

        for node in graph.graph.node_indices() {
            if let NodeLabel::Sequence { pos, seq } = graph.label(node) {
                for offset in 0..seq.len() {
                    let carried = AlleleSet::full(graph.allele_index.size());
                    let mut prefix = String::with_capacity(k);
                    extend(
                        graph,
                        node,
                        offset,
                        &carried,
                        &mut prefix,
                        k,
                        *pos + offset as Position,
                        &mut positions,
                    );
                }
            }
        }

        for anchor_list in positions.values_mut() {
            anchor_list.sort_unstable();
            anchor_list.dedup();
        }

        KmerIndex { k, positions }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn kmer_count(&self) -> usize {
        self.positions.len()
    }

    /// Anchor positions for a read: where its leading k-mer occurs in the
    /// graph. An empty result means no anchor; a short read is an error.
    pub fn lookup(&self, read: &[u8]) -> Result<Vec<Position>, TypingError> {
        if read.len() < self.k {
            return Err(TypingError::Other(format!(
                "read of length {} is shorter than the k-mer size {}",
                read.len(),
                self.k
            )));
        }
        let key: String = read[..self.k]
            .iter()
            .map(|b| (*b as char).to_ascii_uppercase())
            .collect();
        Ok(self.positions.get(&key).cloned().unwrap_or_default())
    }
}

/// Walk graph paths accumulating residues until the prefix reaches k, taking
/// the allele-set intersection along the way so chimeric strings valid for
/// no allele never enter the index.
#[allow(clippy::too_many_arguments)]
fn extend(
    graph: &AlleleGraph,
    node: NodeIndex,
    offset: usize,
    carried: &AlleleSet,
    prefix: &mut String,
    k: usize,
    anchor: Position,
    positions: &mut HashMap<String, Vec<Position>>,
) {
    let needed = k - prefix.len();
    match graph.label(node) {
        NodeLabel::Sequence { seq, .. } => {
            let available = &seq[offset..];
            if available.len() >= needed {
                let mut kmer = prefix.clone();
                kmer.push_str(&available[..needed]);
                positions.entry(kmer).or_insert_with(Vec::new).push(anchor);
                return;
            }
            let rollback = prefix.len();
            prefix.push_str(available);
            for (edge_set, successor) in graph.successors(node) {
                let travelling = carried.intersect(edge_set);
                if travelling.is_empty() {
                    continue;
                }
                extend(
                    graph, successor, 0, &travelling, prefix, k, anchor, positions,
                );
            }
            prefix.truncate(rollback);
        }
        NodeLabel::Boundary { .. } => {
            // Boundaries carry no residues; pass through.
            for (edge_set, successor) in graph.successors(node) {
                let travelling = carried.intersect(edge_set);
                if travelling.is_empty() {
                    continue;
                }
                extend(
                    graph, successor, 0, &travelling, prefix, k, anchor, positions,
                );
            }
        }
        NodeLabel::End { .. } | NodeLabel::Start { .. } => {}
    }
}
