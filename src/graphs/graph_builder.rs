use std::collections::{BTreeMap, HashMap};

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::graphs::{AlleleGraph, NodeLabel};
use crate::model::allele_index::AlleleIndex;
use crate::model::allele_set::AlleleSet;
use crate::msa::alignment_element::{AlignmentElement, Position};
use crate::utils::errors::TypingError;

/// One stop on an allele's walk through the graph: a single residue column
/// or a boundary marker. Stops become shared nodes; consecutive stops become
/// labeled edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Stop {
    Residue(Position, char),
    Boundary(usize, Position),
}

impl Stop {
    fn position(&self) -> Position {
        match self {
            Stop::Residue(pos, _) => *pos,
            Stop::Boundary(_, pos) => *pos,
        }
    }
}

#[derive(Debug)]
struct Segment {
    start: Position,
    end: Position,
    stops: Vec<Stop>,
}

/// Build the allele graph from finalized element lists. `alleles[0]` must be
/// the reference; the allele enumeration follows the slice order.
pub fn build_graph(
    alleles: &[(String, Vec<AlignmentElement>)],
    join_same_sequence: bool,
) -> Result<AlleleGraph, TypingError> {
    if alleles.is_empty() {
        return Err(TypingError::Other(
            "cannot build a graph with no alleles".to_string(),
        ));
    }

    let size = alleles.len();
    let allele_index =
        AlleleIndex::new(alleles.iter().map(|(name, _)| name.clone()).collect());

    let mut graph: StableDiGraph<NodeLabel, AlleleSet> = StableDiGraph::default();
    let mut sequence_nodes: HashMap<(Position, char), NodeIndex> = HashMap::new();
    let mut boundary_nodes: HashMap<(usize, Position), NodeIndex> = HashMap::new();
    let mut start_nodes: HashMap<Position, NodeIndex> = HashMap::new();
    let mut end_nodes: HashMap<Position, NodeIndex> = HashMap::new();
    // BTreeMap keeps edge insertion deterministic across runs.
    let mut edge_sets: BTreeMap<(NodeIndex, NodeIndex), AlleleSet> = BTreeMap::new();

    let reference_end = alleles[0]
        .1
        .iter()
        .filter_map(|element| match element {
            AlignmentElement::End(pos) => Some(*pos),
            _ => None,
        })
        .max()
        .ok_or_else(|| {
            TypingError::parse(
                alleles[0].0.as_str(),
                0,
                "reference allele has no End element",
            )
        })?;

    for (allele_pos, (name, elements)) in alleles.iter().enumerate() {
        let segments = collect_segments(name, elements)?;
        for segment in segments {
            if segment.end > reference_end && allele_pos != 0 {
                // Alleles like C*04:09N run past the reference End; they are
                // kept, the overhang is only worth a diagnostic.
                debug!(
                    "allele {} extends to {} past reference end {}",
                    name, segment.end, reference_end
                );
            }

            let mut path = Vec::with_capacity(segment.stops.len() + 2);
            path.push(
                *start_nodes
                    .entry(segment.start)
                    .or_insert_with(|| graph.add_node(NodeLabel::Start { pos: segment.start })),
            );
            for stop in &segment.stops {
                let node = match stop {
                    Stop::Residue(pos, residue) => {
                        *sequence_nodes.entry((*pos, *residue)).or_insert_with(|| {
                            graph.add_node(NodeLabel::Sequence {
                                pos: *pos,
                                seq: residue.to_string(),
                            })
                        })
                    }
                    Stop::Boundary(index, pos) => {
                        *boundary_nodes.entry((*index, *pos)).or_insert_with(|| {
                            graph.add_node(NodeLabel::Boundary {
                                index: *index,
                                pos: *pos,
                            })
                        })
                    }
                };
                path.push(node);
            }
            path.push(
                *end_nodes
                    .entry(segment.end)
                    .or_insert_with(|| graph.add_node(NodeLabel::End { pos: segment.end })),
            );

            for pair in path.windows(2) {
                edge_sets
                    .entry((pair[0], pair[1]))
                    .or_insert_with(|| AlleleSet::empty(size))
                    .insert(allele_pos);
            }
        }
    }

    for ((source, target), set) in edge_sets {
        debug_assert!(
            graph[source].position() <= graph[target].position(),
            "edge from {:?} to {:?} runs backwards",
            graph[source],
            graph[target]
        );
        graph.add_edge(source, target, set);
    }

    if join_same_sequence {
        join_unbranched_runs(&mut graph);
    }

    Ok(AlleleGraph::new(graph, allele_index, reference_end))
}

fn collect_segments(
    name: &str,
    elements: &[AlignmentElement],
) -> Result<Vec<Segment>, TypingError> {
    let mut segments = Vec::new();
    let mut open: Option<(Position, Vec<Stop>)> = None;

    for element in elements {
        match element {
            AlignmentElement::Start(pos) => {
                if open.is_some() {
                    return Err(TypingError::parse(
                        name,
                        *pos,
                        "segment start inside an open segment",
                    ));
                }
                open = Some((*pos, Vec::new()));
            }
            AlignmentElement::End(pos) => match open.take() {
                Some((start, stops)) => segments.push(Segment {
                    start,
                    end: *pos,
                    stops,
                }),
                None => {
                    return Err(TypingError::parse(
                        name,
                        *pos,
                        "segment end without an open segment",
                    ));
                }
            },
            AlignmentElement::Sequence { start, seq } => {
                if let Some((_, stops)) = open.as_mut() {
                    for (offset, residue) in seq.chars().enumerate() {
                        stops.push(Stop::Residue(*start + offset as Position, residue));
                    }
                } else {
                    return Err(TypingError::parse(
                        name,
                        *start,
                        "sequence outside any segment",
                    ));
                }
            }
            AlignmentElement::Boundary { index, pos } => {
                // Boundaries before an allele opens or between its segments
                // carry no path information.
                if let Some((_, stops)) = open.as_mut() {
                    stops.push(Stop::Boundary(*index, *pos));
                }
            }
            AlignmentElement::Gap { .. } => {}
        }
    }

    if let Some((start, _)) = open {
        return Err(TypingError::parse(name, start, "unterminated segment"));
    }
    Ok(segments)
}

/// Merge chains of sequence nodes with a unique successor/predecessor and
/// contiguous positions into residue runs. Every allele entering such a
/// chain leaves it the same way, so edge labels are preserved verbatim.
fn join_unbranched_runs(graph: &mut StableDiGraph<NodeLabel, AlleleSet>) {
    let mut candidates: Vec<NodeIndex> = graph.node_indices().collect();
    candidates.sort_by_key(|n| graph[*n].sort_key());

    for node in candidates {
        // The node may have been absorbed into an earlier run.
        if graph.node_weight(node).is_none() {
            continue;
        }
        loop {
            let next = {
                let mut outgoing = graph.edges_directed(node, Direction::Outgoing);
                match (outgoing.next(), outgoing.next()) {
                    (Some(edge), None) => edge.target(),
                    _ => break,
                }
            };
            if graph
                .edges_directed(next, Direction::Incoming)
                .count()
                != 1
            {
                break;
            }
            let joined = match (&graph[node], &graph[next]) {
                (
                    NodeLabel::Sequence { pos, seq },
                    NodeLabel::Sequence {
                        pos: next_pos,
                        seq: next_seq,
                    },
                ) if *pos + seq.len() as Position == *next_pos => {
                    let mut joined = seq.clone();
                    joined.push_str(next_seq);
                    joined
                }
                _ => break,
            };

            let pos = graph[node].position();
            let moved: Vec<(NodeIndex, AlleleSet)> = graph
                .edges_directed(next, Direction::Outgoing)
                .map(|edge| (edge.target(), edge.weight().clone()))
                .collect();
            graph.remove_node(next);
            graph[node] = NodeLabel::Sequence { pos, seq: joined };
            for (target, set) in moved {
                graph.add_edge(node, target, set);
            }
        }
    }
}
