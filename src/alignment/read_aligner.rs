use std::collections::BTreeMap;

use petgraph::stable_graph::NodeIndex;

use crate::alignment::alignment_group::{AlignmentGroup, EarlyStop};
use crate::graphs::{AlleleGraph, NodeLabel};
use crate::model::allele_map::AlleleMap;
use crate::model::allele_set::AlleleSet;
use crate::msa::alignment_element::Position;
use crate::utils::errors::TypingError;

/// Result of aligning one read from one anchor position: the per-allele
/// accumulator map, tagged with whether the traversal ran to completion or
/// tripped the early-stop filter.
#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentOutcome<A> {
    Finished(AlleleMap<A>),
    Stopped(AlleleMap<A>),
}

impl<A> AlignmentOutcome<A> {
    pub fn map(&self) -> &AlleleMap<A> {
        match self {
            AlignmentOutcome::Finished(map) => map,
            AlignmentOutcome::Stopped(map) => map,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, AlignmentOutcome::Finished(_))
    }
}

/// Ordering key for the traversal frontier: reference position first, then
/// node tag, then the node id for a stable total order.
type QueueKey = (Position, u8, NodeIndex);

/// Each frontier entry maps a node to the read cursors arriving at it and
/// the alleles traveling with each cursor. Entries for the same cursor
/// coalesce by set union; processing order inside a batch cannot change the
/// final map because merge and incr commute over disjoint allele subsets.
type Frontier = Vec<(usize, AlleleSet)>;

enum LocalResult<A> {
    /// The read ran out first (or both ended together).
    Finished(A),
    /// The node ran out with read remaining; continue at the new cursor.
    GoOn(A, usize),
}

/// Align `read` against the allele graph starting from `anchor`. The read is
/// never split: a single traversal advances the read cursor through
/// successive nodes along every edge compatible with the progressively
/// refined allele sets, and every allele in the index receives an
/// accumulator describing how well the read supports it.
pub fn align<G: AlignmentGroup>(
    graph: &AlleleGraph,
    group: &G,
    early_stop: &EarlyStop,
    read: &[u8],
    anchor: Position,
) -> Result<AlignmentOutcome<G::Acc>, TypingError> {
    let read_len = read.len();
    let size = graph.allele_index.size();
    let threshold = early_stop.threshold(read_len);

    let mut map = AlleleMap::make(size, group.zero());
    let mut stop_state = group.init_stop();
    let mut queue: BTreeMap<QueueKey, Frontier> = BTreeMap::new();

    let adjacents = graph.adjacents_at(anchor)?;

    // Alleles with no path near the anchor are charged a whole-read
    // mismatch up front. The charge bypasses the stop state: it reflects
    // absence, not alignment progress.
    let unseen = adjacents.seen.complement();
    if !unseen.is_empty() && read_len > 0 {
        let penalty = group.incr(&group.zero(), anchor, 0, read_len);
        map.update_by_set(&unseen, |acc| *acc = group.merge(acc, &penalty));
    }

    for (set, node) in adjacents.seeds {
        let label = graph.label(node);
        let dist = label.position() - anchor;
        if dist <= 0 {
            process_node(
                graph, group, read, node, (-dist) as usize, 0, &set, &mut map, &mut stop_state,
                &mut queue,
            );
        } else if (dist as usize) < read_len {
            // The node starts after the anchor inside the read span; the
            // unmatched prefix is charged before alignment begins.
            let prefix = group.incr(&group.zero(), anchor, 0, dist as usize);
            commit(group, &mut map, &set, &prefix, &mut stop_state);
            process_node(
                graph,
                group,
                read,
                node,
                0,
                dist as usize,
                &set,
                &mut map,
                &mut stop_state,
                &mut queue,
            );
        } else {
            let penalty = group.incr(&group.zero(), anchor, 0, read_len);
            commit(group, &mut map, &set, &penalty, &mut stop_state);
        }
    }
    if group.should_stop(threshold, &stop_state) {
        return Ok(AlignmentOutcome::Stopped(map));
    }

    while let Some((&(batch_pos, _, _), _)) = queue.iter().next() {
        loop {
            let matches_batch = queue
                .iter()
                .next()
                .map(|(key, _)| key.0 == batch_pos)
                .unwrap_or(false);
            if !matches_batch {
                break;
            }
            let ((_, _, node), pairs) = queue.pop_first().expect("frontier emptied mid-batch");
            for (cursor, set) in pairs {
                process_node(
                    graph, group, read, node, 0, cursor, &set, &mut map, &mut stop_state,
                    &mut queue,
                );
            }
        }
        if group.should_stop(threshold, &stop_state) {
            return Ok(AlignmentOutcome::Stopped(map));
        }
    }

    Ok(AlignmentOutcome::Finished(map))
}

/// Handle one (cursor, allele set) arrival at a node: align against sequence
/// content, penalize truncation at an End sentinel, or pass boundaries
/// through, then expand compatible successors into the frontier.
#[allow(clippy::too_many_arguments)]
fn process_node<G: AlignmentGroup>(
    graph: &AlleleGraph,
    group: &G,
    read: &[u8],
    node: NodeIndex,
    offset: usize,
    cursor: usize,
    set: &AlleleSet,
    map: &mut AlleleMap<G::Acc>,
    stop_state: &mut G::Stop,
    queue: &mut BTreeMap<QueueKey, Frontier>,
) {
    match graph.label(node) {
        NodeLabel::Start { pos } => {
            panic!(
                "start sentinel at {} reached by read alignment; the graph is malformed",
                pos
            );
        }
        NodeLabel::Boundary { .. } => {
            expand_successors(graph, node, cursor, set, queue);
        }
        NodeLabel::End { pos } => {
            // The read extends past this allele; what remains of it can
            // never match.
            let remaining = read.len() - cursor;
            if remaining > 0 {
                let penalty = group.incr(&group.zero(), *pos, cursor, remaining);
                commit(group, map, set, &penalty, stop_state);
            }
        }
        NodeLabel::Sequence { pos, seq } => {
            match local_align(group, read, cursor, *pos, seq, offset) {
                LocalResult::Finished(acc) => {
                    commit(group, map, set, &acc, stop_state);
                }
                LocalResult::GoOn(acc, new_cursor) => {
                    commit(group, map, set, &acc, stop_state);
                    expand_successors(graph, node, new_cursor, set, queue);
                }
            }
        }
    }
}

/// Walk the read suffix and the node residues in lockstep, folding a
/// mismatch at every disagreeing column.
fn local_align<G: AlignmentGroup>(
    group: &G,
    read: &[u8],
    cursor: usize,
    node_pos: Position,
    node_seq: &str,
    offset: usize,
) -> LocalResult<G::Acc> {
    let node_bytes = node_seq.as_bytes();
    let mut acc = group.zero();
    let mut read_pos = cursor;
    let mut node_off = offset;

    while read_pos < read.len() && node_off < node_bytes.len() {
        if read[read_pos].to_ascii_uppercase() != node_bytes[node_off] {
            acc = group.incr(&acc, node_pos + node_off as Position, read_pos, 1);
        }
        read_pos += 1;
        node_off += 1;
    }

    if read_pos == read.len() {
        LocalResult::Finished(acc)
    } else {
        LocalResult::GoOn(acc, read_pos)
    }
}

fn commit<G: AlignmentGroup>(
    group: &G,
    map: &mut AlleleMap<G::Acc>,
    set: &AlleleSet,
    acc: &G::Acc,
    stop_state: &mut G::Stop,
) {
    map.update_by_set(set, |existing| {
        *existing = group.merge(existing, acc);
        group.update_stop(stop_state, existing);
    });
}

/// Intersect the traveling set against each outgoing edge label and enqueue
/// the survivors at the successor, coalescing with any pending arrival at
/// the same read cursor.
fn expand_successors(
    graph: &AlleleGraph,
    node: NodeIndex,
    cursor: usize,
    set: &AlleleSet,
    queue: &mut BTreeMap<QueueKey, Frontier>,
) {
    let here = graph.label(node).position();
    for (edge_set, successor) in graph.successors(node) {
        let travelling = set.intersect(edge_set);
        if travelling.is_empty() {
            continue;
        }
        let label = graph.label(successor);
        debug_assert!(
            label.position() >= here,
            "successor {:?} precedes node at {}",
            label,
            here
        );
        let key = (label.position(), label.tag_rank(), successor);
        let entry = queue.entry(key).or_insert_with(Vec::new);
        match entry.iter_mut().find(|(existing, _)| *existing == cursor) {
            Some((_, existing_set)) => existing_set.union_with(&travelling),
            None => entry.push((cursor, travelling)),
        }
    }
}
