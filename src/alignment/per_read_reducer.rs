use ordered_float::OrderedFloat;

use crate::alignment::alignment_group::{AlignmentGroup, Preference};
use crate::alignment::read_aligner::AlignmentOutcome;
use crate::model::allele_map::AlleleMap;
use crate::utils::errors::TypingError;

/// Collapse the per-anchor alignment outcomes for one read into a single
/// per-allele map. Finished outcomes are preferred over Stopped ones; with
/// nothing Finished the caller learns every anchor stopped, and an empty
/// outcome list means the index offered no anchors at all.
pub fn reduce_anchors<G: AlignmentGroup>(
    group: &G,
    outcomes: Vec<AlignmentOutcome<G::Acc>>,
) -> Result<AlleleMap<G::Acc>, TypingError> {
    if outcomes.is_empty() {
        return Err(TypingError::NoPositions);
    }

    let total = outcomes.len();
    let mut finished: Vec<AlleleMap<G::Acc>> = Vec::with_capacity(total);
    for outcome in outcomes {
        if let AlignmentOutcome::Finished(map) = outcome {
            finished.push(map);
        }
    }
    if finished.is_empty() {
        return Err(TypingError::AllStopped(total));
    }

    let best = match group.preference() {
        Preference::SmallestMinimum => finished
            .into_iter()
            .min_by_key(|map| OrderedFloat(per_allele_minimum(group, map))),
        Preference::LargestMaximum => finished
            .into_iter()
            .max_by_key(|map| OrderedFloat(per_allele_maximum(group, map))),
    };

    Ok(best.expect("at least one finished outcome survives the partition"))
}

fn per_allele_minimum<G: AlignmentGroup>(group: &G, map: &AlleleMap<G::Acc>) -> f64 {
    map.fold(f64::INFINITY, |best, acc| best.min(group.rank(acc)))
}

fn per_allele_maximum<G: AlignmentGroup>(group: &G, map: &AlleleMap<G::Acc>) -> f64 {
    map.fold(f64::NEG_INFINITY, |best, acc| best.max(group.rank(acc)))
}
