extern crate pardalote_hla;

use pardalote_hla::alignment::alignment_group::{
    AlignmentGroup, EarlyStop, MismatchCount, MismatchList,
};
use pardalote_hla::alignment::per_read_reducer::reduce_anchors;
use pardalote_hla::alignment::read_aligner::{align, AlignmentOutcome};
use pardalote_hla::graphs::graph_builder::build_graph;
use pardalote_hla::graphs::AlleleGraph;
use pardalote_hla::msa::alignment_element::AlignmentElement;
use pardalote_hla::utils::errors::TypingError;

fn allele(name: &str, elements: Vec<AlignmentElement>) -> (String, Vec<AlignmentElement>) {
    (name.to_string(), elements)
}

fn seq(start: i64, s: &str) -> AlignmentElement {
    AlignmentElement::Sequence {
        start,
        seq: s.to_string(),
    }
}

fn simple_allele(name: &str, start: i64, residues: &str) -> (String, Vec<AlignmentElement>) {
    allele(
        name,
        vec![
            AlignmentElement::Start(start),
            seq(start, residues),
            AlignmentElement::End(start + residues.len() as i64),
        ],
    )
}

fn counts(graph: &AlleleGraph, outcome: &AlignmentOutcome<usize>) -> Vec<(String, usize)> {
    outcome
        .map()
        .iter()
        .map(|(allele, count)| (graph.allele_index.name_of(allele).to_string(), *count))
        .collect()
}

#[test]
fn single_node_alignment_counts_substitutions() {
    let graph = build_graph(&[simple_allele("A*ref", 0, "ACAT")], true).expect("graph builds");
    let outcome = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"ACGT", 0)
        .expect("alignment runs");

    assert!(outcome.is_finished());
    assert_eq!(counts(&graph, &outcome), vec![("A*ref".to_string(), 1)]);
}

#[test]
fn edge_filtering_attributes_mismatches_to_the_right_alleles() {
    let graph = build_graph(
        &[simple_allele("a", 0, "AAAA"), simple_allele("b", 0, "TTTT")],
        true,
    )
    .expect("graph builds");
    let outcome = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"AAAA", 0)
        .expect("alignment runs");

    assert!(outcome.is_finished());
    let mut scored = counts(&graph, &outcome);
    scored.sort();
    assert_eq!(
        scored,
        vec![("a".to_string(), 0), ("b".to_string(), 4)]
    );
}

#[test]
fn zero_threshold_stops_on_the_first_mismatch() {
    let graph = build_graph(&[simple_allele("A*ref", 0, "ACAT")], true).expect("graph builds");
    let outcome = align(&graph, &MismatchCount, &EarlyStop::new(0.0, 0.0), b"ACGT", 0)
        .expect("alignment runs");

    assert!(matches!(outcome, AlignmentOutcome::Stopped(_)));
}

#[test]
fn alignment_is_deterministic() {
    let alleles = [
        simple_allele("a", 0, "ACGTACGT"),
        simple_allele("b", 0, "ACCTACCT"),
        simple_allele("c", 0, "ACGTAGGT"),
    ];
    let graph = build_graph(&alleles, true).expect("graph builds");

    let first = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"ACGTACGT", 0)
        .expect("alignment runs");
    let second = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"ACGTACGT", 0)
        .expect("alignment runs");
    assert_eq!(first.map(), second.map());
}

#[test]
fn no_allele_scores_worse_than_the_read_length() {
    let alleles = [
        simple_allele("a", 0, "ACGTACGT"),
        simple_allele("b", 0, "TTTTTTTT"),
        simple_allele("far", 20, "ACGTACGT"),
    ];
    let graph = build_graph(&alleles, true).expect("graph builds");
    let read = b"ACGTACGT";
    let outcome = align(&graph, &MismatchCount, &EarlyStop::unlimited(), read, 0)
        .expect("alignment runs");

    for (_, count) in counts(&graph, &outcome) {
        assert!(count <= read.len());
    }

    // The allele with no path near the anchor takes the full-length charge.
    let far = graph.allele_index.index_of("far").expect("allele indexed");
    assert_eq!(*outcome.map().get(far), read.len());
}

#[test]
fn mismatch_list_totals_agree_with_mismatch_counts() {
    let alleles = [
        simple_allele("a", 0, "ACGTACGT"),
        simple_allele("b", 0, "ACCTACCT"),
        simple_allele("far", 20, "ACGTACGT"),
    ];
    let graph = build_graph(&alleles, true).expect("graph builds");
    let read = b"ACGTACCT";

    let count_outcome = align(&graph, &MismatchCount, &EarlyStop::unlimited(), read, 0)
        .expect("alignment runs");
    let list_outcome = align(&graph, &MismatchList, &EarlyStop::unlimited(), read, 0)
        .expect("alignment runs");

    for allele in 0..graph.allele_index.size() {
        let total: usize = list_outcome
            .map()
            .get(allele)
            .iter()
            .map(|(_, weight)| *weight)
            .sum();
        assert_eq!(total, *count_outcome.map().get(allele));
    }
}

#[test]
fn reads_overhanging_an_allele_end_pay_the_remainder() {
    let alleles = [
        simple_allele("long", 0, "ACGTAC"),
        simple_allele("short", 0, "AC"),
    ];
    let graph = build_graph(&alleles, true).expect("graph builds");
    let outcome = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"ACGT", 0)
        .expect("alignment runs");

    let long = graph.allele_index.index_of("long").expect("allele indexed");
    let short = graph.allele_index.index_of("short").expect("allele indexed");
    assert_eq!(*outcome.map().get(long), 0);
    assert_eq!(*outcome.map().get(short), 2);
}

#[test]
fn anchors_inside_a_node_align_from_the_node_offset() {
    let graph = build_graph(&[simple_allele("A*ref", 0, "ACATGG")], true).expect("graph builds");
    let outcome = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"CAT", 1)
        .expect("alignment runs");
    assert_eq!(counts(&graph, &outcome), vec![("A*ref".to_string(), 0)]);
}

#[test]
fn deletion_paths_prepay_the_skipped_span() {
    let alleles = [
        simple_allele("A*ref", 0, "ACGT"),
        allele(
            "A*del",
            vec![
                AlignmentElement::Start(0),
                seq(0, "A"),
                AlignmentElement::Gap { start: 1, length: 2 },
                seq(3, "T"),
                AlignmentElement::End(4),
            ],
        ),
    ];
    let graph = build_graph(&alleles, true).expect("graph builds");
    let outcome = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"CGT", 1)
        .expect("alignment runs");

    let reference = graph.allele_index.index_of("A*ref").expect("allele indexed");
    let deletion = graph.allele_index.index_of("A*del").expect("allele indexed");
    assert_eq!(*outcome.map().get(reference), 0);
    // The deletion path resumes at position 3: two read bases can never
    // match, then T aligns.
    assert_eq!(*outcome.map().get(deletion), 2);
}

#[test]
fn reducer_prefers_finished_outcomes_and_reports_exhaustion() {
    let graph = build_graph(&[simple_allele("A*ref", 0, "ACAT")], true).expect("graph builds");
    let finished = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"ACAT", 0)
        .expect("alignment runs");
    let stopped = align(&graph, &MismatchCount, &EarlyStop::new(0.0, 0.0), b"AGGG", 0)
        .expect("alignment runs");
    assert!(matches!(stopped, AlignmentOutcome::Stopped(_)));

    let reduced = reduce_anchors(&MismatchCount, vec![stopped.clone(), finished.clone()])
        .expect("reduction succeeds");
    assert_eq!(reduced, finished.map().clone());

    match reduce_anchors(&MismatchCount, vec![stopped.clone(), stopped]) {
        Err(TypingError::AllStopped(2)) => {}
        other => panic!("expected AllStopped(2), got {:?}", other),
    }

    match reduce_anchors::<MismatchCount>(&MismatchCount, Vec::new()) {
        Err(TypingError::NoPositions) => {}
        other => panic!("expected NoPositions, got {:?}", other),
    }
}

#[test]
fn reducer_picks_the_anchor_with_the_best_minimum() {
    let graph = build_graph(&[simple_allele("A*ref", 0, "ACGTACGT")], true)
        .expect("graph builds");
    // Anchoring at 4 aligns the read suffix cleanly; anchoring at 0 pays
    // mismatches.
    let good = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"ACGT", 4)
        .expect("alignment runs");
    let bad = align(&graph, &MismatchCount, &EarlyStop::unlimited(), b"ACGT", 1)
        .expect("alignment runs");

    let reduced =
        reduce_anchors(&MismatchCount, vec![bad, good.clone()]).expect("reduction succeeds");
    assert_eq!(reduced, good.map().clone());
}
