extern crate pardalote_hla;

use approx::assert_relative_eq;

use pardalote_hla::alignment::alignment_group::{
    AlignmentGroup, EarlyStop, PhredLikelihood,
};
use pardalote_hla::graphs::graph_builder::build_graph;
use pardalote_hla::graphs::kmer_index::KmerIndex;
use pardalote_hla::graphs::AlleleGraph;
use pardalote_hla::msa::alignment_element::AlignmentElement;
use pardalote_hla::processing::score_aggregator::{
    aggregate_reads, LogLikelihoodModel, MismatchesModel, ScoreModel,
};
use pardalote_hla::reads::fastq_converter::ReadInput;
use pardalote_hla::utils::math_utils::MathUtils;

fn simple_allele(name: &str, start: i64, residues: &str) -> (String, Vec<AlignmentElement>) {
    (
        name.to_string(),
        vec![
            AlignmentElement::Start(start),
            AlignmentElement::Sequence {
                start,
                seq: residues.to_string(),
            },
            AlignmentElement::End(start + residues.len() as i64),
        ],
    )
}

fn fixture_graph() -> (AlleleGraph, KmerIndex) {
    let graph = build_graph(
        &[
            simple_allele("A*ref", 0, "ACGTACGT"),
            simple_allele("A*alt", 0, "ACGTACCT"),
        ],
        true,
    )
    .expect("graph builds");
    let index = KmerIndex::build(&graph, 4);
    (graph, index)
}

fn read(id: &str, seq: &str) -> ReadInput {
    ReadInput {
        id: id.to_string(),
        seq: seq.as_bytes().to_vec(),
        error_probs: None,
    }
}

#[test]
fn uniform_log_likelihood_matches_the_closed_form() {
    let er = 0.01_f64;
    let expected = 98.0 * (0.99_f64).ln() + 1.0 * (er / 3.0).ln()
        + 97.0 * (0.99_f64).ln() + 2.0 * (er / 3.0).ln();
    let summed = MathUtils::read_log_likelihood(er, 100, 1.0)
        + MathUtils::read_log_likelihood(er, 100, 2.0);
    assert_relative_eq!(summed, expected, max_relative = 1e-12);
}

#[test]
fn mismatch_totals_sum_over_the_read_stream() {
    let (graph, index) = fixture_graph();
    let reads = vec![read("r1", "ACGTACGT"), read("r2", "ACGTACCT")];

    let outcome = aggregate_reads(
        &MismatchesModel,
        &graph,
        &index,
        &EarlyStop::unlimited(),
        &reads,
        None,
    );

    assert_eq!(outcome.reads_used, 2);
    assert!(outcome.errors.is_empty());

    let reference = graph.allele_index.index_of("A*ref").expect("allele indexed");
    let alternate = graph.allele_index.index_of("A*alt").expect("allele indexed");
    // Each read matches one allele exactly and differs from the other at the
    // variant column.
    assert_eq!(*outcome.scores.get(reference), 1);
    assert_eq!(*outcome.scores.get(alternate), 1);
}

#[test]
fn partitioned_aggregation_agrees_with_whole_stream_aggregation() {
    let (graph, index) = fixture_graph();
    let reads = vec![
        read("r1", "ACGTACGT"),
        read("r2", "ACGTACCT"),
        read("r3", "ACGTACGT"),
        read("r4", "TTTTACGT"),
    ];

    let whole = aggregate_reads(
        &MismatchesModel,
        &graph,
        &index,
        &EarlyStop::unlimited(),
        &reads,
        None,
    );

    let first = aggregate_reads(
        &MismatchesModel,
        &graph,
        &index,
        &EarlyStop::unlimited(),
        &reads[..2],
        None,
    );
    let second = aggregate_reads(
        &MismatchesModel,
        &graph,
        &index,
        &EarlyStop::unlimited(),
        &reads[2..],
        None,
    );

    let mut merged = first.scores.clone();
    merged.update_from(&second.scores, |mine, theirs| {
        MismatchesModel.combine(mine, theirs)
    });

    assert_eq!(merged, whole.scores);
    assert_eq!(first.reads_used + second.reads_used, whole.reads_used);
}

#[test]
fn log_likelihood_scores_sum_per_read_likelihoods() {
    let (graph, index) = fixture_graph();
    let er = 0.025;
    let reads = vec![read("r1", "ACGTACGT"), read("r2", "ACGTACGT")];

    let outcome = aggregate_reads(
        &LogLikelihoodModel { error_rate: er },
        &graph,
        &index,
        &EarlyStop::unlimited(),
        &reads,
        None,
    );

    let reference = graph.allele_index.index_of("A*ref").expect("allele indexed");
    let alternate = graph.allele_index.index_of("A*alt").expect("allele indexed");
    assert_relative_eq!(
        *outcome.scores.get(reference),
        2.0 * MathUtils::read_log_likelihood(er, 8, 0.0),
        max_relative = 1e-12
    );
    assert_relative_eq!(
        *outcome.scores.get(alternate),
        2.0 * MathUtils::read_log_likelihood(er, 8, 1.0),
        max_relative = 1e-12
    );
}

#[test]
fn unanchorable_reads_are_recorded_not_fatal() {
    let (graph, index) = fixture_graph();
    let reads = vec![read("r1", "ACGTACGT"), read("gone", "GGGGGGGG")];

    let outcome = aggregate_reads(
        &MismatchesModel,
        &graph,
        &index,
        &EarlyStop::unlimited(),
        &reads,
        None,
    );

    assert_eq!(outcome.reads_used, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].0, "gone");
}

#[test]
fn phred_penalties_price_mismatches_by_base_quality() {
    let probs = vec![0.01_f64; 8];
    let group = PhredLikelihood::new(probs);

    let baseline = group.baseline();
    assert_relative_eq!(baseline, 8.0 * (0.99_f64).ln(), max_relative = 1e-12);

    let one_mismatch = group.incr(&group.zero(), 5, 3, 1);
    assert_relative_eq!(
        baseline + one_mismatch,
        7.0 * (0.99_f64).ln() + (0.01_f64 / 3.0).ln(),
        max_relative = 1e-12
    );

    // Merging penalties from disjoint read spans is additive.
    let tail_penalty = group.incr(&group.zero(), 6, 6, 2);
    let merged = group.merge(&one_mismatch, &tail_penalty);
    assert_relative_eq!(
        merged,
        one_mismatch + tail_penalty,
        max_relative = 1e-12
    );
}
