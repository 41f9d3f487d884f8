extern crate pardalote_hla;

use std::fs;
use std::path::PathBuf;

use pardalote_hla::alignment::alignment_group::EarlyStop;
use pardalote_hla::processing::typing_engine::{start_typing_engine, Statistic, TypingConfig};

fn write_fixture(dir: &std::path::Path) -> (PathBuf, PathBuf) {
    let alignment = dir.join("hla_fixture.txt");
    fs::write(
        &alignment,
        "HLA fixture alignment\n\ngDNA 0\n\n A*01 ACGTACGT\n A*02 ------C-\n A*03 --T---C-\n",
    )
    .expect("alignment fixture written");

    let fastq = dir.join("reads.fastq");
    fs::write(
        &fastq,
        "@r1\nACGTACGT\n+\nIIIIIIII\n@r2\nACGTACCT\n+\nIIIIIIII\n",
    )
    .expect("fastq fixture written");

    (alignment, fastq)
}

fn config(alignment: PathBuf, fastq: PathBuf, cache_root: PathBuf, statistic: Statistic) -> TypingConfig {
    TypingConfig {
        alignment_file: alignment,
        fastq_file: fastq,
        regex: None,
        specific: Vec::new(),
        without: Vec::new(),
        num_alt: None,
        kmer_size: 4,
        join_same_sequence: true,
        no_cache: false,
        cache_root,
        statistic,
        early_stop: EarlyStop::unlimited(),
        likelihood_error: 0.025,
        print_top: None,
        normalize: true,
        bucket: true,
        output_prefix: None,
    }
}

#[test]
fn typing_runs_end_to_end_for_each_statistic() {
    let dir = tempfile::tempdir().expect("temp fixture directory");
    let (alignment, fastq) = write_fixture(dir.path());

    for statistic in [
        Statistic::Mismatches,
        Statistic::MismatchList,
        Statistic::Likelihood,
        Statistic::LogLikelihood,
        Statistic::PhredLikelihood,
    ] {
        let config = config(
            alignment.clone(),
            fastq.clone(),
            dir.path().join("cache"),
            statistic,
        );
        start_typing_engine(&config).expect("typing pipeline succeeds");
    }

    // The first run populated the cache; the entries are real files.
    assert!(dir.path().join("cache").join("graphs").read_dir().map(|mut d| d.next().is_some()).unwrap_or(false));
}

#[test]
fn reports_land_under_the_output_prefix() {
    let dir = tempfile::tempdir().expect("temp fixture directory");
    let (alignment, fastq) = write_fixture(dir.path());

    let mut filed = config(
        alignment,
        fastq,
        dir.path().join("cache"),
        Statistic::Mismatches,
    );
    filed.no_cache = true;
    filed.output_prefix = Some(dir.path().join("out"));

    start_typing_engine(&filed).expect("typing pipeline succeeds");

    let report = dir.path().join("out").join("mismatches.tsv");
    let contents = fs::read_to_string(&report).expect("report file written");
    assert!(!contents.is_empty());
    // One bucketed row per distinct score, tab separated.
    assert!(contents.lines().all(|line| line.contains('\t')));
}

#[test]
fn selection_narrows_the_candidate_alleles() {
    let dir = tempfile::tempdir().expect("temp fixture directory");
    let (alignment, fastq) = write_fixture(dir.path());

    let mut narrowed = config(
        alignment,
        fastq,
        dir.path().join("cache"),
        Statistic::Mismatches,
    );
    narrowed.without = vec!["A*03".to_string()];
    narrowed.num_alt = Some(1);
    narrowed.no_cache = true;

    start_typing_engine(&narrowed).expect("typing pipeline succeeds");
}
