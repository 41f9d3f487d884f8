use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use clap::ArgMatches;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use ordered_float::OrderedFloat;
use regex::Regex;

use crate::alignment::alignment_group::EarlyStop;
use crate::graphs::graph_builder::build_graph;
use crate::graphs::kmer_index::KmerIndex;
use crate::graphs::AlleleGraph;
use crate::model::allele_map::AlleleMap;
use crate::msa::alignment_element::{AlignmentElement, Position};
use crate::msa::msa_parser::{MsaParser, ParseResult};
use crate::processing::score_aggregator::{
    aggregate_reads, AggregateOutcome, LikelihoodModel, LogLikelihoodModel, MismatchListModel,
    MismatchesModel, PhredLikelihoodModel,
};
use crate::reads::fastq_converter::read_fastq;
use crate::utils::cache::{graph_fingerprint, index_fingerprint, DiskCache};
use crate::utils::errors::TypingError;
use crate::utils::math_utils::{MathUtils, DEFAULT_LIKELIHOOD_ERROR};

/// Which per-allele statistic the run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statistic {
    Mismatches,
    MismatchList,
    Likelihood,
    LogLikelihood,
    PhredLikelihood,
}

impl Statistic {
    fn file_stem(self) -> &'static str {
        match self {
            Statistic::Mismatches => "mismatches",
            Statistic::MismatchList => "mismatch_lists",
            Statistic::Likelihood => "likelihoods",
            Statistic::LogLikelihood => "log_likelihoods",
            Statistic::PhredLikelihood => "phred_likelihoods",
        }
    }
}

/// Everything the engine needs, lifted out of clap so the pipeline can be
/// driven from tests without a command line.
#[derive(Debug, Clone)]
pub struct TypingConfig {
    pub alignment_file: PathBuf,
    pub fastq_file: PathBuf,
    pub regex: Option<String>,
    pub specific: Vec<String>,
    pub without: Vec<String>,
    pub num_alt: Option<usize>,
    pub kmer_size: usize,
    pub join_same_sequence: bool,
    pub no_cache: bool,
    pub cache_root: PathBuf,
    pub statistic: Statistic,
    pub early_stop: EarlyStop,
    pub likelihood_error: f64,
    pub print_top: Option<usize>,
    pub normalize: bool,
    pub bucket: bool,
    pub output_prefix: Option<PathBuf>,
}

impl TypingConfig {
    pub fn from_matches(m: &ArgMatches) -> Result<TypingConfig, TypingError> {
        let statistic = if m.get_flag("mismatches") {
            Statistic::Mismatches
        } else if m.get_flag("mis-list") {
            Statistic::MismatchList
        } else if m.get_flag("log-likelihood") {
            Statistic::LogLikelihood
        } else if m.get_flag("phred-likelihood") {
            Statistic::PhredLikelihood
        } else {
            Statistic::Likelihood
        };

        let early_stop = match m.get_one::<f64>("filter-matches") {
            Some(cap) => EarlyStop::new(
                *cap,
                *m.get_one::<f64>("filter-fraction").unwrap_or(&0.0),
            ),
            None => EarlyStop::unlimited(),
        };

        Ok(TypingConfig {
            alignment_file: PathBuf::from(
                m.get_one::<String>("alignment-file")
                    .expect("alignment-file is required"),
            ),
            fastq_file: PathBuf::from(
                m.get_one::<String>("fastq").expect("fastq is required"),
            ),
            regex: m.get_one::<String>("regex").cloned(),
            specific: m
                .get_many::<String>("specific")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            without: m
                .get_many::<String>("without")
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
            num_alt: m.get_one::<usize>("num-alt").copied(),
            kmer_size: *m.get_one::<usize>("kmer-size").expect("kmer-size has a default"),
            join_same_sequence: !m.get_flag("do-not-join-same-sequence"),
            no_cache: m.get_flag("no-cache"),
            cache_root: PathBuf::from(
                m.get_one::<String>("cache-dir").expect("cache-dir has a default"),
            ),
            statistic,
            early_stop,
            likelihood_error: *m
                .get_one::<f64>("likelihood-error")
                .unwrap_or(&DEFAULT_LIKELIHOOD_ERROR),
            print_top: m.get_one::<usize>("print-top").copied(),
            normalize: !m.get_flag("do-not-normalize"),
            bucket: !m.get_flag("do-not-bucket"),
            output_prefix: m.get_one::<String>("output-prefix").map(PathBuf::from),
        })
    }
}

/// The full typing pipeline: alignment file to ranked allele report.
pub fn start_typing_engine(config: &TypingConfig) -> Result<(), TypingError> {
    info!("parsing alignment file {:?}", config.alignment_file);
    let parse = MsaParser::parse_path(&config.alignment_file)?;
    info!(
        "reference {} with {} alternate alleles",
        parse.reference,
        parse.alternates.len()
    );

    let alleles = select_alleles(&parse, config);
    let selection_summary = selection_summary(config, alleles.len());

    let (graph, index) = obtain_graph_and_index(config, &alleles, &selection_summary)?;
    info!(
        "allele graph: {} nodes, {} edges, {} indexed {}-mers",
        graph.node_count(),
        graph.edge_count(),
        index.kmer_count(),
        index.k()
    );

    let with_qualities = config.statistic == Statistic::PhredLikelihood;
    let (reads, mut adapter_errors) = read_fastq(&config.fastq_file, with_qualities)?;
    info!(
        "{} reads loaded from {:?} ({} rejected by conversion)",
        reads.len(),
        config.fastq_file,
        adapter_errors.len()
    );

    let progress = alignment_progress(reads.len());
    match config.statistic {
        Statistic::Mismatches => {
            let outcome = aggregate_reads(
                &MismatchesModel,
                &graph,
                &index,
                &config.early_stop,
                &reads,
                Some(&progress),
            );
            progress.finish_and_clear();
            adapter_errors.extend(outcome.errors.iter().cloned());
            let rows = numeric_rows(&graph, outcome.scores.map(|v| *v as f64));
            report_numeric(config, rows, outcome.reads_used, false);
        }
        Statistic::MismatchList => {
            let outcome = aggregate_reads(
                &MismatchListModel,
                &graph,
                &index,
                &config.early_stop,
                &reads,
                Some(&progress),
            );
            progress.finish_and_clear();
            adapter_errors.extend(outcome.errors.iter().cloned());
            report_mismatch_lists(config, &graph, &outcome);
        }
        Statistic::Likelihood => {
            let outcome = aggregate_reads(
                &LikelihoodModel {
                    error_rate: config.likelihood_error,
                },
                &graph,
                &index,
                &config.early_stop,
                &reads,
                Some(&progress),
            );
            progress.finish_and_clear();
            adapter_errors.extend(outcome.errors.iter().cloned());
            let rows = numeric_rows(&graph, outcome.scores.map(|v| *v));
            report_numeric(config, rows, outcome.reads_used, true);
        }
        Statistic::LogLikelihood => {
            let outcome = aggregate_reads(
                &LogLikelihoodModel {
                    error_rate: config.likelihood_error,
                },
                &graph,
                &index,
                &config.early_stop,
                &reads,
                Some(&progress),
            );
            progress.finish_and_clear();
            adapter_errors.extend(outcome.errors.iter().cloned());
            let rows = numeric_rows(&graph, outcome.scores.map(|v| *v));
            report_numeric(config, rows, outcome.reads_used, true);
        }
        Statistic::PhredLikelihood => {
            let outcome = aggregate_reads(
                &PhredLikelihoodModel,
                &graph,
                &index,
                &config.early_stop,
                &reads,
                Some(&progress),
            );
            progress.finish_and_clear();
            adapter_errors.extend(outcome.errors.iter().cloned());
            let rows = numeric_rows(&graph, outcome.scores.map(|v| *v));
            report_numeric(config, rows, outcome.reads_used, true);
        }
    }

    report_errors(&adapter_errors);
    Ok(())
}

/// Apply the regex/specific/without/num-alt selectors; the reference always
/// survives and leads the enumeration.
fn select_alleles(
    parse: &ParseResult,
    config: &TypingConfig,
) -> Vec<(String, Vec<AlignmentElement>)> {
    let matcher = config.regex.as_ref().map(|raw| {
        Regex::new(raw).unwrap_or_else(|e| {
            error!("invalid allele regex {:?}: {}", raw, e);
            std::process::exit(1);
        })
    });

    let mut alleles = Vec::with_capacity(parse.alternates.len() + 1);
    alleles.push((parse.reference.clone(), parse.reference_elements.clone()));

    let mut kept = 0usize;
    for (name, elements) in &parse.alternates {
        if config.without.iter().any(|w| w == name) {
            continue;
        }
        let wanted = match (&matcher, config.specific.is_empty()) {
            (Some(re), true) => re.is_match(name),
            (Some(re), false) => re.is_match(name) || config.specific.contains(name),
            (None, false) => config.specific.contains(name),
            (None, true) => true,
        };
        if !wanted {
            continue;
        }
        if let Some(limit) = config.num_alt {
            if kept >= limit {
                break;
            }
        }
        alleles.push((name.clone(), elements.clone()));
        kept += 1;
    }

    for name in &config.specific {
        if !alleles.iter().any(|(n, _)| n == name) {
            warn!("requested allele {} is not in the alignment file", name);
        }
    }

    alleles
}

fn selection_summary(config: &TypingConfig, allele_count: usize) -> String {
    let mut parts = vec![format!("n{}", allele_count)];
    if let Some(re) = &config.regex {
        parts.push(format!("re{}", re));
    }
    if !config.specific.is_empty() {
        parts.push(format!("s{}", config.specific.iter().join("+")));
    }
    if !config.without.is_empty() {
        parts.push(format!("w{}", config.without.iter().join("+")));
    }
    if let Some(limit) = config.num_alt {
        parts.push(format!("a{}", limit));
    }
    parts.push(format!("k{}", config.kmer_size));
    parts.join("_")
}

/// Load the graph and index from the disk cache, or build and store them.
fn obtain_graph_and_index(
    config: &TypingConfig,
    alleles: &[(String, Vec<AlignmentElement>)],
    selection_summary: &str,
) -> Result<(AlleleGraph, KmerIndex), TypingError> {
    let graph_key = graph_fingerprint(
        &config.alignment_file,
        selection_summary,
        config.join_same_sequence,
    );
    let index_key = index_fingerprint(&graph_key, config.kmer_size);
    let cache = DiskCache::new(&config.cache_root);

    if !config.no_cache {
        if let (Some(graph), Some(index)) =
            (cache.load_graph(&graph_key), cache.load_index(&index_key))
        {
            info!("using cached graph and index for key {}", graph_key);
            return Ok((graph, index));
        }
    }

    info!("building allele graph for {} alleles", alleles.len());
    let graph = build_graph(alleles, config.join_same_sequence)?;
    let index = KmerIndex::build(&graph, config.kmer_size);

    if !config.no_cache {
        cache.store_graph(&graph_key, &graph);
        cache.store_index(&index_key, &index);
    }

    Ok((graph, index))
}

fn alignment_progress(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} reads {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message("aligning");
    bar
}

fn numeric_rows(graph: &AlleleGraph, scores: AlleleMap<f64>) -> Vec<(String, f64)> {
    scores
        .iter()
        .map(|(allele, score)| (graph.allele_index.name_of(allele).to_string(), *score))
        .collect()
}

/// Report rows go to stdout unless an output prefix directs them into a
/// per-statistic file under that directory.
fn report_writer(config: &TypingConfig) -> Box<dyn Write> {
    match &config.output_prefix {
        Some(dir) => {
            match create_dir_all(dir) {
                Ok(_) => {}
                Err(err) => panic!("Unable to create output directory {:?}", err),
            };
            let path = dir.join(format!("{}.tsv", config.statistic.file_stem()));
            info!("writing report to {:?}", path);
            Box::new(BufWriter::new(
                File::create(&path).expect("failed to open report file"),
            ))
        }
        None => Box::new(std::io::stdout()),
    }
}

/// Rank, optionally normalize and bucket, then write one row per allele (or
/// per bucket of equal-scoring alleles).
fn report_numeric(
    config: &TypingConfig,
    rows: Vec<(String, f64)>,
    reads_used: usize,
    descending: bool,
) {
    let mut rows = rows;
    if config.normalize {
        rows = normalize_rows(config.statistic, rows, reads_used);
    }

    rows.sort_by_key(|row| OrderedFloat(if descending { -row.1 } else { row.1 }));

    let mut out = report_writer(config);
    let mut printed = 0usize;
    let limit = config.print_top.unwrap_or(usize::MAX);
    if config.bucket {
        for (score, bucket) in &rows.iter().group_by(|row| OrderedFloat(row.1)) {
            if printed >= limit {
                break;
            }
            let names = bucket.map(|(name, _)| name.as_str()).join(",");
            writeln!(out, "{:.6}\t{}", score.0, names).expect("failed to write report");
            printed += 1;
        }
    } else {
        for (name, score) in rows {
            if printed >= limit {
                break;
            }
            writeln!(out, "{:.6}\t{}", score, name).expect("failed to write report");
            printed += 1;
        }
    }
    out.flush().expect("failed to flush report");
}

fn normalize_rows(
    statistic: Statistic,
    rows: Vec<(String, f64)>,
    reads_used: usize,
) -> Vec<(String, f64)> {
    let (names, values): (Vec<String>, Vec<f64>) = rows.into_iter().unzip();
    let values = match statistic {
        Statistic::Mismatches => {
            if reads_used == 0 {
                values
            } else {
                values.iter().map(|v| v / reads_used as f64).collect()
            }
        }
        Statistic::Likelihood => MathUtils::normalize_sum_to_one(values),
        Statistic::LogLikelihood | Statistic::PhredLikelihood => MathUtils::normalize_ln(&values),
        Statistic::MismatchList => values,
    };
    names.into_iter().zip(values).collect()
}

fn report_mismatch_lists(
    config: &TypingConfig,
    graph: &AlleleGraph,
    outcome: &AggregateOutcome<Vec<(Position, usize)>>,
) {
    let mut rows: Vec<(String, usize, String)> = outcome
        .scores
        .iter()
        .map(|(allele, list)| {
            let total: usize = list.iter().map(|(_, weight)| *weight).sum();
            let mut sorted = list.clone();
            sorted.sort_unstable();
            let detail = sorted
                .iter()
                .map(|(pos, weight)| format!("{}:{}", pos, weight))
                .join(",");
            (
                graph.allele_index.name_of(allele).to_string(),
                total,
                detail,
            )
        })
        .collect();

    rows.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    let mut out = report_writer(config);
    let limit = config.print_top.unwrap_or(usize::MAX);
    for (name, total, detail) in rows.into_iter().take(limit) {
        writeln!(out, "{}\t{}\t[{}]", total, name, detail).expect("failed to write report");
    }
    out.flush().expect("failed to flush report");
}

fn report_errors(errors: &[(String, TypingError)]) {
    if errors.is_empty() {
        return;
    }
    warn!("{} reads were not scored:", errors.len());
    for (id, error) in errors.iter().take(10) {
        warn!("  {}: {}", id, error);
    }
    if errors.len() > 10 {
        warn!("  ... and {} more", errors.len() - 10);
    }
}
