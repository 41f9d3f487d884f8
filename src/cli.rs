use clap::{crate_version, value_parser, Arg, ArgAction, ArgGroup, Command};

pub fn build_cli() -> Command {
    Command::new("pardalote")
        .version(crate_version!())
        .about("HLA genotyping by aligning short reads against an allele sequence graph")
        .arg_required_else_help(false)
        .subcommand(type_command())
        .subcommand(
            Command::new("shell-completion")
                .about("Generate a shell completion script")
                .arg(
                    Arg::new("shell")
                        .long("shell")
                        .required(true)
                        .value_parser(value_parser!(clap_complete::Shell)),
                )
                .arg(
                    Arg::new("output-file")
                        .long("output-file")
                        .required(true),
                )
                .arg(verbose_arg())
                .arg(quiet_arg()),
        )
}

fn type_command() -> Command {
    Command::new("type")
        .about("Rank allele candidates by read support")
        .arg(
            Arg::new("alignment-file")
                .long("alignment-file")
                .short('a')
                .help("IMGT/HLA alignment file describing the alleles")
                .required(true),
        )
        .arg(
            Arg::new("fastq")
                .long("fastq")
                .short('f')
                .help("FASTQ file of reads to type")
                .required(true),
        )
        .arg(
            Arg::new("regex")
                .long("regex")
                .help("Keep only alternate alleles whose name matches this regex"),
        )
        .arg(
            Arg::new("specific")
                .long("specific")
                .action(ArgAction::Append)
                .help("Keep this specific alternate allele (repeatable)"),
        )
        .arg(
            Arg::new("without")
                .long("without")
                .action(ArgAction::Append)
                .help("Drop this alternate allele (repeatable)"),
        )
        .arg(
            Arg::new("num-alt")
                .long("num-alt")
                .value_parser(value_parser!(usize))
                .help("Keep at most this many alternate alleles"),
        )
        .arg(
            Arg::new("kmer-size")
                .long("kmer-size")
                .short('k')
                .value_parser(value_parser!(usize))
                .default_value("10")
                .help("K-mer size for the anchor index"),
        )
        .arg(
            Arg::new("do-not-join-same-sequence")
                .long("do-not-join-same-sequence")
                .action(ArgAction::SetTrue)
                .help("Keep single-residue graph nodes instead of merging unbranched runs"),
        )
        .arg(
            Arg::new("no-cache")
                .long("no-cache")
                .action(ArgAction::SetTrue)
                .help("Neither load nor store prebuilt graphs and indices"),
        )
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .default_value(".cache")
                .help("Directory holding cached graphs and indices"),
        )
        .arg(
            Arg::new("mismatches")
                .long("mismatches")
                .action(ArgAction::SetTrue)
                .help("Report summed mismatch counts per allele"),
        )
        .arg(
            Arg::new("mis-list")
                .long("mis-list")
                .action(ArgAction::SetTrue)
                .help("Report per-position mismatch lists per allele"),
        )
        .arg(
            Arg::new("likelihood")
                .long("likelihood")
                .action(ArgAction::SetTrue)
                .help("Report allele likelihoods under a uniform error model (default)"),
        )
        .arg(
            Arg::new("log-likelihood")
                .long("log-likelihood")
                .action(ArgAction::SetTrue)
                .help("Report allele log-likelihoods under a uniform error model"),
        )
        .arg(
            Arg::new("phred-likelihood")
                .long("phred-likelihood")
                .action(ArgAction::SetTrue)
                .help("Report allele log-likelihoods weighted by per-base qualities"),
        )
        .group(
            ArgGroup::new("statistic")
                .args([
                    "mismatches",
                    "mis-list",
                    "likelihood",
                    "log-likelihood",
                    "phred-likelihood",
                ])
                .multiple(false),
        )
        .arg(
            Arg::new("filter-matches")
                .long("filter-matches")
                .value_parser(value_parser!(f64))
                .help("Stop aligning a read once any allele accumulates this many mismatches"),
        )
        .arg(
            Arg::new("filter-fraction")
                .long("filter-fraction")
                .value_parser(value_parser!(f64))
                .default_value("0.0")
                .help("Additional early-stop allowance per read base"),
        )
        .arg(
            Arg::new("likelihood-error")
                .long("likelihood-error")
                .value_parser(value_parser!(f64))
                .default_value("0.025")
                .help("Per-base error rate for the uniform likelihood models"),
        )
        .arg(
            Arg::new("print-top")
                .long("print-top")
                .value_parser(value_parser!(usize))
                .help("Print only the best N rows"),
        )
        .arg(
            Arg::new("do-not-normalize")
                .long("do-not-normalize")
                .action(ArgAction::SetTrue)
                .help("Report raw scores instead of normalized ones"),
        )
        .arg(
            Arg::new("do-not-bucket")
                .long("do-not-bucket")
                .action(ArgAction::SetTrue)
                .help("One row per allele instead of grouping equal scores"),
        )
        .arg(
            Arg::new("output-prefix")
                .long("output-prefix")
                .short('o')
                .help("Write the report into this directory instead of stdout"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .short('t')
                .value_parser(value_parser!(usize))
                .default_value("4")
                .help("Worker threads for read alignment"),
        )
        .arg(verbose_arg())
        .arg(quiet_arg())
}

fn verbose_arg() -> Arg {
    Arg::new("verbose")
        .long("verbose")
        .short('v')
        .action(ArgAction::SetTrue)
        .help("Print debug output")
}

fn quiet_arg() -> Arg {
    Arg::new("quiet")
        .long("quiet")
        .short('q')
        .action(ArgAction::SetTrue)
        .help("Only print errors")
}
