extern crate pardalote_hla;
use pardalote_hla::cli::build_cli;
use pardalote_hla::processing::typing_engine::{start_typing_engine, TypingConfig};

extern crate clap;
use clap::crate_version;

extern crate clap_complete;
use clap_complete::{generate, Shell};

#[macro_use]
extern crate log;
use env_logger::Builder;
use log::LevelFilter;

use std::env;
use std::process;

fn main() {
    let mut app = build_cli();
    let matches = app.clone().get_matches();
    set_log_level(&matches, false);

    match matches.subcommand_name() {
        Some("type") => {
            let m = matches.subcommand_matches("type").unwrap();
            set_log_level(m, true);
            let threads = *m.get_one::<usize>("threads").unwrap();
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .unwrap();

            let config = match TypingConfig::from_matches(m) {
                Ok(config) => config,
                Err(e) => {
                    error!("invalid arguments: {}", e);
                    process::exit(1);
                }
            };
            match start_typing_engine(&config) {
                Ok(()) => info!("Typing complete."),
                Err(e) => {
                    error!("Typing failed with error: {}", e);
                    process::exit(1);
                }
            }
        }
        Some("shell-completion") => {
            let m = matches.subcommand_matches("shell-completion").unwrap();
            set_log_level(m, true);
            let mut file = std::fs::File::create(m.get_one::<String>("output-file").unwrap())
                .expect("failed to open output file");

            if let Some(generator) = m.get_one::<Shell>("shell").copied() {
                let mut cmd = build_cli();
                info!("Generating completion script for shell {}", generator);
                let name = cmd.get_name().to_string();
                generate(generator, &mut cmd, name, &mut file);
            }
        }
        _ => {
            app.print_help().unwrap();
            println!();
        }
    }
}

fn set_log_level(matches: &clap::ArgMatches, is_last: bool) {
    let mut log_level = LevelFilter::Info;
    let mut specified = false;
    if matches.try_contains_id("verbose").unwrap_or(false) && matches.get_flag("verbose") {
        specified = true;
        log_level = LevelFilter::Debug;
    }
    if matches.try_contains_id("quiet").unwrap_or(false) && matches.get_flag("quiet") {
        specified = true;
        log_level = LevelFilter::Error;
    }
    if specified || is_last {
        let mut builder = Builder::new();
        builder.filter_level(log_level);
        if env::var("RUST_LOG").is_ok() {
            builder.parse_filters(&env::var("RUST_LOG").unwrap());
        }
        if builder.try_init().is_err() && is_last {
            debug!("logger was already initialized");
        }
    }
    if is_last {
        info!("pardalote version {}", crate_version!());
    }
}
