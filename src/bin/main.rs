use std::path::PathBuf;

use bgp_distill::bgpdump::bgpdump_to_psv;
use bgp_distill::distill::{DEFAULT_BATCH_SIZE, DEFAULT_UPDATE_INTERVAL};
use bgp_distill::utils::output_path;
use bgp_distill::{distill_file, DistillConfig};
use clap::{CommandFactory, Parser};
use log::{error, info};

/// bgp-distill groups a bgpdump route table by AS and writes one JSON summary per AS.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    /// Pipe-separated dump produced by `bgpdump -m`, optionally gz or bz2 compressed.
    #[clap(name = "FILE")]
    file_path: PathBuf,

    /// Treat FILE as a raw MRT dump and convert it with `bgpdump` first
    #[clap(long)]
    mrt: bool,

    /// Output file. Defaults to the base name of FILE with a .json extension
    #[clap(short, long)]
    output: Option<PathBuf>,

    /// Number of store appends allowed in flight
    #[clap(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Number of records between progress updates
    #[clap(short, long, default_value_t = DEFAULT_UPDATE_INTERVAL)]
    update_interval: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            println!("{}", Opts::command().render_usage());
            error!("invalid arguments: {}", e.kind());
            std::process::exit(1);
        }
    };

    let input = match opts.mrt {
        true => match bgpdump_to_psv(&opts.file_path) {
            Ok(p) => p,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        },
        false => opts.file_path.clone(),
    };
    let output = opts
        .output
        .unwrap_or_else(|| output_path(&opts.file_path));

    let config = DistillConfig {
        batch_size: opts.batch_size,
        update_interval: opts.update_interval,
        ..Default::default()
    };

    match distill_file(&input, &output, &config) {
        Ok(summary) => {
            info!(
                "distilled {} records into {} autonomous systems at {} in {:?}",
                summary.records,
                summary.autonomous_systems,
                summary.output.display(),
                summary.elapsed
            );
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}
