//! cluster_replay - run recorded detection frames through the engine offline
//!
//! Reads one JSON frame per line (envelope or bare detection array) from a
//! file or stdin and writes each output record as a JSON line to stdout.
//! Useful for tuning thresholds against captured traffic.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use proximity_cluster::router::DEFAULT_MAX_SOURCES;
use proximity_cluster::{parse_frame, ClusterMode, EngineConfig, EngineRouter};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON-lines file with one frame per line ("-" reads stdin).
    #[arg(long, default_value = "-")]
    input: String,

    /// Engine config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "CLUSTER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured mode (crowd|hotspot).
    #[arg(long, value_name = "MODE")]
    mode: Option<ClusterMode>,

    /// Topic name used to key frames that carry no source.
    #[arg(long, default_value = "replay")]
    topic: String,

    /// Stop at the first malformed line instead of skipping it.
    #[arg(long)]
    strict: bool,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct ReplaySummary {
    lines: u64,
    malformed: u64,
    records: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let config = EngineConfig::load_for(args.config.as_deref(), args.mode)?;
    let mut router = EngineRouter::new(config, DEFAULT_MAX_SOURCES)?;

    let input: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("failed to open input {}", args.input))?;
        Box::new(BufReader::new(file))
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = replay(input, &mut out, &mut router, &args.topic, args.strict)?;
    out.flush()?;

    let totals = router.totals();
    log::info!(
        "replayed {} lines: malformed={} dropped={} clusters={} records={}",
        summary.lines,
        summary.malformed,
        totals.frames_dropped,
        totals.clusters_found,
        summary.records
    );
    Ok(())
}

fn replay<R: BufRead, W: Write>(
    input: R,
    out: &mut W,
    router: &mut EngineRouter,
    topic: &str,
    strict: bool,
) -> Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        summary.lines += 1;

        let frame = match parse_frame(trimmed.as_bytes()) {
            Ok(frame) => frame,
            Err(e) if strict => return Err(anyhow!("line {}: {:#}", idx + 1, e)),
            Err(e) => {
                summary.malformed += 1;
                log::warn!("line {}: {:#}", idx + 1, e);
                continue;
            }
        };

        let Some((_, report)) = router.process(topic, &frame)? else {
            continue;
        };
        for record in report.records() {
            out.write_all(&record.to_json()?)?;
            out.write_all(b"\n")?;
            summary.records += 1;
        }
    }
    Ok(summary)
}
