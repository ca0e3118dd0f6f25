use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use env_logger::{Builder, Env};
use log::{info, warn, LevelFilter};

use plexdesign::index_table::load_index_table;
use plexdesign::{design_indexes, Chemistry, DesignParams, UniquenessConstraint};

/// plexdesign - Pick color-compatible sequencing indexes for multiplexed lanes
///
/// Reads one (or, for dual-indexing, two) two-column index tables and writes a
/// tab-delimited design assigning one index per sample.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// i7 index table: two columns, id and sequence
    #[clap(long = "i7", value_name = "FILE")]
    i7: String,

    /// i5 index table for dual-indexing
    #[clap(long = "i5", value_name = "FILE")]
    i5: Option<String>,

    /// Number of samples to index
    #[clap(short = 'n', long = "samples")]
    samples: usize,

    /// Number of samples per lane
    #[clap(short = 'm', long = "multiplexing-rate")]
    multiplexing_rate: usize,

    /// Sequencing chemistry: 1, 2 or 4 channels
    #[clap(short = 'c', long = "chemistry", default_value = "4")]
    chemistry: Chemistry,

    /// What may not repeat between lanes: none, lane or index
    #[clap(short = 'u', long = "unicity", default_value = "none")]
    unicity: UniquenessConstraint,

    /// Search full lanes directly instead of completing small compatible cores
    #[clap(long = "complete-lane")]
    complete_lane: bool,

    /// Precompute pairwise-compatible indexes and only combine those
    #[clap(long = "select-compatible")]
    select_compatible: bool,

    /// Maximum number of trials before giving up
    #[clap(long = "max-trials", default_value = "10")]
    max_trials: usize,

    /// Random draws per lane when combinations are sampled
    #[clap(long = "draws-per-lane", default_value = "1000")]
    draws_per_lane: usize,

    /// Random seed for a reproducible design
    #[clap(long = "seed")]
    seed: Option<u64>,

    /// Output table (stdout if not specified)
    #[clap(short = 'o', long = "output")]
    output: Option<String>,

    /// Add a column with each index's color profile
    #[clap(long = "colors")]
    colors: bool,

    /// Quiet mode (warnings and errors only)
    #[clap(long = "quiet")]
    quiet: bool,

    /// Number of threads for parallel trials
    #[clap(short = 't', long = "threads", default_value = "8")]
    threads: usize,
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { LevelFilter::Warn } else { LevelFilter::Info };
    Builder::from_env(Env::default().default_filter_or(default_level.as_str()))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.quiet);

    rayon::ThreadPoolBuilder::new()
        .num_threads(args.threads)
        .build_global()?;

    let i7 = load_index_table(&args.i7)
        .with_context(|| format!("Failed to load i7 indexes from {}", args.i7))?;
    let i5 = match &args.i5 {
        Some(path) => Some(
            load_index_table(path)
                .with_context(|| format!("Failed to load i5 indexes from {path}"))?,
        ),
        None => None,
    };
    info!(
        "Loaded {} i7 indexes{}",
        i7.len(),
        i5.as_ref()
            .map(|p| format!(" and {} i5 indexes", p.len()))
            .unwrap_or_default()
    );

    let mut params = DesignParams::new(args.samples, args.multiplexing_rate)
        .with_chemistry(args.chemistry)
        .with_constraint(args.unicity)
        .with_complete_lane(args.complete_lane)
        .with_select_compatible(args.select_compatible)
        .with_max_trials(args.max_trials)
        .with_draws_per_lane(args.draws_per_lane);
    if let Some(seed) = args.seed {
        params = params.with_seed(seed);
    }

    let design = design_indexes(&i7, i5.as_ref(), &params)?;

    // Dual designs never carry a unicity rule
    let constraint = if design.is_dual() {
        UniquenessConstraint::None
    } else {
        params.constraint
    };
    for problem in design.violations(constraint) {
        warn!("{problem}");
    }

    let mut output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {path}"))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    design.write_tsv(&mut output, args.colors)?;
    output.flush()?;

    info!(
        "Wrote {} samples in {} lanes",
        design.nb_samples(),
        design.nb_lanes()
    );
    Ok(())
}
