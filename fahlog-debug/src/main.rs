//! fahlog-debug - FAHlog parser debugging tool
//!
//! Parses Folding@Home client logs and prints the run/slot/unit tree as JSON,
//! or the raw text of a single unit.

use anyhow::{Context, Result};
use clap::Parser;
use fahlog_core::format::{format_duration_opt, format_unit_progress};
use fahlog_core::{logging, read_log_file, ClientRun, Config, FahLog, LogLine, UnitInfo};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fahlog-debug")]
#[command(about = "Parse FAHlog.txt files and output the run tree")]
#[command(version)]
struct Args {
    /// Path(s) to FAHlog file(s) to parse
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Compact JSON output (default: pretty)
    #[arg(long)]
    compact: bool,

    /// Show only summary statistics (no run tree)
    #[arg(long)]
    summary: bool,

    /// Print the raw lines of one unit: RUN SLOT UNIT
    #[arg(long, num_args = 3, value_names = ["RUN", "SLOT", "UNIT"])]
    unit: Option<Vec<usize>>,

    /// Print the raw lines of the most recent unit in a queue slot
    #[arg(long)]
    queue: Option<u8>,

    /// unitinfo.txt to parse alongside the log
    #[arg(long)]
    unitinfo: Option<PathBuf>,

    /// Verbose output (show warnings and error lines, debug logging)
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for one parsed file
#[derive(Serialize)]
struct DebugOutput {
    file: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    runs: Vec<ClientRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    unitinfo: Option<UnitInfo>,
    stats: Stats,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    error_lines: Vec<ErrorLineOutput>,
}

/// A line whose payload could not be extracted
#[derive(Serialize)]
struct ErrorLineOutput {
    index: usize,
    text: String,
    error: String,
}

/// Summary statistics
#[derive(Serialize)]
struct Stats {
    line_count: usize,
    run_count: usize,
    unit_count: usize,
    completed_units: u32,
    failed_units: u32,
    error_line_count: usize,
    by_kind: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_frame_time: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    logging::init_stderr(if args.verbose { "debug" } else { "warn" });

    let config = Config::load().context("Failed to load configuration")?;

    if let Some(selector) = &args.unit {
        let file = single_file(&args)?;
        let log = parse_file(&config, file)?;
        let (run, slot, unit) = (selector[0], selector[1], selector[2]);
        let slot = u32::try_from(slot).context("slot id out of range")?;
        let Some(lines) = log.lines_for_unit(run, slot, unit) else {
            anyhow::bail!("No unit at run {} slot {} position {}", run, slot, unit);
        };
        print_lines(lines);
        return Ok(());
    }

    if let Some(queue) = args.queue {
        let file = single_file(&args)?;
        let log = parse_file(&config, file)?;
        let Some(lines) = log.lines_for_queue_index(queue) else {
            anyhow::bail!("No unit found for queue index {}", queue);
        };
        print_lines(lines);
        return Ok(());
    }

    let unitinfo = match &args.unitinfo {
        Some(path) => Some(
            UnitInfo::from_file(path, config.parser.unitinfo_year)
                .with_context(|| format!("Failed to read unitinfo: {}", path.display()))?,
        ),
        None => None,
    };

    let mut outputs = Vec::new();
    for file in &args.files {
        if !file.exists() {
            eprintln!("Warning: File not found: {}", file.display());
            continue;
        }

        match parse_file(&config, file) {
            Ok(log) => outputs.push(build_output(&args, file, &log, unitinfo.clone())),
            Err(e) => eprintln!("Warning: Failed to parse {}: {:#}", file.display(), e),
        }
    }

    if outputs.is_empty() {
        anyhow::bail!("No files were successfully parsed");
    }

    // Output: single object for one file, array for multiple
    if outputs.len() == 1 {
        if args.compact {
            println!("{}", serde_json::to_string(&outputs[0])?);
        } else {
            println!("{}", serde_json::to_string_pretty(&outputs[0])?);
        }
    } else if args.compact {
        println!("{}", serde_json::to_string(&outputs)?);
    } else {
        println!("{}", serde_json::to_string_pretty(&outputs)?);
    }

    Ok(())
}

fn single_file(args: &Args) -> Result<&Path> {
    match args.files.as_slice() {
        [file] => Ok(file.as_path()),
        _ => anyhow::bail!("--unit and --queue take exactly one log file"),
    }
}

fn parse_file(config: &Config, file: &Path) -> Result<FahLog> {
    let lines =
        read_log_file(file).with_context(|| format!("Failed to read: {}", file.display()))?;
    let mut log = FahLog::with_config(config.parser.clone());
    log.parse(&lines);
    tracing::debug!(file = %file.display(), runs = log.client_runs().len(), "parsed");
    Ok(log)
}

fn print_lines(lines: &[LogLine]) {
    for line in lines {
        println!("{}", line.text);
    }
}

fn build_output(
    args: &Args,
    file: &Path,
    log: &FahLog,
    unitinfo: Option<UnitInfo>,
) -> DebugOutput {
    let runs = if args.summary {
        vec![]
    } else {
        log.client_runs().to_vec()
    };

    let (warnings, error_lines) = if args.verbose {
        let errors = log
            .error_lines()
            .map(|line| ErrorLineOutput {
                index: line.index,
                text: line.text.clone(),
                error: line
                    .error
                    .as_ref()
                    .map(|e| e.to_string())
                    .unwrap_or_default(),
            })
            .collect();
        (log.warnings().to_vec(), errors)
    } else {
        (vec![], vec![])
    };

    DebugOutput {
        file: file.display().to_string(),
        runs,
        unitinfo,
        stats: compute_stats(log),
        warnings,
        error_lines,
    }
}

fn compute_stats(log: &FahLog) -> Stats {
    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    for line in log.lines() {
        *by_kind.entry(line.kind.as_str().to_string()).or_insert(0) += 1;
    }

    let runs = log.client_runs();
    let current_slot = log.current_run().and_then(|run| run.last_slot());
    let current_unit = current_slot.and_then(|slot| slot.units.last());

    Stats {
        line_count: log.lines().len(),
        run_count: runs.len(),
        unit_count: runs
            .iter()
            .flat_map(|run| &run.slots)
            .map(|slot| slot.units.len())
            .sum(),
        completed_units: runs.iter().map(|run| run.total_completed()).sum(),
        failed_units: runs.iter().map(|run| run.total_failed()).sum(),
        error_line_count: log.error_lines().count(),
        by_kind,
        current_status: current_slot.map(|slot| slot.data.status.as_str().to_string()),
        current_unit: current_unit.map(format_unit_progress),
        current_frame_time: current_unit.map(|unit| format_duration_opt(unit.average_frame_duration())),
    }
}
