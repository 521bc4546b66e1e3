//! Binary entry point for the `pagelog` redo log inspector.
#![forbid(unsafe_code)]

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use pagelog::admin::{dump, stats, DumpOptions, DumpReport, LogStatsReport};
use pagelog::logging::init_logging;

#[derive(Parser, Debug)]
#[command(
    name = "pagelog",
    version,
    about = "Inspect page-level redo logs",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(
        long,
        global = true,
        env = "PAGELOG_LOG",
        default_value = "warn",
        help = "Tracing filter directive (e.g. info, pagelog=debug)"
    )]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every valid record in the log
    Dump {
        #[arg(value_name = "LOG")]
        log_path: PathBuf,

        #[arg(long, help = "Stop after this many records")]
        limit: Option<usize>,

        #[arg(
            long,
            default_value_t = 16,
            help = "Payload bytes rendered as hex per record"
        )]
        payload_prefix: usize,
    },
    /// Summarise record counts and the valid extent of the log
    Stats {
        #[arg(value_name = "LOG")]
        log_path: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Command::Dump {
            log_path,
            limit,
            payload_prefix,
        } => {
            let opts = DumpOptions {
                limit,
                payload_prefix,
            };
            let report = dump(&log_path, &opts)?;
            emit(cli.format, &report, || print_dump_text(&report))?;
        }
        Command::Stats { log_path } => {
            let report = stats(&log_path)?;
            emit(cli.format, &report, || print_stats_text(&report))?;
        }
    }
    Ok(())
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: Fn(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_dump_text(report: &DumpReport) {
    println!(
        "log {} page_size={} start_lsn={} valid_up_to={}/{}",
        report.path, report.page_size, report.start_lsn, report.valid_up_to, report.file_len
    );
    for rec in &report.records {
        let mut line = format!(
            "{:>8} {:<16} part={} page={:#018x}",
            rec.lsn, rec.record_type, rec.partition_id, rec.page_id
        );
        if let Some(version) = rec.format_version {
            line.push_str(&format!(" version={version}"));
        }
        if let Some(slot) = rec.slot {
            line.push_str(&format!(" slot={slot}"));
        }
        if let Some(link) = rec.last_link {
            line.push_str(&format!(" last_link={link:#x}"));
        }
        if let (Some(len), Some(hex)) = (rec.payload_len, rec.payload_hex.as_deref()) {
            let ellipsis = if hex.len() / 2 < len { "..." } else { "" };
            line.push_str(&format!(" len={len} payload={hex}{ellipsis}"));
        }
        println!("{line}");
    }
    if report.truncated {
        println!("(output limited to {} records)", report.records.len());
    }
}

fn print_stats_text(report: &LogStatsReport) {
    println!("Log:");
    println!(
        "  path={} page_size={} file_len={} valid_up_to={} torn_tail_bytes={}",
        report.path, report.page_size, report.file_len, report.valid_up_to, report.torn_tail_bytes
    );
    println!("Records:");
    let range = match (report.first_lsn, report.last_lsn) {
        (Some(first), Some(last)) => format!("{first}..={last}"),
        _ => "empty".to_string(),
    };
    println!(
        "  total={} lsn_range={} pages_touched={}",
        report.records, range, report.pages_touched
    );
    for (name, count) in &report.by_type {
        println!("  {name}={count}");
    }
}
