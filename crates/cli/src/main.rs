// tenderdesk CLI - headless tender reconciliation runs

mod exit_codes;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use tenderdesk_recon::ingest::load_tender_files;
use tenderdesk_recon::{ReconConfig, ReconError, ReconResult};

use exit_codes::{EXIT_EXCEPTIONS, EXIT_INVALID_CONFIG, EXIT_NO_DATA, EXIT_RUNTIME, EXIT_SUCCESS};

#[derive(Parser)]
#[command(name = "tdesk")]
#[command(about = "Per-store tender reconciliation (headless)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Tender file paths in the config resolve relative to the config file.

Exit codes: 0 clean, 3 invalid config, 4 runtime error, 5 no usable data,
6 exception stores found.

Examples:
  tdesk run close.toml
  tdesk run close.toml --json | jq .summary
  tdesk run close.toml --output result.json")]
    Run {
        /// Path to the run config
        config: PathBuf,

        /// Print the result bundle as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Write the result bundle as JSON to a file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Validate a run config without touching tender files
    #[command(after_help = "\
Examples:
  tdesk validate close.toml")]
    Validate {
        /// Path to the run config
        config: PathBuf,
    },
}

struct CliError {
    code: u8,
    message: String,
}

fn cli_err(code: u8, message: impl Into<String>) -> CliError {
    CliError { code, message: message.into() }
}

/// Map engine errors onto the exit-code registry.
fn exit_code_for(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::UnknownTender(_) => EXIT_INVALID_CONFIG,
        ReconError::NoUsableData => EXIT_NO_DATA,
        ReconError::Io(_)
        | ReconError::Malformed { .. }
        | ReconError::MissingColumn { .. }
        | ReconError::NoData { .. } => EXIT_RUNTIME,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Run { config, json, output } => cmd_run(&config, json, output.as_deref()),
        Commands::Validate { config } => cmd_validate(&config),
    };

    match outcome {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(err) => {
            eprintln!("error: {}", err.message);
            ExitCode::from(err.code)
        }
    }
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(|e| cli_err(exit_code_for(&e), e.to_string()))
}

fn cmd_run(config_path: &Path, json_output: bool, output_file: Option<&Path>) -> Result<(), CliError> {
    let config = load_config(config_path)?;

    // Resolve tender files relative to the config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let input = load_tender_files(&config, base_dir)
        .map_err(|e| cli_err(exit_code_for(&e), e.to_string()))?;

    let result = tenderdesk_recon::run(&config, &input)
        .map_err(|e| cli_err(exit_code_for(&e), e.to_string()))?;

    let json_str = serde_json::to_string_pretty(&result)
        .map_err(|e| cli_err(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| cli_err(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    print_summary(&result);

    if result.exception_stores > 0 {
        return Err(cli_err(
            EXIT_EXCEPTIONS,
            format!("{} exception store(s) found", result.exception_stores),
        ));
    }

    Ok(())
}

/// Human summary to stderr; stdout stays machine-readable.
fn print_summary(result: &ReconResult) {
    eprintln!(
        "'{}': {} stores — {} candidates, {} exception store(s), {} netting record(s)",
        result.meta.config_name,
        result.total_stores,
        result.candidate_stores,
        result.exception_stores,
        result.netting_log.len(),
    );

    for skipped in &result.meta.skipped_tenders {
        eprintln!("skipped {}: {}", skipped.tender, skipped.reason);
    }

    for band in &result.classification {
        eprintln!("  {} store(s): {}", band.store_count, band.classification);
    }
}

fn cmd_validate(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    eprintln!(
        "valid: '{}' — {} tender(s), netting threshold {}, approval filter {}",
        config.name,
        config.tenders.len(),
        config.netting_threshold,
        config.approval_filter,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &Path) {
        let cash = "\
Tender Response Report
,,
,,
,,
,,
Store ID,Sales Date,Store Response Entry,Auto Approved Date
5001,2026-07-01,850.00,2026-07-02
5001,2026-07-01,-300.00,2026-07-02
";
        std::fs::write(dir.join("cash.csv"), cash).unwrap();
        std::fs::write(
            dir.join("close.toml"),
            r#"
name = "CLI run"

[tenders]
cash = "cash.csv"
"#,
        )
        .unwrap();
    }

    #[test]
    fn run_writes_output_and_signals_exceptions() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        let out = dir.path().join("result.json");

        let err = cmd_run(&dir.path().join("close.toml"), false, Some(&out)).unwrap_err();
        assert_eq!(err.code, EXIT_EXCEPTIONS);

        let written = std::fs::read_to_string(&out).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["exception_stores"], 1);
        assert_eq!(value["summary"][0]["store_id"], 5001);
    }

    #[test]
    fn missing_config_is_runtime_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = cmd_run(&dir.path().join("absent.toml"), false, None).unwrap_err();
        assert_eq!(err.code, EXIT_RUNTIME);
    }

    #[test]
    fn bad_config_maps_to_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(
            &path,
            r#"
name = "Bad"

[tenders]
cheque = "cheque.csv"
"#,
        )
        .unwrap();
        let err = cmd_validate(&path).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_CONFIG);
        assert!(err.message.contains("cheque"));
    }

    #[test]
    fn all_tenders_missing_maps_to_no_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("close.toml"),
            r#"
name = "Empty"

[tenders]
cash = "absent.csv"
"#,
        )
        .unwrap();
        let err = cmd_run(&dir.path().join("close.toml"), false, None).unwrap_err();
        assert_eq!(err.code, EXIT_NO_DATA);
    }

    #[test]
    fn validate_accepts_good_config() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());
        assert!(cmd_validate(&dir.path().join("close.toml")).is_ok());
    }
}
