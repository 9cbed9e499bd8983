/*!
atrest - single-invocation entry point for the at-rest compression pipeline.

The host object store's rule engine calls this binary once per storage
lifecycle event, passing the object path and either the resolved action or
the raw event kind. Diagnostics go to stdout/stderr, which the rule engine
captures into its own log verbatim; the exit status tells it what happened
(0 for success or skip, a distinct code per failure category otherwise).
*/

use anyhow::Context;
use atrest_core::{
    init_logging, Action, AtRestError, GovernedPath, GzipCodec, JobStatus, LifecycleEvent,
    LocalObjectStore, LogLevel, ObjectStore, PipelineConfig, TransformPipeline,
};
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "atrest")]
#[command(about = "Compress or decompress an object in a governed collection")]
#[command(version)]
struct Cli {
    /// Object path the lifecycle event fired for
    #[arg(long)]
    ipath: PathBuf,

    /// Root of the governed collection
    #[arg(long)]
    iplant: PathBuf,

    /// Transform to run
    #[arg(long, value_enum, conflicts_with = "event")]
    action: Option<CliAction>,

    /// Lifecycle event to resolve into a transform, as the rule engine
    /// names it (pre-open, post-write, post-open)
    #[arg(long)]
    event: Option<String>,

    /// Scratch root inside the store for swap and lock files
    #[arg(long = "itmp-iplant")]
    itmp_iplant: Option<PathBuf>,

    /// Local scratch root for staged working copies
    #[arg(long = "tmp-iplant")]
    tmp_iplant: Option<PathBuf>,

    /// Delete scratch files inside the store when the job ends
    #[arg(long = "delete-itmp-files", default_value_t = true, action = ArgAction::Set)]
    delete_itmp_files: bool,

    /// Delete local scratch files when the job ends
    #[arg(long = "delete-tmp-files", default_value_t = true, action = ArgAction::Set)]
    delete_tmp_files: bool,

    /// Verbosity of diagnostics (DEBUG, INFO, WARNING, ERROR, CRITICAL)
    #[arg(long = "logging-level", default_value = "INFO")]
    logging_level: LogLevel,

    /// Mirror diagnostics into this file; parent directories are created
    /// on demand
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Validate options and resolve the action without touching any object
    #[arg(long)]
    test: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CliAction {
    Compress,
    Decompress,
}

impl From<CliAction> for Action {
    fn from(action: CliAction) -> Self {
        match action {
            CliAction::Compress => Action::Compress,
            CliAction::Decompress => Action::Decompress,
        }
    }
}

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("atrest: {err:#}");
            err.downcast_ref::<AtRestError>()
                .map(|e| e.exit_code())
                .unwrap_or(1)
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<i32> {
    let action = resolve_action(&cli)?;

    init_logging(cli.logging_level, cli.log_file.as_deref())
        .context("failed to set up logging")?;

    let mut config = PipelineConfig::new(&cli.iplant)
        .with_scratch_deletion(cli.delete_itmp_files, cli.delete_tmp_files);
    if let Some(root) = &cli.itmp_iplant {
        config = config.with_remote_scratch_root(root);
    }
    if let Some(root) = &cli.tmp_iplant {
        config = config.with_local_scratch_root(root);
    }
    config.validate()?;

    if cli.test {
        let governed = GovernedPath::new(&config.collection_root, &config.governed_suffix)
            .is_governed(&cli.ipath);
        info!(
            object = %cli.ipath.display(),
            action = %action,
            governed,
            "dry run: options validated, no I/O performed"
        );
        return Ok(0);
    }

    let store = LocalObjectStore::new();
    if !store.exists(&cli.ipath) {
        return Err(AtRestError::configuration(format!(
            "object does not exist or is not accessible: {}",
            cli.ipath.display()
        ))
        .into());
    }

    let pipeline = TransformPipeline::new(config, store, GzipCodec::new())?;
    let outcome = pipeline.run(&cli.ipath, action);

    info!(
        object = %cli.ipath.display(),
        action = %action,
        status = ?outcome.status,
        raw_bytes = outcome.bytes_processed,
        exit_code = outcome.exit_code(),
        "invocation finished"
    );
    if outcome.status == JobStatus::Failed {
        if let Some(failure) = &outcome.failure {
            eprintln!("atrest: {failure}");
        }
    }
    Ok(outcome.exit_code())
}

/// Exactly one of `--action` and `--event` names the transform; an event
/// kind goes through the resolver so unknown kinds are rejected here, at
/// the boundary, as configuration errors.
fn resolve_action(cli: &Cli) -> Result<Action, AtRestError> {
    match (cli.action, cli.event.as_deref()) {
        (Some(action), None) => Ok(action.into()),
        (None, Some(event)) => Ok(event.parse::<LifecycleEvent>()?.action()),
        (None, None) => Err(AtRestError::configuration(
            "one of --action or --event is required",
        )),
        (Some(_), Some(_)) => Err(AtRestError::configuration(
            "--action and --event are mutually exclusive",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(
            ["atrest", "--ipath", "/zone/a/iplant/s1.fastq", "--iplant", "/zone/a/iplant"]
                .iter()
                .chain(args)
                .copied(),
        )
    }

    #[test]
    fn test_action_option_resolves_directly() {
        let cli = parse(&["--action", "compress"]);
        assert_eq!(resolve_action(&cli).unwrap(), Action::Compress);
    }

    #[test]
    fn test_event_option_goes_through_resolver() {
        let cli = parse(&["--event", "pre-open"]);
        assert_eq!(resolve_action(&cli).unwrap(), Action::Decompress);

        let cli = parse(&["--event", "post-write"]);
        assert_eq!(resolve_action(&cli).unwrap(), Action::Compress);
    }

    #[test]
    fn test_unknown_event_rejected() {
        let cli = parse(&["--event", "post-replicate"]);
        let err = resolve_action(&cli).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_action_and_event_rejected() {
        let cli = parse(&[]);
        let err = resolve_action(&cli).unwrap_err();
        assert!(matches!(err, AtRestError::Configuration(_)));
    }

    #[test]
    fn test_retention_flags_default_to_delete() {
        let cli = parse(&["--action", "compress"]);
        assert!(cli.delete_itmp_files);
        assert!(cli.delete_tmp_files);

        let cli = parse(&["--action", "compress", "--delete-tmp-files", "false"]);
        assert!(!cli.delete_tmp_files);
        assert!(cli.delete_itmp_files);
    }

    #[test]
    fn test_action_event_conflict_is_a_parse_error() {
        let result = Cli::try_parse_from([
            "atrest",
            "--ipath",
            "/zone/a/iplant/s1.fastq",
            "--iplant",
            "/zone/a/iplant",
            "--action",
            "compress",
            "--event",
            "pre-open",
        ]);
        assert!(result.is_err());
    }
}
