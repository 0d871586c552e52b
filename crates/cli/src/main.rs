use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use face_timeline_core::aggregation::domain::aggregator::Aggregator;
use face_timeline_core::aggregation::domain::identity_summary::IdentitySummary;
use face_timeline_core::clustering::domain::clustering_session::ClusteringSession;
use face_timeline_core::clustering::domain::identity::IdentityId;
use face_timeline_core::clustering::infrastructure::json_session_store::JsonSessionStore;
use face_timeline_core::detection::domain::detection_source::DetectionSource;
use face_timeline_core::detection::infrastructure::deadline_detection_source::DeadlineDetectionSource;
use face_timeline_core::detection::infrastructure::recorded_detection_source::RecordedDetectionSource;
use face_timeline_core::pipeline::analysis_logger::StdoutAnalysisLogger;
use face_timeline_core::pipeline::analyze_video_use_case::AnalyzeVideoUseCase;
use face_timeline_core::pipeline::shared_session::SharedSession;
use face_timeline_core::shared::analysis_config::{AnalysisConfig, AnalysisMode};

/// Groups recorded face detections into people and reports when each
/// person is on screen.
#[derive(Parser)]
#[command(name = "face-timeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Cluster a detection recording into identities.
    Analyze(AnalyzeArgs),
    /// Fold one or more identities of a saved session into another.
    Merge(MergeArgs),
    /// Rename an identity in a saved session.
    Relabel(RelabelArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Detection recording (JSON) to replay.
    detections: PathBuf,

    /// Assign per frame (online) or after sampling finishes (batch).
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Config file. Defaults to the per-user config, if present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Distance below which a face joins an existing identity.
    #[arg(long)]
    match_threshold: Option<f64>,

    /// Largest gap (seconds) bridged when building time ranges.
    #[arg(long)]
    range_gap: Option<f64>,

    /// Seconds between sampled frames when the recording has no schedule.
    #[arg(long)]
    sampling_interval: Option<f64>,

    /// Per-frame extraction deadline in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Write the resulting session snapshot here for later merges.
    #[arg(long)]
    save_session: Option<PathBuf>,

    /// Write the report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct MergeArgs {
    /// Saved session snapshot; updated in place.
    session: PathBuf,

    /// Identity that absorbs the others.
    #[arg(long)]
    target: IdentityId,

    /// Identities to absorb (comma-separated).
    #[arg(long, value_delimiter = ',', required = true)]
    sources: Vec<IdentityId>,

    /// Write the refreshed summaries here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct RelabelArgs {
    /// Saved session snapshot; updated in place.
    session: PathBuf,

    #[arg(long)]
    id: IdentityId,

    #[arg(long)]
    label: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Batch,
    Online,
}

impl From<ModeArg> for AnalysisMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Batch => AnalysisMode::Batch,
            ModeArg::Online => AnalysisMode::Online,
        }
    }
}

/// What `merge` prints: the updated result list plus fresh suggestions.
#[derive(Serialize)]
struct SessionView {
    identities: Vec<IdentitySummary>,
    merge_suggestions: Vec<Vec<IdentityId>>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    match Cli::parse().command {
        Command::Analyze(args) => run_analyze(args),
        Command::Merge(args) => run_merge(args),
        Command::Relabel(args) => run_relabel(args),
    }
}

fn run_analyze(args: AnalyzeArgs) -> Result<(), Box<dyn std::error::Error>> {
    validate(&args)?;
    let config = build_config(&args)?;
    log::info!(
        "Analyzing {} ({} mode)",
        args.detections.display(),
        config.mode
    );

    let source: Box<dyn DetectionSource> = Box::new(DeadlineDetectionSource::new(
        Box::new(RecordedDetectionSource::from_file(&args.detections)),
        config.extraction_timeout(),
    ));
    let progress: Box<dyn Fn(usize, usize) -> bool + Send> = Box::new(|current, total| {
        eprint!("\rAnalyzing frame {current}/{total}");
        true
    });

    let shared = SharedSession::new(ClusteringSession::from_config(&config));
    let mut use_case = AnalyzeVideoUseCase::new(
        source,
        config,
        Box::new(StdoutAnalysisLogger::default().without_progress()),
        Some(progress),
        None,
    );
    let report = use_case.execute(&shared)?;
    eprintln!();

    if let Some(warning) = &report.warning {
        eprintln!("Warning: {warning}");
    }
    if let Some(path) = &args.save_session {
        shared.with_session(|session| JsonSessionStore::save(path, session))??;
    }
    write_json(&report, args.output.as_deref())
}

fn run_merge(args: MergeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AnalysisConfig::load_default()?;
    let shared = SharedSession::new(JsonSessionStore::load(&args.session)?);

    let aggregator = Aggregator::from_config(&config);
    let identities = shared.merge(args.target, &args.sources, &aggregator)?;
    let merge_suggestions = shared.with_session(|session| {
        JsonSessionStore::save(&args.session, session)?;
        Ok::<_, Box<dyn std::error::Error>>(
            session.merge_candidates(config.merge_suggestion_threshold),
        )
    })??;

    log::info!(
        "Merged {:?} into {}; {} identities remain",
        args.sources,
        args.target,
        identities.len()
    );
    write_json(
        &SessionView {
            identities,
            merge_suggestions,
        },
        args.output.as_deref(),
    )
}

fn run_relabel(args: RelabelArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.label.trim().is_empty() {
        return Err("Label must not be empty".into());
    }
    let shared = SharedSession::new(JsonSessionStore::load(&args.session)?);
    shared.relabel(args.id, &args.label)?;
    shared.with_session(|session| JsonSessionStore::save(&args.session, session))??;
    log::info!("Identity {} is now '{}'", args.id, args.label);
    Ok(())
}

/// Config file (explicit or per-user default) with command-line overrides
/// applied on top.
fn build_config(args: &AnalyzeArgs) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::load_default()?,
    };

    if let Some(mode) = args.mode {
        // Switching mode without an explicit interval picks that mode's
        // default sampling rate.
        let defaults = match AnalysisMode::from(mode) {
            AnalysisMode::Batch => AnalysisConfig::batch(),
            AnalysisMode::Online => AnalysisConfig::online(),
        };
        if config.mode != defaults.mode {
            config.sampling_interval_seconds = defaults.sampling_interval_seconds;
        }
        config.mode = defaults.mode;
    }
    if let Some(threshold) = args.match_threshold {
        config.match_threshold = threshold;
    }
    if let Some(gap) = args.range_gap {
        config.range_gap_seconds = gap;
    }
    if let Some(interval) = args.sampling_interval {
        config.sampling_interval_seconds = interval;
    }
    if let Some(timeout) = args.timeout_ms {
        config.extraction_timeout_ms = timeout;
    }

    config.validate()?;
    Ok(config)
}

fn validate(args: &AnalyzeArgs) -> Result<(), Box<dyn std::error::Error>> {
    if !args.detections.exists() {
        return Err(format!(
            "Detection recording not found: {}",
            args.detections.display()
        )
        .into());
    }
    if let Some(path) = &args.config {
        if !path.exists() {
            return Err(format!("Config file not found: {}", path.display()).into());
        }
    }
    if args.timeout_ms == Some(0) {
        return Err("Timeout must be at least 1 ms".into());
    }
    Ok(())
}

fn write_json<T: Serialize>(
    value: &T,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, json)?;
            log::info!("Output written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyze_args(detections: PathBuf) -> AnalyzeArgs {
        AnalyzeArgs {
            detections,
            mode: None,
            config: None,
            match_threshold: None,
            range_gap: None,
            sampling_interval: None,
            timeout_ms: None,
            save_session: None,
            output: None,
        }
    }

    #[test]
    fn test_cli_parses_merge_sources() {
        let cli = Cli::try_parse_from([
            "face-timeline",
            "merge",
            "session.json",
            "--target",
            "3",
            "--sources",
            "1,4",
        ])
        .unwrap();
        match cli.command {
            Command::Merge(args) => {
                assert_eq!(args.target, 3);
                assert_eq!(args.sources, vec![1, 4]);
            }
            _ => panic!("expected merge"),
        }
    }

    #[test]
    fn test_cli_requires_merge_sources() {
        let result =
            Cli::try_parse_from(["face-timeline", "merge", "session.json", "--target", "3"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_overrides_apply_on_top_of_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, r#"{"match_threshold": 0.4, "range_gap_seconds": 5.0}"#).unwrap();

        let mut args = analyze_args(dir.path().join("detections.json"));
        args.config = Some(config_path);
        args.range_gap = Some(1.0);
        args.timeout_ms = Some(500);
        let config = build_config(&args).unwrap();

        assert_eq!(config.match_threshold, 0.4);
        assert_eq!(config.range_gap_seconds, 1.0);
        assert_eq!(config.extraction_timeout_ms, 500);
    }

    #[test]
    fn test_online_mode_flag_uses_online_sampling() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, "{}").unwrap();

        let mut args = analyze_args(dir.path().join("detections.json"));
        args.config = Some(config_path);
        args.mode = Some(ModeArg::Online);
        let config = build_config(&args).unwrap();

        assert_eq!(config.mode, AnalysisMode::Online);
        assert_eq!(
            config.sampling_interval_seconds,
            AnalysisConfig::online().sampling_interval_seconds
        );
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        fs::write(&config_path, "{}").unwrap();

        let mut args = analyze_args(dir.path().join("detections.json"));
        args.config = Some(config_path);
        args.match_threshold = Some(0.0);

        assert!(build_config(&args).is_err());
    }

    #[test]
    fn test_validate_missing_recording() {
        let dir = tempfile::tempdir().unwrap();
        let args = analyze_args(dir.path().join("missing.json"));
        assert!(validate(&args).is_err());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detections.json");
        fs::write(&path, "{}").unwrap();
        let mut args = analyze_args(path);
        assert!(validate(&args).is_ok());

        args.timeout_ms = Some(0);
        assert!(validate(&args).is_err());
    }

    #[test]
    fn test_write_json_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let view = SessionView {
            identities: Vec::new(),
            merge_suggestions: vec![vec![1, 2]],
        };

        write_json(&view, Some(&path)).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["merge_suggestions"][0][1], 2);
    }
}
