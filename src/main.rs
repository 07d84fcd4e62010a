use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use ux_mirror_lib::config::{load_config_from, load_config_or_default};
use ux_mirror_lib::confidence_engine::{ConfidenceEngine, EngagementAction};
use ux_mirror_lib::errors::UxMirrorResult;
use ux_mirror_lib::perception::{FileSource, HeuristicDetector, PerceptionPipeline};

/// Run the perceptual-confidence loop over a sequence of screenshots.
#[derive(Debug, Parser)]
#[command(name = "ux-mirror", version, about)]
struct Cli {
    /// Screenshot files, analysed in the order given.
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// Config file; defaults to ux-mirror.toml lookup.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session id; a UUID is generated when omitted.
    #[arg(long)]
    session: Option<String>,

    /// Write annotated frames into this directory.
    #[arg(long)]
    annotate_dir: Option<PathBuf>,

    /// Keep analysing after the engine recommends anything other than continuing.
    #[arg(long)]
    keep_going: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (ignore error if not found)
    let _ = dotenvy::dotenv();
    ux_mirror_lib::init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "ux-mirror failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> UxMirrorResult<()> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config_or_default(),
    };

    let engine = ConfidenceEngine::from_config(&config);
    let detector = Arc::new(HeuristicDetector::new(config.detector.clone()));
    let source = Arc::new(FileSource::new(cli.frames.clone()));
    let pipeline = PerceptionPipeline::new(source.clone(), detector).with_annotation(cli.annotate_dir.is_some());

    if let Some(dir) = &cli.annotate_dir {
        std::fs::create_dir_all(dir)?;
    }

    let mut context = serde_json::Map::new();
    context.insert("source".into(), serde_json::json!("files"));
    context.insert("frames".into(), serde_json::json!(cli.frames.len()));
    let session_id = match cli.session.clone() {
        Some(id) => engine.start_session(id, context)?.session_id,
        None => engine.start_generated_session(context)?.session_id,
    };

    for (index, path) in cli.frames.iter().enumerate() {
        let frame = pipeline.step().await?;
        let element_count = frame.elements.len();

        if let (Some(dir), Some(png)) = (&cli.annotate_dir, &frame.annotated_png) {
            let out = dir.join(format!("frame_{:03}.png", index + 1));
            std::fs::write(&out, png)?;
            tracing::debug!(path = %out.display(), "annotated frame written");
        }

        let iteration = engine.add_iteration(&session_id, frame.iteration)?;
        let (action, action_context) = engine.determine_action(&session_id)?;
        let line = serde_json::json!({
            "frame": path,
            "iteration": iteration.iteration_number,
            "elements": element_count,
            "action": action,
            "context": action_context,
        });
        println!("{}", serde_json::to_string(&line)?);

        if action != EngagementAction::ContinueAnalysis && !cli.keep_going {
            tracing::info!(
                session_id = %session_id,
                action = %action,
                skipped_frames = source.remaining().await,
                "stopping loop"
            );
            break;
        }
    }

    let summary = engine.end_session(&session_id)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
