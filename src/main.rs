//! `mapbench` replays a scripted map session against the in-memory surface.
//!
//! The script is JSON lines. Each line is either a host call
//! (`{"input": "set_basemap", "id": "satellite"}`) or simulated renderer
//! activity (`{"surface": "complete_style_load"}`). Host actions are printed
//! as JSON lines; the final layer stack is printed last.

use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::Parser;
use mapbench::config::WorkbenchConfig;
use mapbench::geo::ScreenPoint;
use mapbench::memory::{MemorySurface, StyleFixture};
use mapbench::session::{self, Command, HostAction, MapSession, SessionInput};
use mapbench::surface::{LayerSpec, LayerType, RenderedFeature, SourceSpec};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
enum ReplayError {
    #[error("configuration failed: {0}")]
    Config(#[from] mapbench::error::ConfigError),
    #[error("script read failed: {0}")]
    Io(#[from] io::Error),
    #[error("script line {line}: {source}")]
    Script { line: usize, source: serde_json::Error },
    #[error("output encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("session driver stopped unexpectedly")]
    DriverGone,
}

#[derive(Parser, Debug)]
#[command(name = "mapbench", about = "Replay a scripted map session against an in-memory surface")]
struct Cli {
    /// JSON-lines script; stdin when omitted.
    script: Option<PathBuf>,

    /// Setup document (file path or URL); overrides MAPBENCH_SETUP.
    #[arg(long)]
    setup: Option<String>,

    /// Where TOC prefs are loaded from and saved to; overrides MAPBENCH_PREFS_PATH.
    #[arg(long)]
    prefs: Option<PathBuf>,
}

/// Renderer activity a script can simulate.
#[derive(Debug, Deserialize)]
#[serde(tag = "surface", rename_all = "snake_case")]
enum SurfaceStep {
    CompleteStyleLoad,
    FailStyleLoad { message: String },
    PartialStyleData,
    Idle,
    InsertStyleLayer { layer: LayerSpec },
    RenderedFeature { at: ScreenPoint, feature: RenderedFeature },
    ClearRenderedFeatures,
    ClusterZoom { source: String, cluster_id: u64, zoom: f64 },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Step {
    Surface(SurfaceStep),
    Input(SessionInput),
}

impl SurfaceStep {
    fn into_command(self) -> Command<MemorySurface> {
        Command::Surface(Box::new(move |s: &mut MemorySurface| match self {
            Self::CompleteStyleLoad => s.complete_style_load(),
            Self::FailStyleLoad { message } => s.fail_style_load(&message),
            Self::PartialStyleData => s.emit_partial_style_data(),
            Self::Idle => s.emit_idle(),
            Self::InsertStyleLayer { layer } => s.insert_style_layer(layer),
            Self::RenderedFeature { at, feature } => s.add_rendered_feature(at, feature),
            Self::ClearRenderedFeatures => s.clear_rendered_features(),
            Self::ClusterZoom { source, cluster_id, zoom } => s.set_cluster_zoom(&source, cluster_id, zoom),
        }))
    }
}

/// A small vector base style: background, water, roads and place labels.
fn base_style() -> StyleFixture {
    let mut sources = std::collections::BTreeMap::new();
    sources.insert("base".to_string(), SourceSpec(json!({ "type": "vector", "url": "memory://base" })));
    StyleFixture {
        sources,
        layers: vec![
            LayerSpec::new("background", LayerType::Background).with_paint("background-color", json!("#f8f4f0")),
            LayerSpec::new("water", LayerType::Fill).with_source("base").with_paint("fill-color", json!("#a0c8f0")),
            LayerSpec::new("roads", LayerType::Line).with_source("base").with_paint("line-color", json!("#ffffff")),
            LayerSpec::new("place-labels", LayerType::Symbol)
                .with_source("base")
                .with_layout("text-field", json!(["get", "name"])),
        ],
    }
}

fn read_script(path: Option<&PathBuf>) -> Result<Vec<Step>, ReplayError> {
    let reader: Box<dyn BufRead> = match path {
        Some(p) => Box::new(BufReader::new(std::fs::File::open(p)?)),
        None => Box::new(BufReader::new(io::stdin())),
    };
    let mut steps = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let step = serde_json::from_str(trimmed).map_err(|source| ReplayError::Script { line: idx + 1, source })?;
        steps.push(step);
    }
    Ok(steps)
}

fn print_action(out: &mut impl Write, action: &HostAction) -> Result<(), ReplayError> {
    writeln!(out, "{}", serde_json::to_string(action)?)?;
    Ok(())
}

async fn replay(cli: Cli) -> Result<(), ReplayError> {
    let mut config = WorkbenchConfig::from_env()?;
    if cli.setup.is_some() {
        config.setup = cli.setup;
    }
    if cli.prefs.is_some() {
        config.prefs_path = cli.prefs;
    }
    let steps = read_script(cli.script.as_ref())?;

    let mut session = MapSession::load(MemorySurface::new(), &config).await?;
    let urls: Vec<String> = session
        .catalog()
        .entries()
        .iter()
        .filter_map(|b| match config.style_urls.expand(&b.style_id) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!(basemap = %b.id, error = %e, "style url not expanded; basemap will fail to load");
                None
            }
        })
        .collect();
    for url in urls {
        session.surface_mut().register_style(url, base_style());
    }

    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let (act_tx, mut act_rx) = mpsc::channel(64);
    let driver = tokio::spawn(session::run(session, cmd_rx, act_tx, config.prefs_path.clone()));

    let printer = tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(action) = act_rx.recv().await {
            if let Err(e) = print_action(&mut stdout, &action) {
                tracing::error!(error = %e, "action not printed");
            }
        }
    });

    tracing::info!(steps = steps.len(), "replaying script");
    for step in steps {
        let command = match step {
            Step::Surface(s) => s.into_command(),
            Step::Input(i) => Command::Input(i),
        };
        if cmd_tx.send(command).await.is_err() {
            return Err(ReplayError::DriverGone);
        }
    }
    drop(cmd_tx);

    let session = driver.await.map_err(|_| ReplayError::DriverGone)?;
    printer.await.map_err(|_| ReplayError::DriverGone)?;

    let summary = json!({
        "layers": session.surface().layer_ids(),
        "basemap": session.basemap_id(),
        "features": session.draw().features().len(),
    });
    println!("{summary}");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    if let Err(e) = replay(Cli::parse()).await {
        tracing::error!(error = %e, "replay failed");
        std::process::exit(1);
    }
}
