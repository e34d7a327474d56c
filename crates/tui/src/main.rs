mod app;
mod renderer;

use std::path::PathBuf;

use anyhow::{Context, Result};
use lanescope_core::{EngineConfig, TimelineModel};
use tracing_subscriber::EnvFilter;

/// Logs go to stderr only when `LANESCOPE_LOG` is set, so they never
/// interleave with the alternate screen unless asked for.
fn init_logging() {
    if let Ok(filter) = std::env::var("LANESCOPE_LOG") {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(filter))
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: lanescope <timeline.json> [config.json]");
        std::process::exit(1);
    }
    init_logging();

    let path = PathBuf::from(&args[1]);
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading {}", path.display()))?;
    let model = TimelineModel::from_json_str(&text)
        .with_context(|| format!("loading {}", path.display()))?;

    let config = match args.get(2) {
        Some(config_path) => {
            let text = std::fs::read_to_string(config_path)
                .with_context(|| format!("reading {config_path}"))?;
            EngineConfig::from_json_str(&text).with_context(|| format!("loading {config_path}"))?
        }
        None => model.config().clone(),
    };

    app::App::new(model, config)?.run()
}
