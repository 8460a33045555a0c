use std::{env, fs, path::PathBuf};

use anyhow::{Context, bail};
use log::info;
use orchestrator::{Config, Metrics, train};

const DEFAULT_OUTPUT: &str = "result_dumps/default_output.json";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: orchestrator <config.json> [output.json]");
    };
    let output = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_OUTPUT.to_string()));

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    let runs = train(config).context("training failed")?;
    let json = Metrics::to_json(&runs)?;

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    fs::write(&output, json).with_context(|| format!("failed to write {}", output.display()))?;
    info!("wrote {} run(s) to {}", runs.len(), output.display());

    Ok(())
}
