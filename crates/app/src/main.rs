//! `tickbars` command-line entry point.
//!
//! Loads the configuration and every dataset once, renders the requested
//! dashboard page and prints its chart view as JSON on stdout.
//!
//! ```text
//! tickbars [--config <file.json>] '<request-json>'
//! tickbars '{"page":"crypto_bars","asset":"ETH","view":"tick","tick_count":30}'
//! ```

use anyhow::{bail, Context};
use std::path::PathBuf;
use tickbars_core::Config;
use tickbars_dashboard::{render, Commentary, DashboardData, ViewRequest};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: tickbars [--config <file.json>] '<request-json>'";

#[derive(Debug, PartialEq)]
struct CliArgs {
    config_path: Option<PathBuf>,
    request: String,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> anyhow::Result<CliArgs> {
    let mut config_path = None;
    let mut request = None;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config needs a file path")?;
                config_path = Some(PathBuf::from(path));
            }
            "--help" | "-h" => bail!(USAGE),
            _ if request.is_none() => request = Some(arg),
            _ => bail!("unexpected argument '{arg}'\n{USAGE}"),
        }
    }

    Ok(CliArgs {
        config_path,
        request: request.context(USAGE)?,
    })
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the JSON view.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args(std::env::args().skip(1))?;
    let config = match &args.config_path {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    let request: ViewRequest =
        serde_json::from_str(&args.request).context("parsing view request")?;

    info!(data_dir = %config.data.data_dir.display(), "loading datasets");
    let data = DashboardData::load(&config).context("loading datasets")?;
    let commentary = Commentary::load(&config).context("loading commentary")?;

    let view = render(&data, &commentary, &config, &request).context("rendering view")?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
