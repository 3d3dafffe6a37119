//! skyrender entrypoint: configuration assembly, table construction,
//! catalog mapping, then the render pipeline and the encoder.
//!
//! The same binary serves both roles: a CLI renderer writing an output
//! file, and a CGI program answering with an image stream on stdout when
//! a `QUERY_STRING` is present (or `cgi_mode` is set in the config file).
//! All logging goes to stderr so the CGI body stays clean.

use anyhow::{Context, Result};
use clap::Parser;
use core_catalog::ShardSet;
use core_color::{AiryMaps, BesselTable, RgbTable};
use core_config::{OptionSource, RenderConfig, sanitize_query_string};
use core_pipeline::{RenderGeometry, airy_params, rgb_params, run_pipeline};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// CLI arguments. Everything substantive lives in the config file; the
/// flags here locate it and allow one-off overrides.
#[derive(Parser, Debug)]
#[command(name = "skyrender", version, about = "Billion-star sky renderer")]
struct Args {
    /// Configuration file path.
    #[arg(short = 'c', long = "config", default_value = "./skyrender.cfg")]
    config: PathBuf,
    /// Output image path (overrides the configured output_file_name).
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
    /// Additional key=value assignments applied after the config file.
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

fn load_config(args: &Args, query_string: Option<&str>) -> Result<RenderConfig> {
    let mut config = RenderConfig::default();
    config
        .load_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    for assignment in &args.set {
        let (key, value) = assignment
            .split_once('=')
            .with_context(|| format!("malformed --set {assignment:?}, expected KEY=VALUE"))?;
        config
            .set_option(key.trim(), value.trim(), OptionSource::CommandLine)
            .with_context(|| format!("applying --set {assignment:?}"))?;
    }
    if let Some(output) = &args.output {
        config.output_file_name = Some(output.display().to_string());
    }

    // a query string in the environment switches the run into CGI mode
    // even without cgi_mode=yes in the config file
    if let Some(raw) = query_string {
        config.cgi_mode = true;
        let sanitized = sanitize_query_string(raw);
        config
            .load_query_string(&sanitized)
            .context("parsing query string")?;
        config.apply_cgi_caps();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(config: &RenderConfig) -> Result<()> {
    let started = Instant::now();

    let geometry = RenderGeometry::from_config(config)?;

    let table_start = Instant::now();
    let rgb = RgbTable::new(&rgb_params(config));
    debug!(elapsed = ?table_start.elapsed(), "built RGB table");

    let airy = airy_params(config).map(|params| {
        let map_start = Instant::now();
        let bessel = BesselTable::new();
        let maps = AiryMaps::new(&params, &bessel);
        debug!(elapsed = ?map_start.elapsed(), "built Airy maps");
        maps
    });

    let shards = ShardSet::open(
        Path::new(&config.data_file_directory),
        config.gaia_db_enable,
        config.gaia_min_parallax_quality,
        config.external_db_enable,
    )
    .context("opening catalog")?;

    let output = run_pipeline(config, &geometry, &rgb, airy.as_ref(), &shards)?;
    core_encode::write_output(&output.bytes, config).context("writing output")?;

    info!(elapsed = ?started.elapsed(), "render finished");
    Ok(())
}

/// A request that cannot be rendered still gets a response body; the
/// client sees the reason instead of an empty reply.
fn emit_cgi_error(error: &anyhow::Error) {
    print!("Content-type: text/plain\n\nskyrender error: {error:#}\n");
}

fn main() -> std::process::ExitCode {
    let args = Args::parse();
    let query_string = std::env::var("QUERY_STRING").ok();

    let config = match load_config(&args, query_string.as_deref()) {
        Ok(config) => config,
        Err(error) => {
            if query_string.is_some() {
                emit_cgi_error(&error);
            }
            eprintln!("skyrender: {error:#}");
            return std::process::ExitCode::FAILURE;
        }
    };

    // stderr only: in CGI mode stdout carries the image body. Quieter by
    // default when answering a web request.
    let default_filter = if config.cgi_mode { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(&config) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(error) => {
            // no error page here: the image headers may already be on the
            // wire, so a CGI client just sees a truncated body
            eprintln!("skyrender: {error:#}");
            std::process::ExitCode::FAILURE
        }
    }
}
