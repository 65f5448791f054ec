//! bootstrap-data - render kubeadm bootstrap data for a node.

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use kubeadm_bootstrap::{
    provision, BootstrapRequest, CloudInitProvisioner, Format, IgnitionProvisioner, NodeRole,
};

/// Render cloud-config or Ignition bootstrap data from a YAML request.
#[derive(Parser)]
#[command(name = "bootstrap-data")]
#[command(about = "Render kubeadm bootstrap data for a cluster node")]
struct Cli {
    /// Output encoding (or set `BOOTSTRAP_FORMAT` env var).
    #[arg(long, env = "BOOTSTRAP_FORMAT", value_enum, default_value = "cloud-config")]
    format: FormatArg,

    /// Node role; defaults to the request's `kind`.
    #[arg(long, value_enum)]
    role: Option<RoleArg>,

    /// Path of the YAML request.
    #[arg(long)]
    input: PathBuf,

    /// Write the data here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log line format.
    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    CloudConfig,
    Ignition,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::CloudConfig => Self::CloudConfig,
            FormatArg::Ignition => Self::Ignition,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    ControlPlaneInit,
    ControlPlaneJoin,
    WorkerJoin,
}

impl From<RoleArg> for NodeRole {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::ControlPlaneInit => Self::ControlPlaneInit,
            RoleArg::ControlPlaneJoin => Self::ControlPlaneJoin,
            RoleArg::WorkerJoin => Self::WorkerJoin,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(verbose: bool, log_format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("kubeadm_bootstrap=debug,bootstrap_data=debug")
        } else {
            EnvFilter::new("info")
        }
    });
    // stdout carries the generated data.
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    match log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let raw = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read request {}", cli.input.display()))?;
    let request = BootstrapRequest::from_yaml(&raw)
        .with_context(|| format!("Failed to parse request {}", cli.input.display()))?;

    let format = Format::from(cli.format);
    let role = cli.role.map_or_else(|| request.role(), NodeRole::from);
    debug!(%format, kind = %request.role(), requested = %role, "Loaded request");

    let data = match format {
        Format::CloudConfig => provision(&CloudInitProvisioner::new(), role, request.into_cloud_init()),
        Format::Ignition => provision(&IgnitionProvisioner::new(), role, request.into_ignition()),
    }
    .with_context(|| format!("Failed to generate {format} bootstrap data"))?;

    match &cli.output {
        Some(path) => {
            fs::write(path, &data)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = data.len(), %format, "Wrote bootstrap data");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&data)
                .and_then(|()| stdout.flush())
                .context("Failed to write bootstrap data to stdout")?;
        }
    }

    Ok(())
}
