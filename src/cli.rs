use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use sorng_vmware::{SnapshotMonitor, VsphereConfig};

use crate::config::{self, Overrides};
use crate::exit;
use crate::report::{self, CollectOutput};

#[derive(Debug, Parser)]
#[command(
    name = "snapmon",
    version,
    about = "Reports VMware virtual machines that are running on a snapshot"
)]
pub struct Cli {
    /// JSON config file (default: <config dir>/snapmon/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub host: Option<String>,
    #[arg(long, global = true)]
    pub port: Option<u16>,
    #[arg(long, global = true)]
    pub username: Option<String>,
    /// Accept self-signed certificates
    #[arg(long, global = true)]
    pub insecure: bool,
    /// Do not derive snapshot age from createTime
    #[arg(long = "no-age", global = true)]
    pub no_age: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Log in and list VMs without fetching properties
    Validate,
    /// Run a full collection cycle
    #[command(alias = "get-status")]
    Collect(CollectArgs),
}

#[derive(Debug, Args)]
pub struct CollectArgs {
    /// Exit with code 3 when a powered-on VM is running on a snapshot
    #[arg(long)]
    pub fail_on_active: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            insecure: self.insecure,
            no_age: self.no_age,
        }
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = config::resolve(cli.config.as_deref(), &cli.overrides())
        .map_err(exit::invalid_args_err)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(dispatch(&cli, cfg))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    // RUST_LOG, when set, replaces the default filter.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .init();
}

async fn dispatch(cli: &Cli, cfg: VsphereConfig) -> Result<()> {
    let mut monitor = SnapshotMonitor::from_config(cfg).map_err(exit::vmware)?;

    match &cli.command {
        Commands::Validate => {
            let validation = monitor.validate().await;
            let mut out = io::stdout().lock();
            if cli.json {
                report::write_json(&mut out, &validation.report)?;
            } else {
                report::write_diagnostics(&mut out, &validation.report)?;
            }
            out.flush()?;
            validation.into_result().map_err(exit::vmware)?;
        }
        Commands::Collect(args) => {
            let now = Utc::now();
            let records = monitor.collect(now).await.map_err(exit::vmware)?;
            let endpoint = monitor.endpoint();
            let mut out = io::stdout().lock();
            if cli.json {
                report::write_json(&mut out, &CollectOutput::new(&endpoint, now, &records))?;
            } else {
                report::write_table(&mut out, &records)?;
            }
            out.flush()?;

            let alerting = records.iter().filter(|r| r.is_alerting()).count();
            if args.fail_on_active && alerting > 0 {
                return Err(exit::active_snapshot(format!(
                    "{alerting} virtual machine(s) running on a snapshot"
                )));
            }
        }
    }
    Ok(())
}
