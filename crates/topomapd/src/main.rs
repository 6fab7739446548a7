//! Topology reconciliation CLI
//!
//! Reads a JSON array of device observations and writes the reconciled L2 or
//! L3 topology as JSON.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sonic_topomapd::config::DEFAULT_CONFIG_PATH;
use sonic_topomapd::{
    build_l2_result, build_l3_result, DeviceObservation, ProtocolToggles, TopologyResult,
    TopomapConfig,
};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

/// SONiC topology reconciler
#[derive(Parser, Debug)]
#[command(name = "topomapd")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the link-layer topology
    L2 {
        #[command(flatten)]
        io: IoArgs,

        /// Fuse LLDP neighbors
        #[arg(long)]
        lldp: bool,

        /// Fuse CDP neighbors
        #[arg(long)]
        cdp: bool,

        /// Emit FDB endpoint attachments
        #[arg(long)]
        fdb: bool,

        /// Emit ARP/ND endpoint enrichments
        #[arg(long)]
        arp_nd: bool,

        /// Reconstruct bridge domains from forwarding tables
        #[arg(long)]
        bridge_domains: bool,
    },
    /// Build the OSPF/IS-IS topology
    L3 {
        #[command(flatten)]
        io: IoArgs,
    },
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Observation file (JSON array); "-" reads stdin
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

impl Command {
    fn io(&self) -> &IoArgs {
        match self {
            Command::L2 { io, .. } | Command::L3 { io } => io,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let io = cli.command.io();

    let config = match TopomapConfig::load_or_default(&io.config).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("topomapd: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&config.logging.level);

    match run(&cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("topomapd: build failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// RUST_LOG wins over the configured level
fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .compact(),
        )
        .init();
}

fn run(command: &Command, config: &TopomapConfig) -> Result<()> {
    let io = command.io();
    let observations = read_observations(&io.input)?;
    info!(observations = observations.len(), input = %io.input, "loaded observations");

    let result = match command {
        Command::L2 {
            lldp,
            cdp,
            fdb,
            arp_nd,
            bridge_domains,
            ..
        } => {
            let flags = ProtocolToggles {
                lldp: *lldp,
                cdp: *cdp,
                fdb: *fdb,
                arp_nd: *arp_nd,
                bridge_domains: *bridge_domains,
            };
            // Command-line flags replace the configured set entirely
            let toggles = if flags.any() { flags } else { config.toggles() };
            build_l2_result(&observations, toggles).context("L2 build failed")?
        }
        Command::L3 { .. } => build_l3_result(&observations).context("L3 build failed")?,
    };

    write_result(&result, io.output.as_deref(), io.pretty || config.output.pretty)
}

fn read_observations(input: &str) -> Result<Vec<DeviceObservation>> {
    let content = if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read observations from stdin")?;
        buf
    } else {
        fs::read_to_string(input).with_context(|| format!("failed to read {}", input))?
    };
    serde_json::from_str(&content).with_context(|| format!("malformed observations in {}", input))
}

fn write_result(result: &TopologyResult, output: Option<&Path>, pretty: bool) -> Result<()> {
    let mut json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    json.push('\n');

    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "topology written");
        }
        None => io::stdout()
            .lock()
            .write_all(json.as_bytes())
            .context("failed to write topology to stdout")?,
    }
    Ok(())
}
