use anyhow::Context;
use clap::Parser;
use gui_bridge::bridge::GuiBridge;
use log::info;
use std::path::PathBuf;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use workflow::config::WorkflowConfig;
use workflow::runner::{Runner, SessionOptions};

mod generator;
mod gui_bridge;
mod port_reclaim;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Real-time FMCW radar acquisition driver")]
struct Args {
    /// Radar configuration (.cfg) pushed to the sensor and used to size frames
    #[arg(long)]
    radar_config: Option<PathBuf>,
    /// Load a workflow config from YAML
    #[arg(long)]
    workflow: Option<PathBuf>,
    /// Serve the display routes over HTTP while running
    #[arg(long, default_value_t = false)]
    serve: bool,
    /// Feed the pipeline from the built-in generator instead of hardware
    #[arg(long, default_value_t = false)]
    synthetic: bool,
    /// Terminate whatever holds the control port if binding it fails
    #[arg(long, default_value_t = false)]
    reclaim_port: bool,
    /// Skip the capture-card handshake
    #[arg(long, default_value_t = false)]
    skip_capture: bool,
    /// Receiver shown on the range profile
    #[arg(long)]
    channel: Option<usize>,
    /// Print the derived radar parameters and exit
    #[arg(long, default_value_t = false)]
    print_parameters: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut workflow_config = if let Some(path) = &args.workflow {
        WorkflowConfig::load(path)?
    } else {
        WorkflowConfig::default()
    };
    if let Some(channel) = args.channel {
        workflow_config.channel = channel;
    }
    let radar_path = args
        .radar_config
        .clone()
        .or_else(|| workflow_config.radar_config.clone())
        .context("no radar configuration given (--radar-config or radar_config in the workflow)")?;

    let runner = Runner::from_path(workflow_config.clone(), &radar_path)?;
    if args.print_parameters {
        print!("{}", runner.parameters());
        return Ok(());
    }

    let session = runner.start(SessionOptions {
        synthetic: args.synthetic,
        skip_capture: args.skip_capture,
        reclaim_port: args.reclaim_port,
    })?;
    if args.serve {
        GuiBridge::serve(session.bridge_state(), workflow_config.http_addr)?;
    }

    info!("streaming (Ctrl+C to stop)...");
    let runtime = TokioBuilder::new_current_thread()
        .enable_all()
        .build()
        .context("creating runtime for signal handling")?;
    runtime.block_on(async {
        signal::ctrl_c().await.context("awaiting Ctrl+C to exit")?;
        Ok::<(), anyhow::Error>(())
    })?;

    let report = session.shutdown();
    info!(
        "program closed (ingestor stopped: {}, transformer stopped: {}, display stopped: {}, {} items drained)",
        report.ingestor_stopped, report.transformer_stopped, report.pump_stopped, report.drained
    );
    Ok(())
}
