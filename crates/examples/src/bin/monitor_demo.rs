use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use dm_core::{default_roster, load_roster, EquipmentStatus};
use dm_registry::StatusRegistry;
use dm_runtime::{init_tracing, MonitorConfig, MonitorSupervisor};

#[derive(Debug, Parser)]
#[command(about = "Run the equipment status monitor against a simulated fleet")]
struct Args {
    /// JSON monitor config; unset fields use defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON roster of equipment; the built-in five-machine fleet if omitted.
    #[arg(long)]
    roster: Option<PathBuf>,

    /// How long to run; 0 runs until Ctrl-C.
    #[arg(long, default_value_t = 60)]
    run_secs: u64,

    #[arg(long)]
    min_delay_ms: Option<u64>,

    #[arg(long)]
    max_delay_ms: Option<u64>,

    #[arg(long)]
    stats_interval_ms: Option<u64>,

    /// Administrative override applied after start, e.g. `EQ003=working`.
    #[arg(long = "force", value_parser = parse_override)]
    overrides: Vec<(String, EquipmentStatus)>,
}

fn parse_override(raw: &str) -> std::result::Result<(String, EquipmentStatus), String> {
    let (id, status) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=STATUS, got `{raw}`"))?;
    Ok((id.trim().to_string(), status.trim().parse()?))
}

fn load_config(args: &Args) -> Result<MonitorConfig> {
    let mut cfg = match &args.config {
        Some(path) => MonitorConfig::from_json_file(path)?,
        None => MonitorConfig::default(),
    };
    if let Some(ms) = args.min_delay_ms {
        cfg.min_flip_delay_ms = ms;
    }
    if let Some(ms) = args.max_delay_ms {
        cfg.max_flip_delay_ms = ms;
    }
    if let Some(ms) = args.stats_interval_ms {
        cfg.stats_interval_ms = ms;
    }
    cfg.validate()?;
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = load_config(&args)?;
    let roster = match &args.roster {
        Some(path) => load_roster(path)
            .with_context(|| format!("loading roster {}", path.display()))?,
        None => default_roster(),
    };

    info!(?cfg, equipment = roster.len(), "monitor_demo starting");
    let registry = Arc::new(StatusRegistry::default());
    let mut supervisor = MonitorSupervisor::new(cfg, registry);
    supervisor.start(roster).context("starting monitor")?;

    for (equipment_id, status) in &args.overrides {
        if let Err(err) = supervisor.set_status(equipment_id, *status) {
            warn!(%equipment_id, error = %err, "override skipped");
        }
    }

    let run_for = async {
        if args.run_secs == 0 {
            std::future::pending::<()>().await;
        } else {
            tokio::time::sleep(Duration::from_secs(args.run_secs)).await;
        }
    };
    tokio::select! {
        _ = run_for => info!("run duration elapsed"),
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for ctrl-c")?;
            info!("interrupted");
        }
    }

    let shutdown = supervisor.shutdown().await;
    info!(graceful = shutdown.graceful, forced = shutdown.forced, "monitor stopped");

    for record in supervisor.list_all() {
        info!(
            equipment_id = %record.equipment_id,
            name = %record.equipment_name,
            status = %record.current_status,
            uptime_minutes = record.uptime_minutes,
            downtime_minutes = record.downtime_minutes,
            changes = record.status_changes_count,
            "final equipment status"
        );
    }
    let report = supervisor.report();
    println!(
        "{}",
        report
            .metrics
            .to_json_line("final", Some(Duration::from_millis(report.uptime_ms)))
    );
    println!("{}", report.to_json_line());
    Ok(())
}
