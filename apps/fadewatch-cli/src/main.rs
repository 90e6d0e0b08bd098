use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use fadewatch_analysis::{AnalysisDispatcher, HeuristicCollaborator};
use fadewatch_monitor::{MonitorSession, MonitorSettings, MonitoringLoop};
use fadewatch_ops::{init_tracing, write_export};
use fadewatch_sampler::ConfiguredSampler;
use fadewatch_types::config::FadewatchConfig;
use futures::StreamExt;
use tokio::time::sleep;
use tracing::info;

mod ui;

const DEFAULT_CONFIG: &str = "configs/dev.toml";
const TUI_LOG_FILE: &str = "fadewatch.log";

#[derive(Debug, Parser)]
#[command(name = "fadewatch", about = "Wi-Fi signal fading detector")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "FADEWATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Run without the terminal dashboard and print reports to stdout.
    #[arg(long)]
    headless: bool,
    /// Stop a headless run after this many seconds.
    #[arg(long, requires = "headless")]
    duration_secs: Option<u64>,
    /// Write the session log to the export directory on exit.
    #[arg(long)]
    export: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.clone());
    if !args.headless && config.ops.log_file.is_none() {
        config.ops.log_file = Some(TUI_LOG_FILE.into());
    }
    init_tracing(&config.ops)?;

    let sampler = ConfiguredSampler::from_config(&config.sampler)?;
    let dispatcher = AnalysisDispatcher::new(
        Arc::new(HeuristicCollaborator::new()),
        Duration::from_millis(config.analysis.timeout_ms),
    );
    let session = MonitorSession::new(MonitorSettings::from_config(&config), dispatcher);
    let monitor = Arc::new(MonitoringLoop::new(sampler, session.clone()));
    info!(mode = ?config.sampler.mode, "fadewatch ready");

    if args.headless {
        run_headless(&monitor, args.duration_secs).await?;
    } else {
        if config.monitor.autostart {
            monitor.start().await;
        }
        let handle = tokio::runtime::Handle::current();
        let ui_monitor = Arc::clone(&monitor);
        let export_dir = config.ops.export_dir.clone();
        tokio::task::spawn_blocking(move || ui::run(handle, ui_monitor, export_dir)).await??;
        monitor.stop().await;
    }

    if args.export {
        let rows = session.history().export_rows().await;
        let path = write_export(&config.ops.export_dir, &rows)?;
        println!("Exported {} samples to {}", rows.len(), path.display());
    }
    Ok(())
}

async fn run_headless(
    monitor: &MonitoringLoop<ConfiguredSampler>,
    duration_secs: Option<u64>,
) -> Result<()> {
    let session = monitor.session();
    let mut reports = session.dispatcher().subscribe();
    let run_for = async {
        match duration_secs {
            Some(secs) => sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(run_for);

    monitor.start().await;
    loop {
        tokio::select! {
            _ = &mut run_for => break,
            _ = tokio::signal::ctrl_c() => break,
            Some(report) = reports.next() => {
                let category = report
                    .category
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".into());
                println!(
                    "[{}] {}: {}",
                    report.completed_at.format("%H:%M:%S"),
                    category,
                    report.text()
                );
            }
        }
    }
    monitor.stop().await;

    let view = session.dashboard(0, 0).await;
    println!(
        "Samples: {}  events: {}  missed ticks: {}",
        view.history.total_samples, view.history.event_count, view.ticks.misses
    );
    for (category, count) in &view.history.counts {
        println!("  {category}: {count}");
    }
    Ok(())
}

fn load_config(from_args: Option<PathBuf>) -> FadewatchConfig {
    let path = from_args.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    match FadewatchConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                default_config()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            default_config()
        }
    }
}

fn default_config() -> FadewatchConfig {
    let config = FadewatchConfig::default();
    debug_assert!(config.validate().is_ok());
    config
}
