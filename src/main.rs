//! Gamepad OSC gateway
//!
//! Maps game controller input onto OSC channels and variables.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use gamepad_osc::config::{ConfigWatcher, OscSettings};
use gamepad_osc::engine::{Engine, TickLoop};
use gamepad_osc::input::{GamepadProvider, InputEvent};
use gamepad_osc::osc::{DiscardSink, OscSink, UdpOscSender};
use gamepad_osc::paths::AppPaths;

/// Gamepad OSC - send game controller input as OSC
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the detected application path)
    #[arg(short, long)]
    config: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Also write daily-rotated log files to the logs directory
    #[arg(long)]
    log_file: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Run without opening game controllers
    #[arg(long)]
    no_gamepad: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let paths = AppPaths::detect();
    let _log_guard = init_logging(&args, &paths)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| paths.config.to_string_lossy().to_string());
    info!("Starting Gamepad OSC v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", config_path);

    let (mut config_watcher, config) = ConfigWatcher::new(config_path).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let engine = Engine::new(Arc::clone(&config), open_sink(&config.osc_settings));
    let mut ticker = TickLoop::start(engine.clone(), config.processing.tick_interval());

    let provider = if args.no_gamepad {
        info!("Gamepad input disabled");
        None
    } else {
        match GamepadProvider::start(config.input_settings.polling_rate_hz).await {
            Ok(provider) => {
                let target = engine.clone();
                provider
                    .subscribe(Arc::new(move |event: InputEvent| target.on_input_event(&event)))
                    .await;
                info!("🎮 Gamepad provider started");
                Some(provider)
            }
            Err(e) => {
                warn!("Failed to start gamepad provider: {:#}", e);
                None
            }
        }
    };

    let mut current = config;
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut watching = true;
    loop {
        tokio::select! {
            next = config_watcher.next_config(), if watching => {
                let Some(next) = next else {
                    warn!("Config watcher closed, hot reload disabled");
                    watching = false;
                    continue;
                };
                if next.osc_settings.transport_differs(&current.osc_settings) {
                    info!("OSC transport settings changed, reopening sender");
                    engine.replace_sink(open_sink(&next.osc_settings));
                }
                engine.reload(Arc::clone(&next));
                let period = next.processing.tick_interval();
                if period != ticker.period() {
                    ticker.stop().await;
                    ticker = TickLoop::start(engine.clone(), period);
                }
                current = next;
            }
            _ = &mut shutdown => break,
        }
    }

    if let Some(mut provider) = provider {
        provider.shutdown().await;
    }
    ticker.stop().await;
    info!("Gamepad OSC shutdown complete");
    Ok(())
}

/// Open the UDP sender, falling back to a sink that drops everything
fn open_sink(settings: &OscSettings) -> Box<dyn OscSink> {
    match UdpOscSender::new(settings) {
        Ok(sender) => Box::new(sender),
        Err(e) => {
            warn!("OSC output disabled: {}", e);
            Box::new(DiscardSink::new())
        }
    }
}

fn init_logging(args: &Args, paths: &AppPaths) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let (file_layer, guard) = if args.log_file {
        paths.ensure_directories()?;
        let appender = tracing_appender::rolling::daily(&paths.logs_dir, "gamepad-osc.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let (json_layer, text_layer) = if args.json_logs {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            ),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(text_layer)
        .with(json_layer)
        .with(file_layer)
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
