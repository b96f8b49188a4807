//! cat-sync - CAT state synchronizer
//!
//! Keeps a local view of a transceiver's CAT state in sync over TCP and
//! applies key-driven relative adjustments against the device's own values.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use cat_sync::config::{AppConfig, ConfigWatcher, LoggingConfig, Modifiers};
use cat_sync::connection::{CatConnection, ConnectionStatus};
use cat_sync::dispatcher::Dispatcher;
use cat_sync::engine::SyncEngine;
use cat_sync::input::{self, parse_line, KeyEvent, KeySource, ReplKeySource, ScriptedKeySource};

/// How long shutdown waits for each background task
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// cat-sync - keep a transceiver's CAT state in sync and drive it from keys
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "cat-sync.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Override the CAT server host
    #[arg(long, env = "CAT_HOST")]
    host: Option<String>,

    /// Override the CAT server port
    #[arg(long, env = "CAT_PORT")]
    port: Option<u16>,

    /// Print the active key bindings and exit
    #[arg(long)]
    list_bindings: bool,

    /// Replay key commands from a file (same syntax as the prompt) instead of reading the terminal
    #[arg(long, conflicts_with = "no_input")]
    script: Option<String>,

    /// Delay between scripted key events in milliseconds
    #[arg(long, default_value = "50")]
    script_interval_ms: u64,

    /// Run without any key input (state sync only)
    #[arg(long)]
    no_input: bool,
}

impl Args {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(host) = &self.host {
            config.cat.host = host.clone();
        }
        if let Some(port) = self.port {
            config.cat.port = port;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // The logging section lives in the config, so load it before logging starts
    let config_exists = Path::new(&args.config).exists();
    let mut config = if config_exists {
        AppConfig::load(&args.config).await?
    } else {
        AppConfig::default()
    };
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration after command-line overrides")?;

    let _log_guard = init_logging(&args.log_level, args.log_json, &config.logging)?;

    info!("Starting cat-sync v{}...", env!("CARGO_PKG_VERSION"));

    // Hot-reload only when a file is present
    let watcher = if config_exists {
        info!("Configuration loaded from {}", args.config);
        Some(ConfigWatcher::watch(args.config.clone())?)
    } else {
        warn!("Config file {} not found, using defaults", args.config);
        None
    };

    if args.list_bindings {
        print_bindings(&config);
        return Ok(());
    }

    let (source, stop_when_input_ends): (Box<dyn KeySource>, bool) = if args.no_input {
        (Box::new(ScriptedKeySource::default()), false)
    } else if let Some(path) = &args.script {
        let events = load_script(path).await?;
        info!("Loaded {} scripted key events from {}", events.len(), path);
        let source = ScriptedKeySource::new(events)
            .with_interval(Duration::from_millis(args.script_interval_ms));
        (Box::new(source), false)
    } else {
        (Box::new(ReplKeySource::new()), true)
    };

    run_app(
        config,
        watcher,
        &args,
        source,
        stop_when_input_ends,
        shutdown_signal(),
    )
    .await?;

    info!("cat-sync shutdown complete");
    Ok(())
}

async fn run_app(
    config: AppConfig,
    mut config_watcher: Option<ConfigWatcher>,
    args: &Args,
    source: Box<dyn KeySource>,
    stop_when_input_ends: bool,
    shutdown: impl std::future::Future<Output = ()>,
) -> Result<()> {
    info!("📡 CAT server: {}", config.cat.addr());

    // Connection manager
    let (conn_tx, conn_rx) = mpsc::unbounded_channel();
    let connection = CatConnection::new(config.cat.clone());
    connection
        .handle()
        .subscribe_status(Arc::new(|status: ConnectionStatus| {
            debug!("CAT status: {}", status)
        }));
    let (handle, conn_task) = connection.spawn(conn_tx);

    // Key input → intents
    let (key_tx, key_rx) = mpsc::unbounded_channel::<KeyEvent>();
    let (intent_tx, intent_rx) = mpsc::unbounded_channel();
    let (bindings_tx, bindings_rx) = watch::channel(config.input.clone());
    let mapper_task =
        input::spawn_mapper(UnboundedReceiverStream::new(key_rx), bindings_rx, intent_tx);

    let source_name = source.name().to_string();
    let mut source_task = tokio::spawn(source.run(key_tx));
    let mut source_running = true;

    // Engine
    let dispatcher = Dispatcher::new(SyncEngine::new(&config.parameters), handle.clone());
    let dispatcher_task = tokio::spawn(dispatcher.run(conn_rx, intent_rx));

    info!("Starting main event loop...");
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            res = &mut source_task, if source_running => {
                source_running = false;
                match res {
                    Ok(Ok(())) => info!("Key source '{}' finished", source_name),
                    Ok(Err(e)) => warn!("Key source '{}' failed: {:#}", source_name, e),
                    Err(e) => warn!("Key source '{}' panicked: {}", source_name, e),
                }
                if stop_when_input_ends {
                    break;
                }
            }

            Some(mut new_config) = next_config(&mut config_watcher) => {
                info!("📝 Configuration file changed, reloading key bindings...");
                args.apply_overrides(&mut new_config);

                if new_config.cat != config.cat || new_config.parameters != config.parameters {
                    warn!("⚠️  CAT and parameter changes take effect after restart");
                }
                bindings_tx.send_replace(new_config.input);
            }

            _ = &mut shutdown => {
                info!("Shutdown signal received, stopping event loop");
                break;
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    handle.shutdown();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, conn_task).await.is_err() {
        warn!("CAT connection task did not stop in time");
    }

    mapper_task.abort();
    source_task.abort();

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, dispatcher_task).await {
        Ok(Ok(dispatcher)) => {
            let pending = dispatcher.engine().registry().pending();
            if !pending.is_empty() {
                warn!("Unresolved adjustments dropped at shutdown: {:?}", pending);
            }
        }
        Ok(Err(e)) => warn!("Dispatcher task failed: {}", e),
        Err(_) => warn!("Dispatcher did not stop in time"),
    }

    Ok(())
}

/// Next reloaded config, or never when hot-reload is off
async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}

/// Parse a key script: one prompt command per line, `#` starts a comment
async fn load_script(path: &str) -> Result<Vec<KeyEvent>> {
    use cat_sync::input::ReplCommand;

    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read key script: {}", path))?;

    let mut events = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        match parse_line(line) {
            Ok(ReplCommand::Events(parsed)) => events.extend(parsed),
            Ok(ReplCommand::Quit) => break,
            Ok(ReplCommand::Help) | Ok(ReplCommand::Empty) => {}
            Err(e) => anyhow::bail!("{}:{}: {}", path, idx + 1, e),
        }
    }

    Ok(events)
}

fn init_logging(level: &str, json: bool, logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let console = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed()
    };

    let (file_layer, guard) = match &logging.directory {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, &logging.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
}

fn print_bindings(config: &AppConfig) {
    use colored::*;

    println!("\n{}", "=== Key Bindings ===".bold().cyan());
    println!(
        "  Modifier window: {} ms",
        config.input.modifier_window_ms.to_string().green()
    );
    println!();

    for binding in &config.input.bindings {
        let keys = binding.keys.join(" | ");
        let combo = match binding.modifiers {
            Modifiers::CtrlAlt => format!("{} {}", "Ctrl+Alt +".yellow(), keys.bright_white()),
            Modifiers::None => keys.bright_white().to_string(),
        };
        println!("  {:<40} → {}", combo, binding.action.to_string().green());
    }

    println!(
        "\n  Steps: frequency {}/{} Hz, IF shift {}, level {}",
        config.parameters.frequency.step,
        config.parameters.frequency.fine_step,
        config.parameters.if_shift.step,
        config.parameters.level.step
    );
}
