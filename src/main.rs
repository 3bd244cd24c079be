use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use modedial::config::{self as cfg, ConfigLoader, SchemaCheck};
use modedial::dial::{DialCallbacks, DialEvent, ModeDial};
use modedial::sources::{self, Gesture, GestureSource, ScriptSource, StdinSource};

/// Modedial CLI
#[derive(Debug, Parser)]
#[command(
    name = modedial::PKG_NAME,
    version = modedial::PKG_VERSION,
    about = "Dual-dial mode state machine: validate configurations or simulate the dials"
)]
struct Args {
    /// Path to the JSON configuration file (defaults to the shipped configuration)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Path to the JSON Schema used for validation
    #[arg(short = 's', long = "schema")]
    schema: Option<PathBuf>,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Print the JSON Schema derived from the configuration model and exit
    #[arg(long = "print-schema")]
    print_schema: bool,

    /// Validate the configuration strictly, list its modes and exit
    #[arg(long = "check")]
    check: bool,

    /// Replay gestures from a file instead of reading stdin
    #[arg(long = "script")]
    script: Option<PathBuf>,

    /// Pause between replayed gestures, in milliseconds
    #[arg(long = "delay-ms", default_value_t = 0)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    modedial::init_tracing(args.log_level.as_deref());
    debug!(version = modedial::PKG_VERSION, "Starting modedial");

    if args.print_schema {
        let stdout = io::stdout();
        cfg::write_schema_to_writer(stdout.lock())?;
        println!();
        return Ok(());
    }

    let loader = build_loader(&args)?;

    if args.check {
        return check(&loader);
    }

    simulate(loader, &args).await
}

/// Load the configuration and a schema.
///
/// Explicit paths must load. Without `--config` the shipped defaults are
/// used leniently. Without any schema the model-derived one is installed.
fn build_loader(args: &Args) -> anyhow::Result<ConfigLoader> {
    let mut loader = match &args.config {
        Some(path) => {
            let mut loader = ConfigLoader::new();
            loader
                .load_config(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            loader
        }
        None => ConfigLoader::load_default_config(),
    };

    if let Some(path) = &args.schema {
        loader
            .load_schema(path)
            .with_context(|| format!("Failed to load schema {}", path.display()))?;
    } else if loader.schema().is_none() {
        let default_schema = cfg::default_root().join(cfg::DEFAULT_SCHEMA_FILE);
        if default_schema.exists() {
            loader
                .load_schema(&default_schema)
                .with_context(|| format!("Failed to load schema {}", default_schema.display()))?;
        } else {
            debug!("No schema file; using the schema derived from the model");
            loader.use_generated_schema()?;
        }
    }

    info!(%loader, "Configuration loaded");
    Ok(loader)
}

fn check(loader: &ConfigLoader) -> anyhow::Result<()> {
    if loader.document().is_none() {
        anyhow::bail!("No configuration found (pass --config or set {})", cfg::HOME_ENV);
    }
    let outcome = loader
        .validate_config()
        .context("Configuration is invalid")?;

    let mut out = io::stdout().lock();
    match outcome {
        SchemaCheck::Enforced => writeln!(out, "configuration is valid")?,
        SchemaCheck::Skipped => writeln!(out, "configuration is valid (schema check skipped)")?,
    }

    let icons = loader.icons();
    for (pos, id) in loader.dial_order().iter().enumerate() {
        let Some(mode) = loader.mode_by_id(id) else {
            continue;
        };
        let icon = icons.get(id).map(String::as_str).unwrap_or(" ");
        writeln!(out, "{pos:>2} {icon} {:<12} {:<7} {}", mode.id, mode.type_name(), mode.label)?;
        for member in mode.members() {
            writeln!(out, "       - {:<10} {:<7} {}", member.id, member.type_name(), member.label)?;
        }
    }
    Ok(())
}

async fn simulate(loader: ConfigLoader, args: &Args) -> anyhow::Result<()> {
    let mut dial = ModeDial::from_loader(loader);
    if dial.dial_order().is_empty() {
        warn!("No modes configured. Every gesture will be ignored.");
    }

    let (event_tx, mut events) = mpsc::unbounded_channel::<DialEvent>();
    dial.set_callbacks(DialCallbacks::forward_to(event_tx));

    let sources: Vec<Box<dyn GestureSource>> = match &args.script {
        Some(path) => vec![Box::new(ScriptSource::new(path.clone(), args.delay_ms))],
        None => vec![Box::new(StdinSource::new())],
    };

    // Channel for gestures produced by sources
    let (tx, mut rx) = mpsc::channel::<Gesture>(64);
    let cancel = CancellationToken::new();
    let _handles = sources::spawn_all_sources(&sources, tx, &cancel);

    print_status(&dial);

    // Main loop: handle gestures or Ctrl+C
    tokio::select! {
        res = async {
            while let Some(gesture) = rx.recv().await {
                match gesture {
                    Gesture::Quit => break,
                    Gesture::State => {
                        let json = serde_json::to_string_pretty(&dial.current_state())?;
                        println!("{json}");
                        continue;
                    }
                    other => other.apply(&mut dial),
                }
                log_events(&mut events);
                print_status(&dial);
            }
            anyhow::Ok(())
        } => res?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    cancel.cancel();
    info!("Modedial exited");
    Ok(())
}

fn log_events(events: &mut UnboundedReceiver<DialEvent>) {
    while let Ok(event) = events.try_recv() {
        match serde_json::to_string(&event) {
            Ok(json) => info!(target: "modedial::events", "{json}"),
            Err(err) => warn!(error = %err, "Failed to serialize dial event"),
        }
    }
}

fn print_status(dial: &ModeDial) {
    let state = dial.current_state();
    match &state.current_mode {
        Some(mode) => {
            let display = state.current_display_value.as_deref().unwrap_or("");
            match &state.group_display_value {
                Some(_) => println!(
                    "[{}/{}] {} > {} = {}",
                    state.current_mode_index + 1,
                    state.total_modes,
                    state.current_mode_id,
                    mode.label,
                    display
                ),
                None => println!(
                    "[{}/{}] {} = {}",
                    state.current_mode_index + 1,
                    state.total_modes,
                    mode.label,
                    display
                ),
            }
        }
        None => println!("[-] no mode"),
    }
}
