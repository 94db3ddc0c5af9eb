//! radsim CLI
//!
//! Serves the positioning quiz over HTTP or replays a scripted session.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use radsim_engine::{
    create_router, run_clock, AppState, Catalog, Config, QuizCommand, QuizEngine, QuizEvent,
    DEFAULT_CLOCK_PERIOD,
};
use radsim_report::{export_logged, FileExporter, IdentitySource, Report, StaticIdentity};
use radsim_scene::HeadlessScene;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// radsim - Radiography Positioning Simulator
///
/// Runs the positioning quiz: the learner drags and rotates a body-part model
/// until it matches the textbook position, under a countdown per exercise.
#[derive(Parser, Debug)]
#[command(name = "radsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: radsim.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and WebSocket events with a real-time clock
    Serve {
        /// Port for the HTTP API server
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Output directory for reports
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<String>,

        /// Learner identifier recorded in reports
        #[arg(short, long, value_name = "ID")]
        user: Option<String>,
    },

    /// Run a scripted session headlessly and write its report
    Replay {
        /// JSON file holding an array of quiz commands
        #[arg(value_name = "SCRIPT")]
        script: PathBuf,

        /// Output directory for reports
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<String>,

        /// Learner identifier recorded in reports
        #[arg(short, long, value_name = "ID")]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("radsim starting");
    tracing::debug!(config = ?args.config, "Config file");

    let result = match args.command {
        Command::Serve {
            port,
            output_dir,
            user,
        } => serve(args.config.as_deref(), port, output_dir, user).await,
        Command::Replay {
            script,
            output_dir,
            user,
        } => replay(args.config.as_deref(), &script, output_dir, user),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Serves the quiz until Ctrl+C.
async fn serve(
    config_path: Option<&str>,
    port: u16,
    output_dir: Option<String>,
    user: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path, output_dir)?;
    print_config(&config);

    let engine = build_engine(&config, user);
    let state = AppState::new(config, engine);

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    let clock = tokio::spawn(run_clock(state.clone(), DEFAULT_CLOCK_PERIOD));
    let router = create_router(state);

    println!();
    println!("HTTP API server running on http://{addr}");
    println!("Press Ctrl+C to stop");

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl+C, shutting down");
            }
        })
        .await;

    clock.abort();
    served.map_err(|e| anyhow::anyhow!("HTTP server error: {e}"))
}

/// Replays a command script against a headless engine.
fn replay(
    config_path: Option<&str>,
    script: &Path,
    output_dir: Option<String>,
    user: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path, output_dir)?;
    let commands = load_script(script)?;
    println!(
        "Replaying {} commands from {}",
        commands.len(),
        script.display()
    );

    let exporter =
        FileExporter::new(&config.output_dir).with_formats(config.report_formats.clone());
    let mut engine = build_engine(&config, user);
    let mut rejected = 0usize;

    for (step, command) in commands.iter().enumerate() {
        if let Err(e) = engine.apply(command) {
            if e.is_fatal() {
                return Err(anyhow::anyhow!("Command {} failed: {e}", step + 1));
            }
            rejected += 1;
            tracing::warn!(step = step + 1, command = ?command, error = %e, "Command rejected");
        }

        for event in engine.drain_events() {
            print_event(&event);
            if let Some(report) = event.report() {
                if export_logged(&exporter, report) {
                    for format in &config.report_formats {
                        println!("  Report written: {}", exporter.path_for(*format).display());
                    }
                }
            }
        }
    }

    println!();
    if rejected > 0 {
        println!("Rejected commands: {rejected}");
    }
    match engine.report() {
        Some(report) => print_summary(report),
        None => println!("Session did not finish; no report written"),
    }
    Ok(())
}

/// Builds an engine over the reference catalog and a headless scene.
fn build_engine(config: &Config, user: Option<String>) -> QuizEngine<HeadlessScene> {
    let engine = QuizEngine::new(config.clone(), Catalog::reference(), HeadlessScene::new());
    match user {
        Some(user) => {
            tracing::info!(user = %user, "Reports will carry a learner identity");
            let identity: Arc<dyn IdentitySource> = Arc::new(StaticIdentity::new(user));
            engine.with_identity(identity)
        }
        None => engine,
    }
}

/// Loads configuration from the specified path or default location, then
/// applies the output directory override.
fn load_config(config_path: Option<&str>, output_dir: Option<String>) -> anyhow::Result<Config> {
    let mut config = match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))?
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}"))?,
    };

    if let Some(output_dir) = output_dir {
        config.output_dir = output_dir;
    }

    // Re-validate after overrides
    config.validate()?;
    Ok(config)
}

/// Reads a replay script: a JSON array of quiz commands.
fn load_script(path: &Path) -> anyhow::Result<Vec<QuizCommand>> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("Failed to read script '{}': {e}", path.display())
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        anyhow::anyhow!(
            "Invalid replay script '{}': {e}\n\nSuggestion: The script must be a JSON array such as [{{\"command\": \"start\"}}]",
            path.display()
        )
    })
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Output directory: {}", config.output_dir);
    println!("  Time budget: {}s", config.time_budget_secs);
    println!("  Rotation tolerance: {} rad", config.rotation_epsilon);
    println!("  Restore delay: {}ms", config.restore_delay_ms);
}

/// Prints the events a replay produced that matter to a reader.
fn print_event(event: &QuizEvent) {
    match event {
        QuizEvent::AttemptStarted(payload) => {
            println!("Exercise {}: {}", payload.index + 1, payload.title);
        }
        QuizEvent::Verified(payload) => {
            let outcome = if payload.verification.pass {
                "pass"
            } else {
                "fail"
            };
            println!("  Verified: {outcome}");
        }
        QuizEvent::AttemptFinished(payload) => {
            println!(
                "  Finished: {} after {}s",
                payload.status, payload.seconds_elapsed
            );
        }
        QuizEvent::AssetUnavailable(payload) => {
            println!("  Model unavailable: {}", payload.model_ref);
        }
        QuizEvent::SessionExited(_) => println!("Session exited"),
        _ => tracing::debug!(event = event.event_name(), "Replay event"),
    }
}

/// Prints a summary of the finished session.
fn print_summary(report: &Report) {
    println!("=== radsim Session Summary ===");
    println!("Status: {}", report.status);
    println!(
        "Passed: {}/{} ({:.0}%)",
        report.passed_count,
        report.total_exercises,
        report.score_percent()
    );
    if let Some(user) = &report.user_id {
        println!("Learner: {user}");
    }
    let elapsed = report.duration_seconds();
    println!("Duration: {}m {}s", elapsed / 60, elapsed % 60);

    for record in &report.records {
        println!(
            "  {}. {} - {} ({}s)",
            record.index + 1,
            record.title,
            record.outcome.label(),
            record.seconds_elapsed
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_defaults() {
        let args = Args::try_parse_from(["radsim", "serve"]).unwrap();
        assert!(!args.verbose);
        assert!(matches!(
            args.command,
            Command::Serve { port: DEFAULT_PORT, output_dir: None, user: None }
        ));
    }

    #[test]
    fn test_parse_replay_with_global_flags() {
        let args = Args::try_parse_from([
            "radsim",
            "replay",
            "script.json",
            "--user",
            "student-7",
            "--verbose",
        ])
        .unwrap();
        assert!(args.verbose);
        assert!(matches!(
            args.command,
            Command::Replay { ref script, user: Some(ref user), .. }
                if script == Path::new("script.json") && user == "student-7"
        ));
    }

    #[test]
    fn test_replay_requires_script() {
        assert!(Args::try_parse_from(["radsim", "replay"]).is_err());
    }
}
