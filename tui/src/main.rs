//! agentdash Entry Point
//!
//! Launches the terminal dashboard against a local agent daemon.
//!
//! Usage:
//!   agentdash [OPTIONS]
//!
//! Options:
//!   -u, --url <URL>         Daemon base URL (default: http://localhost:7777)
//!   -m, --model <MODEL>     Model to chat with (default: first advertised)
//!   -c, --config <FILE>     Config file (default: ~/.config/agentdash/config.toml)
//!       --poll-ms <MS>      Stream poll interval in milliseconds
//!       --log-file <FILE>   Write logs here instead of stderr

use std::fs::OpenOptions;
use std::io::{self, IsTerminal};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agentdash_tui::App;
use dashboard_core::{default_config_path, load_config_from_path, ClientConfig, ConfigOverrides};

/// Terminal dashboard for a local agent daemon
#[derive(Parser, Debug)]
#[command(name = "agentdash")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Daemon base URL
    #[arg(short, long, value_name = "URL")]
    url: Option<String>,

    /// Model to chat with
    #[arg(short, long)]
    model: Option<String>,

    /// Configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Stream poll interval in milliseconds (1-1000)
    #[arg(long, value_name = "MS")]
    poll_ms: Option<u64>,

    /// Log file; logs go to stderr when unset
    #[arg(long, env = "AGENTDASH_LOG_FILE", value_name = "FILE")]
    log_file: Option<PathBuf>,
}

/// Initialize logging
///
/// The TUI owns the terminal, so stderr only gets errors unless `RUST_LOG`
/// says otherwise; a log file defaults to `info`.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("agentdash=info,agentdash_tui=info,dashboard_core=info")
            });

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .with(filter)
                .init();
        }
        None => {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_writer(io::stderr),
                )
                .with(filter)
                .init();
        }
    }
    Ok(())
}

/// Load file and environment configuration, then apply CLI flags
fn build_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(url) = &args.url {
        overrides = overrides.with_base_url(url.clone());
    }
    if let Some(model) = &args.model {
        overrides = overrides.with_model(model.clone());
    }
    if let Some(ms) = args.poll_ms {
        overrides = overrides.with_poll_interval_ms(ms);
    }
    overrides.apply(&mut config);
    config.validate().context("Invalid command-line option")?;

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.log_file.as_deref())?;

    let config = build_config(&args)?;
    tracing::info!(
        url = %config.base_url,
        model = config.model.as_deref().unwrap_or("<auto>"),
        source = %config.source,
        "Starting agentdash"
    );

    // Check if we have a TTY before attempting initialization
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: agentdash requires a terminal (TTY)");
        eprintln!();
        eprintln!("This usually means stdin/stdout are piped, or SSH was run without -t.");
        std::process::exit(1);
    }

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        // Restore terminal before printing panic
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Run the app
    let result = run_app(&mut terminal, &config).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Propagate any errors
    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: &ClientConfig,
) -> anyhow::Result<()> {
    let mut app = App::new(config)?;
    app.run(terminal).await
}
