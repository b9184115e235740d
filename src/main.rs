//! ldb - remote console for a Lua debugger host.
//!
//! Connects to the host (default `localhost:10240`), reads commands from
//! stdin and prints what the host sends back. Lines starting with `/` are
//! handled locally:
//!
//! - `/connect [host:port]` reconnects (to the configured host by default)
//! - `/disconnect` closes the connection
//! - `/quit` disconnects and exits

use std::io::Write;
use std::path::PathBuf;

use clap::Parser as ClapParser;
use crossterm::terminal::{Clear, ClearType};
use thiserror::Error;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ldb::config::{self, ConfigError, ConsoleConfig};
use ldb::console::Console;
use ldb::dispatch::WireConvention;
use ldb::transport::{self, UiEvent};
use ldb::view::ConsoleView;

/// ldb - remote console for a Lua debugger host
#[derive(ClapParser, Debug)]
#[command(name = "ldb", version, about, long_about = None)]
struct Cli {
    /// Remote host to connect to
    #[arg(long, env = "LDB_HOST")]
    host: Option<String>,

    /// Remote port to connect to
    #[arg(long, env = "LDB_PORT")]
    port: Option<u16>,

    /// Inbound convention of the host: "verb" or "local_directive"
    #[arg(long)]
    convention: Option<WireConvention>,

    /// Config file (defaults to $XDG_CONFIG_HOME/ldb/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start without connecting
    #[arg(long)]
    offline: bool,
}

#[derive(Error, Debug)]
pub enum LdbError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), LdbError> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli)?;
    let (tx, rx) = mpsc::channel::<UiEvent>(64);

    if !cli.offline {
        let _ = tx
            .send(UiEvent::Connect {
                host: config.host.clone(),
                port: config.port,
            })
            .await;
    }

    let stdin_tx = tx.clone();
    let default_host = config.host.clone();
    let default_port = config.port;
    tokio::spawn(async move {
        let mut reader = tokio::io::BufReader::new(tokio::io::stdin());
        let mut line = String::new();
        loop {
            line.clear();
            let event = match reader.read_line(&mut line).await {
                Ok(0) | Err(_) => UiEvent::Shutdown,
                Ok(_) => shell_event(&line, &default_host, default_port),
            };
            let done = event == UiEvent::Shutdown;
            if stdin_tx.send(event).await.is_err() || done {
                break;
            }
        }
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("received Ctrl+C");
            let _ = tx.send(UiEvent::Shutdown).await;
        }
    });

    let mut console = Console::new(config, TerminalView::new());
    transport::run(&mut console, rx).await;
    println!();
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ldb=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Config file first, then command-line overrides.
fn load_config(cli: &Cli) -> Result<ConsoleConfig, LdbError> {
    let path = cli.config.clone().or_else(config::default_config_path);
    let mut config = match path {
        Some(path) => ConsoleConfig::load(&path)?.unwrap_or_default(),
        None => ConsoleConfig::default(),
    };
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(convention) = cli.convention {
        config.convention = convention;
    }
    Ok(config)
}

/// Turn one line of stdin into a UI event.
fn shell_event(line: &str, default_host: &str, default_port: u16) -> UiEvent {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut words = line.split_whitespace();
    match words.next() {
        Some("/quit") => UiEvent::Shutdown,
        Some("/disconnect") => UiEvent::Disconnect,
        Some("/connect") => {
            let target = words.next().and_then(|addr| {
                let (host, port) = addr.rsplit_once(':')?;
                Some((host.to_string(), port.parse().ok()?))
            });
            let (host, port) = target.unwrap_or_else(|| (default_host.to_string(), default_port));
            UiEvent::Connect { host, port }
        }
        _ => UiEvent::Submit(line.to_string()),
    }
}

/// Line-oriented stdout rendering.
struct TerminalView {
    prompt: String,
    /// The prompt is the last thing on the current line.
    at_prompt: bool,
}

impl TerminalView {
    fn new() -> Self {
        Self {
            prompt: String::new(),
            at_prompt: false,
        }
    }

    fn write_line(&mut self, text: &str, clear: bool) {
        let mut stdout = std::io::stdout().lock();
        if clear || self.at_prompt {
            let _ = write!(stdout, "\r");
            let _ = crossterm::queue!(stdout, Clear(ClearType::CurrentLine));
        }
        let _ = writeln!(stdout, "{}", text.trim_end_matches(['\r', '\n']));
        let _ = stdout.flush();
        self.at_prompt = false;
    }
}

impl ConsoleView for TerminalView {
    fn append_line(&mut self, text: &str) {
        self.write_line(text, false);
    }

    fn replace_current_line(&mut self, text: &str) {
        self.write_line(text, true);
    }

    fn show_prompt(&mut self) {
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "{}", self.prompt);
        let _ = stdout.flush();
        self.at_prompt = true;
    }

    fn set_prompt_text(&mut self, text: &str) {
        self.prompt = text.to_string();
    }
}
