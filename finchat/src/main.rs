//! Finchat terminal client
//!
//! Chat with the finance agent from a terminal. Streams the agent's progress
//! when the WebSocket endpoint is reachable and falls back to single-shot
//! calls when it is not.
//!
//! ## Usage
//!
//! ```bash
//! # Interactive session against the default backend
//! finchat
//!
//! # One query, then exit (status 1 if it failed)
//! finchat --query "What is AAPL trading at?"
//!
//! # Custom backend, no streaming
//! finchat --api-url http://10.0.0.5:8000 --no-stream
//! ```
//!
//! ## Commands
//!
//! - `/reconnect` - Reopen the streaming connection
//! - `/quit` - Exit

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use finchat::config::default_config_path;
use finchat::stream::UpdateReceiver;
use finchat::{
    ChatTransport, ChatUpdate, Config, FallbackClient, HttpFallback, MessageKind,
    SessionController, SessionOutcome, TransportEvent, WsTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "finchat")]
#[command(about = "Chat with a remote finance agent")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Agent backend base URL
    #[arg(long, env = "FINCHAT_API_URL")]
    api_url: Option<String>,

    /// Streaming endpoint (derived from the API URL by default)
    #[arg(long, env = "FINCHAT_WS_URL")]
    ws_url: Option<String>,

    /// Never open the streaming connection
    #[arg(long)]
    no_stream: bool,

    /// Ask one question and exit
    #[arg(short, long)]
    query: Option<String>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let directive = if args.verbose { "finchat=debug" } else { "finchat=info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load_or_default(&config_path)?;

    // Apply CLI overrides
    if let Some(api_url) = args.api_url {
        config.api_base_url = api_url;
    }
    if let Some(ws_url) = args.ws_url {
        config.ws_url = Some(ws_url);
    }
    if args.no_stream {
        config.streaming = false;
    }

    info!(
        config = %config_path.display(),
        api_url = %config.api_base_url,
        ws_url = %config.stream_url(),
        streaming = config.streaming,
        "Starting finchat"
    );

    let fallback = HttpFallback::from_config(&config)?;
    if !fallback.is_available().await {
        warn!(url = %config.health_url(), "Agent backend health check failed");
    }

    let transport = WsTransport::new(config.stream_url()).with_close_grace(config.close_grace());
    let (mut controller, mut updates) = SessionController::new(transport, fallback);

    if config.streaming {
        controller.connect().await;
        wait_for_connection(&mut controller, config.connect_wait()).await;
    }
    render(&mut updates);

    let succeeded = match args.query {
        Some(query) => run_once(&mut controller, &mut updates, &query).await,
        None => {
            run_interactive(&mut controller, &mut updates).await?;
            true
        }
    };

    controller.disconnect().await;

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

/// Give the streaming connection a bounded chance to open.
async fn wait_for_connection<T, F>(controller: &mut SessionController<T, F>, wait: Duration)
where
    T: ChatTransport,
    F: FallbackClient,
{
    let deadline = tokio::time::sleep(wait);
    tokio::pin!(deadline);

    while !controller.is_connected() {
        tokio::select! {
            _ = &mut deadline => {
                warn!("Streaming connection not open, queries will use single-shot calls");
                return;
            }
            event = controller.pump() => {
                if matches!(event, Some(TransportEvent::Closed) | None) {
                    return;
                }
            }
        }
    }
}

async fn run_once<T, F>(
    controller: &mut SessionController<T, F>,
    updates: &mut UpdateReceiver,
    query: &str,
) -> bool
where
    T: ChatTransport,
    F: FallbackClient,
{
    if !controller.submit(query).await {
        warn!("Empty query, nothing to do");
        return false;
    }
    render(updates);

    let outcome = loop {
        tokio::select! {
            outcome = controller.run_until_settled() => break outcome,
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                render(updates);
            }
        }
    };
    render(updates);

    if outcome == SessionOutcome::Abandoned {
        println!("[connection closed before the agent answered]");
    }
    outcome == SessionOutcome::Answered
}

async fn run_interactive<T, F>(
    controller: &mut SessionController<T, F>,
    updates: &mut UpdateReceiver,
) -> anyhow::Result<()>
where
    T: ChatTransport,
    F: FallbackClient,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt(controller.is_busy());

    loop {
        let mut entered = false;
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                entered = true;
                match line.trim() {
                    "/quit" => break,
                    "/reconnect" => controller.connect().await,
                    _ => {
                        controller.submit(&line).await;
                    }
                }
            }
            _ = controller.pump() => {}
        }

        if render(updates) || entered {
            prompt(controller.is_busy());
        }
    }

    Ok(())
}

/// Print queued updates. Returns true if anything was printed.
fn render(updates: &mut UpdateReceiver) -> bool {
    let mut printed = false;
    while let Ok(update) = updates.try_recv() {
        match update {
            ChatUpdate::Connected => println!("[connected to agent]"),
            ChatUpdate::Disconnected => println!("[disconnected, using single-shot calls]"),
            ChatUpdate::Thinking(fragment) => println!("  \x1b[2m{}\x1b[0m", fragment),
            ChatUpdate::Added(message) => match message.kind {
                MessageKind::Answer | MessageKind::Error => println!(
                    "agent [{}]> {}",
                    message.sent_at.format("%H:%M:%S"),
                    message.text
                ),
                // The query was typed here; progress arrives as Thinking.
                MessageKind::Query | MessageKind::Progress => continue,
            },
            ChatUpdate::Busy(true) => println!("Agent is thinking..."),
            ChatUpdate::Busy(false) | ChatUpdate::Updated { .. } | ChatUpdate::Removed(_) => {
                continue
            }
        }
        printed = true;
    }
    printed
}

fn prompt(busy: bool) {
    if !busy {
        print!("you> ");
        let _ = std::io::stdout().flush();
    }
}
