//! Presence CLI - publish a rich presence from the command line.
//!
//! Connects to the local companion process, publishes the presence built from
//! the arguments every time the connection becomes ready, and logs every
//! event until Ctrl-C.

mod events;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use events::{AppEvent, LoggingHandler};
use presence_core::{ActivityType, JoinReply, RichPresence, RpcClient, SessionOptions};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const MANUAL_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "presence-cli")]
#[command(about = "Publish a rich presence to the local companion process")]
struct Args {
    /// Application id registered with the companion
    #[arg(long)]
    app_id: String,

    /// First line of the activity
    #[arg(long)]
    details: Option<String>,

    /// Second line of the activity
    #[arg(long)]
    state: Option<String>,

    /// Asset key of the large image
    #[arg(long)]
    large_image: Option<String>,

    /// Hover text of the large image
    #[arg(long)]
    large_text: Option<String>,

    /// Link button as LABEL=URL (at most two)
    #[arg(long = "button", value_parser = parse_button)]
    buttons: Vec<(String, String)>,

    /// playing, streaming, listening, watching, custom or competing
    #[arg(long, default_value = "playing")]
    activity_type: ActivityType,

    /// Show elapsed time since start
    #[arg(long)]
    elapsed: bool,

    /// Accept join requests instead of declining them
    #[arg(long)]
    accept_joins: bool,

    /// Drive polling from the main thread instead of the I/O thread
    #[arg(long)]
    manual: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn parse_button(value: &str) -> std::result::Result<(String, String), String> {
    match value.split_once('=') {
        Some((label, url)) if !label.is_empty() && !url.is_empty() => {
            Ok((label.to_string(), url.to_string()))
        }
        _ => Err(format!("expected LABEL=URL, got {:?}", value)),
    }
}

fn build_presence(args: &Args) -> Result<RichPresence> {
    let mut presence = RichPresence::new().with_activity_type(args.activity_type);
    presence.details = args.details.clone();
    presence.state = args.state.clone();
    presence.large_image_key = args.large_image.clone();
    presence.large_image_text = args.large_text.clone();

    if args.elapsed {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?;
        presence.start_timestamp = now.as_secs() as i64;
    }

    for (label, url) in &args.buttons {
        if !presence.add_button(label, url) {
            return Err(anyhow!("At most two buttons are supported"));
        }
    }

    Ok(presence)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let presence = build_presence(&args)?;
    let (tx, rx) = mpsc::channel();

    let shutdown_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.send(AppEvent::Shutdown);
    })
    .context("Failed to install Ctrl-C handler")?;

    info!("Starting presence client for application {}", args.app_id);

    let client = RpcClient::builder(args.app_id.as_str())
        .with_shared_handler(Arc::new(LoggingHandler::new(tx)))
        .with_options(SessionOptions::new().with_io_thread(!args.manual))
        .start()?;

    loop {
        if args.manual {
            client.poll()?;
            client.dispatch_callbacks()?;
        }

        match rx.recv_timeout(MANUAL_POLL_INTERVAL) {
            Ok(AppEvent::Ready) => {
                debug!("Publishing presence");
                client.update_presence(Some(&presence))?;
            }
            Ok(AppEvent::JoinRequest(user)) => {
                let reply = if args.accept_joins {
                    JoinReply::Accept
                } else {
                    JoinReply::Decline
                };
                if let Err(e) = client.respond(&user, reply) {
                    warn!("Could not answer join request: {}", e);
                }
            }
            Ok(AppEvent::Shutdown) => {
                info!("Shutdown signal received, exiting");
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    client.clear_presence()?;
    if args.manual {
        client.poll()?;
    }
    client.shutdown();

    Ok(())
}
