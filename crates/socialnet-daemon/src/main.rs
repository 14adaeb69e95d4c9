//! Socialnet daemon: headless process hosting the social core.
//!
//! Usage:
//!
//!   socialnet-daemon [OPTIONS]
//!
//! Options:
//!
//!   --config <PATH>              Load config from JSON file
//!   --rate-limit <N>             Admissions per client per window
//!   --notification-buffer <N>    Notification queue capacity
//!   --demo                       Run a short scripted scenario at startup
//!
//! The daemon runs until interrupted with Ctrl+C, then drains the
//! notification queue before exiting.

use std::sync::Arc;

use socialnet_node::node::Node;
use socialnet_node::service::{RequestContext, SocialService};
use socialnet_storage::MemoryStore;
use socialnet_types::config::AppConfig;
use socialnet_types::Caller;

mod config;

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    // Tracing / logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = match config::CliArgs::parse_from_env() {
        Ok(config::CliAction::Run(cli)) => cli,
        Ok(config::CliAction::Help) => {
            config::print_help();
            return;
        }
        Err(e) => {
            eprintln!("{e}");
            eprintln!("use --help for usage information");
            std::process::exit(2);
        }
    };

    let app_config = match config::resolve(&cli, |key| std::env::var(key).ok()) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run_daemon(app_config, cli.demo).await {
        tracing::error!("daemon error: {e}");
        std::process::exit(1);
    }
}

// ---------------------------------------------------------------------------
// Daemon main logic
// ---------------------------------------------------------------------------

async fn run_daemon(app_config: AppConfig, demo: bool) -> Result<(), String> {
    tracing::info!(
        rate_limit = app_config.rate_limit_count,
        window = ?app_config.rate_limit_window,
        buffer = app_config.notification_buffer,
        cleanup_interval = ?app_config.cleanup_interval,
        max_age = ?app_config.notification_max_age,
        "configuration resolved"
    );

    let store = Arc::new(MemoryStore::new());
    let mut node =
        Node::new(&app_config, store).map_err(|e| format!("node creation failed: {e}"))?;
    node.start().map_err(|e| format!("node start failed: {e}"))?;

    if demo {
        if let Err(e) = run_demo(&node.service()).await {
            tracing::warn!(%e, "demo scenario failed");
        }
    }

    tracing::info!("press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for Ctrl+C: {e}"))?;
    tracing::info!("received Ctrl+C, shutting down...");

    let stats = node
        .shutdown()
        .await
        .map_err(|e| format!("shutdown failed: {e}"))?;

    tracing::info!(
        delivered = stats.delivered,
        failed = stats.failed,
        "daemon stopped"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Demo scenario
// ---------------------------------------------------------------------------

/// Two users befriend each other, post, like and message.
async fn run_demo(service: &SocialService<MemoryStore>) -> socialnet_types::Result<()> {
    let alice = service.register_user("alice", false)?;
    let bob = service.register_user("bob", false)?;
    let alice_ctx = RequestContext::new("127.0.0.1", Caller::user(alice.id));
    let bob_ctx = RequestContext::new("127.0.0.2", Caller::user(bob.id));

    let edge = service.send_friend_request(&alice_ctx, bob.id).await?;
    service.accept_friend_request(&bob_ctx, edge.id)?;

    let post = service.create_post(&bob_ctx, "hello from the demo")?;
    service.like_post(&alice_ctx, post.id).await?;
    let convo = service.start_conversation(&alice_ctx, bob.id)?;
    service.send_message(&alice_ctx, convo, "hi bob").await?;

    let feed_len = service.feed(&alice_ctx, 50)?.len();
    tracing::info!(
        feed_len,
        friends = service.friends(&alice_ctx)?.len(),
        "demo scenario finished"
    );
    Ok(())
}
