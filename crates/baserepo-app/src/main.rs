//! # baserepo - Generic traced repositories
//!
//! This is the main entry point that wires everything together.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  main.rs (this file) - Dependency Injection & Wiring           │
//! │    │                                                            │
//! │    ├── Loads: BaseRepoConfig (--config, JSON or YAML)          │
//! │    ├── Creates: Telemetry (tracer handle, once)                │
//! │    ├── Creates: UserStore (InMemoryStore + BaseRepository)     │
//! │    └── Runs: A short CRUD walkthrough                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod users;

use std::path::PathBuf;

use anyhow::Context as _;
use baserepo_adapter::Telemetry;
use baserepo_domain::{Condition, PageRequest, Repository, UpdatePayload};
use clap::Parser;
use shared::{BaseRepoConfig, Context};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use users::{User, UserRepository, UserStore};

#[derive(Parser)]
#[command(name = "baserepo")]
#[command(about = "baserepo - Generic repository with tracing, in-memory demo")]
#[command(version)]
struct Cli {
    /// Configuration file (.json, .yaml or .yml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (overrides the config file)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BaseRepoConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BaseRepoConfig::default(),
    };

    // Initialize logging
    let filter = cli
        .log_filter
        .as_deref()
        .unwrap_or(&config.telemetry.log_filter);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    info!("baserepo - Generic traced repository demo");

    // ========================================
    // Dependency Injection - Wire up the system
    // ========================================

    let telemetry = Telemetry::from_config(&config.telemetry);
    let users = UserStore::in_memory(&config.store, &telemetry);

    run_demo(&users).await?;

    if let Some(recorder) = telemetry.recorder() {
        info!("Recorded spans:");
        for span in recorder.spans() {
            let status = match &span.error {
                Some(err) => format!("error ({})", err.kind().as_str()),
                None => "ok".to_string(),
            };
            info!("   {} [{}] events={}", span.name, status, span.events.len());
        }
    }

    Ok(())
}

async fn run_demo(users: &UserStore) -> anyhow::Result<()> {
    let ctx = Context::background();

    info!("Creating users...");
    let alice = users.create(&ctx, User::new("Alice", "alice@example.com")).await?;
    let bob = users.create(&ctx, User::new("Bob", "bob@example.com")).await?;
    info!("   Created {} (id={}) and {} (id={})", alice.name, alice.id, bob.name, bob.id);

    if let Err(err) = users.create(&ctx, User::new("", "nobody@example.com")).await {
        warn!("   Rejected user without a name: {}", err);
    }

    let bob = users
        .update(&ctx, bob, &UpdatePayload::new().set("name", "Robert"))
        .await?;
    info!("   Renamed user {} to {}", bob.id, bob.name);

    let page = users
        .get_all(&ctx, &PageRequest::new(10, 0, "id desc"))
        .await?;
    info!("Listing users (total={}):", page.total);
    for user in &page.items {
        info!("   #{} {} <{}>", user.id, user.name, user.email);
    }

    let found = users.find_by_email(&ctx, "alice@example.com").await?;
    info!("Found by email: {} (id={})", found.name, found.id);

    let matching = users
        .get_all_by(
            &ctx,
            &PageRequest::unbounded(),
            &Condition::like("email", "%@example.com"),
        )
        .await?;
    info!("Users at example.com: {}", matching.total);

    users.delete(&ctx, &found, &found.id).await?;
    match users.get_first_by_id(&ctx, &found.id).await {
        Err(err) if err.is_not_found() => info!("Deleted user {}", found.id),
        other => warn!("Unexpected lookup result after delete: {:?}", other),
    }

    Ok(())
}
