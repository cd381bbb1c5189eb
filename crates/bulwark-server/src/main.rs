mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use bulwark_api::AppStateInner;
use bulwark_db::Database;
use bulwark_gateway::{ChannelSender, DirectSender, DiscordClient, MemoryTransport};
use bulwark_imaging::CropAndNumber;
use bulwark_workflow::{
    BulkPublisher, DispatchPolicy, IntakeHandler, OpponentLifecycle, PublisherConfig,
    ReviewSessions, Scheduler, SessionStore, SubmissionLifecycle,
};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bulwark=debug,bulwark_workflow=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    let db = Arc::new(Database::open(&config.db_path)?);
    info!("Store loaded from {}", config.db_path.display());

    let (channels, direct): (Arc<dyn ChannelSender>, Arc<dyn DirectSender>) =
        match &config.discord_token {
            Some(token) => {
                let client = Arc::new(DiscordClient::new(token.clone(), config.discord_api_base.clone()));
                (client.clone() as Arc<dyn ChannelSender>, client as Arc<dyn DirectSender>)
            }
            None => {
                warn!("DISCORD_TOKEN not set: running in dry-run mode, nothing will be delivered");
                let memory = Arc::new(MemoryTransport::accepting_all());
                (memory.clone() as Arc<dyn ChannelSender>, memory as Arc<dyn DirectSender>)
            }
        };

    let publisher = Arc::new(BulkPublisher::new(
        db.clone(),
        channels.clone(),
        direct,
        PublisherConfig {
            opponents: DispatchPolicy::paced(config.opponent_delay),
            ..Default::default()
        },
    ));

    let submissions = SubmissionLifecycle::new(db.clone());
    let opponents = OpponentLifecycle::new(db.clone(), Arc::new(CropAndNumber::default()));
    let sessions = Arc::new(SessionStore::new(config.session_ttl));
    let mut intake = IntakeHandler::new(submissions.clone(), opponents.clone(), sessions.clone());
    match &config.admin_channel {
        Some(channel_id) => intake = intake.with_admin_channel(channels, channel_id.clone()),
        None => info!("ADMIN_CHANNEL_ID not set: new submissions will not be announced"),
    }

    let state = Arc::new(AppStateInner {
        submissions,
        opponents,
        publisher: publisher.clone(),
        scheduler: Scheduler::new(
            publisher,
            config.publish_channel.clone(),
            config.default_season.clone(),
        ),
        intake,
        reviews: ReviewSessions::new(db, config.session_ttl, config.default_season.clone()),
        admin_token: config.admin_token.clone(),
        publish_channel: config.publish_channel.clone(),
        default_season: config.default_season.clone(),
    });

    tokio::spawn(cleanup::run_cleanup_loop(
        state.clone(),
        sessions,
        Duration::from_secs(60),
    ));

    let app = bulwark_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Bulwark server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
