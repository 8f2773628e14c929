//! Photowall server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware};
use photowall_api::{ChangeFeedBroadcaster, files_router, middleware::AppState, router as api_router};
use photowall_common::{Config, LocalStorage, StorageService};
use photowall_core::{
    BillingService, ChallengeService, ChangeFeedService, EventService, FlyerService,
    GalleryService, LiveWallService, LiveWallTiming, ModerationService, OrganizerService,
    StripeGateway, UploadService,
};
use photowall_db::repositories::{
    ChallengeRepository, EventRepository, OrganizerRepository, UploadRepository,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often idle change feed channels are dropped.
const FEED_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        return Err(e.into());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photowall=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting photowall server...");

    // Load configuration
    let config = Config::load()?;

    if config.billing.secret_key.is_none() {
        warn!("Billing secret key not set, checkout is unavailable");
    }

    // Connect to database
    let db = photowall_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    photowall_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let organizer_repo = OrganizerRepository::new(Arc::clone(&db));
    let event_repo = EventRepository::new(Arc::clone(&db));
    let upload_repo = UploadRepository::new(Arc::clone(&db));
    let challenge_repo = ChallengeRepository::new(Arc::clone(&db));

    // Object storage
    let storage = StorageService::new(
        Arc::new(LocalStorage::new(config.storage.base_path.clone())),
        &config.storage.signing_secret,
        &config.files_url(),
        Duration::from_secs(config.storage.signed_url_ttl_secs),
    );
    info!(path = %config.storage.base_path.display(), "Using local object storage");

    // Realtime change feed
    let change_feed = ChangeFeedBroadcaster::new();
    let feed: ChangeFeedService = Arc::new(change_feed.clone());

    // Initialize services
    let organizer_service = OrganizerService::new(organizer_repo);
    let event_service = EventService::new(
        event_repo.clone(),
        upload_repo.clone(),
        storage.clone(),
        feed.clone(),
        &config.server.url,
    );
    let upload_service = UploadService::new(
        event_repo.clone(),
        upload_repo.clone(),
        challenge_repo.clone(),
        storage.clone(),
        feed.clone(),
    );
    let moderation_service = ModerationService::new(
        event_repo.clone(),
        upload_repo.clone(),
        challenge_repo.clone(),
        storage.clone(),
        feed.clone(),
    );
    let challenge_service =
        ChallengeService::new(event_repo.clone(), challenge_repo, upload_repo.clone());
    let gallery_service =
        GalleryService::new(event_repo.clone(), upload_repo.clone(), storage.clone());
    let billing_service = BillingService::new(
        event_repo.clone(),
        Arc::new(StripeGateway::new(&config.billing)),
        config.billing.clone(),
        &config.server.url,
    );
    let flyer_service = FlyerService::new(event_service.clone());
    let live_wall_service = LiveWallService::new(
        event_repo,
        Arc::new(upload_repo),
        feed,
        LiveWallTiming::from(&config.live_wall),
    );

    // Create app state
    let state = AppState {
        organizer_service,
        event_service,
        upload_service,
        moderation_service,
        challenge_service,
        gallery_service,
        billing_service,
        flyer_service,
        live_wall_service,
        storage,
        change_feed: change_feed.clone(),
    };

    // Drop change channels of events nobody watches
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FEED_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            change_feed.cleanup();
        }
    });

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .nest("/files", files_router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            photowall_api::middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
