use std::net::SocketAddr;
use std::sync::Arc;

use agrirent_api::{app, state::{AppState, AuthConfig}};
use agrirent_booking::{BookingService, FeeSchedule, PhotoPolicy, ReviewService};
use agrirent_booking::repository::BookingRepository;
use agrirent_booking::review::ReviewRepository;
use agrirent_catalog::EquipmentRepository;
use agrirent_core::MockImageStore;
use agrirent_store::{ChannelNotifier, Config, MemoryBookings, MemoryEquipment, MemoryReviews, PgBookings, PgClient, PgEquipment, PgReviews};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agrirent_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;
    tracing::info!("Starting AgriRent API on port {}", config.server.port);

    let (bookings_repo, equipment_repo, reviews_repo): (
        Arc<dyn BookingRepository>,
        Arc<dyn EquipmentRepository>,
        Arc<dyn ReviewRepository>,
    ) = match &config.database.url {
        Some(url) => {
            let client = PgClient::new(url).await?;
            client.migrate().await?;
            (
                Arc::new(PgBookings::new(client.pool.clone())),
                Arc::new(PgEquipment::new(client.pool.clone())),
                Arc::new(PgReviews::new(client.pool.clone())),
            )
        }
        None => {
            tracing::warn!("No database configured, using in-memory store");
            (
                Arc::new(MemoryBookings::new()),
                Arc::new(MemoryEquipment::new()),
                Arc::new(MemoryReviews::new()),
            )
        }
    };

    let (notifier, _notification_rx) = ChannelNotifier::new(100);

    let booking_service = BookingService::new(
        bookings_repo.clone(),
        equipment_repo.clone(),
        Arc::new(notifier),
        Arc::new(MockImageStore),
        FeeSchedule {
            platform_fee_percent: config.business_rules.platform_fee_percent,
            gst_percent: config.business_rules.gst_percent,
        },
        PhotoPolicy {
            max_per_batch: config.business_rules.max_photos_per_batch,
            max_total: config.business_rules.max_photos_total,
        },
    );
    let review_service = ReviewService::new(reviews_repo, bookings_repo, equipment_repo.clone());

    let app_state = AppState {
        bookings: Arc::new(booking_service),
        reviews: Arc::new(review_service),
        equipment: equipment_repo,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
