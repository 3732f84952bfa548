use std::net::SocketAddr;
use std::sync::Arc;

use marquee_api::{app, AppState};
use marquee_booking::{BookingService, MockPaymentAdapter, ReservationEngine};
use marquee_catalog::{ShowRegistry, StaticCatalog};
use marquee_core::catalog::NowPlayingMovie;
use marquee_core::ledger::SeatLedger;
use marquee_shared::MovieId;
use marquee_store::{
    booking_repo::PgBookingRepository, reservation_repo::PgReservationRepository,
    seat_repo::PgSeatLedger, show_repo::PgShowRepository, DbClient, RedisLedger,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marquee_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = marquee_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Marquee API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");
    db.migrate().await.expect("Failed to run migrations");

    let ledger: Arc<dyn SeatLedger> = match config.ledger.backend.as_str() {
        "postgres" => Arc::new(PgSeatLedger::new(db.pool.clone())),
        "redis" => Arc::new(
            RedisLedger::new(&config.redis.url).expect("Failed to connect to Redis"),
        ),
        other => panic!("unknown ledger backend {other}"),
    };

    let show_repo = Arc::new(PgShowRepository::new(db.pool.clone()));
    let reservation_repo = Arc::new(PgReservationRepository::new(db.pool.clone()));
    let booking_repo = Arc::new(PgBookingRepository::new(db.pool.clone()));

    let (seat_tx, _) = tokio::sync::broadcast::channel(256);

    let registry = Arc::new(ShowRegistry::new(show_repo.clone(), ledger.clone()));
    let engine = Arc::new(ReservationEngine::new(
        show_repo,
        reservation_repo,
        ledger.clone(),
        chrono::Duration::seconds(config.business_rules.hold_seconds as i64),
        seat_tx.clone(),
    ));
    let bookings = Arc::new(BookingService::new(
        engine.clone(),
        Arc::new(MockPaymentAdapter),
        booking_repo,
        config.business_rules.currency.clone(),
    ));

    let catalog = if config.catalog.movies.is_empty() {
        StaticCatalog::sample()
    } else {
        StaticCatalog::new(
            config
                .catalog
                .movies
                .iter()
                .map(|m| NowPlayingMovie {
                    movie_id: MovieId::new(m.movie_id.clone()),
                    title: m.title.clone(),
                    poster_path: m.poster_path.clone(),
                    vote_average: m.vote_average,
                    vote_count: m.vote_count,
                })
                .collect(),
        )
    };

    marquee_api::worker::spawn_sweeper(
        engine.clone(),
        std::time::Duration::from_secs(config.business_rules.sweep_interval_seconds),
    );

    let app_state = AppState {
        registry,
        engine,
        bookings,
        catalog: Arc::new(catalog),
        ledger,
        seat_tx,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, app).await.expect("Server error");
}
