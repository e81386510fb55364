use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{self, TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use appointment_cell::{
    AppointmentBookingService, AppointmentRepository, AppointmentState, InMemoryAppointmentRepository,
    SchedulingConsistencyService, SlotService, SupabaseAppointmentRepository,
};
use availability_cell::{
    AvailabilityRepository, AvailabilityService, InMemoryAvailabilityRepository, SupabaseAvailabilityRepository,
};
use cache_cell::ScheduleCache;
use shared_config::{AppConfig, StoreBackend};
use shared_database::SupabaseClient;

use crate::router::AppServices;

fn build_repositories(
    config: &AppConfig,
) -> anyhow::Result<(Arc<dyn AvailabilityRepository>, Arc<dyn AppointmentRepository>)> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Ok((
                Arc::new(InMemoryAvailabilityRepository::new()),
                Arc::new(InMemoryAppointmentRepository::new()),
            ))
        }
        StoreBackend::Supabase => {
            anyhow::ensure!(
                config.is_supabase_configured(),
                "STORE_BACKEND=supabase requires SUPABASE_URL and SUPABASE_SERVICE_KEY"
            );
            let client = SupabaseClient::new(config).context("failed to create Supabase client")?;
            info!("Using Supabase store at {}", client.get_base_url());
            Ok((
                Arc::new(SupabaseAvailabilityRepository::new(client.clone())),
                Arc::new(SupabaseAppointmentRepository::new(client)),
            ))
        }
    }
}

async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let cache = Arc::new(
        ScheduleCache::from_config(config)
            .await
            .context("failed to initialize schedule cache")?,
    );
    info!("Schedule cache backend: {}", cache.backend_name());

    let (availability_repository, appointment_repository) = build_repositories(config)?;

    let availability = Arc::new(AvailabilityService::new(availability_repository, cache.clone(), config));
    let appointments = AppointmentState {
        booking: Arc::new(AppointmentBookingService::new(
            appointment_repository.clone(),
            cache.clone(),
            config,
        )),
        slots: Arc::new(SlotService::new(
            availability.clone(),
            appointment_repository.clone(),
            cache.clone(),
            config,
        )),
        consistency: Arc::new(SchedulingConsistencyService::new(appointment_repository, config)),
    };

    Ok(AppServices {
        availability,
        appointments,
        cache,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting scheduling API server");

    let config = AppConfig::from_env();
    let services = build_services(&config).await?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router::create_router(services)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}
