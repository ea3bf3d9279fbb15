use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryDonationRepository, LoggingNotifier};
use crate::routes::with_donation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use red_roja::config::AppConfig;
use red_roja::donation::DonationService;
use red_roja::error::AppError;
use red_roja::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryDonationRepository::default());
    let notifier = Arc::new(LoggingNotifier::default());
    let donation_service = Arc::new(DonationService::new(
        repository,
        notifier,
        config.eligibility.clone(),
    ));

    let app = with_donation_routes(donation_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        cooldown_days = config.eligibility.cooldown_days,
        "red roja donation service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
