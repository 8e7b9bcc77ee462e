use crate::cli::ServeArgs;
use crate::infra::{seed_marketplace, AppState};
use crate::routes::with_marketplace_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use estate_trust::config::AppConfig;
use estate_trust::error::AppError;
use estate_trust::marketplace::{
    LocalObjectStorage, Marketplace, MarketplaceSettings, MemoryRepository,
};
use estate_trust::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

/// CLI flags win over the environment. Anything derived from host or port,
/// such as upload URLs, must be resolved after this runs.
fn apply_overrides(config: &mut AppConfig, args: &mut ServeArgs) {
    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
}

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    apply_overrides(&mut config, &mut args);

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        upload_root: Arc::new(config.storage.upload_dir.clone()),
    };

    let repository = Arc::new(MemoryRepository::new());
    let storage = Arc::new(LocalObjectStorage::from_config(
        &config.storage,
        &config.server,
    ));
    let marketplace = Arc::new(Marketplace::new(
        repository.clone(),
        storage,
        MarketplaceSettings::from_config(&config.auth),
    )?);

    if args.seed {
        let summary = seed_marketplace(&marketplace, repository.as_ref())?;
        info!(
            accounts_created = summary.accounts_created,
            listing_created = summary.listing_created,
            "demo data seeded"
        );
    }

    let app = with_marketplace_routes(marketplace)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        upload_dir = %config.storage.upload_dir.display(),
        "estate trust marketplace ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
