use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{alerts::WebhookAlertSink, config::Config};
use emaflow_core::{
    alerts::{AlertSink, LogAlertSink},
    ema::{EmaRefreshService, ProducerConfig},
    pipeline::RefreshPipeline,
    refresh_state::RefreshStateTracker,
    sessions::{SessionService, SessionServiceTrait},
    timeframes::{TimeframeService, TimeframeServiceTrait},
    unified::UnificationMerger,
    validation::ValidationService,
};
use emaflow_storage_sqlite::{
    db::{self, write_actor},
    BarRepository, EmaRepository, RefreshStateRepository, SessionRepository, TimeframeRepository,
    UnifiedEmaRepository, ValidationAuditRepository,
};

pub struct AppState {
    pub pipeline: Arc<RefreshPipeline>,
    pub merger: Arc<UnificationMerger>,
    pub timeframe_service: Arc<TimeframeService>,
    pub bar_repository: Arc<BarRepository>,
    pub db_path: String,
}

pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Webhook sink when a URL is configured, otherwise alerts go to the log.
pub fn build_alert_sink(config: &Config) -> anyhow::Result<Arc<dyn AlertSink>> {
    match &config.alert_webhook_url {
        Some(url) => {
            tracing::info!("Alerts are posted to {}", url);
            Ok(Arc::new(WebhookAlertSink::new(url)?))
        }
        None => Ok(Arc::new(LogAlertSink)),
    }
}

pub async fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let db_path = db::init(&config.db_path)?;
    tracing::info!("Database path in use: {}", db_path);

    let pool = db::create_pool(&db_path)?;
    db::run_migrations(&pool)?;
    let writer = write_actor::spawn_writer((*pool).clone());

    let timeframe_repo = Arc::new(TimeframeRepository::new(pool.clone(), writer.clone()));
    let timeframe_service = Arc::new(TimeframeService::new(timeframe_repo));
    let seeded = timeframe_service.seed_defaults().await?;
    if seeded > 0 {
        tracing::info!("Seeded {} default timeframes", seeded);
    }

    let session_repo = Arc::new(SessionRepository::new(pool.clone(), writer.clone()));
    let session_service = Arc::new(SessionService::new(session_repo));
    let seeded = session_service.seed_defaults().await?;
    if seeded > 0 {
        tracing::info!("Seeded {} default sessions", seeded);
    }

    let bar_repository = Arc::new(BarRepository::new(pool.clone(), writer.clone()));
    let ema_repository = Arc::new(EmaRepository::new(pool.clone(), writer.clone()));
    let state_repository = Arc::new(RefreshStateRepository::new(pool.clone(), writer.clone()));
    let unified_repository = Arc::new(UnifiedEmaRepository::new(pool.clone(), writer.clone()));
    let audit_repository = Arc::new(ValidationAuditRepository::new(pool.clone(), writer.clone()));

    let tracker = Arc::new(
        RefreshStateTracker::new(state_repository).with_lookback_days(config.lookback_days),
    );
    let refresh_service = Arc::new(EmaRefreshService::new(
        bar_repository.clone(),
        ema_repository.clone(),
        tracker,
        ProducerConfig {
            max_gap_days: config.max_gap_days,
        },
    ));
    let merger = Arc::new(UnificationMerger::new(
        ema_repository,
        unified_repository.clone(),
    ));
    let validation_service = Arc::new(
        ValidationService::new(
            bar_repository.clone(),
            unified_repository,
            timeframe_service.clone(),
            build_alert_sink(config)?,
        )
        .with_audit_store(audit_repository),
    );

    let pipeline = Arc::new(RefreshPipeline::new(
        timeframe_service.clone(),
        session_service,
        bar_repository.clone(),
        refresh_service,
        merger.clone(),
        validation_service,
    ));

    Ok(Arc::new(AppState {
        pipeline,
        merger,
        timeframe_service,
        bar_repository,
        db_path,
    }))
}
