use crate::cli::{ServeArgs, SyncArgs};
use crate::infra::{AppState, InMemoryAuditRepository, InMemoryDirectory, LogNotifier};
use crate::routes::with_audit_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

use audit_ops::config::AppConfig;
use audit_ops::error::AppError;
use audit_ops::telemetry;
use audit_ops::workflows::audits::{
    Archiver, AuditLifecycle, AuditScheduler, ScheduleError,
};

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

    let directory = Arc::new(InMemoryDirectory::seeded());
    let audits = Arc::new(InMemoryAuditRepository::default());
    let notifications = Arc::new(LogNotifier);

    if config.scheduler.sync_on_read {
        synchronize_once(&directory, &audits, true)?;
    }

    let lifecycle = Arc::new(AuditLifecycle::new(
        directory.clone(),
        audits.clone(),
        notifications,
    ));

    let app = with_audit_routes(lifecycle)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "branch audit service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

pub(crate) fn run_sync(args: SyncArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let directory = Arc::new(InMemoryDirectory::seeded());
    let audits = Arc::new(InMemoryAuditRepository::default());
    synchronize_once(&directory, &audits, args.archive)
}

fn synchronize_once(
    directory: &Arc<InMemoryDirectory>,
    audits: &Arc<InMemoryAuditRepository>,
    archive: bool,
) -> Result<(), AppError> {
    let now = Utc::now();
    let scheduler = AuditScheduler::new(directory.clone(), audits.clone());
    let report = scheduler
        .synchronize(now)
        .map_err(|err| AppError::Schedule(ScheduleError::Repository(err)))?;

    for failure in &report.failures {
        warn!(org_id = %failure.org_id.0, error = %failure.error, "organization skipped");
    }

    let archived = if archive {
        Archiver::new(audits.clone())
            .archive_due(now)
            .map_err(|err| AppError::Schedule(ScheduleError::Repository(err)))?
    } else {
        0
    };

    info!(
        audits_created = report.audits_created,
        rollovers = report.rollovers,
        failed_orgs = report.failures.len(),
        archived,
        "synchronization pass complete"
    );
    Ok(())
}
