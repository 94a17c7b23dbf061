//! Service entry-point: loads settings, migrates, and serves HTTP.

use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use color_eyre::eyre::{Result, WrapErr, eyre};
use ortho_config::OrthoConfig;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use disbursement::app::{Application, ApplicationPorts};
use disbursement::config::ServiceSettings;
use disbursement::domain::ports::{NoOpTracer, Tracer};
use disbursement::inbound::http::{HttpState, RequestContext, configure, json_config};
use disbursement::outbound::persistence::{
    DbPool, DieselDisbursementRepository, DieselStore, run_migrations,
};
use disbursement::outbound::telemetry::{TracingLogger, TracingTracer};

#[actix_web::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let settings = ServiceSettings::load().map_err(|err| eyre!("loading settings: {err}"))?;
    let pool_config = settings.pool_config()?;

    let database_url = pool_config.database_url().to_owned();
    let applied = tokio::task::spawn_blocking(move || run_migrations(&database_url))
        .await
        .wrap_err("migration task failed")??;
    info!(applied, "database migrations complete");

    let pool = DbPool::new(pool_config).await?;
    let tracer: Arc<dyn Tracer> = if settings.tracing_enabled() {
        Arc::new(TracingTracer)
    } else {
        Arc::new(NoOpTracer)
    };
    let app = Application::with_attribute_policy(
        ApplicationPorts {
            store: Arc::new(DieselStore::new(pool.clone())),
            disbursements: Arc::new(DieselDisbursementRepository::new(pool)),
            tracer,
            logger: Arc::new(TracingLogger),
        },
        settings.attribute_policy(),
    );

    let state = web::Data::new(HttpState::new(app));
    let bind_addr = settings.bind_addr().to_owned();
    info!(%bind_addr, "starting HTTP server");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(json_config())
            .wrap(RequestContext)
            .service(web::scope("/api/v1").configure(configure))
    })
    .bind(&bind_addr)
    .wrap_err_with(|| format!("binding {bind_addr}"))?
    .run()
    .await?;
    Ok(())
}
