mod config;
mod db;
mod error;
mod invitations;
mod jobs;
mod mailer;
mod reviews;
mod routes;
mod state;
mod storage;
mod submissions;
mod templates;

use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "symposium=info,tower_http=info".into()),
        )
        .init();

    let config = config::Config::from_env()?;
    let config = Arc::new(config);

    crate::storage::ensure_dirs(&config.upload_folder)?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;

    let repo = Arc::new(db::PgRepository::new(pool));
    let files = Arc::new(storage::DiskFileStore::new(config.upload_folder.clone()));

    match &config.smtp_url {
        Some(smtp_url) => {
            let mailer = mailer::SmtpMailer::new(smtp_url, &config.mail_from)?;
            let scheduler = Arc::new(jobs::ReminderScheduler::new(
                repo.clone(),
                repo.clone(),
                Arc::new(mailer),
                config.reminder_policy(),
            ));
            jobs::spawn_reminder_job(scheduler, config.reminder_job_interval);
        }
        None => tracing::warn!("SMTP_URL is not set; reminder emails are disabled"),
    }

    let state = Arc::new(state::AppState {
        repo,
        files,
        config: config.clone(),
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Symposium listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
