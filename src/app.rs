pub mod auth;
pub mod error;
pub mod queue;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::response::Html;
use axum::routing::{get, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::bootstrap;
use crate::cli::ServeArgs;
use crate::collect::CollectQueue;
use crate::config::{ConfigProvider, YamlConfigProvider};
use crate::mail::{Mailer, SmtpMailer};
use crate::spider::{HttpLinkVerifier, LinkVerifier, SpiderOrchestrator};
use crate::store::{FileStore, Paths};
use crate::translate::Translator;
use crate::web_info;

use self::queue::TaskPool;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[derive(Clone)]
pub struct AppState {
    pub store: FileStore,
    pub config: Arc<dyn ConfigProvider>,
    pub spider: Arc<SpiderOrchestrator>,
    pub collects: Arc<CollectQueue>,
    pub mailer: Arc<dyn Mailer>,
    pub tasks: TaskPool,
    pub translator: Arc<Translator>,
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        store: FileStore,
        config: Arc<dyn ConfigProvider>,
        verifier: Arc<dyn LinkVerifier>,
        mailer: Arc<dyn Mailer>,
        tasks: TaskPool,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            spider: Arc::new(SpiderOrchestrator::new(store.clone(), verifier)),
            collects: Arc::new(CollectQueue::new(store.clone())),
            translator: Arc::new(Translator::new()?),
            http: web_info::http_client(web_info::DEFAULT_TIMEOUT)?,
            store,
            config,
            mailer,
            tasks,
        })
    }
}

/// API routes plus static assets. Everything except the content fetch and
/// link submission sits behind the token check.
pub fn build_router(state: AppState, body_limit_bytes: usize) -> Router {
    let public = Router::new()
        .route(
            "/api/contents/get",
            get(routes::get_contents).post(routes::get_contents),
        )
        .route("/api/collect/save", post(routes::save_collect));

    let protected = Router::new()
        .route("/api/users/verify", get(routes::verify_user))
        .route("/api/contents/update", post(routes::update_content))
        .route("/api/contents/create", post(routes::create_asset))
        .route("/api/spider", post(routes::run_spider))
        .route("/api/collect/get", post(routes::list_collects))
        .route("/api/collect/delete", post(routes::delete_collects))
        .route("/api/web/info", post(routes::web_info))
        .route("/api/translate", post(routes::translate))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    let paths = state.store.paths().clone();
    let mut app = public.merge(protected).with_state(state);

    if paths.template.exists() {
        let uploads = ServeDir::new(&paths.upload_root).fallback(ServeFile::new(&paths.template));
        app = app.fallback_service(ServeDir::new(&paths.web_dir).fallback(uploads));
    } else {
        app = app.fallback(|| async {
            Html(
                r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>nav-server</title></head>
  <body>
    <h1>nav-server</h1>
    <p>web assets not found. Build the front end into <code>dist/browser</code>.</p>
  </body>
</html>
"#,
            )
        });
    }

    app.layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let paths = Paths::new(&args.root.root);
    let report = bootstrap::run(&paths).await.context("bootstrap data dir")?;
    tracing::debug!(?report, "bootstrap finished");

    let config: Arc<dyn ConfigProvider> =
        Arc::new(YamlConfigProvider::new(args.root.config_path()));
    let initial = config.load().await.context("load config")?;
    if initial.expected_authorization().is_none() {
        tracing::warn!("password is empty; every protected route will answer 401");
    }
    let addr = args
        .addr
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], initial.port)));

    let state = AppState::new(
        FileStore::new(paths),
        Arc::clone(&config),
        Arc::new(HttpLinkVerifier::new()),
        Arc::new(SmtpMailer::new(config)),
        TaskPool::new(args.max_background_tasks),
    )?;
    let tasks = state.tasks.clone();
    let app = build_router(state, args.body_limit_mb.saturating_mul(1024 * 1024));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {addr}: {err}"))?;
    tracing::info!(%addr, root = %args.root.root.display(), "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve http")?;

    tracing::info!(pending = tasks.len(), "draining background tasks");
    tasks.shutdown(SHUTDOWN_GRACE).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(?err, "listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
