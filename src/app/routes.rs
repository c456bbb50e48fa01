use std::sync::Arc;

use anyhow::Context as _;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::aggregate::{self, Contents};
use crate::app::AppState;
use crate::app::error::ApiError;
use crate::config::ConfigProvider;
use crate::mail::{self, Mailer};
use crate::store::FileStore;
use crate::translate::TranslateRequest;
use crate::{upload, web_info, writer};

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct UpdateContentBody {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssetBody {
    pub path: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssetResponse {
    pub image_path: String,
}

#[derive(Debug, Serialize)]
pub struct SpiderResponse {
    pub time: u64,
}

#[derive(Debug, Serialize)]
pub struct CollectList {
    pub data: Vec<Value>,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct CollectSaveBody {
    pub data: Value,
}

#[derive(Debug, Deserialize)]
pub struct CollectDeleteBody {
    #[serde(default)]
    pub data: Vec<Value>,
}

#[derive(Debug, Serialize)]
pub struct CollectDeleteResponse {
    pub data: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct WebInfoBody {
    pub url: String,
}

#[derive(Debug, Default, Serialize)]
pub struct WebInfoResponse {
    pub title: String,
    pub description: String,
    pub url: String,
    pub message: String,
}

pub async fn verify_user() -> Json<Value> {
    Json(json!({}))
}

pub async fn get_contents(State(state): State<AppState>) -> ApiResult<Contents> {
    let contents = aggregate::load_contents(&state.store)
        .await
        .context("load contents")?;
    Ok(Json(contents))
}

pub async fn update_content(
    State(state): State<AppState>,
    Json(body): Json<UpdateContentBody>,
) -> ApiResult<Value> {
    writer::update_content(&state.store, &body.path, &body.content).await?;
    Ok(Json(json!({})))
}

pub async fn create_asset(
    State(state): State<AppState>,
    Json(body): Json<CreateAssetBody>,
) -> ApiResult<CreateAssetResponse> {
    let image_path = upload::store_asset(state.store.paths(), &body.path, &body.content).await?;
    Ok(Json(CreateAssetResponse { image_path }))
}

/// The pass runs on its own task so a dropped connection cannot abandon it
/// between the entries write and the settings write.
pub async fn run_spider(State(state): State<AppState>) -> ApiResult<SpiderResponse> {
    let spider = Arc::clone(&state.spider);
    let elapsed = tokio::spawn(async move { spider.run_pass().await })
        .await
        .context("spider task aborted")?
        .context("spider pass")?;
    Ok(Json(SpiderResponse {
        time: elapsed.as_secs(),
    }))
}

pub async fn list_collects(State(state): State<AppState>) -> Json<CollectList> {
    let data = state.collects.list().await;
    let count = data.len();
    Json(CollectList { data, count })
}

pub async fn delete_collects(
    State(state): State<AppState>,
    Json(body): Json<CollectDeleteBody>,
) -> ApiResult<CollectDeleteResponse> {
    let data = state.collects.delete(&body.data).await?;
    Ok(Json(CollectDeleteResponse { data }))
}

pub async fn save_collect(
    State(state): State<AppState>,
    Json(body): Json<CollectSaveBody>,
) -> ApiResult<Value> {
    let saved = state.collects.save(body.data).await?;
    tracing::info!(name = %saved["name"], url = %saved["url"], "link submitted");

    let config = Arc::clone(&state.config);
    let mailer = Arc::clone(&state.mailer);
    let store = state.store.clone();
    state
        .tasks
        .spawn("collect-notice", notify_submission(config, mailer, store));

    Ok(Json(json!({ "message": "OK" })))
}

async fn notify_submission(
    config: Arc<dyn ConfigProvider>,
    mailer: Arc<dyn Mailer>,
    store: FileStore,
) -> anyhow::Result<()> {
    let config = config.load().await.context("load config")?;
    let settings = store.read_settings().await.context("load settings")?;
    let Some(notice) = mail::submission_notice(config.mail.as_ref(), &settings.email, &config.email)
    else {
        tracing::debug!("no mail recipient or mailConfig; skipping submission notice");
        return Ok(());
    };
    mailer.send(notice).await
}

pub async fn web_info(
    State(state): State<AppState>,
    Json(body): Json<WebInfoBody>,
) -> ApiResult<WebInfoResponse> {
    let url = web_info::parse_entry_url(&body.url)?;
    let meta = web_info::fetch_page_meta(&state.http, &url).await?;
    Ok(Json(WebInfoResponse {
        title: meta.title.unwrap_or_default(),
        description: meta.description.unwrap_or_default(),
        url: meta.icon.unwrap_or_default(),
        message: String::new(),
    }))
}

pub async fn translate(
    State(state): State<AppState>,
    Json(body): Json<TranslateRequest>,
) -> ApiResult<Value> {
    let config = state.config.load().await.context("load config")?;
    let translated = state.translator.translate(&config, &body).await?;
    Ok(Json(translated))
}
