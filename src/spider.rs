use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;

use crate::cli::RootArgs;
use crate::formats::{Category, FillPolicy, Settings, Web, web_count, webs_mut};
use crate::store::{FileStore, Paths};
use crate::web_info::{self, PageMeta, USER_AGENT_VALUE};

pub const DEFAULT_CONCURRENCY: usize = 20;
pub const DEFAULT_TIMEOUT_SECS: u64 = 6;

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub entries: Vec<Category>,
    pub elapsed: Duration,
    pub error_url_count: usize,
}

/// Bulk health check over the whole entry tree. Implementations update webs in
/// place and must neither drop nor reorder them.
#[async_trait]
pub trait LinkVerifier: Send + Sync {
    async fn verify(
        &self,
        entries: Vec<Category>,
        settings: &Settings,
    ) -> anyhow::Result<VerifyOutcome>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub ok: bool,
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Default)]
pub struct HttpLinkVerifier;

impl HttpLinkVerifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LinkVerifier for HttpLinkVerifier {
    async fn verify(
        &self,
        mut entries: Vec<Category>,
        settings: &Settings,
    ) -> anyhow::Result<VerifyOutcome> {
        let started = Instant::now();
        let timeout_secs = settings.spider_timeout.unwrap_or(DEFAULT_TIMEOUT_SECS).max(1);
        let timeout = Duration::from_secs(timeout_secs);
        let concurrency = settings.spider_qty.unwrap_or(DEFAULT_CONCURRENCY).max(1);
        let want_meta = [
            settings.spider_title,
            settings.spider_description,
            settings.spider_icon,
        ]
        .into_iter()
        .any(|p| p != FillPolicy::No);

        let client = web_info::http_client(timeout)?;
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut tasks = JoinSet::new();
        let mut checked = 0usize;

        for (position, web) in webs_mut(&mut entries).enumerate() {
            let Ok(url) = web_info::parse_entry_url(&web.url) else {
                continue;
            };
            checked += 1;
            let client = client.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (position, check_link(&client, &url, want_meta).await)
            });
        }

        let mut reports: Vec<Option<LinkReport>> = vec![None; web_count(&entries)];
        while let Some(joined) = tasks.join_next().await {
            let (position, report) = joined.context("join link check task")?;
            reports[position] = Some(report);
        }

        let mut error_url_count = 0;
        for (web, report) in webs_mut(&mut entries).zip(reports) {
            let Some(report) = report else {
                continue;
            };
            if !report.ok {
                error_url_count += 1;
            }
            apply_report(web, report, settings);
        }

        let elapsed = started.elapsed();
        tracing::info!(
            checked,
            failed = error_url_count,
            elapsed_ms = elapsed.as_millis() as u64,
            "link verification finished"
        );
        Ok(VerifyOutcome {
            entries,
            elapsed,
            error_url_count,
        })
    }
}

async fn check_link(client: &reqwest::Client, url: &url::Url, want_meta: bool) -> LinkReport {
    let resp = match client
        .get(url.clone())
        .header(USER_AGENT, USER_AGENT_VALUE)
        .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(err) => {
            tracing::debug!(%url, %err, "link check failed");
            return LinkReport { ok: false, meta: None };
        }
    };

    let status = resp.status();
    if status.as_u16() >= 400 {
        tracing::debug!(%url, %status, "link check returned error status");
        return LinkReport { ok: false, meta: None };
    }
    if !want_meta || !status.is_success() {
        return LinkReport { ok: true, meta: None };
    }

    let final_url = resp.url().clone();
    let meta = match web_info::read_text_limited(resp, 512 * 1024).await {
        Ok(html) => Some(web_info::extract_page_meta(&html, &final_url)),
        Err(err) => {
            tracing::debug!(%url, ?err, "reading page body failed");
            None
        }
    };
    LinkReport { ok: true, meta }
}

pub fn apply_report(web: &mut Web, report: LinkReport, settings: &Settings) {
    web.ok = Some(report.ok);
    let Some(meta) = report.meta else {
        return;
    };
    settings.spider_title.apply(&mut web.name, meta.title.as_deref());
    settings.spider_description.apply(&mut web.desc, meta.description.as_deref());
    settings.spider_icon.apply(&mut web.icon, meta.icon.as_deref());
}

/// Runs verification passes and writes their results back, one pass at a time.
pub struct SpiderOrchestrator {
    store: FileStore,
    verifier: Arc<dyn LinkVerifier>,
    pass_lock: Mutex<()>,
}

impl SpiderOrchestrator {
    pub fn new(store: FileStore, verifier: Arc<dyn LinkVerifier>) -> Self {
        Self {
            store,
            verifier,
            pass_lock: Mutex::new(()),
        }
    }

    /// Nothing is written unless verification succeeds. Entries are written
    /// before settings; if the settings write fails after that, the files
    /// disagree until the next pass and the error says so.
    pub async fn run_pass(&self) -> anyhow::Result<Duration> {
        let _guard = self.pass_lock.lock().await;

        let entries = self.store.read_entries().await.context("load entries")?;
        let settings = self.store.read_settings().await.context("load settings")?;
        let before = web_count(&entries);
        tracing::info!(webs = before, "spider pass started");

        let outcome = self
            .verifier
            .verify(entries, &settings)
            .await
            .context("verify links")?;
        let after = web_count(&outcome.entries);
        if after != before {
            anyhow::bail!("link verifier changed the entry count ({before} -> {after})");
        }

        // A pass can take minutes; start from the settings as they are now so
        // edits made meanwhile survive.
        let mut settings = self
            .store
            .read_settings()
            .await
            .context("reload settings after verification")?;

        self.store
            .write_entries(&outcome.entries)
            .await
            .context("write verified entries")?;

        settings.error_url_count = outcome.error_url_count;
        if let Err(err) = self.store.write_settings(&settings).await {
            tracing::warn!(
                ?err,
                error_url_count = outcome.error_url_count,
                "entries were updated but errorUrlCount was not"
            );
            return Err(err.context("write settings after entries were updated"));
        }

        tracing::info!(
            error_url_count = outcome.error_url_count,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            "spider pass persisted"
        );
        Ok(outcome.elapsed)
    }
}

/// One pass from the command line, against the files under `--root`.
pub async fn run(args: RootArgs) -> anyhow::Result<Duration> {
    let store = FileStore::new(Paths::new(&args.root));
    let orchestrator = SpiderOrchestrator::new(store, Arc::new(HttpLinkVerifier::new()));
    orchestrator.run_pass().await
}
