use anyhow::Context as _;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::RejectedContent;
use crate::store::FileStore;

/// Visitor-submitted links awaiting review. Items are kept as raw JSON: only
/// `extra.uuid` and `createdAt` are ever touched. Mutations are serialized so
/// two submissions cannot overwrite each other.
pub struct CollectQueue {
    store: FileStore,
    lock: Mutex<()>,
}

impl CollectQueue {
    pub fn new(store: FileStore) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Vec<Value> {
        self.store.read_collects().await
    }

    /// Stamps the submission with a fresh id and time and puts it first.
    pub async fn save(&self, item: Value) -> anyhow::Result<Value> {
        let Value::Object(mut item) = item else {
            return Err(RejectedContent("submission must be a json object".to_string()).into());
        };
        let extra = item
            .entry("extra")
            .or_insert_with(|| Value::Object(Map::new()));
        if !extra.is_object() {
            *extra = Value::Object(Map::new());
        }
        extra["uuid"] = Value::String(uuid::Uuid::new_v4().to_string());
        item.insert(
            "createdAt".to_string(),
            Value::String(chrono::Local::now().format("%Y-%m-%d %H:%M").to_string()),
        );
        let item = Value::Object(item);

        let _guard = self.lock.lock().await;
        let mut collects = self
            .store
            .read_collects_for_update()
            .await
            .context("load collect queue")?;
        collects.insert(0, item.clone());
        self.store
            .write_collects(&collects)
            .await
            .context("write collect queue")?;
        Ok(item)
    }

    /// Removes every queued item whose `extra.uuid` matches one in `remove`.
    pub async fn delete(&self, remove: &[Value]) -> anyhow::Result<Vec<Value>> {
        let _guard = self.lock.lock().await;

        let ids: Vec<&Value> = remove.iter().filter_map(collect_id).collect();
        let mut collects = self
            .store
            .read_collects_for_update()
            .await
            .context("load collect queue")?;
        collects.retain(|item| collect_id(item).is_none_or(|id| !ids.contains(&id)));
        self.store
            .write_collects(&collects)
            .await
            .context("write collect queue")?;
        Ok(collects)
    }
}

/// Current ids are uuid strings; legacy queues hold millisecond timestamps.
fn collect_id(item: &Value) -> Option<&Value> {
    item.pointer("/extra/uuid").filter(|id| !id.is_null())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::Paths;

    fn queue() -> anyhow::Result<(tempfile::TempDir, CollectQueue)> {
        let dir = tempfile::tempdir()?;
        std::fs::create_dir_all(dir.path().join("data"))?;
        let store = FileStore::new(Paths::new(dir.path()));
        std::fs::write(&store.paths().collect, "[]")?;
        Ok((dir, CollectQueue::new(store)))
    }

    fn web(name: &str) -> Value {
        json!({"name": name, "url": format!("https://{name}.example")})
    }

    #[tokio::test]
    async fn save_prepends_with_unique_ids() -> anyhow::Result<()> {
        let (_dir, queue) = queue()?;
        let first = queue.save(web("a")).await?;
        let second = queue.save(web("b")).await?;
        assert_ne!(collect_id(&first), collect_id(&second));
        assert!(second["createdAt"].is_string());

        let names: Vec<_> = queue
            .list()
            .await
            .into_iter()
            .map(|w| w["name"].clone())
            .collect();
        assert_eq!(names, [json!("b"), json!("a")]);
        Ok(())
    }

    #[tokio::test]
    async fn save_keeps_items_with_nulls_and_unknown_shapes() -> anyhow::Result<()> {
        let (_dir, queue) = queue()?;
        std::fs::write(
            &queue.store.paths().collect,
            r#"[{"name":"a","url":"https://a.example","desc":null,"extra":{"uuid":1}},
                {"name":"b","url":"https://b.example","tags":"odd","extra":{"uuid":2}}]"#,
        )?;
        assert_eq!(queue.list().await.len(), 2);

        queue.save(web("c")).await?;
        let items = queue.list().await;
        let names: Vec<_> = items.iter().map(|w| w["name"].clone()).collect();
        assert_eq!(names, [json!("c"), json!("a"), json!("b")]);
        assert_eq!(items[1]["desc"], Value::Null);
        assert_eq!(items[2]["tags"], "odd");
        Ok(())
    }

    #[tokio::test]
    async fn delete_matches_on_uuid_including_legacy_numbers() -> anyhow::Result<()> {
        let (_dir, queue) = queue()?;
        std::fs::write(
            &queue.store.paths().collect,
            r#"[{"name":"legacy","extra":{"uuid":1700000000000}},{"name":"noid"}]"#,
        )?;
        let kept = queue.save(web("fresh")).await?;

        let remaining = queue
            .delete(&[json!({"extra": {"uuid": 1700000000000u64}})])
            .await?;
        let names: Vec<_> = remaining.iter().map(|w| w["name"].clone()).collect();
        assert_eq!(names, [json!("fresh"), json!("noid")]);

        let remaining = queue.delete(&[kept]).await?;
        assert_eq!(remaining.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_queue_lists_empty_but_is_never_overwritten() -> anyhow::Result<()> {
        let (_dir, queue) = queue()?;
        let broken = "[{\"name\"";
        std::fs::write(&queue.store.paths().collect, broken)?;
        assert!(queue.list().await.is_empty());

        assert!(queue.save(web("a")).await.is_err());
        assert!(queue.delete(&[web("a")]).await.is_err());
        assert_eq!(std::fs::read_to_string(&queue.store.paths().collect)?, broken);
        Ok(())
    }

    #[tokio::test]
    async fn non_object_submission_is_rejected() -> anyhow::Result<()> {
        let (_dir, queue) = queue()?;
        let err = queue.save(json!("just a string")).await.unwrap_err();
        assert!(err.downcast_ref::<RejectedContent>().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn concurrent_saves_keep_every_submission() -> anyhow::Result<()> {
        let (_dir, queue) = queue()?;
        let queue = std::sync::Arc::new(queue);
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..8 {
            let queue = std::sync::Arc::clone(&queue);
            tasks.spawn(async move { queue.save(web(&format!("w{i}"))).await.map(|_| ()) });
        }
        while let Some(res) = tasks.join_next().await {
            res??;
        }
        assert_eq!(queue.list().await.len(), 8);
        Ok(())
    }
}
