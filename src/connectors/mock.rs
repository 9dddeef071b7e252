//! Scriptable connector for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{ConnectorError, FetchOptions, RawItem, SourceConnector, SourceKind};

/// Returns a fixed item list, or a scripted error, counting calls.
pub struct MockConnector {
    provider_tag: String,
    kind: SourceKind,
    items: Mutex<Vec<RawItem>>,
    fail_with: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl MockConnector {
    pub fn new(provider_tag: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            provider_tag: provider_tag.into(),
            kind,
            items: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_items(self, items: Vec<RawItem>) -> Self {
        *self.items.lock().unwrap() = items;
        self
    }

    pub fn failing(self, message: impl Into<String>) -> Self {
        *self.fail_with.lock().unwrap() = Some(message.into());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Builds a minimal valid item for this connector's kind.
    pub fn item(&self, source: &str, url: Option<&str>, body: &str) -> RawItem {
        RawItem {
            provider_tag: self.provider_tag.clone(),
            kind: self.kind,
            source_name: source.to_string(),
            url: url.map(String::from),
            title: None,
            body: body.to_string(),
            published_at: None,
            language: Some("en".to_string()),
            provider_meta: serde_json::Value::Null,
        }
    }
}

#[async_trait]
impl SourceConnector for MockConnector {
    fn provider_tag(&self) -> &str {
        &self.provider_tag
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, options: &FetchOptions) -> Result<Vec<RawItem>, ConnectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(ConnectorError::Unreachable {
                provider: self.provider_tag.clone(),
                message,
            });
        }

        let mut items = self.items.lock().unwrap().clone();
        items.truncate(options.max_items.max(1));
        Ok(items)
    }
}
