use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use formloop_utils::error::RunError;

use crate::cache::IndexCache;
use crate::collaborators::DocumentIndexer;
use crate::context::{ContextStore, keys};
use crate::dispatcher::Step;
use crate::event::Event;

/// Fingerprints the source document and resolves its index through the cache.
pub(crate) struct SetupStep {
    cache: Arc<IndexCache>,
    indexer: Arc<dyn DocumentIndexer>,
}

impl SetupStep {
    pub fn new(cache: Arc<IndexCache>, indexer: Arc<dyn DocumentIndexer>) -> Self {
        Self { cache, indexer }
    }
}

#[async_trait]
impl Step for SetupStep {
    fn name(&self) -> &'static str {
        "setup"
    }

    async fn run(&self, ctx: &mut ContextStore, event: Event) -> Result<Vec<Event>, RunError> {
        let Event::Start {
            source_path,
            form_path,
        } = event
        else {
            return Err(super::unexpected(self.name(), &event));
        };

        ctx.set(keys::SOURCE_PATH, &source_path)?;
        ctx.set(keys::FORM_PATH, &form_path)?;

        let bytes = tokio::fs::read(&source_path)
            .await
            .map_err(|e| RunError::MissingInput {
                what: format!("source document {source_path} ({e})"),
            })?;
        if String::from_utf8_lossy(&bytes).trim().is_empty() {
            return Err(RunError::EmptyDocument { path: source_path });
        }

        let handle = self.cache.resolve(&bytes, self.indexer.as_ref()).await?;
        info!(
            session = %ctx.session_id(),
            source = %source_path,
            cache_key = %&handle.cache_key[..12],
            "Source document ready"
        );

        ctx.set(keys::DOCUMENT_INDEX_HANDLE, &handle)?;
        ctx.set(keys::ROUND, &0u32)?;
        Ok(vec![Event::ParseForm { form_path }])
    }
}
