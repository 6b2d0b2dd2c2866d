use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use formloop_utils::error::RunError;

use crate::collaborators::FormFieldExtractor;
use crate::context::{ContextStore, keys};
use crate::dispatcher::Step;
use crate::event::Event;

pub(crate) struct ParseFormStep {
    extractor: Arc<dyn FormFieldExtractor>,
}

impl ParseFormStep {
    pub fn new(extractor: Arc<dyn FormFieldExtractor>) -> Self {
        Self { extractor }
    }
}

/// Trim names, drop blanks and keep the first occurrence of duplicates.
#[must_use]
pub fn normalize_fields(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty() && seen.insert(f.clone()))
        .collect()
}

#[async_trait]
impl Step for ParseFormStep {
    fn name(&self) -> &'static str {
        "parse_form"
    }

    async fn run(&self, ctx: &mut ContextStore, event: Event) -> Result<Vec<Event>, RunError> {
        let Event::ParseForm { form_path } = event else {
            return Err(super::unexpected(self.name(), &event));
        };

        // Fields never change once extracted.
        if ctx.contains(keys::FIELDS) {
            debug!("Form fields already extracted, skipping extraction");
            return Ok(vec![Event::GenerateQuestions]);
        }

        let bytes = tokio::fs::read(&form_path)
            .await
            .map_err(|e| RunError::MissingInput {
                what: format!("form {form_path} ({e})"),
            })?;
        let form_text = String::from_utf8_lossy(&bytes);

        let extracted = self.extractor.extract_fields(&form_text).await?;
        let fields = normalize_fields(extracted.clone());
        if fields.is_empty() {
            return Err(RunError::ExtractionFailure {
                reason: "no field names found in the form".to_string(),
                raw: format!("{extracted:?}"),
            });
        }

        info!(
            session = %ctx.session_id(),
            field_count = fields.len(),
            fields = ?fields,
            "Extracted form fields"
        );
        ctx.set(keys::FIELDS, &fields)?;
        Ok(vec![Event::GenerateQuestions])
    }
}
