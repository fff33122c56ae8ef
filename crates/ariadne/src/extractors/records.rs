// ABOUTME: Pattern extraction: resolves containers and turns each into one output record.
// ABOUTME: Without a container the whole document yields exactly one record.

use std::sync::Arc;

use crate::dom::{Document, Node};
use crate::error::{PipeError, ScrapeError};
use crate::extractors::descriptor::{validate_parts, ContainerDescriptor, FieldDescriptor, Pattern};
use crate::extractors::fields::{node_content, resolve_field};
use crate::extractors::select::resolve_with_fallback;
use crate::pipes::{global_registry, PipeContext, PipeInvocation, PipeRegistry};
use crate::result::{FieldValue, Record};

/// Runs extraction patterns against parsed documents.
///
/// Stateless apart from the pipe registry, so one extractor can serve any
/// number of documents and threads.
#[derive(Debug, Clone)]
pub struct Extractor {
    registry: Arc<PipeRegistry>,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(global_registry())
    }
}

impl Extractor {
    pub fn new(registry: Arc<PipeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PipeRegistry> {
        &self.registry
    }

    /// Fails on the first invocation naming a pipe this extractor's registry
    /// does not know, before any document is touched.
    pub fn check_pipes<'p, I>(&self, chains: I) -> Result<(), ScrapeError>
    where
        I: IntoIterator<Item = &'p [PipeInvocation]>,
    {
        for chain in chains {
            if let Some(invocation) = self.registry.missing(chain).first() {
                return Err(PipeError::unknown(&invocation.name, "", &invocation.params).into());
            }
        }
        Ok(())
    }

    /// Extracts records for a whole [`Pattern`].
    pub fn extract(
        &self,
        doc: &Document,
        pattern: &Pattern,
        ctx: &PipeContext,
    ) -> Result<Vec<Record>, ScrapeError> {
        self.extract_records(doc, pattern.container.as_ref(), &pattern.fields, ctx)
    }

    /// Extracts records from `doc`.
    ///
    /// The configuration is validated first. Each container match becomes one
    /// record; records without any populated key are dropped. Zero container
    /// matches is an empty result, not an error. An unknown or failing pipe
    /// aborts the whole call.
    pub fn extract_records(
        &self,
        doc: &Document,
        container: Option<&ContainerDescriptor>,
        fields: &[FieldDescriptor],
        ctx: &PipeContext,
    ) -> Result<Vec<Record>, ScrapeError> {
        validate_parts(container, fields)?;
        self.check_pipes(fields.iter().map(|f| f.pipes.as_slice()))?;
        let page = ctx
            .base_url
            .as_ref()
            .map(|u| u.to_string())
            .unwrap_or_default();

        let Some(container) = container else {
            let record = self
                .record_for(doc.root(), fields, ctx)
                .map_err(|e| e.at_url(page.as_str()))?;
            return Ok(vec![record]);
        };

        let scopes = resolve_with_fallback(&container.selector, &container.alternatives, doc.root());
        tracing::debug!(url = %page, containers = scopes.len(), "resolved containers");

        let mut records = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let mut record = self
                .record_for(scope, fields, ctx)
                .map_err(|e| e.at_url(page.as_str()))?;
            if let Some(key) = &container.value_key {
                let own = node_content(scope, container.content);
                let own = own.trim();
                if !own.is_empty() {
                    record.insert(key.clone(), FieldValue::text(own));
                }
            }
            if !record.is_empty() {
                records.push(record);
            }
        }
        tracing::debug!(url = %page, records = records.len(), "extracted records");
        Ok(records)
    }

    fn record_for(
        &self,
        scope: Node<'_>,
        fields: &[FieldDescriptor],
        ctx: &PipeContext,
    ) -> Result<Record, ScrapeError> {
        let mut record = Record::new();
        for field in fields {
            if let Some(value) = resolve_field(field, scope, &self.registry, ctx)? {
                record.insert(field.key.clone(), value);
            }
        }
        Ok(record)
    }
}

/// Extracts records with the process-wide pipe registry.
pub fn extract_records(
    doc: &Document,
    container: Option<&ContainerDescriptor>,
    fields: &[FieldDescriptor],
    ctx: &PipeContext,
) -> Result<Vec<Record>, ScrapeError> {
    Extractor::default().extract_records(doc, container, fields, ctx)
}
