//! TemplateCache - name-keyed cache over the template API.
//!
//! Sessions reference templates by name, so every lookup goes through this
//! cache. A rejected template write invalidates the whole cache before the
//! conflict is reported; the next lookup refetches.

use crate::conflict::ConflictHandler;
use crate::notice::ResourceKind;
use drafter_core::error::{DrafterError, Result};
use drafter_core::template::{RawTemplate, Template, TemplateApi};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

pub struct TemplateCache {
    api: Arc<dyn TemplateApi>,
    conflicts: Arc<ConflictHandler>,
    cache: RwLock<Option<HashMap<String, Template>>>,
}

impl TemplateCache {
    pub fn new(api: Arc<dyn TemplateApi>, conflicts: Arc<ConflictHandler>) -> Self {
        Self {
            api,
            conflicts,
            cache: RwLock::new(None),
        }
    }

    /// Looks a template up by name, loading the catalog on first use.
    pub async fn get(&self, name: &str) -> Result<Option<Template>> {
        if let Some(cache) = self.cache.read().await.as_ref() {
            return Ok(cache.get(name).cloned());
        }
        let loaded = self.load().await?;
        Ok(loaded.get(name).cloned())
    }

    /// All templates, sorted by name.
    pub async fn list(&self) -> Result<Vec<Template>> {
        let cached = self.cache.read().await.clone();
        let map = match cached {
            Some(map) => map,
            None => self.load().await?,
        };
        let mut templates: Vec<Template> = map.into_values().collect();
        templates.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(templates)
    }

    async fn load(&self) -> Result<HashMap<String, Template>> {
        let templates = self.api.list().await?;
        let map: HashMap<String, Template> = templates
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();
        tracing::debug!("[TemplateCache] Loaded {} templates", map.len());
        *self.cache.write().await = Some(map.clone());
        Ok(map)
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        tracing::debug!("[TemplateCache] Invalidated");
    }

    /// Creates a template from user-supplied fields.
    pub async fn create(&self, name: &str, raw: RawTemplate) -> Result<Template> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DrafterError::validation("Template name must not be empty"));
        }
        let template = RawTemplate {
            name: Some(name.to_string()),
            ..raw
        }
        .normalize(name);
        let created = self.api.create(template).await?;
        self.store(created.clone()).await;
        Ok(created)
    }

    /// Writes a template against the version it was read at.
    pub async fn save(&self, template: Template) -> Result<Template> {
        let name = template.name.clone();
        let expected = template.version;
        match self.api.update(template, expected).await {
            Ok(saved) => {
                self.store(saved.clone()).await;
                Ok(saved)
            }
            Err(e) => Err(self.route_error(&name, e).await),
        }
    }

    pub async fn delete(&self, name: &str, expected_version: u64) -> Result<()> {
        match self.api.delete(name, expected_version).await {
            Ok(()) => {
                if let Some(cache) = self.cache.write().await.as_mut() {
                    cache.remove(name);
                }
                Ok(())
            }
            Err(e) => Err(self.route_error(name, e).await),
        }
    }

    async fn store(&self, template: Template) {
        if let Some(cache) = self.cache.write().await.as_mut() {
            cache.insert(template.name.clone(), template);
        }
    }

    async fn route_error(&self, name: &str, error: DrafterError) -> DrafterError {
        if error.is_version_conflict() {
            self.invalidate().await;
            self.conflicts
                .on_resource_conflict(ResourceKind::Template, name, &error);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{Notice, Notifier};
    use drafter_infrastructure::{InMemorySessionApi, InMemoryTemplateApi};

    fn cache() -> (
        Arc<InMemoryTemplateApi>,
        TemplateCache,
        tokio::sync::mpsc::UnboundedReceiver<Notice>,
    ) {
        let api = Arc::new(InMemoryTemplateApi::new());
        let (notifier, notices) = Notifier::channel();
        let conflicts = Arc::new(ConflictHandler::new(
            Arc::new(InMemorySessionApi::new()),
            notifier,
            10,
        ));
        (api.clone(), TemplateCache::new(api, conflicts), notices)
    }

    #[tokio::test]
    async fn test_lookup_by_name() {
        let (api, cache, _notices) = cache();
        api.create(Template::chatml()).await.unwrap();

        assert_eq!(cache.get("chatml").await.unwrap().unwrap().version, 1);
        assert!(cache.get("alpaca").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conflict_invalidates_and_notifies() {
        let (api, cache, mut notices) = cache();
        api.create(Template::chatml()).await.unwrap();
        let stale = cache.get("chatml").await.unwrap().unwrap();

        // Another client edits the template.
        let mut theirs = stale.clone();
        theirs.fim_template = Some("<PRE>{prefix}<SUF>{suffix}<MID>".into());
        api.update(theirs, 1).await.unwrap();

        let err = cache.save(stale).await.unwrap_err();
        assert!(err.is_version_conflict());
        assert!(matches!(
            notices.try_recv().unwrap(),
            Notice::Conflict {
                resource: ResourceKind::Template,
                ..
            }
        ));

        let fresh = cache.get("chatml").await.unwrap().unwrap();
        assert_eq!(fresh.version, 2);
        assert!(fresh.fim_template.is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_blank_name_before_dispatch() {
        let (api, cache, _notices) = cache();
        let err = cache.create("  ", RawTemplate::default()).await.unwrap_err();
        assert!(err.is_validation());
        assert!(api.list().await.unwrap().is_empty());
    }
}
