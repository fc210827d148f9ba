//! In-memory template and theme APIs.
//!
//! Both are name-keyed, version-guarded catalogs, so they share one
//! implementation.

use async_trait::async_trait;
use drafter_core::error::{DrafterError, Result};
use drafter_core::template::{Template, TemplateApi};
use drafter_core::theme::{Theme, ThemeApi};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

/// A catalog entry identified by name and carrying a server version.
trait Versioned: Clone {
    const ENTITY: &'static str;
    fn name(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Versioned for Template {
    const ENTITY: &'static str = "Template";

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Versioned for Theme {
    const ENTITY: &'static str = "Theme";

    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

/// Name-ordered, version-guarded storage.
struct Catalog<T> {
    entries: RwLock<BTreeMap<String, T>>,
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: Versioned> Catalog<T> {
    async fn list(&self) -> Vec<T> {
        self.entries.read().await.values().cloned().collect()
    }

    async fn get(&self, name: &str) -> Result<T> {
        self.entries
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DrafterError::not_found(T::ENTITY, name))
    }

    async fn create(&self, mut item: T) -> Result<T> {
        if item.name().trim().is_empty() {
            return Err(DrafterError::validation(format!(
                "{} name must not be empty",
                T::ENTITY
            )));
        }
        let mut entries = self.entries.write().await;
        if entries.contains_key(item.name()) {
            return Err(DrafterError::validation(format!(
                "{} '{}' already exists",
                T::ENTITY,
                item.name()
            )));
        }
        item.set_version(1);
        entries.insert(item.name().to_string(), item.clone());
        Ok(item)
    }

    async fn update(&self, mut item: T, expected_version: u64) -> Result<T> {
        let mut entries = self.entries.write().await;
        let stored = entries
            .get(item.name())
            .ok_or_else(|| DrafterError::not_found(T::ENTITY, item.name()))?;
        if stored.version() != expected_version {
            return Err(DrafterError::conflict(
                T::ENTITY,
                item.name(),
                expected_version,
                Some(stored.version()),
            ));
        }
        item.set_version(expected_version + 1);
        entries.insert(item.name().to_string(), item.clone());
        Ok(item)
    }

    async fn delete(&self, name: &str, expected_version: u64) -> Result<()> {
        let mut entries = self.entries.write().await;
        let stored = entries
            .get(name)
            .ok_or_else(|| DrafterError::not_found(T::ENTITY, name))?;
        if stored.version() != expected_version {
            return Err(DrafterError::conflict(
                T::ENTITY,
                name,
                expected_version,
                Some(stored.version()),
            ));
        }
        entries.remove(name);
        Ok(())
    }
}

/// In-memory [`TemplateApi`].
#[derive(Default)]
pub struct InMemoryTemplateApi {
    catalog: Catalog<Template>,
}

impl InMemoryTemplateApi {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateApi for InMemoryTemplateApi {
    async fn list(&self) -> Result<Vec<Template>> {
        Ok(self.catalog.list().await)
    }

    async fn get(&self, name: &str) -> Result<Template> {
        self.catalog.get(name).await
    }

    async fn create(&self, template: Template) -> Result<Template> {
        self.catalog.create(template).await
    }

    async fn update(&self, template: Template, expected_version: u64) -> Result<Template> {
        self.catalog.update(template, expected_version).await
    }

    async fn delete(&self, name: &str, expected_version: u64) -> Result<()> {
        self.catalog.delete(name, expected_version).await
    }
}

/// In-memory [`ThemeApi`].
#[derive(Default)]
pub struct InMemoryThemeApi {
    catalog: Catalog<Theme>,
}

impl InMemoryThemeApi {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThemeApi for InMemoryThemeApi {
    async fn list(&self) -> Result<Vec<Theme>> {
        Ok(self.catalog.list().await)
    }

    async fn get(&self, name: &str) -> Result<Theme> {
        self.catalog.get(name).await
    }

    async fn create(&self, theme: Theme) -> Result<Theme> {
        self.catalog.create(theme).await
    }

    async fn update(&self, theme: Theme, expected_version: u64) -> Result<Theme> {
        self.catalog.update(theme, expected_version).await
    }

    async fn delete(&self, name: &str, expected_version: u64) -> Result<()> {
        self.catalog.delete(name, expected_version).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_template_update_is_version_guarded() {
        let api = InMemoryTemplateApi::new();
        let created = api.create(Template::chatml()).await.unwrap();
        assert_eq!(created.version, 1);

        let mut edited = created.clone();
        edited.fim_template = Some("<PRE>{prefix}<SUF>{suffix}<MID>".into());
        let saved = api.update(edited.clone(), 1).await.unwrap();
        assert_eq!(saved.version, 2);

        let err = api.update(edited, 1).await.unwrap_err();
        assert!(err.is_version_conflict());
        assert_eq!(api.get("chatml").await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_duplicate_theme_is_rejected() {
        let api = InMemoryThemeApi::new();
        let theme = Theme {
            name: "sepia".into(),
            css: "body { background: #f4ecd8; }".into(),
            ..Default::default()
        };
        api.create(theme.clone()).await.unwrap();
        assert!(api.create(theme).await.unwrap_err().is_validation());
        api.delete("sepia", 1).await.unwrap();
        assert!(api.list().await.unwrap().is_empty());
    }
}
