//! Theme writes with conflict routing.

use crate::conflict::ConflictHandler;
use crate::notice::ResourceKind;
use drafter_core::error::{DrafterError, Result};
use drafter_core::theme::{Theme, ThemeApi};
use std::sync::Arc;

pub struct ThemeService {
    api: Arc<dyn ThemeApi>,
    conflicts: Arc<ConflictHandler>,
}

impl ThemeService {
    pub fn new(api: Arc<dyn ThemeApi>, conflicts: Arc<ConflictHandler>) -> Self {
        Self { api, conflicts }
    }

    pub async fn list(&self) -> Result<Vec<Theme>> {
        self.api.list().await
    }

    pub async fn get(&self, name: &str) -> Result<Theme> {
        self.api.get(name).await
    }

    pub async fn create(&self, name: &str, css: impl Into<String>) -> Result<Theme> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DrafterError::validation("Theme name must not be empty"));
        }
        self.api
            .create(Theme {
                name: name.to_string(),
                version: 0,
                css: css.into(),
            })
            .await
    }

    /// Writes a theme against the version it was read at.
    pub async fn save(&self, theme: Theme) -> Result<Theme> {
        let name = theme.name.clone();
        let expected = theme.version;
        self.api
            .update(theme, expected)
            .await
            .map_err(|e| self.route_error(&name, e))
    }

    pub async fn delete(&self, name: &str, expected_version: u64) -> Result<()> {
        self.api
            .delete(name, expected_version)
            .await
            .map_err(|e| self.route_error(name, e))
    }

    fn route_error(&self, name: &str, error: DrafterError) -> DrafterError {
        if error.is_version_conflict() {
            self.conflicts
                .on_resource_conflict(ResourceKind::Theme, name, &error);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::{Notice, Notifier};
    use drafter_infrastructure::{InMemorySessionApi, InMemoryThemeApi};

    #[tokio::test]
    async fn test_stale_theme_write_is_reported() {
        let (notifier, mut notices) = Notifier::channel();
        let conflicts = Arc::new(ConflictHandler::new(
            Arc::new(InMemorySessionApi::new()),
            notifier,
            10,
        ));
        let service = ThemeService::new(Arc::new(InMemoryThemeApi::new()), conflicts);

        let created = service.create("sepia", "body {}").await.unwrap();
        let mut edited = created.clone();
        edited.css = "body { color: brown; }".into();
        service.save(edited.clone()).await.unwrap();

        let err = service.save(edited).await.unwrap_err();
        assert!(err.is_version_conflict());
        assert!(matches!(
            notices.try_recv().unwrap(),
            Notice::Conflict {
                resource: ResourceKind::Theme,
                ..
            }
        ));
        assert_eq!(service.get("sepia").await.unwrap().version, 2);
    }
}
