//! Memoized entity lists, invalidated explicitly after writes.

use std::sync::{Arc, RwLock};

use crate::db::queries::{ApiPresetRow, QuestionRow, QuestionSetRow, TestResultRow};
use crate::db::DbError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Questions,
    QuestionSets,
    TestResults,
    ApiPresets,
}

struct Slot<T> {
    value: RwLock<Option<Arc<Vec<T>>>>,
}

impl<T> Slot<T> {
    fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    fn get_or_load(
        &self,
        load: impl FnOnce() -> Result<Vec<T>, DbError>,
    ) -> Result<Arc<Vec<T>>, DbError> {
        {
            let guard = self.value.read().unwrap_or_else(|p| p.into_inner());
            if let Some(cached) = guard.as_ref() {
                return Ok(cached.clone());
            }
        }
        let loaded = Arc::new(load()?);
        let mut guard = self.value.write().unwrap_or_else(|p| p.into_inner());
        *guard = Some(loaded.clone());
        Ok(loaded)
    }

    fn clear(&self) {
        let mut guard = self.value.write().unwrap_or_else(|p| p.into_inner());
        *guard = None;
    }

    fn is_loaded(&self) -> bool {
        self.value
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .is_some()
    }
}

/// One slot per entity kind. A failed load leaves the slot empty.
pub struct EntityCache {
    questions: Slot<QuestionRow>,
    question_sets: Slot<QuestionSetRow>,
    test_results: Slot<TestResultRow>,
    api_presets: Slot<ApiPresetRow>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    pub fn new() -> Self {
        Self {
            questions: Slot::new(),
            question_sets: Slot::new(),
            test_results: Slot::new(),
            api_presets: Slot::new(),
        }
    }

    pub fn questions(
        &self,
        load: impl FnOnce() -> Result<Vec<QuestionRow>, DbError>,
    ) -> Result<Arc<Vec<QuestionRow>>, DbError> {
        self.questions.get_or_load(load)
    }

    pub fn question_sets(
        &self,
        load: impl FnOnce() -> Result<Vec<QuestionSetRow>, DbError>,
    ) -> Result<Arc<Vec<QuestionSetRow>>, DbError> {
        self.question_sets.get_or_load(load)
    }

    pub fn test_results(
        &self,
        load: impl FnOnce() -> Result<Vec<TestResultRow>, DbError>,
    ) -> Result<Arc<Vec<TestResultRow>>, DbError> {
        self.test_results.get_or_load(load)
    }

    pub fn api_presets(
        &self,
        load: impl FnOnce() -> Result<Vec<ApiPresetRow>, DbError>,
    ) -> Result<Arc<Vec<ApiPresetRow>>, DbError> {
        self.api_presets.get_or_load(load)
    }

    pub fn invalidate(&self, kind: EntityKind) {
        tracing::debug!("cache invalidated: {:?}", kind);
        match kind {
            EntityKind::Questions => self.questions.clear(),
            EntityKind::QuestionSets => self.question_sets.clear(),
            EntityKind::TestResults => self.test_results.clear(),
            EntityKind::ApiPresets => self.api_presets.clear(),
        }
    }

    pub fn invalidate_all(&self) {
        for kind in [
            EntityKind::Questions,
            EntityKind::QuestionSets,
            EntityKind::TestResults,
            EntityKind::ApiPresets,
        ] {
            self.invalidate(kind);
        }
    }

    pub fn is_loaded(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Questions => self.questions.is_loaded(),
            EntityKind::QuestionSets => self.question_sets.is_loaded(),
            EntityKind::TestResults => self.test_results.is_loaded(),
            EntityKind::ApiPresets => self.api_presets.is_loaded(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn row(id: &str) -> QuestionRow {
        QuestionRow {
            id: id.to_string(),
            text: "t".to_string(),
            expected_answer: "a".to_string(),
            category: String::new(),
        }
    }

    #[test]
    fn test_loader_runs_once_until_invalidated() {
        let cache = EntityCache::new();
        let calls = Cell::new(0);
        let load = || {
            calls.set(calls.get() + 1);
            Ok(vec![row("q1")])
        };

        assert_eq!(cache.questions(load).unwrap().len(), 1);
        assert_eq!(cache.questions(load).unwrap().len(), 1);
        assert_eq!(calls.get(), 1);
        assert!(cache.is_loaded(EntityKind::Questions));

        cache.invalidate(EntityKind::QuestionSets);
        assert!(cache.is_loaded(EntityKind::Questions));

        cache.invalidate(EntityKind::Questions);
        assert!(!cache.is_loaded(EntityKind::Questions));
        cache.questions(load).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_failed_load_is_not_cached() {
        let cache = EntityCache::new();
        let err = cache
            .questions(|| Err(DbError::Migration("boom".to_string())))
            .unwrap_err();
        assert!(matches!(err, DbError::Migration(_)));
        assert!(!cache.is_loaded(EntityKind::Questions));

        cache.questions(|| Ok(vec![row("q1")])).unwrap();
        cache.invalidate_all();
        assert!(!cache.is_loaded(EntityKind::Questions));
    }
}
