use std::path::Path;
use std::sync::Arc;

use crate::database::{CardDatabase, CardRecord, SetRecord};
use crate::store::{JsonFileStore, MemoryStore, RecordStore};

/// Cache-first set and card lookups in front of an optional remote database.
///
/// Constructed once per process and shared; every failure degrades to `None`.
#[derive(Clone)]
pub struct MetadataCache {
    sets: Arc<dyn RecordStore<SetRecord>>,
    cards: Arc<dyn RecordStore<CardRecord>>,
    remote: Option<Arc<dyn CardDatabase>>,
}

/// Key of a card record: `"{set_id}::{number_or_name lowercased}"`.
pub fn card_key(set_id: &str, number_or_name: &str) -> String {
    format!("{set_id}::{}", number_or_name.trim().to_lowercase())
}

impl MetadataCache {
    pub fn new(
        sets: Arc<dyn RecordStore<SetRecord>>,
        cards: Arc<dyn RecordStore<CardRecord>>,
        remote: Option<Arc<dyn CardDatabase>>,
    ) -> Self {
        Self { sets, cards, remote }
    }

    /// `sets.json` / `cards.json` under `dir`.
    pub fn open(dir: &Path, remote: Option<Arc<dyn CardDatabase>>) -> Self {
        Self::new(
            Arc::new(JsonFileStore::open(dir.join("sets.json"))),
            Arc::new(JsonFileStore::open(dir.join("cards.json"))),
            remote,
        )
    }

    pub fn in_memory(remote: Option<Arc<dyn CardDatabase>>) -> Self {
        Self::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryStore::new()),
            remote,
        )
    }

    pub fn set_store(&self) -> &dyn RecordStore<SetRecord> {
        self.sets.as_ref()
    }

    pub fn card_store(&self) -> &dyn RecordStore<CardRecord> {
        self.cards.as_ref()
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Look a set up by its (PTCGO-style) code.
    pub fn set_by_code(&self, code: &str) -> Option<SetRecord> {
        let key = code.trim().to_uppercase();
        if key.is_empty() {
            return None;
        }
        if let Some(hit) = self.sets.get(&key) {
            log::debug!("cache: set {key} served locally");
            return Some(hit);
        }
        let remote = self.remote.as_ref()?;
        match remote.set_by_code(&key) {
            Ok(Some(set)) => {
                if let Err(e) = self.sets.put(&key, set.clone()) {
                    log::warn!("cache: failed to persist set {key}: {e}");
                }
                Some(set)
            }
            Ok(None) => {
                log::info!("cache: no upstream set for code {key}");
                None
            }
            Err(e) => {
                log::warn!("cache: set lookup for {key} failed: {e}");
                None
            }
        }
    }

    /// Look a card up inside a set, by collector number first and name second.
    pub fn card_in_set(&self, set_id: &str, number_or_name: &str) -> Option<CardRecord> {
        let query = number_or_name.trim();
        if set_id.is_empty() || query.is_empty() {
            return None;
        }
        let key = card_key(set_id, query);
        if let Some(hit) = self.cards.get(&key) {
            return Some(hit);
        }
        let remote = self.remote.as_ref()?;
        let found = remote
            .card_by_number(set_id, query)
            .and_then(|hit| match hit {
                Some(card) => Ok(Some(card)),
                None => remote.card_by_name(set_id, query),
            });
        match found {
            Ok(Some(card)) => {
                if let Err(e) = self.cards.put(&key, card.clone()) {
                    log::warn!("cache: failed to persist card {key}: {e}");
                }
                Some(card)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!("cache: card lookup for {key} failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::StaticCardDatabase;

    fn svi() -> SetRecord {
        SetRecord {
            id: "sv1".into(),
            name: "Scarlet & Violet".into(),
            ptcgo_code: "SVI".into(),
            ..SetRecord::default()
        }
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let db = Arc::new(StaticCardDatabase::new().with_set(svi()));
        let cache = MetadataCache::in_memory(Some(db.clone()));
        let first = cache.set_by_code("SVI").unwrap();
        let second = cache.set_by_code("svi").unwrap();
        assert_eq!(first, second);
        assert_eq!(db.lookups(), 1);
        assert_eq!(cache.set_store().writes(), 1);
    }

    #[test]
    fn card_lookup_falls_back_to_name() {
        let card = CardRecord {
            id: "sv1-25".into(),
            name: "Pikachu".into(),
            number: "25".into(),
            ..CardRecord::default()
        };
        let db = Arc::new(StaticCardDatabase::new().with_card("sv1", card.clone()));
        let cache = MetadataCache::in_memory(Some(db.clone()));
        assert_eq!(cache.card_in_set("sv1", "PIKACHU"), Some(card.clone()));
        assert_eq!(db.lookups(), 2);
        assert_eq!(cache.card_store().get("sv1::pikachu"), Some(card));
        assert!(cache.card_in_set("sv1", "pikachu").is_some());
        assert_eq!(db.lookups(), 2);
    }

    #[test]
    fn misses_without_remote_are_none() {
        let cache = MetadataCache::in_memory(None);
        assert!(cache.set_by_code("SVI").is_none());
        assert!(cache.card_in_set("sv1", "25").is_none());
        assert!(cache.set_by_code("  ").is_none());
    }

    #[test]
    fn on_disk_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(StaticCardDatabase::new().with_set(svi()));
        MetadataCache::open(dir.path(), Some(db.clone())).set_by_code("SVI");
        let reopened = MetadataCache::open(dir.path(), None);
        assert_eq!(reopened.set_by_code("SVI"), Some(svi()));
        assert!(dir.path().join("sets.json").exists());
    }
}
