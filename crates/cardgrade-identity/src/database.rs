//! Upstream card database seam and the pokemontcg.io client.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::IdentityError;

pub const DEFAULT_CARD_DB_URL: &str = "https://api.pokemontcg.io";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetImages {
    pub symbol: String,
    pub logo: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SetRecord {
    pub id: String,
    pub name: String,
    pub series: String,
    pub release_date: String,
    pub ptcgo_code: String,
    pub images: SetImages,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardImages {
    pub small: String,
    pub large: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CardRecord {
    pub id: String,
    pub name: String,
    pub number: String,
    pub rarity: String,
    pub subtypes: Vec<String>,
    pub supertype: String,
    pub types: Vec<String>,
    pub regulation_mark: String,
    pub images: CardImages,
}

/// Remote set / card lookups. Implementations block.
pub trait CardDatabase: Send + Sync {
    fn set_by_code(&self, code: &str) -> Result<Option<SetRecord>, IdentityError>;
    fn card_by_number(&self, set_id: &str, number: &str) -> Result<Option<CardRecord>, IdentityError>;
    fn card_by_name(&self, set_id: &str, name: &str) -> Result<Option<CardRecord>, IdentityError>;
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

/// Client for the pokemontcg.io v2 REST API.
pub struct PokemonTcgClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl PokemonTcgClient {
    pub fn new(base_url: &str, api_key: Option<&str>, timeout_secs: u64) -> Result<Self, IdentityError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            client,
            timeout_secs,
        })
    }

    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    fn first<T: for<'de> Deserialize<'de>>(&self, path: &str, q: &str) -> Result<Option<T>, IdentityError> {
        let url = format!("{}{path}", self.base_url);
        let mut req = self
            .client
            .get(&url)
            .query(&[("q", q), ("pageSize", "1")]);
        if let Some(key) = &self.api_key {
            req = req.header("X-Api-Key", key);
        }
        let response = req.send().map_err(|e| {
            if e.is_timeout() {
                IdentityError::Timeout(self.timeout_secs)
            } else {
                IdentityError::Http(e)
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(IdentityError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let page: Page<T> = response.json()?;
        Ok(page.data.into_iter().next())
    }
}

impl CardDatabase for PokemonTcgClient {
    fn set_by_code(&self, code: &str) -> Result<Option<SetRecord>, IdentityError> {
        self.first("/v2/sets", &format!("ptcgoCode:{code}"))
    }

    fn card_by_number(&self, set_id: &str, number: &str) -> Result<Option<CardRecord>, IdentityError> {
        self.first("/v2/cards", &format!("set.id:{set_id} number:{number}"))
    }

    fn card_by_name(&self, set_id: &str, name: &str) -> Result<Option<CardRecord>, IdentityError> {
        self.first("/v2/cards", &format!("set.id:{set_id} name:\"{name}\""))
    }
}

/// Fixed in-memory database that counts lookups; for tests and offline use.
#[derive(Default)]
pub struct StaticCardDatabase {
    sets: BTreeMap<String, SetRecord>,
    cards: Vec<(String, CardRecord)>,
    lookups: AtomicUsize,
}

impl StaticCardDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_set(mut self, set: SetRecord) -> Self {
        self.sets.insert(set.ptcgo_code.to_ascii_uppercase(), set);
        self
    }

    pub fn with_card(mut self, set_id: &str, card: CardRecord) -> Self {
        self.cards.push((set_id.to_string(), card));
        self
    }

    /// Remote calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl CardDatabase for StaticCardDatabase {
    fn set_by_code(&self, code: &str) -> Result<Option<SetRecord>, IdentityError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.sets.get(&code.to_ascii_uppercase()).cloned())
    }

    fn card_by_number(&self, set_id: &str, number: &str) -> Result<Option<CardRecord>, IdentityError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .cards
            .iter()
            .find(|(s, c)| s == set_id && c.number.eq_ignore_ascii_case(number))
            .map(|(_, c)| c.clone()))
    }

    fn card_by_name(&self, set_id: &str, name: &str) -> Result<Option<CardRecord>, IdentityError> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .cards
            .iter()
            .find(|(s, c)| s == set_id && c.name.eq_ignore_ascii_case(name))
            .map(|(_, c)| c.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_record_reads_api_shape() {
        let raw = r#"{"data":[{"id":"sv1","name":"Scarlet & Violet","series":"Scarlet & Violet",
            "ptcgoCode":"SVI","releaseDate":"2023/03/31",
            "images":{"symbol":"https://images.example/sv1/symbol.png","logo":"https://images.example/sv1/logo.png"},
            "total":258}]}"#;
        let page: Page<SetRecord> = serde_json::from_str(raw).unwrap();
        let set = &page.data[0];
        assert_eq!(set.id, "sv1");
        assert_eq!(set.ptcgo_code, "SVI");
        assert_eq!(set.release_date, "2023/03/31");
        assert!(set.images.symbol.ends_with("symbol.png"));
    }

    #[test]
    fn card_record_tolerates_missing_fields() {
        let card: CardRecord = serde_json::from_str(r#"{"id":"sv1-25","name":"Pikachu"}"#).unwrap();
        assert_eq!(card.name, "Pikachu");
        assert!(card.subtypes.is_empty());
        assert_eq!(card.regulation_mark, "");
    }

    #[test]
    fn empty_page_is_none() {
        let page: Page<SetRecord> = serde_json::from_str(r#"{"count":0}"#).unwrap();
        assert!(page.data.is_empty());
    }

    #[test]
    fn client_normalizes_key_and_url() {
        let c = PokemonTcgClient::new("https://api.example.com/", Some("  "), 5).unwrap();
        assert_eq!(c.base_url, "https://api.example.com");
        assert!(c.api_key.is_none());
    }

    #[test]
    fn static_database_counts_every_call() {
        let db = StaticCardDatabase::new().with_set(SetRecord {
            id: "sv1".into(),
            ptcgo_code: "SVI".into(),
            ..SetRecord::default()
        });
        assert!(db.set_by_code("svi").unwrap().is_some());
        assert!(db.card_by_number("sv1", "1").unwrap().is_none());
        assert_eq!(db.lookups(), 2);
    }
}
