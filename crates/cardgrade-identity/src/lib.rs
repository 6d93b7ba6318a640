//! Card and set identity for the grading pipeline.
//!
//! Identity is enrichment: every path through [`MetadataResolver::resolve`]
//! returns a (possibly empty) [`CardIdentity`] instead of an error.
//!
//! Resolution order:
//! 1. trusted set code / collector number supplied by the caller;
//! 2. OCR of the bottom (set code, number) and top (name) strips;
//! 3. canonical code via the static table in [`codes`];
//! 4. cache-first lookups through [`MetadataCache`], remote on miss;
//! 5. when no card name was read, feature matching against a directory of
//!    reference images ([`ReferenceMatcher`]).

pub mod codes;
mod cache;
mod database;
mod error;
mod ocr;
mod reference;
mod resolver;
mod store;
mod symbols;

pub use cache::{card_key, MetadataCache};
pub use codes::{canonical_set_code, normalize_code, SetCodeEntry};
pub use database::{
    CardDatabase, CardImages, CardRecord, PokemonTcgClient, SetImages, SetRecord,
    StaticCardDatabase, DEFAULT_CARD_DB_URL,
};
pub use error::{CacheError, IdentityError};
pub use ocr::{normalize_strip_text, parse_bottom_text, BottomStripText, StripOcr, BOTTOM_STRIP, TOP_STRIP};
pub use reference::{ReferenceMatch, ReferenceMatcher, ReferenceParams};
pub use resolver::{lookup_number, CardIdentity, IdentityHints, IdentitySource, MetadataResolver};
pub use store::{JsonFileStore, MemoryStore, RecordStore};
pub use symbols::{symbol_key, SymbolAssets};
