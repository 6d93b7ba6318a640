use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// `"Prismatic Evolutions!"` -> `"prismatic_evolutions"`.
pub fn symbol_key(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Local set-symbol images, indexed by normalized file stem.
#[derive(Clone, Debug, Default)]
pub struct SymbolAssets {
    by_key: BTreeMap<String, PathBuf>,
}

impl SymbolAssets {
    /// Index every `.png` directly inside `dir`.
    pub fn scan(dir: &Path) -> std::io::Result<Self> {
        let mut by_key = BTreeMap::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_png = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("png"));
            if !is_png {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                by_key.insert(symbol_key(stem), path.clone());
            }
        }
        log::debug!("symbols: {} assets in {}", by_key.len(), dir.display());
        Ok(Self { by_key })
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Path> {
        self.by_key.get(&symbol_key(name)).map(PathBuf::as_path)
    }

    /// Match by set name first, then by code.
    pub fn find(&self, set_name: Option<&str>, code: Option<&str>) -> Option<&Path> {
        set_name
            .and_then(|n| self.get(n))
            .or_else(|| code.and_then(|c| self.get(c)))
    }
}
