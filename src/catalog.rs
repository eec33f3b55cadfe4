use serde_json::Value;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("catalog must be a JSON object of name to reference url")]
    NotAnObject,
    #[error("catalog entry `{0}` must map to a string")]
    InvalidEntry(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub name: String,
    pub reference: String,
}

/// Display names the user can pick, mapped to the reference the service
/// expects in a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryCatalog {
    entries: Vec<LibraryEntry>,
}

impl LibraryCatalog {
    pub fn builtin() -> Self {
        Self::from_pairs([
            ("Weaviate", "https://weaviate.io/developers/weaviate"),
            (
                "LangChain",
                "https://python.langchain.com/docs/get_started/introduction",
            ),
        ])
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut catalog = Self {
            entries: Vec::new(),
        };
        for (name, reference) in pairs {
            catalog.insert(name.to_string(), reference.to_string());
        }
        catalog
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let value: Value = serde_json::from_str(raw)?;
        let Value::Object(map) = value else {
            return Err(CatalogError::NotAnObject);
        };

        let mut catalog = Self {
            entries: Vec::with_capacity(map.len()),
        };
        for (name, reference) in map {
            let Value::String(reference) = reference else {
                return Err(CatalogError::InvalidEntry(name));
            };
            catalog.insert(name, reference);
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    fn insert(&mut self, name: String, reference: String) {
        match self.entries.iter_mut().find(|entry| entry.name == name) {
            Some(entry) => entry.reference = reference,
            None => self.entries.push(LibraryEntry { name, reference }),
        }
    }

    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.reference.as_str())
    }

    /// Translates selected names into references, in selection order.
    /// Names the catalog does not know are skipped.
    pub fn resolve_selection(&self, selection: &LibrarySelection) -> Vec<String> {
        let mut resolved = Vec::with_capacity(selection.len());
        for name in selection.iter() {
            match self.resolve(name) {
                Some(reference) => resolved.push(reference.to_string()),
                None => tracing::warn!(library = name, "library not in catalog, skipping"),
            }
        }
        resolved
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrarySelection {
    names: Vec<String>,
}

impl LibrarySelection {
    /// Adds `name` if absent, removes it otherwise. Returns whether it is now
    /// selected.
    pub fn toggle(&mut self, name: &str) -> bool {
        if let Some(index) = self.names.iter().position(|selected| selected == name) {
            self.names.remove(index);
            false
        } else {
            self.names.push(name.to_string());
            true
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|selected| selected == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
