//! Grammar-feature catalog.
//!
//! The catalog maps human-facing feature names ("Pluralize") to the module
//! and function that implement them in the downstream template runtime. The
//! engine consumes it read-only: selecting features for a token replaces that
//! token's inflection list with descriptors drawn from the catalog, in the
//! order the caller supplies them.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{NlgError, Result};

/// One grammatical transformation to apply to a candidate expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inflection {
    /// Feature name as listed in the catalog.
    #[serde(rename = "fe_name")]
    pub feature: String,
    /// Module the function lives in. The sentinel `"str"` means a
    /// method-style call on the expression itself.
    pub source: String,
    /// Function name to invoke.
    pub func_name: String,
}

impl Inflection {
    /// Build an inflection descriptor.
    pub fn new(
        feature: impl Into<String>,
        source: impl Into<String>,
        func_name: impl Into<String>,
    ) -> Self {
        Self {
            feature: feature.into(),
            source: source.into(),
            func_name: func_name.into(),
        }
    }
}

/// Where a catalog entry's function lives.
#[derive(Clone, Debug, PartialEq, Eq)]
struct CatalogEntry {
    source: String,
    func_name: String,
}

/// Read-only mapping from feature name to inflection function.
#[derive(Clone, Debug, Default)]
pub struct GrammarCatalog {
    entries: HashMap<String, CatalogEntry>,
}

/// Feature registrations shipped with the engine, mirroring the grammar
/// helpers the downstream runtime exposes.
static BUILTIN: Lazy<GrammarCatalog> = Lazy::new(|| {
    GrammarCatalog::from_entries([
        ("Singularize", "G", "singular"),
        ("Pluralize", "G", "plural"),
        ("Capitalize", "str", "capitalize"),
        ("Lowercase", "str", "lower"),
        ("Uppercase", "str", "upper"),
        ("Swapcase", "str", "swapcase"),
        ("Title", "str", "title"),
    ])
});

impl GrammarCatalog {
    /// Build a catalog from `(feature, source, func_name)` triples.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(|(feature, source, func_name)| {
                (
                    feature.into(),
                    CatalogEntry {
                        source: source.into(),
                        func_name: func_name.into(),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// The built-in feature set.
    pub fn builtin() -> &'static GrammarCatalog {
        &BUILTIN
    }

    /// Check whether a feature is registered.
    pub fn contains(&self, feature: &str) -> bool {
        self.entries.contains_key(feature)
    }

    /// Number of registered features.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Feature names in no particular order.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    /// Resolve a feature selection into inflection descriptors.
    ///
    /// Order is preserved: the returned list chains in exactly the order the
    /// caller supplied. Fails on the first unknown feature.
    pub fn resolve<S: AsRef<str>>(&self, features: &[S]) -> Result<Vec<Inflection>> {
        features
            .iter()
            .map(|feature| {
                let feature = feature.as_ref();
                let entry = self.entries.get(feature).ok_or_else(|| {
                    NlgError::UnknownGrammarFeature {
                        feature: feature.to_string(),
                    }
                })?;
                Ok(Inflection::new(
                    feature,
                    entry.source.clone(),
                    entry.func_name.clone(),
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_preserves_order() {
        let catalog = GrammarCatalog::builtin();
        let inflections = catalog.resolve(&["Pluralize", "Lowercase"]).unwrap();
        assert_eq!(inflections.len(), 2);
        assert_eq!(inflections[0].feature, "Pluralize");
        assert_eq!(inflections[0].source, "G");
        assert_eq!(inflections[1].feature, "Lowercase");
        assert_eq!(inflections[1].source, "str");
    }

    #[test]
    fn test_resolve_unknown_feature() {
        let catalog = GrammarCatalog::builtin();
        let err = catalog.resolve(&["Gerundify"]).unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_GRAMMAR_FEATURE");
    }

    #[test]
    fn test_custom_catalog() {
        let catalog = GrammarCatalog::from_entries([("Shout", "str", "upper")]);
        assert!(catalog.contains("Shout"));
        assert!(!catalog.contains("Pluralize"));
        let inflections = catalog.resolve(&["Shout"]).unwrap();
        assert_eq!(inflections[0].func_name, "upper");
    }
}
