//! The Default Registry: the set of catalog sources this operator owns.
//!
//! Definitions are loaded once at process start from YAML manifests and are
//! immutable afterwards. Everything downstream (filters, reconcilers, hub
//! policy derivation) keys off registry membership.

use std::collections::BTreeMap;
use std::path::Path;

use kube::ResourceExt;
use tracing::debug;

use bazaar_common::crd::CatalogSource;
use bazaar_common::{Error, Result};

/// Immutable mapping from catalog source name to its canonical definition.
#[derive(Debug, Default)]
pub struct DefaultRegistry {
    definitions: BTreeMap<String, CatalogSource>,
}

impl DefaultRegistry {
    /// A registry owning no catalog sources.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from parsed definitions, validating names.
    pub fn from_definitions(definitions: Vec<CatalogSource>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for definition in definitions {
            let name = definition.name_any();
            if name.is_empty() {
                return Err(Error::config("default catalog source has no name"));
            }
            definition
                .spec
                .validate()
                .map_err(|msg| Error::config(format!("default catalog source {name}: {msg}")))?;
            if map.insert(name.clone(), definition).is_some() {
                return Err(Error::config(format!(
                    "duplicate default catalog source: {name}"
                )));
            }
        }
        Ok(Self { definitions: map })
    }

    /// Load definitions from every `.yaml`/`.yml` file in a directory.
    ///
    /// Files are read in name order so load failures are deterministic.
    /// Other file types are skipped.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| Error::config_at(dir.display().to_string(), e.to_string()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("yaml" | "yml")
                )
            })
            .collect();
        paths.sort();

        let mut definitions = Vec::new();
        for path in paths {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| Error::config_at(path.display().to_string(), e.to_string()))?;
            let definition: CatalogSource = serde_yaml::from_str(&raw).map_err(|e| {
                Error::config_at(path.display().to_string(), format!("not a CatalogSource: {e}"))
            })?;
            debug!(path = %path.display(), source = %definition.name_any(), "loaded default definition");
            definitions.push(definition);
        }
        Self::from_definitions(definitions)
    }

    /// Whether a name is one of our defaults.
    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// The canonical definition for a name.
    pub fn get(&self, name: &str) -> Option<&CatalogSource> {
        self.definitions.get(name)
    }

    /// All default names, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether the registry owns anything at all.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_common::crd::{CatalogSourceSpec, SourceType};

    fn definition(name: &str, image: &str) -> CatalogSource {
        CatalogSource::new(
            name,
            CatalogSourceSpec {
                source_type: SourceType::Grpc,
                image: Some(image.to_string()),
                address: None,
                display_name: Some(name.to_string()),
                publisher: Some("Bazaar".to_string()),
                description: None,
                priority: 0,
            },
        )
    }

    fn manifest(name: &str, image: &str) -> String {
        format!(
            r#"apiVersion: bazaar.dev/v1alpha1
kind: CatalogSource
metadata:
  name: {name}
spec:
  sourceType: grpc
  image: {image}
"#
        )
    }

    #[test]
    fn test_from_definitions() {
        let registry = DefaultRegistry::from_definitions(vec![
            definition("community", "quay.io/bazaar/community:latest"),
            definition("certified", "quay.io/bazaar/certified:latest"),
        ])
        .expect("build registry");

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("community"));
        assert!(!registry.contains("partner"));
        // BTreeMap keys iterate sorted
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["certified", "community"]
        );
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = DefaultRegistry::from_definitions(vec![
            definition("community", "quay.io/bazaar/community:v1"),
            definition("community", "quay.io/bazaar/community:v2"),
        ])
        .expect_err("duplicates must fail");
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_invalid_spec_rejected() {
        let mut bad = definition("community", "unused");
        bad.spec.image = None;
        let err = DefaultRegistry::from_definitions(vec![bad]).expect_err("invalid spec");
        assert!(err.to_string().contains("community"));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join("community.yaml"),
            manifest("community", "quay.io/bazaar/community:latest"),
        )
        .expect("write");
        std::fs::write(
            dir.path().join("certified.yml"),
            manifest("certified", "quay.io/bazaar/certified:latest"),
        )
        .expect("write");
        std::fs::write(dir.path().join("README.md"), "not a manifest").expect("write");

        let registry = DefaultRegistry::load_dir(dir.path()).expect("load");
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("community"));
        assert!(registry.contains("certified"));
    }

    #[test]
    fn test_load_dir_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("broken.yaml"), "{ not yaml").expect("write");
        assert!(DefaultRegistry::load_dir(dir.path()).is_err());
    }

    #[test]
    fn test_load_missing_dir_is_config_error() {
        let err = DefaultRegistry::load_dir(Path::new("/nonexistent/defaults"))
            .expect_err("missing dir");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_empty_registry() {
        let registry = DefaultRegistry::empty();
        assert!(registry.is_empty());
        assert_eq!(registry.names().count(), 0);
    }
}
