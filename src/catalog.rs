use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

/// One entry of the remote services registry.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(rename = "featureType", default)]
    pub feature_type: String,
    #[serde(rename = "featureNS", default)]
    pub feature_ns: Option<String>,
    #[serde(default)]
    pub typ: String,
    #[serde(default)]
    pub version: Option<String>,
}

impl LayerDefinition {
    #[inline]
    pub fn is_wfs(&self) -> bool {
        self.typ == "WFS"
    }
}

/// Registry of known layers, usually fetched from a services JSON endpoint.
#[derive(Debug, Clone, Default)]
pub struct LayerCatalog {
    layers: Vec<LayerDefinition>,
    index: HashMap<String, usize>,
}

impl LayerCatalog {
    pub fn from_definitions(layers: Vec<LayerDefinition>) -> Self {
        let index = layers.iter().enumerate().map(|(i, l)| (l.id.clone(), i)).collect();
        Self { layers, index }
    }

    /// Fetch the registry from a services JSON endpoint.
    pub async fn fetch(http: &reqwest::Client, url: &str) -> Result<Self> {
        let layers: Vec<LayerDefinition> = http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned error status"))?
            .json()
            .await
            .context("parse services registry")?;
        debug!(count = layers.len(), "loaded layer registry");
        Ok(Self::from_definitions(layers))
    }

    /// Replace the registry contents from the endpoint.
    pub async fn refresh(&mut self, http: &reqwest::Client, url: &str) -> Result<()> {
        *self = Self::fetch(http, url).await?;
        Ok(())
    }

    #[inline]
    pub fn by_id(&self, id: &str) -> Option<&LayerDefinition> {
        self.index.get(id).map(|&i| &self.layers[i])
    }

    /// First layer matching both the service URL and the feature type.
    pub fn find(&self, url: &str, feature_type: &str) -> Option<&LayerDefinition> {
        self.layers.iter().find(|l| l.url == url && l.feature_type == feature_type)
    }

    /// First layer hosted at the service URL.
    pub fn find_by_url(&self, url: &str) -> Option<&LayerDefinition> {
        self.layers.iter().find(|l| l.url == url)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(id: &str, url: &str, feature_type: &str) -> LayerDefinition {
        LayerDefinition {
            id: id.to_string(),
            name: None,
            url: url.to_string(),
            feature_type: feature_type.to_string(),
            feature_ns: None,
            typ: "WFS".to_string(),
            version: Some("1.1.0".to_string()),
        }
    }

    #[test]
    fn lookups_by_id_and_url() {
        let catalog = LayerCatalog::from_definitions(vec![
            definition("1694", "https://example.test/a", "app:districts"),
            definition("8712", "https://example.test/b", "app:schools"),
        ]);

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.by_id("8712").map(|l| l.feature_type.as_str()), Some("app:schools"));
        assert!(catalog.by_id("nope").is_none());
        assert!(catalog.find("https://example.test/a", "app:districts").is_some());
        assert!(catalog.find("https://example.test/a", "app:schools").is_none());
        assert_eq!(catalog.find_by_url("https://example.test/b").map(|l| l.id.as_str()), Some("8712"));
    }

    #[test]
    fn registry_entries_tolerate_sparse_json() {
        let raw = r#"[
            {"id": "1", "url": "https://example.test/wfs", "featureType": "ns:t", "typ": "WFS"},
            {"id": "2", "name": "background", "typ": "WMS", "extra": {"ignored": true}}
        ]"#;
        let layers: Vec<LayerDefinition> = serde_json::from_str(raw).unwrap();
        let catalog = LayerCatalog::from_definitions(layers);

        assert!(catalog.by_id("1").map(LayerDefinition::is_wfs).unwrap_or(false));
        assert!(!catalog.by_id("2").map(LayerDefinition::is_wfs).unwrap_or(true));
    }
}
