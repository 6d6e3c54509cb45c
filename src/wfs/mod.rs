mod geojson;
mod request;
mod schema;

pub use schema::TypeSchema;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::catalog::LayerDefinition;
use crate::feature::Feature;
use crate::geom::ProjectionSet;

/// Options for a GetFeature request.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub bbox: Option<[f64; 4]>,
    pub srs_name: Option<String>,
    pub property_names: Option<Vec<String>>,
}

/// Remote feature source.
///
/// `fetch_features` never fails past this boundary: transport, protocol and
/// decoding problems all come back as `None`.
#[async_trait]
pub trait FeatureService: Send + Sync {
    async fn fetch_features(
        &self,
        layer: &LayerDefinition,
        opts: &FetchOptions,
    ) -> Option<Vec<Feature>>;

    async fn describe_feature_type(&self, url: &str, version: Option<&str>)
        -> Result<TypeSchema>;
}

/// WFS client speaking GetFeature / DescribeFeatureType over KVP GET.
pub struct WfsClient {
    http: reqwest::Client,
    projections: ProjectionSet,
}

impl WfsClient {
    pub fn new(http: reqwest::Client, projections: ProjectionSet) -> Self {
        Self { http, projections }
    }

    /// Client with the default transport settings.
    pub fn with_defaults(projections: ProjectionSet) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("geoscreen/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("build http client")?;
        Ok(Self { http, projections })
    }

    #[inline]
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?
            .error_for_status()
            .with_context(|| format!("GET {url} returned error status"))?;
        response.text().await.context("read response body")
    }
}

#[async_trait]
impl FeatureService for WfsClient {
    async fn fetch_features(
        &self,
        layer: &LayerDefinition,
        opts: &FetchOptions,
    ) -> Option<Vec<Feature>> {
        if !layer.is_wfs() {
            warn!(id = %layer.id, typ = %layer.typ, "layer is not served over WFS");
            return None;
        }
        let url = match request::get_feature_url(layer, opts) {
            Ok(url) => url,
            Err(err) => {
                warn!(id = %layer.id, error = %err, "invalid feature request");
                return None;
            }
        };
        debug!(id = %layer.id, %url, "GetFeature");

        let body = match self.get_text(&url).await {
            Ok(body) => body,
            Err(err) => {
                warn!(id = %layer.id, error = %err, "feature request failed");
                return None;
            }
        };
        if let Some(detail) = request::exception_text(&body) {
            warn!(id = %layer.id, detail = %detail, "service returned an exception report");
            return None;
        }

        let (mut features, answered_crs) = match geojson::parse_collection(&body) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(id = %layer.id, error = %err, "failed to decode feature collection");
                return None;
            }
        };

        // Some services ignore srsName; bring the answer into the requested CRS.
        if let (Some(requested), Some(answered)) = (opts.srs_name.as_deref(), answered_crs) {
            let requested = geojson::normalize_crs(requested);
            if answered != requested
                && self.projections.contains(&answered)
                && self.projections.contains(&requested)
            {
                debug!(id = %layer.id, from = %answered, to = %requested, "reprojecting response");
                for feature in &mut features {
                    if let Some(geom) = feature.geometry.take() {
                        match self.projections.reproject(&geom, &answered, &requested) {
                            Ok(mapped) => feature.geometry = Some(mapped),
                            Err(err) => {
                                warn!(id = %layer.id, error = %err, "reprojection failed");
                                feature.geometry = Some(geom);
                            }
                        }
                    }
                }
            }
        }

        Some(features)
    }

    async fn describe_feature_type(
        &self,
        url: &str,
        version: Option<&str>,
    ) -> Result<TypeSchema> {
        let request_url = request::describe_feature_type_url(url, version)?;
        debug!(url = %request_url, "DescribeFeatureType");
        let body = self.get_text(&request_url).await?;
        TypeSchema::parse(&body)
    }
}
