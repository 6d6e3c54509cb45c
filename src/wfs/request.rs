use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::Url;

use super::FetchOptions;
use crate::catalog::LayerDefinition;

pub(super) const DEFAULT_VERSION: &str = "1.1.0";

/// KVP GetFeature request URL for a layer.
pub(super) fn get_feature_url(layer: &LayerDefinition, opts: &FetchOptions) -> Result<String> {
    let mut url =
        Url::parse(&layer.url).with_context(|| format!("invalid service url: {}", layer.url))?;
    let version = layer.version.as_deref().unwrap_or(DEFAULT_VERSION);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("service", "WFS");
        query.append_pair("request", "GetFeature");
        query.append_pair("version", version);
        // Both spellings go out; servers ignore the one their version lacks.
        query.append_pair("typeName", &layer.feature_type);
        query.append_pair("typeNames", &layer.feature_type);
        query.append_pair("outputFormat", "application/json");
        if let Some(srs) = &opts.srs_name {
            query.append_pair("srsName", srs);
        }
        if let Some(names) = &opts.property_names {
            let joined = names.join(",");
            query.append_pair("propertyName", &joined);
            query.append_pair("propertyNames", &joined);
        }
        if let Some([x1, y1, x2, y2]) = opts.bbox {
            query.append_pair("bbox", &format!("{x1},{y1},{x2},{y2}"));
        }
    }
    Ok(url.into())
}

/// KVP DescribeFeatureType request URL for a service.
pub(super) fn describe_feature_type_url(base: &str, version: Option<&str>) -> Result<String> {
    let mut url = Url::parse(base).with_context(|| format!("invalid service url: {base}"))?;
    url.query_pairs_mut()
        .append_pair("service", "WFS")
        .append_pair("request", "DescribeFeatureType")
        .append_pair("version", version.unwrap_or(DEFAULT_VERSION));
    Ok(url.into())
}

/// Exception text of an OWS exception report, if the body is one.
///
/// GetFeature is asked for JSON, so any XML body counts as a failure.
pub(super) fn exception_text(body: &str) -> Option<String> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('<') {
        return None;
    }
    let mut reader = Reader::from_str(trimmed);
    let mut inside = false;
    let mut detail = String::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"ExceptionText" => inside = true,
            Ok(Event::End(e)) if e.local_name().as_ref() == b"ExceptionText" => inside = false,
            Ok(Event::Text(t)) if inside => {
                if let Ok(text) = t.unescape() {
                    detail.push_str(text.trim());
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }
    if detail.is_empty() {
        Some("unexpected XML response".to_string())
    } else {
        Some(detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn layer() -> LayerDefinition {
        LayerDefinition {
            id: "1694".to_string(),
            name: None,
            url: "https://geodienste.example/HH_WFS_Districts".to_string(),
            feature_type: "de.hh.up:districts".to_string(),
            feature_ns: None,
            typ: "WFS".to_string(),
            version: Some("2.0.0".to_string()),
        }
    }

    fn query_map(url: &str) -> HashMap<String, String> {
        Url::parse(url)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn get_feature_url_carries_all_parameters() {
        let opts = FetchOptions {
            bbox: Some([1.0, 2.0, 3.0, 4.0]),
            srs_name: Some("EPSG:25832".to_string()),
            property_names: Some(vec!["a".to_string(), "b".to_string()]),
        };
        let url = get_feature_url(&layer(), &opts).unwrap();
        let query = query_map(&url);

        assert_eq!(query.get("service").map(String::as_str), Some("WFS"));
        assert_eq!(query.get("request").map(String::as_str), Some("GetFeature"));
        assert_eq!(query.get("version").map(String::as_str), Some("2.0.0"));
        assert_eq!(query.get("typeName").map(String::as_str), Some("de.hh.up:districts"));
        assert_eq!(query.get("typeNames").map(String::as_str), Some("de.hh.up:districts"));
        assert_eq!(query.get("outputFormat").map(String::as_str), Some("application/json"));
        assert_eq!(query.get("srsName").map(String::as_str), Some("EPSG:25832"));
        assert_eq!(query.get("propertyName").map(String::as_str), Some("a,b"));
        assert_eq!(query.get("bbox").map(String::as_str), Some("1,2,3,4"));
    }

    #[test]
    fn optional_parameters_stay_out() {
        let url = get_feature_url(&layer(), &FetchOptions::default()).unwrap();
        let query = query_map(&url);

        assert!(!query.contains_key("bbox"));
        assert!(!query.contains_key("srsName"));
        assert!(!query.contains_key("propertyName"));
    }

    #[test]
    fn describe_url_defaults_the_version() {
        let url = describe_feature_type_url("https://geodienste.example/HH_WFS_Districts", None)
            .unwrap();
        let query = query_map(&url);

        assert_eq!(query.get("request").map(String::as_str), Some("DescribeFeatureType"));
        assert_eq!(query.get("version").map(String::as_str), Some(DEFAULT_VERSION));
    }

    #[test]
    fn exception_reports_are_recognized() {
        let body = r#"<?xml version="1.0"?>
            <ows:ExceptionReport xmlns:ows="http://www.opengis.net/ows/1.1">
              <ows:Exception exceptionCode="InvalidParameterValue">
                <ows:ExceptionText>Unknown type name</ows:ExceptionText>
              </ows:Exception>
            </ows:ExceptionReport>"#;
        assert_eq!(exception_text(body).as_deref(), Some("Unknown type name"));
        assert!(exception_text(r#"{"type":"FeatureCollection","features":[]}"#).is_none());
    }
}
