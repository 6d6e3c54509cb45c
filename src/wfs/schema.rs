use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// One named complex type with the element declarations found inside it.
#[derive(Clone, Debug, Default)]
pub struct TypeDescription {
    pub name: String,
    pub properties: Vec<PropertyDecl>,
}

/// A single element declaration: its name and its declared type.
#[derive(Clone, Debug)]
pub struct PropertyDecl {
    pub name: String,
    pub type_name: String,
}

/// Parsed DescribeFeatureType response.
///
/// Servers wrap the element sequence differently (inside a
/// `complexContent`/`extension` or directly under the type) and pick
/// their own namespace prefix, so tags are matched by local name only.
#[derive(Clone, Debug, Default)]
pub struct TypeSchema {
    types: Vec<TypeDescription>,
    elements: Vec<(String, String)>,
}

impl TypeSchema {
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut schema = TypeSchema::default();
        let mut current: Option<TypeDescription> = None;
        loop {
            match reader.read_event().context("malformed schema document")? {
                Event::Start(e) if e.local_name().as_ref() == b"complexType" => {
                    current = Some(TypeDescription {
                        name: attribute(&e, "name").unwrap_or_default(),
                        properties: Vec::new(),
                    });
                }
                Event::End(e) if e.local_name().as_ref() == b"complexType" => {
                    if let Some(done) = current.take() {
                        schema.types.push(done);
                    }
                }
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"element" => {
                    let name = attribute(&e, "name").unwrap_or_default();
                    let type_name = attribute(&e, "type").unwrap_or_default();
                    match &mut current {
                        Some(inside) => inside.properties.push(PropertyDecl { name, type_name }),
                        None => schema.elements.push((name, type_name)),
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(schema)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Non-geometry property names of a feature type.
    ///
    /// The type is found by its local name, by the `<name>Type`
    /// convention, or through a top-level element declaration that
    /// points at it. Without a name the first type wins.
    pub fn property_names(&self, feature_type: Option<&str>) -> Vec<String> {
        let description = match feature_type {
            Some(full) => {
                let local = local_name(full);
                self.lookup(local)
                    .or_else(|| self.lookup(&format!("{local}Type")))
                    .or_else(|| {
                        self.elements
                            .iter()
                            .find(|(name, _)| name == local)
                            .and_then(|(_, target)| self.lookup(local_name(target)))
                    })
            }
            None => self.types.first(),
        };
        let Some(description) = description else {
            return Vec::new();
        };
        description
            .properties
            .iter()
            .filter(|decl| !decl.type_name.contains("gml:"))
            .map(|decl| decl.name.clone())
            .collect()
    }

    fn lookup(&self, name: &str) -> Option<&TypeDescription> {
        self.types.iter().find(|t| t.name == name)
    }
}

fn attribute(start: &BytesStart, key: &str) -> Option<String> {
    start
        .try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|attr| attr.unescape_value().ok())
        .map(|value| value.into_owned())
}

fn local_name(qualified: &str) -> &str {
    match qualified.rsplit_once(':') {
        Some((_, local)) => local,
        None => qualified,
    }
}
