//! Resource names
//!
//! Resource names are slash-delimited paths built from fixed templates such
//! as `projects/{project}/locations/{location}`. [`PathTemplate`] renders and
//! matches any such template; [`LocationName`], [`RegistryName`] and
//! [`DeviceName`] are typed wrappers over the three templates the device
//! manager uses.
//!
//! Rendering does no escaping: identifiers are expected to be path-safe.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

pub const LOCATION_TEMPLATE: &str = "projects/{project}/locations/{location}";
pub const REGISTRY_TEMPLATE: &str = "projects/{project}/locations/{location}/registries/{registry}";
pub const DEVICE_TEMPLATE: &str =
    "projects/{project}/locations/{location}/registries/{registry}/devices/{device}";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path '{path}' does not match template '{template}'")]
    NoMatch { path: String, template: String },
    #[error("invalid path template '{0}'")]
    InvalidTemplate(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed path template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PathTemplate {
    pub fn new(template: &str) -> Result<Self, PathError> {
        let invalid = || PathError::InvalidTemplate(template.to_string());

        if template.is_empty() {
            return Err(invalid());
        }

        let mut seen = Vec::new();
        let segments = template
            .split('/')
            .map(|segment| {
                if let Some(name) = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                    if name.is_empty() || seen.contains(&name) {
                        return Err(invalid());
                    }
                    seen.push(name);
                    Ok(Segment::Variable(name.to_string()))
                } else if segment.is_empty() || segment.contains(['{', '}']) {
                    Err(invalid())
                } else {
                    Ok(Segment::Literal(segment.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Variable names in template order
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Variable(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Render with the given bindings.
    ///
    /// An unbound variable is left in the output as `{name}`.
    pub fn render(&self, bindings: &[(&str, &str)]) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(literal) => literal.clone(),
                Segment::Variable(name) => bindings
                    .iter()
                    .find(|(key, _)| *key == name.as_str())
                    .map(|(_, value)| value.to_string())
                    .unwrap_or_else(|| format!("{{{}}}", name)),
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Match a path against the template, returning the variable bindings
    pub fn matches(&self, path: &str) -> Result<HashMap<String, String>, PathError> {
        let no_match = || PathError::NoMatch {
            path: path.to_string(),
            template: self.source.clone(),
        };

        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return Err(no_match());
        }

        let mut bindings = HashMap::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Variable(name) if !part.is_empty() => {
                    bindings.insert(name.clone(), part.to_string());
                }
                _ => return Err(no_match()),
            }
        }

        Ok(bindings)
    }
}

fn builtin(cell: &'static OnceLock<PathTemplate>, template: &'static str) -> &'static PathTemplate {
    cell.get_or_init(|| match PathTemplate::new(template) {
        Ok(parsed) => parsed,
        Err(e) => unreachable!("built-in template is valid: {}", e),
    })
}

pub fn location_template() -> &'static PathTemplate {
    static TEMPLATE: OnceLock<PathTemplate> = OnceLock::new();
    builtin(&TEMPLATE, LOCATION_TEMPLATE)
}

pub fn registry_template() -> &'static PathTemplate {
    static TEMPLATE: OnceLock<PathTemplate> = OnceLock::new();
    builtin(&TEMPLATE, REGISTRY_TEMPLATE)
}

pub fn device_template() -> &'static PathTemplate {
    static TEMPLATE: OnceLock<PathTemplate> = OnceLock::new();
    builtin(&TEMPLATE, DEVICE_TEMPLATE)
}

fn take(bindings: &mut HashMap<String, String>, key: &str) -> String {
    bindings.remove(key).unwrap_or_default()
}

/// `projects/{project}/locations/{location}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocationName {
    pub project: String,
    pub location: String,
}

impl LocationName {
    pub fn new(project: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
        }
    }

    pub fn parse(path: &str) -> Result<Self, PathError> {
        let mut bindings = location_template().matches(path)?;
        Ok(Self {
            project: take(&mut bindings, "project"),
            location: take(&mut bindings, "location"),
        })
    }

    pub fn registry(&self, registry: impl Into<String>) -> RegistryName {
        RegistryName {
            project: self.project.clone(),
            location: self.location.clone(),
            registry: registry.into(),
        }
    }
}

impl fmt::Display for LocationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&location_template().render(&[
            ("project", self.project.as_str()),
            ("location", self.location.as_str()),
        ]))
    }
}

/// `projects/{project}/locations/{location}/registries/{registry}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryName {
    pub project: String,
    pub location: String,
    pub registry: String,
}

impl RegistryName {
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        registry: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
            registry: registry.into(),
        }
    }

    pub fn parse(path: &str) -> Result<Self, PathError> {
        let mut bindings = registry_template().matches(path)?;
        Ok(Self {
            project: take(&mut bindings, "project"),
            location: take(&mut bindings, "location"),
            registry: take(&mut bindings, "registry"),
        })
    }

    pub fn location(&self) -> LocationName {
        LocationName::new(&self.project, &self.location)
    }

    pub fn device(&self, device: impl Into<String>) -> DeviceName {
        DeviceName {
            project: self.project.clone(),
            location: self.location.clone(),
            registry: self.registry.clone(),
            device: device.into(),
        }
    }
}

impl fmt::Display for RegistryName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&registry_template().render(&[
            ("project", self.project.as_str()),
            ("location", self.location.as_str()),
            ("registry", self.registry.as_str()),
        ]))
    }
}

/// `projects/{project}/locations/{location}/registries/{registry}/devices/{device}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceName {
    pub project: String,
    pub location: String,
    pub registry: String,
    pub device: String,
}

impl DeviceName {
    pub fn new(
        project: impl Into<String>,
        location: impl Into<String>,
        registry: impl Into<String>,
        device: impl Into<String>,
    ) -> Self {
        Self {
            project: project.into(),
            location: location.into(),
            registry: registry.into(),
            device: device.into(),
        }
    }

    pub fn parse(path: &str) -> Result<Self, PathError> {
        let mut bindings = device_template().matches(path)?;
        Ok(Self {
            project: take(&mut bindings, "project"),
            location: take(&mut bindings, "location"),
            registry: take(&mut bindings, "registry"),
            device: take(&mut bindings, "device"),
        })
    }

    pub fn registry(&self) -> RegistryName {
        RegistryName::new(&self.project, &self.location, &self.registry)
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&device_template().render(&[
            ("project", self.project.as_str()),
            ("location", self.location.as_str()),
            ("registry", self.registry.as_str()),
            ("device", self.device.as_str()),
        ]))
    }
}

macro_rules! impl_from_str {
    ($($name:ty),*) => {
        $(
            impl FromStr for $name {
                type Err = PathError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    Self::parse(s)
                }
            }
        )*
    };
}

impl_from_str!(LocationName, RegistryName, DeviceName);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_device() {
        let name = DeviceName::new("p0", "us-central1", "r0", "d0");
        assert_eq!(
            name.to_string(),
            "projects/p0/locations/us-central1/registries/r0/devices/d0"
        );
    }

    #[test]
    fn test_parse_registry() {
        let name: RegistryName = "projects/p0/locations/europe-west1/registries/r0".parse().unwrap();
        assert_eq!(name, RegistryName::new("p0", "europe-west1", "r0"));
        assert_eq!(name.location(), LocationName::new("p0", "europe-west1"));
    }

    #[test]
    fn test_mismatches() {
        assert!(LocationName::parse("projects/p0").is_err());
        assert!(LocationName::parse("projects/p0/locations/l0/registries/r0").is_err());
        assert!(LocationName::parse("project/p0/locations/l0").is_err());
        assert!(LocationName::parse("projects//locations/l0").is_err());
        assert!(DeviceName::parse("projects/p0/locations/l0/registries/r0").is_err());
        assert!(RegistryName::parse("").is_err());
    }

    #[test]
    fn test_unbound_variable_is_left_in_place() {
        let rendered = registry_template().render(&[("project", "p0"), ("location", "l0")]);
        assert_eq!(rendered, "projects/p0/locations/l0/registries/{registry}");
    }

    #[test]
    fn test_invalid_templates() {
        assert!(PathTemplate::new("").is_err());
        assert!(PathTemplate::new("projects//x").is_err());
        assert!(PathTemplate::new("projects/{}").is_err());
        assert!(PathTemplate::new("a/{x}/b/{x}").is_err());
        assert!(PathTemplate::new("a/x{y}").is_err());
    }

    #[test]
    fn test_variables() {
        let names: Vec<_> = device_template().variables().collect();
        assert_eq!(names, vec!["project", "location", "registry", "device"]);
    }

    #[test]
    fn test_navigation() {
        let device = LocationName::new("p", "l").registry("r").device("d");
        assert_eq!(device.registry(), RegistryName::new("p", "l", "r"));
    }
}
