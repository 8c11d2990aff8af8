//! Partial source descriptors and partial naming
//!
//! A partials setting is either a single directory, a list of directories and
//! descriptors, or one descriptor. Descriptors can supply templates directly,
//! prefix names with a namespace or rename them entirely.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::types::TemplateMap;
use crate::utils::strip_extname;

const INVALID_PARTIALS_DIR: &str = "A partials dir must be a string or config object";

/// Computes a partial name from `(relative path without extension, namespace)`
pub type RenameFn = Arc<dyn Fn(&str, Option<&str>) -> String + Send + Sync>;

/// Where partials come from
#[derive(Debug, Clone)]
pub enum PartialsDir {
    /// A directory scanned recursively
    Path(PathBuf),
    /// Several sources merged in order; later names overwrite earlier ones
    List(Vec<PartialsDir>),
    Descriptor(PartialDescriptor),
}

/// A partials directory or template set with naming options
#[derive(Clone, Default)]
pub struct PartialDescriptor {
    /// Templates used instead of scanning `dir`
    pub templates: Option<TemplateMap>,
    pub namespace: Option<String>,
    pub dir: Option<PathBuf>,
    pub rename: Option<RenameFn>,
}

impl PartialDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn with_templates(mut self, templates: TemplateMap) -> Self {
        self.templates = Some(templates);
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_rename<F>(mut self, rename: F) -> Self
    where
        F: Fn(&str, Option<&str>) -> String + Send + Sync + 'static,
    {
        self.rename = Some(Arc::new(rename));
        self
    }
}

impl fmt::Debug for PartialDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialDescriptor")
            .field("templates", &self.templates.as_ref().map(|t| t.keys().collect::<Vec<_>>()))
            .field("namespace", &self.namespace)
            .field("dir", &self.dir)
            .field("rename", &self.rename.as_ref().map(|_| ".."))
            .finish()
    }
}

impl From<PathBuf> for PartialsDir {
    fn from(path: PathBuf) -> Self {
        PartialsDir::Path(path)
    }
}

impl From<&str> for PartialsDir {
    fn from(path: &str) -> Self {
        PartialsDir::Path(PathBuf::from(path))
    }
}

impl From<PartialDescriptor> for PartialsDir {
    fn from(descriptor: PartialDescriptor) -> Self {
        PartialsDir::Descriptor(descriptor)
    }
}

impl From<Vec<PartialsDir>> for PartialsDir {
    fn from(list: Vec<PartialsDir>) -> Self {
        PartialsDir::List(list)
    }
}

/// One validated entry of a partials setting
pub(crate) struct PartialSource<'a> {
    pub dir: Option<&'a Path>,
    pub templates: Option<&'a TemplateMap>,
    pub namespace: Option<&'a str>,
    pub rename: Option<&'a RenameFn>,
}

impl PartialsDir {
    /// Parse a JSON partials setting: a string, an object with `dir` and
    /// `namespace`, or an array of those
    pub fn from_value(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::Array(items) => items
                .iter()
                .map(Self::entry_from_value)
                .collect::<Result<Vec<_>>>()
                .map(PartialsDir::List),
            other => Self::entry_from_value(other),
        }
    }

    fn entry_from_value(value: &JsonValue) -> Result<Self> {
        match value {
            JsonValue::String(path) => Ok(PartialsDir::Path(PathBuf::from(path))),
            JsonValue::Object(map) => {
                let string_field = |key: &str| match map.get(key) {
                    None | Some(JsonValue::Null) => Ok(None),
                    Some(JsonValue::String(s)) => Ok(Some(s.clone())),
                    Some(_) => Err(Error::configuration_static(INVALID_PARTIALS_DIR)),
                };
                Ok(PartialsDir::Descriptor(PartialDescriptor {
                    templates: None,
                    namespace: string_field("namespace")?,
                    dir: string_field("dir")?.map(PathBuf::from),
                    rename: None,
                }))
            }
            _ => Err(Error::configuration_static(INVALID_PARTIALS_DIR)),
        }
    }

    /// Flatten and validate into the list of sources to resolve
    pub(crate) fn sources(&self) -> Result<Vec<PartialSource<'_>>> {
        match self {
            PartialsDir::List(entries) => entries.iter().map(Self::source).collect(),
            entry => Ok(vec![Self::source(entry)?]),
        }
    }

    fn source(entry: &PartialsDir) -> Result<PartialSource<'_>> {
        let source = match entry {
            PartialsDir::Path(path) => PartialSource {
                dir: Some(path.as_path()),
                templates: None,
                namespace: None,
                rename: None,
            },
            PartialsDir::Descriptor(descriptor) => PartialSource {
                dir: descriptor.dir.as_deref(),
                templates: descriptor.templates.as_ref(),
                namespace: descriptor.namespace.as_deref(),
                rename: descriptor.rename.as_ref(),
            },
            PartialsDir::List(_) => return Err(Error::configuration_static(INVALID_PARTIALS_DIR)),
        };

        let has_dir = source.dir.map_or(false, |dir| !dir.as_os_str().is_empty());
        if !has_dir && source.templates.is_none() {
            return Err(Error::configuration_static(INVALID_PARTIALS_DIR));
        }
        Ok(source)
    }
}

/// Name a template from its relative path
///
/// The extension is stripped first. A rename function's result is used
/// verbatim; otherwise a non-empty namespace is prefixed with `/`.
pub fn template_name(
    file_path: &str,
    namespace: Option<&str>,
    extname: &str,
    rename: Option<&RenameFn>,
) -> String {
    let name = strip_extname(file_path, extname);

    if let Some(rename) = rename {
        return rename(name, namespace);
    }

    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}/{}", ns, name),
        _ => name.to_string(),
    }
}
