//! Core template types and per-call options
//!
//! This module contains the compiled and precompiled template handles, the
//! option structs accepted by the engine operations and the small value types
//! (encodings, runtime and compiler options) they carry.
//!
//! # Key Types
//!
//! - [`CompiledTemplate`] - A compiled Handlebars template, cheap to clone
//! - [`PrecompiledTemplate`] - The serializable form of a template
//! - [`TemplateOptions`] - Cache and encoding flags for file-level operations
//! - [`RenderOptions`] - Per-render overrides merged over the engine configuration
//! - [`RuntimeOptions`] / [`CompilerOptions`] - Settings handed to Handlebars
//!
//! # Usage
//!
//! ```rust,ignore
//! use handlebars_views::{RenderOptions, RuntimeOptions};
//! use serde_json::json;
//!
//! let options = RenderOptions::default()
//!     .with_cache(true)
//!     .with_runtime_options(RuntimeOptions::default().with_strict_mode(true));
//!
//! let html = engine.render("views/home.handlebars", &json!({"title": "Home"}), &options).await?;
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use handlebars::{Handlebars, Template};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use crate::error::{Error, Result};
use crate::helpers::HelperMap;

/// Templates keyed by relative file path, in directory listing order
pub type TemplateMap = IndexMap<String, CompiledTemplate>;

/// Partials keyed by partial name
pub type PartialMap = IndexMap<String, CompiledTemplate>;

/// A compiled Handlebars template
///
/// `CompiledTemplate` is reference-counted: clones share the same parsed
/// template, which is what the compiled cache hands out to every caller.
/// Use [`CompiledTemplate::ptr_eq`] to check whether two handles came from
/// the same compilation.
#[derive(Clone)]
pub struct CompiledTemplate {
    pub(crate) template: Arc<Template>,
    pub(crate) path: Arc<Path>,
}

impl CompiledTemplate {
    pub(crate) fn new(template: Template, path: &Path) -> Self {
        Self {
            template: Arc::new(template),
            path: Arc::from(path),
        }
    }

    /// Compile a template from source that did not come from disk
    ///
    /// `name` identifies the template in error messages. The source is
    /// trimmed before compilation, exactly like file-backed templates.
    pub fn from_source(name: &str, source: &str, options: &CompilerOptions) -> Result<Self> {
        crate::compiler::Compiler::compile(Path::new(name), source, options)
    }

    /// The file the template was compiled from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The parsed Handlebars template
    pub fn template(&self) -> &Template {
        &self.template
    }

    /// Whether both handles share one compilation
    pub fn ptr_eq(&self, other: &CompiledTemplate) -> bool {
        Arc::ptr_eq(&self.template, &other.template)
    }

    /// Render the template on its own, without helpers or partials
    pub fn render<T: Serialize>(&self, context: &T) -> Result<String> {
        let name = self.path.to_string_lossy();
        let mut registry = Handlebars::new();
        registry.register_template(&name, (*self.template).clone());
        registry
            .render(&name, context)
            .map_err(|e| Error::render(&self.path, e))
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("path", &self.path)
            .finish()
    }
}

/// A template in its serializable form
///
/// Handlebars for Rust has no JavaScript code generation, so the precompiled
/// form is the trimmed, syntax-checked source together with its name. It can
/// be shipped elsewhere and turned back into a [`CompiledTemplate`] without
/// touching the file system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrecompiledTemplate {
    pub name: String,
    pub source: String,
}

impl PrecompiledTemplate {
    /// Compile the serialized source
    pub fn compile(&self, options: &CompilerOptions) -> Result<CompiledTemplate> {
        crate::compiler::Compiler::compile(Path::new(&self.name), &self.source, options)
    }
}

/// Text encoding used when reading template files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    #[serde(alias = "utf-8")]
    Utf8,
    #[serde(alias = "binary", alias = "iso-8859-1")]
    Latin1,
}

impl Encoding {
    /// Decode raw file bytes
    ///
    /// Invalid UTF-8 sequences are replaced with U+FFFD rather than rejected,
    /// so a directory mixing encodings can still be scanned as a whole.
    pub fn decode(self, bytes: Vec<u8>) -> String {
        match self {
            Encoding::Utf8 => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
            },
            // ISO-8859-1 maps every byte to the code point of the same value
            Encoding::Latin1 => bytes.into_iter().map(char::from).collect(),
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "latin1" | "binary" | "iso-8859-1" => Ok(Encoding::Latin1),
            other => Err(Error::configuration_owned(format!(
                "Unsupported encoding: {}",
                other
            ))),
        }
    }
}

/// Options applied when Handlebars compiles a template
///
/// These are engine-wide: compiled templates are cached across renders, so
/// they cannot depend on per-call settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Do not indent the output of standalone partials
    pub prevent_indent: bool,
}

impl CompilerOptions {
    pub fn with_prevent_indent(mut self, enabled: bool) -> Self {
        self.prevent_indent = enabled;
        self
    }
}

/// Options applied when a template is executed
///
/// Unset fields fall back to the engine configuration, then to the Handlebars
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeOptions {
    /// Fail on missing fields instead of rendering them empty
    pub strict_mode: Option<bool>,
    /// Disable HTML escaping of `{{ }}` expressions
    pub no_escape: Option<bool>,
}

impl RuntimeOptions {
    pub fn with_strict_mode(mut self, enabled: bool) -> Self {
        self.strict_mode = Some(enabled);
        self
    }

    pub fn with_no_escape(mut self, enabled: bool) -> Self {
        self.no_escape = Some(enabled);
        self
    }

    /// Shallow merge where `overrides` wins field by field
    pub fn merge(&self, overrides: &RuntimeOptions) -> RuntimeOptions {
        RuntimeOptions {
            strict_mode: overrides.strict_mode.or(self.strict_mode),
            no_escape: overrides.no_escape.or(self.no_escape),
        }
    }

    pub(crate) fn apply(&self, registry: &mut Handlebars<'_>) {
        if let Some(strict) = self.strict_mode {
            registry.set_strict_mode(strict);
        }
        if self.no_escape == Some(true) {
            registry.register_escape_fn(handlebars::no_escape);
        }
    }
}

/// Cache and encoding flags for file-level operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateOptions {
    /// Read from and populate the engine caches
    pub cache: bool,
    /// Override the engine's default encoding
    pub encoding: Option<Encoding>,
}

impl TemplateOptions {
    /// Options with caching enabled
    pub fn cached() -> Self {
        Self {
            cache: true,
            encoding: None,
        }
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }
}

/// Per-render overrides accepted by [`HandlebarsEngine::render`](crate::HandlebarsEngine::render)
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    pub cache: bool,
    pub encoding: Option<Encoding>,
    /// Logical view name, exposed to helpers
    pub view: Option<String>,
    /// Layout selected for this render, exposed to helpers
    pub layout: Option<String>,
    /// Helpers merged over the engine helpers
    pub helpers: HelperMap,
    /// Partials to use instead of scanning the partials directories
    pub partials: Option<PartialMap>,
    pub runtime_options: RuntimeOptions,
    /// Extra data exposed to helpers alongside the render metadata
    pub data: JsonMap<String, JsonValue>,
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_helpers(mut self, helpers: HelperMap) -> Self {
        self.helpers = helpers;
        self
    }

    pub fn with_partials(mut self, partials: PartialMap) -> Self {
        self.partials = Some(partials);
        self
    }

    pub fn with_runtime_options(mut self, options: RuntimeOptions) -> Self {
        self.runtime_options = options;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub(crate) fn template_options(&self) -> TemplateOptions {
        TemplateOptions {
            cache: self.cache,
            encoding: self.encoding,
        }
    }
}
