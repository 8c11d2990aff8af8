//! Engine configuration
//!
//! [`EngineConfig`] is fixed once an engine is built. Every field has a
//! default matching a conventional Express-style layout: `.handlebars` files,
//! a `main` layout, no helpers and UTF-8 sources.
//!
//! ```rust,ignore
//! use handlebars_views::{EngineConfig, Encoding};
//!
//! let config = EngineConfig::default()
//!     .with_extname("hbs")
//!     .with_layouts_dir("views/layouts")
//!     .with_partials_dir("views/partials")
//!     .with_encoding(Encoding::Latin1);
//! assert_eq!(config.extname(), ".hbs");
//! ```

use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::helpers::{Helper, HelperMap};
use crate::partials::PartialsDir;
use crate::types::{CompilerOptions, Encoding, RuntimeOptions};
use crate::utils::normalize_extname;

pub const DEFAULT_EXTNAME: &str = ".handlebars";
pub const DEFAULT_LAYOUT: &str = "main";

/// Configuration for a [`HandlebarsEngine`](crate::HandlebarsEngine)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    extname: String,
    /// Layouts directory; derived from the views setting when unset
    pub layouts_dir: Option<PathBuf>,
    /// Partial sources; derived from the views setting when unset
    pub partials_dir: Option<PartialsDir>,
    /// Layout applied to views that do not choose one
    pub default_layout: Option<String>,
    pub helpers: HelperMap,
    pub compiler_options: CompilerOptions,
    pub runtime_options: RuntimeOptions,
    /// Encoding used when a call does not specify one
    pub encoding: Encoding,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extname: DEFAULT_EXTNAME.to_string(),
            layouts_dir: None,
            partials_dir: None,
            default_layout: Some(DEFAULT_LAYOUT.to_string()),
            helpers: HelperMap::new(),
            compiler_options: CompilerOptions::default(),
            runtime_options: RuntimeOptions::default(),
            encoding: Encoding::default(),
        }
    }
}

/// Fields that map directly onto serde types
#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct RawConfig {
    extname: Option<String>,
    layouts_dir: Option<PathBuf>,
    compiler_options: CompilerOptions,
    runtime_options: RuntimeOptions,
    encoding: Option<Encoding>,
}

impl EngineConfig {
    /// Template file extension, always starting with `.`
    pub fn extname(&self) -> &str {
        &self.extname
    }

    pub fn with_extname(mut self, extname: &str) -> Self {
        self.extname = normalize_extname(extname);
        self
    }

    pub fn with_layouts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.layouts_dir = Some(dir.into());
        self
    }

    pub fn with_partials_dir(mut self, dir: impl Into<PartialsDir>) -> Self {
        self.partials_dir = Some(dir.into());
        self
    }

    pub fn with_default_layout(mut self, layout: impl Into<String>) -> Self {
        self.default_layout = Some(layout.into());
        self
    }

    /// Render views without a layout unless one is requested per call
    pub fn without_default_layout(mut self) -> Self {
        self.default_layout = None;
        self
    }

    pub fn with_helper(mut self, name: impl Into<String>, helper: Helper) -> Self {
        self.helpers.insert(name.into(), helper);
        self
    }

    pub fn with_helpers(mut self, helpers: HelperMap) -> Self {
        self.helpers = helpers;
        self
    }

    pub fn with_compiler_options(mut self, options: CompilerOptions) -> Self {
        self.compiler_options = options;
        self
    }

    pub fn with_runtime_options(mut self, options: RuntimeOptions) -> Self {
        self.runtime_options = options;
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Build a configuration from JSON
    ///
    /// Recognized keys are `extname`, `layoutsDir`, `partialsDir`,
    /// `defaultLayout` (`null` disables the layout), `compilerOptions`,
    /// `runtimeOptions` and `encoding`. Helpers cannot be expressed in JSON
    /// and are added with [`EngineConfig::with_helper`].
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let map = match &value {
            JsonValue::Object(map) => map,
            JsonValue::Null => return Ok(Self::default()),
            _ => {
                return Err(Error::configuration_static(
                    "Engine configuration must be an object",
                ))
            }
        };

        let partials_dir = match map.get("partialsDir") {
            None | Some(JsonValue::Null) => None,
            Some(dir) => Some(PartialsDir::from_value(dir)?),
        };

        let default_layout = match map.get("defaultLayout") {
            None => Some(DEFAULT_LAYOUT.to_string()),
            Some(JsonValue::Null) => None,
            Some(JsonValue::String(layout)) => Some(layout.clone()),
            Some(other) => {
                return Err(Error::configuration_owned(format!(
                    "defaultLayout must be a string or null, got {}",
                    other
                )))
            }
        };

        let raw: RawConfig = serde_json::from_value(value.clone())?;

        let mut config = EngineConfig {
            partials_dir,
            default_layout,
            layouts_dir: raw.layouts_dir,
            compiler_options: raw.compiler_options,
            runtime_options: raw.runtime_options,
            encoding: raw.encoding.unwrap_or_default(),
            ..Self::default()
        };
        if let Some(extname) = raw.extname {
            config = config.with_extname(&extname);
        }

        Ok(config)
    }
}
