//! Builder pattern API for constructing HandlebarsEngine instances
//!
//! This module provides a fluent API for configuring the engine's
//! directories, helpers and Handlebars options before building it.

use std::path::PathBuf;

use serde_json::Value as JsonValue;

use crate::config::EngineConfig;
use crate::engine::HandlebarsEngine;
use crate::error::Result;
use crate::helpers::{Helper, HelperCall, HelperResult};
use crate::partials::PartialsDir;
use crate::types::{CompilerOptions, Encoding, RuntimeOptions};

/// Builder for constructing HandlebarsEngine instances
///
/// # Examples
///
/// ```rust,ignore
/// use handlebars_views::HandlebarsEngineBuilder;
/// use serde_json::json;
///
/// let engine = HandlebarsEngineBuilder::new()
///     .with_extname("hbs")
///     .with_layouts_dir("views/layouts")
///     .with_partials_dir("views/partials")
///     .with_helper("year", |_| Ok(json!(2024)))
///     .build();
/// ```
#[derive(Debug, Default)]
pub struct HandlebarsEngineBuilder {
    config: EngineConfig,
}

impl HandlebarsEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a JSON configuration
    pub fn from_value(value: JsonValue) -> Result<Self> {
        Ok(Self {
            config: EngineConfig::from_value(value)?,
        })
    }

    /// Set the template file extension; a leading `.` is added when missing
    pub fn with_extname(mut self, extname: &str) -> Self {
        self.config = self.config.with_extname(extname);
        self
    }

    pub fn with_layouts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config = self.config.with_layouts_dir(dir);
        self
    }

    pub fn with_partials_dir(mut self, dir: impl Into<PartialsDir>) -> Self {
        self.config = self.config.with_partials_dir(dir);
        self
    }

    pub fn with_default_layout(mut self, layout: impl Into<String>) -> Self {
        self.config = self.config.with_default_layout(layout);
        self
    }

    pub fn without_default_layout(mut self) -> Self {
        self.config = self.config.without_default_layout();
        self
    }

    /// Register a helper function under `name`
    pub fn with_helper<F>(mut self, name: impl Into<String>, helper: F) -> Self
    where
        F: Fn(&HelperCall<'_>) -> HelperResult + Send + Sync + 'static,
    {
        self.config = self.config.with_helper(name, Helper::new(helper));
        self
    }

    pub fn with_compiler_options(mut self, options: CompilerOptions) -> Self {
        self.config = self.config.with_compiler_options(options);
        self
    }

    pub fn with_runtime_options(mut self, options: RuntimeOptions) -> Self {
        self.config = self.config.with_runtime_options(options);
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.config = self.config.with_encoding(encoding);
        self
    }

    /// Use a complete configuration
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> HandlebarsEngine {
        HandlebarsEngine::new(self.config)
    }
}
