//! Template compilation hooks
//!
//! Every template source passes through here on its way into the caches.
//! Sources are trimmed first so that trailing newlines left by editors never
//! reach the rendered HTML.

use std::path::Path;

use handlebars::Handlebars;

use crate::error::{Error, Result};
use crate::types::{CompiledTemplate, CompilerOptions, PrecompiledTemplate};

pub struct Compiler;

impl Compiler {
    /// Compile `source` into a renderable template
    pub fn compile(path: &Path, source: &str, options: &CompilerOptions) -> Result<CompiledTemplate> {
        let name = path.to_string_lossy();
        let mut registry = Handlebars::new();
        registry.set_prevent_indent(options.prevent_indent);
        registry
            .register_template_string(&name, source.trim())
            .map_err(|e| Error::compile(path, e))?;

        let template = registry.get_template(&name).cloned().ok_or_else(|| {
            Error::configuration_owned(format!(
                "Template '{}' missing after registration",
                name
            ))
        })?;

        Ok(CompiledTemplate::new(template, path))
    }

    /// Produce the serializable form of `source`
    ///
    /// The source is compiled once so syntax errors surface here rather than
    /// wherever the precompiled template ends up.
    pub fn precompile(path: &Path, source: &str, options: &CompilerOptions) -> Result<PrecompiledTemplate> {
        let trimmed = source.trim();
        Self::compile(path, trimmed, options)?;

        Ok(PrecompiledTemplate {
            name: path.to_string_lossy().into_owned(),
            source: trimmed.to_string(),
        })
    }
}
