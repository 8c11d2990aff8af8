//! Template execution
//!
//! Each render builds a short-lived Handlebars registry holding the main
//! template, the resolved partials and the merged helpers. Compiled templates
//! are shared through the caches; the registry itself is never reused, so
//! per-call helpers and runtime options cannot leak between renders.
//!
//! The render metadata is also pushed as local variables of the root block:
//! `@filePath`, `@view`, `@layout` and `@cache`, every caller data key, and
//! the whole record as `@exphbs`. Handlebars resolves only flat `@name`
//! lookups, so `{{@exphbs.view}}` does not reach into the record. Inside a
//! block such as `{{#each}}` use `{{@../view}}`.

use std::path::PathBuf;
use std::sync::Arc;

use handlebars::{BlockContext, Context, Handlebars, RenderContext, RenderError, RenderErrorReason, Renderable, StringOutput};
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use tracing::trace;

use crate::error::{Error, Result};
use crate::helpers::HelperMap;
use crate::types::{CompiledTemplate, CompilerOptions, PartialMap, RuntimeOptions};

/// Metadata of a render, available to helpers through
/// [`HelperCall::data`](crate::HelperCall::data)
#[derive(Debug, Clone, Default)]
pub struct RenderData {
    /// Path of the template being rendered
    pub file_path: PathBuf,
    /// Logical view name, when rendered through the view adapter
    pub view: Option<String>,
    /// Layout selected for the view
    pub layout: Option<String>,
    pub cache: bool,
    pub helpers: HelperMap,
    pub partials: PartialMap,
    pub runtime_options: RuntimeOptions,
    /// Caller-supplied data
    pub data: JsonMap<String, JsonValue>,
}

impl RenderData {
    /// Template-visible `@` variables; metadata wins over caller data
    pub fn local_vars(&self) -> JsonMap<String, JsonValue> {
        let mut vars = self.data.clone();
        vars.insert(
            "filePath".to_string(),
            json!(self.file_path.to_string_lossy()),
        );
        vars.insert("view".to_string(), json!(self.view));
        vars.insert("layout".to_string(), json!(self.layout));
        vars.insert("cache".to_string(), json!(self.cache));

        let mut record = vars.clone();
        record.insert(
            "helpers".to_string(),
            json!(self.helpers.keys().collect::<Vec<_>>()),
        );
        record.insert(
            "partials".to_string(),
            json!(self.partials.keys().collect::<Vec<_>>()),
        );
        record.insert("data".to_string(), JsonValue::Object(self.data.clone()));
        vars.insert("exphbs".to_string(), JsonValue::Object(record));
        vars
    }
}

/// Everything needed to execute one template
pub(crate) struct RenderJob<'a> {
    pub template: &'a CompiledTemplate,
    pub context: &'a JsonValue,
    pub partials: &'a PartialMap,
    pub helpers: &'a HelperMap,
    pub runtime_options: &'a RuntimeOptions,
    pub compiler_options: &'a CompilerOptions,
    pub data: RenderData,
}

pub struct Renderer;

impl Renderer {
    /// Execute the template and trim the output
    pub(crate) fn render(job: RenderJob<'_>) -> Result<String> {
        let path = job.template.path();
        let name = path.to_string_lossy().into_owned();

        let mut registry = Handlebars::new();
        registry.set_prevent_indent(job.compiler_options.prevent_indent);
        job.runtime_options.apply(&mut registry);

        for (partial_name, partial) in job.partials {
            registry.register_template(partial_name, partial.template().clone());
        }

        let local_vars = job.data.local_vars();
        let data = Arc::new(job.data);
        for (helper_name, helper) in job.helpers {
            registry.register_helper(helper_name, helper.adapter(data.clone()));
        }

        registry.register_template(&name, job.template.template().clone());

        trace!(
            template = %path.display(),
            partials = job.partials.len(),
            helpers = job.helpers.len(),
            "rendering template"
        );

        let html = execute(&registry, &name, job.context, local_vars)
            .map_err(|e| Error::render(path, e))?;

        Ok(html.trim().to_string())
    }
}

fn execute<'reg>(
    registry: &'reg Handlebars<'reg>,
    name: &'reg String,
    context: &JsonValue,
    local_vars: JsonMap<String, JsonValue>,
) -> std::result::Result<String, RenderError> {
    let template = registry
        .get_template(name)
        .ok_or_else(|| RenderErrorReason::TemplateNotFound(name.clone()))?;
    let context = Context::wraps(context)?;

    let mut block = BlockContext::new();
    for (key, value) in local_vars {
        block.set_local_var(&key, value);
    }
    let mut rc = RenderContext::new(Some(name));
    rc.push_block(block);

    let mut out = StringOutput::new();
    template.render(registry, &context, &mut rc, &mut out)?;
    out.into_string()
        .map_err(|e| RenderError::from(RenderErrorReason::Other(e.to_string())))
}
