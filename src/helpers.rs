//! Template helpers
//!
//! Helpers are plain functions from a [`HelperCall`] to a JSON value. They
//! are kept independent of the Handlebars helper trait so they can be stored
//! in the engine configuration, merged with per-call overrides and handed the
//! render metadata of the template that invoked them.
//!
//! ```rust,ignore
//! use handlebars_views::{Helper, HelperMap};
//! use serde_json::json;
//!
//! let mut helpers = HelperMap::new();
//! helpers.insert(
//!     "shout".to_string(),
//!     Helper::new(|call| {
//!         let text = call.param(0).and_then(|v| v.as_str()).unwrap_or_default();
//!         Ok(json!(text.to_uppercase()))
//!     }),
//! );
//! ```
//!
//! A helper made with [`Helper::new`] returns a value that is escaped and
//! inserted in place of the call. It never sees a block body, so
//! `{{#name}}...{{/name}}` needs [`Helper::block`]. A block helper receives
//! the body and the `{{else}}` section already rendered against the current
//! context, and its output is inserted unescaped. Rendering the body against
//! another context (`options.fn(other)`) is not supported.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use handlebars::{
    Context, Handlebars, HelperDef, Output, RenderContext, RenderError, RenderErrorReason, Renderable,
    ScopedJson, StringOutput, Template,
};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use crate::renderer::RenderData;

/// Helpers keyed by the name templates call them with
pub type HelperMap = IndexMap<String, Helper>;

/// Result returned by a helper function
pub type HelperResult = std::result::Result<JsonValue, Box<dyn std::error::Error + Send + Sync>>;

type HelperFn = dyn Fn(&HelperCall<'_>) -> HelperResult + Send + Sync;

/// A reference-counted helper function
#[derive(Clone)]
pub struct Helper {
    f: Arc<HelperFn>,
    block: bool,
}

impl Helper {
    /// A value helper; its result is escaped like any `{{expression}}`
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&HelperCall<'_>) -> HelperResult + Send + Sync + 'static,
    {
        Helper {
            f: Arc::new(f),
            block: false,
        }
    }

    /// A block helper; see [`HelperCall::block`] and [`HelperCall::inverse`]
    pub fn block<F>(f: F) -> Self
    where
        F: Fn(&HelperCall<'_>) -> HelperResult + Send + Sync + 'static,
    {
        Helper {
            f: Arc::new(f),
            block: true,
        }
    }

    pub fn is_block(&self) -> bool {
        self.block
    }

    pub fn call(&self, call: &HelperCall<'_>) -> HelperResult {
        (self.f)(call)
    }

    pub(crate) fn adapter(&self, data: Arc<RenderData>) -> Box<dyn HelperDef + Send + Sync> {
        if self.block {
            Box::new(BlockHelperAdapter::new(self.clone(), data))
        } else {
            Box::new(HelperAdapter::new(self.clone(), data))
        }
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper").field("block", &self.block).finish_non_exhaustive()
    }
}

/// Arguments of a single helper invocation
pub struct HelperCall<'a> {
    name: &'a str,
    params: Vec<&'a JsonValue>,
    hash: BTreeMap<&'a str, &'a JsonValue>,
    data: &'a RenderData,
    block: Option<&'a str>,
    inverse: Option<&'a str>,
}

impl<'a> HelperCall<'a> {
    pub fn new(
        name: &'a str,
        params: Vec<&'a JsonValue>,
        hash: BTreeMap<&'a str, &'a JsonValue>,
        data: &'a RenderData,
    ) -> Self {
        Self {
            name,
            params,
            hash,
            data,
            block: None,
            inverse: None,
        }
    }

    pub fn with_block(mut self, block: Option<&'a str>, inverse: Option<&'a str>) -> Self {
        self.block = block;
        self.inverse = inverse;
        self
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Positional parameter `index`, already evaluated against the context
    pub fn param(&self, index: usize) -> Option<&JsonValue> {
        self.params.get(index).copied()
    }

    pub fn params(&self) -> &[&'a JsonValue] {
        &self.params
    }

    /// Named (`key=value`) parameter
    pub fn hash(&self, key: &str) -> Option<&JsonValue> {
        self.hash.get(key).copied()
    }

    /// Metadata of the render in progress
    pub fn data(&self) -> &RenderData {
        self.data
    }

    /// Rendered body of a `{{#name}}` block
    pub fn block(&self) -> Option<&str> {
        self.block
    }

    /// Rendered `{{else}}` section of a block
    pub fn inverse(&self) -> Option<&str> {
        self.inverse
    }
}

/// Shallow merge where `overrides` wins by name
pub fn merge_helpers(base: &HelperMap, overrides: &HelperMap) -> HelperMap {
    let mut merged = base.clone();
    for (name, helper) in overrides {
        merged.insert(name.clone(), helper.clone());
    }
    merged
}

/// Bridges a [`Helper`] into a Handlebars registry for one render
pub(crate) struct HelperAdapter {
    helper: Helper,
    data: Arc<RenderData>,
}

impl HelperAdapter {
    pub(crate) fn new(helper: Helper, data: Arc<RenderData>) -> Self {
        Self { helper, data }
    }
}

impl HelperDef for HelperAdapter {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &handlebars::Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let call = HelperCall {
            name: h.name(),
            params: h.params().iter().map(|p| p.value()).collect(),
            hash: h.hash().iter().map(|(k, v)| (*k, v.value())).collect(),
            data: &self.data,
            block: None,
            inverse: None,
        };

        let value = self.helper.call(&call).map_err(|e| helper_failed(h.name(), e))?;

        Ok(ScopedJson::Derived(value))
    }
}

/// Bridges a block [`Helper`]; writes its output unescaped
pub(crate) struct BlockHelperAdapter {
    helper: Helper,
    data: Arc<RenderData>,
}

impl BlockHelperAdapter {
    pub(crate) fn new(helper: Helper, data: Arc<RenderData>) -> Self {
        Self { helper, data }
    }
}

impl HelperDef for BlockHelperAdapter {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &handlebars::Helper<'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> handlebars::HelperResult {
        let block = h
            .template()
            .map(|t| render_section(t, r, ctx, rc))
            .transpose()?;
        let inverse = h
            .inverse()
            .map(|t| render_section(t, r, ctx, rc))
            .transpose()?;

        let call = HelperCall {
            name: h.name(),
            params: h.params().iter().map(|p| p.value()).collect(),
            hash: h.hash().iter().map(|(k, v)| (*k, v.value())).collect(),
            data: &self.data,
            block: block.as_deref(),
            inverse: inverse.as_deref(),
        };

        let value = self.helper.call(&call).map_err(|e| helper_failed(h.name(), e))?;
        match value {
            JsonValue::Null => {}
            JsonValue::String(text) => out.write(&text)?,
            other => out.write(&other.to_string())?,
        }
        Ok(())
    }
}

fn render_section<'reg: 'rc, 'rc>(
    template: &'rc Template,
    registry: &'reg Handlebars<'reg>,
    ctx: &'rc Context,
    rc: &mut RenderContext<'reg, 'rc>,
) -> Result<String, RenderError> {
    let mut out = StringOutput::new();
    template.render(registry, ctx, rc, &mut out)?;
    out.into_string()
        .map_err(|e| RenderError::from(RenderErrorReason::Other(e.to_string())))
}

fn helper_failed(name: &str, err: Box<dyn std::error::Error + Send + Sync>) -> RenderErrorReason {
    RenderErrorReason::Other(format!("Helper '{}' failed: {}", name, err))
}
