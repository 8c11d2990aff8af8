//! The view engine
//!
//! [`HandlebarsEngine`] owns the configuration and the caches and exposes the
//! two levels of rendering:
//!
//! - [`HandlebarsEngine::render`] renders one template file with partials and
//!   helpers.
//! - [`HandlebarsEngine::render_view`] is what a web framework calls. It
//!   derives the layouts and partials directories from the framework's views
//!   setting, renders the view and wraps it in a layout.
//!
//! # Example
//!
//! ```rust,ignore
//! use handlebars_views::{HandlebarsEngine, EngineConfig, ViewOptions, ViewsSetting};
//! use serde_json::json;
//!
//! let engine = HandlebarsEngine::new(EngineConfig::default());
//! let html = engine
//!     .render_view(
//!         "views/home.handlebars",
//!         ViewOptions::new(json!({"title": "Home"})).with_views(ViewsSetting::Single("views".into())),
//!     )
//!     .await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use tracing::{debug, trace};

use crate::builder::HandlebarsEngineBuilder;
use crate::cache::EngineCacheStats;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::helpers::{merge_helpers, HelperMap};
use crate::partials::{template_name, PartialsDir};
use crate::renderer::{RenderData, RenderJob, Renderer};
use crate::resolver::TemplateResolver;
use crate::types::{
    CompiledTemplate, Encoding, PartialMap, PrecompiledTemplate, RenderOptions, RuntimeOptions,
    TemplateMap, TemplateOptions,
};
use crate::utils::{absolute_path, relative_path, to_forward_slashes};

/// The framework-facing rendering contract
#[async_trait]
pub trait ViewEngine: Send + Sync {
    /// Render the view at `view_path` to HTML
    async fn render_view(&self, view_path: &Path, options: ViewOptions) -> Result<String>;
}

/// The framework's views setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewsSetting {
    Single(PathBuf),
    /// Several view roots; the one containing the view file is used
    Many(Vec<PathBuf>),
}

/// Layout selection for a single view render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LayoutOption {
    /// Use the configured default layout
    #[default]
    Default,
    /// Render without a layout
    Disabled,
    /// A layout name or path
    Named(String),
}

/// Options passed by the framework for one view render
#[derive(Debug, Clone, Default)]
pub struct ViewOptions {
    /// Template context; also receives `body` when rendering the layout
    pub context: JsonValue,
    pub views: Option<ViewsSetting>,
    pub layout: LayoutOption,
    pub cache: bool,
    pub encoding: Option<Encoding>,
    pub helpers: HelperMap,
    /// Partials layered over the configured ones
    pub partials: PartialMap,
    pub runtime_options: RuntimeOptions,
    pub data: JsonMap<String, JsonValue>,
}

impl ViewOptions {
    pub fn new(context: JsonValue) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    pub fn with_views(mut self, views: ViewsSetting) -> Self {
        self.views = Some(views);
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = LayoutOption::Named(layout.into());
        self
    }

    pub fn without_layout(mut self) -> Self {
        self.layout = LayoutOption::Disabled;
        self
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
        self.partials = partials;
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

    fn template_options(&self) -> TemplateOptions {
        TemplateOptions {
            cache: self.cache,
            encoding: self.encoding,
        }
    }
}

/// Directories derived from the views setting
#[derive(Debug, Clone, Default)]
struct ViewDirs {
    layouts_dir: Option<PathBuf>,
    partials_dir: Option<PartialsDir>,
}

/// Handlebars view engine with template, partial and file caches
pub struct HandlebarsEngine {
    config: EngineConfig,
    // Written by render_view when the configuration leaves a directory unset.
    // Concurrent renders with different views settings race; the last one wins.
    dirs: RwLock<ViewDirs>,
    resolver: TemplateResolver,
}

impl HandlebarsEngine {
    pub fn new(config: EngineConfig) -> Self {
        let resolver = TemplateResolver::new(
            config.extname(),
            config.encoding,
            config.compiler_options.clone(),
        );
        let dirs = ViewDirs {
            layouts_dir: config.layouts_dir.clone(),
            partials_dir: config.partials_dir.clone(),
        };

        Self {
            config,
            dirs: RwLock::new(dirs),
            resolver,
        }
    }

    pub fn builder() -> HandlebarsEngineBuilder {
        HandlebarsEngineBuilder::new()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extname(&self) -> &str {
        self.config.extname()
    }

    /// Current layouts directory
    pub fn layouts_dir(&self) -> Option<PathBuf> {
        self.dirs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .layouts_dir
            .clone()
    }

    /// Current partials setting
    pub fn partials_dir(&self) -> Option<PartialsDir> {
        self.dirs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .partials_dir
            .clone()
    }

    /// Read a template file as text
    pub async fn read_file(&self, path: impl AsRef<Path>, options: &TemplateOptions) -> Result<String> {
        self.resolver.read_file(path.as_ref(), options).await
    }

    /// List template files under `dir`, relative to it
    pub async fn list_files(&self, dir: impl AsRef<Path>, options: &TemplateOptions) -> Result<Vec<String>> {
        self.resolver.list_files(dir.as_ref(), options).await
    }

    pub async fn get_template(&self, path: impl AsRef<Path>, options: &TemplateOptions) -> Result<CompiledTemplate> {
        self.resolver.get_template(path.as_ref(), options).await
    }

    pub async fn get_precompiled_template(
        &self,
        path: impl AsRef<Path>,
        options: &TemplateOptions,
    ) -> Result<PrecompiledTemplate> {
        self.resolver
            .get_precompiled_template(path.as_ref(), options)
            .await
    }

    pub async fn get_templates(&self, dir: impl AsRef<Path>, options: &TemplateOptions) -> Result<TemplateMap> {
        self.resolver.get_templates(dir.as_ref(), options).await
    }

    /// Resolve the current partials setting
    pub async fn get_partials(&self, options: &TemplateOptions) -> Result<PartialMap> {
        let partials_dir = self.partials_dir();
        self.resolver
            .get_partials(partials_dir.as_ref(), options)
            .await
    }

    /// Whether `path` has a compiled (or precompiled) cache entry
    pub fn is_template_cached(&self, path: impl AsRef<Path>, precompiled: bool) -> bool {
        self.resolver.is_cached(path.as_ref(), precompiled)
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        self.resolver.stats()
    }

    /// Render one template file
    ///
    /// The template and the partials are resolved concurrently. Partials come
    /// from `options.partials` when given, otherwise from the partials setting.
    /// Helpers and runtime options are the configured ones overridden by the
    /// per-call ones.
    pub async fn render<C>(&self, path: impl AsRef<Path>, context: &C, options: &RenderOptions) -> Result<String>
    where
        C: Serialize + Sync + ?Sized,
    {
        let path = path.as_ref();
        let context = serde_json::to_value(context)?;
        let template_options = options.template_options();

        let partials = async {
            match &options.partials {
                Some(partials) => Ok(partials.clone()),
                None => self.get_partials(&template_options).await,
            }
        };
        let (template, partials) =
            futures::try_join!(self.get_template(path, &template_options), partials)?;

        let helpers = merge_helpers(&self.config.helpers, &options.helpers);
        let runtime_options = self.config.runtime_options.merge(&options.runtime_options);

        let data = RenderData {
            file_path: path.to_path_buf(),
            view: options.view.clone(),
            layout: options.layout.clone(),
            cache: options.cache,
            helpers: helpers.clone(),
            partials: partials.clone(),
            runtime_options: runtime_options.clone(),
            data: options.data.clone(),
        };

        debug!(template = %path.display(), view = ?options.view, "rendering");

        Renderer::render(RenderJob {
            template: &template,
            context: &context,
            partials: &partials,
            helpers: &helpers,
            runtime_options: &runtime_options,
            compiler_options: &self.config.compiler_options,
            data,
        })
    }

    /// Render a view and wrap it in its layout
    pub async fn render_view(&self, view_path: impl AsRef<Path>, options: ViewOptions) -> Result<String> {
        let view_path = view_path.as_ref();

        let mut view = None;
        if let Some(views_path) = options
            .views
            .as_ref()
            .and_then(|setting| resolve_views_path(setting, view_path))
        {
            let relative = relative_path(&absolute_path(&views_path)?, &absolute_path(view_path)?);
            view = Some(template_name(
                &to_forward_slashes(&relative),
                None,
                self.extname(),
                None,
            ));
            self.use_views_dir(&views_path);
        }

        let template_options = options.template_options();
        let helpers = merge_helpers(&self.config.helpers, &options.helpers);
        let mut partials = self.get_partials(&template_options).await?;
        partials.extend(options.partials.clone());

        let layout = match &options.layout {
            LayoutOption::Default => self.config.default_layout.clone(),
            LayoutOption::Disabled => None,
            LayoutOption::Named(name) => Some(name.clone()),
        };

        let render_options = RenderOptions {
            cache: options.cache,
            encoding: options.encoding,
            view,
            layout: layout.clone(),
            helpers,
            partials: Some(partials),
            runtime_options: options.runtime_options.clone(),
            data: options.data.clone(),
        };

        let html = self
            .render(view_path, &options.context, &render_options)
            .await?;

        let Some(layout_path) = self.resolve_layout_path(layout.as_deref())? else {
            return Ok(html);
        };

        trace!(layout = %layout_path.display(), "rendering layout");
        let context = with_body(&options.context, html);
        let layout_options = RenderOptions {
            layout: None,
            ..render_options
        };
        self.render(&layout_path, &context, &layout_options).await
    }

    /// Render a view and report the outcome to `callback` as well
    pub async fn render_view_with_callback<F>(
        &self,
        view_path: impl AsRef<Path>,
        options: ViewOptions,
        callback: F,
    ) -> Result<String>
    where
        F: FnOnce(Option<&Error>, Option<&str>),
    {
        let result = self.render_view(view_path, options).await;
        match &result {
            Ok(html) => callback(None, Some(html)),
            Err(err) => callback(Some(err), None),
        }
        result
    }

    /// Absolute path of a layout
    ///
    /// The extension is appended when `layout` has none. Relative names are
    /// resolved against the layouts directory, or the current directory when
    /// none is set.
    pub fn resolve_layout_path(&self, layout: Option<&str>) -> Result<Option<PathBuf>> {
        let Some(layout) = layout.filter(|l| !l.is_empty()) else {
            return Ok(None);
        };

        let file = if Path::new(layout).extension().is_some() {
            layout.to_string()
        } else {
            format!("{}{}", layout, self.extname())
        };

        let base = self.layouts_dir().unwrap_or_default();
        absolute_path(&base.join(file)).map(Some)
    }

    fn use_views_dir(&self, views_path: &Path) {
        let mut dirs = self.dirs.write().unwrap_or_else(PoisonError::into_inner);
        if self.config.layouts_dir.is_none() {
            dirs.layouts_dir = Some(views_path.join("layouts/"));
        }
        if self.config.partials_dir.is_none() {
            dirs.partials_dir = Some(PartialsDir::Path(views_path.join("partials/")));
        }
        trace!(
            views = %views_path.display(),
            layouts_dir = ?dirs.layouts_dir,
            "updated view directories"
        );
    }
}

#[async_trait]
impl ViewEngine for HandlebarsEngine {
    async fn render_view(&self, view_path: &Path, options: ViewOptions) -> Result<String> {
        HandlebarsEngine::render_view(self, view_path, options).await
    }
}

/// Pick the views directory for `view_path`
///
/// A single non-empty path is used as given. For a list, the first entry
/// that is an ancestor directory of the view file wins, in list order.
pub fn resolve_views_path(setting: &ViewsSetting, view_path: &Path) -> Option<PathBuf> {
    match setting {
        ViewsSetting::Single(path) if path.as_os_str().is_empty() => None,
        ViewsSetting::Single(path) => Some(path.clone()),
        ViewsSetting::Many(paths) => {
            let view = absolute_path(view_path).ok()?;
            paths
                .iter()
                .filter(|p| !p.as_os_str().is_empty())
                .find(|p| {
                    absolute_path(p)
                        .map(|candidate| candidate != view && view.starts_with(&candidate))
                        .unwrap_or(false)
                })
                .cloned()
        }
    }
}

fn with_body(context: &JsonValue, body: String) -> JsonValue {
    let mut map = match context {
        JsonValue::Object(map) => map.clone(),
        _ => JsonMap::new(),
    };
    map.insert("body".to_string(), JsonValue::String(body));
    JsonValue::Object(map)
}

/// Create an engine from `config`
pub fn create(config: EngineConfig) -> HandlebarsEngine {
    HandlebarsEngine::new(config)
}

/// Create an engine and return it behind the framework-facing trait
pub fn engine(config: EngineConfig) -> Arc<dyn ViewEngine> {
    Arc::new(HandlebarsEngine::new(config))
}
