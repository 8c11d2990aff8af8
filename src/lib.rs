//! Handlebars view engine for web frameworks
//!
//! This crate renders Handlebars views from disk for a web framework's view
//! layer. It resolves view files, compiles and caches them, registers partials
//! from one or more directories and wraps rendered views in layouts.
//!
//! # Examples
//!
//! ```rust,ignore
//! use handlebars_views::{create, EngineConfig, ViewOptions, ViewsSetting};
//! use serde_json::json;
//!
//! # async fn example() -> handlebars_views::Result<()> {
//! let engine = create(EngineConfig::default());
//!
//! // Renders views/home.handlebars inside views/layouts/main.handlebars,
//! // with partials from views/partials/
//! let html = engine
//!     .render_view(
//!         "views/home.handlebars",
//!         ViewOptions::new(json!({"title": "Hello World"}))
//!             .with_views(ViewsSetting::Single("views".into()))
//!             .with_cache(true),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod types;
pub mod utils;
pub mod cache;
pub mod compiler;
pub mod helpers;
pub mod partials;
pub mod config;
pub mod resolver;
pub mod renderer;
pub mod engine;
pub mod builder;

#[doc(hidden)]
pub mod test_utils;

// Re-export commonly used types
pub use builder::HandlebarsEngineBuilder;
pub use cache::{CacheStats, EngineCacheStats};
pub use config::EngineConfig;
pub use engine::{create, engine, HandlebarsEngine, LayoutOption, ViewEngine, ViewOptions, ViewsSetting};
pub use error::{Error, Result};
pub use helpers::{Helper, HelperCall, HelperMap, HelperResult};
pub use partials::{PartialDescriptor, PartialsDir, RenameFn};
pub use renderer::RenderData;
pub use types::{
    CompiledTemplate, CompilerOptions, Encoding, PartialMap, PrecompiledTemplate, RenderOptions,
    RuntimeOptions, TemplateMap, TemplateOptions,
};
