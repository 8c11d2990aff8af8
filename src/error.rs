//! Error handling for handlebars-views
//!
//! This module provides the error type shared by every layer of the view
//! engine: file access, configuration, template compilation and rendering.
//!
//! # Error Types
//!
//! - [`Error::IoError`] - A template file or directory could not be read
//! - [`Error::ConfigurationError`] - Malformed engine configuration or partials descriptor
//! - [`Error::CompileError`] - Handlebars rejected a template source
//! - [`Error::RenderError`] - Handlebars failed while rendering a template
//! - [`Error::JsonError`] - Configuration or context JSON could not be converted
//!
//! # Cloning
//!
//! In-flight cache entries are shared between every caller waiting on the same
//! path, so a single failure has to be handed to all of them. `Error` is
//! therefore `Clone`; underlying sources are kept behind an [`Arc`].
//!
//! ```rust,ignore
//! use handlebars_views::{Error, HandlebarsEngine, EngineConfig, TemplateOptions};
//!
//! let engine = HandlebarsEngine::new(EngineConfig::default());
//! match engine.get_template("views/missing.handlebars", &TemplateOptions::default()).await {
//!     Err(Error::IoError { path, .. }) => println!("missing: {}", path.display()),
//!     Err(err) => println!("other error: {}", err),
//!     Ok(_) => {}
//! }
//! ```

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

/// Error type for all view engine operations
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// File system errors
    ///
    /// The message always starts with a description of the failure kind, so a
    /// missing file reads `no such file or directory, open '<path>'`.
    #[error("{}, {} '{}'", describe_io(.source), .operation, .path.display())]
    IoError {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// Invalid configuration or partials descriptor
    #[error("{0}")]
    ConfigurationError(Cow<'static, str>),

    /// Template source rejected by the Handlebars compiler
    #[error("Compile error in '{}': {source}", .path.display())]
    CompileError {
        path: PathBuf,
        #[source]
        source: Arc<handlebars::TemplateError>,
    },

    /// Failure while executing a compiled template
    #[error("Render error in '{}': {source}", .path.display())]
    RenderError {
        path: PathBuf,
        #[source]
        source: Arc<handlebars::RenderError>,
    },

    /// JSON conversion errors
    #[error("JSON error: {0}")]
    JsonError(#[source] Arc<serde_json::Error>),
}

impl Error {
    /// Create an IO error for an operation on `path`
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::IoError {
            operation,
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// Create a configuration error with a static string
    pub fn configuration_static(msg: &'static str) -> Self {
        Error::ConfigurationError(Cow::Borrowed(msg))
    }

    /// Create a configuration error with an owned string
    pub fn configuration_owned(msg: String) -> Self {
        Error::ConfigurationError(Cow::Owned(msg))
    }

    /// Wrap a Handlebars compile error for the template at `path`
    pub fn compile(path: &Path, source: handlebars::TemplateError) -> Self {
        Error::CompileError {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// Wrap a Handlebars render error for the template at `path`
    pub fn render(path: &Path, source: handlebars::RenderError) -> Self {
        Error::RenderError {
            path: path.to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// Whether this error was caused by a missing file or directory
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::IoError { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonError(Arc::new(err))
    }
}

fn describe_io(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "no such file or directory".to_string(),
        io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        _ => err.to_string(),
    }
}

/// Result type alias for handlebars-views operations
pub type Result<T> = std::result::Result<T, Error>;
