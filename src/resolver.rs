//! Template and partial resolution
//!
//! [`TemplateResolver`] turns paths into compiled templates. Reading and
//! compiling a file form one cached unit, keyed by the file's absolute path,
//! with separate caches for compiled and precompiled output.

use std::path::Path;
use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::cache::{EngineCacheStats, FileCache, PendingCache};
use crate::compiler::Compiler;
use crate::error::Result;
use crate::partials::{template_name, PartialSource, PartialsDir};
use crate::types::{
    CompiledTemplate, CompilerOptions, Encoding, PartialMap, PrecompiledTemplate, TemplateMap,
    TemplateOptions,
};
use crate::utils::absolute_path;

pub struct TemplateResolver {
    extname: String,
    encoding: Encoding,
    compiler_options: CompilerOptions,
    files: Arc<FileCache>,
    compiled: PendingCache<CompiledTemplate>,
    precompiled: PendingCache<PrecompiledTemplate>,
}

impl TemplateResolver {
    pub fn new(extname: &str, encoding: Encoding, compiler_options: CompilerOptions) -> Self {
        Self {
            extname: extname.to_string(),
            encoding,
            compiler_options,
            files: Arc::new(FileCache::new()),
            compiled: PendingCache::new(),
            precompiled: PendingCache::new(),
        }
    }

    fn encoding(&self, options: &TemplateOptions) -> Encoding {
        options.encoding.unwrap_or(self.encoding)
    }

    pub async fn read_file(&self, path: &Path, options: &TemplateOptions) -> Result<String> {
        let text = self
            .files
            .read_file(path, options.cache, self.encoding(options))
            .await?;
        Ok(text.to_string())
    }

    pub async fn list_files(&self, dir: &Path, options: &TemplateOptions) -> Result<Vec<String>> {
        self.files.list_files(dir, &self.extname, options.cache).await
    }

    pub async fn get_template(&self, path: &Path, options: &TemplateOptions) -> Result<CompiledTemplate> {
        let key = absolute_path(path)?;
        let files = self.files.clone();
        let compiler_options = self.compiler_options.clone();
        let encoding = self.encoding(options);
        let cache = options.cache;
        let target = key.clone();

        self.compiled
            .get_or_load(key, cache, async move {
                let source = files.read_file(&target, cache, encoding).await?;
                debug!(template = %target.display(), "compiling template");
                Compiler::compile(&target, &source, &compiler_options)
            })
            .await
    }

    pub async fn get_precompiled_template(
        &self,
        path: &Path,
        options: &TemplateOptions,
    ) -> Result<PrecompiledTemplate> {
        let key = absolute_path(path)?;
        let files = self.files.clone();
        let compiler_options = self.compiler_options.clone();
        let encoding = self.encoding(options);
        let cache = options.cache;
        let target = key.clone();

        self.precompiled
            .get_or_load(key, cache, async move {
                let source = files.read_file(&target, cache, encoding).await?;
                debug!(template = %target.display(), "precompiling template");
                Compiler::precompile(&target, &source, &compiler_options)
            })
            .await
    }

    /// Compile every template under `dir`, keyed by relative path in listing order
    pub async fn get_templates(&self, dir: &Path, options: &TemplateOptions) -> Result<TemplateMap> {
        let file_paths = self.list_files(dir, options).await?;

        let loads = file_paths.iter().map(|file_path| {
            let path = dir.join(file_path);
            async move { self.get_template(&path, options).await }
        });
        let results = join_all(loads).await;

        let mut templates = TemplateMap::with_capacity(file_paths.len());
        for (file_path, template) in file_paths.into_iter().zip(results) {
            templates.insert(file_path, template?);
        }
        Ok(templates)
    }

    /// Resolve a partials setting into a flat name-to-template map
    pub async fn get_partials(
        &self,
        partials_dir: Option<&PartialsDir>,
        options: &TemplateOptions,
    ) -> Result<PartialMap> {
        let Some(partials_dir) = partials_dir else {
            return Ok(PartialMap::new());
        };
        let sources = partials_dir.sources()?;

        let loads = sources.iter().map(|source| self.load_source(source, options));
        let resolved = join_all(loads).await;

        let mut partials = PartialMap::new();
        for (source, templates) in sources.iter().zip(resolved) {
            for (file_path, template) in templates? {
                let name = template_name(&file_path, source.namespace, &self.extname, source.rename);
                if partials.insert(name.clone(), template).is_some() {
                    debug!(partial = %name, "partial replaced by a later partials source");
                }
            }
        }

        Ok(partials)
    }

    async fn load_source(&self, source: &PartialSource<'_>, options: &TemplateOptions) -> Result<TemplateMap> {
        match (source.templates, source.dir) {
            (Some(templates), _) => Ok(templates.clone()),
            (None, Some(dir)) => self.get_templates(dir, options).await,
            (None, None) => Ok(TemplateMap::new()),
        }
    }

    pub fn is_cached(&self, path: &Path, precompiled: bool) -> bool {
        let Ok(key) = absolute_path(path) else {
            return false;
        };
        if precompiled {
            self.precompiled.contains(&key)
        } else {
            self.compiled.contains(&key)
        }
    }

    pub fn stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            compiled_templates: self.compiled.stats(),
            precompiled_templates: self.precompiled.stats(),
            files: self.files.file_stats(),
            directories: self.files.directory_stats(),
        }
    }
}
