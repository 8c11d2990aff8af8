//! Path helpers shared by the caches, the resolver and the view adapter
//!
//! Cache keys must be stable across spellings of the same file, so every
//! path entering the engine goes through [`absolute_path`] first. The
//! normalization is purely lexical: symlinks are not resolved, which mirrors
//! how the directory walker reports files.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve `path` against the current directory and remove `.`/`..` segments
pub fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(normalize_path(path));
    }
    let cwd = std::env::current_dir().map_err(|e| Error::io("getcwd", path, e))?;
    Ok(normalize_path(&cwd.join(path)))
}

/// Lexically normalize a path
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                // `/..` is `/`
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            c => components.push(c),
        }
    }

    if components.is_empty() {
        return PathBuf::from(".");
    }
    components.iter().collect()
}

/// Express `path` relative to `base`, inserting `..` where needed
///
/// Both paths are expected to be absolute and normalized.
pub fn relative_path(base: &Path, path: &Path) -> PathBuf {
    let base: Vec<_> = base.components().collect();
    let target: Vec<_> = path.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base.len() {
        relative.push("..");
    }
    for component in &target[common..] {
        relative.push(component.as_os_str());
    }
    relative
}

/// Render a relative path with `/` separators regardless of platform
pub fn to_forward_slashes(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Prefix `extname` with a `.` when it does not already start with one
pub fn normalize_extname(extname: &str) -> String {
    if extname.starts_with('.') {
        extname.to_string()
    } else {
        format!(".{}", extname)
    }
}

/// Strip `extname` from the end of `name` when present
pub fn strip_extname<'a>(name: &'a str, extname: &str) -> &'a str {
    name.strip_suffix(extname).unwrap_or(name)
}
