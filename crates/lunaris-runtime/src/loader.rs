//! Module resolution for `require` and `Script::load_file`

use std::path::Path;

use lunaris_engine::{ScriptError, ScriptResult};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Finds and reads script sources.
pub trait ScriptLoader: Send + Sync {
    /// Path (or key) of module `name`, searched through `?`-templates.
    fn resolve_module_name(&self, name: &str, paths: &[String]) -> Option<String>;

    /// Source text at `path`.
    fn load_source(&self, path: &str) -> ScriptResult<String>;

    fn exists(&self, path: &str) -> bool;
}

/// Expand `?` in every template with `name`, dots turned into separators.
pub fn module_candidates(name: &str, paths: &[String]) -> Vec<String> {
    let file_name = name.replace('.', "/");
    paths.iter().map(|template| template.replace('?', &file_name)).collect()
}

/// Loads scripts from disk.
#[derive(Debug, Default, Clone)]
pub struct FileSystemScriptLoader;

impl FileSystemScriptLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ScriptLoader for FileSystemScriptLoader {
    fn resolve_module_name(&self, name: &str, paths: &[String]) -> Option<String> {
        let found = module_candidates(name, paths)
            .into_iter()
            .find(|candidate| self.exists(candidate));
        match &found {
            Some(path) => log::debug!("module '{}' resolved to {}", name, path),
            None => log::debug!("module '{}' not found in {} search paths", name, paths.len()),
        }
        found
    }

    fn load_source(&self, path: &str) -> ScriptResult<String> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }
}

/// Serves scripts from a name to source map; useful for embedding and tests.
#[derive(Debug, Default)]
pub struct InMemoryScriptLoader {
    sources: RwLock<FxHashMap<String, String>>,
}

impl InMemoryScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module(self, name: &str, source: &str) -> Self {
        self.add(name, source);
        self
    }

    pub fn add(&self, name: &str, source: &str) {
        self.sources.write().insert(name.to_string(), source.to_string());
    }

    pub fn remove(&self, name: &str) -> Option<String> {
        self.sources.write().remove(name)
    }
}

impl ScriptLoader for InMemoryScriptLoader {
    /// Modules are found under their plain name first, then through the templates.
    fn resolve_module_name(&self, name: &str, paths: &[String]) -> Option<String> {
        if self.exists(name) {
            return Some(name.to_string());
        }
        module_candidates(name, paths)
            .into_iter()
            .find(|candidate| self.exists(candidate))
    }

    fn load_source(&self, path: &str) -> ScriptResult<String> {
        self.sources
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| ScriptError::runtime(format!("cannot open script '{}'", path)))
    }

    fn exists(&self, path: &str) -> bool {
        self.sources.read().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_replace_dots() {
        let paths = vec!["?.lua".to_string(), "lib/?/init.lua".to_string()];
        assert_eq!(
            module_candidates("a.b", &paths),
            vec!["a/b.lua".to_string(), "lib/a/b/init.lua".to_string()]
        );
    }

    #[test]
    fn test_file_system_loader_resolves_first_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("modules")).unwrap();
        std::fs::write(dir.path().join("modules").join("util.lua"), "return 1").unwrap();

        let base = dir.path().to_string_lossy().into_owned();
        let paths = vec![format!("{}/?.lua", base), format!("{}/modules/?.lua", base)];
        let loader = FileSystemScriptLoader::new();
        let path = loader.resolve_module_name("util", &paths).unwrap();
        assert!(path.ends_with("util.lua"));
        assert_eq!(loader.load_source(&path).unwrap(), "return 1");
        assert!(loader.resolve_module_name("missing", &paths).is_none());
    }

    #[test]
    fn test_in_memory_loader() {
        let loader = InMemoryScriptLoader::new().with_module("config", "return {}");
        assert_eq!(loader.resolve_module_name("config", &[]), Some("config".to_string()));
        assert!(loader.load_source("other").is_err());
    }
}
