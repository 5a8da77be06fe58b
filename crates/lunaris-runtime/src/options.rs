//! Script configuration
//!
//! Options are plain serde structs so they can be loaded from a
//! `lunaris.toml` file:
//!
//! ```toml
//! module_paths = ["?.lua", "lib/?.lua"]
//! max_call_depth = 2000
//! zero_step = "allow"
//!
//! [core_modules]
//! sleep = false
//! ```

use std::path::Path;

use lunaris_engine::{EngineOptions, ZeroStepPolicy};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which parts of the core library a script gets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreModules {
    pub basic: bool,
    pub coroutine: bool,
    pub string: bool,
    pub table: bool,
    pub math: bool,
    pub sleep: bool,
    /// `load` and `require`
    pub load: bool,
}

impl Default for CoreModules {
    fn default() -> Self {
        Self {
            basic: true,
            coroutine: true,
            string: true,
            table: true,
            math: true,
            sleep: true,
            load: true,
        }
    }
}

impl CoreModules {
    /// Only the side-effect free basics: no `load`, `require` or `sleep`.
    pub fn sandboxed() -> Self {
        Self {
            sleep: false,
            load: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroStep {
    Error,
    Allow,
}

impl From<ZeroStep> for ZeroStepPolicy {
    fn from(value: ZeroStep) -> Self {
        match value {
            ZeroStep::Error => ZeroStepPolicy::Error,
            ZeroStep::Allow => ZeroStepPolicy::Allow,
        }
    }
}

/// Options of a [`crate::Script`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptOptions {
    /// `?`-templates searched by the file-system module loader
    pub module_paths: Vec<String>,
    /// Script call frames allowed before "stack overflow"
    pub max_call_depth: usize,
    /// Nested host-to-script re-entries allowed
    pub max_host_reentrancy: usize,
    pub core_modules: CoreModules,
    /// Behaviour of a numeric `for` whose step is zero at run time
    pub zero_step: ZeroStep,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        let engine = EngineOptions::default();
        Self {
            module_paths: default_module_paths(),
            max_call_depth: engine.max_call_depth,
            max_host_reentrancy: engine.max_host_reentrancy,
            core_modules: CoreModules::default(),
            zero_step: ZeroStep::Error,
        }
    }
}

impl ScriptOptions {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            max_call_depth: self.max_call_depth,
            max_host_reentrancy: self.max_host_reentrancy,
            zero_step: self.zero_step.into(),
        }
    }
}

/// `?`, `?.lua`, `modules/?.lua`, then `~/.lunaris/modules/?.lua`.
pub fn default_module_paths() -> Vec<String> {
    let mut paths = vec!["?".to_string(), "?.lua".to_string(), "modules/?.lua".to_string()];
    if let Some(home) = dirs::home_dir() {
        let global = home.join(".lunaris").join("modules").join("?.lua");
        paths.push(global.to_string_lossy().into_owned());
    }
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let options = ScriptOptions::from_toml_str("max_call_depth = 200").unwrap();
        assert_eq!(options.max_call_depth, 200);
        assert_eq!(options.core_modules, CoreModules::default());
        assert_eq!(options.zero_step, ZeroStep::Error);
        assert!(options.module_paths.contains(&"?.lua".to_string()));
    }

    #[test]
    fn test_nested_tables() {
        let text = r#"
            module_paths = ["lib/?.lua"]
            zero_step = "allow"

            [core_modules]
            sleep = false
            load = false
        "#;
        let options = ScriptOptions::from_toml_str(text).unwrap();
        assert_eq!(options.module_paths, vec!["lib/?.lua".to_string()]);
        assert_eq!(options.engine_options().zero_step, ZeroStepPolicy::Allow);
        assert!(!options.core_modules.sleep);
        assert!(options.core_modules.math);
    }

    #[test]
    fn test_invalid_types_are_reported() {
        let err = ScriptOptions::from_toml_str("max_call_depth = 'deep'").unwrap_err();
        assert!(err.to_string().starts_with("invalid configuration"));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let options = ScriptOptions {
            max_call_depth: 10,
            ..ScriptOptions::default()
        };
        let parsed = ScriptOptions::from_toml_str(&options.to_toml_string()).unwrap();
        assert_eq!(parsed, options);
    }
}
