//! Host services the core library reaches through: output and script loading

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::loader::{FileSystemScriptLoader, ScriptLoader};

/// Receives each line written by `print`.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

pub(crate) struct Platform {
    loader: RwLock<Arc<dyn ScriptLoader>>,
    output: RwLock<OutputSink>,
    module_paths: RwLock<Vec<String>>,
    rng: Mutex<StdRng>,
}

impl Platform {
    pub(crate) fn new(module_paths: Vec<String>) -> Self {
        Self {
            loader: RwLock::new(Arc::new(FileSystemScriptLoader::new())),
            output: RwLock::new(Arc::new(|line: &str| println!("{}", line))),
            module_paths: RwLock::new(module_paths),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub(crate) fn loader(&self) -> Arc<dyn ScriptLoader> {
        self.loader.read().clone()
    }

    pub(crate) fn set_loader(&self, loader: Arc<dyn ScriptLoader>) {
        *self.loader.write() = loader;
    }

    pub(crate) fn write_line(&self, line: &str) {
        let sink = self.output.read().clone();
        sink(line);
    }

    pub(crate) fn set_output(&self, sink: OutputSink) {
        *self.output.write() = sink;
    }

    pub(crate) fn module_paths(&self) -> Vec<String> {
        self.module_paths.read().clone()
    }

    pub(crate) fn set_module_paths(&self, paths: Vec<String>) {
        *self.module_paths.write() = paths;
    }

    /// Uniform float in `[0, 1)`.
    pub(crate) fn random(&self) -> f64 {
        self.rng.lock().gen::<f64>()
    }

    /// Uniform integer in `[low, high]`.
    pub(crate) fn random_range(&self, low: i64, high: i64) -> i64 {
        self.rng.lock().gen_range(low..=high)
    }

    pub(crate) fn reseed(&self, seed: u64) {
        *self.rng.lock() = StdRng::seed_from_u64(seed);
    }
}
