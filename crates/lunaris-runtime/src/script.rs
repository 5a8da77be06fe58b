//! The script session
//!
//! A [`Script`] owns one [`ScriptState`] (code store, globals, type
//! metatables) and the main [`Processor`] running on it. Everything a host
//! does with scripts goes through here: compiling, running, calling back into
//! returned functions, coroutines, modules and host objects.
//!
//! # Example
//!
//! ```rust,ignore
//! use lunaris_runtime::Script;
//!
//! let mut script = Script::new();
//! script.do_string("function double(x) return x * 2 end")?;
//! let double = script.globals().get_str("double");
//! let result = script.call(&double, vec![21.0.into()])?;
//! assert_eq!(result.as_number(), Some(42.0));
//! ```

use std::any::Any;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use lunaris_engine::{
    Coroutine, DataType, DynValue, ExecutionControlToken, HostEvent, Processor, ScriptError,
    ScriptResult, ScriptState, Table, UserData, UserDataDescriptor, UserDataRegistry,
};

use crate::corelib;
use crate::loader::ScriptLoader;
use crate::options::ScriptOptions;
use crate::platform::{OutputSink, Platform};

/// A script session.
///
/// Not reentrant: one call runs at a time. Run several sessions for
/// parallelism, or share one behind a mutex (see [`crate::SharedScript`]).
pub struct Script {
    state: Arc<ScriptState>,
    processor: Processor,
    options: ScriptOptions,
    platform: Arc<Platform>,
    chunk_counter: usize,
}

impl Script {
    pub fn new() -> Self {
        let (script, installed) = Self::assemble(ScriptOptions::default());
        debug_assert!(installed.is_ok(), "default core library failed to install");
        if let Err(e) = installed {
            log::error!("core library installation failed: {}", e);
        }
        script
    }

    /// A session configured by `options`.
    ///
    /// Fails if the core library selected by `options.core_modules` cannot
    /// be installed.
    pub fn with_options(options: ScriptOptions) -> ScriptResult<Self> {
        let (script, installed) = Self::assemble(options);
        installed.map(|()| script)
    }

    fn assemble(options: ScriptOptions) -> (Self, ScriptResult<()>) {
        let state = ScriptState::new(options.engine_options());
        let platform = Arc::new(Platform::new(options.module_paths.clone()));
        let installed = corelib::install(&state, &options.core_modules, &platform);
        let script = Self {
            processor: Processor::new(state.clone()),
            state,
            options,
            platform,
            chunk_counter: 0,
        };
        (script, installed)
    }

    pub fn options(&self) -> &ScriptOptions {
        &self.options
    }

    pub fn state(&self) -> &Arc<ScriptState> {
        &self.state
    }

    pub fn globals(&self) -> Table {
        self.state.globals()
    }

    pub fn get_global(&self, name: &str) -> DynValue {
        self.globals().get_str(name)
    }

    pub fn set_global(&self, name: &str, value: DynValue) {
        self.globals().set_str(name, value);
    }

    /// Replace the loader used by `require`, `load_file` and `do_file`.
    pub fn set_loader(&self, loader: Arc<dyn ScriptLoader>) {
        self.platform.set_loader(loader);
    }

    pub fn loader(&self) -> Arc<dyn ScriptLoader> {
        self.platform.loader()
    }

    /// Redirect `print`. The default writes to stdout.
    pub fn set_output<F>(&self, sink: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let sink: OutputSink = Arc::new(sink);
        self.platform.set_output(sink);
    }

    pub fn set_module_paths(&mut self, paths: Vec<String>) {
        self.platform.set_module_paths(paths.clone());
        self.options.module_paths = paths;
    }

    fn chunk_name(&mut self, name: Option<&str>) -> String {
        self.chunk_counter += 1;
        match name {
            Some(name) => name.to_string(),
            None => format!("chunk_{}", self.chunk_counter),
        }
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Compile `code` into a function without running it.
    ///
    /// `env` replaces the globals for the chunk; `name` shows up in error
    /// locations.
    pub fn load_string(&mut self, code: &str, env: Option<Table>, name: Option<&str>) -> ScriptResult<DynValue> {
        let name = self.chunk_name(name);
        Ok(self.state.load_chunk(strip_shebang(code), &name, env)?)
    }

    /// Compile the source of a single `function (...) ... end` expression.
    pub fn load_function(&mut self, code: &str, env: Option<Table>, name: Option<&str>) -> ScriptResult<DynValue> {
        let name = self.chunk_name(name);
        let chunk = self.state.load_function_chunk(code, &name, env)?;
        Ok(self.processor.call(&chunk, Vec::new())?.to_scalar())
    }

    /// Compile a file read through the current loader. The path is the
    /// default chunk name.
    pub fn load_file(&mut self, path: impl AsRef<Path>, env: Option<Table>, name: Option<&str>) -> ScriptResult<DynValue> {
        let path = path.as_ref().to_string_lossy().into_owned();
        let source = self.platform.loader().load_source(&path)?;
        let name = name.unwrap_or(&path).to_string();
        self.load_string(&source, env, Some(&name))
    }

    pub fn load_stream<R: Read>(&mut self, mut reader: R, env: Option<Table>, name: Option<&str>) -> ScriptResult<DynValue> {
        let mut source = String::new();
        reader.read_to_string(&mut source)?;
        self.load_string(&source, env, name)
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Compile and run `code`, returning what the chunk returns.
    pub fn do_string(&mut self, code: &str) -> ScriptResult<DynValue> {
        let function = self.load_string(code, None, None)?;
        self.call(&function, Vec::new())
    }

    pub fn do_file(&mut self, path: impl AsRef<Path>) -> ScriptResult<DynValue> {
        let function = self.load_file(path, None, None)?;
        self.call(&function, Vec::new())
    }

    pub fn do_stream<R: Read>(&mut self, reader: R) -> ScriptResult<DynValue> {
        let function = self.load_stream(reader, None, None)?;
        self.call(&function, Vec::new())
    }

    /// Call a script function or callback value. Multiple results come back
    /// as a tuple.
    pub fn call(&mut self, function: &DynValue, args: Vec<DynValue>) -> ScriptResult<DynValue> {
        self.processor.call(function, args)
    }

    /// Like [`Script::call`], aborting with [`ScriptError::Cancelled`] once
    /// `token` is terminated and the script reaches a check point.
    pub fn call_with_token(
        &mut self,
        function: &DynValue,
        args: Vec<DynValue>,
        token: ExecutionControlToken,
    ) -> ScriptResult<DynValue> {
        self.processor.call_with_token(function, args, token)
    }

    /// Call the global function `name`.
    pub fn call_global(&mut self, name: &str, args: Vec<DynValue>) -> ScriptResult<DynValue> {
        let function = self.get_global(name);
        if function.is_nil() {
            return Err(ScriptError::runtime(format!("attempt to call a nil value (global '{}')", name)));
        }
        self.call(&function, args)
    }

    // ========================================================================
    // Coroutines
    // ========================================================================

    pub fn create_coroutine(&self, function: DynValue) -> ScriptResult<DynValue> {
        if !function.is_callable() {
            return Err(ScriptError::runtime(format!(
                "cannot create a coroutine from a {} value",
                function.type_name()
            )));
        }
        Ok(DynValue::Coroutine(Coroutine::new(self.state.clone(), function)))
    }

    /// Resume a coroutine from the host. Returns the yielded or returned values.
    pub fn resume(&self, coroutine: &DynValue, args: Vec<DynValue>) -> ScriptResult<DynValue> {
        let coroutine = coroutine.as_coroutine().ok_or_else(|| {
            ScriptError::runtime(format!("cannot resume a {} value", coroutine.type_name()))
        })?;
        coroutine.resume(args, ExecutionControlToken::dummy(), None)
    }

    // ========================================================================
    // Modules
    // ========================================================================

    /// Resolve and compile module `name` without running it or touching
    /// `package.loaded`.
    pub fn require_module(&self, name: &str, env: Option<Table>) -> ScriptResult<DynValue> {
        corelib::load_module(&self.platform, &self.state, name, env)
    }

    // ========================================================================
    // Type metatables
    // ========================================================================

    pub fn set_type_metatable(&self, data_type: DataType, metatable: Option<Table>) -> ScriptResult<()> {
        self.state.set_type_metatable(data_type, metatable)
    }

    pub fn get_type_metatable(&self, data_type: DataType) -> Option<Table> {
        self.state.type_metatable(data_type)
    }

    // ========================================================================
    // Host objects
    // ========================================================================

    /// Expose the static side of `T` (static methods, constants, the
    /// constructor) as global `name`. `T` must have a registered descriptor.
    pub fn register_type<T: Any>(&self, name: &str) -> ScriptResult<()> {
        let value = UserDataRegistry::static_type::<T>()?;
        self.set_global(name, value);
        Ok(())
    }

    /// Expose `instance` as global `name` through the descriptor registered for `T`.
    pub fn register_object<T: Any + Send + Sync>(&self, name: &str, instance: T) -> ScriptResult<DynValue> {
        let value = UserDataRegistry::wrap(instance)?;
        self.set_global(name, value.clone());
        Ok(value)
    }

    /// Expose `instance` under an explicit descriptor, e.g. a proxy or a composite.
    pub fn register_object_with<T: Any + Send + Sync>(
        &self,
        name: &str,
        instance: T,
        descriptor: Arc<dyn UserDataDescriptor>,
    ) -> DynValue {
        let value = DynValue::UserData(UserData::new(instance, descriptor));
        self.set_global(name, value.clone());
        value
    }

    /// Call every handler of `event` in subscription order.
    pub fn raise_event(&mut self, event: &HostEvent, args: Vec<DynValue>) -> ScriptResult<()> {
        for handler in event.handlers() {
            self.processor.call(&handler, args.clone())?;
        }
        Ok(())
    }

    // ========================================================================
    // Reset
    // ========================================================================

    /// Drop all compiled code and globals, then reinstall the core library.
    ///
    /// Functions obtained before the reset fail when called. Type metatables
    /// and everything the host added with [`Script::register_type`],
    /// [`Script::register_object`] or [`Script::set_global`] are gone too;
    /// register them again after the reset.
    pub fn reset(&mut self) -> ScriptResult<()> {
        self.state.reset();
        corelib::install(&self.state, &self.options.core_modules, &self.platform)?;
        self.processor = Processor::new(self.state.clone());
        Ok(())
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("state", &self.state)
            .field("options", &self.options)
            .finish()
    }
}

/// Blank out a leading `#!` line, keeping line numbers intact.
fn strip_shebang(code: &str) -> &str {
    if code.starts_with("#!") {
        match code.find('\n') {
            Some(end) => &code[end..],
            None => "",
        }
    } else {
        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shebang_keeps_line_numbers() {
        assert_eq!(strip_shebang("#!/usr/bin/env lunaris\nreturn 1"), "\nreturn 1");
        assert_eq!(strip_shebang("return 1"), "return 1");
    }

    #[test]
    fn test_chunk_names_are_numbered() {
        let mut script = Script::new();
        let err = script.do_string("error('x')").unwrap_err();
        assert_eq!(err.to_string(), "chunk_1:1: x");
    }
}
