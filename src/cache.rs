// ABOUTME: Module cache keyed by absolute path with (size, mtime) freshness checks

use crate::ast::Module;
use crate::context::ExecContext;
use crate::env::Env;
use crate::error::EngineError;
use crate::parser;
use crate::value::Value;
use crate::vm::Vm;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

/// A module compiled against a fresh stdlib snapshot: its AST, top-level
/// environment and export map.
#[derive(Clone, Debug)]
pub struct Compiled {
    pub module: Rc<Module>,
    pub env: Rc<Env>,
    pub exports: Rc<HashMap<String, Value>>,
}

impl Compiled {
    pub fn get(&self, name: &str) -> Option<Value> {
        self.exports.get(name).cloned()
    }
}

struct CacheEntry {
    size: u64,
    mtime: SystemTime,
    comp: Compiled,
}

pub type StdlibProvider = Rc<dyn Fn() -> HashMap<String, Value>>;

/// Compiled modules are cached per absolute path and reused while the file's
/// (size, mtime) fingerprint matches. Loaded modules compile under a
/// sub-context with host I/O stripped, so they see only the pure stdlib.
pub struct ModuleCache {
    entries: RefCell<HashMap<PathBuf, CacheEntry>>,
    stdlib: RefCell<StdlibProvider>,
}

impl Default for ModuleCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleCache {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(HashMap::new()),
            stdlib: RefCell::new(Rc::new(crate::stdlib::stdlib)),
        }
    }

    /// Swap the prelude used for module compilation. Providers must return a
    /// fresh map per call so module envs never share mutable builtins.
    pub fn set_stdlib(&self, provider: StdlibProvider) {
        *self.stdlib.borrow_mut() = provider;
    }

    pub fn load(
        &self,
        ctx: &Rc<ExecContext>,
        base_dir: Option<&Path>,
        path: &str,
    ) -> Result<(Compiled, PathBuf), EngineError> {
        if path.is_empty() {
            return Err(EngineError::setup("module path must not be empty"));
        }

        let mut resolved = PathBuf::from(path);
        if resolved.is_relative() {
            if let Some(base) = base_dir {
                resolved = base.join(resolved);
            }
        }
        let abs = absolutize(&resolved).map_err(|e| EngineError::Module {
            path: path.to_string(),
            message: e,
        })?;

        let meta = std::fs::metadata(&abs).map_err(|e| EngineError::Module {
            path: abs.display().to_string(),
            message: format!("cannot stat module: {}", e),
        })?;
        let size = meta.len();
        let mtime = meta.modified().map_err(|e| EngineError::Module {
            path: abs.display().to_string(),
            message: format!("cannot read mtime: {}", e),
        })?;

        if let Some(entry) = self.entries.borrow().get(&abs) {
            if entry.size == size && entry.mtime == mtime {
                debug!("module cache hit: {}", abs.display());
                return Ok((entry.comp.clone(), abs));
            }
        }

        debug!("module cache miss, compiling: {}", abs.display());
        let source = match &ctx.read_file {
            Some(read_file) => read_file(&abs).map_err(|e| EngineError::Module {
                path: abs.display().to_string(),
                message: format!("cannot read module: {}", e),
            })?,
            None => std::fs::read_to_string(&abs).map_err(|e| EngineError::Module {
                path: abs.display().to_string(),
                message: format!("cannot read module: {}", e),
            })?,
        };

        let module = parser::parse_module(&source, &abs.display().to_string()).map_err(|err| {
            EngineError::Module {
                path: abs.display().to_string(),
                message: err.to_string(),
            }
        })?;

        // Modules compile without host I/O: no file hook, no base dir.
        let sub_ctx = ctx.sub_context();
        let prelude = Env::sealed((self.stdlib.borrow())());
        let module_env = Env::with_parent(prelude);
        let mut vm = Vm::new(sub_ctx);
        let exports = vm.run_module(&module, &module_env).map_err(|err| {
            EngineError::Module {
                path: abs.display().to_string(),
                message: err.to_string(),
            }
        })?;

        let comp = Compiled {
            module: Rc::new(module),
            env: module_env,
            exports: Rc::new(exports),
        };
        self.entries.borrow_mut().insert(
            abs.clone(),
            CacheEntry {
                size,
                mtime,
                comp: comp.clone(),
            },
        );
        Ok((comp, abs))
    }
}

/// Lexical path cleaning plus absolutization against the current directory.
fn absolutize(path: &Path) -> Result<PathBuf, String> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| format!("cannot resolve working directory: {}", e))?
            .join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, Limits};
    use serial_test::serial;
    use std::fs;

    fn test_dir() -> PathBuf {
        let dir = std::env::temp_dir().join("reqscript_cache_tests");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn exec() -> Rc<ExecContext> {
        ExecContext::new(Limits::default(), &Context::default())
    }

    #[test]
    #[serial]
    fn test_load_compiles_and_exposes_exports() {
        let dir = test_dir();
        fs::write(dir.join("util.rsl"), "export fn double(n) { return n * 2 }\nexport let tag = 'v1'").unwrap();

        let cache = ModuleCache::new();
        let (comp, abs) = cache.load(&exec(), Some(&dir), "util.rsl").unwrap();
        assert!(abs.is_absolute());
        assert!(comp.get("double").is_some());
        assert!(matches!(comp.get("tag"), Some(Value::Str(s)) if s == "v1"));
        assert!(comp.get("private").is_none());
    }

    #[test]
    #[serial]
    fn test_fingerprint_reuses_compilation() {
        let dir = test_dir();
        let path = dir.join("mod.rsl");
        fs::write(&path, "export let n = 1").unwrap();

        let cache = ModuleCache::new();
        let (first, _) = cache.load(&exec(), Some(&dir), "mod.rsl").unwrap();
        let (second, _) = cache.load(&exec(), Some(&dir), "mod.rsl").unwrap();
        // same Rc means the cache returned the same compilation
        assert!(Rc::ptr_eq(&first.exports, &second.exports));
    }

    #[test]
    #[serial]
    fn test_changed_file_recompiles() {
        let dir = test_dir();
        let path = dir.join("mod.rsl");
        fs::write(&path, "export let n = 1").unwrap();

        let cache = ModuleCache::new();
        let (first, _) = cache.load(&exec(), Some(&dir), "mod.rsl").unwrap();

        // a different size guarantees a fingerprint change even when the
        // filesystem's mtime granularity is coarse
        fs::write(&path, "export let n = 22").unwrap();
        let (second, _) = cache.load(&exec(), Some(&dir), "mod.rsl").unwrap();
        assert!(!Rc::ptr_eq(&first.exports, &second.exports));
        assert!(matches!(second.get("n"), Some(Value::Number(n)) if n == 22.0));
    }

    #[test]
    #[serial]
    fn test_missing_module_reports_path() {
        let dir = test_dir();
        let cache = ModuleCache::new();
        let err = cache.load(&exec(), Some(&dir), "nope.rsl").unwrap_err();
        match err {
            EngineError::Module { path, message } => {
                assert!(path.contains("nope.rsl"));
                assert!(message.contains("cannot stat"));
            }
            other => panic!("Expected module error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_parse_error_reports_path() {
        let dir = test_dir();
        fs::write(dir.join("bad.rsl"), "let = 3").unwrap();
        let cache = ModuleCache::new();
        let err = cache.load(&exec(), Some(&dir), "bad.rsl").unwrap_err();
        match err {
            EngineError::Module { message, .. } => assert!(message.contains("parse error")),
            other => panic!("Expected module error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_modules_compile_without_host_io() {
        let dir = test_dir();
        fs::write(dir.join("io.rsl"), "export let data = json.file('x.json')").unwrap();

        let ctx = Context {
            read_file: Some(Rc::new(|path: &Path| {
                std::fs::read_to_string(path)
            })),
            base_dir: Some(std::env::temp_dir()),
            ..Context::default()
        };
        let exec = ExecContext::new(Limits::default(), &ctx);

        let cache = ModuleCache::new();
        let err = cache.load(&exec, Some(&dir), "io.rsl").unwrap_err();
        match err {
            EngineError::Module { message, .. } => {
                assert!(message.contains("file access is not available"));
            }
            other => panic!("Expected module error, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_relative_paths_resolve_against_base_dir() {
        let dir = test_dir();
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/inner.rsl"), "export let ok = true").unwrap();

        let cache = ModuleCache::new();
        let (comp, abs) = cache
            .load(&exec(), Some(&dir), "sub/../sub/inner.rsl")
            .unwrap();
        assert!(matches!(comp.get("ok"), Some(Value::Bool(true))));
        assert!(!abs.display().to_string().contains(".."));
    }
}
