// ABOUTME: Module use-directive tests: aliasing, caching, isolation from host I/O

use reqscript::{Context, Engine, EngineError, Origin, Runtime, UseDirective, Value};
use serial_test::serial;
use std::fs;
use std::path::PathBuf;

fn test_dir() -> PathBuf {
    let dir = std::env::temp_dir().join("reqscript_uses_tests");
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn origin() -> Origin {
    Origin::new("requests.http", 1, 1)
}

#[test]
#[serial]
fn test_use_binds_module_alias() {
    let dir = test_dir();
    fs::write(
        dir.join("util.rsl"),
        "export fn double(n) { return n * 2 }\nexport let greeting = 'hi'",
    )
    .unwrap();

    let ctx = Context {
        base_dir: Some(dir),
        ..Context::default()
    };
    let rt = Runtime {
        uses: vec![UseDirective {
            alias: "util".to_string(),
            path: "util.rsl".to_string(),
        }],
        ..Runtime::default()
    };

    let engine = Engine::new();
    let value = engine.eval(&ctx, &rt, "util.double(21)", &origin()).unwrap();
    assert!(matches!(value, Value::Number(n) if n == 42.0));
    let value = engine.eval(&ctx, &rt, "util['greeting']", &origin()).unwrap();
    assert!(matches!(value, Value::Str(s) if s == "hi"));
    // missing exports surface as null through member access
    let value = engine.eval(&ctx, &rt, "util.nope", &origin()).unwrap();
    assert!(value.is_null());
}

#[test]
#[serial]
fn test_module_closures_keep_module_state() {
    let dir = test_dir();
    fs::write(
        dir.join("counts.rsl"),
        "let base = 40\nexport fn plus(n) { return base + n }",
    )
    .unwrap();

    let ctx = Context {
        base_dir: Some(dir),
        ..Context::default()
    };
    let rt = Runtime {
        uses: vec![UseDirective {
            alias: "counts".to_string(),
            path: "counts.rsl".to_string(),
        }],
        ..Runtime::default()
    };

    let value = Engine::new().eval(&ctx, &rt, "counts.plus(2)", &origin()).unwrap();
    assert!(matches!(value, Value::Number(n) if n == 42.0));
}

#[test]
#[serial]
fn test_alias_validation() {
    let dir = test_dir();
    fs::write(dir.join("m.rsl"), "export let x = 1").unwrap();
    let ctx = Context {
        base_dir: Some(dir),
        ..Context::default()
    };

    let rt = Runtime {
        uses: vec![UseDirective {
            alias: String::new(),
            path: "m.rsl".to_string(),
        }],
        ..Runtime::default()
    };
    let err = Engine::new().eval(&ctx, &rt, "1", &origin()).unwrap_err();
    assert!(matches!(err, EngineError::Setup { .. }));

    // alias colliding with a stdlib name is rejected
    let rt = Runtime {
        uses: vec![UseDirective {
            alias: "json".to_string(),
            path: "m.rsl".to_string(),
        }],
        ..Runtime::default()
    };
    let err = Engine::new().eval(&ctx, &rt, "1", &origin()).unwrap_err();
    match err {
        EngineError::Setup { message } => assert!(message.contains("collides")),
        other => panic!("Expected setup error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_module_errors_carry_absolute_path() {
    let dir = test_dir();
    fs::write(dir.join("broken.rsl"), "export let = ").unwrap();
    let ctx = Context {
        base_dir: Some(dir.clone()),
        ..Context::default()
    };
    let rt = Runtime {
        uses: vec![UseDirective {
            alias: "broken".to_string(),
            path: "broken.rsl".to_string(),
        }],
        ..Runtime::default()
    };
    let err = Engine::new().eval(&ctx, &rt, "1", &origin()).unwrap_err();
    match err {
        EngineError::Module { path, message } => {
            assert!(PathBuf::from(&path).is_absolute());
            assert!(path.ends_with("broken.rsl"));
            assert!(message.contains("parse error"));
        }
        other => panic!("Expected module error, got {:?}", other),
    }
}

#[test]
#[serial]
fn test_modules_cannot_reach_host_objects() {
    let dir = test_dir();
    // `env` is a host binding of the top-level evaluation, not of modules
    fs::write(dir.join("sneaky.rsl"), "export let leak = env").unwrap();
    let ctx = Context {
        base_dir: Some(dir),
        ..Context::default()
    };
    let rt = Runtime {
        uses: vec![UseDirective {
            alias: "sneaky".to_string(),
            path: "sneaky.rsl".to_string(),
        }],
        ..Runtime::default()
    };
    let err = Engine::new().eval(&ctx, &rt, "1", &origin()).unwrap_err();
    match err {
        EngineError::Module { message, .. } => assert!(message.contains("undefined name: env")),
        other => panic!("Expected module error, got {:?}", other),
    }
}
