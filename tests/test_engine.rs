use std::io::Write;
use std::time::{Duration, Instant};

use rhai::Dynamic;
use scriptbox::{format_script, value, EngineConfig, ScriptEngine, ScriptError};

fn engine(source: &str) -> ScriptEngine {
    ScriptEngine::new(source, "", EngineConfig::default()).expect("script should compile")
}

fn run(engine: &ScriptEngine, entry: &str) -> Result<Dynamic, ScriptError> {
    engine.run(Duration::from_secs(5), entry, vec![])
}

#[test]
fn program_result_is_the_final_expression() {
    let engine = engine(r#""Done!""#);
    let out = run(&engine, "").unwrap();
    assert_eq!(out.to_string(), "Done!");
}

#[test]
fn compile_error_is_reported_up_front() {
    let err = ScriptEngine::new("fn {", "", EngineConfig::default()).unwrap_err();
    assert!(matches!(err, ScriptError::Compile(_)));
}

#[test]
fn entry_function_receives_arguments() {
    let engine = engine("fn add(a, b) { a + b }");
    let out = engine
        .run(
            Duration::from_secs(5),
            "add",
            vec![Dynamic::from(2_i64), Dynamic::from(3_i64)],
        )
        .unwrap();
    assert_eq!(out.as_int().unwrap(), 5);
}

#[test]
fn undefined_entry_function_is_a_script_error() {
    let engine = engine(r#"fn main() { "ok" }"#);
    let err = run(&engine, "nope").unwrap_err();
    match err {
        ScriptError::Script(msg) => assert!(msg.contains("undefined function nope"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn runs_are_deterministic_across_invocations() {
    let engine = engine("let n = 0;\nfn bump(x) { x + 1 }\nbump(n)");
    let first = run(&engine, "").unwrap();
    let second = run(&engine, "").unwrap();
    assert_eq!(first.as_int().unwrap(), 1);
    assert_eq!(second.as_int().unwrap(), 1);
}

#[test]
fn infinite_loop_times_out() {
    let engine = engine("fn spin() { loop { } }");
    let started = Instant::now();
    let err = engine
        .run(Duration::from_millis(200), "spin", vec![])
        .unwrap_err();
    assert!(err.is_timeout(), "expected timeout, got {err}");
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn engine_is_reusable_after_a_timeout() {
    let engine = engine("fn spin() { loop { } }\nfn quick() { \"ok\" }");
    let err = engine
        .run(Duration::from_millis(200), "spin", vec![])
        .unwrap_err();
    assert!(err.is_timeout());

    // The next run starts from a cleared interrupt.
    let out = run(&engine, "quick").unwrap();
    assert_eq!(out.to_string(), "ok");
}

#[test]
fn zero_timeout_disables_the_supervisor() {
    let engine = engine(r#"fn main() { "no deadline" }"#);
    let out = engine.run(Duration::ZERO, "main", vec![]).unwrap();
    assert_eq!(out.to_string(), "no deadline");
}

#[test]
fn thrown_value_surfaces_in_the_error_message() {
    let engine = engine(r#"fn boom() { throw "EXCEPTION!"; }"#);
    let err = run(&engine, "boom").unwrap_err();
    assert!(!err.is_timeout());
    assert!(err.to_string().contains("EXCEPTION!"), "{err}");
}

#[test]
fn shared_argument_map_carries_results_back() {
    let engine = engine(r#"fn main(args) { args.output = args.greeting + " world"; }"#);

    let mut args = rhai::Map::new();
    args.insert("greeting".into(), Dynamic::from("hello".to_string()));
    let shared = value::shared_map(args);

    engine
        .run(Duration::from_secs(5), "main", vec![shared.clone()])
        .unwrap();

    let map = shared.flatten().try_cast::<rhai::Map>().unwrap();
    assert_eq!(map.get("output").unwrap().to_string(), "hello world");
    assert_eq!(map.get("greeting").unwrap().to_string(), "hello");
}

#[test]
fn modules_resolve_across_the_search_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut a = std::fs::File::create(dir.path().join("a.rhai")).unwrap();
    writeln!(a, "fn test() {{ \"a.rhai\" }}").unwrap();
    let mut b = std::fs::File::create(dir.path().join("b.rhai")).unwrap();
    writeln!(b, "fn test() {{ \"b.rhai\" }}").unwrap();

    let engine = ScriptEngine::new(
        "import \"a\" as a;\nimport \"b\" as b;\na::test() + \";\" + b::test()",
        dir.path().to_str().unwrap(),
        EngineConfig::default(),
    )
    .unwrap();
    let out = run(&engine, "").unwrap();
    assert_eq!(out.to_string(), "a.rhai;b.rhai");
}

#[test]
fn modules_can_import_transitively() {
    let dir = tempfile::tempdir().unwrap();
    let mut b = std::fs::File::create(dir.path().join("b.rhai")).unwrap();
    writeln!(b, "fn tag() {{ \"b.rhai\" }}").unwrap();
    let mut a = std::fs::File::create(dir.path().join("a.rhai")).unwrap();
    writeln!(a, "import \"b\" as b;").unwrap();
    writeln!(a, "fn combined() {{ \"a.rhai;\" + b::tag() }}").unwrap();

    let engine = ScriptEngine::new(
        "import \"a\" as a;\na::combined()",
        dir.path().to_str().unwrap(),
        EngineConfig::default(),
    )
    .unwrap();
    let out = run(&engine, "").unwrap();
    assert_eq!(out.to_string(), "a.rhai;b.rhai");
}

#[test]
fn embedded_module_serves_when_filesystem_misses() {
    let engine = engine("import \"greeting\" as g;\ng::hello(\"world\")");
    let out = run(&engine, "").unwrap();
    assert_eq!(out.to_string(), "hello world");
}

#[test]
fn node_modules_paths_truncate_to_the_embedded_key() {
    let engine = engine("import \"deep/path/node_modules/strings\" as s;\ns::shout(\"hi\")");
    let out = run(&engine, "").unwrap();
    assert_eq!(out.to_string(), "HI");
}

#[test]
fn filesystem_module_shadows_the_embedded_one() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join("greeting.rhai")).unwrap();
    writeln!(file, "fn hello(name) {{ \"file \" + name }}").unwrap();

    let engine = ScriptEngine::new(
        "import \"greeting\" as g;\ng::hello(\"world\")",
        dir.path().to_str().unwrap(),
        EngineConfig::default(),
    )
    .unwrap();
    let out = run(&engine, "").unwrap();
    assert_eq!(out.to_string(), "file world");
}

#[test]
fn missing_module_is_reported_by_name() {
    let engine = engine("import \"does_not_exist\" as m;\nm::anything()");
    let err = run(&engine, "").unwrap_err();
    match err {
        ScriptError::ModuleNotFound(path) => assert_eq!(path, "does_not_exist"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn console_binding_is_callable() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let engine = engine(
        r#"
        console.log("one", 2, true);
        console.info("ready");
        console.table(#{a: 1, b: "x"});
        console.table([10, 20]);
        "all logged"
        "#,
    );
    let out = run(&engine, "").unwrap();
    assert_eq!(out.to_string(), "all logged");
}

#[test]
fn etree_binding_builds_documents() {
    let engine = engine(
        r#"
        let d = etree.new_document();
        let root = d.create_element("config");
        root.create_attr("version", "2");
        root.create_attr("version", "3");
        let server = root.create_element("server");
        server.set_text("localhost");
        root.create_comment("generated");
        d.write_to_string()
        "#,
    );
    let xml = run(&engine, "").unwrap().to_string();
    assert!(xml.contains(r#"<config version="3">"#), "{xml}");
    assert!(xml.contains("<server>localhost</server>"), "{xml}");
    assert!(xml.contains("<!--generated-->"), "{xml}");
}

#[test]
fn etree_navigation_round_trips() {
    let engine = engine(
        r#"
        let d = etree.new_document();
        let root = d.create_element("root");
        root.create_element("a");
        let b = root.create_element("b");
        b.set_text("found");
        let again = d.select_element("root");
        let picked = again.select_element("b");
        picked.text() + ":" + again.select_elements().len().to_string()
        "#,
    );
    let out = run(&engine, "").unwrap();
    assert_eq!(out.to_string(), "found:2");
}

#[test]
fn database_binding_is_absent_by_default() {
    let engine = engine("database.drivers()");
    let err = run(&engine, "").unwrap_err();
    assert!(!err.is_timeout());
}

#[test]
fn script_can_catch_binding_errors() {
    let mut config = EngineConfig::default();
    config.enable_database = true;
    let engine = ScriptEngine::new(
        r#"
        try {
            database.init("oracle", "dsn");
            "no error"
        } catch (err) {
            err.to_string()
        }
        "#,
        "",
        config,
    )
    .unwrap();
    let out = run(&engine, "").unwrap();
    assert!(out.to_string().contains("unknown driver"), "{out}");
}

#[test]
fn format_script_normalizes_layout() {
    let source = "fn main() {\r\nlet x = 1;\r\n\r\n\r\nx\r\n}\r\n";
    let formatted = format_script(source).unwrap();
    assert!(formatted.contains("    let x = 1;"));
    assert!(!formatted.contains('\r'));
    assert!(!formatted.contains("\n\n\n"));
}
