use std::path::PathBuf;

use pretty_assertions::assert_eq;
use velt_script::{escape_string, unescape_string, Console, IdentFlags, Value};

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("velt-{}-{}", std::process::id(), name))
}

#[test]
fn escape_string_round_trips_through_the_compiler() {
    let mut con = Console::new();
    for s in ["plain", "two words", "quote \" inside", "caret ^ and\nnewline"] {
        let chunk = format!("result {}", escape_string(s));
        assert_eq!(con.execute_str(&chunk).unwrap(), s, "round-trip of {s:?}");
        assert_eq!(unescape_string(&escape_string(s)), s);
    }
}

#[test]
fn written_config_reads_back_through_the_normal_path() {
    let path = temp_path("roundtrip.cfg");

    let mut con = Console::new();
    con.declare_int_var("ivar", 0, 42, 100, IdentFlags::PERSIST, None);
    con.declare_float_var("fvar", 0.0, 1.5, 10.0, IdentFlags::PERSIST, None);
    con.declare_str_var("svar", "he said \"hi\"", IdentFlags::PERSIST, None);
    con.declare_int_var("hexmask", 0, 0xF0, 0xFFFF, IdentFlags::PERSIST | IdentFlags::HEX, None);
    con.declare_alias("greet", Value::str("echo hello"), IdentFlags::PERSIST);
    // Non-persisted state must not leak into the file.
    con.declare_int_var("transient", 0, 7, 10, IdentFlags::empty(), None);
    con.write_cfg(&path).unwrap();

    let mut fresh = Console::new();
    let ivar = fresh.declare_int_var("ivar", 0, 0, 100, IdentFlags::PERSIST, None);
    let fvar = fresh.declare_float_var("fvar", 0.0, 0.0, 10.0, IdentFlags::PERSIST, None);
    let svar = fresh.declare_str_var("svar", "", IdentFlags::PERSIST, None);
    let hexmask =
        fresh.declare_int_var("hexmask", 0, 0, 0xFFFF, IdentFlags::PERSIST | IdentFlags::HEX, None);
    let transient = fresh.declare_int_var("transient", 0, 3, 10, IdentFlags::empty(), None);

    fresh.exec_file(&path).unwrap();

    assert_eq!(ivar.get(), 42);
    assert_eq!(fvar.get(), 1.5);
    assert_eq!(&*svar.borrow(), "he said \"hi\"");
    assert_eq!(hexmask.get(), 0xF0);
    assert_eq!(transient.get(), 3);
    assert_eq!(
        fresh.get_alias("greet").unwrap().get_str().as_ref(),
        "echo hello"
    );

    let _ = std::fs::remove_file(&path);
}

#[test]
fn overridden_vars_are_not_persisted() {
    let path = temp_path("overrides.cfg");

    let mut con = Console::new();
    let cell = con.declare_int_var("fov", 10, 90, 150, IdentFlags::PERSIST, None);
    con.set_override_mode(true);
    con.execute("fov = 120").unwrap();
    con.set_override_mode(false);
    assert_eq!(cell.get(), 120);
    con.write_cfg(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(!text.contains("fov"), "overridden var leaked: {text}");

    let _ = std::fs::remove_file(&path);
}

#[test]
fn header_names_the_contributing_configs() {
    let path = temp_path("header.cfg");

    let mut con = Console::new();
    con.set_config_paths(
        Some(PathBuf::from("data/defaults.cfg")),
        Some(PathBuf::from("autoexec.cfg")),
    );
    con.write_cfg(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("//"));
    assert!(text.contains("data/defaults.cfg"));
    assert!(text.contains("autoexec.cfg"));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn missing_script_file_reports_and_returns_an_error() {
    let mut con = Console::new();
    let result = con.exec_file("no/such/velt-script.cfg");
    assert!(result.is_err());
    let out = con.take_output().join("\n");
    assert!(out.contains("could not read"), "got {out:?}");
}
