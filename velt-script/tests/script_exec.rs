use std::cell::{Cell, RefCell};
use std::rc::Rc;

use pretty_assertions::assert_eq;
use velt_script::{Console, IdentFlags, ScriptError, Value};

#[test]
fn statement_value_is_the_result() {
    let mut con = Console::new();
    assert_eq!(con.execute_int("result 7").unwrap(), 7);
    assert_eq!(con.execute_int("+ 1 2 3").unwrap(), 6);
    assert_eq!(con.execute_int("result (+ 1 (* 2 3))").unwrap(), 7);
    assert_eq!(con.execute_str("result hello").unwrap(), "hello");
}

#[test]
fn numeric_literals_keep_their_kind() {
    let mut con = Console::new();
    assert_eq!(con.execute_int("result 0x1F").unwrap(), 31);
    let v = con.execute("result 3.5").unwrap();
    assert!(matches!(v, Value::Float(f) if f == 3.5));
    // Integral floats survive a trip through text without collapsing to ints.
    assert_eq!(con.execute_str("result 4.0").unwrap(), "4.0");
}

#[test]
fn if_takes_only_one_branch() {
    let mut con = Console::new();
    con.execute("taken = none").unwrap();
    con.execute("if 1 [taken = then] [taken = else]").unwrap();
    assert_eq!(con.get_alias("taken").unwrap().get_str().as_ref(), "then");
    con.execute("if 0 [taken = then2] [taken = else2]").unwrap();
    assert_eq!(con.get_alias("taken").unwrap().get_str().as_ref(), "else2");
    // No else branch + false condition yields null.
    assert!(con.execute("if 0 [result x]").unwrap().is_null());
}

#[test]
fn and_or_short_circuit() {
    let mut con = Console::new();
    con.execute("hits = 0").unwrap();
    assert_eq!(con.execute_int("and [result 0] [hits = 1; result 1]").unwrap(), 0);
    assert_eq!(con.get_alias("hits").unwrap().get_int(), 0);
    assert_eq!(con.execute_int("or [result 1] [hits = 2; result 1]").unwrap(), 1);
    assert_eq!(con.get_alias("hits").unwrap().get_int(), 0);
    assert_eq!(con.execute_int("and [result 2] [result 3]").unwrap(), 3);
    assert_eq!(con.execute_int("not 0").unwrap(), 1);
    assert_eq!(con.execute_int("not abc").unwrap(), 0);
}

#[test]
fn recursive_alias_unwinds_to_the_base_case() {
    let mut con = Console::new();
    con.execute("f = [if $arg1 [f (- $arg1 1)] [result base]]")
        .unwrap();
    assert_eq!(con.execute_str("f 3").unwrap(), "base");
}

#[test]
fn argument_bindings_restore_after_nested_calls() {
    let mut con = Console::new();
    con.execute("f = [if $arg1 [f (- $arg1 1)] [result base]]")
        .unwrap();
    // g uses arg1 itself, calls the recursive f, then reads arg1 again.
    con.execute("g = [alias saw1 $arg1; f 3; alias saw2 $arg1]")
        .unwrap();
    con.execute("g outer").unwrap();
    assert_eq!(con.get_alias("saw1").unwrap().get_str().as_ref(), "outer");
    assert_eq!(con.get_alias("saw2").unwrap().get_str().as_ref(), "outer");
}

#[test]
fn numargs_tracks_the_call() {
    let mut con = Console::new();
    con.execute("f = [result $numargs]").unwrap();
    assert_eq!(con.execute_int("f a b c").unwrap(), 3);
    assert_eq!(con.execute_int("f").unwrap(), 0);
}

#[test]
fn unknown_identifier_reads_as_null_and_vivifies() {
    let mut con = Console::new();
    let v = con.execute("result $neverdeclared").unwrap();
    assert!(v.is_null());
    let id = con.registry().lookup("neverdeclared").expect("vivified");
    assert!(con
        .registry()
        .ident(id)
        .flags
        .contains(IdentFlags::UNKNOWN));
}

#[test]
fn unknown_command_reports_and_degrades() {
    let mut con = Console::new();
    let v = con.execute("nosuchcommand 1 2").unwrap();
    assert!(v.is_null());
    let out = con.take_output().join("\n");
    assert!(out.contains("unknown command: nosuchcommand"), "got {out:?}");
}

#[test]
fn command_arity_defaults_fill_missing_slots() {
    let mut con = Console::new();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    con.declare_command("pair", "ii", move |_, args| {
        *sink.borrow_mut() = args.iter().map(|v| v.get_int()).collect();
        Value::Null
    })
    .unwrap();
    con.execute("pair 5").unwrap();
    assert_eq!(&*seen.borrow(), &vec![5, 0]);
    // Surplus arguments are evaluated but dropped.
    con.execute("pair 1 2 3 4").unwrap();
    assert_eq!(&*seen.borrow(), &vec![1, 2]);
}

#[test]
fn command_redeclaration_is_refused() {
    let mut con = Console::new();
    let err = con
        .declare_command("echo", "C", |_, _| Value::Null)
        .unwrap_err();
    assert!(matches!(err, ScriptError::DuplicateCommand(_)));
}

#[test]
fn int_var_clamps_and_warns() {
    let mut con = Console::new();
    let cell = con.declare_int_var("bound", 0, 1, 10, IdentFlags::empty(), None);
    con.execute("bound = 15").unwrap();
    assert_eq!(cell.get(), 10);
    let out = con.take_output().join("\n");
    assert!(out.contains("valid range for bound is 0..10"), "got {out:?}");
    con.execute("bound = -5").unwrap();
    assert_eq!(cell.get(), 0);
}

#[test]
fn hex_vars_warn_in_hex() {
    let mut con = Console::new();
    con.declare_int_var("mask", 0, 0, 0xFF, IdentFlags::HEX, None);
    con.execute("mask = 0x1FF").unwrap();
    let out = con.take_output().join("\n");
    assert!(out.contains("0xff") || out.contains("0xFF"), "got {out:?}");
}

#[test]
fn min_above_max_means_read_only() {
    let mut con = Console::new();
    let cell = con.declare_int_var("fixed", 5, 3, 1, IdentFlags::empty(), None);
    con.execute("fixed = 9").unwrap();
    assert_eq!(cell.get(), 3);
    con.set_int_var("fixed", 9, true, true);
    assert_eq!(cell.get(), 3);
}

#[test]
fn var_assignment_runs_the_callback_once() {
    let mut con = Console::new();
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    let cell = con.declare_int_var(
        "myvar",
        0,
        0,
        100,
        IdentFlags::empty(),
        Some(Rc::new(move |_con: &mut Console| {
            counter.set(counter.get() + 1);
        })),
    );
    con.execute("myvar = 7").unwrap();
    assert_eq!(cell.get(), 7);
    assert_eq!(fired.get(), 1);
}

#[test]
fn var_statement_with_argument_assigns() {
    let mut con = Console::new();
    let cell = con.declare_int_var("speed", 0, 1, 100, IdentFlags::empty(), None);
    con.execute("speed 42").unwrap();
    assert_eq!(cell.get(), 42);
    // Without an argument it prints the current value.
    con.take_output();
    con.execute("speed").unwrap();
    let out = con.take_output().join("\n");
    assert!(out.contains("speed = 42"), "got {out:?}");
}

#[test]
fn loop_and_while_iterate() {
    let mut con = Console::new();
    assert_eq!(
        con.execute_int("sum = 0; loop i 5 [sum = (+ $sum $i)]; result $sum")
            .unwrap(),
        10
    );
    assert_eq!(
        con.execute_int("n = 0; while [< $n 3] [n = (+ $n 1)]; result $n")
            .unwrap(),
        3
    );
}

#[test]
fn local_bindings_restore_on_frame_exit() {
    let mut con = Console::new();
    con.execute("x = 5").unwrap();
    con.execute("h = [local x; x = 9; result $x]").unwrap();
    assert_eq!(con.execute_int("h").unwrap(), 9);
    assert_eq!(con.execute_int("result $x").unwrap(), 5);
}

#[test]
fn doargs_exposes_the_callers_arguments() {
    let mut con = Console::new();
    con.execute("inner = [doargs [result $arg1]]").unwrap();
    con.execute("outer = [result (inner unused)]").unwrap();
    assert_eq!(con.execute_str("outer topval").unwrap(), "topval");
}

#[test]
fn string_helpers() {
    let mut con = Console::new();
    assert_eq!(con.execute_str("concat a b 7").unwrap(), "a b 7");
    assert_eq!(con.execute_str("concatword a b 7").unwrap(), "ab7");
    assert_eq!(
        con.execute_str("format \"a%1b%2\" X Y").unwrap(),
        "aXbY"
    );
    assert_eq!(con.execute_str("at \"a b c\" 1").unwrap(), "b");
    assert_eq!(con.execute_int("listlen \"a [b c] d\"").unwrap(), 3);
    assert_eq!(con.execute_int("strcmp abc abc").unwrap(), 1);
    assert_eq!(con.execute_int("strlen hello").unwrap(), 5);
    assert_eq!(con.execute_str("substr abcdef 2 3").unwrap(), "cde");
    assert_eq!(con.execute_str("substr abcdef 2").unwrap(), "cdef");
}

#[test]
fn float_math_keeps_floats() {
    let mut con = Console::new();
    let v = con.execute("+f 1.5 2.25").unwrap();
    assert!(matches!(v, Value::Float(f) if f == 3.75));
    assert_eq!(con.execute_int("divf 1 0").unwrap(), 0);
    assert_eq!(con.execute_int("div 7 0").unwrap(), 0);
}

#[test]
fn alias_command_and_lookup() {
    let mut con = Console::new();
    con.execute("alias greet [echo hi]").unwrap();
    assert_eq!(
        con.get_alias("greet").unwrap().get_str().as_ref(),
        "echo hi"
    );
    assert_eq!(con.execute_int("identexists greet").unwrap(), 1);
    assert_eq!(con.execute_int("identexists missing").unwrap(), 0);
    assert_eq!(con.execute_str("getalias greet").unwrap(), "echo hi");
}

#[test]
fn compile_errors_surface_without_crashing() {
    let mut con = Console::new();
    let err = con.execute("x = [oops").unwrap_err();
    assert!(matches!(err, ScriptError::UnterminatedBlock { .. }));
    let out = con.take_output().join("\n");
    assert!(out.contains("script error"), "got {out:?}");
    // The console still works afterwards.
    assert_eq!(con.execute_int("+ 1 1").unwrap(), 2);
}

#[test]
fn release_actions_replay_on_release() {
    let mut con = Console::new();
    let downs = Rc::new(RefCell::new(Vec::new()));
    let sink = downs.clone();
    con.declare_command("holdjump", "D", move |_, args| {
        sink.borrow_mut().push(args[0].get_int());
        Value::Null
    })
    .unwrap();
    con.execute_pressed("holdjump").unwrap();
    assert_eq!(&*downs.borrow(), &vec![1]);
    con.release_all();
    assert_eq!(&*downs.borrow(), &vec![1, 0]);
    // Outside a press context nothing is queued.
    con.execute("holdjump").unwrap();
    con.release_all();
    assert_eq!(&*downs.borrow(), &vec![1, 0, 0]);
}

#[test]
fn disassembly_lists_compiled_words() {
    let mut con = Console::new();
    let code = con.compile("echo hi; x = (+ 1 2)").unwrap();
    let dump = code.dump();
    assert!(dump.contains("call_command"), "got:\n{dump}");
    assert!(dump.contains("\"hi\""), "got:\n{dump}");
    assert!(dump.contains("alias_set"), "got:\n{dump}");
    assert!(dump.lines().count() >= 6, "got:\n{dump}");
}

#[test]
fn override_mode_saves_and_restores_defaults() {
    let mut con = Console::new();
    let cell = con.declare_int_var("fov", 10, 90, 150, IdentFlags::OVERRIDE, None);
    con.set_override_mode(true);
    con.execute("fov = 120").unwrap();
    con.set_override_mode(false);
    assert_eq!(cell.get(), 120);
    con.reset_overrides();
    assert_eq!(cell.get(), 90);
}
