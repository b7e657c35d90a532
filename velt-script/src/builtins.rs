//! The built-in command library, registered through the same public ABI
//! hosts use for their own natives.

use crate::cfg::escape_string;
use crate::ident::IdentFlags;
use crate::lexer::{list_elements, unescape_string};
use crate::value::Value;
use crate::vm::Console;

fn cmd(
    con: &mut Console,
    name: &str,
    sig: &str,
    f: impl Fn(&mut Console, &[Value]) -> Value + 'static,
) {
    if let Err(e) = con.declare_command(name, sig, f) {
        log::error!("failed to register builtin: {e}");
    }
}

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Null)
}

fn int_fold(args: &[Value], f: impl Fn(i32, i32) -> i32) -> Value {
    let mut it = args.iter().map(|v| v.get_int());
    let first = it.next().unwrap_or(0);
    Value::Int(it.fold(first, f))
}

fn float_fold(args: &[Value], f: impl Fn(f32, f32) -> f32) -> Value {
    let mut it = args.iter().map(|v| v.get_float());
    let first = it.next().unwrap_or(0.0);
    Value::Float(it.fold(first, f))
}

pub(crate) fn register_defaults(con: &mut Console) {
    // ---- console / control ----

    cmd(con, "echo", "C", |con, args| {
        let line = arg(args, 0).get_str();
        con.console_msg(line.to_string());
        Value::Null
    });

    cmd(con, "exec", "s", |con, args| {
        let path = arg(args, 0).get_str();
        // Failure already landed on the console; scripts carry on.
        let _ = con.exec_file(&*path);
        Value::Null
    });

    cmd(con, "alias", "st", |con, args| {
        let name = arg(args, 0).get_str();
        con.set_alias(&name, arg(args, 1));
        Value::Null
    });

    cmd(con, "loop", "rie", |con, args| {
        let Some(Value::Ident(r)) = args.first() else {
            return Value::Null;
        };
        let id = r.id;
        let n = arg(args, 1).get_int();
        let body = arg(args, 2);
        con.push_shadow(id, Value::Null);
        for i in 0..n {
            con.set_alias_by_id(id, Value::Int(i));
            con.run_value(&body);
        }
        con.pop_shadow(id);
        Value::Null
    });

    cmd(con, "while", "ee", |con, args| {
        let cond = arg(args, 0);
        let body = arg(args, 1);
        while con.run_value(&cond).get_bool() {
            con.run_value(&body);
        }
        Value::Null
    });

    cmd(con, "sleep", "it", |con, args| {
        let ms = arg(args, 0).get_int().max(0) as i64;
        con.add_sleep(ms, arg(args, 1));
        Value::Null
    });

    cmd(con, "clearsleeps", "", |con, _| {
        con.clear_sleeps();
        Value::Null
    });

    cmd(con, "trigger", "s", |con, args| {
        let name = arg(args, 0).get_str();
        if !name.is_empty() {
            con.queue_trigger_name(&name);
        }
        Value::Null
    });

    cmd(con, "writecfg", "s", |con, args| {
        let path = arg(args, 0).get_str();
        let path = if path.is_empty() { "config.cfg" } else { &*path };
        if let Err(e) = con.write_cfg(path) {
            con.console_msg(format!("writecfg failed: {e:#}"));
        }
        Value::Null
    });

    // ---- introspection ----

    cmd(con, "identexists", "s", |con, args| {
        let name = arg(args, 0).get_str();
        let known = con
            .registry()
            .lookup(&name)
            .map(|id| !con.registry().ident(id).flags.contains(IdentFlags::UNKNOWN))
            .unwrap_or(false);
        Value::Int(known as i32)
    });

    cmd(con, "getalias", "s", |con, args| {
        let name = arg(args, 0).get_str();
        match con.get_alias(&name) {
            Some(v) => Value::Str(v.get_str()),
            None => Value::str(""),
        }
    });

    // ---- strings / lists ----

    cmd(con, "concat", "V", |_, args| {
        let joined = args
            .iter()
            .map(|v| v.as_str().into_owned())
            .collect::<Vec<_>>()
            .join(" ");
        Value::str(joined)
    });

    cmd(con, "concatword", "V", |_, args| {
        let mut out = String::new();
        for v in args {
            out.push_str(&v.as_str());
        }
        Value::str(out)
    });

    cmd(con, "format", "sV", |_, args| {
        let fmt = arg(args, 0).get_str();
        let mut out = String::new();
        let mut chars = fmt.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some(d @ '1'..='9') => {
                    let i = d as usize - '0' as usize;
                    out.push_str(&arg(args, i).as_str());
                }
                Some('%') => out.push('%'),
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
                None => out.push('%'),
            }
        }
        Value::str(out)
    });

    cmd(con, "at", "si", |_, args| {
        let list = arg(args, 0).get_str();
        let i = arg(args, 1).get_int();
        let elems = list_elements(&list);
        if i < 0 {
            return Value::str("");
        }
        match elems.into_iter().nth(i as usize) {
            Some(e) => Value::str(e),
            None => Value::str(""),
        }
    });

    cmd(con, "listlen", "s", |_, args| {
        Value::Int(list_elements(&arg(args, 0).get_str()).len() as i32)
    });

    cmd(con, "strcmp", "ss", |_, args| {
        Value::Int((arg(args, 0).get_str() == arg(args, 1).get_str()) as i32)
    });

    cmd(con, "strlen", "s", |_, args| {
        Value::Int(arg(args, 0).get_str().chars().count() as i32)
    });

    cmd(con, "substr", "siiN", |_, args| {
        let s = arg(args, 0).get_str();
        let chars: Vec<char> = s.chars().collect();
        let start = (arg(args, 1).get_int().max(0) as usize).min(chars.len());
        let count = arg(args, 2).get_int();
        let numargs = arg(args, 3).get_int();
        let end = if numargs >= 3 && count >= 0 {
            (start + count as usize).min(chars.len())
        } else {
            chars.len()
        };
        Value::str(chars[start..end].iter().collect::<String>())
    });

    cmd(con, "escapestring", "s", |_, args| {
        Value::str(escape_string(&arg(args, 0).get_str()))
    });

    cmd(con, "unescapestring", "s", |_, args| {
        Value::str(unescape_string(&arg(args, 0).get_str()))
    });

    // ---- integer math ----

    cmd(con, "+", "i1", |_, args| {
        int_fold(args, |a, b| a.wrapping_add(b))
    });
    cmd(con, "-", "i1", |_, args| {
        if args.len() <= 1 {
            Value::Int(arg(args, 0).get_int().wrapping_neg())
        } else {
            int_fold(args, |a, b| a.wrapping_sub(b))
        }
    });
    cmd(con, "*", "i1", |_, args| {
        int_fold(args, |a, b| a.wrapping_mul(b))
    });
    cmd(con, "div", "i1", |_, args| {
        int_fold(args, |a, b| if b != 0 { a.wrapping_div(b) } else { 0 })
    });
    cmd(con, "mod", "i1", |_, args| {
        int_fold(args, |a, b| if b != 0 { a.wrapping_rem(b) } else { 0 })
    });
    cmd(con, "min", "i1", |_, args| int_fold(args, i32::min));
    cmd(con, "max", "i1", |_, args| int_fold(args, i32::max));
    cmd(con, "abs", "i", |_, args| {
        Value::Int(arg(args, 0).get_int().wrapping_abs())
    });

    cmd(con, "=", "ii", |_, args| {
        Value::Int((arg(args, 0).get_int() == arg(args, 1).get_int()) as i32)
    });
    cmd(con, "!=", "ii", |_, args| {
        Value::Int((arg(args, 0).get_int() != arg(args, 1).get_int()) as i32)
    });
    cmd(con, "<", "ii", |_, args| {
        Value::Int((arg(args, 0).get_int() < arg(args, 1).get_int()) as i32)
    });
    cmd(con, ">", "ii", |_, args| {
        Value::Int((arg(args, 0).get_int() > arg(args, 1).get_int()) as i32)
    });
    cmd(con, "<=", "ii", |_, args| {
        Value::Int((arg(args, 0).get_int() <= arg(args, 1).get_int()) as i32)
    });
    cmd(con, ">=", "ii", |_, args| {
        Value::Int((arg(args, 0).get_int() >= arg(args, 1).get_int()) as i32)
    });

    // ---- float math ----

    cmd(con, "+f", "f1", |_, args| float_fold(args, |a, b| a + b));
    cmd(con, "-f", "f1", |_, args| {
        if args.len() <= 1 {
            Value::Float(-arg(args, 0).get_float())
        } else {
            float_fold(args, |a, b| a - b)
        }
    });
    cmd(con, "*f", "f1", |_, args| float_fold(args, |a, b| a * b));
    cmd(con, "divf", "f1", |_, args| {
        float_fold(args, |a, b| if b != 0.0 { a / b } else { 0.0 })
    });
    cmd(con, "modf", "f1", |_, args| {
        float_fold(args, |a, b| if b != 0.0 { a % b } else { 0.0 })
    });
    cmd(con, "minf", "f1", |_, args| float_fold(args, f32::min));
    cmd(con, "maxf", "f1", |_, args| float_fold(args, f32::max));

    cmd(con, "=f", "ff", |_, args| {
        Value::Int((arg(args, 0).get_float() == arg(args, 1).get_float()) as i32)
    });
    cmd(con, "!=f", "ff", |_, args| {
        Value::Int((arg(args, 0).get_float() != arg(args, 1).get_float()) as i32)
    });
    cmd(con, "<f", "ff", |_, args| {
        Value::Int((arg(args, 0).get_float() < arg(args, 1).get_float()) as i32)
    });
    cmd(con, ">f", "ff", |_, args| {
        Value::Int((arg(args, 0).get_float() > arg(args, 1).get_float()) as i32)
    });
    cmd(con, "<=f", "ff", |_, args| {
        Value::Int((arg(args, 0).get_float() <= arg(args, 1).get_float()) as i32)
    });
    cmd(con, ">=f", "ff", |_, args| {
        Value::Int((arg(args, 0).get_float() >= arg(args, 1).get_float()) as i32)
    });
}
