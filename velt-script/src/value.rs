use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::CodeBlock;
use crate::ident::IdentId;

/// A reference to a registry ident, as passed to `r`/`$` command
/// parameters. Carries the name so it can still render as text without
/// going back through the registry.
#[derive(Clone, Debug)]
pub struct IdentRef {
    pub id: IdentId,
    pub name: Rc<str>,
}

/// One script runtime value.
///
/// The original engine kept a manually-managed tagged union here, with
/// separate owned/borrowed string tags. `Rc<str>` makes every string arm
/// cheap to share, so a single `Str` arm covers all of them; `as_str`
/// hands out borrows where the old code handed out its "cstring" view.
#[derive(Clone, Debug, Default)]
pub enum Value {
    #[default]
    Null,
    Int(i32),
    Float(f32),
    Str(Rc<str>),
    /// Compiled bytecode, e.g. a `[...]` block.
    Code(Rc<CodeBlock>),
    Ident(IdentRef),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Value {
        Value::Str(s.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Coerce to an integer, whatever the current tag.
    pub fn get_int(&self) -> i32 {
        match self {
            Value::Null => 0,
            Value::Int(v) => *v,
            Value::Float(v) => *v as i32,
            Value::Str(s) => parse_int(s),
            Value::Code(_) | Value::Ident(_) => 0,
        }
    }

    pub fn get_float(&self) -> f32 {
        match self {
            Value::Null => 0.0,
            Value::Int(v) => *v as f32,
            Value::Float(v) => *v,
            Value::Str(s) => parse_float(s),
            Value::Code(_) | Value::Ident(_) => 0.0,
        }
    }

    /// Coerce to a number, preserving the int/float distinction.
    pub fn get_number(&self) -> Value {
        match self {
            Value::Int(_) | Value::Float(_) => self.clone(),
            Value::Str(s) => parse_number(s),
            _ => Value::Int(0),
        }
    }

    pub fn get_bool(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => str_bool(s),
            Value::Code(_) | Value::Ident(_) => true,
        }
    }

    /// Render as text. Strings and code blocks lend out their backing
    /// storage; everything else formats into a fresh `String`.
    pub fn as_str(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Int(v) => Cow::Owned(v.to_string()),
            Value::Float(v) => Cow::Owned(float_to_text(*v)),
            Value::Str(s) => Cow::Borrowed(s),
            Value::Code(c) => Cow::Borrowed(&c.source),
            Value::Ident(r) => Cow::Borrowed(&r.name),
        }
    }

    pub fn get_str(&self) -> Rc<str> {
        match self {
            Value::Str(s) => s.clone(),
            Value::Code(c) => c.source.clone(),
            Value::Ident(r) => r.name.clone(),
            other => Rc::from(other.as_str().as_ref()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_str())
    }
}

/// Format a float the way the console prints it: `%.7g`, except values
/// that are exactly integral keep one forced decimal so they still read
/// as floats after a round-trip through text.
pub fn float_to_text(v: f32) -> String {
    if !v.is_finite() {
        return if v.is_nan() {
            "nan".to_string()
        } else if v < 0.0 {
            "-inf".to_string()
        } else {
            "inf".to_string()
        };
    }
    if v == v.trunc() && v.abs() < 1e15 {
        return format!("{v:.1}");
    }
    format_g7(v)
}

// %.7g: 7 significant digits, exponent form outside [1e-4, 1e7).
fn format_g7(v: f32) -> String {
    let sci = format!("{:.6e}", v);
    let (_, exp) = sci.split_once('e').expect("{:e} always carries an exponent");
    let exp: i32 = exp.parse().expect("exponent is an integer");
    if !(-4..7).contains(&exp) {
        let (mant, _) = sci.split_once('e').unwrap();
        let mant = trim_fraction(mant);
        let sign = if exp < 0 { '-' } else { '+' };
        return format!("{mant}e{sign}{:02}", exp.abs());
    }
    let prec = (6 - exp).max(0) as usize;
    let fixed = format!("{:.*}", prec, v);
    trim_fraction(&fixed).to_string()
}

fn trim_fraction(s: &str) -> &str {
    if !s.contains('.') {
        return s;
    }
    let s = s.trim_end_matches('0');
    s.strip_suffix('.').unwrap_or(s)
}

/// Integer prefix parse: optional sign, `0x`/`0X` hex, otherwise decimal.
/// Trailing garbage is ignored; no digits at all yields 0.
pub fn parse_int(s: &str) -> i32 {
    let t = s.trim_start();
    let (neg, t) = match t.as_bytes().first() {
        Some(b'-') => (true, &t[1..]),
        Some(b'+') => (false, &t[1..]),
        _ => (false, t),
    };
    let v = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        let digits: String = hex.chars().take_while(|c| c.is_ascii_hexdigit()).collect();
        // Unsigned parse with 32-bit wraparound, so 0xFFFFFFFF reads as -1.
        u64::from_str_radix(&digits, 16)
            .map(|u| u as u32 as i32 as i64)
            .unwrap_or(0)
    } else {
        let digits: String = t.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse::<i64>().unwrap_or(0)
    };
    let v = if neg { -v } else { v };
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Float prefix parse with the hex fallback: if the float parser consumed
/// nothing but a leading zero and the rest starts with `x`/`X`, the text
/// is an `0x` integer literal.
pub fn parse_float(s: &str) -> f32 {
    match parse_number(s) {
        Value::Int(v) => v as f32,
        Value::Float(v) => v,
        _ => 0.0,
    }
}

/// Parse a numeric prefix, keeping the int/float distinction: hex and
/// plain digit runs stay `Int`, anything with a point or exponent
/// becomes `Float`. Unparseable input is `Int(0)`.
pub fn parse_number(s: &str) -> Value {
    let t = s.trim_start();
    let after_sign = match t.as_bytes().first() {
        Some(b'-') | Some(b'+') => &t[1..],
        _ => t,
    };
    if after_sign.starts_with("0x") || after_sign.starts_with("0X") {
        return Value::Int(parse_int(t));
    }
    let bytes = t.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        i += 1;
    }
    let mut digits = 0;
    let mut is_float = false;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        let mut j = i + 1;
        let mut frac = 0;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
            frac += 1;
        }
        if frac > 0 || digits > 0 {
            is_float = true;
            digits += frac;
            i = j;
        }
    }
    if digits == 0 {
        return Value::Int(0);
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'-' | b'+') {
            j += 1;
        }
        let mut ed = 0;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
            ed += 1;
        }
        if ed > 0 {
            is_float = true;
            i = j;
        }
    }
    let prefix = &t[..i];
    if is_float {
        Value::Float(prefix.parse().unwrap_or(0.0))
    } else {
        Value::Int(parse_int(prefix))
    }
}

// Strings are false iff empty or a valid number equal to zero; anything
// non-numeric and non-empty counts as true.
fn str_bool(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    match full_number(s) {
        Some(Value::Int(v)) => v != 0,
        Some(Value::Float(v)) => v != 0.0,
        _ => true,
    }
}

/// The whole token is a number (used for compile-time literal folding
/// and the "unknown command that is really a value" fallback).
pub(crate) fn literal_number(s: &str) -> Option<Value> {
    full_number(s)
}

fn full_number(s: &str) -> Option<Value> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let consumed = numeric_prefix_len(t);
    if consumed == t.len() {
        Some(parse_number(t))
    } else {
        None
    }
}

fn numeric_prefix_len(t: &str) -> usize {
    let bytes = t.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        i += 1;
    }
    if bytes[i..].starts_with(b"0x") || bytes[i..].starts_with(b"0X") {
        i += 2;
        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
        return if i > start { i } else { 0 };
    }
    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits == 0 {
        return 0;
    }
    if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
        let mut j = i + 1;
        if j < bytes.len() && matches!(bytes[j], b'-' | b'+') {
            j += 1;
        }
        let start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > start {
            i = j;
        }
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn int_formatting_has_no_decimal_point() {
        assert_eq!(Value::Int(42).as_str(), "42");
        assert_eq!(Value::Int(-7).as_str(), "-7");
    }

    #[test]
    fn integral_floats_keep_one_decimal() {
        assert_eq!(float_to_text(4.0), "4.0");
        assert_eq!(float_to_text(-1.0), "-1.0");
        assert_eq!(float_to_text(0.0), "0.0");
    }

    #[test]
    fn fractional_floats_use_seven_significant_digits() {
        assert_eq!(float_to_text(3.5), "3.5");
        assert_eq!(float_to_text(0.25), "0.25");
        assert_eq!(float_to_text(1.5e-6), "1.5e-06");
    }

    #[test]
    fn hex_literals_parse() {
        assert_eq!(parse_int("0x1F"), 31);
        assert_eq!(parse_int("-0x10"), -16);
        assert!(matches!(parse_number("0x1F"), Value::Int(31)));
    }

    #[test]
    fn numeric_prefix_wins_over_garbage() {
        assert_eq!(parse_int("12abc"), 12);
        assert!(matches!(parse_number("3.5xyz"), Value::Float(v) if v == 3.5));
        assert!(matches!(parse_number("junk"), Value::Int(0)));
    }

    #[test]
    fn number_text_round_trip_keeps_value() {
        for s in ["0x1F", "3.5", "-42", "1e3", "0.125"] {
            let v = parse_number(s);
            let back = parse_number(&v.as_str());
            assert_eq!(back.get_float(), v.get_float(), "round-trip of {s}");
        }
    }

    #[test]
    fn bool_coercion() {
        assert!(!Value::Null.get_bool());
        assert!(!Value::Int(0).get_bool());
        assert!(Value::Int(-1).get_bool());
        assert!(!Value::Float(0.0).get_bool());
        assert!(!Value::str("").get_bool());
        assert!(!Value::str("0").get_bool());
        assert!(!Value::str("0.0").get_bool());
        assert!(Value::str("abc").get_bool());
        assert!(Value::str("2").get_bool());
    }
}
