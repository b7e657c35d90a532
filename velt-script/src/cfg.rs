//! Persisted configuration. The format is the language itself: every
//! PERSIST-flagged variable and alias is written as an assignment
//! statement, and reading the file back is a plain `exec_file`.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::ident::{IdentFlags, IdentKind, VarStorage};
use crate::value::float_to_text;
use crate::vm::Console;

/// Escape a string for the tokenizer and wrap it in quotes. Everything
/// `escape_string` emits parses back to the original text.
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\n' => out.push_str("^n"),
            '\t' => out.push_str("^t"),
            '\x0c' => out.push_str("^f"),
            '"' => out.push_str("^\""),
            '^' => out.push_str("^^"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Like `escape_string`, but a no-op for input that is already safe to
/// re-tokenize as a single word (including the empty string).
pub fn escape_id(s: &str) -> Cow<'_, str> {
    let safe = s
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');
    if safe {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(escape_string(s))
    }
}

impl Console {
    /// Record where the host's startup configs live; `write_cfg` names
    /// them in its header so users know what to edit instead.
    pub fn set_config_paths(
        &mut self,
        default_cfg: Option<PathBuf>,
        autoexec_cfg: Option<PathBuf>,
    ) {
        self.default_cfg = default_cfg;
        self.autoexec_cfg = autoexec_cfg;
    }

    /// Dump every persisted variable and alias as script source.
    pub fn write_cfg(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let mut out = String::new();
        let _ = writeln!(out, "// console state written by writecfg");
        if let Some(p) = &self.default_cfg {
            let _ = writeln!(out, "// defaults come from {}", p.display());
        }
        if let Some(p) = &self.autoexec_cfg {
            let _ = writeln!(out, "// put personal overrides in {}", p.display());
        }
        let _ = writeln!(out);

        let mut var_lines = Vec::new();
        let mut alias_lines = Vec::new();
        for id in self.regs.iter_ids() {
            let ident = self.regs.ident(id);
            if !ident.flags.contains(IdentFlags::PERSIST)
                || ident
                    .flags
                    .intersects(IdentFlags::OVERRIDDEN | IdentFlags::OVERRIDE)
            {
                continue;
            }
            match &ident.kind {
                IdentKind::Var(VarStorage::Int { cell, .. }) => {
                    if ident.flags.contains(IdentFlags::HEX) {
                        var_lines.push(format!("{} = 0x{:X}", ident.name, cell.get()));
                    } else {
                        var_lines.push(format!("{} = {}", ident.name, cell.get()));
                    }
                }
                IdentKind::Var(VarStorage::Float { cell, .. }) => {
                    var_lines.push(format!("{} = {}", ident.name, float_to_text(cell.get())));
                }
                IdentKind::Var(VarStorage::Str { cell }) => {
                    var_lines.push(format!(
                        "{} = {}",
                        ident.name,
                        escape_string(&cell.borrow())
                    ));
                }
                IdentKind::Alias(a) => {
                    if a.value.is_null() {
                        continue;
                    }
                    alias_lines.push(format!(
                        "{} = {}",
                        escape_id(&ident.name),
                        escape_string(&a.value.get_str())
                    ));
                }
                _ => {}
            }
        }
        for line in var_lines {
            let _ = writeln!(out, "{line}");
        }
        if !alias_lines.is_empty() {
            let _ = writeln!(out);
            for line in alias_lines {
                let _ = writeln!(out, "{line}");
            }
        }

        std::fs::write(path, out).with_context(|| format!("write config {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::unescape_string;
    use pretty_assertions::assert_eq;

    #[test]
    fn escape_round_trips() {
        for s in ["", "plain", "has \"quotes\"", "care^t", "multi\nline\ttabbed"] {
            assert_eq!(unescape_string(&escape_string(s)), s, "round-trip of {s:?}");
        }
    }

    #[test]
    fn escape_id_is_noop_on_safe_input() {
        assert_eq!(escape_id(""), "");
        assert_eq!(escape_id("plain_name-2.x"), "plain_name-2.x");
        assert_eq!(escape_id("two words"), "\"two words\"");
    }
}
