use std::collections::HashMap;
use std::rc::Rc;

use crate::ident::{
    AliasState, Ident, IdentFlags, IdentId, IdentKind, Keyword, MAX_ARGS, NUMARGS_ID,
};

/// The symbol table: one `Ident` per name, indexed by a stable id.
///
/// Constructed explicitly during console startup; native commands are
/// registered into it through the console API rather than by ambient
/// static-initializer side effects.
pub struct Registry {
    idents: Vec<Ident>,
    names: HashMap<Rc<str>, IdentId>,
}

impl Registry {
    pub fn new() -> Self {
        let mut regs = Registry {
            idents: Vec::new(),
            names: HashMap::new(),
        };

        // The numbered argument aliases come first so their ids double as
        // frame-mask bits, then the implicit numargs alias.
        for i in 1..=MAX_ARGS {
            regs.add(
                format!("arg{i}"),
                IdentFlags::ARG,
                IdentKind::Alias(AliasState::default()),
            );
        }
        let numargs = regs.add(
            "numargs".to_string(),
            IdentFlags::ARG,
            IdentKind::Alias(AliasState::default()),
        );
        debug_assert_eq!(numargs, NUMARGS_ID);

        for (name, kw) in [
            ("local", Keyword::Local),
            ("do", Keyword::Do),
            ("doargs", Keyword::DoArgs),
            ("if", Keyword::If),
            ("result", Keyword::Result),
            ("not", Keyword::Not),
            ("and", Keyword::And),
            ("or", Keyword::Or),
        ] {
            regs.add(name.to_string(), IdentFlags::empty(), IdentKind::Keyword(kw));
        }

        regs
    }

    pub(crate) fn add(&mut self, name: String, flags: IdentFlags, kind: IdentKind) -> IdentId {
        let name: Rc<str> = Rc::from(name);
        let id = self.idents.len();
        self.idents.push(Ident {
            name: name.clone(),
            flags,
            kind,
            on_change: None,
            override_default: None,
        });
        self.names.insert(name, id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<IdentId> {
        self.names.get(name).copied()
    }

    pub fn ident(&self, id: IdentId) -> &Ident {
        &self.idents[id]
    }

    pub(crate) fn ident_mut(&mut self, id: IdentId) -> &mut Ident {
        &mut self.idents[id]
    }

    pub fn len(&self) -> usize {
        self.idents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idents.is_empty()
    }

    pub fn iter_ids(&self) -> impl Iterator<Item = IdentId> {
        0..self.idents.len()
    }

    /// The soft-error path for name resolution: a reference to a name
    /// nobody declared vivifies a Null-valued alias flagged UNKNOWN
    /// instead of failing.
    pub fn lookup_or_create_unknown(&mut self, name: &str) -> IdentId {
        if let Some(id) = self.lookup(name) {
            return id;
        }
        self.add(
            name.to_string(),
            IdentFlags::UNKNOWN,
            IdentKind::Alias(AliasState::default()),
        )
    }

    /// Resolve a name to an alias id for binding purposes (`local`, loop
    /// variables, assignments to fresh names), creating it if needed.
    pub(crate) fn resolve_or_create_alias(&mut self, name: &str) -> IdentId {
        if let Some(id) = self.lookup(name) {
            return id;
        }
        self.add(
            name.to_string(),
            IdentFlags::empty(),
            IdentKind::Alias(AliasState::default()),
        )
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_idents_occupy_the_low_ids() {
        let regs = Registry::new();
        assert_eq!(regs.lookup("arg1"), Some(0));
        assert_eq!(regs.lookup("arg25"), Some(MAX_ARGS - 1));
        assert_eq!(regs.lookup("numargs"), Some(NUMARGS_ID));
    }

    #[test]
    fn unknown_names_vivify_once() {
        let mut regs = Registry::new();
        let a = regs.lookup_or_create_unknown("ghost");
        let b = regs.lookup_or_create_unknown("ghost");
        assert_eq!(a, b);
        assert!(regs.ident(a).flags.contains(IdentFlags::UNKNOWN));
    }
}
