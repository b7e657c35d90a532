use std::rc::Rc;

use crate::bytecode::{encode, encode_imm, CodeBlock, Op, Tag, IMM_MAX, IMM_MIN};
use crate::error::ScriptError;
use crate::ident::{IdentKind, Keyword, Param};
use crate::lexer::{Lexer, Token};
use crate::registry::Registry;
use crate::value::{literal_number, parse_int, Value};

/// Compile script source against the registry. Names known at compile
/// time resolve to ident-indexed opcodes; everything else goes through
/// the dynamic by-name paths.
pub fn compile(regs: &mut Registry, src: &str) -> Result<Rc<CodeBlock>, ScriptError> {
    let mut c = Compiler {
        regs,
        lex: Lexer::new(src),
        b: Builder::new(src),
    };
    c.statements(Term::Eof)?;
    Ok(Rc::new(c.b.finish()))
}

/// What an argument slot wants, derived from the target command's
/// signature (or `Any` for aliases and dynamic calls). Literal tokens are
/// coerced right here in the compiler; computed ones get a runtime
/// `force` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Want {
    Any,
    Int,
    Float,
    Str,
    Code,
    IdentName,
}

impl Want {
    fn tag(self) -> Tag {
        match self {
            Want::Int => Tag::Int,
            Want::Float => Tag::Float,
            Want::Str => Tag::Str,
            _ => Tag::Keep,
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum Term {
    Eof,
    Paren,
}

struct Builder {
    words: Vec<u32>,
    ints: Vec<i32>,
    floats: Vec<f32>,
    strs: Vec<Rc<str>>,
    blocks: Vec<Rc<CodeBlock>>,
    source: Rc<str>,
}

impl Builder {
    fn new(source: &str) -> Self {
        Builder {
            words: Vec::new(),
            ints: Vec::new(),
            floats: Vec::new(),
            strs: Vec::new(),
            blocks: Vec::new(),
            source: Rc::from(source),
        }
    }

    fn emit(&mut self, op: Op, tag: Tag, operand: u32) {
        self.words.push(encode(op, tag, operand));
    }

    fn emit_raw(&mut self, word: u32) {
        self.words.push(word);
    }

    fn here(&self) -> u32 {
        self.words.len() as u32
    }

    /// Emit a forward jump with a dummy target; `patch` fills it in.
    fn placeholder(&mut self, op: Op) -> usize {
        let at = self.words.len();
        self.words.push(encode(op, Tag::Keep, 0));
        at
    }

    fn patch(&mut self, at: usize) {
        let target = self.here();
        let word = self.words[at];
        self.words[at] = (word & 0x3FF) | (target << 10);
    }

    fn int_pool(&mut self, v: i32) -> u32 {
        self.ints.push(v);
        (self.ints.len() - 1) as u32
    }

    fn float_pool(&mut self, v: f32) -> u32 {
        self.floats.push(v);
        (self.floats.len() - 1) as u32
    }

    fn str_pool(&mut self, s: &str) -> u32 {
        // Dedupe: statement chunks repeat the same names constantly.
        if let Some(i) = self.strs.iter().position(|e| &**e == s) {
            return i as u32;
        }
        self.strs.push(Rc::from(s));
        (self.strs.len() - 1) as u32
    }

    fn block_pool(&mut self, b: Rc<CodeBlock>) -> u32 {
        self.blocks.push(b);
        (self.blocks.len() - 1) as u32
    }

    fn push_int(&mut self, v: i32) {
        if (IMM_MIN..=IMM_MAX).contains(&v) {
            self.emit(Op::PushIntImm, Tag::Keep, encode_imm(v));
        } else {
            let idx = self.int_pool(v);
            self.emit(Op::PushInt, Tag::Keep, idx);
        }
    }

    fn push_float(&mut self, v: f32) {
        let idx = self.float_pool(v);
        self.emit(Op::PushFloat, Tag::Keep, idx);
    }

    fn push_str(&mut self, s: &str) {
        let idx = self.str_pool(s);
        self.emit(Op::PushStr, Tag::Keep, idx);
    }

    fn finish(self) -> CodeBlock {
        CodeBlock {
            words: self.words,
            ints: self.ints,
            floats: self.floats,
            strs: self.strs,
            blocks: self.blocks,
            source: self.source,
        }
    }
}

struct Compiler<'r, 's> {
    regs: &'r mut Registry,
    lex: Lexer<'s>,
    b: Builder,
}

impl<'r, 's> Compiler<'r, 's> {
    fn statements(&mut self, term: Term) -> Result<usize, ScriptError> {
        let mut count = 0usize;
        loop {
            let tok = self.lex.next_token()?;
            match tok {
                Token::EndStatement => continue,
                Token::End => {
                    if term == Term::Paren {
                        return Err(ScriptError::UnterminatedBlock {
                            line: self.lex.line(),
                        });
                    }
                    break;
                }
                Token::CloseParen => {
                    if term == Term::Paren {
                        break;
                    }
                    // Stray ')' outside a sub-expression; skip it.
                    continue;
                }
                t => {
                    self.statement(t)?;
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Peek the next argument token of the current statement, or None if
    /// the statement is over (terminators stay unconsumed).
    fn peek_arg(&mut self) -> Result<Option<Token<'s>>, ScriptError> {
        let mark = self.lex.mark();
        let tok = self.lex.next_token()?;
        match tok {
            Token::End | Token::EndStatement | Token::CloseParen => {
                self.lex.reset(mark);
                Ok(None)
            }
            t => Ok(Some(t)),
        }
    }

    /// Compile-and-discard every remaining argument of the statement.
    fn discard_rest(&mut self) -> Result<(), ScriptError> {
        while let Some(tok) = self.peek_arg()? {
            self.compile_arg(tok, Want::Any)?;
            self.b.emit(Op::Pop, Tag::Keep, 0);
        }
        Ok(())
    }

    fn statement(&mut self, first: Token<'s>) -> Result<(), ScriptError> {
        match first {
            Token::Word(w) => {
                let mark = self.lex.mark();
                if matches!(self.lex.next_token()?, Token::Word("=")) {
                    return self.assignment(w);
                }
                self.lex.reset(mark);
                self.dispatch_word(w)
            }
            Token::Str(s) => {
                let mark = self.lex.mark();
                if matches!(self.lex.next_token()?, Token::Word("=")) {
                    let name = s.clone();
                    return self.assignment(&name);
                }
                self.lex.reset(mark);
                if self.peek_arg()?.is_none() {
                    self.b.push_str(&s);
                    self.b.emit(Op::Result, Tag::Keep, 0);
                    return Ok(());
                }
                self.b.push_str(&s);
                self.dyn_call_tail()
            }
            Token::Block(inner) => {
                let block = compile(self.regs, inner)?;
                let idx = self.b.block_pool(block);
                self.b.emit(Op::PushBlock, Tag::Keep, idx);
                if self.peek_arg()?.is_none() {
                    self.b.emit(Op::Result, Tag::Keep, 0);
                    return Ok(());
                }
                self.dyn_call_tail()
            }
            Token::Lookup(name) => {
                self.emit_lookup(name);
                if self.peek_arg()?.is_none() {
                    self.b.emit(Op::Result, Tag::Keep, 0);
                    return Ok(());
                }
                self.dyn_call_tail()
            }
            Token::OpenParen => {
                self.b.emit(Op::Enter, Tag::Keep, 0);
                self.statements(Term::Paren)?;
                self.b.emit(Op::Exit, Tag::Keep, 0);
                if self.peek_arg()?.is_none() {
                    self.b.emit(Op::Result, Tag::Keep, 0);
                    return Ok(());
                }
                self.dyn_call_tail()
            }
            // handled by `statements`
            Token::CloseParen | Token::EndStatement | Token::End => Ok(()),
        }
    }

    /// Statement whose callee is already on the stack: compile remaining
    /// args and dispatch dynamically at runtime.
    fn dyn_call_tail(&mut self) -> Result<(), ScriptError> {
        let mut argc = 0u32;
        while let Some(tok) = self.peek_arg()? {
            self.compile_arg(tok, Want::Any)?;
            argc += 1;
        }
        self.b.emit(Op::CallDyn, Tag::Keep, argc);
        self.b.emit(Op::Result, Tag::Keep, 0);
        Ok(())
    }

    fn dispatch_word(&mut self, w: &'s str) -> Result<(), ScriptError> {
        enum D {
            Keyword(Keyword),
            Var(usize),
            Alias(usize),
            Command(usize),
            Unknown,
        }
        let disp = match self.regs.lookup(w) {
            Some(id) => match &self.regs.ident(id).kind {
                IdentKind::Keyword(kw) => D::Keyword(*kw),
                IdentKind::Var(_) => D::Var(id),
                IdentKind::Alias(_) => D::Alias(id),
                IdentKind::Command(_) => D::Command(id),
            },
            None => D::Unknown,
        };
        match disp {
            D::Keyword(kw) => self.keyword_stmt(kw),
            D::Var(id) => self.var_stmt(id),
            D::Alias(id) => {
                let mut argc = 0u32;
                while let Some(tok) = self.peek_arg()? {
                    self.compile_arg(tok, Want::Any)?;
                    argc += 1;
                }
                self.b.emit(Op::CallAlias, Tag::Keep, id as u32);
                self.b.emit_raw(argc);
                self.b.emit(Op::Result, Tag::Keep, 0);
                Ok(())
            }
            D::Command(id) => self.command_stmt(id),
            D::Unknown => {
                if let Some(n) = literal_number(w) {
                    // A bare number in statement position is just a value.
                    self.push_literal(&n);
                    self.discard_rest()?;
                    self.b.emit(Op::Result, Tag::Keep, 0);
                    return Ok(());
                }
                let mut argc = 0u32;
                while let Some(tok) = self.peek_arg()? {
                    self.compile_arg(tok, Want::Any)?;
                    argc += 1;
                }
                let idx = self.b.str_pool(w);
                self.b.emit(Op::CallUnknown, Tag::Keep, idx);
                self.b.emit_raw(argc);
                self.b.emit(Op::Result, Tag::Keep, 0);
                Ok(())
            }
        }
    }

    fn push_literal(&mut self, v: &Value) {
        match v {
            Value::Int(i) => self.b.push_int(*i),
            Value::Float(f) => self.b.push_float(*f),
            other => self.b.push_str(&other.as_str()),
        }
    }

    fn assignment(&mut self, name: &str) -> Result<(), ScriptError> {
        enum Target {
            IntVar(usize),
            FloatVar(usize),
            StrVar(usize),
            Alias(usize),
            Dyn,
        }
        let target = match self.regs.lookup(name) {
            Some(id) => match &self.regs.ident(id).kind {
                IdentKind::Var(crate::ident::VarStorage::Int { .. }) => Target::IntVar(id),
                IdentKind::Var(crate::ident::VarStorage::Float { .. }) => Target::FloatVar(id),
                IdentKind::Var(crate::ident::VarStorage::Str { .. }) => Target::StrVar(id),
                IdentKind::Alias(_) => Target::Alias(id),
                // Commands and keywords cannot be redefined; let the
                // runtime path report it.
                _ => Target::Dyn,
            },
            None => Target::Alias(self.regs.resolve_or_create_alias(name)),
        };

        let want = match target {
            Target::IntVar(_) => Want::Int,
            Target::FloatVar(_) => Want::Float,
            Target::StrVar(_) => Want::Str,
            _ => Want::Any,
        };
        match self.peek_arg()? {
            Some(tok) => self.compile_arg(tok, want)?,
            None => self.b.emit(Op::PushNull, Tag::Keep, 0),
        }
        match target {
            Target::IntVar(id) => self.b.emit(Op::IVarSet, Tag::Keep, id as u32),
            Target::FloatVar(id) => self.b.emit(Op::FVarSet, Tag::Keep, id as u32),
            Target::StrVar(id) => self.b.emit(Op::SVarSet, Tag::Keep, id as u32),
            Target::Alias(id) => self.b.emit(Op::AliasSet, Tag::Keep, id as u32),
            Target::Dyn => {
                let idx = self.b.str_pool(name);
                self.b.emit(Op::AliasSetDyn, Tag::Keep, idx);
            }
        }
        self.discard_rest()?;
        self.b.emit(Op::ResultNull, Tag::Keep, 0);
        Ok(())
    }

    fn var_stmt(&mut self, id: usize) -> Result<(), ScriptError> {
        let storage = match &self.regs.ident(id).kind {
            IdentKind::Var(s) => s.clone(),
            _ => unreachable!("var_stmt on non-var"),
        };
        match self.peek_arg()? {
            None => {
                self.b.emit(Op::PrintVar, Tag::Keep, id as u32);
            }
            Some(tok) => {
                let (want, set) = match storage {
                    crate::ident::VarStorage::Int { .. } => (Want::Int, Op::IVarSet),
                    crate::ident::VarStorage::Float { .. } => (Want::Float, Op::FVarSet),
                    crate::ident::VarStorage::Str { .. } => (Want::Str, Op::SVarSet),
                };
                self.compile_arg(tok, want)?;
                self.b.emit(set, Tag::Keep, id as u32);
                self.discard_rest()?;
            }
        }
        self.b.emit(Op::ResultNull, Tag::Keep, 0);
        Ok(())
    }

    fn command_stmt(&mut self, id: usize) -> Result<(), ScriptError> {
        let spec = match &self.regs.ident(id).kind {
            IdentKind::Command(c) => c.clone(),
            _ => unreachable!("command_stmt on non-command"),
        };
        let mut pi = 0usize;
        let mut supplied = 0u32;
        while let Some(tok) = self.peek_arg()? {
            match next_want(&spec.params, &mut pi) {
                Some(want) => {
                    self.compile_arg(tok, want)?;
                    supplied += 1;
                }
                None => {
                    // Surplus past the signature: evaluate, then drop.
                    self.compile_arg(tok, Want::Any)?;
                    self.b.emit(Op::Pop, Tag::Keep, 0);
                }
            }
        }
        self.b.emit(Op::CallCommand, Tag::Keep, id as u32);
        self.b.emit_raw(supplied);
        self.b.emit(Op::Result, Tag::Keep, 0);
        Ok(())
    }

    fn keyword_stmt(&mut self, kw: Keyword) -> Result<(), ScriptError> {
        match kw {
            Keyword::Result => {
                match self.peek_arg()? {
                    Some(tok) => self.compile_arg(tok, Want::Any)?,
                    None => self.b.emit(Op::PushNull, Tag::Keep, 0),
                }
                self.b.emit(Op::Result, Tag::Keep, 0);
                self.discard_rest()
            }
            Keyword::Not => {
                match self.peek_arg()? {
                    Some(tok) => self.compile_arg(tok, Want::Any)?,
                    None => self.b.emit(Op::PushNull, Tag::Keep, 0),
                }
                self.b.emit(Op::Not, Tag::Keep, 0);
                self.b.emit(Op::Result, Tag::Keep, 0);
                self.discard_rest()
            }
            Keyword::Do | Keyword::DoArgs => {
                let op = if kw == Keyword::Do { Op::Do } else { Op::DoArgs };
                match self.peek_arg()? {
                    Some(tok) => self.compile_arg(tok, Want::Code)?,
                    None => self.b.emit(Op::PushNull, Tag::Keep, 0),
                }
                self.b.emit(op, Tag::Keep, 0);
                self.discard_rest()
            }
            Keyword::Local => {
                let mut ids: Vec<u32> = Vec::new();
                while let Some(tok) = self.peek_arg()? {
                    match tok {
                        Token::Word(w) => {
                            ids.push(self.regs.resolve_or_create_alias(w) as u32);
                        }
                        Token::Str(s) => {
                            ids.push(self.regs.resolve_or_create_alias(&s) as u32);
                        }
                        other => {
                            // Non-name operand; evaluate and ignore.
                            self.compile_arg(other, Want::Any)?;
                            self.b.emit(Op::Pop, Tag::Keep, 0);
                        }
                    }
                }
                self.b.emit(Op::Local, Tag::Keep, ids.len() as u32);
                for id in ids {
                    self.b.emit_raw(id);
                }
                self.b.emit(Op::ResultNull, Tag::Keep, 0);
                Ok(())
            }
            Keyword::If => self.if_stmt(),
            Keyword::And => self.andor_stmt(Op::JumpResultFalse),
            Keyword::Or => self.andor_stmt(Op::JumpResultTrue),
        }
    }

    fn if_stmt(&mut self) -> Result<(), ScriptError> {
        let Some(cond) = self.peek_arg()? else {
            self.b.emit(Op::ResultNull, Tag::Keep, 0);
            return Ok(());
        };
        self.compile_arg(cond, Want::Any)?;
        let Some(then_tok) = self.peek_arg()? else {
            self.b.emit(Op::Pop, Tag::Keep, 0);
            self.b.emit(Op::ResultNull, Tag::Keep, 0);
            return Ok(());
        };
        let to_else = self.b.placeholder(Op::JumpFalse);
        self.compile_branch(then_tok)?;
        let else_tok = self.peek_arg()?;
        let to_end = self.b.placeholder(Op::Jump);
        self.b.patch(to_else);
        match else_tok {
            Some(tok) => self.compile_branch(tok)?,
            None => self.b.emit(Op::ResultNull, Tag::Keep, 0),
        }
        self.b.patch(to_end);
        self.discard_rest()
    }

    /// A branch of `if`: literal blocks inline straight into the current
    /// program; anything else is evaluated and run through `do`.
    fn compile_branch(&mut self, tok: Token<'s>) -> Result<(), ScriptError> {
        match tok {
            Token::Block(inner) => self.inline_block(inner),
            other => {
                self.compile_arg(other, Want::Any)?;
                self.b.emit(Op::Do, Tag::Keep, 0);
                Ok(())
            }
        }
    }

    /// Compile a block's statements into the current program (no nested
    /// code handle, no call). Used by `if`/`and`/`or` so taken branches
    /// cost no alias-style dispatch.
    fn inline_block(&mut self, inner: &'s str) -> Result<(), ScriptError> {
        let saved = std::mem::replace(&mut self.lex, Lexer::new(inner));
        let count = self.statements(Term::Eof)?;
        self.lex = saved;
        if count == 0 {
            self.b.emit(Op::ResultNull, Tag::Keep, 0);
        }
        Ok(())
    }

    fn andor_stmt(&mut self, jump: Op) -> Result<(), ScriptError> {
        let Some(first) = self.peek_arg()? else {
            // `and` of nothing is true, `or` of nothing is false.
            let v = if jump == Op::JumpResultFalse { 1 } else { 0 };
            self.b.push_int(v);
            self.b.emit(Op::Result, Tag::Keep, 0);
            return Ok(());
        };
        let mut patches = Vec::new();
        let mut tok = first;
        loop {
            match tok {
                Token::Block(inner) => self.inline_block(inner)?,
                other => {
                    self.compile_arg(other, Want::Any)?;
                    self.b.emit(Op::Result, Tag::Keep, 0);
                }
            }
            match self.peek_arg()? {
                Some(next) => {
                    patches.push(self.b.placeholder(jump));
                    tok = next;
                }
                None => break,
            }
        }
        for p in patches {
            self.b.patch(p);
        }
        Ok(())
    }

    fn emit_lookup(&mut self, name: &str) {
        match self.regs.lookup(name) {
            Some(id) => match &self.regs.ident(id).kind {
                IdentKind::Var(crate::ident::VarStorage::Int { .. }) => {
                    self.b.emit(Op::IVar, Tag::Keep, id as u32)
                }
                IdentKind::Var(crate::ident::VarStorage::Float { .. }) => {
                    self.b.emit(Op::FVar, Tag::Keep, id as u32)
                }
                IdentKind::Var(crate::ident::VarStorage::Str { .. }) => {
                    self.b.emit(Op::SVar, Tag::Keep, id as u32)
                }
                IdentKind::Alias(_) => self.b.emit(Op::LookupAlias, Tag::Keep, id as u32),
                _ => {
                    let idx = self.b.str_pool(name);
                    self.b.emit(Op::LookupDyn, Tag::Keep, idx);
                }
            },
            None => {
                let idx = self.b.str_pool(name);
                self.b.emit(Op::LookupDyn, Tag::Keep, idx);
            }
        }
    }

    fn compile_arg(&mut self, tok: Token<'s>, want: Want) -> Result<(), ScriptError> {
        match tok {
            Token::Word(w) => self.compile_word_arg(w, want),
            Token::Str(s) => self.compile_word_arg(&s, want),
            Token::Block(inner) => match want {
                Want::Str => {
                    self.b.push_str(inner);
                    Ok(())
                }
                Want::Int | Want::Float => {
                    // A block where a number is expected: compile it and
                    // let the runtime coercion turn it into 0.
                    let block = compile(self.regs, inner)?;
                    let idx = self.b.block_pool(block);
                    self.b.emit(Op::PushBlock, Tag::Keep, idx);
                    self.b.emit(Op::Force, want.tag(), 0);
                    Ok(())
                }
                _ => {
                    let block = compile(self.regs, inner)?;
                    let idx = self.b.block_pool(block);
                    self.b.emit(Op::PushBlock, Tag::Keep, idx);
                    Ok(())
                }
            },
            Token::Lookup(name) => {
                self.emit_lookup(name);
                if want.tag() != Tag::Keep {
                    self.b.emit(Op::Force, want.tag(), 0);
                }
                Ok(())
            }
            Token::OpenParen => {
                self.b.emit(Op::Enter, Tag::Keep, 0);
                self.statements(Term::Paren)?;
                self.b.emit(Op::Exit, want.tag(), 0);
                Ok(())
            }
            Token::CloseParen | Token::EndStatement | Token::End => {
                // Callers never hand these in; degrade to a null push.
                self.b.emit(Op::PushNull, Tag::Keep, 0);
                Ok(())
            }
        }
    }

    /// Literal word or quoted string in argument position: coerce at
    /// compile time per the wanted type.
    fn compile_word_arg(&mut self, text: &str, want: Want) -> Result<(), ScriptError> {
        match want {
            Want::Int => {
                self.b.push_int(parse_int(text));
            }
            Want::Float => {
                self.b.push_float(crate::value::parse_float(text));
            }
            Want::Str | Want::Code => {
                self.b.push_str(text);
            }
            Want::IdentName => {
                let id = self.regs.resolve_or_create_alias(text);
                self.b.emit(Op::PushIdent, Tag::Keep, id as u32);
            }
            Want::Any => match literal_number(text) {
                Some(n) => self.push_literal(&n),
                None => self.b.push_str(text),
            },
        }
        Ok(())
    }
}

/// Walk the signature to the rule for the next supplied argument,
/// handling synthesized slots and trailing variadic groups. `None` means
/// the argument is surplus and should be discarded.
fn next_want(params: &[Param], pi: &mut usize) -> Option<Want> {
    loop {
        let p = *params.get(*pi)?;
        match p {
            Param::Int => {
                *pi += 1;
                return Some(Want::Int);
            }
            Param::Float | Param::FloatRep => {
                *pi += 1;
                return Some(Want::Float);
            }
            Param::Str | Param::StrRep => {
                *pi += 1;
                return Some(Want::Str);
            }
            Param::Any => {
                *pi += 1;
                return Some(Want::Any);
            }
            Param::Code => {
                *pi += 1;
                return Some(Want::Code);
            }
            Param::IdentRef => {
                *pi += 1;
                return Some(Want::IdentName);
            }
            Param::NumArgs | Param::Down => {
                *pi += 1;
            }
            Param::Concat | Param::Variadic => return Some(Want::Any),
            Param::Rep(n) => {
                let mut target = *pi;
                let mut need = n as usize;
                while target > 0 && need > 0 {
                    target -= 1;
                    if params[target].consumes() {
                        need -= 1;
                    }
                }
                if target == *pi {
                    return None;
                }
                *pi = target;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::decode_op;

    #[test]
    fn empty_source_compiles_to_nothing() {
        let mut regs = Registry::new();
        let code = compile(&mut regs, "  // just a comment\n").unwrap();
        assert!(code.words.is_empty());
    }

    #[test]
    fn unterminated_block_surfaces() {
        let mut regs = Registry::new();
        assert!(matches!(
            compile(&mut regs, "x = [oops"),
            Err(ScriptError::UnterminatedBlock { .. })
        ));
    }

    #[test]
    fn unterminated_paren_surfaces() {
        let mut regs = Registry::new();
        assert!(matches!(
            compile(&mut regs, "x = (oops"),
            Err(ScriptError::UnterminatedBlock { .. })
        ));
    }

    #[test]
    fn assignment_to_fresh_name_creates_the_alias() {
        let mut regs = Registry::new();
        let code = compile(&mut regs, "brandnew = 5").unwrap();
        assert!(regs.lookup("brandnew").is_some());
        assert!(code
            .words
            .iter()
            .any(|&w| decode_op(w) == Some(Op::AliasSet)));
    }

    #[test]
    fn known_alias_statement_compiles_to_direct_call() {
        let mut regs = Registry::new();
        let id = regs.resolve_or_create_alias("f");
        let code = compile(&mut regs, "f 1 2").unwrap();
        let call = code
            .words
            .iter()
            .find(|&&w| decode_op(w) == Some(Op::CallAlias));
        assert!(call.is_some());
        assert_eq!(crate::bytecode::decode_operand(*call.unwrap()), id as u32);
    }

    #[test]
    fn unknown_word_statement_compiles_to_dynamic_call() {
        let mut regs = Registry::new();
        let code = compile(&mut regs, "nosuch 1").unwrap();
        assert!(code
            .words
            .iter()
            .any(|&w| decode_op(w) == Some(Op::CallUnknown)));
    }
}
