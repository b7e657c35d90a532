use std::fmt::Write as _;
use std::rc::Rc;

use num_derive::FromPrimitive;
use num_traits::FromPrimitive as _;

use crate::ident::IdentId;

/// Result-type tag carried by call-style and coercion words, so results
/// are coerced once at the call site instead of at every consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[repr(u8)]
pub enum Tag {
    /// Leave the value as produced.
    Keep = 0,
    Int = 1,
    Float = 2,
    Str = 3,
}

/// Bytecode operations. One `u32` word each: opcode in bits 0..8, result
/// tag in bits 8..10, operand in bits 10..32. Some ops read extra raw
/// words (argument counts, local ident lists) after the opcode word.
///
/// The bit-level layout is this implementation's own; only the behavior
/// is contractual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[repr(u8)]
pub enum Op {
    PushNull = 0,
    /// Operand: sign-extended 22-bit immediate.
    PushIntImm,
    /// Operand: index into the int pool.
    PushInt,
    PushFloat,
    PushStr,
    PushBlock,
    /// Operand: ident id.
    PushIdent,
    Dup,
    Pop,
    /// Coerce top of stack to the word's tag.
    Force,
    /// Pop into the result register.
    Result,
    ResultNull,
    /// Save the result register; used with `Exit` to capture a
    /// sub-expression's value.
    Enter,
    /// Push the inner result (coerced to tag), restore the saved one.
    Exit,
    /// Pop, push 1 if falsy else 0.
    Not,
    /// Operand: absolute word index.
    Jump,
    /// Pops the condition.
    JumpFalse,
    JumpTrue,
    /// Reads the result register, does not pop.
    JumpResultFalse,
    JumpResultTrue,
    /// Pop a value; run it if it is code (compiling strings), otherwise
    /// it becomes the result as-is.
    Do,
    /// Same, with the current frame's argument bindings undone around it.
    DoArgs,
    /// Operand: count; followed by that many raw ident-id words.
    Local,
    /// Push an int/float/string var's current value. Operand: ident id.
    IVar,
    FVar,
    SVar,
    /// Pop and assign, with clamping, warnings and the change callback.
    IVarSet,
    FVarSet,
    SVarSet,
    /// Print `name = value` to the console output.
    PrintVar,
    /// Push an alias's current value. Operand: ident id.
    LookupAlias,
    /// Push by name (str-pool operand), auto-vivifying an UNKNOWN ident.
    LookupDyn,
    /// Pop a value into an alias. Operand: ident id.
    AliasSet,
    /// Pop a value, assign by name (str-pool operand) at runtime.
    AliasSetDyn,
    /// Operand: ident id; next word: supplied arg count.
    CallCommand,
    CallAlias,
    /// Operand: str-pool name index; next word: supplied arg count.
    CallUnknown,
    /// Operand: supplied arg count; callee value sits under the args.
    CallDyn,
}

pub fn encode(op: Op, tag: Tag, operand: u32) -> u32 {
    debug_assert!(operand < (1 << 22));
    op as u32 | ((tag as u32) << 8) | (operand << 10)
}

pub fn decode_op(word: u32) -> Option<Op> {
    Op::from_u32(word & 0xFF)
}

pub fn decode_tag(word: u32) -> Tag {
    Tag::from_u32((word >> 8) & 0x3).unwrap_or(Tag::Keep)
}

pub fn decode_operand(word: u32) -> u32 {
    word >> 10
}

/// Sign-extend a 22-bit immediate operand.
pub fn decode_imm(word: u32) -> i32 {
    ((word >> 10) as i32) << 10 >> 10
}

pub fn encode_imm(v: i32) -> u32 {
    (v as u32) & 0x3F_FFFF
}

/// Smallest/largest ints that fit the immediate form.
pub const IMM_MIN: i32 = -(1 << 21);
pub const IMM_MAX: i32 = (1 << 21) - 1;

/// A compiled, immutable program. Shared by handle (`Rc`); alias bodies
/// hold one of these instead of a raw buffer, so lifetime is automatic.
#[derive(Default)]
pub struct CodeBlock {
    pub words: Vec<u32>,
    pub ints: Vec<i32>,
    pub floats: Vec<f32>,
    pub strs: Vec<Rc<str>>,
    pub blocks: Vec<Rc<CodeBlock>>,
    /// Original source text, kept so code values can still render as
    /// strings (alias bodies, `e` params given as text, ...).
    pub source: Rc<str>,
}

impl std::fmt::Debug for CodeBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeBlock")
            .field("words", &self.words.len())
            .field("blocks", &self.blocks.len())
            .field("source", &self.source)
            .finish()
    }
}

impl CodeBlock {
    /// Disassembly listing: one line per decoded word, nested blocks
    /// appended after the main listing.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(&mut out, 0);
        out
    }

    fn dump_into(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        let mut pc = 0usize;
        while pc < self.words.len() {
            let word = self.words[pc];
            let Some(op) = decode_op(word) else {
                let _ = writeln!(out, "{indent}{pc:04}  <bad word {word:#010x}>");
                pc += 1;
                continue;
            };
            let tag = decode_tag(word);
            let operand = decode_operand(word);
            let _ = write!(out, "{indent}{pc:04}  {op}");
            if tag != Tag::Keep {
                let _ = write!(out, ".{tag:?}");
            }
            match op {
                Op::PushIntImm => {
                    let _ = write!(out, " {}", decode_imm(word));
                }
                Op::PushInt => {
                    let _ = write!(out, " {}", self.ints[operand as usize]);
                }
                Op::PushFloat => {
                    let _ = write!(out, " {}", self.floats[operand as usize]);
                }
                Op::PushStr | Op::LookupDyn | Op::AliasSetDyn | Op::CallUnknown => {
                    let _ = write!(out, " {:?}", self.strs[operand as usize]);
                }
                Op::PushBlock => {
                    let _ = write!(out, " block#{operand}");
                }
                Op::PushIdent
                | Op::IVar
                | Op::FVar
                | Op::SVar
                | Op::IVarSet
                | Op::FVarSet
                | Op::SVarSet
                | Op::PrintVar
                | Op::LookupAlias
                | Op::AliasSet
                | Op::CallCommand
                | Op::CallAlias => {
                    let _ = write!(out, " ident#{operand}");
                }
                Op::Jump
                | Op::JumpFalse
                | Op::JumpTrue
                | Op::JumpResultFalse
                | Op::JumpResultTrue => {
                    let _ = write!(out, " -> {operand:04}");
                }
                Op::CallDyn | Op::Local => {
                    let _ = write!(out, " {operand}");
                }
                _ => {}
            }
            pc += 1;
            // trailing raw words
            match op {
                Op::CallCommand | Op::CallAlias | Op::CallUnknown => {
                    let argc = self.words.get(pc).copied().unwrap_or(0);
                    let _ = write!(out, " argc={argc}");
                    pc += 1;
                }
                Op::Local => {
                    for _ in 0..operand {
                        let id = self.words.get(pc).copied().unwrap_or(0) as IdentId;
                        let _ = write!(out, " ident#{id}");
                        pc += 1;
                    }
                }
                _ => {}
            }
            let _ = writeln!(out);
        }
        for (i, block) in self.blocks.iter().enumerate() {
            let _ = writeln!(out, "{indent}block#{i} [{}]", block.source);
            block.dump_into(out, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_round_trip() {
        let w = encode(Op::CallAlias, Tag::Str, 1234);
        assert_eq!(decode_op(w), Some(Op::CallAlias));
        assert_eq!(decode_tag(w), Tag::Str);
        assert_eq!(decode_operand(w), 1234);
    }

    #[test]
    fn immediate_sign_extension() {
        for v in [0, 1, -1, IMM_MIN, IMM_MAX, -4096] {
            let w = encode(Op::PushIntImm, Tag::Keep, encode_imm(v));
            assert_eq!(decode_imm(w), v);
        }
    }
}
