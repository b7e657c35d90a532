use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::mem;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::bytecode::{decode_imm, decode_op, decode_operand, decode_tag, CodeBlock, Op, Tag};
use crate::compiler;
use crate::error::ScriptError;
use crate::ident::{
    ChangeFn, CommandSpec, IdentFlags, IdentId, IdentKind, Keyword, Param, VarStorage,
    parse_signature, MAX_ARGS, NUMARGS_ID,
};
use crate::registry::Registry;
use crate::scope::Frame;
use crate::sched::{ReleaseAction, SleepEntry};
use crate::value::{float_to_text, literal_number, IdentRef, Value};

/// How many console output lines are retained if the host stops draining.
const OUTPUT_CAP: usize = 256;

/// The script console: symbol registry, operand stack, result register,
/// call frames, and the cooperative queues. One per host; everything is
/// single-threaded and runs to completion on the calling thread.
pub struct Console {
    pub(crate) regs: Registry,
    pub(crate) stack: Vec<Value>,
    pub(crate) result: Value,
    pub(crate) saved_results: Vec<Value>,
    pub(crate) frames: Vec<Frame>,
    pub(crate) depth: usize,
    pub(crate) max_depth: usize,
    pub(crate) output: VecDeque<String>,
    pub(crate) sleeps: Vec<SleepEntry>,
    pub(crate) triggers: VecDeque<IdentId>,
    pub(crate) release_actions: Vec<ReleaseAction>,
    pub(crate) press_active: bool,
    pub(crate) override_mode: bool,
    pub(crate) default_cfg: Option<PathBuf>,
    pub(crate) autoexec_cfg: Option<PathBuf>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        let mut con = Console {
            regs: Registry::new(),
            stack: Vec::new(),
            result: Value::Null,
            saved_results: Vec::new(),
            frames: vec![Frame::root()],
            depth: 0,
            max_depth: 256,
            output: VecDeque::new(),
            sleeps: Vec::new(),
            triggers: VecDeque::new(),
            release_actions: Vec::new(),
            press_active: false,
            override_mode: false,
            default_cfg: None,
            autoexec_cfg: None,
        };
        crate::builtins::register_defaults(&mut con);
        con
    }

    pub fn registry(&self) -> &Registry {
        &self.regs
    }

    // -------------------------
    // Host registration surface
    // -------------------------

    /// Register a native command. The signature string is parsed once,
    /// here; both compiler and VM consume the structured form.
    /// Re-registering an existing command is an error; commands are fixed
    /// once declared.
    pub fn declare_command(
        &mut self,
        name: &str,
        sig: &str,
        f: impl Fn(&mut Console, &[Value]) -> Value + 'static,
    ) -> Result<(), ScriptError> {
        let spec = Rc::new(CommandSpec {
            params: parse_signature(sig),
            native: Rc::new(f),
        });
        if let Some(id) = self.regs.lookup(name) {
            if self.regs.ident(id).is_command() {
                return Err(ScriptError::DuplicateCommand(name.to_string()));
            }
            // The name was auto-vivified (or script-defined) earlier; the
            // id stays valid, only the kind changes.
            let ident = self.regs.ident_mut(id);
            ident.kind = IdentKind::Command(spec);
            ident.flags.remove(IdentFlags::UNKNOWN);
            return Ok(());
        }
        self.regs
            .add(name.to_string(), IdentFlags::empty(), IdentKind::Command(spec));
        Ok(())
    }

    /// Declare (or re-declare in place) an integer variable backed by a
    /// shared cell. min > max marks the variable read-only.
    pub fn declare_int_var(
        &mut self,
        name: &str,
        min: i32,
        cur: i32,
        max: i32,
        mut flags: IdentFlags,
        on_change: Option<ChangeFn>,
    ) -> Rc<Cell<i32>> {
        if min > max {
            flags |= IdentFlags::READONLY;
        }
        let cell = match self.regs.lookup(name).map(|id| &self.regs.ident(id).kind) {
            Some(IdentKind::Var(VarStorage::Int { cell, .. })) => cell.clone(),
            _ => Rc::new(Cell::new(cur)),
        };
        cell.set(cur);
        let kind = IdentKind::Var(VarStorage::Int {
            min,
            max,
            cell: cell.clone(),
        });
        self.install_var(name, flags, kind, on_change);
        cell
    }

    pub fn declare_float_var(
        &mut self,
        name: &str,
        min: f32,
        cur: f32,
        max: f32,
        mut flags: IdentFlags,
        on_change: Option<ChangeFn>,
    ) -> Rc<Cell<f32>> {
        if min > max {
            flags |= IdentFlags::READONLY;
        }
        let cell = match self.regs.lookup(name).map(|id| &self.regs.ident(id).kind) {
            Some(IdentKind::Var(VarStorage::Float { cell, .. })) => cell.clone(),
            _ => Rc::new(Cell::new(cur)),
        };
        cell.set(cur);
        let kind = IdentKind::Var(VarStorage::Float {
            min,
            max,
            cell: cell.clone(),
        });
        self.install_var(name, flags, kind, on_change);
        cell
    }

    pub fn declare_str_var(
        &mut self,
        name: &str,
        cur: &str,
        flags: IdentFlags,
        on_change: Option<ChangeFn>,
    ) -> Rc<RefCell<String>> {
        let cell = match self.regs.lookup(name).map(|id| &self.regs.ident(id).kind) {
            Some(IdentKind::Var(VarStorage::Str { cell })) => cell.clone(),
            _ => Rc::new(RefCell::new(String::new())),
        };
        *cell.borrow_mut() = cur.to_string();
        let kind = IdentKind::Var(VarStorage::Str { cell: cell.clone() });
        self.install_var(name, flags, kind, on_change);
        cell
    }

    fn install_var(
        &mut self,
        name: &str,
        flags: IdentFlags,
        kind: IdentKind,
        on_change: Option<ChangeFn>,
    ) {
        if let Some(id) = self.regs.lookup(name) {
            let ident = self.regs.ident_mut(id);
            ident.kind = kind;
            ident.flags = flags;
            ident.on_change = on_change;
        } else {
            let id = self.regs.add(name.to_string(), flags, kind);
            self.regs.ident_mut(id).on_change = on_change;
        }
    }

    pub fn declare_alias(&mut self, name: &str, value: Value, flags: IdentFlags) -> IdentId {
        let id = self.regs.resolve_or_create_alias(name);
        let ident = self.regs.ident_mut(id);
        ident.flags = flags;
        if let Some(a) = ident.alias_mut() {
            a.value = value;
            a.code = None;
        }
        id
    }

    // -------------------------
    // Execution
    // -------------------------

    pub fn compile(&mut self, src: &str) -> Result<Rc<CodeBlock>, ScriptError> {
        compiler::compile(&mut self.regs, src)
    }

    /// Compile and run one chunk. Compile errors are surfaced to the
    /// console output and returned; runtime never errors.
    pub fn execute(&mut self, src: &str) -> Result<Value, ScriptError> {
        let code = match compiler::compile(&mut self.regs, src) {
            Ok(c) => c,
            Err(e) => {
                self.script_error(&e);
                return Err(e);
            }
        };
        Ok(self.run_block(&code))
    }

    pub fn execute_int(&mut self, src: &str) -> Result<i32, ScriptError> {
        self.execute(src).map(|v| v.get_int())
    }

    pub fn execute_bool(&mut self, src: &str) -> Result<bool, ScriptError> {
        self.execute(src).map(|v| v.get_bool())
    }

    pub fn execute_str(&mut self, src: &str) -> Result<String, ScriptError> {
        self.execute(src).map(|v| v.get_str().to_string())
    }

    /// Execute a chunk in a key-press context: `D`-style command params
    /// see a press, and matching release actions are queued for
    /// `release_all`.
    pub fn execute_pressed(&mut self, src: &str) -> Result<Value, ScriptError> {
        self.press_active = true;
        let r = self.execute(src);
        self.press_active = false;
        r
    }

    /// Load and run a script file. Missing or unreadable files surface a
    /// console message and an error; they never abort the host.
    pub fn exec_file(&mut self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|e| {
            self.console_msg(format!("could not read {}", path.display()));
            ScriptError::File {
                path: path.display().to_string(),
                source: e,
            }
        })?;
        self.execute(&src)?;
        Ok(())
    }

    /// Run a compiled block to completion and hand back its value. The
    /// result register is scoped per block: an empty block yields Null.
    pub fn run_block(&mut self, code: &Rc<CodeBlock>) -> Value {
        if self.depth >= self.max_depth {
            self.console_msg("exceeded maximum script recursion depth");
            log::warn!("script recursion depth limit ({}) hit", self.max_depth);
            return Value::Null;
        }
        self.depth += 1;
        let saved_result = mem::take(&mut self.result);
        let stack_base = self.stack.len();
        let saved_base = self.saved_results.len();
        self.exec(code);
        self.stack.truncate(stack_base);
        self.saved_results.truncate(saved_base);
        let out = mem::replace(&mut self.result, saved_result);
        self.depth -= 1;
        out
    }

    /// `do` semantics: run code values (compiling strings on the fly);
    /// plain values pass through unchanged.
    pub fn run_value(&mut self, v: &Value) -> Value {
        match v {
            Value::Code(c) => {
                let c = c.clone();
                self.run_block(&c)
            }
            Value::Str(s) => {
                let src = s.clone();
                match compiler::compile(&mut self.regs, &src) {
                    Ok(c) => self.run_block(&c),
                    Err(e) => {
                        self.script_error(&e);
                        Value::Null
                    }
                }
            }
            other => other.clone(),
        }
    }

    fn exec(&mut self, code: &Rc<CodeBlock>) {
        let mut pc = 0usize;
        while pc < code.words.len() {
            let word = code.words[pc];
            pc += 1;
            let Some(op) = decode_op(word) else {
                log::error!("bad bytecode word {word:#010x} at {}", pc - 1);
                continue;
            };
            let tag = decode_tag(word);
            let operand = decode_operand(word) as usize;
            match op {
                Op::PushNull => self.stack.push(Value::Null),
                Op::PushIntImm => self.stack.push(Value::Int(decode_imm(word))),
                Op::PushInt => self
                    .stack
                    .push(Value::Int(code.ints.get(operand).copied().unwrap_or(0))),
                Op::PushFloat => self
                    .stack
                    .push(Value::Float(code.floats.get(operand).copied().unwrap_or(0.0))),
                Op::PushStr => match code.strs.get(operand) {
                    Some(s) => self.stack.push(Value::Str(s.clone())),
                    None => self.stack.push(Value::Null),
                },
                Op::PushBlock => match code.blocks.get(operand) {
                    Some(b) => self.stack.push(Value::Code(b.clone())),
                    None => self.stack.push(Value::Null),
                },
                Op::PushIdent => {
                    let name = self.regs.ident(operand).name.clone();
                    self.stack.push(Value::Ident(IdentRef { id: operand, name }));
                }
                Op::Dup => {
                    let v = self.stack.last().cloned().unwrap_or(Value::Null);
                    self.stack.push(v);
                }
                Op::Pop => {
                    self.stack.pop();
                }
                Op::Force => {
                    let v = self.pop();
                    let v = coerce(v, tag);
                    self.stack.push(v);
                }
                Op::Result => {
                    self.result = self.pop();
                }
                Op::ResultNull => {
                    self.result = Value::Null;
                }
                Op::Enter => {
                    self.saved_results.push(mem::take(&mut self.result));
                }
                Op::Exit => {
                    let inner = mem::take(&mut self.result);
                    self.result = self.saved_results.pop().unwrap_or(Value::Null);
                    self.stack.push(coerce(inner, tag));
                }
                Op::Not => {
                    let v = self.pop();
                    self.stack.push(Value::Int(!v.get_bool() as i32));
                }
                Op::Jump => pc = operand,
                Op::JumpFalse => {
                    let v = self.pop();
                    if !v.get_bool() {
                        pc = operand;
                    }
                }
                Op::JumpTrue => {
                    let v = self.pop();
                    if v.get_bool() {
                        pc = operand;
                    }
                }
                Op::JumpResultFalse => {
                    if !self.result.get_bool() {
                        pc = operand;
                    }
                }
                Op::JumpResultTrue => {
                    if self.result.get_bool() {
                        pc = operand;
                    }
                }
                Op::Do => {
                    let v = self.pop();
                    self.result = self.run_value(&v);
                }
                Op::DoArgs => {
                    let v = self.pop();
                    let undone = self.undo_args();
                    let r = self.run_value(&v);
                    if undone {
                        self.redo_args();
                    }
                    self.result = r;
                }
                Op::Local => {
                    for _ in 0..operand {
                        let id = code.words.get(pc).copied().unwrap_or(0) as IdentId;
                        pc += 1;
                        self.add_local(id);
                    }
                }
                Op::IVar | Op::FVar | Op::SVar => {
                    let v = self.lookup_value(operand);
                    self.stack.push(v);
                }
                Op::IVarSet => {
                    let v = self.pop();
                    self.set_int_var_by_id(operand, v.get_int(), true, true);
                }
                Op::FVarSet => {
                    let v = self.pop();
                    self.set_float_var_by_id(operand, v.get_float(), true, true);
                }
                Op::SVarSet => {
                    let v = self.pop();
                    self.set_str_var_by_id(operand, &v.get_str(), true);
                }
                Op::PrintVar => self.print_var(operand),
                Op::LookupAlias => {
                    let v = self.lookup_value(operand);
                    self.stack.push(v);
                }
                Op::LookupDyn => {
                    let name = match code.strs.get(operand) {
                        Some(s) => s.clone(),
                        None => {
                            self.stack.push(Value::Null);
                            continue;
                        }
                    };
                    let id = self.regs.lookup_or_create_unknown(&name);
                    let v = self.lookup_value(id);
                    self.stack.push(v);
                }
                Op::AliasSet => {
                    let v = self.pop();
                    self.set_alias_by_id(operand, v);
                }
                Op::AliasSetDyn => {
                    let v = self.pop();
                    if let Some(name) = code.strs.get(operand) {
                        let name = name.clone();
                        self.set_alias(&name, v);
                    }
                }
                Op::CallCommand => {
                    let argc = code.words.get(pc).copied().unwrap_or(0) as usize;
                    pc += 1;
                    let args = self.pop_args(argc);
                    self.dispatch_ident(operand, args, tag);
                }
                Op::CallAlias => {
                    let argc = code.words.get(pc).copied().unwrap_or(0) as usize;
                    pc += 1;
                    let args = self.pop_args(argc);
                    self.dispatch_ident(operand, args, tag);
                }
                Op::CallUnknown => {
                    let argc = code.words.get(pc).copied().unwrap_or(0) as usize;
                    pc += 1;
                    let args = self.pop_args(argc);
                    let name = code
                        .strs
                        .get(operand)
                        .cloned()
                        .unwrap_or_else(|| Rc::from(""));
                    self.dispatch_by_name(&name, args, tag);
                }
                Op::CallDyn => {
                    let args = self.pop_args(operand);
                    let callee = self.pop();
                    match callee {
                        Value::Code(c) => {
                            let r = self.run_block(&c);
                            self.stack.push(coerce(r, tag));
                        }
                        Value::Str(s) => self.dispatch_by_name(&s, args, tag),
                        Value::Ident(r) => self.dispatch_ident(r.id, args, tag),
                        other => self.stack.push(coerce(other, tag)),
                    }
                }
            }
        }
    }

    // -------------------------
    // Stack helpers
    // -------------------------

    fn pop(&mut self) -> Value {
        // Underflow degrades to Null; the compiler keeps this balanced,
        // but a script must never be able to take the host down.
        self.stack.pop().unwrap_or(Value::Null)
    }

    fn pop_args(&mut self, argc: usize) -> Vec<Value> {
        let n = argc.min(self.stack.len());
        self.stack.split_off(self.stack.len() - n)
    }

    // -------------------------
    // Calls
    // -------------------------

    /// Invoke an ident with already-evaluated arguments, whatever its
    /// kind turns out to be at runtime. Pushes the (tag-coerced) result.
    pub(crate) fn dispatch_ident(&mut self, id: IdentId, args: Vec<Value>, tag: Tag) {
        enum D {
            Command(Rc<CommandSpec>),
            Alias,
            Var,
            Keyword(Keyword),
        }
        let d = match &self.regs.ident(id).kind {
            IdentKind::Command(spec) => D::Command(spec.clone()),
            IdentKind::Alias(_) => D::Alias,
            IdentKind::Var(_) => D::Var,
            IdentKind::Keyword(kw) => D::Keyword(*kw),
        };
        match d {
            D::Command(spec) => self.call_command(&spec, args, tag),
            D::Alias => self.call_alias(id, args, tag),
            D::Var => {
                if let Some(v) = args.into_iter().next() {
                    self.set_var_from_value(id, &v);
                } else {
                    self.print_var(id);
                }
                self.stack.push(Value::Null);
            }
            D::Keyword(kw) => self.exec_keyword_dynamic(kw, args, tag),
        }
    }

    fn call_command(&mut self, spec: &Rc<CommandSpec>, args: Vec<Value>, tag: Tag) {
        let (margs, down_slot) = self.marshal_args(&spec.params, args);
        if let Some(slot) = down_slot {
            if self.press_active {
                let mut rel: Vec<Value> = margs.to_vec();
                rel[slot] = Value::Int(0);
                self.release_actions.push(ReleaseAction {
                    native: spec.native.clone(),
                    args: rel,
                });
            }
        }
        let native = spec.native.clone();
        let ret = native(self, &margs);
        self.stack.push(coerce(ret, tag));
    }

    /// Marshal popped stack values into the typed argument slice a native
    /// expects. Missing slots get per-rule defaults, surplus ones were
    /// already dropped unless a variadic rule claims them.
    fn marshal_args(
        &mut self,
        params: &[Param],
        mut popped: Vec<Value>,
    ) -> (SmallVec<[Value; 8]>, Option<usize>) {
        let supplied = popped.len();
        let mut out: SmallVec<[Value; 8]> = SmallVec::new();
        let mut down_slot = None;
        let mut i = 0usize;
        let mut pi = 0usize;
        while pi < params.len() {
            match params[pi] {
                Param::Int => {
                    let v = take_next(&mut popped, &mut i).map(|v| v.get_int()).unwrap_or(0);
                    out.push(Value::Int(v));
                    pi += 1;
                }
                Param::Float => {
                    let v = take_next(&mut popped, &mut i)
                        .map(|v| v.get_float())
                        .unwrap_or(0.0);
                    out.push(Value::Float(v));
                    pi += 1;
                }
                Param::FloatRep => {
                    let v = match take_next(&mut popped, &mut i) {
                        Some(v) => v.get_float(),
                        None => out.last().map(|v| v.get_float()).unwrap_or(0.0),
                    };
                    out.push(Value::Float(v));
                    pi += 1;
                }
                Param::Str => {
                    let v = match take_next(&mut popped, &mut i) {
                        Some(v) => v.get_str(),
                        None => Rc::from(""),
                    };
                    out.push(Value::Str(v));
                    pi += 1;
                }
                Param::StrRep => {
                    let v = match take_next(&mut popped, &mut i) {
                        Some(v) => v.get_str(),
                        None => out.last().map(|v| v.get_str()).unwrap_or_else(|| Rc::from("")),
                    };
                    out.push(Value::Str(v));
                    pi += 1;
                }
                Param::Any => {
                    out.push(take_next(&mut popped, &mut i).unwrap_or(Value::Null));
                    pi += 1;
                }
                Param::Code => {
                    let v = match take_next(&mut popped, &mut i) {
                        Some(Value::Code(c)) => Value::Code(c),
                        Some(Value::Str(s)) => match compiler::compile(&mut self.regs, &s) {
                            Ok(c) => Value::Code(c),
                            Err(e) => {
                                self.script_error(&e);
                                Value::Null
                            }
                        },
                        _ => Value::Null,
                    };
                    out.push(v);
                    pi += 1;
                }
                Param::IdentRef => {
                    let v = match take_next(&mut popped, &mut i) {
                        Some(Value::Ident(r)) => Value::Ident(r),
                        Some(other) => {
                            let name = other.get_str();
                            if name.is_empty() {
                                Value::Null
                            } else {
                                let id = self.regs.lookup_or_create_unknown(&name);
                                Value::Ident(IdentRef {
                                    id,
                                    name: self.regs.ident(id).name.clone(),
                                })
                            }
                        }
                        None => Value::Null,
                    };
                    out.push(v);
                    pi += 1;
                }
                Param::NumArgs => {
                    out.push(Value::Int(supplied as i32));
                    pi += 1;
                }
                Param::Down => {
                    down_slot = Some(out.len());
                    out.push(Value::Int(self.press_active as i32));
                    pi += 1;
                }
                Param::Concat => {
                    let mut joined = String::new();
                    while let Some(v) = take_next(&mut popped, &mut i) {
                        if !joined.is_empty() {
                            joined.push(' ');
                        }
                        joined.push_str(&v.as_str());
                    }
                    out.push(Value::str(joined));
                    pi += 1;
                }
                Param::Variadic => {
                    while let Some(v) = take_next(&mut popped, &mut i) {
                        out.push(v);
                    }
                    pi += 1;
                }
                Param::Rep(n) => {
                    if i >= supplied {
                        break;
                    }
                    let mut target = pi;
                    let mut need = n as usize;
                    while target > 0 && need > 0 {
                        target -= 1;
                        if params[target].consumes() {
                            need -= 1;
                        }
                    }
                    if target == pi {
                        break;
                    }
                    pi = target;
                }
            }
        }
        (out, down_slot)
    }

    fn call_alias(&mut self, id: IdentId, mut args: Vec<Value>, tag: Tag) {
        if self.depth >= self.max_depth {
            self.console_msg("exceeded maximum script recursion depth");
            self.stack.push(Value::Null);
            return;
        }
        args.truncate(MAX_ARGS);
        let argc = args.len();
        let mut mask = 0u32;
        for (i, v) in args.into_iter().enumerate() {
            self.push_shadow(i, v);
            mask |= 1 << i;
        }
        self.push_shadow(NUMARGS_ID, Value::Int(argc as i32));
        mask |= 1 << NUMARGS_ID;
        self.frames.push(Frame {
            owner: Some(id),
            used_args: mask,
            locals: Vec::new(),
        });
        let val = match self.ensure_alias_code(id) {
            Some(code) => self.run_block(&code),
            None => Value::Null,
        };
        self.pop_frame();
        self.stack.push(coerce(val, tag));
    }

    /// The alias's compiled body, compiling (and caching) its current
    /// value if needed. Null-valued aliases have no body.
    fn ensure_alias_code(&mut self, id: IdentId) -> Option<Rc<CodeBlock>> {
        let src: Rc<str>;
        {
            let a = self.regs.ident_mut(id).alias_mut()?;
            if let Some(c) = &a.code {
                return Some(c.clone());
            }
            match &a.value {
                Value::Code(c) => {
                    let c = c.clone();
                    a.code = Some(c.clone());
                    return Some(c);
                }
                Value::Null => return None,
                v => src = v.get_str(),
            }
        }
        match compiler::compile(&mut self.regs, &src) {
            Ok(c) => {
                if let Some(a) = self.regs.ident_mut(id).alias_mut() {
                    a.code = Some(c.clone());
                }
                Some(c)
            }
            Err(e) => {
                self.script_error(&e);
                None
            }
        }
    }

    /// Runtime dispatch by name: the path for names unknown at compile
    /// time. A bare number evaluates to itself; anything else missing
    /// reports an unknown command and yields Null.
    pub(crate) fn dispatch_by_name(&mut self, name: &str, args: Vec<Value>, tag: Tag) {
        match self.regs.lookup(name) {
            Some(id) => self.dispatch_ident(id, args, tag),
            None => {
                if let Some(n) = literal_number(name) {
                    self.stack.push(coerce(n, tag));
                    return;
                }
                self.console_msg(format!("unknown command: {name}"));
                self.stack.push(Value::Null);
            }
        }
    }

    /// Keywords reached through dynamic dispatch (`"if" ...`, an ident
    /// value invoked by name). The compiler normally lowers these to
    /// jumps; this is the soft runtime rendition of the same semantics.
    fn exec_keyword_dynamic(&mut self, kw: Keyword, args: Vec<Value>, tag: Tag) {
        let r = match kw {
            Keyword::Do => {
                let v = args.into_iter().next().unwrap_or(Value::Null);
                self.run_value(&v)
            }
            Keyword::DoArgs => {
                let v = args.into_iter().next().unwrap_or(Value::Null);
                let undone = self.undo_args();
                let r = self.run_value(&v);
                if undone {
                    self.redo_args();
                }
                r
            }
            Keyword::If => {
                let mut it = args.into_iter();
                let cond = it.next().unwrap_or(Value::Null);
                let then_v = it.next().unwrap_or(Value::Null);
                let else_v = it.next().unwrap_or(Value::Null);
                if cond.get_bool() {
                    self.run_value(&then_v)
                } else {
                    self.run_value(&else_v)
                }
            }
            Keyword::Result => args.into_iter().next().unwrap_or(Value::Null),
            Keyword::Not => {
                let v = args.into_iter().next().unwrap_or(Value::Null);
                Value::Int(!v.get_bool() as i32)
            }
            Keyword::And => {
                let mut r = Value::Int(1);
                for a in &args {
                    r = self.run_value(a);
                    if !r.get_bool() {
                        break;
                    }
                }
                r
            }
            Keyword::Or => {
                let mut r = Value::Int(0);
                for a in &args {
                    r = self.run_value(a);
                    if r.get_bool() {
                        break;
                    }
                }
                r
            }
            Keyword::Local => {
                for a in &args {
                    let name = a.get_str();
                    if !name.is_empty() {
                        let id = self.regs.resolve_or_create_alias(&name);
                        self.add_local(id);
                    }
                }
                Value::Null
            }
        };
        self.stack.push(coerce(r, tag));
    }

    // -------------------------
    // Ident value access
    // -------------------------

    /// An ident's current value for lookup purposes. Commands and
    /// keywords have no value.
    pub(crate) fn lookup_value(&self, id: IdentId) -> Value {
        match &self.regs.ident(id).kind {
            IdentKind::Alias(a) => a.value.clone(),
            IdentKind::Var(VarStorage::Int { cell, .. }) => Value::Int(cell.get()),
            IdentKind::Var(VarStorage::Float { cell, .. }) => Value::Float(cell.get()),
            IdentKind::Var(VarStorage::Str { cell }) => Value::str(cell.borrow().as_str()),
            IdentKind::Command(_) | IdentKind::Keyword(_) => Value::Null,
        }
    }

    /// Look up an alias/var value by name, vivifying unknown names.
    pub fn lookup(&mut self, name: &str) -> Value {
        let id = self.regs.lookup_or_create_unknown(name);
        self.lookup_value(id)
    }

    pub fn get_alias(&self, name: &str) -> Option<Value> {
        let id = self.regs.lookup(name)?;
        self.regs.ident(id).alias().map(|a| a.value.clone())
    }

    /// Assign an alias by name, creating it on first use. Assigning to a
    /// command or keyword name is refused with a console message.
    pub fn set_alias(&mut self, name: &str, v: Value) {
        match self.regs.lookup(name) {
            Some(id) => self.set_alias_by_id(id, v),
            None => {
                let id = self.regs.resolve_or_create_alias(name);
                self.set_alias_by_id(id, v);
            }
        }
    }

    pub(crate) fn set_alias_by_id(&mut self, id: IdentId, v: Value) {
        if self.regs.ident(id).is_var() {
            self.set_var_from_value(id, &v);
            return;
        }
        let ident = self.regs.ident_mut(id);
        if let Some(a) = ident.alias_mut() {
            a.value = v;
            a.code = None;
        } else {
            let name = ident.name.clone();
            self.console_msg(format!("cannot redefine builtin {name}"));
            return;
        }
        self.regs.ident_mut(id).flags.remove(IdentFlags::UNKNOWN);
    }

    fn set_var_from_value(&mut self, id: IdentId, v: &Value) {
        match &self.regs.ident(id).kind {
            IdentKind::Var(VarStorage::Int { .. }) => {
                self.set_int_var_by_id(id, v.get_int(), true, true)
            }
            IdentKind::Var(VarStorage::Float { .. }) => {
                self.set_float_var_by_id(id, v.get_float(), true, true)
            }
            IdentKind::Var(VarStorage::Str { .. }) => {
                let s = v.get_str();
                self.set_str_var_by_id(id, &s, true)
            }
            _ => {}
        }
    }

    // -------------------------
    // Var assignment (clamp, warn, callback, override bookkeeping)
    // -------------------------

    pub fn set_int_var(&mut self, name: &str, v: i32, run_callback: bool, clamp: bool) {
        match self.regs.lookup(name) {
            Some(id) => self.set_int_var_by_id(id, v, run_callback, clamp),
            None => self.console_msg(format!("unknown variable: {name}")),
        }
    }

    pub fn set_float_var(&mut self, name: &str, v: f32, run_callback: bool, clamp: bool) {
        match self.regs.lookup(name) {
            Some(id) => self.set_float_var_by_id(id, v, run_callback, clamp),
            None => self.console_msg(format!("unknown variable: {name}")),
        }
    }

    pub fn set_str_var(&mut self, name: &str, v: &str, run_callback: bool) {
        match self.regs.lookup(name) {
            Some(id) => self.set_str_var_by_id(id, v, run_callback),
            None => self.console_msg(format!("unknown variable: {name}")),
        }
    }

    pub(crate) fn set_int_var_by_id(&mut self, id: IdentId, v: i32, run_callback: bool, clamp: bool) {
        let (min, max, cell, flags, name, cb) = {
            let ident = self.regs.ident(id);
            let IdentKind::Var(VarStorage::Int { min, max, cell }) = &ident.kind else {
                return;
            };
            (
                *min,
                *max,
                cell.clone(),
                ident.flags,
                ident.name.clone(),
                ident.on_change.clone(),
            )
        };
        if flags.contains(IdentFlags::READONLY) {
            log::debug!("ignoring write to read-only variable {name}");
            return;
        }
        self.note_override(id, Value::Int(cell.get()));
        let mut v = v;
        if clamp && min <= max && !(min..=max).contains(&v) {
            v = v.clamp(min, max);
            let msg = if flags.contains(IdentFlags::HEX) {
                format!("valid range for {name} is {min:#x}..{max:#x}")
            } else {
                format!("valid range for {name} is {min}..{max}")
            };
            self.warn(msg);
        }
        cell.set(v);
        if run_callback {
            if let Some(cb) = cb {
                cb(self);
            }
        }
    }

    pub(crate) fn set_float_var_by_id(
        &mut self,
        id: IdentId,
        v: f32,
        run_callback: bool,
        clamp: bool,
    ) {
        let (min, max, cell, flags, name, cb) = {
            let ident = self.regs.ident(id);
            let IdentKind::Var(VarStorage::Float { min, max, cell }) = &ident.kind else {
                return;
            };
            (
                *min,
                *max,
                cell.clone(),
                ident.flags,
                ident.name.clone(),
                ident.on_change.clone(),
            )
        };
        if flags.contains(IdentFlags::READONLY) {
            log::debug!("ignoring write to read-only variable {name}");
            return;
        }
        self.note_override(id, Value::Float(cell.get()));
        let mut v = v;
        if clamp && min <= max && !(min..=max).contains(&v) {
            v = v.clamp(min, max);
            self.warn(format!(
                "valid range for {name} is {}..{}",
                float_to_text(min),
                float_to_text(max)
            ));
        }
        cell.set(v);
        if run_callback {
            if let Some(cb) = cb {
                cb(self);
            }
        }
    }

    pub(crate) fn set_str_var_by_id(&mut self, id: IdentId, v: &str, run_callback: bool) {
        let (cell, flags, name, cb) = {
            let ident = self.regs.ident(id);
            let IdentKind::Var(VarStorage::Str { cell }) = &ident.kind else {
                return;
            };
            (
                cell.clone(),
                ident.flags,
                ident.name.clone(),
                ident.on_change.clone(),
            )
        };
        if flags.contains(IdentFlags::READONLY) {
            log::debug!("ignoring write to read-only variable {name}");
            return;
        }
        let prev = Value::str(cell.borrow().as_str());
        self.note_override(id, prev);
        *cell.borrow_mut() = v.to_string();
        if run_callback {
            if let Some(cb) = cb {
                cb(self);
            }
        }
    }

    /// In override mode, the first write to a var saves the engine
    /// default so `reset_overrides` can restore it; overridden vars are
    /// skipped by the config writer.
    fn note_override(&mut self, id: IdentId, current: Value) {
        if !self.override_mode {
            return;
        }
        let ident = self.regs.ident_mut(id);
        if ident.override_default.is_none() {
            ident.override_default = Some(current);
        }
        ident.flags.insert(IdentFlags::OVERRIDDEN);
    }

    pub fn set_override_mode(&mut self, on: bool) {
        self.override_mode = on;
    }

    /// Restore every overridden var to its saved engine default.
    pub fn reset_overrides(&mut self) {
        let ids: Vec<IdentId> = self
            .regs
            .iter_ids()
            .filter(|&id| self.regs.ident(id).flags.contains(IdentFlags::OVERRIDDEN))
            .collect();
        for id in ids {
            let Some(default) = self.regs.ident_mut(id).override_default.take() else {
                continue;
            };
            self.regs.ident_mut(id).flags.remove(IdentFlags::OVERRIDDEN);
            match &self.regs.ident(id).kind {
                IdentKind::Var(VarStorage::Int { cell, .. }) => cell.set(default.get_int()),
                IdentKind::Var(VarStorage::Float { cell, .. }) => cell.set(default.get_float()),
                IdentKind::Var(VarStorage::Str { cell }) => {
                    *cell.borrow_mut() = default.get_str().to_string()
                }
                _ => {}
            }
        }
    }

    fn print_var(&mut self, id: IdentId) {
        let line = {
            let ident = self.regs.ident(id);
            match &ident.kind {
                IdentKind::Var(VarStorage::Int { cell, .. }) => {
                    if ident.flags.contains(IdentFlags::HEX) {
                        format!("{} = 0x{:X}", ident.name, cell.get())
                    } else {
                        format!("{} = {}", ident.name, cell.get())
                    }
                }
                IdentKind::Var(VarStorage::Float { cell, .. }) => {
                    format!("{} = {}", ident.name, float_to_text(cell.get()))
                }
                IdentKind::Var(VarStorage::Str { cell }) => {
                    format!("{} = \"{}\"", ident.name, cell.borrow())
                }
                _ => return,
            }
        };
        self.console_msg(line);
    }

    // -------------------------
    // Console output
    // -------------------------

    pub fn console_msg(&mut self, line: impl Into<String>) {
        let line = line.into();
        log::info!("{line}");
        self.push_output(line);
    }

    pub(crate) fn warn(&mut self, line: String) {
        log::warn!("{line}");
        self.push_output(line);
    }

    fn push_output(&mut self, line: String) {
        if self.output.len() >= OUTPUT_CAP {
            self.output.pop_front();
        }
        self.output.push_back(line);
    }

    /// Drain pending console lines (range warnings, echo output,
    /// unknown-command reports) for the host to display.
    pub fn take_output(&mut self) -> Vec<String> {
        self.output.drain(..).collect()
    }

    pub(crate) fn script_error(&mut self, e: &ScriptError) {
        log::error!("{e}");
        self.push_output(format!("script error: {e}"));
    }
}

fn take_next(popped: &mut [Value], i: &mut usize) -> Option<Value> {
    if *i < popped.len() {
        let v = mem::take(&mut popped[*i]);
        *i += 1;
        Some(v)
    } else {
        None
    }
}

/// Coerce a call result to the type the call site expects, once.
pub(crate) fn coerce(v: Value, tag: Tag) -> Value {
    match tag {
        Tag::Keep => v,
        Tag::Int => Value::Int(v.get_int()),
        Tag::Float => Value::Float(v.get_float()),
        Tag::Str => Value::Str(v.get_str()),
    }
}
