//! Owned mini-IR the obfuscation scheduler drives.
//!
//! This module provides a small IR for writing obfuscation passes and tests
//! without depending on a full host compiler. The format is designed to be:
//! - Human-readable and writable
//! - Easy to parse
//! - Sufficient for exercising structural transforms
//!
//! # Format
//!
//! ```text
//! ; Comments start with semicolon
//! @msg = "hello"
//! extern puts
//! func_name(%arg1, %arg2) {
//! entry:
//!     %val = add %arg1, %arg2
//!     br ^next_block
//! next_block:
//!     ret %val
//! }
//! ```
//!
//! A function with no blocks is a declaration; definitions have at least one
//! block and the first block is the entry block.

use std::fmt;

pub mod parser;

use crate::core::ParseResult;

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub name: String,
    pub functions: Vec<Function>,
    pub globals: Vec<Global>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub insts: Vec<Inst>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inst {
    pub result: Option<String>,
    pub op: Opcode,
    pub operands: Vec<Operand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Add,
    Sub,
    Mul,
    Xor,
    And,
    Or,
    Load,
    Store,
    Call,
    Br,
    CondBr,
    Switch,
    IndirectBr,
    Ret,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Local value reference (`%name`).
    Value(String),
    /// Integer immediate.
    Imm(i64),
    /// Global reference (`@name`).
    Global(String),
    /// Function reference (bare name; call targets).
    Func(String),
    /// Block reference (`^name`; branch targets).
    Block(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    pub name: String,
    pub init: GlobalInit,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GlobalInit {
    Str(String),
    Bytes(Vec<u8>),
    Zero,
}

impl Opcode {
    pub const fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Xor => "xor",
            And => "and",
            Or => "or",
            Load => "load",
            Store => "store",
            Call => "call",
            Br => "br",
            CondBr => "condbr",
            Switch => "switch",
            IndirectBr => "indirectbr",
            Ret => "ret",
        }
    }

    pub const fn is_terminator(self) -> bool {
        matches!(
            self,
            Opcode::Br | Opcode::CondBr | Opcode::Switch | Opcode::IndirectBr | Opcode::Ret
        )
    }

    pub fn from_str(s: &str) -> Option<Self> {
        use Opcode::*;
        match s {
            "add" => Some(Add),
            "sub" => Some(Sub),
            "mul" => Some(Mul),
            "xor" => Some(Xor),
            "and" => Some(And),
            "or" => Some(Or),
            "load" => Some(Load),
            "store" => Some(Store),
            "call" => Some(Call),
            "br" => Some(Br),
            "condbr" => Some(CondBr),
            "switch" => Some(Switch),
            "indirectbr" => Some(IndirectBr),
            "ret" => Some(Ret),
            _ => None,
        }
    }
}

impl Inst {
    pub fn new(result: Option<String>, op: Opcode, operands: Vec<Operand>) -> Self {
        Self { result, op, operands }
    }

    /// Unconditional branch to the named block.
    pub fn br(target: &str) -> Self {
        Self::new(None, Opcode::Br, vec![Operand::Block(target.to_string())])
    }

    pub fn ret() -> Self {
        Self::new(None, Opcode::Ret, Vec::new())
    }

    /// Does any operand reference the named function?
    pub fn references_func(&self, name: &str) -> bool {
        self.operands
            .iter()
            .any(|op| matches!(op, Operand::Func(n) if n == name))
    }

    /// Is this a call whose callee is the named function?
    pub fn calls(&self, name: &str) -> bool {
        self.op == Opcode::Call
            && matches!(self.operands.first(), Some(Operand::Func(n)) if n == name)
    }
}

impl Block {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), insts: Vec::new() }
    }

    pub fn terminator(&self) -> Option<&Inst> {
        self.insts.last().filter(|inst| inst.op.is_terminator())
    }

    /// Number of instructions ahead of the terminator.
    pub fn body_len(&self) -> usize {
        if self.terminator().is_some() {
            self.insts.len() - 1
        } else {
            self.insts.len()
        }
    }
}

impl Function {
    pub fn declaration(name: &str) -> Self {
        Self { name: name.to_string(), params: Vec::new(), blocks: Vec::new() }
    }

    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn entry_block(&self) -> Option<&Block> {
        self.blocks.first()
    }

    pub fn entry_block_mut(&mut self) -> Option<&mut Block> {
        self.blocks.first_mut()
    }
}

impl Module {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), functions: Vec::new(), globals: Vec::new() }
    }

    pub fn parse(text: &str) -> ParseResult<Self> {
        parser::parse(text)
    }

    pub fn find_function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn find_function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// Adds a declaration for `name` unless a function by that name already
    /// exists. Returns whether anything was added.
    pub fn declare(&mut self, name: &str) -> bool {
        if self.find_function(name).is_some() {
            return false;
        }
        self.functions.push(Function::declaration(name));
        true
    }

    pub fn global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Adds a global unless one by that name already exists. Returns whether
    /// anything was added.
    pub fn add_global(&mut self, global: Global) -> bool {
        if self.global(&global.name).is_some() {
            return false;
        }
        self.globals.push(global);
        true
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_declaration())
    }

    pub fn definitions_mut(&mut self) -> impl Iterator<Item = &mut Function> {
        self.functions.iter_mut().filter(|f| !f.is_declaration())
    }

    /// Deterministic textual dump; the output parses back with
    /// [`Module::parse`].
    pub fn print(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("; module {}\n", self.name));

        for global in &self.globals {
            match &global.init {
                GlobalInit::Str(s) => {
                    output.push_str(&format!("@{} = \"{}\"\n", global.name, s));
                }
                GlobalInit::Bytes(bytes) => {
                    let list: Vec<String> = bytes.iter().map(|b| b.to_string()).collect();
                    output.push_str(&format!("@{} = bytes [{}]\n", global.name, list.join(", ")));
                }
                GlobalInit::Zero => {
                    output.push_str(&format!("@{} = zero\n", global.name));
                }
            }
        }

        for func in &self.functions {
            if func.is_declaration() {
                output.push_str(&format!("extern {}\n", func.name));
                continue;
            }
            let params: Vec<String> = func.params.iter().map(|p| format!("%{p}")).collect();
            output.push_str(&format!("\n{}({}) {{\n", func.name, params.join(", ")));
            for block in &func.blocks {
                output.push_str(&format!("{}:\n", block.name));
                for inst in &block.insts {
                    output.push_str(&format!("  {inst}\n"));
                }
            }
            output.push_str("}\n");
        }

        output
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Value(name) => write!(f, "%{name}"),
            Operand::Imm(value) => write!(f, "{value}"),
            Operand::Global(name) => write!(f, "@{name}"),
            Operand::Func(name) => write!(f, "{name}"),
            Operand::Block(name) => write!(f, "^{name}"),
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = &self.result {
            write!(f, "%{result} = ")?;
        }
        write!(f, "{}", self.op.name())?;
        for (idx, operand) in self.operands.iter().enumerate() {
            if idx == 0 {
                write!(f, " {operand}")?;
            } else {
                write!(f, ", {operand}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.print())
    }
}
