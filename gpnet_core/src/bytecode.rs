//! Bytecode - stack-machine target for evolved node programs.
//!
//! Instructions are a plain tagged enum run by one interpreter loop. The
//! machine has an operand stack of fixed depth held on the native stack, so
//! executing a program allocates nothing.
//!
//! All arithmetic wraps. Anything else that can go wrong in an untrusted
//! program becomes a [`ProgramFault`]:
//!
//! | Condition                          | Fault              |
//! |------------------------------------|--------------------|
//! | pop from an empty stack            | `StackUnderflow`   |
//! | push beyond `STACK_DEPTH`          | `StackOverflow`    |
//! | `Div`/`Mod` by zero                | `DivisionByZero`   |
//! | jump past the end of the program   | `InvalidJump`      |
//! | store to a protected/unknown cell  | `WriteProtected`/`UnknownSymbol` |
//! | more than `budget` instructions    | `BudgetExhausted`  |

use gpnet_env::{ExecutionSignal, MemoryView, Program, ProgramFault, SymbolId, Value};
use serde::{Deserialize, Serialize};

/// Operand stack depth.
pub const STACK_DEPTH: usize = 64;

/// Instructions executed per tick before the program is declared runaway.
pub const DEFAULT_BUDGET: usize = 1024;

/// One machine instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instr {
    /// Push a literal
    Push(Value),
    /// Push `current[symbol]`
    Load(SymbolId),
    /// Push `next[symbol]` as staged so far
    LoadNext(SymbolId),
    /// Pop into `next[symbol]`
    Store(SymbolId),
    /// Push this node's index
    NodeIndex,
    Dup,
    Pop,
    Swap,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Max,
    Min,
    /// Push 1 if the top two are equal, else 0
    Eq,
    /// Push 1 if second < top, else 0
    Lt,
    /// Logical not: 0 becomes 1, anything else 0
    Not,
    /// Unconditional jump
    Jump(usize),
    /// Pop; jump if zero
    JumpIfZero(usize),
    /// Request a send at the end of the tick
    Send,
    /// Stop executing and terminate the node
    Halt,
}

/// Fixed-depth operand stack.
struct Stack {
    cells: [Value; STACK_DEPTH],
    len: usize,
}

impl Stack {
    fn new() -> Self {
        Self {
            cells: [0; STACK_DEPTH],
            len: 0,
        }
    }

    fn push(&mut self, v: Value) -> Result<(), ProgramFault> {
        if self.len == STACK_DEPTH {
            return Err(ProgramFault::StackOverflow);
        }
        self.cells[self.len] = v;
        self.len += 1;
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, ProgramFault> {
        if self.len == 0 {
            return Err(ProgramFault::StackUnderflow);
        }
        self.len -= 1;
        Ok(self.cells[self.len])
    }

    fn peek(&self) -> Result<Value, ProgramFault> {
        if self.len == 0 {
            return Err(ProgramFault::StackUnderflow);
        }
        Ok(self.cells[self.len - 1])
    }

    /// Pops `(second, top)`.
    fn pop2(&mut self) -> Result<(Value, Value), ProgramFault> {
        let b = self.pop()?;
        let a = self.pop()?;
        Ok((a, b))
    }
}

/// A compiled bytecode program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bytecode {
    code: Vec<Instr>,
    budget: usize,
}

impl Bytecode {
    /// Wraps an instruction sequence with the default budget.
    pub fn new(code: Vec<Instr>) -> Self {
        Self {
            code,
            budget: DEFAULT_BUDGET,
        }
    }

    /// Sets the per-tick instruction budget.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    pub fn instructions(&self) -> &[Instr] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    fn jump(&self, target: usize) -> Result<usize, ProgramFault> {
        if target > self.code.len() {
            return Err(ProgramFault::InvalidJump(target));
        }
        Ok(target)
    }

    fn interpret(&self, view: &mut dyn MemoryView) -> Result<ExecutionSignal, ProgramFault> {
        let mut stack = Stack::new();
        let mut pc = 0;
        let mut executed = 0;
        let mut sent = false;

        while pc < self.code.len() {
            if executed == self.budget {
                return Err(ProgramFault::BudgetExhausted(self.budget));
            }
            executed += 1;

            let mut next_pc = pc + 1;
            match self.code[pc] {
                Instr::Push(v) => stack.push(v)?,
                Instr::Load(s) => stack.push(view.read(s))?,
                Instr::LoadNext(s) => stack.push(view.read_next(s))?,
                Instr::Store(s) => {
                    let v = stack.pop()?;
                    view.write_next(s, v)?;
                }
                Instr::NodeIndex => stack.push(view.node_index() as Value)?,
                Instr::Dup => {
                    let v = stack.peek()?;
                    stack.push(v)?;
                }
                Instr::Pop => {
                    stack.pop()?;
                }
                Instr::Swap => {
                    let (a, b) = stack.pop2()?;
                    stack.push(b)?;
                    stack.push(a)?;
                }
                Instr::Add => {
                    let (a, b) = stack.pop2()?;
                    stack.push(a.wrapping_add(b))?;
                }
                Instr::Sub => {
                    let (a, b) = stack.pop2()?;
                    stack.push(a.wrapping_sub(b))?;
                }
                Instr::Mul => {
                    let (a, b) = stack.pop2()?;
                    stack.push(a.wrapping_mul(b))?;
                }
                Instr::Div => {
                    let (a, b) = stack.pop2()?;
                    if b == 0 {
                        return Err(ProgramFault::DivisionByZero);
                    }
                    stack.push(a.wrapping_div(b))?;
                }
                Instr::Mod => {
                    let (a, b) = stack.pop2()?;
                    if b == 0 {
                        return Err(ProgramFault::DivisionByZero);
                    }
                    stack.push(a.wrapping_rem(b))?;
                }
                Instr::Max => {
                    let (a, b) = stack.pop2()?;
                    stack.push(a.max(b))?;
                }
                Instr::Min => {
                    let (a, b) = stack.pop2()?;
                    stack.push(a.min(b))?;
                }
                Instr::Eq => {
                    let (a, b) = stack.pop2()?;
                    stack.push((a == b) as Value)?;
                }
                Instr::Lt => {
                    let (a, b) = stack.pop2()?;
                    stack.push((a < b) as Value)?;
                }
                Instr::Not => {
                    let v = stack.pop()?;
                    stack.push((v == 0) as Value)?;
                }
                Instr::Jump(target) => next_pc = self.jump(target)?,
                Instr::JumpIfZero(target) => {
                    if stack.pop()? == 0 {
                        next_pc = self.jump(target)?;
                    }
                }
                Instr::Send => {
                    view.request_send();
                    sent = true;
                }
                Instr::Halt => return Ok(ExecutionSignal::Halt),
            }
            pc = next_pc;
        }

        if sent {
            Ok(ExecutionSignal::Send)
        } else {
            Ok(ExecutionSignal::Continue)
        }
    }
}

impl Program for Bytecode {
    fn execute(&self, view: &mut dyn MemoryView) -> ExecutionSignal {
        match self.interpret(view) {
            Ok(signal) => signal,
            Err(fault) => ExecutionSignal::Fault(fault),
        }
    }
}
