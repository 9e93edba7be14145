//! Reference node programs.
//!
//! Hand-assembled bytecode standing in for evolved candidates. Every builder
//! takes the symbol table the program will run against, so operands are
//! resolved through the table rather than hard-coded cell indices.

use gpnet_core::{Bytecode, Instr, SymbolTable};

/// The table the scenarios run against: constants, one send/receive pair,
/// two variables.
pub fn standard_table() -> SymbolTable {
    SymbolTable::from_config(&Default::default())
}

/// Max-id leader election that gossips every tick.
///
/// ```text
/// id = incoming ? max(id, recv0) : id
/// send0 = id; send
/// ```
pub fn leader_election(table: &SymbolTable) -> Bytecode {
    let id = table.node_id_symbol();
    Bytecode::new(vec![
        Instr::Load(id),
        Instr::Load(table.incoming_symbol()),
        Instr::JumpIfZero(5),
        Instr::Load(table.get_receive_symbol(0)),
        Instr::Max,
        Instr::Dup,
        Instr::Store(id),
        Instr::Store(table.get_send_symbol(0)),
        Instr::Send,
    ])
}

/// Max-id leader election that only speaks on its first tick and whenever
/// its id changes. Uses variable 0 as the "started" flag.
///
/// Suited to broadcast routing, where gossiping every tick would queue
/// `n - 1` messages per node per tick.
pub fn leader_election_on_change(table: &SymbolTable) -> Bytecode {
    let id = table.node_id_symbol();
    let started = table.get_variable(0);
    Bytecode::new(vec![
        // new = incoming ? max(id, recv0) : id
        Instr::Load(id),
        Instr::Load(table.incoming_symbol()),
        Instr::JumpIfZero(5),
        Instr::Load(table.get_receive_symbol(0)),
        Instr::Max,
        Instr::Dup,
        Instr::Store(id),
        // quiet = (new == id) && started
        Instr::Dup,
        Instr::Load(id),
        Instr::Eq,
        Instr::Load(started),
        Instr::Mul,
        Instr::JumpIfZero(15),
        Instr::Pop,
        Instr::Jump(19),
        // announce
        Instr::Store(table.get_send_symbol(0)),
        Instr::Push(1),
        Instr::Store(started),
        Instr::Send,
    ])
}

/// Never reads, writes or sends.
pub fn silent() -> Bytecode {
    Bytecode::new(Vec::new())
}

/// Sends its node index every tick.
pub fn flood(table: &SymbolTable) -> Bytecode {
    Bytecode::new(vec![
        Instr::NodeIndex,
        Instr::Store(table.get_send_symbol(0)),
        Instr::Send,
    ])
}

/// Counts ticks in variable 0 and divides by zero on tick `tick`.
pub fn fault_at(table: &SymbolTable, tick: u64) -> Bytecode {
    let counter = table.get_variable(0);
    Bytecode::new(vec![
        Instr::Load(counter),
        Instr::Push(1),
        Instr::Add,
        Instr::Store(counter),
        Instr::Push(tick as i64),
        Instr::Load(counter),
        Instr::Sub,
        Instr::JumpIfZero(9),
        Instr::Jump(12),
        Instr::Push(1),
        Instr::Push(0),
        Instr::Div,
    ])
}
