//! Node - one virtual machine in the simulated network.
//!
//! A node owns its memory and its inbound queue, borrows a shared program
//! and symbol table, and runs one program tick per network tick.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──begin_simulation──► Ready ──step()*──► Terminated
//!                                       ▲                    │
//!                                       └──begin_simulation──┘
//! ```

use crate::memory::NodeMemory;
use crate::pool::{MessageHandle, MessagePool};
use crate::symbols::SymbolTable;

use gpnet_env::{ExecutionSignal, MemoryView, Program, ProgramFault, SymbolId, Value};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeState {
    Uninitialized,
    Ready,
    Terminated,
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The program signalled an invalid operation
    Fault(ProgramFault),

    /// No message buffer was available for a send
    PoolExhausted,
}

/// Classification of one node's tick.
///
/// Ordered by dominance: `Error` beats `Changed` beats `Unchanged`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Unchanged,
    Changed,
    Error(StepError),
}

impl StepOutcome {
    /// Combines two outcomes, keeping the dominant one.
    pub fn combine(self, other: StepOutcome) -> StepOutcome {
        match (self, other) {
            (StepOutcome::Error(e), _) | (_, StepOutcome::Error(e)) => StepOutcome::Error(e),
            (StepOutcome::Changed, _) | (_, StepOutcome::Changed) => StepOutcome::Changed,
            _ => StepOutcome::Unchanged,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StepOutcome::Error(_))
    }
}

/// Program-facing view of a node during one tick.
struct NodeView<'a> {
    memory: &'a mut NodeMemory,
    table: &'a SymbolTable,
    send_requested: bool,
    node_index: usize,
    node_count: usize,
}

impl MemoryView for NodeView<'_> {
    fn read(&self, symbol: SymbolId) -> Value {
        self.memory.read(symbol)
    }

    fn write_next(&mut self, symbol: SymbolId, value: Value) -> Result<(), ProgramFault> {
        self.memory.write_next(self.table, symbol, value)
    }

    fn read_next(&self, symbol: SymbolId) -> Value {
        self.memory.read_next(symbol)
    }

    fn request_send(&mut self) {
        self.send_requested = true;
    }

    fn node_index(&self) -> usize {
        self.node_index
    }

    fn node_count(&self) -> usize {
        self.node_count
    }
}

/// A simulated node.
pub struct Node {
    /// Position in the network (also the stepping order)
    index: usize,

    /// Total nodes in the network
    node_count: usize,

    /// Shared symbol layout
    table: Arc<SymbolTable>,

    /// Double-buffered state
    memory: NodeMemory,

    /// Compiled program (possibly shared with other nodes)
    program: Arc<dyn Program>,

    /// Delivered but not yet consumed messages, oldest first
    pending: VecDeque<MessageHandle>,

    /// Message produced by the last step, awaiting scheduling
    outbox: Option<MessageHandle>,

    /// Lifecycle state
    state: NodeState,

    /// Ticks classified `Unchanged`
    idle_step_count: u64,

    messages_sent: u64,
    messages_received: u64,

    /// Queued messages discarded when the node halted
    messages_dropped: u64,

    /// Outcome of the most recent step
    last_outcome: Option<StepOutcome>,
}

impl Node {
    /// Creates a node in the `Uninitialized` state.
    pub fn new(
        index: usize,
        node_count: usize,
        table: Arc<SymbolTable>,
        program: Arc<dyn Program>,
    ) -> Self {
        let memory = NodeMemory::new(&table);
        Self {
            index,
            node_count,
            table,
            memory,
            program,
            pending: VecDeque::new(),
            outbox: None,
            state: NodeState::Uninitialized,
            idle_step_count: 0,
            messages_sent: 0,
            messages_received: 0,
            messages_dropped: 0,
            last_outcome: None,
        }
    }

    /// Resets the node for a fresh run.
    ///
    /// Leftover queued or unsent messages go back to the pool.
    pub fn begin_simulation(&mut self, pool: &mut MessagePool) {
        self.discard_messages(pool);
        self.memory
            .begin_simulation(&self.table, self.index, self.node_count);
        self.idle_step_count = 0;
        self.messages_sent = 0;
        self.messages_received = 0;
        self.messages_dropped = 0;
        self.last_outcome = None;
        self.state = NodeState::Ready;
    }

    /// Drops any queued or unsent messages without touching memory.
    pub(crate) fn discard_messages(&mut self, pool: &mut MessagePool) {
        for handle in self.pending.drain(..) {
            pool.release(handle);
        }
        if let Some(handle) = self.outbox.take() {
            pool.release(handle);
        }
    }

    /// Runs one tick.
    ///
    /// 1. Consume at most one queued message into the receive range
    /// 2. Roll the memory buffers
    /// 3. Execute the program against `current`
    /// 4. Honor a send request by filling a pool buffer from the send range
    ///
    /// A terminated node does nothing and counts the tick as idle.
    ///
    /// # Panics
    /// If called before `begin_simulation`.
    pub fn step(&mut self, pool: &mut MessagePool) -> StepOutcome {
        assert!(
            self.state != NodeState::Uninitialized,
            "node {} stepped before begin_simulation",
            self.index
        );

        if self.state == NodeState::Terminated {
            self.idle_step_count += 1;
            self.last_outcome = Some(StepOutcome::Unchanged);
            return StepOutcome::Unchanged;
        }

        let mut outcome = StepOutcome::Unchanged;

        if let Some(handle) = self.pending.pop_front() {
            self.memory.deliver(&self.table, pool.payload(&handle));
            pool.release(handle);
            self.messages_received += 1;
            outcome = StepOutcome::Changed;
        }

        self.memory.roll(&self.table);

        let mut view = NodeView {
            memory: &mut self.memory,
            table: &self.table,
            send_requested: false,
            node_index: self.index,
            node_count: self.node_count,
        };
        let signal = self.program.execute(&mut view);
        let mut send = view.send_requested;

        let mut halt = false;
        match signal {
            ExecutionSignal::Continue => {}
            ExecutionSignal::Send => send = true,
            ExecutionSignal::Halt => halt = true,
            ExecutionSignal::Fault(fault) => {
                let outcome = StepOutcome::Error(StepError::Fault(fault));
                self.last_outcome = Some(outcome.clone());
                return outcome;
            }
        }

        if self.memory.has_pending_change(&self.table) {
            outcome = outcome.combine(StepOutcome::Changed);
        }

        if send {
            let Some(handle) = pool.allocate() else {
                let outcome = StepOutcome::Error(StepError::PoolExhausted);
                self.last_outcome = Some(outcome.clone());
                return outcome;
            };
            let message = pool.message_mut(&handle);
            message
                .payload
                .copy_from_slice(self.memory.send_payload(&self.table));
            message.source = self.index;
            self.outbox = Some(handle);
            self.messages_sent += 1;
            outcome = outcome.combine(StepOutcome::Changed);
        }

        if halt {
            self.state = NodeState::Terminated;
            // Nothing will consume these; free their buffers for other senders
            for handle in self.pending.drain(..) {
                pool.release(handle);
                self.messages_dropped += 1;
            }
        }

        if outcome == StepOutcome::Unchanged {
            self.idle_step_count += 1;
        }

        self.last_outcome = Some(outcome.clone());
        outcome
    }

    /// Appends a delivered message to the inbound queue.
    pub fn enqueue(&mut self, handle: MessageHandle) {
        self.pending.push_back(handle);
    }

    /// Takes the message produced by the last step, if any.
    pub fn take_outbox(&mut self) -> Option<MessageHandle> {
        self.outbox.take()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == NodeState::Terminated
    }

    pub fn idle_step_count(&self) -> u64 {
        self.idle_step_count
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped
    }

    /// Messages queued and not yet consumed.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn last_outcome(&self) -> Option<&StepOutcome> {
        self.last_outcome.as_ref()
    }

    /// Node memory (read-only).
    pub fn memory(&self) -> &NodeMemory {
        &self.memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(program: Arc<dyn Program>) -> (Arc<SymbolTable>, Node, MessagePool) {
        let table = Arc::new(SymbolTable::create(1, true, 1));
        let mut pool = MessagePool::new(4, table.payload_size());
        let mut node = Node::new(2, 3, table.clone(), program);
        node.begin_simulation(&mut pool);
        (table, node, pool)
    }

    #[test]
    fn test_outcome_dominance() {
        let err = StepOutcome::Error(StepError::PoolExhausted);

        assert_eq!(StepOutcome::Unchanged.combine(StepOutcome::Unchanged), StepOutcome::Unchanged);
        assert_eq!(StepOutcome::Unchanged.combine(StepOutcome::Changed), StepOutcome::Changed);
        assert_eq!(StepOutcome::Changed.combine(err.clone()), err);
        assert_eq!(err.clone().combine(StepOutcome::Changed), err);
    }

    #[test]
    fn test_silent_program_is_idle() {
        let program: Arc<dyn Program> = Arc::new(|_: &mut dyn MemoryView| ExecutionSignal::Continue);
        let (_, mut node, mut pool) = setup(program);

        for _ in 0..5 {
            assert_eq!(node.step(&mut pool), StepOutcome::Unchanged);
        }
        assert_eq!(node.idle_step_count(), 5);
        assert!(node.take_outbox().is_none());
    }

    #[test]
    fn test_send_fills_payload_from_next() {
        let table = Arc::new(SymbolTable::create(1, true, 1));
        let send = table.get_send_symbol(0);
        let id = table.node_id_symbol();
        let program: Arc<dyn Program> = Arc::new(move |view: &mut dyn MemoryView| {
            let v = view.read(id);
            match view.write_next(send, v * 10) {
                Ok(()) => ExecutionSignal::Send,
                Err(f) => ExecutionSignal::Fault(f),
            }
        });
        let mut pool = MessagePool::new(4, 1);
        let mut node = Node::new(2, 3, table, program);
        node.begin_simulation(&mut pool);

        assert_eq!(node.step(&mut pool), StepOutcome::Changed);
        let handle = node.take_outbox().unwrap();
        assert_eq!(pool.payload(&handle), &[20]);
        assert_eq!(pool.message(&handle).source, 2);
        assert_eq!(node.messages_sent(), 1);
        assert_eq!(node.idle_step_count(), 0);
    }

    #[test]
    fn test_received_message_visible_for_one_tick() {
        let table = Arc::new(SymbolTable::create(1, true, 1));
        let recv = table.get_receive_symbol(0);
        let flag = table.incoming_symbol();
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let log = seen.clone();
        let program: Arc<dyn Program> = Arc::new(move |view: &mut dyn MemoryView| {
            log.lock().unwrap().push((view.read(flag), view.read(recv)));
            ExecutionSignal::Continue
        });
        let mut pool = MessagePool::new(4, 1);
        let mut node = Node::new(0, 1, table, program);
        node.begin_simulation(&mut pool);

        let handle = pool.allocate().unwrap();
        pool.message_mut(&handle).payload[0] = 77;
        node.enqueue(handle);

        assert_eq!(node.step(&mut pool), StepOutcome::Changed);
        assert_eq!(node.step(&mut pool), StepOutcome::Unchanged);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 77), (0, 0)]);
    }

    #[test]
    fn test_one_message_consumed_per_tick() {
        let program: Arc<dyn Program> = Arc::new(|_: &mut dyn MemoryView| ExecutionSignal::Continue);
        let (_, mut node, mut pool) = setup(program);

        node.enqueue(pool.allocate().unwrap());
        node.enqueue(pool.allocate().unwrap());

        node.step(&mut pool);
        assert_eq!(node.pending_count(), 1);
        node.step(&mut pool);
        assert_eq!(node.pending_count(), 0);
        assert_eq!(node.messages_received(), 2);
    }

    #[test]
    fn test_fault_is_error() {
        let program: Arc<dyn Program> = Arc::new(|view: &mut dyn MemoryView| {
            match view.write_next(SymbolId(0), 1) {
                Ok(()) => ExecutionSignal::Continue,
                Err(f) => ExecutionSignal::Fault(f),
            }
        });
        let (_, mut node, mut pool) = setup(program);

        assert_eq!(
            node.step(&mut pool),
            StepOutcome::Error(StepError::Fault(ProgramFault::WriteProtected(SymbolId(0))))
        );
    }

    #[test]
    fn test_pool_exhaustion_is_error() {
        let program: Arc<dyn Program> = Arc::new(|_: &mut dyn MemoryView| ExecutionSignal::Send);
        let table = Arc::new(SymbolTable::create(0, false, 1));
        let mut pool = MessagePool::new(1, 1);
        let mut node = Node::new(0, 2, table, program);
        node.begin_simulation(&mut pool);

        let _held = pool.allocate().unwrap();
        assert_eq!(
            node.step(&mut pool),
            StepOutcome::Error(StepError::PoolExhausted)
        );
    }

    #[test]
    fn test_halt_terminates_after_send() {
        let program: Arc<dyn Program> = Arc::new(|view: &mut dyn MemoryView| {
            view.request_send();
            ExecutionSignal::Halt
        });
        let (_, mut node, mut pool) = setup(program);

        assert_eq!(node.step(&mut pool), StepOutcome::Changed);
        assert!(node.is_terminated());
        assert!(node.take_outbox().is_some());

        assert_eq!(node.step(&mut pool), StepOutcome::Unchanged);
        assert_eq!(node.idle_step_count(), 1);
    }

    #[test]
    fn test_begin_simulation_discards_leftovers() {
        let program: Arc<dyn Program> = Arc::new(|_: &mut dyn MemoryView| ExecutionSignal::Send);
        let (_, mut node, mut pool) = setup(program);

        node.step(&mut pool);
        node.enqueue(pool.allocate().unwrap());
        assert_eq!(pool.in_use(), 2);

        node.begin_simulation(&mut pool);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(node.pending_count(), 0);
        assert_eq!(node.state(), NodeState::Ready);
    }

    #[test]
    #[should_panic(expected = "stepped before begin_simulation")]
    fn test_step_requires_begin() {
        let table = Arc::new(SymbolTable::create(0, false, 1));
        let program: Arc<dyn Program> = Arc::new(|_: &mut dyn MemoryView| ExecutionSignal::Continue);
        let mut pool = MessagePool::new(1, 1);
        let mut node = Node::new(0, 1, table, program);
        node.step(&mut pool);
    }
}
