use std::collections::HashMap;

use crate::error::VmError;
use crate::hart::REGISTER_COUNT;
use crate::memory::Bus;

/// Environment-call handler: receives the hart id, the shared bus, and
/// mutable views of both register files.
pub type EcallHandler = Box<
    dyn Fn(u32, &Bus, &mut [u32; REGISTER_COUNT], &mut [u64; REGISTER_COUNT]) -> Result<(), VmError>
        + Send
        + Sync,
>;

/// Dispatch table for ECALL, keyed on the value in a0. Built by the embedder
/// and passed to each hart at construction, so tests can install their own.
pub struct EcallTable {
    handlers: HashMap<u32, EcallHandler>,
}

impl Default for EcallTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EcallTable {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, code: u32, handler: EcallHandler) {
        self.handlers.insert(code, handler);
    }

    /// Invoke the handler for `code`; an unregistered code is fatal.
    pub fn dispatch(
        &self,
        code: u32,
        hart: u32,
        bus: &Bus,
        regs: &mut [u32; REGISTER_COUNT],
        fregs: &mut [u64; REGISTER_COUNT],
    ) -> Result<(), VmError> {
        match self.handlers.get(&code) {
            Some(handler) => handler(hart, bus, regs, fregs),
            None => Err(VmError::UnknownEcall { hart, code }),
        }
    }
}
