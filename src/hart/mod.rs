pub mod csr;
pub mod decode;
pub mod execute;
pub mod fpu;
pub mod mmu;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::ecall::EcallTable;
use crate::error::VmError;
use crate::memory::Bus;
use csr::CsrFile;
use decode::{Instruction, Op};

pub const REGISTER_COUNT: usize = 32;
/// ABI index of a0, the ecall dispatch-code register.
pub const REG_A0: usize = 10;
/// Bound on the tick-rate history window.
pub const MAX_HISTORY: usize = 32;
/// Instructions per run-loop iteration.
const STEP_BATCH: u32 = 1000;

/// RISC-V privilege levels; governs CSR access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeLevel {
    User,
    Supervisor,
    Machine,
}

/// One emulated hardware thread: RV32IMAFD register state plus the stepping
/// and run machinery. The memory bus is shared; everything else is owned.
pub struct Hart {
    pub hart_id: u32,
    /// x0..x31; lane 0 always reads zero
    pub regs: [u32; REGISTER_COUNT],
    /// f0..f31, 64-bit lanes, singles NaN-boxed
    pub fregs: [u64; REGISTER_COUNT],
    pub pc: u32,
    pub csrs: CsrFile,
    pub privilege: PrivilegeLevel,
    pub bus: Arc<Bus>,
    ecall: Arc<EcallTable>,
    pub running: Arc<AtomicBool>,
    pub paused: Arc<AtomicBool>,
    pub pause_on_break: Arc<AtomicBool>,
    pub last_error: Arc<Mutex<Option<VmError>>>,
    break_points: HashSet<u32>,
    /// Instructions requested since the last external tick
    ticks: u32,
    history_delta: VecDeque<f64>,
    history_tick: VecDeque<u32>,
}

impl Hart {
    pub fn new(bus: Arc<Bus>, starting_pc: u32, hart_id: u32, ecall: Arc<EcallTable>) -> Self {
        let csrs = CsrFile::new(hart_id, Arc::clone(bus.timer()));
        bus.timer().seed_from_wall_clock();

        let mut hart = Self {
            hart_id,
            regs: [0; REGISTER_COUNT],
            fregs: [0; REGISTER_COUNT],
            pc: starting_pc,
            csrs,
            privilege: PrivilegeLevel::Machine,
            bus,
            ecall,
            running: Arc::new(AtomicBool::new(true)),
            paused: Arc::new(AtomicBool::new(true)),
            pause_on_break: Arc::new(AtomicBool::new(true)),
            last_error: Arc::new(Mutex::new(None)),
            break_points: HashSet::new(),
            ticks: 0,
            history_delta: VecDeque::new(),
            history_tick: VecDeque::new(),
        };
        hart.setup();
        hart
    }

    /// Re-initialize all non-identity state. Safe to call on a live hart.
    pub fn setup(&mut self) {
        self.regs = [0; REGISTER_COUNT];
        self.fregs = [0; REGISTER_COUNT];
        self.csrs.reset();
        self.privilege = PrivilegeLevel::Machine;
    }

    /// Execute up to `steps` instructions while the running flag holds.
    /// Returns true when execution stopped at a breakpoint.
    pub fn step(&mut self, steps: u32) -> Result<bool, VmError> {
        self.ticks = self.ticks.wrapping_add(steps);

        for _ in 0..steps {
            if !self.running.load(Ordering::Relaxed) {
                break;
            }

            self.csrs.cycles += 1;

            if self.pc % 4 != 0 {
                return Err(VmError::MisalignedPc(self.pc));
            }

            let access = mmu::check_access(self.pc);
            if !access.present {
                return Err(VmError::PcNotPresent(self.pc));
            }

            let word = self.bus.read_word(access.translated)?;
            let inst = Instruction::decode(word);

            execute::execute(self, &inst)?;

            if !inst.op.writes_pc() {
                self.pc = self.pc.wrapping_add(4);
            }

            if inst.rd == 0 {
                self.regs[0] = 0;
            }

            if self.is_breakpoint(self.pc) {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Cooperative run loop: yields while paused, steps in batches while
    /// running, pauses on breakpoints, and records a fatal error before
    /// clearing the running flag.
    pub fn run(&mut self) {
        while self.running.load(Ordering::Relaxed) {
            if self.paused.load(Ordering::Relaxed) {
                std::thread::yield_now();
                continue;
            }

            match self.step(STEP_BATCH) {
                Ok(hit_break) => {
                    if hit_break && self.pause_on_break.load(Ordering::Relaxed) {
                        self.paused.store(true, Ordering::Relaxed);
                    }
                }
                Err(err) => {
                    log::error!("hart {} halted: {err}", self.hart_id);
                    *self
                        .last_error
                        .lock()
                        .unwrap_or_else(|e| e.into_inner()) = Some(err);
                    self.running.store(false, Ordering::Relaxed);
                }
            }
        }
    }

    /// An address breaks execution if it is in the explicit set or its word
    /// decodes to EBREAK.
    pub fn is_breakpoint(&self, addr: u32) -> bool {
        if self.break_points.contains(&addr) {
            return true;
        }
        match self.bus.peek_word(addr) {
            Some(word) => Instruction::decode(word).op == Op::Ebreak,
            None => false,
        }
    }

    pub fn add_breakpoint(&mut self, addr: u32) {
        self.break_points.insert(addr);
    }

    pub fn remove_breakpoint(&mut self, addr: u32) {
        self.break_points.remove(&addr);
    }

    /// Atomic copy of the architectural register state for the inspectors.
    pub fn snapshot(&self) -> ([u32; REGISTER_COUNT], [u64; REGISTER_COUNT], u32) {
        (self.regs, self.fregs, self.pc)
    }

    /// CSR map copy with synthesized counter entries.
    pub fn csr_snapshot(&self) -> HashMap<u16, u32> {
        self.csrs.snapshot()
    }

    /// External wall-clock tick: records a tick-rate sample, advances the
    /// shared time counter, and enforces the time < timecmp invariant.
    pub fn tick(&mut self, delta_seconds: f64) -> Result<(), VmError> {
        self.history_delta.push_back(delta_seconds);
        self.history_tick.push_back(self.ticks);
        self.ticks = 0;

        while self.history_delta.len() > MAX_HISTORY {
            self.history_delta.pop_front();
            self.history_tick.pop_front();
        }

        let timer = self.bus.timer();
        let time = timer.advance(delta_seconds);
        let timecmp = timer.timecmp();
        if time >= timecmp {
            return Err(VmError::TimerOverrun { time, timecmp });
        }

        Ok(())
    }

    /// Average execution rate over the recorded tick history.
    pub fn instructions_per_second(&self) -> f64 {
        let total_time: f64 = self.history_delta.iter().sum();
        let total_ticks: u32 = self.history_tick.iter().sum();
        if total_time == 0.0 {
            return 0.0;
        }
        total_ticks as f64 / total_time
    }
}
