use thiserror::Error;

/// Fatal conditions surfaced by the execution core. Every one of these ends
/// the current step; the driving loop records it and halts the hart.
/// Floating-point exceptions are not errors — they set fcsr flag bits.
#[derive(Debug, Error)]
pub enum VmError {
    #[error("invalid instruction at {pc:#010x}: {word:#010x}")]
    InvalidInstruction { pc: u32, word: u32 },

    #[error("misaligned pc {0:#010x}")]
    MisalignedPc(u32),

    #[error("pc address is not present {0:#010x}")]
    PcNotPresent(u32),

    #[error("access to invalid CSR {0:#05x}")]
    InvalidCsr(u16),

    #[error("CSR privilege violation on {0:#05x}")]
    CsrPrivilege(u16),

    #[error("access to unmapped address {0:#010x}")]
    Unmapped(u32),

    #[error("misaligned {width}-byte access at {addr:#010x}")]
    Misaligned { addr: u32, width: u32 },

    #[error("address translation failed, page fault at {0:#010x}")]
    PageFault(u32),

    #[error("address translation failed, access fault at {0:#010x}")]
    AccessFault(u32),

    #[error("instruction not implemented: {0}")]
    NotImplemented(&'static str),

    #[error("hart {hart} called unknown ecall handler {code}")]
    UnknownEcall { hart: u32, code: u32 },

    #[error("timer overrun: time {time} >= timecmp {timecmp}")]
    TimerOverrun { time: u64, timecmp: u64 },
}
