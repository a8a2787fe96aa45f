//! Sv32 address translation: two-level page walk with 4 MiB superpages,
//! driven by the translate-virtual-address custom instruction. PTE reads go
//! through the non-faulting peek so a missing page table is an access fault
//! rather than a bus error.

use crate::error::VmError;
use crate::memory::Bus;

pub const PAGE_SIZE: u32 = 0x1000;

// PTE bits
pub const PTE_V: u32 = 1 << 0;
pub const PTE_R: u32 = 1 << 1;
pub const PTE_W: u32 = 1 << 2;
pub const PTE_X: u32 = 1 << 3;
pub const PTE_U: u32 = 1 << 4;
pub const PTE_A: u32 = 1 << 6;
pub const PTE_D: u32 = 1 << 7;

/// Access permissions for a physical address, by privilege level, plus the
/// translated address itself. Currently every permission is granted; the
/// record exists so tightening this to consult PTE permissions changes one
/// function.
#[derive(Debug, Clone, Copy)]
pub struct MemoryAccess {
    pub m_read: bool,
    pub m_write: bool,
    pub m_execute: bool,
    pub s_read: bool,
    pub s_write: bool,
    pub s_execute: bool,
    pub u_read: bool,
    pub u_write: bool,
    pub u_execute: bool,
    pub present: bool,
    pub translated: u32,
}

/// Allow-all stub consulted on instruction fetch.
pub fn check_access(addr: u32) -> MemoryAccess {
    MemoryAccess {
        m_read: true,
        m_write: true,
        m_execute: true,
        s_read: true,
        s_write: true,
        s_execute: true,
        u_read: true,
        u_write: true,
        u_execute: true,
        present: true,
        translated: addr,
    }
}

fn is_leaf(pte: u32) -> bool {
    pte & (PTE_R | PTE_W | PTE_X) != 0
}

/// Walk the Sv32 table rooted at `satp << 12` and translate `vaddr`.
/// The A bit must already be set, and a set D bit on a write path faults.
pub fn translate(bus: &Bus, satp: u32, vaddr: u32, is_write: bool) -> Result<u32, VmError> {
    let offset = vaddr & 0xFFF;
    let vpn0 = (vaddr >> 12) & 0x3FF;
    let vpn1 = (vaddr >> 22) & 0x3FF;

    let root = satp.wrapping_shl(12);

    let read_pte = |pte_addr: u32| -> Result<u32, VmError> {
        let pte = bus
            .peek_word(pte_addr)
            .ok_or(VmError::AccessFault(pte_addr))?;
        if pte & PTE_V == 0 || (pte & PTE_R == 0 && pte & PTE_W != 0) {
            return Err(VmError::PageFault(vaddr));
        }
        Ok(pte)
    };

    let pte1 = read_pte(root.wrapping_add(vpn1 * 4))?;

    let (leaf, superpage) = if is_leaf(pte1) {
        (pte1, true)
    } else {
        let ppn = (pte1 >> 10) & 0x3F_FFFF;
        let leaf = read_pte(ppn.wrapping_mul(PAGE_SIZE).wrapping_add(vpn0 * 4))?;
        if !is_leaf(leaf) {
            return Err(VmError::PageFault(vaddr));
        }
        (leaf, false)
    };

    // A superpage leaf must have its low PPN field clear.
    if superpage && (leaf >> 10) & 0x3FF != 0 {
        return Err(VmError::PageFault(vaddr));
    }

    if leaf & PTE_A == 0 || (leaf & PTE_D != 0 && is_write) {
        return Err(VmError::PageFault(vaddr));
    }

    let phys = if superpage {
        ((leaf >> 20) & 0xFFF).wrapping_shl(22) | (vpn0 << 12) | offset
    } else {
        ((leaf >> 10) & 0x3F_FFFF).wrapping_shl(12) | offset
    };

    Ok(phys)
}
