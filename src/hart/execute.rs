use std::sync::Arc;

use super::csr::SATP;
use super::decode::{Instruction, Op};
use super::{fpu, mmu, Hart, REG_A0};
use crate::error::VmError;

/// Dispatch one decoded instruction. Branch-family ops write pc themselves;
/// the step loop advances pc for everything else.
pub(super) fn execute(hart: &mut Hart, inst: &Instruction) -> Result<(), VmError> {
    match inst.op {
        Op::Lui => {
            hart.regs[inst.rd] = inst.imm;
        }
        Op::Auipc => {
            hart.regs[inst.rd] = hart.pc.wrapping_add(inst.imm);
        }
        Op::Jal => {
            let next_pc = hart.pc.wrapping_add(4);
            hart.pc = hart.pc.wrapping_add(inst.imm);
            hart.regs[inst.rd] = next_pc;
        }
        Op::Jalr => {
            let next_pc = hart.pc.wrapping_add(4);
            hart.pc = hart.regs[inst.rs1].wrapping_add(inst.imm) & !1;
            hart.regs[inst.rd] = next_pc;
        }

        Op::Beq | Op::Bne | Op::Blt | Op::Bge | Op::Bltu | Op::Bgeu => {
            let lhs = hart.regs[inst.rs1];
            let rhs = hart.regs[inst.rs2];
            let taken = match inst.op {
                Op::Beq => lhs == rhs,
                Op::Bne => lhs != rhs,
                Op::Blt => (lhs as i32) < (rhs as i32),
                Op::Bge => (lhs as i32) >= (rhs as i32),
                Op::Bltu => lhs < rhs,
                _ => lhs >= rhs,
            };
            hart.pc = if taken {
                hart.pc.wrapping_add(inst.imm)
            } else {
                hart.pc.wrapping_add(4)
            };
        }

        Op::Lb => {
            let addr = hart.regs[inst.rs1].wrapping_add(inst.imm);
            hart.regs[inst.rd] = hart.bus.read_byte(addr)? as i8 as i32 as u32;
        }
        Op::Lh => {
            let addr = hart.regs[inst.rs1].wrapping_add(inst.imm);
            hart.regs[inst.rd] = hart.bus.read_half(addr)? as i16 as i32 as u32;
        }
        Op::Lw => {
            let addr = hart.regs[inst.rs1].wrapping_add(inst.imm);
            hart.regs[inst.rd] = hart.bus.read_word(addr)?;
        }
        Op::Lbu => {
            let addr = hart.regs[inst.rs1].wrapping_add(inst.imm);
            hart.regs[inst.rd] = hart.bus.read_byte(addr)? as u32;
        }
        Op::Lhu => {
            let addr = hart.regs[inst.rs1].wrapping_add(inst.imm);
            hart.regs[inst.rd] = hart.bus.read_half(addr)? as u32;
        }

        Op::Sb => {
            let addr = hart.regs[inst.rs1].wrapping_add(inst.imm);
            hart.bus.write_byte(addr, hart.regs[inst.rs2] as u8)?;
        }
        Op::Sh => {
            let addr = hart.regs[inst.rs1].wrapping_add(inst.imm);
            hart.bus.write_half(addr, hart.regs[inst.rs2] as u16)?;
        }
        Op::Sw => {
            let addr = hart.regs[inst.rs1].wrapping_add(inst.imm);
            hart.bus.write_word(addr, hart.regs[inst.rs2])?;
        }

        Op::Addi => {
            hart.regs[inst.rd] = hart.regs[inst.rs1].wrapping_add(inst.imm);
        }
        Op::Slti => {
            hart.regs[inst.rd] = ((hart.regs[inst.rs1] as i32) < (inst.imm as i32)) as u32;
        }
        Op::Sltiu => {
            hart.regs[inst.rd] = (hart.regs[inst.rs1] < inst.imm) as u32;
        }
        Op::Xori => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] ^ inst.imm;
        }
        Op::Ori => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] | inst.imm;
        }
        Op::Andi => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] & inst.imm;
        }

        // Immediate shifts carry the amount in the rs2 field
        Op::Slli => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] << inst.rs2;
        }
        Op::Srli => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] >> inst.rs2;
        }
        Op::Srai => {
            hart.regs[inst.rd] = ((hart.regs[inst.rs1] as i32) >> inst.rs2) as u32;
        }

        Op::Add => {
            hart.regs[inst.rd] = hart.regs[inst.rs1].wrapping_add(hart.regs[inst.rs2]);
        }
        Op::Sub => {
            hart.regs[inst.rd] = hart.regs[inst.rs1].wrapping_sub(hart.regs[inst.rs2]);
        }
        Op::Sll => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] << (hart.regs[inst.rs2] & 0x1F);
        }
        Op::Slt => {
            hart.regs[inst.rd] =
                ((hart.regs[inst.rs1] as i32) < (hart.regs[inst.rs2] as i32)) as u32;
        }
        Op::Sltu => {
            hart.regs[inst.rd] = (hart.regs[inst.rs1] < hart.regs[inst.rs2]) as u32;
        }
        Op::Xor => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] ^ hart.regs[inst.rs2];
        }
        Op::Srl => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] >> (hart.regs[inst.rs2] & 0x1F);
        }
        Op::Sra => {
            hart.regs[inst.rd] =
                ((hart.regs[inst.rs1] as i32) >> (hart.regs[inst.rs2] & 0x1F)) as u32;
        }
        Op::Or => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] | hart.regs[inst.rs2];
        }
        Op::And => {
            hart.regs[inst.rd] = hart.regs[inst.rs1] & hart.regs[inst.rs2];
        }

        // Single-hart program order satisfies FENCE trivially
        Op::Fence => {}

        Op::Ecall => {
            let table = Arc::clone(&hart.ecall);
            let bus = Arc::clone(&hart.bus);
            table.dispatch(
                hart.regs[REG_A0],
                hart.hart_id,
                &bus,
                &mut hart.regs,
                &mut hart.fregs,
            )?;
        }
        // Execution is a no-op; the breakpoint scan reacts to the encoding.
        Op::Ebreak => {}

        Op::Csrrw => {
            let csr = inst.imm as u16;
            let value = hart.regs[inst.rs1];
            if inst.rd != 0 {
                hart.regs[inst.rd] = hart.csrs.read(csr, hart.privilege)?;
            }
            hart.csrs.write(csr, value, hart.privilege)?;
        }
        Op::Csrrs => {
            let csr = inst.imm as u16;
            let value = hart.regs[inst.rs1];
            if inst.rd != 0 {
                hart.regs[inst.rd] = hart.csrs.read(csr, hart.privilege)?;
            }
            if inst.rs1 != 0 {
                let current = hart.csrs.read_internal(csr)?;
                hart.csrs.write(csr, current | value, hart.privilege)?;
            }
        }
        Op::Csrrc => {
            let csr = inst.imm as u16;
            let value = hart.regs[inst.rs1];
            if inst.rd != 0 {
                hart.regs[inst.rd] = hart.csrs.read(csr, hart.privilege)?;
            }
            if inst.rs1 != 0 {
                let current = hart.csrs.read_internal(csr)?;
                hart.csrs.write(csr, current & !value, hart.privilege)?;
            }
        }
        Op::Csrrwi => {
            let csr = inst.imm as u16;
            if inst.rd != 0 {
                hart.regs[inst.rd] = hart.csrs.read(csr, hart.privilege)?;
            }
            hart.csrs.write(csr, inst.rs1 as u32, hart.privilege)?;
        }
        Op::Csrrsi => {
            let csr = inst.imm as u16;
            if inst.rd != 0 {
                hart.regs[inst.rd] = hart.csrs.read(csr, hart.privilege)?;
            }
            if inst.rs1 != 0 {
                let current = hart.csrs.read_internal(csr)?;
                hart.csrs
                    .write(csr, current | inst.rs1 as u32, hart.privilege)?;
            }
        }
        Op::Csrrci => {
            let csr = inst.imm as u16;
            if inst.rd != 0 {
                hart.regs[inst.rd] = hart.csrs.read(csr, hart.privilege)?;
            }
            if inst.rs1 != 0 {
                let current = hart.csrs.read_internal(csr)?;
                hart.csrs
                    .write(csr, current & !(inst.rs1 as u32), hart.privilege)?;
            }
        }

        Op::Mul => {
            hart.regs[inst.rd] = hart.regs[inst.rs1].wrapping_mul(hart.regs[inst.rs2]);
        }
        Op::Mulh => {
            let lhs = hart.regs[inst.rs1] as i32 as i64;
            let rhs = hart.regs[inst.rs2] as i32 as i64;
            hart.regs[inst.rd] = (lhs.wrapping_mul(rhs) >> 32) as u32;
        }
        Op::Mulhsu => {
            let lhs = hart.regs[inst.rs1] as i32 as i64;
            let rhs = hart.regs[inst.rs2] as i64;
            hart.regs[inst.rd] = (lhs.wrapping_mul(rhs) >> 32) as u32;
        }
        Op::Mulhu => {
            let lhs = hart.regs[inst.rs1] as u64;
            let rhs = hart.regs[inst.rs2] as u64;
            hart.regs[inst.rd] = ((lhs * rhs) >> 32) as u32;
        }
        Op::Div => {
            let lhs = hart.regs[inst.rs1] as i32;
            let rhs = hart.regs[inst.rs2] as i32;
            hart.regs[inst.rd] = if rhs == 0 {
                u32::MAX
            } else {
                lhs.wrapping_div(rhs) as u32
            };
        }
        Op::Divu => {
            let lhs = hart.regs[inst.rs1];
            let rhs = hart.regs[inst.rs2];
            hart.regs[inst.rd] = if rhs == 0 { u32::MAX } else { lhs / rhs };
        }
        Op::Rem => {
            let lhs = hart.regs[inst.rs1] as i32;
            let rhs = hart.regs[inst.rs2] as i32;
            hart.regs[inst.rd] = if rhs == 0 {
                lhs as u32
            } else {
                lhs.wrapping_rem(rhs) as u32
            };
        }
        Op::Remu => {
            let lhs = hart.regs[inst.rs1];
            let rhs = hart.regs[inst.rs2];
            hart.regs[inst.rd] = if rhs == 0 { lhs } else { lhs % rhs };
        }

        Op::LrW => {
            hart.regs[inst.rd] = hart
                .bus
                .read_word_reserved(hart.regs[inst.rs1], hart.hart_id)?;
        }
        Op::ScW => {
            let ok = hart.bus.write_word_conditional(
                hart.regs[inst.rs1],
                hart.regs[inst.rs2],
                hart.hart_id,
            )?;
            hart.regs[inst.rd] = if ok { 0 } else { 1 };
        }
        Op::AmoswapW => {
            hart.regs[inst.rd] = hart
                .bus
                .atomic_swap(hart.regs[inst.rs1], hart.regs[inst.rs2])?;
        }
        Op::AmoaddW => {
            hart.regs[inst.rd] = hart
                .bus
                .atomic_add(hart.regs[inst.rs1], hart.regs[inst.rs2])?;
        }
        Op::AmoxorW => {
            hart.regs[inst.rd] = hart
                .bus
                .atomic_xor(hart.regs[inst.rs1], hart.regs[inst.rs2])?;
        }
        Op::AmoandW => {
            hart.regs[inst.rd] = hart
                .bus
                .atomic_and(hart.regs[inst.rs1], hart.regs[inst.rs2])?;
        }
        Op::AmoorW => {
            hart.regs[inst.rd] = hart
                .bus
                .atomic_or(hart.regs[inst.rs1], hart.regs[inst.rs2])?;
        }
        Op::AmominW => {
            hart.regs[inst.rd] = hart
                .bus
                .atomic_min(hart.regs[inst.rs1], hart.regs[inst.rs2])?;
        }
        Op::AmomaxW => {
            hart.regs[inst.rd] = hart
                .bus
                .atomic_max(hart.regs[inst.rs1], hart.regs[inst.rs2])?;
        }
        Op::AmominuW => {
            hart.regs[inst.rd] = hart
                .bus
                .atomic_min_u(hart.regs[inst.rs1], hart.regs[inst.rs2])?;
        }
        Op::AmomaxuW => {
            hart.regs[inst.rd] = hart
                .bus
                .atomic_max_u(hart.regs[inst.rs1], hart.regs[inst.rs2])?;
        }

        Op::Flw
        | Op::Fsw
        | Op::Fld
        | Op::Fsd
        | Op::FmaddS
        | Op::FmsubS
        | Op::FnmsubS
        | Op::FnmaddS
        | Op::FaddS
        | Op::FsubS
        | Op::FmulS
        | Op::FdivS
        | Op::FsqrtS
        | Op::FsgnjS
        | Op::FsgnjnS
        | Op::FsgnjxS
        | Op::FminS
        | Op::FmaxS
        | Op::FcvtWS
        | Op::FcvtWuS
        | Op::FmvXW
        | Op::FeqS
        | Op::FltS
        | Op::FleS
        | Op::FclassS
        | Op::FcvtSW
        | Op::FcvtSWu
        | Op::FmvWX
        | Op::FmaddD
        | Op::FmsubD
        | Op::FnmsubD
        | Op::FnmaddD
        | Op::FaddD
        | Op::FsubD
        | Op::FmulD
        | Op::FdivD
        | Op::FsqrtD
        | Op::FsgnjD
        | Op::FsgnjnD
        | Op::FsgnjxD
        | Op::FminD
        | Op::FmaxD
        | Op::FcvtSD
        | Op::FcvtDS
        | Op::FeqD
        | Op::FltD
        | Op::FleD
        | Op::FclassD
        | Op::FcvtWD
        | Op::FcvtWuD
        | Op::FcvtDW
        | Op::FcvtDWu => fpu::execute_fp(hart, inst)?,

        Op::CustTva => {
            let satp = hart.csrs.read_internal(SATP)?;
            hart.regs[inst.rd] = mmu::translate(&hart.bus, satp, hart.regs[inst.rs1], false)?;
        }

        Op::Uret => return Err(VmError::NotImplemented("uret")),
        Op::Sret => return Err(VmError::NotImplemented("sret")),
        Op::Mret => return Err(VmError::NotImplemented("mret")),
        Op::Wfi => return Err(VmError::NotImplemented("wfi")),
        Op::SfenceVma => return Err(VmError::NotImplemented("sfence.vma")),
        Op::SinvalVma => return Err(VmError::NotImplemented("sinval.vma")),
        Op::SinvalGvma => return Err(VmError::NotImplemented("sinval.gvma")),
        Op::SfenceWInval => return Err(VmError::NotImplemented("sfence.w.inval")),
        Op::SfenceInvalIr => return Err(VmError::NotImplemented("sfence.inval.ir")),

        Op::Invalid => {
            log::warn!(
                "illegal instruction {:#010x} at pc={:#010x}",
                inst.raw,
                hart.pc
            );
            return Err(VmError::InvalidInstruction {
                pc: hart.pc,
                word: inst.raw,
            });
        }
    }
    Ok(())
}
