//! RV32IMAFD instruction decoder: a pure function from a 32-bit word to a
//! decoded record. Anything outside the accepted encodings becomes
//! `Op::Invalid` and faults at dispatch.

/// Operation tag. One variant per instruction the core executes or
/// recognizes; privileged returns and the fence family are recognized but
/// unimplemented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lui,
    Auipc,
    Jal,
    Jalr,
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
    Sb,
    Sh,
    Sw,
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Fence,
    Ecall,
    Ebreak,
    Csrrw,
    Csrrs,
    Csrrc,
    Csrrwi,
    Csrrsi,
    Csrrci,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    LrW,
    ScW,
    AmoswapW,
    AmoaddW,
    AmoxorW,
    AmoandW,
    AmoorW,
    AmominW,
    AmomaxW,
    AmominuW,
    AmomaxuW,
    Flw,
    Fsw,
    FmaddS,
    FmsubS,
    FnmsubS,
    FnmaddS,
    FaddS,
    FsubS,
    FmulS,
    FdivS,
    FsqrtS,
    FsgnjS,
    FsgnjnS,
    FsgnjxS,
    FminS,
    FmaxS,
    FcvtWS,
    FcvtWuS,
    FmvXW,
    FeqS,
    FltS,
    FleS,
    FclassS,
    FcvtSW,
    FcvtSWu,
    FmvWX,
    Fld,
    Fsd,
    FmaddD,
    FmsubD,
    FnmsubD,
    FnmaddD,
    FaddD,
    FsubD,
    FmulD,
    FdivD,
    FsqrtD,
    FsgnjD,
    FsgnjnD,
    FsgnjxD,
    FminD,
    FmaxD,
    FcvtSD,
    FcvtDS,
    FeqD,
    FltD,
    FleD,
    FclassD,
    FcvtWD,
    FcvtWuD,
    FcvtDW,
    FcvtDWu,
    Uret,
    Sret,
    Mret,
    Wfi,
    SfenceVma,
    SinvalVma,
    SinvalGvma,
    SfenceWInval,
    SfenceInvalIr,
    CustTva,
    Invalid,
}

impl Op {
    /// Ops that write pc themselves; everything else advances by 4 after
    /// dispatch.
    pub fn writes_pc(self) -> bool {
        matches!(
            self,
            Op::Jal | Op::Jalr | Op::Beq | Op::Bne | Op::Blt | Op::Bge | Op::Bltu | Op::Bgeu
        )
    }
}

/// Decoded instruction fields. `imm` is sign-extended per the I/S/B/U/J
/// formats, except for CSR ops where it carries the zero-extended 12-bit CSR
/// address (with the value register or zimm in `rs1`). Shift amounts travel
/// in `rs2`. `rm` is the raw funct3/rounding-mode field.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub raw: u32,
    pub op: Op,
    pub rd: usize,
    pub rs1: usize,
    pub rs2: usize,
    pub rs3: usize,
    pub imm: u32,
    pub rm: u8,
}

impl Instruction {
    pub fn decode(raw: u32) -> Self {
        let opcode = raw & 0x7F;
        let rd = ((raw >> 7) & 0x1F) as usize;
        let funct3 = (raw >> 12) & 0x7;
        let rs1 = ((raw >> 15) & 0x1F) as usize;
        let rs2 = ((raw >> 20) & 0x1F) as usize;
        let funct7 = (raw >> 25) & 0x7F;
        let rs3 = ((raw >> 27) & 0x1F) as usize;

        // I-type immediate
        let imm_i = ((raw as i32) >> 20) as u32;

        // S-type immediate
        let imm_s = {
            let imm = ((raw >> 25) & 0x7F) << 5 | ((raw >> 7) & 0x1F);
            ((imm as i32) << 20 >> 20) as u32
        };

        // B-type immediate
        let imm_b = {
            let b12 = (raw >> 31) & 1;
            let b11 = (raw >> 7) & 1;
            let b10_5 = (raw >> 25) & 0x3F;
            let b4_1 = (raw >> 8) & 0xF;
            let imm = (b12 << 12) | (b11 << 11) | (b10_5 << 5) | (b4_1 << 1);
            ((imm as i32) << 19 >> 19) as u32
        };

        // U-type immediate
        let imm_u = raw & 0xFFFF_F000;

        // J-type immediate
        let imm_j = {
            let b20 = (raw >> 31) & 1;
            let b19_12 = (raw >> 12) & 0xFF;
            let b11 = (raw >> 20) & 1;
            let b10_1 = (raw >> 21) & 0x3FF;
            let imm = (b20 << 20) | (b19_12 << 12) | (b11 << 11) | (b10_1 << 1);
            ((imm as i32) << 11 >> 11) as u32
        };

        // CSR address field, zero-extended
        let imm_csr = (raw >> 20) & 0xFFF;

        let (op, imm) = match opcode {
            0x37 => (Op::Lui, imm_u),
            0x17 => (Op::Auipc, imm_u),
            0x6F => (Op::Jal, imm_j),
            0x67 => match funct3 {
                0 => (Op::Jalr, imm_i),
                _ => (Op::Invalid, 0),
            },
            0x63 => {
                let op = match funct3 {
                    0 => Op::Beq,
                    1 => Op::Bne,
                    4 => Op::Blt,
                    5 => Op::Bge,
                    6 => Op::Bltu,
                    7 => Op::Bgeu,
                    _ => Op::Invalid,
                };
                (op, imm_b)
            }
            0x03 => {
                let op = match funct3 {
                    0 => Op::Lb,
                    1 => Op::Lh,
                    2 => Op::Lw,
                    4 => Op::Lbu,
                    5 => Op::Lhu,
                    _ => Op::Invalid,
                };
                (op, imm_i)
            }
            0x23 => {
                let op = match funct3 {
                    0 => Op::Sb,
                    1 => Op::Sh,
                    2 => Op::Sw,
                    _ => Op::Invalid,
                };
                (op, imm_s)
            }
            0x13 => {
                let op = match funct3 {
                    0 => Op::Addi,
                    1 if funct7 == 0x00 => Op::Slli,
                    2 => Op::Slti,
                    3 => Op::Sltiu,
                    4 => Op::Xori,
                    5 if funct7 == 0x00 => Op::Srli,
                    5 if funct7 == 0x20 => Op::Srai,
                    6 => Op::Ori,
                    7 => Op::Andi,
                    _ => Op::Invalid,
                };
                (op, imm_i)
            }
            0x33 => {
                let op = if funct7 == 0x01 {
                    match funct3 {
                        0 => Op::Mul,
                        1 => Op::Mulh,
                        2 => Op::Mulhsu,
                        3 => Op::Mulhu,
                        4 => Op::Div,
                        5 => Op::Divu,
                        6 => Op::Rem,
                        7 => Op::Remu,
                        _ => Op::Invalid,
                    }
                } else {
                    match (funct3, funct7) {
                        (0, 0x00) => Op::Add,
                        (0, 0x20) => Op::Sub,
                        (1, 0x00) => Op::Sll,
                        (2, 0x00) => Op::Slt,
                        (3, 0x00) => Op::Sltu,
                        (4, 0x00) => Op::Xor,
                        (5, 0x00) => Op::Srl,
                        (5, 0x20) => Op::Sra,
                        (6, 0x00) => Op::Or,
                        (7, 0x00) => Op::And,
                        _ => Op::Invalid,
                    }
                };
                (op, 0)
            }
            0x0F => match funct3 {
                0 => (Op::Fence, 0),
                _ => (Op::Invalid, 0),
            },
            0x73 => {
                if funct3 == 0 {
                    let op = match raw {
                        0x0000_0073 => Op::Ecall,
                        0x0010_0073 => Op::Ebreak,
                        0x0020_0073 => Op::Uret,
                        0x1020_0073 => Op::Sret,
                        0x3020_0073 => Op::Mret,
                        0x1050_0073 => Op::Wfi,
                        _ if rd == 0 => match funct7 {
                            0x09 => Op::SfenceVma,
                            0x0B => Op::SinvalVma,
                            0x0C if rs2 == 0 => Op::SfenceWInval,
                            0x0C if rs2 == 1 => Op::SfenceInvalIr,
                            0x33 => Op::SinvalGvma,
                            _ => Op::Invalid,
                        },
                        _ => Op::Invalid,
                    };
                    (op, 0)
                } else {
                    let op = match funct3 {
                        1 => Op::Csrrw,
                        2 => Op::Csrrs,
                        3 => Op::Csrrc,
                        5 => Op::Csrrwi,
                        6 => Op::Csrrsi,
                        7 => Op::Csrrci,
                        _ => Op::Invalid,
                    };
                    (op, imm_csr)
                }
            }
            0x2F => {
                // A extension; funct7[1:0] are aq/rl and are accepted freely
                let op = if funct3 != 2 {
                    Op::Invalid
                } else {
                    match funct7 >> 2 {
                        0x02 if rs2 == 0 => Op::LrW,
                        0x03 => Op::ScW,
                        0x01 => Op::AmoswapW,
                        0x00 => Op::AmoaddW,
                        0x04 => Op::AmoxorW,
                        0x0C => Op::AmoandW,
                        0x08 => Op::AmoorW,
                        0x10 => Op::AmominW,
                        0x14 => Op::AmomaxW,
                        0x18 => Op::AmominuW,
                        0x1C => Op::AmomaxuW,
                        _ => Op::Invalid,
                    }
                };
                (op, 0)
            }
            0x07 => {
                let op = match funct3 {
                    2 => Op::Flw,
                    3 => Op::Fld,
                    _ => Op::Invalid,
                };
                (op, imm_i)
            }
            0x27 => {
                let op = match funct3 {
                    2 => Op::Fsw,
                    3 => Op::Fsd,
                    _ => Op::Invalid,
                };
                (op, imm_s)
            }
            0x43 | 0x47 | 0x4B | 0x4F => {
                let op = match (opcode, funct7 & 0x3) {
                    (0x43, 0) => Op::FmaddS,
                    (0x47, 0) => Op::FmsubS,
                    (0x4B, 0) => Op::FnmsubS,
                    (0x4F, 0) => Op::FnmaddS,
                    (0x43, 1) => Op::FmaddD,
                    (0x47, 1) => Op::FmsubD,
                    (0x4B, 1) => Op::FnmsubD,
                    (0x4F, 1) => Op::FnmaddD,
                    _ => Op::Invalid,
                };
                (op, 0)
            }
            0x53 => {
                let op = match funct7 {
                    0x00 => Op::FaddS,
                    0x04 => Op::FsubS,
                    0x08 => Op::FmulS,
                    0x0C => Op::FdivS,
                    0x2C if rs2 == 0 => Op::FsqrtS,
                    0x10 => match funct3 {
                        0 => Op::FsgnjS,
                        1 => Op::FsgnjnS,
                        2 => Op::FsgnjxS,
                        _ => Op::Invalid,
                    },
                    0x14 => match funct3 {
                        0 => Op::FminS,
                        1 => Op::FmaxS,
                        _ => Op::Invalid,
                    },
                    0x50 => match funct3 {
                        0 => Op::FleS,
                        1 => Op::FltS,
                        2 => Op::FeqS,
                        _ => Op::Invalid,
                    },
                    0x60 => match rs2 {
                        0 => Op::FcvtWS,
                        1 => Op::FcvtWuS,
                        _ => Op::Invalid,
                    },
                    0x68 => match rs2 {
                        0 => Op::FcvtSW,
                        1 => Op::FcvtSWu,
                        _ => Op::Invalid,
                    },
                    0x70 => match (rs2, funct3) {
                        (0, 0) => Op::FmvXW,
                        (0, 1) => Op::FclassS,
                        _ => Op::Invalid,
                    },
                    0x78 if rs2 == 0 && funct3 == 0 => Op::FmvWX,
                    0x01 => Op::FaddD,
                    0x05 => Op::FsubD,
                    0x09 => Op::FmulD,
                    0x0D => Op::FdivD,
                    0x2D if rs2 == 0 => Op::FsqrtD,
                    0x11 => match funct3 {
                        0 => Op::FsgnjD,
                        1 => Op::FsgnjnD,
                        2 => Op::FsgnjxD,
                        _ => Op::Invalid,
                    },
                    0x15 => match funct3 {
                        0 => Op::FminD,
                        1 => Op::FmaxD,
                        _ => Op::Invalid,
                    },
                    0x51 => match funct3 {
                        0 => Op::FleD,
                        1 => Op::FltD,
                        2 => Op::FeqD,
                        _ => Op::Invalid,
                    },
                    0x61 => match rs2 {
                        0 => Op::FcvtWD,
                        1 => Op::FcvtWuD,
                        _ => Op::Invalid,
                    },
                    0x69 => match rs2 {
                        0 => Op::FcvtDW,
                        1 => Op::FcvtDWu,
                        _ => Op::Invalid,
                    },
                    0x20 if rs2 == 1 => Op::FcvtSD,
                    0x21 if rs2 == 0 => Op::FcvtDS,
                    0x71 if rs2 == 0 && funct3 == 1 => Op::FclassD,
                    _ => Op::Invalid,
                };
                (op, 0)
            }
            // custom-0: translate-virtual-address, R-type, funct3=0 funct7=0
            0x0B => {
                let op = if funct3 == 0 && funct7 == 0 {
                    Op::CustTva
                } else {
                    Op::Invalid
                };
                (op, 0)
            }
            _ => (Op::Invalid, 0),
        };

        Self {
            raw,
            op,
            rd,
            rs1,
            rs2,
            rs3,
            imm,
            rm: funct3 as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_addi() {
        // addi x1, x0, 42
        let inst = Instruction::decode(0x02A0_0093);
        assert_eq!(inst.op, Op::Addi);
        assert_eq!(inst.rd, 1);
        assert_eq!(inst.rs1, 0);
        assert_eq!(inst.imm, 42);
    }

    #[test]
    fn decode_negative_immediates() {
        // addi x1, x0, -1
        let inst = Instruction::decode(0xFFF0_0093);
        assert_eq!(inst.imm, 0xFFFF_FFFF);
        // jal x0, -4
        let inst = Instruction::decode(0xFFDF_F06F);
        assert_eq!(inst.op, Op::Jal);
        assert_eq!(inst.imm as i32, -4);
        // beq x0, x0, -8
        let inst = Instruction::decode(0xFE00_0CE3);
        assert_eq!(inst.op, Op::Beq);
        assert_eq!(inst.imm as i32, -8);
    }

    #[test]
    fn decode_store_immediate() {
        // sw x1, 256(x2)
        let inst = Instruction::decode(0x1011_2023);
        assert_eq!(inst.op, Op::Sw);
        assert_eq!(inst.rs1, 2);
        assert_eq!(inst.rs2, 1);
        assert_eq!(inst.imm, 256);
    }

    #[test]
    fn decode_csr_address_zero_extended() {
        // csrrw x5, 0xF14, x0 — high-bit CSR addresses must not sign-extend
        let inst = Instruction::decode(0xF140_12F3);
        assert_eq!(inst.op, Op::Csrrw);
        assert_eq!(inst.imm, 0xF14);
        assert_eq!(inst.rd, 5);
    }

    #[test]
    fn decode_shift_amount_in_rs2() {
        // srai x2, x1, 16
        let inst = Instruction::decode(0x4100_D113);
        assert_eq!(inst.op, Op::Srai);
        assert_eq!(inst.rs2, 16);
        // slli with funct7 != 0 is not a valid encoding
        assert_eq!(Instruction::decode(0x4100_9113).op, Op::Invalid);
    }

    #[test]
    fn decode_system() {
        assert_eq!(Instruction::decode(0x0000_0073).op, Op::Ecall);
        assert_eq!(Instruction::decode(0x0010_0073).op, Op::Ebreak);
        assert_eq!(Instruction::decode(0x3020_0073).op, Op::Mret);
        assert_eq!(Instruction::decode(0x1050_0073).op, Op::Wfi);
        // sfence.vma x0, x0
        assert_eq!(Instruction::decode(0x1200_0073).op, Op::SfenceVma);
    }

    #[test]
    fn decode_atomics() {
        // lr.w x2, (x1)
        assert_eq!(Instruction::decode(0x1000_A12F).op, Op::LrW);
        // lr.w with rs2 != 0 is invalid
        assert_eq!(Instruction::decode(0x1030_A12F).op, Op::Invalid);
        // sc.w x3, x2, (x1)
        assert_eq!(Instruction::decode(0x1820_A1AF).op, Op::ScW);
        // amoadd.w x2, x3, (x1)
        assert_eq!(Instruction::decode(0x0030_A12F).op, Op::AmoaddW);
        // amoswap.w
        assert_eq!(Instruction::decode(0x0830_A12F).op, Op::AmoswapW);
    }

    #[test]
    fn decode_fp() {
        // fadd.s f3, f1, f2
        let inst = Instruction::decode(0x0020_81D3);
        assert_eq!(inst.op, Op::FaddS);
        assert_eq!(inst.rm, 0);
        // fmadd.s f1, f2, f3, f4
        let inst = Instruction::decode(0x2031_00C3);
        assert_eq!(inst.op, Op::FmaddS);
        assert_eq!(inst.rs3, 4);
        // fcvt.w.s x1, f1 (rtz)
        let inst = Instruction::decode(0xC000_90D3);
        assert_eq!(inst.op, Op::FcvtWS);
        assert_eq!(inst.rm, 1);
        // fcvt.s.d f1, f2
        assert_eq!(Instruction::decode(0x4011_00D3).op, Op::FcvtSD);
        // fclass.d x1, f1
        assert_eq!(Instruction::decode(0xE200_90D3).op, Op::FclassD);
        // fmv.x.d does not exist on RV32
        assert_eq!(Instruction::decode(0xE200_00D3).op, Op::Invalid);
    }

    #[test]
    fn decode_custom_translate() {
        // custom-0, funct3=0, funct7=0: rd=x5, rs1=x6
        let inst = Instruction::decode(0x0003_028B);
        assert_eq!(inst.op, Op::CustTva);
        assert_eq!(inst.rd, 5);
        assert_eq!(inst.rs1, 6);
        // any other funct3 on custom-0 is invalid
        assert_eq!(Instruction::decode(0x0003_128B).op, Op::Invalid);
    }

    #[test]
    fn unknown_patterns_invalid() {
        assert_eq!(Instruction::decode(0x0000_0000).op, Op::Invalid);
        assert_eq!(Instruction::decode(0xFFFF_FFFF).op, Op::Invalid);
        // branch funct3 2 is unassigned
        assert_eq!(Instruction::decode(0x0020_A063).op, Op::Invalid);
        // load funct3 3 (ld) is RV64-only
        assert_eq!(Instruction::decode(0x0000_B003).op, Op::Invalid);
    }
}
