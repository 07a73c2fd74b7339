//! Bytecode model.
//!
//! The IR lives in two forms: a symbolic `Instr` sequence whose branch
//! targets are instruction indices, and the finalized little-endian byte
//! stream produced by [`finalize`] where branch operands are absolute byte
//! offsets. Finalization happens once; the byte stream is never mutated
//! afterwards.

/// Opcode bytes of the finalized stream. `PushImm64` is the only
/// immediate-bearing opcode; locals use a u16 slot and branches a u32
/// absolute byte offset, all little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    PushImm64 = 0x01,
    Add = 0x02,
    Dup = 0x06,
    StoreLocal = 0x10,
    LoadLocal = 0x11,
    Ret = 0x21,
    Max = 0x30,
    Min = 0x31,
    CmpGt = 0x32,
    CmpLt = 0x33,
    CmpEq = 0x34,
    CmpNe = 0x35,
    CmpGe = 0x36,
    CmpLe = 0x37,
    ArrNew = 0x40,
    ArrGet = 0x41,
    ArrSet = 0x42,
    JzAbs = 0x70,
    JmpAbs = 0x71,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Opcode> {
        match byte {
            0x01 => Some(Opcode::PushImm64),
            0x02 => Some(Opcode::Add),
            0x06 => Some(Opcode::Dup),
            0x10 => Some(Opcode::StoreLocal),
            0x11 => Some(Opcode::LoadLocal),
            0x21 => Some(Opcode::Ret),
            0x30 => Some(Opcode::Max),
            0x31 => Some(Opcode::Min),
            0x32 => Some(Opcode::CmpGt),
            0x33 => Some(Opcode::CmpLt),
            0x34 => Some(Opcode::CmpEq),
            0x35 => Some(Opcode::CmpNe),
            0x36 => Some(Opcode::CmpGe),
            0x37 => Some(Opcode::CmpLe),
            0x40 => Some(Opcode::ArrNew),
            0x41 => Some(Opcode::ArrGet),
            0x42 => Some(Opcode::ArrSet),
            0x70 => Some(Opcode::JzAbs),
            0x71 => Some(Opcode::JmpAbs),
            _ => None,
        }
    }
}

/// Symbolic instruction. `JzAbs`/`JmpAbs` carry instruction-index targets
/// until finalization; an index equal to the sequence length addresses the
/// first byte past the stream (a jump to the very end).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instr {
    PushImm64(u64),
    Add,
    Dup,
    StoreLocal(u16),
    LoadLocal(u16),
    Ret,
    Max,
    Min,
    CmpGt,
    CmpLt,
    CmpEq,
    CmpNe,
    CmpGe,
    CmpLe,
    ArrNew,
    ArrGet,
    ArrSet,
    JzAbs(usize),
    JmpAbs(usize),
}

impl Instr {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instr::PushImm64(_) => Opcode::PushImm64,
            Instr::Add => Opcode::Add,
            Instr::Dup => Opcode::Dup,
            Instr::StoreLocal(_) => Opcode::StoreLocal,
            Instr::LoadLocal(_) => Opcode::LoadLocal,
            Instr::Ret => Opcode::Ret,
            Instr::Max => Opcode::Max,
            Instr::Min => Opcode::Min,
            Instr::CmpGt => Opcode::CmpGt,
            Instr::CmpLt => Opcode::CmpLt,
            Instr::CmpEq => Opcode::CmpEq,
            Instr::CmpNe => Opcode::CmpNe,
            Instr::CmpGe => Opcode::CmpGe,
            Instr::CmpLe => Opcode::CmpLe,
            Instr::ArrNew => Opcode::ArrNew,
            Instr::ArrGet => Opcode::ArrGet,
            Instr::ArrSet => Opcode::ArrSet,
            Instr::JzAbs(_) => Opcode::JzAbs,
            Instr::JmpAbs(_) => Opcode::JmpAbs,
        }
    }

    /// Encoded size in bytes, opcode included.
    pub fn encoded_len(&self) -> usize {
        match self {
            Instr::PushImm64(_) => 9,
            Instr::StoreLocal(_) | Instr::LoadLocal(_) => 3,
            Instr::JzAbs(_) | Instr::JmpAbs(_) => 5,
            _ => 1,
        }
    }
}

/// Byte offset of each instruction, with one trailing entry for the total
/// length so a branch may target the end of the stream.
pub fn byte_offsets(code: &[Instr]) -> Vec<u32> {
    let mut offsets = Vec::with_capacity(code.len() + 1);
    let mut offset = 0usize;
    for instr in code {
        offsets.push(offset as u32);
        offset += instr.encoded_len();
    }
    offsets.push(offset as u32);
    offsets
}

/// Freeze a symbolic sequence into its byte stream. Branch operands become
/// the absolute byte offset of their target instruction's first byte.
pub fn finalize(code: &[Instr]) -> Vec<u8> {
    let offsets = byte_offsets(code);
    let total = offsets[code.len()] as usize;
    let mut bytes = Vec::with_capacity(total);
    for instr in code {
        bytes.push(instr.opcode() as u8);
        match *instr {
            Instr::PushImm64(value) => bytes.extend_from_slice(&value.to_le_bytes()),
            Instr::StoreLocal(slot) | Instr::LoadLocal(slot) => {
                bytes.extend_from_slice(&slot.to_le_bytes())
            }
            Instr::JzAbs(target) | Instr::JmpAbs(target) => {
                bytes.extend_from_slice(&offsets[target].to_le_bytes())
            }
            _ => {}
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_bytes_round_trip() {
        let ops = [
            Instr::PushImm64(0),
            Instr::Add,
            Instr::Dup,
            Instr::StoreLocal(0),
            Instr::LoadLocal(0),
            Instr::Ret,
            Instr::Max,
            Instr::Min,
            Instr::CmpGt,
            Instr::CmpLe,
            Instr::ArrNew,
            Instr::ArrGet,
            Instr::ArrSet,
            Instr::JzAbs(0),
            Instr::JmpAbs(0),
        ];
        for instr in ops {
            assert_eq!(Opcode::from_byte(instr.opcode() as u8), Some(instr.opcode()));
        }
        assert_eq!(Opcode::from_byte(0xEE), None);
    }

    #[test]
    fn finalizes_push_and_ret() {
        let bytes = finalize(&[Instr::PushImm64(0x2A), Instr::Ret]);
        assert_eq!(
            bytes,
            vec![0x01, 0x2A, 0, 0, 0, 0, 0, 0, 0, 0x21]
        );
    }

    #[test]
    fn encodes_operands_little_endian() {
        let bytes = finalize(&[Instr::PushImm64(0x0102030405060708), Instr::StoreLocal(0x0201)]);
        assert_eq!(&bytes[1..9], &[0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[10..12], &[0x01, 0x02]);
    }

    #[test]
    fn branch_targets_become_instruction_start_offsets() {
        // push ; jz -> ret ; push ; jmp -> end ; ret
        let code = [
            Instr::PushImm64(1),
            Instr::JzAbs(4),
            Instr::PushImm64(2),
            Instr::JmpAbs(5),
            Instr::Ret,
            Instr::Ret,
        ];
        let offsets = byte_offsets(&code);
        assert_eq!(offsets, vec![0, 9, 14, 23, 28, 29, 30]);
        let bytes = finalize(&code);
        // jz operand = offset of instruction 4
        assert_eq!(&bytes[10..14], &28u32.to_le_bytes());
        // jmp operand = offset of instruction 5
        assert_eq!(&bytes[24..28], &29u32.to_le_bytes());
        assert_eq!(bytes.len(), 30);
    }

    #[test]
    fn branch_may_target_the_end_of_the_stream() {
        let code = [Instr::JmpAbs(1)];
        let bytes = finalize(&code);
        assert_eq!(&bytes[1..5], &5u32.to_le_bytes());
    }

    #[test]
    fn every_finalized_target_lands_on_an_instruction_boundary() {
        let code = [
            Instr::PushImm64(0),
            Instr::JzAbs(3),
            Instr::PushImm64(1),
            Instr::Ret,
        ];
        let offsets = byte_offsets(&code);
        let bytes = finalize(&code);
        let target = u32::from_le_bytes([bytes[10], bytes[11], bytes[12], bytes[13]]);
        assert!(offsets.contains(&target));
    }
}
