//! Stack VM over finalized bytecode.
//!
//! The machine is a value stack of signed 64-bit integers, a fixed
//! zero-initialized local slot array, and a growable array heap addressed
//! by 1-based handles. Execution is single-threaded and deterministic.
//!
//! Array misuse is not an error: `ARR_GET`/`ARR_SET` on a zero or unknown
//! handle or an out-of-range index yield 0 / are ignored. The NASM backend
//! implements the same policy.

use thiserror::Error;

use crate::ir::Opcode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("vm stack underflow")]
    StackUnderflow,
    #[error("unknown opcode 0x{opcode:02x} at byte offset {offset}")]
    UnknownOpcode { opcode: u8, offset: usize },
    #[error("instruction pointer out of range at byte offset {offset}")]
    IpOutOfRange { offset: usize },
    #[error("local slot {slot} out of range")]
    SlotOutOfRange { slot: u16 },
}

/// Execute a finalized byte stream and return the value popped by `RET`.
pub fn run(bytes: &[u8], local_count: usize) -> Result<i64, VmError> {
    Vm::new(bytes, local_count).run()
}

struct Vm<'a> {
    bytes: &'a [u8],
    ip: usize,
    stack: Vec<i64>,
    locals: Vec<i64>,
    arrays: Vec<Vec<i64>>,
}

impl<'a> Vm<'a> {
    fn new(bytes: &'a [u8], local_count: usize) -> Self {
        Vm {
            bytes,
            ip: 0,
            stack: Vec::with_capacity(64),
            locals: vec![0; local_count],
            arrays: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<i64, VmError> {
        loop {
            let offset = self.ip;
            let byte = self.fetch()?;
            let opcode = Opcode::from_byte(byte)
                .ok_or(VmError::UnknownOpcode { opcode: byte, offset })?;
            match opcode {
                Opcode::PushImm64 => {
                    let value = self.read_u64()? as i64;
                    self.stack.push(value);
                }
                Opcode::Add => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.stack.push(lhs.wrapping_add(rhs));
                }
                Opcode::Dup => {
                    let top = *self.stack.last().ok_or(VmError::StackUnderflow)?;
                    self.stack.push(top);
                }
                Opcode::StoreLocal => {
                    let slot = self.read_u16()?;
                    let value = self.pop()?;
                    let cell = self
                        .locals
                        .get_mut(slot as usize)
                        .ok_or(VmError::SlotOutOfRange { slot })?;
                    *cell = value;
                }
                Opcode::LoadLocal => {
                    let slot = self.read_u16()?;
                    let value = *self
                        .locals
                        .get(slot as usize)
                        .ok_or(VmError::SlotOutOfRange { slot })?;
                    self.stack.push(value);
                }
                Opcode::Ret => return self.pop(),
                Opcode::Max => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.stack.push(lhs.max(rhs));
                }
                Opcode::Min => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.stack.push(lhs.min(rhs));
                }
                Opcode::CmpGt => self.compare(|lhs, rhs| lhs > rhs)?,
                Opcode::CmpLt => self.compare(|lhs, rhs| lhs < rhs)?,
                Opcode::CmpEq => self.compare(|lhs, rhs| lhs == rhs)?,
                Opcode::CmpNe => self.compare(|lhs, rhs| lhs != rhs)?,
                Opcode::CmpGe => self.compare(|lhs, rhs| lhs >= rhs)?,
                Opcode::CmpLe => self.compare(|lhs, rhs| lhs <= rhs)?,
                Opcode::ArrNew => {
                    // negative lengths allocate an empty array
                    let len = self.pop()?.max(0) as usize;
                    self.arrays.push(vec![0; len]);
                    self.stack.push(self.arrays.len() as i64);
                }
                Opcode::ArrGet => {
                    let index = self.pop()?;
                    let handle = self.pop()?;
                    let value = match (self.array(handle), to_index(index)) {
                        (Some(array), Some(idx)) => array.get(idx).copied().unwrap_or(0),
                        _ => 0,
                    };
                    self.stack.push(value);
                }
                Opcode::ArrSet => {
                    let value = self.pop()?;
                    let index = self.pop()?;
                    let handle = self.pop()?;
                    if let (Some(array), Some(idx)) = (self.array_mut(handle), to_index(index)) {
                        if let Some(cell) = array.get_mut(idx) {
                            *cell = value;
                        }
                    }
                    self.stack.push(handle);
                }
                Opcode::JzAbs => {
                    let target = self.read_u32()? as usize;
                    if self.pop()? == 0 {
                        self.ip = target;
                    }
                }
                Opcode::JmpAbs => {
                    self.ip = self.read_u32()? as usize;
                }
            }
        }
    }

    fn fetch(&mut self) -> Result<u8, VmError> {
        let byte = *self
            .bytes
            .get(self.ip)
            .ok_or(VmError::IpOutOfRange { offset: self.ip })?;
        self.ip += 1;
        Ok(byte)
    }

    fn operand(&mut self, width: usize) -> Result<&'a [u8], VmError> {
        let bytes = self
            .bytes
            .get(self.ip..self.ip + width)
            .ok_or(VmError::IpOutOfRange { offset: self.ip })?;
        self.ip += width;
        Ok(bytes)
    }

    fn read_u16(&mut self) -> Result<u16, VmError> {
        let bytes = self.operand(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, VmError> {
        let bytes = self.operand(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&mut self) -> Result<u64, VmError> {
        let bytes = self.operand(8)?;
        let mut value = [0u8; 8];
        value.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(value))
    }

    fn pop(&mut self) -> Result<i64, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow)
    }

    fn compare(&mut self, predicate: impl FnOnce(i64, i64) -> bool) -> Result<(), VmError> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        self.stack.push(i64::from(predicate(lhs, rhs)));
        Ok(())
    }

    fn array(&self, handle: i64) -> Option<&Vec<i64>> {
        let index = usize::try_from(handle).ok()?.checked_sub(1)?;
        self.arrays.get(index)
    }

    fn array_mut(&mut self, handle: i64) -> Option<&mut Vec<i64>> {
        let index = usize::try_from(handle).ok()?.checked_sub(1)?;
        self.arrays.get_mut(index)
    }
}

fn to_index(index: i64) -> Option<usize> {
    usize::try_from(index).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instr, finalize};

    fn run_instrs(code: &[Instr], local_count: usize) -> Result<i64, VmError> {
        run(&finalize(code), local_count)
    }

    #[test]
    fn returns_a_pushed_literal() {
        let result = run_instrs(&[Instr::PushImm64(0x2A), Instr::Ret], 0);
        assert_eq!(result, Ok(42));
    }

    #[test]
    fn adds_with_wrapping() {
        let result = run_instrs(
            &[
                Instr::PushImm64(u64::MAX), // -1 as i64
                Instr::PushImm64(3),
                Instr::Add,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(2));
    }

    #[test]
    fn stores_and_loads_locals() {
        let result = run_instrs(
            &[
                Instr::PushImm64(7),
                Instr::StoreLocal(0),
                Instr::LoadLocal(0),
                Instr::LoadLocal(1), // untouched slots read as zero
                Instr::Add,
                Instr::Ret,
            ],
            2,
        );
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn dup_copies_the_top_of_stack() {
        let result = run_instrs(
            &[Instr::PushImm64(5), Instr::Dup, Instr::Add, Instr::Ret],
            0,
        );
        assert_eq!(result, Ok(10));
    }

    #[test]
    fn max_and_min_are_signed() {
        let result = run_instrs(
            &[
                Instr::PushImm64(u64::MAX), // -1
                Instr::PushImm64(2),
                Instr::Max,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(2));

        let result = run_instrs(
            &[
                Instr::PushImm64(u64::MAX),
                Instr::PushImm64(2),
                Instr::Min,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(-1));
    }

    #[test]
    fn comparisons_push_zero_or_one() {
        let result = run_instrs(
            &[
                Instr::PushImm64(5),
                Instr::PushImm64(3),
                Instr::CmpGt,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(1));

        let result = run_instrs(
            &[
                Instr::PushImm64(5),
                Instr::PushImm64(3),
                Instr::CmpLe,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(0));
    }

    #[test]
    fn jz_branches_on_zero_and_falls_through_otherwise() {
        // push cond ; jz else ; push 1 ; ret ; else: push 2 ; ret
        let branch = |cond: u64| {
            run_instrs(
                &[
                    Instr::PushImm64(cond),
                    Instr::JzAbs(4),
                    Instr::PushImm64(1),
                    Instr::Ret,
                    Instr::PushImm64(2),
                    Instr::Ret,
                ],
                0,
            )
        };
        assert_eq!(branch(1), Ok(1));
        assert_eq!(branch(0), Ok(2));
    }

    #[test]
    fn jmp_is_unconditional() {
        let result = run_instrs(
            &[
                Instr::JmpAbs(2),
                Instr::Ret, // skipped
                Instr::PushImm64(9),
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(9));
    }

    #[test]
    fn arrays_allocate_zeroed_and_read_back() {
        let result = run_instrs(
            &[
                Instr::PushImm64(3),
                Instr::ArrNew,
                Instr::PushImm64(1),
                Instr::PushImm64(20),
                Instr::ArrSet, // handle stays on the stack
                Instr::PushImm64(1),
                Instr::ArrGet,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(20));

        let result = run_instrs(
            &[
                Instr::PushImm64(3),
                Instr::ArrNew,
                Instr::PushImm64(2),
                Instr::ArrGet, // unset element
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(0));
    }

    #[test]
    fn array_handles_are_one_based_and_fresh() {
        let result = run_instrs(
            &[
                Instr::PushImm64(1),
                Instr::ArrNew,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(1));
    }

    #[test]
    fn out_of_range_reads_yield_zero() {
        let result = run_instrs(
            &[
                Instr::PushImm64(2),
                Instr::ArrNew,
                Instr::PushImm64(5),
                Instr::ArrGet,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(0));
    }

    #[test]
    fn unknown_handles_are_ignored() {
        let result = run_instrs(
            &[
                Instr::PushImm64(0), // never a valid handle
                Instr::PushImm64(0),
                Instr::ArrGet,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(0));

        // arr_set on a bogus handle still pushes the handle back
        let result = run_instrs(
            &[
                Instr::PushImm64(99),
                Instr::PushImm64(0),
                Instr::PushImm64(7),
                Instr::ArrSet,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(99));
    }

    #[test]
    fn negative_lengths_allocate_empty_arrays() {
        let result = run_instrs(
            &[
                Instr::PushImm64(u64::MAX), // -1
                Instr::ArrNew,
                Instr::PushImm64(0),
                Instr::ArrGet,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(0));
    }

    #[test]
    fn negative_indices_read_as_zero() {
        let result = run_instrs(
            &[
                Instr::PushImm64(2),
                Instr::ArrNew,
                Instr::PushImm64(u64::MAX), // -1
                Instr::ArrGet,
                Instr::Ret,
            ],
            0,
        );
        assert_eq!(result, Ok(0));
    }

    #[test]
    fn reports_stack_underflow() {
        let result = run_instrs(&[Instr::Ret], 0);
        assert_eq!(result, Err(VmError::StackUnderflow));

        let result = run_instrs(&[Instr::Add], 0);
        assert_eq!(result, Err(VmError::StackUnderflow));
    }

    #[test]
    fn reports_unknown_opcodes() {
        let result = run(&[0xEE], 0);
        assert_eq!(
            result,
            Err(VmError::UnknownOpcode {
                opcode: 0xEE,
                offset: 0
            })
        );
    }

    #[test]
    fn reports_ip_overrun() {
        // empty program falls off the end immediately
        let result = run(&[], 0);
        assert_eq!(result, Err(VmError::IpOutOfRange { offset: 0 }));

        // truncated operand
        let result = run(&[0x01, 0x2A], 0);
        assert_eq!(result, Err(VmError::IpOutOfRange { offset: 1 }));
    }

    #[test]
    fn reports_bad_local_slots() {
        let result = run_instrs(&[Instr::LoadLocal(3), Instr::Ret], 1);
        assert_eq!(result, Err(VmError::SlotOutOfRange { slot: 3 }));
    }
}
