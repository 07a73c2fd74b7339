//! Windows x64 NASM backend.
//!
//! Translates the symbolic IR sequence (not its bytes) into PE-targeted
//! assembly. The VM's value stack becomes the hardware stack via
//! `push rax`/`pop rax`; locals live in the frame at `[rbp - (slot+1)*8]`;
//! arrays are `HeapAlloc` blocks with a length prefix in the first qword.
//! The program result becomes the process exit code, truncated to 32 bits.
//!
//! Array semantics match the VM: a zero handle or an out-of-range index
//! reads as 0 and ignores writes, and a negative length allocates an empty
//! array.

use std::collections::BTreeMap;

use crate::ir::Instr;

/// Render the instruction sequence as NASM source for `nasm -f win64`.
pub fn emit_nasm(code: &[Instr], local_count: usize) -> String {
    let uses_heap = code
        .iter()
        .any(|instr| matches!(instr, Instr::ArrNew | Instr::ArrGet | Instr::ArrSet));

    // every instruction index some branch lands on gets a local label
    let mut branch_targets = BTreeMap::new();
    for instr in code {
        if let Instr::JzAbs(target) | Instr::JmpAbs(target) = instr {
            branch_targets
                .entry(*target)
                .or_insert_with(|| format!(".L{target}"));
        }
    }
    let last_target = branch_targets.keys().copied().max();

    let mut asm = Asm::new();
    asm.raw("default rel");
    asm.raw("extern ExitProcess");
    if uses_heap {
        asm.raw("extern GetProcessHeap");
        asm.raw("extern HeapAlloc");
    }
    asm.blank();
    asm.raw("section .text");
    asm.raw("global main");
    asm.blank();
    asm.raw("main:");
    asm.op("push rbp");
    asm.op("mov rbp, rsp");
    // locals plus 32 bytes of shadow space, rounded up to 16
    let reserve = (local_count * 8 + 32 + 15) & !15;
    asm.op(&format!("sub rsp, {reserve}"));
    if uses_heap {
        asm.op("call GetProcessHeap");
        asm.op("mov r12, rax"); // process heap handle for the whole run
    }

    let mut needs_exit_label = false;
    for (index, instr) in code.iter().enumerate() {
        if let Some(label) = branch_targets.get(&index) {
            asm.raw(&format!("{label}:"));
        }
        match *instr {
            Instr::PushImm64(value) => {
                asm.op(&format!("mov rax, 0x{value:x}"));
                asm.op("push rax");
            }
            Instr::LoadLocal(slot) => {
                asm.op(&format!("mov rax, [rbp - {}]", local_offset(slot)));
                asm.op("push rax");
            }
            Instr::StoreLocal(slot) => {
                asm.op("pop rax");
                asm.op(&format!("mov [rbp - {}], rax", local_offset(slot)));
            }
            Instr::Dup => {
                asm.op("mov rax, [rsp]");
                asm.op("push rax");
            }
            Instr::Add => {
                asm.op("pop rbx");
                asm.op("pop rax");
                asm.op("add rax, rbx");
                asm.op("push rax");
            }
            Instr::Max => {
                asm.op("pop rbx");
                asm.op("pop rax");
                asm.op("cmp rax, rbx");
                asm.op("cmovl rax, rbx");
                asm.op("push rax");
            }
            Instr::Min => {
                asm.op("pop rbx");
                asm.op("pop rax");
                asm.op("cmp rax, rbx");
                asm.op("cmovg rax, rbx");
                asm.op("push rax");
            }
            Instr::CmpGt => asm.compare("setg"),
            Instr::CmpLt => asm.compare("setl"),
            Instr::CmpEq => asm.compare("sete"),
            Instr::CmpNe => asm.compare("setne"),
            Instr::CmpGe => asm.compare("setge"),
            Instr::CmpLe => asm.compare("setle"),
            Instr::ArrNew => asm.arr_new(index),
            Instr::ArrGet => asm.arr_get(index),
            Instr::ArrSet => asm.arr_set(index),
            Instr::JzAbs(target) => {
                asm.op("pop rax");
                asm.op("test rax, rax");
                asm.op(&format!("jz .L{target}"));
            }
            Instr::JmpAbs(target) => {
                asm.op(&format!("jmp .L{target}"));
            }
            Instr::Ret => {
                asm.op("pop rax");
                // emission ends at a RET once no branch target remains
                // beyond it; everything after is unreachable
                if last_target.map_or(true, |target| target <= index) {
                    break;
                }
                asm.op("jmp .Lexit");
                needs_exit_label = true;
            }
        }
    }

    if let Some(label) = branch_targets.get(&code.len()) {
        asm.raw(&format!("{label}:"));
    }
    if needs_exit_label {
        asm.raw(".Lexit:");
    }
    asm.op("mov ecx, eax");
    asm.op("and rsp, -16");
    asm.op("sub rsp, 32");
    asm.op("call ExitProcess");
    asm.finish()
}

fn local_offset(slot: u16) -> usize {
    (slot as usize + 1) * 8
}

struct Asm {
    text: String,
}

impl Asm {
    fn new() -> Self {
        Asm {
            text: String::new(),
        }
    }

    fn raw(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    fn op(&mut self, line: &str) {
        self.text.push_str("    ");
        self.raw(line);
    }

    fn blank(&mut self) {
        self.text.push('\n');
    }

    fn finish(self) -> String {
        self.text
    }

    fn compare(&mut self, set: &str) {
        self.op("pop rbx");
        self.op("pop rax");
        self.op("cmp rax, rbx");
        self.op(&format!("{set} al"));
        self.op("movzx rax, al");
        self.op("push rax");
    }

    /// The virtual stack leaves rsp at an arbitrary alignment, so heap
    /// calls save rsp, realign, and reserve shadow space.
    fn heap_call(&mut self, name: &str) {
        self.op("mov r13, rsp");
        self.op("and rsp, -16");
        self.op("sub rsp, 32");
        self.op(&format!("call {name}"));
        self.op("mov rsp, r13");
    }

    fn arr_new(&mut self, site: usize) {
        self.op("pop rbx");
        self.op("test rbx, rbx");
        self.op(&format!("jns .an{site}_len"));
        self.op("xor rbx, rbx"); // negative lengths allocate empty
        self.raw(&format!(".an{site}_len:"));
        self.op("lea r8, [rbx*8 + 8]"); // length prefix plus elements
        self.op("mov rcx, r12");
        self.op("mov edx, 8"); // HEAP_ZERO_MEMORY
        self.heap_call("HeapAlloc");
        self.op("test rax, rax");
        self.op(&format!("jz .an{site}_done"));
        self.op("mov [rax], rbx");
        self.raw(&format!(".an{site}_done:"));
        self.op("push rax");
    }

    fn arr_get(&mut self, site: usize) {
        self.op("pop rbx"); // index
        self.op("pop rax"); // handle
        self.op("test rax, rax");
        self.op(&format!("jz .ag{site}_oob"));
        self.op("cmp rbx, [rax]");
        self.op(&format!("jae .ag{site}_oob")); // unsigned, so negative is out of range
        self.op("push qword [rax + rbx*8 + 8]");
        self.op(&format!("jmp .ag{site}_done"));
        self.raw(&format!(".ag{site}_oob:"));
        self.op("push 0");
        self.raw(&format!(".ag{site}_done:"));
    }

    fn arr_set(&mut self, site: usize) {
        self.op("pop rdx"); // value
        self.op("pop rbx"); // index
        self.op("pop rax"); // handle
        self.op("test rax, rax");
        self.op(&format!("jz .as{site}_done"));
        self.op("cmp rbx, [rax]");
        self.op(&format!("jae .as{site}_done"));
        self.op("mov [rax + rbx*8 + 8], rdx");
        self.raw(&format!(".as{site}_done:"));
        self.op("push rax"); // the handle goes back on the stack
    }
}
