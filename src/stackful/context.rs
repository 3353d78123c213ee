//! Architecture-specific execution-context save/restore.
//!
//! Everything unsafe and per-architecture lives here, behind three
//! operations: a [`Context`] snapshot of the callee-saved register set, a
//! [`switch`] that spills the running context and activates another, and a
//! [`prepare`] that roots a fresh context at an entry shim on a new stack.
//!
//! Only the callee-saved set is preserved; caller-saved registers are dead
//! across `switch` because it is an `extern "C"` call. On first activation
//! the shim forwards the argument from a callee-saved register, realigns
//! the stack as the ABI requires, and tail-enters the Rust trampoline,
//! which never returns.

use std::arch::naked_asm;

use libc::c_void;

#[cfg(not(all(
    unix,
    any(target_arch = "x86_64", target_arch = "aarch64")
)))]
compile_error!("the stackful engine supports only x86_64 and aarch64 unix targets");

/// Entry routine a fresh context starts in. Must never return; completion
/// is routed through an explicit switch back to the caller context.
pub(super) type EntryFn = unsafe extern "C" fn(*mut c_void) -> !;

/// Callee-saved register snapshot (System V x86_64).
// fields are read and written by `switch`, not from Rust
#[cfg(target_arch = "x86_64")]
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
pub(super) struct Context {
    rsp: u64,
    rbp: u64,
    rbx: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
}

/// Callee-saved register snapshot (AAPCS64): sp, x19-x28, fp, lr and the
/// low halves of d8-d15.
#[cfg(target_arch = "aarch64")]
#[repr(C)]
#[derive(Default)]
#[allow(dead_code)]
pub(super) struct Context {
    sp: u64,
    x: [u64; 10],
    fp: u64,
    lr: u64,
    d: [u64; 8],
}

/// Saves the current execution state into `save` and activates `load`.
///
/// Returns only when some later `switch` activates `save` again. Both
/// pointers must be valid; `load` must hold either a snapshot taken by a
/// previous `switch` or a fresh context from [`prepare`].
#[cfg(target_arch = "x86_64")]
#[unsafe(naked)]
pub(super) unsafe extern "C" fn switch(_save: *mut Context, _load: *const Context) {
    naked_asm!(
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r13",
        "mov [rdi + 0x28], r14",
        "mov [rdi + 0x30], r15",
        "mov rsp, [rsi + 0x00]",
        "mov rbp, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov r13, [rsi + 0x20]",
        "mov r14, [rsi + 0x28]",
        "mov r15, [rsi + 0x30]",
        // for a suspended context this returns after its own switch call;
        // for a fresh one it pops the entry shim address
        "ret",
    );
}

#[cfg(target_arch = "aarch64")]
#[unsafe(naked)]
pub(super) unsafe extern "C" fn switch(_save: *mut Context, _load: *const Context) {
    naked_asm!(
        "mov x9, sp",
        "str x9, [x0, 0x00]",
        "stp x19, x20, [x0, 0x08]",
        "stp x21, x22, [x0, 0x18]",
        "stp x23, x24, [x0, 0x28]",
        "stp x25, x26, [x0, 0x38]",
        "stp x27, x28, [x0, 0x48]",
        "stp x29, x30, [x0, 0x58]",
        "stp d8, d9, [x0, 0x68]",
        "stp d10, d11, [x0, 0x78]",
        "stp d12, d13, [x0, 0x88]",
        "stp d14, d15, [x0, 0x98]",
        "ldr x9, [x1, 0x00]",
        "mov sp, x9",
        "ldp x19, x20, [x1, 0x08]",
        "ldp x21, x22, [x1, 0x18]",
        "ldp x23, x24, [x1, 0x28]",
        "ldp x25, x26, [x1, 0x38]",
        "ldp x27, x28, [x1, 0x48]",
        "ldp x29, x30, [x1, 0x58]",
        "ldp d8, d9, [x1, 0x68]",
        "ldp d10, d11, [x1, 0x78]",
        "ldp d12, d13, [x1, 0x88]",
        "ldp d14, d15, [x1, 0x98]",
        "ret",
    );
}

// First activation lands here via the `ret` in `switch` with the stack
// still holding nothing but the shim address. The argument and the entry
// address travel in callee-saved registers, the only ones `switch`
// restores.
#[cfg(target_arch = "x86_64")]
#[unsafe(naked)]
unsafe extern "C" fn entry_shim() -> ! {
    naked_asm!(
        "mov rdi, r12",
        // rsp % 16 == 8 here; the call below realigns it to ABI entry shape
        "sub rsp, 8",
        "call r13",
        "ud2",
    );
}

#[cfg(target_arch = "aarch64")]
#[unsafe(naked)]
unsafe extern "C" fn entry_shim() -> ! {
    naked_asm!(
        "mov x0, x19",
        "br x20",
    );
}

/// Builds a fresh context whose first activation enters `entry(arg)` on the
/// stack ending at `stack_top`.
///
/// `stack_top` must point one past an exclusively owned, writable region
/// large enough for the coroutine's frames; it is truncated to 16-byte
/// alignment.
#[cfg(target_arch = "x86_64")]
pub(super) unsafe fn prepare(stack_top: *mut u8, entry: EntryFn, arg: *mut c_void) -> Context {
    let top = (stack_top as usize) & !15;
    let rsp = (top - 16) as *mut u64;
    *rsp = entry_shim as *const () as u64;
    Context {
        rsp: rsp as u64,
        r12: arg as u64,
        r13: entry as *const () as u64,
        ..Context::default()
    }
}

#[cfg(target_arch = "aarch64")]
pub(super) unsafe fn prepare(stack_top: *mut u8, entry: EntryFn, arg: *mut c_void) -> Context {
    let mut ctx = Context {
        sp: ((stack_top as usize) & !15) as u64,
        lr: entry_shim as *const () as u64,
        ..Context::default()
    };
    ctx.x[0] = arg as u64; // x19
    ctx.x[1] = entry as *const () as u64; // x20
    ctx
}
