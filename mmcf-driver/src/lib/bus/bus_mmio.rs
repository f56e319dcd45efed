use std::ptr;

use super::bus_interface::*;

/// The real register set, accessed with volatile 16-bit loads and stores at
/// the fixed physical addresses.
pub struct MmioBus {
    _private: (),
}

impl MmioBus {
    /// Take the hardware register set.
    ///
    /// # Safety
    /// The adapter's registers must be mapped at their physical addresses,
    /// and no other `MmioBus` may exist at the same time.
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterBus for MmioBus {
    fn load(&mut self, register: Register) -> u16 {
        // SAFETY: the constructor's contract guarantees the address is a
        // mapped, 16-bit-accessible device register.
        unsafe { ptr::read_volatile(register.address() as *const u16) }
    }

    fn store(&mut self, register: Register, value: u16) {
        // SAFETY: as above.
        unsafe { ptr::write_volatile(register.address() as *mut u16, value) }
    }
}
