use std::ptr;

use crate::bus::{Register, RegisterBus};
use super::dma_interface::*;

// DMA3 registers.
const ADDRESS_DMA3_SOURCE: usize = 0x0400_00D4;
const ADDRESS_DMA3_DEST: usize = 0x0400_00D8;
const ADDRESS_DMA3_CONTROL: usize = 0x0400_00DC;  // Count in the low 16 bits.

// Control bits.
const DMA_DEST_FIXED: u32 = 2 << 21;
const DMA_SOURCE_FIXED: u32 = 2 << 23;
const DMA_16: u32 = 0;
const DMA_ENABLE: u32 = 1 << 31;  // Reads back as the busy flag.

/// DMA channel 3 of the GBA/NDS, used for cartridge-bus transfers.
pub struct Dma3Channel {
    _private: (),
}

impl Dma3Channel {
    /// Take DMA channel 3.
    ///
    /// # Safety
    /// The DMA registers must be mapped, nothing else may use channel 3
    /// while this exists, and the memory handed to `start` must stay valid
    /// until `is_busy` reports false. The driver guarantees the latter only
    /// when `Config::wait_for_dma` is set or the channel stalls the CPU for
    /// the duration of a transfer (as on the GBA).
    pub unsafe fn new() -> Self {
        Self { _private: () }
    }

    fn write(address: usize, value: u32) {
        // SAFETY: guaranteed by the constructor's contract.
        unsafe { ptr::write_volatile(address as *mut u32, value) }
    }
}

impl DmaChannel for Dma3Channel {
    fn start(&mut self, bus: &mut dyn RegisterBus, transfer: DmaTransfer<'_>) {
        let port = bus.address_of(Register::Data);
        let memory = transfer.memory_address();
        let count = transfer.halfwords() as u32 & 0xFFFF;
        let (source, dest, fixed) = match transfer {
            DmaTransfer::FromPort(_) => (port, memory, DMA_SOURCE_FIXED),
            DmaTransfer::ToPort(_) => (memory, port, DMA_DEST_FIXED),
        };
        Self::write(ADDRESS_DMA3_SOURCE, source as u32);
        Self::write(ADDRESS_DMA3_DEST, dest as u32);
        // Writing the control word with the enable bit kicks off the transfer.
        Self::write(ADDRESS_DMA3_CONTROL, count | DMA_16 | DMA_ENABLE | fixed);
    }

    fn is_busy(&mut self) -> bool {
        // SAFETY: guaranteed by the constructor's contract.
        let control = unsafe { ptr::read_volatile(ADDRESS_DMA3_CONTROL as *const u32) };
        control & DMA_ENABLE != 0
    }
}
