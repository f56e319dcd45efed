use log::trace;

use crate::bus::{Register, RegisterBus};
use crate::dma::{DmaChannel, DmaTransfer};

/// A DMA channel that moves the data at once through the bus it is given,
/// then claims to be busy for a configurable number of polls.
#[derive(Debug, Default)]
pub struct SimDma {
    busy_polls: u32,
    remaining: u32,
    transfers: usize,
}

impl SimDma {
    pub fn new() -> Self {
        Self::default()
    }

    /// After each transfer, report busy this many times. `u32::MAX` never
    /// goes idle in practice.
    pub fn set_busy_polls(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Transfers started so far.
    pub fn transfers(&self) -> usize {
        self.transfers
    }
}

impl DmaChannel for SimDma {
    fn start(&mut self, bus: &mut dyn RegisterBus, transfer: DmaTransfer<'_>) {
        debug_assert_eq!(transfer.memory_address() & 1, 0);
        trace!("DMA: {} halfwords between {:#010X} and {:#010X}.",
               transfer.halfwords(), bus.address_of(Register::Data),
               transfer.memory_address());
        match transfer {
            DmaTransfer::FromPort(dest) => {
                for pair in dest.chunks_exact_mut(2) {
                    pair.copy_from_slice(&bus.load(Register::Data).to_ne_bytes());
                }
            }
            DmaTransfer::ToPort(src) => {
                for pair in src.chunks_exact(2) {
                    bus.store(Register::Data, u16::from_ne_bytes([pair[0], pair[1]]));
                }
            }
        }
        self.transfers += 1;
        self.remaining = self.busy_polls;
    }

    fn is_busy(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        if self.remaining != u32::MAX {
            self.remaining -= 1;
        }
        true
    }
}
