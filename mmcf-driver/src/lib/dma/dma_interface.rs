use crate::bus::RegisterBus;

/// One sector's worth of DMA work. The data port end is always fixed
/// (non-incrementing) and the memory end always increments; the unit is a
/// 16-bit halfword, and the count is half the slice length.
pub enum DmaTransfer<'a> {
    /// Data port to memory.
    FromPort(&'a mut [u8]),
    /// Memory to data port.
    ToPort(&'a [u8]),
}

impl DmaTransfer<'_> {
    /// Number of halfwords moved.
    pub fn halfwords(&self) -> usize {
        match self {
            DmaTransfer::FromPort(buf) => buf.len() / 2,
            DmaTransfer::ToPort(buf) => buf.len() / 2,
        }
    }

    /// Address of the memory end.
    pub fn memory_address(&self) -> usize {
        match self {
            DmaTransfer::FromPort(buf) => buf.as_ptr() as usize,
            DmaTransfer::ToPort(buf) => buf.as_ptr() as usize,
        }
    }
}

/// A DMA channel that can move halfwords between the data port and memory.
pub trait DmaChannel {
    /// Program and start a transfer. The memory end must be 2-byte aligned.
    fn start(&mut self, bus: &mut dyn RegisterBus, transfer: DmaTransfer<'_>);

    /// Is a transfer still in flight?
    fn is_busy(&mut self) -> bool;
}

/// Placeholder channel for drivers built without DMA. It cannot be
/// constructed, so a driver holding one never takes the DMA path.
#[derive(Debug)]
pub enum NoDma {}

impl DmaChannel for NoDma {
    fn start(&mut self, _bus: &mut dyn RegisterBus, _transfer: DmaTransfer<'_>) {
        match *self {}
    }

    fn is_busy(&mut self) -> bool {
        match *self {}
    }
}
