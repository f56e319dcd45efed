//! Bounded busy-waits on the status register. There are no interrupts on
//! this bus, so every wait spins; the bound counts samples rather than time,
//! which keeps a given timeout deterministic for a given bus speed.

use log::warn;
use std::hint;

use crate::bus::{Register, RegisterBus, STATUS_BUSY, STATUS_INSERTED, STATUS_READY};
use crate::dma::DmaChannel;
use crate::error::{CfError, CfResult, Wait};

/// Sample `condition` until it holds, at most `bound` times. Returns whether
/// it held.
pub fn poll_until<F>(bound: u32, mut condition: F) -> bool
    where F: FnMut() -> bool
{
    for _ in 0..bound {
        if condition() {
            return true;
        }
        hint::spin_loop();
    }
    false
}

fn wait_for<B, F>(bus: &mut B, timeout: u32, wait: Wait, mut condition: F) -> CfResult<()>
    where B: RegisterBus + ?Sized,
          F: FnMut(u16) -> bool
{
    if poll_until(timeout, || condition(bus.load(Register::Status))) {
        Ok(())
    } else {
        Err(CfError::Timeout(wait))
    }
}

/// Wait for the card to finish its previous command.
pub fn wait_while_busy<B>(bus: &mut B, timeout: u32) -> CfResult<()>
    where B: RegisterBus + ?Sized
{
    wait_for(bus, timeout, Wait::Busy, |status| status & STATUS_BUSY == 0)
}

/// Wait for the card to show any of the inserted bits.
pub fn wait_until_inserted<B>(bus: &mut B, timeout: u32) -> CfResult<()>
    where B: RegisterBus + ?Sized
{
    wait_for(bus, timeout, Wait::Inserted, |status| status & STATUS_INSERTED != 0)
}

/// Wait for the card to be ready to move the given sector of a request.
pub fn wait_until_ready<B>(bus: &mut B, timeout: u32, sector: u32) -> CfResult<()>
    where B: RegisterBus + ?Sized
{
    wait_for(bus, timeout, Wait::Ready { sector }, |status| status & 0xFF == STATUS_READY)
}

/// Wait for a DMA channel to finish its transfer.
pub fn wait_dma_idle<D>(dma: &mut D, timeout: u32) -> CfResult<()>
    where D: DmaChannel + ?Sized
{
    if poll_until(timeout, || !dma.is_busy()) {
        Ok(())
    } else {
        Err(CfError::Timeout(Wait::DmaIdle))
    }
}

/// Bring the card to idle: wait out any previous command, then wait for it
/// to report inserted. Only the second wait decides the outcome; a card that
/// stays busy is given the chance to show inserted anyway.
pub fn wait_for_card<B>(bus: &mut B, timeout: u32) -> CfResult<()>
    where B: RegisterBus + ?Sized
{
    if let Err(e) = wait_while_busy(bus, timeout) {
        warn!("{} Continuing.", e);
    }
    wait_until_inserted(bus, timeout).map_err(|e| {
        warn!("{}", e);
        e
    })
}
