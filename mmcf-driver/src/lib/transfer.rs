//! The multi-sector transfer loop and the three ways of moving a sector's
//! 256 words between the data port and memory.
//!
//! Buffers are plain byte slices. The data port is 16 bits wide, so each
//! word covers two consecutive bytes: on the aligned paths a word is stored
//! in native byte order, exactly as a 16-bit store to memory would leave it;
//! on the odd-buffer path it is split explicitly, low byte first. The two
//! agree on little-endian targets, which is every target this adapter plugs
//! into.

use log::{debug, trace, warn};

use crate::bus::{COMMAND_READ, COMMAND_WRITE, MAX_SECTORS, Register, RegisterBus,
                 SECTOR_SIZE, WORDS_PER_SECTOR};
use crate::command::issue_command;
use crate::config::{Config, TransferMode};
use crate::dma::{DmaChannel, DmaTransfer, NoDma};
use crate::driver::DriverState;
use crate::error::{CfError, CfResult};
use crate::poll::{wait_dma_idle, wait_for_card, wait_until_ready};

/// Alignment of a buffer's start address, taken from its low bit. Every
/// sector boundary inside the buffer has the same alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Even,
    Odd,
}

impl Alignment {
    pub fn of(buf: &[u8]) -> Self {
        if buf.as_ptr() as usize & 1 == 0 {
            Alignment::Even
        } else {
            Alignment::Odd
        }
    }
}

/// Build a data port word from two buffer bytes.
#[inline]
pub fn compose_word(low: u8, high: u8) -> u16 {
    u16::from(low) | (u16::from(high) << 8)
}

/// Split a data port word into its low and high bytes.
#[inline]
pub fn split_word(word: u16) -> (u8, u8) {
    (word as u8, (word >> 8) as u8)
}

/// The strategy a driver moves sector data with. Fixed at construction.
pub enum TransferStrategy<D = NoDma> {
    Dma(D),
    UnalignedSafe,
    Direct,
}

impl<D: DmaChannel> TransferStrategy<D> {
    pub fn mode(&self) -> TransferMode {
        match self {
            TransferStrategy::Dma(_) => TransferMode::Dma,
            TransferStrategy::UnalignedSafe => TransferMode::UnalignedSafe,
            TransferStrategy::Direct => TransferMode::Direct,
        }
    }

    /// Can this strategy move data to or from a buffer of this alignment?
    pub fn accepts(&self, alignment: Alignment) -> bool {
        alignment == Alignment::Even || matches!(self, TransferStrategy::UnalignedSafe)
    }

    /// Move one sector from the data port into `dest`.
    fn read_sector<B: RegisterBus>(&mut self, bus: &mut B, alignment: Alignment,
                                   dest: &mut [u8]) {
        debug_assert_eq!(dest.len(), SECTOR_SIZE);
        match self {
            TransferStrategy::Dma(dma) => dma.start(bus, DmaTransfer::FromPort(dest)),
            TransferStrategy::UnalignedSafe if alignment == Alignment::Odd => {
                for pair in dest.chunks_exact_mut(2) {
                    let (low, high) = split_word(bus.load(Register::Data));
                    pair[0] = low;
                    pair[1] = high;
                }
            }
            TransferStrategy::UnalignedSafe | TransferStrategy::Direct => {
                for pair in dest.chunks_exact_mut(2) {
                    pair.copy_from_slice(&bus.load(Register::Data).to_ne_bytes());
                }
            }
        }
    }

    /// Move one sector from `src` to the data port.
    fn write_sector<B: RegisterBus>(&mut self, bus: &mut B, alignment: Alignment,
                                    src: &[u8]) {
        debug_assert_eq!(src.len(), SECTOR_SIZE);
        match self {
            TransferStrategy::Dma(dma) => dma.start(bus, DmaTransfer::ToPort(src)),
            TransferStrategy::UnalignedSafe if alignment == Alignment::Odd => {
                for pair in src.chunks_exact(2) {
                    bus.store(Register::Data, compose_word(pair[0], pair[1]));
                }
            }
            TransferStrategy::UnalignedSafe | TransferStrategy::Direct => {
                for pair in src.chunks_exact(2) {
                    bus.store(Register::Data, u16::from_ne_bytes([pair[0], pair[1]]));
                }
            }
        }
    }

    /// Called once the sector loop is over. DMA transfers may still be in
    /// flight; the buffer is only safe to hand back once they are done.
    fn finish(&mut self, config: &Config) -> CfResult<()> {
        match self {
            TransferStrategy::Dma(dma) if config.wait_for_dma => {
                wait_dma_idle(dma, config.timeout)
            }
            _ => Ok(()),
        }
    }
}

/// Check a request before touching any register.
fn validate<D: DmaChannel>(strategy: &TransferStrategy<D>, count: u32,
                           buf: &[u8]) -> CfResult<Alignment> {
    if count == 0 || count > MAX_SECTORS {
        return Err(CfError::InvalidSectorCount(count));
    }
    let needed = count as usize * SECTOR_SIZE;
    if buf.len() < needed {
        return Err(CfError::BufferTooSmall { needed, actual: buf.len() });
    }
    let alignment = Alignment::of(buf);
    if !strategy.accepts(alignment) {
        return Err(CfError::MisalignedBuffer);
    }
    Ok(alignment)
}

/// Get the card idle and issue the command. On failure no command has been
/// issued.
fn begin<B: RegisterBus>(bus: &mut B, config: &Config, state: &mut DriverState,
                         opcode: u16, lba: u32, count: u32) -> CfResult<()> {
    *state = DriverState::WaitingForCard;
    if let Err(e) = wait_for_card(bus, config.timeout) {
        *state = DriverState::TimedOut(e);
        return Err(e);
    }
    *state = DriverState::Idle;
    issue_command(bus, opcode, lba, count);
    *state = DriverState::CommandIssued { opcode };
    Ok(())
}

/// Wait for the card to be ready for the `n`th sector.
fn await_sector<B: RegisterBus>(bus: &mut B, config: &Config, state: &mut DriverState,
                                lba: u32, n: u32, count: u32) -> CfResult<()> {
    if let Err(e) = wait_until_ready(bus, config.timeout, n) {
        // Worth a look when debugging; the error kind is all callers get.
        let error_register = bus.load(Register::Error);
        warn!("{} (LBA {}, error register {:#04X}; {} of {} sectors done)",
              e, lba as u64 + n as u64, error_register, n, count);
        *state = DriverState::TimedOut(e);
        return Err(e);
    }
    *state = DriverState::SectorReady { sector: n, of: count };
    trace!("Card ready for sector {} of {}.", n, count);
    Ok(())
}

/// Read `count` sectors starting at `lba` into `buf`. On a timeout the
/// sectors before the failing one have been written to `buf` and the rest
/// are untouched.
pub(crate) fn read_sectors<B, D>(bus: &mut B, strategy: &mut TransferStrategy<D>,
                                 config: &Config, state: &mut DriverState,
                                 lba: u32, count: u32, buf: &mut [u8]) -> CfResult<()>
    where B: RegisterBus,
          D: DmaChannel
{
    let alignment = validate(strategy, count, buf)?;
    begin(bus, config, state, COMMAND_READ, lba, count)?;

    let sectors = buf[..count as usize * SECTOR_SIZE].chunks_exact_mut(SECTOR_SIZE);
    for (n, sector) in (0..count).zip(sectors) {
        await_sector(bus, config, state, lba, n, count)?;
        strategy.read_sector(bus, alignment, sector);
    }
    complete(strategy, config, state)?;

    debug!("Read {} sector(s) from LBA {} ({:?}, {:?} buffer, {} words).",
           count, lba, strategy.mode(), alignment, count as usize * WORDS_PER_SECTOR);
    Ok(())
}

/// Write `count` sectors from `buf` starting at `lba`. On a timeout the
/// sectors before the failing one have reached the card.
pub(crate) fn write_sectors<B, D>(bus: &mut B, strategy: &mut TransferStrategy<D>,
                                  config: &Config, state: &mut DriverState,
                                  lba: u32, count: u32, buf: &[u8]) -> CfResult<()>
    where B: RegisterBus,
          D: DmaChannel
{
    let alignment = validate(strategy, count, buf)?;
    begin(bus, config, state, COMMAND_WRITE, lba, count)?;

    let sectors = buf[..count as usize * SECTOR_SIZE].chunks_exact(SECTOR_SIZE);
    for (n, sector) in (0..count).zip(sectors) {
        await_sector(bus, config, state, lba, n, count)?;
        strategy.write_sector(bus, alignment, sector);
    }
    complete(strategy, config, state)?;

    debug!("Wrote {} sector(s) to LBA {} ({:?}, {:?} buffer, {} words).",
           count, lba, strategy.mode(), alignment, count as usize * WORDS_PER_SECTOR);
    Ok(())
}

/// Let any DMA work drain and record the outcome.
fn complete<D: DmaChannel>(strategy: &mut TransferStrategy<D>, config: &Config,
                           state: &mut DriverState) -> CfResult<()> {
    match strategy.finish(config) {
        Ok(()) => {
            *state = DriverState::Done;
            Ok(())
        }
        Err(e) => {
            warn!("{}", e);
            *state = DriverState::TimedOut(e);
            Err(e)
        }
    }
}
