use log::{debug, info};

use crate::bus::{Register, RegisterBus, STATUS_INSERTED};
use crate::config::{Config, TransferMode};
use crate::dma::{DmaChannel, NoDma};
use crate::error::{CfError, CfResult, Probe};
use crate::poll::wait_for_card;
use crate::transfer::{self, TransferStrategy};

/// Where the driver last got to. Every step forward is gated by a bounded
/// poll; nothing arrives asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing has been asked of the card yet.
    Unknown,
    /// Waiting for the card to finish its previous command and show up.
    WaitingForCard,
    /// The card is present and idle.
    Idle,
    /// Count, address and command have been written.
    CommandIssued { opcode: u16 },
    /// The card was ready for `sector` (zero-based) of an `of`-sector request.
    SectorReady { sector: u32, of: u32 },
    /// The last request completed.
    Done,
    /// The last operation gave up.
    TimedOut(CfError),
}

/// Driver for the Max Media Player CompactFlash adapter.
///
/// Every operation takes `&mut self`: a command and its per-sector polling
/// must not interleave with anything else on the bus, so sharing a driver
/// between threads needs a lock around the whole driver.
pub struct CfDriver<B, D = NoDma> {
    bus: B,
    strategy: TransferStrategy<D>,
    config: Config,
    state: DriverState,
}

impl<B: RegisterBus> CfDriver<B> {
    /// Construct a driver that moves data by CPU copies. Fails if the
    /// configuration asks for DMA.
    pub fn new(bus: B, config: Config) -> CfResult<Self> {
        let strategy = match config.mode {
            TransferMode::UnalignedSafe => TransferStrategy::UnalignedSafe,
            TransferMode::Direct => TransferStrategy::Direct,
            TransferMode::Dma => return Err(CfError::NoDmaChannel),
        };
        Ok(Self::from_parts(bus, strategy, config))
    }
}

impl<B: RegisterBus, D: DmaChannel> CfDriver<B, D> {
    /// Construct a driver that hands sector transfers to `dma`.
    pub fn with_dma(bus: B, dma: D, config: Config) -> Self {
        let config = Config { mode: TransferMode::Dma, ..config };
        Self::from_parts(bus, TransferStrategy::Dma(dma), config)
    }

    fn from_parts(bus: B, strategy: TransferStrategy<D>, config: Config) -> Self {
        debug!("Driver using {:?} transfers, timeout {}.", strategy.mode(), config.timeout);
        Self {
            bus,
            strategy,
            config,
            state: DriverState::Unknown,
        }
    }

    /// Probe for the adapter. LBA1 is an 8-bit read/write register: it must
    /// hold the inverse of its current value, and must not hold a full
    /// 16-bit pattern. There is no handshake, so this is only a heuristic.
    pub fn start_up(&mut self) -> CfResult<()> {
        let inverted = !self.bus.load(Register::Lba1) & 0xFF;
        self.bus.store(Register::Lba1, inverted);
        if self.bus.load(Register::Lba1) != inverted {
            debug!("LBA1 did not keep its inverted value.");
            return Err(CfError::ProbeFailed(Probe::Inversion));
        }

        self.bus.store(Register::Lba1, 0xAA55);
        if self.bus.load(Register::Lba1) == 0xAA55 {
            debug!("LBA1 kept a 16-bit value.");
            return Err(CfError::ProbeFailed(Probe::Width));
        }

        info!("CompactFlash adapter found.");
        Ok(())
    }

    /// Is a card inserted? Writes the inserted pattern to the command
    /// register and checks whether the status reflects it, so this disturbs
    /// the card like any other command.
    pub fn is_inserted(&mut self) -> bool {
        self.bus.store(Register::Status, STATUS_INSERTED);
        let inserted = self.bus.load(Register::Status) & 0xFF == STATUS_INSERTED;
        debug!("Card {}.", if inserted { "inserted" } else { "not inserted" });
        inserted
    }

    /// Read `count` (1 to 256) sectors from `lba` into the first
    /// `count * 512` bytes of `buf`.
    ///
    /// On failure the buffer may hold a mix of new and stale sectors.
    pub fn read_sectors(&mut self, lba: u32, count: u32, buf: &mut [u8]) -> CfResult<()> {
        transfer::read_sectors(&mut self.bus, &mut self.strategy, &self.config,
                               &mut self.state, lba, count, buf)
    }

    /// Write `count` (1 to 256) sectors from the first `count * 512` bytes of
    /// `buf` to `lba`.
    ///
    /// On failure some leading sectors may already have been written.
    pub fn write_sectors(&mut self, lba: u32, count: u32, buf: &[u8]) -> CfResult<()> {
        transfer::write_sectors(&mut self.bus, &mut self.strategy, &self.config,
                                &mut self.state, lba, count, buf)
    }

    /// Bring the card back to idle.
    pub fn clear_status(&mut self) -> CfResult<()> {
        self.state = DriverState::WaitingForCard;
        match wait_for_card(&mut self.bus, self.config.timeout) {
            Ok(()) => {
                self.state = DriverState::Idle;
                Ok(())
            }
            Err(e) => {
                self.state = DriverState::TimedOut(e);
                Err(e)
            }
        }
    }

    /// Leave the card idle for whoever comes next.
    pub fn shutdown(&mut self) -> CfResult<()> {
        info!("Shutting down CompactFlash driver.");
        self.clear_status()
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> TransferMode {
        self.strategy.mode()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
