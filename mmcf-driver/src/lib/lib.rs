//! Driver for the Max Media Player CompactFlash adapter: sector reads and
//! writes over a memory-mapped ATA-style register set, with a software model
//! of the adapter for running off-target.

mod bus;
mod command;
mod config;
mod dma;
mod driver;
mod error;
mod interface;
mod poll;
pub mod sim;
mod transfer;

// Public API.
pub use bus::*;
pub use config::{Config, DEFAULT_TIMEOUT, TransferMode};
pub use dma::{Dma3Channel, DmaChannel, DmaTransfer, NoDma};
pub use driver::{CfDriver, DriverState};
pub use error::{CfError, CfResult, Probe, Wait};
pub use interface::*;
pub use transfer::Alignment;

/// Send log output to the test harness. Safe to call from every test.
#[cfg(test)]
pub(crate) fn init_test_logging() {
    let _ = simplelog::TestLogger::init(log::LevelFilter::Trace,
                                        simplelog::Config::default());
}
