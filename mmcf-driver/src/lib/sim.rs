//! A software model of the adapter, so the driver can run off-target: against
//! sectors in memory for tests, or against an image file from the CLI.

mod sim_card;
mod sim_dma;
mod sim_store;

pub use sim_card::*;
pub use sim_dma::SimDma;
pub use sim_store::{ImageStore, MemoryStore, SectorStore};
