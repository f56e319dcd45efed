mod dma_gba;
mod dma_interface;

pub use dma_gba::Dma3Channel;
pub use dma_interface::*;
