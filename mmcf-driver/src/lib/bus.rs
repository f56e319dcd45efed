mod bus_interface;
mod bus_mmio;

pub use bus_interface::*;
pub use bus_mmio::MmioBus;
