//! The fixed contract a generic disc layer calls through. Failures of every
//! kind collapse to `false`; the driver's own methods keep the detail.

use log::debug;

use crate::bus::RegisterBus;
use crate::dma::DmaChannel;
use crate::driver::CfDriver;
use crate::error::CfResult;

/// Four-character device type tag.
pub type DeviceType = [u8; 4];

pub const DEVICE_TYPE_MMCF: DeviceType = *b"MMCF";

// Feature flags.
pub const FEATURE_MEDIUM_CAN_READ: u32 = 0x01;
pub const FEATURE_MEDIUM_CAN_WRITE: u32 = 0x02;
pub const FEATURE_SLOT_GBA: u32 = 0x10;

pub trait DiscInterface {
    fn device_type(&self) -> DeviceType;
    fn features(&self) -> u32;

    fn start_up(&mut self) -> bool;
    fn is_inserted(&mut self) -> bool;
    fn read_sectors(&mut self, lba: u32, count: u32, buffer: &mut [u8]) -> bool;
    fn write_sectors(&mut self, lba: u32, count: u32, buffer: &[u8]) -> bool;
    fn clear_status(&mut self) -> bool;
    fn shutdown(&mut self) -> bool;
}

/// Log the reason before it is thrown away.
fn succeeded(result: CfResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!("Reporting failure: {}", e);
            false
        }
    }
}

impl<B: RegisterBus, D: DmaChannel> DiscInterface for CfDriver<B, D> {
    fn device_type(&self) -> DeviceType {
        DEVICE_TYPE_MMCF
    }

    fn features(&self) -> u32 {
        FEATURE_MEDIUM_CAN_READ | FEATURE_MEDIUM_CAN_WRITE | FEATURE_SLOT_GBA
    }

    fn start_up(&mut self) -> bool {
        succeeded(CfDriver::start_up(self))
    }

    fn is_inserted(&mut self) -> bool {
        CfDriver::is_inserted(self)
    }

    fn read_sectors(&mut self, lba: u32, count: u32, buffer: &mut [u8]) -> bool {
        succeeded(CfDriver::read_sectors(self, lba, count, buffer))
    }

    fn write_sectors(&mut self, lba: u32, count: u32, buffer: &[u8]) -> bool {
        succeeded(CfDriver::write_sectors(self, lba, count, buffer))
    }

    fn clear_status(&mut self) -> bool {
        succeeded(CfDriver::clear_status(self))
    }

    fn shutdown(&mut self) -> bool {
        succeeded(CfDriver::shutdown(self))
    }
}
