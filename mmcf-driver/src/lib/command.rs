use log::debug;

use crate::bus::{LBA_MODE, MAX_SECTORS, Register, RegisterBus};

/// The value the sector count register takes for a request of `count`
/// sectors: 256 does not fit in a byte and is sent as 0.
pub fn encode_sector_count(count: u32) -> u16 {
    debug_assert!((1..=MAX_SECTORS).contains(&count));
    if count < MAX_SECTORS { count as u16 } else { 0 }
}

/// The four LBA register values for `lba`, in register order. Only 28 bits
/// are addressable; the top nibble of LBA4 selects LBA mode.
pub fn encode_lba(lba: u32) -> [u16; 4] {
    [
        (lba & 0xFF) as u16,
        ((lba >> 8) & 0xFF) as u16,
        ((lba >> 16) & 0xFF) as u16,
        ((lba >> 24) & 0x0F) as u16 | LBA_MODE,
    ]
}

/// Latch the count and address, then issue `opcode`. The order matters: the
/// command register triggers execution, so it must be written last.
/// The caller has already checked `count`.
pub fn issue_command<B>(bus: &mut B, opcode: u16, lba: u32, count: u32)
    where B: RegisterBus + ?Sized
{
    debug!("Command {:#04X}: {} sector(s) from LBA {}.", opcode, count, lba);
    let [lba_1, lba_2, lba_3, lba_4] = encode_lba(lba);
    bus.store(Register::SectorCount, encode_sector_count(count));
    bus.store(Register::Lba1, lba_1);
    bus.store(Register::Lba2, lba_2);
    bus.store(Register::Lba3, lba_3);
    bus.store(Register::Lba4, lba_4);
    bus.store(Register::Status, opcode);
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::bus::COMMAND_READ;

    /// Records every store.
    #[derive(Default)]
    struct RecordingBus {
        stores: Vec<(Register, u16)>,
    }

    impl RegisterBus for RecordingBus {
        fn load(&mut self, register: Register) -> u16 {
            panic!("Unexpected load from {:?}", register);
        }

        fn store(&mut self, register: Register, value: u16) {
            self.stores.push((register, value));
        }
    }

    #[test]
    fn test_sector_count_encoding() {
        assert_eq!(encode_sector_count(1), 1);
        assert_eq!(encode_sector_count(255), 255);
        assert_eq!(encode_sector_count(256), 0);
    }

    #[test]
    fn test_lba_encoding() {
        assert_eq!(encode_lba(0), [0, 0, 0, 0xE0]);
        assert_eq!(encode_lba(0x0123_4567), [0x67, 0x45, 0x23, 0xE1]);
        // Bits above 27 cannot be addressed and are dropped.
        assert_eq!(encode_lba(0xFFFF_FFFF), [0xFF, 0xFF, 0xFF, 0xEF]);
    }

    #[test]
    fn test_write_order() {
        let mut bus = RecordingBus::default();
        issue_command(&mut bus, COMMAND_READ, 0x0ABC_DEF0, 256);
        assert_eq!(bus.stores, vec![
            (Register::SectorCount, 0),
            (Register::Lba1, 0xF0),
            (Register::Lba2, 0xDE),
            (Register::Lba3, 0xBC),
            (Register::Lba4, 0xEA),
            (Register::Status, 0x20),
        ]);
    }
}
