// Physical register addresses.
pub const ADDRESS_STATUS: usize = 0x080E_0000;  // Status (read) / command (write).
pub const ADDRESS_ERROR: usize = 0x0802_0000;   // Errors / features.
pub const ADDRESS_SECTOR_COUNT: usize = 0x0804_0000;
pub const ADDRESS_LBA_1: usize = 0x0806_0000;   // Sector address bits 0-7.
pub const ADDRESS_LBA_2: usize = 0x0808_0000;   // Bits 8-15.
pub const ADDRESS_LBA_3: usize = 0x080A_0000;   // Bits 16-23.
pub const ADDRESS_LBA_4: usize = 0x080C_0000;   // Bits 24-27 | LBA mode.
pub const ADDRESS_DATA: usize = 0x0900_0000;    // 16-bit data port.

// Status register values.
pub const STATUS_REMOVED: u16 = 0x00;
pub const STATUS_ERROR: u16 = 0x01;
pub const STATUS_DRQ: u16 = 0x08;
pub const STATUS_INSERTED: u16 = 0x50;
pub const STATUS_READY: u16 = STATUS_INSERTED | STATUS_DRQ;
pub const STATUS_BUSY: u16 = 0x80;

// Commands.
pub const COMMAND_READ: u16 = 0x20;
pub const COMMAND_WRITE: u16 = 0x30;
/// OR'd into LBA4 to select logical block addressing.
pub const LBA_MODE: u16 = 0xE0;

/// Bytes in one sector.
pub const SECTOR_SIZE: usize = 512;
/// 16-bit words in one sector.
pub const WORDS_PER_SECTOR: usize = SECTOR_SIZE / 2;
/// Largest request a single command can carry; encoded as 0.
pub const MAX_SECTORS: u32 = 256;

/// The registers of the CF adapter. Status and command share an address:
/// loads see the status, stores issue a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Status,
    Error,
    SectorCount,
    Lba1,
    Lba2,
    Lba3,
    Lba4,
    Data,
}

impl Register {
    /// The physical address this register is mapped at.
    pub const fn address(self) -> usize {
        match self {
            Register::Status => ADDRESS_STATUS,
            Register::Error => ADDRESS_ERROR,
            Register::SectorCount => ADDRESS_SECTOR_COUNT,
            Register::Lba1 => ADDRESS_LBA_1,
            Register::Lba2 => ADDRESS_LBA_2,
            Register::Lba3 => ADDRESS_LBA_3,
            Register::Lba4 => ADDRESS_LBA_4,
            Register::Data => ADDRESS_DATA,
        }
    }
}

/// Access to the register set. Every access is exactly 16 bits wide and
/// nothing is cached: loads may have side effects (the data port advances),
/// so they take `&mut self`.
pub trait RegisterBus {
    fn load(&mut self, register: Register) -> u16;
    fn store(&mut self, register: Register, value: u16);

    /// The address a DMA engine should use for `register`.
    fn address_of(&self, register: Register) -> usize {
        register.address()
    }
}

impl<B: RegisterBus + ?Sized> RegisterBus for &mut B {
    fn load(&mut self, register: Register) -> u16 {
        (**self).load(register)
    }

    fn store(&mut self, register: Register, value: u16) {
        (**self).store(register, value)
    }

    fn address_of(&self, register: Register) -> usize {
        (**self).address_of(register)
    }
}
