use log::{debug, warn};

use crate::bus::{COMMAND_READ, COMMAND_WRITE, MAX_SECTORS, Register, RegisterBus,
                 SECTOR_SIZE, STATUS_BUSY, STATUS_ERROR, STATUS_INSERTED, STATUS_READY,
                 STATUS_REMOVED};
use super::sim_store::SectorStore;

/// Error register bit: sector not found.
pub const ERROR_ID_NOT_FOUND: u16 = 0x10;
/// Error register bit: uncorrectable data error.
pub const ERROR_UNCORRECTABLE: u16 = 0x40;
/// Error register bit: command aborted.
pub const ERROR_ABORTED: u16 = 0x04;

/// Misbehaviour a simulated card can be told to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Accept commands but never become ready for data.
    NeverReady,
    /// Become ready for the first `n` sectors of each request, then stop.
    StallAfter(u32),
    /// Report busy for the next `n` status reads.
    BusyFor(u32),
    /// LBA1 ignores stores and reads as open bus, as if no adapter were
    /// fitted.
    NoProbeRegister,
    /// LBA1 keeps all 16 bits of a store.
    WideProbeRegister,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Reading { lba: u32, count: u32, done: u32 },
    Writing { lba: u32, count: u32, done: u32 },
    Failed,
}

/// A CompactFlash adapter behind a register bus, holding its sectors in a
/// [`SectorStore`]. Every register access happens synchronously, so a test
/// sees exactly the sequence of loads and stores the driver made.
pub struct SimulatedCard<S> {
    store: S,
    inserted: bool,
    faults: Vec<Fault>,
    busy_reads: u32,

    sector_count: u16,
    lba: [u16; 4],
    error: u16,
    phase: Phase,
    buffer: Vec<u8>,
    position: usize,

    writes: Vec<(Register, u16)>,
    last_command: Option<u16>,
    status_reads: usize,
    status_reads_since_command: usize,
    data_words_read: usize,
    data_words_written: usize,
}

impl<S: SectorStore> SimulatedCard<S> {
    /// An inserted, idle card.
    pub fn new(store: S) -> Self {
        Self {
            store,
            inserted: true,
            faults: vec![],
            busy_reads: 0,
            sector_count: 0,
            lba: [0; 4],
            error: 0,
            phase: Phase::Idle,
            buffer: vec![0; SECTOR_SIZE],
            position: 0,
            writes: vec![],
            last_command: None,
            status_reads: 0,
            status_reads_since_command: 0,
            data_words_read: 0,
            data_words_written: 0,
        }
    }

    /// The sectors behind the card.
    pub fn backing(&self) -> &S {
        &self.store
    }

    pub fn backing_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn set_inserted(&mut self, inserted: bool) {
        self.inserted = inserted;
    }

    pub fn inject(&mut self, fault: Fault) {
        match fault {
            Fault::BusyFor(n) => self.busy_reads = n,
            _ => self.faults.push(fault),
        }
    }

    pub fn clear_faults(&mut self) {
        self.faults.clear();
        self.busy_reads = 0;
    }

    /// Abandon any command in progress.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.error = 0;
        self.position = 0;
    }

    /// Every store except those to the data port, in order.
    pub fn writes(&self) -> &[(Register, u16)] {
        &self.writes
    }

    /// The last read or write command issued.
    pub fn last_command(&self) -> Option<u16> {
        self.last_command
    }

    pub fn status_reads(&self) -> usize {
        self.status_reads
    }

    pub fn status_reads_since_command(&self) -> usize {
        self.status_reads_since_command
    }

    pub fn data_words_read(&self) -> usize {
        self.data_words_read
    }

    pub fn data_words_written(&self) -> usize {
        self.data_words_written
    }

    fn has_fault(&self, fault: Fault) -> bool {
        self.faults.contains(&fault)
    }

    /// Will the card offer sector `done` of the current request?
    fn offers(&self, done: u32) -> bool {
        !self.faults.iter().any(|fault| match *fault {
            Fault::NeverReady => true,
            Fault::StallAfter(n) => done >= n,
            _ => false,
        })
    }

    fn status(&self) -> u16 {
        if !self.inserted {
            return STATUS_REMOVED;
        }
        if self.busy_reads > 0 {
            return STATUS_BUSY;
        }
        match self.phase {
            Phase::Idle => STATUS_INSERTED,
            Phase::Reading { done, .. } | Phase::Writing { done, .. } => {
                if self.offers(done) { STATUS_READY } else { STATUS_INSERTED }
            }
            Phase::Failed => STATUS_INSERTED | STATUS_ERROR,
        }
    }

    fn fail(&mut self, error: u16) {
        self.error = error;
        self.phase = Phase::Failed;
    }

    fn command(&mut self, opcode: u16) {
        if !self.inserted {
            return;
        }
        self.last_command = Some(opcode);
        self.status_reads_since_command = 0;
        self.position = 0;
        self.error = 0;

        let count = match self.sector_count & 0xFF {
            0 => MAX_SECTORS,
            n => n as u32,
        };
        let lba = (self.lba[0] & 0xFF) as u32
            | ((self.lba[1] & 0xFF) as u32) << 8
            | ((self.lba[2] & 0xFF) as u32) << 16
            | ((self.lba[3] & 0x0F) as u32) << 24;
        if self.lba[3] & 0x40 == 0 {
            warn!("Simulated card only supports LBA addressing.");
            return self.fail(ERROR_ABORTED);
        }
        if lba as u64 + count as u64 > self.store.sector_count() as u64 {
            debug!("Simulated card: {} sector(s) from LBA {} is out of range.", count, lba);
            return self.fail(ERROR_ID_NOT_FOUND);
        }

        if opcode == COMMAND_READ {
            self.phase = Phase::Reading { lba, count, done: 0 };
            self.fetch(lba);
        } else {
            self.phase = Phase::Writing { lba, count, done: 0 };
        }
    }

    /// Load sector `lba` into the buffer.
    fn fetch(&mut self, lba: u32) {
        if let Err(e) = self.store.read_sector(lba, &mut self.buffer) {
            warn!("Simulated card failed to read sector {}: {}", lba, e);
            self.fail(ERROR_UNCORRECTABLE);
        }
    }

    fn load_data(&mut self) -> u16 {
        let Phase::Reading { lba, count, done } = self.phase else {
            return 0xFFFF;
        };
        let word = u16::from_le_bytes([self.buffer[self.position],
                                       self.buffer[self.position + 1]]);
        self.position += 2;
        self.data_words_read += 1;
        if self.position == SECTOR_SIZE {
            self.position = 0;
            let done = done + 1;
            if done == count {
                self.phase = Phase::Idle;
            } else {
                self.phase = Phase::Reading { lba, count, done };
                self.fetch(lba + done);
            }
        }
        word
    }

    fn store_data(&mut self, value: u16) {
        let Phase::Writing { lba, count, done } = self.phase else {
            return;
        };
        self.buffer[self.position..self.position + 2].copy_from_slice(&value.to_le_bytes());
        self.position += 2;
        self.data_words_written += 1;
        if self.position == SECTOR_SIZE {
            self.position = 0;
            if let Err(e) = self.store.write_sector(lba + done, &self.buffer) {
                warn!("Simulated card failed to write sector {}: {}", lba + done, e);
                return self.fail(ERROR_UNCORRECTABLE);
            }
            let done = done + 1;
            self.phase = if done == count {
                Phase::Idle
            } else {
                Phase::Writing { lba, count, done }
            };
        }
    }

    fn lba_index(register: Register) -> Option<usize> {
        match register {
            Register::Lba1 => Some(0),
            Register::Lba2 => Some(1),
            Register::Lba3 => Some(2),
            Register::Lba4 => Some(3),
            _ => None,
        }
    }
}

impl<S: SectorStore> RegisterBus for SimulatedCard<S> {
    fn load(&mut self, register: Register) -> u16 {
        match register {
            Register::Status => {
                let status = self.status();
                self.status_reads += 1;
                self.status_reads_since_command += 1;
                self.busy_reads = self.busy_reads.saturating_sub(1);
                status
            }
            Register::Error => self.error,
            Register::SectorCount => self.sector_count,
            Register::Lba1 if self.has_fault(Fault::NoProbeRegister) => 0xFFFF,
            Register::Data => self.load_data(),
            _ => match Self::lba_index(register) {
                Some(i) => self.lba[i],
                None => 0xFFFF,
            },
        }
    }

    fn store(&mut self, register: Register, value: u16) {
        if register != Register::Data {
            self.writes.push((register, value));
        }
        match register {
            Register::Status if value == COMMAND_READ || value == COMMAND_WRITE => {
                self.command(value)
            }
            // Anything else written to the command register is ignored.
            Register::Status => {}
            Register::Error => {}
            Register::SectorCount => self.sector_count = value & 0xFF,
            Register::Lba1 if self.has_fault(Fault::NoProbeRegister) => {}
            Register::Lba1 if self.has_fault(Fault::WideProbeRegister) => self.lba[0] = value,
            Register::Data => self.store_data(value),
            _ => {
                if let Some(i) = Self::lba_index(register) {
                    self.lba[i] = value & 0xFF;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::bus::{LBA_MODE, STATUS_DRQ};
    use crate::sim::MemoryStore;

    fn command(card: &mut SimulatedCard<MemoryStore>, opcode: u16, lba: u16, count: u16) {
        card.store(Register::SectorCount, count);
        card.store(Register::Lba1, lba);
        card.store(Register::Lba2, 0);
        card.store(Register::Lba3, 0);
        card.store(Register::Lba4, LBA_MODE);
        card.store(Register::Status, opcode);
    }

    #[test]
    fn test_status_lifecycle() {
        let mut card = SimulatedCard::new(MemoryStore::new(4));
        assert_eq!(card.load(Register::Status), STATUS_INSERTED);

        card.backing_mut().sectors_mut(1, 1)[..2].copy_from_slice(&[0x34, 0x12]);
        command(&mut card, COMMAND_READ, 1, 1);
        let status = card.load(Register::Status);
        assert_eq!(status, STATUS_READY);
        assert_ne!(status & STATUS_DRQ, 0);
        // Low byte first.
        assert_eq!(card.load(Register::Data), 0x1234);
        for _ in 1..256 {
            card.load(Register::Data);
        }
        assert_eq!(card.load(Register::Status), STATUS_INSERTED);
        assert_eq!(card.data_words_read(), 256);

        card.set_inserted(false);
        assert_eq!(card.load(Register::Status), STATUS_REMOVED);
    }

    #[test]
    fn test_write_commits_per_sector() {
        let mut card = SimulatedCard::new(MemoryStore::new(4));
        command(&mut card, COMMAND_WRITE, 2, 2);
        for _ in 0..256 {
            card.store(Register::Data, 0xBBAA);
        }
        assert_eq!(&card.backing().sectors(2, 1)[..2], &[0xAA, 0xBB]);
        assert!(card.backing().sectors(3, 1).iter().all(|&b| b == 0));
        assert_eq!(card.load(Register::Status), STATUS_READY);
        for _ in 0..256 {
            card.store(Register::Data, 0x0101);
        }
        assert!(card.backing().sectors(3, 1).iter().all(|&b| b == 1));
        assert_eq!(card.load(Register::Status), STATUS_INSERTED);
        assert_eq!(card.data_words_written(), 512);
        // Data port stores are not logged.
        assert_eq!(card.writes().len(), 6);
    }

    /// Register stores and the backing accessors on a card held by value.
    #[test]
    fn test_owned_card_register_access() {
        let mut card = SimulatedCard::new(MemoryStore::new(1));
        card.store(Register::SectorCount, 1);
        card.store(Register::Lba4, LBA_MODE);
        card.store(Register::Status, COMMAND_WRITE);
        for _ in 0..256 {
            card.store(Register::Data, 0x5AA5);
        }
        assert_eq!(&card.backing().sectors(0, 1)[..2], &[0xA5, 0x5A]);
        card.backing_mut().sectors_mut(0, 1).fill(0);
        assert_eq!(card.backing().sector_count(), 1);
    }

    #[test]
    fn test_out_of_range_command_fails() {
        let mut card = SimulatedCard::new(MemoryStore::new(4));
        command(&mut card, COMMAND_READ, 3, 2);
        assert_eq!(card.load(Register::Status), STATUS_INSERTED | STATUS_ERROR);
        assert_eq!(card.load(Register::Error), ERROR_ID_NOT_FOUND);
        card.reset();
        assert_eq!(card.load(Register::Status), STATUS_INSERTED);
    }

    #[test]
    fn test_zero_count_means_256() {
        let mut card = SimulatedCard::new(MemoryStore::new(256));
        command(&mut card, COMMAND_READ, 0, 0);
        assert_eq!(card.load(Register::Status), STATUS_READY);
        for _ in 0..256 * 256 {
            card.load(Register::Data);
        }
        assert_eq!(card.load(Register::Status), STATUS_INSERTED);
    }

    #[test]
    fn test_faults() {
        let mut card = SimulatedCard::new(MemoryStore::new(4));
        card.inject(Fault::BusyFor(2));
        assert_eq!(card.load(Register::Status), STATUS_BUSY);
        assert_eq!(card.load(Register::Status), STATUS_BUSY);
        assert_eq!(card.load(Register::Status), STATUS_INSERTED);

        card.inject(Fault::NeverReady);
        command(&mut card, COMMAND_READ, 0, 1);
        assert_eq!(card.load(Register::Status), STATUS_INSERTED);
        assert_eq!(card.status_reads_since_command(), 1);
        card.clear_faults();
        assert_eq!(card.load(Register::Status), STATUS_READY);

        card.store(Register::Lba1, 0xAA55);
        assert_eq!(card.load(Register::Lba1), 0x55);
        card.inject(Fault::WideProbeRegister);
        card.store(Register::Lba1, 0xAA55);
        assert_eq!(card.load(Register::Lba1), 0xAA55);
        card.clear_faults();
        card.inject(Fault::NoProbeRegister);
        card.store(Register::Lba1, 0x12);
        assert_eq!(card.load(Register::Lba1), 0xFFFF);
    }

    #[test]
    fn test_commands_need_a_card() {
        let mut card = SimulatedCard::new(MemoryStore::new(4));
        card.set_inserted(false);
        command(&mut card, COMMAND_READ, 0, 1);
        assert_eq!(card.last_command(), None);
        card.set_inserted(true);
        assert_eq!(card.load(Register::Status), STATUS_INSERTED);
    }
}
