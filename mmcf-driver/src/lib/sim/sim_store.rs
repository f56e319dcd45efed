use log::debug;
use std::convert::TryFrom;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::bus::SECTOR_SIZE;

/// Backing storage for a simulated card.
pub trait SectorStore {
    fn sector_count(&self) -> u32;
    /// Fill `buf` (one sector long) from sector `lba`.
    fn read_sector(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()>;
    /// Overwrite sector `lba` with `buf` (one sector long).
    fn write_sector(&mut self, lba: u32, buf: &[u8]) -> io::Result<()>;
}

fn out_of_range(lba: u32, sectors: u32) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput,
                   format!("sector {} is beyond the end of a {}-sector store", lba, sectors))
}

/// Sectors held in memory, initially zero.
pub struct MemoryStore {
    data: Vec<u8>,
}

impl MemoryStore {
    pub fn new(sectors: u32) -> Self {
        Self {
            data: vec![0; sectors as usize * SECTOR_SIZE],
        }
    }

    /// The bytes of `count` sectors from `lba`.
    pub fn sectors(&self, lba: u32, count: u32) -> &[u8] {
        let start = lba as usize * SECTOR_SIZE;
        &self.data[start..start + count as usize * SECTOR_SIZE]
    }

    pub fn sectors_mut(&mut self, lba: u32, count: u32) -> &mut [u8] {
        let start = lba as usize * SECTOR_SIZE;
        &mut self.data[start..start + count as usize * SECTOR_SIZE]
    }
}

impl SectorStore for MemoryStore {
    fn sector_count(&self) -> u32 {
        (self.data.len() / SECTOR_SIZE) as u32
    }

    fn read_sector(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()> {
        if lba >= self.sector_count() {
            return Err(out_of_range(lba, self.sector_count()));
        }
        buf.copy_from_slice(self.sectors(lba, 1));
        Ok(())
    }

    fn write_sector(&mut self, lba: u32, buf: &[u8]) -> io::Result<()> {
        if lba >= self.sector_count() {
            return Err(out_of_range(lba, self.sector_count()));
        }
        self.sectors_mut(lba, 1).copy_from_slice(buf);
        Ok(())
    }
}

/// Sectors held in a card image on the host filesystem. The image size must
/// be a non-zero multiple of the sector size.
pub struct ImageStore {
    file: File,
    path: PathBuf,
    sectors: u32,
}

impl ImageStore {
    /// Open an existing image for reading and writing.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let bytes = file.metadata()?.len();
        let sectors = if bytes > 0 && bytes % SECTOR_SIZE as u64 == 0 {
            u32::try_from(bytes / SECTOR_SIZE as u64).ok()
        } else {
            None
        }.ok_or_else(|| io::Error::new(
            io::ErrorKind::InvalidData,
            format!("'{}' is {} bytes, which is not a whole number of sectors",
                    path.display(), bytes)))?;
        debug!("Opened image '{}' with {} sectors.", path.display(), sectors);
        Ok(Self { file, path, sectors })
    }

    /// Create a zero-filled image of `sectors` sectors, replacing any
    /// existing file.
    pub fn create(path: impl AsRef<Path>, sectors: u32) -> io::Result<Self> {
        if sectors == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput,
                                      "an image needs at least one sector"));
        }
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).create(true)
            .truncate(true).open(&path)?;
        file.set_len(sectors as u64 * SECTOR_SIZE as u64)?;
        debug!("Created image '{}' with {} sectors.", path.display(), sectors);
        Ok(Self { file, path, sectors })
    }

    /// Push written sectors through to the disk.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        debug!("Synced image '{}'.", self.path.display());
        Ok(())
    }

    fn seek_to(&mut self, lba: u32) -> io::Result<()> {
        if lba >= self.sectors {
            return Err(out_of_range(lba, self.sectors));
        }
        self.file.seek(SeekFrom::Start(lba as u64 * SECTOR_SIZE as u64))?;
        Ok(())
    }
}

impl SectorStore for ImageStore {
    fn sector_count(&self) -> u32 {
        self.sectors
    }

    fn read_sector(&mut self, lba: u32, buf: &mut [u8]) -> io::Result<()> {
        self.seek_to(lba)?;
        self.file.read_exact(buf)
    }

    fn write_sector(&mut self, lba: u32, buf: &[u8]) -> io::Result<()> {
        self.seek_to(lba)?;
        self.file.write_all(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;
    use tempfile;

    #[test]
    fn test_memory_store_bounds() {
        let mut store = MemoryStore::new(2);
        let mut buf = [0; SECTOR_SIZE];
        assert!(store.write_sector(1, &[7; SECTOR_SIZE]).is_ok());
        assert!(store.read_sector(1, &mut buf).is_ok());
        assert_eq!(buf, [7; SECTOR_SIZE]);
        assert!(store.read_sector(2, &mut buf).is_err());
        assert!(store.write_sector(2, &buf).is_err());
    }

    #[test]
    fn test_image_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.img");
        {
            let mut store = ImageStore::create(&path, 3).unwrap();
            assert_eq!(store.sector_count(), 3);
            store.write_sector(2, &[0xC3; SECTOR_SIZE]).unwrap();
            store.sync().unwrap();
        }
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 3 * SECTOR_SIZE);
        assert!(bytes[..2 * SECTOR_SIZE].iter().all(|&b| b == 0));
        assert!(bytes[2 * SECTOR_SIZE..].iter().all(|&b| b == 0xC3));

        let mut store = ImageStore::open(&path).unwrap();
        let mut buf = [0; SECTOR_SIZE];
        store.read_sector(2, &mut buf).unwrap();
        assert_eq!(buf, [0xC3; SECTOR_SIZE]);
        assert!(store.read_sector(3, &mut buf).is_err());
    }

    #[test]
    fn test_image_rejects_bad_sizes() {
        let dir = tempfile::tempdir().unwrap();

        let ragged = dir.path().join("ragged.img");
        fs::write(&ragged, vec![0u8; SECTOR_SIZE + 1]).unwrap();
        assert_eq!(ImageStore::open(&ragged).err().unwrap().kind(),
                   io::ErrorKind::InvalidData);

        let empty = dir.path().join("empty.img");
        fs::write(&empty, b"").unwrap();
        assert!(ImageStore::open(&empty).is_err());

        assert!(ImageStore::open(dir.path().join("missing.img")).is_err());
        assert!(ImageStore::create(dir.path().join("zero.img"), 0).is_err());
    }
}
