use std::error::Error;
use std::fmt::{self, Display, Formatter};

/// The condition a timed-out wait was polling for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The busy flag to clear.
    Busy,
    /// The card to report itself inserted.
    Inserted,
    /// The card to be ready for the given sector of a request (zero-based).
    Ready { sector: u32 },
    /// The DMA channel to go idle.
    DmaIdle,
}

/// Which half of the presence probe failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    /// LBA1 did not hold an inverted value.
    Inversion,
    /// LBA1 held a full 16-bit value, so it is not the adapter's 8-bit
    /// register.
    Width,
}

/// Error type for the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfError {
    /// A bounded poll never saw the expected condition.
    Timeout(Wait),
    /// Requests must be 1 to 256 sectors.
    InvalidSectorCount(u32),
    /// The buffer cannot hold the requested sectors.
    BufferTooSmall { needed: usize, actual: usize },
    /// The transfer strategy needs a 2-byte aligned buffer.
    MisalignedBuffer,
    /// The presence probe did not find the adapter.
    ProbeFailed(Probe),
    /// DMA mode was requested without a DMA channel.
    NoDmaChannel,
}

pub type CfResult<T> = Result<T, CfError>;

impl CfError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CfError::Timeout(_))
    }
}

impl Display for CfError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CfError::Timeout(Wait::Busy) =>
                write!(f, "Timed out waiting for the card to stop being busy."),
            CfError::Timeout(Wait::Inserted) =>
                write!(f, "Timed out waiting for the card to be inserted."),
            CfError::Timeout(Wait::Ready { sector }) =>
                write!(f, "Timed out waiting for the card to be ready for sector {} \
                           of the request.", sector),
            CfError::Timeout(Wait::DmaIdle) =>
                write!(f, "Timed out waiting for the DMA channel to finish."),
            CfError::InvalidSectorCount(n) =>
                write!(f, "Cannot transfer {} sectors: must be between 1 and 256.", n),
            CfError::BufferTooSmall { needed, actual } =>
                write!(f, "Buffer of {} bytes is too small; {} needed.", actual, needed),
            CfError::MisalignedBuffer =>
                write!(f, "Buffer is not 2-byte aligned."),
            CfError::ProbeFailed(Probe::Inversion) =>
                write!(f, "No adapter found: address register is not writable."),
            CfError::ProbeFailed(Probe::Width) =>
                write!(f, "No adapter found: address register is not 8 bits wide."),
            CfError::NoDmaChannel =>
                write!(f, "DMA transfers were requested but no DMA channel was given."),
        }
    }
}

impl Error for CfError {}
