/// Iterations a wait may spend before giving up.
pub const DEFAULT_TIMEOUT: u32 = 10_000_000;

/// How sector data is moved between the data port and the caller's buffer.
/// Chosen once per driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// Hand each sector to a DMA channel. Buffers must be 2-byte aligned.
    Dma,
    /// Byte-wise word composition for odd buffers, 16-bit words otherwise.
    UnalignedSafe,
    /// 16-bit words only. Buffers must be 2-byte aligned.
    Direct,
}

impl Default for TransferMode {
    #[cfg(feature = "direct-transfer")]
    fn default() -> Self {
        TransferMode::Direct
    }

    #[cfg(not(feature = "direct-transfer"))]
    fn default() -> Self {
        TransferMode::UnalignedSafe
    }
}

/// Driver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Upper bound on status samples per wait. Counts iterations, not time.
    pub timeout: u32,
    pub mode: TransferMode,
    /// Wait for the DMA channel to go idle before returning from a transfer.
    pub wait_for_dma: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            mode: TransferMode::default(),
            wait_for_dma: true,
        }
    }
}

impl Config {
    pub fn with_timeout(mut self, timeout: u32) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }
}
