use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;

/// Default filesystem root under which the udev rules expose the attached
/// SCPI instruments, one subdirectory per device class.
pub const DEFAULT_DEV_ROOT: &str = "/dev/wattrex";

/// Settings for one detector instance. All fields are plain data; the CLI
/// overrides them from flags.
#[derive(Clone, Debug)]
pub struct DetectorConfig {
    /// Identifier of the computational unit the detected devices belong to.
    pub cu_id: u32,
    /// Root of the per-class device directories.
    pub dev_root: PathBuf,
    /// Wall-clock budget for one detection cycle.
    pub detect_timeout: Duration,
    /// Pause between polling ticks.
    pub poll_period: Duration,
    /// Half-open range of controller ids swept with identify requests.
    /// Ids at or above 0x80 would not fit the 4-bit shifted request address.
    pub epc_ids: Range<u8>,
}

impl DetectorConfig {
    pub fn new(cu_id: u32) -> Self {
        Self {
            cu_id,
            dev_root: PathBuf::from(DEFAULT_DEV_ROOT),
            detect_timeout: Duration::from_secs(5),
            poll_period: Duration::from_millis(5),
            epc_ids: 0x13..0x80,
        }
    }
}
