//! cycler-detect: device detection engine for the battery cycler
//!
//! Identifies which instruments are physically attached to a computational
//! unit across two transports: power-electronics controllers (EPC) and
//! battery-management boards (BMS) on the CAN bus, and SCPI-over-serial
//! bench instruments (sources, loads, multimeters, flow meters) exposed as
//! device files under a fixed root. One call to
//! [`Detector::process_detection`] runs a bounded cycle — reset, filesystem
//! scan, identify requests, deadline-limited polling — and leaves the typed
//! registry lists populated with the devices that answered.

mod config;
pub use config::{DetectorConfig, DEFAULT_DEV_ROOT};

mod registry;
pub use registry::{DetectedDevices, DeviceRecord};

mod decoder;
pub use decoder::{decode_identity, identify_request, EpcIdentity, IDENTIFY_TAG};

mod scanner;
pub use scanner::{scan_devices, CandidateTable, ScpiClass};

mod scpi;

mod canbus;
pub use canbus::{BMS_ADDR_RANGE, EPC_ADDR_RANGE};

mod detector;
pub use detector::Detector;

mod error;
pub use error::DetectError;
