use serde::{Deserialize, Serialize};

/// One confirmed physical device, as handed to the rest of the cycler.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Owning computational unit.
    pub cu_id: u32,
    /// Sub-component index within the device; 0 when the device has no
    /// internal sub-addressing.
    pub comp_dev_id: u16,
    /// Device-reported identifier, unique per class within one cycle.
    pub serial_number: String,
    /// Handle used for later communication: the relative CAN address for bus
    /// devices, the device-file name for serial ones.
    pub link_name: String,
    /// Reported model, when the device answers an identity query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// The per-class result lists of one detection cycle. Rebuilt from scratch
/// every cycle; nothing persists across cycles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedDevices {
    /// Battery-management boards (CAN).
    pub bms: Vec<DeviceRecord>,
    /// Power-electronics controllers (CAN).
    pub epc: Vec<DeviceRecord>,
    /// EA bench power sources (SCPI).
    pub ea: Vec<DeviceRecord>,
    /// Electronic loads, RS and BK units (SCPI).
    pub rs: Vec<DeviceRecord>,
    /// Flow meters (SCPI).
    pub flow: Vec<DeviceRecord>,
}

impl DetectedDevices {
    pub fn clear(&mut self) {
        self.bms.clear();
        self.epc.clear();
        self.ea.clear();
        self.rs.clear();
        self.flow.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bms.is_empty()
            && self.epc.is_empty()
            && self.ea.is_empty()
            && self.rs.is_empty()
            && self.flow.is_empty()
    }
}

/// Append `record` unless the list already holds its serial number.
/// Returns whether the record was kept.
pub(crate) fn push_unique(list: &mut Vec<DeviceRecord>, record: DeviceRecord) -> bool {
    if list.iter().any(|d| d.serial_number == record.serial_number) {
        return false;
    }
    list.push(record);
    true
}
