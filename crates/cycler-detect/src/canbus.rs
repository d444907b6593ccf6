use crate::decoder::decode_identity;
use crate::registry::{push_unique, DeviceRecord};
use cycler_transport::CanFrame;
use std::ops::{Range, RangeInclusive};
use tracing::{debug, error};

/// Bus addresses on which battery-management boards report.
pub const BMS_ADDR_RANGE: RangeInclusive<u16> = 0x100..=0x120;

/// Bus addresses on which power-electronics controllers reply to the
/// identify sweep.
pub const EPC_ADDR_RANGE: RangeInclusive<u16> = 0x130..=0x7FF;

/// Confirm a BMS from any frame in its address range. BMS boards carry no
/// identity payload; the raw bus address doubles as the serial number and
/// the relative address (offset from the range base) as the link name.
pub(crate) fn handle_bms_frame(cu_id: u32, list: &mut Vec<DeviceRecord>, frame: &CanFrame) {
    let serial = frame.addr.to_string();
    let kept = push_unique(
        list,
        DeviceRecord {
            cu_id,
            comp_dev_id: 0,
            serial_number: serial,
            link_name: (frame.addr - BMS_ADDR_RANGE.start()).to_string(),
            model: None,
        },
    );
    if kept {
        debug!(addr = frame.addr, "bms confirmed");
    }
}

/// Confirm an EPC from an identify reply. Short payloads and controller ids
/// outside the configured sweep range are dropped with an error log; both
/// indicate a device we did not ask for or a corrupted reply.
pub(crate) fn handle_epc_frame(
    cu_id: u32,
    valid_ids: &Range<u8>,
    list: &mut Vec<DeviceRecord>,
    frame: &CanFrame,
) {
    if frame.len < 8 {
        error!(addr = frame.addr, len = frame.len, "short epc identify reply");
        return;
    }
    let identity = decode_identity(frame.data);
    if !valid_ids.contains(&identity.controller_id) {
        error!(
            controller_id = identity.controller_id,
            addr = frame.addr,
            "epc controller id out of the configured range"
        );
        return;
    }
    // Dedup on the controller id: one record per controller, whatever
    // address its replies arrive on.
    let link_name = identity.controller_id.to_string();
    if list.iter().any(|d| d.link_name == link_name) {
        return;
    }
    debug!(
        controller_id = identity.controller_id,
        fw = identity.fw_version,
        hw = identity.hw_version,
        "epc confirmed"
    );
    list.push(DeviceRecord {
        cu_id,
        comp_dev_id: 0,
        serial_number: identity.serial_number.to_string(),
        link_name,
        model: None,
    });
}
