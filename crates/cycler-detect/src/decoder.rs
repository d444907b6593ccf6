use cycler_transport::CanFrame;

/// Message-type tag OR-ed into the low nibble of a request address.
pub const IDENTIFY_TAG: u16 = 0x1;

/// Fields of an EPC identify reply. The payload is read as a little-endian
/// u64 and the fields sit contiguously from bit 0; bits 32..64 are reserved
/// and ignored.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EpcIdentity {
    /// Bits 0..6.
    pub controller_id: u8,
    /// Bits 6..11.
    pub fw_version: u8,
    /// Bits 11..24.
    pub hw_version: u16,
    /// Bits 24..32.
    pub serial_number: u8,
}

/// Decode an identify reply payload. Callers validate the frame length
/// first; the extraction itself cannot fail for an 8-byte payload.
pub fn decode_identity(data: [u8; 8]) -> EpcIdentity {
    let raw = u64::from_le_bytes(data);
    EpcIdentity {
        controller_id: (raw & 0x3F) as u8,
        fw_version: ((raw >> 6) & 0x1F) as u8,
        hw_version: ((raw >> 11) & 0x1FFF) as u16,
        serial_number: ((raw >> 24) & 0xFF) as u8,
    }
}

/// Build the identify request for one controller id: the bus address is the
/// id shifted past the 4-bit message-type nibble, payload a single zero byte.
pub fn identify_request(controller_id: u8) -> CanFrame {
    let addr = (u16::from(controller_id) << 4) | IDENTIFY_TAG;
    CanFrame {
        addr,
        len: 1,
        data: [0u8; 8],
    }
}
