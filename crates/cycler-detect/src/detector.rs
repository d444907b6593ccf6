use crate::canbus::{handle_bms_frame, handle_epc_frame, BMS_ADDR_RANGE, EPC_ADDR_RANGE};
use crate::config::DetectorConfig;
use crate::decoder::identify_request;
use crate::error::DetectError;
use crate::registry::{push_unique, DetectedDevices, DeviceRecord};
use crate::scanner::{scan_devices, CandidateTable, ScpiClass};
use crate::scpi;
use cycler_transport::{CanCmd, CanFilter, CanLink, ScpiCmd, ScpiLink, ScpiRx};
use std::collections::HashMap;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info};

/// Receive channel registered on the CAN sniffer for the detection filter.
pub(crate) const RX_CAN_CHAN: &str = "DET_CAN_RX";

/// Which request phases have already run this cycle. Requests for a class
/// are issued at most once per cycle.
#[derive(Debug, Default)]
struct RequestFlags {
    epc: bool,
    sources: bool,
    loads: bool,
    bk: bool,
    flow: bool,
}

impl RequestFlags {
    fn scpi(&self, class: ScpiClass) -> bool {
        match class {
            ScpiClass::Source => self.sources,
            ScpiClass::Load => self.loads,
            ScpiClass::Bk => self.bk,
            ScpiClass::Flow => self.flow,
        }
    }

    fn mark_scpi(&mut self, class: ScpiClass) {
        match class {
            ScpiClass::Source => self.sources = true,
            ScpiClass::Load => self.loads = true,
            ScpiClass::Bk => self.bk = true,
            ScpiClass::Flow => self.flow = true,
        }
    }
}

/// One candidate's reply channel, open from the request phase until the
/// candidate answers or the cycle ends.
struct OpenChan<R> {
    rx: R,
    port: String,
}

/// Drives one detection cycle over the CAN and SCPI sniffer links and owns
/// the resulting registry. All state is rebuilt at the start of every
/// [`Detector::process_detection`] call.
pub struct Detector<C: CanLink, S: ScpiLink> {
    cfg: DetectorConfig,
    can: C,
    scpi: S,
    devices: DetectedDevices,
    candidates: CandidateTable,
    flags: RequestFlags,
    open: HashMap<String, OpenChan<S::Rx>>,
}

impl<C: CanLink, S: ScpiLink> Detector<C, S> {
    pub fn new(cfg: DetectorConfig, can: C, scpi: S) -> Self {
        Self {
            cfg,
            can,
            scpi,
            devices: DetectedDevices::default(),
            candidates: CandidateTable::default(),
            flags: RequestFlags::default(),
            open: HashMap::new(),
        }
    }

    /// Devices confirmed by the most recent cycle.
    pub fn devices(&self) -> &DetectedDevices {
        &self.devices
    }

    /// Run one full, blocking detection pass: reset, scan the device root,
    /// issue identify requests, poll until the deadline, release every
    /// still-open channel, and leave the result lists populated.
    pub fn process_detection(&mut self) -> Result<&DetectedDevices, DetectError> {
        self.reset();
        scan_devices(&self.cfg.dev_root, &mut self.candidates);
        info!(cu_id = self.cfg.cu_id, "starting detection cycle");

        self.can.send(CanCmd::AddFilter(self.can_filter()))?;
        self.request_epc()?;
        for class in ScpiClass::ALL {
            self.drive_scpi_class(class)?;
        }

        let deadline = Instant::now() + self.cfg.detect_timeout;
        while Instant::now() < deadline {
            // CAN dispatch first, SCPI polling after, every tick.
            self.drain_can()?;
            for class in ScpiClass::ALL {
                self.drive_scpi_class(class)?;
            }
            thread::sleep(self.cfg.poll_period);
        }

        self.can.send(CanCmd::RemoveFilter(self.can_filter()))?;
        self.release_open_channels()?;
        info!(
            bms = self.devices.bms.len(),
            epc = self.devices.epc.len(),
            ea = self.devices.ea.len(),
            rs = self.devices.rs.len(),
            flow = self.devices.flow.len(),
            "detection cycle finished"
        );
        Ok(&self.devices)
    }

    /// Re-establish the empty-cycle invariants. Safe to call repeatedly.
    fn reset(&mut self) {
        self.devices.clear();
        self.candidates.clear();
        self.flags = RequestFlags::default();
        // A cycle aborted by a transport failure may have left channels
        // open; dropping the handles is all that is still possible.
        self.open.clear();
    }

    fn can_filter(&self) -> CanFilter {
        CanFilter {
            addr: 0x000,
            mask: 0x000,
            rx_chan: RX_CAN_CHAN.to_string(),
        }
    }

    /// Broadcast one identify frame per controller id in the configured
    /// sweep range, once per cycle.
    fn request_epc(&mut self) -> Result<(), DetectError> {
        if self.flags.epc {
            return Ok(());
        }
        for id in self.cfg.epc_ids.clone() {
            self.can.send(CanCmd::Message(identify_request(id)))?;
        }
        self.flags.epc = true;
        Ok(())
    }

    /// Dispatch every pending CAN frame by address range.
    fn drain_can(&mut self) -> Result<(), DetectError> {
        while let Some(frame) = self.can.try_recv()? {
            if BMS_ADDR_RANGE.contains(&frame.addr) {
                handle_bms_frame(self.cfg.cu_id, &mut self.devices.bms, &frame);
            } else if EPC_ADDR_RANGE.contains(&frame.addr) {
                handle_epc_frame(
                    self.cfg.cu_id,
                    &self.cfg.epc_ids,
                    &mut self.devices.epc,
                    &frame,
                );
            } else {
                error!(addr = frame.addr, "frame from unknown address range dropped");
            }
        }
        Ok(())
    }

    /// One tick of a class's state machine: issue its requests on the first
    /// call of the cycle, poll its unanswered candidates afterwards.
    fn drive_scpi_class(&mut self, class: ScpiClass) -> Result<(), DetectError> {
        if !self.flags.scpi(class) {
            self.request_class(class)?;
            self.flags.mark_scpi(class);
            return Ok(());
        }
        self.poll_class(class)
    }

    /// Attach every candidate of the class and query its identity. Each
    /// candidate gets its own reply channel, named after class and device so
    /// classes sharing a base name cannot collide.
    fn request_class(&mut self, class: ScpiClass) -> Result<(), DetectError> {
        for name in self.candidates.names(class) {
            let chan = scpi::chan_name(class, &name);
            let port = scpi::port_path(&self.cfg.dev_root, class, &name);
            let rx = self.scpi.open_rx(&chan)?;
            self.scpi.send(ScpiCmd::AddDev {
                port: port.clone(),
                rx_chan: chan.clone(),
                conf: scpi::serial_conf(class, &port),
            })?;
            self.scpi.send(ScpiCmd::WriteRead {
                port: port.clone(),
                payload: scpi::IDN_QUERY.to_string(),
            })?;
            self.open.insert(chan, OpenChan { rx, port });
        }
        Ok(())
    }

    /// Non-blocking poll of every unanswered candidate of the class. A
    /// candidate is observed at most once per cycle: whatever the parse
    /// outcome, a reply marks it answered and detaches its device.
    fn poll_class(&mut self, class: ScpiClass) -> Result<(), DetectError> {
        for name in self.candidates.names(class) {
            if self.candidates.is_answered(class, &name) {
                continue;
            }
            let chan = scpi::chan_name(class, &name);
            let reply = match self.open.get_mut(&chan) {
                Some(open) => match open.rx.try_recv()? {
                    Some(reply) => reply,
                    None => continue,
                },
                None => continue,
            };
            match scpi::parse_identity(&reply.lines) {
                Ok(identity) => {
                    let record = DeviceRecord {
                        cu_id: self.cfg.cu_id,
                        comp_dev_id: 0,
                        serial_number: identity.serial_number,
                        link_name: name.clone(),
                        model: Some(identity.model),
                    };
                    let list = scpi_list_mut(&mut self.devices, class);
                    if !push_unique(list, record) {
                        debug!(candidate = %name, class = ?class, "duplicate serial number dropped");
                    }
                }
                Err(e) => {
                    error!(
                        candidate = %name,
                        class = ?class,
                        error = %e,
                        lines = ?reply.lines,
                        "unparseable identity reply"
                    );
                }
            }
            self.candidates.mark_answered(class, &name);
            if let Some(open) = self.open.remove(&chan) {
                self.scpi.send(ScpiCmd::DelDev { port: open.port })?;
            }
        }
        Ok(())
    }

    /// Detach every candidate that never answered, closing its channel.
    /// Together with the answered path this closes each opened channel
    /// exactly once per cycle.
    fn release_open_channels(&mut self) -> Result<(), DetectError> {
        for (chan, open) in self.open.drain() {
            debug!(channel = %chan, "releasing unanswered candidate channel");
            self.scpi.send(ScpiCmd::DelDev { port: open.port })?;
        }
        Ok(())
    }
}

/// Result list a confirmed SCPI device of `class` belongs to. BK units are
/// bench electronic loads like the RS ones and share their list.
fn scpi_list_mut(devices: &mut DetectedDevices, class: ScpiClass) -> &mut Vec<DeviceRecord> {
    match class {
        ScpiClass::Source => &mut devices.ea,
        ScpiClass::Load | ScpiClass::Bk => &mut devices.rs,
        ScpiClass::Flow => &mut devices.flow,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycler_transport::{CanFrame, MockCanLink, MockScpiLink, ScpiReply};
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    fn test_detector(root: &Path) -> (Detector<MockCanLink, MockScpiLink>, MockCanLink, MockScpiLink) {
        let can = MockCanLink::new();
        let scpi = MockScpiLink::new();
        let mut cfg = DetectorConfig::new(9);
        cfg.dev_root = root.to_path_buf();
        cfg.detect_timeout = Duration::from_millis(40);
        cfg.poll_period = Duration::from_millis(1);
        (Detector::new(cfg, can.clone(), scpi.clone()), can, scpi)
    }

    fn reply(port: &str, line: &str) -> ScpiReply {
        ScpiReply {
            port: port.to_string(),
            lines: vec![line.to_string()],
        }
    }

    fn del_devs(scpi: &MockScpiLink, port: &str) -> usize {
        scpi.sent()
            .iter()
            .filter(|c| matches!(c, ScpiCmd::DelDev { port: p } if p == port))
            .count()
    }

    #[test]
    fn ea_source_is_confirmed_from_its_identity_reply() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir(root.path().join("source"))?;
        fs::File::create(root.path().join("source/EA_1"))?;
        let (mut det, _can, scpi) = test_detector(root.path());
        let port = format!("{}/source/EA_1", root.path().display());
        scpi.push_reply(
            "DET_SOURCE_EA_1",
            reply(&port, "Manufacturer, EA-PS 2000, SN123, fw1.0"),
        );

        let devices = det.process_detection()?;
        assert_eq!(devices.ea.len(), 1);
        assert_eq!(devices.ea[0].serial_number, "SN123");
        assert_eq!(devices.ea[0].link_name, "EA_1");
        assert_eq!(devices.ea[0].model.as_deref(), Some("EA-PS_2000"));
        assert_eq!(devices.ea[0].cu_id, 9);

        // Attach, query, detach: exactly once each for this port.
        let sent = scpi.sent();
        assert!(sent
            .iter()
            .any(|c| matches!(c, ScpiCmd::AddDev { port: p, rx_chan, .. }
                if p == &port && rx_chan == "DET_SOURCE_EA_1")));
        assert!(sent
            .iter()
            .any(|c| matches!(c, ScpiCmd::WriteRead { port: p, payload }
                if p == &port && payload == ":*IDN?")));
        assert_eq!(del_devs(&scpi, &port), 1);
        assert!(scpi.open_channels().is_empty());
        Ok(())
    }

    #[test]
    fn absent_class_directory_yields_empty_lists() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let (mut det, _can, scpi) = test_detector(root.path());
        let devices = det.process_detection()?;
        assert!(devices.is_empty());
        // No candidates, so nothing was ever attached.
        assert!(scpi.sent().is_empty());
        Ok(())
    }

    #[test]
    fn duplicate_serial_numbers_keep_only_the_first_record() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir(root.path().join("source"))?;
        fs::File::create(root.path().join("source/EA_1"))?;
        fs::File::create(root.path().join("source/EA_2"))?;
        let (mut det, _can, scpi) = test_detector(root.path());
        for name in ["EA_1", "EA_2"] {
            scpi.push_reply(
                &format!("DET_SOURCE_{name}"),
                reply("", "Manufacturer, EA-PS 2000, SN123, fw1.0"),
            );
        }

        let devices = det.process_detection()?;
        assert_eq!(devices.ea.len(), 1);
        // Candidates iterate sorted, so EA_1 wins.
        assert_eq!(devices.ea[0].link_name, "EA_1");
        // Both devices were still observed and detached.
        let port_2 = format!("{}/source/EA_2", root.path().display());
        assert_eq!(del_devs(&scpi, &port_2), 1);
        Ok(())
    }

    #[test]
    fn unanswered_candidate_is_dropped_and_its_channel_released() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir(root.path().join("load"))?;
        fs::File::create(root.path().join("load/RS_1"))?;
        let (mut det, _can, scpi) = test_detector(root.path());

        let devices = det.process_detection()?;
        assert!(devices.rs.is_empty());
        let port = format!("{}/load/RS_1", root.path().display());
        assert_eq!(del_devs(&scpi, &port), 1);
        assert!(scpi.open_channels().is_empty());
        Ok(())
    }

    #[test]
    fn malformed_reply_does_not_affect_sibling_candidates() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir(root.path().join("source"))?;
        fs::File::create(root.path().join("source/EA_1"))?;
        fs::File::create(root.path().join("source/EA_2"))?;
        let (mut det, _can, scpi) = test_detector(root.path());
        scpi.push_reply("DET_SOURCE_EA_1", reply("", "garbage"));
        scpi.push_reply(
            "DET_SOURCE_EA_2",
            reply("", "Manufacturer, EA-PS 2000, SN456, fw1.0"),
        );

        let devices = det.process_detection()?;
        assert_eq!(devices.ea.len(), 1);
        assert_eq!(devices.ea[0].serial_number, "SN456");
        // The garbled candidate was still observed exactly once.
        let port_1 = format!("{}/source/EA_1", root.path().display());
        assert_eq!(del_devs(&scpi, &port_1), 1);
        Ok(())
    }

    #[test]
    fn bk_candidates_land_in_the_load_list() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir(root.path().join("bk"))?;
        fs::File::create(root.path().join("bk/BK_1"))?;
        let (mut det, _can, scpi) = test_detector(root.path());
        scpi.push_reply("DET_BK_BK_1", reply("", "BK Precision, 8500 B, SN789, fw2"));

        let devices = det.process_detection()?;
        assert_eq!(devices.rs.len(), 1);
        assert_eq!(devices.rs[0].model.as_deref(), Some("8500_B"));
        assert!(scpi.open_channels().is_empty());
        Ok(())
    }

    #[test]
    fn epc_sweep_runs_once_and_replies_are_decoded() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let (mut det, can, _scpi) = test_detector(root.path());
        let raw: u64 = 0x15 | (2 << 6) | (3 << 24);
        can.push_frame(CanFrame {
            addr: 0x135,
            len: 8,
            data: raw.to_le_bytes(),
        });

        let devices = det.process_detection()?;
        assert_eq!(devices.epc.len(), 1);
        assert_eq!(devices.epc[0].link_name, "21");
        assert_eq!(devices.epc[0].serial_number, "3");

        let sent = can.sent();
        assert!(matches!(sent.first(), Some(CanCmd::AddFilter(_))));
        assert!(matches!(sent.last(), Some(CanCmd::RemoveFilter(_))));
        let identify_frames: Vec<u16> = sent
            .iter()
            .filter_map(|c| match c {
                CanCmd::Message(f) => Some(f.addr),
                _ => None,
            })
            .collect();
        assert_eq!(identify_frames.len(), (0x80 - 0x13) as usize);
        assert_eq!(identify_frames[0], (0x13 << 4) | 1);
        Ok(())
    }

    #[test]
    fn bms_frames_confirm_and_unknown_addresses_are_dropped() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        let (mut det, can, _scpi) = test_detector(root.path());
        can.push_frame(CanFrame::new(0x110, &[0]).unwrap());
        can.push_frame(CanFrame::new(0x110, &[0]).unwrap());
        can.push_frame(CanFrame::new(0x050, &[0]).unwrap());

        let devices = det.process_detection()?;
        assert_eq!(devices.bms.len(), 1);
        assert_eq!(devices.bms[0].serial_number, "272");
        assert_eq!(devices.bms[0].link_name, "16");
        assert!(devices.epc.is_empty());
        Ok(())
    }

    #[test]
    fn cycles_start_clean_with_no_carry_over() -> anyhow::Result<()> {
        let root = tempfile::tempdir()?;
        fs::create_dir(root.path().join("source"))?;
        fs::File::create(root.path().join("source/EA_1"))?;
        let (mut det, _can, scpi) = test_detector(root.path());
        scpi.push_reply(
            "DET_SOURCE_EA_1",
            reply("", "Manufacturer, EA-PS 2000, SN123, fw1.0"),
        );

        assert_eq!(det.process_detection()?.ea.len(), 1);
        // No reply staged for the second cycle: the device must not linger.
        assert!(det.process_detection()?.ea.is_empty());

        // Attached and detached once per cycle.
        let port = format!("{}/source/EA_1", root.path().display());
        assert_eq!(del_devs(&scpi, &port), 2);
        assert!(scpi.open_channels().is_empty());
        Ok(())
    }
}
