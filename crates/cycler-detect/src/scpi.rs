use crate::scanner::ScpiClass;
use cycler_transport::{Parity, ScpiSerialConf};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Prefix of the per-candidate reply channel names.
pub(crate) const SCPI_CHAN_PREFIX: &str = "DET_";

/// Standard identity query understood by all attached SCPI instruments.
pub(crate) const IDN_QUERY: &str = ":*IDN?";

/// Name of the reply channel bound to one candidate. Includes the class so
/// that classes sharing a base device name cannot collide.
pub(crate) fn chan_name(class: ScpiClass, name: &str) -> String {
    format!(
        "{SCPI_CHAN_PREFIX}{}_{name}",
        class.dir_name().to_uppercase()
    )
}

/// Full serial-port path of one candidate under the device root.
pub(crate) fn port_path(root: &Path, class: ScpiClass, name: &str) -> String {
    root.join(class.dir_name())
        .join(name)
        .to_string_lossy()
        .into_owned()
}

/// Serial parameters for one class. The bench instruments all speak
/// 9600/8-O-1 with newline-terminated answers.
pub(crate) fn serial_conf(_class: ScpiClass, port: &str) -> ScpiSerialConf {
    ScpiSerialConf {
        port: port.to_string(),
        baudrate: 9600,
        parity: Parity::Odd,
        separator: '\n',
        timeout: Duration::from_millis(800),
        write_timeout: Duration::from_millis(800),
    }
}

/// Identity fields parsed from an `*IDN?` answer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ScpiIdentity {
    pub model: String,
    pub serial_number: String,
}

#[derive(Debug, Error)]
pub(crate) enum ReplyError {
    #[error("empty reply")]
    Empty,
    #[error("expected at least 3 comma-separated fields, got {0}")]
    FieldCount(usize),
    #[error("empty serial number field")]
    EmptySerial,
}

/// Parse a comma-separated SCPI identity: field 1 is the model (embedded
/// spaces become underscores), field 2 the serial number. Anything else is a
/// reply we do not understand and the candidate stays unconfirmed.
pub(crate) fn parse_identity(lines: &[String]) -> Result<ScpiIdentity, ReplyError> {
    let first = lines.first().ok_or(ReplyError::Empty)?;
    let fields: Vec<&str> = first.split(',').map(str::trim).collect();
    if fields.len() < 3 {
        return Err(ReplyError::FieldCount(fields.len()));
    }
    let serial_number = fields[2].to_string();
    if serial_number.is_empty() {
        return Err(ReplyError::EmptySerial);
    }
    Ok(ScpiIdentity {
        model: fields[1].replace(' ', "_"),
        serial_number,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(s: &str) -> Vec<String> {
        vec![s.to_string()]
    }

    #[test]
    fn parses_an_ea_identity() -> anyhow::Result<()> {
        let id = parse_identity(&lines("Manufacturer, EA-PS 2000, SN123, fw1.0"))?;
        assert_eq!(id.model, "EA-PS_2000");
        assert_eq!(id.serial_number, "SN123");
        Ok(())
    }

    #[test]
    fn too_few_fields_is_an_error() {
        assert!(matches!(
            parse_identity(&lines("garbage")),
            Err(ReplyError::FieldCount(1))
        ));
        assert!(matches!(parse_identity(&[]), Err(ReplyError::Empty)));
    }

    #[test]
    fn extra_fields_are_tolerated() -> anyhow::Result<()> {
        let id = parse_identity(&lines("A,B 2,C,D,E,F"))?;
        assert_eq!(id.model, "B_2");
        assert_eq!(id.serial_number, "C");
        Ok(())
    }

    #[test]
    fn channel_names_embed_the_class() {
        assert_eq!(chan_name(ScpiClass::Source, "EA_1"), "DET_SOURCE_EA_1");
        assert_eq!(chan_name(ScpiClass::Load, "EA_1"), "DET_LOAD_EA_1");
        assert_ne!(
            chan_name(ScpiClass::Bk, "X"),
            chan_name(ScpiClass::Flow, "X")
        );
    }

    #[test]
    fn port_path_joins_root_class_and_name() {
        let port = port_path(Path::new("/dev/wattrex"), ScpiClass::Source, "EA_1");
        assert_eq!(port, "/dev/wattrex/source/EA_1");
    }
}
