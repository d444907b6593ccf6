use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// The SCPI device classes, matching the subdirectory names under the device
/// root. An enum rather than string keys so that every class is handled
/// exhaustively at compile time.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScpiClass {
    Source,
    Load,
    Bk,
    Flow,
}

impl ScpiClass {
    pub const ALL: [ScpiClass; 4] = [
        ScpiClass::Source,
        ScpiClass::Load,
        ScpiClass::Bk,
        ScpiClass::Flow,
    ];

    /// Subdirectory name under the device root.
    pub fn dir_name(self) -> &'static str {
        match self {
            ScpiClass::Source => "source",
            ScpiClass::Load => "load",
            ScpiClass::Bk => "bk",
            ScpiClass::Flow => "flow",
        }
    }
}

/// Per-class map from candidate device name to its "responded" flag. A name
/// in the table was present on the filesystem at scan time; the flag only
/// ever moves false→true within a cycle.
#[derive(Debug, Default)]
pub struct CandidateTable {
    source: HashMap<String, bool>,
    load: HashMap<String, bool>,
    bk: HashMap<String, bool>,
    flow: HashMap<String, bool>,
}

impl CandidateTable {
    fn class(&self, class: ScpiClass) -> &HashMap<String, bool> {
        match class {
            ScpiClass::Source => &self.source,
            ScpiClass::Load => &self.load,
            ScpiClass::Bk => &self.bk,
            ScpiClass::Flow => &self.flow,
        }
    }

    fn class_mut(&mut self, class: ScpiClass) -> &mut HashMap<String, bool> {
        match class {
            ScpiClass::Source => &mut self.source,
            ScpiClass::Load => &mut self.load,
            ScpiClass::Bk => &mut self.bk,
            ScpiClass::Flow => &mut self.flow,
        }
    }

    pub fn clear(&mut self) {
        for class in ScpiClass::ALL {
            self.class_mut(class).clear();
        }
    }

    pub fn insert(&mut self, class: ScpiClass, name: &str) {
        self.class_mut(class).entry(name.to_string()).or_insert(false);
    }

    pub fn mark_answered(&mut self, class: ScpiClass, name: &str) {
        if let Some(flag) = self.class_mut(class).get_mut(name) {
            *flag = true;
        }
    }

    pub fn is_answered(&self, class: ScpiClass, name: &str) -> bool {
        self.class(class).get(name).copied().unwrap_or(false)
    }

    /// Candidate names of a class, sorted for deterministic iteration.
    pub fn names(&self, class: ScpiClass) -> Vec<String> {
        let mut names: Vec<String> = self.class(class).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        ScpiClass::ALL.iter().all(|c| self.class(*c).is_empty())
    }
}

/// Enumerate the device files of every class under `root`. A missing class
/// directory simply means no devices of that class are attached.
pub fn scan_devices(root: &Path, table: &mut CandidateTable) {
    for class in ScpiClass::ALL {
        let dir = root.join(class.dir_name());
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!(path = %dir.display(), "device class directory not present");
                continue;
            }
            Err(e) => {
                warn!(path = %dir.display(), error = %e, "device class directory unreadable");
                continue;
            }
        };
        for entry in entries.flatten() {
            let name = entry.file_name();
            table.insert(class, &name.to_string_lossy());
        }
    }
}
