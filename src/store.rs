use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::days::format_days;
use crate::error::StoreError;
use crate::schedule::TreatmentSpec;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Treatment {
    pub medication: String,
    pub dose: String,
    #[serde(default)]
    pub route: Option<String>,
    /// Day-range text, e.g. "1 to 4, 8"
    pub days: String,
    #[serde(default)]
    pub max_duration: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Cycle {
    #[serde(default)]
    pub cycle_name: Option<String>,
    #[serde(default)]
    pub cycle_length: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub treatments: Vec<Treatment>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Phase {
    pub phase_name: String,
    #[serde(default)]
    pub cycle_count: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub cycles: Vec<Cycle>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Protocol {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cancer_type: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub phases: Vec<Phase>,
}

impl Protocol {
    pub fn phase(&self, phase_name: &str) -> Option<&Phase> {
        let wanted = phase_name.trim().to_lowercase();
        self.phases
            .iter()
            .find(|p| p.phase_name.trim().to_lowercase() == wanted)
    }
}

impl Phase {
    /// All treatments of the phase, flattened across cycles in order.
    pub fn treatment_specs(&self) -> Vec<TreatmentSpec> {
        self.cycles
            .iter()
            .flat_map(|c| c.treatments.iter())
            .map(|t| TreatmentSpec::new(t.medication.clone(), t.dose.clone(), t.days.clone()))
            .collect()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ProtocolDatabase {
    #[serde(default)]
    pub protocols: Vec<Protocol>,
}

/// Query interface the scheduler reads protocol data through.
pub trait TreatmentSource {
    /// Flat treatment list for one phase of one protocol version.
    /// `version: None` selects the first stored version.
    fn list_treatments(
        &self,
        protocol: &str,
        version: Option<&str>,
        phase: &str,
    ) -> Result<Vec<TreatmentSpec>, StoreError>;
}

impl ProtocolDatabase {
    /// Looks up a protocol by name (case-insensitive) and optional version.
    pub fn find(&self, name: &str, version: Option<&str>) -> Result<&Protocol, StoreError> {
        let name_lower = name.trim().to_lowercase();
        let mut candidates = self
            .protocols
            .iter()
            .filter(|p| p.name.to_lowercase() == name_lower)
            .peekable();

        if candidates.peek().is_none() {
            return Err(StoreError::ProtocolNotFound(name.to_string()));
        }

        match version {
            None => candidates
                .next()
                .ok_or_else(|| StoreError::ProtocolNotFound(name.to_string())),
            Some(v) => candidates
                .find(|p| p.version.trim() == v.trim())
                .ok_or_else(|| StoreError::VersionNotFound {
                    protocol: name.to_string(),
                    version: v.to_string(),
                }),
        }
    }

    /// Phase names of a protocol version, in stored order.
    pub fn phase_names(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Vec<String>, StoreError> {
        let protocol = self.find(name, version)?;
        Ok(protocol.phases.iter().map(|p| p.phase_name.clone()).collect())
    }

    /// Adds a protocol, failing if the same name and version already exist
    /// unless `replace` is set.
    pub fn insert(&mut self, protocol: Protocol, replace: bool) -> Result<(), StoreError> {
        if protocol.name.trim().is_empty() {
            return Err(StoreError::InvalidInput("protocol name cannot be empty".into()));
        }

        let name_lower = protocol.name.to_lowercase();
        let existing = self
            .protocols
            .iter()
            .position(|p| p.name.to_lowercase() == name_lower && p.version == protocol.version);

        match existing {
            Some(_) if !replace => Err(StoreError::AlreadyExists {
                protocol: protocol.name,
                version: protocol.version,
            }),
            Some(index) => {
                self.protocols[index] = protocol;
                Ok(())
            }
            None => {
                self.protocols.push(protocol);
                Ok(())
            }
        }
    }
}

impl TreatmentSource for ProtocolDatabase {
    fn list_treatments(
        &self,
        protocol: &str,
        version: Option<&str>,
        phase: &str,
    ) -> Result<Vec<TreatmentSpec>, StoreError> {
        let found = self.find(protocol, version)?;
        let phase = found.phase(phase).ok_or_else(|| StoreError::PhaseNotFound {
            protocol: protocol.to_string(),
            phase: phase.to_string(),
        })?;
        Ok(phase.treatment_specs())
    }
}

/// Returns the default path of the protocol store.
///
/// Falls back to `./.oncocal.json` if no home directory is found.
pub fn default_store_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".oncocal.json")
}

/// Loads the protocol store from disk.
///
/// A missing file is an empty store. A file that cannot be parsed is
/// copied to `<name>.json.corrupted` and reported as an error.
pub fn load_database(path: &Path) -> Result<ProtocolDatabase, StoreError> {
    if !path.exists() {
        info!(path = %path.display(), "protocol store not found, starting empty");
        return Ok(ProtocolDatabase::default());
    }

    let contents = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match serde_json::from_str::<ProtocolDatabase>(&contents) {
        Ok(db) => Ok(db),
        Err(source) => {
            let backup = path.with_extension("json.corrupted");
            if let Err(e) = fs::copy(path, &backup) {
                warn!(error = %e, backup = %backup.display(), "failed to back up corrupted store");
            }
            Err(StoreError::Corrupted {
                path: path.to_path_buf(),
                backup,
                source,
            })
        }
    }
}

/// Saves the protocol store atomically (temp file, then rename) and sets
/// 0600 permissions on Unix.
pub fn save_database(path: &Path, db: &ProtocolDatabase) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(db).map_err(StoreError::Serialization)?;
    let write_err = |source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    };

    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, &json).map_err(write_err)?;

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_err(e));
    }

    #[cfg(unix)]
    {
        if let Ok(metadata) = fs::metadata(path) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            if let Err(e) = fs::set_permissions(path, perms) {
                warn!(error = %e, "failed to set store file permissions");
            }
        }
    }

    Ok(())
}

#[derive(Deserialize, Debug)]
struct LegacyTreatment {
    name: String,
    #[serde(default)]
    dosage: String,
    #[serde(default)]
    days: Vec<u32>,
}

#[derive(Deserialize, Debug)]
struct LegacyPhase {
    phase: String,
    #[serde(default)]
    treatments: Vec<LegacyTreatment>,
}

/// Converts a per-protocol phase list (`[{"phase", "treatments": [{"name",
/// "dosage", "days": [..]}]}]`) into a protocol with one cycle per phase.
pub fn protocol_from_legacy(
    json: &str,
    name: &str,
    version: &str,
) -> Result<Protocol, serde_json::Error> {
    let phases: Vec<LegacyPhase> = serde_json::from_str(json)?;

    let phases = phases
        .into_iter()
        .map(|legacy| Phase {
            phase_name: legacy.phase,
            cycles: vec![Cycle {
                treatments: legacy
                    .treatments
                    .into_iter()
                    .map(|t| Treatment {
                        medication: t.name,
                        dose: t.dosage,
                        days: format_days(&t.days),
                        ..Treatment::default()
                    })
                    .collect(),
                ..Cycle::default()
            }],
            ..Phase::default()
        })
        .collect();

    Ok(Protocol {
        name: name.to_string(),
        version: version.to_string(),
        phases,
        ..Protocol::default()
    })
}

/// Reads a legacy protocol file and stores it.
pub fn import_legacy_file(
    store_path: &Path,
    file: &Path,
    name: &str,
    version: &str,
    replace: bool,
) -> Result<Protocol, StoreError> {
    let contents = fs::read_to_string(file).map_err(|source| StoreError::Read {
        path: file.to_path_buf(),
        source,
    })?;
    let protocol =
        protocol_from_legacy(&contents, name, version).map_err(|source| StoreError::LegacyFormat {
            path: file.to_path_buf(),
            source,
        })?;

    let mut db = load_database(store_path)?;
    db.insert(protocol.clone(), replace)?;
    save_database(store_path, &db)?;
    info!(protocol = name, version, phases = protocol.phases.len(), "imported legacy protocol");
    Ok(protocol)
}
