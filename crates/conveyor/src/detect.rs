//! Filename-based file kind detection.
//!
//! Pure and total: every name maps to exactly one [`FileKind`], with no I/O.
//! Explicit extensions win over name heuristics, so `wifi_summary.csv` is
//! tabular data even though its name mentions wifi.

use serde::{Deserialize, Serialize};

/// Extensions accepted at the file-selection boundary.
///
/// Informational only — detection below is independent of this list and
/// handles arbitrary names.
pub const ACCEPTED_EXTENSIONS: &[&str] = &[".csv", ".xlsx", ".xls", ".glb", ".gltf", ".json"];

/// The processing category a submitted file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileKind {
    TabularCsv,
    TabularExcel,
    Model3d,
    WifiTelemetry,
    JsonMetadata,
    Unknown,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileKind::TabularCsv => write!(f, "tabular-csv"),
            FileKind::TabularExcel => write!(f, "tabular-excel"),
            FileKind::Model3d => write!(f, "model3d"),
            FileKind::WifiTelemetry => write!(f, "wifi-telemetry"),
            FileKind::JsonMetadata => write!(f, "json-metadata"),
            FileKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Maps a filename to its [`FileKind`].
///
/// Precedence: unambiguous extensions first, then telemetry name heuristics,
/// then `.json` as metadata, then [`FileKind::Unknown`]. The heuristic sits
/// above the `.json` rule so `wifi_log_03.json` is telemetry, not metadata.
pub fn detect(name: &str) -> FileKind {
    let lower = name.to_lowercase();
    let extension = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");

    match extension {
        "csv" => return FileKind::TabularCsv,
        "xlsx" | "xls" => return FileKind::TabularExcel,
        "glb" | "gltf" => return FileKind::Model3d,
        _ => {}
    }

    if ["wifi", "tracking", "sensor"]
        .iter()
        .any(|hint| lower.contains(hint))
    {
        return FileKind::WifiTelemetry;
    }

    if extension == "json" {
        return FileKind::JsonMetadata;
    }

    FileKind::Unknown
}
