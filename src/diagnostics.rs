//! A collector for non-fatal mapping diagnostics.
//!
//! Missing optional attributes, discarded parser columns and devices dropped
//! by the registry are not errors. They are pushed into a [`Diagnostics`]
//! collector that travels with the build result, so callers (and tests) can
//! inspect them directly. Every entry is also emitted as a `tracing` warning.

use serde::Serialize;
use std::fmt;

/// Category of a recorded diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// An optional attribute was absent; a null placeholder was used.
    MissingAttribute,
    /// An expected dataset field was absent.
    MissingField,
    /// A value discovered from a group name disagrees with its attribute.
    AttributeMismatch,
    /// A best-effort sub-group was absent or did not follow naming conventions.
    MissingSubgroup,
    /// A parsed column was discarded (nulls or mixed types).
    DroppedColumn,
    /// Regex parsing of a command list did not succeed.
    UnsuccessfulParse,
    /// The registry dropped a device whose mapping failed.
    DroppedDevice,
    /// A configuration was skipped while building a device map.
    DroppedConfiguration,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::MissingAttribute => "missing attribute",
            DiagnosticKind::MissingField => "missing field",
            DiagnosticKind::AttributeMismatch => "attribute mismatch",
            DiagnosticKind::MissingSubgroup => "missing sub-group",
            DiagnosticKind::DroppedColumn => "dropped column",
            DiagnosticKind::UnsuccessfulParse => "unsuccessful parse",
            DiagnosticKind::DroppedDevice => "dropped device",
            DiagnosticKind::DroppedConfiguration => "dropped configuration",
        };
        f.write_str(label)
    }
}

/// A single recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// What kind of anomaly this is.
    pub kind: DiagnosticKind,
    /// Device, configuration or column the diagnostic is about.
    pub source: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.source, self.message)
    }
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    #[serde(skip)]
    muted: bool,
}

impl Diagnostics {
    /// Empty collector that also logs every entry as a warning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collector that records entries but logs them at debug level only.
    pub fn muted() -> Self {
        Self {
            entries: Vec::new(),
            muted: true,
        }
    }

    /// True if entries are logged at debug level only.
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Record a diagnostic and emit it as a warning (debug when muted).
    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        source: impl Into<String>,
        message: impl Into<String>,
    ) {
        let entry = Diagnostic {
            kind,
            source: source.into(),
            message: message.into(),
        };
        if self.muted {
            tracing::debug!(kind = %entry.kind, source = %entry.source, "{}", entry.message);
        } else {
            tracing::warn!(kind = %entry.kind, source = %entry.source, "{}", entry.message);
        }
        self.entries.push(entry);
    }

    /// Move all entries of `other` into `self`.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    /// Entries in recording order.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// True if empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate over the diagnostics of one kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }

    /// True if any recorded message contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|d| d.message.contains(needle))
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
