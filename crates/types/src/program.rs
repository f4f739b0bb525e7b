//! Program catalog entries.

use crate::ProgramId;
use serde::{Deserialize, Serialize};

/// One performance in the gala program catalog.
///
/// Immutable after creation except for deletion. Owned exclusively by the
/// host; voters hold read-only copies received via `SYNC_STATE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    /// Unique id assigned by the host at creation.
    pub id: ProgramId,
    /// Display name.
    pub name: String,
    /// Performer or group.
    pub performer: String,
    /// One-line description shown to voters.
    pub description: String,
    /// Opaque asset key used by display layers to pick artwork.
    pub display_key: String,
}

/// Admin-supplied fields for a new program, before the host assigns an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDraft {
    /// Display name.
    pub name: String,
    /// Performer or group.
    pub performer: String,
    /// One-line description shown to voters.
    pub description: String,
    /// Opaque asset key used by display layers to pick artwork.
    pub display_key: String,
}

impl ProgramDraft {
    /// Create a draft with the given display fields.
    pub fn new(
        name: impl Into<String>,
        performer: impl Into<String>,
        description: impl Into<String>,
        display_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            performer: performer.into(),
            description: description.into(),
            display_key: display_key.into(),
        }
    }

    /// Materialize the draft into a program with a host-assigned id.
    pub fn into_program(self, id: ProgramId) -> Program {
        Program {
            id,
            name: self.name,
            performer: self.performer,
            description: self.description,
            display_key: self.display_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_wire_field_names() {
        let program = ProgramDraft::new("Opening Dance", "Dance Troupe", "High energy", "img-10")
            .into_program(ProgramId::new("1"));
        let json = serde_json::to_value(&program).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["displayKey"], "img-10");
        assert!(json.get("display_key").is_none());
    }
}
