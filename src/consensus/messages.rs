//! Wire payloads exchanged between peers.
//!
//! Transport is JSON over HTTP; these types fix the field names on the
//! wire (`opType`, `key`, `value`, `leader`, `sender`, `mode`).

use serde::{Deserialize, Serialize};

/// Keys with this prefix mark refresh operations: consensus-committed
/// for liveness measurement, but never applied as user data and never
/// allowed to reshape the Weight Book.
pub const DUMMY_KEY_PREFIX: &str = "__cabinet_dummy__";

/// Kind of mutation flowing through consensus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Put,
    Delete,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Put => "PUT",
            OpKind::Delete => "DELETE",
        }
    }
}

/// A single mutation of the shared key space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(rename = "opType")]
    pub kind: OpKind,
    pub key: String,
    /// Empty for DELETE.
    #[serde(default)]
    pub value: String,
}

impl Operation {
    pub fn put(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: OpKind::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    /// A refresh proposal with a time-varying value, committed only to
    /// force a liveness-reflecting Weight Book recomputation.
    pub fn refresh() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Self::put(DUMMY_KEY_PREFIX, format!("refresh-{nanos}"))
    }

    /// Whether this operation carries the dummy-key prefix.
    pub fn is_refresh(&self) -> bool {
        self.key.starts_with(DUMMY_KEY_PREFIX)
    }
}

/// Body of `/api/leader` responses and `/api/set-leader` requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderInfo {
    /// Leader endpoint; empty while no leader is known.
    #[serde(default)]
    pub leader: String,
}

/// Body of `/api/notify-consensus` requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusNotice {
    /// Short id of the peer announcing itself.
    pub sender: String,
}

/// Body of `/api/mode` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeInfo {
    pub mode: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_wire_field_names() {
        let op = Operation::put("foo", "bar");
        let json = serde_json::to_string(&op).unwrap();
        assert_eq!(json, r#"{"opType":"PUT","key":"foo","value":"bar"}"#);

        let parsed: Operation = serde_json::from_str(r#"{"opType":"DELETE","key":"foo"}"#).unwrap();
        assert_eq!(parsed.kind, OpKind::Delete);
        assert_eq!(parsed.value, "");
    }

    #[test]
    fn test_refresh_operations_carry_the_dummy_prefix() {
        let op = Operation::refresh();
        assert!(op.is_refresh());
        assert!(op.value.starts_with("refresh-"));
        assert!(!Operation::put("user-key", "v").is_refresh());
        // Any key extending the prefix still counts as a refresh.
        assert!(Operation::put(format!("{DUMMY_KEY_PREFIX}refresh-123"), "v").is_refresh());
    }
}
