//! Wire-visible identifier helpers.
//!
//! Internally every id is a UUIDv7 (time-sortable, as the reference crate
//! uses throughout its storage layer). Externally ids are wire-formatted
//! as `prefix_base36(timestampMs)_base36(rand)`, so these newtypes carry
//! both: a `Uuid` for storage/indexing and a `Display` impl that renders
//! the wire form.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Render a UUIDv7 as `prefix_<base36 millis>_<base36 random bits>`.
///
/// UUIDv7 packs a 48-bit millisecond timestamp into its first 6 bytes;
/// the remaining bytes (minus version/variant bits) are random. Splitting
/// on that boundary gives the two base36 segments the wire format names
/// without inventing a second id scheme.
pub fn base36_id(prefix: &str, id: Uuid) -> String {
    let bytes = id.as_bytes();
    let millis = u64::from_be_bytes([
        0, 0, bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5],
    ]);
    let rand = u64::from_be_bytes([
        bytes[8], bytes[9], bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
    ]);
    format!("{prefix}_{}_{}", to_base36(millis), to_base36(rand))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap()
}

macro_rules! wire_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn wire(&self) -> String {
                base36_id($prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.wire())
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

wire_id!(NodeId, "node");
wire_id!(EdgeId, "edge");
wire_id!(InputId, "inp");
wire_id!(StagingId, "stg");
wire_id!(ChunkId, "chunk");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_form_has_two_segments_after_prefix() {
        let id = NodeId::new();
        let wire = id.wire();
        let mut parts = wire.split('_');
        assert_eq!(parts.next(), Some("node"));
        assert!(parts.next().is_some());
        assert!(parts.next().is_some());
        assert!(parts.next().is_none());
    }

    #[test]
    fn base36_zero_is_zero() {
        assert_eq!(to_base36(0), "0");
    }

    #[test]
    fn ids_round_trip_through_uuid() {
        let u = Uuid::now_v7();
        let id = NodeId::from(u);
        assert_eq!(id.0, u);
    }
}
