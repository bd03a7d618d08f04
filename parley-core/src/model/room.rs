use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const TWO_PARTY_DIGITS: usize = 7;
const MULTI_PARTY_GROUPS: usize = 3;
const MULTI_PARTY_GROUP_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoomKind {
    /// `^[0-9]{7}$`: the relay broadcasts between the (at most) two members.
    TwoParty,
    /// `^[a-z]{4}-[a-z]{4}-[a-z]{4}$`: the relay unicasts by peer identity.
    MultiParty,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomIdError {
    #[error("'{0}' is not a recognised room identifier")]
    Unrecognized(String),
}

/// Opaque room identifier whose shape selects the relay's fan-out mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId {
    value: String,
    kind: RoomKind,
}

impl RoomId {
    /// Parses a room identifier, tolerating the `#room` (URL hash) and
    /// `/room` (namespace) forms.
    pub fn parse(raw: &str) -> Result<Self, RoomIdError> {
        let value = raw.trim_start_matches(['#', '/']);

        let kind = if is_two_party(value) {
            RoomKind::TwoParty
        } else if is_multi_party(value) {
            RoomKind::MultiParty
        } else {
            return Err(RoomIdError::Unrecognized(raw.to_owned()));
        };

        Ok(Self {
            value: value.to_owned(),
            kind,
        })
    }

    pub fn generate(kind: RoomKind) -> Self {
        let mut rng = rand::thread_rng();

        let value = match kind {
            RoomKind::TwoParty => (0..TWO_PARTY_DIGITS)
                .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
                .collect(),
            RoomKind::MultiParty => (0..MULTI_PARTY_GROUPS)
                .map(|_| {
                    (0..MULTI_PARTY_GROUP_LEN)
                        .map(|_| char::from(b'a' + rng.gen_range(0..26u8)))
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("-"),
        };

        Self { value, kind }
    }

    /// Reuses `existing` when it is a valid identifier of the requested kind,
    /// otherwise generates a fresh one.
    pub fn prepare(existing: Option<&str>, kind: RoomKind) -> Self {
        match existing.map(Self::parse) {
            Some(Ok(room)) if room.kind == kind => room,
            _ => Self::generate(kind),
        }
    }

    pub fn kind(&self) -> RoomKind {
        self.kind
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

fn is_two_party(value: &str) -> bool {
    value.len() == TWO_PARTY_DIGITS && value.bytes().all(|b| b.is_ascii_digit())
}

fn is_multi_party(value: &str) -> bool {
    let groups: Vec<&str> = value.split('-').collect();

    groups.len() == MULTI_PARTY_GROUPS
        && groups.iter().all(|group| {
            group.len() == MULTI_PARTY_GROUP_LEN && group.bytes().all(|b| b.is_ascii_lowercase())
        })
}

impl FromStr for RoomId {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl Serialize for RoomId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.value)
    }
}

impl<'de> Deserialize<'de> for RoomId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
