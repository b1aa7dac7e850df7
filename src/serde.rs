//! # Serde module for UniqState
//!
//! This module provides serde-based (serialization and deserialization) features for
//! `UniqState`, for embedders which ship partial aggregate states through their own
//! serde-based formats.
//!
//! A state is serialized as a tuple `(kind, payload)`: `kind` is the `u8` tag of the set kind
//! and `payload` holds the bytes written by the native binary format.
//!
//! During deserialization the payload is parsed with the same validation as
//! `AggregateFunctionUniq::deserialize_bytes`, so corrupt input is reported as a serde error.
use serde::de::Error as _;
use serde::ser::{Error as _, SerializeTuple};
use serde::{Deserialize, Serialize};

use crate::state::{DistinctSet, UniqState};

impl Serialize for UniqState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut payload = Vec::new();
        self.write_to(&mut payload).map_err(S::Error::custom)?;

        let mut tup = serializer.serialize_tuple(2)?;
        tup.serialize_element(&self.tag())?;
        tup.serialize_element(&payload)?;
        tup.end()
    }
}

impl<'de> Deserialize<'de> for UniqState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (tag, payload): (u8, Vec<u8>) = Deserialize::deserialize(deserializer)?;
        UniqState::from_parts(tag, &payload).map_err(D::Error::custom)
    }
}
