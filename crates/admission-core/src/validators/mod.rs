//! Cross-object reference validators (C7): one sub-validator per
//! request-kind, each a family of checks that accumulate into one
//! [`crate::error::Forbid`] unless explicitly marked fatal (spec §4.7).

pub mod backup_entry;
pub mod backup_target;
pub mod cluster;
pub mod companion;
pub mod credentials_binding;
pub mod project;
pub mod seed;

/// Decodes a live-read's untyped JSON payload into a concrete model type,
/// treating a decode failure the same as not-found rather than surfacing a
/// parse error to the caller.
pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Option<T> {
    serde_json::from_value(value).ok()
}

