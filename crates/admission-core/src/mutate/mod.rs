//! The small set of mutators: OIDC-preset attachment, VPA-default-on,
//! created-by annotations, owner-defaulting, resource-version backfill
//! (spec §4.9).

pub mod cluster;
pub mod oidc;
pub mod project;
