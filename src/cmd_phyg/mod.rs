//! Subcommand modules for the `phyg` binary.

pub mod bbcalibrate;
pub mod bbdecompose;
pub mod bbinfer;
pub mod bbmerge;
pub mod bbreroot;
pub mod cladegraft;
pub mod cladeinfer;
pub mod clademerge;
pub mod classify;
pub mod consense;
pub mod taxize;
