//! Subcommand implementations

pub(crate) mod build;
pub(crate) mod completion;
pub(crate) mod doctor;
pub(crate) mod fetch;
