//! Typed views of the Velero custom resources this tool drives.

pub mod backup;
pub mod backup_storage_location;
pub mod restore;
pub mod shared;
