//! Store access: connection setup and schema verification

pub mod init;
pub mod schema_check;

pub use init::*;
pub use schema_check::*;
