//! Subcommands of the `tessdb` tool.
//!
//! Each command writes its report to the supplied writer so the binary can
//! target stdout and tests can capture the output.

mod init;
mod inspect;

pub use init::init;
pub use inspect::{names, show, verify, ShowFormat};
