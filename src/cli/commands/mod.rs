//! One module per subcommand; each exposes an `execute` function.

pub mod add;
pub mod check;
pub mod generate;
pub mod get;
pub mod init;
pub mod list;
pub mod note;
pub mod passwd;
pub mod remove;
pub mod shell;
pub mod status;
pub mod update;
