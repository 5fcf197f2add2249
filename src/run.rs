mod cli;

pub use cli::{as_cli, Invocation};
pub(crate) use cli::shellexpand;
