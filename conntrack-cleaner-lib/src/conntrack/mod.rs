mod cli;
mod key;
mod parser;
mod record;

pub use cli::{
    delete_args, filter_unreplied, CommandError, ConntrackCli, DeletionExecutor, TableSampler,
    UNREPLIED_MARKER,
};
pub use key::ConnKey;
pub use parser::{parse_line, parse_table, DecodeError};
pub use record::{ConnRecord, Protocol};
