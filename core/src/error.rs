use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RunNonRootErr>;

pub const LOOKUP_FAILED_EXIT_CODE: i32 = 1;
pub const USAGE_EXIT_CODE: i32 = 2;
pub const INVALID_ID_EXIT_CODE: i32 = 3;
pub const INVALID_NAME_EXIT_CODE: i32 = 4;
pub const GROUP_CREATION_FAILED_EXIT_CODE: i32 = 5;
pub const USER_CREATION_FAILED_EXIT_CODE: i32 = 6;
pub const DIRECTORY_CREATION_FAILED_EXIT_CODE: i32 = 7;
pub const MISSING_TOOL_EXIT_CODE: i32 = 8;
pub const INVALID_CONFIG_EXIT_CODE: i32 = 9;
pub const INVALID_COMMAND_EXIT_CODE: i32 = 10;
pub const EXEC_FAILED_EXIT_CODE: i32 = 11;

/// Which identity database an id or name belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountKind {
    User,
    Group,
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountKind::User => f.write_str("user"),
            AccountKind::Group => f.write_str("group"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunNonRootErr {
    #[error("invalid {kind} id {value:?}: expected a non-negative integer")]
    InvalidId { kind: AccountKind, value: String },

    #[error("invalid {kind} name {name:?}: {reason}")]
    InvalidName {
        kind: AccountKind,
        name: String,
        reason: &'static str,
    },

    #[error("failed to look up {what}: {source}")]
    Lookup {
        what: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to create group {name}{}: {detail}", .gid.map(id_suffix).unwrap_or_default())]
    GroupCreation {
        name: String,
        gid: Option<u32>,
        detail: String,
    },

    #[error("failed to create user {name}{}: {detail}", .uid.map(id_suffix).unwrap_or_default())]
    UserCreation {
        name: String,
        uid: Option<u32>,
        detail: String,
    },

    #[error("failed to create directory {}: {source}", path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("required tool `{0}` was not found on PATH")]
    MissingTool(String),

    #[error("failed to read config {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {}: {detail}", path.display())]
    ConfigParse { path: PathBuf, detail: String },

    #[error("could not parse command {0:?}")]
    CommandParse(String),

    #[error("no command to execute")]
    EmptyCommand,

    #[error("failed to execute {program}: {source}")]
    Exec {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl RunNonRootErr {
    /// Process exit status used when this error ends the invocation.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunNonRootErr::InvalidId { .. } => INVALID_ID_EXIT_CODE,
            RunNonRootErr::InvalidName { .. } => INVALID_NAME_EXIT_CODE,
            RunNonRootErr::Lookup { .. } => LOOKUP_FAILED_EXIT_CODE,
            RunNonRootErr::GroupCreation { .. } => GROUP_CREATION_FAILED_EXIT_CODE,
            RunNonRootErr::UserCreation { .. } => USER_CREATION_FAILED_EXIT_CODE,
            RunNonRootErr::DirectoryCreation { .. } => DIRECTORY_CREATION_FAILED_EXIT_CODE,
            RunNonRootErr::MissingTool(_) => MISSING_TOOL_EXIT_CODE,
            RunNonRootErr::ConfigRead { .. } | RunNonRootErr::ConfigParse { .. } => {
                INVALID_CONFIG_EXIT_CODE
            }
            RunNonRootErr::CommandParse(_) | RunNonRootErr::EmptyCommand => {
                INVALID_COMMAND_EXIT_CODE
            }
            RunNonRootErr::Exec { .. } => EXEC_FAILED_EXIT_CODE,
        }
    }
}

fn id_suffix(id: u32) -> String {
    format!(" with id {id}")
}
