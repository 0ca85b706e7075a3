use std::path::PathBuf;

use serde::Serialize;

use crate::command::command_argv;
use crate::command::reconstruct;
use crate::config::Config;
use crate::config::PrivilegeSwitch;
use crate::error::Result;
use crate::materializer::ResolvedIdentity;
use crate::request::IdentityRequest;
use crate::resolver::Resolution;

/// Where the command to run comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSource {
    /// Arguments received after the options (or after `--`).
    Argv(Vec<String>),
    /// A complete command line, e.g. from `RUN_NON_ROOT_COMMAND`.
    Line(String),
    /// Nothing given; run the configured default command.
    Default,
}

impl CommandSource {
    pub fn to_command_line(&self, config: &Config) -> String {
        match self {
            CommandSource::Argv(argv) => reconstruct(argv),
            CommandSource::Line(line) => line.clone(),
            CommandSource::Default => config.default_command.clone(),
        }
    }
}

/// Everything one invocation asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub request: IdentityRequest,
    pub command: CommandSource,
    /// Run the command under the signal-forwarding supervisor.
    pub init: bool,
    pub paths: Vec<PathBuf>,
    pub recursive_paths: Vec<PathBuf>,
}

/// Built once per invocation and consumed by process replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionPlan {
    /// `None` keeps the current identity.
    pub identity: Option<ResolvedIdentity>,
    pub command: String,
    pub init: bool,
    pub paths: Vec<PathBuf>,
    pub recursive_paths: Vec<PathBuf>,
}

impl ExecutionPlan {
    /// The argv that replaces this process: supervisor, then privilege
    /// helper, then the command itself.
    pub fn argv(&self, config: &Config) -> Result<Vec<String>> {
        let mut argv = Vec::new();
        if self.init {
            argv.push(config.init.program.clone());
            argv.extend(config.init.args.iter().cloned());
        }
        if let (Some(identity), PrivilegeSwitch::Helper(helper)) =
            (&self.identity, &config.privilege_switch)
        {
            argv.push(helper.clone());
            argv.push(format!("{}:{}", identity.user, identity.gid));
        }
        argv.extend(command_argv(&self.command, &config.shell)?);
        Ok(argv)
    }
}

/// What `--dry-run` reports instead of acting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DryRun {
    pub superuser: bool,
    pub request: IdentityRequest,
    pub resolution: Option<Resolution>,
    pub command: String,
    pub argv: Vec<String>,
    pub init: bool,
}
