//! Group and user creation through the host's account-management tools.
//!
//! Tools are always invoked with an explicit argv; names never pass through a
//! shell.

use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use tracing::debug;

use crate::config::AccountTools;
use crate::error::Result;
use crate::error::RunNonRootErr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub name: String,
    /// `None` lets the tool pick the next free id.
    pub gid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    /// `None` lets the tool pick the next free id.
    pub uid: Option<u32>,
    /// Primary group id.
    pub gid: u32,
    /// Name of the primary group; BusyBox `adduser` only accepts names.
    pub group: String,
    pub shell: PathBuf,
}

/// Creates entries in the host databases.
pub trait AccountManager {
    fn create_group(&self, group: &NewGroup) -> Result<()>;

    /// Creates the user together with its home directory.
    fn create_user(&self, user: &NewUser) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Shadow,
    Busybox,
}

impl Flavor {
    fn group_tool(self) -> &'static str {
        match self {
            Flavor::Shadow => "groupadd",
            Flavor::Busybox => "addgroup",
        }
    }

    fn user_tool(self) -> &'static str {
        match self {
            Flavor::Shadow => "useradd",
            Flavor::Busybox => "adduser",
        }
    }
}

/// [`AccountManager`] backed by shadow-utils or BusyBox.
///
/// The flavor is picked lazily so that runs that never create anything do
/// not require the tools to be installed.
#[derive(Debug, Clone, Copy)]
pub struct SystemAccounts {
    tools: AccountTools,
}

impl SystemAccounts {
    pub fn new(tools: AccountTools) -> Self {
        Self { tools }
    }

    fn flavor(&self) -> Result<Flavor> {
        let candidates: &[Flavor] = match self.tools {
            AccountTools::Auto => &[Flavor::Shadow, Flavor::Busybox],
            AccountTools::Shadow => &[Flavor::Shadow],
            AccountTools::Busybox => &[Flavor::Busybox],
        };
        for flavor in candidates {
            if which::which(flavor.group_tool()).is_ok() && which::which(flavor.user_tool()).is_ok()
            {
                debug!("using {} and {}", flavor.group_tool(), flavor.user_tool());
                return Ok(*flavor);
            }
        }
        // Report the first tool of the preferred flavor that is missing.
        let preferred = candidates.first().copied().unwrap_or(Flavor::Shadow);
        let missing = if which::which(preferred.group_tool()).is_err() {
            preferred.group_tool()
        } else {
            preferred.user_tool()
        };
        Err(RunNonRootErr::MissingTool(missing.to_string()))
    }
}

impl AccountManager for SystemAccounts {
    fn create_group(&self, group: &NewGroup) -> Result<()> {
        let flavor = self.flavor()?;
        let argv = group_argv(flavor, group);
        run_tool(&argv).map_err(|detail| RunNonRootErr::GroupCreation {
            name: group.name.clone(),
            gid: group.gid,
            detail,
        })
    }

    fn create_user(&self, user: &NewUser) -> Result<()> {
        let flavor = self.flavor()?;
        let argv = user_argv(flavor, user);
        run_tool(&argv).map_err(|detail| RunNonRootErr::UserCreation {
            name: user.name.clone(),
            uid: user.uid,
            detail,
        })
    }
}

fn group_argv(flavor: Flavor, group: &NewGroup) -> Vec<String> {
    let mut argv = vec![flavor.group_tool().to_string()];
    if let Some(gid) = group.gid {
        argv.push("-g".to_string());
        argv.push(gid.to_string());
    }
    argv.push(group.name.clone());
    argv
}

fn user_argv(flavor: Flavor, user: &NewUser) -> Vec<String> {
    let shell = user.shell.to_string_lossy().to_string();
    let mut argv = match flavor {
        Flavor::Shadow => vec![
            "useradd".to_string(),
            "-m".to_string(),
            "-g".to_string(),
            user.gid.to_string(),
            "-s".to_string(),
            shell,
        ],
        // BusyBox creates the home directory unless -H is given; -D skips
        // the password prompt.
        Flavor::Busybox => vec![
            "adduser".to_string(),
            "-D".to_string(),
            "-G".to_string(),
            user.group.clone(),
            "-s".to_string(),
            shell,
        ],
    };
    if let Some(uid) = user.uid {
        argv.push("-u".to_string());
        argv.push(uid.to_string());
    }
    argv.push(user.name.clone());
    argv
}

/// Runs a tool to completion. On failure returns a description including
/// the tool's stderr.
fn run_tool(argv: &[String]) -> std::result::Result<(), String> {
    let Some((program, args)) = argv.split_first() else {
        return Err("empty command".to_string());
    };
    debug!(?argv, "running account tool");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|err| format!("failed to run {program}: {err}"))?;
    if output.status.success() {
        return Ok(());
    }
    Err(describe_failure(program, &output))
}

fn describe_failure(program: &str, output: &Output) -> String {
    let status = output
        .status
        .code()
        .map(|code| format!("exited with status {code}"))
        .unwrap_or_else(|| "was terminated by a signal".to_string());
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("{program} {status}")
    } else {
        format!("{program} {status}: {stderr}")
    }
}
