//! The privilege-drop sequence, ending in process replacement.
//!
//! ```text
//! CheckIdentity ──non-root──────────────────────────────────┐
//!      │                                                     v
//!      └─root──> ResolveAndMaterialize ──> ApplyOwnership ──> Replace
//! ```

use std::convert::Infallible;
use std::os::unix::process::CommandExt;
use std::process::Command;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::accounts::AccountManager;
use crate::command::command_argv;
use crate::config::Config;
use crate::config::PrivilegeSwitch;
use crate::directory::IdentityDirectory;
use crate::directory::effective_user_name;
use crate::error::Result;
use crate::error::RunNonRootErr;
use crate::materializer::Materializer;
use crate::ownership::OwnershipSummary;
use crate::ownership::OwnershipUpdater;
use crate::plan::DryRun;
use crate::plan::ExecutionPlan;
use crate::plan::Invocation;
use crate::resolver::Resolver;

pub struct Executor<'a, D, A> {
    directory: &'a D,
    accounts: &'a A,
    config: &'a Config,
}

impl<'a, D: IdentityDirectory, A: AccountManager> Executor<'a, D, A> {
    pub fn new(directory: &'a D, accounts: &'a A, config: &'a Config) -> Self {
        Self {
            directory,
            accounts,
            config,
        }
    }

    /// Runs the whole sequence. Only returns if something failed before or
    /// during process replacement.
    pub fn run(&self, invocation: Invocation, superuser: bool) -> Result<Infallible> {
        let quiet = invocation.request.quiet;
        let plan = self.prepare(invocation, superuser)?;
        self.apply_ownership(&plan, quiet)?;
        Err(replace(&plan, self.config))
    }

    /// CheckIdentity and, for the superuser, ResolveAndMaterialize.
    pub fn prepare(&self, invocation: Invocation, superuser: bool) -> Result<ExecutionPlan> {
        let Invocation {
            request,
            command,
            init,
            paths,
            recursive_paths,
        } = invocation;
        let command = command.to_command_line(self.config);

        if !superuser {
            // Only used for logging; a broken passwd database must not stop the run.
            let current = effective_user_name(self.directory).ok().flatten();
            debug!("running as {}", current.as_deref().unwrap_or("<unknown>"));
            if !request.quiet
                && (request.names_an_identity() || !paths.is_empty() || !recursive_paths.is_empty())
            {
                warn!("not running as root; ignoring user, group and path options");
            }
            return Ok(ExecutionPlan {
                identity: None,
                command,
                init,
                paths: Vec::new(),
                recursive_paths: Vec::new(),
            });
        }

        let resolution = Resolver::new(self.directory, &self.config.default_name).resolve(&request)?;
        let identity = Materializer::new(
            self.directory,
            self.accounts,
            &self.config.default_name,
            &self.config.shell,
        )
        .materialize(&request, &resolution)?;
        info!(
            "running as {}:{} ({}:{})",
            identity.user, identity.group, identity.uid, identity.gid
        );

        Ok(ExecutionPlan {
            identity: Some(identity),
            command,
            init,
            paths,
            recursive_paths,
        })
    }

    /// ApplyOwnership. A no-op for plans without an identity.
    pub fn apply_ownership(&self, plan: &ExecutionPlan, quiet: bool) -> Result<()> {
        let Some(identity) = &plan.identity else {
            return Ok(());
        };
        let updater = OwnershipUpdater::new(identity, quiet);
        let mut reports = updater.update(&plan.paths);
        reports.extend(updater.update_recursive(&plan.recursive_paths)?);
        if !quiet && !reports.is_empty() {
            let summary = OwnershipSummary::from_reports(&reports);
            info!(
                "ownership for {}:{}: {} changed, {} already owned, {} failed",
                identity.uid, identity.gid, summary.changed, summary.already_owned, summary.failed
            );
        }
        Ok(())
    }

    /// Resolves without creating anything, changing ownership or executing.
    pub fn dry_run(&self, invocation: &Invocation, superuser: bool) -> Result<DryRun> {
        let resolution = if superuser {
            Some(
                Resolver::new(self.directory, &self.config.default_name)
                    .resolve(&invocation.request)?,
            )
        } else {
            None
        };
        let command = invocation.command.to_command_line(self.config);
        let argv = command_argv(&command, &self.config.shell)?;
        Ok(DryRun {
            superuser,
            request: invocation.request.clone(),
            resolution,
            command,
            argv,
            init: invocation.init,
        })
    }
}

/// Replaces the current process image with the planned command.
///
/// Returns only on failure.
pub fn replace(plan: &ExecutionPlan, config: &Config) -> RunNonRootErr {
    let argv = match plan.argv(config) {
        Ok(argv) => argv,
        Err(err) => return err,
    };
    if plan.init
        && let Err(err) = require_tool(&config.init.program)
    {
        return err;
    }
    if plan.identity.is_some()
        && let PrivilegeSwitch::Helper(helper) = &config.privilege_switch
        && let Err(err) = require_tool(helper)
    {
        return err;
    }

    let Some((program, args)) = argv.split_first() else {
        return RunNonRootErr::EmptyCommand;
    };
    let mut command = Command::new(program);
    command.args(args);
    if let (Some(identity), PrivilegeSwitch::Native) = (&plan.identity, &config.privilege_switch) {
        // Supplementary groups are cleared when the uid changes.
        command
            .gid(identity.gid)
            .uid(identity.uid)
            .env("HOME", &identity.home)
            .env("USER", &identity.user)
            .env("LOGNAME", &identity.user);
    }
    debug!(?argv, "replacing process");
    let source = command.exec();
    RunNonRootErr::Exec {
        program: program.clone(),
        source,
    }
}

fn require_tool(program: &str) -> Result<()> {
    which::which(program)
        .map(|_| ())
        .map_err(|_| RunNonRootErr::MissingTool(program.to_string()))
}
