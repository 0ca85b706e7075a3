//! Command-line surface of the `run-non-root` entrypoint.
#![cfg(unix)]

use std::path::PathBuf;

use anyhow::Context;
use clap::ArgAction;
use clap::Parser;
use clap::builder::FalseyValueParser;
use run_non_root_core::CommandSource;
use run_non_root_core::Config;
use run_non_root_core::Executor;
use run_non_root_core::IdentityRequest;
use run_non_root_core::Invocation;
use run_non_root_core::RawIdentityRequest;
use run_non_root_core::SystemAccounts;
use run_non_root_core::SystemDirectory;
use run_non_root_core::is_superuser;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a complete command line, used when no
/// command arguments are given.
pub const COMMAND_ENV_VAR: &str = "RUN_NON_ROOT_COMMAND";
pub const DEBUG_ENV_VAR: &str = "RUN_NON_ROOT_DEBUG";
/// Overrides the log filter derived from `--quiet` and `--debug`.
pub const LOG_ENV_VAR: &str = "RUN_NON_ROOT_LOG";

/// Run a command as a non-root user, creating the user and group if needed.
///
/// When started as root, the requested identity is resolved against the
/// user and group databases, created when missing, given ownership of the
/// requested paths, and finally used to replace this process with the
/// command. When not started as root, the command runs as the current user.
#[derive(Debug, Parser)]
#[command(name = "run-non-root", version)]
pub struct Cli {
    /// User id to run as.
    #[arg(short = 'u', long, env = "RUN_NON_ROOT_UID", allow_hyphen_values = true)]
    pub uid: Option<String>,

    /// Username to run as.
    #[arg(
        short = 't',
        long,
        env = "RUN_NON_ROOT_USER",
        value_name = "NAME",
        allow_hyphen_values = true
    )]
    pub user: Option<String>,

    /// Group id to run as.
    #[arg(short = 'f', long, env = "RUN_NON_ROOT_GID", allow_hyphen_values = true)]
    pub gid: Option<String>,

    /// Group name to run as.
    #[arg(
        short = 'g',
        long,
        env = "RUN_NON_ROOT_GROUP",
        value_name = "NAME",
        allow_hyphen_values = true
    )]
    pub group: Option<String>,

    /// Run the command under the init supervisor so signals are forwarded
    /// and zombies are reaped.
    #[arg(short = 'i', long, env = "RUN_NON_ROOT_INIT", value_parser = FalseyValueParser::new())]
    pub init: bool,

    /// Only print errors.
    #[arg(short = 'q', long, env = "RUN_NON_ROOT_QUIET", value_parser = FalseyValueParser::new())]
    pub quiet: bool,

    /// Print debug output; repeat for trace output. Also enabled by
    /// RUN_NON_ROOT_DEBUG.
    #[arg(short = 'd', long, action = ArgAction::Count)]
    pub debug: u8,

    /// Set through RUN_NON_ROOT_DEBUG; counts as one `-d`.
    #[arg(
        long = "debug-env",
        hide = true,
        env = DEBUG_ENV_VAR,
        value_parser = FalseyValueParser::new()
    )]
    pub debug_env: bool,

    /// Give this path to the target user without descending into it.
    #[arg(
        short = 'p',
        long = "path",
        env = "RUN_NON_ROOT_PATH",
        value_name = "PATH",
        value_delimiter = ':'
    )]
    pub paths: Vec<PathBuf>,

    /// Create this directory if missing and give everything below it to
    /// the target user.
    #[arg(
        short = 'r',
        long = "recursive-path",
        env = "RUN_NON_ROOT_RECURSIVE_PATH",
        value_name = "PATH",
        value_delimiter = ':'
    )]
    pub recursive_paths: Vec<PathBuf>,

    /// TOML configuration file.
    #[arg(short = 'c', long, env = "RUN_NON_ROOT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the resolved plan as JSON instead of running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Command to run. Defaults to RUN_NON_ROOT_COMMAND, then `sh`.
    #[arg(trailing_var_arg = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

impl Cli {
    /// Debug verbosity, counting RUN_NON_ROOT_DEBUG as one `-d`.
    pub fn debug_level(&self) -> u8 {
        self.debug.max(u8::from(self.debug_env))
    }

    /// Validates the identity options and settles where the command comes
    /// from. `env` looks up environment variables.
    pub fn into_invocation(
        self,
        env: impl Fn(&str) -> Option<String>,
    ) -> run_non_root_core::Result<Invocation> {
        let debug = self.debug_level() > 0;
        let Cli {
            uid,
            user,
            gid,
            group,
            init,
            quiet,
            paths,
            recursive_paths,
            command,
            ..
        } = self;

        let request = IdentityRequest::from_raw(RawIdentityRequest {
            uid,
            user,
            gid,
            group,
            quiet,
            debug,
        })?;

        let command = if !command.is_empty() {
            CommandSource::Argv(command)
        } else if let Some(line) = env(COMMAND_ENV_VAR).filter(|line| !line.is_empty()) {
            CommandSource::Line(line)
        } else {
            CommandSource::Default
        };

        Ok(Invocation {
            request,
            command,
            init,
            paths: non_empty_paths(paths),
            recursive_paths: non_empty_paths(recursive_paths),
        })
    }

    fn config_path(&self) -> Option<PathBuf> {
        self.config
            .clone()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

/// Runs the entrypoint. Returns only on failure, or after a dry run.
pub fn run_main(cli: Cli) -> anyhow::Result<()> {
    let env = |name: &str| std::env::var(name).ok();
    init_tracing(cli.quiet, cli.debug_level());

    let config_path = cli.config_path();
    let dry_run = cli.dry_run;
    let invocation = cli.into_invocation(env)?;
    let config = Config::load(config_path.as_deref())?;

    let directory = SystemDirectory;
    let accounts = SystemAccounts::new(config.account_tools);
    let executor = Executor::new(&directory, &accounts, &config);
    let superuser = is_superuser();

    if dry_run {
        let report = executor.dry_run(&invocation, superuser)?;
        let json = serde_json::to_string_pretty(&report).context("failed to serialize plan")?;
        #[allow(clippy::print_stdout)]
        {
            println!("{json}");
        }
        return Ok(());
    }

    match executor.run(invocation, superuser) {
        Ok(never) => match never {},
        Err(err) => Err(err.into()),
    }
}

/// Installs the stderr subscriber. RUN_NON_ROOT_LOG takes precedence over
/// the level derived from the flags.
pub fn init_tracing(quiet: bool, debug: u8) {
    let env_filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(quiet, debug)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .try_init();
}

/// Debug output is never silenced by `--quiet`.
fn default_log_level(quiet: bool, debug: u8) -> &'static str {
    match (debug, quiet) {
        (2.., _) => "trace",
        (1, _) => "debug",
        (0, true) => "error",
        (0, false) => "info",
    }
}

fn non_empty_paths(paths: Vec<PathBuf>) -> Vec<PathBuf> {
    paths
        .into_iter()
        .filter(|path| !path.as_os_str().is_empty())
        .collect()
}
