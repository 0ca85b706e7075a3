// Integration tests drive the built binary.
mod dry_run;
mod exec;
mod validation;

use assert_cmd::Command;
use run_non_root_core::SystemDirectory;
use run_non_root_core::directory::IdentityDirectory;
use run_non_root_core::directory::UserRecord;

/// Conventional id of the `nobody` account.
const NOBODY_UID: u32 = 65534;

/// The binary under test, with no `RUN_NON_ROOT_*` settings inherited from
/// the environment running the tests.
fn run_non_root() -> Command {
    let mut cmd = Command::cargo_bin("run-non-root").expect("binary is built");
    for (name, _) in std::env::vars_os() {
        if name.to_string_lossy().starts_with("RUN_NON_ROOT_") {
            cmd.env_remove(&name);
        }
    }
    cmd
}

fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// The existing `nobody` account. Tests running as root target it so that
/// no accounts are created on the machine running them.
fn nobody() -> Option<UserRecord> {
    SystemDirectory.user_by_id(NOBODY_UID).ok().flatten()
}

/// The binary, dropping to `nobody` when the tests run as root. `None` when
/// running as root on a host without that account.
fn unprivileged_run() -> Option<Command> {
    let mut cmd = run_non_root();
    if running_as_root() {
        let nobody = nobody()?;
        cmd.args(["-q", "--uid"]).arg(nobody.uid.to_string());
    }
    Some(cmd)
}
