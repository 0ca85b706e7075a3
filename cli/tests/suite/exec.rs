//! Runs that replace the process. As root, these target the existing
//! `nobody` account so that no accounts are created on the machine running
//! the tests.

use std::os::unix::fs::MetadataExt;

use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use pretty_assertions::assert_eq;
use run_non_root_core::error::EXEC_FAILED_EXIT_CODE;
use run_non_root_core::error::MISSING_TOOL_EXIT_CODE;

use super::nobody;
use super::run_non_root;
use super::running_as_root;
use super::unprivileged_run;

#[test]
fn command_replaces_the_process_and_keeps_its_exit_status() {
    let Some(mut cmd) = unprivileged_run() else {
        return;
    };
    cmd.args(["--", "sh", "-c", "exit 7"]).assert().code(7);
}

#[test]
fn arguments_reach_the_command_unchanged() {
    let Some(mut cmd) = unprivileged_run() else {
        return;
    };
    cmd.args(["--", "printf", "%s-", "foo bar", "baz"])
        .assert()
        .success()
        .stdout("foo bar-baz-");
}

#[test]
fn environment_command_runs_through_the_shell() {
    let Some(mut cmd) = unprivileged_run() else {
        return;
    };
    cmd.env("RUN_NON_ROOT_COMMAND", "echo hi | tr a-z A-Z")
        .assert()
        .success()
        .stdout("HI\n");
}

#[test]
fn environment_assignment_prefix_runs_through_the_shell() {
    let Some(mut cmd) = unprivileged_run() else {
        return;
    };
    cmd.env("RUN_NON_ROOT_COMMAND", "GREETING=hello printenv GREETING")
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn identity_options_are_ignored_with_a_warning() {
    if running_as_root() {
        return;
    }
    run_non_root()
        .args(["--uid", "4321", "--path", "/nonexistent", "--", "true"])
        .assert()
        .success()
        .stderr(contains("not running as root"));
}

#[test]
fn quiet_silences_the_warning() {
    if running_as_root() {
        return;
    }
    run_non_root()
        .args(["-q", "--uid", "4321", "--", "true"])
        .assert()
        .success()
        .stderr("");
}

#[test]
fn debug_environment_variable_enables_debug_output() {
    let Some(mut cmd) = unprivileged_run() else {
        return;
    };
    cmd.env("RUN_NON_ROOT_DEBUG", "1")
        .args(["--", "true"])
        .assert()
        .success()
        .stderr(contains("replacing process"));
}

#[test]
fn falsey_debug_environment_variable_is_off() {
    let Some(mut cmd) = unprivileged_run() else {
        return;
    };
    cmd.env("RUN_NON_ROOT_DEBUG", "false")
        .args(["--", "true"])
        .assert()
        .success()
        .stderr(contains("replacing process").not());
}

#[test]
fn missing_program_exits_with_exec_code() {
    let Some(mut cmd) = unprivileged_run() else {
        return;
    };
    cmd.args(["--", "run-non-root-no-such-program"])
        .assert()
        .code(EXEC_FAILED_EXIT_CODE)
        .stderr(contains("failed to execute run-non-root-no-such-program"));
}

#[test]
fn missing_supervisor_exits_with_missing_tool_code() -> anyhow::Result<()> {
    let Some(mut cmd) = unprivileged_run() else {
        return Ok(());
    };
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        "[init]\nprogram = \"run-non-root-no-such-init\"\n",
    )?;
    cmd.arg("--config")
        .arg(&config)
        .args(["--init", "--", "true"])
        .assert()
        .code(MISSING_TOOL_EXIT_CODE);
    Ok(())
}

#[test]
fn root_drops_to_the_target_identity() {
    if !running_as_root() {
        return;
    }
    let Some(nobody) = nobody() else {
        return;
    };
    let expected = format!(
        "{uid}\n{gid}\n{gid}\n{home}\n{name} {name}\n",
        uid = nobody.uid,
        gid = nobody.gid,
        home = nobody.home.display(),
        name = nobody.name,
    );
    run_non_root()
        .args(["-q", "--uid"])
        .arg(nobody.uid.to_string())
        .args([
            "--",
            "sh",
            "-c",
            "id -u; id -g; id -G; echo \"$HOME\"; echo \"$USER $LOGNAME\"",
        ])
        .assert()
        .success()
        .stdout(expected);
}

#[test]
fn root_gives_paths_to_the_target_identity() -> anyhow::Result<()> {
    if !running_as_root() {
        return Ok(());
    }
    let Some(nobody) = nobody() else {
        return Ok(());
    };
    let dir = tempfile::tempdir()?;
    let data = dir.path().join("data");
    std::fs::create_dir_all(data.join("nested"))?;
    std::fs::write(data.join("nested").join("file"), "x")?;
    let created = dir.path().join("created").join("below");
    let single = dir.path().join("single");
    std::fs::create_dir(&single)?;
    std::fs::write(single.join("untouched"), "x")?;

    run_non_root()
        .args(["-q", "--uid"])
        .arg(nobody.uid.to_string())
        .arg("-r")
        .arg(&data)
        .arg("-r")
        .arg(&created)
        .arg("-p")
        .arg(&single)
        .args(["--", "true"])
        .assert()
        .success();

    for path in [
        data.clone(),
        data.join("nested"),
        data.join("nested").join("file"),
        created,
        single.clone(),
    ] {
        let meta = std::fs::metadata(&path)?;
        assert_eq!(
            (meta.uid(), meta.gid()),
            (nobody.uid, nobody.gid),
            "{}",
            path.display()
        );
    }
    // `-p` does not descend.
    assert_eq!(std::fs::metadata(single.join("untouched"))?.uid(), 0);
    Ok(())
}
