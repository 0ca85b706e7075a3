use assert_cmd::Command;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;

use super::run_non_root;
use super::running_as_root;

fn dry_run() -> Command {
    let mut cmd = run_non_root();
    cmd.arg("--dry-run");
    cmd
}

fn plan_of(cmd: &mut Command) -> anyhow::Result<Value> {
    let output = cmd.output()?;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(serde_json::from_slice(&output.stdout)?)
}

#[test]
fn arguments_with_spaces_keep_their_boundaries() -> anyhow::Result<()> {
    let report = plan_of(dry_run().args(["-q", "--", "echo", "foo bar"]))?;
    assert_eq!(report["command"], json!("echo \"foo bar\""));
    assert_eq!(report["argv"], json!(["echo", "foo bar"]));
    assert_eq!(report["init"], json!(false));
    assert_eq!(report["superuser"], json!(running_as_root()));
    Ok(())
}

#[test]
fn command_from_the_environment_keeps_its_pipeline() -> anyhow::Result<()> {
    let report = plan_of(dry_run().env("RUN_NON_ROOT_COMMAND", "echo hi | tr a-z A-Z"))?;
    assert_eq!(report["argv"], json!(["/bin/sh", "-c", "echo hi | tr a-z A-Z"]));
    Ok(())
}

#[test]
fn default_command_is_a_shell() -> anyhow::Result<()> {
    let report = plan_of(&mut dry_run())?;
    assert_eq!(report["command"], json!("sh"));
    assert_eq!(report["argv"], json!(["sh"]));
    Ok(())
}

#[test]
fn assignment_prefix_and_builtins_keep_the_shell() -> anyhow::Result<()> {
    for line in ["FOO=bar env", "exec sleep 1", "ls ~", "echo hi # note"] {
        let report = plan_of(dry_run().env("RUN_NON_ROOT_COMMAND", line))?;
        assert_eq!(report["argv"], json!(["/bin/sh", "-c", line]));
    }
    Ok(())
}

#[test]
fn request_flags_are_reported() -> anyhow::Result<()> {
    let report = plan_of(
        dry_run()
            .env("RUN_NON_ROOT_DEBUG", "1")
            .args(["-q", "--gid", "5678", "--", "true"]),
    )?;
    assert_eq!(report["request"]["gid"], json!(5678));
    assert_eq!(report["request"]["quiet"], json!(true));
    assert_eq!(report["request"]["debug"], json!(true));
    Ok(())
}

#[test]
fn config_changes_the_interpreter_and_default_command() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    std::fs::write(
        &config,
        r#"
shell = "/bin/ash"
default_command = "ls $HOME"
"#,
    )?;
    let report = plan_of(dry_run().arg("--config").arg(&config))?;
    assert_eq!(report["argv"], json!(["/bin/ash", "-c", "ls $HOME"]));
    Ok(())
}

#[test]
fn init_flag_is_reported() -> anyhow::Result<()> {
    let report = plan_of(dry_run().env("RUN_NON_ROOT_INIT", "1").arg("true"))?;
    assert_eq!(report["init"], json!(true));
    Ok(())
}

#[test]
fn non_root_dry_run_resolves_nothing() -> anyhow::Result<()> {
    if running_as_root() {
        return Ok(());
    }
    let report = plan_of(dry_run().args(["--uid", "1234", "--user", "abcd", "--", "true"]))?;
    assert_eq!(report["superuser"], json!(false));
    assert_eq!(report["resolution"], Value::Null);
    Ok(())
}

#[test]
fn unbalanced_quote_exits_with_command_code() {
    dry_run()
        .env("RUN_NON_ROOT_COMMAND", "echo \"oops")
        .assert()
        .code(10);
}
