use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use run_non_root_core::error::USAGE_EXIT_CODE;

use super::run_non_root;

#[test]
fn negative_uid_exits_with_invalid_id_code() {
    run_non_root()
        .args(["--uid=-5", "--", "true"])
        .assert()
        .code(3)
        .stderr(contains("invalid user id \"-5\""));
}

#[test]
fn non_numeric_gid_exits_with_invalid_id_code() {
    run_non_root()
        .args(["--gid", "abc", "--", "true"])
        .assert()
        .code(3)
        .stderr(contains("invalid group id"));
}

#[test]
fn ids_from_the_environment_are_validated_too() {
    run_non_root()
        .env("RUN_NON_ROOT_UID", "12x")
        .arg("true")
        .assert()
        .code(3);
}

#[test]
fn quote_in_username_exits_with_invalid_name_code() {
    run_non_root()
        .args(["--user", "a\"b", "--", "true"])
        .assert()
        .code(4)
        .stderr(contains("invalid user name"));
}

#[test]
fn option_like_group_name_is_rejected() {
    run_non_root()
        .args(["--group", "-rf", "--", "true"])
        .assert()
        .code(4);
}

#[test]
fn empty_environment_values_count_as_absent() {
    run_non_root()
        .env("RUN_NON_ROOT_UID", "")
        .env("RUN_NON_ROOT_GROUP", "")
        .args(["--dry-run", "--", "true"])
        .assert()
        .success();
}

#[test]
fn unknown_option_is_a_usage_error() {
    run_non_root()
        .arg("--no-such-option")
        .assert()
        .code(USAGE_EXIT_CODE)
        .stderr(contains("--no-such-option"));
}

#[test]
fn missing_option_value_is_a_usage_error() {
    run_non_root().arg("--uid").assert().code(USAGE_EXIT_CODE);
}

#[test]
fn version_succeeds() {
    run_non_root().arg("--version").assert().success();
}

#[test]
fn help_lists_the_identity_options() {
    run_non_root()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--uid"))
        .stdout(contains("--recursive-path"))
        .stdout(contains("RUN_NON_ROOT_USER"))
        .stdout(contains("--debug-env").not());
}

#[test]
fn unreadable_config_exits_with_config_code() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    run_non_root()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .args(["--", "true"])
        .assert()
        .code(9)
        .stderr(contains("failed to read config"));
    Ok(())
}

#[test]
fn unknown_config_key_exits_with_config_code() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "no_such_key = true\n")?;
    run_non_root()
        .env("RUN_NON_ROOT_CONFIG", &config)
        .args(["--", "true"])
        .assert()
        .code(9)
        .stderr(contains("invalid config"));
    Ok(())
}
