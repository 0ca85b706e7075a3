use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::AccountKind;
use crate::error::Result;
use crate::error::RunNonRootErr;
use crate::request::validate_name;

/// Name used for users and groups when the request does not supply one.
pub const DEFAULT_NAME: &str = "nonroot";

/// Which family of account-management tools creates users and groups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountTools {
    /// Prefer shadow-utils, fall back to BusyBox.
    #[default]
    Auto,
    /// `groupadd` / `useradd`.
    Shadow,
    /// `addgroup` / `adduser`.
    Busybox,
}

/// How the final command is switched to the resolved identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrivilegeSwitch {
    /// Set the group and user ids on the process right before exec.
    #[default]
    Native,
    /// Prefix the command with an external helper taking `user:gid`
    /// (`su-exec`, `gosu`).
    Helper(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InitConfig {
    pub program: String,
    pub args: Vec<String>,
}

impl Default for InitConfig {
    fn default() -> Self {
        Self {
            program: "tini".to_string(),
            args: vec!["-s".to_string(), "--".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub default_name: String,
    pub shell: PathBuf,
    pub default_command: String,
    pub account_tools: AccountTools,
    pub privilege_switch: PrivilegeSwitch,
    pub init: InitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_name: DEFAULT_NAME.to_string(),
            shell: PathBuf::from("/bin/sh"),
            default_command: "sh".to_string(),
            account_tools: AccountTools::default(),
            privilege_switch: PrivilegeSwitch::default(),
            init: InitConfig::default(),
        }
    }
}

impl Config {
    /// Loads the TOML file at `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path).map_err(|source| RunNonRootErr::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(path, &contents)
    }

    fn from_toml(path: &Path, contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).map_err(|err| RunNonRootErr::ConfigParse {
            path: path.to_path_buf(),
            detail: err.message().to_string(),
        })?;
        validate_name(AccountKind::User, &config.default_name).map_err(|err| {
            RunNonRootErr::ConfigParse {
                path: path.to_path_buf(),
                detail: format!("default_name: {err}"),
            }
        })?;
        if config.init.program.is_empty() {
            return Err(RunNonRootErr::ConfigParse {
                path: path.to_path_buf(),
                detail: "init.program must not be empty".to_string(),
            });
        }
        if matches!(&config.privilege_switch, PrivilegeSwitch::Helper(helper) if helper.is_empty())
        {
            return Err(RunNonRootErr::ConfigParse {
                path: path.to_path_buf(),
                detail: "privilege_switch.helper must not be empty".to_string(),
            });
        }
        Ok(config)
    }
}
