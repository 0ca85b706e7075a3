//! Validated identity requests.
//!
//! Raw option values (flags or environment variables) are parsed here, before
//! any directory lookup or mutation, so malformed input never reaches the
//! resolver or the account tools.

use serde::Serialize;

use crate::error::AccountKind;
use crate::error::Result;
use crate::error::RunNonRootErr;

/// Identity options exactly as received from the command line or environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawIdentityRequest {
    pub uid: Option<String>,
    pub user: Option<String>,
    pub gid: Option<String>,
    pub group: Option<String>,
    pub quiet: bool,
    pub debug: bool,
}

/// A partially specified target identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IdentityRequest {
    pub uid: Option<u32>,
    pub user: Option<String>,
    pub gid: Option<u32>,
    pub group: Option<String>,
    pub quiet: bool,
    pub debug: bool,
}

impl IdentityRequest {
    /// Parses numeric ids and checks names. Empty values count as absent.
    pub fn from_raw(raw: RawIdentityRequest) -> Result<Self> {
        let RawIdentityRequest {
            uid,
            user,
            gid,
            group,
            quiet,
            debug,
        } = raw;

        let uid = non_empty(uid)
            .map(|value| parse_id(AccountKind::User, &value))
            .transpose()?;
        let gid = non_empty(gid)
            .map(|value| parse_id(AccountKind::Group, &value))
            .transpose()?;
        let user = non_empty(user);
        if let Some(name) = &user {
            validate_name(AccountKind::User, name)?;
        }
        let group = non_empty(group);
        if let Some(name) = &group {
            validate_name(AccountKind::Group, name)?;
        }

        Ok(Self {
            uid,
            user,
            gid,
            group,
            quiet,
            debug,
        })
    }

    /// True when any of the identity options was supplied.
    pub fn names_an_identity(&self) -> bool {
        self.uid.is_some() || self.user.is_some() || self.gid.is_some() || self.group.is_some()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

/// Parses a user or group id. Only plain decimal digits are accepted, so
/// signs, whitespace and fractional values are all rejected.
pub fn parse_id(kind: AccountKind, value: &str) -> Result<u32> {
    let invalid = || RunNonRootErr::InvalidId {
        kind,
        value: value.to_string(),
    };
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    value.parse::<u32>().map_err(|_| invalid())
}

/// Rejects names that could break out of the argument they are passed in.
///
/// A double quote could end a quoted segment early, a leading `-` would be
/// read as an option by the account tools, and `:` or control characters
/// would corrupt passwd/group records and the `user:group` helper syntax.
pub fn validate_name(kind: AccountKind, name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name.contains('"') {
        Some("contains a double quote")
    } else if name.starts_with('-') {
        Some("starts with '-'")
    } else if name.contains(':') {
        Some("contains ':'")
    } else if name.chars().any(char::is_control) {
        Some("contains a control character")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(RunNonRootErr::InvalidName {
            kind,
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}
