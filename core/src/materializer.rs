//! Creates whatever the resolver decided is missing and turns a
//! [`Resolution`] into a concrete [`ResolvedIdentity`].
//!
//! Nothing is rolled back on failure: a group created before a failing user
//! creation stays in place.

use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use crate::accounts::AccountManager;
use crate::accounts::NewGroup;
use crate::accounts::NewUser;
use crate::directory::IdentityDirectory;
use crate::error::Result;
use crate::error::RunNonRootErr;
use crate::request::IdentityRequest;
use crate::resolver::Resolution;

/// A fully materialized identity that exists in the host databases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedIdentity {
    pub uid: u32,
    pub user: String,
    pub gid: u32,
    pub group: String,
    pub home: PathBuf,
}

pub struct Materializer<'a, D, A> {
    directory: &'a D,
    accounts: &'a A,
    default_name: &'a str,
    shell: &'a Path,
}

impl<'a, D: IdentityDirectory, A: AccountManager> Materializer<'a, D, A> {
    pub fn new(directory: &'a D, accounts: &'a A, default_name: &'a str, shell: &'a Path) -> Self {
        Self {
            directory,
            accounts,
            default_name,
            shell,
        }
    }

    /// Creates the group, then the user, as flagged in `resolution`.
    pub fn materialize(
        &self,
        request: &IdentityRequest,
        resolution: &Resolution,
    ) -> Result<ResolvedIdentity> {
        let (gid, group) = if resolution.create_group {
            self.materialize_group(request, resolution)?
        } else {
            let gid = resolution.gid.ok_or_else(|| {
                missing_after_resolution(format!("group id for {}", resolution.group))
            })?;
            (gid, resolution.group.clone())
        };

        if resolution.create_user {
            self.materialize_user(request, resolution, gid, &group)?;
        }

        let user = self
            .directory
            .user_by_name(&resolution.user)?
            .ok_or_else(|| RunNonRootErr::UserCreation {
                name: resolution.user.clone(),
                uid: resolution.uid,
                detail: "user is not present in the user database".to_string(),
            })?;

        Ok(ResolvedIdentity {
            uid: user.uid,
            user: user.name,
            gid,
            group,
            home: user.home,
        })
    }

    /// Returns the final group id and name.
    pub fn materialize_group(
        &self,
        request: &IdentityRequest,
        resolution: &Resolution,
    ) -> Result<(u32, String)> {
        let name = if resolution.group.is_empty() {
            // Naming the group after the user is the convention, unless an
            // unrelated group already has that name.
            if self.directory.group_by_name(&resolution.user)?.is_none() {
                resolution.user.clone()
            } else {
                self.default_name.to_string()
            }
        } else {
            resolution.group.clone()
        };

        let mut gid = resolution.gid;
        if request.gid.is_none()
            && let Some(uid) = request.uid
            && self.directory.group_by_id(uid)?.is_none()
        {
            gid = Some(uid);
        }

        info!(
            "creating group {name}{}",
            gid.map(|gid| format!(" with id {gid}")).unwrap_or_default()
        );
        self.accounts.create_group(&NewGroup {
            name: name.clone(),
            gid,
        })?;

        let gid = match gid {
            Some(gid) => gid,
            None => {
                self.directory
                    .group_by_name(&name)?
                    .ok_or_else(|| RunNonRootErr::GroupCreation {
                        name: name.clone(),
                        gid: None,
                        detail: "group is not present in the group database".to_string(),
                    })?
                    .gid
            }
        };
        Ok((gid, name))
    }

    /// Returns the final user id.
    pub fn materialize_user(
        &self,
        request: &IdentityRequest,
        resolution: &Resolution,
        gid: u32,
        group: &str,
    ) -> Result<u32> {
        let mut uid = resolution.uid;
        if request.uid.is_none() && uid.is_none() && self.directory.user_by_id(gid)?.is_none() {
            uid = Some(gid);
        }

        let name = resolution.user.clone();
        info!(
            "creating user {name}{} in group {gid}",
            uid.map(|uid| format!(" with id {uid}")).unwrap_or_default()
        );
        self.accounts.create_user(&NewUser {
            name: name.clone(),
            uid,
            gid,
            group: group.to_string(),
            shell: self.shell.to_path_buf(),
        })?;

        match uid {
            Some(uid) => Ok(uid),
            None => self
                .directory
                .user_by_name(&name)?
                .map(|user| user.uid)
                .ok_or_else(|| RunNonRootErr::UserCreation {
                    name,
                    uid: None,
                    detail: "user is not present in the user database".to_string(),
                }),
        }
    }
}

fn missing_after_resolution(what: String) -> RunNonRootErr {
    RunNonRootErr::Lookup {
        what,
        source: std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "resolution did not produce an id",
        ),
    }
}
