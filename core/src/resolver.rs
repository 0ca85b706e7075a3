//! Reconciles an [`IdentityRequest`] with the host databases.
//!
//! Ids win over names: an id is unambiguous, so a requested id that already
//! exists is adopted as-is and any conflicting name is ignored. When a name
//! exists but a *different*, still-unused id was requested, the resolver does
//! not alias the two; it plans a fresh entity under a safe name instead.

use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::directory::GroupRecord;
use crate::directory::IdentityDirectory;
use crate::directory::UserRecord;
use crate::error::Result;
use crate::request::IdentityRequest;

/// Directory state relevant to one request, read once before resolving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SystemIdentitySnapshot {
    pub user_by_id: Option<UserRecord>,
    pub user_by_name: Option<UserRecord>,
    pub group_by_id: Option<GroupRecord>,
    pub group_by_name: Option<GroupRecord>,
    /// The user carrying the default name, if one already exists.
    pub default_user: Option<UserRecord>,
}

impl SystemIdentitySnapshot {
    pub fn take(
        directory: &impl IdentityDirectory,
        request: &IdentityRequest,
        default_name: &str,
    ) -> Result<Self> {
        let user_by_id = match request.uid {
            Some(uid) => directory.user_by_id(uid)?,
            None => None,
        };
        let user_by_name = match &request.user {
            Some(name) => directory.user_by_name(name)?,
            None => None,
        };
        let group_by_id = match request.gid {
            Some(gid) => directory.group_by_id(gid)?,
            None => None,
        };
        let group_by_name = match &request.group {
            Some(name) => directory.group_by_name(name)?,
            None => None,
        };
        let default_user = directory.user_by_name(default_name)?;
        Ok(Self {
            user_by_id,
            user_by_name,
            group_by_id,
            group_by_name,
            default_user,
        })
    }
}

/// The resolver's decision. Ids that are `None` are assigned during
/// materialization; an empty `group` is defaulted there as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub uid: Option<u32>,
    pub user: String,
    pub gid: Option<u32>,
    pub group: String,
    pub create_user: bool,
    pub create_group: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UserOutcome {
    uid: Option<u32>,
    user: String,
    create_user: bool,
    existing: Option<UserRecord>,
}

pub struct Resolver<'a, D> {
    directory: &'a D,
    default_name: &'a str,
}

impl<'a, D: IdentityDirectory> Resolver<'a, D> {
    pub fn new(directory: &'a D, default_name: &'a str) -> Self {
        Self {
            directory,
            default_name,
        }
    }

    pub fn resolve(&self, request: &IdentityRequest) -> Result<Resolution> {
        let snapshot = SystemIdentitySnapshot::take(self.directory, request, self.default_name)?;
        debug!(?snapshot, "identity snapshot");
        let user = self.resolve_user(request, &snapshot);
        let resolution = self.resolve_group(request, &snapshot, user)?;
        debug!(?resolution, "resolved identity");
        Ok(resolution)
    }

    fn resolve_user(
        &self,
        request: &IdentityRequest,
        snapshot: &SystemIdentitySnapshot,
    ) -> UserOutcome {
        // Requested name taken by another id: (holder, requested uid).
        let mut name_conflict = None;
        let mut outcome = if let Some(existing) = &snapshot.user_by_id {
            if let Some(requested) = &request.user
                && requested != &existing.name
            {
                warn_unless_quiet(
                    request,
                    format_args!(
                        "user id {} already belongs to {}; ignoring requested user name {requested}",
                        existing.uid, existing.name
                    ),
                );
            }
            UserOutcome {
                uid: Some(existing.uid),
                user: existing.name.clone(),
                create_user: false,
                existing: Some(existing.clone()),
            }
        } else if let Some(existing) = &snapshot.user_by_name {
            match request.uid {
                None => UserOutcome {
                    uid: Some(existing.uid),
                    user: existing.name.clone(),
                    create_user: false,
                    existing: Some(existing.clone()),
                },
                Some(uid) => {
                    // The requested name is taken by another id; mint the new
                    // id under the default name rather than alias the two.
                    name_conflict = Some((existing, uid));
                    UserOutcome {
                        uid: Some(uid),
                        user: self.default_name.to_string(),
                        create_user: true,
                        existing: None,
                    }
                }
            }
        } else {
            UserOutcome {
                uid: request.uid,
                user: request
                    .user
                    .clone()
                    .unwrap_or_else(|| self.default_name.to_string()),
                create_user: true,
                existing: None,
            }
        };

        // A previous run may already have created the default user.
        if outcome.create_user
            && outcome.user == self.default_name
            && let Some(existing) = &snapshot.default_user
        {
            debug!(
                "user {} already exists with id {}; reusing it",
                existing.name, existing.uid
            );
            outcome = UserOutcome {
                uid: Some(existing.uid),
                user: existing.name.clone(),
                create_user: false,
                existing: Some(existing.clone()),
            };
        }

        if let Some((holder, uid)) = name_conflict {
            if outcome.create_user {
                warn_unless_quiet(
                    request,
                    format_args!(
                        "user {} already exists with id {}; creating user id {uid} as {}",
                        holder.name, holder.uid, outcome.user
                    ),
                );
            } else {
                warn_unless_quiet(
                    request,
                    format_args!(
                        "user {} already exists with id {}; using existing user {} instead of creating user id {uid}",
                        holder.name, holder.uid, outcome.user
                    ),
                );
            }
        }
        outcome
    }

    fn resolve_group(
        &self,
        request: &IdentityRequest,
        snapshot: &SystemIdentitySnapshot,
        user: UserOutcome,
    ) -> Result<Resolution> {
        let UserOutcome {
            uid,
            user,
            create_user,
            existing,
        } = user;

        let (gid, group, create_group) = if let Some(group) = &snapshot.group_by_id {
            if let Some(requested) = &request.group
                && requested != &group.name
            {
                warn_unless_quiet(
                    request,
                    format_args!(
                        "group id {} already belongs to {}; ignoring requested group name {requested}",
                        group.gid, group.name
                    ),
                );
            }
            (Some(group.gid), group.name.clone(), false)
        } else if let Some(group) = &snapshot.group_by_name {
            match request.gid {
                None => (Some(group.gid), group.name.clone(), false),
                // Same conflict as on the user side; the materializer picks
                // the name.
                Some(gid) => (Some(gid), String::new(), true),
            }
        } else if !create_user && request.gid.is_none() && request.group.is_none() {
            match existing {
                Some(existing) => self.primary_group_of(&existing)?,
                None => (None, String::new(), true),
            }
        } else {
            (request.gid, request.group.clone().unwrap_or_default(), true)
        };

        Ok(Resolution {
            uid,
            user,
            gid,
            group,
            create_user,
            create_group,
        })
    }

    /// The existing user's primary group; no group is created.
    fn primary_group_of(&self, user: &UserRecord) -> Result<(Option<u32>, String, bool)> {
        let name = match self.directory.group_by_id(user.gid)? {
            Some(group) => group.name,
            // A primary gid without a group entry is legal; use the number.
            None => user.gid.to_string(),
        };
        Ok((Some(user.gid), name, false))
    }
}

fn warn_unless_quiet(request: &IdentityRequest, message: std::fmt::Arguments<'_>) {
    if !request.quiet {
        warn!("{message}");
    }
}
