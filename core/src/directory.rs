//! Read-only access to the host's user and group databases.

use std::ffi::CStr;
use std::ffi::CString;
use std::io;
use std::mem::MaybeUninit;
use std::path::PathBuf;
use std::ptr;

use serde::Serialize;

use crate::error::Result;
use crate::error::RunNonRootErr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub name: String,
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
    pub home: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRecord {
    pub name: String,
    pub gid: u32,
}

/// Lookups against the user/group databases. `Ok(None)` means "no such entry";
/// `Err` is reserved for failures of the lookup itself.
pub trait IdentityDirectory {
    fn user_by_id(&self, uid: u32) -> Result<Option<UserRecord>>;
    fn user_by_name(&self, name: &str) -> Result<Option<UserRecord>>;
    fn group_by_id(&self, gid: u32) -> Result<Option<GroupRecord>>;
    fn group_by_name(&self, name: &str) -> Result<Option<GroupRecord>>;
}

/// The host databases as seen through NSS (`getpwnam_r(3)` and friends).
///
/// Nothing is cached, so entries created by the account tools are visible to
/// the next lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDirectory;

impl IdentityDirectory for SystemDirectory {
    fn user_by_id(&self, uid: u32) -> Result<Option<UserRecord>> {
        lookup_user(|pwd, buf, len, result| unsafe {
            libc::getpwuid_r(uid, pwd, buf, len, result)
        })
        .map_err(|source| RunNonRootErr::Lookup {
            what: format!("user id {uid}"),
            source,
        })
    }

    fn user_by_name(&self, name: &str) -> Result<Option<UserRecord>> {
        let Ok(c_name) = CString::new(name) else {
            return Ok(None);
        };
        lookup_user(|pwd, buf, len, result| unsafe {
            libc::getpwnam_r(c_name.as_ptr(), pwd, buf, len, result)
        })
        .map_err(|source| RunNonRootErr::Lookup {
            what: format!("user {name}"),
            source,
        })
    }

    fn group_by_id(&self, gid: u32) -> Result<Option<GroupRecord>> {
        lookup_group(|grp, buf, len, result| unsafe {
            libc::getgrgid_r(gid, grp, buf, len, result)
        })
        .map_err(|source| RunNonRootErr::Lookup {
            what: format!("group id {gid}"),
            source,
        })
    }

    fn group_by_name(&self, name: &str) -> Result<Option<GroupRecord>> {
        let Ok(c_name) = CString::new(name) else {
            return Ok(None);
        };
        lookup_group(|grp, buf, len, result| unsafe {
            libc::getgrnam_r(c_name.as_ptr(), grp, buf, len, result)
        })
        .map_err(|source| RunNonRootErr::Lookup {
            what: format!("group {name}"),
            source,
        })
    }
}

/// True when the effective user id is 0.
pub fn is_superuser() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Name of the effective user, if it has a passwd entry.
pub fn effective_user_name(directory: &impl IdentityDirectory) -> Result<Option<String>> {
    let euid = unsafe { libc::geteuid() };
    Ok(directory.user_by_id(euid)?.map(|record| record.name))
}

const INITIAL_BUFFER_LEN: usize = 1024;
const MAX_BUFFER_LEN: usize = 1024 * 1024;

fn lookup_user<F>(mut lookup: F) -> io::Result<Option<UserRecord>>
where
    F: FnMut(
        *mut libc::passwd,
        *mut libc::c_char,
        libc::size_t,
        *mut *mut libc::passwd,
    ) -> libc::c_int,
{
    let mut buf_len = INITIAL_BUFFER_LEN;
    loop {
        let mut buf: Vec<libc::c_char> = vec![0; buf_len];
        let mut pwd = MaybeUninit::<libc::passwd>::zeroed();
        let mut result: *mut libc::passwd = ptr::null_mut();
        let rc = lookup(pwd.as_mut_ptr(), buf.as_mut_ptr(), buf.len(), &mut result);
        match lookup_status(rc, result.is_null(), &mut buf_len)? {
            LookupStatus::Retry => continue,
            LookupStatus::NotFound => return Ok(None),
            LookupStatus::Found => {}
        }
        // The string fields point into `buf`, which is still alive here.
        let pwd = unsafe { pwd.assume_init() };
        return Ok(Some(UserRecord {
            name: unsafe { c_string(pwd.pw_name) },
            uid: pwd.pw_uid,
            gid: pwd.pw_gid,
            home: PathBuf::from(unsafe { c_string(pwd.pw_dir) }),
        }));
    }
}

fn lookup_group<F>(mut lookup: F) -> io::Result<Option<GroupRecord>>
where
    F: FnMut(
        *mut libc::group,
        *mut libc::c_char,
        libc::size_t,
        *mut *mut libc::group,
    ) -> libc::c_int,
{
    let mut buf_len = INITIAL_BUFFER_LEN;
    loop {
        let mut buf: Vec<libc::c_char> = vec![0; buf_len];
        let mut grp = MaybeUninit::<libc::group>::zeroed();
        let mut result: *mut libc::group = ptr::null_mut();
        let rc = lookup(grp.as_mut_ptr(), buf.as_mut_ptr(), buf.len(), &mut result);
        match lookup_status(rc, result.is_null(), &mut buf_len)? {
            LookupStatus::Retry => continue,
            LookupStatus::NotFound => return Ok(None),
            LookupStatus::Found => {}
        }
        let grp = unsafe { grp.assume_init() };
        return Ok(Some(GroupRecord {
            name: unsafe { c_string(grp.gr_name) },
            gid: grp.gr_gid,
        }));
    }
}

enum LookupStatus {
    Found,
    NotFound,
    Retry,
}

fn lookup_status(rc: libc::c_int, no_entry: bool, buf_len: &mut usize) -> io::Result<LookupStatus> {
    match rc {
        0 if no_entry => Ok(LookupStatus::NotFound),
        0 => Ok(LookupStatus::Found),
        libc::ERANGE if *buf_len < MAX_BUFFER_LEN => {
            *buf_len *= 2;
            Ok(LookupStatus::Retry)
        }
        // Several libcs report a missing entry as an error instead of a null
        // result.
        libc::ENOENT | libc::ESRCH | libc::EBADF | libc::EPERM => Ok(LookupStatus::NotFound),
        rc => Err(io::Error::from_raw_os_error(rc)),
    }
}

unsafe fn c_string(ptr: *const libc::c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}
