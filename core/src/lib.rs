//! Identity resolution and privilege drop for container entrypoints.
//!
//! A request for a (possibly partial) user/group identity is validated,
//! reconciled with the host user and group databases, materialized by the
//! system account tools, applied to the requested paths, and finally used to
//! replace the current process with the target command.
#![cfg(unix)]

pub mod accounts;
pub mod command;
pub mod config;
pub mod directory;
pub mod error;
pub mod executor;
pub mod materializer;
pub mod ownership;
pub mod plan;
pub mod request;
pub mod resolver;

pub use accounts::SystemAccounts;
pub use config::Config;
pub use directory::SystemDirectory;
pub use directory::is_superuser;
pub use error::Result;
pub use error::RunNonRootErr;
pub use executor::Executor;
pub use plan::CommandSource;
pub use plan::Invocation;
pub use request::IdentityRequest;
pub use request::RawIdentityRequest;
