//! Domain services for the taskboard: work spaces, boards, task lists,
//! tasks, labels, comments and attachments.
//!
//! Every operation takes an explicit store handle. Writes that touch more
//! than one row run inside a transaction opened on that handle, so the
//! handle may itself be a transaction (nested work becomes a savepoint).

pub mod accounts;
pub mod activity;
pub mod actor;
pub mod attachments;
pub mod boards;
pub mod comments;
pub mod error;
pub mod labels;
pub mod messages;
pub mod permissions;
pub mod seed;
pub mod soft_delete;
pub mod tasks;
mod validate;
pub mod work_spaces;

pub use actor::Actor;
pub use error::{BoardsError, BoardsResult};
pub use soft_delete::{CascadeSummary, Target};
