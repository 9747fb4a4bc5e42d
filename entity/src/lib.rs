//! sea-orm models for the taskboard store.
//!
//! Foreign keys form a tree rooted at [`work_space`]: boards own task lists
//! and labels, task lists own tasks, tasks own comments, attachments and
//! activity rows. Every model except [`label`] and [`activity`] carries an
//! `is_active` flag and implements [`visibility::SoftDelete`].

pub mod activity;
pub mod attachment;
pub mod board;
pub mod comment;
pub mod label;
pub mod task;
pub mod task_assignee;
pub mod task_label;
pub mod task_list;
pub mod user;
pub mod visibility;
pub mod work_space;
pub mod work_space_member;

pub use visibility::{SoftDelete, Visibility};
