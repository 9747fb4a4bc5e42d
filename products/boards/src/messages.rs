//! Fixed activity message templates.
//!
//! The wording (typos included) is what clients already match against, so
//! the strings are stable.

use sea_orm::prelude::DateTimeWithTimeZone;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// `LIKE` pattern matching every [`task_created`] message.
pub const TASK_CREATED_LIKE: &str = "% created the task %";
/// `LIKE` pattern matching every [`attachment_created`] message.
pub const ATTACHMENT_CREATED_LIKE: &str = "% attached a new file.";

pub fn task_created(doer: &str, title: &str) -> String {
    format!("{doer} created the task {title}.")
}

pub fn title_changed(title: &str) -> String {
    format!("Task title was changed to {title}.")
}

pub fn description_changed() -> String {
    "Task description was changed.".to_string()
}

pub fn status_changed(list_title: &str) -> String {
    format!("Task status was changed to {list_title}.")
}

pub fn start_date_changed(date: Option<&DateTimeWithTimeZone>) -> String {
    match date {
        Some(date) => format!("Task start date was changed to {}.", date.format(DATE_FORMAT)),
        None => "Task start date was cleared.".to_string(),
    }
}

pub fn end_date_changed(date: Option<&DateTimeWithTimeZone>) -> String {
    match date {
        Some(date) => format!("Task end date was changed to {}.", date.format(DATE_FORMAT)),
        None => "Task end date was cleared.".to_string(),
    }
}

pub fn assigned(user: &str) -> String {
    format!("Task assined to {user}.")
}

pub fn unassigned(user: &str) -> String {
    format!("{user} removed from task assigness.")
}

pub fn comment_created(author: &str, is_reply: bool) -> String {
    if is_reply {
        format!("{author} replied to a comment.")
    } else {
        format!("{author} added a new comment.")
    }
}

pub fn comment_updated(author: &str) -> String {
    format!("{author} updated a comment.")
}

pub fn comment_deleted(actor: &str) -> String {
    format!("{actor} deleted a comment.")
}

pub fn attachment_created(owner: &str) -> String {
    format!("{owner} attached a new file.")
}

pub fn attachment_deleted(actor: &str) -> String {
    format!("{actor} deleted an attachment.")
}

pub fn label_created(title: &str) -> String {
    format!("Label {title} was created.")
}

pub fn label_renamed(old: &str, new: &str) -> String {
    format!("Label {old} was renamed to {new}.")
}

pub fn label_deleted(title: &str) -> String {
    format!("Label {title} was deleted.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn assignment_wording_is_stable() {
        assert_eq!(assigned("Ali Test"), "Task assined to Ali Test.");
        assert_eq!(unassigned("Ali Test"), "Ali Test removed from task assigness.");
    }

    #[test]
    fn replies_read_differently() {
        assert_eq!(comment_created("Ata", false), "Ata added a new comment.");
        assert_eq!(comment_created("Ata", true), "Ata replied to a comment.");
    }

    #[test]
    fn creation_patterns_cover_their_templates() {
        let task = task_created("Ata Doer", "Ship");
        assert!(task.contains(" created the task ") && task.ends_with('.'));
        assert!(attachment_created("Ata Doer").ends_with(" attached a new file."));
        assert!(!attachment_deleted("Ata").ends_with(" attached a new file."));
    }

    #[test]
    fn dates_render_to_the_minute() {
        let date = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 1, 9, 30, 15)
            .unwrap();
        assert_eq!(
            start_date_changed(Some(&date)),
            "Task start date was changed to 2025-03-01 09:30."
        );
        assert_eq!(end_date_changed(None), "Task end date was cleared.");
    }
}
