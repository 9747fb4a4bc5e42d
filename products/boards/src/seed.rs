//! Demo data for local development.

use entity::{board, label, task, task_list, user, work_space};
use sea_orm::{ConnectionTrait, TransactionTrait};
use tracing::info;

use crate::{
    accounts::{self, NewUser},
    actor::Actor,
    boards::{self, NewBoard, NewTaskList},
    comments::{self, NewComment},
    error::BoardsResult,
    labels::{self, NewLabel},
    tasks::{self, NewTask},
    work_spaces::{self, NewWorkSpace},
};

pub const DEMO_PASSWORD: &str = "taskboard-demo";
pub const OWNER_EMAIL: &str = "owner@taskboard.local";
pub const MEMBER_EMAIL: &str = "member@taskboard.local";

#[derive(Clone, Debug)]
pub struct SeededBoard {
    pub owner: user::Model,
    pub member: user::Model,
    pub work_space: work_space::Model,
    pub board: board::Model,
    pub lists: Vec<task_list::Model>,
    pub tasks: Vec<task::Model>,
    pub label: label::Model,
}

fn demo_user(email: &str, first_name: &str, last_name: &str, is_staff: bool) -> NewUser {
    NewUser {
        email: email.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        password: DEMO_PASSWORD.to_string(),
        password_confirm: DEMO_PASSWORD.to_string(),
        is_staff,
        ..NewUser::default()
    }
}

/// One work space with a member, a three-column board and a few tasks.
/// Everything goes through the regular factories so the activity log is
/// populated the same way real use would populate it.
pub async fn seed_demo<C>(db: &C) -> BoardsResult<SeededBoard>
where
    C: ConnectionTrait + TransactionTrait,
{
    let owner = accounts::register_user(db, demo_user(OWNER_EMAIL, "Olivia", "Owner", true)).await?;
    let member =
        accounts::register_user(db, demo_user(MEMBER_EMAIL, "Milad", "Member", false)).await?;
    let owner_actor = Actor::from_user(&owner);
    let member_actor = Actor::from_user(&member);

    let work_space = work_spaces::create_work_space(
        db,
        &owner_actor,
        NewWorkSpace {
            title: "Demo".into(),
            members: vec![member.id],
        },
    )
    .await?;
    let board = boards::create_board(
        db,
        &owner_actor,
        NewBoard {
            title: "Roadmap".into(),
            work_space_id: work_space.id,
            background_image: None,
        },
    )
    .await?;

    let mut lists = Vec::new();
    for title in ["To Do", "Doing", "Done"] {
        let list = boards::create_task_list(
            db,
            &owner_actor,
            NewTaskList {
                title: title.into(),
                board_id: board.id,
                order: None,
            },
        )
        .await?;
        lists.push(list);
    }

    let label = labels::create_label(
        db,
        &owner_actor,
        NewLabel {
            title: "backend".into(),
            board_id: board.id,
            task_id: None,
        },
    )
    .await?;

    let mut seeded_tasks = Vec::new();
    for (title, assignee) in [
        ("Sketch the data model", owner.id),
        ("Write the migrations", member.id),
    ] {
        let task = tasks::create_task(
            db,
            &owner_actor,
            NewTask {
                title: title.into(),
                description: String::new(),
                task_list_id: lists[0].id,
                order: None,
                start_date: None,
                end_date: None,
                labels: vec![label.id],
                assignees: vec![assignee],
            },
        )
        .await?;
        seeded_tasks.push(task);
    }

    let first = &seeded_tasks[0];
    let comment = comments::create_comment(
        db,
        &member_actor,
        NewComment {
            task_id: first.id,
            body: "Started on this.".into(),
            parent_id: None,
        },
    )
    .await?;
    comments::create_comment(
        db,
        &owner_actor,
        NewComment {
            task_id: first.id,
            body: "Thanks!".into(),
            parent_id: Some(comment.id),
        },
    )
    .await?;

    info!(work_space = %work_space.id, board = %board.id, "demo data seeded");
    Ok(SeededBoard {
        owner,
        member,
        work_space,
        board,
        lists,
        tasks: seeded_tasks,
        label,
    })
}
