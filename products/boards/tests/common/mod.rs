#![allow(dead_code)]

use entity::{board, task, task_list, user, work_space};
use migration::{Migrator, MigratorTrait};
use products_boards::{
    Actor,
    accounts::{self, NewUser},
    boards::{self, NewBoard, NewTaskList},
    tasks::{self, NewTask},
    work_spaces::{self, NewWorkSpace},
};
use sea_orm::{Database, DatabaseConnection};

pub async fn setup() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

pub async fn user(db: &DatabaseConnection, email: &str, first: &str, last: &str) -> user::Model {
    accounts::register_user(
        db,
        NewUser {
            email: email.to_string(),
            first_name: first.to_string(),
            last_name: last.to_string(),
            password: "s3cret-pass".to_string(),
            password_confirm: "s3cret-pass".to_string(),
            ..NewUser::default()
        },
    )
    .await
    .unwrap()
}

pub async fn staff(db: &DatabaseConnection, email: &str) -> user::Model {
    accounts::register_user(
        db,
        NewUser {
            email: email.to_string(),
            first_name: "Staff".to_string(),
            password: "s3cret-pass".to_string(),
            password_confirm: "s3cret-pass".to_string(),
            is_staff: true,
            ..NewUser::default()
        },
    )
    .await
    .unwrap()
}

/// Owner, one member, a work space with one board and two lists.
pub struct Tree {
    pub owner: user::Model,
    pub member: user::Model,
    pub owner_actor: Actor,
    pub member_actor: Actor,
    pub work_space: work_space::Model,
    pub board: board::Model,
    pub todo: task_list::Model,
    pub done: task_list::Model,
}

pub async fn tree(db: &DatabaseConnection) -> Tree {
    let owner = user(db, "owner@example.com", "Olivia", "Owner").await;
    let member = user(db, "member@example.com", "Milad", "Member").await;
    let owner_actor = Actor::from_user(&owner);
    let member_actor = Actor::from_user(&member);
    let work_space = work_spaces::create_work_space(
        db,
        &owner_actor,
        NewWorkSpace {
            title: "Product".into(),
            members: vec![member.id],
        },
    )
    .await
    .unwrap();
    let board = boards::create_board(
        db,
        &owner_actor,
        NewBoard {
            title: "Roadmap".into(),
            work_space_id: work_space.id,
            background_image: None,
        },
    )
    .await
    .unwrap();
    let todo = list(db, &owner_actor, &board, "To Do").await;
    let done = list(db, &owner_actor, &board, "Done").await;
    Tree {
        owner,
        member,
        owner_actor,
        member_actor,
        work_space,
        board,
        todo,
        done,
    }
}

pub async fn list(
    db: &DatabaseConnection,
    actor: &Actor,
    board: &board::Model,
    title: &str,
) -> task_list::Model {
    boards::create_task_list(
        db,
        actor,
        NewTaskList {
            title: title.into(),
            board_id: board.id,
            order: None,
        },
    )
    .await
    .unwrap()
}

pub fn new_task(list: &task_list::Model, title: &str) -> NewTask {
    NewTask {
        title: title.into(),
        description: String::new(),
        task_list_id: list.id,
        order: None,
        start_date: None,
        end_date: None,
        labels: Vec::new(),
        assignees: Vec::new(),
    }
}

pub async fn add_task(
    db: &DatabaseConnection,
    actor: &Actor,
    list: &task_list::Model,
    title: &str,
) -> task::Model {
    tasks::create_task(db, actor, new_task(list, title))
        .await
        .unwrap()
}

pub fn messages(rows: &[entity::activity::Model]) -> Vec<&str> {
    rows.iter().map(|row| row.message.as_str()).collect()
}
