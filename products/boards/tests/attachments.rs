mod common;

use common::{add_task, list, setup, tree};
use products_boards::{
    Actor,
    attachments::{self, NewAttachment},
    boards::{self, NewBoard},
    soft_delete,
};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

async fn attach(
    db: &DatabaseConnection,
    actor: &Actor,
    task: &entity::task::Model,
    file: &str,
) -> entity::attachment::Model {
    attachments::create_attachment(
        db,
        actor,
        NewAttachment {
            task_id: task.id,
            file: file.into(),
        },
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn owner_attachments_stay_on_one_board() {
    let db = setup().await;
    let t = tree(&db).await;
    let first = add_task(&db, &t.owner_actor, &t.todo, "one").await;
    let second = add_task(&db, &t.owner_actor, &t.done, "two").await;
    let other_board = boards::create_board(
        &db,
        &t.owner_actor,
        NewBoard {
            title: "Elsewhere".into(),
            work_space_id: t.work_space.id,
            background_image: None,
        },
    )
    .await
    .unwrap();
    let other_list = list(&db, &t.owner_actor, &other_board, "Backlog").await;
    let far = add_task(&db, &t.owner_actor, &other_list, "far").await;

    let anchor = attach(&db, &t.member_actor, &first, "uploads/a.pdf").await;
    let sibling = attach(&db, &t.member_actor, &second, "uploads/b.pdf").await;
    attach(&db, &t.owner_actor, &second, "uploads/owner.pdf").await;
    attach(&db, &t.member_actor, &far, "uploads/far.pdf").await;
    let archived = attach(&db, &t.member_actor, &first, "uploads/old.pdf").await;
    soft_delete::archive_attachment(&db, &t.member_actor, archived.id)
        .await
        .unwrap();

    let found = attachments::owner_attachments_on_board(&db, anchor.id)
        .await
        .unwrap();
    assert_eq!(
        found.iter().map(|row| row.id).collect::<Vec<_>>(),
        vec![anchor.id, sibling.id]
    );

    soft_delete::archive_task(&db, second.id).await.unwrap();
    let found = attachments::owner_attachments_on_board(&db, anchor.id)
        .await
        .unwrap();
    assert_eq!(found.iter().map(|row| row.id).collect::<Vec<_>>(), vec![anchor.id]);
}

#[tokio::test]
async fn owner_attachments_of_an_unknown_attachment_are_not_found() {
    let db = setup().await;
    let err = attachments::owner_attachments_on_board(&db, Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
