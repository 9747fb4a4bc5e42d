mod common;

use common::{add_task, messages, new_task, setup, tree};
use entity::{label, task_label};
use products_boards::{
    activity,
    boards::{self, NewBoard},
    labels::{self, NewLabel},
    soft_delete, tasks,
};
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn creating_a_label_on_a_task_attaches_and_logs_it() {
    let db = setup().await;
    let t = tree(&db).await;
    let task = add_task(&db, &t.owner_actor, &t.todo, "Tag me").await;

    let created = labels::create_label(
        &db,
        &t.member_actor,
        NewLabel {
            title: "urgent".into(),
            board_id: t.board.id,
            task_id: Some(task.id),
        },
    )
    .await
    .unwrap();

    let on_task = tasks::get_task_labels(&db, task.id).await.unwrap();
    assert_eq!(on_task.iter().map(|l| l.id).collect::<Vec<_>>(), vec![created.id]);
    let log = activity::get_activity(&db, task.id).await.unwrap();
    assert_eq!(messages(&log).last(), Some(&"Label urgent was created."));
    assert_eq!(log.last().unwrap().doer_id, t.member.id);
}

#[tokio::test]
async fn renaming_logs_on_every_active_carrier() {
    let db = setup().await;
    let t = tree(&db).await;
    let tag = labels::create_label(
        &db,
        &t.owner_actor,
        NewLabel {
            title: "bug".into(),
            board_id: t.board.id,
            task_id: None,
        },
    )
    .await
    .unwrap();
    let mut first = new_task(&t.todo, "one");
    first.labels = vec![tag.id];
    let first = tasks::create_task(&db, &t.owner_actor, first).await.unwrap();
    let mut second = new_task(&t.done, "two");
    second.labels = vec![tag.id];
    let second = tasks::create_task(&db, &t.owner_actor, second).await.unwrap();
    soft_delete::archive_task(&db, second.id).await.unwrap();

    let renamed = labels::update_label(&db, &t.owner_actor, tag.id, "defect")
        .await
        .unwrap();
    assert_eq!(renamed.title, "defect");

    let first_log = activity::get_activity(&db, first.id).await.unwrap();
    assert_eq!(
        messages(&first_log).last(),
        Some(&"Label bug was renamed to defect.")
    );
    assert_eq!(activity::get_activity(&db, second.id).await.unwrap().len(), 1);
    assert_eq!(
        labels::label_tasks(&db, tag.id)
            .await
            .unwrap()
            .iter()
            .map(|task| task.id)
            .collect::<Vec<_>>(),
        vec![first.id]
    );
}

#[tokio::test]
async fn deleting_removes_the_label_and_its_links_for_good() {
    let db = setup().await;
    let t = tree(&db).await;
    let tag = labels::create_label(
        &db,
        &t.owner_actor,
        NewLabel {
            title: "later".into(),
            board_id: t.board.id,
            task_id: None,
        },
    )
    .await
    .unwrap();
    let mut input = new_task(&t.todo, "Parked");
    input.labels = vec![tag.id];
    let task = tasks::create_task(&db, &t.owner_actor, input).await.unwrap();

    labels::delete_label(&db, &t.owner_actor, tag.id).await.unwrap();

    assert!(label::Entity::find_by_id(tag.id).one(&db).await.unwrap().is_none());
    assert_eq!(task_label::Entity::find().count(&db).await.unwrap(), 0);
    let log = activity::get_activity(&db, task.id).await.unwrap();
    assert_eq!(messages(&log).last(), Some(&"Label later was deleted."));
    let err = labels::delete_label(&db, &t.owner_actor, tag.id)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn labels_stay_on_their_own_board() {
    let db = setup().await;
    let t = tree(&db).await;
    let other = boards::create_board(
        &db,
        &t.owner_actor,
        NewBoard {
            title: "Other".into(),
            work_space_id: t.work_space.id,
            background_image: None,
        },
    )
    .await
    .unwrap();
    let foreign = labels::create_label(
        &db,
        &t.owner_actor,
        NewLabel {
            title: "foreign".into(),
            board_id: other.id,
            task_id: None,
        },
    )
    .await
    .unwrap();
    let task = add_task(&db, &t.owner_actor, &t.todo, "Home").await;

    let err = labels::attach_label(&db, &t.owner_actor, task.id, foreign.id)
        .await
        .unwrap_err();
    assert!(err.fields().unwrap().contains("label"));

    let mut input = new_task(&t.todo, "Also home");
    input.labels = vec![foreign.id];
    let err = tasks::create_task(&db, &t.owner_actor, input)
        .await
        .unwrap_err();
    assert!(err.fields().unwrap().contains("labels"));

    let local = labels::create_label(
        &db,
        &t.owner_actor,
        NewLabel {
            title: "local".into(),
            board_id: t.board.id,
            task_id: None,
        },
    )
    .await
    .unwrap();
    labels::attach_label(&db, &t.owner_actor, task.id, local.id)
        .await
        .unwrap();
    labels::attach_label(&db, &t.owner_actor, task.id, local.id)
        .await
        .unwrap();
    assert_eq!(tasks::get_task_labels(&db, task.id).await.unwrap().len(), 1);
    assert!(
        labels::detach_label(&db, &t.owner_actor, task.id, local.id)
            .await
            .unwrap()
    );
    assert_eq!(
        labels::get_board_labels(&db, t.board.id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn task_count_only_sees_active_carriers() {
    let db = setup().await;
    let t = tree(&db).await;
    let tag = labels::create_label(
        &db,
        &t.owner_actor,
        NewLabel {
            title: "infra".into(),
            board_id: t.board.id,
            task_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(labels::label_task_count(&db, tag.id).await.unwrap(), 0);

    let mut carriers = Vec::new();
    for title in ["one", "two", "three"] {
        let mut input = new_task(&t.todo, title);
        input.labels = vec![tag.id];
        carriers.push(tasks::create_task(&db, &t.owner_actor, input).await.unwrap());
    }
    add_task(&db, &t.owner_actor, &t.todo, "untagged").await;
    assert_eq!(labels::label_task_count(&db, tag.id).await.unwrap(), 3);

    soft_delete::archive_task(&db, carriers[0].id).await.unwrap();
    assert_eq!(labels::label_task_count(&db, tag.id).await.unwrap(), 2);

    let err = labels::label_task_count(&db, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
