mod common;

use common::{add_task, setup, tree};
use entity::{SoftDelete, Visibility, board, comment, task, task_list, user, work_space};
use products_boards::{
    Actor, BoardsError, CascadeSummary, Target, activity,
    attachments::{self, NewAttachment},
    comments::{self, NewComment},
    soft_delete, tasks,
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use uuid::Uuid;

#[tokio::test]
async fn archiving_a_work_space_reaches_every_level_and_restore_undoes_it() {
    let db = setup().await;
    let t = tree(&db).await;
    add_task(&db, &t.owner_actor, &t.todo, "one").await;
    add_task(&db, &t.owner_actor, &t.todo, "two").await;
    add_task(&db, &t.owner_actor, &t.done, "three").await;

    let summary = soft_delete::archive_work_space(&db, t.work_space.id)
        .await
        .unwrap();
    assert_eq!(
        summary,
        CascadeSummary {
            users: 0,
            work_spaces: 1,
            boards: 1,
            task_lists: 2,
            tasks: 3,
        }
    );
    assert_eq!(task::Entity::find_active().count(&db).await.unwrap(), 0);
    assert_eq!(task_list::Entity::find_active().count(&db).await.unwrap(), 0);
    assert_eq!(board::Entity::find_active().count(&db).await.unwrap(), 0);
    assert_eq!(work_space::Entity::find_active().count(&db).await.unwrap(), 0);
    assert_eq!(task::Entity::find_archived().count(&db).await.unwrap(), 3);
    assert_eq!(task::Entity::find_original().count(&db).await.unwrap(), 3);

    let summary = soft_delete::restore_work_space(&db, t.work_space.id)
        .await
        .unwrap();
    assert_eq!(summary.total(), 7);
    assert_eq!(task::Entity::find_active().count(&db).await.unwrap(), 3);
    assert_eq!(task_list::Entity::find_active().count(&db).await.unwrap(), 2);
    assert_eq!(board::Entity::find_active().count(&db).await.unwrap(), 1);
    assert_eq!(work_space::Entity::find_archived().count(&db).await.unwrap(), 0);
}

#[tokio::test]
async fn repeating_an_archive_flips_nothing() {
    let db = setup().await;
    let t = tree(&db).await;
    add_task(&db, &t.owner_actor, &t.todo, "one").await;

    let first = soft_delete::archive(&db, Target::Board(t.board.id)).await.unwrap();
    assert_eq!(first.boards, 1);
    let second = soft_delete::archive(&db, Target::Board(t.board.id)).await.unwrap();
    assert_eq!(second, CascadeSummary::default());
}

#[tokio::test]
async fn board_cascade_leaves_siblings_and_parent_alone() {
    let db = setup().await;
    let t = tree(&db).await;
    let other = products_boards::boards::create_board(
        &db,
        &t.owner_actor,
        products_boards::boards::NewBoard {
            title: "Other".into(),
            work_space_id: t.work_space.id,
            background_image: None,
        },
    )
    .await
    .unwrap();
    let other_list = common::list(&db, &t.owner_actor, &other, "Backlog").await;
    add_task(&db, &t.owner_actor, &other_list, "untouched").await;
    add_task(&db, &t.owner_actor, &t.todo, "archived").await;

    soft_delete::archive_board(&db, t.board.id).await.unwrap();

    let active_tasks = task::Entity::find_active().all(&db).await.unwrap();
    assert_eq!(active_tasks.len(), 1);
    assert_eq!(active_tasks[0].title, "untouched");
    assert!(
        work_space::Entity::find_active_by_id(t.work_space.id)
            .one(&db)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn restore_also_revives_children_archived_on_their_own() {
    let db = setup().await;
    let t = tree(&db).await;
    let lone = add_task(&db, &t.owner_actor, &t.todo, "archived first").await;
    soft_delete::archive_task(&db, lone.id).await.unwrap();
    soft_delete::archive_task_list(&db, t.todo.id).await.unwrap();

    let summary = soft_delete::restore_task_list(&db, t.todo.id).await.unwrap();
    assert_eq!(summary.task_lists, 1);
    assert_eq!(summary.tasks, 1);
    let revived = task::Entity::find_active_by_id(lone.id).one(&db).await.unwrap();
    assert!(revived.is_some());
}

#[tokio::test]
async fn lists_larger_than_the_bind_limit_archive_and_restore() {
    const BULK: u64 = 40_000;
    let db = setup().await;
    let t = tree(&db).await;
    db.execute_unprepared(&format!(
        "WITH RECURSIVE n(i) AS (SELECT 1 UNION ALL SELECT i + 1 FROM n WHERE i < {BULK}) \
         INSERT INTO task (id, title, description, task_list_id, \"order\", is_active, created_at, updated_at) \
         SELECT randomblob(16), 'bulk', '', x'{list}', i, 1, \
         '2025-03-01T00:00:00+00:00', '2025-03-01T00:00:00+00:00' FROM n",
        list = t.todo.id.simple(),
    ))
    .await
    .unwrap();
    assert_eq!(tasks::task_count(&db, t.todo.id).await.unwrap(), BULK);

    let summary = soft_delete::archive_task_list(&db, t.todo.id).await.unwrap();
    assert_eq!(summary.task_lists, 1);
    assert_eq!(summary.tasks, BULK);
    assert_eq!(task::Entity::find_active().count(&db).await.unwrap(), 0);

    let summary = soft_delete::restore_board(&db, t.board.id).await.unwrap();
    assert_eq!(summary.boards, 0);
    assert_eq!(summary.task_lists, 1);
    assert_eq!(summary.tasks, BULK);
    assert_eq!(task::Entity::find_active().count(&db).await.unwrap(), BULK);
}

#[tokio::test]
async fn a_failing_level_rolls_back_the_whole_cascade() {
    let db = setup().await;
    let t = tree(&db).await;
    add_task(&db, &t.owner_actor, &t.todo, "one").await;
    add_task(&db, &t.owner_actor, &t.done, "two").await;
    db.execute_unprepared(
        "CREATE TRIGGER board_frozen BEFORE UPDATE OF is_active ON board \
         WHEN NEW.is_active = 0 BEGIN SELECT RAISE(ABORT, 'board is frozen'); END",
    )
    .await
    .unwrap();

    let err = soft_delete::archive_work_space(&db, t.work_space.id)
        .await
        .unwrap_err();
    assert!(matches!(err, BoardsError::Db(_)), "{err}");
    assert_eq!(task::Entity::find_active().count(&db).await.unwrap(), 2);
    assert_eq!(task_list::Entity::find_active().count(&db).await.unwrap(), 2);
    assert_eq!(board::Entity::find_active().count(&db).await.unwrap(), 1);
    assert_eq!(work_space::Entity::find_active().count(&db).await.unwrap(), 1);

    db.execute_unprepared("DROP TRIGGER board_frozen").await.unwrap();
    let summary = soft_delete::archive_work_space(&db, t.work_space.id)
        .await
        .unwrap();
    assert_eq!(summary.total(), 6);
}

#[tokio::test]
async fn archived_task_leaves_the_count_but_not_the_original_accessor() {
    let db = setup().await;
    let t = tree(&db).await;
    let keep = add_task(&db, &t.owner_actor, &t.todo, "keep").await;
    let gone = add_task(&db, &t.owner_actor, &t.todo, "gone").await;
    assert_eq!(tasks::task_count(&db, t.todo.id).await.unwrap(), 2);

    soft_delete::archive_task(&db, gone.id).await.unwrap();

    assert_eq!(tasks::task_count(&db, t.todo.id).await.unwrap(), 1);
    let everything = task::Entity::find_in(Visibility::All)
        .filter(task::Column::TaskListId.eq(t.todo.id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(everything.len(), 2);
    let bin = task::Entity::find_in(Visibility::Archived).all(&db).await.unwrap();
    assert_eq!(bin.iter().map(|row| row.id).collect::<Vec<_>>(), vec![gone.id]);

    // New tasks are numbered after the active ones only.
    let next = add_task(&db, &t.owner_actor, &t.todo, "next").await;
    assert_eq!(keep.order, 1);
    assert_eq!(next.order, 2);
}

#[tokio::test]
async fn missing_targets_are_not_found() {
    let db = setup().await;
    for target in [
        Target::WorkSpace(Uuid::new_v4()),
        Target::Board(Uuid::new_v4()),
        Target::TaskList(Uuid::new_v4()),
        Target::Task(Uuid::new_v4()),
        Target::User(Uuid::new_v4()),
    ] {
        let err = soft_delete::archive(&db, target).await.unwrap_err();
        assert!(err.is_not_found(), "{target:?}: {err}");
        let err = soft_delete::restore(&db, target).await.unwrap_err();
        assert!(err.is_not_found(), "{target:?}: {err}");
    }
}

#[tokio::test]
async fn archiving_a_comment_twice_logs_once() {
    let db = setup().await;
    let t = tree(&db).await;
    let task = add_task(&db, &t.owner_actor, &t.todo, "discuss").await;
    let comment = comments::create_comment(
        &db,
        &t.member_actor,
        NewComment {
            task_id: task.id,
            body: "hello".into(),
            parent_id: None,
        },
    )
    .await
    .unwrap();
    let before = activity::get_activity(&db, task.id).await.unwrap().len();

    let archived = soft_delete::archive_comment(&db, &t.owner_actor, comment.id)
        .await
        .unwrap();
    assert!(!archived.is_active);
    soft_delete::archive_comment(&db, &t.owner_actor, comment.id)
        .await
        .unwrap();

    let log = activity::get_activity(&db, task.id).await.unwrap();
    assert_eq!(log.len(), before + 1);
    assert_eq!(log.last().unwrap().message, "Olivia Owner deleted a comment.");
    assert_eq!(log.last().unwrap().doer_id, t.owner.id);
    assert!(comments::get_comment(&db, task.id).await.unwrap().is_empty());
    assert_eq!(comment::Entity::find_original().count(&db).await.unwrap(), 1);

    let restored = soft_delete::restore_comment(&db, comment.id).await.unwrap();
    assert!(restored.is_active);
    assert_eq!(activity::get_activity(&db, task.id).await.unwrap().len(), before + 1);
}

#[tokio::test]
async fn archiving_an_attachment_twice_logs_once() {
    let db = setup().await;
    let t = tree(&db).await;
    let task = add_task(&db, &t.owner_actor, &t.todo, "files").await;
    let file = attachments::create_attachment(
        &db,
        &t.member_actor,
        NewAttachment {
            task_id: task.id,
            file: "uploads/attachments/roadmap.pdf".into(),
        },
    )
    .await
    .unwrap();

    soft_delete::archive_attachment(&db, &t.member_actor, file.id)
        .await
        .unwrap();
    soft_delete::archive_attachment(&db, &t.member_actor, file.id)
        .await
        .unwrap();

    let log = activity::get_activity(&db, task.id).await.unwrap();
    let deletions = log
        .iter()
        .filter(|row| row.message == "Milad Member deleted an attachment.")
        .count();
    assert_eq!(deletions, 1);
    assert!(attachments::get_attachments(&db, task.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn archived_users_cannot_act_until_restored() {
    let db = setup().await;
    let account = common::user(&db, "gone@example.com", "Gone", "Away").await;

    let summary = soft_delete::archive_user(&db, account.id).await.unwrap();
    assert_eq!(summary.users, 1);
    let err = Actor::load(&db, account.id).await.unwrap_err();
    assert!(matches!(err, BoardsError::NotFound { entity: "user", .. }));
    assert_eq!(
        user::Entity::find_archived()
            .filter(user::Column::Email.eq("gone@example.com"))
            .count(&db)
            .await
            .unwrap(),
        1
    );

    soft_delete::restore_user(&db, account.id).await.unwrap();
    assert!(Actor::load(&db, account.id).await.is_ok());
}
