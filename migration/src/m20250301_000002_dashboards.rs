use sea_orm_migration::prelude::*;

use crate::m20250301_000001_accounts::User;

#[derive(DeriveIden)]
enum WorkSpace {
    Table,
    Id,
    Title,
    OwnerId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum WorkSpaceMember {
    Table,
    WorkSpaceId,
    UserId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Board {
    Table,
    Id,
    Title,
    BackgroundImage,
    WorkSpaceId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TaskList {
    Table,
    Id,
    Title,
    Order,
    BoardId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Label {
    Table,
    Id,
    Title,
    BoardId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum Task {
    Table,
    Id,
    Title,
    Description,
    TaskListId,
    Order,
    StartDate,
    EndDate,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum TaskLabel {
    Table,
    TaskId,
    LabelId,
}

#[derive(DeriveIden)]
enum TaskAssignee {
    Table,
    TaskId,
    UserId,
}

#[derive(DeriveIden)]
enum Comment {
    Table,
    Id,
    Body,
    TaskId,
    AuthorId,
    ParentId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Attachment {
    Table,
    Id,
    File,
    TaskId,
    OwnerId,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

fn timestamp<T: IntoIden + 'static>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .timestamp_with_time_zone()
        .not_null()
        .to_owned()
}

fn active_flag<T: IntoIden + 'static>(col: T) -> ColumnDef {
    ColumnDef::new(col)
        .boolean()
        .not_null()
        .default(true)
        .to_owned()
}

fn fk<A, B, C, D>(
    name: &str,
    from: (A, B),
    to: (C, D),
    on_delete: ForeignKeyAction,
) -> ForeignKeyCreateStatement
where
    A: IntoIden + 'static,
    B: IntoIden + 'static,
    C: IntoIden + 'static,
    D: IntoIden + 'static,
{
    ForeignKey::create()
        .name(name)
        .from(from.0, from.1)
        .to(to.0, to.1)
        .on_delete(on_delete)
        .on_update(ForeignKeyAction::Cascade)
        .to_owned()
}

async fn index(
    manager: &SchemaManager<'_>,
    name: &str,
    table: impl IntoIden + 'static,
    col: impl IntoIden + 'static,
) -> Result<(), DbErr> {
    manager
        .create_index(
            Index::create()
                .if_not_exists()
                .name(name)
                .table(table)
                .col(col)
                .to_owned(),
        )
        .await
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WorkSpace::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WorkSpace::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(WorkSpace::Title).string_len(150).not_null())
                    .col(ColumnDef::new(WorkSpace::OwnerId).uuid().not_null())
                    .col(&mut active_flag(WorkSpace::IsActive))
                    .col(&mut timestamp(WorkSpace::CreatedAt))
                    .col(&mut timestamp(WorkSpace::UpdatedAt))
                    .foreign_key(&mut fk(
                        "fk_work_space_owner",
                        (WorkSpace::Table, WorkSpace::OwnerId),
                        (User::Table, User::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        index(manager, "idx_work_space_owner", WorkSpace::Table, WorkSpace::OwnerId).await?;

        // Owner/member exclusivity is validated by callers, not by a constraint.
        manager
            .create_table(
                Table::create()
                    .table(WorkSpaceMember::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(WorkSpaceMember::WorkSpaceId).uuid().not_null())
                    .col(ColumnDef::new(WorkSpaceMember::UserId).uuid().not_null())
                    .col(&mut timestamp(WorkSpaceMember::CreatedAt))
                    .primary_key(
                        Index::create()
                            .col(WorkSpaceMember::WorkSpaceId)
                            .col(WorkSpaceMember::UserId),
                    )
                    .foreign_key(&mut fk(
                        "fk_work_space_member_work_space",
                        (WorkSpaceMember::Table, WorkSpaceMember::WorkSpaceId),
                        (WorkSpace::Table, WorkSpace::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .foreign_key(&mut fk(
                        "fk_work_space_member_user",
                        (WorkSpaceMember::Table, WorkSpaceMember::UserId),
                        (User::Table, User::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Board::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Board::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Board::Title).string_len(150).not_null())
                    .col(
                        ColumnDef::new(Board::BackgroundImage)
                            .string_len(512)
                            .not_null()
                            .default("uploads/backgrounds/default_background.jpg"),
                    )
                    .col(ColumnDef::new(Board::WorkSpaceId).uuid().not_null())
                    .col(&mut active_flag(Board::IsActive))
                    .col(&mut timestamp(Board::CreatedAt))
                    .col(&mut timestamp(Board::UpdatedAt))
                    .foreign_key(&mut fk(
                        "fk_board_work_space",
                        (Board::Table, Board::WorkSpaceId),
                        (WorkSpace::Table, WorkSpace::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        index(manager, "idx_board_work_space", Board::Table, Board::WorkSpaceId).await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskList::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaskList::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(TaskList::Title).string_len(150).not_null())
                    .col(ColumnDef::new(TaskList::Order).integer().not_null().default(1))
                    .col(ColumnDef::new(TaskList::BoardId).uuid().not_null())
                    .col(&mut active_flag(TaskList::IsActive))
                    .col(&mut timestamp(TaskList::CreatedAt))
                    .col(&mut timestamp(TaskList::UpdatedAt))
                    .foreign_key(&mut fk(
                        "fk_task_list_board",
                        (TaskList::Table, TaskList::BoardId),
                        (Board::Table, Board::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        index(manager, "idx_task_list_board", TaskList::Table, TaskList::BoardId).await?;

        manager
            .create_table(
                Table::create()
                    .table(Label::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Label::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Label::Title).string_len(300).not_null())
                    .col(ColumnDef::new(Label::BoardId).uuid().not_null())
                    .col(&mut timestamp(Label::CreatedAt))
                    .col(&mut timestamp(Label::UpdatedAt))
                    .foreign_key(&mut fk(
                        "fk_label_board",
                        (Label::Table, Label::BoardId),
                        (Board::Table, Board::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        index(manager, "idx_label_board", Label::Table, Label::BoardId).await?;

        manager
            .create_table(
                Table::create()
                    .table(Task::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Task::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Task::Title).string_len(300).not_null())
                    .col(ColumnDef::new(Task::Description).text().not_null())
                    .col(ColumnDef::new(Task::TaskListId).uuid().not_null())
                    .col(ColumnDef::new(Task::Order).integer().not_null())
                    .col(ColumnDef::new(Task::StartDate).timestamp_with_time_zone())
                    .col(ColumnDef::new(Task::EndDate).timestamp_with_time_zone())
                    .col(&mut active_flag(Task::IsActive))
                    .col(&mut timestamp(Task::CreatedAt))
                    .col(&mut timestamp(Task::UpdatedAt))
                    .foreign_key(&mut fk(
                        "fk_task_task_list",
                        (Task::Table, Task::TaskListId),
                        (TaskList::Table, TaskList::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        index(manager, "idx_task_task_list", Task::Table, Task::TaskListId).await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskLabel::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaskLabel::TaskId).uuid().not_null())
                    .col(ColumnDef::new(TaskLabel::LabelId).uuid().not_null())
                    .primary_key(Index::create().col(TaskLabel::TaskId).col(TaskLabel::LabelId))
                    .foreign_key(&mut fk(
                        "fk_task_label_task",
                        (TaskLabel::Table, TaskLabel::TaskId),
                        (Task::Table, Task::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .foreign_key(&mut fk(
                        "fk_task_label_label",
                        (TaskLabel::Table, TaskLabel::LabelId),
                        (Label::Table, Label::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(TaskAssignee::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TaskAssignee::TaskId).uuid().not_null())
                    .col(ColumnDef::new(TaskAssignee::UserId).uuid().not_null())
                    .primary_key(
                        Index::create()
                            .col(TaskAssignee::TaskId)
                            .col(TaskAssignee::UserId),
                    )
                    .foreign_key(&mut fk(
                        "fk_task_assignee_task",
                        (TaskAssignee::Table, TaskAssignee::TaskId),
                        (Task::Table, Task::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .foreign_key(&mut fk(
                        "fk_task_assignee_user",
                        (TaskAssignee::Table, TaskAssignee::UserId),
                        (User::Table, User::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comment::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Comment::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Comment::Body).text().not_null())
                    .col(ColumnDef::new(Comment::TaskId).uuid().not_null())
                    .col(ColumnDef::new(Comment::AuthorId).uuid().not_null())
                    .col(ColumnDef::new(Comment::ParentId).uuid())
                    .col(&mut active_flag(Comment::IsActive))
                    .col(&mut timestamp(Comment::CreatedAt))
                    .col(&mut timestamp(Comment::UpdatedAt))
                    .foreign_key(&mut fk(
                        "fk_comment_task",
                        (Comment::Table, Comment::TaskId),
                        (Task::Table, Task::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .foreign_key(&mut fk(
                        "fk_comment_author",
                        (Comment::Table, Comment::AuthorId),
                        (User::Table, User::Id),
                        ForeignKeyAction::NoAction,
                    ))
                    .foreign_key(&mut fk(
                        "fk_comment_parent",
                        (Comment::Table, Comment::ParentId),
                        (Comment::Table, Comment::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        index(manager, "idx_comment_task", Comment::Table, Comment::TaskId).await?;
        index(manager, "idx_comment_parent", Comment::Table, Comment::ParentId).await?;

        manager
            .create_table(
                Table::create()
                    .table(Attachment::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Attachment::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Attachment::File).string_len(512).not_null())
                    .col(ColumnDef::new(Attachment::TaskId).uuid().not_null())
                    .col(ColumnDef::new(Attachment::OwnerId).uuid().not_null())
                    .col(&mut active_flag(Attachment::IsActive))
                    .col(&mut timestamp(Attachment::CreatedAt))
                    .col(&mut timestamp(Attachment::UpdatedAt))
                    .foreign_key(&mut fk(
                        "fk_attachment_task",
                        (Attachment::Table, Attachment::TaskId),
                        (Task::Table, Task::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .foreign_key(&mut fk(
                        "fk_attachment_owner",
                        (Attachment::Table, Attachment::OwnerId),
                        (User::Table, User::Id),
                        ForeignKeyAction::Cascade,
                    ))
                    .to_owned(),
            )
            .await?;
        index(manager, "idx_attachment_task", Attachment::Table, Attachment::TaskId).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Attachment::Table.into_iden(),
            Comment::Table.into_iden(),
            TaskAssignee::Table.into_iden(),
            TaskLabel::Table.into_iden(),
            Task::Table.into_iden(),
            Label::Table.into_iden(),
            TaskList::Table.into_iden(),
            Board::Table.into_iden(),
            WorkSpaceMember::Table.into_iden(),
            WorkSpace::Table.into_iden(),
        ] {
            manager
                .drop_table(Table::drop().table(table).to_owned())
                .await?;
        }
        Ok(())
    }
}
