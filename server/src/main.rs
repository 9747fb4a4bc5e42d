mod config;

use std::{fmt, str::FromStr};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use entity::{SoftDelete, attachment, board, comment, task, task_list, user, work_space};
use migration::{Migrator, MigratorTrait};
use platform_db::{DbPool, connect};
use platform_obs::init_tracing;
use products_boards::{
    Actor, Target, activity, seed,
    soft_delete::{self, TargetKind, UnknownTargetKind},
    work_spaces,
};
use sea_orm::EntityTrait;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "taskboard", version, about = "Taskboard administration")]
struct Cli {
    /// Overrides DATABASE_URL.
    #[arg(long, global = true, value_name = "URL")]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Load a demo work space with a board, lists and tasks.
    Seed,
    /// Archive a record and everything beneath it.
    Archive {
        kind: Subject,
        id: Uuid,
        /// User recorded as the doer; required for comments and attachments.
        #[arg(long)]
        actor: Option<Uuid>,
    },
    /// Restore a record and everything beneath it.
    Restore { kind: Subject, id: Uuid },
    /// List archived rows of one kind as JSON lines.
    #[command(name = "recycle-bin")]
    RecycleBin { kind: Subject },
    /// Print the activity log of a task.
    Activity { task_id: Uuid },
    /// Report work spaces whose owner is also listed as a member.
    #[command(name = "check-memberships")]
    CheckMemberships,
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
    /// Drop every table and migrate from scratch.
    Fresh,
    /// Print the number of pending migrations.
    Status,
}

/// Anything the admin commands can archive: the cascading kinds plus the
/// two task attachments that are archived on their own.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Subject {
    Cascade(TargetKind),
    Comment,
    Attachment,
}

impl FromStr for Subject {
    type Err = UnknownTargetKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comment" => Ok(Subject::Comment),
            "attachment" => Ok(Subject::Attachment),
            _ => s.parse().map(Subject::Cascade),
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Cascade(kind) => fmt::Display::fmt(kind, f),
            Subject::Comment => f.write_str("comment"),
            Subject::Attachment => f.write_str("attachment"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(url) = cli.database_url {
        config.database = config.database.with_url(url);
    }
    let _obs = init_tracing(config.obs.clone())?;

    match cli.command {
        Command::Migrate(action) => run_migrate(&config, action).await,
        Command::Seed => run_seed(&config).await,
        Command::Archive { kind, id, actor } => run_archive(&config, kind, id, actor).await,
        Command::Restore { kind, id } => run_restore(&config, kind, id).await,
        Command::RecycleBin { kind } => run_recycle_bin(&config, kind).await,
        Command::Activity { task_id } => run_activity(&config, task_id).await,
        Command::CheckMemberships => run_check_memberships(&config).await,
    }
}

async fn setup_pool(config: &AppConfig) -> Result<DbPool> {
    connect(&config.database).await.map_err(Into::into)
}

/// Pool for commands that need an up-to-date schema.
async fn ready_pool(config: &AppConfig) -> Result<DbPool> {
    let pool = setup_pool(config).await?;
    let pending = Migrator::get_pending_migrations(&pool).await?;
    if !pending.is_empty() {
        if !config.auto_migrate {
            bail!(
                "{} pending migrations; run `taskboard migrate up` or set TASKBOARD_AUTO_MIGRATE=1",
                pending.len()
            );
        }
        Migrator::up(&pool, None).await?;
        info!(applied = pending.len(), "database migrations applied");
    }
    Ok(pool)
}

async fn run_migrate(config: &AppConfig, action: MigrateCommand) -> Result<()> {
    let pool = setup_pool(config).await?;
    match action {
        MigrateCommand::Up => {
            Migrator::up(&pool, None).await?;
            info!("database migrations applied");
        }
        MigrateCommand::Down => {
            Migrator::down(&pool, Some(1)).await?;
            info!("most recent migration rolled back");
        }
        MigrateCommand::Fresh => {
            Migrator::fresh(&pool).await?;
            info!("database rebuilt from scratch");
        }
        MigrateCommand::Status => {
            let pending = Migrator::get_pending_migrations(&pool).await?;
            println!("{} pending", pending.len());
        }
    }
    Ok(())
}

async fn run_seed(config: &AppConfig) -> Result<()> {
    let pool = ready_pool(config).await?;
    let seeded = seed::seed_demo(&pool)
        .await
        .context("seeding demo data")?;
    info!(
        work_space = %seeded.work_space.id,
        board = %seeded.board.id,
        "demo data loaded"
    );
    println!(
        "{}",
        json!({
            "owner": seeded.owner.email,
            "member": seeded.member.email,
            "password": seed::DEMO_PASSWORD,
            "work_space": seeded.work_space.id,
            "board": seeded.board.id,
        })
    );
    Ok(())
}

async fn run_archive(
    config: &AppConfig,
    kind: Subject,
    id: Uuid,
    actor: Option<Uuid>,
) -> Result<()> {
    let pool = ready_pool(config).await?;
    match kind {
        Subject::Cascade(kind) => {
            let summary = soft_delete::archive(&pool, Target::new(kind, id)).await?;
            print_summary("archived", kind, id, summary)
        }
        Subject::Comment | Subject::Attachment => {
            let Some(actor_id) = actor else {
                bail!("archiving a {kind} needs --actor");
            };
            let actor = Actor::load(&pool, actor_id).await?;
            let row = match kind {
                Subject::Comment => {
                    serde_json::to_value(soft_delete::archive_comment(&pool, &actor, id).await?)?
                }
                _ => serde_json::to_value(soft_delete::archive_attachment(&pool, &actor, id).await?)?,
            };
            println!("{row}");
            Ok(())
        }
    }
}

async fn run_restore(config: &AppConfig, kind: Subject, id: Uuid) -> Result<()> {
    let pool = ready_pool(config).await?;
    match kind {
        Subject::Cascade(kind) => {
            let summary = soft_delete::restore(&pool, Target::new(kind, id)).await?;
            print_summary("restored", kind, id, summary)
        }
        Subject::Comment => {
            let row = soft_delete::restore_comment(&pool, id).await?;
            println!("{}", serde_json::to_string(&row)?);
            Ok(())
        }
        Subject::Attachment => {
            let row = soft_delete::restore_attachment(&pool, id).await?;
            println!("{}", serde_json::to_string(&row)?);
            Ok(())
        }
    }
}

fn print_summary(
    action: &str,
    kind: TargetKind,
    id: Uuid,
    summary: soft_delete::CascadeSummary,
) -> Result<()> {
    if summary.total() == 0 {
        warn!(%kind, %id, "nothing changed; already {action}");
    }
    println!(
        "{}",
        json!({ "action": action, "kind": kind, "id": id, "flipped": summary })
    );
    Ok(())
}

async fn run_recycle_bin(config: &AppConfig, kind: Subject) -> Result<()> {
    let pool = ready_pool(config).await?;
    let count = match kind {
        Subject::Cascade(TargetKind::User) => print_archived::<user::Entity>(&pool).await?,
        Subject::Cascade(TargetKind::WorkSpace) => {
            print_archived::<work_space::Entity>(&pool).await?
        }
        Subject::Cascade(TargetKind::Board) => print_archived::<board::Entity>(&pool).await?,
        Subject::Cascade(TargetKind::TaskList) => {
            print_archived::<task_list::Entity>(&pool).await?
        }
        Subject::Cascade(TargetKind::Task) => print_archived::<task::Entity>(&pool).await?,
        Subject::Comment => print_archived::<comment::Entity>(&pool).await?,
        Subject::Attachment => print_archived::<attachment::Entity>(&pool).await?,
    };
    info!(%kind, count, "recycle bin listed");
    Ok(())
}

async fn print_archived<E>(pool: &DbPool) -> Result<usize>
where
    E: SoftDelete,
    E::Model: Serialize,
{
    let rows = E::find_archived().all(pool).await?;
    for row in &rows {
        println!("{}", serde_json::to_string(row)?);
    }
    Ok(rows.len())
}

async fn run_activity(config: &AppConfig, task_id: Uuid) -> Result<()> {
    let pool = ready_pool(config).await?;
    if task::Entity::find_by_id(task_id).one(&pool).await?.is_none() {
        bail!("task {task_id} does not exist");
    }
    for row in activity::get_activity(&pool, task_id).await? {
        println!("{}", serde_json::to_string(&row)?);
    }
    Ok(())
}

async fn run_check_memberships(config: &AppConfig) -> Result<()> {
    let pool = ready_pool(config).await?;
    let conflicts = work_spaces::owner_member_conflicts(&pool).await?;
    for (space, owner_id) in &conflicts {
        println!(
            "{}",
            json!({ "work_space": space.id, "title": space.title, "owner": owner_id })
        );
    }
    if !conflicts.is_empty() {
        bail!("{} work spaces list their owner as a member", conflicts.len());
    }
    info!("no owner/member conflicts");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subjects_parse_cascade_kinds_and_attachments() {
        assert_eq!(
            "work-space".parse::<Subject>().unwrap(),
            Subject::Cascade(TargetKind::WorkSpace)
        );
        assert_eq!(
            "TaskList".parse::<Subject>().unwrap(),
            Subject::Cascade(TargetKind::TaskList)
        );
        assert_eq!("Comment".parse::<Subject>().unwrap(), Subject::Comment);
        assert!("column".parse::<Subject>().is_err());
    }

    #[test]
    fn archive_takes_kind_id_and_optional_actor() {
        let id = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "taskboard",
            "archive",
            "comment",
            &id.to_string(),
            "--actor",
            &actor.to_string(),
        ])
        .unwrap();
        match cli.command {
            Command::Archive {
                kind,
                id: parsed,
                actor: Some(by),
            } => {
                assert_eq!(kind, Subject::Comment);
                assert_eq!(parsed, id);
                assert_eq!(by, actor);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_kinds_are_rejected_by_the_parser() {
        let id = Uuid::new_v4().to_string();
        assert!(Cli::try_parse_from(["taskboard", "restore", "column", &id]).is_err());
        assert!(Cli::try_parse_from(["taskboard", "recycle-bin", "board"]).is_ok());
    }
}
