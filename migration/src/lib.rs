pub use sea_orm_migration::prelude::*;

mod m20250301_000001_accounts;
mod m20250301_000002_dashboards;
mod m20250301_000003_activity;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_accounts::Migration),
            Box::new(m20250301_000002_dashboards::Migration),
            Box::new(m20250301_000003_activity::Migration),
        ]
    }
}
