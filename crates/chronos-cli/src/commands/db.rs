//! Database operations

use clap::Subcommand;

use chronos_core::config::Config;
use chronos_core::db::migrate::Migrator;
use chronos_core::db::create_pool;
use chronos_core::Result;

#[derive(Subcommand, Debug)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,

    /// Show migration status
    Status,
}

pub async fn run(config: Config, command: DbCommands) -> Result<()> {
    let pool = create_pool(&config.store).await?;
    let migrator = Migrator::new(pool);

    match command {
        DbCommands::Migrate => {
            let applied = migrator.run().await?;
            println!("applied {} migration(s)", applied);
        }
        DbCommands::Status => {
            let applied = migrator.applied().await?;
            if applied.is_empty() {
                println!("no migrations applied");
            } else {
                for migration in applied {
                    println!(
                        "{:>4}  {}  applied {}",
                        migration.version,
                        migration.name,
                        migration.applied_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
        }
    }

    Ok(())
}
