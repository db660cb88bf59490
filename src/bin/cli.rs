use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use campus_core::authz::actions;
use campus_core::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "campus-core admin tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create a new empty migration with the provided name
    MakeMigration { name: String },
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Roll back the last applied migration
    MigrateRollback,
    /// Load a demo organization with teams, positions and delegable grants
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Try to load env from CWD; when running in Docker the binary CWD may differ,
    // so fall back to the crate-local `.env` using CARGO_MANIFEST_DIR.
    if dotenv().is_err() {
        let crate_env = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(crate_env);
    }

    let cli = Cli::parse();

    match cli.command {
        Commands::MakeMigration { name } => {
            let path = make_migration_file(&name)?;
            println!("Created migration: {}", path.display());
        }
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            print_status(&pool, &migrator).await?;
        }
        Commands::MigrateRollback => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator
                .undo(&pool, 1)
                .await
                .context("no migrations were rolled back")?;
            println!("Rolled back last migration");
        }
        Commands::Seed => {
            let pool = get_pool().await?;
            let migrator = get_migrator().await?;
            migrator.run(&pool).await?;
            seed_demo(&pool).await?;
            println!("Demo organization seeded");
        }
    }

    Ok(())
}

fn make_migration_file(name: &str) -> anyhow::Result<PathBuf> {
    let timestamp = Utc::now().format("%Y_%m_%d_%H%M%S");
    let sanitized = sanitize_name(name);
    let filename = format!("{}_{}.sql", timestamp, sanitized);
    let path = Path::new("migrations").join(filename);

    if path.exists() {
        anyhow::bail!("migration already exists: {}", path.display());
    }

    fs::write(&path, "-- Write your migration SQL here\n")
        .with_context(|| format!("failed to create migration at {}", path.display()))?;

    Ok(path)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool, migrator: &sqlx::migrate::Migrator) -> anyhow::Result<()> {
    // If the migrations table doesn't exist, nothing is applied yet
    let db_applied = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?;
    let applied_versions: HashSet<i64> = if db_applied.is_some() {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in migrator.iter() {
        let version = migration.version;
        let applied = applied_versions.contains(&version);
        let status = if applied { "applied" } else { "pending" };
        let desc = migration.description.as_ref().trim();
        let name = if !desc.is_empty() { desc } else { "unknown" };
        println!("{:<8} {:<20} {}", status, version, name);
    }

    Ok(())
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | '_' => c,
            'A'..='Z' => c.to_ascii_lowercase(),
            _ => '_',
        })
        .collect()
}

async fn get_migrator() -> anyhow::Result<sqlx::migrate::Migrator> {
    // Try local ./migrations first (when running from repo root). If that
    // doesn't exist (common in containers where CWD differs), fall back to
    // the crate-local migrations folder determined by CARGO_MANIFEST_DIR.
    let local = Path::new("./migrations");
    let migrator_path = if local.exists() {
        local.to_path_buf()
    } else {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
    };

    let migrator_path_display = migrator_path.display().to_string();
    sqlx::migrate::Migrator::new(migrator_path)
        .await
        .with_context(|| format!("failed to load migrations from {}", migrator_path_display))
}

/// One organization, a principal with delegable scheduling/finance grants,
/// a teacher reporting into the principal's team, and a wiki starter article.
async fn seed_demo(pool: &SqlitePool) -> anyhow::Result<()> {
    let now = Utc::now();

    let org_id = Uuid::new_v4();
    sqlx::query("INSERT INTO organizations (id, name, slug, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(org_id.to_string())
        .bind("Northview Primary School")
        .bind("northview-primary-school")
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

    let principal_id = insert_user(pool, org_id, "Dana Whitfield", "principal@northview.example").await?;
    let teacher_id = insert_user(pool, org_id, "Sam Ortiz", "s.ortiz@northview.example").await?;

    let team_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO teams (id, organization_id, name, code, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(team_id.to_string())
    .bind(org_id.to_string())
    .bind("Lower School Faculty")
    .bind("LSF")
    .bind("Teachers for grades 1-4")
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let principal_position = insert_position(pool, org_id, "Principal", 5, "leadership").await?;
    let teacher_position = insert_position(pool, org_id, "Teacher", 1, "faculty").await?;

    // Principal can delegate scheduling and invoice issuing.
    for (code, scope, can_delegate) in [
        (actions::SCHEDULE_EDIT, "organization", true),
        (actions::SCHEDULE_PUBLISH, "organization", true),
        (actions::INVOICE_ISSUE, "organization", true),
        (actions::MEMBER_MANAGE, "organization", false),
    ] {
        attach_permission(pool, principal_position, code, scope, can_delegate).await?;
    }
    attach_permission(pool, teacher_position, actions::SCHEDULE_EDIT, "own", false).await?;

    let principal_member = insert_member(pool, team_id, principal_id, principal_position, "lead", None).await?;
    insert_member(pool, team_id, teacher_id, teacher_position, "member", Some(principal_member)).await?;

    let article_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO wiki_articles (id, organization_id, slug, title, content, status, author_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(article_id.to_string())
    .bind(org_id.to_string())
    .bind("welcome")
    .bind("Welcome to Northview")
    .bind("Start here: staff handbook, schedules and delegation guidelines.")
    .bind("active")
    .bind(principal_id.to_string())
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    println!("organization: {org_id}");
    println!("principal login: principal@northview.example / Northview!Demo1");
    println!("teacher login:   s.ortiz@northview.example / Northview!Demo1");

    Ok(())
}

async fn insert_user(pool: &SqlitePool, org_id: Uuid, name: &str, email: &str) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let password_hash = hash_password("Northview!Demo1").map_err(|e| anyhow::anyhow!("{e}"))?;

    sqlx::query(
        "INSERT INTO users (id, organization_id, name, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(org_id.to_string())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

async fn insert_position(
    pool: &SqlitePool,
    org_id: Uuid,
    name: &str,
    level: i64,
    position_type: &str,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO team_positions (id, organization_id, name, level, position_type, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(org_id.to_string())
    .bind(name)
    .bind(level)
    .bind(position_type)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}

async fn attach_permission(
    pool: &SqlitePool,
    position_id: Uuid,
    action_code: &str,
    scope: &str,
    can_delegate: bool,
) -> anyhow::Result<()> {
    let action_id: String = sqlx::query_scalar("SELECT id FROM action_types WHERE code = ?")
        .bind(action_code)
        .fetch_one(pool)
        .await
        .with_context(|| format!("action type {action_code} missing; run migrations first"))?;

    sqlx::query(
        "INSERT INTO position_permissions (id, position_id, action_type_id, scope, can_delegate, created_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(position_id.to_string())
    .bind(action_id)
    .bind(scope)
    .bind(can_delegate)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

async fn insert_member(
    pool: &SqlitePool,
    team_id: Uuid,
    person_id: Uuid,
    position_id: Uuid,
    member_role: &str,
    reports_to: Option<Uuid>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO team_members (id, team_id, person_id, position_id, member_role, employment_type, allocation, reports_to_member_id, is_active, start_date, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, 'full_time', 1.0, ?, 1, ?, ?, ?)",
    )
    .bind(id.to_string())
    .bind(team_id.to_string())
    .bind(person_id.to_string())
    .bind(position_id.to_string())
    .bind(member_role)
    .bind(reports_to.map(|v| v.to_string()))
    .bind(now)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(id)
}
