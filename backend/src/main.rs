//! `store-admin`: migrate, audit and maintain the commerce sync store.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result, eyre};
use tokio::runtime::{Builder, Runtime};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

use woo_sync_store::StoreSettings;
use woo_sync_store::domain::{
    SchemaAuditReport, SchemaContract, SessionCleanup, WpUserId, dependents_by_table,
};
use woo_sync_store::domain::ports::SchemaSnapshotRepository;
use woo_sync_store::outbound::persistence::{
    DbPool, DieselApiUsageRepository, DieselQueryHistoryRepository, DieselSessionRepository,
    PostgresSchemaSnapshotRepository, provision_platform_roles, run_pending_migrations,
};
use woo_sync_store::schema_snapshots::{
    SnapshotRequest, generate_from_database_url, generate_from_migrations,
};

/// `store-admin` command arguments.
#[derive(Debug, Parser)]
#[command(
    name = "store-admin",
    about = "Maintain the WordPress/WooCommerce persisted state store",
    version
)]
struct Cli {
    /// Database connection URL. Falls back to `WOO_STORE_DATABASE_URL`.
    #[arg(long = "database-url", value_name = "url", global = true)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply pending embedded migrations.
    Migrate {
        /// Create `authenticated` and `service_role` first (bare clusters).
        #[arg(long)]
        provision_roles: bool,
    },
    /// Audit the live schema against the commerce sync contract.
    Audit,
    /// Write `schema.mmd` and `schema-audit.txt`.
    ErDiagram {
        #[arg(long = "output-dir", value_name = "path", default_value = "docs/diagrams/er")]
        output_dir: PathBuf,
        /// Migrate a throwaway embedded cluster instead of connecting.
        #[arg(long)]
        from_migrations: bool,
        #[arg(long)]
        skip_audit: bool,
    },
    /// Delete sessions older than the retention window.
    CleanupSessions,
    /// Show a user's query count against the configured limit.
    Usage {
        #[arg(long = "wp-user-id", value_name = "id")]
        wp_user_id: WpUserId,
    },
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    if let Err(error) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .try_init()
    {
        warn!(%error, "tracing init failed");
    }

    let cli = Cli::parse();
    let mut settings = StoreSettings::load_from_environment()?;
    if cli.database_url.is_some() {
        settings.database_url = cli.database_url;
    }

    match cli.command {
        Command::Migrate { provision_roles } => migrate(&settings, provision_roles),
        Command::Audit => audit(&settings),
        Command::ErDiagram {
            output_dir,
            from_migrations,
            skip_audit,
        } => er_diagram(&settings, output_dir, from_migrations, !skip_audit),
        Command::CleanupSessions => cleanup_sessions(&settings),
        Command::Usage { wp_user_id } => usage(&settings, wp_user_id),
    }
}

fn migrate(settings: &StoreSettings, provision_roles: bool) -> Result<ExitCode> {
    let url = settings.database_url()?;
    if provision_roles {
        provision_platform_roles(url)?;
    }
    let applied = run_pending_migrations(url)?;
    info!(applied, "migrations complete");
    Ok(ExitCode::SUCCESS)
}

fn audit(settings: &StoreSettings) -> Result<ExitCode> {
    let repository = PostgresSchemaSnapshotRepository::new(settings.database_url()?);
    let snapshot = repository
        .load_schema_snapshot()
        .wrap_err("load schema snapshot")?;
    for (table, dependents) in dependents_by_table(&snapshot) {
        info!(%table, ?dependents, "tables referencing");
    }

    let report = SchemaAuditReport::evaluate(&snapshot, &SchemaContract::commerce_sync());
    for violation in &report.violations {
        warn!(%violation, "schema violation");
    }
    for advisory in &report.advisories {
        info!(%advisory, "schema advisory");
    }

    if report.is_compliant() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn er_diagram(
    settings: &StoreSettings,
    output_dir: PathBuf,
    from_migrations: bool,
    should_write_audit: bool,
) -> Result<ExitCode> {
    let request = SnapshotRequest {
        output_dir,
        should_write_audit,
    };
    let artifacts = if from_migrations {
        generate_from_migrations(&request)?
    } else {
        generate_from_database_url(settings.database_url()?, &request)?
    };
    info!(
        mermaid = %artifacts.mermaid_path.display(),
        audit = ?artifacts.audit_path,
        compliant = artifacts.report.is_compliant(),
        "schema artefacts written"
    );
    Ok(ExitCode::SUCCESS)
}

fn current_thread_runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("create Tokio runtime")
}

async fn connect(settings: &StoreSettings) -> Result<DbPool> {
    DbPool::new(settings.pool_config()?)
        .await
        .map_err(|error| eyre!("create database pool: {error}"))
}

fn cleanup_sessions(settings: &StoreSettings) -> Result<ExitCode> {
    let retention = settings.session_retention();
    let removed = current_thread_runtime()?.block_on(async {
        let sessions = Arc::new(DieselSessionRepository::new(connect(settings).await?));
        SessionCleanup::new(sessions, retention)
            .run(Utc::now())
            .await
            .map_err(|error| eyre!(error))
    })?;

    info!(removed, retention_days = retention.window_days(), "session cleanup complete");
    Ok(ExitCode::SUCCESS)
}

fn usage(settings: &StoreSettings, wp_user_id: WpUserId) -> Result<ExitCode> {
    let (report, limit) = current_thread_runtime()?.block_on(async {
        let pool = connect(settings).await?;
        let tracker = settings.usage_tracker(
            Arc::new(DieselApiUsageRepository::new(pool.clone())),
            Arc::new(DieselQueryHistoryRepository::new(pool)),
        );
        let report = tracker.usage_history(wp_user_id).await?;
        Ok::<_, color_eyre::eyre::Report>((report, tracker.limit()))
    })?;

    let queries = report.usage.as_ref().map_or(0, |usage| usage.queries);
    info!(
        %wp_user_id,
        queries,
        limit = limit.get(),
        within_limit = limit.allows(queries),
        recent_queries = report.history.len(),
        "usage report"
    );
    Ok(ExitCode::SUCCESS)
}
