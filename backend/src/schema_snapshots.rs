//! Schema artefact generation: Mermaid ER diagram plus audit report.
//!
//! A snapshot of a migrated database is rendered to `schema.mmd` and
//! checked against the commerce sync contract, whose findings go to
//! `schema-audit.txt`. Both files are staged in a scratch directory and
//! renamed into place, so readers never see a half-written artefact.

use std::io;
use std::path::{Path, PathBuf};

use cap_std::{ambient_authority, fs::Dir};
use pg_embedded_setup_unpriv::TestCluster;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::ports::{SchemaSnapshotRepository, SchemaSnapshotRepositoryError};
use crate::domain::{SchemaAuditReport, SchemaContract, SchemaSnapshot, render_mermaid_er_diagram};
use crate::outbound::persistence::{
    MigrationError, PostgresSchemaSnapshotRepository, provision_platform_roles,
    run_pending_migrations,
};

pub const MERMAID_FILENAME: &str = "schema.mmd";
pub const AUDIT_FILENAME: &str = "schema-audit.txt";
const MERMAID_HEADER: &str = "%% Generated from backend/migrations. Do not edit by hand.\n";

/// Output settings for artefact generation.
#[derive(Debug, Clone)]
pub struct SnapshotRequest {
    pub output_dir: PathBuf,
    pub should_write_audit: bool,
}

impl Default for SnapshotRequest {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("docs/diagrams/er"),
            should_write_audit: true,
        }
    }
}

/// Paths written by a generation run, plus the evaluated audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotArtifacts {
    pub mermaid_path: PathBuf,
    pub audit_path: Option<PathBuf>,
    pub report: SchemaAuditReport,
}

/// Errors surfaced by artefact generation.
#[derive(Debug, Error)]
pub enum SnapshotGenerationError {
    #[error(transparent)]
    Repository(#[from] SchemaSnapshotRepositoryError),
    #[error(transparent)]
    Migration(#[from] MigrationError),
    #[error("embedded postgres setup failed: {message}")]
    EmbeddedPostgres { message: String },
    #[error("filesystem operation failed ({path}): {message}")]
    Io { path: PathBuf, message: String },
}

impl SnapshotGenerationError {
    fn io(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

/// Generate artefacts from a throwaway embedded cluster migrated from
/// scratch. The cluster is shut down before anything is written.
pub fn generate_from_migrations(
    request: &SnapshotRequest,
) -> Result<SnapshotArtifacts, SnapshotGenerationError> {
    let embedded = |error: &dyn std::fmt::Debug| SnapshotGenerationError::EmbeddedPostgres {
        message: format!("{error:?}"),
    };
    let snapshot = {
        let cluster = TestCluster::new().map_err(|error| embedded(&error))?;
        let database = cluster
            .temporary_database(format!("schema_snapshot_{}", Uuid::new_v4().simple()).as_str())
            .map_err(|error| embedded(&error))?;
        provision_platform_roles(database.url())?;
        let applied = run_pending_migrations(database.url())?;
        info!(applied, "migrated embedded cluster for schema snapshot");
        PostgresSchemaSnapshotRepository::new(database.url()).load_schema_snapshot()?
    };
    write_artifacts(&snapshot, request)
}

/// Generate artefacts from an already-migrated database.
pub fn generate_from_database_url(
    database_url: &str,
    request: &SnapshotRequest,
) -> Result<SnapshotArtifacts, SnapshotGenerationError> {
    generate_from_repository(&PostgresSchemaSnapshotRepository::new(database_url), request)
}

/// Generate artefacts from any port implementation.
///
/// # Examples
///
/// ```rust,ignore
/// use woo_sync_store::domain::ports::FixtureSchemaSnapshotRepository;
/// use woo_sync_store::schema_snapshots::{SnapshotRequest, generate_from_repository};
///
/// let request = SnapshotRequest {
///     output_dir: std::env::temp_dir().join("woo-schema"),
///     should_write_audit: false,
/// };
/// let artifacts = generate_from_repository(&FixtureSchemaSnapshotRepository, &request)?;
/// assert!(artifacts.audit_path.is_none());
/// # Ok::<(), woo_sync_store::schema_snapshots::SnapshotGenerationError>(())
/// ```
pub fn generate_from_repository(
    repository: &dyn SchemaSnapshotRepository,
    request: &SnapshotRequest,
) -> Result<SnapshotArtifacts, SnapshotGenerationError> {
    let snapshot = repository.load_schema_snapshot()?;
    write_artifacts(&snapshot, request)
}

fn write_artifacts(
    snapshot: &SchemaSnapshot,
    request: &SnapshotRequest,
) -> Result<SnapshotArtifacts, SnapshotGenerationError> {
    let mermaid = format!("{MERMAID_HEADER}{}", render_mermaid_er_diagram(snapshot));
    let report = SchemaAuditReport::evaluate(snapshot, &SchemaContract::commerce_sync());

    let staging = StagingDir::create(&request.output_dir)?;
    staging.stage(MERMAID_FILENAME, &mermaid)?;
    let audit_path = if request.should_write_audit {
        staging.stage(AUDIT_FILENAME, &report.to_string())?;
        staging.publish(MERMAID_FILENAME)?;
        Some(staging.publish(AUDIT_FILENAME)?)
    } else {
        staging.publish(MERMAID_FILENAME)?;
        staging.discard_published(AUDIT_FILENAME)?;
        None
    };
    let mermaid_path = request.output_dir.join(MERMAID_FILENAME);

    info!(
        path = %mermaid_path.display(),
        violations = report.violations.len(),
        advisories = report.advisories.len(),
        "wrote schema artefacts"
    );
    Ok(SnapshotArtifacts {
        mermaid_path,
        audit_path,
        report,
    })
}

/// Scratch directory inside the output directory. Files are written here
/// first and renamed into place; the directory is removed on drop.
struct StagingDir {
    output: Dir,
    output_path: PathBuf,
    name: String,
}

impl StagingDir {
    fn create(output_path: &Path) -> Result<Self, SnapshotGenerationError> {
        let io_error = |error| SnapshotGenerationError::io(output_path, error);
        Dir::create_ambient_dir_all(output_path, ambient_authority()).map_err(io_error)?;
        let output = Dir::open_ambient_dir(output_path, ambient_authority()).map_err(io_error)?;
        let name = format!(".tmp-schema-snapshot-{}", Uuid::new_v4().simple());
        output
            .create_dir(&name)
            .map_err(|error| SnapshotGenerationError::io(output_path.join(&name), error))?;
        Ok(Self {
            output,
            output_path: output_path.to_path_buf(),
            name,
        })
    }

    fn staged(&self, file_name: &str) -> PathBuf {
        Path::new(&self.name).join(file_name)
    }

    fn stage(&self, file_name: &str, contents: &str) -> Result<(), SnapshotGenerationError> {
        let staged = self.staged(file_name);
        self.output
            .write(&staged, contents)
            .map_err(|error| SnapshotGenerationError::io(self.output_path.join(&staged), error))
    }

    /// Move a staged file over its published name and return the final path.
    fn publish(&self, file_name: &str) -> Result<PathBuf, SnapshotGenerationError> {
        self.discard_published(file_name)?;
        self.output
            .rename(self.staged(file_name), &self.output, file_name)
            .map_err(|error| SnapshotGenerationError::io(self.output_path.join(file_name), error))?;
        Ok(self.output_path.join(file_name))
    }

    fn discard_published(&self, file_name: &str) -> Result<(), SnapshotGenerationError> {
        match self.output.remove_file(file_name) {
            Err(error) if error.kind() != io::ErrorKind::NotFound => Err(
                SnapshotGenerationError::io(self.output_path.join(file_name), error),
            ),
            _ => Ok(()),
        }
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(error) = self.output.remove_dir_all(&self.name) {
            warn!(%error, staging = %self.name, "failed to remove staging directory");
        }
    }
}

#[cfg(test)]
#[path = "schema_snapshots_tests.rs"]
mod tests;
