//! Unit tests for schema artefact generation.

use rstest::rstest;
use tempfile::TempDir;

use crate::domain::ports::{
    FixtureSchemaSnapshotRepository, MockSchemaSnapshotRepository, SchemaSnapshotRepositoryError,
};
use crate::domain::{SchemaAdvisory, SchemaColumn, SchemaSnapshot, SchemaTable};
use crate::schema_snapshots::{
    AUDIT_FILENAME, MERMAID_FILENAME, SnapshotGenerationError, SnapshotRequest,
    generate_from_repository,
};
use crate::test_support::cap_fs::{list_directory, path_exists, read_file_to_string};

fn users_only() -> SchemaSnapshot {
    let mut table = SchemaTable::new("wp_users");
    table.row_level_security = true;
    table.columns.push(SchemaColumn {
        name: "id".to_owned(),
        data_type: "integer".to_owned(),
        is_primary_key: true,
        is_nullable: false,
    });
    SchemaSnapshot {
        tables: vec![table],
        ..SchemaSnapshot::default()
    }
}

fn request(dir: &TempDir, should_write_audit: bool) -> SnapshotRequest {
    SnapshotRequest {
        output_dir: dir.path().join("er"),
        should_write_audit,
    }
}

#[rstest]
fn writes_diagram_and_audit() {
    let dir = TempDir::new().expect("temp dir");
    let mut repository = MockSchemaSnapshotRepository::new();
    repository
        .expect_load_schema_snapshot()
        .times(1)
        .returning(|| Ok(users_only()));

    let artifacts =
        generate_from_repository(&repository, &request(&dir, true)).expect("generation succeeds");

    let mermaid = read_file_to_string(&artifacts.mermaid_path).expect("read diagram");
    assert!(mermaid.starts_with("%% Generated from backend/migrations."));
    assert!(mermaid.contains("WpUsers {"));
    assert!(mermaid.contains("integer id PK \"rls\""));

    let audit_path = artifacts.audit_path.expect("audit requested");
    let audit = read_file_to_string(&audit_path).expect("read audit");
    assert!(audit.contains("violation: api_usage: table is missing"));
    assert!(!artifacts.report.is_compliant());
    assert!(artifacts
        .report
        .advisories
        .contains(&SchemaAdvisory::NoLineItemEntity));
}

#[rstest]
fn skipping_the_audit_removes_a_stale_report() {
    let dir = TempDir::new().expect("temp dir");
    generate_from_repository(&FixtureSchemaSnapshotRepository, &request(&dir, true))
        .expect("first run");
    let stale = dir.path().join("er").join(AUDIT_FILENAME);
    assert!(path_exists(&stale));

    let artifacts =
        generate_from_repository(&FixtureSchemaSnapshotRepository, &request(&dir, false))
            .expect("second run");

    assert!(artifacts.audit_path.is_none());
    assert!(!path_exists(&stale));
}

#[rstest]
fn reruns_are_deterministic_and_leave_no_staging_directories() {
    let dir = TempDir::new().expect("temp dir");
    let mut repository = MockSchemaSnapshotRepository::new();
    repository
        .expect_load_schema_snapshot()
        .times(2)
        .returning(|| Ok(users_only()));

    let first = generate_from_repository(&repository, &request(&dir, false)).expect("first run");
    let first_text = read_file_to_string(&first.mermaid_path).expect("read first");
    let second = generate_from_repository(&repository, &request(&dir, false)).expect("second run");
    let second_text = read_file_to_string(&second.mermaid_path).expect("read second");

    assert_eq!(first_text, second_text);
    let entries = list_directory(&dir.path().join("er")).expect("list output");
    assert_eq!(entries, vec![MERMAID_FILENAME.to_owned()]);
}

#[rstest]
fn repository_failures_write_nothing() {
    let dir = TempDir::new().expect("temp dir");
    let mut repository = MockSchemaSnapshotRepository::new();
    repository
        .expect_load_schema_snapshot()
        .returning(|| Err(SchemaSnapshotRepositoryError::connection("refused")));

    let result = generate_from_repository(&repository, &request(&dir, true));

    assert!(matches!(result, Err(SnapshotGenerationError::Repository(_))));
    assert!(!path_exists(&dir.path().join("er")));
}
