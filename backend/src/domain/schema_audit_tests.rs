//! Unit tests for schema contract audit findings.

use rstest::{fixture, rstest};

use super::{
    SchemaAdvisory, SchemaAuditReport, SchemaAuditService, SchemaViolation, audit_schema_contract,
};
use crate::domain::ports::{MockSchemaSnapshotRepository, SchemaSnapshotRepositoryError};
use crate::domain::schema_contract::SchemaContract;
use crate::domain::schema_snapshot::{
    PolicyCommand, SchemaColumn, SchemaGrant, SchemaIndex, SchemaPolicy, SchemaRelationship,
    SchemaSnapshot, SchemaTable, SchemaUniqueConstraint,
};

fn column(name: &str, is_nullable: bool) -> SchemaColumn {
    SchemaColumn {
        name: name.to_owned(),
        data_type: "integer".to_owned(),
        is_primary_key: name == "id",
        is_nullable,
    }
}

fn grant(table: &str, grantee: &str, privilege: &str) -> SchemaGrant {
    SchemaGrant {
        table: table.to_owned(),
        grantee: grantee.to_owned(),
        privilege: privilege.to_owned(),
    }
}

fn index(table: &str, column: &str) -> SchemaIndex {
    SchemaIndex {
        table: table.to_owned(),
        name: format!("idx_{table}_{column}"),
        columns: vec![column.to_owned()],
        is_unique: false,
    }
}

fn owner_policy(table: &str) -> SchemaPolicy {
    SchemaPolicy {
        table: table.to_owned(),
        name: format!("{table}_select_own"),
        command: PolicyCommand::Select,
        roles: vec!["authenticated".to_owned()],
        using_expression: Some(
            "((wp_user_id)::text = current_setting('app.current_user_id'::text, true))"
                .to_owned(),
        ),
        check_expression: None,
    }
}

fn service_policy(table: &str) -> SchemaPolicy {
    SchemaPolicy {
        table: table.to_owned(),
        name: format!("{table}_service_all"),
        command: PolicyCommand::All,
        roles: vec!["public".to_owned()],
        using_expression: Some("(CURRENT_USER = 'service_role'::name)".to_owned()),
        check_expression: Some("(CURRENT_USER = 'service_role'::name)".to_owned()),
    }
}

/// Snapshot matching every expectation of the commerce sync contract.
#[fixture]
fn compliant() -> SchemaSnapshot {
    let contract = SchemaContract::commerce_sync();
    let mut snapshot = SchemaSnapshot::default();

    for expected in contract.tables {
        let mut table = SchemaTable::new(expected.name);
        table.row_level_security = true;
        table.columns.push(column("id", false));
        table.columns.push(column("wp_user_id", true));
        for required in expected.required_columns {
            table.columns.retain(|existing| existing.name != *required);
            table.columns.push(column(required, false));
        }
        snapshot.tables.push(table);

        for key in expected.unique_keys {
            snapshot.unique_constraints.push(SchemaUniqueConstraint {
                table: expected.name.to_owned(),
                name: format!("{}_{key}_key", expected.name),
                columns: vec![(*key).to_owned()],
                is_primary_key: false,
            });
        }
        for indexed in expected.indexed_columns {
            snapshot.indexes.push(index(expected.name, indexed));
        }
        if expected.references_user {
            snapshot.relationships.push(SchemaRelationship {
                referencing_table: expected.name.to_owned(),
                referencing_column: "wp_user_id".to_owned(),
                referenced_table: "wp_users".to_owned(),
                referenced_column: "wp_user_id".to_owned(),
                referencing_is_nullable: true,
            });
        }
        if expected.owner_read {
            snapshot.policies.push(owner_policy(expected.name));
        }
        snapshot.policies.push(service_policy(expected.name));
        if expected.authenticated_select {
            snapshot
                .grants
                .push(grant(expected.name, "authenticated", "SELECT"));
        }
        for privilege in ["SELECT", "INSERT", "UPDATE", "DELETE", "TRUNCATE"] {
            snapshot
                .grants
                .push(grant(expected.name, "service_role", privilege));
        }
    }

    snapshot
}

fn evaluate(snapshot: &SchemaSnapshot) -> SchemaAuditReport {
    SchemaAuditReport::evaluate(snapshot, &SchemaContract::commerce_sync())
}

#[rstest]
fn compliant_schema_reports_only_the_known_gaps(compliant: SchemaSnapshot) {
    let report = evaluate(&compliant);

    assert!(report.is_compliant(), "{report}");
    assert_eq!(
        report.advisories,
        vec![
            SchemaAdvisory::NoDedupKey {
                table: "api_usage".to_owned()
            },
            SchemaAdvisory::NoDedupKey {
                table: "query_history".to_owned()
            },
            SchemaAdvisory::NoDedupKey {
                table: "user_sessions".to_owned()
            },
            SchemaAdvisory::NoEndUserReadPolicy {
                table: "query_history".to_owned(),
                granted: true
            },
            SchemaAdvisory::NoEndUserReadPolicy {
                table: "user_sessions".to_owned(),
                granted: false
            },
            SchemaAdvisory::NoEndUserReadPolicy {
                table: "wc_products".to_owned(),
                granted: true
            },
            SchemaAdvisory::NoLineItemEntity,
        ]
    );
}

#[rstest]
fn disabled_row_level_security_is_a_violation(mut compliant: SchemaSnapshot) {
    for table in &mut compliant.tables {
        if table.name == "wc_orders" {
            table.row_level_security = false;
        }
    }

    let report = evaluate(&compliant);

    assert_eq!(
        report.violations,
        vec![SchemaViolation::RowLevelSecurityDisabled {
            table: "wc_orders".to_owned()
        }]
    );
}

#[rstest]
fn end_user_write_grant_is_flagged(mut compliant: SchemaSnapshot) {
    compliant
        .grants
        .push(grant("wp_users", "authenticated", "UPDATE"));
    compliant
        .grants
        .push(grant("user_sessions", "authenticated", "SELECT"));

    let report = evaluate(&compliant);

    assert_eq!(
        report.violations,
        vec![
            SchemaViolation::UnexpectedGrant {
                table: "user_sessions".to_owned(),
                grantee: "authenticated".to_owned(),
                privilege: "SELECT".to_owned(),
            },
            SchemaViolation::UnexpectedGrant {
                table: "wp_users".to_owned(),
                grantee: "authenticated".to_owned(),
                privilege: "UPDATE".to_owned(),
            },
        ]
    );
}

#[rstest]
fn missing_ownership_policy_and_unique_key_are_reported(mut compliant: SchemaSnapshot) {
    compliant
        .policies
        .retain(|policy| policy.name != "api_usage_select_own");
    compliant
        .unique_constraints
        .retain(|constraint| constraint.table != "wc_products");

    let report = evaluate(&compliant);

    assert!(
        report
            .violations
            .contains(&SchemaViolation::MissingOwnershipPolicy {
                table: "api_usage".to_owned()
            })
    );
    assert!(
        report
            .violations
            .contains(&SchemaViolation::MissingUniqueKey {
                table: "wc_products".to_owned(),
                column: "wc_product_id".to_owned(),
            })
    );
}

#[rstest]
fn nullable_email_is_a_violation(mut compliant: SchemaSnapshot) {
    for table in &mut compliant.tables {
        if table.name == "wp_users" {
            for column in &mut table.columns {
                if column.name == "email" {
                    column.is_nullable = true;
                }
            }
        }
    }

    let report = evaluate(&compliant);

    assert_eq!(
        report.violations,
        vec![SchemaViolation::NullableRequiredColumn {
            table: "wp_users".to_owned(),
            column: "email".to_owned(),
        }]
    );
}

#[rstest]
fn service_policy_bound_by_role_name_is_accepted(mut compliant: SchemaSnapshot) {
    for policy in &mut compliant.policies {
        if policy.name == "wc_products_service_all" {
            policy.roles = vec!["service_role".to_owned()];
            policy.using_expression = Some("true".to_owned());
            policy.check_expression = Some("true".to_owned());
        }
    }

    assert!(evaluate(&compliant).is_compliant());
}

#[rstest]
fn line_item_table_clears_the_advisory(mut compliant: SchemaSnapshot) {
    compliant.tables.push(SchemaTable::new("wc_order_items"));

    let report = evaluate(&compliant);

    assert!(!report.advisories.contains(&SchemaAdvisory::NoLineItemEntity));
}

#[rstest]
fn service_loads_snapshot_through_the_port(compliant: SchemaSnapshot) {
    let mut repository = MockSchemaSnapshotRepository::new();
    repository
        .expect_load_schema_snapshot()
        .times(1)
        .return_once(move || Ok(compliant));

    let report = SchemaAuditService::default()
        .audit(&repository)
        .expect("snapshot loads");

    assert!(report.is_compliant());
}

#[rstest]
fn port_errors_propagate() {
    let mut repository = MockSchemaSnapshotRepository::new();
    repository
        .expect_load_schema_snapshot()
        .return_once(|| Err(SchemaSnapshotRepositoryError::connection("refused")));

    let error = audit_schema_contract(&repository).expect_err("connection fails");

    assert_eq!(error, SchemaSnapshotRepositoryError::connection("refused"));
}
