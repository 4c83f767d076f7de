//! Audit of a live schema against the commerce sync contract.
//!
//! The audit evaluates snapshots from the [`SchemaSnapshotRepository`] port
//! and reports two kinds of findings:
//!
//! - violations, where the schema breaks the contract (missing keys,
//!   disabled row-level security, over-broad grants);
//! - advisories, which are known gaps in the contract itself that are
//!   surfaced rather than silently changed.

use std::fmt;

use super::access::CURRENT_USER_SETTING;
use super::schema_contract::{LINE_ITEM_TABLES, SERVICE_PRIVILEGES, SchemaContract, TableContract};
use super::schema_snapshot::{PolicyCommand, SchemaSnapshot, SchemaTable};
use crate::domain::ports::{SchemaSnapshotRepository, SchemaSnapshotRepositoryError};

/// A broken expectation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaViolation {
    MissingTable { table: String },
    MissingColumn { table: String, column: String },
    MissingUniqueKey { table: String, column: String },
    NullableRequiredColumn { table: String, column: String },
    MissingIndex { table: String, column: String },
    MissingUserReference { table: String },
    RowLevelSecurityDisabled { table: String },
    MissingOwnershipPolicy { table: String },
    UnexpectedOwnerReadPolicy { table: String },
    MissingServicePolicy { table: String },
    MissingGrant {
        table: String,
        grantee: String,
        privilege: String,
    },
    UnexpectedGrant {
        table: String,
        grantee: String,
        privilege: String,
    },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTable { table } => write!(f, "{table}: table is missing"),
            Self::MissingColumn { table, column } => {
                write!(f, "{table}.{column}: column is missing")
            }
            Self::MissingUniqueKey { table, column } => {
                write!(f, "{table}.{column}: no unique constraint")
            }
            Self::NullableRequiredColumn { table, column } => {
                write!(f, "{table}.{column}: required column is nullable")
            }
            Self::MissingIndex { table, column } => {
                write!(f, "{table}.{column}: no index leads with this column")
            }
            Self::MissingUserReference { table } => {
                write!(f, "{table}.wp_user_id: does not reference wp_users")
            }
            Self::RowLevelSecurityDisabled { table } => {
                write!(f, "{table}: row-level security is disabled")
            }
            Self::MissingOwnershipPolicy { table } => {
                write!(f, "{table}: no ownership read policy for end users")
            }
            Self::UnexpectedOwnerReadPolicy { table } => {
                write!(f, "{table}: end users have a read policy they should not")
            }
            Self::MissingServicePolicy { table } => {
                write!(f, "{table}: no unrestricted service policy")
            }
            Self::MissingGrant {
                table,
                grantee,
                privilege,
            } => write!(f, "{table}: {grantee} lacks {privilege}"),
            Self::UnexpectedGrant {
                table,
                grantee,
                privilege,
            } => write!(f, "{table}: {grantee} unexpectedly holds {privilege}"),
        }
    }
}

/// A known gap in the contract, reported for follow-up.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum SchemaAdvisory {
    /// Nothing prevents duplicate logical rows.
    NoDedupKey { table: String },
    /// End users have no read policy; `granted` says whether a table-level
    /// grant exists that will therefore only ever return zero rows.
    NoEndUserReadPolicy { table: String, granted: bool },
    /// Orders carry product names but no line-item table exists.
    NoLineItemEntity,
}

impl fmt::Display for SchemaAdvisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoDedupKey { table } => write!(f, "{table}: no deduplication key"),
            Self::NoEndUserReadPolicy { table, granted: true } => {
                write!(f, "{table}: SELECT granted to end users but no read policy")
            }
            Self::NoEndUserReadPolicy {
                table,
                granted: false,
            } => write!(f, "{table}: not readable by end users"),
            Self::NoLineItemEntity => f.write_str("wc_orders: no order line-item entity"),
        }
    }
}

/// Outcome of auditing a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaAuditReport {
    /// Sorted, deduplicated.
    pub violations: Vec<SchemaViolation>,
    /// Sorted, deduplicated.
    pub advisories: Vec<SchemaAdvisory>,
}

impl SchemaAuditReport {
    /// Compare a snapshot with the contract.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use woo_sync_store::domain::{
    ///     SchemaAuditReport, SchemaContract, SchemaSnapshot, SchemaViolation,
    /// };
    ///
    /// let report = SchemaAuditReport::evaluate(&SchemaSnapshot::default(), &SchemaContract::default());
    /// assert!(!report.is_compliant());
    /// assert!(report.violations.contains(&SchemaViolation::MissingTable {
    ///     table: "wp_users".to_owned()
    /// }));
    /// ```
    pub fn evaluate(snapshot: &SchemaSnapshot, contract: &SchemaContract) -> Self {
        let mut violations = Vec::new();
        let mut advisories = Vec::new();

        for expected in contract.tables {
            let Some(table) = snapshot.table(expected.name) else {
                violations.push(SchemaViolation::MissingTable {
                    table: expected.name.to_owned(),
                });
                continue;
            };

            check_columns(snapshot, table, expected, &mut violations);
            check_user_reference(snapshot, expected, &mut violations);
            check_access(snapshot, table, expected, contract, &mut violations);
            collect_advisories(snapshot, expected, contract, &mut advisories);
        }

        if !LINE_ITEM_TABLES
            .iter()
            .any(|name| snapshot.table(name).is_some())
        {
            advisories.push(SchemaAdvisory::NoLineItemEntity);
        }

        violations.sort();
        violations.dedup();
        advisories.sort();
        advisories.dedup();

        Self {
            violations,
            advisories,
        }
    }

    /// True when no violation was found. Advisories do not count.
    pub fn is_compliant(&self) -> bool {
        self.violations.is_empty()
    }
}

impl fmt::Display for SchemaAuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for violation in &self.violations {
            writeln!(f, "violation: {violation}")?;
        }
        for advisory in &self.advisories {
            writeln!(f, "advisory: {advisory}")?;
        }
        Ok(())
    }
}

/// Domain service running the audit through the snapshot port.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaAuditService {
    contract: SchemaContract,
}

impl SchemaAuditService {
    /// Audit against `contract`.
    pub fn new(contract: SchemaContract) -> Self {
        Self { contract }
    }

    /// Load a snapshot and evaluate it.
    pub fn audit(
        &self,
        repository: &dyn SchemaSnapshotRepository,
    ) -> Result<SchemaAuditReport, SchemaSnapshotRepositoryError> {
        let snapshot = repository.load_schema_snapshot()?;
        Ok(SchemaAuditReport::evaluate(&snapshot, &self.contract))
    }
}

/// Audit the commerce sync contract through a snapshot repository.
///
/// # Examples
///
/// ```rust
/// use woo_sync_store::domain::audit_schema_contract;
/// use woo_sync_store::domain::ports::FixtureSchemaSnapshotRepository;
///
/// let report = audit_schema_contract(&FixtureSchemaSnapshotRepository)
///     .expect("fixture snapshot loads");
/// assert!(!report.is_compliant());
/// ```
pub fn audit_schema_contract(
    repository: &dyn SchemaSnapshotRepository,
) -> Result<SchemaAuditReport, SchemaSnapshotRepositoryError> {
    SchemaAuditService::default().audit(repository)
}

fn check_columns(
    snapshot: &SchemaSnapshot,
    table: &SchemaTable,
    expected: &TableContract,
    violations: &mut Vec<SchemaViolation>,
) {
    let name = expected.name;
    for column in expected.required_columns {
        match table.column(column) {
            None => violations.push(SchemaViolation::MissingColumn {
                table: name.to_owned(),
                column: (*column).to_owned(),
            }),
            Some(found) if found.is_nullable => {
                violations.push(SchemaViolation::NullableRequiredColumn {
                    table: name.to_owned(),
                    column: (*column).to_owned(),
                });
            }
            Some(_) => {}
        }
    }

    for column in expected.unique_keys {
        if !snapshot.has_unique_key(name, column) {
            violations.push(SchemaViolation::MissingUniqueKey {
                table: name.to_owned(),
                column: (*column).to_owned(),
            });
        }
    }

    for column in expected.indexed_columns {
        let indexed = snapshot.indexes.iter().any(|index| {
            index.table == name && index.columns.first().map(String::as_str) == Some(*column)
        });
        if !indexed {
            violations.push(SchemaViolation::MissingIndex {
                table: name.to_owned(),
                column: (*column).to_owned(),
            });
        }
    }
}

fn check_user_reference(
    snapshot: &SchemaSnapshot,
    expected: &TableContract,
    violations: &mut Vec<SchemaViolation>,
) {
    if !expected.references_user {
        return;
    }
    let references = snapshot.relationships.iter().any(|relationship| {
        relationship.referencing_table == expected.name
            && relationship.referencing_column == "wp_user_id"
            && relationship.referenced_table == "wp_users"
            && relationship.referenced_column == "wp_user_id"
    });
    if !references {
        violations.push(SchemaViolation::MissingUserReference {
            table: expected.name.to_owned(),
        });
    }
}

fn check_access(
    snapshot: &SchemaSnapshot,
    table: &SchemaTable,
    expected: &TableContract,
    contract: &SchemaContract,
    violations: &mut Vec<SchemaViolation>,
) {
    let name = expected.name;
    let end_user = contract.end_user_role.as_str();
    let service = contract.service_role.as_str();

    if !table.row_level_security {
        violations.push(SchemaViolation::RowLevelSecurityDisabled {
            table: name.to_owned(),
        });
    }

    let has_owner_policy = has_owner_read_policy(snapshot, name, end_user);
    if expected.owner_read && !has_owner_policy {
        violations.push(SchemaViolation::MissingOwnershipPolicy {
            table: name.to_owned(),
        });
    }
    if !expected.owner_read && has_owner_policy {
        violations.push(SchemaViolation::UnexpectedOwnerReadPolicy {
            table: name.to_owned(),
        });
    }

    let has_service_policy = snapshot.policies_for(name).any(|policy| {
        policy.command == PolicyCommand::All
            && policy.applies_to(service)
            && (policy.roles.iter().any(|role| role == service) || policy.mentions(service))
    });
    if !has_service_policy {
        violations.push(SchemaViolation::MissingServicePolicy {
            table: name.to_owned(),
        });
    }

    let end_user_privileges = snapshot
        .privileges_for(name, end_user)
        .collect::<Vec<_>>();
    for privilege in &end_user_privileges {
        if !(expected.authenticated_select && *privilege == "SELECT") {
            violations.push(SchemaViolation::UnexpectedGrant {
                table: name.to_owned(),
                grantee: end_user.to_owned(),
                privilege: (*privilege).to_owned(),
            });
        }
    }
    if expected.authenticated_select && !end_user_privileges.contains(&"SELECT") {
        violations.push(SchemaViolation::MissingGrant {
            table: name.to_owned(),
            grantee: end_user.to_owned(),
            privilege: "SELECT".to_owned(),
        });
    }

    let service_privileges = snapshot.privileges_for(name, service).collect::<Vec<_>>();
    for privilege in SERVICE_PRIVILEGES {
        if !service_privileges.contains(privilege) {
            violations.push(SchemaViolation::MissingGrant {
                table: name.to_owned(),
                grantee: service.to_owned(),
                privilege: (*privilege).to_owned(),
            });
        }
    }
}

fn has_owner_read_policy(snapshot: &SchemaSnapshot, table: &str, end_user: &str) -> bool {
    snapshot.policies_for(table).any(|policy| {
        policy.command.covers_select()
            && policy.roles.iter().any(|role| role == end_user)
            && policy.mentions(CURRENT_USER_SETTING)
    })
}

fn collect_advisories(
    snapshot: &SchemaSnapshot,
    expected: &TableContract,
    contract: &SchemaContract,
    advisories: &mut Vec<SchemaAdvisory>,
) {
    let name = expected.name;
    let end_user = contract.end_user_role.as_str();

    if expected.lacks_dedup_key() {
        advisories.push(SchemaAdvisory::NoDedupKey {
            table: name.to_owned(),
        });
    }

    let readable = snapshot.policies_for(name).any(|policy| {
        policy.command.covers_select() && policy.roles.iter().any(|role| role == end_user)
    });
    if !readable {
        let granted = snapshot
            .privileges_for(name, end_user)
            .any(|privilege| privilege == "SELECT");
        advisories.push(SchemaAdvisory::NoEndUserReadPolicy {
            table: name.to_owned(),
            granted,
        });
    }
}

#[cfg(test)]
#[path = "schema_audit_tests.rs"]
mod tests;
