//! Infrastructure-agnostic view of the live database schema.
//!
//! Adapters fill a [`SchemaSnapshot`] from the catalogue; the audit and the
//! ER diagram renderer only ever see these types.

/// Catalogue snapshot of the `public` schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaSnapshot {
    pub tables: Vec<SchemaTable>,
    pub relationships: Vec<SchemaRelationship>,
    pub unique_constraints: Vec<SchemaUniqueConstraint>,
    pub indexes: Vec<SchemaIndex>,
    pub policies: Vec<SchemaPolicy>,
    pub grants: Vec<SchemaGrant>,
}

impl SchemaSnapshot {
    /// Return a deterministically ordered clone of the snapshot.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use woo_sync_store::domain::{SchemaSnapshot, SchemaTable};
    ///
    /// let snapshot = SchemaSnapshot {
    ///     tables: vec![SchemaTable::new("wp_users"), SchemaTable::new("api_usage")],
    ///     ..SchemaSnapshot::default()
    /// };
    ///
    /// assert_eq!(snapshot.normalized().tables[0].name, "api_usage");
    /// ```
    pub fn normalized(&self) -> Self {
        let mut tables = self.tables.clone();
        for table in &mut tables {
            table
                .columns
                .sort_by(|left, right| left.name.cmp(&right.name));
        }
        tables.sort_by(|left, right| left.name.cmp(&right.name));

        let mut relationships = self.relationships.clone();
        relationships.sort_by(|left, right| {
            (
                left.referenced_table.as_str(),
                left.referencing_table.as_str(),
                left.referenced_column.as_str(),
                left.referencing_column.as_str(),
            )
                .cmp(&(
                    right.referenced_table.as_str(),
                    right.referencing_table.as_str(),
                    right.referenced_column.as_str(),
                    right.referencing_column.as_str(),
                ))
        });

        let mut unique_constraints = self.unique_constraints.clone();
        unique_constraints.sort_by(|left, right| {
            (left.table.as_str(), left.name.as_str()).cmp(&(right.table.as_str(), right.name.as_str()))
        });

        let mut indexes = self.indexes.clone();
        indexes.sort_by(|left, right| {
            (left.table.as_str(), left.name.as_str()).cmp(&(right.table.as_str(), right.name.as_str()))
        });

        let mut policies = self.policies.clone();
        policies.sort_by(|left, right| {
            (left.table.as_str(), left.name.as_str()).cmp(&(right.table.as_str(), right.name.as_str()))
        });

        let mut grants = self.grants.clone();
        grants.sort_by(|left, right| {
            (
                left.table.as_str(),
                left.grantee.as_str(),
                left.privilege.as_str(),
            )
                .cmp(&(
                    right.table.as_str(),
                    right.grantee.as_str(),
                    right.privilege.as_str(),
                ))
        });

        Self {
            tables,
            relationships,
            unique_constraints,
            indexes,
            policies,
            grants,
        }
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&SchemaTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    /// True when `table` carries a single-column unique constraint on
    /// `column`. Primary keys count.
    pub fn has_unique_key(&self, table: &str, column: &str) -> bool {
        self.unique_constraints.iter().any(|constraint| {
            constraint.table == table && constraint.columns.as_slice() == [column]
        })
    }

    /// Policies attached to `table`.
    pub fn policies_for<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a SchemaPolicy> {
        self.policies.iter().filter(move |policy| policy.table == table)
    }

    /// Privileges held by `grantee` on `table`.
    pub fn privileges_for<'a>(
        &'a self,
        table: &'a str,
        grantee: &'a str,
    ) -> impl Iterator<Item = &'a str> {
        self.grants
            .iter()
            .filter(move |grant| grant.table == table && grant.grantee == grantee)
            .map(|grant| grant.privilege.as_str())
    }
}

/// A table with typed columns and its row-level security flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTable {
    pub name: String,
    pub columns: Vec<SchemaColumn>,
    pub row_level_security: bool,
}

impl SchemaTable {
    /// Empty table without RLS.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            row_level_security: false,
        }
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|column| column.name == name)
    }
}

/// A typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaColumn {
    pub name: String,
    pub data_type: String,
    pub is_primary_key: bool,
    pub is_nullable: bool,
}

/// A single-column foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRelationship {
    pub referencing_table: String,
    pub referencing_column: String,
    pub referenced_table: String,
    pub referenced_column: String,
    pub referencing_is_nullable: bool,
}

/// Primary key or unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaUniqueConstraint {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    pub is_primary_key: bool,
}

/// A secondary or constraint-backing index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaIndex {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
}

/// Statement class a policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PolicyCommand {
    All,
    Select,
    Insert,
    Update,
    Delete,
}

impl PolicyCommand {
    /// Parse the `cmd` column of `pg_policies`.
    pub fn from_catalog(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "ALL" | "*" => Some(Self::All),
            "SELECT" | "R" => Some(Self::Select),
            "INSERT" | "A" => Some(Self::Insert),
            "UPDATE" | "W" => Some(Self::Update),
            "DELETE" | "D" => Some(Self::Delete),
            _ => None,
        }
    }

    /// True when the policy governs reads.
    pub fn covers_select(self) -> bool {
        matches!(self, Self::All | Self::Select)
    }
}

/// A row-level security policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaPolicy {
    pub table: String,
    pub name: String,
    pub command: PolicyCommand,
    /// Role names the policy is bound to; `public` when unrestricted.
    pub roles: Vec<String>,
    pub using_expression: Option<String>,
    pub check_expression: Option<String>,
}

impl SchemaPolicy {
    /// True when the policy applies to `role`, directly or through `public`.
    pub fn applies_to(&self, role: &str) -> bool {
        self.roles
            .iter()
            .any(|candidate| candidate == role || candidate == "public")
    }

    /// True when either predicate mentions `fragment`.
    pub fn mentions(&self, fragment: &str) -> bool {
        [&self.using_expression, &self.check_expression]
            .into_iter()
            .flatten()
            .any(|expression| expression.contains(fragment))
    }
}

/// One table privilege held by one role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaGrant {
    pub table: String,
    pub grantee: String,
    /// Upper-case privilege name, e.g. `SELECT`.
    pub privilege: String,
}
