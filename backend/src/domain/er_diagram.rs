//! Mermaid entity-relationship rendering of a [`SchemaSnapshot`].
//!
//! Output is deterministic so the committed `schema.mmd` only changes when
//! the schema does.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use super::schema_snapshot::{SchemaColumn, SchemaRelationship, SchemaSnapshot, SchemaTable};

/// Render a Mermaid ER diagram.
///
/// Columns are marked `PK`, `FK` and `UK` from the snapshot's keys; tables
/// with row-level security get an `rls` comment on their first line.
///
/// # Examples
///
/// ```rust
/// use woo_sync_store::domain::{
///     SchemaColumn, SchemaRelationship, SchemaSnapshot, SchemaTable, render_mermaid_er_diagram,
/// };
///
/// let column = |name: &str, is_primary_key: bool| SchemaColumn {
///     name: name.to_owned(),
///     data_type: "integer".to_owned(),
///     is_primary_key,
///     is_nullable: !is_primary_key,
/// };
/// let mut users = SchemaTable::new("wp_users");
/// users.columns = vec![column("id", true), column("wp_user_id", false)];
/// let mut usage = SchemaTable::new("api_usage");
/// usage.columns = vec![column("id", true), column("wp_user_id", false)];
///
/// let snapshot = SchemaSnapshot {
///     tables: vec![users, usage],
///     relationships: vec![SchemaRelationship {
///         referencing_table: "api_usage".to_owned(),
///         referencing_column: "wp_user_id".to_owned(),
///         referenced_table: "wp_users".to_owned(),
///         referenced_column: "wp_user_id".to_owned(),
///         referencing_is_nullable: true,
///     }],
///     ..SchemaSnapshot::default()
/// };
///
/// assert!(render_mermaid_er_diagram(&snapshot).contains("WpUsers ||--o{ ApiUsage"));
/// ```
pub fn render_mermaid_er_diagram(snapshot: &SchemaSnapshot) -> String {
    let normalized = snapshot.normalized();
    let keys = ColumnKeys::from_snapshot(&normalized);
    let mut output = String::from("erDiagram\n");

    for table in &normalized.tables {
        render_table_entity(&mut output, table, &keys);
    }

    for relationship in &normalized.relationships {
        render_relationship_line(&mut output, relationship);
    }

    output
}

/// Foreign-key and unique markers per `(table, column)`.
struct ColumnKeys<'a> {
    foreign: BTreeSet<(&'a str, &'a str)>,
    unique: BTreeSet<(&'a str, &'a str)>,
}

impl<'a> ColumnKeys<'a> {
    fn from_snapshot(snapshot: &'a SchemaSnapshot) -> Self {
        let foreign = snapshot
            .relationships
            .iter()
            .map(|relationship| {
                (
                    relationship.referencing_table.as_str(),
                    relationship.referencing_column.as_str(),
                )
            })
            .collect();
        let unique = snapshot
            .unique_constraints
            .iter()
            .filter(|constraint| !constraint.is_primary_key)
            .filter_map(|constraint| match constraint.columns.as_slice() {
                [column] => Some((constraint.table.as_str(), column.as_str())),
                _ => None,
            })
            .collect();
        Self { foreign, unique }
    }

    fn markers(&self, table: &str, column: &SchemaColumn) -> Vec<&'static str> {
        let mut markers = Vec::new();
        if column.is_primary_key {
            markers.push("PK");
        }
        if self.foreign.contains(&(table, column.name.as_str())) {
            markers.push("FK");
        }
        if self.unique.contains(&(table, column.name.as_str())) {
            markers.push("UK");
        }
        markers
    }
}

fn render_table_entity(output: &mut String, table: &SchemaTable, keys: &ColumnKeys<'_>) {
    let _ = writeln!(output, "  {} {{", to_pascal_case(table.name.as_str()));

    for column in &table.columns {
        let markers = keys.markers(table.name.as_str(), column);
        let _ = write!(
            output,
            "    {} {}",
            sanitize_data_type(column.data_type.as_str()),
            column.name
        );
        if !markers.is_empty() {
            let _ = write!(output, " {}", markers.join(", "));
        }
        if column.is_primary_key && table.row_level_security {
            output.push_str(" \"rls\"");
        }
        output.push('\n');
    }

    output.push_str("  }\n\n");
}

fn render_relationship_line(output: &mut String, relationship: &SchemaRelationship) {
    let cardinality = if relationship.referencing_is_nullable {
        "||--o{"
    } else {
        "||--|{"
    };

    let _ = writeln!(
        output,
        "  {} {} {} : \"{} -> {}\"",
        to_pascal_case(relationship.referenced_table.as_str()),
        cardinality,
        to_pascal_case(relationship.referencing_table.as_str()),
        relationship.referencing_column,
        relationship.referenced_column,
    );
}

fn to_pascal_case(value: &str) -> String {
    let words: Vec<&str> = value.split('_').filter(|word| !word.is_empty()).collect();
    if words.is_empty() {
        return value.to_owned();
    }
    words
        .into_iter()
        .flat_map(|word| {
            let (head, tail) = word.split_at(word.chars().next().map_or(0, char::len_utf8));
            head.chars().flat_map(char::to_uppercase).chain(tail.chars())
        })
        .collect()
}

/// Mermaid attribute types must be single identifiers, so `character
/// varying(255)` becomes `character_varying_255` and `text[]` becomes
/// `text_array`.
fn sanitize_data_type(value: &str) -> String {
    let lowered = value.replace("[]", " array ").to_ascii_lowercase();
    let words: Vec<&str> = lowered
        .split(|character: char| !character.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect();
    if words.is_empty() {
        "unknown".to_owned()
    } else {
        words.join("_")
    }
}

/// Group table names by the tables that reference them; used by the CLI
/// summary line.
pub fn dependents_by_table(snapshot: &SchemaSnapshot) -> BTreeMap<String, BTreeSet<String>> {
    let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for relationship in &snapshot.relationships {
        dependents
            .entry(relationship.referenced_table.clone())
            .or_default()
            .insert(relationship.referencing_table.clone());
    }
    dependents
}
