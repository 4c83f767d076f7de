//! Expected shape of the commerce sync schema.
//!
//! The contract is the checklist the audit compares a live snapshot against:
//! keys, required columns, indexes, the user reference, and which caller
//! classes may read each table.

use super::access::DatabaseRole;

/// Expectations for a single table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableContract {
    pub name: &'static str,
    /// Columns that must carry a single-column unique constraint.
    pub unique_keys: &'static [&'static str],
    /// Columns that must be `NOT NULL`.
    pub required_columns: &'static [&'static str],
    /// Columns that must lead some index.
    pub indexed_columns: &'static [&'static str],
    /// True when `wp_user_id` must reference `wp_users.wp_user_id`.
    pub references_user: bool,
    /// True when authenticated callers may read their own rows.
    pub owner_read: bool,
    /// True when `authenticated` holds table-level `SELECT`.
    pub authenticated_select: bool,
}

impl TableContract {
    /// True when nothing stops the same logical row being written twice.
    pub fn lacks_dedup_key(&self) -> bool {
        self.unique_keys.is_empty()
    }
}

/// Privileges the service role needs on every table.
pub const SERVICE_PRIVILEGES: &[&str] = &["SELECT", "INSERT", "UPDATE", "DELETE"];

/// Table names that would model order line items.
pub const LINE_ITEM_TABLES: &[&str] = &["wc_order_items", "wc_order_line_items", "order_items"];

const TABLES: &[TableContract] = &[
    TableContract {
        name: "wp_users",
        unique_keys: &["wp_user_id"],
        required_columns: &["wp_user_id", "email"],
        indexed_columns: &["wp_user_id", "email"],
        references_user: false,
        owner_read: true,
        authenticated_select: true,
    },
    TableContract {
        name: "api_usage",
        unique_keys: &[],
        required_columns: &["email"],
        indexed_columns: &["wp_user_id"],
        references_user: true,
        owner_read: true,
        authenticated_select: true,
    },
    TableContract {
        name: "query_history",
        unique_keys: &[],
        required_columns: &["email"],
        indexed_columns: &["wp_user_id"],
        references_user: true,
        owner_read: false,
        authenticated_select: true,
    },
    TableContract {
        name: "wc_orders",
        unique_keys: &["wc_order_id"],
        required_columns: &["wc_order_id"],
        indexed_columns: &["wp_user_id", "wc_order_id"],
        references_user: true,
        owner_read: true,
        authenticated_select: true,
    },
    TableContract {
        name: "wc_products",
        unique_keys: &["wc_product_id"],
        required_columns: &["wc_product_id"],
        indexed_columns: &["wc_product_id"],
        references_user: false,
        owner_read: false,
        authenticated_select: true,
    },
    TableContract {
        name: "user_sessions",
        unique_keys: &[],
        required_columns: &[],
        indexed_columns: &["wp_user_id"],
        references_user: true,
        owner_read: false,
        authenticated_select: false,
    },
];

/// The full set of table expectations plus the roles they are checked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaContract {
    pub tables: &'static [TableContract],
    pub end_user_role: DatabaseRole,
    pub service_role: DatabaseRole,
}

impl SchemaContract {
    /// Contract for the six commerce sync tables.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use woo_sync_store::domain::SchemaContract;
    ///
    /// let contract = SchemaContract::commerce_sync();
    /// assert_eq!(contract.tables.len(), 6);
    /// assert!(contract.table("wc_orders").is_some_and(|table| table.owner_read));
    /// ```
    pub const fn commerce_sync() -> Self {
        Self {
            tables: TABLES,
            end_user_role: DatabaseRole::Authenticated,
            service_role: DatabaseRole::Service,
        }
    }

    /// Look up a table's expectations by name.
    pub fn table(&self, name: &str) -> Option<&'static TableContract> {
        self.tables.iter().find(|table| table.name == name)
    }
}

impl Default for SchemaContract {
    fn default() -> Self {
        Self::commerce_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("api_usage", true)]
    #[case("query_history", true)]
    #[case("user_sessions", true)]
    #[case("wp_users", false)]
    #[case("wc_orders", false)]
    #[case("wc_products", false)]
    fn dedup_gaps_match_the_collections_without_keys(#[case] table: &str, #[case] gap: bool) {
        let contract = SchemaContract::commerce_sync();
        assert_eq!(
            contract.table(table).map(TableContract::lacks_dedup_key),
            Some(gap)
        );
    }

    #[rstest]
    fn user_sessions_are_hidden_from_end_users() {
        let contract = SchemaContract::commerce_sync();
        let sessions = contract.table("user_sessions").expect("sessions contract");
        assert!(!sessions.authenticated_select);
        assert!(!sessions.owner_read);
    }
}
