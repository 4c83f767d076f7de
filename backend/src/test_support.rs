//! Fixtures and artefact readers shared by unit and integration tests.
//!
//! Built for `cfg(test)` and behind the `test-support` feature.

pub mod cap_fs {
    //! Artefact inspection through `cap_std::fs::Dir`.
    //!
    //! Each helper opens the parent directory with ambient authority and
    //! operates on the final path component only.

    use std::io;
    use std::path::Path;

    use cap_std::{ambient_authority, fs::Dir};

    fn open_parent(path: &Path) -> io::Result<(Dir, &Path)> {
        let leaf = path.file_name().map(Path::new).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no final component", path.display()),
            )
        })?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        Ok((Dir::open_ambient_dir(parent, ambient_authority())?, leaf))
    }

    /// Read a generated text artefact.
    ///
    /// ```rust
    /// use cap_std::{ambient_authority, fs::Dir};
    /// use woo_sync_store::test_support::cap_fs::read_file_to_string;
    ///
    /// let dir = tempfile::tempdir()?;
    /// Dir::open_ambient_dir(dir.path(), ambient_authority())?.write("schema.mmd", "erDiagram\n")?;
    /// assert_eq!(read_file_to_string(&dir.path().join("schema.mmd"))?, "erDiagram\n");
    /// # Ok::<(), std::io::Error>(())
    /// ```
    pub fn read_file_to_string(path: &Path) -> io::Result<String> {
        let (parent, leaf) = open_parent(path)?;
        parent.read_to_string(leaf)
    }

    /// False when the path or any of its ancestors is missing.
    pub fn path_exists(path: &Path) -> bool {
        open_parent(path).is_ok_and(|(parent, leaf)| parent.exists(leaf))
    }

    /// Sorted entry names of a directory.
    pub fn list_directory(path: &Path) -> io::Result<Vec<String>> {
        let directory = Dir::open_ambient_dir(path, ambient_authority())?;
        let mut names = Vec::new();
        for entry in directory.entries()? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

pub mod fixtures {
    //! Sample records for repository and service tests.

    use chrono::{DateTime, TimeZone, Utc};
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::domain::{
        EmailAddress, WcOrderId, WcOrderSnapshot, WcProductId, WcProductSnapshot, WpUserId,
        WpUserProfile,
    };

    /// Valid user id; panics on non-positive input.
    pub fn user_id(raw: i64) -> WpUserId {
        WpUserId::new(raw).expect("fixture ids are positive")
    }

    /// Fixed instant `days` after 2025-01-01T00:00:00Z.
    pub fn day(days: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0)
            .single()
            .expect("valid fixture date")
            + chrono::Duration::days(days)
    }

    /// Profile with email `user{raw}@example.com` and a subscriber role.
    pub fn profile(raw: i64) -> WpUserProfile {
        let mut profile = WpUserProfile::new(
            user_id(raw),
            EmailAddress::new(format!("user{raw}@example.com")).expect("valid fixture email"),
        );
        profile.username = Some(format!("user{raw}"));
        profile.display_name = Some(format!("User {raw}"));
        profile.roles = Some(json!(["subscriber"]));
        profile
    }

    /// Order owned by `owner` with the given total and status.
    pub fn order(
        order_id: i64,
        owner: Option<WpUserId>,
        total: Decimal,
        status: &str,
        created: DateTime<Utc>,
    ) -> WcOrderSnapshot {
        let mut snapshot =
            WcOrderSnapshot::new(WcOrderId::new(order_id).expect("valid fixture order id"));
        snapshot.wp_user_id = owner;
        snapshot.status = Some(status.to_owned());
        snapshot.total = Some(total);
        snapshot.currency = Some("GBP".to_owned());
        snapshot.date_created = Some(created);
        snapshot.product_names = vec![format!("Product for order {order_id}")];
        snapshot.product_count = Some(1);
        snapshot
    }

    /// Published product with a price.
    pub fn product(product_id: i64, name: &str, price: Decimal) -> WcProductSnapshot {
        let mut snapshot =
            WcProductSnapshot::new(WcProductId::new(product_id).expect("valid fixture product id"));
        snapshot.name = Some(name.to_owned());
        snapshot.status = Some("publish".to_owned());
        snapshot.product_type = Some("simple".to_owned());
        snapshot.price = Some(price);
        snapshot.regular_price = Some(price);
        snapshot.categories = Some(json!([{ "id": 1, "name": "Tea" }]));
        snapshot
    }
}
