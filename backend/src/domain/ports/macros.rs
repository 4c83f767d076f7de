//! `define_port_error!`: error enums for repository ports.
//!
//! Each variant names its fields and a display template. The macro derives
//! `thiserror::Error` and adds one snake-case constructor per variant whose
//! arguments accept anything convertible into the field type, so
//! `StorePersistenceError::query("boom")` works without `.to_owned()`.

macro_rules! define_port_error {
    (
        $(#[$enum_attr:meta])*
        pub enum $name:ident {
            $(
                $(#[$doc:meta])*
                $variant:ident { $($field:ident : $ty:ty),+ $(,)? } => $template:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_attr])*
        #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
        pub enum $name {
            $(
                $(#[$doc])*
                #[error($template)]
                $variant { $($field: $ty),+ },
            )+
        }

        ::paste::paste! {
            impl $name {
                $(
                    #[doc = "Build [`" $name "::" $variant "`]."]
                    pub fn [<$variant:snake>]($($field: impl Into<$ty>),+) -> Self {
                        Self::$variant { $($field: $field.into()),+ }
                    }
                )+
            }
        }
    };
}

pub(crate) use define_port_error;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    define_port_error! {
        pub enum SyncPortError {
            Stale { table: String } => "stale snapshot for {table}",
            Skipped { count: u32 } => "skipped {count} rows",
            Rejected { table: String, count: u32 } => "{table} rejected {count} rows",
        }
    }

    #[rstest]
    #[case(SyncPortError::stale("wc_orders"), "stale snapshot for wc_orders")]
    #[case(SyncPortError::skipped(3_u32), "skipped 3 rows")]
    #[case(SyncPortError::rejected("wc_products", 2_u32), "wc_products rejected 2 rows")]
    fn constructors_fill_fields_in_order(#[case] error: SyncPortError, #[case] expected: &str) {
        assert_eq!(error.to_string(), expected);
    }

    #[rstest]
    fn constructors_build_the_named_variant() {
        assert_eq!(
            SyncPortError::rejected(String::from("wp_users"), 1_u32),
            SyncPortError::Rejected {
                table: "wp_users".to_owned(),
                count: 1,
            }
        );
    }
}
