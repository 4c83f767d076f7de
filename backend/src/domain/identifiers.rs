//! External identifiers minted by WordPress and WooCommerce.
//!
//! Every synced record is correlated with its source system through one of
//! these keys. They are stored as `INTEGER` columns, so the newtypes wrap
//! `i32` and reject zero and negative values at construction time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation errors raised when constructing identifiers or addresses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierValidationError {
    /// External identifiers are always strictly positive.
    #[error("{kind} must be a positive integer, got {value}")]
    NonPositive { kind: &'static str, value: i64 },
    /// The identifier does not fit the `INTEGER` column.
    #[error("{kind} {value} does not fit a 32-bit column")]
    OutOfRange { kind: &'static str, value: i64 },
    /// Text could not be parsed as an identifier.
    #[error("{kind} must be numeric, got {raw:?}")]
    NotNumeric { kind: &'static str, raw: String },
    /// Email address was empty after trimming.
    #[error("email address must not be empty")]
    EmptyEmail,
    /// Email address did not contain a local part and a domain.
    #[error("email address {0:?} is malformed")]
    MalformedEmail(String),
    /// Email address exceeds the `VARCHAR(255)` column.
    #[error("email address exceeds {max} characters")]
    EmailTooLong { max: usize },
}

macro_rules! define_external_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i32")]
        pub struct $name(i32);

        impl $name {
            /// Validate and wrap a raw identifier.
            pub fn new(value: i64) -> Result<Self, IdentifierValidationError> {
                if value <= 0 {
                    return Err(IdentifierValidationError::NonPositive { kind: $kind, value });
                }
                i32::try_from(value)
                    .map(Self)
                    .map_err(|_| IdentifierValidationError::OutOfRange { kind: $kind, value })
            }

            /// Raw column value.
            pub const fn get(self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = IdentifierValidationError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<i32> for $name {
            type Error = IdentifierValidationError;

            fn try_from(value: i32) -> Result<Self, Self::Error> {
                Self::new(i64::from(value))
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdentifierValidationError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let value = raw.trim().parse::<i64>().map_err(|_| {
                    IdentifierValidationError::NotNumeric {
                        kind: $kind,
                        raw: raw.to_owned(),
                    }
                })?;
                Self::new(value)
            }
        }
    };
}

define_external_id!(
    /// WordPress user identifier; the join key for every per-user collection.
    WpUserId,
    "wp_user_id"
);
define_external_id!(
    /// WooCommerce order identifier.
    WcOrderId,
    "wc_order_id"
);
define_external_id!(
    /// WooCommerce product identifier.
    WcProductId,
    "wc_product_id"
);
define_external_id!(
    /// WooCommerce customer identifier carried on order snapshots.
    WcCustomerId,
    "wc_customer_id"
);

/// Maximum length of email columns.
pub const EMAIL_MAX: usize = 255;

/// Contact address stored on users, usage counters and history entries.
///
/// ## Invariants
/// - Non-empty once trimmed; stored trimmed.
/// - Contains exactly one `@` with text on both sides.
/// - At most [`EMAIL_MAX`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Validate and construct an [`EmailAddress`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use woo_sync_store::domain::EmailAddress;
    ///
    /// let email = EmailAddress::new(" ada@example.com ").expect("valid email");
    /// assert_eq!(email.as_ref(), "ada@example.com");
    /// assert!(EmailAddress::new("not-an-email").is_err());
    /// ```
    pub fn new(raw: impl Into<String>) -> Result<Self, IdentifierValidationError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(IdentifierValidationError::EmptyEmail);
        }
        if trimmed.chars().count() > EMAIL_MAX {
            return Err(IdentifierValidationError::EmailTooLong { max: EMAIL_MAX });
        }
        match trimmed.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
            {
                Ok(Self(trimmed.to_owned()))
            }
            _ => Err(IdentifierValidationError::MalformedEmail(trimmed.to_owned())),
        }
    }

    /// Wrap a value read back from the store without validating it.
    ///
    /// The email columns only require non-null text, so rows written by
    /// other clients may hold values [`EmailAddress::new`] would reject.
    pub(crate) fn from_stored(raw: String) -> Self {
        Self(raw)
    }

    /// Borrow the address.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = IdentifierValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    //! Validation coverage for identifiers and email addresses.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0)]
    #[case(-7)]
    fn non_positive_ids_are_rejected(#[case] raw: i64) {
        let error = WpUserId::new(raw).expect_err("non-positive id");
        assert!(matches!(
            error,
            IdentifierValidationError::NonPositive { kind: "wp_user_id", .. }
        ));
    }

    #[rstest]
    fn ids_beyond_integer_columns_are_rejected() {
        let error = WcOrderId::new(i64::from(i32::MAX) + 1).expect_err("overflow");
        assert!(matches!(error, IdentifierValidationError::OutOfRange { .. }));
    }

    #[rstest]
    fn ids_parse_from_trimmed_text() {
        let id: WcProductId = " 42 ".parse().expect("numeric id");
        assert_eq!(id.get(), 42);
        assert!("forty-two".parse::<WcProductId>().is_err());
    }

    #[rstest]
    fn ids_deserialize_through_validation() {
        let id: WpUserId = serde_json::from_str("17").expect("valid id");
        assert_eq!(id, WpUserId::new(17).expect("valid id"));
        assert!(serde_json::from_str::<WpUserId>("-1").is_err());
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("nobody")]
    #[case("@example.com")]
    #[case("ada@")]
    #[case("a@b@c")]
    fn malformed_emails_are_rejected(#[case] raw: &str) {
        assert!(EmailAddress::new(raw).is_err());
    }

    #[rstest]
    fn overlong_emails_are_rejected() {
        let raw = format!("{}@example.com", "a".repeat(EMAIL_MAX));
        assert_eq!(
            EmailAddress::new(raw),
            Err(IdentifierValidationError::EmailTooLong { max: EMAIL_MAX })
        );
    }
}
