//! Macro for implementing Display and FromStr for wire enums
//!
//! Cache keys and identity-provider payloads carry several small enums as
//! lowercase strings. This macro generates both directions from one table.
//!
//! # Example
//!
//! ```rust
//! use tokenflow_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Prompt {
//!     Login,
//!     Consent,
//! }
//!
//! impl_domain_enum_conversions!(Prompt {
//!     Login => "login",
//!     Consent => "consent",
//! });
//! ```

/// Implements Display and FromStr traits for string-mapped enums
///
/// - Display writes the mapped lowercase string
/// - FromStr parses case-insensitively
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    // Invoking crates usually have a one-parameter alias in scope.
    type Result<T> = std::result::Result<T, crate::errors::AuthError>;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestKind {
        Alpha,
        Beta,
    }

    impl_domain_enum_conversions!(TestKind {
        Alpha => "alpha",
        Beta => "beta",
    });

    #[test]
    fn test_display_conversion() {
        assert_eq!(TestKind::Alpha.to_string(), "alpha");
        assert_eq!(TestKind::Beta.to_string(), "beta");
    }

    #[test]
    fn test_fromstr_mixed_case() {
        assert_eq!(TestKind::from_str("ALPHA").unwrap(), TestKind::Alpha);
        assert_eq!(TestKind::from_str("BeTa").unwrap(), TestKind::Beta);
    }

    #[test]
    fn test_fromstr_with_result_alias_in_scope() {
        let parsed: Result<TestKind> =
            TestKind::from_str("alpha").map_err(crate::errors::AuthError::InvalidScope);
        assert_eq!(parsed.unwrap(), TestKind::Alpha);
    }

    #[test]
    fn test_fromstr_invalid() {
        let result = TestKind::from_str("gamma");
        assert!(result.unwrap_err().contains("Invalid TestKind: gamma"));
    }
}
