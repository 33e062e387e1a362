//! Identifier newtypes shared across the gatekeeper crates.

/// Macro to define a newtype wrapper around `i64` with standard trait
/// implementations.
///
/// Each generated type:
/// - Is a transparent wrapper around `i64` (zero runtime cost)
/// - Derives `Copy`, `Clone`, `Debug`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Derives `Serialize` and `Deserialize` (transparent)
/// - Implements `From<i64>` and `Into<i64>`
/// - Implements `Display` that outputs the inner value
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Returns `true` for the zero placeholder id.
            #[must_use]
            pub fn is_placeholder(self) -> bool {
                self.0 == 0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Identifier of a user account in the durable identity store.
    ///
    /// `UserId(0)` is the placeholder for "no account" and is never cached or
    /// treated as authenticated.
    ///
    /// # Examples
    ///
    /// ```
    /// use gatekeeper_storage::UserId;
    ///
    /// let id = UserId::from(42);
    /// assert_eq!(i64::from(id), 42);
    /// assert_eq!(id.to_string(), "42");
    /// assert!(UserId::default().is_placeholder());
    /// ```
    UserId
);

define_id!(
    /// Identifier of a role row in the durable role store.
    RoleId
);
