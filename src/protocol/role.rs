//! Connection roles and the two-slot container addressed by them.
//!
//! A session always owns exactly two connections. `Primary` is the
//! client-side endpoint (the one whose frames carry a sequence counter),
//! `Secondary` is the server-side endpoint.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which side of the bridge a connection (or a chunk) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Client-side endpoint.
    Primary,
    /// Server-side endpoint.
    Secondary,
}

impl Role {
    /// The other endpoint.
    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Role::Primary => Role::Secondary,
            Role::Secondary => Role::Primary,
        }
    }

    /// Whether frames originating from this side carry a sequence counter.
    #[inline]
    pub fn carries_counter(self) -> bool {
        matches!(self, Role::Primary)
    }

    /// Human readable traffic direction for frames originating here.
    pub fn direction(self) -> &'static str {
        match self {
            Role::Primary => "Client->Server",
            Role::Secondary => "Server->Client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.direction())
    }
}

/// A fixed pair of values, one per [`Role`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directional<T> {
    /// Value for the primary side.
    pub primary: T,
    /// Value for the secondary side.
    pub secondary: T,
}

impl<T> Directional<T> {
    /// Create a pair from its two slots.
    pub fn new(primary: T, secondary: T) -> Self {
        Self { primary, secondary }
    }

    /// Build both slots from the role they belong to.
    pub fn from_fn(mut f: impl FnMut(Role) -> T) -> Self {
        Self {
            primary: f(Role::Primary),
            secondary: f(Role::Secondary),
        }
    }

    /// Borrow the slot for `role`.
    #[inline]
    pub fn get(&self, role: Role) -> &T {
        match role {
            Role::Primary => &self.primary,
            Role::Secondary => &self.secondary,
        }
    }

    /// Mutably borrow the slot for `role`.
    #[inline]
    pub fn get_mut(&mut self, role: Role) -> &mut T {
        match role {
            Role::Primary => &mut self.primary,
            Role::Secondary => &mut self.secondary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_is_involution() {
        assert_eq!(Role::Primary.opposite(), Role::Secondary);
        assert_eq!(Role::Secondary.opposite(), Role::Primary);
        assert_eq!(Role::Primary.opposite().opposite(), Role::Primary);
    }

    #[test]
    fn test_only_primary_carries_counter() {
        assert!(Role::Primary.carries_counter());
        assert!(!Role::Secondary.carries_counter());
    }

    #[test]
    fn test_directional_slots() {
        let mut pair = Directional::from_fn(|role| role.direction().len());
        *pair.get_mut(Role::Secondary) += 1;

        assert_eq!(*pair.get(Role::Primary), "Client->Server".len());
        assert_eq!(*pair.get(Role::Secondary), "Server->Client".len() + 1);
    }
}
