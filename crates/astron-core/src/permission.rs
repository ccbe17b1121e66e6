//! Permission tokens and permission sets.
//!
//! Permissions are opaque upper-case tokens such as `SEND_MESSAGES` or
//! `KICK_MEMBERS`. The router never interprets them; it only diffs the set a
//! handler requires against the set the transport reports as granted.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A single permission token, normalized to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Permission(String);

impl Permission {
    /// Creates a permission token, trimming and upper-casing it.
    pub fn new(token: impl AsRef<str>) -> Self {
        Self(token.as_ref().trim().to_uppercase())
    }

    /// Returns the token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The set of permissions granted to an identity in some channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    granted: HashSet<Permission>,
}

impl PermissionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `permission` is granted.
    pub fn has(&self, permission: &Permission) -> bool {
        self.granted.contains(permission)
    }

    /// Grants a permission.
    pub fn insert(&mut self, permission: impl Into<Permission>) {
        self.granted.insert(permission.into());
    }

    /// Returns the subset of `required` that is not granted, in the order it
    /// was required.
    pub fn missing<'a>(&self, required: &'a [Permission]) -> Vec<&'a Permission> {
        required.iter().filter(|p| !self.has(p)).collect()
    }

    /// Returns the number of granted permissions.
    pub fn len(&self) -> usize {
        self.granted.len()
    }

    /// Returns `true` if nothing is granted.
    pub fn is_empty(&self) -> bool {
        self.granted.is_empty()
    }
}

impl<P: Into<Permission>> FromIterator<P> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = P>>(iter: I) -> Self {
        Self {
            granted: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Normalizes a list of tokens into an ordered list without duplicates.
pub fn dedup_permissions<I, P>(tokens: I) -> Vec<Permission>
where
    I: IntoIterator<Item = P>,
    P: Into<Permission>,
{
    let mut seen = HashSet::new();
    tokens
        .into_iter()
        .map(Into::into)
        .filter(|p: &Permission| !p.as_str().is_empty() && seen.insert(p.clone()))
        .collect()
}

/// Formats a list for a user-facing message.
///
/// Every item is wrapped in backticks; items are joined with `, ` and the
/// last one is attached with ` and `:
///
/// - `["A"]` → `` `A` ``
/// - `["A", "B"]` → `` `A` and `B` ``
/// - `["A", "B", "C"]` → `` `A`, `B` and `C` ``
pub fn format_list<T: fmt::Display>(items: &[T]) -> String {
    let quoted: Vec<String> = items.iter().map(|item| format!("`{item}`")).collect();
    match quoted.split_last() {
        None => String::new(),
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {last}", rest.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_normalized() {
        assert_eq!(Permission::new(" send_messages ").as_str(), "SEND_MESSAGES");
    }

    #[test]
    fn test_missing_preserves_required_order() {
        let granted: PermissionSet = ["SEND_MESSAGES", "EMBED_LINKS"].into_iter().collect();
        let required = dedup_permissions(["KICK_MEMBERS", "SEND_MESSAGES", "BAN_MEMBERS"]);
        let missing: Vec<&str> = granted
            .missing(&required)
            .into_iter()
            .map(Permission::as_str)
            .collect();
        assert_eq!(missing, vec!["KICK_MEMBERS", "BAN_MEMBERS"]);
    }

    #[test]
    fn test_dedup_permissions() {
        let perms = dedup_permissions(["a", "A", "b", ""]);
        assert_eq!(perms, vec![Permission::new("A"), Permission::new("B")]);
    }

    #[test]
    fn test_format_list_single() {
        let text = format_list(&["A"]);
        assert_eq!(text, "`A`");
        assert!(!text.contains("and"));
    }

    #[test]
    fn test_format_list_two() {
        assert_eq!(format_list(&["A", "B"]), "`A` and `B`");
    }

    #[test]
    fn test_format_list_three() {
        assert_eq!(format_list(&["A", "B", "C"]), "`A`, `B` and `C`");
    }

    #[test]
    fn test_format_list_empty() {
        assert_eq!(format_list::<&str>(&[]), "");
    }
}
