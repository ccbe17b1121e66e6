//! Small string helpers.

/// Upper-cases the first character and lower-cases the rest.
///
/// Used to normalize category names, so `"fun"`, `"FUN"` and `"Fun"` all
/// become `"Fun"`.
pub fn capitalize(input: &str) -> String {
    let mut chars = input.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Returns `true` if `token` contains any whitespace character.
pub fn has_whitespace(token: &str) -> bool {
    token.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("information"), "Information");
        assert_eq!(capitalize("FUN"), "Fun");
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("  mod "), "Mod");
    }
}
