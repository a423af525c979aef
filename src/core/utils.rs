//! String helpers shared by field resolution and the template filters

/// Answers that count as "yes" when a rendered string is evaluated as a flag.
const TRUTHY: &[&str] = &["yes", "true", "y", "1", "ja", "on"];

/// Answers that count as an explicit "no".
const FALSY: &[&str] = &["no", "false", "n", "0", "nein", "off"];

/// Evaluates a rendered template string as a boolean.
///
/// Only the (case-insensitive) values `yes`, `true`, `y`, `1`, `ja` and `on`
/// are true; everything else, including the empty string, is false.
///
/// # Examples
/// ```
/// use parboil::core::utils::eval_bool;
///
/// assert!(eval_bool("True"));
/// assert!(eval_bool(" on "));
/// assert!(!eval_bool("nope"));
/// assert!(!eval_bool(""));
/// ```
pub fn eval_bool(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TRUTHY.contains(&value.as_str())
}

/// Parses a yes/no answer. Returns `None` when the answer is neither.
pub fn parse_answer(value: &str) -> Option<bool> {
    let value = value.trim().to_lowercase();
    if TRUTHY.contains(&value.as_str()) {
        Some(true)
    } else if FALSY.contains(&value.as_str()) {
        Some(false)
    } else {
        None
    }
}

/// Converts a string into a name that is safe to use as a file name.
///
/// The input is split on case changes, whitespace, dashes and underscores and
/// joined with underscores. Characters other than ASCII alphanumerics and dots
/// are dropped.
///
/// # Examples
/// ```
/// use parboil::core::utils::fileify;
///
/// assert_eq!(fileify("My Project"), "my_project");
/// assert_eq!(fileify("helloWorld.py"), "hello_world.py");
/// assert_eq!(fileify("Über/Main"), "ber_main");
/// ```
pub fn fileify(s: &str) -> String {
    let mut result = String::new();
    let mut prev_is_lowercase = false;

    for ch in s.chars() {
        if ch.is_ascii_uppercase() {
            if prev_is_lowercase {
                result.push('_');
            }
            result.push(ch.to_ascii_lowercase());
            prev_is_lowercase = false;
        } else if ch.is_ascii_alphanumeric() || ch == '.' {
            result.push(ch);
            prev_is_lowercase = ch.is_ascii_lowercase();
        } else if ch == '-' || ch == '_' || ch.is_whitespace() {
            if !result.is_empty() && !result.ends_with('_') {
                result.push('_');
            }
            prev_is_lowercase = false;
        }
    }

    result.trim_matches('_').to_string()
}

/// Converts a string into a lower-case, dash separated slug.
///
/// # Examples
/// ```
/// use parboil::core::utils::slugify;
///
/// assert_eq!(slugify("Hello, World!"), "hello-world");
/// assert_eq!(slugify("  parboil -- templates  "), "parboil-templates");
/// ```
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Formats a positive integer as Roman numerals. Zero yields an empty string.
///
/// # Examples
/// ```
/// use parboil::core::utils::to_roman;
///
/// assert_eq!(to_roman(2024), "MMXXIV");
/// assert_eq!(to_roman(9), "IX");
/// ```
pub fn to_roman(mut n: u64) -> String {
    const NUMERALS: &[(u64, &str)] = &[
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    let mut out = String::new();
    for &(value, numeral) in NUMERALS {
        while n >= value {
            out.push_str(numeral);
            n -= value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_bool() {
        for yes in ["yes", "TRUE", "y", "1", "ja", "On"] {
            assert!(eval_bool(yes), "{yes} should be true");
        }
        for no in ["no", "false", "0", "", "maybe", "2"] {
            assert!(!eval_bool(no), "{no} should be false");
        }
    }

    #[test]
    fn test_parse_answer() {
        assert_eq!(parse_answer("Y"), Some(true));
        assert_eq!(parse_answer("nein"), Some(false));
        assert_eq!(parse_answer("off"), Some(false));
        assert_eq!(parse_answer("perhaps"), None);
    }

    #[test]
    fn test_fileify() {
        assert_eq!(fileify("findPetsByStatus"), "find_pets_by_status");
        assert_eq!(fileify("Find Pets By Status"), "find_pets_by_status");
        assert_eq!(fileify("find-pets-by-status"), "find_pets_by_status");
        assert_eq!(fileify("__init__.py"), "init_.py");
        assert_eq!(fileify("README.md"), "readme.md");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Great Project"), "my-great-project");
        assert_eq!(slugify("--already-slugged--"), "already-slugged");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn test_to_roman() {
        assert_eq!(to_roman(0), "");
        assert_eq!(to_roman(4), "IV");
        assert_eq!(to_roman(14), "XIV");
        assert_eq!(to_roman(1994), "MCMXCIV");
    }
}
