//! Group name and path slugs.
//!
//! The forge accepts a display name and a URL path per group; both are
//! derived from the directory group name. The name slug keeps case and
//! joins words with single spaces; the path slug lower-cases and joins
//! with single hyphens.

use std::sync::LazyLock;

use regex::Regex;

/// Runs of characters that cannot appear in a group name or path.
static GROUP_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9]+").expect("GROUP_DISALLOWED is a valid regex pattern")
});

/// Display-name slug: disallowed runs become a single space, case kept.
#[must_use]
pub fn slug_name(raw: &str) -> String {
    GROUP_DISALLOWED
        .replace_all(raw, " ")
        .trim()
        .to_string()
}

/// Path slug: disallowed runs become a single hyphen, lower-cased.
#[must_use]
pub fn slug_path(raw: &str) -> String {
    GROUP_DISALLOWED
        .replace_all(raw, "-")
        .to_lowercase()
        .trim_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_pass_through() {
        assert_eq!(slug_name("Developers"), "Developers");
        assert_eq!(slug_path("Developers"), "developers");
    }

    #[test]
    fn disallowed_runs_collapse() {
        assert_eq!(slug_name("Dev & Ops"), "Dev Ops");
        assert_eq!(slug_path("Dev & Ops"), "dev-ops");
        assert_eq!(slug_name("a.b_c-d"), "a b c d");
        assert_eq!(slug_path("a.b_c-d"), "a-b-c-d");
    }

    #[test]
    fn edges_are_trimmed() {
        assert_eq!(slug_name("  Platform Team  "), "Platform Team");
        assert_eq!(slug_path("  Platform Team  "), "platform-team");
        assert_eq!(slug_path("(internal)"), "internal");
    }

    #[test]
    fn case_is_kept_in_name_only() {
        assert_eq!(slug_name("QA Leads"), "QA Leads");
        assert_eq!(slug_path("QA Leads"), "qa-leads");
    }
}
