//! Canonical property and entry-tag name derivation.

use heck::ToKebabCase;

/// Accessor prefixes stripped before name derivation.
const PREFIXES: [&str; 3] = ["get", "set", "is"];

/// Derive the canonical property name from a raw accessor name.
///
/// Strips the accessor prefix, splits on case transitions (a maximal run of
/// uppercase letters counts as one abbreviation word), joins with `-` and
/// lowercases: `getFooFOOFoo` becomes `foo-foo-foo`.
pub fn property_name(accessor: &str) -> String {
    let stripped = PREFIXES
        .iter()
        .find_map(|prefix| {
            accessor.strip_prefix(prefix).filter(|rest| {
                rest.chars()
                    .next()
                    .is_some_and(|c| c.is_uppercase() || c == '_')
            })
        })
        .unwrap_or(accessor);
    stripped.to_kebab_case()
}

/// Derive the default entry tag for a collection property: the singular of
/// a plural property name, or the literal `entry` when the name carries no
/// plural form.
pub fn entry_tag(property: &str) -> String {
    if let Some(stem) = property.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{stem}y");
        }
    }
    if let Some(stem) = property.strip_suffix('s') {
        if !stem.is_empty() && !stem.ends_with('s') {
            return stem.to_string();
        }
    }
    "entry".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_accessor() {
        assert_eq!(property_name("getFoo"), "foo");
    }

    #[test]
    fn camel_case_splits_on_transitions() {
        assert_eq!(property_name("getFooFooFoo"), "foo-foo-foo");
    }

    #[test]
    fn abbreviation_run_is_one_word() {
        assert_eq!(property_name("getFOO"), "foo");
        assert_eq!(property_name("getFooFOOFoo"), "foo-foo-foo");
    }

    #[test]
    fn setter_and_is_prefixes() {
        assert_eq!(property_name("setTimeout"), "timeout");
        assert_eq!(property_name("isEnabled"), "enabled");
    }

    #[test]
    fn unprefixed_name_is_used_as_is() {
        assert_eq!(property_name("issueCount"), "issue-count");
    }

    #[test]
    fn entry_tag_singularizes() {
        assert_eq!(entry_tag("entries"), "entry");
        assert_eq!(entry_tag("workers"), "worker");
        assert_eq!(entry_tag("children"), "entry");
        assert_eq!(entry_tag("class"), "entry");
    }
}
