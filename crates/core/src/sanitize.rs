use once_cell::sync::Lazy;
use regex::Regex;

static INVALID: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_-]").expect("regex"));
static COLLAPSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("regex"));

/// Cleans an arbitrary name (uploaded filename, grade label) into a safe
/// identifier for collection names and download filenames: alphanumerics
/// plus `_`/`-`, runs of underscores collapsed, at most 63 characters, and
/// the result starts and ends with an alphanumeric.
pub fn sanitize_name(raw: &str) -> String {
    let replaced = INVALID.replace_all(raw, "_");
    let collapsed = COLLAPSE.replace_all(&replaced, "_");
    let mut cleaned: String = collapsed.trim_matches('_').chars().take(63).collect();
    while cleaned
        .chars()
        .next()
        .is_some_and(|c| !c.is_ascii_alphanumeric())
    {
        cleaned.remove(0);
    }
    while cleaned
        .chars()
        .last()
        .is_some_and(|c| !c.is_ascii_alphanumeric())
    {
        cleaned.pop();
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_invalid_characters() {
        assert_eq!(sanitize_name("Grade 5 Fractions.pdf"), "Grade_5_Fractions_pdf");
    }

    #[test]
    fn collapses_runs_and_trims_edges() {
        assert_eq!(sanitize_name("__weird   name!!"), "weird_name");
    }

    #[test]
    fn caps_length_at_63() {
        assert_eq!(sanitize_name(&"a".repeat(120)).len(), 63);
    }

    #[test]
    fn strips_non_alphanumeric_edges() {
        assert_eq!(sanitize_name("-notes-"), "notes");
    }
}
