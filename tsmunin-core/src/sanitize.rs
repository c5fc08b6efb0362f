use once_cell::sync::Lazy;
use regex::Regex;

static INVALID_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_]+").expect("field name pattern must compile"));

/// Turns arbitrary text into a Munin field name fragment.
///
/// Everything outside `[A-Za-z0-9_]` is dropped, then leading digits are
/// stripped so the result never starts with one. The result may be empty.
pub fn sanitize_field_name(raw: &str) -> String {
    let cleaned = INVALID_CHARS.replace_all(raw, "");
    cleaned
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "",
        "Lobby",
        "Main Room",
        "My Server | EU/1",
        "42 is the answer",
        "1337",
        "__private",
        "ÜberServer™",
        "#!@$%",
        "  spaced\tout\n",
        "snake_case_9",
    ];

    fn is_valid_fragment(value: &str) -> bool {
        value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            && !value.starts_with(|c: char| c.is_ascii_digit())
    }

    #[test]
    fn output_is_always_a_valid_fragment() {
        for sample in SAMPLES {
            let clean = sanitize_field_name(sample);
            assert!(is_valid_fragment(&clean), "{:?} -> {:?}", sample, clean);
        }
    }

    #[test]
    fn valid_names_are_left_alone() {
        for name in ["Lobby", "snake_case_9", "_x1", "ABCdef123"] {
            assert_eq!(sanitize_field_name(name), name);
        }
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        for sample in SAMPLES {
            let once = sanitize_field_name(sample);
            assert_eq!(sanitize_field_name(&once), once);
        }
    }

    #[test]
    fn strips_symbols_and_leading_digits() {
        assert_eq!(sanitize_field_name("Main Room"), "MainRoom");
        assert_eq!(sanitize_field_name("My Server | EU/1"), "MyServerEU1");
        assert_eq!(sanitize_field_name("42 is the answer"), "istheanswer");
        assert_eq!(sanitize_field_name("ÜberServer™"), "berServer");
    }

    #[test]
    fn symbol_only_names_collapse_to_empty() {
        assert_eq!(sanitize_field_name("#!@$%"), "");
        assert_eq!(sanitize_field_name("1337"), "");
    }
}
