//! Set and property list text formats
//!
//! Registrations keep their harvested sets and properties as text. Sets are
//! stored as a list of `(setSpec, setName)` tuples, e.g.
//! `[('publication:cs', 'Computer Science')]`; properties as a list of names,
//! e.g. `['title', 'creator']`. Both parsers also accept the looser forms
//! operators type by hand.

use crate::models::RegistrationInfo;
use crate::oai::OaiSet;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

fn tuple_pattern() -> &'static Regex {
    static TUPLE: OnceLock<Regex> = OnceLock::new();
    TUPLE.get_or_init(|| {
        Regex::new(r#"\(\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")\s*,\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")\s*,?\s*\)"#)
            .expect("set tuple pattern compiles")
    })
}

fn quoted_pattern() -> &'static Regex {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    QUOTED.get_or_init(|| {
        Regex::new(r#"'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)""#).expect("quoted pattern compiles")
    })
}

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn unquote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

pub fn serialize_sets<'a, I>(pairs: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let items: Vec<String> = pairs
        .into_iter()
        .map(|(spec, name)| format!("({}, {})", quote(spec), quote(name)))
        .collect();
    format!("[{}]", items.join(", "))
}

pub fn serialize_oai_sets(sets: &[OaiSet]) -> String {
    serialize_sets(sets.iter().map(|s| (s.spec.as_str(), s.name.as_str())))
}

/// Pairs in the order they appear. Text that holds no tuples yields nothing.
pub fn parse_sets(text: &str) -> Vec<(String, String)> {
    tuple_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let spec = caps.get(1).or_else(|| caps.get(2))?;
            let name = caps.get(3).or_else(|| caps.get(4))?;
            Some((unquote(spec.as_str()), unquote(name.as_str())))
        })
        .collect()
}

/// The part of a set spec after its last `:` (`publication:cs` -> `cs`).
pub fn short_spec(spec: &str) -> &str {
    spec.rsplit(':').next().unwrap_or(spec)
}

/// Checkbox choices for a registration's stored sets: `(short spec, name)`, de-duplicated.
pub fn format_set_choices(registration: &RegistrationInfo) -> BTreeSet<(String, String)> {
    parse_sets(&registration.approved_sets)
        .into_iter()
        .map(|(spec, name)| (short_spec(&spec).to_string(), name))
        .collect()
}

pub fn serialize_properties<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let items: Vec<String> = names.into_iter().map(quote).collect();
    format!("[{}]", items.join(", "))
}

/// Accepts `['a', 'b']` as well as a bare `a, b`.
pub fn parse_properties(text: &str) -> Vec<String> {
    let trimmed = text.trim();

    let names: Vec<String> = if trimmed.starts_with('[') {
        quoted_pattern()
            .captures_iter(trimmed)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| unquote(m.as_str()))
            .collect()
    } else {
        trimmed.split(',').map(|s| s.trim().to_string()).collect()
    };

    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .filter(|n| !n.is_empty())
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn registration_with_sets(approved_sets: &str) -> RegistrationInfo {
        RegistrationInfo {
            provider_long_name: "Stardust Weekly".to_string(),
            base_url: "http://repository.stcloudstate.edu/do/oai/".to_string(),
            property_list: "['some', 'properties']".to_string(),
            approved_sets: approved_sets.to_string(),
            ..RegistrationInfo::new(1, Utc::now())
        }
    }

    #[test]
    fn test_format_set_choices() {
        let reg = registration_with_sets("[('publication:some', 'sets')]");
        let choices = format_set_choices(&reg);
        let expected: BTreeSet<(String, String)> =
            [("some".to_string(), "sets".to_string())].into_iter().collect();
        assert_eq!(choices, expected);
    }

    #[test]
    fn test_format_set_choices_deduplicates() {
        let reg = registration_with_sets(
            "[('publication:cs', 'CS'), ('cs', 'CS'), (\"publication:ed\", \"Education\")]",
        );
        let choices = format_set_choices(&reg);
        assert_eq!(choices.len(), 2);
        assert!(choices.contains(&("ed".to_string(), "Education".to_string())));
    }

    #[test]
    fn test_format_set_choices_garbage() {
        assert!(format_set_choices(&registration_with_sets("")).is_empty());
        assert!(format_set_choices(&registration_with_sets("['some', 'sets']")).is_empty());
    }

    #[test]
    fn test_sets_text_survives_quotes() {
        let text = serialize_sets([("publication:lit", "Writers' Workshop")]);
        assert_eq!(text, r"[('publication:lit', 'Writers\' Workshop')]");
        assert_eq!(
            parse_sets(&text),
            vec![("publication:lit".to_string(), "Writers' Workshop".to_string())]
        );
    }

    #[test]
    fn test_short_spec() {
        assert_eq!(short_spec("publication:some"), "some");
        assert_eq!(short_spec("a:b:c"), "c");
        assert_eq!(short_spec("plain"), "plain");
    }

    #[test]
    fn test_parse_properties_forms() {
        assert_eq!(parse_properties("['title', 'creator']"), vec!["title", "creator"]);
        assert_eq!(parse_properties("some, properties"), vec!["some", "properties"]);
        assert_eq!(parse_properties("a, , a,b"), vec!["a", "b"]);
        assert!(parse_properties("   ").is_empty());
    }

    #[test]
    fn test_serialize_properties() {
        assert_eq!(serialize_properties(["title", "date"]), "['title', 'date']");
        assert_eq!(serialize_properties(Vec::<&str>::new()), "[]");
    }
}
