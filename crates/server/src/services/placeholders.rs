//! `{{variable}}` substitution for admin-edited email and SMS templates.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};

static VARIABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").expect("Invalid regex"));

pub const COMPANY_NAME: &str = "Momtazchem";

/// Variables every template can use without the caller supplying them.
#[must_use]
pub fn default_variables(now: DateTime<Utc>) -> HashMap<String, String> {
    HashMap::from([
        ("company_name".to_owned(), COMPANY_NAME.to_owned()),
        ("date".to_owned(), now.format("%Y-%m-%d").to_string()),
        ("time".to_owned(), now.format("%H:%M").to_string()),
    ])
}

/// Replace `{{name}}` with its value. Caller values override the defaults;
/// unknown variables are left in place so a typo is visible in the output.
#[must_use]
pub fn render(content: &str, variables: &HashMap<String, String>, now: DateTime<Utc>) -> String {
    substitute(content, variables, now, str::to_owned)
}

/// [`render`] for HTML bodies: values are HTML-escaped, the template
/// markup is not.
#[must_use]
pub fn render_html(
    content: &str,
    variables: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> String {
    substitute(content, variables, now, escape_html)
}

fn escape_html(value: &str) -> String {
    match askama::filters::escape(value, askama::filters::Html) {
        Ok(escaped) => escaped.to_string(),
        Err(never) => match never {},
    }
}

fn substitute(
    content: &str,
    variables: &HashMap<String, String>,
    now: DateTime<Utc>,
    encode: fn(&str) -> String,
) -> String {
    let defaults = default_variables(now);
    VARIABLE_RE
        .replace_all(content, |caps: &Captures<'_>| {
            let name = &caps[1];
            variables
                .get(name)
                .or_else(|| defaults.get(name))
                .map_or_else(|| caps[0].to_owned(), |value| encode(value))
        })
        .into_owned()
}

/// Distinct variable names in order of first use.
#[must_use]
pub fn extract(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in VARIABLE_RE.captures_iter(content) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_owned());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 9, 5, 0).single().unwrap_or_default()
    }

    #[test]
    fn test_render_substitutes_and_defaults() {
        let vars = HashMap::from([("customer_name".to_owned(), "Rebin".to_owned())]);
        let out = render(
            "Hello {{customer_name}}, thanks from {{ company_name }} on {{date}} at {{time}}",
            &vars,
            now(),
        );
        assert_eq!(out, "Hello Rebin, thanks from Momtazchem on 2025-03-14 at 09:05");
    }

    #[test]
    fn test_caller_overrides_default() {
        let vars = HashMap::from([("company_name".to_owned(), "Momtaz Chemical".to_owned())]);
        assert_eq!(render("{{company_name}}", &vars, now()), "Momtaz Chemical");
    }

    #[test]
    fn test_unknown_variable_kept() {
        assert_eq!(
            render("Order {{order_numbr}}", &HashMap::new(), now()),
            "Order {{order_numbr}}"
        );
    }

    #[test]
    fn test_html_render_escapes_values_only() {
        let vars = HashMap::from([(
            "customer_name".to_owned(),
            "<script>alert('x')</script> & Co".to_owned(),
        )]);
        let out = render_html("<p>Dear {{customer_name}}</p>", &vars, now());
        assert_eq!(
            out,
            "<p>Dear &#60;script&#62;alert(&#39;x&#39;)&#60;/script&#62; &#38; Co</p>"
        );
        assert!(!out.contains("<script>"));

        // Plain rendering is for subjects and text parts
        assert!(render("{{customer_name}}", &vars, now()).starts_with("<script>"));
    }

    #[test]
    fn test_extract_unique_in_order() {
        assert_eq!(
            extract("{{b}} {{a}} {{b}} {x}"),
            vec!["b".to_owned(), "a".to_owned()]
        );
    }
}
