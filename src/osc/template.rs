//! `{Name}` placeholder expansion for OSC addresses and payloads

use super::format_number;

/// True if the text contains at least one `{name}` placeholder
pub fn has_placeholders(text: &str) -> bool {
    placeholders(text).next().is_some()
}

/// Iterate placeholder names in order of appearance
pub fn placeholders(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || loop {
        let open = rest.find('{')?;
        let after = &rest[open + 1..];
        rest = after;
        if let Some(close) = after.find('}') {
            let name = &after[..close];
            if is_identifier(name) {
                rest = &after[close + 1..];
                return Some(name);
            }
        }
    })
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replace every `{Name}` whose value `lookup` knows; unknown ones stay verbatim
pub fn expand_variables<F>(template: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<f64>,
{
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        if let Some(close) = after.find('}') {
            let name = &after[..close];
            if let Some(value) = Some(name).filter(|n| is_identifier(n)).and_then(&lookup) {
                out.push_str(&format_number(value));
                rest = &after[close + 1..];
                continue;
            }
        }
        out.push('{');
        rest = after;
    }

    out.push_str(rest);
    out
}

/// Fill the `{var}` and `{value}` tokens used by variable notifications
pub fn expand_tokens(template: &str, variable: &str, value: f64) -> String {
    template
        .replace("{var}", variable)
        .replace("{value}", &format_number(value))
}
