use std::borrow::Cow;

use crate::Configuration;

/// Prefix `field` with the escape character when it starts with an injection character.
pub fn sanitize_for_injection<'a>(field: &'a str, config: &Configuration) -> Cow<'a, str> {
    match field.chars().next() {
        Some(first) if config.injection_characters.contains(&first) => {
            let mut out = String::with_capacity(field.len() + 1);
            out.push(config.injection_escape_character);
            out.push_str(field);
            Cow::Owned(out)
        }
        _ => Cow::Borrowed(field),
    }
}

/// Remove control characters that cannot appear in worksheet XML.
///
/// Tab, line feed and carriage return are kept.
pub fn strip_control_characters(field: &str) -> Cow<'_, str> {
    if !field.chars().any(is_invalid_xml_control) {
        return Cow::Borrowed(field);
    }
    Cow::Owned(field.chars().filter(|c| !is_invalid_xml_control(*c)).collect())
}

fn is_invalid_xml_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}')
}

/// Apply the enabled cleanups to a field about to be stored in a cell.
pub(crate) fn prepare_cell_text<'a>(field: &'a str, config: &Configuration) -> Cow<'a, str> {
    let field = if config.sanitize_for_injection {
        sanitize_for_injection(field, config)
    } else {
        Cow::Borrowed(field)
    };
    if !config.strip_control_characters {
        return field;
    }
    let stripped = match strip_control_characters(&field) {
        Cow::Owned(stripped) => Some(stripped),
        Cow::Borrowed(_) => None,
    };
    stripped.map_or(field, Cow::Owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_leading_injection_characters() {
        let config = Configuration::default();
        assert_eq!(sanitize_for_injection("=SUM(A1)", &config), "'=SUM(A1)");
        assert_eq!(sanitize_for_injection("-1", &config), "'-1");
        assert_eq!(sanitize_for_injection("a=b", &config), "a=b");
        assert_eq!(sanitize_for_injection("", &config), "");
    }

    #[test]
    fn strips_only_xml_invalid_controls() {
        assert_eq!(strip_control_characters("a\u{01}b\u{1F}c"), "abc");
        assert_eq!(strip_control_characters("a\tb\nc\r"), "a\tb\nc\r");
        assert!(matches!(strip_control_characters("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn prepare_respects_configuration() {
        let mut config = Configuration {
            sanitize_for_injection: true,
            ..Configuration::default()
        };
        assert_eq!(prepare_cell_text("@x\u{0B}", &config), "'@x");

        config.sanitize_for_injection = false;
        config.strip_control_characters = false;
        assert_eq!(prepare_cell_text("@x\u{0B}", &config), "@x\u{0B}");

        // Stripping goes through the public helper and keeps clean text borrowed.
        config.strip_control_characters = true;
        assert_eq!(prepare_cell_text("a\u{00}b", &config), strip_control_characters("a\u{00}b"));
        assert!(matches!(prepare_cell_text("clean", &config), Cow::Borrowed("clean")));
    }
}
