//! Rendering of caller-supplied style rules into an inline stylesheet.

use crate::compiler::CompilationError;
use crate::models::StyleRules;

const FORBIDDEN_CHARS: &[char] = &['{', '}', '<', ';', '\\', '\n', '\r'];
const COMMENT_MARKERS: &[&str] = &["/*", "*/"];

/// Renders rules as `selector{prop:value;...}` lines, in map order.
///
/// Rejects anything that could close the surrounding `<style>` element or leak
/// into a neighbouring rule.
pub fn render_stylesheet(rules: &StyleRules) -> Result<String, CompilationError> {
    let mut css = String::new();
    for (selector, declarations) in rules.iter() {
        let selector = selector.trim();
        validate_selector(selector)?;
        if declarations.is_empty() {
            continue;
        }

        css.push_str(selector);
        css.push('{');
        for (property, value) in declarations {
            let property = property.trim();
            let value = value.trim();
            validate_declaration(selector, property, value)?;
            css.push_str(property);
            css.push(':');
            css.push_str(value);
            css.push(';');
        }
        css.push_str("}\n");
    }
    Ok(css)
}

fn validate_selector(selector: &str) -> Result<(), CompilationError> {
    if selector.is_empty() {
        return Err(invalid(selector, "selector is empty"));
    }
    if let Some(reason) = breakout_reason(selector) {
        return Err(invalid(selector, &format!("selector {reason}")));
    }
    Ok(())
}

fn validate_declaration(selector: &str, property: &str, value: &str) -> Result<(), CompilationError> {
    let valid_property = !property.is_empty()
        && property
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if !valid_property {
        return Err(invalid(selector, &format!("invalid property name '{property}'")));
    }
    if value.is_empty() {
        return Err(invalid(selector, &format!("empty value for '{property}'")));
    }
    if let Some(reason) = breakout_reason(value) {
        return Err(invalid(selector, &format!("value for '{property}' {reason}")));
    }
    Ok(())
}

/// Why `text` could end its rule early or swallow the rules after it.
fn breakout_reason(text: &str) -> Option<&'static str> {
    if text.contains(FORBIDDEN_CHARS) {
        return Some("contains a forbidden character");
    }
    if COMMENT_MARKERS.iter().any(|marker| text.contains(marker)) {
        return Some("contains a comment marker");
    }
    if !quotes_balanced(text) {
        return Some("has an unterminated string");
    }
    None
}

fn quotes_balanced(text: &str) -> bool {
    let mut open: Option<char> = None;
    for c in text.chars() {
        open = match open {
            Some(quote) if c == quote => None,
            Some(quote) => Some(quote),
            None if c == '"' || c == '\'' => Some(c),
            None => None,
        };
    }
    open.is_none()
}

fn invalid(selector: &str, reason: &str) -> CompilationError {
    CompilationError::InvalidStyle {
        selector: selector.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_ordered() {
        let rules = StyleRules::new()
            .declare("h1", "font-size", "24px")
            .declare(".resume", "padding", "12mm")
            .declare("h1", "color", "#222");
        assert_eq!(
            render_stylesheet(&rules).unwrap(),
            ".resume{padding:12mm;}\nh1{color:#222;font-size:24px;}\n"
        );
    }

    #[test]
    fn test_empty_rules_render_nothing() {
        assert_eq!(render_stylesheet(&StyleRules::new()).unwrap(), "");
    }

    #[test]
    fn test_rejects_style_breakout() {
        let rules = StyleRules::new().declare("p", "color", "red</style><script>x()</script>");
        let err = render_stylesheet(&rules).unwrap_err();
        assert!(matches!(err, CompilationError::InvalidStyle { .. }));
    }

    #[test]
    fn test_rejects_rule_injection() {
        let rules = StyleRules::new().declare("p", "color", "red} body{display:none");
        assert!(render_stylesheet(&rules).is_err());

        let rules = StyleRules::new().declare("p{}", "color", "red");
        assert!(render_stylesheet(&rules).is_err());

        let rules = StyleRules::new().declare("p", "col or", "red");
        assert!(render_stylesheet(&rules).is_err());
    }

    #[test]
    fn test_rejects_comment_markers() {
        for value in ["red /*", "red */", "/* hidden */ red"] {
            let rules = StyleRules::new()
                .declare(".a", "color", value)
                .declare(".b", "color", "blue");
            let err = render_stylesheet(&rules).unwrap_err();
            assert!(err.to_string().contains("comment"), "{value}: {err}");
        }

        let rules = StyleRules::new().declare(".a /*", "color", "red");
        assert!(render_stylesheet(&rules).is_err());
    }

    #[test]
    fn test_rejects_unterminated_strings() {
        for value in ["\"x", "'x", "\"a\" 'b"] {
            let rules = StyleRules::new()
                .declare(".a", "font-family", value)
                .declare(".b", "display", "none");
            let err = render_stylesheet(&rules).unwrap_err();
            assert!(err.to_string().contains("unterminated"), "{value}: {err}");
        }

        let rules = StyleRules::new().declare("a[title=\"x]", "color", "red");
        assert!(render_stylesheet(&rules).is_err());
    }

    #[test]
    fn test_rejects_escapes_and_newlines() {
        let rules = StyleRules::new().declare(".a", "content", "'x\\'");
        assert!(render_stylesheet(&rules).is_err());

        let rules = StyleRules::new().declare(".a", "color", "red\n}.b{color:blue");
        assert!(render_stylesheet(&rules).is_err());

        let rules = StyleRules::new().declare("h1,\nh2", "color", "red");
        assert!(render_stylesheet(&rules).is_err());
    }

    #[test]
    fn test_balanced_quotes_are_accepted() {
        let rules = StyleRules::new()
            .declare("a[data-kind='link']", "font-family", "\"Inter\", 'Segoe UI', sans-serif")
            .declare(".quote", "quotes", "\"'\" \"'\"");
        assert_eq!(
            render_stylesheet(&rules).unwrap(),
            ".quote{quotes:\"'\" \"'\";}\na[data-kind='link']{font-family:\"Inter\", 'Segoe UI', sans-serif;}\n"
        );
    }
}
