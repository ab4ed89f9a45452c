//! Text escaping for user-authored strings placed into markup.

/// Escapes text for use in element content or a double-quoted attribute.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Keeps only characters that are valid in a CSS class token.
pub fn sanitize_class(class: &str) -> String {
    class
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Renders a ` class="..."` attribute, or nothing when no usable class remains.
pub fn class_attr(classes: &[String]) -> String {
    let tokens: Vec<String> = classes
        .iter()
        .map(|c| sanitize_class(c))
        .filter(|c| !c.is_empty())
        .collect();
    if tokens.is_empty() {
        String::new()
    } else {
        format!(" class=\"{}\"", tokens.join(" "))
    }
}

/// Link targets that survive compilation. Anything else (`javascript:`, `data:`,
/// relative paths that would resolve against the sandbox) is dropped.
pub fn safe_href(href: &str) -> Option<String> {
    let trimmed = href.trim();
    let lower = trimmed.to_ascii_lowercase();
    let allowed = ["https://", "http://", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme));
    allowed.then(|| escape_html(trimmed))
}

/// Neutralizes sequences that would end a `<script>` element early or open an
/// HTML comment inside it.
pub fn guard_script(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let bytes = source.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            let rest = &source[i..];
            if starts_with_ignore_case(rest, "</script") {
                out.push_str("<\\/");
                i += 2;
                continue;
            }
            if rest.starts_with("<!--") {
                out.push_str("<\\!--");
                i += 4;
                continue;
            }
        }
        // Advance by a full char so multi-byte text is copied intact.
        let ch = source[i..].chars().next().unwrap_or('\u{fffd}');
        out.push(ch);
        i += ch.len_utf8().max(1);
    }
    out
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack.len() >= prefix.len()
        && haystack.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html_specials() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_escape_leaves_unicode() {
        assert_eq!(escape_html("Zürich – café"), "Zürich – café");
    }

    #[test]
    fn test_class_attr_strips_injection() {
        let classes = vec!["ok".to_string(), "x\" onclick=\"y".to_string(), "".to_string()];
        assert_eq!(class_attr(&classes), " class=\"ok xonclicky\"");
        assert_eq!(class_attr(&[]), "");
    }

    #[test]
    fn test_safe_href_schemes() {
        assert_eq!(
            safe_href("https://example.com/?a=1&b=2").as_deref(),
            Some("https://example.com/?a=1&amp;b=2")
        );
        assert!(safe_href("mailto:ada@example.com").is_some());
        assert!(safe_href("javascript:alert(1)").is_none());
        assert!(safe_href("  JavaScript:alert(1)").is_none());
        assert!(safe_href("/relative").is_none());
    }

    #[test]
    fn test_guard_script_breakouts() {
        assert_eq!(
            guard_script("a</script><img>"),
            "a<\\/script><img>"
        );
        assert_eq!(guard_script("x</SCRIPT >"), "x<\\/SCRIPT >");
        assert_eq!(guard_script("<!-- hi"), "<\\!-- hi");
        assert_eq!(guard_script("if (a < b) { ü }"), "if (a < b) { ü }");
    }
}
