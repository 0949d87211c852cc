//! HTML fragment for the presence snapshot.

/// Escapes text for an HTML body or attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Renders the online user list as a fragment suitable for swapping into a
/// page.
pub fn render_online_users(users: &[String]) -> String {
    let mut html = format!(
        "<section id=\"presence\" data-count=\"{}\">\n<h2>Online ({})</h2>\n",
        users.len(),
        users.len()
    );
    if users.is_empty() {
        html.push_str("<p class=\"presence-empty\">Nobody is online.</p>\n");
    } else {
        html.push_str("<ul class=\"presence-list\">\n");
        for user in users {
            let user = escape_html(user);
            html.push_str(&format!("<li data-user-id=\"{user}\">{user}</li>\n"));
        }
        html.push_str("</ul>\n");
    }
    html.push_str("</section>\n");
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_markup() {
        assert_eq!(
            escape_html("<b>\"a\" & 'b'</b>"),
            "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_renders_users_in_order() {
        let html = render_online_users(&["alice".into(), "<bob>".into()]);
        assert!(html.contains("data-count=\"2\""));
        let alice = html.find(">alice<").unwrap();
        let bob = html.find(">&lt;bob&gt;<").unwrap();
        assert!(alice < bob);
        assert!(!html.contains("<bob>"));
    }

    #[test]
    fn test_empty_snapshot() {
        let html = render_online_users(&[]);
        assert!(html.contains("Nobody is online"));
        assert!(html.contains("Online (0)"));
    }
}
