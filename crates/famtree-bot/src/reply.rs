/// Outgoing text for one turn. Each segment becomes one chat message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    segments: Vec<String>,
}

impl Reply {
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            segments: vec![body.into()],
        }
    }

    /// All segments joined by a blank line, for logs and tests.
    pub fn joined(&self) -> String {
        self.segments.join("\n\n")
    }

    /// TwiML messaging response with one `<Message>` per segment.
    pub fn to_twiml(&self) -> String {
        let mut out = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
        for segment in &self.segments {
            out.push_str("<Message>");
            out.push_str(&escape_xml(segment));
            out.push_str("</Message>");
        }
        out.push_str("</Response>");
        out
    }
}

impl From<Vec<String>> for Reply {
    fn from(segments: Vec<String>) -> Self {
        Self { segments }
    }
}

fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_message_element_per_segment() {
        let reply = Reply::from(vec!["first".to_string(), "second".to_string()]);
        assert_eq!(
            reply.to_twiml(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Message>first</Message><Message>second</Message></Response>"#
        );
    }

    #[test]
    fn markup_is_escaped() {
        let xml = Reply::text("Tom & Jerry <3 'quotes' \"too\"").to_twiml();
        assert!(xml.contains("Tom &amp; Jerry &lt;3 &apos;quotes&apos; &quot;too&quot;"));
    }

    #[test]
    fn empty_reply_is_bare_response() {
        assert_eq!(
            Reply::default().to_twiml(),
            r#"<?xml version="1.0" encoding="UTF-8"?><Response></Response>"#
        );
    }
}
