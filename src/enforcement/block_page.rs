//! HTML block page shown when a response policy blocks.

use std::io::Write;
use std::sync::OnceLock;

use thiserror::Error;

use crate::models::HitInfo;

const BLOCK_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>403 Forbidden</title>
<style>
body { font-family: Arial, Helvetica, sans-serif; text-align: center; background: #f9f9f9; }
.block-container { background: #fff; padding: 2em; width: 70%; margin: 3em auto; box-shadow: 0 2px 8px #ccc; }
h1 { color: #c00; }
.details { color: #555; }
</style>
</head>
<body>
<div class="block-container">
<h1>403 Forbidden</h1>
<p>Your request was blocked by the web application firewall.</p>
<p class="details">Reason: {{vuln_name}}, Policy ID: {{policy_id}}</p>
<p>If you believe this is an error, please contact the site administrator.</p>
</div>
</body>
</html>
"#;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unknown template field '{0}'")]
    UnknownField(String),

    #[error("unterminated template field at byte {0}")]
    Unterminated(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    VulnName,
    PolicyId,
}

fn compile(template: &'static str) -> Result<Vec<Segment>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or(TemplateError::Unterminated(offset + start))?;
        segments.push(match after[..end].trim() {
            "vuln_name" => Segment::VulnName,
            "policy_id" => Segment::PolicyId,
            other => return Err(TemplateError::UnknownField(other.to_string())),
        });
        let consumed = start + 2 + end + 2;
        offset += consumed;
        rest = &rest[consumed..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

fn template() -> &'static Result<Vec<Segment>, TemplateError> {
    static TEMPLATE: OnceLock<Result<Vec<Segment>, TemplateError>> = OnceLock::new();
    TEMPLATE.get_or_init(|| compile(BLOCK_HTML))
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Render the block page into `writer`. Failures are logged; whatever was
/// written before the failure stays written.
pub fn render_to<W: Write>(hit: &HitInfo, writer: &mut W) {
    let segments = match template() {
        Ok(segments) => segments,
        Err(e) => {
            tracing::error!(error = %e, "Block page template failed to compile");
            return;
        }
    };

    for segment in segments {
        let result = match segment {
            Segment::Literal(text) => writer.write_all(text.as_bytes()),
            Segment::VulnName => writer.write_all(escape_html(&hit.vuln_name).as_bytes()),
            Segment::PolicyId => write!(writer, "{}", hit.policy_id),
        };
        if let Err(e) = result {
            tracing::error!(error = %e, policy_id = hit.policy_id, "Block page render failed");
            return;
        }
    }
}

/// Render the block page to bytes. May be empty if rendering failed.
pub fn render(hit: &HitInfo) -> Vec<u8> {
    let mut buf = Vec::with_capacity(BLOCK_HTML.len() + 64);
    render_to(hit, &mut buf);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Policy, PolicyAction};

    fn hit(vuln_name: &str) -> HitInfo {
        HitInfo::from_policy(&Policy {
            id: 10086,
            app_id: 0,
            vuln_name: vuln_name.into(),
            action: PolicyAction::Block,
        })
    }

    #[test]
    fn test_render_contains_fields() {
        let page = String::from_utf8(render(&hit("SQL Injection"))).unwrap();
        assert!(page.contains("Reason: SQL Injection, Policy ID: 10086"));
        assert!(!page.contains("{{"));
    }

    #[test]
    fn test_vuln_name_is_escaped() {
        let page = String::from_utf8(render(&hit("<script>x</script>"))).unwrap();
        assert!(page.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn test_compile_rejects_unknown_field() {
        assert!(matches!(compile("a {{nope}} b"), Err(TemplateError::UnknownField(_))));
        assert!(matches!(compile("a {{vuln_name"), Err(TemplateError::Unterminated(2))));
        assert_eq!(
            compile("x{{policy_id}}y").unwrap(),
            vec![Segment::Literal("x"), Segment::PolicyId, Segment::Literal("y")]
        );
    }

    #[test]
    fn test_failing_writer_keeps_partial_output() {
        struct Limited(Vec<u8>);
        impl Write for Limited {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if self.0.len() > 16 {
                    return Err(std::io::Error::new(std::io::ErrorKind::Other, "full"));
                }
                self.0.extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }
        let mut out = Limited(Vec::new());
        render_to(&hit("x"), &mut out);
        assert!(!out.0.is_empty());
        assert!(out.0.len() < BLOCK_HTML.len());
    }
}
