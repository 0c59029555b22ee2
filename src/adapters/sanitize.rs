//! Log redaction for identifiers and credentials.
//!
//! Formatted log lines pass through [`SanitizingMakeWriter`] before they reach
//! the sink. The rules target what this service handles: user emails,
//! identity-provider tokens, prediction-service API keys and user ids written
//! as `user_id=...` / `userId: ...`.
//!
//! Call sites should still avoid logging such values; this is a second line.

use std::io::Write;
use std::sync::OnceLock;

use regex::Regex;
use tracing_subscriber::fmt::MakeWriter;

/// Lines longer than this are cut before matching.
const MAX_LINE_BYTES: usize = 16 * 1024;

struct Rule {
    regex: Regex,
    replacement: &'static str,
}

static RULES: OnceLock<Vec<Rule>> = OnceLock::new();

fn rules() -> &'static [Rule] {
    RULES.get_or_init(|| {
        [
            // Bearer tokens and bare JWTs
            (r"(?i)\bbearer\s+[A-Za-z0-9._~+/=-]{8,}", "Bearer [REDACTED-TOKEN]"),
            (
                r"\beyJ[A-Za-z0-9_-]{8,}\.[A-Za-z0-9_-]{8,}\.[A-Za-z0-9_-]{8,}\b",
                "[REDACTED-JWT]",
            ),
            // key=value credentials, e.g. API keys in URLs
            (
                r"(?i)\b(api[_-]?key|access[_-]?token|token|secret|password|key)=([^&\s]{6,})",
                "$1=[REDACTED]",
            ),
            // user ids in structured fields
            (
                r#"(?i)\b(user[_-]?id)(["']?\s*[:=]\s*["']?)[A-Za-z0-9_.-]{3,}"#,
                "${1}${2}[REDACTED-USER]",
            ),
            (
                r"(?i)\b[a-z0-9](?:[a-z0-9._%+-]{0,62}[a-z0-9])?@(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z]{2,}\b",
                "[REDACTED-EMAIL]",
            ),
        ]
        .into_iter()
        .filter_map(|(pattern, replacement)| match Regex::new(pattern) {
            Ok(regex) => Some(Rule { regex, replacement }),
            Err(e) => {
                // Only reachable after a bad edit to the table above.
                eprintln!("invalid redaction pattern {pattern:?}: {e}");
                None
            }
        })
        .collect()
    })
}

fn truncate_to_char_boundary(input: &str, max_bytes: usize) -> (&str, bool) {
    if input.len() <= max_bytes {
        return (input, false);
    }
    let mut end = max_bytes;
    while end > 0 && !input.is_char_boundary(end) {
        end -= 1;
    }
    (&input[..end], true)
}

/// Redact identifiers and credentials from one piece of text.
#[must_use]
pub fn sanitize(input: &str) -> String {
    let (prefix, truncated) = truncate_to_char_boundary(input, MAX_LINE_BYTES);
    let mut out = rules().iter().fold(prefix.to_string(), |text, rule| {
        rule.regex.replace_all(&text, rule.replacement).into_owned()
    });
    if truncated {
        out.push_str(" [TRUNCATED]");
        // Keep the line break so the next event starts on its own line.
        if input.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

/// `MakeWriter` wrapper that sanitizes each formatted line.
#[derive(Debug, Clone)]
pub struct SanitizingMakeWriter<M> {
    inner: M,
}

impl<M> SanitizingMakeWriter<M> {
    #[must_use]
    pub fn new(inner: M) -> Self {
        Self { inner }
    }
}

impl<'a, M> MakeWriter<'a> for SanitizingMakeWriter<M>
where
    M: MakeWriter<'a>,
{
    type Writer = SanitizingWriter<M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SanitizingWriter {
            inner: self.inner.make_writer(),
            pending: Vec::new(),
        }
    }
}

/// Buffers bytes until a full line is available, then writes it redacted.
pub struct SanitizingWriter<W: Write> {
    inner: W,
    pending: Vec<u8>,
}

impl<W: Write> SanitizingWriter<W> {
    fn emit(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let text = String::from_utf8_lossy(bytes);
        self.inner.write_all(sanitize(&text).as_bytes())
    }
}

impl<W: Write> Write for SanitizingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.pending.extend_from_slice(buf);

        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line)?;
        }

        // A single enormous line without newline: flush what we have.
        if self.pending.len() > MAX_LINE_BYTES * 2 {
            let chunk = std::mem::take(&mut self.pending);
            self.emit(&chunk)?;
            self.inner.write_all(b"\n")?;
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.emit(&rest)?;
        }
        self.inner.flush()
    }
}

impl<W: Write> Drop for SanitizingWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
