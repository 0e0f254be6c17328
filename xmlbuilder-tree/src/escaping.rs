//! XML escaping utilities.

use core::fmt::{self, Write};

/// Wraps a `fmt::Write` and escapes XML special characters as text passes
/// through.
pub struct EscapingWriter<'a> {
    inner: &'a mut dyn Write,
    in_attribute: bool,
}

impl<'a> EscapingWriter<'a> {
    /// Create an escaping writer for text content.
    /// Escapes: `&` `<` `>`
    pub fn text(inner: &'a mut dyn Write) -> Self {
        Self {
            inner,
            in_attribute: false,
        }
    }

    /// Create an escaping writer for double-quoted attribute values.
    /// Escapes: `&` `<` `>` `"` and the whitespace characters that
    /// attribute normalization would otherwise fold into spaces.
    pub fn attribute(inner: &'a mut dyn Write) -> Self {
        Self {
            inner,
            in_attribute: true,
        }
    }
}

impl Write for EscapingWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let mut start = 0;
        for (idx, ch) in s.char_indices() {
            let escaped = match ch {
                '&' => "&amp;",
                '<' => "&lt;",
                '>' => "&gt;",
                '"' if self.in_attribute => "&quot;",
                '\n' if self.in_attribute => "&#10;",
                '\r' if self.in_attribute => "&#13;",
                '\t' if self.in_attribute => "&#9;",
                _ => continue,
            };
            self.inner.write_str(&s[start..idx])?;
            self.inner.write_str(escaped)?;
            start = idx + ch.len_utf8();
        }
        self.inner.write_str(&s[start..])
    }
}

/// Escape text content into a new string.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let _ = EscapingWriter::text(&mut out).write_str(s);
    out
}
