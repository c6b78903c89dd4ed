//! Indentation-aware writer for emitted C source.

/// Accumulates C source text, tracking brace depth so the backends can
/// emit statements without hand-managing indentation.
#[derive(Debug, Default)]
pub struct CWriter {
    buf: String,
    indent: usize,
}

impl CWriter {
    pub fn new() -> Self {
        CWriter::default()
    }

    /// Emit one line at the current indentation.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.buf.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.buf.push_str("  ");
        }
        self.buf.push_str(text);
        self.buf.push('\n');
    }

    pub fn blank(&mut self) {
        self.buf.push('\n');
    }

    /// Open a `{` block and indent.
    pub fn open(&mut self) {
        self.line("{");
        self.indent += 1;
    }

    /// Close the current block with a bare `}`.
    pub fn close(&mut self) {
        self.close_with("}");
    }

    /// Close the current block with custom text, e.g. `} while (...);`.
    pub fn close_with(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// Emit a single statement indented under a brace-less `if`/`for`.
    pub fn then(&mut self, text: &str) {
        self.indent += 1;
        self.line(text);
        self.indent -= 1;
    }

    pub fn into_string(self) -> String {
        self.buf
    }
}
