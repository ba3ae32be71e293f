//! Indented text output.

pub(crate) struct Emitter {
    output: String,
    indent: usize,
    indent_size: usize,
}

impl Emitter {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
            indent_size: 4,
        }
    }

    fn write_indent(&mut self) {
        for _ in 0..(self.indent * self.indent_size) {
            self.output.push(' ');
        }
    }

    /// Write one line at the current indentation. Empty lines carry no
    /// trailing spaces.
    pub fn line(&mut self, s: &str) {
        if !s.is_empty() {
            self.write_indent();
            self.output.push_str(s);
        }
        self.output.push('\n');
    }

    pub fn blank(&mut self) {
        self.output.push('\n');
    }

    /// `header {` and indent.
    pub fn open(&mut self, header: &str) {
        self.line(&format!("{} {{", header));
        self.indent += 1;
    }

    /// Dedent and `}`.
    pub fn close(&mut self) {
        self.close_with("}");
    }

    /// Dedent and write `text`, e.g. `} else {` or `});`.
    pub fn close_with(&mut self, text: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
    }

    /// Dedent for a `} else {` style line and indent again.
    pub fn reopen(&mut self, text: &str) {
        self.close_with(text);
        self.indent += 1;
    }

    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn finish(self) -> String {
        self.output
    }
}
