//! Control-sequence stripping for prompt detection.

use vte::{Parser, Perform};

/// Strip terminal control sequences from raw PTY output.
///
/// CSI (cursor movement, colors, bracketed paste), OSC (window titles),
/// DCS and bare escape sequences are dropped, as are carriage returns and
/// other C0 controls. Newlines and tabs survive.
pub fn strip_control(data: &[u8]) -> String {
    let mut text = PlainText {
        output: String::with_capacity(data.len()),
    };
    let mut parser = Parser::new();
    parser.advance(&mut text, data);
    text.output
}

/// VTE performer that keeps only printable text.
struct PlainText {
    output: String,
}

impl Perform for PlainText {
    fn print(&mut self, c: char) {
        self.output.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\t') {
            self.output.push(byte as char);
        }
    }
}
