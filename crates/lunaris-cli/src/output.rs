//! Colored terminal output for CLI commands.
//!
//! Respects `NO_COLOR` and the `--color` flag.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Priority: `NO_COLOR` env > `--color` flag > auto-detect.
pub fn resolve_color_choice(flag: Option<&str>) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        _ => ColorChoice::Auto,
    }
}

pub struct StyledOutput {
    stdout: StandardStream,
    stderr: StandardStream,
}

impl StyledOutput {
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
        }
    }

    fn line(stream: &mut StandardStream, text: &str, color: Color, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(bold);
        let _ = stream.set_color(&spec);
        let _ = write!(stream, "{}", text);
        let _ = stream.reset();
        let _ = writeln!(stream);
    }

    pub fn success(&mut self, text: &str) {
        Self::line(&mut self.stdout, text, Color::Green, true);
    }

    /// A script result.
    pub fn value(&mut self, text: &str) {
        Self::line(&mut self.stdout, text, Color::Cyan, false);
    }

    pub fn stderr_error(&mut self, text: &str) {
        Self::line(&mut self.stderr, text, Color::Red, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_flag() {
        if std::env::var_os("NO_COLOR").is_none() {
            assert!(matches!(resolve_color_choice(Some("never")), ColorChoice::Never));
            assert!(matches!(resolve_color_choice(Some("always")), ColorChoice::Always));
            assert!(matches!(resolve_color_choice(None), ColorChoice::Auto));
        }
    }
}
