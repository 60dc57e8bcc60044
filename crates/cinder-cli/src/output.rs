//! Diagnostic and status output.
//!
//! Uses `termcolor` for colored terminal output and respects `NO_COLOR`.

use crate::Format;
use cinder_compiler::{render_diagnostics, CompilerError};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from the `--color` flag and environment.
///
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

#[derive(Serialize)]
struct FileReport<'a> {
    file: String,
    diagnostics: &'a [CompilerError],
}

pub struct Reporter {
    stdout: StandardStream,
    stderr: StandardStream,
    format: Format,
}

impl Reporter {
    pub fn new(choice: ColorChoice, format: Format) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
            stderr: StandardStream::stderr(choice),
            format,
        }
    }

    /// Report the diagnostics of one file.
    pub fn diagnostics(&mut self, file: &Path, source: &str, diagnostics: &[CompilerError]) -> anyhow::Result<()> {
        match self.format {
            Format::Pretty => {
                let name = file.display().to_string();
                render_diagnostics(&mut self.stderr, &name, source, diagnostics)?;
            }
            Format::Json => {
                if diagnostics.is_empty() {
                    return Ok(());
                }
                let report = FileReport {
                    file: file.display().to_string(),
                    diagnostics,
                };
                writeln!(self.stdout, "{}", serde_json::to_string(&report)?)?;
            }
        }
        Ok(())
    }

    /// One status line on stderr, e.g. `compiled main.cn (2 warnings)`.
    pub fn status(&mut self, ok: bool, verb: &str, detail: &str) {
        if self.format == Format::Json {
            return;
        }
        let (color, word) = if ok { (Color::Green, verb) } else { (Color::Red, "failed") };
        let _ = self.stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(self.stderr, "{:>10}", word);
        let _ = self.stderr.reset();
        let _ = writeln!(self.stderr, " {}", detail);
    }

    pub fn stdout(&mut self) -> &mut StandardStream {
        &mut self.stdout
    }
}
