//! # Stack capture and inspection.
//!
//! [`StackTrace`] captures the current call stack as resolved frames
//! (function, file, line) and answers the two questions the resolver
//! pipeline asks: does this stack pass through a given file, or
//! through a given function?
//!
//! ## Formatting
//! - `{}` — short form: `basename:line` per frame, space-separated in
//!   brackets.
//! - `{:#}` — long form: one frame per line, function name then
//!   indented full `file:line`.
//!
//! ## Rules
//! - Frames belonging to the capture machinery itself are skipped.
//! - Symbol names are demangled and carry crate/module prefixes, so
//!   function queries match by substring.
//! - Resolution quality depends on debug info; frames without symbols
//!   are dropped rather than reported as `unknown`.

use std::fmt;
use std::path::Path;

/// One resolved call-stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Demangled function name, including crate/module path.
    pub function: String,
    /// Full path of the defining source file, when known.
    pub file: String,
    /// Line number within `file`, when known.
    pub line: u32,
}

impl Frame {
    /// `basename:line` of the frame.
    fn short(&self) -> String {
        let base = Path::new(&self.file)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.clone());
        format!("{}:{}", base, self.line)
    }
}

/// An ordered stack of frames, innermost (newest) first.
#[derive(Debug, Clone, Default)]
pub struct StackTrace {
    frames: Vec<Frame>,
}

impl StackTrace {
    /// Captures the current call stack, skipping the capture
    /// machinery's own frames.
    pub fn capture() -> Self {
        Self::capture_with_skip(0)
    }

    /// As [`capture`](Self::capture), additionally dropping the first
    /// `skip` caller frames.
    pub fn capture_with_skip(skip: usize) -> Self {
        let raw = backtrace::Backtrace::new();
        let mut frames = Vec::new();
        for frame in raw.frames() {
            for symbol in frame.symbols() {
                let Some(name) = symbol.name() else { continue };
                let function = name.to_string();
                if is_capture_internals(&function) {
                    continue;
                }
                frames.push(Frame {
                    function,
                    file: symbol
                        .filename()
                        .map(|p| p.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                    line: symbol.lineno().unwrap_or(0),
                });
            }
        }
        Self {
            frames: frames.into_iter().skip(skip).collect(),
        }
    }

    /// The resolved frames, innermost first.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// True when nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// True when any frame's file path ends with `suffix`.
    pub fn references_file(&self, suffix: &str) -> bool {
        self.frames.iter().any(|f| f.file.ends_with(suffix))
    }

    /// True when any frame's demangled function name contains `needle`.
    ///
    /// Substring match: symbol names carry crate and module prefixes
    /// (and closure suffixes), so exact comparison would rarely hit.
    pub fn references_function(&self, needle: &str) -> bool {
        self.frames.iter().any(|f| f.function.contains(needle))
    }
}

impl fmt::Display for StackTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            for frame in &self.frames {
                writeln!(f, "{}", frame.function)?;
                writeln!(f, "\t{}:{}", frame.file, frame.line)?;
            }
            Ok(())
        } else {
            write!(f, "[")?;
            for (i, frame) in self.frames.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", frame.short())?;
            }
            write!(f, "]")
        }
    }
}

/// Frames produced by the backtrace crate or this module's capture
/// path; callers never want to see them.
fn is_capture_internals(function: &str) -> bool {
    function.starts_with("backtrace::")
        || function.contains("StackTrace::capture")
        || function.contains("::trace::is_capture_internals")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn capture_probe_helper() -> StackTrace {
        StackTrace::capture()
    }

    #[test]
    fn capture_resolves_frames() {
        let trace = capture_probe_helper();
        assert!(!trace.is_empty(), "expected at least one resolved frame");
    }

    #[test]
    fn capture_references_current_file_and_function() {
        let trace = capture_probe_helper();
        assert!(trace.references_file("mod.rs"));
        assert!(trace.references_function("capture_probe_helper"));
        assert!(!trace.references_function("no_such_function_anywhere"));
        assert!(!trace.references_file("no_such_file.rs"));
    }

    #[test]
    fn long_format_contains_function_and_file() {
        let trace = capture_probe_helper();
        let long = format!("{trace:#}");
        assert!(long.contains("capture_probe_helper"));
        assert!(long.contains("mod.rs"));
    }

    #[test]
    fn short_format_uses_basenames() {
        let trace = capture_probe_helper();
        let short = trace.to_string();
        assert!(short.starts_with('['));
        assert!(short.ends_with(']'));
        assert!(short.contains("mod.rs:"));
        // full paths never appear in the short form
        assert!(!short.contains("/src/trace/"));
    }

    #[test]
    fn skip_drops_leading_frames() {
        let full = StackTrace::capture();
        let skipped = StackTrace::capture_with_skip(2);
        assert!(skipped.len() <= full.len().saturating_sub(1));
    }
}
