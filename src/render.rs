//! Output rendering for chat answers and status lines.
//!
//! This module provides the renderer trait the room store writes answers
//! through, a plain-text implementation for terminals, and markdown cleanup.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// ANSI escape code for dim text (used for informational lines).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for bold text (used for headers).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for cyan text (used for the answer label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for warnings).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for success notices).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering answer output.
///
/// The room store calls these as an answer is revealed or streamed, so a
/// renderer sees text incrementally and never has to diff message lists.
pub trait Renderer: Send {
    /// Called before the first fragment of an answer.
    fn start_response(&mut self) {}

    /// Print a fragment of answer text.
    fn print_text(&mut self, text: &str);

    /// Print a warning that replaces a failed answer.
    fn print_warning(&mut self, warning: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print a success message.
    fn print_success(&mut self, text: &str) {
        self.print_info(text);
    }

    /// Print a section header.
    fn print_header(&mut self, text: &str) {
        self.print_info(text);
    }

    /// Called when an answer is complete.
    fn finish_response(&mut self);

    /// Called when the user skipped the rest of an animation.
    fn print_interrupted(&mut self) {}

    /// Returns true if the user asked to skip the current animation.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer outputs text directly to stdout; errors go to stderr.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Creates a new PlainTextRenderer with specified color and interrupt flag.
    pub fn with_color_and_interrupt(use_color: bool, interrupted: Arc<AtomicBool>) -> Self {
        Self::with_color(use_color).with_interrupt(interrupted)
    }

    /// Flushes stdout to ensure immediate display of revealed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_response(&mut self) {
        let label = self.styled(ANSI_CYAN, "ai>");
        print!("{label} ");
        self.flush();
    }

    fn print_text(&mut self, text: &str) {
        print!("{text}");
        self.flush();
    }

    fn print_warning(&mut self, warning: &str) {
        let warning = self.styled(ANSI_YELLOW, warning);
        print!("{warning}");
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        let error = self.styled(ANSI_RED, &format!("Error: {error}"));
        eprintln!("{error}");
    }

    fn print_info(&mut self, info: &str) {
        let info = self.styled(ANSI_DIM, info);
        println!("{info}");
        self.flush();
    }

    fn print_success(&mut self, text: &str) {
        let text = self.styled(ANSI_GREEN, text);
        println!("{text}");
        self.flush();
    }

    fn print_header(&mut self, text: &str) {
        let text = self.styled(ANSI_BOLD, text);
        println!("{text}");
        self.flush();
    }

    fn finish_response(&mut self) {
        println!();
        self.flush();
    }

    fn print_interrupted(&mut self) {
        let text = self.styled(ANSI_DIM, "[skipped]");
        print!(" {text}");
        self.flush();
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/////////////////////////////////////////// Markdown ///////////////////////////////////////////

fn is_list_item(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("+ ") {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && line[digits..].starts_with(". ")
}

/// Insert a blank line before a list that directly follows a paragraph.
///
/// Answers often start a list on the line after a sentence, which most
/// markdown renderers then fold into the paragraph.
pub fn normalize_list_spacing(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut previous: Option<&str> = None;
    for line in text.split('\n') {
        if let Some(prev) = previous {
            out.push('\n');
            if is_list_item(line) && !prev.trim().is_empty() && !is_list_item(prev) {
                out.push('\n');
            }
        }
        out.push_str(line);
        previous = Some(line);
    }
    out
}
