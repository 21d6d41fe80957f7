use console::style;

use crate::cluster::ApplyResult;

/// Session status lines. Only applied objects go to stdout; everything else
/// goes to stderr so a piped stdout stays machine-readable.
#[derive(Debug, Default, Clone, Copy)]
pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("Error:").red().bold(), message);
    }

    pub fn note(&self, message: &str) {
        eprintln!("{}", style(message).dim());
    }

    /// One `kind/name created|configured` line per applied object
    pub fn applied(&self, result: &ApplyResult) {
        for object in &result.objects {
            self.success(&object.to_string());
        }
    }

    pub fn declined(&self) {
        self.note("Nothing was applied.");
    }
}
