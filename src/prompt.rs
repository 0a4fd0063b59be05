//! Terminal implementations of the confirmation and notification seams.

use std::cell::Cell;
use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::diff::SyncPreview;
use crate::orchestrator::{Notifier, Prompt};

/// Asks on stdout and reads the answer from stdin. End of input counts
/// as a "no".
#[derive(Debug, Default)]
pub struct TerminalPrompt {
    assume_yes: bool,
    rename_to: Option<String>,
}

impl TerminalPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            assume_yes,
            rename_to: None,
        }
    }

    /// Answer the rename prompt with `name` instead of asking.
    pub fn with_rename(mut self, name: Option<String>) -> Self {
        self.rename_to = name;
        self
    }

    async fn ask(&self, question: &str) -> Option<String> {
        print!("{}", question);
        let _ = std::io::stdout().flush();

        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }

    async fn confirm(&self, question: &str) -> bool {
        if self.assume_yes {
            return true;
        }
        self.ask(&format!("{} [y/N] ", question))
            .await
            .map(|answer| is_yes(&answer))
            .unwrap_or(false)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

impl Prompt for TerminalPrompt {
    async fn confirm_delete(&self, contact_name: &str) -> bool {
        self.confirm(&format!(
            "Delete {}? This action cannot be undone.",
            contact_name
        ))
        .await
    }

    async fn confirm_sync(&self, preview: &SyncPreview) -> bool {
        print!("{}", preview);
        self.confirm("Apply these changes?").await
    }

    async fn prompt_rename(&self, current: &str) -> Option<String> {
        if let Some(ref name) = self.rename_to {
            return Some(name.clone());
        }
        self.ask(&format!("New name for {}: ", current)).await
    }
}

/// Prints notifications to stderr and remembers that one was raised, so
/// the command can exit non-zero.
#[derive(Debug, Default)]
pub struct StderrNotifier {
    raised: Cell<usize>,
}

impl StderrNotifier {
    pub fn raised(&self) -> usize {
        self.raised.get()
    }
}

impl Notifier for StderrNotifier {
    fn notify(&self, message: &str) {
        self.raised.set(self.raised.get() + 1);
        eprintln!("error: {}", message);
    }
}
