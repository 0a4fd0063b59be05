//! Field-level preview of what a sync will change on the target contact.

use std::fmt;

use crate::model::ContactPerson;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    pub field: &'static str,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPreview {
    pub heading: String,
    pub summary: String,
    pub changes: Vec<FieldChange>,
}

fn or_none(joined: String) -> String {
    if joined.is_empty() {
        "(none)".to_string()
    } else {
        joined
    }
}

/// `From:`/`To:` lines when the ordered values differ.
fn from_to(target: &[&str], source: &[&str], compare_sep: &str, show_sep: &str) -> Vec<String> {
    if source.join(compare_sep) == target.join(compare_sep) {
        return Vec::new();
    }
    vec![
        format!("From: {}", or_none(target.join(show_sep))),
        format!("To: {}", or_none(source.join(show_sep))),
    ]
}

/// Distinct non-empty birthday strings, first occurrence order.
fn birthday_set(contact: &ContactPerson) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for birthday in &contact.birthdays {
        let shown = birthday.date.map(|d| d.display()).unwrap_or_default();
        if !shown.is_empty() && !seen.contains(&shown) {
            seen.push(shown);
        }
    }
    seen
}

fn birthday_lines(target: &ContactPerson, source: &ContactPerson) -> Vec<String> {
    let before = birthday_set(target);
    let after = birthday_set(source);
    let removed: Vec<&str> = before
        .iter()
        .filter(|b| !after.contains(*b))
        .map(String::as_str)
        .collect();
    let added: Vec<&str> = after
        .iter()
        .filter(|b| !before.contains(*b))
        .map(String::as_str)
        .collect();

    let mut lines = Vec::new();
    if !removed.is_empty() {
        lines.push(format!("Removed: {}", removed.join(" | ")));
    }
    if !added.is_empty() {
        lines.push(format!("Added: {}", added.join(" | ")));
    }
    lines
}

impl SyncPreview {
    pub fn between(
        source: &ContactPerson,
        target: &ContactPerson,
        source_account: &str,
        target_account: &str,
    ) -> Self {
        let candidates = [
            (
                "Email addresses",
                from_to(&target.email_values(), &source.email_values(), ",", ", "),
            ),
            (
                "Phone numbers",
                from_to(&target.phone_values(), &source.phone_values(), ",", ", "),
            ),
            (
                "Addresses",
                from_to(&target.address_values(), &source.address_values(), ",", ", "),
            ),
            (
                "Notes",
                from_to(&target.note_values(), &source.note_values(), "\n", " | "),
            ),
            ("Birthdays", birthday_lines(target, source)),
        ];

        let changes = candidates
            .into_iter()
            .filter(|(_, lines)| !lines.is_empty())
            .map(|(field, lines)| FieldChange { field, lines })
            .collect();

        Self {
            heading: format!("Sync contact from {} → {}", source_account, target_account),
            summary: format!(
                "This will update {} in {} with the information from {}.",
                target.display_name(),
                target_account,
                source_account
            ),
            changes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl fmt::Display for SyncPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.heading)?;
        writeln!(f, "{}", self.summary)?;
        if self.is_empty() {
            return writeln!(f, "No field changes detected (name will remain the same).");
        }
        writeln!(f, "Changes that will be made:")?;
        for change in &self.changes {
            writeln!(f, "  {}:", change.field)?;
            for line in &change.lines {
                writeln!(f, "    {}", line)?;
            }
        }
        Ok(())
    }
}
