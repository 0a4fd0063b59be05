//! Plain-text output for the CLI.

use std::fmt::Write;

use crate::align::AlignedPair;
use crate::model::{ContactGroup, ContactPerson};

/// `=` identical, `≠` differing, `<` left only, `>` right only.
pub fn pair_marker(pair: &AlignedPair) -> char {
    if pair.is_left_only() {
        '<'
    } else if pair.is_right_only() {
        '>'
    } else if pair.identical {
        '='
    } else {
        '≠'
    }
}

pub fn pair_line(pair: &AlignedPair) -> String {
    format!("{} {}", pair_marker(pair), pair.name)
}

pub fn pair_table(pairs: &[AlignedPair], total: usize) -> String {
    let mut out = String::new();
    for pair in pairs {
        let _ = writeln!(out, "{}", pair_line(pair));
    }
    let hidden = total.saturating_sub(pairs.len());
    if hidden > 0 {
        let _ = writeln!(
            out,
            "{} shown, {} identical hidden (use --all to list them)",
            pairs.len(),
            hidden
        );
    } else {
        let _ = writeln!(out, "{} shown", pairs.len());
    }
    out
}

fn field(out: &mut String, label: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {}: {}", label, values.join(", "));
}

fn owned(values: Vec<&str>) -> Vec<String> {
    values
        .into_iter()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

/// Multi-line summary of one contact, with its web URL when given.
pub fn contact_details(contact: &ContactPerson, url: Option<&str>) -> String {
    let mut out = String::new();
    let name = match contact.display_name() {
        "" => "(no name)",
        name => name,
    };
    let _ = writeln!(out, "{}", name);
    field(&mut out, "Email", &owned(contact.email_values()));
    field(&mut out, "Phone", &owned(contact.phone_values()));
    field(&mut out, "Address", &owned(contact.address_values()));

    let birthdays: Vec<String> = contact
        .birthdays
        .iter()
        .filter_map(|b| b.date.map(|d| d.display()))
        .filter(|d| !d.is_empty())
        .collect();
    field(&mut out, "Birthday", &birthdays);

    for note in contact.note_values().into_iter().filter(|n| !n.is_empty()) {
        let _ = writeln!(out, "  Note: {}", note.replace('\n', " / "));
    }
    if let Some(url) = url {
        let _ = writeln!(out, "  URL: {}", url);
    }
    out
}

/// One group per line, the selected one starred.
pub fn group_list(groups: &[ContactGroup], selected: Option<&str>) -> String {
    let mut out = String::new();
    for group in groups {
        let marker = if Some(group.resource_name.as_str()) == selected {
            '*'
        } else {
            ' '
        };
        let _ = writeln!(out, "{} {}\t{}", marker, group.resource_name, group.name);
    }
    out
}
