//! People API data model.
//!
//! Field names follow the People API JSON (camelCase). Collections the
//! API omits deserialize as empty and are skipped again on output, so a
//! `ContactPerson` round-trips through `export`/`compare` unchanged.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::text;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPerson {
    #[serde(default)]
    pub resource_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<Name>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phone_numbers: Vec<PhoneNumber>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<Address>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub birthdays: Vec<Birthday>,
    /// Free-text notes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub biographies: Vec<Biography>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub memberships: Vec<Membership>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub photos: Vec<Photo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Name {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
}

impl Name {
    /// Name entry used for writes: display and given name carry the same value.
    pub fn display(value: &str) -> Self {
        Self {
            display_name: Some(value.to_string()),
            given_name: Some(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhoneNumber {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Birthday {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<PartialDate>,
}

/// A calendar date where any component may be missing (e.g. a birthday
/// without a year).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialDate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl PartialDate {
    /// Literal `{year}-{month}-{day}` join with missing parts left empty.
    pub fn equality_key(&self) -> String {
        fn part<T: ToString>(value: Option<T>) -> String {
            value.map(|v| v.to_string()).unwrap_or_default()
        }
        format!("{}-{}-{}", part(self.year), part(self.month), part(self.day))
    }

    /// Human-readable form: `YYYY-MM-DD` (with `??` gaps) when the year is
    /// known, `MM-DD` when only month and day are, empty otherwise.
    pub fn display(&self) -> String {
        fn padded(value: Option<u32>) -> String {
            value
                .map(|v| format!("{:02}", v))
                .unwrap_or_else(|| "??".to_string())
        }
        if let Some(year) = self.year.filter(|y| *y != 0) {
            return format!("{}-{}-{}", year, padded(self.month), padded(self.day));
        }
        match (self.month, self.day) {
            (Some(month), Some(day)) if month != 0 && day != 0 => {
                format!("{:02}-{:02}", month, day)
            }
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Biography {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_group_membership: Option<ContactGroupMembership>,
}

impl Membership {
    pub fn group(resource_name: &str) -> Self {
        Self {
            contact_group_membership: Some(ContactGroupMembership {
                contact_group_resource_name: Some(resource_name.to_string()),
            }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactGroupMembership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_group_resource_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactGroup {
    #[serde(default)]
    pub resource_name: String,
    #[serde(default)]
    pub name: String,
}

impl ContactPerson {
    /// Canonical display name: the first name entry, or `""`.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .and_then(|n| n.display_name.as_deref())
            .unwrap_or("")
    }

    /// Key used to pair contacts across accounts. `None` for blank names.
    pub fn alignment_key(&self) -> Option<&str> {
        let trimmed = self.display_name().trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn in_group(&self, group_resource_name: &str) -> bool {
        self.memberships.iter().any(|m| {
            m.contact_group_membership
                .as_ref()
                .and_then(|g| g.contact_group_resource_name.as_deref())
                == Some(group_resource_name)
        })
    }

    pub fn email_values(&self) -> Vec<&str> {
        self.email_addresses.iter().map(|e| e.value.as_str()).collect()
    }

    pub fn phone_values(&self) -> Vec<&str> {
        self.phone_numbers.iter().map(|p| p.value.as_str()).collect()
    }

    pub fn address_values(&self) -> Vec<&str> {
        self.addresses
            .iter()
            .map(|a| a.formatted_value.as_deref().unwrap_or(""))
            .collect()
    }

    pub fn note_values(&self) -> Vec<&str> {
        self.biographies.iter().map(|b| b.value.as_str()).collect()
    }

    /// Resource id without the `people/` prefix.
    pub fn person_id(&self) -> &str {
        self.resource_name
            .strip_prefix("people/")
            .unwrap_or(&self.resource_name)
    }
}

/// Ordering used for every per-slot contact list: lower-cased display
/// name, nameless contacts first.
pub fn compare_by_name(a: &ContactPerson, b: &ContactPerson) -> Ordering {
    text::collate(
        &a.display_name().to_lowercase(),
        &b.display_name().to_lowercase(),
    )
}

pub fn sort_contacts(contacts: &mut [ContactPerson]) {
    contacts.sort_by(compare_by_name);
}
