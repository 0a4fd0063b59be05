//! Contact alignment across the two accounts.
//!
//! Both lists are indexed by trimmed display name and merged into one
//! name-ordered sequence, so the result never depends on the order in
//! which the remote paged the contacts out.

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::model::ContactPerson;
use crate::text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedPair {
    pub name: String,
    pub contact1: Option<ContactPerson>,
    pub contact2: Option<ContactPerson>,
    pub identical: bool,
}

impl AlignedPair {
    pub fn is_left_only(&self) -> bool {
        self.contact1.is_some() && self.contact2.is_none()
    }

    pub fn is_right_only(&self) -> bool {
        self.contact1.is_none() && self.contact2.is_some()
    }
}

/// Later entries win when one list holds the same name twice.
fn index_by_name(contacts: &[ContactPerson]) -> HashMap<&str, &ContactPerson> {
    let mut map = HashMap::new();
    for contact in contacts {
        if let Some(key) = contact.alignment_key() {
            map.insert(key, contact);
        }
    }
    map
}

pub fn align(list1: &[ContactPerson], list2: &[ContactPerson]) -> Vec<AlignedPair> {
    let map1 = index_by_name(list1);
    let map2 = index_by_name(list2);

    let names: BTreeSet<&str> = map1.keys().chain(map2.keys()).copied().collect();
    let mut names: Vec<&str> = names.into_iter().collect();
    names.sort_by(|a, b| text::collate(a, b));

    names
        .into_iter()
        .map(|name| {
            let contact1 = map1.get(name).copied();
            let contact2 = map2.get(name).copied();
            AlignedPair {
                name: name.to_string(),
                identical: contacts_are_identical(contact1, contact2),
                contact1: contact1.cloned(),
                contact2: contact2.cloned(),
            }
        })
        .collect()
}

/// Sorted-multiset comparison: order-insensitive, duplicates count.
fn same_values(mut a: Vec<String>, mut b: Vec<String>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.sort();
    b.sort();
    a == b
}

fn owned(values: Vec<&str>) -> Vec<String> {
    values.into_iter().map(str::to_string).collect()
}

fn birthday_keys(contact: &ContactPerson) -> Vec<String> {
    contact
        .birthdays
        .iter()
        .map(|b| b.date.map(|d| d.equality_key()).unwrap_or_default())
        .collect()
}

fn note_keys(contact: &ContactPerson) -> Vec<String> {
    contact
        .biographies
        .iter()
        .map(|b| b.value.trim().to_string())
        .collect()
}

pub fn contacts_are_identical(a: Option<&ContactPerson>, b: Option<&ContactPerson>) -> bool {
    let (Some(a), Some(b)) = (a, b) else {
        return false;
    };

    a.display_name() == b.display_name()
        && same_values(owned(a.email_values()), owned(b.email_values()))
        && same_values(owned(a.phone_values()), owned(b.phone_values()))
        && same_values(owned(a.address_values()), owned(b.address_values()))
        && same_values(birthday_keys(a), birthday_keys(b))
        && same_values(note_keys(a), note_keys(b))
}

/// Keep pairs that differ, everything when `show_identical` is set, and
/// anything recently touched so the outcome of an action stays on screen.
pub fn visible(
    pairs: Vec<AlignedPair>,
    show_identical: bool,
    recent: &HashSet<String>,
) -> Vec<AlignedPair> {
    if show_identical {
        return pairs;
    }
    pairs
        .into_iter()
        .filter(|pair| !pair.identical || recent.contains(&pair.name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::*;
    use crate::model::{Address, Biography, Birthday, PartialDate};
    use proptest::prelude::*;

    fn full_contact(resource_name: &str) -> ContactPerson {
        let mut c = with_phones(
            with_emails(person(resource_name, "Alice"), &["a@x.org", "alice@y.org"]),
            &["+1 555", "+1 666"],
        );
        c.addresses = vec![
            Address {
                formatted_value: Some("1 Main St".into()),
            },
            Address {
                formatted_value: Some("2 High St".into()),
            },
        ];
        c.birthdays = vec![Birthday {
            date: Some(PartialDate {
                year: Some(1990),
                month: Some(1),
                day: Some(2),
            }),
        }];
        c.biographies = vec![
            Biography {
                value: "met at conf ".into(),
            },
            Biography {
                value: "likes tea".into(),
            },
        ];
        c
    }

    #[test]
    fn left_only_contact_yields_half_pair() {
        let alice = in_group(person("people/1", "Alice"), "G");
        let pairs = align(&[alice.clone()], &[]);
        assert_eq!(
            pairs,
            vec![AlignedPair {
                name: "Alice".into(),
                contact1: Some(alice),
                contact2: None,
                identical: false,
            }]
        );
        assert!(pairs[0].is_left_only());
    }

    #[test]
    fn pairs_are_name_ordered_and_blank_names_skipped() {
        let left = vec![person("people/1", "carol"), person("people/2", "  ")];
        let right = vec![person("people/9", "Bob"), person("people/8", "Émile")];
        let names: Vec<_> = align(&left, &right).into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Bob", "carol", "Émile"]);
    }

    #[test]
    fn duplicate_names_collapse_to_last_entry() {
        let left = vec![person("people/1", "Alice"), person("people/2", "Alice ")];
        let pairs = align(&left, &[]);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].contact1.as_ref().unwrap().resource_name, "people/2");
    }

    #[test]
    fn reordered_copy_is_identical() {
        let a = full_contact("people/1");
        let mut b = full_contact("people/2");
        b.email_addresses.reverse();
        b.phone_numbers.reverse();
        b.addresses.reverse();
        b.biographies.reverse();
        b.biographies[1].value = "met at conf".into();
        assert!(contacts_are_identical(Some(&a), Some(&b)));
    }

    #[test]
    fn each_field_change_breaks_identity() {
        let base = full_contact("people/1");
        for field in 0..6 {
            let mut changed = base.clone();
            match field {
                0 => changed.names[0].display_name = Some("Alicia".into()),
                1 => changed.email_addresses[0].value = "other@x.org".into(),
                2 => {
                    changed.phone_numbers.pop();
                }
                3 => changed.addresses[1].formatted_value = None,
                4 => changed.birthdays[0].date.as_mut().unwrap().year = None,
                _ => changed.biographies[0].value = "different".into(),
            }
            assert!(
                !contacts_are_identical(Some(&base), Some(&changed)),
                "field {} change went unnoticed",
                field
            );
        }
    }

    #[test]
    fn repeated_values_must_match_in_count() {
        let a = with_emails(person("people/1", "Alice"), &["a@x.org", "a@x.org"]);
        let b = with_emails(person("people/2", "Alice"), &["a@x.org"]);
        assert!(!contacts_are_identical(Some(&a), Some(&b)));
    }

    #[test]
    fn absent_side_is_never_identical() {
        let a = person("people/1", "Alice");
        assert!(!contacts_are_identical(Some(&a), None));
        assert!(!contacts_are_identical(None, Some(&a)));
        assert!(!contacts_are_identical(None, None));
    }

    #[test]
    fn visibility_keeps_recent_identical_pairs() {
        let alice = person("people/1", "Alice");
        let bob = person("people/2", "Bob");
        let pairs = align(
            &[alice.clone(), bob.clone()],
            &[alice, with_emails(bob, &["b@x.org"])],
        );
        assert!(pairs[0].identical);
        assert!(!pairs[1].identical);

        let none = HashSet::new();
        let names = |v: Vec<AlignedPair>| v.into_iter().map(|p| p.name).collect::<Vec<_>>();
        assert_eq!(names(visible(pairs.clone(), false, &none)), vec!["Bob"]);
        assert_eq!(names(visible(pairs.clone(), true, &none)), vec!["Alice", "Bob"]);

        let recent = HashSet::from(["Alice".to_string()]);
        assert_eq!(names(visible(pairs, false, &recent)), vec!["Alice", "Bob"]);
    }

    fn arb_birthday() -> impl Strategy<Value = Birthday> {
        (prop::option::of(1990..1992i32), 1..3u32, 1..3u32).prop_map(|(year, month, day)| {
            Birthday {
                date: Some(PartialDate {
                    year,
                    month: Some(month),
                    day: Some(day),
                }),
            }
        })
    }

    /// Every compared field drawn from a tiny alphabet so equal pairs occur.
    fn arb_fields() -> impl Strategy<Value = ContactPerson> {
        (
            prop::collection::vec("[a-c]@x", 0..3),
            prop::collection::vec("[1-3]", 0..3),
            prop::collection::vec("[ab] St", 0..2),
            prop::collection::vec(arb_birthday(), 0..2),
            prop::collection::vec(" ?[xy] ?", 0..2),
        )
            .prop_map(|(emails, phones, addresses, birthdays, notes)| {
                let emails: Vec<&str> = emails.iter().map(String::as_str).collect();
                let phones: Vec<&str> = phones.iter().map(String::as_str).collect();
                let mut contact = with_phones(with_emails(ContactPerson::default(), &emails), &phones);
                contact.addresses = addresses
                    .into_iter()
                    .map(|a| Address {
                        formatted_value: Some(a),
                    })
                    .collect();
                contact.birthdays = birthdays;
                contact.biographies = notes.into_iter().map(|value| Biography { value }).collect();
                contact
            })
    }

    fn arb_contacts() -> impl Strategy<Value = Vec<ContactPerson>> {
        prop::collection::btree_map("[A-Ea-e]{1,3}", arb_fields(), 0..8).prop_map(|entries| {
            entries
                .into_iter()
                .enumerate()
                .map(|(i, (name, mut contact))| {
                    let named = person(&format!("people/{}", i), &name);
                    contact.resource_name = named.resource_name;
                    contact.etag = named.etag;
                    contact.names = named.names;
                    contact
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn align_ignores_input_order(
            left in arb_contacts(),
            right in arb_contacts(),
            seed in any::<u64>(),
        ) {
            let expected = align(&left, &right);
            let mut l = left.clone();
            let mut r = right.clone();
            let n = l.len().max(1) as u64;
            l.rotate_left((seed % n) as usize);
            r.reverse();
            prop_assert_eq!(align(&l, &r), expected);
        }

        #[test]
        fn identity_ignores_value_order(contact in arb_fields()) {
            let mut reordered = contact.clone();
            reordered.resource_name = "people/other".into();
            reordered.email_addresses.reverse();
            reordered.phone_numbers.reverse();
            reordered.addresses.reverse();
            reordered.birthdays.reverse();
            reordered.biographies.reverse();
            prop_assert!(contacts_are_identical(Some(&contact), Some(&reordered)));
        }

        #[test]
        fn identity_is_symmetric(left in arb_contacts(), right in arb_contacts()) {
            for (a, b) in left.iter().zip(right.iter()) {
                prop_assert_eq!(
                    contacts_are_identical(Some(a), Some(b)),
                    contacts_are_identical(Some(b), Some(a))
                );
            }
        }
    }
}
