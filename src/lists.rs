//! User-controlled allow and deny lists.
//!
//! The whitelist holds name/number pairs the user picked; the blacklist is
//! a plain set of strings the user typed, which may be full numbers or
//! bare prefixes. Both persist through a [`ListBackend`] collaborator
//! (the core only needs get/put of two strings). The device contact list
//! is reached through [`ContactsLookup`], permission-aware and fail-open.

use log::{debug, warn};
use std::collections::BTreeSet;

use crate::country::Country;
use crate::error::{Result, ScreenError};
use crate::number;

/// Device contact lookup. `has_contact` receives one surface form at a
/// time; implementations return `PermissionDenied` when the platform
/// refuses access so the engine can fail open on the contact stage.
pub trait ContactsLookup {
    fn has_contact(&self, number_format: &str) -> Result<bool>;
}

/// Storage for the two user lists. `whitelist` round-trips the delimited
/// `name|number;name|number` string; `blacklist` a set of raw entries.
pub trait ListBackend {
    fn read_whitelist(&self) -> Result<String>;
    fn write_whitelist(&self, serialized: &str) -> Result<()>;
    fn read_blacklist(&self) -> Result<Vec<String>>;
    fn write_blacklist(&self, entries: &[String]) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhiteListContact {
    pub name: String,
    pub number: String,
}

/// In-memory view of both lists, loaded from a backend and written back
/// after each mutation.
pub struct ListStore {
    country: Country,
    whitelist: Vec<WhiteListContact>,
    blacklist: BTreeSet<String>,
}

/// Minimum digits a stored blacklist entry needs (after stripping `+`)
/// to be used as a prefix. Deliberately permissive: a user-entered "0899"
/// blocks the whole range, but a coincidental overlap with a legitimate
/// number is possible. Known sharp edge, kept as-is pending a product
/// decision.
const MIN_PREFIX_ENTRY_LEN: usize = 4;

impl ListStore {
    pub fn new(country: Country) -> Self {
        ListStore {
            country,
            whitelist: Vec::new(),
            blacklist: BTreeSet::new(),
        }
    }

    pub fn load(country: Country, backend: &dyn ListBackend) -> Result<Self> {
        let mut store = ListStore::new(country);
        store.whitelist = parse_whitelist(&backend.read_whitelist()?);
        store.blacklist = backend.read_blacklist()?.into_iter().collect();
        debug!(
            "lists loaded: {} whitelisted, {} blacklisted",
            store.whitelist.len(),
            store.blacklist.len()
        );
        Ok(store)
    }

    pub fn country(&self) -> Country {
        self.country
    }

    pub fn whitelist(&self) -> &[WhiteListContact] {
        &self.whitelist
    }

    pub fn blacklist(&self) -> impl Iterator<Item = &str> {
        self.blacklist.iter().map(|s| s.as_str())
    }

    pub fn blacklist_len(&self) -> usize {
        self.blacklist.len()
    }

    /// Whitelist check: any surface form of the incoming number equal,
    /// after canonicalization, to any stored whitelist number.
    pub fn is_whitelisted(&self, raw: &str) -> bool {
        if self.whitelist.is_empty() {
            return false;
        }
        let forms = number::expand_formats(raw);
        for contact in &self.whitelist {
            let stored = number::canonicalize(&contact.number, self.country);
            for form in &forms {
                if number::canonicalize(form, self.country) == stored {
                    return true;
                }
            }
        }
        false
    }

    /// Blacklist check: exact match on any surface form, or prefix match
    /// when the stored entry is at least [`MIN_PREFIX_ENTRY_LEN`] digits.
    pub fn is_blacklisted(&self, raw: &str) -> bool {
        if self.blacklist.is_empty() {
            return false;
        }
        let forms = number::expand_formats(raw);
        for form in &forms {
            if self.blacklist.contains(form) {
                return true;
            }
            let canonical = number::canonicalize(form, self.country);
            if self.blacklist.contains(&canonical) {
                return true;
            }
            for entry in &self.blacklist {
                if entry.replace('+', "").len() >= MIN_PREFIX_ENTRY_LEN {
                    let entry_canonical = number::canonicalize(entry, self.country);
                    if form.starts_with(entry.as_str()) || canonical.starts_with(&entry_canonical) {
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Adds a number to the blacklist (normalized form). Duplicate adds
    /// are no-ops. Returns whether the set changed.
    pub fn add_blocked(&mut self, raw: &str, backend: &dyn ListBackend) -> Result<bool> {
        let normalized = number::canonicalize(raw, self.country);
        if normalized.is_empty() {
            return Err(ScreenError::MalformedInput(format!("not a number: '{raw}'")));
        }
        if !self.blacklist.insert(normalized) {
            return Ok(false);
        }
        self.persist_blacklist(backend)?;
        Ok(true)
    }

    /// Removes a number; removing a non-member is a no-op.
    pub fn remove_blocked(&mut self, raw: &str, backend: &dyn ListBackend) -> Result<bool> {
        let normalized = number::canonicalize(raw, self.country);
        if !self.blacklist.remove(&normalized) && !self.blacklist.remove(raw) {
            return Ok(false);
        }
        self.persist_blacklist(backend)?;
        Ok(true)
    }

    /// Replaces the whole blacklist (restore in REPLACE mode).
    pub fn replace_blacklist(&mut self, entries: Vec<String>, backend: &dyn ListBackend) -> Result<()> {
        self.blacklist = entries.into_iter().filter(|e| !e.trim().is_empty()).collect();
        self.persist_blacklist(backend)
    }

    /// Merges entries into the blacklist (restore in MERGE mode); returns
    /// how many were new.
    pub fn merge_blacklist(&mut self, entries: Vec<String>, backend: &dyn ListBackend) -> Result<usize> {
        let mut added = 0;
        for entry in entries {
            if entry.trim().is_empty() {
                continue;
            }
            if self.blacklist.insert(entry) {
                added += 1;
            }
        }
        self.persist_blacklist(backend)?;
        Ok(added)
    }

    pub fn add_whitelisted(&mut self, name: &str, raw: &str, backend: &dyn ListBackend) -> Result<bool> {
        let normalized = number::canonicalize(raw, self.country);
        if normalized.is_empty() {
            return Err(ScreenError::MalformedInput(format!("not a number: '{raw}'")));
        }
        if self
            .whitelist
            .iter()
            .any(|c| number::canonicalize(&c.number, self.country) == normalized)
        {
            return Ok(false);
        }
        self.whitelist.push(WhiteListContact {
            name: name.to_string(),
            number: normalized,
        });
        backend.write_whitelist(&serialize_whitelist(&self.whitelist))?;
        Ok(true)
    }

    pub fn remove_whitelisted(&mut self, raw: &str, backend: &dyn ListBackend) -> Result<bool> {
        let normalized = number::canonicalize(raw, self.country);
        let before = self.whitelist.len();
        self.whitelist
            .retain(|c| number::canonicalize(&c.number, self.country) != normalized);
        if self.whitelist.len() == before {
            return Ok(false);
        }
        backend.write_whitelist(&serialize_whitelist(&self.whitelist))?;
        Ok(true)
    }

    fn persist_blacklist(&self, backend: &dyn ListBackend) -> Result<()> {
        let entries: Vec<String> = self.blacklist.iter().cloned().collect();
        backend.write_blacklist(&entries)
    }
}

/// Checks every surface form of `raw` against the device contacts.
/// A permission failure is logged and treated as "not decidable" —
/// the caller fails open.
pub fn is_in_contacts(contacts: &dyn ContactsLookup, raw: &str) -> Result<bool> {
    for form in number::expand_formats(raw) {
        match contacts.has_contact(&form) {
            Ok(true) => return Ok(true),
            Ok(false) => {}
            Err(e) => {
                warn!("contact lookup failed for '{form}': {e}");
                return Err(e);
            }
        }
    }
    Ok(false)
}

/// Parses the `name|number;name|number` whitelist string. Malformed
/// segments are skipped, not fatal.
pub fn parse_whitelist(serialized: &str) -> Vec<WhiteListContact> {
    serialized
        .split(';')
        .filter_map(|segment| {
            let mut parts = segment.splitn(2, '|');
            let name = parts.next()?.trim();
            let num = parts.next()?.trim();
            if name.is_empty() || num.is_empty() {
                return None;
            }
            Some(WhiteListContact {
                name: name.to_string(),
                number: num.to_string(),
            })
        })
        .collect()
}

pub fn serialize_whitelist(contacts: &[WhiteListContact]) -> String {
    contacts
        .iter()
        .map(|c| format!("{}|{}", c.name, c.number))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;

    /// In-memory backend for tests.
    #[derive(Default)]
    pub struct MemoryBackend {
        pub whitelist: RefCell<String>,
        pub blacklist: RefCell<Vec<String>>,
    }

    impl ListBackend for MemoryBackend {
        fn read_whitelist(&self) -> Result<String> {
            Ok(self.whitelist.borrow().clone())
        }
        fn write_whitelist(&self, serialized: &str) -> Result<()> {
            *self.whitelist.borrow_mut() = serialized.to_string();
            Ok(())
        }
        fn read_blacklist(&self) -> Result<Vec<String>> {
            Ok(self.blacklist.borrow().clone())
        }
        fn write_blacklist(&self, entries: &[String]) -> Result<()> {
            *self.blacklist.borrow_mut() = entries.to_vec();
            Ok(())
        }
    }

    /// Contacts stub holding a fixed set of canonical numbers, or failing
    /// every lookup to exercise the fail-open path.
    pub struct FixedContacts {
        pub numbers: Vec<String>,
        pub deny_permission: bool,
    }

    impl FixedContacts {
        pub fn with(numbers: &[&str]) -> Self {
            FixedContacts {
                numbers: numbers.iter().map(|s| s.to_string()).collect(),
                deny_permission: false,
            }
        }

        pub fn denied() -> Self {
            FixedContacts {
                numbers: Vec::new(),
                deny_permission: true,
            }
        }
    }

    impl ContactsLookup for FixedContacts {
        fn has_contact(&self, number_format: &str) -> Result<bool> {
            if self.deny_permission {
                return Err(ScreenError::PermissionDenied("READ_CONTACTS".to_string()));
            }
            Ok(self.numbers.iter().any(|n| n == number_format))
        }
    }
}
