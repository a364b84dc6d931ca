//! Attribute sets as exchanged with the directory.
use std::collections::{BTreeMap, HashMap};

use ldap3::SearchEntry;

/// A set of attributes and their values.
///
/// Attribute names are matched case-insensitively, as the directory does,
/// while the spelling of the first insertion is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Attributes(BTreeMap<String, Vec<String>>);

impl Attributes {
	/// Create an empty set
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// The stored spelling of `attr`, if present
	fn key_of(&self, attr: &str) -> Option<&String> {
		self.0.keys().find(|key| key.eq_ignore_ascii_case(attr))
	}

	/// Get all values of an attribute.
	#[must_use]
	pub fn get(&self, attr: &str) -> Option<&[String]> {
		let key = self.key_of(attr)?;
		self.0.get(key).map(Vec::as_slice)
	}

	/// Get the first value of an attribute.
	#[must_use]
	pub fn attr_first(&self, attr: &str) -> Option<&str> {
		self.get(attr)?.first().map(String::as_str)
	}

	/// Append values to an attribute, creating it if necessary.
	pub fn insert(&mut self, attr: &str, values: impl IntoIterator<Item = String>) {
		let key = self.key_of(attr).cloned().unwrap_or_else(|| attr.to_owned());
		self.0.entry(key).or_default().extend(values);
	}

	/// Remove an attribute and return its values.
	pub fn remove(&mut self, attr: &str) -> Option<Vec<String>> {
		let key = self.key_of(attr)?.clone();
		self.0.remove(&key)
	}

	/// Whether the set contains no attributes
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Iterate over attribute names and their values
	pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
		self.0.iter().map(|(name, values)| (name.as_str(), values.as_slice()))
	}
}

impl From<HashMap<String, Vec<String>>> for Attributes {
	fn from(attrs: HashMap<String, Vec<String>>) -> Self {
		let mut attributes = Self::new();
		for (name, values) in attrs {
			attributes.insert(&name, values);
		}
		attributes
	}
}

impl<'a, const N: usize> From<[(&'a str, Vec<String>); N]> for Attributes {
	fn from(attrs: [(&'a str, Vec<String>); N]) -> Self {
		let mut attributes = Self::new();
		for (name, values) in attrs {
			attributes.insert(name, values);
		}
		attributes
	}
}

/// A directory entry: its name and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
	/// The distinguished name of the entry
	pub dn: String,
	/// The textual attributes of the entry
	pub attributes: Attributes,
}

impl From<SearchEntry> for Entry {
	fn from(entry: SearchEntry) -> Self {
		Self { dn: entry.dn, attributes: entry.attrs.into() }
	}
}
