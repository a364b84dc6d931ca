//! Parsing and formatting of distinguished names.
//!
//! Names are kept in the order they are written in, so the first component is
//! the most specific one. Values are escaped according to [RFC 4514] when
//! formatted, and both the backslash-character and the hex pair forms of
//! escaping are understood when parsing.
//!
//! [RFC 4514]: https://www.rfc-editor.org/rfc/rfc4514
use std::{
	fmt::{self, Write},
	iter::Peekable,
	str::{Chars, FromStr},
};

/// A name or name component that is not syntactically valid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid name {name:?}: {reason}")]
pub struct InvalidName {
	/// The rejected input
	pub name: String,
	/// What is wrong with it
	pub reason: &'static str,
}

impl InvalidName {
	/// Create a new error for the given input
	fn new(name: &str, reason: &'static str) -> Self {
		Self { name: name.to_owned(), reason }
	}
}

/// A single `type=value` assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ava {
	/// The attribute type, as written
	attr_type: String,
	/// The unescaped value
	value: String,
}

impl Ava {
	/// Create an assertion, rejecting malformed attribute types and empty
	/// values.
	pub fn new(attr_type: &str, value: &str) -> Result<Self, InvalidName> {
		if !is_attribute_type(attr_type) {
			return Err(InvalidName::new(attr_type, "malformed attribute type"));
		}
		if value.is_empty() {
			return Err(InvalidName::new(value, "empty attribute value"));
		}
		Ok(Self { attr_type: attr_type.to_owned(), value: value.to_owned() })
	}

	/// The attribute type
	#[must_use]
	pub fn attr_type(&self) -> &str {
		&self.attr_type
	}

	/// The unescaped value
	#[must_use]
	pub fn value(&self) -> &str {
		&self.value
	}
}

impl fmt::Display for Ava {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.attr_type)?;
		f.write_char('=')?;
		escape_value(&self.value, f)
	}
}

/// A relative distinguished name, one or more assertions joined by `+`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn(Vec<Ava>);

impl Rdn {
	/// Create a single-valued component.
	pub fn new(attr_type: &str, value: &str) -> Result<Self, InvalidName> {
		Ok(Self(vec![Ava::new(attr_type, value)?]))
	}

	/// All assertions of this component
	#[must_use]
	pub fn assertions(&self) -> &[Ava] {
		&self.0
	}

	/// The value asserted for `attr_type`, compared case-insensitively.
	#[must_use]
	pub fn value_of(&self, attr_type: &str) -> Option<&str> {
		self.0.iter().find(|ava| ava.attr_type.eq_ignore_ascii_case(attr_type)).map(Ava::value)
	}
}

impl fmt::Display for Rdn {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, ava) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_char('+')?;
			}
			ava.fmt(f)?;
		}
		Ok(())
	}
}

/// A distinguished name, most specific component first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistinguishedName(Vec<Rdn>);

impl DistinguishedName {
	/// Parse a string representation of a name.
	pub fn parse(name: &str) -> Result<Self, InvalidName> {
		name.parse()
	}

	/// The name of an entry directly below this one.
	#[must_use]
	pub fn child(&self, rdn: Rdn) -> Self {
		let mut rdns = Vec::with_capacity(self.0.len() + 1);
		rdns.push(rdn);
		rdns.extend(self.0.iter().cloned());
		Self(rdns)
	}

	/// The name of the entry directly above this one, `None` for the root.
	#[must_use]
	pub fn parent(&self) -> Option<Self> {
		self.0.split_first().map(|(_, rest)| Self(rest.to_vec()))
	}

	/// Components, most specific first
	#[must_use]
	pub fn rdns(&self) -> &[Rdn] {
		&self.0
	}

	/// Whether this is the empty (root) name
	#[must_use]
	pub fn is_root(&self) -> bool {
		self.0.is_empty()
	}
}

impl fmt::Display for DistinguishedName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, rdn) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_char(',')?;
			}
			rdn.fmt(f)?;
		}
		Ok(())
	}
}

impl FromStr for DistinguishedName {
	type Err = InvalidName;

	fn from_str(name: &str) -> Result<Self, Self::Err> {
		let mut rdns = Vec::new();
		if name.trim().is_empty() {
			return Ok(Self(rdns));
		}

		let mut parser = Parser { input: name, chars: name.chars().peekable() };
		let mut avas = Vec::new();
		loop {
			let attr_type = parser.attribute_type()?;
			let (value, terminator) = parser.value()?;
			avas.push(Ava { attr_type, value });
			match terminator {
				Terminator::Plus => {}
				Terminator::Comma => rdns.push(Rdn(std::mem::take(&mut avas))),
				Terminator::End => {
					rdns.push(Rdn(avas));
					break;
				}
			}
		}
		Ok(Self(rdns))
	}
}

/// What ended an attribute value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
	/// Another assertion of the same component follows
	Plus,
	/// Another component follows
	Comma,
	/// End of input
	End,
}

/// Character-level state for parsing a name
struct Parser<'a> {
	/// The full input, for error reporting
	input: &'a str,
	/// Remaining characters
	chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
	/// Read an attribute type up to and including the `=`.
	fn attribute_type(&mut self) -> Result<String, InvalidName> {
		let mut attr_type = String::new();
		loop {
			match self.chars.next() {
				Some('=') => break,
				Some(c) => attr_type.push(c),
				None => return Err(InvalidName::new(self.input, "missing '=' in component")),
			}
		}
		let attr_type = attr_type.trim();
		if !is_attribute_type(attr_type) {
			return Err(InvalidName::new(self.input, "malformed attribute type"));
		}
		Ok(attr_type.to_owned())
	}

	/// Read and unescape a value up to the next unescaped separator.
	fn value(&mut self) -> Result<(String, Terminator), InvalidName> {
		while self.chars.peek() == Some(&' ') {
			self.chars.next();
		}

		let mut bytes = Vec::new();
		// Length up to the last escaped or non-space character, trailing
		// unescaped spaces are not part of the value.
		let mut significant = 0;
		let terminator = loop {
			match self.chars.next() {
				None => break Terminator::End,
				Some(',' | ';') => break Terminator::Comma,
				Some('+') => break Terminator::Plus,
				Some('\\') => {
					self.escape(&mut bytes)?;
					significant = bytes.len();
				}
				Some('"' | '<' | '>') => {
					return Err(InvalidName::new(self.input, "unescaped special character"));
				}
				Some(c) => {
					let mut buf = [0; 4];
					bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
					if c != ' ' {
						significant = bytes.len();
					}
				}
			}
		};
		bytes.truncate(significant);

		let value = String::from_utf8(bytes)
			.map_err(|_| InvalidName::new(self.input, "escaped value is not valid UTF-8"))?;
		Ok((value, terminator))
	}

	/// Decode the escape sequence following a backslash.
	fn escape(&mut self, bytes: &mut Vec<u8>) -> Result<(), InvalidName> {
		let input = self.input;
		match self.chars.next() {
			Some(high) if high.is_ascii_hexdigit() => {
				let low = self
					.chars
					.next()
					.and_then(|low| low.to_digit(16))
					.ok_or_else(|| InvalidName::new(input, "truncated hex escape"))?;
				let high = high.to_digit(16).unwrap_or_default();
				bytes.push((high * 16 + low) as u8);
			}
			Some(c @ (' ' | '"' | '#' | '+' | ',' | ';' | '<' | '=' | '>' | '\\')) => {
				bytes.push(c as u8);
			}
			_ => return Err(InvalidName::new(input, "invalid escape sequence")),
		}
		Ok(())
	}
}

/// Whether `attr_type` is a descriptor (`cn`, `objectClass`) or a numeric OID.
fn is_attribute_type(attr_type: &str) -> bool {
	let mut chars = attr_type.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() => chars.all(|c| c.is_ascii_alphanumeric() || c == '-'),
		Some(c) if c.is_ascii_digit() => {
			!attr_type.ends_with('.')
				&& !attr_type.contains("..")
				&& attr_type.chars().all(|c| c.is_ascii_digit() || c == '.')
		}
		_ => false,
	}
}

/// Write `value` with the characters RFC 4514 reserves escaped.
fn escape_value(value: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	let last = value.chars().count().saturating_sub(1);
	for (i, c) in value.chars().enumerate() {
		match c {
			',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
				f.write_char('\\')?;
				f.write_char(c)?;
			}
			'\0' => f.write_str("\\00")?,
			' ' if i == 0 || i == last => f.write_str("\\20")?,
			'#' if i == 0 => f.write_str("\\23")?,
			_ => f.write_char(c)?,
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use super::{DistinguishedName, Rdn};

	#[test]
	fn parse_and_format() -> Result<(), Box<dyn std::error::Error>> {
		let dn = DistinguishedName::parse("cn=admins,ou=roles,dc=example")?;
		assert_eq!(dn.rdns().len(), 3);
		assert_eq!(dn.rdns()[0].value_of("cn"), Some("admins"));
		assert_eq!(dn.rdns()[2].value_of("DC"), Some("example"), "Types compare case-insensitively");
		assert_eq!(dn.to_string(), "cn=admins,ou=roles,dc=example");
		Ok(())
	}

	#[test]
	fn child_is_most_specific() -> Result<(), Box<dyn std::error::Error>> {
		let base: DistinguishedName = "ou=users,dc=example".parse()?;
		let dn = base.child(Rdn::new("cn", "alice")?);
		assert_eq!(dn.to_string(), "cn=alice,ou=users,dc=example");
		assert_eq!(dn.parent(), Some(base));
		Ok(())
	}

	#[test]
	fn escaped_values_round_trip() -> Result<(), Box<dyn std::error::Error>> {
		let base: DistinguishedName = "ou=users,dc=example".parse()?;
		for value in ["Doe, John", " padded ", "#hash", "a+b=c", "quote\"d", "back\\slash", "Zoë"] {
			let dn = base.child(Rdn::new("cn", value)?);
			let parsed = DistinguishedName::parse(&dn.to_string())?;
			assert_eq!(parsed.rdns()[0].value_of("cn"), Some(value), "{dn}");
			assert_eq!(parsed, dn);
		}
		Ok(())
	}

	#[test]
	fn escape_output() -> Result<(), Box<dyn std::error::Error>> {
		let format = |value: &str| Rdn::new("cn", value).map(|rdn| rdn.to_string());
		assert_eq!(format("admin,dc=evil")?, "cn=admin\\,dc\\=evil");
		assert_eq!(format(" admin ")?, "cn=\\20admin\\20");
		assert_eq!(format("#admin")?, "cn=\\23admin");
		assert_eq!(format("admin#1")?, "cn=admin#1");
		assert_eq!(format("a\0b")?, "cn=a\\00b");
		Ok(())
	}

	#[test]
	fn hex_escapes_and_whitespace() -> Result<(), Box<dyn std::error::Error>> {
		let dn = DistinguishedName::parse("cn = Zo\\C3\\AB , ou=people\\2Cold , dc=example")?;
		assert_eq!(dn.rdns()[0].value_of("cn"), Some("Zoë"));
		assert_eq!(dn.rdns()[1].value_of("ou"), Some("people,old"));
		assert_eq!(DistinguishedName::parse("cn=trailing\\ ")?.rdns()[0].value_of("cn"), Some("trailing "));
		Ok(())
	}

	#[test]
	fn multi_valued_component() -> Result<(), Box<dyn std::error::Error>> {
		let dn = DistinguishedName::parse("cn=alice+uid=a1,dc=example")?;
		assert_eq!(dn.rdns().len(), 2);
		assert_eq!(dn.rdns()[0].assertions().len(), 2);
		assert_eq!(dn.rdns()[0].value_of("uid"), Some("a1"));
		assert_eq!(dn.to_string(), "cn=alice+uid=a1,dc=example");
		Ok(())
	}

	#[test]
	fn root_name() -> Result<(), Box<dyn std::error::Error>> {
		let root = DistinguishedName::parse("")?;
		assert!(root.is_root());
		assert_eq!(root.parent(), None);
		assert_eq!(root.to_string(), "");
		Ok(())
	}

	#[test]
	fn invalid_names() {
		for name in ["cn", "=value", "cn=a,,dc=b", "c n=a", "1..2=a", "cn=a\\zz", "cn=a\\4", "cn=<x>"] {
			assert!(DistinguishedName::parse(name).is_err(), "{name} should be rejected");
		}
		assert!(Rdn::new("cn", "").is_err(), "Empty values cannot name an entry");
		assert!(Rdn::new("c=n", "x").is_err());
		assert!(Rdn::new("2.5.4.3", "x").is_ok(), "Numeric OIDs are valid types");
	}
}
