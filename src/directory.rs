//! Abstraction over the directory server the repositories operate on.
//!
//! A [`Directory`] hands out [`Connection`]s, each of which is used for a
//! single repository call and closed afterwards.
use std::fmt::Debug;

use async_trait::async_trait;

use crate::entry::{Attributes, Entry};

/// How the values of a modification are applied to an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modification {
	/// Add the values to the attribute
	Add,
	/// Replace all values of the attribute. An empty value list removes it.
	Replace,
	/// Remove the values from the attribute
	Remove,
}

/// Errors reported by a directory connection
#[derive(thiserror::Error, Debug)]
pub enum DirectoryError {
	/// The named entry does not exist (result code 32).
	#[error("No such object: {0}")]
	NoSuchObject(String),
	/// An entry with that name already exists (result code 68).
	#[error("Entry already exists: {0}")]
	AlreadyExists(String),
	/// An added value is already present (result code 20).
	#[error("Value already exists in {0}")]
	ValueExists(String),
	/// A removed value is not present (result code 16).
	#[error("No such value in {0}")]
	NoSuchValue(String),
	/// The server rejected the operation with another result code.
	#[error("Operation on {dn} failed with result code {rc}: {text}")]
	Operation {
		/// The entry the operation targeted
		dn: String,
		/// The LDAP result code
		rc: u32,
		/// The diagnostic message sent by the server
		text: String,
	},
	/// An underlying protocol error or similar occurred, or the LDAP library
	/// was used incorrectly.
	#[error(transparent)]
	Ldap(#[from] ldap3::LdapError),
	/// Reading connection material such as certificates failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
	/// The connection configuration is not usable.
	#[error("Invalid connection configuration: {0}")]
	Invalid(String),
}

/// A source of connections to a directory server.
#[async_trait]
pub trait Directory: Send + Sync + Debug {
	/// Open a connection bound as the service account.
	async fn connect(&self) -> Result<Box<dyn Connection>, DirectoryError>;

	/// Check the password of the entry named `dn` by binding as it.
	///
	/// Returns `Ok(false)` if the credentials are rejected.
	async fn authenticate(&self, dn: &str, password: &str) -> Result<bool, DirectoryError>;
}

/// A connection to a directory server, used for a single repository call.
#[async_trait]
pub trait Connection: Send {
	/// Create a new entry.
	async fn add(&mut self, dn: &str, attributes: &Attributes) -> Result<(), DirectoryError>;

	/// Delete an entry.
	async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError>;

	/// Read all attributes of an entry.
	async fn read(&mut self, dn: &str) -> Result<Attributes, DirectoryError>;

	/// Apply one kind of modification to all given attributes of an entry.
	async fn modify(
		&mut self,
		dn: &str,
		modification: Modification,
		attributes: &Attributes,
	) -> Result<(), DirectoryError>;

	/// Names of the entries directly below `base`.
	async fn list(&mut self, base: &str) -> Result<Vec<String>, DirectoryError>;

	/// Entries directly below `base` that hold every given attribute value.
	async fn search(
		&mut self,
		base: &str,
		matching: &Attributes,
	) -> Result<Vec<Entry>, DirectoryError>;

	/// Close the connection.
	async fn close(&mut self) -> Result<(), DirectoryError>;
}
