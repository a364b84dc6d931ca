//! Directory implementation talking to an LDAP server.

use std::collections::HashSet;

use async_trait::async_trait;
use ldap3::{ldap_escape, LdapConnAsync, LdapResult, Mod, Scope, SearchEntry};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{
	config::Config,
	directory::{Connection, Directory, DirectoryError, Modification},
	entry::{Attributes, Entry},
};

/// Result code of a successful operation
const SUCCESS: u32 = 0;
/// Result code for removing a value that is not present
const NO_SUCH_ATTRIBUTE: u32 = 16;
/// Result code for adding a value that is already present
const ATTRIBUTE_OR_VALUE_EXISTS: u32 = 20;
/// Result code for operations on entries that do not exist
const NO_SUCH_OBJECT: u32 = 32;
/// Result code for rejected credentials
const INVALID_CREDENTIALS: u32 = 49;
/// Result code for adding an entry that already exists
const ENTRY_ALREADY_EXISTS: u32 = 68;

/// Connects to the LDAP server described by a [`Config`].
#[derive(Debug, Clone)]
pub struct LdapDirectory {
	/// The configuration of the LDAP client.
	config: Config,
}

impl LdapDirectory {
	/// Create a new [`LdapDirectory`] with the given configuration.
	#[must_use]
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Create a connection to an ldap server based on the settings and url
	/// specified in the configuration, with its driver running in the
	/// background.
	async fn open(&self) -> Result<(JoinHandle<()>, ldap3::Ldap), DirectoryError> {
		let settings = self.config.connection.to_settings().await?;
		let (conn, mut ldap) =
			LdapConnAsync::from_url_with_settings(settings, &self.config.url).await?;
		let driver = tokio::spawn(async move {
			if let Err(err) = conn.drive().await {
				warn!("Ldap connection error {err}");
			}
		});
		ldap.with_timeout(self.config.connection.operation_timeout);
		Ok((driver, ldap))
	}
}

#[async_trait]
impl Directory for LdapDirectory {
	async fn connect(&self) -> Result<Box<dyn Connection>, DirectoryError> {
		let (driver, mut ldap) = self.open().await?;
		let bound = match ldap.simple_bind(&self.config.bind_dn, &self.config.bind_password).await {
			Ok(result) => check(result, &self.config.bind_dn),
			Err(err) => Err(err.into()),
		};
		if let Err(err) = bound {
			driver.abort();
			return Err(err);
		}
		Ok(Box::new(LdapConnection {
			ldap,
			driver: Some(driver),
			timeout: self.config.connection.operation_timeout,
		}))
	}

	async fn authenticate(&self, dn: &str, password: &str) -> Result<bool, DirectoryError> {
		let (driver, mut ldap) = self.open().await?;
		let result = ldap.simple_bind(dn, password).await;
		let authenticated = match result {
			Ok(result) if result.rc == INVALID_CREDENTIALS => Ok(false),
			Ok(result) => check(result, dn).map(|()| true),
			Err(err) => Err(err.into()),
		};
		let mut connection = LdapConnection {
			ldap,
			driver: Some(driver),
			timeout: self.config.connection.operation_timeout,
		};
		if let Err(err) = connection.close().await {
			warn!("Failed to close authentication connection: {err}");
		}
		authenticated
	}
}

/// A bound connection to an LDAP server.
#[derive(Debug)]
pub struct LdapConnection {
	/// The handle used for operations
	ldap: ldap3::Ldap,
	/// The background task driving the connection, until closed
	driver: Option<JoinHandle<()>>,
	/// Timeout applied to every operation
	timeout: std::time::Duration,
}

impl LdapConnection {
	/// The operation handle, with the timeout applied to the next request.
	fn ldap(&mut self) -> &mut ldap3::Ldap {
		self.ldap.with_timeout(self.timeout);
		&mut self.ldap
	}

	/// Run a one-level search below `base`.
	async fn one_level(
		&mut self,
		base: &str,
		filter: &str,
		attrs: Vec<&str>,
	) -> Result<Vec<SearchEntry>, DirectoryError> {
		debug!("Searching {filter} below {base}");
		let ldap3::SearchResult(entries, result) =
			self.ldap().search(base, Scope::OneLevel, filter, attrs).await?;
		check(result, base)?;
		Ok(entries.into_iter().map(SearchEntry::construct).collect())
	}
}

#[async_trait]
impl Connection for LdapConnection {
	async fn add(&mut self, dn: &str, attributes: &Attributes) -> Result<(), DirectoryError> {
		let attrs: Vec<(&str, HashSet<&str>)> = attributes
			.iter()
			.filter(|(_, values)| !values.is_empty())
			.map(|(name, values)| (name, values.iter().map(String::as_str).collect()))
			.collect();
		let result = self.ldap().add(dn, attrs).await?;
		check(result, dn)
	}

	async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
		let result = self.ldap().delete(dn).await?;
		check(result, dn)
	}

	async fn read(&mut self, dn: &str) -> Result<Attributes, DirectoryError> {
		let ldap3::SearchResult(entries, result) =
			self.ldap().search(dn, Scope::Base, "(objectClass=*)", vec!["*"]).await?;
		check(result, dn)?;
		let entry = entries
			.into_iter()
			.next()
			.ok_or_else(|| DirectoryError::NoSuchObject(dn.to_owned()))?;
		Ok(Entry::from(SearchEntry::construct(entry)).attributes)
	}

	async fn modify(
		&mut self,
		dn: &str,
		modification: Modification,
		attributes: &Attributes,
	) -> Result<(), DirectoryError> {
		let mods: Vec<Mod<&str>> = attributes
			.iter()
			.map(|(name, values)| {
				let values: HashSet<&str> = values.iter().map(String::as_str).collect();
				match modification {
					Modification::Add => Mod::Add(name, values),
					Modification::Replace => Mod::Replace(name, values),
					Modification::Remove => Mod::Delete(name, values),
				}
			})
			.collect();
		let result = self.ldap().modify(dn, mods).await?;
		check(result, dn)
	}

	async fn list(&mut self, base: &str) -> Result<Vec<String>, DirectoryError> {
		let entries = self.one_level(base, "(objectClass=*)", vec!["1.1"]).await?;
		Ok(entries.into_iter().map(|entry| entry.dn).collect())
	}

	async fn search(
		&mut self,
		base: &str,
		matching: &Attributes,
	) -> Result<Vec<Entry>, DirectoryError> {
		let filter = equality_filter(matching);
		let entries = self.one_level(base, &filter, vec!["*"]).await?;
		Ok(entries.into_iter().map(Entry::from).collect())
	}

	async fn close(&mut self) -> Result<(), DirectoryError> {
		let Some(driver) = self.driver.take() else {
			return Ok(());
		};
		let result = self.ldap.unbind().await;
		if let Err(err) = driver.await {
			warn!("Failed to join background task: {err}");
		}
		Ok(result?)
	}
}

/// A filter matching entries holding every given value.
fn equality_filter(matching: &Attributes) -> String {
	let assertions: Vec<String> = matching
		.iter()
		.flat_map(|(name, values)| {
			values.iter().map(move |value| format!("({}={})", name, ldap_escape(value)))
		})
		.collect();
	match assertions.as_slice() {
		[] => "(objectClass=*)".to_owned(),
		[single] => single.clone(),
		all => format!("(&{})", all.concat()),
	}
}

/// Classify the result code of an operation on `dn`.
fn check(result: LdapResult, dn: &str) -> Result<(), DirectoryError> {
	let dn = dn.to_owned();
	match result.rc {
		SUCCESS => Ok(()),
		NO_SUCH_OBJECT => Err(DirectoryError::NoSuchObject(dn)),
		ENTRY_ALREADY_EXISTS => Err(DirectoryError::AlreadyExists(dn)),
		ATTRIBUTE_OR_VALUE_EXISTS => Err(DirectoryError::ValueExists(dn)),
		NO_SUCH_ATTRIBUTE => Err(DirectoryError::NoSuchValue(dn)),
		rc => Err(DirectoryError::Operation { dn, rc, text: result.text }),
	}
}
