use std::{
	collections::{BTreeMap, HashMap},
	error::Error,
	sync::{
		atomic::{AtomicBool, AtomicUsize, Ordering},
		Arc, Mutex,
	},
};

use async_trait::async_trait;
use ldap3::{LdapConnAsync, Scope, SearchEntry};
use ldap_usermanager::{
	config::{AuthorizationConfig, Config, ConnectionConfig, MappingConfig},
	Attributes, Connection, Directory, DirectoryError, DistinguishedName, Entry, ListPolicy,
	Modification, Permission, Subject,
};
use url::Url;

/// Turn a list of string literals into owned strings
pub fn strings(items: &[&str]) -> Vec<String> {
	items.iter().map(|item| (*item).to_owned()).collect()
}

/// A subject holding the given permissions
pub fn caller(permissions: &[&str]) -> Subject {
	let permissions = permissions.iter().map(|p| Permission::parse(p).unwrap()).collect();
	Subject::new("tester", Vec::new(), permissions)
}

/// The mapping used by the scenario tests
pub fn example_config() -> Config {
	let mut attributes = HashMap::new();
	for (property, attribute) in [
		("role.identifier", "cn"),
		("role.displayName", "displayName"),
		("role.users", "users"),
		("user.identifier", "cn"),
		("user.displayName", "displayName"),
		("user.firstName", "givenName"),
		("user.lastName", "sn"),
		("user.mail", "mail"),
		("user.password", "userPassword"),
	] {
		attributes.insert(property.to_owned(), strings(&[attribute]));
	}

	Config {
		url: Url::parse("ldap://localhost:1389").unwrap(),
		connection: ConnectionConfig::default(),
		bind_dn: "cn=admin,dc=example".to_owned(),
		bind_password: "adminpassword".to_owned(),
		mapping: MappingConfig {
			object_classes: HashMap::from([
				("role".to_owned(), strings(&["top", "groupOfUsers"])),
				("user".to_owned(), strings(&["inetOrgPerson"])),
			]),
			attributes,
			subtrees: HashMap::from([
				("role".to_owned(), "ou=roles,dc=example".to_owned()),
				("user".to_owned(), "ou=users,dc=example".to_owned()),
			]),
		},
		authorization: AuthorizationConfig {
			role_permissions: HashMap::from([("admins".to_owned(), strings(&["role:*", "user:*"]))]),
			user_permissions: strings(&["# every user may read itself", "user:${user}:read"]),
		},
		list_policy: ListPolicy::FilterUnauthorized,
	}
}

/// The mapping used against the OpenLDAP test server
pub fn docker_config() -> Config {
	let mut config = example_config();
	config.bind_dn = "cn=admin,dc=example,dc=org".to_owned();
	config.mapping.object_classes = HashMap::from([
		("role".to_owned(), strings(&["groupOfNames"])),
		("user".to_owned(), strings(&["inetOrgPerson"])),
	]);
	config.mapping.attributes.insert("role.displayName".to_owned(), strings(&["description"]));
	config.mapping.attributes.insert("role.users".to_owned(), strings(&["member"]));
	config.mapping.subtrees = HashMap::from([
		("role".to_owned(), "ou=roles,dc=example,dc=org".to_owned()),
		("user".to_owned(), "ou=users,dc=example,dc=org".to_owned()),
	]);
	config
}

/// Entries and counters of a [`MemoryDirectory`]
#[derive(Debug, Default)]
pub struct State {
	pub entries: Mutex<BTreeMap<String, Attributes>>,
	pub opened: AtomicUsize,
	pub closed: AtomicUsize,
	pub fail_close: AtomicBool,
	pub converged: AtomicBool,
	pub modified: AtomicUsize,
}

/// An in-memory directory, keeping entries by their name as formatted by the
/// library.
#[derive(Debug, Default, Clone)]
pub struct MemoryDirectory {
	pub state: Arc<State>,
}

impl MemoryDirectory {
	pub fn insert(&self, dn: &str, attributes: Attributes) {
		self.state.entries.lock().unwrap().insert(dn.to_owned(), attributes);
	}

	pub fn entry(&self, dn: &str) -> Option<Attributes> {
		self.state.entries.lock().unwrap().get(dn).cloned()
	}

	pub fn snapshot(&self) -> BTreeMap<String, Attributes> {
		self.state.entries.lock().unwrap().clone()
	}

	pub fn opened(&self) -> usize {
		self.state.opened.load(Ordering::SeqCst)
	}

	pub fn closed(&self) -> usize {
		self.state.closed.load(Ordering::SeqCst)
	}

	pub fn fail_close(&self) {
		self.state.fail_close.store(true, Ordering::SeqCst);
	}

	/// Answer every link change as if another client had already made it
	pub fn converge_links(&self) {
		self.state.converged.store(true, Ordering::SeqCst);
	}

	pub fn modified(&self) -> usize {
		self.state.modified.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Directory for MemoryDirectory {
	async fn connect(&self) -> Result<Box<dyn Connection>, DirectoryError> {
		self.state.opened.fetch_add(1, Ordering::SeqCst);
		Ok(Box::new(MemoryConnection { state: self.state.clone() }))
	}

	async fn authenticate(&self, dn: &str, password: &str) -> Result<bool, DirectoryError> {
		let entries = self.state.entries.lock().unwrap();
		let stored = entries.get(dn).and_then(|entry| entry.attr_first("userPassword"));
		Ok(stored == Some(password))
	}
}

struct MemoryConnection {
	state: Arc<State>,
}

fn is_child(dn: &str, base: &str) -> bool {
	let (Ok(dn), Ok(base)) = (DistinguishedName::parse(dn), DistinguishedName::parse(base)) else {
		return false;
	};
	dn.parent().is_some_and(|parent| parent.to_string() == base.to_string())
}

fn holds(attributes: &Attributes, matching: &Attributes) -> bool {
	matching.iter().all(|(name, values)| {
		let present = attributes.get(name).unwrap_or_default();
		values.iter().all(|value| present.contains(value))
	})
}

#[async_trait]
impl Connection for MemoryConnection {
	async fn add(&mut self, dn: &str, attributes: &Attributes) -> Result<(), DirectoryError> {
		let mut entries = self.state.entries.lock().unwrap();
		if entries.contains_key(dn) {
			return Err(DirectoryError::AlreadyExists(dn.to_owned()));
		}
		let mut stored = Attributes::new();
		for (name, values) in attributes.iter().filter(|(_, values)| !values.is_empty()) {
			stored.insert(name, values.iter().cloned());
		}
		entries.insert(dn.to_owned(), stored);
		Ok(())
	}

	async fn delete(&mut self, dn: &str) -> Result<(), DirectoryError> {
		let mut entries = self.state.entries.lock().unwrap();
		entries.remove(dn).map(drop).ok_or_else(|| DirectoryError::NoSuchObject(dn.to_owned()))
	}

	async fn read(&mut self, dn: &str) -> Result<Attributes, DirectoryError> {
		let entries = self.state.entries.lock().unwrap();
		entries.get(dn).cloned().ok_or_else(|| DirectoryError::NoSuchObject(dn.to_owned()))
	}

	async fn modify(
		&mut self,
		dn: &str,
		modification: Modification,
		attributes: &Attributes,
	) -> Result<(), DirectoryError> {
		self.state.modified.fetch_add(1, Ordering::SeqCst);
		let mut entries = self.state.entries.lock().unwrap();
		let entry = entries.get(dn).ok_or_else(|| DirectoryError::NoSuchObject(dn.to_owned()))?;
		if self.state.converged.load(Ordering::SeqCst) {
			match modification {
				Modification::Add => return Err(DirectoryError::ValueExists(dn.to_owned())),
				Modification::Remove => return Err(DirectoryError::NoSuchValue(dn.to_owned())),
				Modification::Replace => {}
			}
		}
		let mut updated = entry.clone();
		for (name, values) in attributes.iter() {
			let mut present = updated.remove(name).unwrap_or_default();
			match modification {
				Modification::Add => {
					for value in values {
						if present.contains(value) {
							return Err(DirectoryError::ValueExists(dn.to_owned()));
						}
						present.push(value.clone());
					}
				}
				Modification::Replace => present = values.to_vec(),
				Modification::Remove if values.is_empty() => present.clear(),
				Modification::Remove => {
					for value in values {
						let Some(index) = present.iter().position(|v| v == value) else {
							return Err(DirectoryError::NoSuchValue(dn.to_owned()));
						};
						present.remove(index);
					}
				}
			}
			if !present.is_empty() {
				updated.insert(name, present);
			}
		}
		entries.insert(dn.to_owned(), updated);
		Ok(())
	}

	async fn list(&mut self, base: &str) -> Result<Vec<String>, DirectoryError> {
		let entries = self.state.entries.lock().unwrap();
		Ok(entries.keys().filter(|dn| is_child(dn, base)).cloned().collect())
	}

	async fn search(
		&mut self,
		base: &str,
		matching: &Attributes,
	) -> Result<Vec<Entry>, DirectoryError> {
		let entries = self.state.entries.lock().unwrap();
		Ok(entries
			.iter()
			.filter(|(dn, attributes)| is_child(dn, base) && holds(attributes, matching))
			.map(|(dn, attributes)| Entry { dn: dn.clone(), attributes: attributes.clone() })
			.collect())
	}

	async fn close(&mut self) -> Result<(), DirectoryError> {
		self.state.closed.fetch_add(1, Ordering::SeqCst);
		if self.state.fail_close.load(Ordering::SeqCst) {
			return Err(DirectoryError::Invalid("connection already gone".to_owned()));
		}
		Ok(())
	}
}

pub async fn ldap_connect() -> Result<ldap3::Ldap, Box<dyn Error>> {
	let (conn, mut ldap) = LdapConnAsync::new("ldap://localhost:1389").await?;
	let _handle = tokio::spawn(async move {
		if let Err(err) = conn.drive().await {
			panic!("Ldap connection error {err}");
		}
	});
	ldap.simple_bind("cn=admin,dc=example,dc=org", "adminpassword").await?;
	Ok(ldap)
}

pub async fn ldap_add_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	ldap.add(
		&format!("ou={},dc=example,dc=org", ou),
		vec![("objectClass", ["organizationalUnit"].into())],
	)
	.await?
	.success()?;
	Ok(())
}

/// Delete an organizational unit together with its children
pub async fn ldap_delete_organizational_unit(
	ldap: &mut ldap3::Ldap,
	ou: &str,
) -> Result<(), Box<dyn Error>> {
	let base = format!("ou={},dc=example,dc=org", ou);
	let (children, _res) =
		ldap.search(&base, Scope::OneLevel, "(objectClass=*)", vec!["1.1"]).await?.success()?;
	for child in children {
		ldap.delete(&SearchEntry::construct(child).dn).await?.success()?;
	}
	ldap.delete(&base).await?.success()?;
	Ok(())
}

pub async fn ldap_search_entry(
	ldap: &mut ldap3::Ldap,
	dn: &str,
) -> Result<SearchEntry, Box<dyn Error>> {
	let (result, _res) =
		ldap.search(dn, Scope::Base, "(objectClass=*)", vec!["*"]).await?.success()?;
	let entry = result.first().ok_or("No entry found")?.clone();
	Ok(SearchEntry::construct(entry))
}
