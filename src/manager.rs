//! Entry point wiring the repositories and the realm together.
use std::sync::Arc;

use crate::{
	config::Config,
	directory::Directory,
	error::Error,
	ldap::LdapDirectory,
	mapper::EntityMapper,
	mapping::MappingTables,
	permission::PermissionResolver,
	realm::Realm,
	repository::{RoleRepository, UserRepository},
};

/// The repositories and realm of one directory.
#[derive(Debug, Clone)]
pub struct UserManager {
	/// Role access
	roles: RoleRepository,
	/// User access
	users: UserRepository,
	/// Authentication
	realm: Realm,
}

impl UserManager {
	/// Create a manager for the LDAP server described by `config`.
	///
	/// No connection is made until the first operation.
	pub fn new(config: Config) -> Result<Self, Error> {
		let directory = Arc::new(LdapDirectory::new(config.clone()));
		Self::with_directory(directory, &config)
	}

	/// Create a manager operating on `directory`, using the mapping and
	/// authorization settings of `config`.
	pub fn with_directory(directory: Arc<dyn Directory>, config: &Config) -> Result<Self, Error> {
		let tables = Arc::new(MappingTables::new(&config.mapping)?);
		let mapper = EntityMapper::new(tables);
		let permissions = PermissionResolver::new(&config.authorization)?;

		let roles = RoleRepository::new(directory.clone(), mapper.clone(), config.list_policy);
		let users = UserRepository::new(directory.clone(), mapper.clone(), config.list_policy);
		let realm = Realm::new(directory, mapper.names().clone(), roles.clone(), permissions);
		Ok(Self { roles, users, realm })
	}

	/// The role repository
	#[must_use]
	pub const fn roles(&self) -> &RoleRepository {
		&self.roles
	}

	/// The user repository
	#[must_use]
	pub const fn users(&self) -> &UserRepository {
		&self.users
	}

	/// The realm authenticating users
	#[must_use]
	pub const fn realm(&self) -> &Realm {
		&self.realm
	}
}
