//! Users and their passwords.
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha1::{Digest, Sha1};
use tracing::{debug, info};

use super::Store;
use crate::{
	directory::{Directory, DirectoryError, Modification},
	domain::User,
	entry::Attributes,
	error::Error,
	mapper::EntityMapper,
	model::Entity,
	permission::{Action, Authorizer, ListPolicy, Permission},
};

/// Scheme name of salt-less SHA-1 password values
const SHA: &str = "SHA";

/// Stores users.
#[derive(Debug, Clone)]
pub struct UserRepository {
	/// Shared state
	store: Store,
}

impl UserRepository {
	/// Create a repository on top of `directory`.
	#[must_use]
	pub fn new(directory: Arc<dyn Directory>, mapper: EntityMapper, policy: ListPolicy) -> Self {
		Self { store: Store::new(directory, mapper, policy) }
	}

	/// The name of the user `identifier`
	fn user_name(&self, identifier: &str) -> Result<String, Error> {
		Ok(self.store.mapper.names().qualified_name(identifier, User::TYPE)?.to_string())
	}

	/// The mapped attributes of `user` together with its object classes.
	fn attributes(&self, user: &User) -> Result<Attributes, Error> {
		let mut attributes = self.store.mapper.to_attributes(user)?;
		let (name, classes) = self.store.mapper.object_class_attribute(User::TYPE)?;
		attributes.insert(name, classes);
		Ok(attributes)
	}

	/// Whether the user exists.
	///
	/// Requires read access to the user.
	pub async fn contains_user(&self, caller: &dyn Authorizer, identifier: &str) -> Result<bool, Error> {
		debug!("Testing contains user: {identifier}");
		caller.check_permission(&Permission::on(User::TYPE, identifier, Action::Read))?;
		let dn = self.user_name(identifier)?;

		let mut connection = self.store.open().await?;
		let result = connection.read(&dn).await;
		Store::release(connection).await;

		let exists = match result {
			Ok(_) => true,
			Err(DirectoryError::NoSuchObject(_)) => false,
			Err(err) => return Err(err.into()),
		};
		debug!("Tested contains user {identifier}: {exists}");
		Ok(exists)
	}

	/// Create a new user.
	pub async fn create_user(&self, caller: &dyn Authorizer, user: &User) -> Result<(), Error> {
		debug!("Creating user: {}", user.identifier);
		caller.check_permission(&Permission::on(User::TYPE, &user.identifier, Action::Write))?;
		let dn = self.store.mapper.names().qualified_name_of(user)?.to_string();
		let attributes = self.attributes(user)?;

		let mut connection = self.store.open().await?;
		let result = connection.add(&dn, &attributes).await;
		Store::release(connection).await;
		result?;
		debug!("Created user: {dn}");
		Ok(())
	}

	/// Delete a user.
	pub async fn delete_user(&self, caller: &dyn Authorizer, identifier: &str) -> Result<(), Error> {
		debug!("Deleting user: {identifier}");
		caller.check_permission(&Permission::on(User::TYPE, identifier, Action::Write))?;
		let dn = self.user_name(identifier)?;

		let mut connection = self.store.open().await?;
		let result = connection.delete(&dn).await;
		Store::release(connection).await;
		Ok(result?)
	}

	/// Get a user.
	pub async fn get_user(&self, caller: &dyn Authorizer, identifier: &str) -> Result<User, Error> {
		caller.check_permission(&Permission::on(User::TYPE, identifier, Action::Read))?;
		self.read_user(identifier).await
	}

	/// Get a user without checking any permission.
	///
	/// Meant for authentication and administrative tooling, never for requests
	/// made on behalf of a user.
	pub async fn get_user_unsecured(&self, identifier: &str) -> Result<User, Error> {
		info!("Getting user (unsecured!): {identifier}");
		let user = self.read_user(identifier).await?;
		info!("Got user (unsecured!) {identifier}: {user:?}");
		Ok(user)
	}

	/// Read and map the entry of a user
	async fn read_user(&self, identifier: &str) -> Result<User, Error> {
		debug!("Getting user: {identifier}");
		let dn = self.user_name(identifier)?;

		let mut connection = self.store.open().await?;
		let result = connection.read(&dn).await;
		Store::release(connection).await;

		let user = self.store.mapper.from_attributes(&result?)?;
		debug!("Got user {identifier}: {user:?}");
		Ok(user)
	}

	/// The identifiers of all users the caller may read, sorted.
	pub async fn get_user_identifiers(&self, caller: &dyn Authorizer) -> Result<Vec<String>, Error> {
		debug!("Getting all user identifiers");
		let names = self.store.mapper.names();
		let base = names.subtree_name(User::TYPE)?.to_string();

		let mut connection = self.store.open().await?;
		let result = connection.list(&base).await;
		Store::release(connection).await;

		let mut identifiers = Vec::new();
		for dn in result? {
			let identifier = names.short_name(&dn, User::TYPE)?;
			if self.store.admit(caller, &Permission::on(User::TYPE, &identifier, Action::Read))? {
				identifiers.push(identifier);
			}
		}
		identifiers.sort();
		identifiers.dedup();
		debug!("Got all user identifiers: {identifiers:?}");
		Ok(identifiers)
	}

	/// All users the caller may read, sorted by identifier.
	pub async fn get_users(&self, caller: &dyn Authorizer) -> Result<Vec<User>, Error> {
		debug!("Getting all users");
		let names = self.store.mapper.names();
		let base = names.subtree_name(User::TYPE)?.to_string();
		let (name, classes) = self.store.mapper.object_class_attribute(User::TYPE)?;
		let mut matching = Attributes::new();
		matching.insert(name, classes);

		let mut connection = self.store.open().await?;
		let result = connection.search(&base, &matching).await;
		Store::release(connection).await;

		let mut users = Vec::new();
		for entry in result? {
			let identifier = names.short_name(&entry.dn, User::TYPE)?;
			if self.store.admit(caller, &Permission::on(User::TYPE, &identifier, Action::Read))? {
				users.push(self.store.mapper.from_attributes::<User>(&entry.attributes)?);
			}
		}
		users.sort_by(|a, b| a.identifier.cmp(&b.identifier));
		Ok(users)
	}

	/// Replace all mapped attributes of a user.
	pub async fn update_user(&self, caller: &dyn Authorizer, user: &User) -> Result<(), Error> {
		debug!("Updating user: {}", user.identifier);
		caller.check_permission(&Permission::on(User::TYPE, &user.identifier, Action::Write))?;
		let dn = self.store.mapper.names().qualified_name_of(user)?.to_string();
		let attributes = self.attributes(user)?;

		let mut connection = self.store.open().await?;
		let result = connection.modify(&dn, Modification::Replace, &attributes).await;
		Store::release(connection).await;
		result?;
		debug!("Updated user: {dn}");
		Ok(())
	}

	/// Store a new password as its salt-less SHA-1 digest, `{SHA}base64(hash)`,
	/// the scheme most directory servers verify on bind.
	///
	/// Requires the `password:<identifier>:modify` permission.
	pub async fn update_password(
		&self,
		caller: &dyn Authorizer,
		identifier: &str,
		password: &str,
	) -> Result<(), Error> {
		if password.is_empty() {
			return Err(Error::Invalid("Password may not be empty".to_owned()));
		}
		let hash = Sha1::digest(password.as_bytes());
		self.update_user_password(caller, identifier, hash.as_slice(), SHA).await
	}

	/// Store a new password digest, computed by the caller with `algorithm`,
	/// as `{algorithm}base64(hash)`.
	///
	/// Requires the `password:<identifier>:modify` permission.
	pub async fn update_user_password(
		&self,
		caller: &dyn Authorizer,
		identifier: &str,
		hash: &[u8],
		algorithm: &str,
	) -> Result<(), Error> {
		debug!("Updating password for user: {identifier}");
		if hash.is_empty() {
			return Err(Error::Invalid("Password hash may not be empty".to_owned()));
		}
		if algorithm.is_empty() || algorithm.contains(['{', '}']) {
			return Err(Error::Invalid(format!("Invalid password algorithm {algorithm:?}")));
		}
		caller.check_permission(&Permission::scoped(User::PASSWORD, identifier, Action::Modify))?;
		let dn = self.user_name(identifier)?;
		let attribute = self.store.mapper.attribute_name(User::TYPE, User::PASSWORD)?;
		let mut attributes = Attributes::new();
		attributes.insert(attribute, [format!("{{{algorithm}}}{}", STANDARD.encode(hash))]);

		let mut connection = self.store.open().await?;
		let result = connection.modify(&dn, Modification::Replace, &attributes).await;
		Store::release(connection).await;
		result?;
		debug!("Updated password for user: {identifier}");
		Ok(())
	}
}
