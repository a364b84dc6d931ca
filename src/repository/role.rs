//! Roles and their members.
use std::{collections::BTreeSet, sync::Arc};

use tracing::{debug, info};

use super::{Changes, Store};
use crate::{
	directory::{Connection, Directory, Modification},
	domain::{Role, User},
	entry::Attributes,
	error::Error,
	mapper::EntityMapper,
	model::Entity,
	permission::{Action, Authorizer, ListPolicy, Permission},
};

/// Stores roles. Membership is kept on the role entries, as a multi-valued
/// attribute holding the names of the member users.
#[derive(Debug, Clone)]
pub struct RoleRepository {
	/// Shared state
	store: Store,
}

impl RoleRepository {
	/// Create a repository on top of `directory`.
	#[must_use]
	pub fn new(directory: Arc<dyn Directory>, mapper: EntityMapper, policy: ListPolicy) -> Self {
		Self { store: Store::new(directory, mapper, policy) }
	}

	/// The name of the role `identifier`
	fn role_name(&self, identifier: &str) -> Result<String, Error> {
		Ok(self.store.mapper.names().qualified_name(identifier, Role::TYPE)?.to_string())
	}

	/// The name of the user `identifier`
	fn user_name(&self, identifier: &str) -> Result<String, Error> {
		Ok(self.store.mapper.names().qualified_name(identifier, User::TYPE)?.to_string())
	}

	/// A single membership value for `user_dn`, ready to be added or removed.
	fn membership(&self, user_dn: String) -> Result<Attributes, Error> {
		let attribute = self.store.mapper.attribute_name(Role::TYPE, Role::USERS)?;
		let mut attributes = Attributes::new();
		attributes.insert(attribute, [user_dn]);
		Ok(attributes)
	}

	/// The mapped attributes of `role` together with its object classes.
	fn attributes(&self, role: &Role, users: bool) -> Result<Attributes, Error> {
		let mapper = &self.store.mapper;
		let mut attributes = if users {
			mapper.to_attributes(role)?
		} else {
			mapper.to_attributes_filtered(role, false, &[Role::USERS])?
		};
		let (name, classes) = mapper.object_class_attribute(Role::TYPE)?;
		attributes.insert(name, classes);
		Ok(attributes)
	}

	/// Create a new role.
	///
	/// Requires write access to the role and to each of its initial members.
	pub async fn create_role(&self, caller: &dyn Authorizer, role: &Role) -> Result<(), Error> {
		debug!("Creating role: {}", role.identifier);
		caller.check_permission(&Permission::on(Role::TYPE, &role.identifier, Action::Write))?;
		for user in &role.users {
			caller.check_permission(&Permission::on(User::TYPE, user, Action::Write))?;
		}
		let dn = self.store.mapper.names().qualified_name_of(role)?.to_string();
		let attributes = self.attributes(role, true)?;

		let mut connection = self.store.open().await?;
		let result = connection.add(&dn, &attributes).await;
		Store::release(connection).await;
		result?;
		debug!("Created role: {dn}");
		Ok(())
	}

	/// Delete a role.
	pub async fn delete_role(&self, caller: &dyn Authorizer, identifier: &str) -> Result<(), Error> {
		debug!("Deleting role: {identifier}");
		caller.check_permission(&Permission::on(Role::TYPE, identifier, Action::Write))?;
		let dn = self.role_name(identifier)?;

		let mut connection = self.store.open().await?;
		let result = connection.delete(&dn).await;
		Store::release(connection).await;
		Ok(result?)
	}

	/// Get a role. Members the caller may not read are left out.
	pub async fn get_role(&self, caller: &dyn Authorizer, identifier: &str) -> Result<Role, Error> {
		debug!("Getting role: {identifier}");
		caller.check_permission(&Permission::on(Role::TYPE, identifier, Action::Read))?;
		let dn = self.role_name(identifier)?;

		let mut connection = self.store.open().await?;
		let result = connection.read(&dn).await;
		Store::release(connection).await;

		let mut role: Role = self.store.mapper.from_attributes(&result?)?;
		role.users = Store::visible(caller, User::TYPE, role.users);
		debug!("Got role {identifier}: {role:?}");
		Ok(role)
	}

	/// The identifiers of all roles the caller may read, sorted.
	pub async fn get_role_identifiers(&self, caller: &dyn Authorizer) -> Result<Vec<String>, Error> {
		debug!("Getting all role identifiers");
		let names = self.store.mapper.names();
		let base = names.subtree_name(Role::TYPE)?.to_string();

		let mut connection = self.store.open().await?;
		let result = connection.list(&base).await;
		Store::release(connection).await;

		let mut identifiers = Vec::new();
		for dn in result? {
			let identifier = names.short_name(&dn, Role::TYPE)?;
			if self.store.admit(caller, &Permission::on(Role::TYPE, &identifier, Action::Read))? {
				identifiers.push(identifier);
			}
		}
		identifiers.sort();
		identifiers.dedup();
		Ok(identifiers)
	}

	/// All roles the caller may read, sorted by identifier. Members are
	/// filtered as in [`RoleRepository::get_role`].
	pub async fn get_roles(&self, caller: &dyn Authorizer) -> Result<Vec<Role>, Error> {
		debug!("Getting all roles");
		let names = self.store.mapper.names();
		let base = names.subtree_name(Role::TYPE)?.to_string();
		let (name, classes) = self.store.mapper.object_class_attribute(Role::TYPE)?;
		let mut matching = Attributes::new();
		matching.insert(name, classes);

		let mut connection = self.store.open().await?;
		let result = connection.search(&base, &matching).await;
		Store::release(connection).await;

		let mut roles = Vec::new();
		for entry in result? {
			let identifier = names.short_name(&entry.dn, Role::TYPE)?;
			if !self.store.admit(caller, &Permission::on(Role::TYPE, &identifier, Action::Read))? {
				continue;
			}
			let mut role: Role = self.store.mapper.from_attributes(&entry.attributes)?;
			role.users = Store::visible(caller, User::TYPE, role.users);
			roles.push(role);
		}
		roles.sort_by(|a, b| a.identifier.cmp(&b.identifier));
		Ok(roles)
	}

	/// Identifiers of all roles `user_dn` is a member of
	async fn member_roles(
		&self,
		connection: &mut dyn Connection,
		user_dn: String,
	) -> Result<BTreeSet<String>, Error> {
		let names = self.store.mapper.names();
		let base = names.subtree_name(Role::TYPE)?.to_string();
		let matching = self.membership(user_dn)?;
		let mut roles = BTreeSet::new();
		for entry in connection.search(&base, &matching).await? {
			roles.insert(names.short_name(&entry.dn, Role::TYPE)?);
		}
		Ok(roles)
	}

	/// The roles of a user that the caller may read, sorted.
	///
	/// Requires read access to the user.
	pub async fn get_roles_for_user(
		&self,
		caller: &dyn Authorizer,
		user: &str,
	) -> Result<Vec<String>, Error> {
		debug!("Getting roles for user: {user}");
		caller.check_permission(&Permission::on(User::TYPE, user, Action::Read))?;
		let user_dn = self.user_name(user)?;

		let mut connection = self.store.open().await?;
		let result = self.member_roles(connection.as_mut(), user_dn).await;
		Store::release(connection).await;

		let mut roles = Vec::new();
		for role in result? {
			if self.store.admit(caller, &Permission::on(Role::TYPE, &role, Action::Read))? {
				roles.push(role);
			}
		}
		Ok(roles)
	}

	/// The roles of a user, without any permission check.
	pub async fn get_roles_for_user_unsecured(&self, user: &str) -> Result<BTreeSet<String>, Error> {
		info!("Getting roles for user (unsecured!): {user}");
		let user_dn = self.user_name(user)?;

		let mut connection = self.store.open().await?;
		let result = self.member_roles(connection.as_mut(), user_dn).await;
		Store::release(connection).await;
		result
	}

	/// Make the user a member of exactly the given roles.
	///
	/// Requires write access to the user and to every role joined or left.
	/// Memberships in roles the caller may not read are kept.
	pub async fn set_roles_for_user(
		&self,
		caller: &dyn Authorizer,
		user: &str,
		roles: &[String],
	) -> Result<(), Error> {
		debug!("Setting roles for user {user}: {roles:?}");
		caller.check_permission(&Permission::on(User::TYPE, user, Action::Write))?;
		let user_dn = self.user_name(user)?;
		let desired: BTreeSet<String> = roles.iter().cloned().collect();
		for role in &desired {
			self.role_name(role)?;
		}

		let mut connection = self.store.open().await?;
		let result = self.relink_user(connection.as_mut(), caller, user_dn, &desired).await;
		Store::release(connection).await;
		result
	}

	/// Apply the membership changes of a user
	async fn relink_user(
		&self,
		connection: &mut dyn Connection,
		caller: &dyn Authorizer,
		user_dn: String,
		desired: &BTreeSet<String>,
	) -> Result<(), Error> {
		let current = self.member_roles(connection, user_dn.clone()).await?;
		let changes = Changes::between(&current, desired, |role| {
			caller.is_permitted(&Permission::on(Role::TYPE, role, Action::Read))
		});
		changes.check(caller, Role::TYPE)?;

		let membership = self.membership(user_dn)?;
		for role in &changes.added {
			Store::link(connection, &self.role_name(role)?, Modification::Add, &membership).await?;
		}
		for role in &changes.removed {
			Store::link(connection, &self.role_name(role)?, Modification::Remove, &membership)
				.await?;
		}
		debug!("Joined {:?}, left {:?}", changes.added, changes.removed);
		Ok(())
	}

	/// Replace all attributes of a role, including its members.
	///
	/// Requires write access to the role and to every member added or
	/// removed. Members the caller may not read are kept.
	pub async fn update_role(&self, caller: &dyn Authorizer, role: &Role) -> Result<(), Error> {
		debug!("Updating role: {}", role.identifier);
		self.replace(caller, role, true).await
	}

	/// Replace the attributes of a role, leaving its members untouched.
	pub async fn update_role_no_users(
		&self,
		caller: &dyn Authorizer,
		role: &Role,
	) -> Result<(), Error> {
		debug!("Updating role without users: {}", role.identifier);
		caller.check_permission(&Permission::on(Role::TYPE, &role.identifier, Action::Write))?;
		let dn = self.store.mapper.names().qualified_name_of(role)?.to_string();
		let attributes = self.attributes(role, false)?;

		let mut connection = self.store.open().await?;
		let result = connection.modify(&dn, Modification::Replace, &attributes).await;
		Store::release(connection).await;
		Ok(result?)
	}

	/// Replace only the members of a role.
	///
	/// Requires write access to the role and to every member added or
	/// removed. Members the caller may not read are kept.
	pub async fn update_role_users(&self, caller: &dyn Authorizer, role: &Role) -> Result<(), Error> {
		debug!("Updating users of role: {}", role.identifier);
		self.replace(caller, role, false).await
	}

	/// Replace the attributes of a role after checking the membership changes
	async fn replace(
		&self,
		caller: &dyn Authorizer,
		role: &Role,
		everything: bool,
	) -> Result<(), Error> {
		caller.check_permission(&Permission::on(Role::TYPE, &role.identifier, Action::Write))?;
		let dn = self.store.mapper.names().qualified_name_of(role)?.to_string();

		let mut connection = self.store.open().await?;
		let result = self.replace_on(connection.as_mut(), caller, &dn, role, everything).await;
		Store::release(connection).await;
		result
	}

	/// Replace the attributes of the role at `dn`
	async fn replace_on(
		&self,
		connection: &mut dyn Connection,
		caller: &dyn Authorizer,
		dn: &str,
		role: &Role,
		everything: bool,
	) -> Result<(), Error> {
		let current = self.current_users(connection, dn).await?;
		let desired: BTreeSet<String> = role.users.iter().cloned().collect();
		let changes = Changes::between(&current, &desired, |user| {
			caller.is_permitted(&Permission::on(User::TYPE, user, Action::Read))
		});
		changes.check(caller, User::TYPE)?;

		let updated = Role { users: changes.merged(&desired), ..role.clone() };
		let attributes = if everything {
			self.attributes(&updated, true)?
		} else {
			self.store.mapper.to_attributes_filtered(&updated, true, &[Role::USERS])?
		};
		Ok(connection.modify(dn, Modification::Replace, &attributes).await?)
	}

	/// The current members of the role at `dn`
	async fn current_users(
		&self,
		connection: &mut dyn Connection,
		dn: &str,
	) -> Result<BTreeSet<String>, Error> {
		let attributes = connection.read(dn).await?;
		let role: Role = self.store.mapper.from_attributes_filtered(&attributes, true, &[Role::USERS])?;
		Ok(role.users.into_iter().collect())
	}

	/// Make exactly the given users members of a role.
	///
	/// Requires write access to the role and to every user joining or
	/// leaving. Members the caller may not read are kept.
	pub async fn set_role_users(
		&self,
		caller: &dyn Authorizer,
		role: &str,
		users: &[String],
	) -> Result<(), Error> {
		debug!("Setting users of role {role}: {users:?}");
		caller.check_permission(&Permission::on(Role::TYPE, role, Action::Write))?;
		let dn = self.role_name(role)?;
		let desired: BTreeSet<String> = users.iter().cloned().collect();
		for user in &desired {
			self.user_name(user)?;
		}

		let mut connection = self.store.open().await?;
		let result = self.relink_role(connection.as_mut(), caller, &dn, &desired).await;
		Store::release(connection).await;
		result
	}

	/// Apply the membership changes of a role
	async fn relink_role(
		&self,
		connection: &mut dyn Connection,
		caller: &dyn Authorizer,
		dn: &str,
		desired: &BTreeSet<String>,
	) -> Result<(), Error> {
		let current = self.current_users(connection, dn).await?;
		let changes = Changes::between(&current, desired, |user| {
			caller.is_permitted(&Permission::on(User::TYPE, user, Action::Read))
		});
		changes.check(caller, User::TYPE)?;

		for user in &changes.added {
			let membership = self.membership(self.user_name(user)?)?;
			Store::link(connection, dn, Modification::Add, &membership).await?;
		}
		for user in &changes.removed {
			let membership = self.membership(self.user_name(user)?)?;
			Store::link(connection, dn, Modification::Remove, &membership).await?;
		}
		debug!("Added {:?}, removed {:?}", changes.added, changes.removed);
		Ok(())
	}

	/// The members of a role that the caller may read, sorted.
	///
	/// Requires read access to the role.
	pub async fn get_role_users(
		&self,
		caller: &dyn Authorizer,
		role: &str,
	) -> Result<Vec<String>, Error> {
		debug!("Getting users of role: {role}");
		caller.check_permission(&Permission::on(Role::TYPE, role, Action::Read))?;
		let dn = self.role_name(role)?;

		let mut connection = self.store.open().await?;
		let result = self.current_users(connection.as_mut(), &dn).await;
		Store::release(connection).await;

		let mut users = Vec::new();
		for user in result? {
			if self.store.admit(caller, &Permission::on(User::TYPE, &user, Action::Read))? {
				users.push(user);
			}
		}
		Ok(users)
	}
}
