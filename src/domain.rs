//! The users and roles managed in the directory.
use std::sync::OnceLock;

use crate::model::{Entity, EntityDescriptor, EntityType, PropertyDescriptor};

/// A named group of users.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Role {
	/// Unique name of the role
	pub identifier: String,
	/// Human readable name
	pub display_name: Option<String>,
	/// Identifiers of the member users
	pub users: Vec<String>,
}

impl Role {
	/// Name of the property holding the members
	pub const USERS: &'static str = "users";

	/// Create a role without members.
	#[must_use]
	pub fn new(identifier: impl Into<String>) -> Self {
		Self { identifier: identifier.into(), ..Self::default() }
	}
}

impl Entity for Role {
	const TYPE: EntityType = EntityType { name: "role", key: Some("identifier") };

	fn descriptor() -> &'static EntityDescriptor<Self> {
		static DESCRIPTOR: OnceLock<EntityDescriptor<Role>> = OnceLock::new();
		DESCRIPTOR.get_or_init(|| {
			EntityDescriptor::new(vec![
				PropertyDescriptor::single(
					"identifier",
					|role: &Role| &role.identifier,
					|role, value| role.identifier = value,
				),
				PropertyDescriptor::optional(
					"displayName",
					|role: &Role| role.display_name.as_ref(),
					|role, value| role.display_name = value,
				),
				PropertyDescriptor::collection(
					Role::USERS,
					|role: &Role| &role.users,
					|role, value| role.users.push(value),
				)
				.relation(User::TYPE),
			])
		})
	}
}

/// A person that can log in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
	/// Unique login name
	pub identifier: String,
	/// Full name for display
	pub display_name: Option<String>,
	/// Given name
	pub first_name: Option<String>,
	/// Family name
	pub last_name: Option<String>,
	/// E-mail address
	pub mail: Option<String>,
}

impl User {
	/// Name of the mapping key for the password attribute
	pub const PASSWORD: &'static str = "password";

	/// Create a user with only an identifier.
	#[must_use]
	pub fn new(identifier: impl Into<String>) -> Self {
		Self { identifier: identifier.into(), ..Self::default() }
	}
}

impl Entity for User {
	const TYPE: EntityType = EntityType { name: "user", key: Some("identifier") };

	fn descriptor() -> &'static EntityDescriptor<Self> {
		static DESCRIPTOR: OnceLock<EntityDescriptor<User>> = OnceLock::new();
		DESCRIPTOR.get_or_init(|| {
			EntityDescriptor::new(vec![
				PropertyDescriptor::single(
					"identifier",
					|user: &User| &user.identifier,
					|user, value| user.identifier = value,
				),
				PropertyDescriptor::optional(
					"displayName",
					|user: &User| user.display_name.as_ref(),
					|user, value| user.display_name = value,
				),
				PropertyDescriptor::optional(
					"firstName",
					|user: &User| user.first_name.as_ref(),
					|user, value| user.first_name = value,
				),
				PropertyDescriptor::optional(
					"lastName",
					|user: &User| user.last_name.as_ref(),
					|user, value| user.last_name = value,
				),
				PropertyDescriptor::optional(
					"mail",
					|user: &User| user.mail.as_ref(),
					|user, value| user.mail = value,
				),
			])
		})
	}
}
