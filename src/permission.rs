//! Wildcard permissions and the checks performed before directory access.
//!
//! Permissions consist of parts separated by `:`, each part being a set of
//! alternatives separated by `,`. A `*` part matches anything, and a granted
//! permission with fewer parts implies all permissions that extend it, so
//! `role:*` implies `role:admins:write`. Matching ignores case.
use std::{
	collections::{BTreeSet, HashMap},
	fmt,
	str::FromStr,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{config::AuthorizationConfig, error::Error, model::EntityType};

/// Part that matches anything
const WILDCARD: &str = "*";
/// Placeholder for the authenticated user in permission templates
const USER_PLACEHOLDER: &str = "${user}";
/// Placeholder expanded once per role in permission templates
const ROLES_PLACEHOLDER: &str = "${roles}";

/// A permission string that cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid permission {permission:?}: {reason}")]
pub struct PermissionError {
	/// The rejected input
	pub permission: String,
	/// What is wrong with it
	pub reason: &'static str,
}

impl From<PermissionError> for Error {
	fn from(error: PermissionError) -> Self {
		Self::Invalid(error.to_string())
	}
}

/// The operation a permission is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
	/// Reading an entity
	Read,
	/// Creating, changing or deleting an entity
	Write,
	/// Changing a single aspect of an entity, such as a password
	Modify,
}

impl Action {
	/// The action as it appears in permission strings
	#[must_use]
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Read => "read",
			Self::Write => "write",
			Self::Modify => "modify",
		}
	}
}

/// One `:`-separated part of a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
	/// Matches anything
	Any,
	/// Matches the listed values only. A `*` in here is a literal identifier.
	Literal(BTreeSet<String>),
}

impl Part {
	/// A part matching exactly `value`
	fn single(value: &str) -> Self {
		Self::Literal(BTreeSet::from([value.to_lowercase()]))
	}

	/// Whether everything matched by `other` is matched by this part.
	fn covers(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Any, _) => true,
			(Self::Literal(_), Self::Any) => false,
			(Self::Literal(values), Self::Literal(requested)) => values.is_superset(requested),
		}
	}
}

/// A wildcard permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permission(Vec<Part>);

impl Permission {
	/// Parse a permission string.
	pub fn parse(permission: &str) -> Result<Self, PermissionError> {
		permission.parse()
	}

	/// The permission to perform `action` on the entity `identifier` of
	/// `entity_type`.
	///
	/// The parts are assembled directly, so separators and wildcards inside
	/// `identifier` are part of the identifier.
	#[must_use]
	pub fn scoped(entity_type: &str, identifier: &str, action: Action) -> Self {
		Self([entity_type, identifier, action.as_str()].into_iter().map(Part::single).collect())
	}

	/// Shorthand for [`Permission::scoped`] with an entity type.
	#[must_use]
	pub fn on(entity_type: EntityType, identifier: &str, action: Action) -> Self {
		Self::scoped(entity_type.name, identifier, action)
	}

	/// Whether holding this permission grants `other`.
	#[must_use]
	pub fn implies(&self, other: &Self) -> bool {
		for (i, other_part) in other.0.iter().enumerate() {
			let Some(part) = self.0.get(i) else {
				return true;
			};
			if !part.covers(other_part) {
				return false;
			}
		}
		self.0.iter().skip(other.0.len()).all(|part| *part == Part::Any)
	}

	/// Replace `placeholder` in every alternative with `value`. The result is
	/// always literal, even if `value` is a wildcard.
	fn substitute(&self, placeholder: &str, value: &str) -> Self {
		let value = value.to_lowercase();
		Self(
			self.0
				.iter()
				.map(|part| match part {
					Part::Any => Part::Any,
					Part::Literal(values) => Part::Literal(
						values.iter().map(|sub| sub.replace(placeholder, &value)).collect(),
					),
				})
				.collect(),
		)
	}

	/// Whether any alternative mentions `placeholder`
	fn mentions(&self, placeholder: &str) -> bool {
		self.0.iter().any(|part| match part {
			Part::Any => false,
			Part::Literal(values) => values.iter().any(|sub| sub.contains(placeholder)),
		})
	}
}

impl FromStr for Permission {
	type Err = PermissionError;

	fn from_str(permission: &str) -> Result<Self, Self::Err> {
		let error = |reason| PermissionError { permission: permission.to_owned(), reason };
		let trimmed = permission.trim();
		if trimmed.is_empty() {
			return Err(error("empty permission"));
		}

		let mut parts = Vec::new();
		for part in trimmed.split(':') {
			let subparts: BTreeSet<String> = part
				.split(',')
				.map(str::trim)
				.filter(|sub| !sub.is_empty())
				.map(str::to_lowercase)
				.collect();
			if subparts.is_empty() {
				return Err(error("part without content"));
			}
			if subparts.contains(WILDCARD) {
				parts.push(Part::Any);
			} else {
				parts.push(Part::Literal(subparts));
			}
		}
		Ok(Self(parts))
	}
}

impl fmt::Display for Permission {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for (i, part) in self.0.iter().enumerate() {
			if i > 0 {
				f.write_str(":")?;
			}
			match part {
				Part::Any => f.write_str(WILDCARD)?,
				Part::Literal(values) => {
					for (j, sub) in values.iter().enumerate() {
						if j > 0 {
							f.write_str(",")?;
						}
						f.write_str(sub)?;
					}
				}
			}
		}
		Ok(())
	}
}

/// The identity on whose behalf an operation is performed.
pub trait Authorizer: Send + Sync {
	/// Whether the caller holds `permission`.
	fn is_permitted(&self, permission: &Permission) -> bool;

	/// Fail with [`Error::AuthorizationDenied`] unless the caller holds
	/// `permission`.
	fn check_permission(&self, permission: &Permission) -> Result<(), Error> {
		if self.is_permitted(permission) {
			Ok(())
		} else {
			debug!("Denied {permission}");
			Err(Error::AuthorizationDenied(permission.to_string()))
		}
	}
}

/// What listing operations do with entries the caller may not read
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListPolicy {
	/// Leave them out of the result, hiding their existence
	#[default]
	FilterUnauthorized,
	/// Fail the whole operation
	Deny,
}

/// An authenticated principal with its roles and permissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
	/// The identifier of the user
	principal: String,
	/// Identifiers of the roles the user is a member of
	roles: BTreeSet<String>,
	/// Everything the user may do
	permissions: Vec<Permission>,
}

impl Subject {
	/// Create a subject holding the given permissions.
	#[must_use]
	pub fn new(
		principal: impl Into<String>,
		roles: impl IntoIterator<Item = String>,
		permissions: Vec<Permission>,
	) -> Self {
		Self { principal: principal.into(), roles: roles.into_iter().collect(), permissions }
	}

	/// The identifier of the user
	#[must_use]
	pub fn principal(&self) -> &str {
		&self.principal
	}

	/// The roles of the user
	#[must_use]
	pub fn roles(&self) -> &BTreeSet<String> {
		&self.roles
	}

	/// The permissions of the user
	#[must_use]
	pub fn permissions(&self) -> &[Permission] {
		&self.permissions
	}

	/// Whether the user is a member of `role`
	#[must_use]
	pub fn has_role(&self, role: &str) -> bool {
		self.roles.contains(role)
	}
}

impl Authorizer for Subject {
	fn is_permitted(&self, permission: &Permission) -> bool {
		self.permissions.iter().any(|granted| granted.implies(permission))
	}
}

/// Resolves the permissions of a user from its identifier and roles.
#[derive(Debug, Clone, Default)]
pub struct PermissionResolver {
	/// Permissions granted per role
	role_permissions: HashMap<String, Vec<Permission>>,
	/// Templates granted to every user
	user_permissions: Vec<Permission>,
}

impl PermissionResolver {
	/// Parse all configured permissions.
	pub fn new(config: &AuthorizationConfig) -> Result<Self, PermissionError> {
		let mut role_permissions = HashMap::new();
		for (role, permissions) in &config.role_permissions {
			let permissions = permissions
				.iter()
				.map(|permission| Permission::parse(permission))
				.collect::<Result<Vec<_>, _>>()?;
			role_permissions.insert(role.clone(), permissions);
		}
		let user_permissions = config
			.user_permissions
			.iter()
			.filter(|template| !template.starts_with('#'))
			.map(|template| Permission::parse(template))
			.collect::<Result<Vec<_>, _>>()?;
		Ok(Self { role_permissions, user_permissions })
	}

	/// All permissions of `principal` as a member of `roles`.
	#[must_use]
	pub fn resolve(&self, principal: &str, roles: &BTreeSet<String>) -> Vec<Permission> {
		let mut permissions = Vec::new();
		for template in &self.user_permissions {
			let permission = template.substitute(USER_PLACEHOLDER, principal);
			if permission.mentions(ROLES_PLACEHOLDER) {
				permissions
					.extend(roles.iter().map(|role| permission.substitute(ROLES_PLACEHOLDER, role)));
			} else {
				permissions.push(permission);
			}
		}
		for role in roles {
			if let Some(granted) = self.role_permissions.get(role) {
				permissions.extend(granted.iter().cloned());
			}
		}
		debug!(
			"Found permissions for principal {principal}: {}",
			permissions.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
		);
		permissions
	}

	/// Build the subject for `principal` as a member of `roles`.
	#[must_use]
	pub fn subject(&self, principal: &str, roles: BTreeSet<String>) -> Subject {
		let permissions = self.resolve(principal, &roles);
		Subject { principal: principal.to_owned(), roles, permissions }
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use std::collections::{BTreeSet, HashMap};

	use super::{Action, Authorizer, Permission, PermissionResolver, Subject};
	use crate::{config::AuthorizationConfig, error::Error};

	fn implies(granted: &str, requested: &str) -> bool {
		Permission::parse(granted).unwrap().implies(&Permission::parse(requested).unwrap())
	}

	#[test]
	fn wildcard_matching() {
		assert!(implies("role:*:read", "role:admins:read"));
		assert!(implies("role", "role:admins:write"), "Shorter permissions imply longer ones");
		assert!(implies("role:admins", "role:admins:read"));
		assert!(implies("role:admins,users:read", "role:users:read"));
		assert!(implies("Role:Admins:READ", "role:admins:read"), "Matching ignores case");
		assert!(implies("*", "user:alice:write"));
		assert!(implies("role:admins:*:*", "role:admins"), "Trailing wildcards are implied");
		assert!(implies("role:admins,*:read", "role:users:read"));

		assert!(!implies("role:admins:read", "role:admins:write"));
		assert!(!implies("role:admins:read", "role:admins"));
		assert!(!implies("role:admins:read", "user:admins:read"));
		assert!(!implies("role:admins:read", "role:admins,users:read"));
		assert!(!implies("role:admins:read", "role:*:read"));
	}

	#[test]
	fn scoped_identifiers_cannot_add_parts() -> Result<(), Box<dyn std::error::Error>> {
		let granted = Permission::parse("role:a:read")?;
		assert!(granted.implies(&Permission::scoped("role", "A", Action::Read)));
		assert!(!granted.implies(&Permission::scoped("role", "a:read", Action::Write)));
		assert!(!granted.implies(&Permission::scoped("role", "a,b", Action::Read)));
		assert_eq!(Permission::scoped("user", "alice", Action::Modify).to_string(), "user:alice:modify");
		Ok(())
	}

	#[test]
	fn invalid_permissions() {
		for permission in ["", "  ", "role::read", "role:,:read", ":"] {
			assert!(Permission::parse(permission).is_err(), "{permission:?} should be rejected");
		}
	}

	#[test]
	fn subject_checks() {
		let subject = Subject::new("alice", Vec::new(), vec![Permission::parse("role:a:read").unwrap()]);
		assert!(subject.check_permission(&Permission::scoped("role", "a", Action::Read)).is_ok());
		let denied = subject.check_permission(&Permission::scoped("role", "b", Action::Read));
		assert!(matches!(denied, Err(Error::AuthorizationDenied(p)) if p == "role:b:read"));
	}

	#[test]
	fn resolve_templates() -> Result<(), Box<dyn std::error::Error>> {
		let config = AuthorizationConfig {
			role_permissions: HashMap::from([(
				"admins".to_owned(),
				vec!["role:*".to_owned(), "user:*".to_owned()],
			)]),
			user_permissions: vec![
				"# every user may read itself".to_owned(),
				"user:${user}:read".to_owned(),
				"password:${user}:modify".to_owned(),
				"role:${roles}:read".to_owned(),
			],
		};
		let resolver = PermissionResolver::new(&config)?;
		let roles = BTreeSet::from(["admins".to_owned(), "staff".to_owned()]);
		let granted: Vec<String> =
			resolver.resolve("Alice", &roles).iter().map(ToString::to_string).collect();
		assert_eq!(
			granted,
			[
				"user:alice:read",
				"password:alice:modify",
				"role:admins:read",
				"role:staff:read",
				"role:*",
				"user:*"
			]
		);

		let subject = resolver.subject("bob", BTreeSet::new());
		assert!(subject.is_permitted(&Permission::scoped("user", "bob", Action::Read)));
		assert!(!subject.is_permitted(&Permission::scoped("role", "staff", Action::Read)));
		Ok(())
	}

	#[test]
	fn substituted_identifiers_stay_literal() -> Result<(), Box<dyn std::error::Error>> {
		let config = AuthorizationConfig {
			role_permissions: HashMap::new(),
			user_permissions: vec!["user:${user}:write".to_owned(), "role:${roles}:read".to_owned()],
		};
		let resolver = PermissionResolver::new(&config)?;

		let subject = resolver.subject("*", BTreeSet::from(["*".to_owned()]));
		assert!(subject.is_permitted(&Permission::scoped("user", "*", Action::Write)));
		assert!(subject.is_permitted(&Permission::scoped("role", "*", Action::Read)));
		assert!(!subject.is_permitted(&Permission::scoped("user", "bob", Action::Write)));
		assert!(!subject.is_permitted(&Permission::scoped("role", "admins", Action::Read)));
		assert!(!subject.is_permitted(&Permission::parse("user:*:write")?));

		let subject = resolver.subject("carol", BTreeSet::new());
		assert!(subject.is_permitted(&Permission::scoped("user", "carol", Action::Write)));
		assert!(!subject.is_permitted(&Permission::scoped("user", "*", Action::Write)));
		Ok(())
	}

	#[test]
	fn invalid_configuration_is_rejected() {
		let config = AuthorizationConfig {
			role_permissions: HashMap::from([("admins".to_owned(), vec!["role::".to_owned()])]),
			user_permissions: Vec::new(),
		};
		assert!(PermissionResolver::new(&config).is_err());
	}
}
