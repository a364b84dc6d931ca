//! Authentication of users against the directory.
use std::sync::Arc;

use tracing::debug;

use crate::{
	directory::Directory,
	domain::User,
	error::{Error, MappingError},
	model::Entity,
	name::NameResolver,
	permission::{PermissionResolver, Subject},
	repository::RoleRepository,
};

/// Authenticates users by binding as them and resolves what they may do.
#[derive(Debug, Clone)]
pub struct Realm {
	/// Checks credentials
	directory: Arc<dyn Directory>,
	/// Builds user names
	names: NameResolver,
	/// Looks up role memberships
	roles: RoleRepository,
	/// Turns roles into permissions
	permissions: PermissionResolver,
}

impl Realm {
	/// Create a realm.
	#[must_use]
	pub fn new(
		directory: Arc<dyn Directory>,
		names: NameResolver,
		roles: RoleRepository,
		permissions: PermissionResolver,
	) -> Self {
		Self { directory, names, roles, permissions }
	}

	/// Check the password of `principal` and build its subject.
	pub async fn authenticate(&self, principal: &str, password: &str) -> Result<Subject, Error> {
		debug!("Authenticating {principal}");
		// An empty password makes the bind unauthenticated, which servers accept
		if password.is_empty() {
			return Err(Error::AuthenticationFailed(principal.to_owned()));
		}
		let dn = match self.names.qualified_name(principal, User::TYPE) {
			Ok(dn) => dn.to_string(),
			Err(MappingError::InvalidName(err)) => {
				debug!("Rejected principal {principal:?}: {err}");
				return Err(Error::AuthenticationFailed(principal.to_owned()));
			}
			Err(err) => return Err(err.into()),
		};
		if !self.directory.authenticate(&dn, password).await? {
			debug!("Credentials of {principal} rejected");
			return Err(Error::AuthenticationFailed(principal.to_owned()));
		}
		self.authorize(principal).await
	}

	/// Build the subject of `principal` without checking credentials.
	pub async fn authorize(&self, principal: &str) -> Result<Subject, Error> {
		let roles = self.roles.get_roles_for_user_unsecured(principal).await?;
		debug!("Roles of {principal}: {roles:?}");
		Ok(self.permissions.subject(principal, roles))
	}
}
