//! Permission-checked access to the roles and users stored in the directory.
//!
//! Every operation takes the caller as an explicit [`Authorizer`], checks the
//! permissions it needs before talking to the directory, and uses a
//! connection of its own which is closed again on every path.
use std::{collections::BTreeSet, sync::Arc};

use tracing::{debug, warn};

use crate::{
	directory::{Connection, Directory, DirectoryError, Modification},
	entry::Attributes,
	error::Error,
	mapper::EntityMapper,
	model::EntityType,
	permission::{Action, Authorizer, ListPolicy, Permission},
};

mod role;
mod user;

pub use role::RoleRepository;
pub use user::UserRepository;

/// State shared by the repositories.
#[derive(Debug, Clone)]
pub(crate) struct Store {
	/// Where the entries live
	directory: Arc<dyn Directory>,
	/// Maps entities to entries
	mapper: EntityMapper,
	/// What to do with unreadable entries when listing
	policy: ListPolicy,
}

impl Store {
	/// Create the shared state.
	pub(crate) fn new(directory: Arc<dyn Directory>, mapper: EntityMapper, policy: ListPolicy) -> Self {
		Self { directory, mapper, policy }
	}

	/// Open a connection for a single operation.
	async fn open(&self) -> Result<Box<dyn Connection>, Error> {
		Ok(self.directory.connect().await?)
	}

	/// Close a connection, logging failures.
	async fn release(mut connection: Box<dyn Connection>) {
		if let Err(err) = connection.close().await {
			warn!("Could not close directory connection: {err}");
		}
	}

	/// Whether a listed entry requiring `permission` is part of the result.
	fn admit(&self, caller: &dyn Authorizer, permission: &Permission) -> Result<bool, Error> {
		if caller.is_permitted(permission) {
			return Ok(true);
		}
		match self.policy {
			ListPolicy::FilterUnauthorized => {
				debug!("Filtered out {permission}");
				Ok(false)
			}
			ListPolicy::Deny => Err(Error::AuthorizationDenied(permission.to_string())),
		}
	}

	/// The identifiers of `entity_type` the caller may read, sorted and
	/// without duplicates. Unreadable identifiers are left out regardless of
	/// the list policy.
	fn visible(
		caller: &dyn Authorizer,
		entity_type: EntityType,
		identifiers: impl IntoIterator<Item = String>,
	) -> Vec<String> {
		let visible: BTreeSet<String> = identifiers
			.into_iter()
			.filter(|id| caller.is_permitted(&Permission::on(entity_type, id, Action::Read)))
			.collect();
		visible.into_iter().collect()
	}

	/// Add or remove a single link, treating an already converged state as
	/// success.
	async fn link(
		connection: &mut dyn Connection,
		dn: &str,
		modification: Modification,
		attributes: &Attributes,
	) -> Result<(), Error> {
		match (modification, connection.modify(dn, modification, attributes).await) {
			(_, Ok(())) => Ok(()),
			(Modification::Add, Err(DirectoryError::ValueExists(_)))
			| (Modification::Remove, Err(DirectoryError::NoSuchValue(_))) => {
				debug!("Link on {dn} is already in place");
				Ok(())
			}
			(_, Err(err)) => Err(err.into()),
		}
	}
}

/// Difference between the current and the desired links of an entity.
///
/// Current links the caller may not read are never removed, so editing a
/// partial view keeps the hidden part intact.
#[derive(Debug, Default, PartialEq, Eq)]
struct Changes {
	/// Links to create
	added: Vec<String>,
	/// Links to remove
	removed: Vec<String>,
	/// Current links hidden from the caller
	hidden: Vec<String>,
}

impl Changes {
	/// Compute the changes from `current` to `desired`, `visible` telling
	/// which current links the caller can see.
	fn between(
		current: &BTreeSet<String>,
		desired: &BTreeSet<String>,
		visible: impl Fn(&str) -> bool,
	) -> Self {
		let mut changes = Self { added: desired.difference(current).cloned().collect(), ..Self::default() };
		for link in current.difference(desired) {
			if visible(link) {
				changes.removed.push(link.clone());
			} else {
				changes.hidden.push(link.clone());
			}
		}
		changes
	}

	/// Require write access on every linked entity that changes.
	fn check(&self, caller: &dyn Authorizer, linked: EntityType) -> Result<(), Error> {
		for identifier in self.added.iter().chain(&self.removed) {
			caller.check_permission(&Permission::on(linked, identifier, Action::Write))?;
		}
		Ok(())
	}

	/// The links after applying the changes: the desired ones plus the hidden
	/// ones.
	fn merged(&self, desired: &BTreeSet<String>) -> Vec<String> {
		desired.iter().chain(&self.hidden).cloned().collect::<BTreeSet<_>>().into_iter().collect()
	}
}
