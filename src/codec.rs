//! Conversion of single properties to and from attribute values.
use tracing::debug;

use crate::{
	convert::ConversionError,
	error::MappingError,
	model::{Entity, PropertyDescriptor},
	name::NameResolver,
};

/// Converts property values, rewriting references to other entities between
/// identifiers and names.
#[derive(Debug, Clone)]
pub struct AttributeCodec {
	/// Used for relation properties
	names: NameResolver,
}

impl AttributeCodec {
	/// Create a codec resolving relations through `names`.
	#[must_use]
	pub fn new(names: NameResolver) -> Self {
		Self { names }
	}

	/// The attribute values of `property` of `entity`.
	pub fn encode<E: Entity>(
		&self,
		property: &PropertyDescriptor<E>,
		entity: &E,
	) -> Result<Vec<String>, MappingError> {
		let values = property.values(entity).map_err(|source| MappingError::ConversionFailed {
			property: format!("{}.{}", E::TYPE.name, property.name()),
			source,
		})?;
		match property.kind().related() {
			Some(target) => values
				.iter()
				.map(|identifier| {
					self.names.qualified_name(identifier, *target).map(|dn| dn.to_string())
				})
				.collect(),
			None => Ok(values),
		}
	}

	/// Assign attribute values to `property` of `entity`.
	///
	/// Either all values are assigned or, on error, none of them.
	pub fn decode<E: Entity>(
		&self,
		property: &PropertyDescriptor<E>,
		entity: &mut E,
		values: &[String],
	) -> Result<(), MappingError> {
		let failed = |source: ConversionError| MappingError::ConversionFailed {
			property: format!("{}.{}", E::TYPE.name, property.name()),
			source,
		};
		let identifiers;
		let values = match property.kind().related() {
			Some(target) => {
				identifiers = values
					.iter()
					.map(|dn| match self.names.short_name(dn, *target) {
						Err(MappingError::InvalidName(err)) => Err(failed(ConversionError::from(err))),
						other => other,
					})
					.collect::<Result<Vec<_>, _>>()?;
				debug!("Resolved {}.{} to {identifiers:?}", E::TYPE.name, property.name());
				identifiers.as_slice()
			}
			None => values,
		};
		property.assign(entity, values).map_err(failed)
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use std::{collections::HashMap, sync::Arc};

	use super::AttributeCodec;
	use crate::{
		config::MappingConfig,
		convert::ConversionError,
		domain::Role,
		error::MappingError,
		mapping::MappingTables,
		model::Entity,
		name::NameResolver,
	};

	fn codec() -> AttributeCodec {
		let config = MappingConfig {
			object_classes: HashMap::new(),
			attributes: HashMap::from([
				("role.identifier".to_owned(), vec!["cn".to_owned()]),
				("user.identifier".to_owned(), vec!["cn".to_owned()]),
			]),
			subtrees: HashMap::from([("user".to_owned(), "ou=users,dc=example".to_owned())]),
		};
		AttributeCodec::new(NameResolver::new(Arc::new(MappingTables::new(&config).unwrap())))
	}

	#[test]
	fn relations_are_rewritten() -> Result<(), Box<dyn std::error::Error>> {
		let codec = codec();
		let users = Role::descriptor().property(Role::USERS).unwrap();
		let mut role = Role::new("admins");
		role.users = vec!["alice".to_owned(), "bob".to_owned()];
		assert_eq!(
			codec.encode(users, &role)?,
			["cn=alice,ou=users,dc=example", "cn=bob,ou=users,dc=example"]
		);

		let mut decoded = Role::default();
		codec.decode(users, &mut decoded, &["cn=carol,ou=users,dc=example".to_owned()])?;
		assert_eq!(decoded.users, ["carol"]);
		Ok(())
	}

	#[test]
	fn failures_abort_the_property() {
		let codec = codec();
		let users = Role::descriptor().property(Role::USERS).unwrap();
		let mut role = Role::default();
		let values = ["cn=alice,ou=users,dc=example".to_owned(), "not a name".to_owned()];
		let err = codec.decode(users, &mut role, &values).unwrap_err();
		assert!(
			matches!(
				&err,
				MappingError::ConversionFailed { property, source: ConversionError::Reference(_) }
					if property == "role.users"
			),
			"{err:?}"
		);
		assert!(role.users.is_empty());

		let mut role = Role::new("admins");
		role.users = vec!["alice".to_owned(), String::new()];
		assert!(matches!(codec.encode(users, &role), Err(MappingError::InvalidName(_))));
	}
}
