//! Conversion between entity identifiers and distinguished names.
//!
//! An entity named `admins` of a type stored below `ou=roles,dc=example`
//! with the key attribute `cn` lives at `cn=admins,ou=roles,dc=example`.
use std::sync::Arc;

use crate::{
	dn::{DistinguishedName, Rdn},
	error::MappingError,
	mapping::MappingTables,
	model::{Entity, EntityType},
};

/// Builds names from identifiers and reduces names to identifiers.
#[derive(Debug, Clone)]
pub struct NameResolver {
	/// The configured mapping
	tables: Arc<MappingTables>,
}

impl NameResolver {
	/// Create a resolver using the given mapping.
	#[must_use]
	pub fn new(tables: Arc<MappingTables>) -> Self {
		Self { tables }
	}

	/// Attribute names configured for the key of `entity_type`, the first one
	/// being used to build names.
	pub fn key_attributes(&self, entity_type: EntityType) -> Result<&[String], MappingError> {
		let key = entity_type
			.key
			.ok_or_else(|| MappingError::Unmapped { entity: entity_type.name, what: "key".to_owned() })?;
		self.tables.attributes(entity_type.name, key).ok_or_else(|| MappingError::Unmapped {
			entity: entity_type.name,
			what: "key attribute".to_owned(),
		})
	}

	/// The base name below which all entries of `entity_type` are stored.
	pub fn subtree_name(&self, entity_type: EntityType) -> Result<&DistinguishedName, MappingError> {
		self.tables
			.subtree(entity_type.name)
			.ok_or_else(|| MappingError::Unmapped { entity: entity_type.name, what: "subtree".to_owned() })
	}

	/// The name of the entity `identifier` of `entity_type`.
	///
	/// Characters with a special meaning in names are escaped, so any
	/// non-empty identifier is accepted.
	pub fn qualified_name(
		&self,
		identifier: &str,
		entity_type: EntityType,
	) -> Result<DistinguishedName, MappingError> {
		let attribute = self.key_attributes(entity_type)?.first().ok_or_else(|| {
			MappingError::Unmapped { entity: entity_type.name, what: "key attribute".to_owned() }
		})?;
		let subtree = self.subtree_name(entity_type)?;
		Ok(subtree.child(Rdn::new(attribute, identifier)?))
	}

	/// The name of `entity`, built from its key property.
	pub fn qualified_name_of<E: Entity>(&self, entity: &E) -> Result<DistinguishedName, MappingError> {
		let entity_type = E::TYPE;
		let key = E::descriptor().key_property().ok_or_else(|| MappingError::Unmapped {
			entity: entity_type.name,
			what: "key property".to_owned(),
		})?;
		if !key.is_key_capable() {
			return Err(MappingError::UnsupportedKey { entity: entity_type.name });
		}

		let values = key.values(entity).map_err(|err| MappingError::ValueAccess {
			entity: entity_type.name,
			property: key.name(),
			reason: err.to_string(),
		})?;
		let [identifier] = values.as_slice() else {
			return Err(MappingError::ValueAccess {
				entity: entity_type.name,
				property: key.name(),
				reason: format!("expected a single key value, found {}", values.len()),
			});
		};
		self.qualified_name(identifier, entity_type)
	}

	/// The identifier named by `dn`.
	///
	/// The most specific component holding one of the key attributes of
	/// `entity_type` provides the identifier. Names without such a component
	/// are returned unchanged.
	pub fn short_name(&self, dn: &str, entity_type: EntityType) -> Result<String, MappingError> {
		let key_attributes = self.key_attributes(entity_type)?;
		let name = DistinguishedName::parse(dn)?;
		let identifier = name
			.rdns()
			.iter()
			.flat_map(|rdn| rdn.assertions())
			.find(|ava| key_attributes.iter().any(|attr| attr.eq_ignore_ascii_case(ava.attr_type())))
			.map_or_else(|| dn.to_owned(), |ava| ava.value().to_owned());
		Ok(identifier)
	}
}

#[cfg(test)]
mod tests {
	#![allow(clippy::unwrap_used)]

	use std::{collections::HashMap, sync::Arc};

	use super::NameResolver;
	use crate::{
		config::MappingConfig,
		domain::{Role, User},
		error::MappingError,
		mapping::MappingTables,
		model::{Entity, EntityType},
	};

	fn resolver() -> NameResolver {
		let config = MappingConfig {
			object_classes: HashMap::new(),
			attributes: HashMap::from([
				("role.identifier".to_owned(), vec!["cn".to_owned()]),
				("user.identifier".to_owned(), vec!["uid".to_owned(), "cn".to_owned()]),
			]),
			subtrees: HashMap::from([
				("role".to_owned(), "ou=roles,dc=example".to_owned()),
				("user".to_owned(), "ou=users,dc=example".to_owned()),
			]),
		};
		NameResolver::new(Arc::new(MappingTables::new(&config).unwrap()))
	}

	#[test]
	fn qualified_names() -> Result<(), Box<dyn std::error::Error>> {
		let names = resolver();
		assert_eq!(names.qualified_name("admins", Role::TYPE)?.to_string(), "cn=admins,ou=roles,dc=example");
		assert_eq!(names.qualified_name_of(&User::new("alice"))?.to_string(), "uid=alice,ou=users,dc=example");
		assert_eq!(
			names.qualified_name("Doe, John", User::TYPE)?.to_string(),
			"uid=Doe\\, John,ou=users,dc=example"
		);
		Ok(())
	}

	#[test]
	fn short_names() -> Result<(), Box<dyn std::error::Error>> {
		let names = resolver();
		assert_eq!(names.short_name("cn=admins,ou=roles,dc=example", Role::TYPE)?, "admins");
		assert_eq!(names.short_name("CN=admins, OU=roles, DC=example", Role::TYPE)?, "admins");
		assert_eq!(names.short_name("cn=alice,ou=people,dc=other", User::TYPE)?, "alice");
		assert_eq!(
			names.short_name("ou=roles,dc=example", Role::TYPE)?,
			"ou=roles,dc=example",
			"Names without a key component are returned unchanged"
		);
		assert!(matches!(
			names.short_name("cn=admins,,dc=example", Role::TYPE),
			Err(MappingError::InvalidName(_))
		));
		Ok(())
	}

	#[test]
	fn names_round_trip() -> Result<(), Box<dyn std::error::Error>> {
		let names = resolver();
		for identifier in ["admins", "Doe, John", " spaced ", "#1", "a+b", "Zoë"] {
			let dn = names.qualified_name(identifier, Role::TYPE)?;
			assert_eq!(names.short_name(&dn.to_string(), Role::TYPE)?, identifier);
		}
		Ok(())
	}

	#[test]
	fn unmapped_and_invalid() {
		let names = resolver();
		let unmapped = EntityType { name: "group", key: Some("identifier") };
		assert!(matches!(names.qualified_name("a", unmapped), Err(MappingError::Unmapped { .. })));
		let keyless = EntityType { name: "role", key: None };
		assert!(matches!(names.qualified_name("a", keyless), Err(MappingError::Unmapped { .. })));
		assert!(matches!(names.subtree_name(unmapped), Err(MappingError::Unmapped { .. })));
		assert!(matches!(names.qualified_name("", Role::TYPE), Err(MappingError::InvalidName(_))));
	}
}
