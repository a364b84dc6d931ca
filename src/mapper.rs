//! Mapping of whole entities to and from attribute sets.
use std::sync::Arc;

use tracing::debug;

use crate::{
	codec::AttributeCodec,
	entry::Attributes,
	error::MappingError,
	mapping::MappingTables,
	model::{Entity, EntityType},
	name::NameResolver,
};

/// Name of the attribute listing the object classes of an entry
pub const OBJECT_CLASS: &str = "objectClass";

/// Maps entities to attribute sets and back, according to the configured
/// attribute mapping.
///
/// Properties without a configured attribute are skipped. A property may be
/// written to several attributes, it is always read from the first one.
#[derive(Debug, Clone)]
pub struct EntityMapper {
	/// The configured mapping
	tables: Arc<MappingTables>,
	/// Builds and reduces names
	names: NameResolver,
	/// Converts single properties
	codec: AttributeCodec,
}

impl EntityMapper {
	/// Create a mapper for the given mapping.
	#[must_use]
	pub fn new(tables: Arc<MappingTables>) -> Self {
		let names = NameResolver::new(tables.clone());
		let codec = AttributeCodec::new(names.clone());
		Self { tables, names, codec }
	}

	/// The name resolver used by this mapper
	#[must_use]
	pub const fn names(&self) -> &NameResolver {
		&self.names
	}

	/// The attributes of all mapped properties of `entity`.
	pub fn to_attributes<E: Entity>(&self, entity: &E) -> Result<Attributes, MappingError> {
		self.encode(entity, |_| true)
	}

	/// The attributes of the mapped properties of `entity` whose name is
	/// (`including`) or is not (`!including`) in `properties`.
	pub fn to_attributes_filtered<E: Entity>(
		&self,
		entity: &E,
		including: bool,
		properties: &[&str],
	) -> Result<Attributes, MappingError> {
		self.encode(entity, |name| properties.iter().any(|p| *p == name) == including)
	}

	/// Create an entity from attributes read from the directory.
	pub fn from_attributes<E: Entity>(&self, attributes: &Attributes) -> Result<E, MappingError> {
		self.decode(attributes, |_| true)
	}

	/// Create an entity from attributes, assigning only the properties whose
	/// name is (`including`) or is not (`!including`) in `properties`.
	pub fn from_attributes_filtered<E: Entity>(
		&self,
		attributes: &Attributes,
		including: bool,
		properties: &[&str],
	) -> Result<E, MappingError> {
		self.decode(attributes, |name| properties.iter().any(|p| *p == name) == including)
	}

	/// The object classes of entries of `entity_type`, as attribute name and
	/// values.
	pub fn object_class_attribute(
		&self,
		entity_type: EntityType,
	) -> Result<(&'static str, Vec<String>), MappingError> {
		let classes = self.tables.object_classes(entity_type.name).ok_or_else(|| {
			MappingError::Unmapped { entity: entity_type.name, what: "object class".to_owned() }
		})?;
		Ok((OBJECT_CLASS, classes.to_vec()))
	}

	/// The primary attribute name of `property` of `entity_type`.
	pub fn attribute_name(
		&self,
		entity_type: EntityType,
		property: &str,
	) -> Result<&str, MappingError> {
		self.tables
			.attributes(entity_type.name, property)
			.and_then(<[String]>::first)
			.map(String::as_str)
			.ok_or_else(|| MappingError::Unmapped {
				entity: entity_type.name,
				what: format!("{property} attribute"),
			})
	}

	/// Fail unless at least one property of `E` is mapped.
	fn ensure_mapped<E: Entity>(&self) -> Result<(), MappingError> {
		let mapped = E::descriptor()
			.properties()
			.iter()
			.any(|property| self.tables.attributes(E::TYPE.name, property.name()).is_some());
		if mapped {
			Ok(())
		} else {
			Err(MappingError::Unmapped { entity: E::TYPE.name, what: "attribute".to_owned() })
		}
	}

	/// Encode the selected properties.
	fn encode<E: Entity>(
		&self,
		entity: &E,
		select: impl Fn(&str) -> bool,
	) -> Result<Attributes, MappingError> {
		self.ensure_mapped::<E>()?;
		let mut attributes = Attributes::new();
		for property in E::descriptor().properties().iter().filter(|p| select(p.name())) {
			let Some(names) = self.tables.attributes(E::TYPE.name, property.name()) else {
				continue;
			};
			let values = self.codec.encode(property, entity)?;
			for name in names {
				attributes.insert(name, values.iter().cloned());
			}
		}
		debug!("Mapped {} to {} attributes", E::TYPE, attributes.iter().count());
		Ok(attributes)
	}

	/// Decode the selected properties into a new entity.
	fn decode<E: Entity>(
		&self,
		attributes: &Attributes,
		select: impl Fn(&str) -> bool,
	) -> Result<E, MappingError> {
		self.ensure_mapped::<E>()?;
		let descriptor = E::descriptor();
		let mut entity = descriptor.create();
		for property in descriptor.properties().iter().filter(|p| select(p.name())) {
			let Some(name) =
				self.tables.attributes(E::TYPE.name, property.name()).and_then(<[String]>::first)
			else {
				continue;
			};
			if let Some(values) = attributes.get(name) {
				self.codec.decode(property, &mut entity, values)?;
			}
		}
		Ok(entity)
	}
}
