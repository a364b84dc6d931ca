//! Validated lookup tables built from the mapping configuration.
use std::collections::HashMap;

use crate::{config::MappingConfig, dn::DistinguishedName, error::Error};

/// Object classes, attribute names and subtrees per entity type.
#[derive(Debug, Clone, Default)]
pub struct MappingTables {
	/// Object classes per entity name
	object_classes: HashMap<String, Vec<String>>,
	/// Attribute names per `<entity>.<property>`
	attributes: HashMap<String, Vec<String>>,
	/// Base names per entity name
	subtrees: HashMap<String, DistinguishedName>,
}

impl MappingTables {
	/// Build the tables, rejecting empty lists and malformed subtree names.
	pub fn new(config: &MappingConfig) -> Result<Self, Error> {
		for (entity, classes) in &config.object_classes {
			if classes.is_empty() {
				return Err(Error::Invalid(format!("No object classes configured for {entity}")));
			}
		}
		for (property, names) in &config.attributes {
			if names.is_empty() || names.iter().any(String::is_empty) {
				return Err(Error::Invalid(format!("No attribute names configured for {property}")));
			}
		}
		let mut subtrees = HashMap::new();
		for (entity, subtree) in &config.subtrees {
			subtrees.insert(entity.clone(), DistinguishedName::parse(subtree)?);
		}

		Ok(Self {
			object_classes: config.object_classes.clone(),
			attributes: config.attributes.clone(),
			subtrees,
		})
	}

	/// Attribute names configured for `property` of `entity`, the first one
	/// being the primary name.
	#[must_use]
	pub fn attributes(&self, entity: &str, property: &str) -> Option<&[String]> {
		self.attributes.get(&format!("{entity}.{property}")).map(Vec::as_slice)
	}

	/// Object classes configured for `entity`
	#[must_use]
	pub fn object_classes(&self, entity: &str) -> Option<&[String]> {
		self.object_classes.get(entity).map(Vec::as_slice)
	}

	/// Base name configured for `entity`
	#[must_use]
	pub fn subtree(&self, entity: &str) -> Option<&DistinguishedName> {
		self.subtrees.get(entity)
	}
}
