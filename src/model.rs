//! Static description of the entities stored in the directory.
//!
//! Every entity type registers an [`EntityDescriptor`] listing its properties
//! together with typed accessors. The accessors are erased to operate on
//! attribute strings, so the mapping layer never needs to know the concrete
//! field types.
use std::{any::TypeId, fmt};

use crate::convert::{AttributeValue, ConversionError};

/// Identity of an entity type, usable without its full descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityType {
	/// The entity name used in mapping keys and permissions
	pub name: &'static str,
	/// Name of the key property, if the entity is keyed
	pub key: Option<&'static str>,
}

impl fmt::Display for EntityType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

/// A type that can be stored as a directory entry.
pub trait Entity: Default + fmt::Debug + Send + Sync + 'static {
	/// The entity's identity
	const TYPE: EntityType;

	/// The registered property table.
	fn descriptor() -> &'static EntityDescriptor<Self>;
}

/// How a property maps to attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
	/// A single plain value
	Scalar,
	/// Any number of plain values
	Collection,
	/// A single reference to another entity
	Relation(EntityType),
	/// Any number of references to another entity
	CollectionRelation(EntityType),
}

impl PropertyKind {
	/// The referenced entity type for relations.
	#[must_use]
	pub const fn related(&self) -> Option<&EntityType> {
		match self {
			Self::Relation(target) | Self::CollectionRelation(target) => Some(target),
			Self::Scalar | Self::Collection => None,
		}
	}

	/// Whether the property holds multiple values
	#[must_use]
	pub const fn is_multiple(&self) -> bool {
		matches!(self, Self::Collection | Self::CollectionRelation(_))
	}
}

/// Reads the values of a property as attribute strings
type Getter<E> = Box<dyn Fn(&E) -> Result<Vec<String>, ConversionError> + Send + Sync>;
/// Assigns attribute strings to a property
type Setter<E> = Box<dyn Fn(&mut E, &[String]) -> Result<(), ConversionError> + Send + Sync>;

/// Metadata and accessors for one property of `E`.
pub struct PropertyDescriptor<E> {
	/// Property name, as used in mapping keys
	name: &'static str,
	/// Cardinality and relation target
	kind: PropertyKind,
	/// Whether the value is a single `String`, which makes it usable as a key
	string_valued: bool,
	/// Reader
	get: Getter<E>,
	/// Writer
	set: Setter<E>,
}

impl<E: 'static> PropertyDescriptor<E> {
	/// A property that always holds exactly one value.
	///
	/// When reading from the directory, only the first value is used.
	#[must_use]
	pub fn single<P: AttributeValue>(
		name: &'static str,
		get: fn(&E) -> &P,
		set: fn(&mut E, P),
	) -> Self {
		Self {
			name,
			kind: PropertyKind::Scalar,
			string_valued: TypeId::of::<P>() == TypeId::of::<String>(),
			get: Box::new(move |entity| Ok(vec![get(entity).to_attribute()?])),
			set: Box::new(move |entity, values| {
				if let Some(value) = values.first() {
					set(entity, P::from_attribute(value)?);
				}
				Ok(())
			}),
		}
	}

	/// A property that may be absent.
	#[must_use]
	pub fn optional<P: AttributeValue>(
		name: &'static str,
		get: fn(&E) -> Option<&P>,
		set: fn(&mut E, Option<P>),
	) -> Self {
		Self {
			name,
			kind: PropertyKind::Scalar,
			string_valued: false,
			get: Box::new(move |entity| get(entity).map(P::to_attribute).into_iter().collect()),
			set: Box::new(move |entity, values| {
				let value = values.first().map(|value| P::from_attribute(value)).transpose()?;
				set(entity, value);
				Ok(())
			}),
		}
	}

	/// A multi-valued property, filled one value at a time through `add`.
	///
	/// All values are converted before the first one is added, so a failed
	/// conversion leaves the entity untouched.
	#[must_use]
	pub fn collection<P: AttributeValue>(
		name: &'static str,
		get: fn(&E) -> &[P],
		add: fn(&mut E, P),
	) -> Self {
		Self {
			name,
			kind: PropertyKind::Collection,
			string_valued: false,
			get: Box::new(move |entity| get(entity).iter().map(P::to_attribute).collect()),
			set: Box::new(move |entity, values| {
				let values =
					values.iter().map(|value| P::from_attribute(value)).collect::<Result<Vec<_>, _>>()?;
				for value in values {
					add(entity, value);
				}
				Ok(())
			}),
		}
	}

	/// Mark the property as referencing entities of type `target`.
	#[must_use]
	pub fn relation(mut self, target: EntityType) -> Self {
		self.kind = match self.kind {
			PropertyKind::Scalar | PropertyKind::Relation(_) => PropertyKind::Relation(target),
			PropertyKind::Collection | PropertyKind::CollectionRelation(_) => {
				PropertyKind::CollectionRelation(target)
			}
		};
		self
	}

	/// The property name
	#[must_use]
	pub const fn name(&self) -> &'static str {
		self.name
	}

	/// The property kind
	#[must_use]
	pub const fn kind(&self) -> PropertyKind {
		self.kind
	}

	/// Whether this property can serve as a key.
	#[must_use]
	pub const fn is_key_capable(&self) -> bool {
		self.string_valued && matches!(self.kind, PropertyKind::Scalar)
	}

	/// Current values, rendered as attribute strings.
	pub fn values(&self, entity: &E) -> Result<Vec<String>, ConversionError> {
		(self.get)(entity)
	}

	/// Assign values parsed from attribute strings.
	pub fn assign(&self, entity: &mut E, values: &[String]) -> Result<(), ConversionError> {
		(self.set)(entity, values)
	}
}

impl<E> fmt::Debug for PropertyDescriptor<E> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PropertyDescriptor")
			.field("name", &self.name)
			.field("kind", &self.kind)
			.finish_non_exhaustive()
	}
}

/// The registered properties of an entity type.
#[derive(Debug)]
pub struct EntityDescriptor<E> {
	/// Registered properties, in declaration order
	properties: Vec<PropertyDescriptor<E>>,
}

impl<E: Entity> EntityDescriptor<E> {
	/// Register the properties of `E`.
	#[must_use]
	pub fn new(properties: Vec<PropertyDescriptor<E>>) -> Self {
		Self { properties }
	}

	/// Create a new, empty instance.
	#[must_use]
	pub fn create(&self) -> E {
		E::default()
	}

	/// All properties, in declaration order
	#[must_use]
	pub fn properties(&self) -> &[PropertyDescriptor<E>] {
		&self.properties
	}

	/// Look up a property by name
	#[must_use]
	pub fn property(&self, name: &str) -> Option<&PropertyDescriptor<E>> {
		self.properties.iter().find(|property| property.name == name)
	}

	/// The property named by [`EntityType::key`], if registered.
	#[must_use]
	pub fn key_property(&self) -> Option<&PropertyDescriptor<E>> {
		E::TYPE.key.and_then(|key| self.property(key))
	}
}
