//! Error codes

use crate::{convert::ConversionError, directory::DirectoryError, dn::InvalidName};

/// Errors that can occur while mapping entities to directory entries
#[derive(thiserror::Error, Debug)]
pub enum MappingError {
	/// The entity type has no mapping for something that is required.
	#[error("Entity {entity} has no {what} mapping")]
	Unmapped {
		/// The entity type
		entity: &'static str,
		/// What is missing, e.g. `subtree` or `key attribute`
		what: String,
	},
	/// A name or identifier is not valid.
	#[error(transparent)]
	InvalidName(#[from] InvalidName),
	/// A property value could not be converted.
	#[error("Conversion of property {property} failed")]
	ConversionFailed {
		/// The qualified property name
		property: String,
		/// What went wrong
		#[source]
		source: ConversionError,
	},
	/// A property value could not be read from or written to an entity.
	#[error("Could not access {entity}.{property}: {reason}")]
	ValueAccess {
		/// The entity type
		entity: &'static str,
		/// The property name
		property: &'static str,
		/// What went wrong
		reason: String,
	},
	/// The key property of the entity is not a single string value.
	#[error("Entity {entity} does not have a single-valued string key")]
	UnsupportedKey {
		/// The entity type
		entity: &'static str,
	},
}

/// Errors that can occur when using this library
#[derive(thiserror::Error, Debug)]
pub enum Error {
	/// The requested entry does not exist.
	#[error("Not found: {0}")]
	NotFound(String),
	/// An entry with the same name already exists.
	#[error("Already exists: {0}")]
	AlreadyExists(String),
	/// The entity could not be mapped to or from a directory entry.
	#[error("Invalid entity")]
	EntityInvalid(#[from] MappingError),
	/// The caller lacks a required permission.
	#[error("Not permitted: {0}")]
	AuthorizationDenied(String),
	/// The supplied credentials were rejected.
	#[error("Authentication failed for {0}")]
	AuthenticationFailed(String),
	/// An underlying protocol error or similar occurred.
	#[error("Directory operation failed")]
	Repository(#[source] DirectoryError),
	/// The configuration or an argument is not valid.
	#[error("Invalid: {0}")]
	Invalid(String),
}

impl From<DirectoryError> for Error {
	fn from(error: DirectoryError) -> Self {
		match error {
			DirectoryError::NoSuchObject(dn) => Self::NotFound(dn),
			DirectoryError::AlreadyExists(dn) => Self::AlreadyExists(dn),
			other => Self::Repository(other),
		}
	}
}

impl From<InvalidName> for Error {
	fn from(error: InvalidName) -> Self {
		Self::EntityInvalid(error.into())
	}
}

#[cfg(test)]
mod tests {
	use super::{Error, MappingError};
	use crate::{directory::DirectoryError, dn::DistinguishedName};

	#[test]
	fn directory_errors_are_classified() {
		let error: Error = DirectoryError::NoSuchObject("cn=a".to_owned()).into();
		assert!(matches!(error, Error::NotFound(dn) if dn == "cn=a"));

		let error: Error = DirectoryError::AlreadyExists("cn=a".to_owned()).into();
		assert!(matches!(error, Error::AlreadyExists(_)));

		let error: Error = DirectoryError::Invalid("nope".to_owned()).into();
		assert!(matches!(error, Error::Repository(DirectoryError::Invalid(_))));
	}

	#[test]
	fn name_errors_keep_their_source() {
		let Err(invalid) = DistinguishedName::parse("cn") else {
			panic!("A name without a value must be rejected");
		};
		let error = Error::from(invalid);
		assert!(matches!(error, Error::EntityInvalid(MappingError::InvalidName(_))));
		assert!(std::error::Error::source(&error).is_some());
	}
}
