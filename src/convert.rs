//! Conversion of typed property values to and from attribute strings.
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::dn::InvalidName;

/// Configuration for which variant of ISO8601 to use for parsing and
/// serializing time. Configured according the syntax definition
/// `( 1.3.6.1.4.1.1466.115.121.1.24 DESC 'Generalized Time' )` described in
/// RFC4517 section 3.1.13
pub const TIME_FORMAT: &[time::format_description::FormatItem] =
	time::macros::format_description!("[year][month][day][hour][minute][second]Z");

/// Errors that can occur when converting a single value.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
	/// The string is not a valid representation of the target type.
	#[error("Malformed {ty} value {value:?}")]
	Malformed {
		/// Name of the target type
		ty: &'static str,
		/// The rejected string
		value: String,
	},
	/// A time value was malformed and failed to parse.
	#[error("Malformed time")]
	Time(#[from] time::error::Parse),
	/// A time value could not be represented in the directory format.
	#[error("Unrepresentable time")]
	TimeFormat(#[from] time::error::Format),
	/// A reference to another entity is not a valid name.
	#[error("Malformed reference")]
	Reference(#[from] InvalidName),
}

/// A value that can be stored in a directory attribute.
pub trait AttributeValue: Sized + Send + Sync + 'static {
	/// Render the value as an attribute string.
	fn to_attribute(&self) -> Result<String, ConversionError>;

	/// Parse the value from an attribute string.
	fn from_attribute(value: &str) -> Result<Self, ConversionError>;
}

impl AttributeValue for String {
	fn to_attribute(&self) -> Result<String, ConversionError> {
		Ok(self.clone())
	}

	fn from_attribute(value: &str) -> Result<Self, ConversionError> {
		Ok(value.to_owned())
	}
}

/// Booleans use the RFC 4517 `TRUE`/`FALSE` syntax.
impl AttributeValue for bool {
	fn to_attribute(&self) -> Result<String, ConversionError> {
		Ok(if *self { "TRUE" } else { "FALSE" }.to_owned())
	}

	fn from_attribute(value: &str) -> Result<Self, ConversionError> {
		match value {
			"TRUE" => Ok(true),
			"FALSE" => Ok(false),
			_ => Err(ConversionError::Malformed { ty: "boolean", value: value.to_owned() }),
		}
	}
}

/// Implement [`AttributeValue`] through `FromStr`/`Display`
macro_rules! integer_value {
	($($ty:ty),*) => {$(
		impl AttributeValue for $ty {
			fn to_attribute(&self) -> Result<String, ConversionError> {
				Ok(self.to_string())
			}

			fn from_attribute(value: &str) -> Result<Self, ConversionError> {
				value.trim().parse().map_err(|_| ConversionError::Malformed {
					ty: stringify!($ty),
					value: value.to_owned(),
				})
			}
		}
	)*};
}

integer_value!(i32, i64, u16, u32, u64);

/// Times are stored as Generalized Time in UTC.
impl AttributeValue for OffsetDateTime {
	fn to_attribute(&self) -> Result<String, ConversionError> {
		Ok(self.to_offset(UtcOffset::UTC).format(&TIME_FORMAT)?)
	}

	fn from_attribute(value: &str) -> Result<Self, ConversionError> {
		Ok(PrimitiveDateTime::parse(value, &TIME_FORMAT)?.assume_utc())
	}
}
