//! Config for the user manager.
use std::{collections::HashMap, io::BufReader, path::PathBuf, sync::Arc, time::Duration};

use ldap3::LdapConnSettings;
use rustls::{Certificate, ClientConfig, PrivateKey, RootCertStore};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{directory::DirectoryError, permission::ListPolicy};

/// User manager configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
	/// The URL to connect to the server with. Supports ldap, ldaps, and ldapi
	/// schemes
	pub url: Url,
	/// Connection settings.
	#[serde(default)]
	pub connection: ConnectionConfig,
	/// The DN of the service account used for all repository operations
	pub bind_dn: String,
	/// The password of the service account
	pub bind_password: String,
	/// How entities are stored in the directory
	pub mapping: MappingConfig,
	/// Permissions granted to authenticated users
	#[serde(default)]
	pub authorization: AuthorizationConfig,
	/// What listing operations do with entries the caller may not read
	#[serde(default)]
	pub list_policy: ListPolicy,
}

/// Configuration for how to connect to the LDAP server
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
	/// Timeout to establish a connection in seconds.
	pub timeout: u64,

	/// LDAP operation timeout, applied to every request.
	pub operation_timeout: Duration,

	/// TLS config
	#[serde(default)]
	pub tls: TLSConfig,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self { timeout: 5, operation_timeout: Duration::from_secs(5), tls: TLSConfig::default() }
	}
}

/// TLS Configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TLSConfig {
	/// Use StartTLS extended operation for establishing a secure connection,
	/// rather than TLS on a dedicated port.
	#[serde(default)]
	pub starttls: bool,

	/// Disable verification of TLS certificates
	#[serde(default)]
	pub no_tls_verify: bool,

	/// TLS root certificates path
	pub root_certificates_path: Option<PathBuf>,

	/// Path of the TLS client key to use for the connection
	pub client_key_path: Option<PathBuf>,

	/// Path of the TLS client certificate to use for the connection
	pub client_certificate_path: Option<PathBuf>,
}

/// How entity types and their properties map to directory entries
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MappingConfig {
	/// Object classes of the entries for each entity type, e.g.
	/// `role = ["groupOfNames"]`
	pub object_classes: HashMap<String, Vec<String>>,
	/// Attribute names for each `<entity>.<property>`, e.g.
	/// `"role.identifier" = ["cn"]`. The first name is the one read from.
	pub attributes: HashMap<String, Vec<String>>,
	/// The base DN below which the entries of each entity type are stored
	pub subtrees: HashMap<String, String>,
}

/// Permissions granted after authentication
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthorizationConfig {
	/// Permissions granted to the members of a role, by role identifier
	#[serde(default)]
	pub role_permissions: HashMap<String, Vec<String>>,
	/// Permission templates granted to every user. `${user}` is replaced with
	/// the user's identifier, a template containing `${roles}` is expanded
	/// once per role of the user. Entries starting with `#` are ignored.
	#[serde(default)]
	pub user_permissions: Vec<String>,
}

impl ConnectionConfig {
	/// Create a [`LdapConnSettings`] based on this [`ConnectionConfig`]
	pub(crate) async fn to_settings(&self) -> Result<LdapConnSettings, DirectoryError> {
		let mut settings = LdapConnSettings::new();

		settings = settings.set_conn_timeout(Duration::from_secs(self.timeout));
		settings = settings.set_starttls(self.tls.starttls);
		settings = settings.set_no_tls_verify(self.tls.no_tls_verify);

		if let Some(path) = &self.tls.root_certificates_path {
			let mut roots = RootCertStore::empty();
			let pem = tokio::fs::read(path).await?;
			let certificates = rustls_pemfile::certs(&mut BufReader::new(pem.as_slice()))?;
			let (added, _) = roots.add_parsable_certificates(&certificates);
			if added == 0 {
				return Err(DirectoryError::Invalid("Could not read root certificate".to_owned()));
			}

			let builder = ClientConfig::builder().with_safe_defaults().with_root_certificates(roots);
			let config = match (&self.tls.client_key_path, &self.tls.client_certificate_path) {
				(Some(key_path), Some(cert_path)) => {
					let pem = tokio::fs::read(cert_path).await?;
					let chain = rustls_pemfile::certs(&mut BufReader::new(pem.as_slice()))?
						.into_iter()
						.map(Certificate)
						.collect();
					let pem = tokio::fs::read(key_path).await?;
					let key = rustls_pemfile::pkcs8_private_keys(&mut BufReader::new(pem.as_slice()))?
						.into_iter()
						.next()
						.ok_or_else(|| {
							DirectoryError::Invalid("Could not read client key".to_owned())
						})?;
					builder.with_client_auth_cert(chain, PrivateKey(key)).map_err(|_| {
						DirectoryError::Invalid("Could not read client certificates".to_owned())
					})?
				}
				(None, None) => builder.with_no_client_auth(),
				_ => {
					return Err(DirectoryError::Invalid(
						"Both a client certificate and key file in PKCS8 format must be specified"
							.to_owned(),
					))
				}
			};
			settings = settings.set_config(Arc::new(config));
		}
		Ok(settings)
	}
}
