//! Manage the users and roles stored in an LDAP directory.
//!
//! Users and roles are plain structs which are mapped to directory entries
//! through a configurable table of attribute names, object classes and
//! subtrees. Every repository operation is performed on behalf of an explicit
//! caller, whose permissions are checked before the directory is touched.
//! Permissions take the form `<entity>:<identifier>:<action>`, e.g.
//! `role:admins:write`, and may contain wildcards.
//!
//! Role membership is stored on the role entries only, as a multi-valued
//! attribute containing the names of the member users. The roles of a user
//! are found by searching for role entries holding its name.
//!
//! For a general primer on LDAP, the [introduction] in the `ldap3` crate which
//! is used here for interfacing with LDAP is an excellent resource.
//!
//! [introduction]: https://github.com/inejge/ldap3/blob/master/LDAP-primer.md
//!
//! # Getting started
//! A minimal example of using the manager might look like so:
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::collections::HashMap;
//!
//! use url::Url;
//! use ldap_usermanager::{
//!     config::{AuthorizationConfig, Config, ConnectionConfig, MappingConfig},
//!     ListPolicy, Role, UserManager,
//! };
//!
//! let strings = |items: &[&str]| items.iter().map(|item| (*item).to_owned()).collect::<Vec<_>>();
//!
//! // Configuration can also be deserialized with serde. It's hand-constructed
//! // here for demonstration purposes.
//! let config = Config {
//!     url: Url::parse("ldap://localhost")?,
//!     connection: ConnectionConfig::default(),
//!     bind_dn: "cn=admin,dc=example,dc=com".to_owned(),
//!     bind_password: "verysecret".to_owned(),
//!     mapping: MappingConfig {
//!         object_classes: HashMap::from([
//!             ("role".to_owned(), strings(&["groupOfNames"])),
//!             ("user".to_owned(), strings(&["inetOrgPerson"])),
//!         ]),
//!         attributes: HashMap::from([
//!             ("role.identifier".to_owned(), strings(&["cn"])),
//!             ("role.users".to_owned(), strings(&["member"])),
//!             ("user.identifier".to_owned(), strings(&["cn"])),
//!             ("user.lastName".to_owned(), strings(&["sn"])),
//!             ("user.password".to_owned(), strings(&["userPassword"])),
//!         ]),
//!         subtrees: HashMap::from([
//!             ("role".to_owned(), "ou=roles,dc=example,dc=com".to_owned()),
//!             ("user".to_owned(), "ou=people,dc=example,dc=com".to_owned()),
//!         ]),
//!     },
//!     authorization: AuthorizationConfig {
//!         role_permissions: HashMap::from([("admins".to_owned(), strings(&["*"]))]),
//!         user_permissions: strings(&["user:${user}:read", "password:${user}:modify"]),
//!     },
//!     list_policy: ListPolicy::FilterUnauthorized,
//! };
//!
//! let manager = UserManager::new(config)?;
//! let subject = manager.realm().authenticate("alice", "password").await?;
//! let mut role = Role::new("editors");
//! role.users.push("alice".to_owned());
//! manager.roles().create_role(&subject, &role).await?;
//! println!("Roles of alice: {:?}", manager.roles().get_roles_for_user(&subject, "alice").await?);
//!
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//! * Changing memberships takes one modify request per role or user joining
//!   or leaving, without any transaction. Concurrent changes converge on the
//!   union of their intents, as adding a present value or removing an absent
//!   one is treated as success.
//! * A new connection is established and bound for every operation.
//! * [secrecy](https://docs.rs/secrecy) is not used for storing the service
//!   account password, it probably should be
//! * Deleting a user does not remove it from the roles it is a member of.

pub mod codec;
pub mod config;
pub mod convert;
pub mod directory;
pub mod dn;
pub mod domain;
pub mod entry;
pub mod error;
pub mod ldap;
pub mod manager;
pub mod mapper;
pub mod mapping;
pub mod model;
pub mod name;
pub mod permission;
pub mod realm;
pub mod repository;

pub use ldap3;

pub use crate::{
	config::{AuthorizationConfig, Config, ConnectionConfig, MappingConfig, TLSConfig},
	convert::AttributeValue,
	directory::{Connection, Directory, DirectoryError, Modification},
	dn::DistinguishedName,
	domain::{Role, User},
	entry::{Attributes, Entry},
	error::{Error, MappingError},
	ldap::LdapDirectory,
	manager::UserManager,
	mapper::EntityMapper,
	model::{Entity, EntityType},
	permission::{Action, Authorizer, ListPolicy, Permission, PermissionResolver, Subject},
	realm::Realm,
	repository::{RoleRepository, UserRepository},
};
