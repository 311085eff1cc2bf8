//! # cached-updater-identity
//!
//! User source for the identity provider, with a cache-first decorator.
//!
//! ## Modules
//!
//! - [`model`] - user, token and credential representations
//! - [`adapter`] - the [`UserAdapter`] contract
//! - [`cached`] - [`CachedUserAdapter`], answering lookups from a
//!   [`cached_updater_core::DualKeyCache`]
//! - [`grants`] - [`TokenGrants`], tokens recently accepted by the provider
//! - [`keycloak`] - [`KeycloakClient`], the admin REST implementation

pub mod adapter;
pub mod cached;
pub mod error;
pub mod grants;
pub mod keycloak;
pub mod model;

pub use adapter::UserAdapter;
pub use cached::CachedUserAdapter;
pub use error::{IdentityError, IdentityResult};
pub use grants::{DEFAULT_GRANT_TTL, TokenGrants};
pub use keycloak::KeycloakClient;
pub use model::{CredentialRepresentation, GetUsersParams, Jwt, MultiValuedHashMap, User};
