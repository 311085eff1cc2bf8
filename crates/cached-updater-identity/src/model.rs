//! User, token and credential representations.
//!
//! Field names follow the identity provider's JSON representation
//! (camelCase), and every field is optional because the provider omits
//! whatever it does not know or was not asked for.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Attribute holding the site client identifiers of a user.
pub const ATTR_SITE_CLIENT_ID: &str = "site_client_id";
/// Attribute holding the taxpayer number of a user.
pub const ATTR_INN: &str = "inn";
/// Attribute holding the phone number of a user.
pub const ATTR_PHONE: &str = "phone";

// =============================================================================
// User
// =============================================================================

/// User record as exchanged with the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federation_link: Option<String>,
    /// Multi-valued custom attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disableable_credential_types: Option<Vec<serde_json::Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_actions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<HashMap<String, bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_roles: Option<HashMap<String, Vec<String>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm_roles: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Vec<CredentialRepresentation>>,
}

impl User {
    /// Creates a user carrying only an id and an email.
    pub fn with_identity(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Appends a site client id to the `site_client_id` attribute.
    pub fn set_site_client_id(&mut self, site_client_id: impl Into<String>) {
        self.push_attribute(ATTR_SITE_CLIENT_ID, site_client_id.into());
    }

    /// Appends a taxpayer number to the `inn` attribute.
    pub fn set_inn(&mut self, inn: impl Into<String>) {
        self.push_attribute(ATTR_INN, inn.into());
    }

    /// First value of the `inn` attribute.
    pub fn inn(&self) -> Option<&str> {
        self.first_attribute(ATTR_INN)
    }

    /// First value of the `phone` attribute.
    pub fn phone(&self) -> Option<&str> {
        self.first_attribute(ATTR_PHONE)
    }

    /// First value of an arbitrary attribute.
    pub fn first_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .as_ref()?
            .get(name)?
            .first()
            .map(String::as_str)
    }

    fn push_attribute(&mut self, name: &str, value: String) {
        self.attributes
            .get_or_insert_with(HashMap::new)
            .entry(name.to_string())
            .or_default()
            .push(value);
    }
}

// =============================================================================
// Tokens
// =============================================================================

/// Token endpoint response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwt {
    pub access_token: String,
    #[serde(default)]
    pub id_token: String,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_expires_in: i64,
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, rename = "not-before-policy")]
    pub not_before_policy: i64,
    #[serde(default)]
    pub session_state: String,
    #[serde(default)]
    pub scope: String,
}

// =============================================================================
// Search parameters
// =============================================================================

/// Query parameters for user search. Unset fields are omitted from the query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUsersParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief_representation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idp_alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idp_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

impl GetUsersParams {
    /// Exact lookup by email.
    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            exact: Some(true),
            ..Self::default()
        }
    }

    /// The email of a search that is nothing but an exact email match.
    ///
    /// `None` when any other filter or paging field is set, or when `exact`
    /// is not `Some(true)`; the provider treats an unset `exact` as a
    /// substring search.
    pub fn exact_email(&self) -> Option<&str> {
        let Self {
            brief_representation,
            email,
            email_verified,
            enabled,
            exact,
            first,
            first_name,
            idp_alias,
            idp_user_id,
            last_name,
            max,
            q,
            search,
            username,
        } = self;

        let unfiltered = brief_representation.is_none()
            && email_verified.is_none()
            && enabled.is_none()
            && first.is_none()
            && first_name.is_none()
            && idp_alias.is_none()
            && idp_user_id.is_none()
            && last_name.is_none()
            && max.is_none()
            && q.is_none()
            && search.is_none()
            && username.is_none();

        if unfiltered && *exact == Some(true) {
            email.as_deref()
        } else {
            None
        }
    }
}

// =============================================================================
// Credentials
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiValuedHashMap {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_factor: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i32>,
}

/// A stored credential of a user.
///
/// Carries both the legacy (per-field) and the current
/// (`credentialData` / `secretData`) layouts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRepresentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporary: Option<bool>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    // Legacy layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<MultiValuedHashMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_iterations: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashed_salted_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,

    // Current layout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_label: Option<String>,
}
