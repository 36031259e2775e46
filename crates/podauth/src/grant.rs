//! Access grants: the consent credentials issued by the access-grant
//! service, the rules for checking them, and the shapes used to look them up.

mod model;
mod query;
mod validate;

pub use self::model::*;
pub use self::query::*;
pub use self::validate::*;

/// The only status under which a grant may be used.
pub const CONSENT_STATUS_EXPLICITLY_GIVEN: &str = "ConsentStatusExplicitlyGiven";

/// Credential type of a grant.
pub const SOLID_ACCESS_GRANT: &str = "SolidAccessGrant";

/// Credential type of a request for access.
pub const SOLID_ACCESS_REQUEST: &str = "SolidAccessRequest";
