use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use smol_str::SmolStr;

use super::{AccessGrant, AccessMode, CONSENT_STATUS_EXPLICITLY_GIVEN};

/// A grant failed one of the consent checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
#[error("access grant [{grant_id}] rejected: {violation}")]
pub struct ConsentError {
    pub grant_id: SmolStr,
    #[diagnostic_source]
    #[source]
    pub violation: ConsentViolation,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, miette::Diagnostic)]
pub enum ConsentViolation {
    #[error("status is \"{status}\", not \"ConsentStatusExplicitlyGiven\"")]
    #[diagnostic(code(podauth::consent::not_given))]
    NotGiven { status: SmolStr },
    #[error("expired at {expiration}")]
    #[diagnostic(code(podauth::consent::expired), help("request a new access grant"))]
    Expired { expiration: SmolStr },
    #[error("expiration date \"{expiration}\" cannot be parsed")]
    #[diagnostic(
        code(podauth::consent::unparseable_expiration),
        help("expected an RFC 3339 timestamp or a YYYY-MM-DD date")
    )]
    UnparseableExpiration { expiration: SmolStr },
    #[error("resource [{resource}] nor its container is covered by the grant")]
    #[diagnostic(code(podauth::consent::resource))]
    ResourceNotCovered { resource: SmolStr },
    #[error("mode \"{mode}\" is not permitted")]
    #[diagnostic(code(podauth::consent::mode))]
    ModeNotPermitted { mode: AccessMode },
    #[error("grant is not provided to [{recipient}]")]
    #[diagnostic(code(podauth::consent::recipient))]
    WrongRecipient { recipient: SmolStr },
}

/// Check `grant` against the current time. See [`validate_access_grant_at`].
pub fn validate_access_grant(
    grant: &AccessGrant,
    resource_url: Option<&str>,
    mode: Option<AccessMode>,
    recipient: Option<&str>,
) -> Result<(), ConsentError> {
    validate_access_grant_at(grant, resource_url, mode, recipient, Utc::now())
}

/// Check that `grant` is usable at `now`.
///
/// Checks run in this order and the first failure is returned:
///
/// 1. consent status is `ConsentStatusExplicitlyGiven`;
/// 2. the grant has not expired (a missing or empty `expirationDate` never
///    expires, an unparseable one is rejected);
/// 3. `resource_url`, if given, is covered by `forPersonalData`;
/// 4. `mode`, if given, is permitted;
/// 5. `recipient`, if given, equals `isProvidedTo`.
///
/// Coverage is exact match or *string prefix* of a listed IRI. The prefix is
/// not checked at a path boundary, so a grant for `https://pod.example/data`
/// also covers `https://pod.example/data2/x`. List containers with a trailing
/// slash to avoid this.
pub fn validate_access_grant_at(
    grant: &AccessGrant,
    resource_url: Option<&str>,
    mode: Option<AccessMode>,
    recipient: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(), ConsentError> {
    tracing::debug!(grant = %grant.id, "validating access grant");
    let reject = |violation| ConsentError {
        grant_id: grant.id.clone(),
        violation,
    };
    let consent = grant.consent();

    if consent.has_status != CONSENT_STATUS_EXPLICITLY_GIVEN {
        return Err(reject(ConsentViolation::NotGiven {
            status: consent.has_status.clone(),
        }));
    }

    if let Some(expiration) = grant.expiration_date.as_deref().filter(|e| !e.is_empty()) {
        let expires_at = parse_expiration(expiration).ok_or_else(|| {
            reject(ConsentViolation::UnparseableExpiration {
                expiration: expiration.into(),
            })
        })?;
        if expires_at < now {
            return Err(reject(ConsentViolation::Expired {
                expiration: expiration.into(),
            }));
        }
    }

    if let Some(resource) = resource_url.filter(|r| !r.is_empty()) {
        let covered = consent
            .for_personal_data
            .iter()
            .any(|iri| iri == resource || resource.starts_with(iri.as_str()));
        if !covered {
            return Err(reject(ConsentViolation::ResourceNotCovered {
                resource: resource.into(),
            }));
        }
    }

    if let Some(mode) = mode {
        if !consent.permits(mode) {
            return Err(reject(ConsentViolation::ModeNotPermitted { mode }));
        }
    }

    if let Some(recipient) = recipient.filter(|r| !r.is_empty()) {
        if consent.is_provided_to.as_deref() != Some(recipient) {
            return Err(reject(ConsentViolation::WrongRecipient {
                recipient: recipient.into(),
            }));
        }
    }

    tracing::debug!(grant = %grant.id, "access grant is valid");
    Ok(())
}

fn parse_expiration(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    // timestamps without an offset are UTC
    if let Ok(timestamp) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(timestamp.and_utc());
    }
    // date-only strings are UTC midnight
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}
