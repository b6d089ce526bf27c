use std::future::Future;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use rocket::http::{RawStr, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket_db_pools::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::gateway;
use crate::models::RootInvitation;
use crate::Db;

/// Accepts standard or URL-safe input once normalized, padded or not.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum InvitationError {
    #[error("no invitation code given")]
    Missing,
    #[error("invitation code is not valid base64")]
    Encoding,
    #[error("invitation code does not hold a hyphenated uuid")]
    Malformed,
    #[error("invitation {0} does not exist")]
    NotFound(Uuid),
    #[error("invitation lookup failed: {0}")]
    Lookup(String),
}

/// Decodes an invitation code into the root invitation id it carries.
pub fn decode_code(code: &str) -> Result<Uuid, InvitationError> {
    let normalized: String = code
        .trim()
        .chars()
        .map(|c| match c {
            // '+' arrives as a space when the code was not percent-encoded.
            ' ' | '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();

    let bytes = LENIENT
        .decode(normalized.as_bytes())
        .map_err(|_| InvitationError::Encoding)?;
    let text = String::from_utf8(bytes).map_err(|_| InvitationError::Malformed)?;

    if text.len() != 36 {
        return Err(InvitationError::Malformed);
    }
    Uuid::try_parse(&text).map_err(|_| InvitationError::Malformed)
}

pub fn encode_code(id: Uuid) -> String {
    STANDARD.encode(id.hyphenated().to_string())
}

/// `path` with the invitation code attached as its query.
pub fn code_url(path: &str, code: &str) -> String {
    format!("{path}?code={}", RawStr::new(code).percent_encode())
}

/// Resolves a query `code` to an existing invitation id. The code is
/// decoded before `exists` is consulted, so a malformed code never reaches
/// the lookup.
pub async fn resolve<F, Fut>(code: Option<&str>, exists: F) -> Result<Uuid, InvitationError>
where
    F: FnOnce(Uuid) -> Fut,
    Fut: Future<Output = Result<bool, InvitationError>>,
{
    let code = code
        .filter(|code| !code.trim().is_empty())
        .ok_or(InvitationError::Missing)?;
    let id = decode_code(code)?;
    if exists(id).await? {
        Ok(id)
    } else {
        Err(InvitationError::NotFound(id))
    }
}

/// A request carrying a code for an existing invitation.
#[derive(Debug, Clone)]
pub struct Invited {
    pub id: Uuid,
    pub code: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Invited {
    type Error = InvitationError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let code = req.query_value::<&str>("code").and_then(|c| c.ok());

        let lookup = move |id: Uuid| async move {
            let mut db = match req.guard::<Connection<Db>>().await {
                Outcome::Success(db) => db,
                _ => return Err(InvitationError::Lookup("no database connection".to_string())),
            };
            gateway::invitation_exists(&mut db, id)
                .await
                .map_err(|e| InvitationError::Lookup(e.to_string()))
        };

        match resolve(code, lookup).await {
            Ok(id) => Outcome::Success(Invited { id, code: code.unwrap_or_default().to_string() }),
            Err(e) => {
                match &e {
                    InvitationError::Lookup(_) => tracing::error!(code, error = %e, "invitation lookup failed"),
                    _ => tracing::warn!(code, error = %e, "rejected invitation code"),
                }
                Outcome::Error((Status::Unauthorized, e))
            }
        }
    }
}

/// Page-level check: decodes the code again and loads the full record.
pub async fn load(
    db: &mut Connection<Db>,
    invited: &Invited,
) -> Result<RootInvitation, InvitationError> {
    let id = decode_code(&invited.code)?;
    match gateway::find_invitation(db, id).await {
        Ok(Some(invitation)) => Ok(invitation),
        Ok(None) => Err(InvitationError::NotFound(id)),
        Err(e) => Err(InvitationError::Lookup(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, Ordering};

    const ID: &str = "f9e6dfff-3d34-4a19-b605-7be52064c5ca";

    fn id() -> Uuid {
        Uuid::parse_str(ID).unwrap()
    }

    #[test]
    fn decodes_standard_base64() {
        let code = STANDARD.encode(ID);
        assert_eq!(decode_code(&code).unwrap(), id());
        assert_eq!(encode_code(id()), code);
    }

    #[test]
    fn alphabet_and_padding_do_not_matter() {
        let upper = "A1B2C3D4-E5F6-4A19-B605-7BE52064C5CA";
        let standard = STANDARD.encode(upper);
        let url_safe = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(upper);
        let expected = Uuid::parse_str(upper).unwrap();

        assert_eq!(decode_code(&standard).unwrap(), expected);
        assert_eq!(decode_code(&url_safe).unwrap(), expected);
        assert_eq!(decode_code(&format!("  {standard}\n")).unwrap(), expected);
    }

    #[test]
    fn plus_turned_into_space_still_decodes() {
        // Only the shape matters here: any '+' in the code may arrive as ' '.
        let code = encode_code(id());
        let mangled = code.replace('+', " ");
        assert_eq!(decode_code(&mangled).unwrap(), id());
    }

    #[test]
    fn rejects_codes_that_are_not_hyphenated_uuids() {
        for text in [
            "f9e6dfff3d344a19b6057be52064c5ca",
            "{f9e6dfff-3d34-4a19-b605-7be52064c5ca}",
            "urn:uuid:f9e6dfff-3d34-4a19-b605-7be52064c5ca",
            "f9e6dfff-3d34-4a19-b605-7be52064c5cz",
            "hello world",
            "",
        ] {
            let code = STANDARD.encode(text);
            assert!(
                matches!(decode_code(&code), Err(InvitationError::Malformed)),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn rejects_invalid_base64_and_binary() {
        assert!(matches!(decode_code("***"), Err(InvitationError::Encoding)));
        let binary = STANDARD.encode([0xff, 0xfe, 0x00, 0x80]);
        assert!(matches!(decode_code(&binary), Err(InvitationError::Malformed)));
    }

    #[test]
    fn links_carry_the_code_through_query_decoding() {
        let code = encode_code(id());
        let url = code_url("/form", &code);
        let (_, query) = url.split_once("?code=").unwrap();
        let decoded = RawStr::new(query).url_decode_lossy();
        assert_eq!(decode_code(&decoded).unwrap(), id());
    }

    async fn known(id: Uuid) -> Result<bool, InvitationError> {
        Ok(id == Uuid::parse_str(ID).unwrap())
    }

    #[rocket::async_test]
    async fn well_formed_codes_for_known_invitations_resolve() {
        let code = encode_code(id());
        assert_eq!(resolve(Some(&code), known).await.unwrap(), id());

        let other = encode_code(Uuid::new_v4());
        assert!(matches!(resolve(Some(&other), known).await, Err(InvitationError::NotFound(_))));
    }

    #[rocket::async_test]
    async fn malformed_codes_fail_before_the_lookup() {
        let looked_up = AtomicBool::new(false);
        let lookup = |id: Uuid| {
            looked_up.store(true, Ordering::SeqCst);
            known(id)
        };

        // Same id, but not in the hyphenated form.
        let simple = STANDARD.encode(id().simple().to_string());
        assert!(matches!(resolve(Some(&simple), lookup).await, Err(InvitationError::Malformed)));
        assert!(!looked_up.load(Ordering::SeqCst));

        assert!(resolve(Some(ID), known).await.is_err());
        assert!(matches!(resolve(None, known).await, Err(InvitationError::Missing)));
        assert!(matches!(resolve(Some("  "), known).await, Err(InvitationError::Missing)));
    }

    #[rocket::async_test]
    async fn lookup_failures_are_not_successes() {
        let code = encode_code(id());
        let broken = |_: Uuid| async { Err::<bool, _>(InvitationError::Lookup("pool closed".to_string())) };
        assert!(matches!(resolve(Some(&code), broken).await, Err(InvitationError::Lookup(_))));
    }

    #[test]
    fn a_raw_uuid_is_not_a_code() {
        assert!(decode_code(ID).is_err());
    }
}
