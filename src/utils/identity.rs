use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::Duration;
use uuid::Uuid;

use crate::models::poll_models::PollConfig;
use crate::models::vote_record_models::VoterIdentity;
use crate::utils::session::{verify_token, SESSION_COOKIE};

/// Cookie holding the anonymous voter token. Long-lived so the duplicate
/// guard survives across visits.
pub const ANONYMOUS_COOKIE: &str = "poll_anonymous_token";

const ANONYMOUS_COOKIE_DAYS: i64 = 365;

/// Outcome of identity resolution. `issued_cookie` is set when a fresh
/// anonymous token was minted and must be handed back to the client.
pub struct ResolvedIdentity {
    pub identity: Option<VoterIdentity>,
    pub issued_cookie: Option<Cookie<'static>>,
}

impl ResolvedIdentity {
    fn bare(identity: Option<VoterIdentity>) -> Self {
        Self {
            identity,
            issued_cookie: None,
        }
    }
}

/// Derive a stable voter identity from the request.
///
/// A valid session token wins. Otherwise, if the poll permits anonymous
/// voting, an explicit token from the request body takes precedence over the
/// cookie, and a missing token gets a freshly minted one. A poll that forbids
/// anonymous voting resolves unauthenticated visitors to `None`.
pub fn resolve_identity(
    jar: &CookieJar,
    config: &PollConfig,
    explicit_token: Option<&str>,
) -> ResolvedIdentity {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(claims) = verify_token(cookie.value()) {
            return ResolvedIdentity::bare(Some(VoterIdentity::Authenticated(claims.sub)));
        }
    }

    if !config.allow_anonymous {
        return ResolvedIdentity::bare(None);
    }

    if let Some(token) = explicit_token.filter(|t| !t.is_empty()) {
        return ResolvedIdentity::bare(Some(VoterIdentity::Anonymous(token.to_string())));
    }

    if let Some(cookie) = jar.get(ANONYMOUS_COOKIE) {
        if !cookie.value().is_empty() {
            return ResolvedIdentity::bare(Some(VoterIdentity::Anonymous(
                cookie.value().to_string(),
            )));
        }
    }

    let token = Uuid::new_v4().to_string();
    let cookie = Cookie::build((ANONYMOUS_COOKIE, token.clone()))
        .path("/")
        .max_age(Duration::days(ANONYMOUS_COOKIE_DAYS))
        .same_site(SameSite::Lax)
        .http_only(true)
        .build();

    ResolvedIdentity {
        identity: Some(VoterIdentity::Anonymous(token)),
        issued_cookie: Some(cookie),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::poll_models::PollOption;
    use crate::utils::session::create_token;

    fn config(allow_anonymous: bool) -> PollConfig {
        PollConfig {
            poll_id: "poll-1".to_string(),
            question: "Favourite colour?".to_string(),
            options: vec![
                PollOption {
                    id: 0,
                    label: "Red".to_string(),
                },
                PollOption {
                    id: 1,
                    label: "Blue".to_string(),
                },
            ],
            allow_anonymous,
        }
    }

    #[test]
    fn session_token_resolves_to_authenticated() {
        let token = create_token("user-7").unwrap();
        let jar = CookieJar::new().add(Cookie::new(SESSION_COOKIE, token));

        let resolved = resolve_identity(&jar, &config(true), None);
        assert_eq!(
            resolved.identity,
            Some(VoterIdentity::Authenticated("user-7".to_string()))
        );
        assert!(resolved.issued_cookie.is_none());
    }

    #[test]
    fn anonymous_disallowed_resolves_to_none() {
        let jar = CookieJar::new();
        let resolved = resolve_identity(&jar, &config(false), None);
        assert!(resolved.identity.is_none());
        assert!(resolved.issued_cookie.is_none());
    }

    #[test]
    fn missing_token_gets_a_fresh_one() {
        let jar = CookieJar::new();
        let resolved = resolve_identity(&jar, &config(true), None);

        let issued = resolved.issued_cookie.expect("cookie issued");
        match resolved.identity {
            Some(VoterIdentity::Anonymous(token)) => assert_eq!(token, issued.value()),
            other => panic!("expected anonymous identity, got {:?}", other),
        }
    }

    #[test]
    fn existing_cookie_token_is_reused() {
        let jar = CookieJar::new().add(Cookie::new(ANONYMOUS_COOKIE, "tok-abc"));
        let resolved = resolve_identity(&jar, &config(true), None);

        assert_eq!(
            resolved.identity,
            Some(VoterIdentity::Anonymous("tok-abc".to_string()))
        );
        assert!(resolved.issued_cookie.is_none());
    }

    #[test]
    fn explicit_token_beats_cookie() {
        let jar = CookieJar::new().add(Cookie::new(ANONYMOUS_COOKIE, "tok-cookie"));
        let resolved = resolve_identity(&jar, &config(true), Some("tok-body"));

        assert_eq!(
            resolved.identity,
            Some(VoterIdentity::Anonymous("tok-body".to_string()))
        );
    }
}
