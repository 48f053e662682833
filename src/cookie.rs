//! Reading the session cookie from a request and emitting `Set-Cookie`.

use cookie::{Cookie, Expiration};
use http::header::{COOKIE, SET_COOKIE};
use http::{HeaderMap, HeaderValue};
use time::macros::datetime;
use time::OffsetDateTime;

use crate::error::{SessionError, SessionResult};
use crate::model::SessionOptions;

/// `Expires` sent when clearing a cookie.
const EXPIRED: OffsetDateTime = datetime!(1970-01-01 0:00:01 UTC);

/// Latest `Expires` a cookie can carry; larger max-ages are clamped to it.
const LATEST_EXPIRES: OffsetDateTime = datetime!(9999-12-31 23:59:59 UTC);

/// Returns the value of the first well-formed request cookie named `name`.
///
/// One pair of surrounding double quotes is stripped from the value.
pub fn find_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_owned())
}

/// Appends a `Set-Cookie` header for `name=value` with the given options.
pub fn set_cookie(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
    options: &SessionOptions,
) -> SessionResult<()> {
    let cookie = build(name, value, options, OffsetDateTime::now_utc())?;
    headers.append(SET_COOKIE, HeaderValue::from_str(&cookie.to_string())?);
    Ok(())
}

/// Builds the `Set-Cookie` cookie as of `now`.
///
/// A positive max-age yields `Expires` and `Max-Age`; a negative one expires the
/// cookie immediately; zero leaves it a browser-session cookie.
pub fn build(
    name: &str,
    value: &str,
    options: &SessionOptions,
    now: OffsetDateTime,
) -> SessionResult<Cookie<'static>> {
    if !value.bytes().all(is_cookie_octet) {
        return Err(SessionError::CookieValue {
            name: name.to_owned(),
        });
    }

    let mut builder = Cookie::build((name.to_owned(), value.to_owned()))
        .http_only(options.http_only)
        .secure(options.secure);
    if !options.path.is_empty() {
        builder = builder.path(options.path.clone());
    }
    if let Some(domain) = options.domain.as_deref().filter(|d| !d.is_empty()) {
        builder = builder.domain(domain.to_owned());
    }
    if let Some(same_site) = options.same_site {
        builder = builder.same_site(same_site);
    }
    if options.max_age > 0 {
        let max_age = time::Duration::seconds(options.max_age);
        let expires = now.checked_add(max_age).unwrap_or(LATEST_EXPIRES);
        builder = builder
            .max_age(max_age)
            .expires(Expiration::DateTime(expires.min(LATEST_EXPIRES)));
    } else if options.max_age < 0 {
        builder = builder
            .max_age(time::Duration::ZERO)
            .expires(Expiration::DateTime(EXPIRED));
    }
    Ok(builder.build())
}

// RFC 6265 cookie-octet.
fn is_cookie_octet(b: u8) -> bool {
    matches!(b, 0x21 | 0x23..=0x2B | 0x2D..=0x3A | 0x3C..=0x5B | 0x5D..=0x7E)
}
