use axum::http::header;
use axum::http::request::Parts;

use crate::config::AuthConfig;

/// `Set-Cookie` value carrying a freshly issued session token.
pub fn session_cookie(config: &AuthConfig, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; HttpOnly;{} SameSite=Strict; Path=/; Max-Age={}",
        config.cookie_name,
        token,
        if config.secure_cookie { " Secure;" } else { "" },
        max_age_secs
    )
}

/// `Set-Cookie` value that expires the session cookie immediately.
pub fn clear_session_cookie(config: &AuthConfig) -> String {
    session_cookie(config, "", 0)
}

pub fn get_cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let (key, val) = cookie.split_once('=')?;
            (key.trim() == name).then(|| val.trim())
        })
}
