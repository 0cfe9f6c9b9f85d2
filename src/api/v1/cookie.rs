use crate::server::CookiePolicy;
use warp::http::header::{HeaderValue, SET_COOKIE};
use warp::reply::Response;

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn render(policy: &CookiePolicy, name: &str, value: &str, max_age: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        name,
        value,
        max_age.max(0)
    );
    if policy.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Append both auth cookies. A token that is not a valid header value is
/// skipped; the JSON body still carries it.
pub fn set_auth_cookies(
    response: &mut Response,
    policy: &CookiePolicy,
    access_token: &str,
    refresh_token: &str,
) {
    let cookies = [
        render(policy, ACCESS_COOKIE, access_token, policy.access_max_age_secs),
        render(
            policy,
            REFRESH_COOKIE,
            refresh_token,
            policy.refresh_max_age_secs,
        ),
    ];
    append(response, &cookies);
}

pub fn clear_auth_cookies(response: &mut Response, policy: &CookiePolicy) {
    let cookies = [
        render(policy, ACCESS_COOKIE, "", 0),
        render(policy, REFRESH_COOKIE, "", 0),
    ];
    append(response, &cookies);
}

fn append(response: &mut Response, cookies: &[String]) {
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::Reply;

    #[test]
    fn sets_two_cookies_with_attributes() {
        let policy = CookiePolicy {
            secure: true,
            ..Default::default()
        };
        let mut response = warp::reply().into_response();
        set_auth_cookies(&mut response, &policy, "aaa", "rrr");

        let cookies: Vec<_> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("access_token=aaa;"));
        assert!(cookies[0].contains("Max-Age=900"));
        assert!(cookies[1].starts_with("refresh_token=rrr;"));
        assert!(cookies.iter().all(|c| c.contains("HttpOnly") && c.ends_with("; Secure")));
    }

    #[test]
    fn clearing_expires_immediately() {
        let mut response = warp::reply().into_response();
        clear_auth_cookies(&mut response, &CookiePolicy::default());
        for value in response.headers().get_all(SET_COOKIE) {
            let value = value.to_str().unwrap();
            assert!(value.contains("=;"));
            assert!(value.contains("Max-Age=0"));
            assert!(!value.contains("Secure"));
        }
    }
}
