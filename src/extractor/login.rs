//! Login wall detection.
//!
//! A page is treated as a login wall when its URL path looks like an
//! authentication route, or when it shows a password field together with
//! login wording (Korean or English) in the body text.

use dom_query::Document;
use url::Url;

/// Path fragments of authentication routes.
pub const LOGIN_PATHS: &[&str] = &[
    "/login", "/logon", "/signin", "/sign-in", "/sso", "/auth", "/account", "/session",
];

/// Wording that accompanies a login form.
pub const LOGIN_KEYWORDS: &[&str] = &[
    "로그인",
    "login",
    "log in",
    "sign in",
    "비밀번호",
    "password",
    "아이디를 입력",
    "사용자 이름",
    "세션이 만료",
];

/// Whether the URL path (and query) names an authentication route.
#[must_use]
pub fn is_login_url(url: &Url) -> bool {
    let mut target = url.path().to_lowercase();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(&query.to_lowercase());
    }
    LOGIN_PATHS.iter().any(|path| target.contains(path))
}

/// Whether the document shows a password input next to login wording.
#[must_use]
pub fn has_login_form(doc: &Document) -> bool {
    if !doc.select(r#"input[type="password"]"#).exists() {
        return false;
    }
    let body = doc.select("body").text().to_lowercase();
    LOGIN_KEYWORDS.iter().any(|keyword| body.contains(keyword))
}

/// Combined login wall check.
#[must_use]
pub fn is_login_wall(doc: &Document, url: &Url) -> bool {
    is_login_url(url) || has_login_form(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom;

    #[test]
    fn login_routes_detected_from_path() {
        let url = Url::parse("https://cafe.example.kr/member/login?return=/board").unwrap();
        assert!(is_login_url(&url));
        let url = Url::parse("https://auth.example.kr/board/list").unwrap();
        assert!(!is_login_url(&url));
    }

    #[test]
    fn password_field_needs_keyword() {
        let with_keyword = dom::parse(r#"<form><p>Please sign in</p><input type="password"></form>"#);
        assert!(has_login_form(&with_keyword));

        let korean = dom::parse(r#"<form><label>비밀번호</label><input type="password"></form>"#);
        assert!(has_login_form(&korean));

        let no_field = dom::parse("<p>sign in to comment</p>");
        assert!(!has_login_form(&no_field));
    }
}
