//! crates/arunika_core/src/share.rs
//!
//! Builds and parses the shareable public course link:
//! `{origin}/{path}#/course/{id}?cfg={base64 JSON of {endpointUrl, apiKey}}`.
//!
//! The optional `cfg` part hands the backend credentials to whoever opens the
//! link, so it must only be attached deliberately.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use url::form_urlencoded;

use crate::domain::RemoteConfig;

const COURSE_ROUTE: &str = "#/course/";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareLinkError {
    #[error("Link does not point at a course")]
    NotACourseLink,
    #[error("Link has an empty course id")]
    MissingCourseId,
    #[error("Embedded configuration is not valid base64")]
    InvalidEncoding,
    #[error("Embedded configuration is not valid JSON: {0}")]
    InvalidConfig(String),
}

/// A parsed public link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedLink {
    pub course_id: String,
    pub remote: Option<RemoteConfig>,
}

/// Builds the public link for `course_id`. `base_url` is the origin plus path
/// of the viewer, e.g. `https://learn.example.com/`.
pub fn course_link(base_url: &str, course_id: &str, remote: Option<&RemoteConfig>) -> String {
    let mut link = format!("{}{}{}", base_url.trim_end_matches('#'), COURSE_ROUTE, course_id);
    if let Some(remote) = remote.filter(|r| r.is_complete()) {
        let json = serde_json::json!({
            "endpointUrl": remote.endpoint_url,
            "apiKey": remote.api_key,
        });
        link.push_str("?cfg=");
        link.push_str(&STANDARD.encode(json.to_string()));
    }
    link
}

pub fn parse_course_link(link: &str) -> Result<SharedLink, ShareLinkError> {
    let (_, route) = link
        .split_once(COURSE_ROUTE)
        .ok_or(ShareLinkError::NotACourseLink)?;
    let (course_id, query) = match route.split_once('?') {
        Some((id, query)) => (id, Some(query)),
        None => (route, None),
    };
    let course_id = course_id.trim_end_matches('/');
    if course_id.is_empty() {
        return Err(ShareLinkError::MissingCourseId);
    }

    let cfg = query.and_then(|q| {
        form_urlencoded::parse(q.as_bytes())
            .find(|(key, _)| key == "cfg")
            .map(|(_, value)| value.into_owned())
            .filter(|v| !v.is_empty())
    });
    let remote = match cfg {
        Some(encoded) => Some(decode_config(&encoded)?),
        None => None,
    };

    Ok(SharedLink {
        course_id: course_id.to_string(),
        remote,
    })
}

fn decode_config(encoded: &str) -> Result<RemoteConfig, ShareLinkError> {
    // Form decoding turns a bare `+` into a space; base64 never contains one.
    let encoded = encoded.replace(' ', "+");
    let bytes = STANDARD
        .decode(encoded.as_bytes())
        .or_else(|_| URL_SAFE.decode(encoded.as_bytes()))
        .map_err(|_| ShareLinkError::InvalidEncoding)?;
    serde_json::from_slice(&bytes).map_err(|e| ShareLinkError::InvalidConfig(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_without_credentials() {
        let link = course_link("https://learn.example.com/", "course-42", None);
        assert_eq!(link, "https://learn.example.com/#/course/course-42");

        let parsed = parse_course_link(&link).unwrap();
        assert_eq!(parsed.course_id, "course-42");
        assert_eq!(parsed.remote, None);
    }

    #[test]
    fn link_carries_credentials() {
        let remote = RemoteConfig::new("postgres://db.example.co:5432/postgres", "s3cret");
        let link = course_link("https://learn.example.com/app/", "course-42", Some(&remote));
        assert!(link.starts_with("https://learn.example.com/app/#/course/course-42?cfg="));

        let parsed = parse_course_link(&link).unwrap();
        assert_eq!(parsed.remote, Some(remote));
    }

    #[test]
    fn cfg_payload_uses_camel_case_keys() {
        let remote = RemoteConfig::new("https://x.example.co", "key");
        let link = course_link("https://a/", "c", Some(&remote));
        let encoded = link.split("cfg=").nth(1).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&STANDARD.decode(encoded).unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "endpointUrl": "https://x.example.co", "apiKey": "key" })
        );
    }

    #[test]
    fn percent_encoded_cfg_is_decoded() {
        let remote = RemoteConfig::new("postgres://db.example.co/postgres?sslmode=require", "k~~>");
        let link = course_link("https://a/", "c", Some(&remote));
        let (base, encoded) = link.split_once("cfg=").unwrap();
        assert!(encoded.contains('+') && encoded.contains('/'));

        // Lower-case escapes, as some chat apps rewrite pasted links.
        let escaped: String = encoded
            .chars()
            .map(|ch| match ch {
                '+' => "%2b".to_string(),
                '/' => "%2f".to_string(),
                '=' => "%3d".to_string(),
                other => other.to_string(),
            })
            .collect();
        let parsed = parse_course_link(&format!("{base}cfg={escaped}&utm_source=chat")).unwrap();
        assert_eq!(parsed.remote, Some(remote.clone()));

        // A bare `+` survives form decoding.
        let parsed = parse_course_link(&link).unwrap();
        assert_eq!(parsed.remote, Some(remote));
    }

    #[test]
    fn incomplete_credentials_are_not_embedded() {
        let remote = RemoteConfig::new("https://x.example.co", "");
        let link = course_link("https://a/", "c", Some(&remote));
        assert!(!link.contains("cfg="));
    }

    #[test]
    fn rejects_malformed_links() {
        assert_eq!(
            parse_course_link("https://a/#/admin"),
            Err(ShareLinkError::NotACourseLink)
        );
        assert_eq!(
            parse_course_link("https://a/#/course/?cfg=abc"),
            Err(ShareLinkError::MissingCourseId)
        );
        assert_eq!(
            parse_course_link("https://a/#/course/c?cfg=***"),
            Err(ShareLinkError::InvalidEncoding)
        );
    }
}
