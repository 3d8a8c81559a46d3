//! Lead intake: validation and normalisation of form submissions

use crate::error::{Result, VantageError};
use crate::models::{Lead, LeadSource};
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, Ipv6Addr};
use url::{Host, Url};

const MAX_NAME: usize = 120;
const MAX_SHORT_FIELD: usize = 200;
const MAX_TEXT: usize = 2000;
const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

/// Raw form fields as submitted by a visitor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadSubmission {
    pub name: String,
    pub business_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub concern: Option<String>,
    pub industry: Option<String>,
}

impl LeadSubmission {
    /// Builds a submission from `application/x-www-form-urlencoded` pairs.
    /// Unknown keys are ignored.
    pub fn from_form(body: &[u8]) -> Self {
        let mut submission = Self::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            let value = value.into_owned();
            match key.as_ref() {
                "name" => submission.name = value,
                "business_name" | "business" | "company" => submission.business_name = Some(value),
                "email" => submission.email = Some(value),
                "phone" => submission.phone = Some(value),
                "website" | "url" => submission.website = Some(value),
                "concern" | "message" | "reason" => submission.concern = Some(value),
                "industry" => submission.industry = Some(value),
                _ => {}
            }
        }
        submission
    }
}

/// Trims an optional field, mapping blank input to None
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn check_len(field: &str, value: &Option<String>, max: usize, errors: &mut Vec<String>) {
    if let Some(v) = value {
        if v.chars().count() > max {
            errors.push(format!("{field}: must be at most {max} characters"));
        }
    }
}

/// Normalises a submitted website address to an absolute http(s) URL
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(VantageError::invalid("website: is required"));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url = Url::parse(&candidate)
        .map_err(|e| VantageError::invalid(format!("website: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(VantageError::invalid(format!(
            "website: unsupported scheme '{}'",
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(VantageError::invalid("website: missing host"));
    }
    url.set_fragment(None);
    Ok(url.to_string())
}

fn is_private_v4(ip: Ipv4Addr) -> bool {
    ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        // 100.64.0.0/10 carrier-grade NAT
        || (ip.octets()[0] == 100 && (ip.octets()[1] & 0xc0) == 64)
}

fn is_private_v6(ip: Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || (first & 0xfe00) == 0xfc00
        || (first & 0xffc0) == 0xfe80
        || ip.to_ipv4_mapped().is_some_and(is_private_v4)
}

/// True when `url` names a host that is not reachable on the public
/// internet: loopback, private and link-local addresses or local-only names.
/// Unparseable URLs count as private.
pub fn is_private_target(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return true;
    };
    match parsed.host() {
        Some(Host::Ipv4(ip)) => is_private_v4(ip),
        Some(Host::Ipv6(ip)) => is_private_v6(ip),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost"
                || [".localhost", ".local", ".internal"]
                    .iter()
                    .any(|suffix| domain.ends_with(suffix))
        }
        None => true,
    }
}

pub fn is_valid_email(email: &str) -> bool {
    Regex::new(EMAIL_PATTERN)
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

pub fn is_valid_phone(phone: &str) -> bool {
    let allowed = phone
        .chars()
        .all(|c| c.is_ascii_digit() || " +-().".contains(c));
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    allowed && (7..=15).contains(&digits)
}

/// Validates a submission into a new Lead. Every failing field is reported.
pub fn validate(submission: &LeadSubmission, source: LeadSource) -> Result<Lead> {
    let mut errors = Vec::new();

    let name = submission.name.trim().to_string();
    if name.is_empty() {
        errors.push("name: is required".to_string());
    } else if name.chars().count() > MAX_NAME {
        errors.push(format!("name: must be at most {MAX_NAME} characters"));
    }

    let email = clean(&submission.email).map(|e| e.to_lowercase());
    let phone = clean(&submission.phone);
    if email.is_none() && phone.is_none() {
        errors.push("contact: an email address or phone number is required".to_string());
    }
    if let Some(ref e) = email {
        if !is_valid_email(e) {
            errors.push("email: is not a valid address".to_string());
        }
    }
    if let Some(ref p) = phone {
        if !is_valid_phone(p) {
            errors.push("phone: is not a valid number".to_string());
        }
    }

    let website = match clean(&submission.website) {
        Some(raw) => match normalize_url(&raw) {
            Ok(url) => Some(url),
            Err(VantageError::ValidationError(mut e)) => {
                errors.append(&mut e);
                None
            }
            Err(e) => return Err(e),
        },
        None => {
            if source == LeadSource::Audit {
                errors.push("website: is required".to_string());
            }
            None
        }
    };

    let business_name = clean(&submission.business_name);
    let concern = clean(&submission.concern);
    let industry = clean(&submission.industry).map(|i| i.to_lowercase());
    check_len("business_name", &business_name, MAX_SHORT_FIELD, &mut errors);
    check_len("industry", &industry, MAX_SHORT_FIELD, &mut errors);
    check_len("concern", &concern, MAX_TEXT, &mut errors);

    if !errors.is_empty() {
        return Err(VantageError::ValidationError(errors));
    }

    Ok(Lead {
        id: uuid::Uuid::new_v4().to_string(),
        created_at: Utc::now(),
        name,
        business_name,
        email,
        phone,
        website,
        concern,
        industry,
        source,
        scan_id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> LeadSubmission {
        LeadSubmission {
            name: "  Jo Smith ".to_string(),
            business_name: Some("Smith Plumbing".to_string()),
            email: Some("Jo@Example.com".to_string()),
            phone: Some(String::new()),
            website: Some("smithplumbing.co.uk/#top".to_string()),
            concern: Some("Not enough calls".to_string()),
            industry: Some(" Plumbing ".to_string()),
        }
    }

    #[test]
    fn test_private_targets() {
        for url in [
            "http://127.0.0.1:8080/",
            "http://10.0.0.5/",
            "http://192.168.1.1/",
            "http://169.254.169.254/latest/meta-data/",
            "http://[::1]/",
            "http://[fe80::1]/",
            "http://[::ffff:10.0.0.1]/",
            "http://localhost/",
            "http://printer.local/",
            "http://0.0.0.0/",
        ] {
            assert!(is_private_target(url), "{url}");
        }
        for url in ["https://example.com/", "http://93.184.216.34/", "http://[2606:4700::1111]/"] {
            assert!(!is_private_target(url), "{url}");
        }
    }

    #[test]
    fn test_valid_audit_lead() {
        let lead = validate(&submission(), LeadSource::Audit).expect("valid");
        assert_eq!(lead.name, "Jo Smith");
        assert_eq!(lead.email.as_deref(), Some("jo@example.com"));
        assert_eq!(lead.phone, None);
        assert_eq!(lead.website.as_deref(), Some("https://smithplumbing.co.uk/"));
        assert_eq!(lead.industry.as_deref(), Some("plumbing"));
        assert_eq!(lead.source, LeadSource::Audit);
    }

    #[test]
    fn test_reports_every_field() {
        let bad = LeadSubmission {
            name: " ".to_string(),
            email: Some("not-an-email".to_string()),
            website: Some("ftp://example.com".to_string()),
            ..LeadSubmission::default()
        };
        match validate(&bad, LeadSource::Audit) {
            Err(VantageError::ValidationError(errors)) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors.iter().any(|e| e.starts_with("name")));
                assert!(errors.iter().any(|e| e.starts_with("email")));
                assert!(errors.iter().any(|e| e.starts_with("website")));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_contact_lead_needs_no_website() {
        let sub = LeadSubmission {
            name: "Sam".to_string(),
            phone: Some("+44 (0)113 496 0000".to_string()),
            ..LeadSubmission::default()
        };
        let lead = validate(&sub, LeadSource::Contact).expect("valid");
        assert_eq!(lead.website, None);
        assert!(validate(&sub, LeadSource::Audit).is_err());
    }

    #[test]
    fn test_requires_some_contact() {
        let sub = LeadSubmission {
            name: "Sam".to_string(),
            ..LeadSubmission::default()
        };
        assert!(validate(&sub, LeadSource::Contact).is_err());
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("Example.com").expect("ok"),
            "https://example.com/"
        );
        assert_eq!(
            normalize_url("http://127.0.0.1:8080/home").expect("ok"),
            "http://127.0.0.1:8080/home"
        );
        assert!(normalize_url("javascript:alert(1)").is_err());
        assert!(normalize_url("").is_err());
    }

    #[test]
    fn test_phone_validation() {
        assert!(is_valid_phone("0113 496 0000"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("call me maybe"));
    }

    #[test]
    fn test_from_form() {
        let sub = LeadSubmission::from_form(
            b"name=Jo+Smith&email=jo%40example.com&message=Help%21&utm_source=ads",
        );
        assert_eq!(sub.name, "Jo Smith");
        assert_eq!(sub.email.as_deref(), Some("jo@example.com"));
        assert_eq!(sub.concern.as_deref(), Some("Help!"));
    }
}
