//! CSV lead export (RFC 4180 compliant)

use crate::models::Lead;

const HEADER: &str =
    "id,created_at,source,name,business_name,email,phone,website,industry,concern,scan_id";

/// Escapes a field for CSV according to RFC 4180
fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Renders leads as CSV with a header row and CRLF line endings
pub fn leads_to_csv(leads: &[Lead]) -> String {
    let mut out = String::with_capacity(128 * (leads.len() + 1));
    out.push_str(HEADER);
    out.push_str("\r\n");

    for lead in leads {
        let created_at = lead.created_at.to_rfc3339();
        let source = lead.source.to_string();
        let fields = [
            lead.id.as_str(),
            created_at.as_str(),
            source.as_str(),
            lead.name.as_str(),
            lead.business_name.as_deref().unwrap_or(""),
            lead.email.as_deref().unwrap_or(""),
            lead.phone.as_deref().unwrap_or(""),
            lead.website.as_deref().unwrap_or(""),
            lead.industry.as_deref().unwrap_or(""),
            lead.concern.as_deref().unwrap_or(""),
            lead.scan_id.as_deref().unwrap_or(""),
        ];
        let row: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape_csv("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_leads_to_csv() {
        let csv = leads_to_csv(&[fixtures::lead()]);
        let mut lines = csv.split("\r\n");
        assert_eq!(lines.next(), Some(HEADER));
        let row = lines.next().expect("row");
        assert!(row.starts_with("lead-1,"));
        assert!(row.contains(",audit,Jo Smith,\"Smith & Sons, Plumbing\",jo@example.com,"));
        assert!(row.contains("\"Not enough \"\"calls\"\"\""));
        assert_eq!(lines.next(), Some(""));
    }

    #[test]
    fn test_empty_export_has_header() {
        assert_eq!(leads_to_csv(&[]), format!("{HEADER}\r\n"));
    }
}
