//! HTML report generation using Tera templates

use crate::error::{Result, VantageError};
use crate::models::{CheckStatus, Lead, Scan};
use serde::Serialize;
use std::path::Path;
use tera::{Context, Tera};
use tracing::{debug, info};

const TEMPLATE_NAME: &str = "report.html";

#[derive(Serialize)]
struct CategoryRow {
    label: &'static str,
    score: u8,
}

#[derive(Serialize)]
struct CheckRow<'a> {
    title: &'a str,
    category: &'static str,
    status: String,
    color: &'a str,
    delta: i32,
    effort: String,
    impact: String,
    detail: &'a str,
    recommendation: &'a str,
}

/// Loads the override template from `templates_dir` (or `./templates`),
/// falling back to the embedded default
fn load_template(templates_dir: Option<&Path>) -> String {
    let path = templates_dir
        .unwrap_or_else(|| Path::new("templates"))
        .join(TEMPLATE_NAME);
    match std::fs::read_to_string(&path) {
        Ok(content) => {
            debug!("Using report template {}", path.display());
            content
        }
        Err(_) => default_template().to_string(),
    }
}

/// Renders the report for a completed scan to a string
pub fn render(scan: &Scan, lead: Option<&Lead>, templates_dir: Option<&Path>) -> Result<String> {
    let scores = scan.scores.as_ref().ok_or_else(|| {
        VantageError::ReportError(format!("Scan {} has no scores yet", scan.id))
    })?;

    let mut tera = Tera::default();
    tera.add_raw_template(TEMPLATE_NAME, &load_template(templates_dir))?;

    let categories: Vec<CategoryRow> = scores
        .categories
        .iter()
        .map(|(category, score)| CategoryRow {
            label: category.label(),
            score: *score,
        })
        .collect();
    let checks: Vec<CheckRow> = scan
        .checks
        .iter()
        .map(|c| CheckRow {
            title: &c.title,
            category: c.category.label(),
            status: c.status.to_string(),
            color: c.status.html_color(),
            delta: c.score_delta,
            effort: c.effort.to_string(),
            impact: c.impact.to_string(),
            detail: &c.detail,
            recommendation: &c.recommendation,
        })
        .collect();
    let paragraphs: Vec<&str> = scan
        .narrative
        .as_deref()
        .unwrap_or_default()
        .split("\n\n")
        .filter(|p| !p.trim().is_empty())
        .collect();

    let mut context = Context::new();
    context.insert("target", &scan.target);
    context.insert("scan_id", &scan.id);
    context.insert("lead", &lead);
    context.insert("overall", &scores.overall);
    context.insert("grade", &scores.grade);
    context.insert("categories", &categories);
    context.insert("paragraphs", &paragraphs);
    context.insert("checks", &checks);
    context.insert("red_count", &scan.count_by_status(CheckStatus::Red));
    context.insert("amber_count", &scan.count_by_status(CheckStatus::Amber));
    context.insert("green_count", &scan.count_by_status(CheckStatus::Green));
    context.insert(
        "finished_at",
        &scan
            .finished_at
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "N/A".to_string()),
    );
    context.insert("version", env!("CARGO_PKG_VERSION"));

    Ok(tera.render(TEMPLATE_NAME, &context)?)
}

/// Generates an HTML report file
pub fn generate(
    scan: &Scan,
    lead: Option<&Lead>,
    templates_dir: Option<&Path>,
    output_path: &Path,
) -> Result<()> {
    let rendered = render(scan, lead, templates_dir)?;
    std::fs::write(output_path, rendered)?;
    info!("HTML report saved to {}", output_path.display());
    Ok(())
}

fn default_template() -> &'static str {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Website Audit - {{ target }}</title>
    <style>
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #f8fafc; color: #1e293b; line-height: 1.6; }
        .container { max-width: 960px; margin: 0 auto; padding: 20px; }
        .header { background: linear-gradient(135deg, #0f172a 0%, #1e3a8a 100%); color: white; padding: 36px 30px; border-radius: 12px; margin-bottom: 24px; }
        .header h1 { font-size: 1.9em; margin-bottom: 4px; }
        .header .meta { opacity: 0.75; font-size: 0.9em; }
        .score { display: flex; align-items: center; gap: 24px; background: white; padding: 24px; border-radius: 10px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); margin-bottom: 24px; }
        .score .overall { font-size: 3.2em; font-weight: 800; }
        .score .grade { font-size: 1.4em; font-weight: 700; padding: 6px 16px; border-radius: 8px; background: #e2e8f0; }
        .categories { display: grid; grid-template-columns: repeat(5, 1fr); gap: 12px; margin-bottom: 24px; }
        @media (max-width: 768px) { .categories { grid-template-columns: repeat(2, 1fr); } }
        .card { background: white; padding: 18px 10px; border-radius: 10px; text-align: center; box-shadow: 0 1px 3px rgba(0,0,0,0.1); }
        .card .count { font-size: 2em; font-weight: 800; }
        .card .label { font-size: 0.8em; text-transform: uppercase; letter-spacing: 1px; opacity: 0.7; }
        .section-title { font-size: 1.3em; font-weight: 700; margin: 28px 0 12px; padding-bottom: 8px; border-bottom: 2px solid #e2e8f0; }
        .narrative p { margin-bottom: 12px; white-space: pre-line; }
        .check { background: white; padding: 18px 22px; border-radius: 10px; margin-bottom: 12px; box-shadow: 0 1px 3px rgba(0,0,0,0.1); border-left: 4px solid #e2e8f0; }
        .check h3 { font-size: 1.05em; margin-bottom: 6px; }
        .badge { display: inline-block; padding: 2px 10px; border-radius: 20px; color: white; font-size: 0.75em; font-weight: 700; margin-right: 8px; vertical-align: middle; }
        .check p { color: #475569; margin: 4px 0; }
        .check .meta-info { font-size: 0.8em; color: #64748b; margin-top: 6px; }
        .footer { text-align: center; padding: 30px; color: #94a3b8; font-size: 0.85em; }
    </style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Website Audit</h1>
            <div class="meta">{% if lead %}Prepared for {% if lead.business_name %}{{ lead.business_name }}{% else %}{{ lead.name }}{% endif %} | {% endif %}{{ target }} | {{ finished_at }}</div>
        </div>
        <div class="score">
            <div class="overall">{{ overall }}/100</div>
            <div class="grade">Grade {{ grade }}</div>
            <div>{{ red_count }} to fix, {{ amber_count }} to improve, {{ green_count }} passing</div>
        </div>
        <div class="categories">
            {% for category in categories %}
            <div class="card"><div class="count">{{ category.score }}</div><div class="label">{{ category.label }}</div></div>
            {% endfor %}
        </div>
        <div class="section-title">Summary</div>
        <div class="narrative">
            {% for paragraph in paragraphs %}<p>{{ paragraph }}</p>
            {% endfor %}
        </div>
        <div class="section-title">Checks ({{ checks | length }})</div>
        {% for check in checks %}
        <div class="check" style="border-left-color: {{ check.color }}">
            <h3><span class="badge" style="background: {{ check.color }}">{{ check.status }}</span>{{ check.title }}</h3>
            {% if check.detail %}<p>{{ check.detail }}</p>{% endif %}
            {% if check.recommendation %}<p><strong>Recommendation:</strong> {{ check.recommendation }}</p>{% endif %}
            <div class="meta-info">{{ check.category }} | impact {{ check.impact }} | effort {{ check.effort }}{% if check.delta != 0 %} | {{ check.delta }} points{% endif %}</div>
        </div>
        {% endfor %}
        <div class="footer">Vantage v{{ version }} | Scan {{ scan_id }}</div>
    </div>
</body>
</html>"#
}
