//! Vantage - agency backend and website audit CLI

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use vantage::audit::{narrative, AuditEngine, Page};
use vantage::config::{self, AppConfig};
use vantage::http::HttpClient;
use vantage::leads;
use vantage::models::{Category, CheckStatus, Scan, Scores};
use vantage::report;
use vantage::server::{ApiServer, AppState};

/// Vantage - lead capture, website audits and bookings for a web agency
#[derive(Parser)]
#[command(name = "vantage", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API with background audit workers
    Serve {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to listen on, e.g. 0.0.0.0:8080
        #[arg(short, long)]
        bind: Option<String>,

        /// Static admin token (also read from VANTAGE_ADMIN_TOKEN)
        #[arg(long)]
        admin_token: Option<String>,

        /// Directory for the state snapshot
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Directory for rendered reports
        #[arg(long)]
        reports_dir: Option<PathBuf>,

        /// Number of audit workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Audit a single website from the command line
    Audit {
        /// Website to audit
        #[arg(short, long)]
        target: String,

        /// Auditors to run (comma-separated)
        #[arg(long, value_delimiter = ',')]
        checks: Option<Vec<String>>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Output file path (default: vantage_{hostname}.{ext})
        #[arg(short, long)]
        output: Option<String>,

        /// Output format (html, json, or pdf)
        #[arg(short, long, default_value = "html")]
        format: String,

        /// Exit with code 1 if the overall score is below this value
        #[arg(long)]
        fail_below: Option<u8>,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List available auditors
    Checks,

    /// Render a report from a previous audit's JSON output
    Report {
        /// Path to the JSON scan file
        #[arg(short, long)]
        input: PathBuf,

        /// Output format (html, json, or pdf)
        #[arg(short, long, default_value = "html")]
        format: String,

        /// Output file path
        #[arg(short, long, default_value = "vantage_report.html")]
        output: String,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "vantage=debug" } else { "vantage=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn load_app_config(path: Option<&Path>) -> vantage::error::Result<AppConfig> {
    match path {
        Some(p) => config::load_config(p),
        None => {
            let default_path = Path::new("config/default.toml");
            if default_path.exists() {
                config::load_config(default_path)
            } else {
                Ok(AppConfig::default())
            }
        }
    }
}

fn output_name_from_target(target: &str, ext: &str) -> String {
    if let Ok(url) = Url::parse(target) {
        let host = url.host_str().unwrap_or("unknown");
        let sanitized: String = host
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect();
        format!("vantage_{sanitized}.{ext}")
    } else {
        format!("vantage_report.{ext}")
    }
}

fn print_banner() {
    let banner = r#"
    +---------------------------------------+
    |  VANTAGE v0.1.0                       |
    |  Website audits for small businesses  |
    +---------------------------------------+
    "#;
    println!("{}", banner.cyan());
}

fn colored_score(score: u8) -> colored::ColoredString {
    let text = format!("{score}/100");
    match score {
        80..=100 => text.green().bold(),
        60..=79 => text.yellow().bold(),
        _ => text.red().bold(),
    }
}

fn print_summary(scan: &Scan) {
    let Some(ref scores) = scan.scores else {
        println!("  {}", "Scan has no scores".yellow());
        return;
    };

    println!("\n{}", "  Audit Summary".bold());
    println!("  {}", "-".repeat(35));

    let mut builder = Builder::default();
    builder.push_record(["Category", "Score"]);
    for category in Category::ALL {
        if let Some(score) = scores.categories.get(&category) {
            builder.push_record([category.label().to_string(), format!("{score}/100")]);
        }
    }
    builder.push_record([
        "Overall".to_string(),
        format!("{}/100 ({})", scores.overall, scores.grade),
    ]);

    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{table}");

    println!(
        "\n  {} {}  {} {} {}",
        "Overall:".bold(),
        colored_score(scores.overall),
        format!("{} red", scan.count_by_status(CheckStatus::Red)).red(),
        format!("{} amber", scan.count_by_status(CheckStatus::Amber)).yellow(),
        format!("{} green", scan.count_by_status(CheckStatus::Green)).green(),
    );

    for check in scan.checks.iter().filter(|c| !c.is_passing()) {
        let label = match check.status {
            CheckStatus::Red => check.status.to_string().red().bold(),
            _ => check.status.to_string().yellow(),
        };
        println!("    {label:6} {} {}", check.title.bold(), check.detail);
    }
}

fn write_output(scan: &Scan, format: &str, output_path: &Path) -> vantage::error::Result<()> {
    match format {
        "json" => report::json::export(scan, output_path),
        "pdf" => report::pdf::generate(scan, None, output_path),
        _ => report::html::generate(scan, None, None, output_path),
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config: config_path,
            bind,
            admin_token,
            data_dir,
            reports_dir,
            workers,
            verbose,
        } => {
            init_tracing(verbose);
            print_banner();

            let mut app_config = load_app_config(config_path.as_deref())?;
            config::apply_env(&mut app_config);
            config::merge_cli_args(
                &mut app_config,
                bind,
                admin_token,
                data_dir,
                reports_dir,
                workers,
            );
            config::validate(&app_config)?;

            println!(
                "  {} {}",
                "Workers:".bold(),
                app_config.audit.workers.to_string().cyan()
            );
            println!(
                "  {} {}",
                "Auditors:".bold(),
                app_config.audit.checks.join(", ").cyan()
            );

            let state = AppState::bootstrap(app_config).await?;
            let server = ApiServer::bind(state).await?;
            println!(
                "  {} {}\n",
                "Listening on:".bold(),
                format!("http://{}", server.local_addr()?).green()
            );

            tokio::select! {
                result = server.serve() => result?,
                _ = tokio::signal::ctrl_c() => info!("Shutting down"),
            }
        }

        Commands::Audit {
            target,
            checks,
            timeout,
            output,
            format,
            fail_below,
            config: config_path,
            verbose,
        } => {
            init_tracing(verbose);
            print_banner();

            let mut app_config = load_app_config(config_path.as_deref())?;
            if let Some(c) = checks {
                app_config.audit.checks = c;
            }
            if let Some(t) = timeout {
                app_config.audit.timeout_secs = t;
            }
            let target = leads::normalize_url(&target)?;

            println!("  {} {}", "Target:".bold(), target.green());
            println!(
                "  {} {}\n",
                "Auditors:".bold(),
                app_config.audit.checks.join(", ").cyan()
            );

            let client = HttpClient::from_config(&app_config.audit)?;
            let page = Page::fetch(&client, &target).await?;
            let engine = AuditEngine::with_defaults();
            let checks = engine.run(&client, &page, &app_config.audit).await;

            let scores = Scores::from_checks(&checks);
            let text = narrative::generate(&scores, &checks, None, &target);
            let mut scan = Scan::new(target.clone(), None);
            scan.start()?;
            scan.complete(checks, text, None)?;

            print_summary(&scan);

            let output_file = output.unwrap_or_else(|| {
                let ext = match format.as_str() {
                    "json" => "json",
                    "pdf" => "pdf",
                    _ => "html",
                };
                output_name_from_target(&target, ext)
            });
            write_output(&scan, &format, Path::new(&output_file))?;
            println!("\n  {} {}", "Report saved to:".bold(), output_file.green());

            if let Some(threshold) = fail_below {
                let overall = scan.scores.as_ref().map_or(0, |s| s.overall);
                if overall < threshold {
                    println!(
                        "\n  {} Overall score {} is below {}.",
                        "FAIL:".red().bold(),
                        overall,
                        threshold
                    );
                    std::process::exit(1);
                }
            }
        }

        Commands::Checks => {
            print_banner();
            let engine = AuditEngine::with_defaults();

            println!("  {}\n", "Available Auditors:".bold());
            for (name, description) in engine.list_auditors() {
                println!("    {} {}", format!("{name:15}").cyan().bold(), description);
            }
            println!();
        }

        Commands::Report {
            input,
            format,
            output,
        } => {
            init_tracing(false);
            print_banner();

            let scan = report::json::load(&input)?;
            write_output(&scan, &format, Path::new(&output))?;

            print_summary(&scan);
            println!("\n  {} {}", "Report saved to:".bold(), output.green());
        }
    }

    Ok(())
}
