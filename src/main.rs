//! Course-Spider main entry point
//!
//! This is the command-line interface for the Course-Spider authenticated crawler.

use clap::Parser;
use course_spider::auth::CredentialSession;
use course_spider::config::{load_config_with_hash, validate, Config};
use course_spider::crawler::{crawl, user_agent};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Course-Spider: an authenticated course site crawler
///
/// Course-Spider logs into an Open edX style site, crawls the pages of one
/// course and records the URL and title of every page it visits. If the site
/// logs it out mid-crawl it logs back in and resumes where it left off.
#[derive(Parser, Debug)]
#[command(name = "course-spider")]
#[command(version = "1.0.0")]
#[command(about = "An authenticated course site crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Site host, overrides [site] domain
    #[arg(long)]
    domain: Option<String>,

    /// Login email, overrides [credentials] email
    #[arg(long)]
    email: Option<String>,

    /// Login password, overrides [credentials] password
    #[arg(long)]
    password: Option<String>,

    /// Basic-auth user, overrides [credentials] http-user
    #[arg(long)]
    http_user: Option<String>,

    /// Basic-auth password, overrides [credentials] http-pass
    #[arg(long)]
    http_pass: Option<String>,

    /// Course key, overrides [site] course-key
    #[arg(long)]
    course_key: Option<String>,

    /// Output directory, overrides [output] data-dir
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(domain) = &self.domain {
            config.site.domain = domain.clone();
        }
        if let Some(course_key) = &self.course_key {
            config.site.course_key = course_key.clone();
        }
        if let Some(email) = &self.email {
            config.credentials.email = Some(email.clone());
        }
        if let Some(password) = &self.password {
            config.credentials.password = Some(password.clone());
        }
        if let Some(http_user) = &self.http_user {
            config.credentials.http_user = Some(http_user.clone());
        }
        if let Some(http_pass) = &self.http_pass {
            config.credentials.http_pass = Some(http_pass.clone());
        }
        if let Some(data_dir) = &self.data_dir {
            config.output.data_dir = data_dir.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    cli.apply_overrides(&mut config);
    if let Err(e) = validate(&config) {
        tracing::error!("Invalid configuration after command-line overrides: {}", e);
        return Err(e.into());
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("course_spider=info,warn"),
            1 => EnvFilter::new("course_spider=debug,info"),
            2 => EnvFilter::new("course_spider=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let session = CredentialSession::from_config(config)?;

    println!("=== Course-Spider Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", session.base_url());
    println!("  Course key: {}", config.site.course_key);

    println!("\nLogin:");
    println!("  Login page: {}", session.login_page_url());
    println!("  Login API: {}", session.login_api_url());
    if session.has_credentials() {
        println!("  Email: {}", session.email());
    } else {
        println!("  Email/password: missing (the crawl would not start)");
    }
    if let Some(auth) = session.basic_auth() {
        println!("  Basic auth user: {}", auth.user);
    }

    println!("\nCrawler Configuration:");
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!("  Download delay: {}ms", config.crawler.download_delay);
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!(
        "  Max re-authentications per page: {}",
        config.crawler.max_reauth_attempts
    );
    println!("  User agent: {}", user_agent(&config.user_agent));

    println!("\nOutput:");
    println!("  Data directory: {}", config.output.data_dir.display());
    println!("  Format: {:?}", config.output.format);

    println!("\nStart URLs:");
    for url in session.start_urls() {
        println!("  - {}", url);
    }
    println!("\nCourse blocks API:");
    println!("  {}", session.course_blocks_url());

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    match crawl(config, config_hash).await {
        Ok(stats) if stats.halted() => {
            tracing::error!("Crawl stopped early: login failed");
            Ok(())
        }
        Ok(stats) => {
            tracing::info!(
                "Crawl completed successfully ({} pages)",
                stats.pages_recorded
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
