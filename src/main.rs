use std::io::Write;
use std::path::{Path, PathBuf};

use tower::Service;
use tracing_subscriber::EnvFilter;

use history_scraper::config::{
    load_browser_settings, load_usage_config, load_weather_config, DEFAULT_DATA_DIR,
    DEFAULT_DOWNLOAD_DIR,
};
use history_scraper::{
    merge_artifacts, ScrapeOutcome, ScrapeRequest, ScraperError, ScraperService,
};

const BROWSER_KEYS: &str = "keys/browser.yml";
const WEATHER_KEYS: &str = "keys/weather.yml";
const USAGE_KEYS: &str = "keys/usage.yml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let mode = match args.next() {
        Some(mode) => mode,
        None => prompt_mode()?,
    };

    match mode.as_str() {
        "weather" => run_weather().await?,
        "usage" => run_usage().await?,
        "merge" => {
            let dir = args
                .next()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR));
            run_merge(&dir)?;
        }
        other => {
            eprintln!("unknown mode {:?}; expected weather, usage, or merge", other);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn prompt_mode() -> std::io::Result<String> {
    println!("Select a mode:");
    println!("  1) weather - scrape daily weather history");
    println!("  2) usage   - export usage data behind a manual login");
    println!("  3) merge   - combine previously downloaded exports");
    print!("> ");
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(match line.trim() {
        "1" => "weather".to_string(),
        "2" => "usage".to_string(),
        "3" => "merge".to_string(),
        other => other.to_string(),
    })
}

async fn run_weather() -> Result<(), ScraperError> {
    let browser = load_browser_settings(Path::new(BROWSER_KEYS))?;
    let config = load_weather_config(Path::new(WEATHER_KEYS))?;

    let mut service = ScraperService::new();
    let outcome = service
        .call(ScrapeRequest::weather(config).with_browser(browser))
        .await?;

    if let ScrapeOutcome::Weather(report) = outcome {
        println!("Daily table: {}", report.daily_path.display());
        if let Some(hourly) = &report.hourly_path {
            println!("Hourly table: {}", hourly.display());
        }
        println!("Missing value count: {}", report.missing_values);
    }
    Ok(())
}

async fn run_usage() -> Result<(), ScraperError> {
    let browser = load_browser_settings(Path::new(BROWSER_KEYS))?;
    let config = load_usage_config(Path::new(USAGE_KEYS))?;

    let mut service = ScraperService::new();
    let outcome = service
        .call(ScrapeRequest::usage(config).with_browser(browser))
        .await?;

    if let ScrapeOutcome::Usage(report) = outcome {
        println!(
            "Exported {} windows into {}",
            report.periods,
            report.download_dir.display()
        );
    }
    Ok(())
}

fn run_merge(dir: &Path) -> Result<(), ScraperError> {
    match merge_artifacts(dir) {
        Ok(table) => {
            let path = table.save(Path::new(DEFAULT_DATA_DIR), "usage")?;
            println!(
                "Merged {} files into {}",
                table.sources.len(),
                path.display()
            );
            Ok(())
        }
        Err(ScraperError::EmptyAggregation(dir)) => {
            println!("Nothing to merge in {}", dir.display());
            Ok(())
        }
        Err(e) => Err(e),
    }
}
