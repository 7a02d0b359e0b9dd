//! 燃料価格スクレイパー CLI
//!
//! 使い方:
//!   fuel-prices <BRAND> [--city <NAME> | --all] [--output-dir DIR] [--debug] [--json]
//!   fuel-prices --list
//!
//! `.env` があれば読み込む（FUEL_OUTPUT_DIR, FUEL_HEADLESS, CHROME_PATH など）。

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tower::Service;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fuel_price_scraper::{Brand, ScrapeReport, ScrapeRequest, ScrapeTarget, ScraperService};

#[derive(Parser, Debug)]
#[command(name = "fuel-prices", about = "トルコ燃料ブランドの都市別価格を取得する")]
struct Cli {
    /// ブランド名（shell, opet, petrolofisi など。一覧は --list）
    brand: Option<String>,

    /// 1都市だけ取得する
    #[arg(long, conflicts_with = "all")]
    city: Option<String>,

    /// 全都市を取得する（既定）
    #[arg(long)]
    all: bool,

    /// 出力ディレクトリ
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// ヘッド付きで起動し、ブラウザログとスクリーンショットを出す
    #[arg(long)]
    debug: bool,

    /// 結果をJSONで標準出力に出す
    #[arg(long)]
    json: bool,

    /// 対応ブランドの一覧
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.list {
        for brand in Brand::ALL {
            println!("{:<12} {}", brand.prefix(), brand.display_name());
        }
        return Ok(());
    }

    let Some(name) = cli.brand.as_deref() else {
        bail!("brand is required (use --list to see supported brands)");
    };
    let brand: Brand = name.parse()?;

    let target = match cli.city {
        Some(city) if !cli.all => ScrapeTarget::City(city),
        _ => ScrapeTarget::All,
    };

    let mut request = ScrapeRequest::new(brand).with_target(target);
    let mut config = request.config.clone().with_debug(cli.debug);
    if let Some(dir) = cli.output_dir {
        config = config.with_output_dir(dir);
    }
    request = request.with_config(config);

    info!(
        "Starting {} -> {}",
        brand.display_name(),
        request.config.output_dir.display()
    );

    let mut service = ScraperService::new();
    let report = service
        .call(request)
        .await
        .with_context(|| format!("{} scrape failed", brand.display_name()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &ScrapeReport) {
    println!("{}: saved {} file(s)", report.brand, report.saved.len());
    for path in &report.saved {
        println!("  {}", path.display());
    }
    if !report.skipped.is_empty() {
        println!("skipped {} city(ies):", report.skipped.len());
        for skipped in &report.skipped {
            println!("  {}: {}", skipped.city, skipped.reason);
        }
    }
}
