use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use proxy_harvest::{
    assemble_pool,
    bootstrap::DEFAULT_LISTING_URL,
    config::{DEFAULT_MAX_DEPTH, DEFAULT_OUTPUT_PATH},
    describe_egress, AddressExtractor, Aggregator, ChromeSessionFactory, ExtractionPass,
    FreeTextPass, ListingBootstrap, OutputMode, PoolConfig, ProxyIdentity, ProxyParser, ProxySource, RunReport,
    SeedConfig, SessionConfig, StaticProxies, StructuredPass, WorkerPool,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Crawl a site with headless browsers and harvest candidate proxy addresses
#[derive(Parser)]
#[command(name = "proxy-harvest")]
#[command(about = "Crawl a site with headless browsers and harvest candidate proxy addresses")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Append,
    Overwrite,
}

impl From<Mode> for OutputMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Append => OutputMode::Append,
            Mode::Overwrite => OutputMode::Overwrite,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Pass {
    Structured,
    FreeText,
}

/// Build an extractor from the selected passes (all of them when none are given)
fn build_extractor(passes: &[Pass]) -> AddressExtractor {
    if passes.is_empty() {
        return AddressExtractor::new();
    }
    let passes: Vec<Box<dyn ExtractionPass>> = passes
        .iter()
        .map(|pass| -> Box<dyn ExtractionPass> {
            match pass {
                Pass::Structured => Box::new(StructuredPass),
                Pass::FreeText => Box::new(FreeTextPass),
            }
        })
        .collect();
    AddressExtractor::with_passes(passes)
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl from a seed URL and save discovered addresses
    Crawl {
        /// Absolute http(s) URL to start from
        url: String,
        /// Link hops to follow below the seed page
        #[arg(short, long, default_value_t = DEFAULT_MAX_DEPTH)]
        depth: usize,
        /// Output file
        #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
        output: PathBuf,
        /// Append to or overwrite the output file
        #[arg(short, long, value_enum, default_value = "append")]
        mode: Mode,
        /// Proxy to crawl through (repeatable, IP:PORT)
        #[arg(short, long)]
        proxy: Vec<String>,
        /// File containing proxies (one per line)
        #[arg(short = 'f', long)]
        proxy_file: Option<PathBuf>,
        /// Also scrape a public proxy listing for crawl proxies
        #[arg(long)]
        bootstrap: bool,
        /// Listing page used by --bootstrap
        #[arg(long, default_value = DEFAULT_LISTING_URL)]
        listing_url: String,
        /// User agent (repeatable; built-in list when omitted)
        #[arg(short = 'a', long)]
        user_agent: Vec<String>,
        /// Page load timeout in seconds
        #[arg(long, default_value = "30")]
        page_timeout: u64,
        /// Wait after each load for scripts to render, in milliseconds
        #[arg(long, default_value = "2000")]
        settle: u64,
        /// Delay between worker launches, in milliseconds
        #[arg(long, default_value = "2000")]
        stagger: u64,
        /// Give up on a worker after this many seconds
        #[arg(long)]
        worker_timeout: Option<u64>,
        /// Download list files through the worker's proxy
        #[arg(long)]
        download_via_proxy: bool,
        /// Chromium executable
        #[arg(long)]
        chrome: Option<PathBuf>,
        /// Show the browser windows
        #[arg(long)]
        headful: bool,
        /// Write a JSON run report to this file
        #[arg(long)]
        report: Option<PathBuf>,
        /// Extraction pass to run (repeatable; all passes when omitted)
        #[arg(long, value_enum)]
        pass: Vec<Pass>,
    },
    /// Extract candidate addresses from a local HTML or text file
    Extract {
        /// Input file
        input: PathBuf,
        /// Extraction pass to run (repeatable; all passes when omitted)
        #[arg(long, value_enum)]
        pass: Vec<Pass>,
    },
    /// Fetch a public proxy listing and print it
    Bootstrap {
        /// Listing page to scrape
        #[arg(long, default_value = DEFAULT_LISTING_URL)]
        listing_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Crawl {
            url,
            depth,
            output,
            mode,
            proxy,
            proxy_file,
            bootstrap,
            listing_url,
            user_agent,
            page_timeout,
            settle,
            stagger,
            worker_timeout,
            download_via_proxy,
            chrome,
            headful,
            report,
            pass,
        } => {
            let mut manual = ProxyParser::parse_string(&proxy.join("\n"));
            if let Some(path) = proxy_file {
                let from_file = ProxyParser::parse_file(&path)
                    .with_context(|| format!("reading proxy file {:?}", path))?;
                println!("Loaded {} proxies from {:?}", from_file.len(), path);
                manual.extend(from_file);
            }

            let mut sources: Vec<Box<dyn ProxySource>> = vec![Box::new(StaticProxies::new(manual))];
            if bootstrap {
                sources.push(Box::new(ListingBootstrap::with_url(&listing_url)?));
            }
            let proxy_pool = proxy_pool_for(&url, &sources).await?;

            let seed = SeedConfig::new(&url)
                .with_max_depth(depth)
                .with_output_path(&output)
                .with_output_mode(mode.into())
                .with_proxy_pool(proxy_pool)
                .with_user_agents(user_agent);

            let mut session_config = SessionConfig::new()
                .with_page_timeout(Duration::from_secs(page_timeout))
                .with_settle_delay(Duration::from_millis(settle))
                .with_headless(!headful);
            if let Some(path) = chrome {
                session_config = session_config.with_chrome_executable(path);
            }

            let mut pool_config = PoolConfig::new()
                .with_launch_stagger(Duration::from_millis(stagger))
                .with_download_via_proxy(download_via_proxy);
            if let Some(secs) = worker_timeout {
                pool_config = pool_config.with_worker_timeout(Duration::from_secs(secs));
            }

            if seed.proxy_pool.is_empty() {
                println!("Crawling {} directly (no proxies), depth {}", seed.url, seed.max_depth);
            } else {
                println!(
                    "Crawling {} with {} proxies, depth {}",
                    seed.url,
                    seed.proxy_pool.len(),
                    seed.max_depth
                );
            }

            let extractor = build_extractor(&pass);
            println!("Extraction passes: {}", extractor.pass_names().join(", "));

            let started_at = Utc::now();
            let factory = Arc::new(ChromeSessionFactory::new(session_config));
            let results = WorkerPool::new(factory, pool_config)
                .with_extractor(extractor)
                .run(&seed)
                .await;

            for result in results.iter().filter(|r| !r.is_success()) {
                if let Some(ref error) = result.error {
                    eprintln!("Worker {} failed: {}", describe_egress(result.proxy.as_ref()), error);
                }
            }

            let written = Aggregator::save(&results, &seed.output_path, seed.output_mode)?;
            if written == 0 {
                println!("No proxies found. The site may not list any in a recognizable form.");
            } else {
                println!("Saved {} unique proxies to {:?}", written, seed.output_path);
            }

            if let Some(path) = report {
                let summary = RunReport::new(&seed.url, seed.max_depth, started_at, &results, written);
                summary.save(&path)?;
                println!(
                    "Report written to {:?} ({} of {} workers failed)",
                    path,
                    summary.failed_workers(),
                    summary.workers.len()
                );
            }
        }
        Commands::Extract { input, pass } => {
            let content = std::fs::read_to_string(&input)
                .with_context(|| format!("reading {:?}", input))?;
            let extractor = build_extractor(&pass);
            eprintln!("Extraction passes: {}", extractor.pass_names().join(", "));
            let candidates = extractor.extract(&content);

            if candidates.is_empty() {
                println!("No proxies found in {:?}", input);
            } else {
                for candidate in &candidates {
                    println!("{}", candidate);
                }
                eprintln!("{} candidates", candidates.len());
            }
        }
        Commands::Bootstrap { listing_url } => {
            let proxies = ListingBootstrap::with_url(&listing_url)?.fetch().await?;
            println!("Fetched {} proxies from {}", proxies.len(), listing_url);
            for proxy in &proxies {
                println!("{}", proxy);
            }
        }
    }

    Ok(())
}

/// Validate the seed, then gather the proxy pool. A bad seed never costs a
/// listing fetch.
async fn proxy_pool_for(
    seed_url: &str,
    sources: &[Box<dyn ProxySource>],
) -> Result<Vec<ProxyIdentity>> {
    SeedConfig::new(seed_url).validate()?;
    Ok(assemble_pool(sources).await)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("proxy_harvest={},warn", default_level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
