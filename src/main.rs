use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::convert::Infallible;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::Filter;

mod ampscript;
mod catalog;
mod config;
mod fragment;
mod record;
mod search;
mod store;

use config::Config;
use fragment::LinkMode;
use record::{Candidate, IdGenerator, NewBanner};
use search::Selection;
use store::{Store, StoreError};

#[derive(Parser)]
#[command(name = "huincha")]
#[command(about = "An email banner workbench • image + link • ready to paste")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the record-store HTTP server
    Serve {
        /// Path to config file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        /// Port to bind (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
    },
    /// Convert a URL to its AMPscript redirect form
    Convert {
        /// URL to convert
        url: String,

        /// Path to config file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
    /// Create a banner record from flags and/or pasted markup
    Add {
        /// Display name
        #[arg(short, long)]
        name: Option<String>,

        /// Link target
        #[arg(long)]
        href: Option<String>,

        /// Image URL or root-relative path
        #[arg(short, long)]
        image: Option<String>,

        /// Alternative text
        #[arg(short, long)]
        alt: Option<String>,

        /// Classification category
        #[arg(long)]
        category: Option<String>,

        /// Search tags
        #[arg(short, long)]
        tags: Vec<String>,

        /// HTML file to scrape href/src/alt from
        #[arg(long)]
        from_html: Option<PathBuf>,

        /// Path to config file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
    /// Search the store and the external catalog
    Search {
        /// Query text (2 characters minimum)
        query: String,

        /// Maximum number of suggestions
        #[arg(short, long, default_value_t = search::SUGGESTION_LIMIT)]
        limit: usize,

        /// Path to config file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
    /// Export selected banners as a ready-to-paste fragment
    Export {
        /// Records to export, each an id or a (fuzzy) name
        refs: Vec<String>,

        /// Link encoding for single-banner export: plain or macro
        #[arg(short, long, default_value = "macro")]
        mode: String,

        /// Force the stacked multi-row table even for one record
        #[arg(long)]
        stack: bool,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Path to config file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
    /// Re-import the store from the publish mirror
    Sync {
        /// Path to config file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port, host } => {
            let mut config = Config::load(&config).context("Failed to load configuration")?;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(host) = host {
                config.host = host;
            }
            serve_api(config).await?;
        }
        Commands::Convert { url, config } => {
            let config = Config::load(&config).context("Failed to load configuration")?;
            println!("{}", ampscript::normalize_href(&url, &config.link_rules()));
        }
        Commands::Add {
            name,
            href,
            image,
            alt,
            category,
            tags,
            from_html,
            config,
        } => {
            let config = Config::load(&config).context("Failed to load configuration")?;
            add_banner(config, name, href, image, alt, category, tags, from_html)?;
        }
        Commands::Search {
            query,
            limit,
            config,
        } => {
            let config = Config::load(&config).context("Failed to load configuration")?;
            search_banners(config, &query, limit).await?;
        }
        Commands::Export {
            refs,
            mode,
            stack,
            out,
            config,
        } => {
            let config = Config::load(&config).context("Failed to load configuration")?;
            export_banners(config, refs, &mode, stack, out).await?;
        }
        Commands::Sync { config } => {
            let config = Config::load(&config).context("Failed to load configuration")?;
            sync_store(config)?;
        }
    }

    Ok(())
}

async fn serve_api(config: Config) -> Result<()> {
    let addr: std::net::IpAddr = config.host.parse().context("Invalid host address")?;
    let port = config.port;

    println!(
        r#"
   ◜ h u i n c h a ◝
    image • link • paste
"#
    );
    println!("{}", "Starting record store...".green().bold());
    println!("{}", format!("Data file: {}", config.data_file).blue());
    println!("{}", format!("Mirror file: {}", config.mirror_file).blue());
    println!("{}", format!("URL: http://{}:{}", config.host, port).blue());
    println!("{}", "Press Ctrl+C to stop".yellow());

    let store = Arc::new(Store::new(&config));
    let store_filter = warp::any().map(move || store.clone());

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "ok": true })));

    let list_records = warp::path("records")
        .and(warp::path::end())
        .and(warp::get())
        .and(store_filter.clone())
        .and_then(handle_list);

    let create_record = warp::path("records")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(1024 * 1024))
        .and(warp::body::json())
        .and(store_filter.clone())
        .and_then(handle_create);

    let sync_mirror = warp::path("sync")
        .and(warp::path::end())
        .and(warp::post())
        .and(store_filter.clone())
        .and_then(handle_sync);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    let routes = health
        .or(list_records)
        .or(create_record)
        .or(sync_mirror)
        .with(cors)
        .with(warp::log("huincha"));

    warp::serve(routes).run((addr, port)).await;

    Ok(())
}

type JsonReply = warp::reply::WithStatus<warp::reply::Json>;

fn json_reply(status: StatusCode, body: &serde_json::Value) -> JsonReply {
    warp::reply::with_status(warp::reply::json(body), status)
}

fn error_reply(err: &StoreError) -> JsonReply {
    let status =
        StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        eprintln!("{}", format!("Error: {}", err).red());
    }
    json_reply(status, &serde_json::json!({ "error": err.to_string() }))
}

async fn handle_list(store: Arc<Store>) -> Result<JsonReply, Infallible> {
    Ok(match store.read_all() {
        Ok(data) => json_reply(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "data": data }),
        ),
        Err(e) => error_reply(&e),
    })
}

async fn handle_create(new: NewBanner, store: Arc<Store>) -> Result<JsonReply, Infallible> {
    Ok(match store.append(new) {
        Ok(record) => json_reply(
            StatusCode::CREATED,
            &serde_json::json!({ "ok": true, "data": record }),
        ),
        Err(e) => error_reply(&e),
    })
}

async fn handle_sync(store: Arc<Store>) -> Result<JsonReply, Infallible> {
    Ok(match store.sync_from_mirror() {
        Ok(imported) => json_reply(
            StatusCode::OK,
            &serde_json::json!({ "ok": true, "imported": imported }),
        ),
        Err(e) => error_reply(&e),
    })
}

#[allow(clippy::too_many_arguments)]
fn add_banner(
    config: Config,
    name: Option<String>,
    href: Option<String>,
    image: Option<String>,
    alt: Option<String>,
    category: Option<String>,
    tags: Vec<String>,
    from_html: Option<PathBuf>,
) -> Result<()> {
    let mut new = NewBanner {
        category,
        tags,
        width: config.default_width,
        height: config.default_height,
        ..NewBanner::default()
    };

    if let Some(path) = from_html {
        let html = std::fs::read_to_string(&path)
            .context(format!("Failed to read {}", path.display()))?;
        match fragment::parse_fragment(&html) {
            Some(parsed) => {
                if let Some(href) = parsed.href {
                    new.href = href;
                }
                if let Some(src) = parsed.image_src {
                    new.image_src = src;
                }
                if let Some(alt) = parsed.alt {
                    if !alt.is_empty() {
                        new.name = alt.clone();
                    }
                    new.alt = alt;
                }
            }
            None => {
                eprintln!(
                    "{}",
                    format!("Warning: no banner data recognized in {}", path.display())
                        .yellow()
                );
            }
        }
    }

    // Explicit flags win over anything scraped from the fragment
    if let Some(name) = name {
        new.name = name;
    }
    if let Some(href) = href {
        new.href = href;
    }
    if let Some(image) = image {
        new.image_src = image;
    }
    if let Some(alt) = alt {
        new.alt = alt;
    }

    let store = Store::new(&config);
    match store.append(new) {
        Ok(record) => {
            println!("{}", "Banner created!".green().bold());
            println!("  {}: {}", "Id".white().bold(), record.id.to_string().cyan());
            println!("  {}: {}", "Name".white().bold(), record.name.cyan());
            println!("  {}: {}", "Href".white().bold(), record.href.cyan());
            println!("  {}: {}", "Image".white().bold(), record.image_src.cyan());
        }
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            process::exit(1);
        }
    }

    Ok(())
}

async fn search_banners(config: Config, query: &str, limit: usize) -> Result<()> {
    let store = Store::new(&config);
    let records = match store.read_all() {
        Ok(records) => records,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            process::exit(1);
        }
    };
    let catalog = catalog::load_catalog(&config).await;

    let mut candidates: Vec<Candidate> = records.iter().map(Candidate::from).collect();
    candidates.extend(catalog.iter().map(Candidate::from));

    let results = search::search(&candidates, query, Some(limit));
    if results.is_empty() {
        println!("{}", "No matches.".yellow());
        return Ok(());
    }

    for candidate in &results {
        let origin = match candidate.origin {
            record::Origin::Local => "local".green(),
            record::Origin::Catalog => "catalog".blue(),
        };
        let id = candidate
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  [{}] {} {} {}",
            origin,
            id.white().bold(),
            candidate.name.cyan(),
            candidate.alt.white()
        );
    }

    Ok(())
}

async fn export_banners(
    config: Config,
    refs: Vec<String>,
    mode: &str,
    stack: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let Some(mode) = LinkMode::parse(mode) else {
        eprintln!(
            "{}",
            format!("Error: unknown link mode '{}' (expected plain or macro)", mode).red()
        );
        process::exit(1);
    };

    if refs.is_empty() {
        eprintln!("{}", "Error: nothing to export, pass at least one id or name.".red());
        process::exit(1);
    }

    let store = Store::new(&config);
    let records = match store.read_all() {
        Ok(records) => records,
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            process::exit(1);
        }
    };
    let catalog = catalog::load_catalog(&config).await;

    let mut candidates: Vec<Candidate> = records.iter().map(Candidate::from).collect();
    candidates.extend(catalog.iter().map(Candidate::from));

    let mut selection = Selection::new();
    let mut ids = IdGenerator::new();
    for reference in &refs {
        match resolve_candidate(&candidates, reference) {
            Some(candidate) => {
                let record = selection.select(&candidate, &mut ids);
                println!(
                    "{}",
                    format!("Selected: {} (id {})", record.name, record.id).green()
                );
            }
            None => {
                eprintln!("{}", format!("Error: no banner matches '{}'", reference).red());
                process::exit(1);
            }
        }
    }

    let stacked = selection.stacked();
    let rules = config.link_rules();
    let html = if stack || stacked.len() > 1 {
        let records: Vec<record::BannerRecord> = stacked.into_iter().cloned().collect();
        fragment::render_stack(&records, &rules)
    } else {
        fragment::render_banner(stacked[0], mode, &rules)
    };

    match out {
        Some(path) => {
            std::fs::write(&path, &html)
                .context(format!("Failed to write {}", path.display()))?;
            println!("{}", format!("Fragment written to {}", path.display()).green());
        }
        None => println!("{}", html),
    }

    Ok(())
}

/// Resolve one export reference: an exact id wins, anything else is the best
/// fuzzy name match.
fn resolve_candidate(candidates: &[Candidate], reference: &str) -> Option<Candidate> {
    if let Ok(id) = reference.parse::<u64>() {
        if let Some(found) = candidates.iter().find(|c| c.id == Some(id)) {
            return Some(found.clone());
        }
    }
    search::search(candidates, reference, Some(1)).into_iter().next()
}

fn sync_store(config: Config) -> Result<()> {
    let store = Store::new(&config);
    match store.sync_from_mirror() {
        Ok(imported) => {
            println!(
                "{}",
                format!("Imported {} records from {}", imported, config.mirror_file)
                    .green()
                    .bold()
            );
        }
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            process::exit(1);
        }
    }
    Ok(())
}
