use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use catalog::{FileTourStore, load_graph, save_graph};
use clap::{Parser, Subcommand};
use formats::{LegacyDocument, migrate_legacy};
use streaming::{HttpImageSource, ImageCache, ImageLoader, LoadOutcome, NavigationGuard};
use tools::{ConvertFrom, Settings, convert, inspect, problems};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Panorama tour maintenance tool")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a legacy links/markers document into the tour format
    Migrate {
        /// Legacy JSON document
        input: PathBuf,
        /// Output tour JSON
        output: PathBuf,
    },

    /// Print one summary line per node
    Inspect { tour: PathBuf },

    /// Check link/hotspot consistency and report dangling links
    Validate {
        tour: PathBuf,

        /// Exit non-zero when any problem is found
        #[arg(long)]
        strict: bool,
    },

    /// Convert a single position between texture and spherical coordinates
    #[command(allow_negative_numbers = true)]
    Convert {
        #[arg(value_enum)]
        from: ConvertFrom,
        a: f64,
        b: f64,

        /// Texture width in pixels (default: TOUR_TEXTURE_WIDTH or 4096)
        #[arg(long)]
        width: Option<u32>,

        /// Texture height in pixels (default: TOUR_TEXTURE_HEIGHT or 2048)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Fetch a panorama image through the cache
    Fetch {
        url: String,

        /// Per-fetch timeout (default: TOUR_FETCH_TIMEOUT_MS or 30000)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let settings = Settings::from_env();

    match args.command {
        Command::Migrate { input, output } => migrate(&settings, input, output)?,
        Command::Inspect { tour } => {
            let (graph, errors) = load_graph(&FileTourStore::new(tour), settings.tour_config())?;
            for e in &errors {
                warn!(index = e.index, id = %e.id, error = %e.error, "unreadable record");
            }
            for line in inspect(&graph) {
                println!("{line}");
            }
        }
        Command::Validate { tour, strict } => {
            let (graph, errors) = load_graph(&FileTourStore::new(tour), settings.tour_config())?;
            let mut found: Vec<String> = errors
                .iter()
                .map(|e| format!("record {} ({}): {}", e.index, e.id, e.error))
                .collect();
            found.extend(problems(&graph));
            for p in &found {
                println!("{p}");
            }
            if found.is_empty() {
                println!("ok: {} nodes", graph.len());
            } else if strict {
                return Err(format!("{} problem(s) found", found.len()).into());
            }
        }
        Command::Convert {
            from,
            a,
            b,
            width,
            height,
        } => {
            let settings = settings.with_texture_override(width, height);
            println!("{}", convert(from, a, b, settings.texture)?);
        }
        Command::Fetch { url, timeout_ms } => fetch(settings, &url, timeout_ms).await?,
    }

    Ok(())
}

fn migrate(
    settings: &Settings,
    input: PathBuf,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    let doc = LegacyDocument::load(&input)?;
    let (graph, report) = migrate_legacy(doc, settings.tour_config());
    for e in &report.errors {
        println!("skipped {}: {}", e.record, e.error);
    }

    let mut store = FileTourStore::new(&output);
    save_graph(&mut store, &graph)?;
    println!(
        "migrated {} nodes, {} links, {} hotspots into {}",
        report.nodes,
        report.links,
        report.hotspots,
        output.display()
    );
    Ok(())
}

async fn fetch(
    settings: Settings,
    url: &str,
    timeout_ms: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = settings.loader;
    if let Some(ms) = timeout_ms {
        config.fetch_timeout = Duration::from_millis(ms);
    }

    let guard = Arc::new(NavigationGuard::new());
    let loader = ImageLoader::new(
        Arc::new(ImageCache::new(settings.cache)),
        HttpImageSource::default(),
        guard.clone(),
        config,
    );

    let ticket = guard.begin();
    match loader.load(url, ticket).await? {
        LoadOutcome::Ready(bytes) => {
            let stats = loader.cache().stats();
            info!(url, cached = stats.count, "image ready");
            println!(
                "{url}: {} bytes (cache: {} entries, {} bytes)",
                bytes.len(),
                stats.count,
                stats.total_bytes
            );
        }
        LoadOutcome::Superseded => println!("{url}: superseded"),
    }
    Ok(())
}
