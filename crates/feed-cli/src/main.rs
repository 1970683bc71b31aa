use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rand::{distributions::Alphanumeric, seq::SliceRandom, Rng};
use tracing::{debug, info};

use feed_core::{
    config::FeedConfig,
    document::{Document, MemoryDocument},
    feed::Feed,
    post::{Post, RawComment},
    prefs::LayoutPreference,
    scroll::Viewport,
    source::{FeedSource, SqliteSource},
    state::{ChangeRecord, PageFilters},
    FeedError, FeedResult,
};

const VIEWPORT_HEIGHT: u32 = 900;
const AUTHORS: [&str; 6] = ["ana", "bo", "cyra", "dmitri", "eun", "folake"];
const LINES: [&str; 6] = [
    "Shipped the new build this morning, fingers crossed.",
    "Anyone else seeing the trains run late today?",
    "Finally finished the long read from last week. Worth it.",
    "Coffee count: three. Productivity count: unclear.",
    "Photos from the weekend hike are up.",
    "Hot take: tabs are fine.",
];

#[derive(Parser)]
#[command(author, version, about, long_about=None)]
struct Cli {
    #[arg(short, long, value_name = "FILE")]
    /// Path to config file; defaults to ~/.feed/feed.toml
    config: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    /// Path to the sqlite Db; overrides the config
    db: Option<PathBuf>,

    #[arg(short, long, default_value_t = 1280)]
    /// Viewport width in px, selects the column count
    width: u32,

    #[command(subcommand)]
    command: FeedCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum FeedCommand {
    /// Fill the Db with random posts and comments
    Seed {
        #[arg(short, long, default_value_t = 45)]
        posts: usize,
        #[arg(short, long, default_value_t = 3)]
        comments: usize,
    },

    /// Render the feed, growing it `scrolls` times
    Browse {
        #[arg(short, long, default_value_t = 0)]
        scrolls: usize,
        #[arg(short, long)]
        author: Option<String>,
    },

    /// Apply change records from a json file, then resolve each of them
    Replay { changes: PathBuf },

    /// Show or store the layout preference
    Layout {
        #[command(subcommand)]
        action: LayoutAction,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum LayoutAction {
    Get,
    Set { preference: LayoutPreference },
}

fn random_id(rng: &mut impl Rng) -> String {
    (0..8)
        .map(|_| char::from(rng.sample(Alphanumeric)).to_ascii_lowercase())
        .collect()
}

fn pick<'a>(rng: &mut impl Rng, items: &'a [&'a str]) -> &'a str {
    items.choose(rng).copied().unwrap_or_default()
}

async fn seed(source: &SqliteSource, posts: usize, comments: usize) -> FeedResult<()> {
    let mut rng = rand::thread_rng();
    for _ in 0..posts {
        let post_id = format!("p-{}", random_id(&mut rng));
        let post = Post::new(
            post_id.clone(),
            pick(&mut rng, &AUTHORS).into(),
            pick(&mut rng, &LINES).into(),
        )?;
        source.insert_post(post).await?;

        let mut ids: Vec<String> = Vec::with_capacity(comments);
        for _ in 0..rng.gen_range(0..=comments) {
            let parent = if ids.is_empty() || rng.gen_bool(0.5) {
                None
            } else {
                ids.choose(&mut rng).cloned()
            };
            let id = format!("c-{}", random_id(&mut rng));
            let comment = RawComment::new(
                id.clone(),
                pick(&mut rng, &AUTHORS).into(),
                pick(&mut rng, &LINES).into(),
                parent,
            )?;
            source.insert_comment(&post_id, comment).await?;
            ids.push(id);
        }
        if rng.gen_bool(0.3) {
            source.like(&post_id).await?;
        }
    }
    info!(posts, "seeded feed");
    Ok(())
}

async fn browse(
    source: &SqliteSource,
    config: &FeedConfig,
    width: u32,
    scrolls: usize,
    author: Option<String>,
) -> FeedResult<()> {
    let preference = source.layout_preference()?;
    let mut feed = Feed::new(config, width, preference).with_filters(PageFilters {
        author,
        limit: None,
    });
    let mut doc = MemoryDocument::new();
    feed.refresh(source, &mut doc).await;

    for _ in 0..scrolls {
        let viewport = Viewport {
            scroll_top: doc.content_height().saturating_sub(VIEWPORT_HEIGHT),
            height: VIEWPORT_HEIGHT,
        };
        let Some(ticket) = feed.on_scroll(viewport, &mut doc) else {
            debug!("nothing left to load");
            break;
        };
        feed.finish_batch(ticket, &mut doc);
    }
    print!("{}", doc.render_text());
    Ok(())
}

async fn replay(
    source: &SqliteSource,
    config: &FeedConfig,
    width: u32,
    changes: PathBuf,
) -> FeedResult<()> {
    let buf = std::fs::read_to_string(&changes)?;
    let records: Vec<ChangeRecord> = serde_json::from_str(&buf)?;

    let mut feed = Feed::new(config, width, source.layout_preference()?);
    let mut doc = MemoryDocument::new();
    feed.refresh(source, &mut doc).await;

    let now = Instant::now();
    for record in records.iter() {
        feed.on_change(record, now, &mut doc);
    }
    if let Some(notification) = doc.notification() {
        println!("[{}] {}", notification.icon, notification.label);
    }
    while let Some(resolution) = feed.resolve_with(source, &mut doc).await {
        println!("{:?}", resolution);
    }
    for scroll in doc.scrolls() {
        println!(
            "scrolled to [{}=\"{}\"] highlight={}",
            scroll.attribute, scroll.id, scroll.highlight
        );
    }
    Ok(())
}

fn layout(source: &SqliteSource, action: LayoutAction) -> FeedResult<()> {
    match action {
        LayoutAction::Get => println!("{}", source.layout_preference()?),
        LayoutAction::Set { preference } => {
            source.set_layout_preference(preference)?;
            println!("layout set to {preference}");
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> FeedResult<()> {
    let mut config = FeedConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.db = db;
    }
    if cli.width == 0 {
        return Err(FeedError::custom_error("Width must be at least 1px".into()).into());
    }
    let source = SqliteSource::open(&config.db)?;
    debug!(db = %config.db.display(), "opened store");

    match cli.command {
        FeedCommand::Seed { posts, comments } => seed(&source, posts, comments).await,
        FeedCommand::Browse { scrolls, author } => {
            browse(&source, &config, cli.width, scrolls, author).await
        }
        FeedCommand::Replay { changes } => replay(&source, &config, cli.width, changes).await,
        FeedCommand::Layout { action } => layout(&source, action),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli).await {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
