//! CLI entry point for blogsmith

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use blogsmith::commands;
use blogsmith::Site;

#[derive(Parser)]
#[command(name = "blogsmith")]
#[command(version)]
#[command(about = "A static site generator for Markdown blogs", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new site
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        folder: PathBuf,
    },

    /// Create a new post, page or draft
    New {
        /// Layout to use (post, page, draft); defaults to `default_layout`
        #[arg(short, long)]
        layout: Option<String>,

        /// Title of the new post
        title: String,

        /// File name or directory instead of the one derived from the title
        #[arg(short, long)]
        path: Option<String>,
    },

    /// Generate static files
    #[command(alias = "g")]
    Generate {
        /// Watch for file changes
        #[arg(short, long)]
        watch: bool,

        /// Rebuild even if nothing changed
        #[arg(short, long)]
        force: bool,

        /// Publish drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Start a local server
    #[command(alias = "s")]
    Server {
        /// Port to listen on
        #[arg(short, long, default_value = "4000")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Open browser automatically
        #[arg(short, long)]
        open: bool,

        /// Disable file watching and live reload
        #[arg(long)]
        r#static: bool,

        /// Publish drafts
        #[arg(long)]
        drafts: bool,
    },

    /// Clean the public folder and cache
    Clean,

    /// List site information
    List {
        /// Type of content to list (post, page, tag, category, project, route)
        #[arg(default_value = "post")]
        r#type: String,
    },

    /// Build in memory and report every problem without writing
    Check {
        /// Check drafts too
        #[arg(long)]
        drafts: bool,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "blogsmith=debug,info"
    } else {
        "blogsmith=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Init { folder } => {
            let target_dir = if folder.is_absolute() {
                folder
            } else {
                base_dir.join(folder)
            };
            commands::init::init_site(&target_dir)?;
            println!("Initialized a new site in {:?}", target_dir);
        }

        Commands::New {
            layout,
            title,
            path,
        } => {
            let site = Site::new(&base_dir)?;
            let layout = layout.unwrap_or_else(|| site.config.default_layout.clone());
            let created = commands::new::create_post(&site, &title, &layout, path.as_deref())?;
            println!("Created {:?}", created);
        }

        Commands::Generate {
            watch,
            force,
            drafts,
        } => {
            let site = Site::new(&base_dir)?.with_drafts(drafts);
            commands::generate::run(&site, force)?;

            if watch {
                commands::generate::watch(&site).await?;
            }
        }

        Commands::Server {
            port,
            ip,
            open,
            r#static,
            drafts,
        } => {
            let site = Site::new(&base_dir)?.with_drafts(drafts);
            commands::generate::run(&site, false)?;
            blogsmith::server::start(&site, &ip, port, !r#static, open).await?;
        }

        Commands::Clean => {
            Site::new(&base_dir)?.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let site = Site::new(&base_dir)?;
            commands::list::run(&site, &r#type)?;
        }

        Commands::Check { drafts } => {
            let site = Site::new(&base_dir)?.with_drafts(drafts);
            commands::check::run(&site)?;
        }

        Commands::Version => {
            println!("blogsmith version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
