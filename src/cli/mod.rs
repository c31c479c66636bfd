pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::SourceKind;

#[derive(Parser)]
#[command(name = "automedia")]
#[command(about = "Track feeds and pages, download what's new", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/automedia/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SourceType {
    /// RSS/Atom feed of torrent links
    Rss,
    /// Web page handled by a site plugin
    Html,
}

impl From<SourceType> for SourceKind {
    fn from(value: SourceType) -> Self {
        match value {
            SourceType::Rss => SourceKind::Feed,
            SourceType::Html => SourceKind::Page,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start tracking a feed or page
    Add {
        #[arg(value_enum)]
        kind: SourceType,
        /// URL of the feed or page
        url: String,
        /// Source name (default: the feed title; required for html)
        #[arg(short, long)]
        name: Option<String>,
        /// Only download items newer than this one
        #[arg(short, long)]
        start_after: Option<String>,
    },
    /// Run the sync daemon in the foreground
    Sync {
        /// Where downloads are written
        download_dir: PathBuf,
    },
    /// List every downloaded item, oldest first
    Downloaded,
    /// List tracked sources
    List,
    /// Check whether a sync is running in a download directory
    Status { download_dir: PathBuf },
    /// Stop the sync running in a download directory
    Stop { download_dir: PathBuf },
}
