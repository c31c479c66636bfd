//! # Automedia
//!
//! A media-tracking daemon: watches feeds and web pages, downloads what is
//! new, and remembers what it already fetched.
//!
//! ## Architecture
//!
//! ```text
//! Daemon → Resolver → ContentSource::list → dedup → Orchestrator → ContentSource::download
//!                                                        ↓
//!                                                  Store ledger
//! ```
//!
//! Feed items go to a Transmission daemon; page items are fetched by
//! external plugin programs that report progress through marker files.
//!
//! ## Quick Start
//!
//! ```bash
//! # Track a feed, skipping everything up to episode 5
//! automedia add rss https://example.com/show.xml --start-after "Episode 5"
//!
//! # Track a page through the plugin for its domain
//! automedia add html https://mangasite.com/manga/x --name "Manga X"
//!
//! # Sync forever
//! automedia sync ~/Downloads/media
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, feed source, torrent client, plugin resolver, notifications.
pub mod app;

/// Configuration management.
///
/// Loads from `~/.config/automedia/config.toml`.
pub mod config;

/// The sync daemon.
///
/// - `automedia sync <dir>` - Run the daemon in the foreground
/// - `automedia stop <dir>` - Stop it
/// - `automedia status <dir>` - Check if it is running
pub mod daemon;

/// Command-line interface using clap.
pub mod cli;

/// Finding the new items in a listing.
pub mod dedup;

/// Core domain models.
///
/// - [`TrackedSource`](domain::TrackedSource): a subscribed feed or page with its ledger
/// - [`CandidateItem`](domain::CandidateItem): an item surfaced by a listing
/// - [`DownloadTask`](domain::DownloadTask): one requested download
pub mod domain;

/// HTTP fetching of feed bodies.
pub mod fetcher;

/// Feed parsing and normalization.
///
/// Converts RSS 0.9x/1.0/2.0, Atom 0.3/1.0, and JSON Feed 1.0
/// into [`CandidateItem`](domain::CandidateItem)s.
pub mod normalizer;

/// Desktop notifications.
pub mod notify;

/// Content sources: the feed source and external site plugins.
pub mod plugin;

/// On-disk source store.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`FsStore`](store::FsStore): directory-per-source implementation
pub mod store;

/// Download orchestration and progress tracking.
pub mod sync;

/// Torrent service client.
pub mod torrent;

#[cfg(test)]
mod testing;
