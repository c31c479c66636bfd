use std::path::Path;

use tracing::info;
use url::Url;

use crate::app::{AppContext, AutomediaError, Result};
use crate::daemon;
use crate::domain::{normalize_title, sanitize_name, CandidateItem, NewSource, SourceKind, TrackedSource};
use crate::plugin::{find_plugin, ContentSource};
use crate::store::Store;

/// Start tracking `url`.
///
/// Feeds are fetched once up front so a broken feed is rejected and the
/// channel title can name the source. Pages need an explicit name and a
/// plugin for their domain.
pub async fn add_source(
    ctx: &AppContext,
    kind: SourceKind,
    url: &str,
    name: Option<&str>,
    start_after: Option<&str>,
) -> Result<TrackedSource> {
    Url::parse(url)?;

    let (name, plugin, items) = match kind {
        SourceKind::Feed => {
            let (meta, items) = ctx.feed.fetch_feed(url).await?;
            let name = name
                .map(str::to_string)
                .or(meta.title)
                .ok_or_else(|| AutomediaError::Config("Feed has no title, pass --name".into()))?;
            (name, None, items)
        }
        SourceKind::Page => {
            let name = name.ok_or_else(|| {
                AutomediaError::Config("--name is required for html sources".into())
            })?;
            let plugin = find_plugin(ctx.resolver.plugin_dir(), url)?;
            let items = match start_after {
                Some(_) => ctx.resolver.plugin_for(&plugin)?.list(url, &[]).await?,
                None => Vec::new(),
            };
            (name.to_string(), Some(plugin), items)
        }
    };

    let seed = match start_after {
        Some(wanted) => Some(find_item(&items, wanted).ok_or_else(|| {
            AutomediaError::StartAfterNotFound {
                item: wanted.to_string(),
                url: url.to_string(),
            }
        })?),
        None => None,
    };

    let source = ctx.store.create(&NewSource {
        name: sanitize_name(&name),
        kind,
        url: url.to_string(),
        plugin,
        seed,
    })?;

    info!(source = %source.name, kind = %source.kind, "Added source");
    println!("Added {} source: {}", source.kind, source.name);
    if let Some(plugin) = &source.plugin {
        println!("Plugin: {}", plugin);
    }
    if let Some(latest) = &source.latest {
        println!("Starting after: {}", latest);
    }

    Ok(source)
}

fn find_item(items: &[CandidateItem], title: &str) -> Option<CandidateItem> {
    let wanted = normalize_title(title);
    items
        .iter()
        .find(|item| normalize_title(&item.title) == wanted)
        .cloned()
}

/// Run the daemon in the foreground until SIGINT/SIGTERM.
pub async fn sync(ctx: &AppContext, download_dir: &Path) -> Result<()> {
    let download_dir = std::path::absolute(download_dir)?;
    let mut daemon = ctx.daemon(download_dir.clone())?;

    match daemon.run().await {
        Err(AutomediaError::InstanceConflict { pid }) => {
            println!(
                "Another sync is already running in {} (PID {})",
                download_dir.display(),
                pid
            );
            Ok(())
        }
        other => other,
    }
}

pub fn list_downloaded(ctx: &AppContext) -> Result<()> {
    let downloaded = ctx.store.all_downloaded()?;

    if downloaded.is_empty() {
        println!("Nothing downloaded yet");
        return Ok(());
    }

    for (source, item) in downloaded {
        println!("{}/{}", source, item.title);
    }

    Ok(())
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    let mut any = false;

    for kind in SourceKind::ALL {
        for source in ctx.store.list_tracked(kind)? {
            any = true;
            println!("[{}] {} ({})", kind, source.name, source.display_plugin());
            println!("  {}", source.url);
            if let Some(latest) = &source.latest {
                println!("  Latest: {}", latest);
            }
            if let Some(synced) = source.synced_at {
                println!("  Synced: {}", synced.format("%Y-%m-%d %H:%M"));
            }
        }
    }

    if !any {
        println!("No sources");
    }
    Ok(())
}

pub fn status(download_dir: &Path) {
    println!("{}", daemon::daemon_status(download_dir));
}

pub fn stop(download_dir: &Path) -> Result<()> {
    match daemon::stop_daemon(download_dir) {
        Ok(pid) => {
            println!("Stopped sync (PID {})", pid);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", e);
            Ok(())
        }
    }
}
