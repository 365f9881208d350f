mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, Toggle};
use wallhub::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let hub = WallpaperHub::connect(cli.database_url.as_deref(), true).await?;

    match cli.command {
        Commands::List => {
            let (manager, _rx) = hub.open_surface().await;
            for (i, item) in manager.wallpapers().iter().enumerate() {
                println!("{:3}  {}", i, item.display_ref());
            }
        }
        Commands::Add { url } => {
            let (mut manager, _rx) = hub.open_surface().await;
            match manager.add(MediaItem::url(&url)).await {
                Ok(()) => println!("Added {url} ({} wallpapers)", manager.wallpapers().len()),
                Err(e) => eprintln!("Rejected: {e}"),
            }
        }
        Commands::Remove { index } => {
            let (mut manager, _rx) = hub.open_surface().await;
            match manager.remove(index).await {
                Ok(removed) => println!("Removed {}", removed.display_ref()),
                Err(e) => eprintln!("Rejected: {e}"),
            }
        }
        Commands::Rotate => {
            let (mut manager, _rx) = hub.open_surface().await;
            match manager.select_random().await {
                Some(item) => println!("Now showing {}", item.display_ref()),
                None => println!("Wallpaper list is empty"),
            }
        }
        Commands::Auto { state } => {
            let enabled = matches!(state, Toggle::On);
            hub.set_auto_change(enabled).await?;
            println!("Auto-rotation {}", if enabled { "enabled" } else { "disabled" });
        }
        Commands::Interval { minutes } => {
            hub.set_interval(minutes).await?;
            println!("Rotation interval set to {minutes} minutes");
        }
        Commands::Stats => {
            let stats = hub.stats().await?;
            println!("Wallpapers:   {}", stats.wallpaper_count);
            println!("Auto-change:  {}", if stats.auto_change { "Enabled" } else { "Disabled" });
            println!("Interval:     {} minutes", stats.interval_minutes);
            println!(
                "Last changed: {}",
                stats.last_changed.map(time_ago).unwrap_or_else(|| "never".to_string())
            );
            if let Some(item) = stats.current {
                println!("Current:      {}", item.display_ref());
            }
        }
        Commands::Vacuum => {
            hub.vacuum_db().await?;
            println!("Database compacted");
        }
        Commands::Watch => {
            let (mut manager, mut rx) = hub.open_surface().await;
            if let Some(item) = manager.current() {
                println!("Now showing {}", item.display_ref());
            }
            while let Some(msg) = rx.recv().await {
                match msg {
                    SurfaceMessage::ChangeWallpaper => {
                        if let Some(item) = manager.select_random().await {
                            println!("Now showing {}", item.display_ref());
                        }
                    }
                    SurfaceMessage::OpenSettings => println!("(settings panel requested)"),
                }
            }
        }
    }

    hub.shutdown();
    Ok(())
}

fn time_ago(epoch: i64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    let delta = (now - epoch).max(0);
    if delta < 60 {
        "Just now".to_string()
    } else if delta < 3600 {
        format!("{} minutes ago", delta / 60)
    } else if delta < 86_400 {
        format!("{} hours ago", delta / 3600)
    } else {
        format!("{} days ago", delta / 86_400)
    }
}
