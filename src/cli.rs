use clap::{Parser, Subcommand, ValueEnum};

/// CLI front-end for the wallpaper rotation manager
#[derive(Parser)]
#[command(name = "wallhub")]
#[command(about = "Manage the wallpaper list and auto-rotation", long_about = None)]
pub struct Cli {
    /// Database URL (defaults to a SQLite file in the user data directory)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List wallpapers with their indices
    List,
    /// Add a wallpaper URL to the list
    Add {
        /// Remote URL of the image or video
        url: String,
    },
    /// Remove the wallpaper at the given index
    Remove {
        index: usize,
    },
    /// Pick a new random wallpaper now
    Rotate,
    /// Turn timed auto-rotation on or off
    Auto {
        state: Toggle,
    },
    /// Set the auto-rotation interval in minutes (1-180)
    Interval {
        minutes: i64,
    },
    /// Show wallpaper count, rotation state and last change
    Stats,
    /// Compact the backing database (SQLite only)
    Vacuum,
    /// Stay open as a display surface and print each rotation
    Watch,
}
