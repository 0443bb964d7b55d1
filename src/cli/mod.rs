//! CLI module - Command-line interface for Gachadex
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Gachadex - anime character cache
/// Collects popular characters from AniList, Jikan and Kitsu and serves
/// rarity-weighted draws over HTTP
#[derive(Parser)]
#[command(name = "gachadex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the cache, then serve the HTTP API with scheduled refreshes
    #[command(alias = "daemon", alias = "-d", alias = "--daemon")]
    Serve,

    /// Build the cache once and print tier counts
    Stats,

    /// Build the cache once and draw a character
    #[command(alias = "roll")]
    Draw {
        /// Rarity tier to draw from
        #[arg(default_value = "common")]
        rarity: String,

        /// Number of draws
        #[arg(long, short = 'n', default_value = "1")]
        count: usize,
    },

    /// Build the cache once and search characters by name or anime
    #[command(alias = "s")]
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,

        /// Maximum number of results
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
