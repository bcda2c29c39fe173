// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! blockbase CLI tool.
//!
//! Command-line interface for ad-hoc testing of a row table: create a
//! table, then drive insert/remove/search/range against it from an
//! interactive shell. The shell consumes only the public table surface.

use anyhow::{bail, Context, Result};
use blockbase::table::RowTable;
use clap::{Parser, Subcommand};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "blockbase")]
#[command(version = "0.1.0")]
#[command(about = "blockbase CLI - row table operations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new table (replaces existing files)
    Create {
        /// Path to the row file (index lands beside it as .btree)
        path: PathBuf,

        /// Per-field character lengths, comma-separated (e.g. 12,24)
        #[arg(short, long)]
        fields: String,

        /// Node block size for the index file
        #[arg(short, long, default_value_t = 600)]
        block_size: u32,
    },

    /// Open an interactive shell on an existing table
    Shell {
        /// Path to the row file
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            path,
            fields,
            block_size,
        } => create(&path, &fields, block_size),
        Commands::Shell { path } => shell(&path),
    }
}

fn create(path: &Path, fields: &str, block_size: u32) -> Result<()> {
    let lengths = parse_field_lengths(fields)?;
    let table = RowTable::create(path, &lengths, block_size)
        .with_context(|| format!("Failed to create table at {}", path.display()))?;
    println!(
        "Created table {} with {} field(s), block size {}",
        path.display(),
        lengths.len(),
        block_size
    );
    table.close()?;
    Ok(())
}

fn parse_field_lengths(fields: &str) -> Result<Vec<u32>> {
    fields
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u32>()
                .with_context(|| format!("Invalid field length '{}'", part.trim()))
        })
        .collect()
}

fn shell(path: &Path) -> Result<()> {
    let mut table = RowTable::open(path)
        .with_context(|| format!("Failed to open table at {}", path.display()))?;

    println!("blockbase shell v0.1.0");
    println!("Table: {}", path.display());
    println!("Fields: {:?}", table.schema().field_lengths());
    println!("Type .help for help, .exit to quit\n");

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline("blockbase> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(trimmed);

                if trimmed.starts_with('.') {
                    match handle_dot_command(trimmed, &table) {
                        Ok(should_exit) => {
                            if should_exit {
                                break;
                            }
                        }
                        Err(e) => eprintln!("Error: {}", e),
                    }
                    continue;
                }

                if let Err(e) = handle_command(trimmed, &mut table) {
                    eprintln!("Error: {}", e);
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    table.close()?;
    Ok(())
}

fn handle_dot_command(cmd: &str, table: &RowTable) -> Result<bool> {
    match cmd {
        ".exit" | ".quit" => {
            println!("Goodbye!");
            Ok(true)
        }
        ".schema" => {
            println!("Field lengths: {:?}", table.schema().field_lengths());
            Ok(false)
        }
        ".help" => {
            println!("Commands:");
            println!("  insert <key> <field>...   insert a row");
            println!("  remove <key>              remove a row");
            println!("  search <key>              look up a row");
            println!("  range <low> <high>        list rows with keys in [low, high]");
            println!("  .schema                   show the field layout");
            println!("  .exit                     quit");
            Ok(false)
        }
        _ => {
            println!("Unknown command: {} (try .help)", cmd);
            Ok(false)
        }
    }
}

fn handle_command(line: &str, table: &mut RowTable) -> Result<()> {
    let parts: Vec<&str> = line.split_whitespace().collect();

    match parts[0] {
        "insert" => {
            if parts.len() < 2 {
                bail!("usage: insert <key> <field>...");
            }
            let key = parse_key(parts[1])?;
            let fields: Vec<&str> = parts[2..].to_vec();
            if table.insert(key, &fields)? {
                println!("Inserted {}", key);
            } else {
                println!("Key {} already exists", key);
            }
        }
        "remove" => {
            if parts.len() != 2 {
                bail!("usage: remove <key>");
            }
            let key = parse_key(parts[1])?;
            if table.remove(key)? {
                println!("Removed {}", key);
            } else {
                println!("Key {} not found", key);
            }
        }
        "search" => {
            if parts.len() != 2 {
                bail!("usage: search <key>");
            }
            let key = parse_key(parts[1])?;
            match table.search(key)? {
                Some(fields) => println!("{}: {}", key, fields.join(" | ")),
                None => println!("Key {} not found", key),
            }
        }
        "range" => {
            if parts.len() != 3 {
                bail!("usage: range <low> <high>");
            }
            let low = parse_key(parts[1])?;
            let high = parse_key(parts[2])?;
            let rows = table.range_search(low, high)?;
            for row in &rows {
                println!("{}", row.join(" | "));
            }
            println!(
                "{} row{}",
                rows.len(),
                if rows.len() == 1 { "" } else { "s" }
            );
        }
        other => bail!("unknown command '{}' (try .help)", other),
    }

    Ok(())
}

fn parse_key(raw: &str) -> Result<i32> {
    raw.parse::<i32>()
        .with_context(|| format!("Invalid key '{}'", raw))
}
