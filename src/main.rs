//! Factory Planner command-line front end

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use factory_planner::catalog::Catalog;
use factory_planner::config::Settings;
use factory_planner::factory_types::{FactoryTypeDraft, FactoryTypeRegistry, Side};
use factory_planner::graph::FactoryGraph;
use factory_planner::models::Position;
use factory_planner::remote::{self, JsonBinClient};
use factory_planner::{calculator, db};

#[derive(Parser)]
#[command(name = "factory-planner")]
#[command(about = "Production chain planner for factory-building games")]
struct Cli {
    /// Path to the SQLite storage file
    #[arg(short, long, default_value = "factory_planner.db")]
    database: PathBuf,

    /// Path to the settings file
    #[arg(short, long, default_value = "planner.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize empty storage
    Init,

    /// Show every factory and which inputs are short
    Status {
        /// Only show this factory
        node: Option<String>,
    },

    /// Place a new factory
    Add {
        /// Factory type id (e.g., "steel", "copper")
        factory_type: String,

        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        x: f64,

        #[arg(long, default_value = "0", allow_hyphen_values = true)]
        y: f64,
    },

    /// Remove a factory and its connections
    Remove { node: String },

    /// Connect an output port to an input port
    Connect {
        source: String,
        output: String,
        target: String,
        input: String,
    },

    /// Delete a connection
    Disconnect { edge: String },

    /// Show or change a factory's scale
    Scale {
        node: String,

        /// New scale (at least 1)
        value: Option<u32>,

        /// Increase by one
        #[arg(long, conflicts_with_all = ["value", "down"])]
        up: bool,

        /// Decrease by one, never below 1
        #[arg(long, conflicts_with = "value")]
        down: bool,
    },

    /// Move a factory on the canvas
    Move {
        node: String,
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },

    /// List factory types
    Types,

    /// Define a custom factory type
    NewType {
        name: String,

        /// Input as ITEM:RATE, repeatable
        #[arg(short, long)]
        input: Vec<String>,

        /// Output as ITEM:RATE, repeatable
        #[arg(short, long)]
        output: Vec<String>,
    },

    /// Edit a factory type; editing a preset saves a custom override
    EditType {
        id: String,

        #[arg(long)]
        name: Option<String>,

        /// Remove the input at this position, repeatable
        #[arg(long)]
        remove_input: Vec<usize>,

        /// Remove the output at this position, repeatable
        #[arg(long)]
        remove_output: Vec<usize>,

        /// Append an input as ITEM:RATE, repeatable
        #[arg(short, long)]
        input: Vec<String>,

        /// Append an output as ITEM:RATE, repeatable
        #[arg(short, long)]
        output: Vec<String>,
    },

    /// Delete a custom factory type
    DeleteType { id: String },

    /// List catalog items, optionally filtered by name
    Items { search: Option<String> },

    /// Upload the plan to the remote store
    Push { bin: String },

    /// Replace the local plan with the one in the remote store
    Pull { bin: String },

    /// Clear all saved data
    Reset,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let conn = Connection::open(&cli.database)
        .with_context(|| format!("Failed to open {}", cli.database.display()))?;
    db::init_schema(&conn)?;

    let catalog = Catalog::bundled()?;
    let mut registry = FactoryTypeRegistry::new(db::load_custom_types(&conn)?);
    let mut graph = db::load_flow(&conn)?;

    match cli.command {
        Commands::Init => {
            println!("Storage initialized at: {}", cli.database.display());
            return Ok(());
        }

        Commands::Status { node } => {
            print_status(&graph, node.as_deref())?;
            return Ok(());
        }

        Commands::Add { factory_type, x, y } => {
            let t = registry
                .get(&factory_type)
                .ok_or_else(|| anyhow!("Unknown factory type '{}'", factory_type))?;
            let id = graph.add_factory(t, Position { x, y })?;
            println!("Added {}", id);
        }

        Commands::Remove { node } => {
            let removed = graph.remove_factory(&node)?;
            println!("Removed {}", removed.data.label);
        }

        Commands::Connect {
            source,
            output,
            target,
            input,
        } => {
            let id = graph.connect(&source, &output, &target, &input)?;
            println!("Connected {}", id);
            if let Some(node) = graph.node(&target) {
                print!("{}", calculator::format_node(node, &graph.edges, &graph.nodes));
            }
        }

        Commands::Disconnect { edge } => {
            let removed = graph.disconnect(&edge)?;
            println!("Disconnected {} -> {}", removed.source, removed.target);
        }

        Commands::Scale {
            node,
            value,
            up,
            down,
        } => {
            let scale = match (value, up, down) {
                (Some(v), _, _) => {
                    graph.set_scale(&node, v)?;
                    v
                }
                (None, true, _) => graph.increment_scale(&node)?,
                (None, false, true) => graph.decrement_scale(&node)?,
                (None, false, false) => {
                    let n = graph
                        .node(&node)
                        .ok_or_else(|| anyhow!("Factory '{}' not found", node))?;
                    println!("{}x", n.scale());
                    return Ok(());
                }
            };
            println!("{} now at {}x", node, scale);
        }

        Commands::Move { node, x, y } => {
            graph.move_factory(&node, Position { x, y })?;
        }

        Commands::Types => {
            println!(
                "{:<24} {:<24} {:>6} {:>7}  {}",
                "ID", "Name", "Inputs", "Outputs", "Kind"
            );
            println!("{}", "-".repeat(72));
            for t in registry.list() {
                let kind = if registry.is_custom(&t.id) { "custom" } else { "preset" };
                println!(
                    "{:<24} {:<24} {:>6} {:>7}  {}",
                    t.id,
                    t.name,
                    t.inputs.len(),
                    t.outputs.len(),
                    kind
                );
            }
            return Ok(());
        }

        Commands::NewType {
            name,
            input,
            output,
        } => {
            let mut draft = FactoryTypeDraft::new();
            draft.set_name(name);
            apply_ports(&mut draft, Side::Input, &input, &catalog)?;
            apply_ports(&mut draft, Side::Output, &output, &catalog)?;
            let t = draft.finish()?;
            println!("Created factory type {}", t.id);
            registry.save_custom(t);
        }

        Commands::EditType {
            id,
            name,
            mut remove_input,
            mut remove_output,
            input,
            output,
        } => {
            let existing = registry
                .get(&id)
                .ok_or_else(|| anyhow!("Unknown factory type '{}'", id))?;
            let mut draft = FactoryTypeDraft::edit(existing);
            if let Some(name) = name {
                draft.set_name(name);
            }
            // highest index first so earlier positions stay valid
            remove_input.sort_unstable_by(|a, b| b.cmp(a));
            remove_input.dedup();
            for index in remove_input {
                draft.remove(Side::Input, index)?;
            }
            remove_output.sort_unstable_by(|a, b| b.cmp(a));
            remove_output.dedup();
            for index in remove_output {
                draft.remove(Side::Output, index)?;
            }
            apply_ports(&mut draft, Side::Input, &input, &catalog)?;
            apply_ports(&mut draft, Side::Output, &output, &catalog)?;
            registry.save_custom(draft.finish()?);
            println!("Saved factory type {}", id);
        }

        Commands::DeleteType { id } => {
            if registry.remove_custom(&id).is_none() {
                bail!("'{}' is not a custom factory type", id);
            }
            println!("Deleted factory type {}", id);
        }

        Commands::Items { search } => {
            let items = match &search {
                Some(text) => catalog.search(text),
                None => catalog.items().iter().collect(),
            };
            for item in items {
                match catalog.item_icon(&item.id) {
                    Some(icon) => println!(
                        "{:<28} {:<28} ({}, {}) {}",
                        item.id,
                        item.name,
                        icon.x,
                        icon.y,
                        icon.color.as_deref().unwrap_or("")
                    ),
                    None => println!("{:<28} {}", item.id, item.name),
                }
            }
            return Ok(());
        }

        Commands::Push { bin } => {
            // local storage stays authoritative whatever the remote does
            db::save_flow(&conn, &graph)?;
            let settings = Settings::load(&cli.config)?.with_env();
            let client = JsonBinClient::from_settings(&settings.remote)?;
            remote::push_flow(&client, &bin, &graph)?;
            println!("Pushed {} factories to {}", graph.nodes.len(), bin);
            return Ok(());
        }

        Commands::Pull { bin } => {
            let settings = Settings::load(&cli.config)?.with_env();
            let client = JsonBinClient::from_settings(&settings.remote)?;
            graph = remote::pull_flow(&client, &bin)?;
            println!("Pulled {} factories from {}", graph.nodes.len(), bin);
        }

        Commands::Reset => {
            db::clear_saved_data(&conn)?;
            println!("Cleared saved data");
            return Ok(());
        }
    }

    db::save_flow(&conn, &graph)?;
    db::save_custom_types(&conn, registry.custom())?;

    Ok(())
}

fn print_status(graph: &FactoryGraph, node: Option<&str>) -> Result<()> {
    if let Some(id) = node {
        let n = graph
            .node(id)
            .ok_or_else(|| anyhow!("Factory '{}' not found", id))?;
        print!("{}", calculator::format_node(n, &graph.edges, &graph.nodes));
        return Ok(());
    }

    if graph.nodes.is_empty() {
        println!("No factories placed. Run 'add' first.");
        return Ok(());
    }

    for n in &graph.nodes {
        print!("{}", calculator::format_node(n, &graph.edges, &graph.nodes));
    }
    println!();

    if !graph.edges.is_empty() {
        println!("Connections:");
        for e in &graph.edges {
            println!(
                "  {}  {}:{} -> {}:{}",
                e.id, e.source, e.source_handle, e.target, e.target_handle
            );
        }
        println!();
    }

    println!("{}", calculator::summarize(&graph.nodes, &graph.edges));
    Ok(())
}

/// Parse ITEM:RATE
fn parse_port(spec: &str) -> Result<(String, f64)> {
    let (item, rate) = spec
        .split_once(':')
        .ok_or_else(|| anyhow!("Expected ITEM:RATE, got '{}'", spec))?;
    let rate: f64 = rate
        .trim()
        .parse()
        .with_context(|| format!("Invalid rate in '{}'", spec))?;
    Ok((item.trim().to_string(), rate))
}

fn apply_ports(
    draft: &mut FactoryTypeDraft,
    side: Side,
    specs: &[String],
    catalog: &Catalog,
) -> Result<()> {
    for spec in specs {
        let (item, rate) = parse_port(spec)?;
        if !catalog.contains(&item) {
            tracing::warn!(item = %item, "Item is not in the catalog");
        }
        let index = draft.add(side);
        draft.set_item(side, index, &item, catalog)?;
        draft.set_rate(side, index, rate)?;
    }
    Ok(())
}
