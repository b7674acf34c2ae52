//! Bindery CLI - compile and preview binding definitions

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;

use bindery::config::DEFAULT_CONFIG_FILE;
use bindery::presentation::{ImageContent, ViewKind};
use bindery::{
    compile, Adapters, BinderKind, BinderyConfig, BinderyError, BindingPlan, FixSuggestion,
    HostContext, JsonFixture, ResourceId, Transformation, ViewNode, ViewTree, XmlDocument,
};

#[derive(Parser)]
#[command(name = "bindery")]
#[command(about = "Bindery - compile and preview row-to-view binding definitions")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a definition and print its binding plan
    Validate {
        /// Path to the definition (.xml)
        file: PathBuf,

        /// Config file (defaults to ./bindery.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Required root element (overrides the config file)
        #[arg(short, long)]
        root: Option<String>,
    },

    /// Load rows from a JSON fixture and print the bound views
    Render {
        /// Path to the definition (.xml)
        file: PathBuf,

        /// JSON rows: an array, or an object keyed by URI
        #[arg(long)]
        rows: PathBuf,

        /// Config file (defaults to ./bindery.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Load from this URI instead of the definition's
        #[arg(short, long)]
        uri: Option<String>,

        /// Selection arguments, in order
        #[arg(short = 'a', long = "arg")]
        args: Vec<String>,

        /// Print the loader event log as JSON
        #[arg(long)]
        events: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Validate { file, config, root } => validate(&file, config, root),
        Commands::Render {
            file,
            rows,
            config,
            uri,
            args,
            events,
        } => render(&file, &rows, config, uri, args, events).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if let Some(suggestion) = e
            .downcast_ref::<BinderyError>()
            .and_then(|e| e.fix_suggestion())
        {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
        std::process::exit(1);
    }
}

fn load_config(path: Option<PathBuf>) -> Result<BinderyConfig> {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let config = BinderyConfig::load(&path)?.with_env()?;
    Ok(config)
}

/// Definition identifier used in messages: the file stem
fn source_name(file: &Path) -> String {
    file.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

fn read_definition(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read definition {}", file.display()))
}

fn validate(file: &Path, config: Option<PathBuf>, root: Option<String>) -> Result<()> {
    let config = load_config(config)?;
    let ctx = config.host_context();
    let xml = read_definition(file)?;

    let expected_root = root.or(config.expected_root.clone());
    let mut doc = XmlDocument::new(source_name(file), &xml);
    let plan = compile(&mut doc, expected_root.as_deref(), &ctx)?;

    println!("{} Definition '{}' is valid", "✓".green(), file.display());
    print_plan(&plan, &ctx);
    Ok(())
}

fn print_plan(plan: &BindingPlan, ctx: &HostContext) {
    let name = |id: ResourceId| {
        ctx.resources()
            .entry_name(id)
            .unwrap_or_else(|| id.to_string())
    };

    println!("  Target: {}", name(plan.target_descriptor()));
    let query = plan.query_spec();
    println!("  URI: {}", query.source_uri.as_deref().unwrap_or("(none)"));
    if let Some(selection) = &query.selection {
        println!("  Selection: {}", selection);
    }
    if let Some(sort) = &query.sort_order {
        println!("  Sort: {}", sort);
    }
    println!("  Columns: {}", plan.selected_columns().join(", "));
    println!("  Bindings: {}", plan.bindings().len());
    for binding in plan.bindings() {
        println!(
            "    {} {} {} ({}{})",
            binding.from.cyan(),
            "→".cyan(),
            name(binding.to),
            binding.kind,
            describe(&binding.transformation)
        );
    }
    for shared in plan.shared_targets() {
        println!(
            "  {} several bindings write '{}'; the last one wins",
            "⚠".yellow(),
            name(shared)
        );
    }
}

fn describe(transformation: &Transformation) -> String {
    match transformation {
        Transformation::Identity => String::new(),
        Transformation::ValueMap(map) => format!(", map of {}", map.len()),
        Transformation::Expression(expression) => format!(", expression \"{}\"", expression),
        Transformation::Custom { identifier, .. } => format!(", transform {}", identifier),
    }
}

async fn render(
    file: &Path,
    rows: &Path,
    config: Option<PathBuf>,
    uri: Option<String>,
    args: Vec<String>,
    events: bool,
) -> Result<()> {
    let config = load_config(config)?;
    let ctx = config.host_context();
    let xml = read_definition(file)?;
    let fixture = JsonFixture::from_path(rows)
        .with_context(|| format!("Failed to load rows from {}", rows.display()))?;

    let adapters = Adapters::new(ctx.clone())
        .with_expected_root(config.expected_root.clone())
        .with_data_source(Arc::new(fixture))
        .with_timeout(config.query_timeout());

    let mut doc = XmlDocument::new(source_name(file), &xml);
    let mut adapter = match uri {
        Some(uri) => adapters.load_cursor_adapter_with_uri(&mut doc, &uri, &args)?,
        None => adapters.load_adapter(&mut doc, &args)?,
    };

    if !adapter.load() {
        return Err(BinderyError::Config {
            reason: format!("'{}' declares no uri; pass --uri", file.display()),
        }
        .into());
    }
    adapter.wait_for_load().await;

    let name = |id: ResourceId| {
        ctx.resources()
            .entry_name(id)
            .unwrap_or_else(|| id.to_string())
    };

    println!(
        "{} {} row(s) from {}",
        "→".cyan(),
        adapter.count(),
        adapter.uri().unwrap_or_default().cyan()
    );
    for position in 0..adapter.count() {
        let mut tree = view_tree(adapter.plan());
        adapter.bind_position(&mut tree, position);
        let id = adapter
            .item_id(position)
            .map_or_else(|| "?".to_string(), |id| id.to_string());
        println!("{} {}", "Row".bold(), id);
        for (target, node) in tree.iter() {
            println!("  {} = {}", name(*target), show(node, &name));
        }
    }

    if events {
        println!("{}", serde_json::to_string_pretty(&adapters.events().to_json())?);
    }
    Ok(())
}

/// One view per bound target, shaped after the first binding that uses it
fn view_tree(plan: &BindingPlan) -> ViewTree {
    let mut nodes: BTreeMap<ResourceId, ViewNode> = BTreeMap::new();
    for binding in plan.bindings() {
        nodes.entry(binding.to).or_insert_with(|| match binding.kind {
            BinderKind::String => ViewNode::text(),
            BinderKind::Image | BinderKind::ImageUri | BinderKind::Drawable => ViewNode::image(),
            BinderKind::Tag | BinderKind::Custom(_) => ViewNode::plain(),
        });
    }
    nodes
        .into_iter()
        .fold(ViewTree::new(), |tree, (id, node)| tree.with_node(id, node))
}

fn show(node: &ViewNode, name: &dyn Fn(ResourceId) -> String) -> String {
    let mut out = match &node.kind {
        ViewKind::Text { text } => format!("\"{}\"", text),
        ViewKind::Image { content: None } => "(no image)".to_string(),
        ViewKind::Image {
            content: Some(ImageContent::Bytes(bytes)),
        } => format!("image {} bytes", bytes.len()),
        ViewKind::Image {
            content: Some(ImageContent::Uri(uri)),
        } => format!("image {}", uri),
        ViewKind::Image {
            content: Some(ImageContent::Drawable(id)),
        } => format!("drawable {}", name(*id)),
        ViewKind::Plain => "(view)".to_string(),
    };
    if let Some(tag) = &node.tag {
        out.push_str(&format!(" [tag {}]", tag));
    }
    out
}
