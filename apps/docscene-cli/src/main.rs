use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use docscene_author::{Document, DocumentConfig};
use docscene_common::{ModelDisplayNode, ModelNode, SelectionNode, TransformNode};
use docscene_kernel::NodeRegistry;
use docscene_tools::SceneInspector;

#[derive(Parser)]
#[command(name = "docscene-cli", about = "CLI tool for docscene documents")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML document configuration
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered node types
    Types,
    /// Summarize a document, or show one node
    Inspect {
        file: PathBuf,
        /// Node ID to show in detail
        #[arg(short, long)]
        node: Option<String>,
        /// List references whose target is missing
        #[arg(long)]
        dangling: bool,
    },
    /// Import one document into another and write the result
    Merge {
        base: PathBuf,
        other: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Build a scene, edit it, then undo and redo the edits
    Demo {
        /// Number of models to create
        #[arg(short, long, default_value = "3")]
        models: usize,
        /// Write the final scene here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => DocumentConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => DocumentConfig::default(),
    };
    tracing::debug!(?config, "document config");

    match cli.command {
        Commands::Types => {
            println!("docscene-cli v{}", env!("CARGO_PKG_VERSION"));
            for tag in NodeRegistry::with_builtin_types().tags() {
                println!("  {tag}");
            }
        }
        Commands::Inspect {
            file,
            node,
            dangling,
        } => {
            let doc = open(&file, config)?;
            let scene = doc.scene();
            println!("{}", SceneInspector::summary(scene));
            for count in SceneInspector::type_counts(scene) {
                println!("  {count}");
            }
            if let Some(id) = node {
                match SceneInspector::inspect_node(scene, &id) {
                    Some(info) => println!("{info}"),
                    None => println!("node {id} not found"),
                }
            }
            if dangling {
                for edge in SceneInspector::dangling(scene) {
                    println!("dangling: {} -> {}", edge.source, edge.target);
                }
            }
        }
        Commands::Merge {
            base,
            other,
            output,
        } => {
            let mut doc = open(&base, config)?;
            let report = doc
                .import_file(&other)
                .with_context(|| format!("importing {}", other.display()))?;
            for (declared, assigned) in &report.renamed {
                println!("renamed {declared} -> {assigned}");
            }
            let written = doc
                .save_as(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!(
                "Merged: added={} merged={} skipped={} written={written}",
                report.added.len(),
                report.merged.len(),
                report.skipped.len()
            );
        }
        Commands::Demo { models, output } => run_demo(config, models, output.as_deref())?,
    }

    Ok(())
}

fn open(path: &Path, config: DocumentConfig) -> anyhow::Result<Document> {
    let mut doc = Document::new(config);
    doc.load(path)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(doc)
}

fn run_demo(config: DocumentConfig, models: usize, output: Option<&Path>) -> anyhow::Result<()> {
    let mut doc = Document::new(config);
    doc.scene_mut().add_node(Box::new(SelectionNode::default()));
    let transform = doc.add_node(Box::new(TransformNode::default()));

    for _ in 0..models {
        let display = doc.add_node(Box::new(ModelDisplayNode::default()));
        let mut model = ModelNode::default();
        model.display = Some(display.id());
        model.transform = Some(transform.id());
        doc.add_node(Box::new(model));
    }
    println!("Built: {}", SceneInspector::summary(doc.scene()));

    let transform_id = transform.id();
    doc.checkpoint(&[transform_id.as_str()]);
    if let Some(mut t) = transform.downcast_mut::<TransformNode>() {
        t.matrix = glam::Mat4::from_translation(glam::Vec3::new(10.0, 0.0, 0.0));
    }
    doc.remove_node("Model1");
    println!("Edited: {}", SceneInspector::summary(doc.scene()));

    for _ in 0..2 {
        let outcome = doc.undo()?;
        println!(
            "Undo: restored={} removed={} overwritten={} stale={}",
            outcome.restored, outcome.removed, outcome.overwritten, outcome.stale
        );
    }
    if let Some(info) = SceneInspector::inspect_node(doc.scene(), &transform_id) {
        println!("{info}");
    }

    let outcome = doc.redo()?;
    println!(
        "Redo: restored={} removed={} overwritten={}",
        outcome.restored, outcome.removed, outcome.overwritten
    );
    println!("Final: {}", SceneInspector::summary(doc.scene()));

    if let Some(path) = output {
        let written = doc
            .save_as(path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {written} nodes to {}", path.display());
    }
    Ok(())
}
