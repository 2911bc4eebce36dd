use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::fs;
use std::path::PathBuf;

use netweave::export::{to_containerlab, topology_document, DEFAULT_NODE_IMAGE};
use netweave::history::HistoryStore;
use netweave::learning;
use netweave::orchestrator::{run_pipeline, PipelineOptions};
use netweave::Intent;

/// Design and evaluate network topologies from declarative intent
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the intent YAML file
    #[arg(short, long)]
    intent: PathBuf,

    /// Output directory for topology, containerlab, and report files
    #[arg(short, long, default_value = "netweave_output")]
    output: PathBuf,

    /// History database path
    #[arg(long, default_value = "netweave_history.db")]
    db: PathBuf,

    /// Seed for reproducible synthesis
    #[arg(long)]
    seed: Option<u64>,

    /// Consult the learning subsystem before synthesis
    #[arg(long)]
    learn: bool,

    /// Print ranked pattern recommendations and exit
    #[arg(long)]
    recommend: bool,

    /// Container image for exported nodes
    #[arg(long, default_value = DEFAULT_NODE_IMAGE)]
    image: String,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting netweave");
    info!("Intent file: {:?}", args.intent);
    info!("Output directory: {:?}", args.output);

    let intent_text = fs::read_to_string(&args.intent)
        .wrap_err_with(|| format!("reading intent file {:?}", args.intent))?;
    let intent: Intent =
        serde_yaml::from_str(&intent_text).wrap_err("parsing intent YAML")?;

    let store = HistoryStore::open(&args.db)
        .wrap_err_with(|| format!("opening history database {:?}", args.db))?;

    fs::create_dir_all(&args.output)
        .wrap_err_with(|| format!("creating output directory {:?}", args.output))?;

    if args.recommend {
        let recommendation = learning::recommend(&store, &intent, 5)?;
        let path = args.output.join("recommendations.json");
        fs::write(&path, serde_json::to_string_pretty(&recommendation.ranked)?)?;
        info!("Wrote {} ranked patterns to {:?}", recommendation.ranked.len(), path);
        for (rank, scored) in recommendation.ranked.iter().enumerate() {
            info!(
                "  #{} {} (composite {:.1}, {} confidence {:.0})",
                rank + 1,
                scored.pattern.as_str(),
                scored.composite_score,
                scored.confidence_label(),
                scored.confidence
            );
        }
        return Ok(());
    }

    let options = PipelineOptions {
        seed: args.seed,
        consult_learning: args.learn,
        ..PipelineOptions::default()
    };
    let report = run_pipeline(&store, &intent, &options);

    let report_path = args.output.join("report.json");
    fs::write(&report_path, serde_json::to_string_pretty(&report)?)?;
    info!("Pipeline report: {:?}", report_path);

    if let Some(topology) = &report.topology {
        let clab_path = args.output.join("containerlab.yaml");
        fs::write(
            &clab_path,
            serde_yaml::to_string(&to_containerlab(topology, &args.image))?,
        )?;
        let topo_path = args.output.join("topology.yaml");
        fs::write(&topo_path, serde_yaml::to_string(&topology_document(topology))?)?;

        info!("Generated topology '{}':", topology.name);
        info!("  Devices: {}", topology.device_count());
        info!("  Links: {}", topology.link_count());
        info!("  Health score: {:.1}", report.summary.health_score);
        info!("  Validation score: {:.1}", report.summary.overall_score);
        info!("  Intent satisfied: {}", report.summary.satisfied);
        info!("Containerlab export: {:?}", clab_path);
        info!("Ready to deploy with: containerlab deploy -t {:?}", clab_path);
    }

    info!("Pipeline finished with status: {}", report.overall_status);
    if report.overall_status == "failed" {
        std::process::exit(1);
    }
    Ok(())
}
