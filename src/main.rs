//! `mlcore` command line: stage, validate, train, evaluate and serve.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use mlcore::common::log::init_tracing;
use mlcore::data::repo_fs::FsDataRepo;
use mlcore::data::service::{ingest_file, load_table, sample_rows, validation_report};
use mlcore::evaluation::service::evaluate;
use mlcore::inference::{AppContext, MetricsSink};
use mlcore::training::domain::ArtifactStore;
use mlcore::training::repo_fs::write_json;
use mlcore::training::{train, FsArtifactStore};
use mlcore::{AppCfg, TrainParams};

#[derive(Parser, Debug)]
#[command(name = "mlcore", version, about = "Tabular binary classifier pipeline")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "MLCORE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Stage a raw delimited file as the training table
    Ingest {
        /// Raw input file
        source: PathBuf,

        /// Field delimiter of the raw file
        #[arg(long, default_value = ";")]
        delimiter: char,

        /// Staged output (defaults to <data_root>/staged/data.csv)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Write a validation report for the staged table
    Validate {
        #[arg(long)]
        input: Option<PathBuf>,

        /// Training parameters (for the target column)
        #[arg(long, default_value = "params.yaml")]
        params: PathBuf,
    },

    /// Grid-search, fit and persist a model
    Train {
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long, default_value = "params.yaml")]
        params: PathBuf,

        /// Down-sample to `small_run_rows` before training
        #[arg(long, env = "SMALL_RUN")]
        small_run: bool,
    },

    /// Score the persisted model on the held-out split
    Evaluate {
        #[arg(long)]
        input: Option<PathBuf>,

        #[arg(long, default_value = "params.yaml")]
        params: PathBuf,
    },

    /// Run the prediction service
    Serve {
        /// Listen address (overrides config)
        #[arg(long)]
        listen: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = AppCfg::load(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(&cfg.log_level, cfg.log_format);

    match cli.command {
        Command::Ingest {
            source,
            delimiter,
            output,
        } => {
            if !delimiter.is_ascii() {
                bail!("delimiter must be a single ASCII character, got {delimiter:?}");
            }
            let staged = output.unwrap_or_else(|| cfg.staged_table());
            let repo = FsDataRepo::new(&cfg.data_root);
            let dataset = ingest_file(&source, delimiter as u8, &staged, &repo)?;
            info!(dataset = %dataset.id, path = %staged.display(), "ingest complete");
        }
        Command::Validate { input, params } => {
            let params = load_params(&params)?;
            let table = load_table(&input.unwrap_or_else(|| cfg.staged_table()))?;
            let report = validation_report(&table, &params.target);
            let out = cfg.staged_dir().join("validation_report.json");
            write_json(&out, &report)?;
            if !report.target_present {
                tracing::warn!(target_column = %params.target, "target column not found");
            }
            info!(
                rows = report.shape.0,
                cols = report.shape.1,
                path = %out.display(),
                "validation report written"
            );
        }
        Command::Train {
            input,
            params,
            small_run,
        } => {
            let params = load_params(&params)?;
            let mut table = load_table(&input.unwrap_or_else(|| cfg.staged_table()))?;
            if small_run {
                table = sample_rows(&table, params.small_run_rows, params.seed);
                info!(rows = table.n_rows(), "small run: table down-sampled");
            }
            let store = FsArtifactStore::new(&cfg);
            let outcome = train(&table, &params, &store)?;
            info!(
                best = %outcome.report.best_params,
                accuracy = outcome.report.accuracy,
                f1 = outcome.report.f1,
                "model trained"
            );
        }
        Command::Evaluate { input, params } => {
            let params = load_params(&params)?;
            let table = load_table(&input.unwrap_or_else(|| cfg.staged_table()))?;
            let bundle = FsArtifactStore::new(&cfg).load()?;
            let report = evaluate(&bundle, &table, &params)?;
            write_json(&cfg.eval_report_path, &report)?;
            info!(path = %cfg.eval_report_path.display(), "evaluation report written");
        }
        Command::Serve { listen } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("building tokio runtime")?;
            runtime.block_on(serve(cfg, listen))?;
        }
    }
    Ok(())
}

fn load_params(path: &Path) -> anyhow::Result<TrainParams> {
    if path.exists() {
        let params = TrainParams::load(path)?;
        info!(path = %path.display(), "loaded training parameters");
        Ok(params)
    } else {
        info!(path = %path.display(), "parameter file not found, using defaults");
        Ok(TrainParams::default())
    }
}

async fn serve(cfg: AppCfg, listen: Option<String>) -> anyhow::Result<()> {
    let metrics = MetricsSink::spawn(&cfg.telemetry)?;
    let store = Arc::new(FsArtifactStore::new(&cfg));
    let ctx = Arc::new(AppContext::new(store, metrics));
    let app = mlcore::api::router(ctx);

    let addr = listen.unwrap_or_else(|| cfg.listen_addr.clone());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(addr = %addr, model = %cfg.model_path.display(), "prediction service listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;
    info!("prediction service stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
    }
}
