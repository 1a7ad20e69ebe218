//! Run command implementation.

use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use corroborate_domain::{CancellationToken, Query, RetrievalPort};
use corroborate_engine::{EngineConfig, Orchestrator};
use corroborate_llm::OllamaReasoner;
use corroborate_sources::{Corpus, Retrying, SourceRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Execute the run command.
pub async fn execute_run(args: RunArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    if args.question.trim().is_empty() {
        return Err(CliError::InvalidInput("Question must not be empty".to_string()));
    }

    let engine_config = engine_config(&args, config)?;
    let corpus_path = corpus_path(&args, config)?;
    let corpus = Corpus::load(&corpus_path)?;
    info!(
        path = %corpus_path.display(),
        documents = corpus.len(),
        "Loaded corpus"
    );
    let registry = registry(&corpus);

    let endpoint = args
        .endpoint
        .clone()
        .unwrap_or_else(|| config.model.endpoint.clone());
    let model = args.model.clone().unwrap_or_else(|| config.model.name.clone());
    let reasoner = OllamaReasoner::new(endpoint, model)?;

    let threshold = engine_config.confidence_threshold;
    let mut orchestrator = Orchestrator::new(engine_config, registry, Arc::new(reasoner))?;

    let printer = if args.progress {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        orchestrator = orchestrator.with_events(tx);
        let progress = Formatter::new(formatter.format(), formatter.color_enabled());
        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                eprintln!("{}", progress.event(&event));
            }
        }))
    } else {
        None
    };

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing with partial evidence");
                cancel.cancel();
            }
        })
    };

    let query = Query::new(args.question.trim(), args.mode.into());
    let result = orchestrator.run(query, &cancel).await;
    interrupt.abort();

    // Dropping the orchestrator closes the event channel.
    drop(orchestrator);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let result = result?;
    println!("{}", formatter.format_result(&result, threshold)?);

    Ok(())
}

/// Resolve the engine configuration: preset or configured engine section,
/// then command-line overrides.
pub fn engine_config(args: &RunArgs, config: &Config) -> Result<EngineConfig> {
    let mut engine = match args.preset {
        Some(preset) => EngineConfig::preset(preset.name()).ok_or_else(|| {
            CliError::InvalidInput(format!("Unknown preset: {}", preset.name()))
        })?,
        None => config.engine.clone(),
    };

    if let Some(max_iterations) = args.max_iterations {
        engine.max_iterations = max_iterations;
    }

    if let Some(threshold) = args.threshold {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(CliError::InvalidInput(
                "Threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        engine.confidence_threshold = threshold;
    }

    engine.validate()?;
    Ok(engine)
}

/// One retrying port per source kind in the corpus.
pub fn registry(corpus: &Corpus) -> SourceRegistry {
    let ports = corpus
        .ports()
        .into_iter()
        .map(|port| Arc::new(Retrying::new(port)) as Arc<dyn RetrievalPort>)
        .collect();
    SourceRegistry::from_ports(ports)
}

/// Corpus path from the command line, else from the configuration file.
pub fn corpus_path(args: &RunArgs, config: &Config) -> Result<PathBuf> {
    args.corpus
        .clone()
        .or_else(|| config.corpus.clone())
        .ok_or_else(|| {
            CliError::InvalidInput(
                "No corpus given; pass --corpus or set `corpus` in the config file".to_string(),
            )
        })
}
