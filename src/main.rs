use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use resend_rs::Resend;
use std::{path::PathBuf, sync::Arc};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use worklog_report::{
    config::{policy_from_env, ServiceConfig},
    helpers::{
        aggregate::aggregate,
        delivery::EmailSink,
        llm::{openrouter_client_init, OpenRouterClient},
        retriever::ExportRetriever,
        summary::report_summary,
        validator::validate,
        xlsx::ReportRenderer,
    },
    models::{calendar::MonthKey, report::parse_raw_report},
    service::ReportService,
};

#[derive(Parser)]
#[command(name = "worklog-report", about = "Monthly worklog reports from chat history")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API
    Serve,
    /// Run the full pipeline once for a month
    Run {
        #[arg(long)]
        month: MonthKey,
    },
    /// Validate a raw report file offline, optionally rendering it
    Validate {
        #[arg(long)]
        month: MonthKey,
        #[arg(long)]
        file: PathBuf,
        #[arg(long)]
        xlsx: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Serve => {
            let config = ServiceConfig::from_env()?;
            let service = build_service(&config).await?;

            let listener = TcpListener::bind(&config.bind).await?;
            info!("Server running on http://{}", config.bind);
            axum::serve(listener, service.router()).await?;
        }
        Command::Run { month } => {
            let config = ServiceConfig::from_env()?;
            let service = build_service(&config).await?;

            let outcome = service.process_month(month).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::Validate { month, file, xlsx } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;

            let policy = policy_from_env()?;
            let report = parse_raw_report(&raw, month)?;
            let verdict = validate(&report, &policy);
            let totals = aggregate(&verdict.normalized_report);

            println!("{}", report_summary(&verdict, &totals, &policy));

            if let Some(path) = xlsx {
                let bytes = ReportRenderer::new(Local::now().date_naive()).render(&verdict, &totals)?;
                tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!("Workbook written to {}", path.display());
            }
        }
    }

    Ok(())
}

async fn build_service(config: &ServiceConfig) -> anyhow::Result<ReportService> {
    let client = openrouter_client_init(&config.openrouter_api_key)?;
    let resend = Resend::new(&config.resend_api_key);
    let prompt_template = config.prompt_template().await?;

    Ok(ReportService::new(
        Arc::new(ExportRetriever::new(config.export_dir.clone())),
        Arc::new(OpenRouterClient::new(client, config.openrouter_model.clone())),
        Arc::new(EmailSink::new(resend, config.from.clone())),
        config.report_config(prompt_template),
    ))
}
