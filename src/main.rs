use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use genwatch::cli::{Cli, Command, PdfCommand, ReportCommand};
use genwatch::config::GenwatchConfig;
use genwatch::graphql::{GraphqlClient, PdfService, ReportRunService, document_status_dispatch};
use genwatch::notify::GenerateOptions;
use genwatch::orchestrator::GenerationMonitor;
use genwatch::report_run::{ReportRunMonitor, RunView};
use genwatch::ui::{self, TerminalNotifier};

// Exit code conventionally used after SIGINT.
const INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => GenwatchConfig::load_from(path)?,
        None => GenwatchConfig::load()?,
    };
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }

    let client = Arc::new(GraphqlClient::new(
        config.endpoint.clone(),
        config.auth_token.clone(),
        config.request_timeout(),
    )?);
    tracing::debug!(endpoint = %client.endpoint(), "GraphQL client ready");

    match cli.command {
        Command::Pdf {
            document,
            success_message,
            error_message,
        } => {
            let options = GenerateOptions {
                success_message,
                error_message,
            };
            generate_pdf(client, &config, &document, options).await
        }
        Command::Report { action } => {
            let monitor = ReportRunMonitor::new(
                Arc::new(ReportRunService::new(client)),
                config.report_poll(),
            );
            match action {
                ReportCommand::Run => run_report(&monitor).await,
                ReportCommand::Watch => watch_report(&monitor).await,
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "genwatch=debug" } else { "genwatch=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn generate_pdf(
    client: Arc<GraphqlClient>,
    config: &GenwatchConfig,
    document: &PdfCommand,
    options: GenerateOptions,
) -> Result<ExitCode> {
    let input = document.input();
    let notifier = Arc::new(TerminalNotifier::start(&format!(
        "Generating {} PDF",
        input.resource_type()
    )));
    let monitor = GenerationMonitor::new(
        Arc::new(PdfService::new(Arc::clone(&client))),
        document_status_dispatch(client),
        notifier.clone(),
        config.pdf_poll(),
    );

    monitor.generate(input, options);
    tokio::select! {
        _ = monitor.wait_idle() => {}
        _ = tokio::signal::ctrl_c() => {
            monitor.dispose();
            notifier.abandon();
            eprintln!("Cancelled");
            return Ok(ExitCode::from(INTERRUPTED));
        }
    }

    Ok(if notifier.failed() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn run_report(monitor: &ReportRunMonitor) -> Result<ExitCode> {
    let pb = ui::spinner("Waiting for report run");
    let result = tokio::select! {
        result = monitor.trigger_and_wait() => result,
        _ = tokio::signal::ctrl_c() => {
            monitor.dispose();
            pb.finish_and_clear();
            eprintln!("Cancelled");
            return Ok(ExitCode::from(INTERRUPTED));
        }
    };
    pb.finish_and_clear();

    match result {
        Ok(Some(view)) => {
            ui::print_run_view(&view);
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) => Ok(ExitCode::from(INTERRUPTED)),
        Err(e) => {
            ui::print_run_view(&monitor.view());
            tracing::warn!(error = %e, "Report run failed");
            eprintln!("Report run failed: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn watch_report(monitor: &ReportRunMonitor) -> Result<ExitCode> {
    let mut views = monitor.subscribe();
    monitor.start_watching();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut last_printed: Option<RunView> = None;

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(ExitCode::SUCCESS);
                }
                let view = views.borrow_and_update().clone();
                if !view.watching {
                    if let Some(error) = &view.error {
                        eprintln!("Stopped watching: {error}");
                        return Ok(ExitCode::FAILURE);
                    }
                    return Ok(ExitCode::SUCCESS);
                }
                let has_data = view.running || view.last_status.is_some();
                if has_data && last_printed.as_ref() != Some(&view) {
                    ui::print_run_view(&view);
                    last_printed = Some(view);
                }
            }
            _ = &mut ctrl_c => {
                monitor.dispose();
                return Ok(ExitCode::SUCCESS);
            }
        }
    }
}
