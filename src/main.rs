use std::path::PathBuf;

use anyhow::{anyhow, Context};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use dataset_tracker::errors::TrackerError;
use dataset_tracker::external::data_api::SeriesQuery;
use dataset_tracker::logging::{init_logging, LoggingConfig};
use dataset_tracker::models::JobView;
use dataset_tracker::services::derived_table::{series_table, SortDirection, TableView, PRICE_METRICS};
use dataset_tracker::services::job_controller::{CancelOutcome, JobController};
use dataset_tracker::services::series_normalizer;
use dataset_tracker::{AppState, TrackerConfig};

#[derive(Parser)]
#[command(name = "dataset-tracker", about = "Follow and drive dataset updates, query published series")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current update state and history
    Status,
    /// Start a dataset update and follow it
    Start,
    /// Attach to a running update and print progress (Ctrl-C cancels)
    Follow,
    /// Cancel the running update
    Cancel,
    /// List logs of finished updates
    Logs,
    /// Download the log of a finished update
    Download {
        filename: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Fetch series and print their summary table
    Series {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        /// Also print each series rescaled to base 100
        #[arg(long)]
        normalize: bool,
    },
    /// Download the spreadsheet export for a selection
    Export {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct QueryArgs {
    /// Data endpoint relative to the API url, e.g. `precios/productos`
    #[arg(long)]
    endpoint: String,
    #[arg(long, value_delimiter = ',')]
    ids: Vec<String>,
    #[arg(long)]
    from: NaiveDate,
    #[arg(long)]
    to: NaiveDate,
}

impl QueryArgs {
    fn query(&self) -> SeriesQuery {
        SeriesQuery::new(self.ids.clone(), self.from, self.to)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_logging(LoggingConfig::from_env()).map_err(|e| anyhow!("failed to initialize logging: {}", e))?;

    let state = AppState::from_config(TrackerConfig::from_env()).context("invalid tracker configuration")?;
    info!("🔌 Using data API at {}", state.config.api_url);

    let result = run(cli.command, &state).await;
    state.jobs.shutdown();

    if let Err(e) = result {
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, state: &AppState) -> Result<(), TrackerError> {
    match command {
        Command::Status => {
            let view = state.jobs.resume_on_load().await?;
            print_status(&view);
        }
        Command::Start => {
            state.jobs.resume_on_load().await?;
            state.jobs.start().await?;
            follow(&state.jobs).await?;
        }
        Command::Follow => {
            let view = state.jobs.resume_on_load().await?;
            if !view.is_running() {
                println!("No hay ninguna actualización en curso");
                return Ok(());
            }
            follow(&state.jobs).await?;
        }
        Command::Cancel => {
            state.jobs.resume_on_load().await?;
            match state.jobs.cancel().await? {
                CancelOutcome::Accepted => println!("Cancelación solicitada"),
                CancelOutcome::NotRunning => println!("No hay ninguna actualización en curso"),
            }
        }
        Command::Logs => {
            let history = state.jobs.refresh_history().await?;
            if history.is_empty() {
                println!("No hay registros de actualizaciones anteriores");
            }
            for entry in history {
                println!("{}  {}", entry.date, entry.filename);
            }
        }
        Command::Download { filename, out } => {
            let bytes = state.jobs.download_log(&filename).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(&filename));
            write_file(&path, &bytes).await?;
            println!("Guardado {} ({} bytes)", path.display(), bytes.len());
        }
        Command::Series { query, sort, desc, normalize } => {
            let series = state.data.fetch_series(&query.endpoint, &query.query()).await?;

            let mut table = series_table(&series, PRICE_METRICS);
            if let Some(key) = sort {
                let direction = if desc { SortDirection::Desc } else { SortDirection::Asc };
                table.set_sort(&key, direction)?;
            }
            print_table(&table.render());

            if normalize {
                println!();
                for s in series_normalizer::normalize_all(&series) {
                    let last = s
                        .last_value()
                        .map(|v| format!("{:.2}", v))
                        .unwrap_or_else(|| "—".to_string());
                    println!("{}: {} (base 100)", s.name, last);
                }
            }
        }
        Command::Export { query, out } => {
            let file = state.data.export(&query.endpoint, &query.query()).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(&file.filename));
            write_file(&path, &file.bytes).await?;
            println!("Guardado {} ({} bytes)", path.display(), file.bytes.len());
        }
    }
    Ok(())
}

/// Print progress as it arrives until the run leaves `Running`.
async fn follow(jobs: &JobController) -> Result<(), TrackerError> {
    let mut rx = jobs.subscribe();
    let mut printed: Vec<String> = Vec::new();

    loop {
        let view = rx.borrow_and_update().clone();
        print_new_lines(&mut printed, &view);

        if !view.is_running() {
            return Ok(());
        }

        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                // Failure is already in the progress log; keep following
                if let Err(e) = jobs.cancel().await {
                    info!("Cancel request failed: {}", e);
                }
            }
        }
    }
}

// The server resends the whole log; print only what is new.
fn print_new_lines(printed: &mut Vec<String>, view: &JobView) {
    let common = printed
        .iter()
        .zip(&view.progress)
        .take_while(|(a, b)| a == b)
        .count();
    for line in &view.progress[common..] {
        println!("[{}] {}", format_elapsed(view.elapsed_seconds), line);
    }
    *printed = view.progress.clone();
}

fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn print_status(view: &JobView) {
    println!("Estado: {:?} ({})", view.phase, format_elapsed(view.elapsed_seconds));
    for line in &view.progress {
        println!("  {}", line);
    }
    if let Some(latest) = view.history.first() {
        println!("Última actualización: {} ({})", latest.date, latest.filename);
    }
}

fn print_table(view: &TableView) {
    let (headers, rows) = match view {
        TableView::Empty { message } => {
            println!("{}", message);
            return;
        }
        TableView::Rows { headers, rows } => (headers, rows),
    };

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{}{}", c, " ".repeat(w - c.chars().count())))
            .collect::<Vec<_>>()
            .join("  ")
    };

    println!("{}", line(headers.as_slice()));
    println!("{}", widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
    for row in rows {
        println!("{}", line(row.as_slice()));
    }
}

async fn write_file(path: &std::path::Path, bytes: &[u8]) -> Result<(), TrackerError> {
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
