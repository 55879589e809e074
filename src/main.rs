use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use telltale_console::services::report::TabularFormat;
use telltale_console::{AppError, InspectionConsole};

#[derive(Parser)]
#[command(
    name = "telltale-console",
    about = "Inspection console for the telltale icon classification service"
)]
struct Options {
    /// Base URL of the prediction server.
    #[arg(long, default_value = "http://localhost:8000")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List model versions and the active one.
    Models,
    /// Activate another model version.
    Switch { name: String },
    /// Classify one telltale icon.
    Single { file: PathBuf },
    /// Classify a folder of icons and optionally export a report.
    Batch {
        folder: PathBuf,
        /// Export the results after the batch completes.
        #[arg(long, value_enum)]
        export: Option<ExportKind>,
        /// Directory the exported artifact is written to.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Check the prediction server.
    Health,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportKind {
    Csv,
    Spreadsheet,
    Visual,
}

#[tokio::main]
async fn main() -> ExitCode {
    let options = Options::parse();
    match run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(options: Options) -> Result<(), AppError> {
    let console = InspectionConsole::new(&options.server);

    match options.command {
        Command::Models => cmd_models(&console).await,
        Command::Switch { name } => {
            console.switch_model(&name).await?;
            println!("Active model is now '{}'.", name);
            Ok(())
        }
        Command::Single { file } => cmd_single(&console, &file).await,
        Command::Batch {
            folder,
            export,
            out,
        } => cmd_batch(&console, &folder, export, &out).await,
        Command::Health => {
            let health = console.health().await?;
            println!(
                "Server: {} (model loaded: {}, version: {})",
                health.status,
                health.model_loaded,
                health.version.as_deref().unwrap_or("unknown")
            );
            Ok(())
        }
    }
}

async fn cmd_models(console: &InspectionConsole) -> Result<(), AppError> {
    console.refresh_models().await;

    let available = console.registry().available().await;
    let current = console.registry().current().await;

    if available.is_empty() {
        println!("No models reported.");
        return Ok(());
    }

    for model in &available {
        let marker = if Some(model) == current.as_ref() { "*" } else { " " };
        println!("{} {}", marker, model);
    }
    Ok(())
}

async fn cmd_single(console: &InspectionConsole, path: &Path) -> Result<(), AppError> {
    let result = console.inspect_file(path).await?;

    println!(
        "{}: {} ({:.1}%)",
        result.filename,
        result.prediction,
        result.confidence as f64 * 100.0
    );

    if let Some(top5) = &result.top5 {
        for candidate in top5 {
            println!(
                "    {:<24} {:>5.1}%",
                candidate.label,
                candidate.confidence as f64 * 100.0
            );
        }
    }

    if let Some(preview) = console.single().preview().await {
        println!(
            "    inline preview bound ({} bytes)",
            preview.data_uri().len()
        );
    }
    Ok(())
}

async fn cmd_batch(
    console: &InspectionConsole,
    folder: &Path,
    export: Option<ExportKind>,
    out_dir: &Path,
) -> Result<(), AppError> {
    let candidates = console.load_folder(folder).await?;
    println!("{} PNG candidate(s) selected.", candidates.len());

    let results = console.run_batch().await?;
    for result in &results {
        // Rows with top-5 detail are expandable in the console UI sense.
        let marker = if result.expandable() { "+" } else { " " };
        println!(
            "{} {:<36} {:<20} {:>5.1}%  {}",
            marker,
            result.filename,
            result.prediction,
            result.confidence as f64 * 100.0,
            result.status.as_deref().unwrap_or("")
        );
    }

    let stats = console.batch_stats().await;
    println!(
        "Total: {}  Average confidence: {:.1}%",
        stats.total, stats.average_confidence_percent
    );

    match export {
        None => {}
        Some(ExportKind::Csv) => {
            let path = console.export_tabular(TabularFormat::Csv, out_dir).await?;
            println!("Report written to {}", path.display());
        }
        Some(ExportKind::Spreadsheet) => {
            let path = console
                .export_tabular(TabularFormat::Spreadsheet, out_dir)
                .await?;
            println!("Report written to {}", path.display());
        }
        Some(ExportKind::Visual) => {
            console.refresh_models().await;
            let path = console.export_visual_report(out_dir).await?;
            println!("Report written to {}", path.display());
        }
    }

    Ok(())
}
