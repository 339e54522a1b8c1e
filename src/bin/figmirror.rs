use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;

use figmirror::archive::ExtractOptions;
use figmirror::blob::AzureStoreFactory;
use figmirror::config::{ConfigLoader, MirrorConfig};
use figmirror::domain::PipelineOutcome;
use figmirror::error::MirrorError;
use figmirror::figshare::FigshareHttpClient;
use figmirror::orchestrate::Mirror;
use figmirror::output::JsonOutput;
use figmirror::{archive, logging};

#[derive(Parser)]
#[command(name = "figmirror")]
#[command(about = "Mirror figshare dataset archives into Azure Blob Storage")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    /// Print machine-readable JSON summaries on stdout.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Transfer every missing dataset file (default)")]
    Run(RunArgs),
    #[command(about = "Show which dataset files are already mirrored")]
    Status,
    #[command(about = "Extract all archives sitting in a local directory")]
    Extract(ExtractArgs),
}

#[derive(Args, Default)]
struct RunArgs {
    /// Plan only: report skip decisions without transferring anything.
    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct ExtractArgs {
    dir: Utf8PathBuf,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(mirror) = report.downcast_ref::<MirrorError>() {
            return ExitCode::from(map_exit_code(mirror));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MirrorError) -> u8 {
    match error {
        MirrorError::MissingAccountUrl
        | MirrorError::ConfigRead(_)
        | MirrorError::ConfigParse(_)
        | MirrorError::InvalidArticleId(_) => 2,
        MirrorError::CatalogHttp(_)
        | MirrorError::CatalogStatus { .. }
        | MirrorError::Storage(_)
        | MirrorError::DownloadExhausted { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;
    let _log_guard = logging::init(&config.log_file).into_diagnostic()?;

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_mirror(config, args.dry_run, cli.json),
        Commands::Status => run_status(config, cli.json),
        Commands::Extract(args) => run_extract(config, args),
    }
}

fn build_mirror(
    config: MirrorConfig,
) -> miette::Result<Mirror<FigshareHttpClient, AzureStoreFactory>> {
    let catalog =
        FigshareHttpClient::new(config.ca_bundle.as_deref()).into_diagnostic()?;
    let factory = AzureStoreFactory::new(
        config.account_url().into_diagnostic()?.to_string(),
        config.container.clone(),
    );
    Ok(Mirror::new(catalog, factory, config))
}

fn run_mirror(config: MirrorConfig, dry_run: bool, json: bool) -> miette::Result<()> {
    let mirror = build_mirror(config)?;

    if dry_run {
        let plan = mirror.plan().into_diagnostic()?;
        if json {
            JsonOutput::print_plan(&plan).into_diagnostic()?;
        } else {
            println!(
                "{} file(s) already mirrored, {} pending",
                plan.skipped.len(),
                plan.pending.len()
            );
            for entry in &plan.pending {
                println!("  would transfer {}", entry.name);
            }
        }
        return Ok(());
    }

    let summary = mirror.run().into_diagnostic()?;
    if json {
        JsonOutput::print_run(&summary).into_diagnostic()?;
    } else {
        println!(
            "figmirror summary: {} skipped, {} transferred, {} failed",
            summary.skipped.len(),
            summary.reports.len() - summary.failed_count(),
            summary.failed_count()
        );
        for report in &summary.reports {
            match report.outcome {
                PipelineOutcome::Uploaded(count) => {
                    println!("  {} -> {} blob(s)", report.file_name, count);
                }
                PipelineOutcome::Failed => {
                    println!("  {} -> FAILED (see log file)", report.file_name);
                }
            }
        }
    }
    Ok(())
}

fn run_status(config: MirrorConfig, json: bool) -> miette::Result<()> {
    let mirror = build_mirror(config)?;
    let plan = mirror.plan().into_diagnostic()?;
    if json {
        JsonOutput::print_plan(&plan).into_diagnostic()?;
        return Ok(());
    }
    for name in &plan.skipped {
        println!("mirrored  {name}");
    }
    for entry in &plan.pending {
        println!("pending   {}", entry.name);
    }
    Ok(())
}

fn run_extract(config: MirrorConfig, args: ExtractArgs) -> miette::Result<()> {
    let options = ExtractOptions {
        skip_existing: config.skip_existing_extraction,
    };
    let reports = archive::extract_all(
        args.dir.as_std_path(),
        config.extract_workers,
        options,
    )
    .into_diagnostic()?;

    let mut failures = 0usize;
    for report in &reports {
        match &report.result {
            Ok(outcome) => println!("  {} -> {outcome:?}", report.file_name),
            Err(err) => {
                failures += 1;
                println!("  {} -> FAILED: {err}", report.file_name);
            }
        }
    }
    if failures > 0 {
        return Err(miette::Report::msg(format!(
            "{failures} of {} archive(s) failed to extract",
            reports.len()
        )));
    }
    Ok(())
}
