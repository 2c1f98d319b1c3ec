use std::path::PathBuf;
use std::process::ExitCode;

use clap::{value_parser, Arg, ArgMatches, Command};

use cohortlens_lib::config::{self, Settings};
use cohortlens_lib::db::repository;
use cohortlens_lib::pipeline::source::FsNoteSource;
use cohortlens_lib::workflow::{self, WorkflowError};

fn cli() -> Command {
    Command::new("cohortlens")
        .version(config::APP_VERSION)
        .about("Clinical-note feature extraction and cohort clustering")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Settings JSON file (defaults apply when omitted)"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Maximum documents per extraction batch"),
        )
        .arg(
            Arg::new("clusters")
                .long("clusters")
                .global(true)
                .value_parser(value_parser!(usize))
                .help("Requested cluster count K"),
        )
        .subcommand(Command::new("register").about("Register note files as documents"))
        .subcommand(Command::new("extract").about("Extract features from unfeatured documents"))
        .subcommand(Command::new("cluster").about("Cluster featured documents and publish assignments"))
        .subcommand(Command::new("run").about("register, extract and cluster in one go"))
}

fn load_settings(args: &ArgMatches) -> Result<Settings, WorkflowError> {
    let mut settings = match args.get_one::<PathBuf>("config") {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(&batch_size) = args.get_one::<usize>("batch-size") {
        settings.extraction.batch_size = batch_size;
    }
    if let Some(&clusters) = args.get_one::<usize>("clusters") {
        settings.clustering.n_clusters = clusters;
    }
    settings.validate()?;
    Ok(settings)
}

fn execute(command: &str, args: &ArgMatches) -> Result<(), WorkflowError> {
    let settings = load_settings(args)?;
    let store = workflow::open_store(&settings)?;
    let now = repository::utc_now();

    match command {
        "register" => {
            let report = workflow::run_registration(&settings, &store, now)?;
            println!("Registered: {} new, {} already known", report.inserted, report.skipped);
        }
        "extract" => {
            let extractor = workflow::build_extractor(&settings)?;
            let report = workflow::run_extraction(&settings, &store, &FsNoteSource::new(), &extractor)?;
            println!(
                "Extraction: {} selected, {} normalized, {} skipped, {} failed, {} features inserted",
                report.selected, report.normalized, report.skipped, report.failed, report.features_inserted
            );
        }
        "cluster" => {
            let run = workflow::run_clustering(&settings, &store, now)?;
            println!(
                "Clustering: {} scopes published, report at {}",
                run.published.scopes_written,
                run.report_path.display()
            );
        }
        "run" => {
            let extractor = workflow::build_extractor(&settings)?;
            let summary = workflow::run_all(&settings, &store, &FsNoteSource::new(), &extractor, now)?;
            println!(
                "Registered {}, normalized {}, failed {}, {} scopes published, report at {}",
                summary.registration.inserted,
                summary.extraction.normalized,
                summary.extraction.failed,
                summary.clustering.published.scopes_written,
                summary.clustering.report_path.display()
            );
        }
        other => unreachable!("unknown subcommand {other}"),
    }
    Ok(())
}

fn main() -> ExitCode {
    cohortlens_lib::init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let matches = cli().get_matches();
    let Some((command, args)) = matches.subcommand() else {
        return ExitCode::FAILURE;
    };

    match execute(command, args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(command, error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn overrides_apply_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["cohortlens", "cluster", "--clusters", "6", "--batch-size", "10"])
            .unwrap();
        let (command, args) = matches.subcommand().unwrap();
        assert_eq!(command, "cluster");
        let settings = load_settings(args).unwrap();
        assert_eq!(settings.clustering.n_clusters, 6);
        assert_eq!(settings.extraction.batch_size, 10);
    }

    #[test]
    fn zero_clusters_rejected() {
        let matches = cli()
            .try_get_matches_from(["cohortlens", "run", "--clusters", "0"])
            .unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert!(load_settings(args).is_err());
    }
}
