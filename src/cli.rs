//! Command-line interface implementation
//!
//! Thin adapters mapping the host lifecycle onto the pipeline: `build` and
//! `watch` for development, `invoke` for local execution, `package` for
//! producing deployable artifacts.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::functions::load_service;
use crate::pipeline::{Pipeline, RunMode};
use crate::report::{ConsoleReporter, NullReporter, Reporter};
use crate::toolchain::CommandToolchain;
use crate::SERVICE_FILE;

pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;

/// Stagehand - build and stage deployable service artifacts
#[derive(Parser)]
#[command(name = "stg")]
#[command(about = "Stagehand - build and stage deployable service artifacts")]
#[command(version)]
pub struct Cli {
    /// Service root directory (defaults to the current directory)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress progress output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full build pipeline once
    Build,
    /// Run the pipeline, then rebuild on source changes
    Watch,
    /// Run the pipeline and invoke a function locally
    Invoke {
        /// Function to invoke
        #[arg(short, long)]
        function: String,

        /// Re-invoke the function whenever its sources change
        #[arg(long)]
        watch: bool,
    },
    /// Package the service for deployment
    Package {
        /// Package a single function instead of the whole service
        #[arg(short, long)]
        function: Option<String>,
    },
}

/// CLI entry point.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    dispatch(cli)
}

fn dispatch(cli: Cli) -> ExitCode {
    let root = match cli.root.clone().map_or_else(std::env::current_dir, Ok) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Error: cannot determine service root: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let service = match load_service(&root) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let Some(tools) = service.tools.clone() else {
        eprintln!(
            "Error: {} has no 'tools' section; configure the spec, routes, schemaTypes and compile commands",
            SERVICE_FILE
        );
        return ExitCode::from(EXIT_ERROR);
    };
    let toolchain = CommandToolchain::new(tools, root.clone());
    let invoker = toolchain.clone();

    let reporter: Box<dyn Reporter> = if cli.quiet {
        Box::new(NullReporter)
    } else {
        Box::new(ConsoleReporter::new().with_verbose(cli.verbose))
    };

    match cli.command {
        Commands::Build => {
            let mut pipeline = Pipeline::new(service, root, toolchain).with_reporter(reporter);
            exit_on(pipeline.run(RunMode::Run))
        }
        Commands::Watch => {
            let mut pipeline = Pipeline::new(service, root, toolchain).with_reporter(reporter);
            exit_on(pipeline.run(RunMode::Watch))
        }
        Commands::Invoke { function, watch } => {
            let mut pipeline = Pipeline::new(service, root, toolchain)
                .with_reporter(reporter)
                .with_function(Some(function.clone()));

            if let Err(e) = pipeline.run(RunMode::Run) {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
            if let Err(e) = invoker.invoke(&function) {
                eprintln!("Error: {}", e);
                if !watch {
                    return ExitCode::from(EXIT_ERROR);
                }
            }
            if watch {
                return exit_on(pipeline.watch_function(|| invoker.invoke(&function)));
            }
            ExitCode::from(EXIT_SUCCESS)
        }
        Commands::Package { function } => {
            let mut pipeline = Pipeline::new(service, root, toolchain)
                .with_reporter(reporter)
                .with_function(function);

            if let Err(e) = pipeline.run(RunMode::PackageForDeploy) {
                eprintln!("Error: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
            exit_on(pipeline.cleanup())
        }
    }
}

fn exit_on<E: std::fmt::Display>(result: Result<(), E>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
