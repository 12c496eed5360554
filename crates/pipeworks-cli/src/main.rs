//! Pipeline project CLI.
//!
//! Provides the `pipeworks` binary with subcommands for working with
//! project files. `validate` loads a project and prints the validation
//! report, `info` summarizes the graphs, and `migrate` rewrites a project
//! (including legacy-format fixes applied on load) in the current format.
//!
//! Uses the same `pipeworks_storage::load_project()` path as any other
//! front end, ensuring identical repair behavior from all entry points.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

use pipeworks_core::{NotificationInbox, Project, ValidationReport};
use pipeworks_storage::{load_project, save_project, StorageError};

/// Pipeline project tools.
#[derive(Parser)]
#[command(name = "pipeworks", about = "Pipeline project tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Load a project, print its validation report, and exit non-zero on
    /// errors.
    Validate {
        /// Path to the project file.
        file: PathBuf,

        /// Print the report as JSON to stdout.
        #[arg(long)]
        json: bool,
    },
    /// Print a summary of a project's compartments and graphs.
    Info {
        /// Path to the project file.
        file: PathBuf,
    },
    /// Load a project (applying legacy-format migration) and save it in the
    /// current format.
    Migrate {
        /// Path to the project file.
        file: PathBuf,

        /// Output file (default: overwrite the input).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Validate { file, json } => run_validate(&file, json),
        Commands::Info { file } => run_info(&file),
        Commands::Migrate { file, output } => {
            let output = output.unwrap_or_else(|| file.clone());
            run_migrate(&file, &output)
        }
    };
    process::exit(exit_code);
}

/// Loads a project, printing report entries and notifications.
///
/// Returns `None` and prints the failure on I/O or parse errors.
fn load(file: &PathBuf, report: &mut ValidationReport) -> Option<Project> {
    let mut notifications = NotificationInbox::new();
    match load_project(file, report, &mut notifications) {
        Ok(project) => {
            for notification in notifications.iter() {
                eprintln!("note: {}: {}", notification.heading, notification.description);
            }
            Some(project)
        }
        Err(StorageError::Io(err)) => {
            eprintln!("Error: failed to read '{}': {}", file.display(), err);
            None
        }
        Err(err) => {
            eprintln!("Error: failed to load '{}': {}", file.display(), err);
            None
        }
    }
}

fn print_report(report: &ValidationReport) {
    for entry in report.entries() {
        eprintln!("{}: {}: {}", entry.level, entry.context, entry.message);
    }
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 = valid (possibly with warnings), 1 = validation
/// errors, 3 = I/O error.
fn run_validate(file: &PathBuf, json: bool) -> i32 {
    let mut report = ValidationReport::new();
    let Some(_project) = load(file, &mut report) else {
        return 3;
    };
    if json {
        // Machine-readable report on stdout.
        let text = serde_json::to_string_pretty(&report).unwrap_or_else(|err| {
            format!("{{\"error\": \"failed to serialize report: {}\"}}", err)
        });
        println!("{}", text);
        return if report.error_count() > 0 { 1 } else { 0 };
    }
    print_report(&report);
    println!(
        "{}: {} error(s), {} warning(s)",
        file.display(),
        report.error_count(),
        report.warning_count()
    );
    if report.error_count() > 0 {
        1
    } else {
        0
    }
}

/// Execute the info subcommand.
fn run_info(file: &PathBuf) -> i32 {
    let mut report = ValidationReport::new();
    let Some(project) = load(file, &mut report) else {
        return 3;
    };
    print_report(&report);

    println!("project: {}", project.metadata.name);
    println!(
        "detail graph: {} node(s), {} edge(s)",
        project.detail_graph().node_count(),
        project.detail_graph().edge_count()
    );
    println!(
        "compartment graph: {} node(s), {} edge(s)",
        project.compartment_graph().node_count(),
        project.compartment_graph().edge_count()
    );
    for compartment in project.compartments().values() {
        let declared = compartment.declared_outputs(project.compartment_graph());
        let slots: Vec<String> = declared
            .iter()
            .map(|slot| {
                let type_name = project
                    .data_types
                    .name(slot.data_type)
                    .unwrap_or("unknown")
                    .to_string();
                format!("{} ({})", slot.name, type_name)
            })
            .collect();
        println!(
            "compartment '{}': {} node(s), outputs: [{}]",
            compartment.name,
            project
                .detail_graph()
                .nodes_in_compartment(compartment.id)
                .len(),
            slots.join(", ")
        );
    }
    0
}

/// Execute the migrate subcommand.
fn run_migrate(file: &PathBuf, output: &PathBuf) -> i32 {
    let mut report = ValidationReport::new();
    let Some(project) = load(file, &mut report) else {
        return 3;
    };
    print_report(&report);

    match save_project(output, &project) {
        Ok(()) => {
            println!("wrote {}", output.display());
            0
        }
        Err(err) => {
            eprintln!("Error: failed to write '{}': {}", output.display(), err);
            3
        }
    }
}
