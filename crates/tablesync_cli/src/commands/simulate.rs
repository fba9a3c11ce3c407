//! Simulate command implementation.

use super::CliError;
use clap::ValueEnum;
use serde::Serialize;
use std::time::Duration;
use tablesync_core::{
    IndexConfig, IndexError, RetryConfig, TableStatus, ViewTypeMask, WorkerReport,
};
use tablesync_testkit::{HierarchyShape, TestDeployment};
use tracing::info;

/// Entity types selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MaskArg {
    /// Files
    File,
    /// Projects
    Project,
    /// Tables
    Table,
    /// Folders
    Folder,
    /// Views
    View,
    /// Docker repositories
    DockerRepo,
}

impl MaskArg {
    fn bit(self) -> ViewTypeMask {
        match self {
            MaskArg::File => ViewTypeMask::FILE,
            MaskArg::Project => ViewTypeMask::PROJECT,
            MaskArg::Table => ViewTypeMask::TABLE,
            MaskArg::Folder => ViewTypeMask::FOLDER,
            MaskArg::View => ViewTypeMask::VIEW,
            MaskArg::DockerRepo => ViewTypeMask::DOCKER_REPO,
        }
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Parameters of one simulation.
#[derive(Debug, Clone)]
pub struct SimulateArgs {
    /// Projects under the root.
    pub projects: usize,
    /// Folders under each project.
    pub folders_per_project: usize,
    /// Files in each container.
    pub files_per_folder: usize,
    /// View type mask bits.
    pub mask: Vec<MaskArg>,
    /// Files modified after the first build.
    pub updates: usize,
    /// Container limit override.
    pub max_containers: Option<usize>,
}

/// What the simulation observed.
#[derive(Debug, Serialize)]
pub struct SimulationResult {
    /// The view that was built.
    pub view_id: String,
    /// Raw mask bits.
    pub mask: u64,
    /// Projects created.
    pub projects: usize,
    /// Folders created.
    pub folders: usize,
    /// Files created.
    pub files: usize,
    /// Containers in the expanded scope, if it could be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub containers: Option<usize>,
    /// Rows in the index.
    pub rows: usize,
    /// Container ids queued for reconciliation.
    pub reconciliation_requests: usize,
    /// One report per worker pass.
    pub passes: Vec<WorkerReport>,
    /// Final status row.
    pub status: TableStatus,
}

/// Runs the simulate command.
pub fn run(args: &SimulateArgs, format: OutputFormat) -> Result<(), CliError> {
    let result = simulate(args)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => print_text_output(&result),
    }
    Ok(())
}

/// Builds the deployment, defines the view and drives the worker.
pub fn simulate(args: &SimulateArgs) -> Result<SimulationResult, CliError> {
    let mut config = IndexConfig::new();
    if let Some(max) = args.max_containers {
        config = config.with_max_containers_per_view(max);
    }
    let deployment = TestDeployment::with_config(config);
    let worker = deployment
        .worker_with_retry(RetryConfig::new(3).with_base_delay(Duration::from_millis(10)));

    let shape = HierarchyShape::new(args.projects, args.folders_per_project, args.files_per_folder);
    let tree = deployment.build_hierarchy(shape);
    let mask = args
        .mask
        .iter()
        .fold(ViewTypeMask::default(), |mask, arg| mask | arg.bit());
    info!(
        projects = tree.projects.len(),
        folders = tree.folders.len(),
        files = tree.files.len(),
        mask = mask.bits(),
        "deployment ready"
    );

    let (view, _) = deployment.create_view(deployment.root(), tree.projects.clone(), mask)?;
    let mut passes = vec![worker.run_until_idle()];

    if args.updates > 0 {
        for file in tree.files.iter().take(args.updates) {
            deployment.touch(*file);
        }
        // The lookup notices the new content and queues a rebuild.
        deployment.service.get_or_create_status(&view)?;
        passes.push(worker.run_until_idle());
    }

    let status = deployment
        .service
        .tracker()
        .status(&view)?
        .ok_or_else(|| IndexError::not_found(format!("status for {view}")))?;
    let containers = deployment
        .service
        .support()
        .view_containers(&view)
        .ok()
        .map(|(_, containers)| containers.len());

    Ok(SimulationResult {
        view_id: view.to_string(),
        mask: mask.bits(),
        projects: tree.projects.len(),
        folders: tree.folders.len(),
        files: tree.files.len(),
        containers,
        rows: deployment.index.row_count(&view),
        reconciliation_requests: deployment.feed.drain_reconciliation().len(),
        passes,
        status,
    })
}

fn print_text_output(result: &SimulationResult) {
    println!("Tablesync Simulation");
    println!("====================");
    println!();
    println!("View: {} (mask {:#x})", result.view_id, result.mask);
    println!();
    println!("Tree:");
    println!("  Projects: {}", result.projects);
    println!("  Folders:  {}", result.folders);
    println!("  Files:    {}", result.files);
    match result.containers {
        Some(containers) => println!("  Scope:    {containers} containers"),
        None => println!("  Scope:    unresolved"),
    }
    println!();
    println!("Worker:");
    for (pass, report) in result.passes.iter().enumerate() {
        println!(
            "  [{}] {} processed, {} built, {} up to date, {} superseded, {} failed",
            pass + 1,
            report.processed,
            report.built,
            report.up_to_date,
            report.superseded,
            report.failed
        );
    }
    println!("  Reconciliation requests: {}", result.reconciliation_requests);
    println!();
    println!("Status:");
    println!("  State: {:?}", result.status.state);
    println!("  Token: {}", result.status.reset_token);
    println!("  Rows:  {}", result.rows);
    if let Some(version) = &result.status.version_fingerprint {
        println!("  Version: {version}");
    }
    if let Some(error) = &result.status.error {
        println!("  Error: {}", error.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_core::TableState;

    fn args(mask: Vec<MaskArg>) -> SimulateArgs {
        SimulateArgs {
            projects: 2,
            folders_per_project: 1,
            files_per_folder: 2,
            mask,
            updates: 0,
            max_containers: None,
        }
    }

    #[test]
    fn file_view_becomes_available() {
        let result = simulate(&args(vec![MaskArg::File])).unwrap();
        assert_eq!(result.status.state, TableState::Available);
        assert_eq!(result.containers, Some(4));
        assert_eq!(result.rows, 8);
        assert_eq!(result.passes[0].built, 1);
    }

    #[test]
    fn updates_trigger_a_second_build() {
        let mut args = args(vec![MaskArg::File]);
        args.updates = 3;
        let result = simulate(&args).unwrap();
        assert_eq!(result.passes.len(), 2);
        assert_eq!(result.passes[1].built, 1);
        assert_eq!(result.status.state, TableState::Available);
    }

    #[test]
    fn project_with_other_types_is_rejected() {
        let err = simulate(&args(vec![MaskArg::Project, MaskArg::File])).unwrap_err();
        assert!(matches!(err, CliError::Index(IndexError::InvalidArgument(_))));
    }

    #[test]
    fn scope_over_limit_is_rejected() {
        let mut args = args(vec![MaskArg::File]);
        args.max_containers = Some(1);
        let err = simulate(&args).unwrap_err();
        assert!(matches!(err, CliError::Index(IndexError::LimitExceeded(_))));
    }
}
