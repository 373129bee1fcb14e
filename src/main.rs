use std::panic;
use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::core::directory::{DirNode, NodeKind, read_directory_tree};
use crate::core::domain::{Configuration, InputMethod, OutputMethod, TestConfig};
use crate::core::pipeline::processing::{ProcessOptions, process_project};
use crate::stubs::gateway::MemoryGateway;

mod constants;
mod core;
mod stubs;

#[tokio::main]
#[tracing::instrument]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    set_panic_hook();

    let submissions_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: autograder <submissions-dir>")?;

    // Demo wiring: an in-memory gateway seeded with a pass-through project.
    // A real deployment hands in its own Gateway implementation.
    let gateway = Arc::new(MemoryGateway::new());
    let project_id = gateway.seed_project(
        Configuration {
            compile_command: String::new(),
            source_code: String::new(),
            compile_parameters: String::new(),
            run_command: "cat".to_string(),
        },
        TestConfig {
            input_method: InputMethod::Manual,
            input: String::new(),
            output_method: OutputMethod::Manual,
            expected_output: Some("hello".to_string()),
        },
    );

    let results = process_project(
        gateway,
        project_id,
        &submissions_dir,
        ProcessOptions::default(),
    )
    .await?;

    tracing::info!(
        "processed {} submissions: {} success, {} failed, {} compile errors, {} runtime errors, {} skipped, {} errors, {} timeouts",
        results.total,
        results.success,
        results.failed,
        results.compile_errors,
        results.runtime_errors,
        results.skipped,
        results.errors,
        results.timeouts
    );

    let extracted = read_directory_tree(&submissions_dir.join("..").join("output"), &[]);
    log_tree(&extracted, 0);

    Ok(())
}

fn log_tree(nodes: &[DirNode], depth: usize) {
    for node in nodes {
        let kind = match node.kind {
            NodeKind::Folder => "dir",
            NodeKind::File => "file",
        };
        tracing::debug!(
            "{}{} [{}] ({})",
            "  ".repeat(depth),
            node.name,
            kind,
            node.path.display()
        );
        log_tree(&node.children, depth + 1);
    }
}

fn set_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        tracing::error!(
            message = "panic occurred",
            panic = %panic_info
        );
    }));
}
