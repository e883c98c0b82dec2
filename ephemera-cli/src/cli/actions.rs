//! The operations the subcommands and the menu share.

use ephemera_core::{ArtifactDescriptor, LifecycleOrchestrator};
use std::io::{self, Write};
use tracing::debug;

use super::output::{format_catalog, format_invocation, format_sweep};
use crate::catalog::{self, Architecture};

pub fn list(out: &mut dyn Write, arch: Architecture) -> io::Result<()> {
    write!(out, "{}", format_catalog(catalog::all_entries(), arch))
}

/// Runs the catalog tool `id`. Unknown ids are reported, not treated as
/// errors.
pub async fn run_tool(
    orchestrator: &LifecycleOrchestrator,
    arch: Architecture,
    id: &str,
    out: &mut dyn Write,
) -> io::Result<()> {
    match catalog::find_entry(id) {
        Some(entry) => run_descriptor(orchestrator, &entry.descriptor(arch), out).await,
        None => {
            let ids: Vec<_> = catalog::all_entries().iter().map(|e| e.id).collect();
            writeln!(out, "Unknown tool '{}'. Available: {}", id, ids.join(", "))
        }
    }
}

pub async fn run_descriptor(
    orchestrator: &LifecycleOrchestrator,
    descriptor: &ArtifactDescriptor,
    out: &mut dyn Write,
) -> io::Result<()> {
    debug!("Running descriptor {:?}", descriptor);
    let report = orchestrator.run(descriptor).await;
    write!(out, "{}", format_invocation(&report))
}

pub async fn run_all(
    orchestrator: &LifecycleOrchestrator,
    arch: Architecture,
    out: &mut dyn Write,
) -> io::Result<()> {
    let reports = orchestrator.run_all(&catalog::descriptors(arch)).await;

    let failed = reports.iter().filter(|r| r.failure.is_some()).count();
    for report in &reports {
        write!(out, "{}", format_invocation(report))?;
    }
    writeln!(out, "{} of {} tools ran", reports.len() - failed, reports.len())
}

pub fn sweep(orchestrator: &LifecycleOrchestrator, out: &mut dyn Write) -> io::Result<()> {
    let report = orchestrator.sweep();
    write!(out, "{}", format_sweep(&report))
}
