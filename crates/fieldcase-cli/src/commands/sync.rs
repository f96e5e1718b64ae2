use fieldcase_core::models::ParentRef;
use fieldcase_core::ParentKind;

use crate::client::Service;
use crate::error::CliError;

pub async fn run_full_sync(service: &Service) -> Result<(), CliError> {
    let summary = service.run_full_sync().await?;

    let pushed: usize = summary.pushed.iter().map(|r| r.acknowledged).sum();
    let push_failures: usize = summary.pushed.iter().map(|r| r.failed).sum();
    println!("Pushed {pushed} pending record(s) ({push_failures} failed)");

    for report in &summary.fetched {
        println!(
            "Fetched {}: {} received, {} new, {} updated, {} kept local edits, {} failed",
            report.entity,
            report.fetched,
            report.inserted,
            report.updated,
            report.skipped_edited,
            report.failed
        );
    }
    println!("Lookup entries refreshed: {}", summary.lookups_upserted);
    Ok(())
}

pub async fn run_detail_sync(
    service: &Service,
    kind: ParentKind,
    id: &str,
) -> Result<(), CliError> {
    let parent = ParentRef::new(kind, id);
    let reports = service.sync_case_detail(&parent).await?;

    for report in &reports {
        if report.pass_failed {
            println!("{}: pass failed (will retry on next sync)", report.entity);
        } else {
            println!(
                "{}: {} received, {} new, {} updated, {} kept local edits",
                report.entity,
                report.fetched,
                report.inserted,
                report.updated,
                report.skipped_edited
            );
        }
    }
    Ok(())
}

pub async fn run_prune(service: &Service) -> Result<(), CliError> {
    let deleted = service.prune().await?;
    println!("Pruned {deleted} fully synced record(s)");
    Ok(())
}
