use crate::client::Service;
use crate::error::CliError;

pub async fn run_pending(service: &Service) -> Result<(), CliError> {
    let counts = service.pending_counts().await?;

    if counts.is_empty() {
        println!("Nothing pending; the local store is fully reconciled.");
        return Ok(());
    }

    println!("Records awaiting sync:");
    for (table, count) in counts {
        println!("  {table:<16} {count}");
    }
    Ok(())
}
