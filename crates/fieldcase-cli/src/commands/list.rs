use fieldcase_core::models::ParentRef;
use fieldcase_core::ParentKind;

use crate::client::Service;
use crate::error::CliError;

pub async fn run_list(service: &Service, kind: ParentKind, json: bool) -> Result<(), CliError> {
    let records = service.list_parents(kind).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No local records. Run `fieldcase sync` to mirror the backend.");
        return Ok(());
    }

    for record in &records {
        let marker = if record.meta.has_unsynced_state() {
            "*"
        } else if record.sub_screen_edited {
            "+"
        } else {
            " "
        };
        println!(
            "{marker} {:<24} {:<12} {:<12} {}",
            record.content_item_id,
            record.number.as_deref().unwrap_or("-"),
            record.status.as_deref().unwrap_or("-"),
            record.description.as_deref().unwrap_or("")
        );
    }
    println!("(* pending sync, + has edited sub-records)");
    Ok(())
}

pub async fn run_notes(
    service: &Service,
    kind: ParentKind,
    id: &str,
    json: bool,
) -> Result<(), CliError> {
    let parent = ParentRef::new(kind, id);
    let notes = service.list_notes(&parent).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
        return Ok(());
    }

    if notes.is_empty() {
        println!("No notes for {id}");
        return Ok(());
    }

    for note in &notes {
        let marker = if note.meta.has_unsynced_state() { "*" } else { " " };
        println!(
            "{marker} [{}] {}",
            note.author.as_deref().unwrap_or("unknown"),
            note.note_text
        );
    }
    Ok(())
}
