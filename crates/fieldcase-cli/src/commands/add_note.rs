use fieldcase_core::models::ParentRef;
use fieldcase_core::ParentKind;

use crate::client::Service;
use crate::error::CliError;

pub async fn run_add_note(
    service: &Service,
    kind: ParentKind,
    id: &str,
    text: &[String],
    author: Option<String>,
) -> Result<(), CliError> {
    let note_text = text.join(" ");
    if note_text.trim().is_empty() {
        return Err(CliError::EmptyNoteText);
    }

    let parent = ParentRef::new(kind, id);
    let note = service.add_note(parent, note_text, author).await?;

    println!(
        "Captured note {} (queued for sync on next reconnect)",
        note.content_item_id
    );
    Ok(())
}
