use crate::errors::Result;
use crate::models::ticket::RawTicket;

const READY_FOR_REFINEMENT_SPRINT: &str = "bpl - ready for refinement '22";

/// BPL parks unrefined tickets in a "ready for refinement" sprint. A ticket
/// that has never been in a sprint has not been looked at yet.
pub fn is_ticket_refined(ticket: &RawTicket) -> Result<bool> {
    let sprints = ticket.sprint_history();
    if sprints.is_empty() {
        return Ok(false);
    }

    Ok(!sprints
        .iter()
        .any(|sprint| sprint.name.to_lowercase() == READY_FOR_REFINEMENT_SPRINT))
}
