use crate::errors::Result;
use crate::models::ticket::RawTicket;

const READY_FOR_REFINEMENT_SPRINT: &str = "mer ready for refinement";

/// Merchant grooms by moving tickets out of the refinement holding sprint.
pub fn is_ticket_refined(ticket: &RawTicket) -> Result<bool> {
    let sprints = ticket.sprint_history();
    if sprints.is_empty() {
        return Ok(false);
    }

    Ok(!sprints
        .iter()
        .any(|sprint| sprint.name.to_lowercase() == READY_FOR_REFINEMENT_SPRINT))
}
