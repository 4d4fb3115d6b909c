use crate::errors::Result;
use crate::models::ticket::RawTicket;

const READY_FOR_REFINEMENT_SPRINT: &str = "mobile - ready for refinement";

pub fn is_ticket_refined(ticket: &RawTicket) -> Result<bool> {
    let sprints = ticket.sprint_history();
    if sprints.is_empty() {
        return Ok(false);
    }

    for sprint in &sprints {
        if sprint.name.to_lowercase() == READY_FOR_REFINEMENT_SPRINT {
            return Ok(false);
        }
    }

    Ok(true)
}
