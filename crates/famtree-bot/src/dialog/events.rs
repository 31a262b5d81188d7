use anyhow::Result;
use famtree_types::Event;
use tracing::info;

use super::{DialogState, Session, Turn};
use crate::permissions::{Action, active_tree, authorize};
use crate::validators::{InputError, format_date, parse_id, validate_dob};

const ASK_EVENT_TYPE: &str = "Enter the Event Type (e.g. Birthday, Anniversary, Death Anniversary):";
const ASK_EVENT_DATE: &str = "Enter the Date (DD-MM-YYYY). You can add a short note after it, \
    e.g. 14-02-1985 Married in Lisbon:";
const MEMBER_NOT_FOUND: &str = "Member not found in your tree.";

fn event_list(events: &[Event]) -> String {
    if events.is_empty() {
        return "No special dates found for this member.".to_string();
    }
    let mut out = String::from("*Special Dates:*");
    for event in events {
        out.push_str(&format!("\n📅 {}: {}", format_date(event.event_date), event.event_type));
        if let Some(note) = &event.description {
            out.push_str(&format!(" ({})", note));
        }
    }
    out
}

impl Session<'_> {
    pub(super) fn event_select_member(&self, input: &str) -> Result<Turn> {
        let member_id = match parse_id(input) {
            Ok(id) => id,
            Err(e) => return Ok(Turn::advance(DialogState::EventSelectMember, e.to_string())),
        };
        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Turn::finish("Tree not found."));
        };
        let Some(member) = self.member_in_tree(active.tree.id, member_id)? else {
            return Ok(Turn::finish(MEMBER_NOT_FOUND));
        };
        Ok(Turn::advance(
            DialogState::EventAction { member_id },
            format!(
                "Selected {}. What would you like to do?\n1. Add Special Date\n2. View Special Dates",
                member.name
            ),
        ))
    }

    /// Viewing is open to every role; adding is not.
    pub(super) fn event_action(&self, member_id: i64, input: &str) -> Result<Turn> {
        match input {
            "1" => {
                let role = active_tree(self.db, self.user_id)?.and_then(|a| a.role);
                if let Err(denied) = authorize(role, Action::AddEvent) {
                    return Ok(Turn::finish(denied.message));
                }
                Ok(Turn::advance(DialogState::EventType { member_id }, ASK_EVENT_TYPE))
            }
            "2" => {
                let events = self.db.list_events(member_id)?;
                Ok(Turn::finish(event_list(&events)))
            }
            _ => Ok(Turn::advance(
                DialogState::EventAction { member_id },
                InputError::InvalidChoice("1 or 2").to_string(),
            )),
        }
    }

    pub(super) fn event_type(&self, member_id: i64, input: &str) -> Result<Turn> {
        if input.is_empty() {
            return Ok(Turn::advance(
                DialogState::EventType { member_id },
                InputError::EmptyEventType.to_string(),
            ));
        }
        Ok(Turn::advance(
            DialogState::EventDate {
                member_id,
                event_type: input.to_string(),
            },
            ASK_EVENT_DATE,
        ))
    }

    /// `DD-MM-YYYY`, optionally followed by a free-text note.
    pub(super) fn event_date(&self, member_id: i64, event_type: String, input: &str) -> Result<Turn> {
        let (raw_date, note) = match input.split_once(char::is_whitespace) {
            Some((date, rest)) => (date, Some(rest.trim()).filter(|n| !n.is_empty())),
            None => (input, None),
        };
        let date = match validate_dob(raw_date) {
            Ok(date) => date,
            Err(e) => {
                return Ok(Turn::advance(DialogState::EventDate { member_id, event_type }, e.to_string()));
            }
        };

        let Some(active) = active_tree(self.db, self.user_id)? else {
            return Ok(Turn::finish("Tree not found."));
        };
        if let Err(denied) = authorize(active.role, Action::AddEvent) {
            return Ok(Turn::finish(denied.message));
        }
        if self.member_in_tree(active.tree.id, member_id)?.is_none() {
            return Ok(Turn::finish(MEMBER_NOT_FOUND));
        }

        let event = self.db.add_event(member_id, &event_type, date, note)?;
        info!(member_id, event_id = event.id, "Event added");
        Ok(Turn::finish(format!(
            "✅ Added {} on {}!",
            event.event_type,
            format_date(event.event_date)
        )))
    }
}
