//! The gateway's tool surface.
//!
//! Eight tools over three protocols: `send_email` and `read_emails` (SMTP,
//! IMAP), `read_notes` and `create_note` (IMAP `Notes` folder), and the
//! calendar and reminder tools over CalDAV. Every tool builds its protocol
//! client per call from a shared [`ToolContext`].

pub mod calendar;
pub mod context;
pub mod email;
pub mod error;
pub mod format;
pub mod notes;
pub mod params;
pub mod registry;
pub mod reminders;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod testing;

pub use {
    context::ToolContext,
    error::{Error, Result},
    registry::{GatewayTool, ToolOutput, ToolRegistry},
};

use crate::{
    calendar::{CreateCalendarEventTool, ListCalendarEventsTool},
    email::{ReadEmailsTool, SendEmailTool},
    notes::{CreateNoteTool, ReadNotesTool},
    reminders::{CreateReminderTool, ListRemindersTool},
};

/// Registry with every gateway tool bound to `ctx`.
#[must_use]
pub fn gateway_registry(ctx: ToolContext) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SendEmailTool::new(ctx.clone())));
    registry.register(Box::new(ReadEmailsTool::new(ctx.clone())));
    registry.register(Box::new(ReadNotesTool::new(ctx.clone())));
    registry.register(Box::new(CreateNoteTool));
    registry.register(Box::new(CreateCalendarEventTool::new(ctx.clone())));
    registry.register(Box::new(ListCalendarEventsTool::new(ctx.clone())));
    registry.register(Box::new(CreateReminderTool::new(ctx.clone())));
    registry.register(Box::new(ListRemindersTool::new(ctx)));
    registry
}
