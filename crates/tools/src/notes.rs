//! Notes tools. Only legacy notes kept in the IMAP `Notes` folder are
//! reachable; notes synced through iCloud Drive are not.

use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
};

use davgate_mail::{FetchFields, FetchRequest, NOTES_MAILBOX};

use crate::{
    context::ToolContext,
    error::Result,
    format::{NO_NOTES, format_messages},
    params::{effective_limit, parse},
    registry::{GatewayTool, ToolOutput},
};

pub const LEGACY_NOTES_CAVEAT: &str =
    "Note: only legacy notes stored in the IMAP 'Notes' folder are visible here.";

pub const NOTE_CREATION_UNSUPPORTED: &str =
    "Note creation is not fully implemented yet. Use the iCloud web interface.";

pub struct ReadNotesTool {
    ctx: ToolContext,
}

impl ReadNotesTool {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct ReadNotesArgs {
    #[serde(default)]
    limit: Option<i64>,
}

#[async_trait]
impl GatewayTool for ReadNotesTool {
    fn name(&self) -> &str {
        "read_notes"
    }

    fn description(&self) -> &str {
        "Read Notes from the 'Notes' IMAP folder. Only works for legacy notes."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "description": "Number of notes to fetch (default 10)"}
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let args: ReadNotesArgs = parse(params)?;
        let request = FetchRequest::new(
            NOTES_MAILBOX,
            effective_limit(args.limit),
            FetchFields::EnvelopeAndBody,
        );
        let outcome = self.ctx.mailbox_fetcher()?.fetch(&request).await?;
        let listing = format_messages(&outcome.messages, true, NO_NOTES);
        Ok(ToolOutput::text(format!(
            "{}\n\n{LEGACY_NOTES_CAVEAT}",
            listing.trim_end()
        )))
    }
}

/// Explicit stub: there is no supported write path for notes.
pub struct CreateNoteTool;

#[async_trait]
impl GatewayTool for CreateNoteTool {
    fn name(&self) -> &str {
        "create_note"
    }

    fn description(&self) -> &str {
        "Create a note (Experimental/Not fully supported)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "content": {"type": "string", "description": "Note content"}
            },
            "required": ["content"]
        })
    }

    async fn execute(&self, _params: Value) -> Result<ToolOutput> {
        Ok(ToolOutput::error(NOTE_CREATION_UNSUPPORTED))
    }
}
