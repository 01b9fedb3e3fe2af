//! Mail tools: SMTP submission and INBOX listing.

use {
    async_trait::async_trait,
    davgate_common::ErrorKind,
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::warn,
};

use davgate_mail::{FetchFields, FetchRequest, INBOX, OutgoingMail};

use crate::{
    context::ToolContext,
    error::Result,
    format::{NO_EMAILS, format_messages},
    params::{effective_limit, parse, require_text},
    registry::{GatewayTool, ToolOutput},
};

pub struct SendEmailTool {
    ctx: ToolContext,
}

impl SendEmailTool {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct SendArgs {
    to: String,
    subject: String,
    body: String,
}

#[async_trait]
impl GatewayTool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email using iCloud SMTP. Requires ICLOUD_EMAIL and ICLOUD_PASSWORD \
         (app-specific) environment variables."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "to": {"type": "string", "description": "Recipient email address"},
                "subject": {"type": "string", "description": "Email subject"},
                "body": {"type": "string", "description": "Email body content"}
            },
            "required": ["to", "subject", "body"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let args: SendArgs = parse(params)?;
        let mail = OutgoingMail {
            to: require_text("to", &args.to)?.to_string(),
            subject: args.subject,
            body: args.body,
        };
        let credentials = self.ctx.credentials()?;

        match self.ctx.smtp.send(&credentials, &mail).await {
            Ok(()) => Ok(ToolOutput::text("Email sent successfully")),
            Err(e) if matches!(e.kind(), ErrorKind::Validation | ErrorKind::Configuration) => {
                Err(e.into())
            },
            Err(e) => {
                warn!(to = %mail.to, error = %e, "email submission failed");
                Ok(ToolOutput::error(format!("Failed to send email: {e}")))
            },
        }
    }
}

pub struct ReadEmailsTool {
    ctx: ToolContext,
}

impl ReadEmailsTool {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct LimitArgs {
    #[serde(default)]
    limit: Option<i64>,
}

#[async_trait]
impl GatewayTool for ReadEmailsTool {
    fn name(&self) -> &str {
        "read_emails"
    }

    fn description(&self) -> &str {
        "Read recent emails from iCloud IMAP. Requires ICLOUD_EMAIL and ICLOUD_PASSWORD \
         (app-specific) environment variables."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": {"type": "integer", "description": "Number of emails to fetch (default 10)"}
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let args: LimitArgs = parse(params)?;
        let request = FetchRequest::new(INBOX, effective_limit(args.limit), FetchFields::Envelope);
        let outcome = self.ctx.mailbox_fetcher()?.fetch(&request).await?;
        Ok(ToolOutput::text(format_messages(
            &outcome.messages,
            false,
            NO_EMAILS,
        )))
    }
}
