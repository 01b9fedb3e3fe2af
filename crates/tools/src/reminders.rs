//! Reminder tools over VTODO objects.

use {
    async_trait::async_trait,
    chrono::Utc,
    serde::Deserialize,
    serde_json::{Value, json},
};

use davgate_caldav::{CalDavClient, Component, ComponentKind, Document, NewToDo, SchedulingQuery, ical};

use crate::{
    calendar::store_or_show,
    context::ToolContext,
    error::Result,
    format::format_calendar_items,
    params::{parse, parse_instant, require_text},
    registry::{GatewayTool, ToolOutput},
};

const REMINDER_PROPERTIES: &[&str] = &["SUMMARY", "DUE", "STATUS"];

const REMINDER_UPLOAD_NOTE: &str = "Note: this reminder was not saved to iCloud. Set \
     ICLOUD_REMINDERS_URL to a specific reminders collection to upload new reminders; \
     collections are not discovered automatically.";

const REMINDERS_NEED_COLLECTION: &str = "Listing reminders needs a specific reminders \
     collection. Set ICLOUD_REMINDERS_URL (or ICLOUD_CALDAV_URL) to the collection URL.";

pub struct CreateReminderTool {
    ctx: ToolContext,
}

impl CreateReminderTool {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct CreateReminderArgs {
    title: String,
    #[serde(default)]
    due_date: Option<String>,
}

#[async_trait]
impl GatewayTool for CreateReminderTool {
    fn name(&self) -> &str {
        "create_reminder"
    }

    fn description(&self) -> &str {
        "Create a reminder. Requires ICLOUD_EMAIL and ICLOUD_PASSWORD (app-specific). \
         The reminder is uploaded when ICLOUD_REMINDERS_URL names a reminders collection."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "Reminder title"},
                "due_date": {
                    "type": "string",
                    "description": "Due date in RFC3339 format (optional)"
                }
            },
            "required": ["title"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let args: CreateReminderArgs = parse(params)?;
        let title = require_text("title", &args.title)?;
        // An empty string is treated like an absent due date.
        let due = match args.due_date.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(parse_instant("due_date", raw)?),
            _ => None,
        };

        let uid = ical::new_uid();
        let todo = NewToDo {
            summary: title.to_string(),
            due,
        };
        let document = Document::new(vec![Component::todo(&uid, &todo, Utc::now())]);
        store_or_show(
            &self.ctx,
            self.ctx.config.reminders_collection(),
            &uid,
            &document,
            "VTODO",
            REMINDER_UPLOAD_NOTE,
        )
        .await
    }
}

pub struct ListRemindersTool {
    ctx: ToolContext,
}

impl ListRemindersTool {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl GatewayTool for ListRemindersTool {
    fn name(&self) -> &str {
        "list_reminders"
    }

    fn description(&self) -> &str {
        "List reminders. Requires ICLOUD_REMINDERS_URL (or ICLOUD_CALDAV_URL) pointing to a \
         reminders collection."
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _params: Value) -> Result<ToolOutput> {
        let Some(endpoint) = self.ctx.config.reminders_endpoint() else {
            return Ok(ToolOutput::text(REMINDERS_NEED_COLLECTION));
        };
        let client = self.ctx.scheduling_client()?;
        let query = SchedulingQuery::build(ComponentKind::ToDo, REMINDER_PROPERTIES, None);
        let items = client.query_objects(endpoint, &query).await?;
        Ok(ToolOutput::text(format_calendar_items(
            &items,
            ComponentKind::ToDo,
        )))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{Harness, REMINDERS, config, config_with_collections},
        davgate_common::ErrorKind,
    };

    const TODOS: &str = r#"<multistatus xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <response><href>/123/calendars/tasks/</href><propstat><prop/><status>HTTP/1.1 200 OK</status></propstat></response>
  <response><href>/123/calendars/tasks/milk.ics</href><propstat><prop><C:calendar-data>BEGIN:VCALENDAR
VERSION:2.0
PRODID:x
BEGIN:VTODO
UID:milk
SUMMARY:Buy milk
DUE:20240105T180000Z
STATUS:COMPLETED
END:VTODO
END:VCALENDAR
</C:calendar-data></prop><status>HTTP/1.1 200 OK</status></propstat></response>
  <response><href>/123/calendars/tasks/broken.ics</href><propstat><prop><C:calendar-data>not a calendar</C:calendar-data></prop><status>HTTP/1.1 200 OK</status></propstat></response>
</multistatus>"#;

    #[tokio::test]
    async fn create_with_due_date() {
        let harness = Harness::new(config());
        let tool = CreateReminderTool::new(harness.ctx.clone());
        let output = tool
            .execute(json!({"title": "Buy milk", "due_date": "2024-01-05T19:00:00+01:00"}))
            .await
            .unwrap();
        assert!(output.text.starts_with("Generated VTODO object:\nBEGIN:VCALENDAR\r\n"));
        assert!(output.text.contains("BEGIN:VTODO\r\n"));
        assert!(output.text.contains("SUMMARY:Buy milk\r\n"));
        assert!(output.text.contains("DUE:20240105T180000Z\r\n"));
        assert!(output.text.ends_with(REMINDER_UPLOAD_NOTE));
    }

    #[tokio::test]
    async fn create_without_due_date_has_no_due() {
        let harness = Harness::new(config());
        let tool = CreateReminderTool::new(harness.ctx.clone());
        for params in [json!({"title": "Call"}), json!({"title": "Call", "due_date": ""})] {
            let output = tool.execute(params).await.unwrap();
            assert!(!output.text.contains("DUE:"));
        }
    }

    #[tokio::test]
    async fn malformed_due_date_is_rejected() {
        let harness = Harness::new(config());
        let tool = CreateReminderTool::new(harness.ctx.clone());
        let err = tool
            .execute(json!({"title": "Call", "due_date": "friday"}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().starts_with("due_date 'friday'"));
    }

    #[tokio::test]
    async fn create_with_collection_uploads_to_reminders() {
        let harness = Harness::new(config_with_collections());
        harness.dav.reply(201, "");
        let tool = CreateReminderTool::new(harness.ctx.clone());
        let output = tool.execute(json!({"title": "Call"})).await.unwrap();

        let (method, uri, _) = harness.dav.requests().remove(0);
        assert_eq!(method, "PUT");
        assert!(uri.starts_with(REMINDERS));
        assert!(output.text.starts_with("Stored VTODO object at "));
    }

    #[tokio::test]
    async fn list_without_endpoint_explains_configuration() {
        let harness = Harness::new(config());
        let output = ListRemindersTool::new(harness.ctx.clone())
            .execute(Value::Null)
            .await
            .unwrap();
        assert!(!output.is_error);
        assert!(output.text.contains("ICLOUD_REMINDERS_URL"));
    }

    #[tokio::test]
    async fn list_falls_back_to_explicit_service_url() {
        let mut config = config();
        config.caldav.url = Some(REMINDERS.into());
        let harness = Harness::new(config);
        harness.dav.reply(207, TODOS);
        ListRemindersTool::new(harness.ctx.clone())
            .execute(json!({}))
            .await
            .unwrap();
        let (method, uri, body) = harness.dav.requests().remove(0);
        assert_eq!(method, "REPORT");
        assert_eq!(uri, REMINDERS);
        assert!(body.contains(r#"<C:comp-filter name="VTODO""#));
        assert!(!body.contains("time-range"));
    }

    #[tokio::test]
    async fn list_formats_status_and_keeps_undecodable_paths() {
        let harness = Harness::new(config_with_collections());
        harness.dav.reply(207, TODOS);
        let output = ListRemindersTool::new(harness.ctx.clone())
            .execute(json!({}))
            .await
            .unwrap();
        assert!(output.text.starts_with("- /123/calendars/tasks/broken.ics\n  (object present, fields unknown"));
        assert!(output.text.ends_with(
            "- /123/calendars/tasks/milk.ics\n  Summary: Buy milk\n  Due: 2024-01-05T18:00:00Z\n  Status: COMPLETED"
        ));
    }
}
