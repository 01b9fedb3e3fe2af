//! Calendar event tools: `create_calendar_event` and `list_calendar_events`.

use {
    async_trait::async_trait,
    chrono::{Duration, Utc},
    serde::Deserialize,
    serde_json::{Value, json},
    tracing::info,
};

use davgate_caldav::{
    CalDavClient, Component, ComponentKind, Document, NewEvent, SchedulingQuery, TimeRange, ical,
};

use crate::{
    context::ToolContext,
    error::{Error, Result},
    format::format_calendar_items,
    params::{parse, parse_instant, require_text},
    registry::{GatewayTool, ToolOutput},
};

/// Upper bound for `duration_minutes`: one week.
pub const MAX_DURATION_MINUTES: i64 = 7 * 24 * 60;

pub(crate) const EVENT_PROPERTIES: &[&str] = &["SUMMARY", "DTSTART", "DTEND"];

const EVENT_UPLOAD_NOTE: &str = "Note: this event was not saved to iCloud. Set ICLOUD_CALENDAR_URL \
     to a specific calendar collection to upload new events; collections are not discovered \
     automatically.";

const EVENTS_NEED_COLLECTION: &str = "Listing events needs a specific calendar collection. Set \
     ICLOUD_CALENDAR_URL (or ICLOUD_CALDAV_URL) to the collection URL, e.g. \
     https://pXX-caldav.icloud.com/<id>/calendars/<calendar>/.";

/// Upload `document` to `collection` when one is configured, else hand the
/// encoded text back with `note`.
pub(crate) async fn store_or_show(
    ctx: &ToolContext,
    collection: Option<&str>,
    uid: &str,
    document: &Document,
    label: &str,
    note: &str,
) -> Result<ToolOutput> {
    let text = ical::encode(document).map_err(davgate_caldav::Error::from)?;
    let Some(collection) = collection else {
        return Ok(ToolOutput::text(format!("Generated {label} object:\n{text}\n\n{note}")));
    };

    let client = ctx.scheduling_client()?;
    let stored = client
        .store_object(collection, &format!("{uid}.ics"), document)
        .await?;
    info!(url = %stored.url, uid, "calendar object stored");
    let etag = stored
        .etag
        .map(|etag| format!(" (ETag {etag})"))
        .unwrap_or_default();
    Ok(ToolOutput::text(format!(
        "Stored {label} object at {}{etag}:\n{text}",
        stored.url
    )))
}

pub struct CreateCalendarEventTool {
    ctx: ToolContext,
}

impl CreateCalendarEventTool {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct CreateEventArgs {
    summary: String,
    start_time: String,
    duration_minutes: i64,
}

#[async_trait]
impl GatewayTool for CreateCalendarEventTool {
    fn name(&self) -> &str {
        "create_calendar_event"
    }

    fn description(&self) -> &str {
        "Create a calendar event. Requires ICLOUD_EMAIL and ICLOUD_PASSWORD (app-specific). \
         The event is uploaded when ICLOUD_CALENDAR_URL names a calendar collection."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary": {"type": "string", "description": "Event title/summary"},
                "start_time": {
                    "type": "string",
                    "description": "Start time in RFC3339 format (e.g. 2023-10-27T10:00:00Z)"
                },
                "duration_minutes": {
                    "type": "integer",
                    "description": "Duration in minutes",
                    "minimum": 1,
                    "maximum": MAX_DURATION_MINUTES
                }
            },
            "required": ["summary", "start_time", "duration_minutes"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let args: CreateEventArgs = parse(params)?;
        let summary = require_text("summary", &args.summary)?;
        let start = parse_instant("start_time", &args.start_time)?;
        if !(1..=MAX_DURATION_MINUTES).contains(&args.duration_minutes) {
            return Err(Error::invalid(format!(
                "duration_minutes must be between 1 and {MAX_DURATION_MINUTES}, got {}",
                args.duration_minutes
            )));
        }
        let end = start + Duration::minutes(args.duration_minutes);

        let uid = ical::new_uid();
        let event = NewEvent {
            summary: summary.to_string(),
            start,
            end,
        };
        let document = Document::new(vec![Component::event(&uid, &event, Utc::now())]);
        store_or_show(
            &self.ctx,
            self.ctx.config.calendar_collection(),
            &uid,
            &document,
            "iCalendar",
            EVENT_UPLOAD_NOTE,
        )
        .await
    }
}

pub struct ListCalendarEventsTool {
    ctx: ToolContext,
}

impl ListCalendarEventsTool {
    #[must_use]
    pub fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }
}

#[derive(Deserialize)]
struct ListEventsArgs {
    start_time: String,
    end_time: String,
}

#[async_trait]
impl GatewayTool for ListCalendarEventsTool {
    fn name(&self) -> &str {
        "list_calendar_events"
    }

    fn description(&self) -> &str {
        "List calendar events in a time range. Requires ICLOUD_CALENDAR_URL (or \
         ICLOUD_CALDAV_URL) pointing to a specific calendar collection."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "start_time": {"type": "string", "description": "Start time range (RFC3339)"},
                "end_time": {"type": "string", "description": "End time range (RFC3339)"}
            },
            "required": ["start_time", "end_time"]
        })
    }

    async fn execute(&self, params: Value) -> Result<ToolOutput> {
        let args: ListEventsArgs = parse(params)?;
        let start = parse_instant("start_time", &args.start_time)?;
        let end = parse_instant("end_time", &args.end_time)?;
        if end <= start {
            return Err(Error::invalid(format!(
                "end_time '{}' must be after start_time '{}'",
                args.end_time.trim(),
                args.start_time.trim()
            )));
        }

        let Some(endpoint) = self.ctx.config.calendar_endpoint() else {
            return Ok(ToolOutput::text(EVENTS_NEED_COLLECTION));
        };
        let client = self.ctx.scheduling_client()?;
        let query = SchedulingQuery::build(
            ComponentKind::Event,
            EVENT_PROPERTIES,
            Some(TimeRange { start, end }),
        );
        let items = client.query_objects(endpoint, &query).await?;
        Ok(ToolOutput::text(format_calendar_items(
            &items,
            ComponentKind::Event,
        )))
    }
}
