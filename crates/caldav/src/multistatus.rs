//! WebDAV `207 Multi-Status` response parsing.

use {
    quick_xml::{Reader, events::Event},
    tracing::warn,
};

use crate::error::{Error, Result};

/// One `<D:response>` element, reduced to what a calendar query needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ResponseEntry {
    pub href: String,
    pub etag: Option<String>,
    pub calendar_data: Option<String>,
    /// Response-level status (outside any propstat), e.g. `HTTP/1.1 404 Not Found`.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    Href,
    Etag,
    CalendarData,
    Status,
}

/// Parse a multistatus body. Namespace prefixes are ignored; elements are
/// matched by local name.
pub(crate) fn parse_multistatus(body: &str) -> Result<Vec<ResponseEntry>> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut current: Option<ResponseEntry> = None;
    let mut field: Option<Field> = None;
    let mut in_propstat = false;
    let mut saw_root = false;

    loop {
        let event = reader.read_event().map_err(|e| {
            Error::MalformedResponse(format!(
                "invalid XML at byte {}: {e}",
                reader.buffer_position()
            ))
        })?;

        match event {
            Event::Start(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"multistatus" => saw_root = true,
                    b"response" => current = Some(ResponseEntry::default()),
                    b"propstat" => in_propstat = true,
                    b"href" => field = Some(Field::Href),
                    b"getetag" => field = Some(Field::Etag),
                    b"calendar-data" => field = Some(Field::CalendarData),
                    b"status" if !in_propstat => field = Some(Field::Status),
                    _ => {},
                }
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    slot(entry, f).get_or_insert_with(String::new);
                }
            },
            Event::Empty(e) if e.local_name().as_ref() == b"multistatus" => saw_root = true,
            Event::Text(t) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = t.unescape().map_err(|e| {
                        Error::MalformedResponse(format!("bad text in response: {e}"))
                    })?;
                    slot(entry, f).get_or_insert_with(String::new).push_str(&text);
                }
            },
            Event::CData(c) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = String::from_utf8_lossy(&c);
                    slot(entry, f).get_or_insert_with(String::new).push_str(&text);
                }
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"response" => {
                    if let Some(entry) = current.take() {
                        if entry.href.trim().is_empty() {
                            warn!("skipping multistatus response without href");
                        } else {
                            entries.push(entry);
                        }
                    }
                },
                b"propstat" => in_propstat = false,
                b"href" | b"getetag" | b"calendar-data" | b"status" => field = None,
                _ => {},
            },
            Event::Eof => break,
            _ => {},
        }
    }

    if !saw_root {
        return Err(Error::MalformedResponse(
            "body is not a DAV:multistatus document".to_string(),
        ));
    }

    for entry in &mut entries {
        entry.href = entry.href.trim().to_string();
    }
    Ok(entries)
}

/// The string slot a field writes into. `href` is stored inline, so it is
/// routed through a temporary option.
fn slot(entry: &mut ResponseEntry, field: Field) -> SlotMut<'_> {
    match field {
        Field::Href => SlotMut::Inline(&mut entry.href),
        Field::Etag => SlotMut::Optional(&mut entry.etag),
        Field::CalendarData => SlotMut::Optional(&mut entry.calendar_data),
        Field::Status => SlotMut::Optional(&mut entry.status),
    }
}

enum SlotMut<'a> {
    Inline(&'a mut String),
    Optional(&'a mut Option<String>),
}

impl<'a> SlotMut<'a> {
    fn get_or_insert_with(self, init: impl FnOnce() -> String) -> &'a mut String {
        match self {
            Self::Inline(s) => s,
            Self::Optional(opt) => opt.get_or_insert_with(init),
        }
    }
}
