//! iCalendar build/parse helpers using the `icalendar` crate.
//!
//! `icalendar` owns the wire format (escaping, folding, parameters). This
//! module keeps the gateway's own model on top of it and adds the strictness
//! the crate leaves out: decode checks the block structure first, so broken
//! input fails with a line-numbered [`DecodeError`] instead of a partial
//! calendar, and encode refuses names and values that would not form a valid
//! content line.
//!
//! Properties are keyed by name, one value per name, and written in name
//! order. Line breaks inside TEXT values are normalised to LF before
//! encoding, so a CRLF or a lone CR decodes back as LF.

use std::collections::BTreeMap;

use {
    chrono::{DateTime, Utc},
    icalendar::{Calendar, CalendarComponent, Component as _, Event, Todo},
};

use crate::{
    error::{DecodeError, DecodeErrorKind, EncodeError},
    types::ComponentKind,
};

/// Format version declared by every encoded document.
pub const VERSION: &str = "2.0";

/// Product identifier declared by every encoded document.
pub const PRODID: &str = "-//davgate//iCloud MCP//EN";

/// Properties whose values use the TEXT value type. Line breaks are allowed
/// in these and escaped on the wire.
const TEXT_PROPERTIES: &[&str] = &[
    "SUMMARY",
    "DESCRIPTION",
    "LOCATION",
    "COMMENT",
    "CONTACT",
    "UID",
];

/// Timestamp layout for UTC DATE-TIME values.
const UTC_FORMAT: &str = "%Y%m%dT%H%M%SZ";

// ── Model ───────────────────────────────────────────────────────────────────

/// A single content line: `NAME;PARAM=VALUE:value`, with the value
/// unescaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub value: String,
}

impl Property {
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Look up a parameter by case-insensitive name.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Properties of one component or calendar, keyed by uppercased name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySet(BTreeMap<String, Property>);

impl PropertySet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a property, replacing any existing one with the same name.
    pub fn set(&mut self, mut property: Property) {
        property.name = property.name.to_ascii_uppercase();
        self.0.insert(property.name.clone(), property);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Property> {
        self.0.get(&name.to_ascii_uppercase())
    }

    #[must_use]
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).map(|p| p.value.as_str())
    }

    /// Properties in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Property> {
        self.0.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The two component shapes the gateway handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Event(PropertySet),
    ToDo(PropertySet),
}

/// Parameters for a new VEVENT.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Parameters for a new VTODO.
#[derive(Debug, Clone)]
pub struct NewToDo {
    pub summary: String,
    pub due: Option<DateTime<Utc>>,
}

impl Component {
    /// Build a VEVENT. `stamp` becomes DTSTAMP.
    #[must_use]
    pub fn event(uid: &str, event: &NewEvent, stamp: DateTime<Utc>) -> Self {
        let mut props = PropertySet::new();
        props.set(Property::new("UID", uid));
        props.set(Property::new("DTSTAMP", format_utc(stamp)));
        props.set(Property::new("SUMMARY", event.summary.as_str()));
        props.set(Property::new("DTSTART", format_utc(event.start)));
        props.set(Property::new("DTEND", format_utc(event.end)));
        Self::Event(props)
    }

    /// Build a VTODO. DUE is emitted only when set.
    #[must_use]
    pub fn todo(uid: &str, todo: &NewToDo, stamp: DateTime<Utc>) -> Self {
        let mut props = PropertySet::new();
        props.set(Property::new("UID", uid));
        props.set(Property::new("DTSTAMP", format_utc(stamp)));
        props.set(Property::new("SUMMARY", todo.summary.as_str()));
        if let Some(due) = todo.due {
            props.set(Property::new("DUE", format_utc(due)));
        }
        Self::ToDo(props)
    }

    #[must_use]
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::Event(_) => ComponentKind::Event,
            Self::ToDo(_) => ComponentKind::ToDo,
        }
    }

    #[must_use]
    pub fn properties(&self) -> &PropertySet {
        match self {
            Self::Event(props) | Self::ToDo(props) => props,
        }
    }

    pub fn properties_mut(&mut self) -> &mut PropertySet {
        match self {
            Self::Event(props) | Self::ToDo(props) => props,
        }
    }

    #[must_use]
    pub fn uid(&self) -> Option<&str> {
        extract_field(self, "UID")
    }
}

/// A VCALENDAR object: format metadata plus one or more components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub version: String,
    pub prodid: String,
    /// Other calendar-level properties (CALSCALE, METHOD, ...).
    pub properties: PropertySet,
    pub components: Vec<Component>,
}

impl Document {
    /// A document with the gateway's VERSION and PRODID.
    #[must_use]
    pub fn new(components: Vec<Component>) -> Self {
        Self {
            version: VERSION.to_string(),
            prodid: PRODID.to_string(),
            properties: PropertySet::new(),
            components,
        }
    }

    #[must_use]
    pub fn first_component(&self) -> Option<&Component> {
        self.components.first()
    }
}

/// Look up a property value on a component.
///
/// `None` means the property is absent; `Some("")` means it is present with
/// an empty value.
#[must_use]
pub fn extract_field<'a>(component: &'a Component, name: &str) -> Option<&'a str> {
    component.properties().value(name)
}

/// A fresh globally unique identifier for a new component.
#[must_use]
pub fn new_uid() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Format an instant as a UTC DATE-TIME value (`20240102T090000Z`).
#[must_use]
pub fn format_utc(instant: DateTime<Utc>) -> String {
    instant.format(UTC_FORMAT).to_string()
}

// ── Encoding ────────────────────────────────────────────────────────────────

/// Serialize a document to iCalendar text with CRLF line endings.
///
/// Components built with [`Component::event`] / [`Component::todo`] carry
/// UID and DTSTAMP, so equal input always encodes to identical bytes.
pub fn encode(document: &Document) -> Result<String, EncodeError> {
    if document.components.is_empty() {
        return Err(EncodeError::NoComponents);
    }

    let mut calendar = Calendar::empty();
    calendar.append_property(to_wire(&Property::new("VERSION", document.version.as_str()))?);
    calendar.append_property(to_wire(&Property::new("PRODID", document.prodid.as_str()))?);
    for property in document.properties.iter() {
        calendar.append_property(to_wire(property)?);
    }

    for component in &document.components {
        match component {
            Component::Event(props) => {
                let mut event = Event::new();
                for property in props.iter() {
                    event.append_property(to_wire(property)?);
                }
                calendar.push(event);
            },
            Component::ToDo(props) => {
                let mut todo = Todo::new();
                for property in props.iter() {
                    todo.append_property(to_wire(property)?);
                }
                calendar.push(todo);
            },
        }
    }

    Ok(calendar.to_string())
}

fn to_wire(property: &Property) -> Result<icalendar::Property, EncodeError> {
    if !is_valid_name(&property.name) {
        return Err(EncodeError::InvalidName(property.name.clone()));
    }

    let value = if is_text_property(&property.name) {
        property.value.replace("\r\n", "\n").replace('\r', "\n")
    } else if property.value.contains(['\r', '\n']) {
        return Err(EncodeError::InvalidValue(property.name.clone()));
    } else {
        property.value.clone()
    };

    let name = property.name.to_ascii_uppercase();
    let mut wire = icalendar::Property::new(&name, &value);
    for (param, param_value) in &property.params {
        if !is_valid_name(param) {
            return Err(EncodeError::InvalidName(param.clone()));
        }
        if param_value.contains(['"', ';', ',', '\r', '\n']) {
            return Err(EncodeError::InvalidParam {
                property: property.name.clone(),
                param: param.clone(),
            });
        }
        wire.add_parameter(&param.to_ascii_uppercase(), param_value);
    }
    Ok(wire)
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn is_text_property(name: &str) -> bool {
    TEXT_PROPERTIES.iter().any(|p| p.eq_ignore_ascii_case(name))
}

// ── Decoding ────────────────────────────────────────────────────────────────

/// Parse iCalendar text into a document.
///
/// Either the whole input parses or a [`DecodeError`] is returned; there is
/// no partial result. Blocks other than VEVENT and VTODO are skipped.
pub fn decode(input: &str) -> Result<Document, DecodeError> {
    let lines = unfold(input);
    let end_line = check_structure(&lines)?;

    let normalised: String = lines.iter().map(|(_, line)| format!("{line}\r\n")).collect();
    let calendar: Calendar = normalised.parse().map_err(|e| {
        DecodeError::new(lines[0].0, DecodeErrorKind::Rejected(format!("{e}")))
    })?;

    let mut version = None;
    let mut prodid = None;
    let mut properties = PropertySet::new();
    for wire in &calendar.properties {
        let property = from_wire(wire);
        match property.name.as_str() {
            "VERSION" => version = Some(property.value),
            "PRODID" => prodid = Some(property.value),
            _ => properties.set(property),
        }
    }

    let missing = |name| DecodeError::new(end_line, DecodeErrorKind::MissingProperty(name));
    let version = version.ok_or_else(|| missing("VERSION"))?;
    let prodid = prodid.ok_or_else(|| missing("PRODID"))?;

    let components = calendar
        .components
        .iter()
        .filter_map(|component| match component {
            CalendarComponent::Event(event) => Some(Component::Event(collect(event))),
            CalendarComponent::Todo(todo) => Some(Component::ToDo(collect(todo))),
            _ => None,
        })
        .collect();

    Ok(Document {
        version,
        prodid,
        properties,
        components,
    })
}

fn collect(component: &impl icalendar::Component) -> PropertySet {
    let mut props = PropertySet::new();
    for wire in component.properties().values() {
        props.set(from_wire(wire));
    }
    props
}

fn from_wire(wire: &icalendar::Property) -> Property {
    let mut params: Vec<(String, String)> = wire
        .params()
        .values()
        .map(|p| {
            (
                p.key().to_ascii_uppercase(),
                p.value().trim_matches('"').to_string(),
            )
        })
        .collect();
    params.sort();
    Property {
        name: wire.key().to_ascii_uppercase(),
        params,
        value: wire.value().to_string(),
    }
}

/// Walk the BEGIN/END nesting and return the line of `END:VCALENDAR`.
fn check_structure(lines: &[(usize, String)]) -> Result<usize, DecodeError> {
    let Some((first_no, first)) = lines.first() else {
        return Err(DecodeError::new(1, DecodeErrorKind::Empty));
    };
    if !first.eq_ignore_ascii_case("BEGIN:VCALENDAR") {
        return Err(DecodeError::new(*first_no, DecodeErrorKind::MissingCalendar));
    }

    let mut open = vec!["VCALENDAR".to_string()];
    let mut rest = lines[1..].iter();
    while let Some((line_no, line)) = rest.next() {
        let err = |kind| DecodeError::new(*line_no, kind);
        let colon = line.find(':').ok_or_else(|| err(DecodeErrorKind::MissingColon))?;
        let name_end = line.find(';').map_or(colon, |semi| semi.min(colon));
        let name = line[..name_end].trim();
        if name.is_empty() {
            return Err(err(DecodeErrorKind::EmptyName));
        }
        let block = line[colon + 1..].trim().to_ascii_uppercase();

        if name.eq_ignore_ascii_case("BEGIN") {
            if block == "VCALENDAR" {
                return Err(err(DecodeErrorKind::NestedCalendar));
            }
            open.push(block);
        } else if name.eq_ignore_ascii_case("END") {
            let expected = open.pop().unwrap_or_default();
            if expected != block {
                return Err(err(DecodeErrorKind::MismatchedEnd {
                    expected,
                    found: block,
                }));
            }
            if open.is_empty() {
                if let Some((trailing, _)) = rest.next() {
                    return Err(DecodeError::new(*trailing, DecodeErrorKind::TrailingContent));
                }
                return Ok(*line_no);
            }
        }
    }

    let last = lines.last().map_or(*first_no, |(no, _)| *no);
    let open = open.pop().unwrap_or_else(|| "VCALENDAR".to_string());
    Err(DecodeError::new(last, DecodeErrorKind::UnexpectedEof { open }))
}

/// Join folded lines. Returns `(first physical line number, logical line)`
/// pairs, skipping blank lines.
fn unfold(input: &str) -> Vec<(usize, String)> {
    let mut out: Vec<(usize, String)> = Vec::new();
    for (idx, raw) in input.split('\n').enumerate() {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        match raw.strip_prefix([' ', '\t']) {
            Some(continuation) if !out.is_empty() => {
                if let Some((_, last)) = out.last_mut() {
                    last.push_str(continuation);
                }
            },
            _ if raw.trim().is_empty() => {},
            _ => out.push((idx + 1, raw.to_string())),
        }
    }
    out
}
