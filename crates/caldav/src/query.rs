//! CalDAV `calendar-query` REPORT bodies (RFC 4791 §7.8).

use std::fmt::Write as _;

use {
    chrono::{DateTime, Utc},
    quick_xml::escape::escape,
    tracing::warn,
};

use crate::{
    ical::format_utc,
    types::{ComponentKind, TimeRange},
};

/// Calendar-level properties requested with every query so returned objects
/// always decode.
const CALENDAR_PROPERTIES: &[&str] = &["VERSION", "PRODID"];

/// A calendar-query: which component to return, which of its properties, and
/// an optional time-range filter.
///
/// The component type is stored once and rendered into both the
/// `calendar-data` selector and the `comp-filter`, so the two cannot disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulingQuery {
    component: ComponentKind,
    properties: Vec<String>,
    range: Option<TimeRange>,
}

impl SchedulingQuery {
    /// Build a query. `UID` is always requested; names are uppercased and
    /// deduplicated, and names that are not valid iCalendar identifiers are
    /// dropped.
    pub fn build<I, S>(component: ComponentKind, properties: I, range: Option<TimeRange>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = vec!["UID".to_string()];
        for name in properties {
            let name = name.as_ref().trim().to_ascii_uppercase();
            if name.is_empty() || !name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
                warn!(property = %name, "dropping invalid property name from query");
                continue;
            }
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Self {
            component,
            properties: names,
            range,
        }
    }

    /// Build a query from optional bounds.
    ///
    /// A range is applied only when both bounds are present. With exactly one
    /// bound the query is unfiltered and a warning is logged; callers that
    /// need a filter must validate both bounds before getting here.
    pub fn from_bounds<I, S>(
        component: ComponentKind,
        properties: I,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let range = match (start, end) {
            (Some(start), Some(end)) => Some(TimeRange { start, end }),
            (None, None) => None,
            (start, end) => {
                warn!(
                    has_start = start.is_some(),
                    has_end = end.is_some(),
                    "half-open time range ignored, query is unfiltered"
                );
                None
            },
        };
        Self::build(component, properties, range)
    }

    #[must_use]
    pub fn component(&self) -> ComponentKind {
        self.component
    }

    #[must_use]
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    #[must_use]
    pub fn range(&self) -> Option<TimeRange> {
        self.range
    }

    /// Render the REPORT request body.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let comp = self.component.as_str();
        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n\
             <C:calendar-query xmlns:D=\"DAV:\" xmlns:C=\"urn:ietf:params:xml:ns:caldav\">\n\
             \x20 <D:prop>\n\
             \x20   <D:getetag/>\n\
             \x20   <C:calendar-data>\n\
             \x20     <C:comp name=\"VCALENDAR\">\n",
        );
        for name in CALENDAR_PROPERTIES {
            let _ = writeln!(xml, "        <C:prop name=\"{name}\"/>");
        }
        let _ = writeln!(xml, "        <C:comp name=\"{comp}\">");
        for name in &self.properties {
            let _ = writeln!(xml, "          <C:prop name=\"{}\"/>", escape(name.as_str()));
        }
        xml.push_str(
            "        </C:comp>\n\
             \x20     </C:comp>\n\
             \x20   </C:calendar-data>\n\
             \x20 </D:prop>\n\
             \x20 <C:filter>\n\
             \x20   <C:comp-filter name=\"VCALENDAR\">\n",
        );
        match self.range {
            Some(range) => {
                let _ = writeln!(xml, "      <C:comp-filter name=\"{comp}\">");
                let _ = writeln!(
                    xml,
                    "        <C:time-range start=\"{}\" end=\"{}\"/>",
                    format_utc(range.start),
                    format_utc(range.end)
                );
                xml.push_str("      </C:comp-filter>\n");
            },
            None => {
                let _ = writeln!(xml, "      <C:comp-filter name=\"{comp}\"/>");
            },
        }
        xml.push_str(
            "    </C:comp-filter>\n\
             \x20 </C:filter>\n\
             </C:calendar-query>\n",
        );
        xml
    }
}
