//! WebDAV request bodies and multistatus parsing.

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use unical_core::Provider;

use crate::error::{ProviderError, ProviderResult};

pub(crate) const DAV_NS: &str = "DAV:";
pub(crate) const CALDAV_NS: &str = "urn:ietf:params:xml:ns:caldav";
pub(crate) const CS_NS: &str = "http://calendarserver.org/ns/";
pub(crate) const APPLE_NS: &str = "http://apple.com/ns/ical/";

/// A calendar collection found under the calendar home.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct DiscoveredCalendar {
    pub href: String,
    pub display_name: Option<String>,
    pub color: Option<String>,
    /// Component types from `supported-calendar-component-set`.
    pub components: Vec<String>,
    /// Shared with the current user by someone else.
    pub is_shared: bool,
    pub owner: Option<String>,
}

impl DiscoveredCalendar {
    /// Collections that do not advertise their components accept all.
    pub fn supports(&self, component: &str) -> bool {
        self.components.is_empty() || self.components.iter().any(|c| c == component)
    }
}

/// Result of principal discovery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct HomeSet {
    pub principal: Option<String>,
    pub calendar_home: Option<String>,
}

/// One `calendar-data` entry of a REPORT response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CalendarObject {
    pub href: String,
    pub data: String,
}

struct XmlBody {
    writer: Writer<Vec<u8>>,
}

impl XmlBody {
    fn new() -> ProviderResult<Self> {
        let mut body = Self {
            writer: Writer::new(Vec::new()),
        };
        body.emit(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        Ok(body)
    }

    fn emit(&mut self, event: Event<'_>) -> ProviderResult<()> {
        self.writer.write_event(event).map_err(|e| {
            ProviderError::internal(format!("failed to build request body: {e}"))
                .with_provider(Provider::Apple)
        })
    }

    fn open(&mut self, start: BytesStart<'_>) -> ProviderResult<()> {
        self.emit(Event::Start(start))
    }

    fn close(&mut self, name: &str) -> ProviderResult<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    fn empty(&mut self, element: BytesStart<'_>) -> ProviderResult<()> {
        self.emit(Event::Empty(element))
    }

    fn finish(self) -> ProviderResult<String> {
        String::from_utf8(self.writer.into_inner()).map_err(|e| {
            ProviderError::internal(format!("request body is not UTF-8: {e}"))
                .with_provider(Provider::Apple)
        })
    }
}

fn propfind(props: &[&str]) -> ProviderResult<String> {
    let mut body = XmlBody::new()?;
    let mut root = BytesStart::new("d:propfind");
    root.push_attribute(("xmlns:d", DAV_NS));
    root.push_attribute(("xmlns:c", CALDAV_NS));
    root.push_attribute(("xmlns:cs", CS_NS));
    root.push_attribute(("xmlns:ic", APPLE_NS));
    body.open(root)?;
    body.open(BytesStart::new("d:prop"))?;
    for prop in props {
        body.empty(BytesStart::new(*prop))?;
    }
    body.close("d:prop")?;
    body.close("d:propfind")?;
    body.finish()
}

/// PROPFIND body asking for the principal and its calendar home.
pub(crate) fn home_set_body() -> ProviderResult<String> {
    propfind(&["d:current-user-principal", "c:calendar-home-set"])
}

/// PROPFIND body listing calendar collections and their metadata.
pub(crate) fn calendars_body() -> ProviderResult<String> {
    propfind(&[
        "d:displayname",
        "d:resourcetype",
        "d:owner",
        "c:supported-calendar-component-set",
        "ic:calendar-color",
        "cs:getctag",
    ])
}

/// REPORT `calendar-query` for one component type, optionally limited to
/// `[start, end)`.
pub(crate) fn calendar_query_body(
    component: &str,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
) -> ProviderResult<String> {
    let mut body = XmlBody::new()?;
    let mut root = BytesStart::new("c:calendar-query");
    root.push_attribute(("xmlns:d", DAV_NS));
    root.push_attribute(("xmlns:c", CALDAV_NS));
    body.open(root)?;

    body.open(BytesStart::new("d:prop"))?;
    body.empty(BytesStart::new("d:getetag"))?;
    body.empty(BytesStart::new("c:calendar-data"))?;
    body.close("d:prop")?;

    body.open(BytesStart::new("c:filter"))?;
    let mut calendar = BytesStart::new("c:comp-filter");
    calendar.push_attribute(("name", "VCALENDAR"));
    body.open(calendar)?;

    let mut inner = BytesStart::new("c:comp-filter");
    inner.push_attribute(("name", component));
    match window {
        Some((start, end)) => {
            body.open(inner)?;
            let start = format_utc(start);
            let end = format_utc(end);
            let mut range = BytesStart::new("c:time-range");
            range.push_attribute(("start", start.as_str()));
            range.push_attribute(("end", end.as_str()));
            body.empty(range)?;
            body.close("c:comp-filter")?;
        }
        None => body.empty(inner)?,
    }

    body.close("c:comp-filter")?;
    body.close("c:filter")?;
    body.close("c:calendar-query")?;
    body.finish()
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn parse_error(e: impl std::fmt::Display) -> ProviderError {
    ProviderError::invalid_response(format!("malformed multistatus: {e}"))
        .with_provider(Provider::Apple)
}

/// Walks a multistatus document, handing every element and text node to
/// `visit` together with the path of enclosing local names.
fn walk<F>(xml: &str, mut visit: F) -> ProviderResult<()>
where
    F: FnMut(Node<'_>, &[String]),
{
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut path: Vec<String> = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(parse_error)? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let attr = name_attribute(&e);
                visit(Node::Open(&name, attr.as_deref()), &path);
                path.push(name);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let attr = name_attribute(&e);
                visit(Node::Open(&name, attr.as_deref()), &path);
                visit(Node::Close(&name), &path);
            }
            Event::End(e) => {
                path.pop();
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                visit(Node::Close(&name), &path);
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(parse_error)?;
                visit(Node::Text(&text), &path);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                visit(Node::Text(&text), &path);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

enum Node<'a> {
    /// Element name and its `name` attribute, if any.
    Open(&'a str, Option<&'a str>),
    Close(&'a str),
    Text(&'a str),
}

fn name_attribute(e: &BytesStart<'_>) -> Option<String> {
    e.try_get_attribute("name")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn parent(path: &[String]) -> Option<&str> {
    path.last().map(String::as_str)
}

/// Extracts the principal and calendar home hrefs.
pub(crate) fn parse_home_set(xml: &str) -> ProviderResult<HomeSet> {
    let mut home = HomeSet::default();
    walk(xml, |node, path| {
        let Node::Text(text) = node else { return };
        if parent(path) != Some("href") {
            return;
        }
        match path.iter().rev().nth(1).map(String::as_str) {
            Some("current-user-principal") => home.principal = Some(text.to_string()),
            Some("calendar-home-set") => home.calendar_home = Some(text.to_string()),
            _ => {}
        }
    })?;
    Ok(home)
}

/// Extracts calendar collections. Non-calendar resources are skipped.
pub(crate) fn parse_calendars(xml: &str) -> ProviderResult<Vec<DiscoveredCalendar>> {
    let mut calendars = Vec::new();
    let mut current = DiscoveredCalendar::default();
    let mut is_calendar = false;

    walk(xml, |node, path| match node {
        Node::Open("response", _) => {
            current = DiscoveredCalendar::default();
            is_calendar = false;
        }
        Node::Open("calendar", _) if parent(path) == Some("resourcetype") => is_calendar = true,
        Node::Open("shared", _) if parent(path) == Some("resourcetype") => current.is_shared = true,
        Node::Open("comp", Some(name)) => current.components.push(name.to_string()),
        Node::Close("response") => {
            let done = std::mem::take(&mut current);
            if is_calendar && !done.href.is_empty() {
                calendars.push(done);
            }
        }
        Node::Text(text) => match (parent(path), path.iter().rev().nth(1).map(String::as_str)) {
            (Some("href"), Some("response")) => current.href = text.to_string(),
            (Some("href"), Some("owner")) => current.owner = Some(text.to_string()),
            (Some("displayname"), _) => current.display_name = Some(text.to_string()),
            (Some("calendar-color"), _) => current.color = Some(text.to_string()),
            _ => {}
        },
        _ => {}
    })?;
    Ok(calendars)
}

/// Extracts every `calendar-data` payload with its href.
pub(crate) fn parse_calendar_objects(xml: &str) -> ProviderResult<Vec<CalendarObject>> {
    let mut objects = Vec::new();
    let mut href = String::new();
    let mut data = String::new();

    walk(xml, |node, path| match node {
        Node::Open("response", _) => {
            href.clear();
            data.clear();
        }
        Node::Close("response") => {
            if !data.trim().is_empty() {
                objects.push(CalendarObject {
                    href: std::mem::take(&mut href),
                    data: std::mem::take(&mut data),
                });
            }
        }
        Node::Text(text) => match parent(path) {
            Some("href") if path.iter().rev().nth(1).map(String::as_str) == Some("response") => {
                href = text.to_string();
            }
            Some("calendar-data") => data.push_str(text),
            _ => {}
        },
        _ => {}
    })?;
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn query_body_with_time_range() {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let body = calendar_query_body("VEVENT", Some((start, end))).unwrap();
        assert!(body.starts_with("<?xml"));
        assert!(body.contains(r#"<c:comp-filter name="VEVENT">"#));
        assert!(body.contains(r#"start="20250201T000000Z""#));
        assert!(body.contains(r#"end="20250301T000000Z""#));
    }

    #[test]
    fn query_body_without_time_range() {
        let body = calendar_query_body("VTODO", None).unwrap();
        assert!(body.contains(r#"<c:comp-filter name="VTODO"/>"#));
        assert!(!body.contains("time-range"));
    }

    #[test]
    fn propfind_bodies_name_their_properties() {
        let body = home_set_body().unwrap();
        assert!(body.contains("<d:current-user-principal/>"));
        assert!(body.contains("<c:calendar-home-set/>"));
        let body = calendars_body().unwrap();
        assert!(body.contains("<ic:calendar-color/>"));
        assert!(body.contains("<c:supported-calendar-component-set/>"));
    }

    #[test]
    fn home_set_discovery() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<multistatus xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <response>
    <href>/</href>
    <propstat>
      <prop>
        <current-user-principal><href>/1234/principal/</href></current-user-principal>
        <C:calendar-home-set><href>https://p01-caldav.icloud.com/1234/calendars/</href></C:calendar-home-set>
      </prop>
      <status>HTTP/1.1 200 OK</status>
    </propstat>
  </response>
</multistatus>"#;
        let home = parse_home_set(xml).unwrap();
        assert_eq!(home.principal.as_deref(), Some("/1234/principal/"));
        assert_eq!(
            home.calendar_home.as_deref(),
            Some("https://p01-caldav.icloud.com/1234/calendars/")
        );
    }

    #[test]
    fn calendar_listing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<multistatus xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav" xmlns:CS="http://calendarserver.org/ns/" xmlns:I="http://apple.com/ns/ical/">
  <response>
    <href>/1234/calendars/</href>
    <propstat><prop><resourcetype><collection/></resourcetype></prop></propstat>
  </response>
  <response>
    <href>/1234/calendars/home/</href>
    <propstat>
      <prop>
        <displayname>Home</displayname>
        <resourcetype><collection/><C:calendar/></resourcetype>
        <C:supported-calendar-component-set><C:comp name="VEVENT"/></C:supported-calendar-component-set>
        <I:calendar-color>#FF2968FF</I:calendar-color>
        <owner><href>/1234/principal/</href></owner>
      </prop>
    </propstat>
  </response>
  <response>
    <href>/1234/calendars/family/</href>
    <propstat>
      <prop>
        <displayname>Family</displayname>
        <resourcetype><collection/><C:calendar/><CS:shared/></resourcetype>
        <owner><href>/5678/principal/</href></owner>
      </prop>
    </propstat>
  </response>
  <response>
    <href>/1234/calendars/reminders/</href>
    <propstat>
      <prop>
        <displayname>Reminders</displayname>
        <resourcetype><collection/><C:calendar/></resourcetype>
        <C:supported-calendar-component-set><C:comp name="VTODO"/></C:supported-calendar-component-set>
      </prop>
    </propstat>
  </response>
</multistatus>"#;
        let calendars = parse_calendars(xml).unwrap();
        assert_eq!(calendars.len(), 3);

        let home = &calendars[0];
        assert_eq!(home.href, "/1234/calendars/home/");
        assert_eq!(home.display_name.as_deref(), Some("Home"));
        assert_eq!(home.color.as_deref(), Some("#FF2968FF"));
        assert_eq!(home.owner.as_deref(), Some("/1234/principal/"));
        assert!(home.supports("VEVENT"));
        assert!(!home.supports("VTODO"));
        assert!(!home.is_shared);

        let family = &calendars[1];
        assert!(family.is_shared);
        assert!(family.supports("VTODO"));

        assert!(calendars[2].supports("VTODO"));
    }

    #[test]
    fn report_objects() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<multistatus xmlns="DAV:" xmlns:C="urn:ietf:params:xml:ns:caldav">
  <response>
    <href>/cal/event1.ics</href>
    <propstat>
      <prop>
        <getetag>"abc123"</getetag>
        <C:calendar-data>BEGIN:VCALENDAR
BEGIN:VEVENT
UID:event1
SUMMARY:Team &amp; Friends
END:VEVENT
END:VCALENDAR</C:calendar-data>
      </prop>
    </propstat>
  </response>
  <response>
    <href>/cal/gone.ics</href>
    <status>HTTP/1.1 404 Not Found</status>
  </response>
</multistatus>"#;
        let objects = parse_calendar_objects(xml).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].href, "/cal/event1.ics");
        assert!(objects[0].data.contains("SUMMARY:Team & Friends"));
    }

    #[test]
    fn malformed_xml_is_invalid_response() {
        let err = parse_calendar_objects("<multistatus><response></multistatus>").unwrap_err();
        assert_eq!(err.code(), crate::error::ProviderErrorCode::InvalidResponse);
    }
}
