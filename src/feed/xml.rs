//! GeoRSS document parsing.
//!
//! Turns raw RSS 2.0 (or Atom) bytes into [`FeedChannel`] / [`FeedItem`]
//! records: the well-known RSS fields, the item's geometries, and every other
//! child element kept verbatim as an [`XmlElement`] keyed by its qualified
//! name (e.g. `gdacs:severity`). Typing those elements is the job of
//! [`crate::entry`].

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use thiserror::Error;

use super::geometry::{Geometry, Point, Polygon};

/// SEC-003: Maximum element nesting depth accepted in a feed document.
/// GeoRSS needs about six levels (`rss/channel/item/georss:where/gml:Polygon/...`).
const MAX_XML_DEPTH: usize = 64;

/// Errors that can occur while parsing a feed document.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The bytes are not well-formed XML.
    #[error("XML parse error: {0}")]
    Syntax(String),

    /// The document contains no root element at all.
    #[error("Document has no root element")]
    MissingRoot,

    /// The root element is not one of `rss`, `feed` or `rdf:RDF`.
    #[error("Unsupported root element: {0}")]
    NotAFeed(String),

    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("XML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// The document ended with unclosed elements.
    #[error("Document ended inside <{0}>")]
    Truncated(String),
}

impl From<quick_xml::Error> for XmlError {
    fn from(e: quick_xml::Error) -> Self {
        XmlError::Syntax(e.to_string())
    }
}

/// A child element of a feed item that has no dedicated field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    /// Trimmed text content, `None` when the element is empty.
    pub text: Option<String>,
    /// Attributes by qualified name.
    pub attributes: HashMap<String, String>,
}

impl XmlElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// One `<item>` (or Atom `<entry>`) of a feed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub description: Option<String>,
    pub guid: Option<String>,
    /// Raw `pubDate` / `published` value.
    pub published: Option<String>,
    /// Raw `updated` / `dc:date` value.
    pub updated: Option<String>,
    /// Geometries in document order.
    pub geometries: Vec<Geometry>,
    /// All other direct children, first occurrence of each name wins.
    pub elements: HashMap<String, XmlElement>,
}

impl FeedItem {
    pub fn element(&self, name: &str) -> Option<&XmlElement> {
        self.elements.get(name)
    }
}

/// Channel-level metadata plus the parsed items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedChannel {
    pub title: Option<String>,
    pub published: Option<String>,
    pub last_build_date: Option<String>,
    pub items: Vec<FeedItem>,
}

/// An element that has been opened but not yet closed.
struct Frame {
    name: String,
    attributes: HashMap<String, String>,
    text: String,
}

/// Item-local state while the parser is inside an `<item>`.
struct ItemState {
    /// Stack depth of the `<item>` frame itself.
    depth: usize,
    item: FeedItem,
    geo_lat: Option<f64>,
    geo_long: Option<f64>,
}

/// Parses a GeoRSS document.
///
/// # Errors
///
/// Returns [`XmlError`] when the bytes are not well-formed XML, have no root
/// element, have a root that is not a feed, nest too deeply, or end early.
/// An empty channel is not an error.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedChannel, XmlError> {
    // SEC-002: quick-xml (0.37) never expands custom <!ENTITY> declarations, see Cargo.toml pin.
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut channel = FeedChannel::default();
    let mut stack: Vec<Frame> = Vec::new();
    let mut current: Option<ItemState> = None;
    let mut seen_root = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let frame = open_frame(&e, &reader);
                check_root(&mut seen_root, &frame.name)?;
                stack.push(frame);
                if stack.len() > MAX_XML_DEPTH {
                    return Err(XmlError::MaxDepthExceeded(MAX_XML_DEPTH));
                }
                enter_element(&stack, &mut current);
            }
            Event::Empty(e) => {
                let frame = open_frame(&e, &reader);
                check_root(&mut seen_root, &frame.name)?;
                stack.push(frame);
                enter_element(&stack, &mut current);
                close_element(&mut stack, &mut current, &mut channel);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => close_element(&mut stack, &mut current, &mut channel),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(XmlError::Truncated(open.name.clone()));
    }
    if !seen_root {
        return Err(XmlError::MissingRoot);
    }

    tracing::debug!(items = channel.items.len(), "Parsed feed document");
    Ok(channel)
}

fn check_root(seen_root: &mut bool, name: &str) -> Result<(), XmlError> {
    if *seen_root {
        return Ok(());
    }
    *seen_root = true;
    match name {
        "rss" | "feed" | "rdf:RDF" => Ok(()),
        other => Err(XmlError::NotAFeed(other.to_string())),
    }
}

fn open_frame(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Frame {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = HashMap::new();

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(err) => {
                tracing::debug!(element = %name, error = %err, "Skipping malformed attribute");
                continue;
            }
        };
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        match attr.decode_and_unescape_value(reader.decoder()) {
            Ok(value) => {
                attributes.insert(key, value.into_owned());
            }
            Err(err) => {
                tracing::debug!(
                    element = %name,
                    attribute = %key,
                    error = %err,
                    "Skipping undecodable attribute"
                );
            }
        }
    }

    Frame {
        name,
        attributes,
        text: String::new(),
    }
}

fn enter_element(stack: &[Frame], current: &mut Option<ItemState>) {
    if current.is_some() {
        return;
    }
    if let Some(top) = stack.last() {
        if top.name == "item" || top.name == "entry" {
            *current = Some(ItemState {
                depth: stack.len(),
                item: FeedItem::default(),
                geo_lat: None,
                geo_long: None,
            });
        }
    }
}

fn close_element(
    stack: &mut Vec<Frame>,
    current: &mut Option<ItemState>,
    channel: &mut FeedChannel,
) {
    let Some(frame) = stack.pop() else {
        return;
    };
    let text = non_empty(&frame.text);

    let closing_item = matches!(current, Some(state) if stack.len() + 1 == state.depth);
    if closing_item {
        if let Some(mut state) = current.take() {
            if let (Some(lat), Some(lon)) = (state.geo_lat, state.geo_long) {
                state.item.geometries.push(Geometry::Point(Point::new(lat, lon)));
            }
            channel.items.push(state.item);
        }
        return;
    }

    match current.as_mut() {
        Some(state) => {
            let direct_child = stack.len() == state.depth;
            close_item_element(state, frame, text, direct_child);
        }
        None => {
            // Direct children of <channel> (RSS) or the Atom <feed> root
            let parent = stack.last().map(|f| f.name.as_str());
            if matches!(parent, Some("channel") | Some("feed")) {
                match frame.name.as_str() {
                    "title" => channel.title = text,
                    "pubDate" | "updated" => channel.published = text,
                    "lastBuildDate" => channel.last_build_date = text,
                    _ => {}
                }
            }
        }
    }
}

fn close_item_element(
    state: &mut ItemState,
    frame: Frame,
    text: Option<String>,
    direct_child: bool,
) {
    let item = &mut state.item;

    // Geometry elements are recognised at any depth below the item
    match frame.name.as_str() {
        "georss:point" | "gml:pos" => {
            if let Some(point) = text.as_deref().and_then(parse_point) {
                item.geometries.push(Geometry::Point(point));
            } else {
                tracing::debug!(element = %frame.name, "Skipping unparseable point");
            }
            return;
        }
        "georss:polygon" | "gml:posList" => {
            if let Some(polygon) = text.as_deref().and_then(parse_polygon) {
                item.geometries.push(Geometry::Polygon(polygon));
            } else {
                tracing::debug!(element = %frame.name, "Skipping unparseable polygon");
            }
            return;
        }
        "geo:lat" => {
            state.geo_lat = text.as_deref().and_then(|t| t.parse().ok());
            return;
        }
        "geo:long" | "geo:lon" => {
            state.geo_long = text.as_deref().and_then(|t| t.parse().ok());
            return;
        }
        "geo:Point" | "georss:where" | "gml:Point" | "gml:Polygon" => return,
        _ => {}
    }

    if !direct_child {
        return;
    }

    match frame.name.as_str() {
        "title" => item.title = text,
        "description" | "summary" => item.description = text,
        "guid" | "id" => item.guid = text,
        "pubDate" | "published" => item.published = text,
        "updated" | "dc:date" => item.updated = text,
        _ => {
            item.elements.entry(frame.name).or_insert(XmlElement {
                text,
                attributes: frame.attributes,
            });
        }
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_coordinates(text: &str) -> Option<Vec<f64>> {
    text.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<f64>().ok())
        .collect()
}

/// Parses `"lat lon"`.
fn parse_point(text: &str) -> Option<Point> {
    match parse_coordinates(text)?.as_slice() {
        [lat, lon] => Some(Point::new(*lat, *lon)),
        _ => None,
    }
}

/// Parses `"lat lon lat lon ..."`.
fn parse_polygon(text: &str) -> Option<Polygon> {
    let values = parse_coordinates(text)?;
    if values.is_empty() || values.len() % 2 != 0 {
        return None;
    }
    let points = values
        .chunks_exact(2)
        .map(|pair| Point::new(pair[0], pair[1]))
        .collect();
    Some(Polygon::new(points))
}
