//! The MOTLY value tree.
//!
//! Every named entry in a tree is a [`Node`] with two orthogonal slots:
//! a value (scalar, array, or environment reference) and a map of named
//! child nodes. A property slot may instead hold a [`Link`], an opaque
//! identity pointer with no value or properties of its own. Property
//! insertion order is preserved for iteration and serialization, while
//! equality compares properties order-independently.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use indexmap::IndexMap;

/// An ISO-8601 instant that retains the exact source spelling.
///
/// The raw text keeps the precision the author wrote; the parsed
/// instant supports comparison by epoch. Date-only forms are midnight
/// UTC and zone-less datetimes are taken as UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct DateStamp {
    pub raw: String,
    pub instant: DateTime<FixedOffset>,
}

impl DateStamp {
    /// Parse a date in one of the accepted shapes:
    /// `YYYY-MM-DD[THH:MM[:SS[.fff]][Z|±HH:MM|±HHMM]]`.
    /// Returns `None` when the fields are not a real calendar date/time.
    #[must_use]
    pub fn parse(raw: &str) -> Option<DateStamp> {
        if raw.len() < 10 || !raw.is_char_boundary(10) {
            return None;
        }
        let (date_part, rest) = raw.split_at(10);
        let date = NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()?;

        let (time, offset) = if rest.is_empty() {
            (NaiveTime::MIN, FixedOffset::east_opt(0)?)
        } else {
            let rest = rest.strip_prefix('T')?;
            // The time part contains only digits, ':' and '.', so the
            // first 'Z', '+' or '-' starts the zone suffix.
            let zone_at = rest.find(['Z', '+', '-']);
            let (time_part, zone_part) = match zone_at {
                Some(i) => rest.split_at(i),
                None => (rest, ""),
            };
            let time = NaiveTime::parse_from_str(time_part, "%H:%M:%S%.f")
                .or_else(|_| NaiveTime::parse_from_str(time_part, "%H:%M"))
                .ok()?;
            (time, parse_zone(zone_part)?)
        };

        let instant = offset.from_local_datetime(&date.and_time(time)).single()?;
        Some(DateStamp {
            raw: raw.to_string(),
            instant,
        })
    }
}

fn parse_zone(zone: &str) -> Option<FixedOffset> {
    if zone.is_empty() || zone == "Z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, digits) = zone.split_at(1);
    let digits = digits.replace(':', "");
    if digits.len() != 4 {
        return None;
    }
    let hours: i32 = digits[..2].parse().ok()?;
    let minutes: i32 = digits[2..].parse().ok()?;
    let seconds = hours * 3600 + minutes * 60;
    FixedOffset::east_opt(if sign == "-" { -seconds } else { seconds })
}

/// A scalar in a node's value slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Num(f64),
    Bool(bool),
    Date(DateStamp),
}

/// A node's value slot: a scalar, an array of child slots, or an
/// environment reference kept verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Array(Vec<Slot>),
    Env(String),
}

/// An identity pointer to another node, in canonical `$` `^`* path form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub target: String,
}

/// The occupant of a property slot or array element: a node or a link.
/// The two are mutually exclusive; a link has no slots of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Node(Node),
    Link(Link),
}

impl Slot {
    #[must_use]
    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Slot::Node(node) => Some(node),
            Slot::Link(_) => None,
        }
    }

    #[must_use]
    pub fn as_link(&self) -> Option<&Link> {
        match self {
            Slot::Link(link) => Some(link),
            Slot::Node(_) => None,
        }
    }

    /// The node in this slot, replacing a link with a fresh empty node
    /// first. Links are opaque and cannot be mutated through.
    pub fn make_node(&mut self) -> &mut Node {
        if matches!(self, Slot::Link(_)) {
            *self = Slot::Node(Node::new());
        }
        match self {
            Slot::Node(node) => node,
            Slot::Link(_) => unreachable!("link was just replaced"),
        }
    }
}

/// The universal tree element.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Node {
    pub value: Option<Value>,
    pub properties: Option<IndexMap<String, Slot>>,
    /// Tombstone left by `-name`.
    pub deleted: bool,
}

impl Node {
    #[must_use]
    pub fn new() -> Self {
        Node::default()
    }

    /// A tombstone node, as written by `-name`.
    #[must_use]
    pub fn tombstone() -> Self {
        Node {
            deleted: true,
            ..Node::default()
        }
    }

    /// Get or create the property map.
    pub fn properties_mut(&mut self) -> &mut IndexMap<String, Slot> {
        self.properties.get_or_insert_with(IndexMap::new)
    }

    /// Look up a direct property slot.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Slot> {
        self.properties.as_ref()?.get(name)
    }
}
