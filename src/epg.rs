//! Channel-based filtering of XMLTV documents.
//!
//! Channels are selected by the first `display-name` of each `channel`
//! element; the matching `id` values then select `programme` elements through
//! their `channel` attribute.

use crate::document::{Document, Element, Node};
use crate::text::normalize_text;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::debug;

/// Root tag of an XMLTV document.
pub const TAG_TV: &str = "tv";
/// Channel element tag.
pub const TAG_CHANNEL: &str = "channel";
/// Programme element tag.
pub const TAG_PROGRAMME: &str = "programme";
/// Display name element tag inside a channel.
pub const TAG_DISPLAY_NAME: &str = "display-name";

const ATTR_ID: &str = "id";
const ATTR_CHANNEL: &str = "channel";
const ATTR_STOP: &str = "stop";

/// Stop time used by some providers to mean "no known end time".
pub const PLACEHOLDER_STOP: &str = "19700101000000 +0000";

/// Channel identifiers selected for output.
///
/// A matching channel without an `id` attribute contributes `None`, which
/// then also admits programmes lacking a `channel` attribute. An empty `id`
/// is a distinct value and only admits `channel=""`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedIds(HashSet<Option<String>>);

impl AllowedIds {
    /// Returns true if the given identifier (or its absence) is allowed.
    #[must_use]
    pub fn contains(&self, id: Option<&str>) -> bool {
        self.0.contains(&id.map(str::to_owned))
    }

    /// Number of distinct allowed identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn insert(&mut self, id: Option<&str>) {
        self.0.insert(id.map(str::to_owned));
    }
}

/// Counters describing what a filter pass kept and changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FilterReport {
    /// Channel elements in the source
    pub channels_total: usize,
    /// Channel elements written to the output
    pub channels_kept: usize,
    /// Programme elements in the source
    pub programmes_total: usize,
    /// Programme elements written to the output
    pub programmes_kept: usize,
    /// Placeholder `stop` attributes removed
    pub placeholder_stops_removed: usize,
    /// Text nodes changed by mojibake repair
    pub texts_repaired: usize,
    /// Root children that were neither channels nor programmes
    pub other_elements_dropped: usize,
}

/// Result of applying a [`ChannelFilter`].
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Filtered document
    pub document: Document,
    /// Channel identifiers that were selected
    pub allowed_ids: AllowedIds,
    /// Counters for the pass
    pub report: FilterReport,
}

/// Selects channels by exact display name.
///
/// Requested names are compared as given. The source display name is trimmed
/// and passed through [`normalize_text`] before comparison.
#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    names: BTreeSet<String>,
}

impl ChannelFilter {
    /// Creates a filter for the given channel names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The requested channel names.
    #[must_use]
    pub const fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    /// Returns true if `element` is a channel whose first display name is
    /// one of the requested names.
    #[must_use]
    pub fn matches_channel(&self, element: &Element) -> bool {
        element.child(TAG_DISPLAY_NAME).is_some_and(|display_name| {
            let name = normalize_text(display_name.text().trim());
            self.names.contains(&name)
        })
    }

    /// Collects the identifiers of all matching channels in `document`.
    #[must_use]
    pub fn allowed_ids(&self, document: &Document) -> AllowedIds {
        let mut allowed = AllowedIds::default();

        for channel in children_named(&document.root, TAG_CHANNEL) {
            if self.matches_channel(channel) {
                let id = channel.attribute(ATTR_ID);
                debug!("Matched channel {:?}", id);
                allowed.insert(id);
            }
        }

        allowed
    }

    /// Builds a new document holding only the selected channels and their
    /// programmes.
    ///
    /// The output root is a fresh `tv` element with the source root's
    /// attributes. Retained channels are copied unchanged and come first,
    /// followed by retained programmes, each group in source order.
    /// Programmes have a placeholder `stop` removed and all text repaired.
    #[must_use]
    pub fn apply(&self, document: &Document) -> FilterOutcome {
        let allowed_ids = self.allowed_ids(document);
        let mut report = FilterReport::default();

        let mut root = Element::new(TAG_TV);
        root.attributes.clone_from(&document.root.attributes);

        for channel in children_named(&document.root, TAG_CHANNEL) {
            report.channels_total += 1;
            if allowed_ids.contains(channel.attribute(ATTR_ID)) {
                report.channels_kept += 1;
                root.push(Node::Element(channel.clone()));
            }
        }

        for programme in children_named(&document.root, TAG_PROGRAMME) {
            report.programmes_total += 1;
            if allowed_ids.contains(programme.attribute(ATTR_CHANNEL)) {
                report.programmes_kept += 1;
                let mut programme = programme.clone();
                rewrite_programme(&mut programme, &mut report);
                root.push(Node::Element(programme));
            }
        }

        report.other_elements_dropped = document
            .root
            .child_elements()
            .filter(|e| e.name != TAG_CHANNEL && e.name != TAG_PROGRAMME)
            .count();

        FilterOutcome {
            document: Document::new(root),
            allowed_ids,
            report,
        }
    }
}

fn children_named<'a>(parent: &'a Element, name: &'a str) -> impl Iterator<Item = &'a Element> {
    parent.child_elements().filter(move |e| e.name == name)
}

fn rewrite_programme(programme: &mut Element, report: &mut FilterReport) {
    if programme.attribute(ATTR_STOP) == Some(PLACEHOLDER_STOP) {
        programme.remove_attribute(ATTR_STOP);
        report.placeholder_stops_removed += 1;
    }

    programme.for_each_text_mut(&mut |text| {
        let repaired = normalize_text(text);
        if repaired != *text {
            *text = repaired;
            report.texts_repaired += 1;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUIDE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tv generator-info-name="epg-test" generator-info-url="http://example.com">
  <channel id="c1">
    <display-name>  RTLÂ²  </display-name>
    <display-name>RTL Zwei</display-name>
  </channel>
  <channel id="c2">
    <display-name>ProSieben</display-name>
  </channel>
  <channel id="c3">
    <display-name>Das Erste</display-name>
  </channel>
  <channel id="c4">
    <icon src="http://example.com/logo.png"/>
  </channel>
  <programme start="20250101060000 +0000" stop="19700101000000 +0000" channel="c1">
    <title lang="de">RTLÂ² Nachrichten</title>
    <desc>FrÃ¼hstÃ¼ck</desc>
  </programme>
  <programme start="20250101060000 +0000" stop="20250101070000 +0000" channel="c2">
    <title>Galileo</title>
  </programme>
  <programme start="20250101070000 +0000" stop="20250101080000 +0000" channel="c1">
    <title>Explosiv</title>
  </programme>
  <programme start="20250101070000 +0000" stop="20250101080000 +0000" channel="c3">
    <title>Tagesschau</title>
  </programme>
  <programme start="20250101080000 +0000" stop="20250101090000 +0000" channel="c2">
    <title>taff</title>
  </programme>
  <unknown/>
</tv>
"#;

    fn guide() -> Document {
        Document::parse_str(GUIDE).unwrap()
    }

    fn kept_ids(document: &Document, tag: &str, attr: &str) -> Vec<String> {
        children_named(&document.root, tag)
            .map(|e| e.attribute(attr).unwrap_or_default().to_string())
            .collect()
    }

    fn titles(document: &Document) -> Vec<String> {
        children_named(&document.root, TAG_PROGRAMME)
            .map(|p| p.child("title").unwrap().text())
            .collect()
    }

    #[test]
    fn test_allowed_ids_match_trimmed_normalized_display_name() {
        let filter = ChannelFilter::new(["RTL²", "Das Erste"]);
        let allowed = filter.allowed_ids(&guide());

        assert_eq!(allowed.len(), 2);
        assert!(allowed.contains(Some("c1")));
        assert!(allowed.contains(Some("c3")));
        assert!(!allowed.contains(Some("c2")));
    }

    #[test]
    fn test_only_first_display_name_is_consulted() {
        let filter = ChannelFilter::new(["RTL Zwei"]);
        assert!(filter.allowed_ids(&guide()).is_empty());
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        let filter = ChannelFilter::new(["prosieben"]);
        assert!(filter.allowed_ids(&guide()).is_empty());
    }

    #[test]
    fn test_requested_names_are_not_trimmed() {
        let filter = ChannelFilter::new([" ProSieben"]);
        assert!(filter.allowed_ids(&guide()).is_empty());
    }

    #[test]
    fn test_channel_without_display_name_is_skipped() {
        let filter = ChannelFilter::new([""]);
        assert!(!filter.allowed_ids(&guide()).contains(Some("c4")));
    }

    #[test]
    fn test_apply_keeps_matching_channels_and_programmes_in_order() {
        let outcome = ChannelFilter::new(["ProSieben", "RTL²"]).apply(&guide());
        let doc = &outcome.document;

        assert_eq!(kept_ids(doc, TAG_CHANNEL, "id"), vec!["c1", "c2"]);
        assert_eq!(kept_ids(doc, TAG_PROGRAMME, "channel"), vec!["c1", "c2", "c1", "c2"]);

        // Channels precede programmes.
        let names: Vec<_> = doc.root.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["channel", "channel", "programme", "programme", "programme", "programme"]);
    }

    #[test]
    fn test_apply_copies_root_attributes() {
        let outcome = ChannelFilter::new(["ProSieben"]).apply(&guide());
        let root = &outcome.document.root;

        assert_eq!(root.name, TAG_TV);
        assert_eq!(root.attributes, guide().root.attributes);
    }

    #[test]
    fn test_apply_removes_placeholder_stop_only() {
        let outcome = ChannelFilter::new(["RTL²"]).apply(&guide());
        let programmes: Vec<_> = children_named(&outcome.document.root, TAG_PROGRAMME).collect();

        assert_eq!(programmes.len(), 2);
        assert_eq!(programmes[0].attribute("stop"), None);
        assert_eq!(programmes[0].attribute("start"), Some("20250101060000 +0000"));
        assert_eq!(programmes[1].attribute("stop"), Some("20250101080000 +0000"));
        assert_eq!(outcome.report.placeholder_stops_removed, 1);
    }

    #[test]
    fn test_apply_repairs_programme_text() {
        let outcome = ChannelFilter::new(["RTL²"]).apply(&guide());
        let first = children_named(&outcome.document.root, TAG_PROGRAMME).next().unwrap();

        assert_eq!(first.child("title").unwrap().text(), "RTL² Nachrichten");
        assert_eq!(first.child("desc").unwrap().text(), "Frühstück");
        assert_eq!(first.child("title").unwrap().attribute("lang"), Some("de"));
        assert_eq!(outcome.report.texts_repaired, 2);
    }

    #[test]
    fn test_apply_leaves_channel_subtree_untouched() {
        let source = guide();
        let outcome = ChannelFilter::new(["RTL²"]).apply(&source);
        let channel = outcome.document.root.child(TAG_CHANNEL).unwrap();

        assert_eq!(channel, source.root.child(TAG_CHANNEL).unwrap());
        assert_eq!(channel.child(TAG_DISPLAY_NAME).unwrap().text(), "  RTLÂ²  ");
        assert_eq!(channel.child_elements().count(), 2);
    }

    #[test]
    fn test_apply_does_not_mutate_source() {
        let source = guide();
        let before = source.clone();
        let _ = ChannelFilter::new(["RTL²"]).apply(&source);

        assert_eq!(source, before);
    }

    #[test]
    fn test_no_match_yields_empty_root() {
        let doc = Document::parse_str(r#"<tv><channel id="1"><display-name>Foo</display-name></channel></tv>"#)
            .unwrap();
        let outcome = ChannelFilter::new(["Bar"]).apply(&doc);

        assert!(outcome.allowed_ids.is_empty());
        assert!(outcome.document.root.children.is_empty());
        assert_eq!(outcome.report.channels_total, 1);
        assert_eq!(outcome.report.channels_kept, 0);
    }

    #[test]
    fn test_empty_request_yields_empty_root() {
        let outcome = ChannelFilter::new(Vec::<String>::new()).apply(&guide());
        assert!(outcome.document.root.children.is_empty());
        assert_eq!(outcome.document.root.attributes.len(), 2);
    }

    #[test]
    fn test_report_counts() {
        let outcome = ChannelFilter::new(["ProSieben"]).apply(&guide());

        assert_eq!(
            outcome.report,
            FilterReport {
                channels_total: 4,
                channels_kept: 1,
                programmes_total: 5,
                programmes_kept: 2,
                placeholder_stops_removed: 0,
                texts_repaired: 0,
                other_elements_dropped: 1,
            }
        );
        assert_eq!(titles(&outcome.document), vec!["Galileo", "taff"]);
    }

    #[test]
    fn test_missing_channel_id_admits_programmes_without_channel() {
        // A matched channel without `id` puts "absent" into the allowed set,
        // which then also admits programmes that have no `channel` attribute.
        let doc = Document::parse_str(
            r#"<tv>
                <channel><display-name>Nameless</display-name></channel>
                <programme start="1"><title>Orphan</title></programme>
                <programme start="2" channel=""><title>Empty</title></programme>
                <programme start="3" channel="x"><title>Other</title></programme>
            </tv>"#,
        )
        .unwrap();
        let outcome = ChannelFilter::new(["Nameless"]).apply(&doc);

        assert!(outcome.allowed_ids.contains(None));
        assert!(!outcome.allowed_ids.contains(Some("")));
        assert_eq!(outcome.report.channels_kept, 1);
        assert_eq!(titles(&outcome.document), vec!["Orphan"]);
    }

    #[test]
    fn test_empty_channel_id_admits_only_empty_channel_attribute() {
        let doc = Document::parse_str(
            r#"<tv>
                <channel id=""><display-name>Blank</display-name></channel>
                <programme start="1"><title>Orphan</title></programme>
                <programme start="2" channel=""><title>Empty</title></programme>
            </tv>"#,
        )
        .unwrap();
        let outcome = ChannelFilter::new(["Blank"]).apply(&doc);

        assert!(outcome.allowed_ids.contains(Some("")));
        assert_eq!(titles(&outcome.document), vec!["Empty"]);
    }

    #[test]
    fn test_empty_display_name_matches_empty_request() {
        let doc = Document::parse_str(
            r#"<tv><channel id="e"><display-name>   </display-name></channel></tv>"#,
        )
        .unwrap();
        let outcome = ChannelFilter::new([""]).apply(&doc);

        assert!(outcome.allowed_ids.contains(Some("e")));
    }

    #[test]
    fn test_filtered_output_serializes() {
        let outcome = ChannelFilter::new(["RTL²"]).apply(&guide());
        let xml = String::from_utf8(outcome.document.to_bytes().unwrap()).unwrap();

        assert!(xml.contains(r#"<programme start="20250101060000 +0000" channel="c1">"#));
        assert!(xml.contains("<title lang=\"de\">RTL² Nachrichten</title>"));
        assert!(!xml.contains("19700101000000"));
        assert!(!xml.contains("ProSieben"));
    }
}
