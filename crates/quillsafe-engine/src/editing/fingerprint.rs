//! Canonical event-list snapshot of a buffer, used for dirty checks.
//!
//! The walk emits a transition wherever a tag's active state changes and
//! literal text in between. Only primary attributes produce tags; derived
//! display styles (see [`Attributes::composite`]) never appear.

use crate::editing::buffer::StyleRunBuffer;
use crate::editing::style::{Alignment, Attributes};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    Bold,
    Italic,
    Underline,
    Size(u16),
    /// Only non-left alignments are tagged
    Align(Alignment),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FingerprintEvent {
    Text(String),
    AttributeOn(Tag),
    AttributeOff(Tag),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    events: Vec<FingerprintEvent>,
}

impl Fingerprint {
    pub fn snapshot(buffer: &StyleRunBuffer) -> Self {
        let text = buffer.text();
        let paragraphs = buffer.paragraph_ranges();
        let alignments = buffer.alignments();

        let mut walk = Walk::default();
        let mut para = 0;
        for (span, attrs) in buffer.run_spans() {
            let mut pos = span.start;
            while pos < span.end {
                // A paragraph owns its terminating line break
                while pos > paragraphs[para].end {
                    para += 1;
                }
                let segment_end = span.end.min(paragraphs[para].end + 1);
                walk.transition(tags_for(attrs, alignments[para]));
                walk.text(&text[pos..segment_end]);
                pos = segment_end;
            }
        }
        walk.transition(Vec::new());

        Self { events: walk.events }
    }

    pub fn events(&self) -> &[FingerprintEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Element-wise equality of the event lists
    pub fn equals(&self, other: &Fingerprint) -> bool {
        self == other
    }
}

fn tags_for(attrs: Attributes, alignment: Alignment) -> Vec<Tag> {
    let mut tags = Vec::with_capacity(5);
    if attrs.bold {
        tags.push(Tag::Bold);
    }
    if attrs.italic {
        tags.push(Tag::Italic);
    }
    if attrs.underline {
        tags.push(Tag::Underline);
    }
    tags.push(Tag::Size(attrs.size));
    if alignment != Alignment::Left {
        tags.push(Tag::Align(alignment));
    }
    tags
}

#[derive(Default)]
struct Walk {
    events: Vec<FingerprintEvent>,
    active: Vec<Tag>,
}

impl Walk {
    fn transition(&mut self, next: Vec<Tag>) {
        for tag in self.active.iter().filter(|t| !next.contains(t)) {
            self.events.push(FingerprintEvent::AttributeOff(*tag));
        }
        for tag in next.iter().filter(|t| !self.active.contains(t)) {
            self.events.push(FingerprintEvent::AttributeOn(*tag));
        }
        self.active = next;
    }

    fn text(&mut self, text: &str) {
        if let Some(FingerprintEvent::Text(last)) = self.events.last_mut() {
            last.push_str(text);
        } else {
            self.events.push(FingerprintEvent::Text(text.to_string()));
        }
    }
}
