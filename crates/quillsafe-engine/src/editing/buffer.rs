use std::fmt;
use std::ops::Range;

use xi_rope::Rope;

use crate::editing::style::{Alignment, Attributes, StyleUpdate};

/// A maximal stretch of bytes sharing one attribute tuple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    /// Length in bytes
    pub len: usize,
    pub attrs: Attributes,
}

/// Styled text stored as a rope plus an ordered run list.
///
/// Invariants, checked by [`StyleRunBuffer::check_invariants`]:
/// - run lengths sum to the text length and no run is empty
/// - adjacent runs never carry the same attributes
/// - there is exactly one alignment per paragraph (line breaks + 1)
/// - every line break carries the attributes of the character before it
///
/// All positions are byte offsets. Offsets past the end clamp to the end and
/// offsets inside a multi-byte character move back to its start.
#[derive(Clone)]
pub struct StyleRunBuffer {
    text: Rope,
    runs: Vec<Run>,
    alignments: Vec<Alignment>,
}

impl Default for StyleRunBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StyleRunBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleRunBuffer")
            .field("text", &self.text())
            .field("runs", &self.runs)
            .field("alignments", &self.alignments)
            .finish()
    }
}

impl PartialEq for StyleRunBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.runs == other.runs
            && self.alignments == other.alignments
            && self.text() == other.text()
    }
}

impl Eq for StyleRunBuffer {}

impl StyleRunBuffer {
    pub fn new() -> Self {
        Self {
            text: Rope::from(""),
            runs: Vec::new(),
            alignments: vec![Alignment::Left],
        }
    }

    /// Build a buffer from paragraphs of styled chunks in one pass.
    ///
    /// Paragraphs are joined by line breaks. A chunk holding its own line
    /// breaks starts new paragraphs with the current alignment. Empty chunks
    /// are skipped.
    pub fn from_paragraphs<'a, P, R>(paragraphs: P) -> Self
    where
        P: IntoIterator<Item = (Alignment, R)>,
        R: IntoIterator<Item = (&'a str, Attributes)>,
    {
        let mut text = String::new();
        let mut runs: Vec<Run> = Vec::new();
        let mut alignments = Vec::new();
        for (alignment, chunks) in paragraphs {
            if !alignments.is_empty() {
                let attrs = runs.last().map(|run| run.attrs).unwrap_or_default();
                text.push('\n');
                push_run(&mut runs, Run { len: 1, attrs });
            }
            alignments.push(alignment);
            for (chunk, attrs) in chunks {
                for piece in chunk.split_inclusive('\n') {
                    let body = piece.strip_suffix('\n');
                    let content = body.unwrap_or(piece);
                    text.push_str(content);
                    push_run(
                        &mut runs,
                        Run {
                            len: content.len(),
                            attrs,
                        },
                    );
                    if body.is_some() {
                        let attrs = runs.last().map(|run| run.attrs).unwrap_or_default();
                        text.push('\n');
                        push_run(&mut runs, Run { len: 1, attrs });
                        alignments.push(alignment);
                    }
                }
            }
        }
        if alignments.is_empty() {
            alignments.push(Alignment::Left);
        }
        Self {
            text: Rope::from(text.as_str()),
            runs,
            alignments,
        }
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.text().trim().is_empty()
    }

    pub fn text(&self) -> String {
        self.text.to_string()
    }

    pub fn slice(&self, range: Range<usize>) -> String {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end).max(start);
        self.text.slice_to_cow(start..end).into_owned()
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Runs with their absolute byte ranges
    pub fn run_spans(&self) -> impl Iterator<Item = (Range<usize>, Attributes)> + '_ {
        self.runs.iter().scan(0usize, |start, run| {
            let range = *start..*start + run.len;
            *start = range.end;
            Some((range, run.attrs))
        })
    }

    pub fn paragraph_count(&self) -> usize {
        self.alignments.len()
    }

    pub fn alignments(&self) -> &[Alignment] {
        &self.alignments
    }

    pub fn alignment_of(&self, paragraph: usize) -> Option<Alignment> {
        self.alignments.get(paragraph).copied()
    }

    /// Byte range of each paragraph, excluding its terminating line break
    pub fn paragraph_ranges(&self) -> Vec<Range<usize>> {
        let text = self.text();
        let mut ranges = Vec::with_capacity(self.alignments.len());
        let mut start = 0;
        for (offset, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                ranges.push(start..offset);
                start = offset + 1;
            }
        }
        ranges.push(start..text.len());
        ranges
    }

    /// Attributes of the character starting at `position`.
    ///
    /// At the end of the buffer this is the last character's tuple, in an
    /// empty buffer the default tuple.
    pub fn attributes_at(&self, position: usize) -> Attributes {
        let position = self.clamp(position);
        if position == self.len() {
            return self.inherited_at(position);
        }
        self.char_attrs(position)
    }

    /// Attributes that text inserted at `position` takes on: those of the
    /// preceding character, or the default at the start of the buffer.
    pub fn inherited_at(&self, position: usize) -> Attributes {
        let position = self.clamp(position);
        if position == 0 {
            return Attributes::default();
        }
        self.char_attrs(self.text.prev_codepoint_offset(position).unwrap_or(0))
    }

    pub fn insert_text(&mut self, position: usize, text: &str) {
        let attrs = self.inherited_at(position);
        self.insert_styled(position, text, attrs);
    }

    /// Insert `text` carrying `attrs` regardless of its neighbours
    pub fn insert_styled(&mut self, position: usize, text: &str, attrs: Attributes) {
        if text.is_empty() {
            return;
        }
        let at = self.clamp(position);
        let line = self.text.line_of_offset(at);
        let breaks = text.matches('\n').count();

        let idx = self.split_at(at);
        self.runs.insert(
            idx,
            Run {
                len: text.len(),
                attrs,
            },
        );
        self.coalesce(idx, idx + 1);
        self.text.edit(at..at, text);

        let alignment = self.alignments[line];
        self.alignments
            .splice(line + 1..line + 1, std::iter::repeat_n(alignment, breaks));

        self.normalize_line_breaks(at, at + text.len());
    }

    /// Remove a byte range; paragraphs joined by a removed line break keep
    /// the first paragraph's alignment.
    pub fn delete(&mut self, range: Range<usize>) {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end).max(start);
        if start == end {
            return;
        }
        let line = self.text.line_of_offset(start);
        let removed_breaks = self.text.slice_to_cow(start..end).matches('\n').count();

        let first = self.split_at(start);
        let last = self.split_at(end);
        self.runs.drain(first..last);
        self.coalesce(first, first);
        self.text.edit(start..end, "");
        self.alignments.drain(line + 1..line + 1 + removed_breaks);

        self.normalize_line_breaks(start, start);
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Apply `update` to every character in `range`.
    ///
    /// Runs are split at the range boundaries, updated whole, then merged
    /// back where neighbours became identical. An empty range is a no-op.
    pub fn set_attributes(&mut self, range: Range<usize>, update: StyleUpdate) {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end).max(start);
        if start == end {
            return;
        }
        let first = self.split_at(start);
        let last = self.split_at(end);
        for run in &mut self.runs[first..last] {
            run.attrs = update.apply(run.attrs);
        }
        self.coalesce(first, last);
        self.normalize_line_breaks(start, end);
    }

    /// Align every paragraph from the line holding `range.start` through the
    /// line holding the last selected character.
    pub fn set_paragraph_alignment(&mut self, range: Range<usize>, alignment: Alignment) {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end).max(start);
        let first = self.text.line_of_offset(start);
        let last = if end > start {
            self.text.line_of_offset(end - 1)
        } else {
            first
        };
        for slot in &mut self.alignments[first..=last] {
            *slot = alignment;
        }
    }

    pub fn check_invariants(&self) -> Result<(), String> {
        let total: usize = self.runs.iter().map(|r| r.len).sum();
        if total != self.len() {
            return Err(format!("runs cover {total} bytes, text has {}", self.len()));
        }
        if let Some(idx) = self.runs.iter().position(|r| r.len == 0) {
            return Err(format!("run {idx} is empty"));
        }
        if let Some(idx) = self.runs.windows(2).position(|w| w[0].attrs == w[1].attrs) {
            return Err(format!("runs {idx} and {} are not maximal", idx + 1));
        }
        let text = self.text();
        let paragraphs = text.matches('\n').count() + 1;
        if paragraphs != self.alignments.len() {
            return Err(format!(
                "{paragraphs} paragraphs but {} alignments",
                self.alignments.len()
            ));
        }
        for (offset, _) in text.match_indices('\n') {
            if self.char_attrs(offset) != self.inherited_at(offset) {
                return Err(format!("line break at {offset} does not follow its text"));
            }
        }
        Ok(())
    }

    fn clamp(&self, offset: usize) -> usize {
        let mut offset = offset.min(self.len());
        while offset > 0 && !self.text.is_codepoint_boundary(offset) {
            offset -= 1;
        }
        offset
    }

    fn char_attrs(&self, offset: usize) -> Attributes {
        self.run_spans()
            .find(|(range, _)| range.contains(&offset))
            .map(|(_, attrs)| attrs)
            .unwrap_or_default()
    }

    /// Ensure a run boundary at `offset`; returns the index of the first run
    /// starting at or after it.
    fn split_at(&mut self, offset: usize) -> usize {
        let mut start = 0;
        for idx in 0..self.runs.len() {
            let run = self.runs[idx];
            if offset == start {
                return idx;
            }
            if offset < start + run.len {
                let head = offset - start;
                self.runs[idx].len = head;
                self.runs.insert(
                    idx + 1,
                    Run {
                        len: run.len - head,
                        attrs: run.attrs,
                    },
                );
                return idx + 1;
            }
            start += run.len;
        }
        self.runs.len()
    }

    /// Merge equal neighbours among runs `lo - 1 ..= hi`. Runs outside that
    /// window must already be maximal.
    fn coalesce(&mut self, lo: usize, hi: usize) {
        let lo = lo.saturating_sub(1);
        let hi = (hi + 1).min(self.runs.len());
        if lo >= hi {
            return;
        }
        let mut merged: Vec<Run> = Vec::with_capacity(hi - lo);
        for run in &self.runs[lo..hi] {
            push_run(&mut merged, *run);
        }
        self.runs.splice(lo..hi, merged);
    }

    /// Restyle line breaks in `from..to`, plus the chain of line breaks
    /// directly after `to`, to match the character preceding each one.
    ///
    /// One forward pass over the runs from the character before the first
    /// break through the last break.
    fn normalize_line_breaks(&mut self, from: usize, to: usize) {
        let mut breaks: Vec<usize> = self
            .text
            .slice_to_cow(from..to)
            .match_indices('\n')
            .map(|(offset, _)| from + offset)
            .collect();
        let mut next = to;
        while next < self.len() && self.text.byte_at(next) == b'\n' {
            breaks.push(next);
            next += 1;
        }
        let (Some(&first_break), Some(&last_break)) = (breaks.first(), breaks.last()) else {
            return;
        };

        let anchor = first_break.saturating_sub(1);
        let mut lo = 0;
        let mut lo_start = 0;
        while lo_start + self.runs[lo].len <= anchor {
            lo_start += self.runs[lo].len;
            lo += 1;
        }
        let mut hi = lo;
        let mut hi_end = lo_start + self.runs[lo].len;
        while hi_end <= last_break {
            hi += 1;
            hi_end += self.runs[hi].len;
        }

        let mut rebuilt: Vec<Run> = Vec::with_capacity(hi - lo + 1 + 2 * breaks.len());
        let mut pending = breaks.into_iter().peekable();
        let mut prev = Attributes::default();
        let mut pos = lo_start;
        for run in &self.runs[lo..=hi] {
            let end = pos + run.len;
            while let Some(offset) = pending.next_if(|offset| *offset < end) {
                if offset > pos {
                    push_run(
                        &mut rebuilt,
                        Run {
                            len: offset - pos,
                            attrs: run.attrs,
                        },
                    );
                    prev = run.attrs;
                }
                push_run(
                    &mut rebuilt,
                    Run {
                        len: 1,
                        attrs: prev,
                    },
                );
                pos = offset + 1;
            }
            if end > pos {
                push_run(
                    &mut rebuilt,
                    Run {
                        len: end - pos,
                        attrs: run.attrs,
                    },
                );
                prev = run.attrs;
            }
            pos = end;
        }

        let count = rebuilt.len();
        self.runs.splice(lo..=hi, rebuilt);
        self.coalesce(lo, lo + count);
    }
}

/// Append `run`, extending the last run when the attributes match
fn push_run(runs: &mut Vec<Run>, run: Run) {
    if run.len == 0 {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.attrs == run.attrs => last.len += run.len,
        _ => runs.push(run),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::style::Flag;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn bold() -> Attributes {
        Attributes {
            bold: true,
            ..Default::default()
        }
    }

    fn buffer(text: &str) -> StyleRunBuffer {
        let mut buf = StyleRunBuffer::new();
        buf.insert_text(0, text);
        buf
    }

    #[test]
    fn empty_buffer_has_one_left_paragraph() {
        let buf = StyleRunBuffer::new();

        assert!(buf.is_empty());
        assert!(buf.is_blank());
        assert_eq!(buf.paragraph_count(), 1);
        assert_eq!(buf.alignment_of(0), Some(Alignment::Left));
        assert_eq!(buf.attributes_at(0), Attributes::default());
        buf.check_invariants().unwrap();
    }

    #[test]
    fn insert_inherits_preceding_character() {
        let mut buf = buffer("ab");
        buf.set_attributes(1..2, StyleUpdate::Set(Flag::Bold, true));

        buf.insert_text(2, "cd");

        assert_eq!(buf.text(), "abcd");
        assert_eq!(
            buf.runs(),
            &[
                Run {
                    len: 1,
                    attrs: Attributes::default()
                },
                Run { len: 3, attrs: bold() },
            ]
        );
        buf.check_invariants().unwrap();
    }

    #[test]
    fn insert_at_start_takes_default_style() {
        let mut buf = StyleRunBuffer::new();
        buf.insert_styled(0, "x", bold());

        buf.insert_text(0, "a");

        assert_eq!(buf.attributes_at(0), Attributes::default());
        assert_eq!(buf.attributes_at(1), bold());
        assert_eq!(buf.runs().len(), 2);
    }

    #[test]
    fn insert_past_end_appends() {
        let mut buf = buffer("abc");
        buf.insert_text(99, "!");
        assert_eq!(buf.text(), "abc!");
    }

    #[test]
    fn insert_inside_a_multibyte_char_moves_to_its_start() {
        let mut buf = buffer("é");
        buf.insert_text(1, "x");
        assert_eq!(buf.text(), "xé");
    }

    #[test]
    fn styled_insert_in_the_middle_splits_a_run() {
        let mut buf = buffer("abcd");

        buf.insert_styled(2, "XY", bold());

        assert_eq!(buf.text(), "abXYcd");
        let lens: Vec<usize> = buf.runs().iter().map(|r| r.len).collect();
        assert_eq!(lens, vec![2, 2, 2]);
        buf.check_invariants().unwrap();
    }

    #[test]
    fn identical_neighbours_merge_after_restyle() {
        let mut buf = buffer("abcdef");
        buf.set_attributes(0..2, StyleUpdate::Set(Flag::Bold, true));
        buf.set_attributes(4..6, StyleUpdate::Set(Flag::Bold, true));
        assert_eq!(buf.runs().len(), 3);

        buf.set_attributes(2..4, StyleUpdate::Set(Flag::Bold, true));

        assert_eq!(buf.runs(), &[Run { len: 6, attrs: bold() }]);
    }

    #[test]
    fn toggle_on_mixed_range_flips_each_character() {
        let mut buf = buffer("abcd");
        buf.set_attributes(0..2, StyleUpdate::Set(Flag::Bold, true));

        buf.set_attributes(0..4, StyleUpdate::Toggle(Flag::Bold));

        assert!(!buf.attributes_at(0).bold);
        assert!(!buf.attributes_at(1).bold);
        assert!(buf.attributes_at(2).bold);
        assert!(buf.attributes_at(3).bold);
    }

    #[rstest]
    #[case(0..3)]
    #[case(1..5)]
    #[case(2..9)]
    #[case(4..11)]
    fn toggle_twice_restores_original(#[case] range: Range<usize>) {
        let mut buf = buffer("one\ntwo\nthree");
        buf.set_attributes(1..6, StyleUpdate::Set(Flag::Italic, true));
        buf.set_attributes(3..10, StyleUpdate::Size(20));
        let original = buf.clone();

        buf.set_attributes(range.clone(), StyleUpdate::Toggle(Flag::Bold));
        buf.check_invariants().unwrap();
        buf.set_attributes(range, StyleUpdate::Toggle(Flag::Bold));

        assert_eq!(buf, original);
    }

    #[test]
    fn empty_range_changes_nothing() {
        let mut buf = buffer("abc");
        let before = buf.clone();

        buf.set_attributes(1..1, StyleUpdate::Toggle(Flag::Bold));

        assert_eq!(buf, before);
    }

    #[test]
    fn line_break_follows_the_text_it_ends() {
        let mut buf = buffer("ab\ncd");

        buf.set_attributes(1..2, StyleUpdate::Set(Flag::Bold, true));

        assert!(buf.attributes_at(2).bold);
        assert!(!buf.attributes_at(3).bold);
        buf.check_invariants().unwrap();
    }

    #[test]
    fn styling_only_a_line_break_is_undone() {
        let mut buf = buffer("ab\ncd");
        let before = buf.clone();

        buf.set_attributes(2..3, StyleUpdate::Set(Flag::Underline, true));

        assert_eq!(buf, before);
    }

    #[test]
    fn insert_with_breaks_splits_paragraph_keeping_alignment() {
        let mut buf = buffer("abcd");
        buf.set_paragraph_alignment(0..0, Alignment::Center);

        buf.insert_text(2, "\n\n");

        assert_eq!(buf.text(), "ab\n\ncd");
        assert_eq!(buf.alignments(), &[Alignment::Center; 3]);
        assert_eq!(buf.paragraph_ranges(), vec![0..2, 3..3, 4..6]);
        buf.check_invariants().unwrap();
    }

    #[test]
    fn alignment_spans_start_line_through_end_line() {
        let mut buf = buffer("a\nb\nc\nd");

        buf.set_paragraph_alignment(2..5, Alignment::Right);

        assert_eq!(
            buf.alignments(),
            &[
                Alignment::Left,
                Alignment::Right,
                Alignment::Right,
                Alignment::Left
            ]
        );
    }

    #[test]
    fn selection_ending_after_a_break_stays_on_its_line() {
        let mut buf = buffer("ab\ncd");

        buf.set_paragraph_alignment(0..3, Alignment::Center);

        assert_eq!(buf.alignments(), &[Alignment::Center, Alignment::Left]);
    }

    #[test]
    fn delete_joins_paragraphs_keeping_first_alignment() {
        let mut buf = buffer("ab\ncd\nef");
        buf.set_paragraph_alignment(0..1, Alignment::Right);
        buf.set_paragraph_alignment(3..4, Alignment::Center);

        buf.delete(1..4);

        assert_eq!(buf.text(), "ad\nef");
        assert_eq!(buf.alignments(), &[Alignment::Right, Alignment::Left]);
        buf.check_invariants().unwrap();
    }

    #[test]
    fn delete_restyles_a_break_that_gains_a_new_predecessor() {
        let mut buf = buffer("ab\ncd");
        buf.set_attributes(0..1, StyleUpdate::Set(Flag::Bold, true));

        buf.delete(1..2);

        assert_eq!(buf.text(), "a\ncd");
        assert!(buf.attributes_at(1).bold);
        buf.check_invariants().unwrap();
    }

    #[test]
    fn delete_everything_leaves_an_empty_buffer() {
        let mut buf = buffer("ab\ncd");
        buf.delete(0..100);

        assert!(buf.is_empty());
        assert!(buf.runs().is_empty());
        assert_eq!(buf.paragraph_count(), 1);
    }

    #[test]
    fn whitespace_only_buffer_is_blank() {
        let buf = buffer("  \n\t ");
        assert!(buf.is_blank());
        assert!(!buf.is_empty());
    }

    #[test]
    fn attributes_at_end_report_last_character() {
        let mut buf = StyleRunBuffer::new();
        buf.insert_styled(0, "xy", bold());

        assert_eq!(buf.attributes_at(2), bold());
        assert_eq!(buf.inherited_at(2), bold());
        assert_eq!(buf.inherited_at(0), Attributes::default());
    }

    #[test]
    fn restyle_carries_a_chain_of_breaks() {
        let mut buf = buffer("ab\n\n\ncd");

        buf.set_attributes(0..2, StyleUpdate::Set(Flag::Bold, true));

        assert_eq!(
            buf.runs(),
            &[
                Run { len: 5, attrs: bold() },
                Run {
                    len: 2,
                    attrs: Attributes::default()
                },
            ]
        );
        buf.check_invariants().unwrap();
    }

    #[test]
    fn restyling_many_paragraphs_keeps_runs_maximal() {
        let mut buf = buffer(&"ab\n".repeat(200));
        for start in (0..buf.len()).step_by(6) {
            buf.set_attributes(start..start + 2, StyleUpdate::Toggle(Flag::Italic));
        }
        buf.check_invariants().unwrap();

        buf.set_attributes(0..buf.len(), StyleUpdate::Set(Flag::Bold, true));
        buf.set_attributes(0..buf.len(), StyleUpdate::Set(Flag::Italic, false));
        assert_eq!(buf.runs(), &[Run { len: 600, attrs: bold() }]);

        buf.set_attributes(0..1, StyleUpdate::Set(Flag::Bold, false));
        assert_eq!(buf.runs().len(), 2);
        buf.check_invariants().unwrap();
    }

    #[test]
    fn from_paragraphs_matches_an_incremental_build() {
        let italic = Attributes {
            italic: true,
            ..Default::default()
        };
        let built = StyleRunBuffer::from_paragraphs([
            (
                Alignment::Center,
                vec![("Ti", bold()), ("tle", Attributes::default())],
            ),
            (Alignment::Left, vec![]),
            (Alignment::Right, vec![("x\ny", italic), ("", bold())]),
        ]);

        let mut expected = StyleRunBuffer::new();
        expected.insert_styled(0, "Ti", bold());
        expected.insert_styled(2, "tle", Attributes::default());
        expected.insert_text(5, "\n\n");
        expected.insert_styled(7, "x\ny", italic);
        expected.set_paragraph_alignment(0..0, Alignment::Center);
        expected.set_paragraph_alignment(7..10, Alignment::Right);

        assert_eq!(built, expected);
        assert_eq!(
            built.alignments(),
            &[
                Alignment::Center,
                Alignment::Left,
                Alignment::Right,
                Alignment::Right
            ]
        );
        built.check_invariants().unwrap();
    }

    #[test]
    fn from_no_paragraphs_is_an_empty_buffer() {
        let paragraphs: Vec<(Alignment, Vec<(&str, Attributes)>)> = Vec::new();
        let built = StyleRunBuffer::from_paragraphs(paragraphs);
        assert_eq!(built, StyleRunBuffer::new());
    }
}
