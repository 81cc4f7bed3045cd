/*!
 * # Editing Core Module
 *
 * The styled-text model behind the editor. The shell never touches text or
 * formatting directly; it calls the operations here and reads back runs,
 * paragraphs and fingerprints.
 *
 * ## Architecture Overview
 *
 * ### 1. Text in a rope, formatting in runs
 * - Text lives in an **`xi_rope::Rope`**, addressed by byte offsets
 * - Formatting is an ordered list of **runs** `(len, Attributes)` that
 *   partition the text exactly; adjacent runs always differ
 * - Restyling splits runs at the range boundaries, updates whole runs and
 *   merges neighbours back, so work is proportional to runs touched rather
 *   than characters
 *
 * ### 2. Paragraphs
 * - Line breaks are ordinary characters that end a paragraph
 * - Each paragraph carries one `Alignment`
 * - A line break always carries the formatting of the text it ends
 *
 * ### 3. Fingerprints
 * - `Fingerprint::snapshot` turns a buffer into a canonical list of text
 *   and tag on/off events
 * - Two buffers with the same text, formatting and alignment have equal
 *   fingerprints however they were edited
 *
 * ## Usage Pattern
 *
 * ```rust
 * use quillsafe_engine::editing::*;
 *
 * let mut buffer = StyleRunBuffer::new();
 * buffer.insert_text(0, "Hello world");
 * buffer.set_attributes(0..5, StyleUpdate::Toggle(Flag::Bold));
 * buffer.set_paragraph_alignment(0..0, Alignment::Center);
 *
 * let before = Fingerprint::snapshot(&buffer);
 * buffer.set_attributes(0..5, StyleUpdate::Toggle(Flag::Bold));
 * buffer.set_attributes(0..5, StyleUpdate::Toggle(Flag::Bold));
 * assert!(before.equals(&Fingerprint::snapshot(&buffer)));
 * ```
 */

pub mod buffer;
pub mod fingerprint;
pub mod style;

pub use buffer::{Run, StyleRunBuffer};
pub use fingerprint::{Fingerprint, FingerprintEvent, Tag};
pub use style::{
    Alignment, Attributes, CompositeStyle, DEFAULT_SIZE, Flag, StyleUpdate, round_points,
};
