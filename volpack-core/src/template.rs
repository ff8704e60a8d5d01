//! Structured unpack-script templates.
//!
//! A template is parsed once into literal segments and named slots. Both
//! slots must occur exactly once, so a malformed template is rejected at
//! parse time instead of rendering with a placeholder left in it.

use crate::error::{PackError, Result};
use std::fmt::Write as _;
use std::path::Path;

/// Marker for the per-volume record block. The whole line holding it is
/// replaced, so it can sit inside a comment of the script language.
pub const VOLUME_TABLE_MARKER: &str = "@@VOLUME_TABLE@@";
/// Marker for the inclusive upper loop bound (`volume count - 1`).
pub const LAST_INDEX_MARKER: &str = "@@LAST_INDEX@@";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Slot {
    VolumeTable,
    LastIndex,
}

impl Slot {
    fn marker(self) -> &'static str {
        match self {
            Slot::VolumeTable => VOLUME_TABLE_MARKER,
            Slot::LastIndex => LAST_INDEX_MARKER,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Slot(Slot),
}

/// Values substituted into a template's slots.
#[derive(Clone, Debug, Default)]
pub struct SlotValues {
    /// Rendered record lines, each terminated by a newline.
    pub volume_table: String,
    pub last_index: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

fn find_unique(src: &str, slot: Slot) -> Result<usize> {
    let marker = slot.marker();
    let mut hits = src.match_indices(marker).map(|(i, _)| i);
    let Some(first) = hits.next() else {
        return Err(PackError::generation(format!("template has no {} placeholder", marker)));
    };
    if hits.next().is_some() {
        return Err(PackError::generation(format!(
            "template has more than one {} placeholder",
            marker
        )));
    }
    Ok(first)
}

impl Template {
    pub fn parse(src: &str) -> Result<Self> {
        let table_at = find_unique(src, Slot::VolumeTable)?;
        let line_start = src[..table_at].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = src[table_at..].find('\n').map(|i| table_at + i + 1).unwrap_or(src.len());

        let bound_at = find_unique(src, Slot::LastIndex)?;
        if (line_start..line_end).contains(&bound_at) {
            return Err(PackError::generation(format!(
                "{} placeholder shares a line with {}",
                LAST_INDEX_MARKER, VOLUME_TABLE_MARKER
            )));
        }
        let bound_end = bound_at + LAST_INDEX_MARKER.len();

        let mut spans = [
            (line_start, line_end, Slot::VolumeTable),
            (bound_at, bound_end, Slot::LastIndex),
        ];
        spans.sort_by_key(|s| s.0);

        let mut segments = Vec::with_capacity(5);
        let mut cur = 0usize;
        for (start, end, slot) in spans {
            if start > cur {
                segments.push(Segment::Literal(src[cur..start].to_string()));
            }
            segments.push(Segment::Slot(slot));
            cur = end;
        }
        if cur < src.len() {
            segments.push(Segment::Literal(src[cur..].to_string()));
        }
        Ok(Self { segments })
    }

    /// Read and parse a template file.
    pub fn load(path: &Path) -> Result<Self> {
        let src = std::fs::read_to_string(path).map_err(|e| {
            PackError::generation(format!("cannot read template {}: {}", path.display(), e))
        })?;
        Self::parse(&src)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn render(&self, values: &SlotValues) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Slot(Slot::VolumeTable) => out.push_str(&values.volume_table),
                Segment::Slot(Slot::LastIndex) => {
                    let _ = write!(out, "{}", values.last_index);
                }
            }
        }
        out
    }
}
