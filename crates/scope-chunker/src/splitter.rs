//! Line-window splitting for spans without usable structure.
//!
//! A span is cut at line starts only, and never at a line start that falls
//! inside a multi-line string literal. The pieces between two allowed cut
//! points are atomic units; windows pack whole units greedily up to the
//! budget and repeat a few trailing lines of the previous window as
//! overlap.

use crate::error::Degradation;
use crate::scanner::ScanOutput;
use crate::source::{line_breaks, SizeIndex};
use std::ops::Range;

/// One window of a split span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    /// Overlap included
    pub range: Range<usize>,
    /// First byte not carried by the previous window
    pub primary_start: usize,
    /// A single atomic unit larger than the budget
    pub oversized: bool,
}

impl Window {
    /// Bytes repeated from the previous window
    #[must_use]
    pub fn overlap(&self) -> Range<usize> {
        self.range.start..self.primary_start
    }
}

/// Budget and overlap for one split
#[derive(Debug, Clone, Copy)]
pub struct SplitLimits {
    pub max_size: usize,
    /// Overlap length in lines
    pub overlap_lines: usize,
}

#[derive(Debug, Clone)]
struct Unit {
    range: Range<usize>,
    size: usize,
    lines: usize,
}

/// Line-window splitter over one file
pub struct FallbackSplitter<'a> {
    text: &'a str,
    scan: &'a ScanOutput,
    sizes: &'a SizeIndex,
    limits: SplitLimits,
}

impl<'a> FallbackSplitter<'a> {
    pub fn new(
        text: &'a str,
        scan: &'a ScanOutput,
        sizes: &'a SizeIndex,
        limits: SplitLimits,
    ) -> Self {
        Self {
            text,
            scan,
            sizes,
            limits,
        }
    }

    /// Split `span` into windows whose primary ranges partition it exactly
    pub fn split(&self, span: Range<usize>) -> (Vec<Window>, Vec<Degradation>) {
        let units = self.units(span);
        let budget = self.limits.max_size;
        let mut windows = Vec::new();
        let mut degradations = Vec::new();

        // Units of the previous window that were not overlap
        let mut primary_from = 0;
        let mut next = 0;
        while next < units.len() {
            let mut overlap = self.overlap_units(&units[primary_from..next], units[next].size);
            let overlap_size: usize = units[next - overlap..next].iter().map(|u| u.size).sum();

            let mut size = overlap_size;
            let mut end = next;
            while end < units.len() && size + units[end].size <= budget {
                size += units[end].size;
                end += 1;
            }

            let oversized = end == next;
            if oversized {
                // A unit that cannot fit even alone.
                overlap = 0;
                end = next + 1;
                let unit = &units[next];
                log::debug!(
                    "Atomic unit at bytes {}..{} exceeds budget ({} > {budget})",
                    unit.range.start,
                    unit.range.end,
                    unit.size
                );
                degradations.push(Degradation::OversizedAtomicUnit {
                    start: unit.range.start,
                    end: unit.range.end,
                });
            }

            windows.push(Window {
                range: units[next - overlap].range.start..units[end - 1].range.end,
                primary_start: units[next].range.start,
                oversized,
            });
            primary_from = next;
            next = end;
        }

        (windows, degradations)
    }

    /// How many trailing units of `previous` to repeat before a unit of `next_size`
    fn overlap_units(&self, previous: &[Unit], next_size: usize) -> usize {
        let budget = self.limits.max_size;
        let mut count = 0;
        let mut lines = 0;
        let mut size = 0;
        for unit in previous.iter().rev() {
            if lines + unit.lines > self.limits.overlap_lines {
                break;
            }
            lines += unit.lines;
            size += unit.size;
            count += 1;
        }

        // Shrink until the overlap is under half the budget and the next unit fits.
        let mut dropped = previous.len() - count;
        while count > 0 && (size * 2 >= budget || size + next_size > budget) {
            size -= previous[dropped].size;
            dropped += 1;
            count -= 1;
        }
        count
    }

    /// Atomic units: line runs between cut points outside literals
    fn units(&self, span: Range<usize>) -> Vec<Unit> {
        let mut cuts: Vec<usize> = line_breaks(self.text, span.start, span.end)
            .filter(|&pos| !self.scan.inside_literal(pos))
            .collect();
        cuts.push(span.end);

        let mut units = Vec::with_capacity(cuts.len());
        let mut start = span.start;
        for end in cuts {
            if end <= start {
                continue;
            }
            let breaks = line_breaks(self.text, start, end).count();
            let lines = breaks + 1;
            units.push(Unit {
                range: start..end,
                size: self.sizes.size(start..end),
                lines,
            });
            start = end;
        }
        units
    }
}
