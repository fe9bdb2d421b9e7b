//! Run normalization: merging adjacent runs that carry identical formatting.
//!
//! A placeholder can only match inside a single run. Editors often split text
//! into several runs with the same style (spell-check marks, revision ids), so
//! templates are commonly normalized once before rendering.

use crate::document::{Block, Document, Paragraph, Run};

impl Document {
    /// Merge adjacent same-style runs in every paragraph of every story.
    /// Returns the number of runs removed.
    pub fn normalize_runs(&mut self) -> usize {
        let mut merged = normalize_blocks(&mut self.body);
        for story in self.headers.iter_mut().chain(self.footers.iter_mut()) {
            merged += normalize_blocks(story);
        }
        tracing::debug!(merged, "normalized runs");
        merged
    }
}

impl Paragraph {
    /// Merge adjacent runs with identical style. Empty runs are dropped.
    pub fn normalize_runs(&mut self) -> usize {
        let before = self.runs.len();
        let mut runs: Vec<Run> = Vec::with_capacity(before);
        for run in self.runs.drain(..) {
            if run.text().is_empty() {
                continue;
            }
            match runs.last_mut() {
                Some(last) if last.style == run.style => last.push_str(run.text()),
                _ => runs.push(run),
            }
        }
        self.runs = runs;
        before - self.runs.len()
    }
}

fn normalize_blocks(blocks: &mut [Block]) -> usize {
    let mut merged = 0;
    for block in blocks {
        match block {
            Block::Paragraph(p) => merged += p.normalize_runs(),
            Block::Table(t) => {
                for cell in t.rows.iter_mut().flat_map(|r| r.cells.iter_mut()) {
                    merged += normalize_blocks(&mut cell.blocks);
                }
            }
        }
    }
    merged
}
