//! # Transcript
//!
//! Append-only turn history with a bounded size. Once the number of turns
//! exceeds the compaction threshold, everything older than the most recent
//! turns is replaced by one synthetic summary turn carrying topic tags.
//! Compaction is lossy and only runs between user turns.

use crate::config::TranscriptSettings;
use crate::constants::{DEFAULT_COMPACT_THRESHOLD, DEFAULT_KEEP_RECENT, MAX_SUMMARY_TOPICS};
use crate::domain::{Role, Turn, TurnContent};
use std::collections::HashMap;
use tracing::info;

const STOPWORDS: &[&str] = &[
    "about", "after", "again", "also", "been", "before", "being", "could", "does", "done",
    "each", "from", "have", "here", "into", "just", "like", "make", "many", "more", "most",
    "much", "must", "only", "other", "over", "please", "same", "should", "some", "such",
    "than", "that", "their", "them", "then", "there", "these", "they", "this", "those",
    "very", "want", "were", "what", "when", "where", "which", "while", "will", "with",
    "would", "your", "true", "false", "null",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptPolicy {
    /// Compaction runs once the transcript holds more turns than this.
    pub compact_threshold: usize,
    /// Minimum number of most recent turns kept verbatim.
    pub keep_recent: usize,
}

impl Default for TranscriptPolicy {
    fn default() -> Self {
        Self {
            compact_threshold: DEFAULT_COMPACT_THRESHOLD,
            keep_recent: DEFAULT_KEEP_RECENT,
        }
    }
}

impl From<TranscriptSettings> for TranscriptPolicy {
    fn from(settings: TranscriptSettings) -> Self {
        Self {
            compact_threshold: settings.compact_threshold,
            keep_recent: settings.keep_recent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compaction {
    /// Logical turns now represented by the summary.
    pub evicted: usize,
    pub topics: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    policy: TranscriptPolicy,
}

impl Transcript {
    pub fn new(policy: TranscriptPolicy) -> Self {
        Self {
            turns: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> TranscriptPolicy {
        self.policy
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Append a batch of turns produced by one completed user turn.
    pub fn commit(&mut self, turns: Vec<Turn>) {
        self.turns.extend(turns);
    }

    /// The turns sent to the model, oldest first.
    pub fn windowed(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn needs_compaction(&self) -> bool {
        self.turns.len() > self.policy.compact_threshold
    }

    /// Replace the prefix older than the kept window with one summary turn.
    ///
    /// The window holds at least `keep_recent` turns and is widened so it
    /// never opens on a tool turn, keeping each tool result next to the
    /// assistant turn that requested it. Returns `None` when nothing was
    /// evicted.
    pub fn compact(&mut self) -> Option<Compaction> {
        if !self.needs_compaction() {
            return None;
        }

        // the newest turn is always kept
        let keep = self.policy.keep_recent.max(1);
        let mut split = self.turns.len().saturating_sub(keep);
        while split > 0 && split < self.turns.len() && self.turns[split].role == Role::Tool {
            split -= 1;
        }
        if split == 0 || (split == 1 && self.turns[0].is_summary()) {
            return None;
        }

        let kept = self.turns.split_off(split);
        let evicted_turns = std::mem::replace(&mut self.turns, kept);

        let evicted = evicted_turns
            .iter()
            .map(|turn| match &turn.content {
                TurnContent::Summary { evicted, .. } => *evicted,
                _ => 1,
            })
            .sum();
        let topics = topic_tags(&evicted_turns, MAX_SUMMARY_TOPICS);

        info!(
            evicted,
            kept = self.turns.len(),
            topics = topics.len(),
            "Compacted transcript"
        );
        self.turns
            .insert(0, Turn::summary(evicted, topics.clone()));
        Some(Compaction { evicted, topics })
    }
}

/// Keyword tags for a run of turns: lowercase alphabetic words of at least
/// four letters that are not stopwords, most frequent first, ties broken by
/// first appearance.
pub fn topic_tags(turns: &[Turn], limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;
    for turn in turns {
        let text = turn.searchable_text().to_lowercase();
        for word in text.split(|c: char| !c.is_alphabetic()) {
            if word.chars().count() < 4 || STOPWORDS.contains(&word) {
                continue;
            }
            let entry = counts.entry(word.to_string()).or_insert((0, order));
            entry.0 += 1;
            order += 1;
        }
    }

    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(word, _, _)| word)
        .collect()
}
