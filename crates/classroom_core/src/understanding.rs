//! crates/classroom_core/src/understanding.rs
//!
//! Derived views over the understanding check: the live tally, who has not
//! answered yet, and per-actor tap counts.

use crate::domain::{Color, Role, UnderstandingEvent, UnderstandingSummary};
use std::collections::{HashMap, HashSet};

/// Counts of each colour among the current summary rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub red: usize,
    pub yellow: usize,
    pub green: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.red + self.yellow + self.green
    }

    pub fn count(&self, color: Color) -> usize {
        match color {
            Color::Red => self.red,
            Color::Yellow => self.yellow,
            Color::Green => self.green,
        }
    }

    /// Share of `color` in percent, 0 when nobody has answered.
    pub fn percent(&self, color: Color) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.count(color) as f64 * 100.0 / total as f64
    }

    fn add(&mut self, color: Color) {
        match color {
            Color::Red => self.red += 1,
            Color::Yellow => self.yellow += 1,
            Color::Green => self.green += 1,
        }
    }
}

/// Built from summary rows only, so each actor counts once however often they tapped.
pub fn tally(summaries: &[UnderstandingSummary]) -> Tally {
    let mut tally = Tally::default();
    for summary in summaries {
        tally.add(summary.color);
    }
    tally
}

/// Roster names with no summary row, in roster order.
pub fn missing_students(roster: &[String], summaries: &[UnderstandingSummary]) -> Vec<String> {
    let answered: HashSet<&str> = summaries.iter().map(|s| s.actor.as_str()).collect();
    roster
        .iter()
        .filter(|name| !answered.contains(name.as_str()))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorHistory {
    pub actor: String,
    pub role: Role,
    pub taps: Tally,
}

/// Every tap per actor, busiest actors first.
pub fn actor_histories(events: &[UnderstandingEvent]) -> Vec<ActorHistory> {
    let mut by_actor: HashMap<(&str, Role), Tally> = HashMap::new();
    for event in events {
        by_actor
            .entry((event.actor.as_str(), event.role))
            .or_default()
            .add(event.to_color);
    }
    let mut histories: Vec<ActorHistory> = by_actor
        .into_iter()
        .map(|((actor, role), taps)| ActorHistory {
            actor: actor.to_string(),
            role,
            taps,
        })
        .collect();
    histories.sort_by(|a, b| {
        b.taps
            .total()
            .cmp(&a.taps.total())
            .then_with(|| a.actor.cmp(&b.actor))
    });
    histories
}
