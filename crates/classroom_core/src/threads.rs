//! crates/classroom_core/src/threads.rs
//!
//! Groups a day's posts into root questions with their replies.

use crate::domain::Question;
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Thread {
    pub root: Question,
    /// Every descendant of the root, oldest first.
    pub replies: Vec<Question>,
}

/// Follows `reply_to` links up to the root. `None` if the chain is broken or cyclic.
fn root_of(id: Uuid, parents: &HashMap<Uuid, Option<Uuid>>) -> Option<Uuid> {
    let mut current = id;
    for _ in 0..=parents.len() {
        match parents.get(&current)? {
            None => return Some(current),
            Some(parent) => current = *parent,
        }
    }
    None
}

/// Roots in creation order, each with its replies. Replies that do not lead
/// back to a root in `questions` are left out.
pub fn build_threads(questions: &[Question]) -> Vec<Thread> {
    let parents: HashMap<Uuid, Option<Uuid>> =
        questions.iter().map(|q| (q.id, q.reply_to)).collect();

    let mut roots: Vec<Question> = questions.iter().filter(|q| q.is_root()).cloned().collect();
    roots.sort_by_key(|q| (q.created_at, q.id));

    let mut replies_by_root: HashMap<Uuid, Vec<Question>> = HashMap::new();
    for reply in questions.iter().filter(|q| !q.is_root()) {
        if let Some(root) = root_of(reply.id, &parents) {
            replies_by_root.entry(root).or_default().push(reply.clone());
        }
    }

    roots
        .into_iter()
        .map(|root| {
            let mut replies = replies_by_root.remove(&root.id).unwrap_or_default();
            replies.sort_by_key(|q| (q.created_at, q.id));
            Thread { root, replies }
        })
        .collect()
}

/// `root` and every post below it, in no particular order.
pub fn descendants(root: Uuid, questions: &[Question]) -> Vec<Uuid> {
    let mut found = vec![root];
    let mut frontier = vec![root];
    while let Some(parent) = frontier.pop() {
        for child in questions.iter().filter(|q| q.reply_to == Some(parent)) {
            if !found.contains(&child.id) {
                found.push(child.id);
                frontier.push(child.id);
            }
        }
    }
    found
}
