//! Group keyword watch and the per-user message window used for summaries.

use std::collections::{HashMap, VecDeque};

use crate::domain::UserId;

#[derive(Clone, Debug)]
pub struct KeywordWatch {
    keywords: Vec<String>,
    lowered: Vec<String>,
}

impl KeywordWatch {
    pub fn new(keywords: Vec<String>) -> Self {
        let lowered = keywords.iter().map(|k| k.to_lowercase()).collect();
        Self { keywords, lowered }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Case-insensitive substring match against any keyword.
    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }

    pub fn first_match(&self, text: &str) -> Option<&str> {
        let haystack = text.to_lowercase();
        self.lowered
            .iter()
            .position(|k| haystack.contains(k.as_str()))
            .map(|i| self.keywords[i].as_str())
    }
}

/// Default cap on users with a retained window.
pub const MAX_TRACKED_USERS: usize = 10_000;

#[derive(Debug, Default)]
struct Window {
    last_push: u64,
    messages: VecDeque<String>,
}

/// Last `limit` keyword-triggering messages per user, oldest first.
///
/// At most `max_users` windows are kept; the least recently updated one is
/// dropped to make room for a new user.
#[derive(Debug)]
pub struct RecentMessages {
    limit: usize,
    max_users: usize,
    tick: u64,
    by_user: HashMap<UserId, Window>,
}

impl RecentMessages {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            max_users: MAX_TRACKED_USERS,
            tick: 0,
            by_user: HashMap::new(),
        }
    }

    pub fn with_max_users(mut self, max_users: usize) -> Self {
        self.max_users = max_users.max(1);
        self
    }

    /// Record `text` and return the retained window.
    pub fn push(&mut self, user_id: UserId, text: &str) -> Vec<String> {
        if !self.by_user.contains_key(&user_id) && self.by_user.len() >= self.max_users {
            self.evict_stalest();
        }

        self.tick += 1;
        let window = self.by_user.entry(user_id).or_default();
        window.last_push = self.tick;
        window.messages.push_back(text.to_string());
        while window.messages.len() > self.limit {
            window.messages.pop_front();
        }
        window.messages.iter().cloned().collect()
    }

    fn evict_stalest(&mut self) {
        let stalest = self
            .by_user
            .iter()
            .min_by_key(|(_, w)| w.last_push)
            .map(|(id, _)| *id);
        if let Some(id) = stalest {
            self.by_user.remove(&id);
        }
    }

    pub fn tracked_users(&self) -> usize {
        self.by_user.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watch(words: &[&str]) -> KeywordWatch {
        KeywordWatch::new(words.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn matches_case_insensitively() {
        let w = watch(&["Netflix", "合租"]);
        assert!(w.matches("anyone sharing NETFLIX?"));
        assert!(w.matches("找人合租一个账号"));
        assert_eq!(w.first_match("netflix please"), Some("Netflix"));
        assert!(!w.matches("hello world"));
    }

    #[test]
    fn empty_watch_never_matches() {
        assert!(!watch(&[]).matches("anything"));
    }

    #[test]
    fn window_keeps_latest_messages_per_user() {
        let mut recent = RecentMessages::new(3);
        for i in 0..5 {
            recent.push(UserId(1), &format!("m{i}"));
        }
        let other = recent.push(UserId(2), "x");
        assert_eq!(other, vec!["x".to_string()]);

        let w = recent.push(UserId(1), "m5");
        assert_eq!(w, vec!["m3", "m4", "m5"]);
        assert_eq!(recent.tracked_users(), 2);
    }

    #[test]
    fn least_recently_active_user_is_dropped_at_capacity() {
        let mut recent = RecentMessages::new(3).with_max_users(2);
        recent.push(UserId(1), "a1");
        recent.push(UserId(2), "b1");
        recent.push(UserId(1), "a2");

        recent.push(UserId(3), "c1");
        assert_eq!(recent.tracked_users(), 2);

        assert_eq!(recent.push(UserId(1), "a3"), vec!["a1", "a2", "a3"]);
        assert_eq!(recent.push(UserId(2), "b2"), vec!["b2"]);
    }
}
