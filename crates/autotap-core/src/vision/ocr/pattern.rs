//! Text patterns and named string predicates.
//!
//! Predicates built through [`PredicateCache`] are memoized: asking twice for
//! `contains("OK")` returns the same [`StringMatcher`], so their names stay
//! stable in logs and building them inside a polling loop costs nothing.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use regex::Regex;

use crate::error::{Error, Result};

type MatchFn = dyn Fn(&str) -> bool + Send + Sync;

/// A named boolean predicate over recognized text.
#[derive(Clone)]
pub struct StringMatcher {
    name: Arc<str>,
    func: Arc<MatchFn>,
}

impl StringMatcher {
    pub fn new(name: impl Into<String>, func: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// [`similarity`] to `text` strictly above `ratio` (0 to 100).
    pub fn fuzz(text: &str, ratio: f64) -> Self {
        let target = text.to_string();
        Self::new(format!("fuzz('{}')", text), move |s| {
            f64::from(similarity(&target, s)) > ratio
        })
    }

    /// Regex match anchored at the start of the text.
    pub fn regex(pattern: &str) -> Result<Self> {
        let re = anchored(pattern)?;
        Ok(Self::new(format!("regex('{}')", pattern), move |s| {
            re.is_match(s)
        }))
    }

    pub fn contains(text: &str) -> Self {
        let needle = text.to_string();
        Self::new(format!("contains('{}')", text), move |s| s.contains(&needle))
    }

    pub fn equals(text: &str, options: EqualsOptions) -> Self {
        let target = options.fold(text);
        Self::new(format!("equals('{}')", text), move |s| {
            options.fold(s) == target
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        (self.func)(text)
    }

    #[must_use]
    pub fn same_as(&self, other: &StringMatcher) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StringMatcher({})", self.name)
    }
}

impl fmt::Display for StringMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Normalization applied by [`StringMatcher::equals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EqualsOptions {
    pub ignore_case: bool,
    /// Drop ASCII and ideographic spaces before comparing.
    pub remove_space: bool,
}

impl Default for EqualsOptions {
    fn default() -> Self {
        Self {
            ignore_case: true,
            remove_space: false,
        }
    }
}

impl EqualsOptions {
    fn fold(&self, text: &str) -> String {
        let text: String = if self.remove_space {
            text.chars().filter(|c| *c != ' ' && *c != '\u{3000}').collect()
        } else {
            text.to_string()
        };
        if self.ignore_case {
            text.to_lowercase()
        } else {
            text
        }
    }
}

/// Indel similarity of two strings as a whole percentage.
///
/// `2 * LCS / (len(a) + len(b)) * 100` over chars, rounded half to even.
/// Either string empty scores 0.
#[must_use]
pub fn similarity(a: &str, b: &str) -> u32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let total = a.len() + b.len();
    let lcs = longest_common_subsequence(&a, &b);
    (200.0 * lcs as f64 / total as f64).round_ties_even() as u32
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let mut row = vec![0usize; b.len() + 1];
    for ca in a {
        let mut diagonal = 0;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == cb {
                diagonal + 1
            } else {
                above.max(row[j])
            };
            diagonal = above;
        }
    }
    row[b.len()]
}

/// Compile `pattern` so it only matches at the start of the haystack.
fn anchored(pattern: &str) -> Result<Regex> {
    Regex::new(&format!(r"\A(?:{})", pattern))
        .map_err(|e| Error::invalid_input(format!("invalid regex '{}': {}", pattern, e)))
}

/// What a text search looks for.
#[derive(Debug, Clone)]
pub enum TextPattern {
    /// Whole-string equality.
    Exact(String),
    /// Regex match anchored at the start.
    Regex(Regex),
    Matcher(StringMatcher),
}

impl TextPattern {
    /// Compile a regex pattern with start anchoring.
    pub fn regex(pattern: &str) -> Result<Self> {
        Ok(TextPattern::Regex(anchored(pattern)?))
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            TextPattern::Exact(expected) => text == expected,
            TextPattern::Regex(re) => re
                .find(text)
                .is_some_and(|m| m.start() == 0),
            TextPattern::Matcher(matcher) => matcher.matches(text),
        }
    }
}

impl fmt::Display for TextPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TextPattern::Exact(text) => write!(f, "'{}'", text),
            TextPattern::Regex(re) => write!(f, "regex('{}')", re.as_str()),
            TextPattern::Matcher(matcher) => write!(f, "{}", matcher.name()),
        }
    }
}

impl From<&str> for TextPattern {
    fn from(text: &str) -> Self {
        TextPattern::Exact(text.to_string())
    }
}

impl From<String> for TextPattern {
    fn from(text: String) -> Self {
        TextPattern::Exact(text)
    }
}

impl From<Regex> for TextPattern {
    fn from(re: Regex) -> Self {
        TextPattern::Regex(re)
    }
}

impl From<StringMatcher> for TextPattern {
    fn from(matcher: StringMatcher) -> Self {
        TextPattern::Matcher(matcher)
    }
}

impl From<&StringMatcher> for TextPattern {
    fn from(matcher: &StringMatcher) -> Self {
        TextPattern::Matcher(matcher.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PredicateKey {
    Fuzz(String, u64),
    Regex(String),
    Contains(String),
    Equals(String, EqualsOptions),
}

#[derive(Default)]
struct LruState {
    entries: HashMap<PredicateKey, (StringMatcher, u64)>,
    clock: u64,
}

/// Bounded, least-recently-used memo of predicate constructors.
pub struct PredicateCache {
    capacity: usize,
    fuzzy_ratio: f64,
    state: Mutex<LruState>,
}

impl PredicateCache {
    /// `capacity` is clamped to at least one entry.
    pub fn new(capacity: usize, fuzzy_ratio: f64) -> Self {
        Self {
            capacity: capacity.max(1),
            fuzzy_ratio,
            state: Mutex::new(LruState::default()),
        }
    }

    /// Fuzzy match using the configured similarity ratio.
    pub fn fuzz(&self, text: &str) -> StringMatcher {
        self.fuzz_with_ratio(text, self.fuzzy_ratio)
    }

    pub fn fuzz_with_ratio(&self, text: &str, ratio: f64) -> StringMatcher {
        let key = PredicateKey::Fuzz(text.to_string(), ratio.to_bits());
        self.lookup(&key)
            .unwrap_or_else(|| self.insert(key, StringMatcher::fuzz(text, ratio)))
    }

    pub fn regex(&self, pattern: &str) -> Result<StringMatcher> {
        let key = PredicateKey::Regex(pattern.to_string());
        match self.lookup(&key) {
            Some(matcher) => Ok(matcher),
            None => Ok(self.insert(key, StringMatcher::regex(pattern)?)),
        }
    }

    pub fn contains(&self, text: &str) -> StringMatcher {
        let key = PredicateKey::Contains(text.to_string());
        self.lookup(&key)
            .unwrap_or_else(|| self.insert(key, StringMatcher::contains(text)))
    }

    /// Case-insensitive equality, spaces significant.
    pub fn equals(&self, text: &str) -> StringMatcher {
        self.equals_with(text, EqualsOptions::default())
    }

    pub fn equals_with(&self, text: &str, options: EqualsOptions) -> StringMatcher {
        let key = PredicateKey::Equals(text.to_string(), options);
        self.lookup(&key)
            .unwrap_or_else(|| self.insert(key, StringMatcher::equals(text, options)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &PredicateKey) -> Option<StringMatcher> {
        let mut state = self.state.lock();
        state.clock += 1;
        let now = state.clock;
        state.entries.get_mut(key).map(|(matcher, used)| {
            *used = now;
            matcher.clone()
        })
    }

    fn insert(&self, key: PredicateKey, matcher: StringMatcher) -> StringMatcher {
        let mut state = self.state.lock();
        state.clock += 1;
        let now = state.clock;
        if !state.entries.contains_key(&key) && state.entries.len() >= self.capacity {
            let oldest = state
                .entries
                .iter()
                .min_by_key(|(_, (_, used))| *used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                state.entries.remove(&oldest);
            }
        }
        let entry = state.entries.entry(key).or_insert((matcher, now));
        entry.1 = now;
        entry.0.clone()
    }
}

impl fmt::Debug for PredicateCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
