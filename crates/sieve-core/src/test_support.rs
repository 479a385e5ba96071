//! In-process fakes for the store and fetcher traits.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Result, SieveError};
use crate::fetch::{ConfFetcher, ConfResponse};
use crate::models::{Rule, RuleMode, RuleSubscription, RuleSubscriptionWithRules};
use crate::store::SubscriptionStore;

#[derive(Default)]
struct MemoryState {
    subscriptions: Vec<RuleSubscriptionWithRules>,
    next_id: i64,
    next_rule_id: i64,
    rules: HashMap<(String, String), i64>,
}

/// Store kept in a `Vec`, with an optional "unavailable" switch.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    unavailable: Mutex<bool>,
}

impl MemoryStore {
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap() = unavailable;
    }

    pub fn count(&self) -> usize {
        self.state.lock().unwrap().subscriptions.len()
    }

    fn check(&self) -> Result<()> {
        if *self.unavailable.lock().unwrap() {
            return Err(SieveError::StoreUnavailable);
        }
        Ok(())
    }

    fn sorted(&self, filter: impl Fn(&RuleSubscription) -> bool) -> Vec<RuleSubscriptionWithRules> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<_> = state
            .subscriptions
            .iter()
            .filter(|s| filter(&s.subscription))
            .cloned()
            .collect();
        out.sort_by_key(|s| (s.subscription.priority, s.subscription.subscription_id));
        out
    }
}

impl SubscriptionStore for MemoryStore {
    fn get_all(&self) -> Result<Vec<RuleSubscriptionWithRules>> {
        self.check()?;
        Ok(self.sorted(|_| true))
    }

    fn get_all_with_rule_by_mode(&self, mode: RuleMode) -> Result<Vec<RuleSubscriptionWithRules>> {
        self.check()?;
        Ok(self.sorted(|s| s.mode == mode))
    }

    fn get_all_active_with_rule(&self, mode: RuleMode) -> Result<Vec<RuleSubscriptionWithRules>> {
        self.check()?;
        Ok(self.sorted(|s| s.mode == mode && s.enable))
    }

    fn find_by_id(&self, subscription_id: i64) -> Result<Option<RuleSubscriptionWithRules>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.id() == subscription_id)
            .cloned())
    }

    fn subscription_count(&self) -> Result<usize> {
        self.check()?;
        Ok(self.count())
    }

    fn subscriptions_using_file(&self, file_path: &str) -> Result<Vec<i64>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .subscriptions
            .iter()
            .filter(|s| s.subscription.file_path == file_path)
            .map(|s| s.id())
            .collect())
    }

    fn insert_all(&self, subscription: &RuleSubscriptionWithRules) -> Result<i64> {
        self.check()?;
        let mut state = self.state.lock().unwrap();

        let mut stored = subscription.clone();
        for rule in &mut stored.rules {
            let key = (rule.rule_type.clone(), rule.rule_value.clone());
            let id = match state.rules.get(&key) {
                Some(id) => *id,
                None => {
                    state.next_rule_id += 1;
                    let id = state.next_rule_id;
                    state.rules.insert(key, id);
                    id
                }
            };
            rule.id = id;
        }

        if stored.id() == 0 {
            state.next_id += 1;
            stored.subscription.subscription_id = state.next_id;
            let id = stored.id();
            state.subscriptions.push(stored);
            return Ok(id);
        }

        let id = stored.id();
        let existing = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id() == id)
            .ok_or_else(|| SieveError::Store("not found".to_string()))?;
        *existing = stored;
        Ok(id)
    }

    fn update(&self, subscription: &RuleSubscription) -> Result<()> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let existing = state
            .subscriptions
            .iter_mut()
            .find(|s| s.id() == subscription.subscription_id)
            .ok_or_else(|| SieveError::Store("not found".to_string()))?;
        existing.subscription = subscription.clone();
        Ok(())
    }

    fn delete(&self, subscription: &RuleSubscriptionWithRules) -> Result<()> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.subscriptions.retain(|s| s.id() != subscription.id());
        Ok(())
    }

    fn find_rule_by_type_and_value(&self, rule_type: &str, rule_value: &str) -> Result<Option<Rule>> {
        self.check()?;
        let state = self.state.lock().unwrap();
        Ok(state
            .rules
            .get(&(rule_type.to_string(), rule_value.to_string()))
            .map(|id| Rule {
                id: *id,
                rule_type: rule_type.to_string(),
                rule_value: rule_value.to_string(),
            }))
    }
}

/// Canned response for one URL.
#[derive(Clone)]
pub enum Canned {
    Body {
        body: String,
        content_disposition: Option<String>,
    },
    Status(u16),
    Offline,
    /// Sends `head`, then never finishes the body.
    Stall(String),
}

/// Fetcher that answers from a URL map. Unknown URLs are offline.
#[derive(Default)]
pub struct StaticFetcher {
    responses: Mutex<HashMap<String, Canned>>,
}

impl StaticFetcher {
    pub fn serve(&self, url: &str, body: &str) {
        self.set(
            url,
            Canned::Body {
                body: body.to_string(),
                content_disposition: None,
            },
        );
    }

    pub fn set(&self, url: &str, canned: Canned) {
        self.responses.lock().unwrap().insert(url.to_string(), canned);
    }
}

struct StaticResponse {
    content_disposition: Option<String>,
    chunks: std::vec::IntoIter<Vec<u8>>,
    stall: bool,
}

#[async_trait]
impl ConfResponse for StaticResponse {
    fn content_disposition(&self) -> Option<&str> {
        self.content_disposition.as_deref()
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match self.chunks.next() {
            Some(chunk) => Ok(Some(chunk)),
            None if self.stall => std::future::pending().await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ConfFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Box<dyn ConfResponse>> {
        let canned = self.responses.lock().unwrap().get(url).cloned();
        match canned {
            Some(Canned::Body {
                body,
                content_disposition,
            }) => {
                // Small chunks so lines straddle chunk boundaries.
                let chunks: Vec<Vec<u8>> = body.as_bytes().chunks(7).map(<[u8]>::to_vec).collect();
                Ok(Box::new(StaticResponse {
                    content_disposition,
                    chunks: chunks.into_iter(),
                    stall: false,
                }))
            }
            Some(Canned::Stall(head)) => Ok(Box::new(StaticResponse {
                content_disposition: None,
                chunks: vec![head.into_bytes()].into_iter(),
                stall: true,
            })),
            Some(Canned::Status(code)) => Err(SieveError::HttpStatus(code)),
            Some(Canned::Offline) | None => Err(SieveError::Network("connection refused".to_string())),
        }
    }
}
