//! Subscription synchronization.
//!
//! A sync downloads a subscription's config, streams it line by line into a
//! [`ConfParser`] and onto disk, then reconciles the parsed result into the
//! store in a single [`SubscriptionStore::insert_all`] call. Nothing is
//! written to the store until the download has been fully read and parsed,
//! so a failed or cancelled sync leaves the stored subscription untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use percent_encoding::percent_decode_str;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, warn};
use url::Url;

use crate::conf_parser::ConfParser;
use crate::error::{Result, SieveError};
use crate::fetch::{ConfFetcher, ConfResponse, LineBuffer};
use crate::models::{RuleMode, RuleSubscription, RuleSubscriptionWithRules};
use crate::store::SubscriptionStore;

/// File name used when nothing better can be derived.
pub const DEFAULT_CONF_NAME: &str = "default.conf";

/// One subscription that failed during [`SubscriptionSyncEngine::sync_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct SyncFailure {
    pub subscription_id: i64,
    pub name: String,
    pub error: String,
}

/// Outcome of a batch sync.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Ids of subscriptions that synced.
    pub synced: Vec<i64>,
    /// Subscriptions that failed, in processing order.
    pub failed: Vec<SyncFailure>,
}

impl SyncReport {
    /// Returns true if every subscription synced.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total subscriptions attempted.
    pub fn total(&self) -> usize {
        self.synced.len() + self.failed.len()
    }
}

/// Checks that `url` is an absolute http(s) URL.
pub fn validate_subscription_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url.trim()).map_err(|e| SieveError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(SieveError::InvalidUrl(url.to_string())),
    }
}

/// Picks the on-disk file name for a download.
///
/// Order: `Content-Disposition` filename, last non-empty URL path segment
/// (percent-decoded), the supplied name, then [`DEFAULT_CONF_NAME`].
pub fn resolve_file_name(content_disposition: Option<&str>, url: &str, name: Option<&str>) -> String {
    content_disposition
        .and_then(file_name_from_disposition)
        .or_else(|| file_name_from_url(url))
        .or_else(|| name.and_then(sanitize_file_name))
        .unwrap_or_else(|| DEFAULT_CONF_NAME.to_string())
}

fn file_name_from_disposition(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .and_then(|value| sanitize_file_name(&value.replace('"', "")))
}

fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    sanitize_file_name(&percent_decode_str(segment).decode_utf8_lossy())
}

/// Reduces a candidate name to a single path component.
fn sanitize_file_name(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    Path::new(candidate)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

/// `rules.conf` with `n = 2` becomes `rules-2.conf`.
fn numbered_file_name(file_name: &str, n: u32) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{n}.{ext}"),
        _ => format!("{file_name}-{n}"),
    }
}

/// A `.part` download that is removed on drop unless persisted, so an
/// error or a cancelled future never leaves it behind.
struct PartFile {
    path: PathBuf,
    persisted: bool,
}

impl PartFile {
    fn for_destination(file_path: &Path) -> Self {
        let mut name = file_path.as_os_str().to_owned();
        name.push(".part");
        Self {
            path: PathBuf::from(name),
            persisted: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(mut self, destination: &Path) -> Result<()> {
        fs::rename(&self.path, destination).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Could not remove partial download");
            }
        }
    }
}

/// Downloads, parses, and reconciles subscriptions.
#[derive(Clone)]
pub struct SubscriptionSyncEngine {
    store: Arc<dyn SubscriptionStore>,
    fetcher: Arc<dyn ConfFetcher>,
}

impl SubscriptionSyncEngine {
    /// Creates an engine over a store and a fetcher.
    pub fn new(store: Arc<dyn SubscriptionStore>, fetcher: Arc<dyn ConfFetcher>) -> Self {
        Self { store, fetcher }
    }

    /// Downloads `url` into `destination_dir`, parsing it on the way.
    ///
    /// `owner` is the id of the subscription the download belongs to (0 for
    /// a new one). A file name already used by another subscription gets a
    /// numeric suffix instead of being overwritten. The body is written to a
    /// `.part` file that replaces the destination only after the whole config
    /// has been read and declared a mode.
    pub async fn download_conf(
        &self,
        name: Option<&str>,
        url: &str,
        destination_dir: &Path,
        owner: i64,
    ) -> Result<ConfParser> {
        let name = name.filter(|n| !n.trim().is_empty());
        let mut response = self.fetcher.fetch(url).await?;

        let file_name = resolve_file_name(response.content_disposition(), url, name);
        let file_path = self.unclaimed_path(destination_dir, &file_name, owner)?;
        let mut parser = ConfParser::new(
            file_name,
            url,
            file_path.to_string_lossy().into_owned(),
            0,
        );

        info!(url = %url, path = %file_path.display(), "Downloading subscription config");

        fs::create_dir_all(destination_dir).await?;
        let part = PartFile::for_destination(&file_path);
        Self::stream_body(response.as_mut(), &mut parser, part.path()).await?;
        if parser.mode().is_none() {
            return Err(SieveError::MissingMode);
        }

        part.persist(&file_path).await?;
        Ok(parser)
    }

    /// First of `file_name`, `file_name-1`, ... in `dir` that no subscription
    /// other than `owner` uses.
    fn unclaimed_path(&self, dir: &Path, file_name: &str, owner: i64) -> Result<PathBuf> {
        let mut candidate = dir.join(file_name);
        let mut n = 0;
        loop {
            let holders = self
                .store
                .subscriptions_using_file(&candidate.to_string_lossy())?;
            if holders.iter().all(|id| *id == owner) {
                return Ok(candidate);
            }
            n += 1;
            candidate = dir.join(numbered_file_name(file_name, n));
        }
    }

    async fn stream_body(
        response: &mut dyn ConfResponse,
        parser: &mut ConfParser,
        temp_path: &Path,
    ) -> Result<()> {
        let mut writer = BufWriter::new(fs::File::create(temp_path).await?);
        let mut lines = LineBuffer::default();

        while let Some(chunk) = response.next_chunk().await? {
            for line in lines.push(&chunk) {
                Self::consume_line(&line, parser, &mut writer).await?;
            }
        }
        if let Some(line) = lines.finish() {
            Self::consume_line(&line, parser, &mut writer).await?;
        }

        writer.flush().await?;
        Ok(())
    }

    async fn consume_line(
        line: &str,
        parser: &mut ConfParser,
        writer: &mut BufWriter<fs::File>,
    ) -> Result<()> {
        parser.parse(line)?;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        Ok(())
    }

    /// Re-downloads one subscription and reconciles it in place.
    ///
    /// The config is written next to the previous download, or into
    /// `default_dir` if the stored path has no parent. The stored id, enable
    /// flag, priority and creation time are kept; the rule set is replaced.
    pub async fn sync_one(
        &self,
        subscription: &RuleSubscriptionWithRules,
        default_dir: &Path,
    ) -> Result<RuleSubscriptionWithRules> {
        let current = &subscription.subscription;
        let file_dir = Path::new(&current.file_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_dir.to_path_buf());

        let started = Instant::now();
        let parser = self
            .download_conf(Some(&current.name), &current.url, &file_dir, current.subscription_id)
            .await?;
        let fresh = parser.get()?;

        let merged = RuleSubscriptionWithRules {
            subscription: current.merge_synced(&fresh.subscription),
            rules: fresh.rules,
        };
        self.store.insert_all(&merged)?;

        debug!(
            url = %current.url,
            rules = merged.rules.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Synced subscription"
        );
        Ok(merged)
    }

    /// Syncs every enabled subscription of `mode`, one after another.
    ///
    /// A failing subscription is recorded as failed in the store and in the
    /// report; the rest of the batch still runs. Only a failure to list the
    /// subscriptions aborts the batch.
    pub async fn sync_all(&self, mode: RuleMode, default_dir: &Path) -> Result<SyncReport> {
        let subscriptions = self.store.get_all_active_with_rule(mode)?;
        let mut report = SyncReport::default();

        for subscription in &subscriptions {
            let id = subscription.id();
            match self.sync_one(subscription, default_dir).await {
                Ok(_) => report.synced.push(id),
                Err(e) => {
                    warn!(
                        subscription_id = id,
                        url = %subscription.subscription.url,
                        error = %e,
                        "Subscription sync failed"
                    );
                    self.record_failure(&subscription.subscription);
                    report.failed.push(SyncFailure {
                        subscription_id: id,
                        name: subscription.subscription.name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            mode = %mode,
            synced = report.synced.len(),
            failed = report.failed.len(),
            "Subscription sync finished"
        );
        Ok(report)
    }

    fn record_failure(&self, subscription: &RuleSubscription) {
        if let Err(e) = self.store.update(&subscription.mark_failed(Utc::now())) {
            warn!(
                subscription_id = subscription.subscription_id,
                error = %e,
                "Could not record sync failure"
            );
        }
    }

    /// Downloads and stores a brand-new subscription. Returns its id.
    ///
    /// The new subscription is ranked after every existing one.
    pub async fn add_subscription(
        &self,
        name: Option<&str>,
        url: &str,
        file_dir: &Path,
    ) -> Result<i64> {
        let url = validate_subscription_url(url)?;
        let parser = self.download_conf(name, url.as_str(), file_dir, 0).await?;
        let mut subscription = parser.get()?;
        subscription.subscription.priority =
            i32::try_from(self.store.subscription_count()?).unwrap_or(i32::MAX);
        let id = self.store.insert_all(&subscription)?;

        info!(
            subscription_id = id,
            name = %subscription.subscription.name,
            mode = %subscription.subscription.mode,
            rules = subscription.rules.len(),
            "Added subscription"
        );
        Ok(id)
    }

    /// Enables or disables a subscription without touching its rules.
    pub fn set_enabled(&self, subscription: &RuleSubscription, enabled: bool) -> Result<()> {
        let updated = RuleSubscription {
            enable: enabled,
            ..subscription.clone()
        };
        self.store.update(&updated)
    }

    /// Deletes a subscription and any rules only it referenced.
    pub fn delete_subscription(&self, subscription: &RuleSubscriptionWithRules) -> Result<()> {
        self.store.delete(subscription)?;
        info!(subscription_id = subscription.id(), "Deleted subscription");
        Ok(())
    }
}
