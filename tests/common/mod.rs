//! Shared fixtures for the leadscrape integration tests

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use leadscrape::lead::{FieldValue, Lead, StoredLead};
use leadscrape::page_driver::{DriverError, DriverFactory, DriverResult, PageDriver, SiteLayout};
use leadscrape::persistence::{
    CacheEntry, MergeReport, PersistenceError, PersistenceGateway, PersistenceResult,
};
use leadscrape::{ProgressReporter, ScraperConfig};

pub const HEADERS: [&str; 4] = ["Property Address", "City", "Bedrooms", "List Count"];

/// Config pointed at nothing real, with no settle delay.
pub fn test_config() -> ScraperConfig {
    ScraperConfig::builder()
        .credentials("agent@example.com", "hunter2")
        .base_url("https://leads.test/")
        .batch_size(4)
        .settle_delay_ms(0)
        .build()
        .unwrap()
}

/// A results page in the site's table layout.
///
/// The header carries three control cells and every row two, ahead of the
/// data cells. Row `n` gets address `<n> Main St`.
pub fn lead_table_html(first: usize, count: usize, pagination: Option<(u64, u64, u64)>) -> String {
    let mut html = String::from("<html><body><table><thead><tr><th></th><th></th><th></th>");
    for header in HEADERS {
        html.push_str(&format!("<th>{header}</th>"));
    }
    html.push_str("</tr></thead><tbody>");
    for n in first..first + count {
        html.push_str(&format!(
            "<tr><td><input type=\"checkbox\"></td><td><i></i></td>\
             <td>{n} Main St</td><td>Fresno</td><td>{}</td><td>-</td></tr>",
            n % 5 + 1
        ));
    }
    html.push_str("</tbody></table>");
    if let Some((start, end, total)) = pagination {
        html.push_str(&format!("<div><span>{start} - {end} of {total}</span></div>"));
    }
    html.push_str("</body></html>");
    html
}

pub fn empty_results_html() -> String {
    "<html><body><table><thead></thead><tbody></tbody></table></body></html>".to_string()
}

/// A scripted browser failure, keyed by 1-based page number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageFault {
    /// `content` returns an error on this page.
    ContentError(usize),
    /// `content` panics on this page.
    ContentPanic(usize),
    /// `click_next` returns an error when leaving this page.
    NextError(usize),
}

/// Scripted browser tab. `content` serves the front page; `click_next`
/// advances while pages remain.
pub struct MockPageDriver {
    pages: VecDeque<String>,
    page: usize,
    faults: Vec<PageFault>,
    calls: Arc<Mutex<Vec<String>>>,
    reject_login: bool,
    app_ready: String,
    current_url: String,
}

#[async_trait]
impl PageDriver for MockPageDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.calls.lock().unwrap().push(format!("navigate {url}"));
        self.current_url = url.to_string();
        Ok(())
    }

    async fn fill(&mut self, selector: &str, _value: &str) -> DriverResult<()> {
        self.calls.lock().unwrap().push(format!("fill {selector}"));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> DriverResult<()> {
        self.calls.lock().unwrap().push(format!("click {selector}"));
        Ok(())
    }

    async fn submit(&mut self) -> DriverResult<()> {
        self.calls.lock().unwrap().push("submit".to_string());
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> DriverResult<()> {
        if self.reject_login && selector == self.app_ready {
            return Err(DriverError::Timeout {
                operation: format!("wait for {selector}"),
                secs: timeout.as_secs(),
            });
        }
        Ok(())
    }

    async fn content(&mut self) -> DriverResult<String> {
        self.calls.lock().unwrap().push("content".to_string());
        if self.faults.contains(&PageFault::ContentPanic(self.page)) {
            panic!("renderer crashed on page {}", self.page);
        }
        if self.faults.contains(&PageFault::ContentError(self.page)) {
            return Err(DriverError::Browser(format!("page {} did not render", self.page)));
        }
        Ok(self.pages.front().cloned().unwrap_or_else(empty_results_html))
    }

    async fn click_next(&mut self) -> DriverResult<bool> {
        self.calls.lock().unwrap().push("next".to_string());
        if self.faults.contains(&PageFault::NextError(self.page)) {
            return Err(DriverError::Navigation {
                url: self.current_url.clone(),
                message: "next link detached".to_string(),
            });
        }
        self.pages.pop_front();
        self.page += 1;
        Ok(!self.pages.is_empty())
    }

    async fn select_option(&mut self, _selector: &str, _value: &str) -> DriverResult<bool> {
        Ok(true)
    }

    async fn current_url(&mut self) -> DriverResult<Option<String>> {
        Ok(Some(self.current_url.clone()))
    }

    async fn close(&mut self) -> DriverResult<()> {
        self.calls.lock().unwrap().push("close".to_string());
        Ok(())
    }
}

/// Hands out `MockPageDriver`s over the same scripted pages.
#[derive(Clone)]
pub struct MockDriverFactory {
    pages: Vec<String>,
    faults: Vec<PageFault>,
    reject_login: bool,
    launch_delay: Duration,
    launches: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockDriverFactory {
    pub fn new(pages: Vec<String>) -> Self {
        Self {
            pages,
            faults: Vec::new(),
            reject_login: false,
            launch_delay: Duration::ZERO,
            launches: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn rejecting_login(mut self) -> Self {
        self.reject_login = true;
        self
    }

    pub fn with_fault(mut self, fault: PageFault) -> Self {
        self.faults.push(fault);
        self
    }

    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DriverFactory for MockDriverFactory {
    async fn launch(&self, _headless: bool) -> DriverResult<Box<dyn PageDriver>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }
        Ok(Box::new(MockPageDriver {
            pages: self.pages.iter().cloned().collect(),
            page: 1,
            faults: self.faults.clone(),
            calls: Arc::clone(&self.calls),
            reject_login: self.reject_login,
            app_ready: SiteLayout::default().app_ready,
            current_url: String::new(),
        }))
    }
}

/// In-memory gateway that records every merge and can fail on demand.
#[derive(Default)]
pub struct MemoryGateway {
    entries: Mutex<HashMap<String, CacheEntry>>,
    merges: Mutex<Vec<(usize, bool)>>,
    clears: AtomicUsize,
    fail_merges: HashSet<usize>,
    fail_clear: bool,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`th merge call (1-based).
    pub fn failing_merge(mut self, n: usize) -> Self {
        self.fail_merges.insert(n);
        self
    }

    pub fn failing_clear(mut self) -> Self {
        self.fail_clear = true;
        self
    }

    pub fn seed(&self, location: &str, leads: usize, complete: bool, timestamp: DateTime<Utc>) {
        let leads = (0..leads)
            .map(|n| StoredLead::new(location, lead(&format!("{n} Seed Ave")), timestamp))
            .collect::<Vec<_>>();
        self.entries.lock().unwrap().insert(
            location.to_string(),
            CacheEntry {
                timestamp,
                total_leads: leads.len(),
                leads,
                complete,
            },
        );
    }

    pub fn merges(&self) -> Vec<(usize, bool)> {
        self.merges.lock().unwrap().clone()
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn entry(&self, location: &str) -> Option<CacheEntry> {
        self.entries.lock().unwrap().get(location).cloned()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn clear(&self, location: &str) -> PersistenceResult<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        if self.fail_clear {
            return Err(PersistenceError::Malformed("store offline".to_string()));
        }
        self.entries.lock().unwrap().remove(location);
        Ok(())
    }

    async fn merge_chunk(
        &self,
        location: &str,
        leads: Vec<Lead>,
        is_final: bool,
    ) -> PersistenceResult<MergeReport> {
        let call = {
            let mut merges = self.merges.lock().unwrap();
            merges.push((leads.len(), is_final));
            merges.len()
        };
        if self.fail_merges.contains(&call) {
            return Err(PersistenceError::Malformed(format!("merge {call} rejected")));
        }

        let now = Utc::now();
        let appended = leads.len();
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.entry(location.to_string()).or_insert_with(|| CacheEntry {
            timestamp: now,
            leads: Vec::new(),
            complete: false,
            total_leads: 0,
        });
        entry
            .leads
            .extend(leads.into_iter().map(|l| StoredLead::new(location, l, now)));
        entry.total_leads = entry.leads.len();
        entry.timestamp = now;
        entry.complete = is_final;

        Ok(MergeReport {
            appended,
            total: entry.total_leads,
            export: is_final.then(|| format!("{location}.csv")),
        })
    }

    async fn read(&self, location: &str) -> PersistenceResult<Option<CacheEntry>> {
        Ok(self.entry(location))
    }

    async fn list_locations(&self) -> PersistenceResult<BTreeSet<String>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }

    async fn exists(&self, location: &str) -> PersistenceResult<bool> {
        Ok(self.entries.lock().unwrap().contains_key(location))
    }
}

/// Collects every progress message.
#[derive(Default)]
pub struct RecordingProgress {
    messages: Mutex<Vec<(String, Option<u8>)>>,
}

impl RecordingProgress {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn last_percent(&self) -> Option<u8> {
        self.messages.lock().unwrap().iter().rev().find_map(|(_, p)| *p)
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, message: &str, percent: Option<u8>) {
        self.messages
            .lock()
            .unwrap()
            .push((message.to_string(), percent));
    }
}

pub fn lead(address: &str) -> Lead {
    let mut lead = Lead::new();
    lead.set("property_address", Some(FieldValue::Text(address.to_string())));
    lead
}

pub fn addresses(leads: &[StoredLead]) -> Vec<String> {
    leads
        .iter()
        .filter_map(|l| l.lead.get("property_address").and_then(FieldValue::as_text))
        .map(str::to_string)
        .collect()
}
