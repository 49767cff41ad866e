// logtail - app/aggregate.rs
//
// Fan-out of one query across many peers with partial-failure tolerance.
//
// Every peer gets its own task and its own timeout. A slow, failing or
// panicking peer affects only its own slot in the result: the call as a
// whole fails only for structural problems detected before any peer is
// contacted (empty peer list, duplicate names).
//
// Total latency is bounded by the slowest peer up to the per-peer timeout,
// not by the sum of peer latencies.

use crate::app::transport::PeerTransport;
use crate::core::filter::KeywordFilter;
use crate::core::model::{LogFileInfo, PeerDescriptor, RetrievalQuery};
use crate::util::error::{AggregateError, PeerFailure};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// What one peer contributed to an aggregate call.
pub type PeerOutcome<T = Vec<String>> = Result<T, PeerFailure>;

/// One peer's slot in an aggregate result.
#[derive(Debug, Clone)]
pub struct PeerResult<T = Vec<String>> {
    pub peer: PeerDescriptor,
    pub outcome: PeerOutcome<T>,
    pub elapsed: Duration,
}

/// Per-peer outcomes of one fan-out, one entry for every queried peer, in
/// the order the peers were given.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    results: Vec<PeerResult>,
}

/// A line attributed to the peer that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedEntry {
    pub server: String,
    pub content: String,
}

impl AggregateResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Outcome for the peer called `name`.
    pub fn get(&self, name: &str) -> Option<&PeerOutcome> {
        self.results
            .iter()
            .find(|r| r.peer.name == name)
            .map(|r| &r.outcome)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.results.iter().map(|r| r.peer.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerResult> {
        self.results.iter()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }

    /// Lines from all successful peers.
    pub fn total_lines(&self) -> usize {
        self.results
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok())
            .map(Vec::len)
            .sum()
    }

    /// All successful lines interleaved by content, newest-first, keeping
    /// the first `limit`.
    ///
    /// Log lines conventionally start with a timestamp, so descending
    /// content order approximates newest-first. Lines without one sort
    /// wherever their text puts them.
    pub fn merged_entries(&self, limit: usize) -> Vec<MergedEntry> {
        let mut entries: Vec<MergedEntry> = self
            .results
            .iter()
            .filter_map(|r| r.outcome.as_ref().ok().map(|lines| (&r.peer.name, lines)))
            .flat_map(|(server, lines)| {
                lines.iter().map(move |content| MergedEntry {
                    server: server.clone(),
                    content: content.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| b.content.cmp(&a.content));
        entries.truncate(limit);
        entries
    }
}

// =============================================================================
// Search
// =============================================================================

/// One matching line found by a cross-fleet search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub server: String,
    pub filename: String,
    pub content: String,
    /// Case-insensitive occurrences of the keyword in `content`.
    pub matches: usize,
}

/// A listing or file fetch that failed during a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFailure {
    pub server: String,
    /// `None` when the file listing itself failed.
    pub filename: Option<String>,
    pub failure: PeerFailure,
}

#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Most matches first; ties keep peer then file order.
    pub hits: Vec<SearchHit>,
    /// Hits found before truncation to the line limit.
    pub total_matches: usize,
    pub failures: Vec<SearchFailure>,
}

/// Bounds for a cross-fleet search.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Lines requested from each file, and the cap on returned hits.
    pub line_limit: usize,
    /// Only the first N files of each peer's listing are searched.
    pub files_per_peer: usize,
    /// Timeout for each listing call.
    pub listing_timeout: Duration,
}

/// Health of one peer, as seen by the primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerHealth {
    Healthy,
    /// Answered, but not with a success status.
    Unhealthy,
    /// Did not answer in time or could not be reached.
    Unreachable,
}

impl PeerHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unreachable => "unreachable",
        }
    }

    fn from_outcome(outcome: &PeerOutcome<()>) -> Self {
        match outcome {
            Ok(()) => Self::Healthy,
            Err(PeerFailure::BadResponse { .. }) => Self::Unhealthy,
            Err(_) => Self::Unreachable,
        }
    }
}

// =============================================================================
// Aggregator
// =============================================================================

/// Concurrent fan-out over a transport.
///
/// Holds no per-request state: every call takes its peer list explicitly,
/// so concurrent calls on one aggregator do not interact.
#[derive(Clone)]
pub struct Aggregator {
    transport: Arc<dyn PeerTransport>,
    peer_timeout: Duration,
}

impl Aggregator {
    pub fn new(transport: Arc<dyn PeerTransport>, peer_timeout: Duration) -> Self {
        Self {
            transport,
            peer_timeout,
        }
    }

    /// Run `query` against every peer concurrently.
    ///
    /// The result has exactly one entry per peer. Individual peer failures
    /// are recorded in the result, never returned as `Err`.
    pub async fn aggregate_tail(
        &self,
        peers: &[PeerDescriptor],
        query: &RetrievalQuery,
    ) -> Result<AggregateResult, AggregateError> {
        validate_peers(peers)?;
        let started = Instant::now();

        let query = Arc::new(query.clone());
        let results = self
            .fan_out(peers.to_vec(), self.peer_timeout, move |transport, peer| {
                let query = Arc::clone(&query);
                async move { transport.fetch_tail(&peer, &query).await }
            })
            .await;

        let results: Vec<PeerResult> = results
            .into_iter()
            .map(|(peer, outcome, elapsed)| {
                log_outcome(&peer.name, &outcome, elapsed);
                PeerResult {
                    peer,
                    outcome,
                    elapsed,
                }
            })
            .collect();
        let result = AggregateResult { results };

        tracing::info!(
            peers = result.len(),
            succeeded = result.succeeded(),
            failed = result.failed(),
            lines = result.total_lines(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregate tail complete"
        );
        Ok(result)
    }

    /// Health of every peer, checked concurrently with `timeout` each.
    pub async fn check_health(
        &self,
        peers: &[PeerDescriptor],
        timeout: Duration,
    ) -> Vec<(PeerDescriptor, PeerHealth, Option<PeerFailure>)> {
        self.fan_out(peers.to_vec(), timeout, |transport, peer| async move {
            transport.check_health(&peer).await
        })
        .await
        .into_iter()
        .map(|(peer, outcome, _)| {
            let health = PeerHealth::from_outcome(&outcome);
            (peer, health, outcome.err())
        })
        .collect()
    }

    /// Health check of a single peer; used before registration.
    pub async fn check_one(
        &self,
        peer: &PeerDescriptor,
        timeout: Duration,
    ) -> Result<(), PeerFailure> {
        let transport = Arc::clone(&self.transport);
        with_timeout(timeout, async move { transport.check_health(peer).await }).await
    }

    /// File listing of a single peer, bounded by the peer timeout.
    pub async fn list_files(&self, peer: &PeerDescriptor) -> Result<Vec<LogFileInfo>, PeerFailure> {
        let transport = Arc::clone(&self.transport);
        with_timeout(self.peer_timeout, async move {
            transport.list_files(peer).await
        })
        .await
    }

    /// Search for `keyword` in the newest lines of every file on every peer.
    ///
    /// Lists each peer's files, then tails the first
    /// `options.files_per_peer` of them with the keyword as a filter. Hits
    /// are ranked by how often the keyword occurs in the line.
    pub async fn search(
        &self,
        peers: &[PeerDescriptor],
        keyword: &str,
        options: SearchOptions,
    ) -> Result<SearchResult, AggregateError> {
        validate_peers(peers)?;
        if keyword.is_empty() {
            return Err(AggregateError::InvalidQuery {
                reason: "keyword must not be empty".to_string(),
            });
        }
        let started = Instant::now();
        let mut result = SearchResult::default();

        let listings = self
            .fan_out(
                peers.to_vec(),
                options.listing_timeout,
                |transport, peer| async move { transport.list_files(&peer).await },
            )
            .await;

        let mut targets = Vec::new();
        for (peer, outcome, _) in listings {
            match outcome {
                Ok(files) => {
                    for file in files.into_iter().take(options.files_per_peer) {
                        match RetrievalQuery::new(
                            file.filename.clone(),
                            options.line_limit,
                            Some(keyword.to_string()),
                            usize::MAX,
                        ) {
                            Ok(query) => targets.push((peer.clone(), query)),
                            Err(e) => tracing::warn!(
                                peer = %peer.name,
                                file = %file.filename,
                                error = %e,
                                "Skipping file with unusable name"
                            ),
                        }
                    }
                }
                Err(failure) => {
                    tracing::warn!(peer = %peer.name, kind = failure.kind(), error = %failure, "File listing failed");
                    result.failures.push(SearchFailure {
                        server: peer.name,
                        filename: None,
                        failure,
                    });
                }
            }
        }

        let fetched = self
            .fan_out(targets, self.peer_timeout, |transport, (peer, query)| async move {
                transport.fetch_tail(&peer, &query).await
            })
            .await;

        let filter = KeywordFilter::new(Some(keyword));
        for ((peer, query), outcome, _) in fetched {
            match outcome {
                Ok(lines) => {
                    result.hits.extend(lines.into_iter().filter_map(|content| {
                        let matches = filter.count_matches(&content);
                        (matches > 0).then(|| SearchHit {
                            server: peer.name.clone(),
                            filename: query.source_identifier().to_string(),
                            content,
                            matches,
                        })
                    }));
                }
                Err(failure) => {
                    tracing::debug!(
                        peer = %peer.name,
                        file = query.source_identifier(),
                        error = %failure,
                        "File search failed"
                    );
                    result.failures.push(SearchFailure {
                        server: peer.name,
                        filename: Some(query.source_identifier().to_string()),
                        failure,
                    });
                }
            }
        }

        result.hits.sort_by(|a, b| b.matches.cmp(&a.matches));
        result.total_matches = result.hits.len();
        result.hits.truncate(options.line_limit);

        tracing::info!(
            peers = peers.len(),
            hits = result.hits.len(),
            failures = result.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregate search complete"
        );
        Ok(result)
    }

    /// Run `call` once per target, each in its own task under `timeout`.
    ///
    /// Returns one entry per target in input order. A task that panics or
    /// is cancelled is recorded as `Unreachable` for its target only.
    async fn fan_out<K, T, F, Fut>(
        &self,
        targets: Vec<K>,
        timeout: Duration,
        call: F,
    ) -> Vec<(K, PeerOutcome<T>, Duration)>
    where
        K: Clone + Send + 'static,
        T: Send + 'static,
        F: Fn(Arc<dyn PeerTransport>, K) -> Fut,
        Fut: Future<Output = PeerOutcome<T>> + Send + 'static,
    {
        let mut tasks = JoinSet::new();
        for (index, target) in targets.iter().enumerate() {
            let fut = call(Arc::clone(&self.transport), target.clone());
            tasks.spawn(async move {
                let started = Instant::now();
                let outcome = with_timeout(timeout, fut).await;
                (index, outcome, started.elapsed())
            });
        }

        let mut slots: Vec<Option<(PeerOutcome<T>, Duration)>> =
            targets.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome, elapsed)) => slots[index] = Some((outcome, elapsed)),
                Err(e) => tracing::error!(error = %e, "Peer task did not complete"),
            }
        }

        targets
            .into_iter()
            .zip(slots)
            .map(|(target, slot)| {
                let (outcome, elapsed) = slot.unwrap_or_else(|| {
                    (
                        Err(PeerFailure::Unreachable {
                            reason: "request task aborted".to_string(),
                        }),
                        Duration::ZERO,
                    )
                });
                (target, outcome, elapsed)
            })
            .collect()
    }
}

async fn with_timeout<T, Fut>(timeout: Duration, fut: Fut) -> PeerOutcome<T>
where
    Fut: Future<Output = PeerOutcome<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(outcome) => outcome,
        Err(_) => Err(PeerFailure::Timeout { after: timeout }),
    }
}

fn log_outcome(name: &str, outcome: &PeerOutcome, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    match outcome {
        Ok(lines) => {
            tracing::debug!(peer = %name, lines = lines.len(), elapsed_ms, "Peer answered")
        }
        Err(failure) => tracing::warn!(
            peer = %name,
            kind = failure.kind(),
            error = %failure,
            elapsed_ms,
            "Peer failed"
        ),
    }
}

/// Reject an empty peer list or one with repeated names.
pub fn validate_peers(peers: &[PeerDescriptor]) -> Result<(), AggregateError> {
    if peers.is_empty() {
        return Err(AggregateError::NoPeers);
    }
    let mut seen = HashSet::with_capacity(peers.len());
    for peer in peers {
        if !seen.insert(peer.name.as_str()) {
            return Err(AggregateError::DuplicatePeer {
                name: peer.name.clone(),
            });
        }
    }
    Ok(())
}

/// Narrow `all` to the comma-separated names in `selection`.
///
/// No selection (or an empty one) means every peer. Unknown names are
/// ignored as long as at least one name matches.
pub fn select_peers(
    all: &[PeerDescriptor],
    selection: Option<&str>,
) -> Result<Vec<PeerDescriptor>, AggregateError> {
    if all.is_empty() {
        return Err(AggregateError::NoPeers);
    }
    let requested: Vec<String> = selection
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect();
    if requested.is_empty() {
        return Ok(all.to_vec());
    }

    let chosen: Vec<PeerDescriptor> = all
        .iter()
        .filter(|p| requested.iter().any(|r| r == &p.name))
        .cloned()
        .collect();
    if chosen.is_empty() {
        return Err(AggregateError::UnknownPeers { requested });
    }
    Ok(chosen)
}
