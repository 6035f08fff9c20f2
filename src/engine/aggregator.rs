//! The contributor aggregation run.
//!
//! Four phases, strictly ordered by data dependency: search repositories,
//! collect contributors, enrich distinct logins with profile data, rank.
//! Contribution counts accumulate by addition across repositories; profile
//! fields are overwritten by the most recent fetch and never accumulate.

use super::CancelToken;
use super::models::{ContributionRecord, ProfileStats, RepositoryRef, SearchPage};
use super::pager::{FetchFailure, Pager, SingleFetch};
use core::fmt;
use futures_util::future::join_all;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use std::collections::HashMap;

const LOG_TARGET: &str = "aggregator";

/// The merged, run-scoped record summarizing one contributor across all
/// matched repositories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorAggregate {
    pub login: String,
    pub total_contributions: u64,
    pub followers: u64,
    pub public_repos: u64,
    pub location: Option<String>,
    pub profile_url: String,
}

impl ContributorAggregate {
    /// A fresh aggregate for a login seen for the first time: zero totals and
    /// unknown profile fields.
    fn new(login: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            total_contributions: 0,
            followers: 0,
            public_repos: 0,
            location: None,
            profile_url: String::new(),
        }
    }
}

/// A note about a part of the run that could not be completed.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    /// A repository from the search stage vanished before its contributors
    /// could be listed.
    RepoSkipped { repo: String },

    /// A repository's contributor listing was cut short; records fetched
    /// before the failure are included in the totals.
    ContributorsTruncated { repo: String, reason: String },

    /// A contributor's account no longer exists; their profile fields remain
    /// at defaults.
    ProfileMissing { login: String },

    /// A profile fetch failed; the login's profile fields remain at defaults.
    ProfileFailed { login: String, reason: String },

    /// The run was cancelled; the report covers only what was merged by then.
    Cancelled,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RepoSkipped { repo } => write!(f, "repository '{repo}' no longer exists; skipped"),
            Self::ContributorsTruncated { repo, reason } => {
                write!(f, "contributor listing for '{repo}' incomplete: {reason}")
            }
            Self::ProfileMissing { login } => write!(f, "profile for '{login}' no longer exists; using defaults"),
            Self::ProfileFailed { login, reason } => {
                write!(f, "profile fetch for '{login}' failed: {reason}")
            }
            Self::Cancelled => write!(f, "run cancelled; results are partial"),
        }
    }
}

/// The outcome of one aggregation run: the ranked contributors plus any
/// diagnostics describing partial failures.
#[derive(Debug)]
pub struct RankReport {
    /// Aggregates sorted by total contributions descending, ties broken by
    /// ascending login.
    pub contributors: Vec<ContributorAggregate>,
    /// Number of repositories whose contributors were considered.
    pub repos_searched: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl RankReport {
    /// Returns `true` when every stage completed without truncation.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Orchestrates the search → contributors → profiles → rank pipeline.
#[derive(Debug)]
pub struct Aggregator {
    pager: Pager,
    max_repos: Option<usize>,
}

impl Aggregator {
    pub const fn new(pager: Pager, max_repos: Option<usize>) -> Self {
        Self { pager, max_repos }
    }

    /// Run one aggregation for `query`.
    ///
    /// Returns `Err` only for a terminal phase-1 failure (no results exist at
    /// all); every later failure is reported through diagnostics on the
    /// returned report.
    pub async fn run(&self, query: &str, cancel: &CancelToken) -> Result<RankReport, FetchFailure> {
        // Phase 1: repository search, ordered by the remote's star ranking.
        let search_url = format!(
            "{}/search/repositories?q={}&sort=stars&order=desc",
            self.pager.base_url(),
            utf8_percent_encode(query, NON_ALPHANUMERIC)
        );

        let search = self.pager.fetch_all::<SearchPage>(&search_url, cancel).await;
        let mut repos = search.items;
        match search.truncation {
            None => {}
            Some(FetchFailure::Cancelled) => {
                return Ok(RankReport {
                    contributors: Vec::new(),
                    repos_searched: 0,
                    diagnostics: vec![Diagnostic::Cancelled],
                });
            }
            Some(failure) => {
                log::error!(target: LOG_TARGET, "Repository search for '{query}' failed: {failure}");
                return Err(failure);
            }
        }

        if let Some(cap) = self.max_repos
            && repos.len() > cap
        {
            log::info!(target: LOG_TARGET, "Limiting run to the top {cap} of {} repositories", repos.len());
            repos.truncate(cap);
        }

        log::info!(target: LOG_TARGET, "Query '{query}' matched {} repositories", repos.len());

        let mut aggregates: HashMap<String, ContributorAggregate> = HashMap::new();
        let mut diagnostics = Vec::new();
        let mut cancelled = false;

        // Phase 2: contributor listings, fetched concurrently (the throttler
        // bounds actual in-flight requests) and merged by this single task.
        let fetches = repos.iter().map(|repo| {
            let url = contributors_url(self.pager.base_url(), repo);
            async move {
                let listing = self.pager.fetch_all::<Vec<ContributionRecord>>(&url, cancel).await;
                (repo.full_name.clone(), listing)
            }
        });

        for (repo, listing) in join_all(fetches).await {
            merge_contributions(&mut aggregates, listing.items);

            match listing.truncation {
                None => {}
                Some(FetchFailure::NotFound) => {
                    log::debug!(target: LOG_TARGET, "Repository '{repo}' vanished mid-run; skipping");
                    diagnostics.push(Diagnostic::RepoSkipped { repo });
                }
                Some(FetchFailure::Cancelled) => cancelled = true,
                Some(failure) => {
                    diagnostics.push(Diagnostic::ContributorsTruncated {
                        repo,
                        reason: failure.to_string(),
                    });
                }
            }
        }

        // Phase 3: one profile fetch per distinct login. The aggregate map's
        // key set is the dedup set; a login contributing to many repositories
        // is fetched exactly once.
        if cancelled || cancel.is_cancelled() {
            cancelled = true;
        } else {
            let fetches: Vec<_> = aggregates
                .keys()
                .map(|login| {
                    let url = format!("{}/users/{login}", self.pager.base_url());
                    let login = login.clone();
                    async move {
                        let fetched = self.pager.fetch_one::<ProfileStats>(&url, cancel).await;
                        (login, fetched)
                    }
                })
                .collect();

            for (login, fetched) in join_all(fetches).await {
                match fetched {
                    SingleFetch::Found(profile) => {
                        let aggregate = aggregates
                            .get_mut(&login)
                            .expect("profile fetches are keyed by the aggregate map");
                        apply_profile(aggregate, profile);
                    }
                    SingleFetch::Missing => diagnostics.push(Diagnostic::ProfileMissing { login }),
                    SingleFetch::Failed(FetchFailure::Cancelled) => cancelled = true,
                    SingleFetch::Failed(failure) => diagnostics.push(Diagnostic::ProfileFailed {
                        login,
                        reason: failure.to_string(),
                    }),
                }
            }
        }

        if cancelled {
            diagnostics.push(Diagnostic::Cancelled);
        }

        // Phase 4: deterministic rank.
        Ok(RankReport {
            contributors: rank(aggregates),
            repos_searched: repos.len(),
            diagnostics,
        })
    }
}

fn contributors_url(base_url: &str, repo: &RepositoryRef) -> String {
    format!("{base_url}/repos/{}/contributors", repo.full_name)
}

/// Merge one repository's contribution records into the aggregate map.
///
/// The first sighting of a login constructs a default aggregate; every
/// sighting adds to the running total. Addition, never overwrite.
fn merge_contributions(aggregates: &mut HashMap<String, ContributorAggregate>, records: Vec<ContributionRecord>) {
    for record in records {
        let aggregate = aggregates
            .entry(record.login.clone())
            .or_insert_with(|| ContributorAggregate::new(record.login));
        aggregate.total_contributions += record.contributions;
    }
}

/// Overwrite an aggregate's profile fields with freshly fetched stats.
/// Totals are untouched; re-applying a profile is idempotent.
fn apply_profile(aggregate: &mut ContributorAggregate, profile: ProfileStats) {
    aggregate.followers = profile.followers;
    aggregate.public_repos = profile.public_repos;
    aggregate.location = profile.location;
    aggregate.profile_url = profile.html_url;
}

/// Sort aggregates by total contributions descending; ties break by ascending
/// lexical login so output is reproducible.
fn rank(aggregates: HashMap<String, ContributorAggregate>) -> Vec<ContributorAggregate> {
    let mut ranked: Vec<ContributorAggregate> = aggregates.into_values().collect();
    ranked.sort_by(|a, b| {
        b.total_contributions
            .cmp(&a.total_contributions)
            .then_with(|| a.login.cmp(&b.login))
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(login: &str, contributions: u64) -> ContributionRecord {
        ContributionRecord {
            login: login.to_string(),
            contributions,
        }
    }

    #[test]
    fn merge_sums_across_repositories() {
        let mut aggregates = HashMap::new();

        merge_contributions(&mut aggregates, vec![record("alice", 10), record("bob", 5)]);
        merge_contributions(&mut aggregates, vec![record("alice", 3), record("carol", 7)]);

        assert_eq!(aggregates["alice"].total_contributions, 13);
        assert_eq!(aggregates["bob"].total_contributions, 5);
        assert_eq!(aggregates["carol"].total_contributions, 7);
    }

    #[test]
    fn first_sighting_constructs_default_aggregate() {
        let mut aggregates = HashMap::new();
        merge_contributions(&mut aggregates, vec![record("alice", 4)]);

        let alice = &aggregates["alice"];
        assert_eq!(alice.total_contributions, 4);
        assert_eq!(alice.followers, 0);
        assert_eq!(alice.public_repos, 0);
        assert_eq!(alice.location, None);
        assert!(alice.profile_url.is_empty());
    }

    #[test]
    fn profile_overwrites_and_leaves_totals() {
        let mut aggregate = ContributorAggregate::new("alice");
        aggregate.total_contributions = 13;

        apply_profile(&mut aggregate, ProfileStats {
            login: "alice".to_string(),
            followers: 50,
            public_repos: 5,
            location: Some("Lisbon".to_string()),
            html_url: "https://github.com/alice".to_string(),
        });
        apply_profile(&mut aggregate, ProfileStats {
            login: "alice".to_string(),
            followers: 100,
            public_repos: 12,
            location: None,
            html_url: "https://github.com/alice".to_string(),
        });

        // Second fetch wins outright; nothing accumulates.
        assert_eq!(aggregate.followers, 100);
        assert_eq!(aggregate.public_repos, 12);
        assert_eq!(aggregate.location, None);
        assert_eq!(aggregate.total_contributions, 13);
    }

    #[test]
    fn rank_orders_by_total_then_login() {
        let mut aggregates = HashMap::new();
        merge_contributions(&mut aggregates, vec![
            record("zed", 5),
            record("amy", 5),
            record("mia", 9),
        ]);

        let ranked = rank(aggregates);
        let logins: Vec<&str> = ranked.iter().map(|a| a.login.as_str()).collect();
        assert_eq!(logins, vec!["mia", "amy", "zed"]);
    }

    #[test]
    fn rank_of_empty_map_is_empty() {
        assert!(rank(HashMap::new()).is_empty());
    }

    #[test]
    fn report_completeness() {
        let report = RankReport {
            contributors: Vec::new(),
            repos_searched: 0,
            diagnostics: Vec::new(),
        };
        assert!(report.is_complete());

        let report = RankReport {
            contributors: Vec::new(),
            repos_searched: 1,
            diagnostics: vec![Diagnostic::ProfileMissing { login: "ghost".to_string() }],
        };
        assert!(!report.is_complete());
    }

    #[test]
    fn diagnostic_display_names_entities() {
        let d = Diagnostic::ContributorsTruncated {
            repo: "orgA/repo1".to_string(),
            reason: "unauthorized".to_string(),
        };
        let rendered = d.to_string();
        assert!(rendered.contains("orgA/repo1"));
        assert!(rendered.contains("unauthorized"));

        assert!(Diagnostic::ProfileMissing { login: "ghost".to_string() }.to_string().contains("ghost"));
    }
}
