//! Run controller: one invocation of the bot.
//!
//! Flow:
//! 1. Pick a random rule and search for its term
//! 2. For each candidate: filter → policy → {dedup → reply | filler | skip}
//! 3. Stop after the first reply (at most one targeted reply per run)
//!
//! Every transport or store failure is logged and treated as "no effect
//! for this candidate"; nothing propagates to the scheduler.

use std::sync::Arc;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, error, info, warn};

use crate::channels::StatusTransport;
use crate::config::{BotConfig, FillerMode};
use crate::error::ConfigError;
use crate::lang::LanguageClassifier;
use crate::pipeline::composer::ReplyComposer;
use crate::pipeline::dedup::DedupGuard;
use crate::pipeline::filter::CandidateFilter;
use crate::pipeline::policy::EngagementPolicy;
use crate::pipeline::rules::RuleCatalog;
use crate::pipeline::types::{
    EngagementAction, EngagementRecord, Rule, RunReport, SearchCandidate,
};
use crate::store::EngagementStore;

/// External collaborators of the controller.
pub struct RunDeps {
    pub transport: Arc<dyn StatusTransport>,
    pub classifier: Arc<dyn LanguageClassifier>,
    pub store: Arc<dyn EngagementStore>,
}

/// What handling a single candidate produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandidateOutcome {
    /// Nothing happened; keep scanning.
    NoEffect,
    /// A filler was posted (or would have been, in debug mode).
    Filler,
    /// The author was replied to; the run is over.
    Replied,
}

pub struct RunController {
    catalog: RuleCatalog,
    filter: CandidateFilter,
    policy: EngagementPolicy,
    dedup: DedupGuard,
    composer: ReplyComposer,
    transport: Arc<dyn StatusTransport>,
    store: Arc<dyn EngagementStore>,
    debug: bool,
    filler_mode: FillerMode,
    rng: StdRng,
}

impl RunController {
    /// Build a controller. The RNG is seeded from `config.seed` when set.
    pub fn new(
        config: &BotConfig,
        catalog: RuleCatalog,
        deps: RunDeps,
    ) -> Result<Self, ConfigError> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, catalog, deps, rng)
    }

    pub fn with_rng(
        config: &BotConfig,
        catalog: RuleCatalog,
        deps: RunDeps,
        rng: StdRng,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            catalog,
            filter: CandidateFilter::new(&config.bot_handle, deps.classifier),
            policy: EngagementPolicy::new(config.policy.clone())?,
            dedup: DedupGuard::new(Arc::clone(&deps.store), config.dedup_window),
            composer: ReplyComposer::new(),
            transport: deps.transport,
            store: deps.store,
            debug: config.debug,
            filler_mode: config.filler_mode,
            rng,
        })
    }

    /// Run one invocation against a randomly picked rule.
    pub async fn run_once(&mut self) -> RunReport {
        let rule = self.catalog.pick_random(&mut self.rng).clone();
        self.run_rule(&rule).await
    }

    /// Run one invocation against `rule`, which must belong to the catalog.
    pub async fn run_rule(&mut self, rule: &Rule) -> RunReport {
        let mut report = RunReport {
            search_term: rule.search_term.clone(),
            ..RunReport::default()
        };

        if !self.catalog.contains(&rule.search_term, &rule.language) {
            warn!(
                rule = %rule.search_term,
                language = %rule.language,
                "Rule is not in the catalog, skipping run"
            );
            return report;
        }

        let candidates = match self.transport.search(&rule.search_term).await {
            Ok(c) => c,
            Err(e) => {
                error!(
                    transport = self.transport.name(),
                    rule = %rule.search_term,
                    error = %e,
                    "Search failed"
                );
                report.errors += 1;
                return report;
            }
        };

        for candidate in &candidates {
            report.candidates_seen += 1;

            if !self.filter.matches(candidate, rule) {
                continue;
            }
            report.matched += 1;

            match self.handle_candidate(candidate, rule, &mut report).await {
                CandidateOutcome::NoEffect => {}
                CandidateOutcome::Filler => {
                    report.fillers_posted += 1;
                    if self.filler_mode == FillerMode::Stop {
                        break;
                    }
                }
                CandidateOutcome::Replied => {
                    report.replied_to = Some(candidate.author_handle.clone());
                    break;
                }
            }
        }

        info!(
            rule = %report.search_term,
            candidates = report.candidates_seen,
            matched = report.matched,
            fillers = report.fillers_posted,
            replied_to = report.replied_to.as_deref().unwrap_or("-"),
            errors = report.errors,
            debug = self.debug,
            "Run complete"
        );
        report
    }

    async fn handle_candidate(
        &mut self,
        candidate: &SearchCandidate,
        rule: &Rule,
        report: &mut RunReport,
    ) -> CandidateOutcome {
        let action = self.policy.decide(&mut self.rng);
        debug!(candidate = %candidate.id, action = action.label(), "Policy decision");

        if action.is_filler() {
            let decoration = self.composer.pick_decoration(&mut self.rng);
            let text = if action == EngagementAction::FillerFromRule {
                self.composer.compose_filler_from_rule(rule, decoration)
            } else {
                self.composer.compose_filler_friendly(decoration)
            };
            return if self.publish(&text, None, candidate, report).await {
                CandidateOutcome::Filler
            } else {
                CandidateOutcome::NoEffect
            };
        }

        match action {
            EngagementAction::Reply => self.reply(candidate, rule, report).await,
            _ => CandidateOutcome::NoEffect,
        }
    }

    async fn reply(
        &mut self,
        candidate: &SearchCandidate,
        rule: &Rule,
        report: &mut RunReport,
    ) -> CandidateOutcome {
        match self
            .dedup
            .already_engaged(&candidate.author_handle, &rule.search_term, &rule.language)
            .await
        {
            Ok(false) => {}
            Ok(true) => return CandidateOutcome::NoEffect,
            Err(e) => {
                // Without history we cannot rule out a repeat; skip.
                error!(candidate = %candidate.id, error = %e, "Dedup lookup failed");
                report.errors += 1;
                return CandidateOutcome::NoEffect;
            }
        }

        let text = self.composer.compose_reply(&candidate.author_handle, rule);
        if !self.publish(&text, Some(&candidate.id), candidate, report).await {
            return CandidateOutcome::NoEffect;
        }

        let record = EngagementRecord::new(candidate, rule, Utc::now(), self.debug);
        if let Err(e) = self.store.append(&record).await {
            // The reply is already out; the run still ends here.
            error!(
                candidate = %candidate.id,
                screen_name = %candidate.author_handle,
                error = %e,
                "Failed to record engagement"
            );
            report.errors += 1;
        }

        info!(
            candidate = %candidate.id,
            screen_name = %candidate.author_handle,
            rule = %rule.search_term,
            dry_run = self.debug,
            "Replied to user"
        );
        CandidateOutcome::Replied
    }

    /// Post `text` unless in debug mode. Returns whether it counts as posted.
    async fn publish(
        &self,
        text: &str,
        in_reply_to: Option<&str>,
        candidate: &SearchCandidate,
        report: &mut RunReport,
    ) -> bool {
        if self.debug {
            info!(candidate = %candidate.id, text, "Debug mode, not posting");
            return true;
        }

        match self.transport.post(text, in_reply_to).await {
            Ok(status) => {
                debug!(candidate = %candidate.id, posted = %status.id, "Posted status");
                true
            }
            Err(e) => {
                warn!(
                    transport = self.transport.name(),
                    candidate = %candidate.id,
                    in_reply_to = in_reply_to.unwrap_or("-"),
                    error = %e,
                    "Post failed"
                );
                report.errors += 1;
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    use crate::error::{ClassificationError, TransportError};
    use crate::lang::Classification;
    use crate::pipeline::policy::PolicyConfig;
    use crate::pipeline::types::PostedStatus;
    use crate::store::LibSqlBackend;

    struct AlwaysSpanish;

    impl LanguageClassifier for AlwaysSpanish {
        fn classify(&self, _text: &str) -> Result<Classification, ClassificationError> {
            Ok(Classification {
                language: "es".into(),
                confidence: 1.0,
            })
        }
    }

    #[derive(Default)]
    struct StubTransport {
        results: Vec<SearchCandidate>,
        fail_search: bool,
        posts: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl StatusTransport for StubTransport {
        fn name(&self) -> &str {
            "stub"
        }

        async fn search(&self, _query: &str) -> Result<Vec<SearchCandidate>, TransportError> {
            if self.fail_search {
                return Err(TransportError::RateLimited {
                    operation: "search".into(),
                    retry_after: None,
                });
            }
            Ok(self.results.clone())
        }

        async fn post(
            &self,
            text: &str,
            in_reply_to: Option<&str>,
        ) -> Result<PostedStatus, TransportError> {
            self.posts
                .lock()
                .unwrap()
                .push((text.to_string(), in_reply_to.map(String::from)));
            Ok(PostedStatus {
                id: "posted".into(),
                text: text.into(),
            })
        }
    }

    fn candidate(id: &str, user: &str, text: &str) -> SearchCandidate {
        SearchCandidate {
            id: id.into(),
            author_handle: user.into(),
            text: text.into(),
            created_at: Utc::now(),
            place: None,
            coordinates: None,
        }
    }

    async fn controller(
        transport: Arc<StubTransport>,
        policy: PolicyConfig,
        debug: bool,
    ) -> (RunController, Arc<LibSqlBackend>) {
        let store = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mut config = BotConfig::new("ortograbot");
        config.debug = debug;
        config.policy = policy;
        let deps = RunDeps {
            transport,
            classifier: Arc::new(AlwaysSpanish),
            store: store.clone(),
        };
        let controller = RunController::with_rng(
            &config,
            RuleCatalog::default_rules(),
            deps,
            StdRng::seed_from_u64(5),
        )
        .unwrap();
        (controller, store)
    }

    fn always_reply() -> PolicyConfig {
        PolicyConfig {
            reply_probability: 1.0,
            ..PolicyConfig::default()
        }
    }

    fn ti_rule() -> Rule {
        RuleCatalog::default_rules().all_rules()[0].clone()
    }

    #[tokio::test]
    async fn non_matching_candidates_have_no_effect() {
        let transport = Arc::new(StubTransport {
            results: vec![
                candidate("1", "ana", "tíiene algo"),
                candidate("2", "luis", "@ortograbot para tí"),
            ],
            ..StubTransport::default()
        });
        let (mut ctl, _) = controller(transport.clone(), always_reply(), false).await;

        let report = ctl.run_rule(&ti_rule()).await;
        assert_eq!(report.candidates_seen, 2);
        assert_eq!(report.matched, 0);
        assert!(report.replied_to.is_none());
        assert!(transport.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn reply_is_posted_in_thread_and_recorded() {
        let transport = Arc::new(StubTransport {
            results: vec![candidate("77", "ana", "esto es para tí")],
            ..StubTransport::default()
        });
        let (mut ctl, store) = controller(transport.clone(), always_reply(), false).await;

        let report = ctl.run_rule(&ti_rule()).await;
        assert_eq!(report.replied_to.as_deref(), Some("ana"));

        let posts = transport.posts.lock().unwrap().clone();
        assert_eq!(posts.len(), 1);
        assert!(posts[0].0.starts_with("@ana ti nunca lleva tilde"));
        assert_eq!(posts[0].1.as_deref(), Some("77"));

        let record = store
            .find_recent("ana", "tí", "es", Utc::now() - chrono::Duration::hours(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.status_id, "77");
        assert!(!record.dry_run);
    }

    #[tokio::test]
    async fn rule_outside_catalog_is_not_run() {
        let transport = Arc::new(StubTransport {
            results: vec![candidate("1", "ana", "hay que haber si viene")],
            ..StubTransport::default()
        });
        let (mut ctl, store) = controller(transport.clone(), always_reply(), false).await;

        let report = ctl.run_rule(&Rule::new("haber", "a ver", "es")).await;
        assert_eq!(report.candidates_seen, 0);
        assert!(report.replied_to.is_none());
        assert!(transport.posts.lock().unwrap().is_empty());
        assert_eq!(
            store
                .count_since(Utc::now() - chrono::Duration::days(1))
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn search_failure_is_swallowed() {
        let transport = Arc::new(StubTransport {
            fail_search: true,
            ..StubTransport::default()
        });
        let (mut ctl, _) = controller(transport, always_reply(), false).await;

        let report = ctl.run_once().await;
        assert_eq!(report.errors, 1);
        assert_eq!(report.candidates_seen, 0);
    }

    #[tokio::test]
    async fn skip_only_policy_posts_nothing() {
        let transport = Arc::new(StubTransport {
            results: vec![candidate("1", "ana", "para tí"), candidate("2", "eva", "a tí")],
            ..StubTransport::default()
        });
        let policy = PolicyConfig {
            reply_probability: 0.0,
            fillers_enabled: false,
            ..PolicyConfig::default()
        };
        let (mut ctl, _) = controller(transport.clone(), policy, false).await;

        let report = ctl.run_rule(&ti_rule()).await;
        assert_eq!(report.matched, 2);
        assert_eq!(report.fillers_posted, 0);
        assert!(transport.posts.lock().unwrap().is_empty());
    }
}
