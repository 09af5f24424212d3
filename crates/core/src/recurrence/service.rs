//! Recurring-event generation service - core business logic

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cadence_domain::{
    CadenceError, Event, GenerationBatch, GenerationConfig, NewEvent, RecurrenceRule, Result,
    RuleProgress,
};
use chrono::{Days, NaiveDate};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use super::calculator::next_occurrence;
use super::materializer::materialize;
use super::ports::{Clock, EventRepository, RecurrenceRuleRepository};

/// What happened to a single rule during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RuleOutcome {
    /// New instances were committed together with the rule's progress.
    Generated { count: usize },
    /// Nothing new inside the horizon.
    UpToDate,
    /// The parent event no longer exists.
    SkippedOrphan,
    /// `max_occurrences` already reached.
    SkippedExhausted,
    /// Today is past `end_date`.
    SkippedExpired,
    /// Decoding or persistence failed; the rule's stored state is unchanged.
    Failed { error: CadenceError },
}

/// Per-rule entry of a [`GenerationReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub rule_id: i64,
    pub event_id: i64,
    pub outcome: RuleOutcome,
}

/// Summary of one generation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationReport {
    pub run_date: NaiveDate,
    pub instances_created: usize,
    pub rules: Vec<RuleReport>,
}

impl GenerationReport {
    fn new(run_date: NaiveDate) -> Self {
        Self { run_date, instances_created: 0, rules: Vec::new() }
    }

    fn record(&mut self, rule_id: i64, event_id: i64, outcome: RuleOutcome) {
        if let RuleOutcome::Generated { count } = outcome {
            self.instances_created += count;
        }
        self.rules.push(RuleReport { rule_id, event_id, outcome });
    }

    /// Number of rules that failed this pass.
    pub fn failed_rules(&self) -> usize {
        self.rules.iter().filter(|rule| matches!(rule.outcome, RuleOutcome::Failed { .. })).count()
    }

    /// Outcome recorded for `rule_id`, if the rule was visited.
    pub fn outcome_for(&self, rule_id: i64) -> Option<&RuleOutcome> {
        self.rules.iter().find(|rule| rule.rule_id == rule_id).map(|rule| &rule.outcome)
    }
}

/// Materializes instances of recurring events up to a look-ahead horizon.
///
/// Passes are serialized through an internal run lock: [`generate`] waits for
/// a running pass to finish, [`try_generate`] gives up immediately.
///
/// [`generate`]: GenerationService::generate
/// [`try_generate`]: GenerationService::try_generate
pub struct GenerationService {
    events: Arc<dyn EventRepository>,
    rules: Arc<dyn RecurrenceRuleRepository>,
    clock: Arc<dyn Clock>,
    look_ahead: Days,
    operation_timeout: Duration,
    run_lock: Mutex<()>,
}

impl GenerationService {
    /// Create a new generation service
    pub fn new(
        events: Arc<dyn EventRepository>,
        rules: Arc<dyn RecurrenceRuleRepository>,
        clock: Arc<dyn Clock>,
        config: &GenerationConfig,
    ) -> Self {
        Self {
            events,
            rules,
            clock,
            look_ahead: Days::new(u64::from(config.look_ahead_days)),
            operation_timeout: Duration::from_secs(config.operation_timeout_secs),
            run_lock: Mutex::new(()),
        }
    }

    /// Run one pass, waiting for any pass already in progress.
    ///
    /// Only a failure to list rules fails the pass; per-rule failures are
    /// reported in the returned [`GenerationReport`].
    pub async fn generate(&self) -> Result<GenerationReport> {
        let _guard = self.run_lock.lock().await;
        self.run_pass().await
    }

    /// Run one pass unless another is in progress, in which case `None`.
    pub async fn try_generate(&self) -> Option<Result<GenerationReport>> {
        let _guard = self.run_lock.try_lock().ok()?;
        Some(self.run_pass().await)
    }

    /// Whether a pass currently holds the run lock.
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    #[instrument(skip(self))]
    async fn run_pass(&self) -> Result<GenerationReport> {
        let started = Instant::now();
        let today = self.clock.today();
        let horizon = today.checked_add_days(self.look_ahead).unwrap_or(NaiveDate::MAX);

        let loaded = self.bounded("list_active", self.rules.list_active()).await?;
        let mut report = GenerationReport::new(today);

        for entry in loaded {
            match entry {
                Ok(rule) => {
                    let outcome = match self.process_rule(&rule, today, horizon).await {
                        Ok(outcome) => outcome,
                        Err(err) => {
                            error!(
                                rule_id = rule.id,
                                error_kind = err.label(),
                                error = %err,
                                "Recurrence rule generation failed"
                            );
                            RuleOutcome::Failed { error: err }
                        }
                    };
                    report.record(rule.id, rule.event_id, outcome);
                }
                Err(invalid) => {
                    warn!(
                        rule_id = invalid.rule_id,
                        event_id = invalid.event_id,
                        error = %invalid.error,
                        "Skipping recurrence rule with invalid pattern"
                    );
                    report.record(
                        invalid.rule_id,
                        invalid.event_id,
                        RuleOutcome::Failed { error: invalid.error },
                    );
                }
            }
        }

        info!(
            %today,
            %horizon,
            rules = report.rules.len(),
            generated = report.instances_created,
            failed = report.failed_rules(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Recurring event generation finished"
        );

        Ok(report)
    }

    async fn process_rule(
        &self,
        rule: &RecurrenceRule,
        today: NaiveDate,
        horizon: NaiveDate,
    ) -> Result<RuleOutcome> {
        let Some(parent) = self.bounded("find_event", self.events.find_event(rule.event_id)).await?
        else {
            warn!(rule_id = rule.id, event_id = rule.event_id, "Parent event missing, skipping rule");
            return Ok(RuleOutcome::SkippedOrphan);
        };

        if rule.max_reached() {
            info!(rule_id = rule.id, "Recurrence rule reached max_occurrences");
            return Ok(RuleOutcome::SkippedExhausted);
        }
        if rule.expired_on(today) {
            info!(rule_id = rule.id, end_date = ?rule.bounds.end_date, "Recurrence rule has ended");
            return Ok(RuleOutcome::SkippedExpired);
        }

        let (instances, anchor) = self.collect_instances(rule, &parent, horizon).await?;
        if instances.is_empty() {
            debug!(rule_id = rule.id, "Recurrence rule up to date");
            return Ok(RuleOutcome::UpToDate);
        }

        let count = instances.len();
        let created = u32::try_from(count).unwrap_or(u32::MAX);
        let batch = GenerationBatch {
            rule_id: rule.id,
            instances,
            progress: RuleProgress {
                occurrences_created: rule.progress.occurrences_created.saturating_add(created),
                last_generated_date: Some(anchor),
            },
        };
        self.bounded("commit_generation", self.rules.commit_generation(batch)).await?;

        info!(
            rule_id = rule.id,
            event_id = parent.id,
            generated = count,
            last_generated_date = %anchor,
            "Generated recurring event instances"
        );
        Ok(RuleOutcome::Generated { count })
    }

    /// Walk the rule forward from its anchor, staging every date inside the
    /// horizon and bounds that does not already have an instance. Returns the
    /// staged instances and the last date visited.
    async fn collect_instances(
        &self,
        rule: &RecurrenceRule,
        parent: &Event,
        horizon: NaiveDate,
    ) -> Result<(Vec<NewEvent>, NaiveDate)> {
        let budget = rule.remaining_budget().map(|left| usize::try_from(left).unwrap_or(usize::MAX));
        let mut anchor = rule.progress.last_generated_date.unwrap_or(parent.date);
        let mut instances = Vec::new();

        loop {
            if budget.is_some_and(|budget| instances.len() >= budget) {
                break;
            }

            let next = next_occurrence(&rule.pattern, anchor);
            if next <= anchor || next > horizon || !rule.permits_date(next) {
                break;
            }

            let exists = self
                .bounded("instance_exists", self.events.instance_exists(parent.id, next))
                .await?;
            if exists {
                debug!(rule_id = rule.id, date = %next, "Instance already exists, skipping");
            } else {
                instances.push(materialize(parent, next));
            }
            anchor = next;
        }

        Ok((instances, anchor))
    }

    async fn bounded<T, F>(&self, operation: &'static str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.operation_timeout, future).await.unwrap_or_else(|_| {
            Err(CadenceError::Timeout(format!(
                "{operation} did not complete within {}s",
                self.operation_timeout.as_secs()
            )))
        })
    }
}
