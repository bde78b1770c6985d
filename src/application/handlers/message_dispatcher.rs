use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    application::{
        handlers::outcome_recorder::DeliveryOutcomeRecorder,
        services::{clock::Clock, messenger::MessengerClient, rate_limiter::SendIntervals},
    },
    domain::{
        errors::DispatchError,
        models::{DispatchUnit, Transition},
    },
};

/// Added to every wait so the next check lands past the boundary.
pub const SLEEP_EPSILON: Duration = Duration::from_millis(10);

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub sent: usize,
    pub failed: usize,
    /// Failed attempts that went back to the queue.
    pub retried: usize,
    /// Messages whose outcome could not be stored.
    pub unrecorded: Vec<Uuid>,
}

/// Drains a queue of messages for one messenger under its per-chat and
/// global rate limits.
///
/// Owns both send clocks; one instance per messenger per run.
pub struct MessageDispatcher {
    client: Arc<dyn MessengerClient>,
    recorder: DeliveryOutcomeRecorder,
    clock: Arc<dyn Clock>,
    intervals: SendIntervals,
    queue: VecDeque<DispatchUnit>,
    last_sent_per_chat: HashMap<Uuid, DateTime<Utc>>,
    last_sent_global: Option<DateTime<Utc>>,
}

impl MessageDispatcher {
    pub fn new(
        client: Arc<dyn MessengerClient>,
        recorder: DeliveryOutcomeRecorder,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DispatchError> {
        let intervals = SendIntervals::for_client(client.as_ref())?;

        Ok(Self {
            client,
            recorder,
            clock,
            intervals,
            queue: VecDeque::new(),
            last_sent_per_chat: HashMap::new(),
            last_sent_global: None,
        })
    }

    pub fn intervals(&self) -> SendIntervals {
        self.intervals
    }

    pub fn enqueue(&mut self, unit: DispatchUnit) {
        self.queue.push_back(unit);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Runs until every unit is sent, failed for good, or could not be recorded.
    pub async fn run(mut self) -> DispatchReport {
        let mut report = DispatchReport::default();
        let messenger = self.client.messenger();
        info!(%messenger, queued = self.len(), "dispatching messages");

        while !self.is_empty() {
            // Units requeued during a pass wait for the next one.
            let pass = self.len();
            for _ in 0..pass {
                let Some(unit) = self.queue.pop_front() else {
                    break;
                };

                let now = self.clock.now();
                let chat_wait = self
                    .intervals
                    .chat_wait(now, self.last_sent_per_chat.get(&unit.chat_id).copied());
                let global_wait = self.intervals.global_wait(now, self.last_sent_global);

                if chat_wait.is_zero() && global_wait.is_zero() {
                    self.attempt(unit, &mut report).await;
                    continue;
                }

                self.queue.push_back(unit);
                // Nothing else in the queue may go out before the global limit allows it.
                if !global_wait.is_zero() {
                    self.clock.sleep(global_wait + SLEEP_EPSILON).await;
                }
            }

            if let Some(wait) = self.next_chat_wait() {
                if !wait.is_zero() {
                    debug!(wait_ms = wait.as_millis() as u64, queued = self.queue.len(), "waiting for chat limits");
                    self.clock.sleep(wait + SLEEP_EPSILON).await;
                }
            }
        }

        info!(
            %messenger,
            sent = report.sent,
            failed = report.failed,
            retried = report.retried,
            unrecorded = report.unrecorded.len(),
            "dispatch finished"
        );
        report
    }

    async fn attempt(&mut self, mut unit: DispatchUnit, report: &mut DispatchReport) {
        let outcome = self.client.send(&unit).await;
        let transition = unit.resolve(&outcome);

        if let Transition::Sent { sent_at } = &transition {
            self.last_sent_per_chat.insert(unit.chat_id, *sent_at);
            self.last_sent_global = Some(*sent_at);
            report.sent += 1;
        }

        let recorded = self.recorder.record(&unit, &transition).await;

        match (transition, recorded) {
            (Transition::Sent { .. }, Ok(())) => {
                debug!(message_id = %unit.message_id, chat_id = %unit.chat_id, "message sent");
            }
            (Transition::Sent { .. }, Err(err)) => {
                // Still `Created` in storage: a later run will deliver it again.
                error!(
                    message_id = %unit.message_id,
                    error = %err,
                    "message delivered but its status was not recorded"
                );
                report.unrecorded.push(unit.message_id);
            }
            (Transition::Retry { retry_count, error }, Ok(())) => {
                warn!(
                    message_id = %unit.message_id,
                    retry_count,
                    code = error.code,
                    reason = %error.message,
                    "delivery failed, will retry"
                );
                unit.retry_count = retry_count;
                report.retried += 1;
                self.queue.push_back(unit);
            }
            (Transition::Retry { .. }, Err(err)) => {
                error!(
                    message_id = %unit.message_id,
                    error = %err,
                    "failed to record retry, dropping message from this run"
                );
                report.unrecorded.push(unit.message_id);
            }
            (Transition::Failed { retry_count, error }, recorded) => {
                warn!(
                    message_id = %unit.message_id,
                    retry_count,
                    code = error.code,
                    reason = %error.message,
                    "delivery failed permanently"
                );
                report.failed += 1;
                if let Err(err) = recorded {
                    error!(message_id = %unit.message_id, error = %err, "failed to record delivery failure");
                    report.unrecorded.push(unit.message_id);
                }
            }
        }
    }

    /// Shortest wait until any queued unit's chat is ready again.
    fn next_chat_wait(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.queue
            .iter()
            .map(|unit| {
                self.intervals
                    .chat_wait(now, self.last_sent_per_chat.get(&unit.chat_id).copied())
            })
            .min()
    }
}

impl Extend<DispatchUnit> for MessageDispatcher {
    fn extend<I: IntoIterator<Item = DispatchUnit>>(&mut self, units: I) {
        self.queue.extend(units);
    }
}
