//! Builds normalized submission payloads and drives the backend calls.
//!
//! Every backend invocation is raced against a fixed timeout: whichever
//! settles first wins. The losing call is abandoned (the spawned task keeps
//! running to completion with no observable effect), not cancelled.

use crate::catalog::ServiceCatalog;
use crate::config::BackendConfig;
use crate::error::{Result, ScheduleError, SubmissionError, VoluntariaError};
use crate::scheduling::{self, ScheduledOccurrence};
use crate::session::{Periodicity, SessionState};
use crate::speech::{
    apocopate, cardinal_es, format_date_es, format_time_es, ordinal_es, Gender, MessageStore,
};
use crate::transport::{weekday_code_name_es, ActiveServiceRow, BackendTransport};
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Ok,
    ValidationError,
    Overlap,
    Timeout,
    BackendError,
    NotLinked,
}

impl SubmissionStatus {
    /// Numeric rank for the response envelope.
    pub fn code(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::ValidationError => 1,
            Self::Overlap => 2,
            Self::Timeout => 3,
            Self::BackendError => 4,
            Self::NotLinked => 5,
        }
    }
}

/// Outcome of a submission or inquiry, ready to speak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionResult {
    pub status: SubmissionStatus,
    pub message: String,
    pub data: Vec<String>,
}

impl SubmissionResult {
    fn new(status: SubmissionStatus, message: String) -> Self {
        Self {
            status,
            message,
            data: Vec::new(),
        }
    }
}

/// Authenticated identity carried by a turn. The beneficiary code comes out
/// of the access token; decoding it is the turn source's concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthContext {
    pub access_token: Option<String>,
    pub beneficiary_code: Option<String>,
}

// ─── Payload ─────────────────────────────────────────────────────────────────

/// The backend's `L~Lunes` style weekday labels.
pub fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "L~Lunes",
        Weekday::Tue => "M~Martes",
        Weekday::Wed => "X~Miércoles",
        Weekday::Thu => "J~Jueves",
        Weekday::Fri => "V~Viernes",
        Weekday::Sat => "S~Sábado",
        Weekday::Sun => "D~Domingo",
    }
}

/// One-time and recurring submissions have different shapes: recurring
/// carries parallel per-occurrence arrays, one-time single scalar fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulePayload {
    OneTime {
        date: NaiveDate,
        weekday_label: String,
        start: NaiveTime,
        end: NaiveTime,
    },
    Recurring {
        first_date: NaiveDate,
        last_date: NaiveDate,
        dates: Vec<NaiveDate>,
        weekday_labels: Vec<String>,
        starts: Vec<NaiveTime>,
        ends: Vec<NaiveTime>,
    },
}

/// Transport-agnostic submission record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub transaction_id: Uuid,
    pub service_name: String,
    pub subprogram_code: String,
    pub beneficiary_code: String,
    pub beneficiary_kind: String,
    pub schedule: SchedulePayload,
}

/// Flatten the session state into a payload. Recurring requests expand the
/// window against the weekday rules here; the occurrence list is never
/// stored, only recomputed.
///
/// The window is validated again at this point: session state may hold a
/// window the user was already told is invalid, and a once-valid window can
/// go stale between confirmation and submission.
pub fn build_payload(
    state: &SessionState,
    catalog: &ServiceCatalog,
    beneficiary_code: &str,
    beneficiary_kind: &str,
    today: NaiveDate,
    max_window_days: i64,
) -> Result<SubmissionPayload> {
    let service = state
        .service()
        .ok_or(SubmissionError::IncompleteState("service"))?;
    let entry = catalog.resolve(&service.id)?;

    let schedule = match state.periodicity() {
        Some(Periodicity::OneTime) => {
            let slot = state
                .one_time()
                .ok_or(SubmissionError::IncompleteState("date"))?;
            SchedulePayload::OneTime {
                date: slot.date,
                weekday_label: weekday_label(slot.date.weekday()).to_string(),
                start: slot.start,
                end: slot.end,
            }
        }
        Some(Periodicity::Recurring) => {
            let window = state
                .window()
                .ok_or(SubmissionError::IncompleteState("recurrence window"))?;
            scheduling::validate_window(window, today, max_window_days)
                .map_err(ScheduleError::InvalidWindow)?;
            if state.rules().is_empty() {
                return Err(ScheduleError::NoRules.into());
            }
            let occurrences = scheduling::expand(window, state.rules());
            let (Some(first), Some(last)) = (occurrences.first(), occurrences.last()) else {
                return Err(ScheduleError::NoRules.into());
            };
            SchedulePayload::Recurring {
                first_date: first.date,
                last_date: last.date,
                dates: occurrences.iter().map(|o| o.date).collect(),
                weekday_labels: occurrences
                    .iter()
                    .map(|o| weekday_label(o.weekday).to_string())
                    .collect(),
                starts: occurrences.iter().map(|o| o.start).collect(),
                ends: occurrences.iter().map(|o| o.end).collect(),
            }
        }
        None => return Err(SubmissionError::IncompleteState("periodicity").into()),
    };

    Ok(SubmissionPayload {
        transaction_id: Uuid::new_v4(),
        service_name: entry.service_name.clone(),
        subprogram_code: entry.subprogram_code.clone(),
        beneficiary_code: beneficiary_code.to_string(),
        beneficiary_kind: beneficiary_kind.to_string(),
        schedule,
    })
}

/// The occurrences a submission would claim, for overlap checking.
fn proposed_occurrences(state: &SessionState) -> Vec<ScheduledOccurrence> {
    match state.periodicity() {
        Some(Periodicity::OneTime) => state
            .one_time()
            .map(|slot| {
                vec![ScheduledOccurrence {
                    date: slot.date,
                    weekday: slot.date.weekday(),
                    start: slot.start,
                    end: slot.end,
                }]
            })
            .unwrap_or_default(),
        Some(Periodicity::Recurring) => state
            .window()
            .map(|window| scheduling::expand(window, state.rules()))
            .unwrap_or_default(),
        None => Vec::new(),
    }
}

/// True when any proposed occurrence intersects an existing row on the same
/// date. Intervals are half-open on both sides: touching end-to-start is
/// not a conflict.
pub fn overlaps(proposed: &[ScheduledOccurrence], existing: &[ActiveServiceRow]) -> bool {
    proposed.iter().any(|occurrence| {
        existing.iter().any(|row| {
            row.date == occurrence.date && occurrence.start < row.end && row.start < occurrence.end
        })
    })
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

enum RaceOutcome<T> {
    Settled(T),
    TimedOut,
}

/// First-settle-wins race between a backend call and a fixed timeout. On
/// timeout the spawned call is left running detached; its eventual
/// completion has no observable effect.
async fn race<T, F>(timeout_ms: u64, call: F) -> RaceOutcome<anyhow::Result<T>>
where
    T: Send + 'static,
    F: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    let mut in_flight = tokio::spawn(call);
    tokio::select! {
        joined = &mut in_flight => match joined {
            Ok(result) => RaceOutcome::Settled(result),
            Err(join_error) => {
                RaceOutcome::Settled(Err(anyhow::anyhow!("backend task failed: {join_error}")))
            }
        },
        () = tokio::time::sleep(std::time::Duration::from_millis(timeout_ms)) => {
            RaceOutcome::TimedOut
        }
    }
}

pub struct SubmissionCoordinator {
    transport: Arc<dyn BackendTransport>,
    messages: Arc<MessageStore>,
    catalog: Arc<ServiceCatalog>,
    config: BackendConfig,
    max_window_days: i64,
}

impl SubmissionCoordinator {
    pub fn new(
        transport: Arc<dyn BackendTransport>,
        messages: Arc<MessageStore>,
        catalog: Arc<ServiceCatalog>,
        config: BackendConfig,
        max_window_days: i64,
    ) -> Self {
        Self {
            transport,
            messages,
            catalog,
            config,
            max_window_days,
        }
    }

    fn say(&self, locale: &str, key: &str, args: &[String]) -> String {
        self.messages.render(locale, key, args)
    }

    /// Submit the accumulated request. Never returns an error: every
    /// failure mode becomes a speakable `SubmissionResult`.
    pub async fn submit(
        &self,
        locale: &str,
        state: &SessionState,
        auth: &AuthContext,
        today: NaiveDate,
    ) -> SubmissionResult {
        let (Some(token), Some(beneficiary)) =
            (auth.access_token.clone(), auth.beneficiary_code.clone())
        else {
            return SubmissionResult::new(
                SubmissionStatus::NotLinked,
                self.say(locale, "account-not-linked", &[]),
            );
        };

        let payload = match build_payload(
            state,
            &self.catalog,
            &beneficiary,
            &self.config.beneficiary_kind,
            today,
            self.max_window_days,
        ) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(%error, "submission rejected before reaching the backend");
                let message = match &error {
                    VoluntariaError::Schedule(ScheduleError::InvalidWindow(violation)) => {
                        self.say(locale, violation.message_key(), &[])
                    }
                    _ => self.say(locale, "error", &[]),
                };
                return SubmissionResult::new(SubmissionStatus::ValidationError, message);
            }
        };

        // Real conflict check against the beneficiary's active services. A
        // failed listing must not block the submission itself.
        match self.fetch_active_rows(&beneficiary, &token).await {
            Ok(rows) => {
                if overlaps(&proposed_occurrences(state), &rows) {
                    return SubmissionResult::new(
                        SubmissionStatus::Overlap,
                        self.say(locale, "service-overlaps", &[]),
                    );
                }
            }
            Err(error) => {
                tracing::warn!(%error, "overlap check skipped, proceeding with submission");
            }
        }

        let transport = Arc::clone(&self.transport);
        let outcome = race(self.config.submit_timeout_ms, async move {
            transport.submit_service_request(payload, token).await
        })
        .await;

        match outcome {
            RaceOutcome::TimedOut => SubmissionResult::new(
                SubmissionStatus::Timeout,
                self.say(locale, "timeout-transact", &[]),
            ),
            RaceOutcome::Settled(Err(error)) => {
                tracing::error!(%error, "submission transport failure");
                let message = format!(
                    "{}{}",
                    self.say(locale, "request-denied", &[]),
                    self.say(locale, "error-ws", &[])
                );
                SubmissionResult::new(SubmissionStatus::BackendError, message)
            }
            RaceOutcome::Settled(Ok(ack)) if ack.code == 0 => SubmissionResult::new(
                SubmissionStatus::Ok,
                self.say(locale, "request-accepted", &[]),
            ),
            RaceOutcome::Settled(Ok(ack)) => {
                let message = ack
                    .advisory
                    .filter(|advisory| !advisory.is_empty())
                    .map_or_else(|| self.say(locale, "error-ws", &[]), |advisory| advisory);
                SubmissionResult::new(SubmissionStatus::BackendError, message)
            }
        }
    }

    /// Verify a beneficiary code and fetch the programs granted to it. Runs
    /// during account linking, so it gets the shorter timeout budget.
    pub async fn lookup_identity(
        &self,
        code: &str,
        credential: &str,
    ) -> Result<crate::transport::BeneficiaryProfile> {
        let transport = Arc::clone(&self.transport);
        let code_owned = code.to_string();
        let credential_owned = credential.to_string();
        let outcome = race(self.config.identity_timeout_ms, async move {
            transport.lookup_identity(code_owned, credential_owned).await
        })
        .await;

        match outcome {
            RaceOutcome::TimedOut => {
                Err(SubmissionError::Timeout(self.config.identity_timeout_ms).into())
            }
            RaceOutcome::Settled(Err(error)) => {
                Err(SubmissionError::Transport(error.to_string()).into())
            }
            RaceOutcome::Settled(Ok(response)) => {
                if response.ack.code != 0 {
                    return Err(SubmissionError::Rejected(
                        response.ack.advisory.unwrap_or_default(),
                    )
                    .into());
                }
                response
                    .profile
                    .ok_or_else(|| SubmissionError::Transport("identity response without profile".into()).into())
            }
        }
    }

    /// Read-only inquiry: the beneficiary's active services as spoken
    /// summaries.
    pub async fn list_services(&self, locale: &str, auth: &AuthContext) -> SubmissionResult {
        let (Some(token), Some(beneficiary)) =
            (auth.access_token.clone(), auth.beneficiary_code.clone())
        else {
            return SubmissionResult::new(
                SubmissionStatus::NotLinked,
                self.say(locale, "account-not-linked", &[]),
            );
        };

        let rows = match self.fetch_active_rows(&beneficiary, &token).await {
            Ok(rows) => rows,
            Err(error) => {
                return match error {
                    FetchError::TimedOut => SubmissionResult::new(
                        SubmissionStatus::Timeout,
                        self.say(locale, "timeout-transact", &[]),
                    ),
                    FetchError::Rejected(advisory) if !advisory.is_empty() => {
                        SubmissionResult::new(SubmissionStatus::BackendError, advisory)
                    }
                    FetchError::Rejected(_) | FetchError::Transport(_) => SubmissionResult::new(
                        SubmissionStatus::BackendError,
                        self.say(locale, "error-ws", &[]),
                    ),
                };
            }
        };

        let summaries = summarize_services(&rows, &self.messages, locale);
        if summaries.is_empty() {
            let mut result = SubmissionResult::new(
                SubmissionStatus::Ok,
                self.say(locale, "no-active-services", &[]),
            );
            result.data = summaries;
            return result;
        }

        let count = summaries.len() as u64;
        let plural = if count == 1 { "" } else { "s" };
        let mut result = SubmissionResult::new(
            SubmissionStatus::Ok,
            self.say(
                locale,
                "services-count",
                &[
                    apocopate(cardinal_es(count, Gender::Masculine)),
                    plural.to_string(),
                ],
            ),
        );
        result.data = summaries;
        result
    }

    async fn fetch_active_rows(
        &self,
        beneficiary: &str,
        token: &str,
    ) -> std::result::Result<Vec<ActiveServiceRow>, FetchError> {
        let transport = Arc::clone(&self.transport);
        let beneficiary_owned = beneficiary.to_string();
        let token_owned = token.to_string();
        let outcome = race(self.config.submit_timeout_ms, async move {
            transport
                .list_active_services(beneficiary_owned, token_owned)
                .await
        })
        .await;

        match outcome {
            RaceOutcome::TimedOut => Err(FetchError::TimedOut),
            RaceOutcome::Settled(Err(error)) => Err(FetchError::Transport(error.to_string())),
            RaceOutcome::Settled(Ok(response)) => {
                if response.ack.code != 0 {
                    return Err(FetchError::Rejected(
                        response.ack.advisory.unwrap_or_default(),
                    ));
                }
                Ok(response.rows)
            }
        }
    }
}

#[derive(Debug)]
enum FetchError {
    TimedOut,
    Rejected(String),
    Transport(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimedOut => write!(f, "listing timed out"),
            Self::Rejected(advisory) => write!(f, "listing rejected: {advisory}"),
            Self::Transport(error) => write!(f, "listing transport failure: {error}"),
        }
    }
}

// ─── Active-service summaries ────────────────────────────────────────────────

struct ServiceGroup {
    program_name: String,
    subprogram_name: String,
    first_date: NaiveDate,
    last_date: NaiveDate,
    occurrence_count: u64,
    /// Deduplicated (weekday code, start, end) triples, first-seen order.
    days: Vec<(String, NaiveTime, NaiveTime)>,
}

/// Group denormalized rows by service id and phrase them. A service with a
/// single occurrence reads as one-time; anything else as periodic.
fn summarize_services(
    rows: &[ActiveServiceRow],
    messages: &MessageStore,
    locale: &str,
) -> Vec<String> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: std::collections::HashMap<String, ServiceGroup> =
        std::collections::HashMap::new();

    for row in rows {
        let group = groups
            .entry(row.service_id.clone())
            .or_insert_with(|| {
                order.push(row.service_id.clone());
                ServiceGroup {
                    program_name: row.program_name.clone(),
                    subprogram_name: row.subprogram_name.clone(),
                    first_date: row.date,
                    last_date: row.date,
                    occurrence_count: 0,
                    days: Vec::new(),
                }
            });
        group.first_date = group.first_date.min(row.date);
        group.last_date = group.last_date.max(row.date);
        group.occurrence_count += 1;
        let triple = (row.weekday_code.clone(), row.start, row.end);
        if !group.days.contains(&triple) {
            group.days.push(triple);
        }
    }

    let several = order.len() > 1;
    order
        .iter()
        .filter_map(|id| groups.get(id))
        .enumerate()
        .map(|(index, group)| {
            let body = if group.occurrence_count == 1 {
                let (_, start, end) = &group.days[0];
                messages.render(
                    locale,
                    "service-once-detail",
                    &[
                        group.program_name.clone(),
                        group.subprogram_name.clone(),
                        format_date_es(group.first_date),
                        format_time_es(*start),
                        format_time_es(*end),
                    ],
                )
            } else {
                let mut day_lines = String::new();
                for (code, start, end) in &group.days {
                    day_lines.push_str(
                        messages
                            .render(
                                locale,
                                "service-periodic-day",
                                &[
                                    weekday_code_name_es(code).to_string(),
                                    format_time_es(*start),
                                    format_time_es(*end),
                                ],
                            )
                            .trim_end(),
                    );
                }
                messages.render(
                    locale,
                    "service-periodic-detail",
                    &[
                        group.program_name.clone(),
                        group.subprogram_name.clone(),
                        cardinal_es(group.occurrence_count, Gender::Feminine),
                        format_date_es(group.first_date),
                        format_date_es(group.last_date),
                        day_lines,
                    ],
                )
            };
            // Spoken position when the listing has more than one service.
            let ordinal = ordinal_es(index as u64 + 1);
            if several && !ordinal.is_empty() {
                format!(
                    "{}{}",
                    messages.render(locale, "service-position", &[ordinal.to_string()]),
                    body
                )
            } else {
                body
            }
        })
        .map(|line| line.trim_end().to_string())
        .collect()
}
