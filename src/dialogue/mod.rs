//! Turn handling: operation dispatch, slot folding, and the response
//! envelope handed back to the turn event source.
//!
//! Every turn produces a complete envelope. Faults never escape a turn: the
//! top-level guard converts anything unexpected into the generic "try again"
//! phrase and keeps the session alive.

use crate::catalog::ServiceCatalog;
use crate::config::Config;
use crate::error::Result;
use crate::scheduling::{self, DayOfWeekRule, RecurrenceWindow};
use crate::session::{OneTimeSlot, ServiceSelection, SessionManager, SessionState};
use crate::slots::{self, RawSlot, SlotResolution};
use crate::speech::{format_date_es, format_time_es, MessageStore};
use crate::submission::{AuthContext, SubmissionCoordinator, SubmissionStatus};
use crate::transport::BackendTransport;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

// Operation names, matched exactly.
pub const OP_VALIDATE_ONCE: &str = "APIValidateArgsOnce";
pub const OP_ADD_DOW: &str = "APIAddDow";
pub const OP_VALIDATE_RECURRING: &str = "APIValidateArgsRecurring";
pub const OP_REQUEST_VOLUNTEER: &str = "APIRequestVolunteer";
pub const OP_SERVICES: &str = "APIServices";
pub const OP_SERVICES_HELP: &str = "APIServicesHelp";

/// Envelope status for turns that never reached the submission layer.
pub const STATUS_OK: u8 = 0;
pub const STATUS_VALIDATION: u8 = 1;
pub const STATUS_UNRESOLVED: u8 = 6;

/// One discrete event from the turn event source.
#[derive(Debug, Clone)]
pub enum TurnEvent {
    SessionStart {
        session_id: String,
        locale: Option<String>,
    },
    ApiCall {
        session_id: String,
        locale: Option<String>,
        name: String,
        slots: HashMap<String, RawSlot>,
        auth: AuthContext,
    },
    Utterance {
        session_id: String,
        locale: Option<String>,
        text: String,
    },
    SessionEnd {
        session_id: String,
    },
}

/// UI directives for the turn event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    ResetContext,
    OfferAccountLinking,
    /// Hand control to another operation with pre-filled slots. Hosting
    /// layers that script multi-step flows emit this themselves; the engine
    /// only produces the variants above.
    DelegateToOperation {
        name: String,
        slots: HashMap<String, String>,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiPayload {
    pub status: u8,
    pub message: String,
    pub data: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnResponse {
    pub payload: ApiPayload,
    pub end_session: bool,
    pub directives: Vec<Directive>,
}

impl TurnResponse {
    fn speak(status: u8, message: String) -> Self {
        Self {
            payload: ApiPayload {
                status,
                message,
                data: Vec::new(),
            },
            end_session: false,
            directives: Vec::new(),
        }
    }

    fn with_directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self
    }
}

type Clock = Box<dyn Fn() -> NaiveDate + Send + Sync>;

pub struct DialogueEngine {
    config: Config,
    catalog: Arc<ServiceCatalog>,
    messages: Arc<MessageStore>,
    sessions: SessionManager,
    coordinator: SubmissionCoordinator,
    today: Clock,
}

impl DialogueEngine {
    pub fn new(config: Config, transport: Arc<dyn BackendTransport>) -> Self {
        Self::with_components(
            config,
            transport,
            Arc::new(MessageStore::new()),
            Arc::new(ServiceCatalog::standard()),
            Box::new(|| Utc::now().date_naive()),
        )
    }

    /// Full injection point: tests pin the message chooser and the clock.
    pub fn with_components(
        config: Config,
        transport: Arc<dyn BackendTransport>,
        messages: Arc<MessageStore>,
        catalog: Arc<ServiceCatalog>,
        today: Clock,
    ) -> Self {
        let coordinator = SubmissionCoordinator::new(
            transport,
            Arc::clone(&messages),
            Arc::clone(&catalog),
            config.backend.clone(),
            config.scheduling.max_window_days,
        );
        Self {
            config,
            catalog,
            messages,
            sessions: SessionManager::new(),
            coordinator,
            today,
        }
    }

    /// Handle one turn. Infallible by contract: internal faults become the
    /// generic error phrase.
    pub async fn handle_turn(&self, event: TurnEvent) -> TurnResponse {
        let locale = self.locale_of(&event);
        match self.dispatch(event).await {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(%error, "turn handling fault, recovering with generic response");
                TurnResponse::speak(
                    STATUS_VALIDATION,
                    self.messages.render(&locale, "error", &[]),
                )
            }
        }
    }

    fn locale_of(&self, event: &TurnEvent) -> String {
        let locale = match event {
            TurnEvent::SessionStart { locale, .. }
            | TurnEvent::ApiCall { locale, .. }
            | TurnEvent::Utterance { locale, .. } => locale.clone(),
            TurnEvent::SessionEnd { .. } => None,
        };
        locale.unwrap_or_else(|| self.config.speech.default_locale.clone())
    }

    async fn dispatch(&self, event: TurnEvent) -> Result<TurnResponse> {
        let locale = self.locale_of(&event);
        match event {
            TurnEvent::SessionStart { .. } => Ok(TurnResponse::speak(
                STATUS_OK,
                self.messages.render(&locale, "welcome", &[]),
            )),
            TurnEvent::Utterance { text, .. } => {
                tracing::debug!(text, "fallback utterance");
                Ok(TurnResponse::speak(
                    STATUS_UNRESOLVED,
                    self.messages.render(&locale, "fallback", &[]),
                ))
            }
            TurnEvent::SessionEnd { session_id } => {
                self.sessions.end_session(&session_id);
                Ok(TurnResponse {
                    payload: ApiPayload::default(),
                    end_session: true,
                    directives: Vec::new(),
                })
            }
            TurnEvent::ApiCall {
                session_id,
                name,
                slots,
                auth,
                ..
            } => {
                tracing::debug!(operation = %name, session = %session_id, "api turn");
                match name.as_str() {
                    OP_VALIDATE_ONCE => self.validate_once(&locale, &session_id, &slots),
                    OP_ADD_DOW => self.add_dow(&locale, &session_id, &slots),
                    OP_VALIDATE_RECURRING => self.validate_recurring(&locale, &session_id, &slots),
                    OP_REQUEST_VOLUNTEER => {
                        Ok(self.request_volunteer(&locale, &session_id, &auth).await)
                    }
                    OP_SERVICES => Ok(self.list_services(&locale, &auth).await),
                    OP_SERVICES_HELP => Ok(self.services_help(&locale, &auth)),
                    other => {
                        tracing::warn!(operation = other, "unknown operation name");
                        Ok(TurnResponse::speak(
                            STATUS_UNRESOLVED,
                            self.messages.render(&locale, "fallback", &[]),
                        ))
                    }
                }
            }
        }
    }

    // ─── Operations ──────────────────────────────────────────────────────

    fn validate_once(
        &self,
        locale: &str,
        session_id: &str,
        slots: &HashMap<String, RawSlot>,
    ) -> Result<TurnResponse> {
        let service = resolve_slot(slots, "service");
        let Some(service_id) = service.match_id.clone() else {
            return Ok(TurnResponse::speak(
                STATUS_VALIDATION,
                self.messages.render(locale, "service-unknown", &[]),
            ));
        };
        let Ok(entry) = self.catalog.resolve(&service_id) else {
            return Ok(TurnResponse::speak(
                STATUS_VALIDATION,
                self.messages.render(locale, "service-unknown", &[]),
            ));
        };

        let date = slots::parse_date("date", &resolve_slot(slots, "date").resolved_value)?;
        let start =
            slots::parse_time("starttime", &resolve_slot(slots, "starttime").resolved_value)?;
        let duration =
            scheduling::parse_iso8601(&resolve_slot(slots, "duration").resolved_value)?;
        let end = scheduling::end_of(start, duration);

        self.sessions.with_session(session_id, |state| {
            state.set_service(ServiceSelection {
                id: entry.id.clone(),
                spoken_name: entry.spoken_name.clone(),
            });
            state.set_one_time(OneTimeSlot { date, start, end });
        });

        let mut message = self.messages.render(
            locale,
            "confirm-once",
            &[
                entry.spoken_name.clone(),
                format_date_es(date),
                format_time_es(start),
                format_time_es(end),
            ],
        );
        if entry.family_only {
            message.push_str(&self.messages.render(locale, "blind-families-only", &[]));
        }

        Ok(TurnResponse::speak(STATUS_OK, message))
    }

    fn add_dow(
        &self,
        locale: &str,
        session_id: &str,
        slots: &HashMap<String, RawSlot>,
    ) -> Result<TurnResponse> {
        let selection = match resolve_slot(slots, "service").match_id {
            Some(service_id) => match self.catalog.resolve(&service_id) {
                Ok(entry) => Some(ServiceSelection {
                    id: entry.id.clone(),
                    spoken_name: entry.spoken_name.clone(),
                }),
                Err(_) => {
                    return Ok(TurnResponse::speak(
                        STATUS_VALIDATION,
                        self.messages.render(locale, "service-unknown", &[]),
                    ));
                }
            },
            None => None,
        };

        let dow = resolve_slot(slots, "dow");
        let weekday = slots::parse_weekday_es("dow", &dow.resolved_value)?;
        let start =
            slots::parse_time("starttime", &resolve_slot(slots, "starttime").resolved_value)?;
        let duration =
            scheduling::parse_iso8601(&resolve_slot(slots, "duration").resolved_value)?;

        self.sessions.with_session(session_id, |state| {
            if let Some(selection) = selection {
                state.set_service(selection);
            }
            state.push_rule(DayOfWeekRule::new(
                weekday,
                dow.resolved_value.clone(),
                start,
                duration,
            ));
        });

        // Silent accumulation turn: the confirmation comes with the window.
        Ok(TurnResponse::speak(STATUS_OK, String::new()))
    }

    fn validate_recurring(
        &self,
        locale: &str,
        session_id: &str,
        slots: &HashMap<String, RawSlot>,
    ) -> Result<TurnResponse> {
        let since =
            slots::parse_date("datesince", &resolve_slot(slots, "datesince").resolved_value)?;
        let until =
            slots::parse_date("dateuntil", &resolve_slot(slots, "dateuntil").resolved_value)?;
        let window = RecurrenceWindow { since, until };

        let state = self.sessions.with_session(session_id, |state| {
            state.set_recurrence_window(window);
            state.clone()
        });

        if let Err(violation) = scheduling::validate_window(
            window,
            (self.today)(),
            self.config.scheduling.max_window_days,
        ) {
            return Ok(TurnResponse::speak(
                STATUS_VALIDATION,
                self.messages.render(locale, violation.message_key(), &[]),
            ));
        }

        let spoken_rules = state
            .rules()
            .iter()
            .map(|rule| {
                self.messages
                    .render(
                        locale,
                        "rec-item",
                        &[
                            rule.spoken_day.clone(),
                            format_time_es(rule.start),
                            format_time_es(rule.end),
                        ],
                    )
                    .trim_end()
                    .to_string()
            })
            .collect::<Vec<_>>()
            .join(" y ");

        let spoken_service = state
            .service()
            .map(|service| service.spoken_name.clone())
            .unwrap_or_default();

        let mut message = self.messages.render(
            locale,
            "confirm-rec",
            &[
                spoken_service,
                spoken_rules,
                format_date_es(since),
                format_date_es(until),
            ],
        );

        // The eligibility advisory is appended for recurring requests just
        // like for one-time ones; it never replaces the confirmation.
        let family_only = state
            .service()
            .and_then(|service| self.catalog.resolve(&service.id).ok())
            .is_some_and(|entry| entry.family_only);
        if family_only {
            message.push_str(&self.messages.render(locale, "blind-families-only", &[]));
        }

        Ok(TurnResponse::speak(STATUS_OK, message))
    }

    async fn request_volunteer(
        &self,
        locale: &str,
        session_id: &str,
        auth: &AuthContext,
    ) -> TurnResponse {
        let state: SessionState = self.sessions.snapshot(session_id);
        let result = self
            .coordinator
            .submit(locale, &state, auth, (self.today)())
            .await;

        if result.status == SubmissionStatus::Ok {
            self.sessions
                .with_session(session_id, SessionState::clear_after_submission);
        }

        let mut response = TurnResponse::speak(result.status.code(), result.message);
        response.payload.data = result.data;
        if result.status == SubmissionStatus::NotLinked {
            response = response.with_directive(Directive::OfferAccountLinking);
        }
        response
    }

    async fn list_services(&self, locale: &str, auth: &AuthContext) -> TurnResponse {
        let result = self.coordinator.list_services(locale, auth).await;
        let mut response = TurnResponse::speak(result.status.code(), result.message);
        response.payload.data = result.data;
        if result.status == SubmissionStatus::NotLinked {
            response = response.with_directive(Directive::OfferAccountLinking);
        }
        response
    }

    fn services_help(&self, locale: &str, auth: &AuthContext) -> TurnResponse {
        if auth.access_token.is_none() {
            return TurnResponse::speak(
                SubmissionStatus::NotLinked.code(),
                self.messages.render(locale, "account-not-linked", &[]),
            )
            .with_directive(Directive::OfferAccountLinking);
        }

        let mut data: Vec<String> = self
            .catalog
            .offered()
            .map(|entry| entry.spoken_name.clone())
            .collect();
        data.push(
            self.messages
                .render(locale, "services-help-prompt", &[])
                .trim_end()
                .to_string(),
        );

        let mut response = TurnResponse::speak(STATUS_OK, String::new());
        response.payload.data = data;
        response.with_directive(Directive::ResetContext)
    }
}

fn resolve_slot(slots: &HashMap<String, RawSlot>, name: &str) -> SlotResolution {
    match slots.get(name) {
        Some(raw) => slots::resolve(name, raw),
        None => slots::resolve(name, &RawSlot::unfilled()),
    }
}
