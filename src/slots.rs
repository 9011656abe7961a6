use crate::error::{Result, SlotError};
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Entity-resolution status codes as the turn provider reports them.
pub const RESOLUTION_MATCH: &str = "ER_SUCCESS_MATCH";
pub const RESOLUTION_NO_MATCH: &str = "ER_SUCCESS_NO_MATCH";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    ExactMatch,
    NoMatch,
    Unresolved,
}

/// One entity-resolution candidate attached to a raw slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionCandidate {
    pub id: String,
    pub name: String,
}

/// A slot exactly as the turn event source delivered it, before any policy
/// is applied. `resolution_code` is absent for free-dictation slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSlot {
    pub heard: Option<String>,
    pub confirmation: Option<String>,
    pub resolution_code: Option<String>,
    pub candidates: Vec<ResolutionCandidate>,
}

impl RawSlot {
    /// A slot the user never filled this turn.
    pub fn unfilled() -> Self {
        Self::default()
    }

    /// Tolerant ingestion of the provider's JSON slot shape.
    ///
    /// Anything unexpected degrades to the unfilled slot; the collaborator's
    /// malformation is a log line, never an error.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let Some(object) = value.as_object() else {
            tracing::debug!("slot payload is not an object, treating as unfilled");
            return Self::unfilled();
        };

        let heard = object
            .get("value")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);
        let confirmation = object
            .get("confirmationStatus")
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);

        let authority = object
            .get("resolutions")
            .and_then(|r| r.get("resolutionsPerAuthority"))
            .and_then(|a| a.get(0));

        let Some(authority) = authority else {
            return Self {
                heard,
                confirmation,
                resolution_code: None,
                candidates: Vec::new(),
            };
        };

        let resolution_code = authority
            .get("status")
            .and_then(|s| s.get("code"))
            .and_then(serde_json::Value::as_str)
            .map(ToString::to_string);

        let candidates = authority
            .get("values")
            .and_then(serde_json::Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(|candidate| {
                        let inner = candidate.get("value")?;
                        Some(ResolutionCandidate {
                            id: inner.get("id")?.as_str()?.to_string(),
                            name: inner.get("name")?.as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            heard,
            confirmation,
            resolution_code,
            candidates,
        }
    }
}

/// The outcome of resolving one slot for one turn.
///
/// Not persisted beyond the turn: the dialogue layer folds the derived
/// values into session state and drops the resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotResolution {
    pub match_id: Option<String>,
    pub heard_as: String,
    pub resolved_value: String,
    pub confirmation: String,
    pub match_status: MatchStatus,
}

impl SlotResolution {
    fn unfilled() -> Self {
        Self {
            match_id: None,
            heard_as: String::new(),
            resolved_value: String::new(),
            confirmation: String::new(),
            match_status: MatchStatus::Unresolved,
        }
    }

    pub fn is_filled(&self) -> bool {
        !self.resolved_value.is_empty()
    }
}

/// Apply the resolution policy to one raw slot.
pub fn resolve(name: &str, slot: &RawSlot) -> SlotResolution {
    let Some(heard) = slot.heard.clone() else {
        return SlotResolution::unfilled();
    };
    let confirmation = slot.confirmation.clone().unwrap_or_default();

    match slot.resolution_code.as_deref() {
        Some(RESOLUTION_MATCH) => {
            let Some(candidate) = slot.candidates.first() else {
                tracing::debug!(slot = name, "authority match without candidates, treating as unfilled");
                return SlotResolution::unfilled();
            };
            SlotResolution {
                match_id: Some(candidate.id.clone()),
                heard_as: heard,
                resolved_value: candidate.name.clone(),
                confirmation,
                match_status: MatchStatus::ExactMatch,
            }
        }
        Some(RESOLUTION_NO_MATCH) => SlotResolution {
            match_id: None,
            heard_as: heard,
            resolved_value: String::new(),
            confirmation,
            match_status: MatchStatus::NoMatch,
        },
        Some(other) => {
            tracing::debug!(slot = name, code = other, "unrecognized resolution code");
            SlotResolution {
                match_id: None,
                heard_as: heard,
                resolved_value: String::new(),
                confirmation,
                match_status: MatchStatus::Unresolved,
            }
        }
        // Free dictation: echo the heard text verbatim.
        None => SlotResolution {
            match_id: None,
            heard_as: heard.clone(),
            resolved_value: heard,
            confirmation,
            match_status: MatchStatus::Unresolved,
        },
    }
}

// ─── Typed parsing of resolved values ────────────────────────────────────────

pub fn parse_date(name: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        SlotError::Parse {
            name: name.to_string(),
            value: value.to_string(),
            expected: "ISO date",
        }
        .into()
    })
}

pub fn parse_time(name: &str, value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|_| {
        SlotError::Parse {
            name: name.to_string(),
            value: value.to_string(),
            expected: "HH:MM time",
        }
        .into()
    })
}

/// Spanish weekday names as the speech model emits them.
pub fn parse_weekday_es(name: &str, value: &str) -> Result<Weekday> {
    match value.trim().to_lowercase().as_str() {
        "lunes" => Ok(Weekday::Mon),
        "martes" => Ok(Weekday::Tue),
        "miércoles" | "miercoles" => Ok(Weekday::Wed),
        "jueves" => Ok(Weekday::Thu),
        "viernes" => Ok(Weekday::Fri),
        "sábado" | "sabado" => Ok(Weekday::Sat),
        "domingo" => Ok(Weekday::Sun),
        _ => Err(SlotError::Parse {
            name: name.to_string(),
            value: value.to_string(),
            expected: "Spanish weekday name",
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn authority_match() -> RawSlot {
        RawSlot {
            heard: Some("acompañante".into()),
            confirmation: Some("NONE".into()),
            resolution_code: Some(RESOLUTION_MATCH.into()),
            candidates: vec![ResolutionCandidate {
                id: "61000".into(),
                name: "acompañamiento".into(),
            }],
        }
    }

    #[test]
    fn authority_match_yields_exact_match_with_id() {
        let resolution = resolve("service", &authority_match());
        assert_eq!(resolution.match_status, MatchStatus::ExactMatch);
        assert_eq!(resolution.match_id.as_deref(), Some("61000"));
        assert_eq!(resolution.resolved_value, "acompañamiento");
        assert_eq!(resolution.heard_as, "acompañante");
    }

    #[test]
    fn explicit_no_match_yields_empty_value() {
        let slot = RawSlot {
            heard: Some("jardinería".into()),
            confirmation: None,
            resolution_code: Some(RESOLUTION_NO_MATCH.into()),
            candidates: Vec::new(),
        };
        let resolution = resolve("service", &slot);
        assert_eq!(resolution.match_status, MatchStatus::NoMatch);
        assert!(resolution.match_id.is_none());
        assert!(resolution.resolved_value.is_empty());
        assert_eq!(resolution.heard_as, "jardinería");
    }

    #[test]
    fn free_dictation_echoes_heard_text() {
        let slot = RawSlot {
            heard: Some("2026-09-07".into()),
            confirmation: None,
            resolution_code: None,
            candidates: Vec::new(),
        };
        let resolution = resolve("date", &slot);
        assert_eq!(resolution.match_status, MatchStatus::Unresolved);
        assert_eq!(resolution.resolved_value, "2026-09-07");
    }

    #[test]
    fn unfilled_slot_yields_empty_resolution() {
        let resolution = resolve("date", &RawSlot::unfilled());
        assert_eq!(resolution.match_status, MatchStatus::Unresolved);
        assert!(resolution.heard_as.is_empty());
        assert!(!resolution.is_filled());
    }

    #[test]
    fn match_without_candidates_degrades_to_unfilled() {
        let mut slot = authority_match();
        slot.candidates.clear();
        let resolution = resolve("service", &slot);
        assert!(!resolution.is_filled());
        assert!(resolution.match_id.is_none());
    }

    #[test]
    fn from_json_parses_provider_shape() {
        let value = json!({
            "value": "acompañante",
            "confirmationStatus": "NONE",
            "resolutions": {
                "resolutionsPerAuthority": [{
                    "status": { "code": "ER_SUCCESS_MATCH" },
                    "values": [{ "value": { "id": "61000", "name": "acompañamiento" } }]
                }]
            }
        });
        let slot = RawSlot::from_json(&value);
        assert_eq!(slot.resolution_code.as_deref(), Some(RESOLUTION_MATCH));
        assert_eq!(slot.candidates.len(), 1);
        assert_eq!(slot.candidates[0].id, "61000");
    }

    #[test]
    fn from_json_degrades_on_malformed_payload() {
        let slot = RawSlot::from_json(&json!([1, 2, 3]));
        assert!(slot.heard.is_none());

        let slot = RawSlot::from_json(&json!({ "resolutions": 42 }));
        assert!(slot.resolution_code.is_none());
    }

    #[test]
    fn weekday_parsing_handles_accents() {
        assert_eq!(parse_weekday_es("dow", "miércoles").unwrap(), Weekday::Wed);
        assert_eq!(parse_weekday_es("dow", "Sabado").unwrap(), Weekday::Sat);
        assert!(parse_weekday_es("dow", "ayer").is_err());
    }

    #[test]
    fn date_and_time_parsing() {
        assert!(parse_date("date", "2026-09-07").is_ok());
        assert!(parse_date("date", "07/09/2026").is_err());
        assert!(parse_time("starttime", "09:30").is_ok());
        assert!(parse_time("starttime", "9 am").is_err());
    }
}
