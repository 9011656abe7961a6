//! Backend transport seam.
//!
//! The legacy backend speaks a SOAP/XML dialect whose multi-value fields are
//! positional arrays joined by `^` inside a single field. That convention
//! stops here: implementations of [`BackendTransport`] hand the core
//! structured records and never leak the delimiter upward.

use crate::error::{Result, SlotError};
use crate::submission::SubmissionPayload;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw result code + advisory text from any backend operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendAck {
    pub code: i32,
    pub advisory: Option<String>,
}

impl BackendAck {
    pub fn ok() -> Self {
        Self {
            code: 0,
            advisory: None,
        }
    }

    pub fn rejected(advisory: impl Into<String>) -> Self {
        Self {
            code: 1,
            advisory: Some(advisory.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramGrant {
    pub code: String,
    pub name: String,
}

/// Identity-lookup result: the beneficiary and the programs they may use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeneficiaryProfile {
    pub code: String,
    pub full_name: Option<String>,
    pub programs: Vec<ProgramGrant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityResponse {
    pub ack: BackendAck,
    pub profile: Option<BeneficiaryProfile>,
}

/// One denormalized row of the beneficiary's active services: one row per
/// scheduled occurrence, repeated service metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveServiceRow {
    pub service_id: String,
    pub program_code: String,
    pub program_name: String,
    pub subprogram_code: String,
    pub subprogram_name: String,
    pub date: NaiveDate,
    pub weekday_code: String,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub ack: BackendAck,
    pub rows: Vec<ActiveServiceRow>,
}

/// Abstract backend operations. Implementations own all wire concerns
/// (endpoints, auth headers, XML/SOAP encoding, delimiter splitting).
#[async_trait]
pub trait BackendTransport: Send + Sync {
    async fn submit_service_request(
        &self,
        payload: SubmissionPayload,
        credential: String,
    ) -> anyhow::Result<BackendAck>;

    async fn lookup_identity(
        &self,
        code: String,
        credential: String,
    ) -> anyhow::Result<IdentityResponse>;

    async fn list_active_services(
        &self,
        beneficiary_code: String,
        credential: String,
    ) -> anyhow::Result<ListResponse>;
}

// ─── Delimited-row parsing (for transport implementations) ──────────────────

/// Split the backend's `^`-joined positional fields into one map per row.
///
/// Fields with an empty value carry no rows (matching the backend's
/// convention for absent columns).
pub fn parse_delimited_fields(fields: &[(&str, &str)]) -> Vec<HashMap<String, String>> {
    let mut rows: Vec<HashMap<String, String>> = Vec::new();
    for (name, joined) in fields {
        if joined.is_empty() {
            continue;
        }
        for (index, value) in joined.split('^').enumerate() {
            if rows.len() <= index {
                rows.push(HashMap::new());
            }
            rows[index].insert((*name).to_string(), value.to_string());
        }
    }
    rows
}

/// Decode active-service rows from the backend's column layout.
pub fn rows_from_delimited(fields: &[(&str, &str)]) -> Result<Vec<ActiveServiceRow>> {
    let records = parse_delimited_fields(fields);
    records
        .into_iter()
        .map(|record| {
            let get = |column: &str| -> Result<String> {
                record.get(column).cloned().ok_or_else(|| {
                    SlotError::Missing {
                        name: column.to_string(),
                    }
                    .into()
                })
            };
            let date_raw = get("LCO_FX_SERV")?;
            let date = NaiveDate::parse_from_str(&date_raw, "%Y%m%d").map_err(|_| {
                SlotError::Parse {
                    name: "LCO_FX_SERV".into(),
                    value: date_raw.clone(),
                    expected: "YYYYMMDD date",
                }
            })?;
            let parse_time = |column: &str, value: String| -> Result<NaiveTime> {
                NaiveTime::parse_from_str(&value, "%H:%M").map_err(|_| {
                    SlotError::Parse {
                        name: column.into(),
                        value,
                        expected: "HH:MM time",
                    }
                    .into()
                })
            };
            Ok(ActiveServiceRow {
                service_id: get("LCO_ID_SERV")?,
                program_code: get("LCO_CD_PROGRAMA")?,
                program_name: get("LCO_DS_PROGRAMA")?,
                subprogram_code: get("LCO_CD_SUBPROGRAMA")?,
                subprogram_name: get("LCO_DS_SUBPROGRAMA")?,
                date,
                weekday_code: get("LCO_DIA_SEMANA")?,
                start: parse_time("LCO_HORA_DESDE", get("LCO_HORA_DESDE")?)?,
                end: parse_time("LCO_HORA_HASTA", get("LCO_HORA_HASTA")?)?,
            })
        })
        .collect()
}

/// Spoken Spanish name for the backend's one-letter weekday codes.
pub fn weekday_code_name_es(code: &str) -> &'static str {
    match code {
        "L" => "lunes",
        "M" => "martes",
        "X" => "miércoles",
        "J" => "jueves",
        "V" => "viernes",
        "S" => "sábados",
        "D" => "domingos",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_fields_split_positionally() {
        let rows = parse_delimited_fields(&[
            ("LCO_ID_SERV", "12^12^13"),
            ("LCO_HORA_DESDE", "09:00^16:00^10:00"),
        ]);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["LCO_ID_SERV"], "12");
        assert_eq!(rows[1]["LCO_HORA_DESDE"], "16:00");
        assert_eq!(rows[2]["LCO_ID_SERV"], "13");
    }

    #[test]
    fn empty_fields_contribute_nothing() {
        let rows = parse_delimited_fields(&[("LCO_OBS", ""), ("LCO_ID_SERV", "7")]);
        assert_eq!(rows.len(), 1);
        assert!(!rows[0].contains_key("LCO_OBS"));
    }

    #[test]
    fn rows_decode_into_structured_records() {
        let rows = rows_from_delimited(&[
            ("LCO_ID_SERV", "12^12"),
            ("LCO_CD_PROGRAMA", "61^61"),
            ("LCO_DS_PROGRAMA", "ACOMPAÑAMIENTO^ACOMPAÑAMIENTO"),
            ("LCO_CD_SUBPROGRAMA", "61000^61000"),
            ("LCO_DS_SUBPROGRAMA", "En general^En general"),
            ("LCO_FX_SERV", "20260907^20260914"),
            ("LCO_DIA_SEMANA", "L^L"),
            ("LCO_HORA_DESDE", "09:00^09:00"),
            ("LCO_HORA_HASTA", "12:00^12:00"),
        ])
        .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].service_id, "12");
        assert_eq!(rows[1].date, chrono::NaiveDate::from_ymd_opt(2026, 9, 14).unwrap());
        assert_eq!(rows[0].weekday_code, "L");
    }

    #[test]
    fn missing_column_is_an_error_not_a_panic() {
        let result = rows_from_delimited(&[("LCO_ID_SERV", "12")]);
        assert!(result.is_err());
    }

    #[test]
    fn weekday_codes_translate() {
        assert_eq!(weekday_code_name_es("X"), "miércoles");
        assert_eq!(weekday_code_name_es("S"), "sábados");
        assert_eq!(weekday_code_name_es("?"), "");
    }
}
