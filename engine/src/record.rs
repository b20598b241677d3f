//! Procurement records as they arrive from the feed and leave the store.

use crate::query::QueryIntent;
use crate::schema::{column, ColumnSet, Table};
use crate::statement::SqlValue;
use crate::{error::Result, Error};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One procurement or auction event.
///
/// Each natural-key field (region, purchase type, ...) pairs with a surrogate
/// id that stays `None` until reference resolution fills it in. Timestamps are
/// offset-less wall-clock values, exactly as stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    /// Database generated id; ignored on write.
    #[serde(default)]
    pub purchase_id: i64,
    pub registry_number: String,
    pub purchase_subject: String,

    #[serde(default, rename = "purchase_abbr")]
    pub purchase_subject_abbr: Option<String>,
    #[serde(skip)]
    pub purchase_subject_abbr_id: Option<i64>,

    #[serde(default)]
    pub purchase_type: Option<String>,
    #[serde(skip)]
    pub purchase_type_id: Option<i64>,

    #[serde(default, with = "feed_time", rename = "collecting_datetime")]
    pub collecting: Option<NaiveDateTime>,
    #[serde(default, with = "feed_time", rename = "approval_datetime")]
    pub approval: Option<NaiveDateTime>,
    #[serde(default, with = "feed_time", rename = "bidding_datetime")]
    pub bidding: Option<NaiveDateTime>,

    #[serde(default)]
    pub region: Option<String>,
    #[serde(skip)]
    pub region_id: Option<i64>,

    #[serde(default)]
    pub customer_type: Option<String>,
    #[serde(skip)]
    pub customer_type_id: Option<i64>,

    #[serde(default)]
    pub max_price: f64,
    #[serde(default)]
    pub application_guarantee: Option<f64>,
    #[serde(default)]
    pub contract_guarantee: Option<f64>,

    #[serde(default)]
    pub status: Option<String>,
    #[serde(skip)]
    pub status_id: Option<i64>,

    #[serde(default)]
    pub our_participants: Option<String>,
    #[serde(default)]
    pub estimation: Option<f64>,

    #[serde(default)]
    pub etp: Option<String>,
    #[serde(skip)]
    pub etp_id: Option<i64>,

    #[serde(default)]
    pub winner: Option<String>,
    #[serde(default)]
    pub winner_price: Option<f64>,
    #[serde(default)]
    pub participants: Option<String>,

    /// Query that produced this row. Never persisted.
    #[serde(skip)]
    pub intent: Option<QueryIntent>,
}

impl PurchaseRecord {
    /// Create a record with just its identifying fields set.
    pub fn new(registry_number: impl Into<String>, purchase_subject: impl Into<String>) -> Self {
        Self {
            registry_number: registry_number.into(),
            purchase_subject: purchase_subject.into(),
            ..Default::default()
        }
    }

    /// Natural-key value this record carries for a lookup table.
    ///
    /// Blank strings count as absent.
    pub fn natural_key(&self, table: Table) -> Option<&str> {
        let value = match table {
            Table::Etp => &self.etp,
            Table::PurchaseStringCodes => &self.purchase_subject_abbr,
            Table::CustomerTypes => &self.customer_type,
            Table::Regions => &self.region,
            Table::PurchaseTypes => &self.purchase_type,
            Table::Statuses => &self.status,
            Table::PurchaseRegistry => return Some(self.registry_number.as_str()),
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    /// Surrogate id resolved for a lookup table.
    pub fn reference_id(&self, table: Table) -> Option<i64> {
        match table {
            Table::Etp => self.etp_id,
            Table::PurchaseStringCodes => self.purchase_subject_abbr_id,
            Table::CustomerTypes => self.customer_type_id,
            Table::Regions => self.region_id,
            Table::PurchaseTypes => self.purchase_type_id,
            Table::Statuses => self.status_id,
            Table::PurchaseRegistry => Some(self.purchase_id),
        }
    }

    pub fn set_reference_id(&mut self, table: Table, id: i64) {
        match table {
            Table::Etp => self.etp_id = Some(id),
            Table::PurchaseStringCodes => self.purchase_subject_abbr_id = Some(id),
            Table::CustomerTypes => self.customer_type_id = Some(id),
            Table::Regions => self.region_id = Some(id),
            Table::PurchaseTypes => self.purchase_type_id = Some(id),
            Table::Statuses => self.status_id = Some(id),
            Table::PurchaseRegistry => self.purchase_id = id,
        }
    }

    /// Whether every natural key present has a resolved id.
    pub fn is_resolved(&self) -> bool {
        Table::PurchaseRegistry
            .references()
            .iter()
            .all(|t| self.natural_key(*t).is_none() || self.reference_id(*t).is_some())
    }

    /// Bind arguments for the main table's write columns, in column order.
    pub fn write_args(&self) -> Result<Vec<SqlValue>> {
        Table::PurchaseRegistry
            .columns(ColumnSet::Write)
            .iter()
            .map(|c| self.write_value(c))
            .collect()
    }

    fn write_value(&self, name: &str) -> Result<SqlValue> {
        let value = match name {
            column::REGISTRY_NUMBER => SqlValue::Text(Some(self.registry_number.clone())),
            column::PURCHASE_SUBJECT => SqlValue::Text(Some(self.purchase_subject.clone())),
            column::PURCHASE_STRING_CODE => SqlValue::BigInt(self.purchase_subject_abbr_id),
            column::PURCHASE_TYPE_ID => SqlValue::BigInt(self.purchase_type_id),
            column::COLLECTING => SqlValue::Timestamp(self.collecting),
            column::APPROVAL_DATE => SqlValue::Timestamp(self.approval),
            column::BIDDING => SqlValue::Timestamp(self.bidding),
            column::REGION_ID => SqlValue::BigInt(self.region_id),
            column::CUSTOMER_TYPE_ID => SqlValue::BigInt(self.customer_type_id),
            column::MAX_PRICE => SqlValue::Double(Some(self.max_price)),
            column::APPLICATION_GUARANTEE => SqlValue::Double(self.application_guarantee),
            column::CONTRACT_GUARANTEE => SqlValue::Double(self.contract_guarantee),
            column::STATUS_ID => SqlValue::BigInt(self.status_id),
            column::OUR_PARTICIPANTS => SqlValue::Text(self.our_participants.clone()),
            column::ESTIMATION => SqlValue::Double(self.estimation),
            column::ETP_ID => SqlValue::BigInt(self.etp_id),
            column::WINNER => SqlValue::Text(self.winner.clone()),
            column::WINNER_PRICE => SqlValue::Double(self.winner_price),
            column::PARTICIPANTS => SqlValue::Text(self.participants.clone()),
            other => {
                return Err(Error::InvalidArgument(format!(
                    "no record field for column {other}"
                )))
            }
        };
        Ok(value)
    }

    /// Last three characters of the registry number, used as a short label.
    pub fn short_number(&self) -> &str {
        let n = &self.registry_number;
        match n.char_indices().rev().nth(2) {
            Some((i, _)) => &n[i..],
            None => "",
        }
    }
}

/// Decode a feed payload: a JSON array of records.
pub fn decode_batch(bytes: &[u8]) -> std::result::Result<Vec<PurchaseRecord>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Feed timestamps.
///
/// Producers send either RFC 3339 (the offset is dropped, wall-clock kept) or
/// naive ISO timestamps. The year-1 zero value means "not set".
mod feed_time {
    use chrono::{DateTime, Datelike, NaiveDateTime};
    use serde::{de, Deserialize, Deserializer, Serializer};

    const NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(t) => serializer.serialize_str(&t.format(NAIVE_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(s) if !s.trim().is_empty() => parse(s.trim()).map_err(de::Error::custom),
            _ => Ok(None),
        }
    }

    pub(super) fn parse(s: &str) -> Result<Option<NaiveDateTime>, chrono::ParseError> {
        let t = match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => dt.naive_local(),
            Err(_) => NaiveDateTime::parse_from_str(s, NAIVE_FORMAT)?,
        };
        if t.year() <= 1 {
            return Ok(None);
        }
        Ok(Some(t))
    }
}
