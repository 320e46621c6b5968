use std::collections::HashSet;
use std::str::FromStr;

use lazy_static::lazy_static;
use num::ToPrimitive;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Columns every case file must carry. Other vitaldb columns are ignored.
    pub static ref REQUIRED_COLUMNS: HashSet<&'static str> = [
        "age",
        "opstart",
        "opend",
        "icu_days",
        "asa",
        "intraop_ebl",
        "death_inhosp",
        "department",
        "optype",
        "ane_type",
        "opname",
        "subjectid",
    ]
    .into_iter()
    .collect();
}

/// One surgical case of the vitaldb export.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct CaseRecord {
    /// Age in years, may be fractional for infants
    #[serde(deserialize_with = "blank_as_zero")]
    pub age: f64,

    /// Operation start, seconds from case start
    #[serde(deserialize_with = "blank_as_zero")]
    pub opstart: f64,

    /// Operation end, seconds from case start
    #[serde(deserialize_with = "blank_as_zero")]
    pub opend: f64,

    #[serde(deserialize_with = "blank_as_zero")]
    pub icu_days: f64,

    /// ASA physical status score
    #[serde(deserialize_with = "whole_score")]
    pub asa: u8,

    /// Estimated intraoperative blood loss in mL
    #[serde(deserialize_with = "blank_as_zero")]
    pub intraop_ebl: f64,

    /// In-hospital death flag, stored as 0/1 in the file
    #[serde(deserialize_with = "flag")]
    pub death_inhosp: bool,

    pub department: String,
    pub optype: String,
    pub ane_type: String,
    pub opname: String,
    pub subjectid: String,
}

impl CaseRecord {
    pub fn age_group(&self) -> u32 {
        age_group(self.age)
    }

    pub fn duration_hours(&self) -> f64 {
        (self.opend - self.opstart) / 3600.0
    }
}

/// Bucket an age into its decade: 23 -> 20, 9 -> 0.
pub fn age_group(age: f64) -> u32 {
    // NaN and negative ages saturate to bucket 0
    ((age / 10.0).floor() * 10.0) as u32
}

/// Slider text for a bucket, e.g. "20-29".
pub fn age_group_label(group: u32) -> String {
    format!("{}-{}", group, group.saturating_add(9))
}

fn blank_as_zero<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(T::default());
    }
    raw.parse::<T>().map_err(de::Error::custom)
}

fn whole_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value: f64 = blank_as_zero(deserializer)?;
    if value.fract() != 0.0 {
        return Err(de::Error::custom(format!("score {value} is not a whole number")));
    }
    value
        .to_u8()
        .ok_or_else(|| de::Error::custom(format!("score {value} out of range")))
}

fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value: f64 = blank_as_zero(deserializer)?;
    match value.to_u8() {
        Some(0) if value.fract() == 0.0 => Ok(false),
        Some(1) if value.fract() == 0.0 => Ok(true),
        _ => Err(de::Error::custom(format!("flag must be 0 or 1, got {value}"))),
    }
}

#[cfg(test)]
pub(crate) fn case(age: f64, department: &str, optype: &str, ane_type: &str) -> CaseRecord {
    CaseRecord {
        age,
        opstart: 0.0,
        opend: 3600.0,
        icu_days: 0.0,
        asa: 2,
        intraop_ebl: 0.0,
        death_inhosp: false,
        department: department.to_string(),
        optype: optype.to_string(),
        ane_type: ane_type.to_string(),
        opname: "Test operation".to_string(),
        subjectid: "1".to_string(),
    }
}
