//! Record selection.
//!
//! Every dimension is optional; `None` is the "all" choice of the original
//! dropdowns and lets every record through.

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CaseError;
use crate::records::{age_group, CaseRecord};

/// Dropdown value meaning "do not filter on this dimension".
pub const ALL: &str = "all";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseFilter {
    pub age_group: Option<u32>,
    pub department: Option<String>,
    pub asa: Option<u8>,
    pub optype: Option<String>,
}

impl CaseFilter {
    /// Build a filter from raw dropdown strings, where `all` disables a dimension.
    pub fn from_choices(
        age: Option<f64>,
        department: &str,
        asa: &str,
        optype: &str,
    ) -> Result<Self, CaseError> {
        Ok(CaseFilter {
            age_group: age.map(age_group),
            department: parse_choice(department)?,
            asa: parse_choice(asa)?,
            optype: parse_choice(optype)?,
        })
    }

    pub fn matches(&self, record: &CaseRecord) -> bool {
        self.matches_attributes(record)
            && self.age_group.map_or(true, |g| record.age_group() == g)
    }

    /// Same as [`matches`](Self::matches) but ignores the age dimension.
    pub fn matches_attributes(&self, record: &CaseRecord) -> bool {
        self.department
            .as_deref()
            .map_or(true, |d| record.department == d)
            && self.asa.map_or(true, |a| record.asa == a)
            && self.optype.as_deref().map_or(true, |t| record.optype == t)
    }

    pub fn without_age(&self) -> Self {
        CaseFilter {
            age_group: None,
            ..self.clone()
        }
    }

    pub fn apply<'a>(&self, records: &'a [CaseRecord]) -> Vec<&'a CaseRecord> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}

fn parse_choice<T>(raw: &str) -> Result<Option<T>, CaseError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case(ALL) {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| CaseError::FilterValue {
            error_message: format!("{raw}: {e}"),
        })
}

/// Values offered by the department, ASA and type dropdowns and the age slider.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub departments: Vec<String>,
    pub asa_scores: Vec<u8>,
    pub optypes: Vec<String>,
    pub age_groups: Vec<u32>,
}

impl FilterOptions {
    pub fn from_records(records: &[CaseRecord]) -> Self {
        let mut departments = BTreeSet::new();
        let mut asa_scores = BTreeSet::new();
        let mut optypes = BTreeSet::new();
        let mut age_groups = BTreeSet::new();

        for record in records {
            departments.insert(record.department.clone());
            asa_scores.insert(record.asa);
            optypes.insert(record.optype.clone());
            age_groups.insert(record.age_group());
        }

        FilterOptions {
            departments: departments.into_iter().collect(),
            asa_scores: asa_scores.into_iter().collect(),
            optypes: optypes.into_iter().collect(),
            age_groups: age_groups.into_iter().collect(),
        }
    }
}
