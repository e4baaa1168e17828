//! Checkpoint records and the ordered checkpoint list of a card.

use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::time::{Millis, UNSET, validate_time_of_day};
use crate::{RallyError, Result};

/// One row of a time card.
///
/// Checkpoint 1 is the rally start, every later checkpoint is a timed control
/// (PKC). All time fields are milliseconds from local midnight, `0` meaning
/// unset; `driving_time` is a duration in the same unit.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "typescript", derive(specta::Type))]
pub struct CheckpointRecord {
    pub number: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provisional_start_time: Millis,
    #[serde(default)]
    pub actual_start_time: Millis,
    #[serde(default)]
    pub finish_time: Millis,
    #[serde(default)]
    pub driving_time: Millis,
    #[serde(default)]
    pub result_time: Millis,
    #[serde(default, rename = "nextPKCTime")]
    pub next_pkc_time: Millis,
    #[serde(default)]
    pub arrival_time: Millis,
}

impl CheckpointRecord {
    /// A fresh record with every time unset.
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self { number, name: name.into(), ..Self::default() }
    }

    /// Whether this is the rally start rather than a PKC.
    pub fn is_start(&self) -> bool {
        self.number == 1
    }

    /// Re-establish the derived fields.
    ///
    /// An unset actual start inherits the provisional start, and the arrival is
    /// the actual start plus the driving time once both are known. The second
    /// rule never feeds the first, so one pass reaches the fixed point.
    pub fn normalize(&mut self) {
        if self.actual_start_time == UNSET && self.provisional_start_time != UNSET {
            self.actual_start_time = self.provisional_start_time;
        }
        if self.driving_time != UNSET && self.actual_start_time != UNSET {
            self.arrival_time = self.actual_start_time.saturating_add(self.driving_time);
        }
    }

    /// Check every entered time against the time-of-day range.
    ///
    /// A stored arrival is only checked when [`normalize`](Self::normalize)
    /// will not recompute it, since a derived arrival may run past midnight.
    pub fn validate(&self) -> Result<()> {
        for field in CheckpointField::ALL {
            if field == CheckpointField::ArrivalTime && self.derives_arrival() {
                continue;
            }
            validate_time_of_day(field.as_str(), self.field(field))?;
        }
        Ok(())
    }

    fn derives_arrival(&self) -> bool {
        self.driving_time != UNSET && (self.actual_start_time != UNSET || self.provisional_start_time != UNSET)
    }

    pub fn field(&self, field: CheckpointField) -> Millis {
        match field {
            CheckpointField::ProvisionalStartTime => self.provisional_start_time,
            CheckpointField::ActualStartTime => self.actual_start_time,
            CheckpointField::FinishTime => self.finish_time,
            CheckpointField::DrivingTime => self.driving_time,
            CheckpointField::ResultTime => self.result_time,
            CheckpointField::NextPkcTime => self.next_pkc_time,
            CheckpointField::ArrivalTime => self.arrival_time,
        }
    }

    /// Set a time field and normalize.
    pub fn set_field(&mut self, field: CheckpointField, value: Millis) -> Result<()> {
        let value = validate_time_of_day(field.as_str(), value)?;
        let slot = match field {
            CheckpointField::ProvisionalStartTime => &mut self.provisional_start_time,
            CheckpointField::ActualStartTime => &mut self.actual_start_time,
            CheckpointField::FinishTime => &mut self.finish_time,
            CheckpointField::DrivingTime => &mut self.driving_time,
            CheckpointField::ResultTime => &mut self.result_time,
            CheckpointField::NextPkcTime => &mut self.next_pkc_time,
            CheckpointField::ArrivalTime => &mut self.arrival_time,
        };
        *slot = value;
        self.normalize();
        Ok(())
    }
}

/// Addressable time fields of a [`CheckpointRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "typescript", derive(specta::Type))]
pub enum CheckpointField {
    ProvisionalStartTime,
    ActualStartTime,
    FinishTime,
    DrivingTime,
    ResultTime,
    #[serde(rename = "nextPKCTime")]
    NextPkcTime,
    ArrivalTime,
}

impl CheckpointField {
    pub const ALL: [CheckpointField; 7] = [
        CheckpointField::ProvisionalStartTime,
        CheckpointField::ActualStartTime,
        CheckpointField::FinishTime,
        CheckpointField::DrivingTime,
        CheckpointField::ResultTime,
        CheckpointField::NextPkcTime,
        CheckpointField::ArrivalTime,
    ];

    /// Wire name of the field.
    pub fn as_str(self) -> &'static str {
        match self {
            CheckpointField::ProvisionalStartTime => "provisionalStartTime",
            CheckpointField::ActualStartTime => "actualStartTime",
            CheckpointField::FinishTime => "finishTime",
            CheckpointField::DrivingTime => "drivingTime",
            CheckpointField::ResultTime => "resultTime",
            CheckpointField::NextPkcTime => "nextPKCTime",
            CheckpointField::ArrivalTime => "arrivalTime",
        }
    }

    /// Durations are entered as lengths rather than clock times.
    pub fn is_duration(self) -> bool {
        matches!(self, CheckpointField::DrivingTime)
    }
}

impl fmt::Display for CheckpointField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointField {
    type Err = RallyError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.replace(['-', '_'], "").to_ascii_lowercase();
        CheckpointField::ALL
            .into_iter()
            .find(|field| field.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| RallyError::parse("checkpoint field", format!("unknown field '{s}'")))
    }
}

/// The ordered checkpoint sequence of one card.
///
/// List order is the chronological order of the rally. Numbers are kept
/// sequential starting at 1. Deserialized lists are validated and normalized
/// on the way in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CheckpointRecord>", into = "Vec<CheckpointRecord>")]
pub struct CheckpointList(Vec<CheckpointRecord>);

impl CheckpointList {
    /// A blank card with `count` checkpoints numbered from 1.
    pub fn new_card(count: u32) -> Self {
        Self((1..=count).map(|number| CheckpointRecord::new(number, "")).collect())
    }

    /// Wrap existing records, normalizing each one.
    pub fn from_records(records: Vec<CheckpointRecord>) -> Self {
        let mut list = Self(records);
        list.normalize_all();
        list
    }

    pub fn records(&self) -> &[CheckpointRecord] {
        &self.0
    }

    pub fn into_records(self) -> Vec<CheckpointRecord> {
        self.0
    }

    pub fn checkpoint(&self, number: u32) -> Option<&CheckpointRecord> {
        self.0.iter().find(|record| record.number == number)
    }

    /// Append a checkpoint and return its number.
    pub fn push_checkpoint(&mut self, name: impl Into<String>) -> u32 {
        let number = self.next_number();
        self.0.push(CheckpointRecord::new(number, name));
        number
    }

    /// Remove a checkpoint and renumber the rest.
    ///
    /// When the start itself is removed, the checkpoint that takes its place
    /// loses its name.
    pub fn remove(&mut self, number: u32) -> Result<CheckpointRecord> {
        let index = self
            .0
            .iter()
            .position(|record| record.number == number)
            .ok_or(RallyError::UnknownCheckpoint { number })?;
        let removed = self.0.remove(index);
        for (position, record) in self.0.iter_mut().enumerate() {
            record.number = position as u32 + 1;
        }
        if index == 0
            && let Some(start) = self.0.first_mut()
        {
            start.name.clear();
        }
        Ok(removed)
    }

    /// Set a time field on one checkpoint and normalize it.
    pub fn set_field(&mut self, number: u32, field: CheckpointField, value: Millis) -> Result<()> {
        self.0
            .iter_mut()
            .find(|record| record.number == number)
            .ok_or(RallyError::UnknownCheckpoint { number })?
            .set_field(field, value)
    }

    pub fn rename(&mut self, number: u32, name: impl Into<String>) -> Result<()> {
        let record = self
            .0
            .iter_mut()
            .find(|record| record.number == number)
            .ok_or(RallyError::UnknownCheckpoint { number })?;
        record.name = name.into();
        Ok(())
    }

    pub fn normalize_all(&mut self) {
        self.0.iter_mut().for_each(CheckpointRecord::normalize);
    }

    fn next_number(&self) -> u32 {
        self.0.len() as u32 + 1
    }
}

impl Deref for CheckpointList {
    type Target = [CheckpointRecord];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<Vec<CheckpointRecord>> for CheckpointList {
    type Error = RallyError;

    fn try_from(records: Vec<CheckpointRecord>) -> Result<Self> {
        for record in &records {
            record.validate()?;
        }
        Ok(Self::from_records(records))
    }
}

impl From<CheckpointList> for Vec<CheckpointRecord> {
    fn from(list: CheckpointList) -> Self {
        list.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn provisional_start_fills_actual_then_driving_time_sets_arrival() {
        let mut record = CheckpointRecord::new(2, "PKC 2");
        record.provisional_start_time = 34_200_000;
        record.normalize();
        assert_eq!(record.actual_start_time, 34_200_000);
        assert_eq!(record.arrival_time, UNSET);

        record.set_field(CheckpointField::DrivingTime, 300_000).unwrap();
        assert_eq!(record.arrival_time, 34_500_000);
    }

    #[test]
    fn explicit_actual_start_is_not_overwritten() {
        let mut record = CheckpointRecord::new(2, "");
        record.set_field(CheckpointField::ActualStartTime, 34_260_000).unwrap();
        record.set_field(CheckpointField::ProvisionalStartTime, 34_200_000).unwrap();
        assert_eq!(record.actual_start_time, 34_260_000);
    }

    #[test]
    fn editing_actual_start_recomputes_arrival() {
        let mut record = CheckpointRecord::new(3, "");
        record.set_field(CheckpointField::ActualStartTime, 36_000_000).unwrap();
        record.set_field(CheckpointField::DrivingTime, 600_000).unwrap();
        assert_eq!(record.arrival_time, 36_600_000);

        record.set_field(CheckpointField::ActualStartTime, 36_060_000).unwrap();
        assert_eq!(record.arrival_time, 36_660_000);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut record = CheckpointRecord::new(2, "");
        let err = record.set_field(CheckpointField::ArrivalTime, 86_400_000).unwrap_err();
        assert!(matches!(err, RallyError::InvalidTime { .. }));
        assert_eq!(record.arrival_time, UNSET);
    }

    #[test]
    fn arrival_saturates_instead_of_overflowing() {
        let mut record = CheckpointRecord::new(1, "");
        record.provisional_start_time = Millis::MAX;
        record.driving_time = 1;
        record.normalize();
        assert_eq!(record.arrival_time, Millis::MAX);
    }

    #[test]
    fn deserialized_lists_reject_out_of_range_times() {
        let negative = r#"[{"number":1,"arrivalTime":-5}]"#;
        assert!(serde_json::from_str::<CheckpointList>(negative).is_err());

        let overflowing = r#"[{"number":1,"provisionalStartTime":9223372036854775807,"drivingTime":1}]"#;
        assert!(serde_json::from_str::<CheckpointList>(overflowing).is_err());

        let records = vec![CheckpointRecord { arrival_time: 999_999_999, ..CheckpointRecord::new(1, "") }];
        let err = CheckpointList::try_from(records).unwrap_err();
        assert!(matches!(err, RallyError::InvalidTime { .. }));
    }

    #[test]
    fn derived_arrival_past_midnight_survives_a_reload() {
        let mut list = CheckpointList::new_card(1);
        list.set_field(1, CheckpointField::ProvisionalStartTime, 86_000_000).unwrap();
        list.set_field(1, CheckpointField::DrivingTime, 1_200_000).unwrap();
        assert_eq!(list[0].arrival_time, 87_200_000);

        let text = serde_json::to_string(&list).unwrap();
        let back: CheckpointList = serde_json::from_str(&text).unwrap();
        assert_eq!(back, list);
    }

    #[test]
    fn removing_renumbers_following_checkpoints() {
        let mut list = CheckpointList::new_card(2);
        let third = list.push_checkpoint("PKC 3");
        assert_eq!(third, 3);
        list.rename(1, "Start").unwrap();

        let removed = list.remove(2).unwrap();
        assert_eq!(removed.number, 2);
        let numbers: Vec<u32> = list.iter().map(|record| record.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(list[1].name, "PKC 3");
        assert_eq!(list[0].name, "Start");
    }

    #[test]
    fn removing_the_start_clears_the_new_start_name() {
        let mut list = CheckpointList::new_card(1);
        list.push_checkpoint("PKC 2");
        list.remove(1).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].number, 1);
        assert!(list[0].name.is_empty());
    }

    #[test]
    fn unknown_checkpoints_are_reported() {
        let mut list = CheckpointList::new_card(2);
        assert!(matches!(list.remove(7), Err(RallyError::UnknownCheckpoint { number: 7 })));
        assert!(list.set_field(9, CheckpointField::ArrivalTime, 1_000).is_err());
    }

    #[test]
    fn wire_names_match_the_front_end() {
        let mut record = CheckpointRecord::new(2, "PKC 2");
        record.next_pkc_time = 40_000_000;
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["nextPKCTime"], 40_000_000);
        assert_eq!(json["provisionalStartTime"], 0);
        assert_eq!(json["arrivalTime"], 0);

        let parsed: CheckpointRecord =
            serde_json::from_str(r#"{"number":3,"arrivalTime":37000000}"#).unwrap();
        assert_eq!(parsed.arrival_time, 37_000_000);
        assert!(parsed.name.is_empty());
    }

    #[test]
    fn field_names_parse_loosely() {
        assert_eq!("arrivalTime".parse::<CheckpointField>().unwrap(), CheckpointField::ArrivalTime);
        assert_eq!("next-pkc-time".parse::<CheckpointField>().unwrap(), CheckpointField::NextPkcTime);
        assert_eq!("driving_time".parse::<CheckpointField>().unwrap(), CheckpointField::DrivingTime);
        assert!("lunch".parse::<CheckpointField>().is_err());
    }

    proptest! {
        #[test]
        fn normalize_reaches_a_fixed_point_in_one_pass(
            provisional in 0i64..43_200_000,
            actual in prop::sample::select(vec![0i64, 30_000_000, 40_000_000]),
            driving in 0i64..3_600_000
        ) {
            let mut record = CheckpointRecord::new(2, "");
            record.provisional_start_time = provisional;
            record.actual_start_time = actual;
            record.driving_time = driving;
            record.normalize();
            let once = record.clone();
            record.normalize();
            prop_assert_eq!(once, record);
        }
    }
}
