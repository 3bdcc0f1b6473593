use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::CleanError;

pub const COLUMN_COUNT: usize = 15;

/// Positional columns of the downtime log, in file order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Equip,
    EquipType,
    Dept,
    Area,
    Date,
    Shifts,
    Reason,
    Min,
    ProdFix,
    EnginFix,
    Scheduled,
    ProdFam,
    ProdType,
    Comment,
    DowntimeType,
}

impl Column {
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::Equip,
        Column::EquipType,
        Column::Dept,
        Column::Area,
        Column::Date,
        Column::Shifts,
        Column::Reason,
        Column::Min,
        Column::ProdFix,
        Column::EnginFix,
        Column::Scheduled,
        Column::ProdFam,
        Column::ProdType,
        Column::Comment,
        Column::DowntimeType,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::Equip => "equip",
            Column::EquipType => "equiptype",
            Column::Dept => "dept",
            Column::Area => "area",
            Column::Date => "date",
            Column::Shifts => "shifts",
            Column::Reason => "reason",
            Column::Min => "min",
            Column::ProdFix => "prodfix",
            Column::EnginFix => "enginfix",
            Column::Scheduled => "scheduled",
            Column::ProdFam => "prodfam",
            Column::ProdType => "prodtype",
            Column::Comment => "comment",
            Column::DowntimeType => "downtimetype",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| CleanError::UnknownColumn(s.to_string()))
    }
}

/// One row as read from the file, after sentinel substitution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub fields: [Option<String>; COLUMN_COUNT],
}

impl RawRecord {
    pub fn get(&self, column: Column) -> Option<&str> {
        self.fields[column as usize].as_deref()
    }

    pub fn take(&mut self, column: Column) -> Option<String> {
        self.fields[column as usize].take()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanedRecord {
    /// Parsed `date`; the index every downstream view keys on.
    #[serde(rename = "timestamp")]
    pub date_key: Option<NaiveDateTime>,
    #[serde(rename = "equip")]
    pub equipment_id: Option<String>,
    #[serde(rename = "equiptype")]
    pub equipment_type: Option<String>,
    #[serde(rename = "dept")]
    pub department: Option<String>,
    pub area: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "shifts")]
    pub shift: Option<String>,
    #[serde(rename = "reason")]
    pub reason_code: Option<String>,
    #[serde(rename = "min")]
    pub minutes: Option<f64>,
    #[serde(rename = "prodfix")]
    pub production_fix: Option<String>,
    #[serde(rename = "enginfix")]
    pub engineering_fix: Option<String>,
    pub scheduled: Option<String>,
    #[serde(rename = "prodfam")]
    pub production_family: Option<String>,
    #[serde(rename = "prodtype")]
    pub production_type: Option<String>,
    pub comment: Option<String>,
    #[serde(rename = "downtimetype")]
    pub downtime_type: Option<String>,
}

impl CleanedRecord {
    /// Text form of a column as it is written out; `None` is the missing marker.
    pub fn value(&self, column: Column) -> Option<String> {
        let text = |v: &Option<String>| v.clone();
        match column {
            Column::Equip => text(&self.equipment_id),
            Column::EquipType => text(&self.equipment_type),
            Column::Dept => text(&self.department),
            Column::Area => text(&self.area),
            Column::Date => text(&self.date),
            Column::Shifts => text(&self.shift),
            Column::Reason => text(&self.reason_code),
            Column::Min => self.minutes.map(format_minutes),
            Column::ProdFix => text(&self.production_fix),
            Column::EnginFix => text(&self.engineering_fix),
            Column::Scheduled => text(&self.scheduled),
            Column::ProdFam => text(&self.production_family),
            Column::ProdType => text(&self.production_type),
            Column::Comment => text(&self.comment),
            Column::DowntimeType => text(&self.downtime_type),
        }
    }
}

pub fn format_minutes(minutes: f64) -> String {
    minutes.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_round_trip_through_from_str() {
        for column in Column::ALL {
            assert_eq!(column.name().parse::<Column>().unwrap(), column);
        }
        assert!(matches!(
            "minutes".parse::<Column>(),
            Err(CleanError::UnknownColumn(name)) if name == "minutes"
        ));
    }

    #[test]
    fn column_discriminants_follow_file_order() {
        for (i, column) in Column::ALL.iter().enumerate() {
            assert_eq!(*column as usize, i);
        }
    }

    #[test]
    fn values_render_as_written() {
        let record = CleanedRecord {
            equipment_id: Some("press01".into()),
            minutes: Some(12.5),
            ..Default::default()
        };
        assert_eq!(record.value(Column::Equip).as_deref(), Some("press01"));
        assert_eq!(record.value(Column::Min).as_deref(), Some("12.5"));
        assert_eq!(record.value(Column::Dept), None);
        assert_eq!(format_minutes(45.0), "45");
    }
}
