//! Session configuration parsing
//!
//! The producer publishes its session configuration as YAML, but writes
//! free-text values (driver names, team names, setup file names, livery strings)
//! without quoting them. A name like `O'Connor, Mike` is harmless; one that starts
//! with `@`, `*` or `,` or contains `: ` is not. [`preprocess`] quotes those
//! values and strips stray control characters before handing the text to
//! `serde_yaml_ng`.
//!
//! ```text
//! UserName: @home racing      ──►  UserName: '@home racing'
//! UserName: O'Connor, Mike    ──►  UserName: 'O''Connor, Mike'
//! ```
//!
//! Only `WeekendInfo` and `DriverInfo` are typed. Every other top-level section is
//! kept as a raw YAML value in [`SessionInfo::other`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{Result, TelemetryError};

const FREE_TEXT_KEYS: &[&str] = &[
    "AbbrevName:",
    "TeamName:",
    "UserName:",
    "Initials:",
    "DriverSetupName:",
    "CarDesignStr:",
];

/// Parsed session configuration.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct SessionInfo {
    /// Track and event information
    pub weekend_info: WeekendInfo,
    /// Player car and the field
    pub driver_info: Option<DriverInfo>,
    /// Sections without a typed mapping, keyed by section name
    #[serde(flatten)]
    #[cfg_attr(feature = "tauri", specta(skip))]
    pub other: BTreeMap<String, serde_yaml_ng::Value>,
}

/// Track and event information.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct WeekendInfo {
    pub track_name: Option<String>,
    #[serde(rename = "TrackID")]
    pub track_id: Option<i32>,
    pub track_length: Option<String>,
    pub track_display_name: Option<String>,
    pub track_display_short_name: Option<String>,
    pub track_config_name: Option<String>,
    pub track_city: Option<String>,
    pub track_country: Option<String>,
    pub track_type: Option<String>,
    pub track_num_turns: Option<i32>,
    #[serde(rename = "SeriesID")]
    pub series_id: Option<i32>,
    #[serde(rename = "SeasonID")]
    pub season_id: Option<i32>,
    #[serde(rename = "SessionID")]
    pub session_id: Option<i32>,
    #[serde(rename = "SubSessionID")]
    pub sub_session_id: Option<i32>,
    #[serde(rename = "LeagueID")]
    pub league_id: Option<i32>,
    pub official: Option<i32>,
    pub event_type: Option<String>,
    pub category: Option<String>,
    pub sim_mode: Option<String>,
    pub team_racing: Option<i32>,
    pub num_car_types: Option<i32>,
    pub build_version: Option<String>,
}

/// Player car indices and the driver list.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct DriverInfo {
    pub driver_car_idx: Option<i32>,
    #[serde(rename = "DriverUserID")]
    pub driver_user_id: Option<i32>,
    pub pace_car_idx: Option<i32>,
    pub driver_setup_name: Option<String>,
    #[serde(rename = "DriverCarIdleRPM")]
    pub driver_car_idle_rpm: Option<f64>,
    pub driver_car_red_line: Option<f64>,
    pub driver_car_fuel_max_ltr: Option<f64>,
    pub drivers: Vec<DriverEntry>,
}

/// One car in the session.
#[derive(Default, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(rename_all = "PascalCase")]
#[serde(default)]
pub struct DriverEntry {
    pub car_idx: Option<i32>,
    pub user_name: Option<String>,
    pub abbrev_name: Option<String>,
    pub initials: Option<String>,
    #[serde(rename = "UserID")]
    pub user_id: Option<i32>,
    #[serde(rename = "TeamID")]
    pub team_id: Option<i32>,
    pub team_name: Option<String>,
    pub car_number: Option<String>,
    pub car_screen_name: Option<String>,
    pub car_class_short_name: Option<String>,
    #[serde(rename = "IRating")]
    pub i_rating: Option<i32>,
    pub lic_string: Option<String>,
    pub car_is_pace_car: Option<i32>,
    pub is_spectator: Option<i32>,
    pub car_design_str: Option<String>,
}

impl SessionInfo {
    /// Preprocess and deserialize decoded session configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(TelemetryError::parse(
                "Session configuration",
                "configuration text is empty",
            ));
        }

        let cleaned = preprocess(text);
        let info: SessionInfo = serde_yaml_ng::from_str(&cleaned)
            .map_err(|e| TelemetryError::parse("Session YAML deserialization", e.to_string()))?;

        debug!(
            track = info.weekend_info.track_name.as_deref().unwrap_or(""),
            drivers = info.driver_info.as_ref().map_or(0, |d| d.drivers.len()),
            untyped_sections = info.other.len(),
            "Parsed session configuration"
        );
        Ok(info)
    }

    /// Entry for the car at `car_idx`.
    pub fn driver(&self, car_idx: i32) -> Option<&DriverEntry> {
        self.driver_info
            .as_ref()?
            .drivers
            .iter()
            .find(|d| d.car_idx == Some(car_idx))
    }

    /// Entry for the player's own car.
    pub fn player(&self) -> Option<&DriverEntry> {
        self.driver(self.driver_info.as_ref()?.driver_car_idx?)
    }
}

/// Make the producer's YAML parseable.
///
/// Removes control characters other than tab, CR and LF, and single-quotes the
/// values of free-text keys unless they are already quoted.
pub fn preprocess(yaml: &str) -> String {
    let cleaned: String = yaml
        .chars()
        .filter(|&ch| !ch.is_control() || matches!(ch, '\n' | '\r' | '\t'))
        .collect();

    let mut out = String::with_capacity(cleaned.len() + 64);
    for line in cleaned.lines() {
        match quote_free_text(line) {
            Some(fixed) => out.push_str(&fixed),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

fn quote_free_text(line: &str) -> Option<String> {
    let body = line.trim_start();
    let body = body.strip_prefix("- ").map(str::trim_start).unwrap_or(body);
    let key = FREE_TEXT_KEYS.iter().find(|key| body.starts_with(**key))?;

    let after_key = line.len() - body.len() + key.len();
    let value = line[after_key..].trim();
    if value.is_empty() || value.starts_with('\'') || value.starts_with('"') {
        return None;
    }

    Some(format!("{} '{}'", &line[..after_key], value.replace('\'', "''")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SAMPLE: &str = "---
WeekendInfo:
 TrackName: nurburgring combinedshortb
 TrackID: 262
 TrackLength: 24.36 km
 TrackDisplayName: N\u{fc}rburgring Combined
 TrackConfigName: Gesamtstrecke 24h
 TrackCity:
 TrackCountry: Germany
 SeriesID: 0
 SubSessionID: 0
 EventType: Test
 Category: Road
 BuildVersion: 2024.01.23.02

SessionInfo:
 Sessions:
 - SessionNum: 0
   SessionType: Offline Testing

DriverInfo:
 DriverCarIdx: 1
 DriverUserID: 123456
 PaceCarIdx: 0
 DriverSetupName: baseline.sto
 DriverCarIdleRPM: 900.000
 DriverCarRedLine: 7500.000
 Drivers:
 - CarIdx: 0
   UserName: Pace Car
   UserID: -1
   CarNumber: \"0\"
   CarIsPaceCar: 1
 - CarIdx: 1
   UserName: O'Connor, Mike
   AbbrevName: @Connor, M
   Initials: MO
   UserID: 123456
   TeamName: Mike: Racing
   CarNumber: \"64\"
   CarScreenName: Porsche 911 GT3 R
   IRating: 2543
   LicString: A 3.21
   CarIsPaceCar: 0
   CarDesignStr: ,ff0000,00ff00,0000ff
...
";

    #[test]
    fn parses_typed_sections() {
        let info = SessionInfo::parse(SAMPLE).unwrap();

        assert_eq!(info.weekend_info.track_id, Some(262));
        assert_eq!(
            info.weekend_info.track_display_name.as_deref(),
            Some("N\u{fc}rburgring Combined")
        );
        assert_eq!(info.weekend_info.track_city, None);

        let player = info.player().unwrap();
        assert_eq!(player.user_name.as_deref(), Some("O'Connor, Mike"));
        assert_eq!(player.abbrev_name.as_deref(), Some("@Connor, M"));
        assert_eq!(player.team_name.as_deref(), Some("Mike: Racing"));
        assert_eq!(player.car_number.as_deref(), Some("64"));
        assert_eq!(player.i_rating, Some(2543));
        assert_eq!(player.car_design_str.as_deref(), Some(",ff0000,00ff00,0000ff"));
        assert_eq!(info.driver(0).unwrap().car_is_pace_car, Some(1));
        assert!(info.driver(7).is_none());
    }

    #[test]
    fn keeps_untyped_sections() {
        let info = SessionInfo::parse(SAMPLE).unwrap();
        let sessions = &info.other["SessionInfo"]["Sessions"];
        assert_eq!(sessions[0]["SessionType"].as_str(), Some("Offline Testing"));
    }

    #[test]
    fn quotes_free_text_values() {
        let fixed =
            preprocess(" - CarIdx: 3\n   UserName: O'Connor, Mike\n   TeamName: \"Quoted\"\n");
        assert!(fixed.contains("   UserName: 'O''Connor, Mike'\n"));
        assert!(fixed.contains("   TeamName: \"Quoted\"\n"));
        assert!(fixed.contains(" - CarIdx: 3\n"));
    }

    #[test]
    fn strips_control_characters() {
        let fixed = preprocess("WeekendInfo:\n\x01 TrackName:\x02 spa\t\r\n");
        assert_eq!(fixed, "WeekendInfo:\n TrackName: spa\t\n");
    }

    #[test]
    fn empty_text_is_a_parse_error() {
        assert!(matches!(SessionInfo::parse("  \n"), Err(TelemetryError::Parse { .. })));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        assert!(matches!(
            SessionInfo::parse("WeekendInfo: [unclosed\n"),
            Err(TelemetryError::Parse { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_user_names_survive_round_trip(name in "[A-Za-z@*&!%,:' ]{1,24}") {
            let name = name.trim().to_string();
            prop_assume!(!name.is_empty() && !name.starts_with('\''));
            let yaml = format!("DriverInfo:\n Drivers:\n - CarIdx: 0\n   UserName: {name}\n");
            let info = SessionInfo::parse(&yaml).unwrap();
            prop_assert_eq!(info.driver(0).unwrap().user_name.as_deref(), Some(name.as_str()));
        }
    }
}
