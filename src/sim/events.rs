//! Record of the discrete milestones of a flight.

use std::collections::BTreeMap;

use nalgebra::Vector3;
use serde::Serialize;
use strum::AsRefStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event {0:?} was already recorded")]
    Duplicate(FlightMilestone),
}

/// Milestones recorded at most once per flight, in chronological order of a
/// nominal flight profile. The serialized names are the ones downstream
/// safety tooling keys on (`1stlug_off`, `MECO`, `para`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FlightMilestone {
    Ignition,
    #[strum(serialize = "1stlug_off")]
    #[serde(rename = "1stlug_off")]
    FirstLugOff,
    #[strum(serialize = "2ndlug_off")]
    #[serde(rename = "2ndlug_off")]
    SecondLugOff,
    #[strum(serialize = "MECO")]
    #[serde(rename = "MECO")]
    Burnout,
    MaxMach,
    #[strum(serialize = "max_Q")]
    #[serde(rename = "max_Q")]
    MaxDynamicPressure,
    MaxAirSpeed,
    Apogee,
    #[strum(serialize = "drogue")]
    #[serde(rename = "drogue")]
    DrogueDeploy,
    #[strum(serialize = "para")]
    #[serde(rename = "para")]
    ParachuteDeploy,
    Landing,
}

/// Snapshot taken when a milestone fires. Quantities that only make sense
/// for some milestones stay `None` for the rest.
#[derive(Debug, Clone, Serialize)]
pub struct FlightEvent {
    pub t_s: f64,
    pub pos_l_m: [f64; 3],
    pub altitude_m: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vel_l_m_s: Option<[f64; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mach: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub air_speed_m_s: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q_dyn_pa: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latlon_deg: Option<[f64; 2]>,
}

impl FlightEvent {
    pub fn at(t_s: f64, pos_l_m: &Vector3<f64>) -> Self {
        FlightEvent {
            t_s,
            pos_l_m: [pos_l_m.x, pos_l_m.y, pos_l_m.z],
            altitude_m: pos_l_m.z,
            vel_l_m_s: None,
            mach: None,
            air_speed_m_s: None,
            q_dyn_pa: None,
            latlon_deg: None,
        }
    }

    pub fn with_velocity(mut self, vel_l_m_s: &Vector3<f64>) -> Self {
        self.vel_l_m_s = Some([vel_l_m_s.x, vel_l_m_s.y, vel_l_m_s.z]);
        self
    }

    pub fn with_mach(mut self, mach: f64) -> Self {
        self.mach = Some(mach);
        self
    }

    pub fn with_air_speed(mut self, air_speed_m_s: f64) -> Self {
        self.air_speed_m_s = Some(air_speed_m_s);
        self
    }

    pub fn with_q_dyn(mut self, q_dyn_pa: f64) -> Self {
        self.q_dyn_pa = Some(q_dyn_pa);
        self
    }

    pub fn with_latlon(mut self, lat_deg: f64, lon_deg: f64) -> Self {
        self.latlon_deg = Some([lat_deg, lon_deg]);
        self
    }
}

/// One-shot event log. Milestones can be recorded exactly once, except for
/// the running maxima which are replaced as the flight progresses.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct FlightEventLog {
    events: BTreeMap<FlightMilestone, FlightEvent>,
}

impl FlightEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        milestone: FlightMilestone,
        event: FlightEvent,
    ) -> Result<(), EventError> {
        if self.events.contains_key(&milestone) {
            return Err(EventError::Duplicate(milestone));
        }
        log::info!(
            "event {} at t = {:.3} s, altitude {:.1} m",
            milestone.as_ref(),
            event.t_s,
            event.altitude_m
        );
        self.events.insert(milestone, event);
        Ok(())
    }

    /// Overwrites a previously recorded milestone. Used for running maxima.
    pub fn record_or_replace(&mut self, milestone: FlightMilestone, event: FlightEvent) {
        self.events.insert(milestone, event);
    }

    pub fn contains(&self, milestone: FlightMilestone) -> bool {
        self.events.contains_key(&milestone)
    }

    pub fn get(&self, milestone: FlightMilestone) -> Option<&FlightEvent> {
        self.events.get(&milestone)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FlightMilestone, &FlightEvent)> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::vector;

    #[test]
    fn test_record_rejects_duplicates() {
        let mut log = FlightEventLog::new();
        let pos = vector![0.0, 0.0, 15.0];
        log.record(FlightMilestone::FirstLugOff, FlightEvent::at(0.4, &pos))
            .unwrap();
        let err = log.record(FlightMilestone::FirstLugOff, FlightEvent::at(0.5, &pos));
        assert!(matches!(err, Err(EventError::Duplicate(_))));
        assert_eq!(log.get(FlightMilestone::FirstLugOff).unwrap().t_s, 0.4);
    }

    #[test]
    fn test_record_or_replace_keeps_latest() {
        let mut log = FlightEventLog::new();
        log.record_or_replace(
            FlightMilestone::MaxMach,
            FlightEvent::at(2.0, &vector![0.0, 0.0, 800.0]).with_mach(0.7),
        );
        log.record_or_replace(
            FlightMilestone::MaxMach,
            FlightEvent::at(2.5, &vector![0.0, 0.0, 1100.0]).with_mach(0.9),
        );
        assert_eq!(log.get(FlightMilestone::MaxMach).unwrap().mach, Some(0.9));
    }

    #[test]
    fn test_serializes_as_named_map() {
        let mut log = FlightEventLog::new();
        log.record(
            FlightMilestone::Apogee,
            FlightEvent::at(14.2, &vector![120.0, 40.0, 1500.0]),
        )
        .unwrap();
        let json = serde_json::to_string(&log).unwrap();
        assert!(json.contains("\"apogee\""));
        assert!(json.contains("\"altitude_m\":1500.0"));
        // optional fields stay out of the output when unset
        assert!(!json.contains("mach"));
    }

    #[test]
    fn test_serialized_names_match_downstream_keys() {
        let mut log = FlightEventLog::new();
        let pos = vector![0.0, 0.0, 10.0];
        for milestone in [
            FlightMilestone::FirstLugOff,
            FlightMilestone::SecondLugOff,
            FlightMilestone::Burnout,
            FlightMilestone::MaxDynamicPressure,
            FlightMilestone::MaxAirSpeed,
            FlightMilestone::DrogueDeploy,
            FlightMilestone::ParachuteDeploy,
        ] {
            log.record(milestone, FlightEvent::at(1.0, &pos)).unwrap();
        }

        let json = serde_json::to_string(&log).unwrap();
        for key in [
            "\"1stlug_off\"",
            "\"2ndlug_off\"",
            "\"MECO\"",
            "\"max_Q\"",
            "\"max_air_speed\"",
            "\"drogue\"",
            "\"para\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
        assert_eq!(FlightMilestone::Burnout.as_ref(), "MECO");
        assert_eq!(FlightMilestone::FirstLugOff.as_ref(), "1stlug_off");
    }
}
