use std::collections::BTreeMap;

use crate::error::{Pf400Error, Result};

/// Argument position of the gripper joint in a `MoveJ` command.
pub const GRIPPER_JOINT: usize = 4;
pub const GRIP_VALUE: f64 = 120.0;
pub const RELEASE_VALUE: f64 = 127.0;

/// Locations that belong to the cell rather than to a station.
pub const GLOBAL_LOCATIONS: [&str; 4] = ["HomeALL", "HomeArm", "Mobile_Robot", "Trash"];

pub const COMPLETED_PLATE: &str = "Completed_plate";
pub const COMPLETED_PLATE_ABOVE: &str = "Completed_plate_above";

/// Named joint poses the arm can be sent to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationTable {
    entries: BTreeMap<String, Vec<f64>>,
}

impl LocationTable {
    pub fn new() -> LocationTable {
        LocationTable::default()
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn insert(&mut self, name: impl Into<String>, joints: Vec<f64>) {
        self.entries.insert(name.into(), joints);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub(crate) fn as_map(&self) -> &BTreeMap<String, Vec<f64>> {
        &self.entries
    }

    /// Finds the stored key matching `name` ignoring ASCII case.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.entries.get_key_value(name) {
            return Some(key);
        }
        self.names().find(|key| key.eq_ignore_ascii_case(name))
    }

    /// Replaces every joint of `name` with `joints`, in order. Extra located
    /// joints beyond the stored entry's length are ignored.
    pub fn overwrite(&mut self, name: &str, joints: &[f64]) -> Result<()> {
        let entry = self
            .entries
            .get_mut(name)
            .ok_or_else(|| Pf400Error::UnknownLocation(name.to_string()))?;
        if joints.len() < entry.len() {
            return Err(Pf400Error::JointCountMismatch {
                location: name.to_string(),
                expected: entry.len(),
                actual: joints.len(),
            });
        }

        let count = entry.len();
        entry.copy_from_slice(&joints[..count]);

        Ok(())
    }
}

impl FromIterator<(String, Vec<f64>)> for LocationTable {
    fn from_iter<I: IntoIterator<Item = (String, Vec<f64>)>>(iter: I) -> LocationTable {
        LocationTable {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Name of a location belonging to OT2 station `id`.
pub fn station_location(id: u32, suffix: &str) -> String {
    format!("OT2_{id}_{suffix}")
}

/// A location the robot can be taught.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationPoint {
    Front,
    AbovePlate,
    PickPlate,
    PlateRack,
}

impl StationPoint {
    pub fn parse(name: &str) -> Option<StationPoint> {
        match name.to_ascii_uppercase().as_str() {
            "FRONT" => Some(StationPoint::Front),
            "ABOVE_PLATE" => Some(StationPoint::AbovePlate),
            "PICK_PLATE" => Some(StationPoint::PickPlate),
            "PLATE_RACK" => Some(StationPoint::PlateRack),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            StationPoint::Front => "front",
            StationPoint::AbovePlate => "above_plate",
            StationPoint::PickPlate => "pick_plate",
            StationPoint::PlateRack => "plate_rack",
        }
    }
}

/// Resolves the table key `teach` should overwrite.
pub(crate) fn teach_key(table: &LocationTable, location: &str, station: Option<u32>) -> Result<String> {
    let unknown = || Pf400Error::UnknownLocation(location.to_string());

    let wanted = match station {
        None => {
            if !GLOBAL_LOCATIONS.iter().any(|g| g.eq_ignore_ascii_case(location)) {
                return Err(unknown());
            }
            location.to_string()
        }
        Some(id) => {
            let point = StationPoint::parse(location).ok_or_else(unknown)?;
            station_location(id, point.suffix())
        }
    };

    table
        .resolve(&wanted)
        .map(str::to_string)
        .ok_or(Pf400Error::UnknownLocation(wanted))
}
