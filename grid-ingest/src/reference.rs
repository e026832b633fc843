//! Static area reference data
//!
//! Built once at startup and passed by reference to every component that
//! needs it. Area ids are stable because ENTSO-E rows are keyed by them.

use serde::Serialize;
use std::fmt;

use grid_common::error::ConfigurationError;

/// One bidding zone or control area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AreaReference {
    pub id: i32,
    /// ENTSO-E EIC code
    pub code: &'static str,
    /// Short configuration label (`CZ`, `DE-TenneT`, ...)
    pub label: &'static str,
    pub name: &'static str,
    pub country_code: &'static str,
    pub active: bool,
}

const STANDARD_AREAS: [AreaReference; 8] = [
    area(1, "10YCZ-CEPS-----N", "CZ", "Czech Republic", "CZ"),
    area(2, "10YDE-EON------1", "DE-TenneT", "Germany (TenneT)", "DE"),
    area(3, "10YAT-APG------L", "AT", "Austria", "AT"),
    area(4, "10YPL-AREA-----S", "PL", "Poland", "PL"),
    area(5, "10YSK-SEPS-----K", "SK", "Slovakia", "SK"),
    area(6, "10YDE-VE-------2", "DE-50Hertz", "Germany (50Hertz)", "DE"),
    area(7, "10YDE-RWENET---I", "DE-Amprion", "Germany (Amprion)", "DE"),
    area(8, "10YDE-ENBW-----N", "DE-TransnetBW", "Germany (TransnetBW)", "DE"),
];

const fn area(
    id: i32,
    code: &'static str,
    label: &'static str,
    name: &'static str,
    country_code: &'static str,
) -> AreaReference {
    AreaReference {
        id,
        code,
        label,
        name,
        country_code,
        active: true,
    }
}

/// Id of the Czech control area, home of the CEPS and OTE data
pub const HOME_AREA_ID: i32 = 1;

/// Neighbours of the home area with a physical interconnector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Neighbor {
    De,
    At,
    Pl,
    Sk,
}

impl Neighbor {
    pub const ALL: [Neighbor; 4] = [Neighbor::De, Neighbor::At, Neighbor::Pl, Neighbor::Sk];

    /// Label of the area the interconnector flows to
    pub fn area_label(self) -> &'static str {
        match self {
            Neighbor::De => "DE-TenneT",
            Neighbor::At => "AT",
            Neighbor::Pl => "PL",
            Neighbor::Sk => "SK",
        }
    }

    /// Column receiving the net flow on this border
    pub fn flow_field(self) -> &'static str {
        match self {
            Neighbor::De => "flow_de_mw",
            Neighbor::At => "flow_at_mw",
            Neighbor::Pl => "flow_pl_mw",
            Neighbor::Sk => "flow_sk_mw",
        }
    }
}

impl fmt::Display for Neighbor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Neighbor::De => "de",
            Neighbor::At => "at",
            Neighbor::Pl => "pl",
            Neighbor::Sk => "sk",
        };
        write!(f, "{}", s)
    }
}

/// Immutable lookup table of areas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaTable {
    areas: Vec<AreaReference>,
}

impl Default for AreaTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl AreaTable {
    /// The eight areas known to the system, all active
    pub fn standard() -> Self {
        Self {
            areas: STANDARD_AREAS.to_vec(),
        }
    }

    /// Restrict the active set to the given labels.
    ///
    /// An empty list keeps every area active.
    pub fn with_active<S: AsRef<str>>(mut self, labels: &[S]) -> Result<Self, ConfigurationError> {
        if labels.is_empty() {
            return Ok(self);
        }

        for label in labels {
            let label = label.as_ref();
            if self.by_label(label).is_none() {
                return Err(ConfigurationError::invalid(
                    "areas",
                    format!("unknown area label '{}'", label),
                ));
            }
        }

        for area in &mut self.areas {
            area.active = labels.iter().any(|l| l.as_ref().eq_ignore_ascii_case(area.label));
        }
        Ok(self)
    }

    pub fn get(&self, id: i32) -> Option<&AreaReference> {
        self.areas.iter().find(|a| a.id == id)
    }

    pub fn by_label(&self, label: &str) -> Option<&AreaReference> {
        self.areas.iter().find(|a| a.label.eq_ignore_ascii_case(label))
    }

    pub fn by_code(&self, code: &str) -> Option<&AreaReference> {
        self.areas.iter().find(|a| a.code == code)
    }

    /// The Czech control area
    pub fn home(&self) -> &AreaReference {
        self.get(HOME_AREA_ID).unwrap_or(&STANDARD_AREAS[0])
    }

    pub fn all(&self) -> &[AreaReference] {
        &self.areas
    }

    pub fn active(&self) -> impl Iterator<Item = &AreaReference> {
        self.areas.iter().filter(|a| a.active)
    }

    /// Distinct country codes in id order
    pub fn countries(&self) -> Vec<&'static str> {
        let mut countries: Vec<&'static str> = Vec::new();
        for area in &self.areas {
            if !countries.contains(&area.country_code) {
                countries.push(area.country_code);
            }
        }
        countries
    }

    /// Area on the far side of a home-area border
    pub fn neighbor(&self, neighbor: Neighbor) -> Option<&AreaReference> {
        self.by_label(neighbor.area_label())
    }
}
