use crate::error::GameError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed grace window after a task's own timer runs out.
pub const GRACE_WINDOW_SECS: i64 = 30 * 60;
pub const BASE_TASK_REWARD: u32 = 10;
pub const LONG_TASK_REWARD: u32 = 20;
pub const LONG_TASK_SECS: u32 = 60 * 60;

pub const RAIN_BASE_PRICE: u32 = 10;
pub const RAIN_PRICE_STEP: u32 = 10;

pub const SOIL_OK_PROBABILITY: f64 = 0.8;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Bulb {
    #[default]
    Fluorescent,
    Led,
    Ultraviolet,
}

impl Bulb {
    pub const ALL: [Bulb; 3] = [Bulb::Fluorescent, Bulb::Led, Bulb::Ultraviolet];

    pub fn as_str(self) -> &'static str {
        match self {
            Bulb::Fluorescent => "fluorescent",
            Bulb::Led => "led",
            Bulb::Ultraviolet => "ultraviolet",
        }
    }

    /// Extra sunlight gained when this bulb is installed.
    pub fn sun_bonus(self) -> u32 {
        match self {
            Bulb::Fluorescent => 1,
            Bulb::Led => 3,
            Bulb::Ultraviolet => 5,
        }
    }
}

impl fmt::Display for Bulb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bulb {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fluorescent" => Ok(Bulb::Fluorescent),
            "led" => Ok(Bulb::Led),
            "ultraviolet" | "uv" => Ok(Bulb::Ultraviolet),
            other => Err(GameError::validation(format!("unknown bulb '{other}'"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PotKind {
    Terracotta,
    Ceramic,
    Hanging,
}

impl PotKind {
    pub const ALL: [PotKind; 3] = [PotKind::Terracotta, PotKind::Ceramic, PotKind::Hanging];

    pub fn as_str(self) -> &'static str {
        match self {
            PotKind::Terracotta => "terracotta",
            PotKind::Ceramic => "ceramic",
            PotKind::Hanging => "hanging",
        }
    }
}

impl FromStr for PotKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terracotta" => Ok(PotKind::Terracotta),
            "ceramic" => Ok(PotKind::Ceramic),
            "hanging" => Ok(PotKind::Hanging),
            other => Err(GameError::validation(format!("unknown pot '{other}'"))),
        }
    }
}

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SoilKind {
    #[default]
    Potting,
    Loam,
    Peat,
}

impl SoilKind {
    pub const ALL: [SoilKind; 3] = [SoilKind::Potting, SoilKind::Loam, SoilKind::Peat];

    pub fn as_str(self) -> &'static str {
        match self {
            SoilKind::Potting => "potting",
            SoilKind::Loam => "loam",
            SoilKind::Peat => "peat",
        }
    }
}

impl FromStr for SoilKind {
    type Err = GameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "potting" => Ok(SoilKind::Potting),
            "loam" => Ok(SoilKind::Loam),
            "peat" => Ok(SoilKind::Peat),
            other => Err(GameError::validation(format!("unknown soil '{other}'"))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mood {
    SadBud,
    SadSprout,
    SadBloom,
    HappyBud,
    HappySprout,
    HappyBloom,
}

impl Mood {
    pub fn is_happy(self) -> bool {
        matches!(self, Mood::HappyBud | Mood::HappySprout | Mood::HappyBloom)
    }

    /// Image shown by the display layer for this mood.
    pub fn image(self) -> &'static str {
        match self {
            Mood::SadBud => "sad-bud.gif",
            Mood::SadSprout => "sad-sprout.gif",
            Mood::SadBloom => "sad-bloom.gif",
            Mood::HappyBud => "happy-bud.gif",
            Mood::HappySprout => "happy-sprout.gif",
            Mood::HappyBloom => "happy-bloom.gif",
        }
    }
}

pub fn to_millis(t: DateTime<Utc>) -> i64 {
    t.timestamp_millis()
}

pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
}
