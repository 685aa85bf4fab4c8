use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Wheel location on a vehicle.
///
/// The string form is used verbatim as a path segment in object keys, so the
/// set is closed: keys naming any other position are ignored when a job is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TyrePosition {
    FrontLeft,
    FrontRight,
    RearLeft,
    RearRight,
    Spare,
}

impl TyrePosition {
    pub const ALL: [TyrePosition; 5] = [
        TyrePosition::FrontLeft,
        TyrePosition::FrontRight,
        TyrePosition::RearLeft,
        TyrePosition::RearRight,
        TyrePosition::Spare,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TyrePosition::FrontLeft => "front-left",
            TyrePosition::FrontRight => "front-right",
            TyrePosition::RearLeft => "rear-left",
            TyrePosition::RearRight => "rear-right",
            TyrePosition::Spare => "spare",
        }
    }
}

impl FromStr for TyrePosition {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TyrePosition::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Invalid tyre position: {}", s))
    }
}

impl Display for TyrePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Whether a photograph was taken before or after the tyre was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageRole {
    Pre,
    Post,
}

impl ImageRole {
    /// File stem used for the image object, e.g. `preImage`.
    pub fn object_stem(&self) -> &'static str {
        match self {
            ImageRole::Pre => "preImage",
            ImageRole::Post => "postImage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_round_trips_through_str() {
        for position in TyrePosition::ALL {
            assert_eq!(position.as_str().parse::<TyrePosition>().unwrap(), position);
        }
    }

    #[test]
    fn test_position_parse_rejects_unknown() {
        assert!("middle".parse::<TyrePosition>().is_err());
        assert_eq!(
            "Front-Left".parse::<TyrePosition>().unwrap(),
            TyrePosition::FrontLeft
        );
    }

    #[test]
    fn test_position_serde_matches_key_segment() {
        let json = serde_json::to_string(&TyrePosition::RearRight).unwrap();
        assert_eq!(json, "\"rear-right\"");
    }
}
