//! Coverage-model primitives shared by higher-level objects.
//!
//! - [`identity`]: `AbstractBase` / `AbstractIdentifiable`, the identity and
//!   extension carriers every persisted object builds on.
//! - [`storage`]: the resizable typed storage contract and its in-memory
//!   implementation.
//! - [`domain`]: addressing constraints (`DomainOfApplication`).
//!
//! Plus the small name enumerations used when describing axes, mutability
//! and variability.

pub mod domain;
pub mod identity;
pub mod storage;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use uuid::Uuid;

/// Namespace written into the type tag of this module's Dictable types.
pub const BASIC_TYPES_NAMESPACE: &str = "coverage_model.basic_types";

/// A fresh globally unique id: an uppercase UUIDv4.
pub fn create_guid() -> String {
    Uuid::new_v4().to_string().to_uppercase()
}

/// A name that is not a member of the enumeration being parsed.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(display("'{value}' is not a member of {enumeration}"))]
pub struct UnknownMemberError {
    /// Enumeration being parsed.
    enumeration: &'static str,
    /// The rejected name.
    value: String,
}

macro_rules! name_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant, )+
        }

        impl $name {
            /// Every member, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Member name as stored.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Whether `value` names a member.
            pub fn has_member(value: &str) -> bool {
                value.parse::<$name>().is_ok()
            }

            /// Whether `value` names a member and equals `want`.
            pub fn is_member(value: &str, want: &str) -> bool {
                $name::has_member(value) && value == want
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownMemberError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => UnknownMemberSnafu {
                        enumeration: stringify!($name),
                        value: other,
                    }
                    .fail(),
                }
            }
        }
    };
}

name_enum! {
    /// Axis kinds used when building coordinate reference systems.
    AxisType {
        /// Ensemble member coordinate.
        Ensemble => "ENSEMBLE",
        /// Projected x coordinate.
        GeoX => "GEO_X",
        /// Projected y coordinate.
        GeoY => "GEO_Y",
        /// Projected z coordinate.
        GeoZ => "GEO_Z",
        /// Vertical height coordinate.
        Height => "HEIGHT",
        /// Latitude.
        Lat => "LAT",
        /// Longitude.
        Lon => "LON",
        /// Vertical pressure coordinate.
        Pressure => "PRESSURE",
        /// Radial azimuth.
        RadialAzimuth => "RADIAL_AZIMUTH",
        /// Radial distance.
        RadialDistance => "RADIAL_DISTANCE",
        /// Radial elevation.
        RadialElevation => "RADIAL_ELEVATION",
        /// Model run time.
        Runtime => "RUNTIME",
        /// Time.
        Time => "TIME",
    }
}

name_enum! {
    /// How a domain may change once created.
    Mutability {
        /// Cannot change.
        Immutable => "IMMUTABLE",
        /// May grow along any dimension.
        Extensible => "EXTENSIBLE",
        /// May change freely.
        Mutable => "MUTABLE",
    }
}

name_enum! {
    /// Along which axes a parameter varies.
    Variability {
        /// Varies in time only.
        Temporal => "TEMPORAL",
        /// Varies in space only.
        Spatial => "SPATIAL",
        /// Varies in time and space.
        Both => "BOTH",
        /// Constant.
        None => "NONE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_is_uppercase_uuid() {
        let guid = create_guid();
        assert_eq!(guid.len(), 36);
        assert_eq!(guid, guid.to_uppercase());
        assert!(Uuid::parse_str(&guid).is_ok());
        assert_ne!(guid, create_guid());
    }

    #[test]
    fn membership_checks_by_name() {
        assert!(AxisType::has_member("LAT"));
        assert!(!AxisType::has_member("lat"));
        assert!(AxisType::is_member("TIME", "TIME"));
        assert!(!AxisType::is_member("TIME", "LAT"));
        assert!(!Mutability::is_member("BOGUS", "BOGUS"));
        assert_eq!(Variability::ALL.len(), 4);
    }

    #[test]
    fn names_round_trip_through_text_and_serde() {
        for axis in AxisType::ALL {
            assert_eq!(axis.to_string().parse::<AxisType>().unwrap(), *axis);
        }
        assert_eq!(
            serde_json::to_value(Variability::None).unwrap(),
            serde_json::json!("NONE")
        );
        let err = "SOMETIMES".parse::<Variability>().unwrap_err();
        assert_eq!(err.to_string(), "'SOMETIMES' is not a member of Variability");
    }
}
