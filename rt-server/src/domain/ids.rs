//! Identifier newtypes.
//!
//! Trip, stop and source identifiers are opaque strings assigned by the
//! upstream data producers. We only require that they are non-empty and
//! contain no whitespace; beyond that their structure is not ours to
//! interpret.

use std::fmt;

/// Error returned when parsing an invalid identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier: {reason}")]
pub struct InvalidId {
    reason: &'static str,
}

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier from a string.
            ///
            /// The input must be non-empty and contain no whitespace.
            pub fn parse(s: &str) -> Result<Self, InvalidId> {
                if s.is_empty() {
                    return Err(InvalidId {
                        reason: "must not be empty",
                    });
                }
                if s.chars().any(char::is_whitespace) {
                    return Err(InvalidId {
                        reason: "must not contain whitespace",
                    });
                }
                Ok(Self(s.to_string()))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_type! {
    /// Identity of a scheduled trip in the base schedule.
    ///
    /// Together with a circulation date this names one trip occurrence.
    TripId
}

id_type! {
    /// Identity of a stop point.
    StopId
}

id_type! {
    /// Identity of an upstream disruption feed (the contributor).
    SourceId
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_ids() {
        assert!(TripId::parse("vj:sncf:1234").is_ok());
        assert!(StopId::parse("sp:87686006").is_ok());
        assert!(SourceId::parse("realtime.cots").is_ok());
    }

    #[test]
    fn reject_empty() {
        assert!(TripId::parse("").is_err());
        assert!(StopId::parse("").is_err());
        assert!(SourceId::parse("").is_err());
    }

    #[test]
    fn reject_whitespace() {
        assert!(TripId::parse("vj 1").is_err());
        assert!(StopId::parse("sp:\t1").is_err());
        assert!(SourceId::parse("feed\n").is_err());
    }

    #[test]
    fn as_str_roundtrip() {
        let id = TripId::parse("vj:1").unwrap();
        assert_eq!(id.as_str(), "vj:1");
        assert_eq!(id.to_string(), "vj:1");
    }

    #[test]
    fn debug_format() {
        let id = StopId::parse("sp:1").unwrap();
        assert_eq!(format!("{:?}", id), "StopId(sp:1)");
    }
}
