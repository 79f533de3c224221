//! Small shared helpers.

pub mod humantime_serde {
    //! Serde support for `std::time::Duration` config fields using the
    //! `humantime` format ("5m", "30m", "7d").
    //!
    //! ```
    //! use serde::Deserialize;
    //! use std::time::Duration;
    //!
    //! #[derive(Deserialize)]
    //! struct Foo {
    //!     #[serde(with = "entitlements::util::humantime_serde")]
    //!     timeout: Duration,
    //! }
    //! ```

    use std::fmt;
    use std::time::Duration;

    use serde::{de, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        humantime::format_duration(*d).to_string().serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct V;

        impl de::Visitor<'_> for V {
            type Value = Duration;

            fn expecting(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt.write_str("a humantime duration string")
            }

            fn visit_str<E>(self, v: &str) -> Result<Duration, E>
            where
                E: de::Error,
            {
                humantime::parse_duration(v)
                    .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
            }
        }

        d.deserialize_str(V)
    }

}
