//! Lenient numeric fields: SauceNAO sends some counters as JSON numbers and
//! others as numeric strings, sometimes both for the same key.

use serde::de::{Deserializer, Error};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Int(i64),
    Float(f64),
    Str(String),
}

impl NumOrStr {
    fn into_f64<E: Error>(self) -> Result<f64, E> {
        match self {
            NumOrStr::Int(v) => Ok(v as f64),
            NumOrStr::Float(v) => Ok(v),
            NumOrStr::Str(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| E::custom(format!("expected a number, got {:?}", s))),
        }
    }

    fn into_i64<E: Error>(self) -> Result<i64, E> {
        match self {
            NumOrStr::Int(v) => Ok(v),
            NumOrStr::Float(v) => Ok(v as i64),
            NumOrStr::Str(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .or_else(|_| trimmed.parse::<f64>().map(|v| v as i64))
                    .map_err(|_| E::custom(format!("expected an integer, got {:?}", s)))
            }
        }
    }
}

pub fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    NumOrStr::deserialize(d)?.into_f64()
}

pub fn lenient_i64<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    NumOrStr::deserialize(d)?.into_i64()
}

pub fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let v = NumOrStr::deserialize(d)?.into_i64()?;
    u64::try_from(v).map_err(|_| D::Error::custom(format!("expected a positive id, got {}", v)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "lenient_f64")]
        score: f64,
        #[serde(deserialize_with = "lenient_i64")]
        count: i64,
        #[serde(deserialize_with = "lenient_u64")]
        id: u64,
    }

    #[test]
    fn accepts_numbers_and_numeric_strings() {
        let p: Probe =
            serde_json::from_str(r#"{"score": "93.41", "count": "4", "id": 1234}"#).unwrap();
        assert_eq!(p.score, 93.41);
        assert_eq!(p.count, 4);
        assert_eq!(p.id, 1234);

        let p: Probe = serde_json::from_str(r#"{"score": 55, "count": 2.0, "id": "77"}"#).unwrap();
        assert_eq!(p.score, 55.0);
        assert_eq!(p.count, 2);
        assert_eq!(p.id, 77);
    }

    #[test]
    fn rejects_garbage_and_negative_ids() {
        assert!(serde_json::from_str::<Probe>(r#"{"score": "high", "count": 1, "id": 1}"#).is_err());
        assert!(serde_json::from_str::<Probe>(r#"{"score": 1, "count": 1, "id": -5}"#).is_err());
    }
}
