use std::{collections::HashMap, fmt::Display, num::ParseFloatError};

use serde::{Deserialize, Serialize};

/// Decoded `data` of a query response, tagged by `resultType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
pub enum QueryResult {
    Matrix(Vec<SampleStream>),
    Vector(Vec<InstantSample>),
    Scalar(SamplePair),
    String(StringPair),
}

impl QueryResult {
    pub fn shape(&self) -> ResultShape {
        match self {
            QueryResult::Matrix(_) => ResultShape::Matrix,
            QueryResult::Vector(_) => ResultShape::Vector,
            QueryResult::Scalar(_) => ResultShape::Scalar,
            QueryResult::String(_) => ResultShape::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    Matrix,
    Vector,
    Scalar,
    String,
}

impl Display for ResultShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ResultShape::Matrix => "matrix",
            ResultShape::Vector => "vector",
            ResultShape::Scalar => "scalar",
            ResultShape::String => "string",
        };
        write!(f, "{name}")
    }
}

/// One label-tagged series of a matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleStream {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    // native histogram series carry `histograms` instead
    #[serde(default)]
    pub values: Vec<SamplePair>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantSample {
    #[serde(default)]
    pub metric: HashMap<String, String>,
    pub value: SamplePair,
}

/// `[<unix seconds>, "<value>"]` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "(f64, String)", into = "(f64, String)")]
pub struct SamplePair {
    pub timestamp: f64,
    pub value: f64,
}

impl SamplePair {
    pub fn timestamp_millis(&self) -> i64 {
        (self.timestamp * 1000.0).round() as i64
    }
}

impl TryFrom<(f64, String)> for SamplePair {
    type Error = ParseFloatError;

    fn try_from((timestamp, value): (f64, String)) -> Result<Self, Self::Error> {
        Ok(SamplePair {
            timestamp,
            value: value.parse()?,
        })
    }
}

impl From<SamplePair> for (f64, String) {
    fn from(pair: SamplePair) -> Self {
        (pair.timestamp, format_value(pair.value))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, String)", into = "(f64, String)")]
pub struct StringPair {
    pub timestamp: f64,
    pub value: String,
}

impl From<(f64, String)> for StringPair {
    fn from((timestamp, value): (f64, String)) -> Self {
        StringPair { timestamp, value }
    }
}

impl From<StringPair> for (f64, String) {
    fn from(pair: StringPair) -> Self {
        (pair.timestamp, pair.value)
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}
