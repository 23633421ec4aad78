use std::collections::HashMap;

use serde::Serialize;

use crate::prometheus::SampleStream;

/// `[value, timestamp in milliseconds]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimePoint(pub [f64; 2]);

/// A single series copied out of a matrix result. `points` and `values` are
/// index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub name: String,
    pub points: Vec<TimePoint>,
    pub tags: HashMap<String, String>,
    pub values: Vec<f64>,
}

impl TimeSeries {
    pub fn from_stream(name: &str, stream: &SampleStream) -> Self {
        let (points, values): (Vec<TimePoint>, Vec<f64>) = stream
            .values
            .iter()
            .map(|sample| {
                (
                    TimePoint([sample.value, sample.timestamp_millis() as f64]),
                    sample.value,
                )
            })
            .unzip();
        TimeSeries {
            name: name.to_string(),
            points,
            tags: stream.metric.clone(),
            values,
        }
    }
}
