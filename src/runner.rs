use std::io::Write;

use tracing::{info, warn};

use crate::{
    client::Api,
    config::{Config, SeriesSelection, TargetsMode},
    error::{QueryRunnerError, Result},
    prometheus::QueryResult,
    series::TimeSeries,
};

/// Runs one range query and prints what came back.
pub struct QueryRunner<A, W> {
    api: A,
    out: W,
}

impl<A: Api, W: Write> QueryRunner<A, W> {
    pub fn new(api: A, out: W) -> Self {
        QueryRunner { api, out }
    }

    pub async fn run(&mut self, config: &Config) -> Result<Vec<TimeSeries>> {
        self.list_targets(config.targets).await?;

        let range = &config.range;
        info!(
            query = %config.query,
            start = %range.start,
            end = %range.end,
            step = ?range.step,
            "running range query"
        );
        let response = self.api.query_range(&config.query, range).await?;
        for warning in &response.warnings {
            warn!("server warning: {warning}");
        }
        let result = response.data;
        writeln!(
            self.out,
            "Query returned: {}",
            serde_json::to_string_pretty(&result)?
        )?;

        let series = extract_series(&config.query, &result, config.series)?;
        info!(series = series.len(), "converted matrix");
        for s in &series {
            writeln!(self.out, "Series: {}", serde_json::to_string_pretty(s)?)?;
        }
        Ok(series)
    }

    async fn list_targets(&mut self, mode: TargetsMode) -> Result<()> {
        let targets = match mode {
            TargetsMode::Skip => return Ok(()),
            TargetsMode::Report => match self.api.targets().await {
                Ok(targets) => targets,
                Err(e) => {
                    warn!("{e}, continuing with the query");
                    return Ok(());
                }
            },
            TargetsMode::Require => self.api.targets().await?,
        };
        writeln!(
            self.out,
            "Targets: {}",
            serde_json::to_string_pretty(&targets.data)?
        )?;
        Ok(())
    }

    #[cfg(test)]
    pub fn into_inner(self) -> (A, W) {
        (self.api, self.out)
    }
}

/// Copies series out of a matrix result. Every other shape is rejected.
pub fn extract_series(
    name: &str,
    result: &QueryResult,
    selection: SeriesSelection,
) -> Result<Vec<TimeSeries>> {
    let streams = match result {
        QueryResult::Matrix(streams) => streams,
        QueryResult::Vector(_) | QueryResult::Scalar(_) | QueryResult::String(_) => {
            return Err(QueryRunnerError::UnsupportedResultShape {
                shape: result.shape(),
            })
        }
    };
    let Some(first) = streams.first() else {
        return Err(QueryRunnerError::EmptyResult);
    };
    Ok(match selection {
        SeriesSelection::First => vec![TimeSeries::from_stream(name, first)],
        SeriesSelection::All => streams
            .iter()
            .map(|stream| TimeSeries::from_stream(name, stream))
            .collect(),
    })
}
