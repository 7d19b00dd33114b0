use reqwest::blocking::Client;
use serde::Deserialize;

use crate::net::get_with_retries;
use crate::HarvestError;

#[derive(Deserialize)]
struct RankingPayload {
    rows: Vec<RankingRow>,
}

#[derive(Deserialize)]
struct RankingRow {
    project: String,
}

pub(crate) fn fetch_ranking(
    client: &Client,
    url: &str,
    attempts: usize,
) -> Result<Vec<String>, HarvestError> {
    let response = get_with_retries(client, url, attempts)?;
    let body = response
        .text()
        .map_err(|err| HarvestError::network(url, err))?;
    parse_ranking(url, &body)
}

/// Parse a `{"rows": [{"project": name}, ...]}` payload, keeping rank order.
pub fn parse_ranking(url: &str, body: &str) -> Result<Vec<String>, HarvestError> {
    let payload: RankingPayload =
        serde_json::from_str(body).map_err(|err| HarvestError::format(url, err))?;
    Ok(payload.rows.into_iter().map(|row| row.project).collect())
}
