use std::collections::HashMap;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::truncate;
use crate::models::CostPoint;

/// Cost column names the Cost Management API is known to return, in
/// preference order.
const COST_COLUMN_CANDIDATES: [&str; 4] = ["Cost", "PreTaxCost", "CostUSD", "CostInBillingCurrency"];

const FALLBACK_RESOURCE_ID: &str = "[unassigned]";

#[derive(Debug, Deserialize)]
struct CostQueryResponse {
    properties: Option<CostQueryProperties>,
}

#[derive(Debug, Deserialize, Default)]
struct CostQueryProperties {
    #[serde(default)]
    columns: Vec<CostQueryColumn>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct CostQueryColumn {
    name: Option<String>,
}

/// Fetch daily per-resource costs for one subscription over a date window.
pub async fn query_subscription_costs(
    http: &reqwest::Client,
    subscription_id: &str,
    access_token: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> anyhow::Result<Vec<CostPoint>> {
    let endpoint = format!(
        "https://management.azure.com/subscriptions/{subscription_id}/providers/Microsoft.CostManagement/query?api-version=2023-03-01"
    );
    let body = serde_json::json!({
        "type": "ActualCost",
        "timeframe": "Custom",
        "timePeriod": {
            "from": format!("{start_date}T00:00:00Z"),
            "to": format!("{}T00:00:00Z", end_date.succ_opt().unwrap_or(end_date)),
        },
        "dataset": {
            "granularity": "Daily",
            "aggregation": { "totalCost": { "name": "Cost", "function": "Sum" } },
            "grouping": [ { "type": "Dimension", "name": "ResourceId" } ],
        },
    });

    let response = http
        .post(&endpoint)
        .bearer_auth(access_token)
        .json(&body)
        .send()
        .await
        .context("Cost query failed to send")?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        bail!(
            "Cost query failed ({status}) for subscription {subscription_id}. {}",
            truncate(&text, 240)
        );
    }

    let payload: CostQueryResponse = response
        .json()
        .await
        .context("Cost query response was not valid JSON")?;
    parse_cost_rows(payload.properties.unwrap_or_default())
}

/// Turn the columnar response into aggregated (date, resource, currency)
/// points. A response without the expected columns is a data-shape failure
/// for this subscription.
fn parse_cost_rows(properties: CostQueryProperties) -> anyhow::Result<Vec<CostPoint>> {
    if properties.columns.is_empty() || properties.rows.is_empty() {
        return Ok(Vec::new());
    }

    let indexes: HashMap<String, usize> = properties
        .columns
        .iter()
        .enumerate()
        .filter_map(|(index, column)| {
            column.name.as_ref().map(|name| (name.to_lowercase(), index))
        })
        .collect();

    let usage_date_index = *indexes
        .get("usagedate")
        .context("Cost query response did not contain UsageDate column.")?;
    let resource_id_index = *indexes
        .get("resourceid")
        .context("Cost query response did not contain ResourceId column.")?;
    let cost_index = COST_COLUMN_CANDIDATES
        .iter()
        .find_map(|candidate| indexes.get(&candidate.to_lowercase()).copied())
        .context("Cost query response did not contain a known cost column.")?;
    let currency_index = indexes.get("currency").copied();

    let mut aggregate: HashMap<(NaiveDate, String, String), Decimal> = HashMap::new();
    let widest = usage_date_index.max(resource_id_index).max(cost_index);
    for row in &properties.rows {
        if row.len() <= widest {
            continue;
        }

        let date = parse_usage_date(&row[usage_date_index])?;
        let resource_id = parse_resource_id(&row[resource_id_index]);
        let currency = currency_index
            .and_then(|idx| row.get(idx))
            .and_then(Value::as_str)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or("USD")
            .to_string();
        let cost = parse_decimal(&row[cost_index]);

        *aggregate.entry((date, resource_id, currency)).or_default() += cost;
    }

    let mut points: Vec<CostPoint> = aggregate
        .into_iter()
        .map(|((date, resource_id, currency), cost)| CostPoint {
            date,
            resource_id,
            cost: cost.round_dp(4),
            currency,
        })
        .collect();
    points.sort_by(|a, b| {
        a.date
            .cmp(&b.date)
            .then_with(|| a.resource_id.to_lowercase().cmp(&b.resource_id.to_lowercase()))
    });
    Ok(points)
}

/// The API returns usage dates as yyyymmdd integers, numeric strings, ISO
/// dates or full timestamps depending on the endpoint version.
fn parse_usage_date(value: &Value) -> anyhow::Result<NaiveDate> {
    if let Some(numeric) = value.as_i64() {
        return numeric_date(numeric);
    }

    if let Some(raw) = value.as_str() {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("UsageDate column returned an empty value.");
        }
        if let Ok(numeric) = raw.parse::<i64>() {
            return numeric_date(numeric);
        }
        if let Ok(date) = raw.parse::<NaiveDate>() {
            return Ok(date);
        }
        if let Ok(timestamp) = raw.parse::<DateTime<chrono::Utc>>() {
            return Ok(timestamp.date_naive());
        }
    }

    bail!("UsageDate column returned an unsupported format.")
}

fn numeric_date(yyyymmdd: i64) -> anyhow::Result<NaiveDate> {
    let year = (yyyymmdd / 10000) as i32;
    let month = ((yyyymmdd / 100) % 100) as u32;
    let day = (yyyymmdd % 100) as u32;
    NaiveDate::from_ymd_opt(year, month, day)
        .with_context(|| format!("UsageDate value {yyyymmdd} is not a calendar date."))
}

fn parse_resource_id(value: &Value) -> String {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_RESOURCE_ID)
        .to_string()
}

fn parse_decimal(value: &Value) -> Decimal {
    if let Some(number) = value.as_f64() {
        return Decimal::from_f64_retain(number).unwrap_or_default();
    }
    value
        .as_str()
        .and_then(|s| s.trim().parse::<Decimal>().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn properties(columns: &[&str], rows: Vec<Vec<Value>>) -> CostQueryProperties {
        CostQueryProperties {
            columns: columns
                .iter()
                .map(|name| CostQueryColumn {
                    name: Some(name.to_string()),
                })
                .collect(),
            rows,
        }
    }

    #[test]
    fn parses_numeric_usage_dates_and_aggregates_duplicates() {
        let props = properties(
            &["UsageDate", "ResourceId", "Cost", "Currency"],
            vec![
                vec![json!(20260315), json!("/subs/a/vm1"), json!(1.25), json!("USD")],
                vec![json!(20260315), json!("/SUBS/A/vm1"), json!(0.75), json!("USD")],
                vec![json!("20260316"), json!("/subs/a/vm1"), json!(2.0), json!("USD")],
            ],
        );
        let points = parse_cost_rows(props).unwrap();

        // Duplicate keys aggregate only on exact id; case variants stay
        // separate here and merge later in the engine.
        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2026, 3, 15).unwrap());
        assert_eq!(points[2].cost, dec!(2.0000));
    }

    #[test]
    fn accepts_alternate_cost_column_names() {
        let props = properties(
            &["UsageDate", "ResourceId", "PreTaxCost"],
            vec![vec![json!("2026-03-15"), json!("/subs/a/db"), json!("3.5")]],
        );
        let points = parse_cost_rows(props).unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].cost, dec!(3.5));
        assert_eq!(points[0].currency, "USD");
    }

    #[test]
    fn missing_cost_column_is_a_shape_failure() {
        let props = properties(
            &["UsageDate", "ResourceId", "Quantity"],
            vec![vec![json!(20260315), json!("/subs/a/vm1"), json!(4)]],
        );
        let err = parse_cost_rows(props).unwrap_err();
        assert!(err.to_string().contains("known cost column"));
    }

    #[test]
    fn missing_resource_id_falls_back_to_unassigned() {
        let props = properties(
            &["UsageDate", "ResourceId", "Cost"],
            vec![vec![json!(20260315), json!(""), json!(0.5)]],
        );
        let points = parse_cost_rows(props).unwrap();
        assert_eq!(points[0].resource_id, FALLBACK_RESOURCE_ID);
    }

    #[test]
    fn empty_response_yields_no_points() {
        let points = parse_cost_rows(CostQueryProperties::default()).unwrap();
        assert!(points.is_empty());
    }
}
