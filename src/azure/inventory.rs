use anyhow::{bail, Context};
use serde::Deserialize;
use serde_json::Value;

use super::truncate;
use crate::models::{InventorySnapshot, StoppedVmRow, UnattachedDiskRow, UnusedPublicIpRow};

const RESOURCE_GRAPH_ENDPOINT: &str =
    "https://management.azure.com/providers/Microsoft.ResourceGraph/resources?api-version=2022-10-01";

const UNATTACHED_DISKS_QUERY: &str = r#"Resources
| where type =~ 'microsoft.compute/disks'
| where isempty(tostring(managedBy))
| project id, name, subscriptionId, sku = tostring(sku.name), sizeGb = toint(properties.diskSizeGB)"#;

const UNUSED_PUBLIC_IPS_QUERY: &str = r#"Resources
| where type =~ 'microsoft.network/publicipaddresses'
| extend ipConfigId = tostring(properties.ipConfiguration.id)
| extend natGatewayId = tostring(properties.natGateway.id)
| where isempty(ipConfigId) and isempty(natGatewayId)
| project id, name, subscriptionId, sku = tostring(sku.name), allocation = tostring(properties.publicIPAllocationMethod)"#;

const STOPPED_VMS_QUERY: &str = r#"Resources
| where type =~ 'microsoft.compute/virtualmachines'
| extend powerState = tostring(properties.extended.instanceView.powerState.code)
| where powerState has 'stopped' or powerState has 'deallocated'
| project id, name, subscriptionId, powerState"#;

#[derive(Debug, Deserialize)]
struct ResourceGraphResponse {
    #[serde(default)]
    data: Value,
}

/// Run the three idle-resource scans for one subscription.
pub async fn query_inventory(
    http: &reqwest::Client,
    subscription_id: &str,
    access_token: &str,
) -> anyhow::Result<InventorySnapshot> {
    let disks = query_resource_graph(http, subscription_id, access_token, UNATTACHED_DISKS_QUERY)
        .await?
        .iter()
        .filter_map(parse_disk_row)
        .collect();
    let ips = query_resource_graph(http, subscription_id, access_token, UNUSED_PUBLIC_IPS_QUERY)
        .await?
        .iter()
        .filter_map(parse_public_ip_row)
        .collect();
    let vms = query_resource_graph(http, subscription_id, access_token, STOPPED_VMS_QUERY)
        .await?
        .iter()
        .filter_map(parse_stopped_vm_row)
        .collect();

    Ok(InventorySnapshot {
        unattached_disks: disks,
        unused_public_ips: ips,
        stopped_vms: vms,
    })
}

async fn query_resource_graph(
    http: &reqwest::Client,
    subscription_id: &str,
    access_token: &str,
    query: &str,
) -> anyhow::Result<Vec<Value>> {
    let body = serde_json::json!({
        "subscriptions": [subscription_id],
        "query": query,
        "options": { "resultFormat": "objectArray", "top": 1000 },
    });

    let response = http
        .post(RESOURCE_GRAPH_ENDPOINT)
        .bearer_auth(access_token)
        .json(&body)
        .send()
        .await
        .context("Resource Graph query failed to send")?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        bail!(
            "Resource Graph query failed ({status}) for subscription {subscription_id}. {}",
            truncate(&text, 260)
        );
    }

    let payload: ResourceGraphResponse = response
        .json()
        .await
        .context("Resource Graph response was not valid JSON")?;
    match payload.data {
        Value::Array(items) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

fn parse_disk_row(row: &Value) -> Option<UnattachedDiskRow> {
    let resource_id = non_empty_string(row, "id")?;
    Some(UnattachedDiskRow {
        name: string_or_default(row, "name"),
        sku: string_or_default(row, "sku"),
        size_gb: int_field(row, "sizeGb"),
        resource_id,
    })
}

fn parse_public_ip_row(row: &Value) -> Option<UnusedPublicIpRow> {
    let resource_id = non_empty_string(row, "id")?;
    Some(UnusedPublicIpRow {
        name: string_or_default(row, "name"),
        sku: string_or_default(row, "sku"),
        allocation: string_or_default(row, "allocation"),
        resource_id,
    })
}

fn parse_stopped_vm_row(row: &Value) -> Option<StoppedVmRow> {
    let resource_id = non_empty_string(row, "id")?;
    Some(StoppedVmRow {
        name: string_or_default(row, "name"),
        power_state: string_or_default(row, "powerState"),
        resource_id,
    })
}

fn non_empty_string(row: &Value, field: &str) -> Option<String> {
    row.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn string_or_default(row: &Value, field: &str) -> String {
    non_empty_string(row, field).unwrap_or_default()
}

fn int_field(row: &Value, field: &str) -> Option<i32> {
    let value = row.get(field)?;
    if let Some(number) = value.as_i64() {
        return i32::try_from(number).ok();
    }
    value.as_str().and_then(|s| s.trim().parse::<i32>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn disk_rows_parse_with_numeric_or_string_sizes() {
        let row = json!({"id": "/subs/a/disks/d1", "name": "d1", "sku": "Premium_LRS", "sizeGb": 128});
        let parsed = parse_disk_row(&row).unwrap();
        assert_eq!(parsed.size_gb, Some(128));

        let row = json!({"id": "/subs/a/disks/d2", "name": "d2", "sku": "Standard_LRS", "sizeGb": "64"});
        assert_eq!(parse_disk_row(&row).unwrap().size_gb, Some(64));

        let row = json!({"id": "/subs/a/disks/d3", "name": "d3", "sku": "Standard_LRS"});
        assert_eq!(parse_disk_row(&row).unwrap().size_gb, None);
    }

    #[test]
    fn rows_without_an_id_are_dropped() {
        assert!(parse_disk_row(&json!({"name": "d1"})).is_none());
        assert!(parse_stopped_vm_row(&json!({"id": "  "})).is_none());
    }

    #[test]
    fn vm_rows_carry_the_power_state() {
        let row = json!({"id": "/subs/a/vms/v1", "name": "v1", "powerState": "PowerState/deallocated"});
        let parsed = parse_stopped_vm_row(&row).unwrap();
        assert_eq!(parsed.power_state, "PowerState/deallocated");
    }
}
