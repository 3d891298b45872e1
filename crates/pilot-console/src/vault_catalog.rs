use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::vault_decode::{VaultAsset, VaultCatalogItem};

/// A catalog entry joined with what is installed locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedAsset {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub latest_version: String,
    pub versions_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    pub installed_version: Option<String>,
    pub installed: bool,
    pub has_update: bool,
    pub scope: Option<String>,
    pub clients: Vec<String>,
}

/// Integer value of a version label such as `v3`, `V12` or `3.1`.
///
/// One leading `v`/`V` is dropped, then the leading run of digits is read.
/// Anything else yields `None`.
pub fn parse_version(raw: &str) -> Option<i64> {
    let s = raw
        .strip_prefix(|c: char| c == 'v' || c == 'V')
        .unwrap_or(raw)
        .trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let n: i64 = digits[..end].parse().ok()?;
    Some(if negative { -n } else { n })
}

/// Join the catalog with installed assets, preserving catalog order.
///
/// `has_update` is set only when the asset is installed and both versions
/// parse as integers with the installed one strictly lower.
pub fn merge_assets(catalog: &[VaultCatalogItem], assets: &[VaultAsset]) -> Vec<MergedAsset> {
    let by_name: HashMap<&str, &VaultAsset> =
        assets.iter().map(|a| (a.name.as_str(), a)).collect();

    catalog
        .iter()
        .map(|item| {
            let installed = by_name.get(item.name.as_str()).copied();
            let has_update = installed
                .and_then(|a| {
                    let latest = parse_version(&item.latest_version)?;
                    let current = parse_version(&a.version)?;
                    Some(current < latest)
                })
                .unwrap_or(false);

            MergedAsset {
                name: item.name.clone(),
                kind: item.kind.clone(),
                latest_version: item.latest_version.clone(),
                versions_count: item.versions_count,
                updated_at: item.updated_at.clone(),
                installed_version: installed.map(|a| a.version.clone()),
                installed: installed.is_some(),
                has_update,
                scope: installed.map(|a| a.scope.clone()),
                clients: installed.map(|a| a.clients.clone()).unwrap_or_default(),
            }
        })
        .collect()
}
