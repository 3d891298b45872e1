//! Typed decoding of `sx` JSON output.
//!
//! `sx` is an external CLI whose output shape we do not control. Everything
//! it prints is decoded here, into either a response type or a
//! [`DecodeError`], so malformed output is rejected at one boundary.

use serde::{Deserialize, Serialize, de::DeserializeOwned, de::Unexpected};
use serde_json::Value;

const DEFAULT_SCOPE: &str = "Global";
const DEFAULT_ASSET_STATUS: &str = "unknown";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid JSON from `{what}`: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("`{what}` output is missing `{field}`")]
    MissingField {
        what: &'static str,
        field: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultAsset {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub clients: Vec<String>,
    pub status: String,
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultCatalogItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub latest_version: String,
    pub versions_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Installed/configured state of the Vault plus its catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultStatus {
    pub installed: bool,
    pub version: Option<String>,
    pub configured: bool,
    pub vault_url: Option<String>,
    pub profile: Option<String>,
    pub assets: Vec<VaultAsset>,
    pub catalog: Vec<VaultCatalogItem>,
    pub is_installing: bool,
}

impl VaultStatus {
    /// Snapshot reported when `sx` is absent or unusable.
    pub fn not_installed(is_installing: bool) -> Self {
        Self {
            installed: false,
            version: None,
            configured: false,
            vault_url: None,
            profile: None,
            assets: Vec::new(),
            catalog: Vec::new(),
            is_installing,
        }
    }

    pub fn with_installing(mut self, is_installing: bool) -> Self {
        self.is_installing = is_installing;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub description: Option<String>,
    pub authors: Vec<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetVersion {
    pub version: String,
    pub created_at: Option<String>,
    pub files_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDetail {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub metadata: AssetMetadata,
    pub versions: Vec<AssetVersion>,
}

// ---- wire shapes ----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SxConfigOutput {
    #[serde(default)]
    version: Option<SxVersionInfo>,
    #[serde(default)]
    config: Option<SxRepoConfig>,
    #[serde(default)]
    assets: Option<Vec<SxScopeGroup>>,
}

#[derive(Debug, Deserialize)]
struct SxVersionInfo {
    #[serde(default)]
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SxRepoConfig {
    #[serde(default)]
    repository_url: Option<String>,
    #[serde(default)]
    profile: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SxScopeGroup {
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    assets: Option<Vec<SxInstalledAsset>>,
}

#[derive(Debug, Deserialize)]
struct SxInstalledAsset {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    clients: Option<Vec<String>>,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SxCatalogItem {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    latest_version: Option<String>,
    #[serde(default)]
    versions_count: Option<u64>,
    #[serde(default)]
    updated_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SxAssetShow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    metadata: Option<SxAssetMetadata>,
    #[serde(default)]
    versions: Option<Vec<SxAssetVersion>>,
}

#[derive(Debug, Deserialize)]
struct SxAssetMetadata {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    authors: Option<Vec<String>>,
    #[serde(default)]
    keywords: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SxAssetVersion {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    files_count: Option<u64>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

/// Container layout a command's output must have before it is mapped onto
/// the wire structs. Serde would otherwise fill a struct from an array
/// positionally. Absent and `null` members are not checked.
enum Shape {
    Object(&'static [(&'static str, Shape)]),
    ArrayOf(&'static Shape),
}

const CONFIG_SHAPE: Shape = Shape::Object(&[
    ("version", Shape::Object(&[])),
    ("config", Shape::Object(&[])),
    (
        "assets",
        Shape::ArrayOf(&Shape::Object(&[("assets", Shape::ArrayOf(&Shape::Object(&[])))])),
    ),
]);

const CATALOG_SHAPE: Shape = Shape::ArrayOf(&Shape::Object(&[]));

const SHOW_SHAPE: Shape = Shape::Object(&[
    ("metadata", Shape::Object(&[])),
    ("versions", Shape::ArrayOf(&Shape::Object(&[]))),
]);

fn invalid_type(value: &Value, expected: &str) -> serde_json::Error {
    let unexpected = match value {
        Value::Null => Unexpected::Unit,
        Value::Bool(b) => Unexpected::Bool(*b),
        Value::Number(_) => Unexpected::Other("number"),
        Value::String(s) => Unexpected::Str(s),
        Value::Array(_) => Unexpected::Seq,
        Value::Object(_) => Unexpected::Map,
    };
    <serde_json::Error as serde::de::Error>::invalid_type(unexpected, &expected)
}

fn check_shape(value: &Value, shape: &Shape) -> Result<(), serde_json::Error> {
    match (shape, value) {
        (Shape::Object(members), Value::Object(map)) => {
            for (key, inner) in members.iter() {
                match map.get(*key) {
                    None | Some(Value::Null) => {}
                    Some(member) => check_shape(member, inner)?,
                }
            }
            Ok(())
        }
        (Shape::ArrayOf(inner), Value::Array(items)) => {
            items.iter().try_for_each(|item| check_shape(item, inner))
        }
        (Shape::Object(_), other) => Err(invalid_type(other, "a JSON object")),
        (Shape::ArrayOf(_), other) => Err(invalid_type(other, "a JSON array")),
    }
}

fn parse<T: DeserializeOwned>(
    what: &'static str,
    raw: &str,
    shape: &Shape,
) -> Result<T, DecodeError> {
    let json = |source| DecodeError::Json { what, source };
    let value: Value = serde_json::from_str(raw).map_err(json)?;
    check_shape(&value, shape).map_err(json)?;
    serde_json::from_value(value).map_err(json)
}

/// Build a [`VaultStatus`] from `sx config --json` and, when available,
/// `sx vault list --json`.
pub fn decode_status(
    config_raw: &str,
    catalog_raw: Option<&str>,
    is_installing: bool,
) -> Result<VaultStatus, DecodeError> {
    let config: SxConfigOutput = parse("sx config", config_raw, &CONFIG_SHAPE)?;
    let catalog = match catalog_raw {
        Some(raw) => decode_catalog(raw)?,
        None => Vec::new(),
    };

    let mut assets = Vec::new();
    for group in config.assets.unwrap_or_default() {
        let scope = non_empty(group.scope).unwrap_or_else(|| DEFAULT_SCOPE.to_string());
        for asset in group.assets.unwrap_or_default() {
            let name = non_empty(asset.name).ok_or(DecodeError::MissingField {
                what: "sx config",
                field: "assets[].name",
            })?;
            assets.push(VaultAsset {
                name,
                version: asset.version.unwrap_or_default(),
                kind: asset.kind.unwrap_or_default(),
                clients: asset.clients.unwrap_or_default(),
                status: non_empty(asset.status)
                    .unwrap_or_else(|| DEFAULT_ASSET_STATUS.to_string()),
                scope: scope.clone(),
            });
        }
    }

    let (vault_url, profile) = match config.config {
        Some(c) => (non_empty(c.repository_url), non_empty(c.profile)),
        None => (None, None),
    };

    Ok(VaultStatus {
        installed: true,
        version: config.version.and_then(|v| non_empty(v.version)),
        configured: vault_url.is_some(),
        vault_url,
        profile,
        assets,
        catalog,
        is_installing,
    })
}

fn decode_catalog(raw: &str) -> Result<Vec<VaultCatalogItem>, DecodeError> {
    let items: Vec<SxCatalogItem> = parse("sx vault list", raw, &CATALOG_SHAPE)?;
    items
        .into_iter()
        .map(|item| {
            Ok(VaultCatalogItem {
                name: non_empty(item.name).ok_or(DecodeError::MissingField {
                    what: "sx vault list",
                    field: "name",
                })?,
                kind: item.kind.unwrap_or_default(),
                latest_version: item.latest_version.unwrap_or_default(),
                versions_count: item.versions_count.unwrap_or(0),
                updated_at: item.updated_at,
            })
        })
        .collect()
}

/// Decode `sx vault show <name> --json`. Output without a `name` and `type`
/// is a contract violation.
pub fn decode_detail(raw: &str) -> Result<AssetDetail, DecodeError> {
    let show: SxAssetShow = parse("sx vault show", raw, &SHOW_SHAPE)?;
    let name = non_empty(show.name).ok_or(DecodeError::MissingField {
        what: "sx vault show",
        field: "name",
    })?;
    let kind = non_empty(show.kind).ok_or(DecodeError::MissingField {
        what: "sx vault show",
        field: "type",
    })?;

    let metadata = match show.metadata {
        Some(m) => AssetMetadata {
            description: m.description,
            authors: m.authors.unwrap_or_default(),
            keywords: m.keywords.unwrap_or_default(),
        },
        None => AssetMetadata {
            description: None,
            authors: Vec::new(),
            keywords: Vec::new(),
        },
    };

    let versions = show
        .versions
        .unwrap_or_default()
        .into_iter()
        .map(|v| AssetVersion {
            version: v.version.unwrap_or_default(),
            created_at: v.created_at,
            files_count: v.files_count.unwrap_or(0),
        })
        .collect();

    Ok(AssetDetail {
        name,
        kind,
        metadata,
        versions,
    })
}
