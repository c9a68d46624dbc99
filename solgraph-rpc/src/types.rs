use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Byte length of a base58 account address.
pub const ADDRESS_BYTES: usize = 32;
/// Byte length of a base58 transaction signature.
pub const SIGNATURE_BYTES: usize = 64;

pub fn is_valid_address(input: &str) -> bool {
    !input.is_empty()
        && bs58::decode(input)
            .into_vec()
            .map(|bytes| bytes.len() == ADDRESS_BYTES)
            .unwrap_or(false)
}

pub fn is_valid_signature(input: &str) -> bool {
    !input.is_empty()
        && bs58::decode(input)
            .into_vec()
            .map(|bytes| bytes.len() == SIGNATURE_BYTES)
            .unwrap_or(false)
}

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: &str, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// One row of a signature-history lookup, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRecord {
    pub signature: String,
    #[serde(default)]
    pub slot: u64,
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(default)]
    pub block_time: Option<i64>,
}

impl SignatureRecord {
    pub fn succeeded(&self) -> bool {
        self.err.is_none()
    }
}

/// A token-transfer row from the specialized history source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    pub signature: String,
    pub source: String,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub amount: u64,
    #[serde(default)]
    pub block_time: Option<i64>,
}

/// Decoded transaction detail: who took part and whose balances moved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionDetail {
    pub signature: String,
    pub success: bool,
    pub block_time: Option<i64>,
    pub account_keys: Vec<String>,
    pub balance_changes: Vec<BalanceChange>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChange {
    pub account: String,
    pub delta: i64,
}

impl TransactionDetail {
    /// Decode a raw `getTransaction` payload. Account keys appear either as
    /// plain strings or as `{ "pubkey": ... }` objects depending on the
    /// encoding the endpoint chose; both are accepted. Returns `None` when
    /// the payload carries no transaction at all.
    pub fn from_rpc(signature: &str, value: &Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }

        let meta = value.get("meta");
        let success = meta
            .and_then(|m| m.get("err"))
            .map(|e| e.is_null())
            .unwrap_or(true);
        let block_time = value.get("blockTime").and_then(Value::as_i64);

        let account_keys: Vec<String> = value
            .get("transaction")
            .and_then(|t| t.get("message"))
            .and_then(|m| m.get("accountKeys"))
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(account_key).collect())
            .unwrap_or_default();

        let pre: Vec<i64> = balances(meta, "preBalances");
        let post: Vec<i64> = balances(meta, "postBalances");
        let balance_changes = pre
            .iter()
            .zip(post.iter())
            .enumerate()
            .filter(|(_, (before, after))| before != after)
            .filter_map(|(index, (before, after))| {
                account_keys.get(index).map(|account| BalanceChange {
                    account: account.clone(),
                    delta: after - before,
                })
            })
            .collect();

        Some(Self {
            signature: signature.to_string(),
            success,
            block_time,
            account_keys,
            balance_changes,
        })
    }
}

fn account_key(entry: &Value) -> Option<String> {
    match entry {
        Value::String(key) => Some(key.clone()),
        Value::Object(map) => map
            .get("pubkey")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

fn balances(meta: Option<&Value>, field: &str) -> Vec<i64> {
    meta.and_then(|m| m.get(field))
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

/// An account's resolved activity. Resolution never yields an absent value:
/// a visited-but-empty account is represented by an empty transaction list.
#[derive(Debug, Clone, Default)]
pub struct AccountActivity {
    pub address: String,
    pub transactions: Vec<TransactionRecord>,
}

impl AccountActivity {
    pub fn empty(address: &str) -> Self {
        Self {
            address: address.to_string(),
            transactions: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

/// A single transaction seen from the perspective of one account.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub signature: String,
    pub success: bool,
    pub block_time: Option<i64>,
    pub participants: Vec<String>,
    pub transfers: Vec<TransferRecord>,
}

/// A balance movement attributed to `account` within a transaction.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub account: String,
    pub amount: u64,
}

impl TransactionRecord {
    pub fn from_detail(detail: &TransactionDetail) -> Self {
        Self {
            signature: detail.signature.clone(),
            success: detail.success,
            block_time: detail.block_time,
            participants: detail.account_keys.clone(),
            transfers: detail
                .balance_changes
                .iter()
                .map(|change| TransferRecord {
                    account: change.account.clone(),
                    amount: change.delta.unsigned_abs(),
                })
                .collect(),
        }
    }
}
