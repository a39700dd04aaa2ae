use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{AccountFilter, Ledger, RetryPolicy};
use crate::error::LedgerError;
use crate::types::{Address, RawAccount};

const COMMITMENT: &str = "confirmed";

/// JSON-RPC 2.0 ledger client.
#[derive(Clone)]
pub struct RpcLedger {
    url: String,
    http: reqwest::Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl RpcLedger {
    pub fn new(url: String, timeout: Duration, retry: RetryPolicy) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { url, http, timeout, retry })
    }

    async fn call<T: DeserializeOwned>(&self, method: &'static str, params: Value) -> Result<T, LedgerError> {
        self.retry
            .run(|_| self.call_once(method, &params), LedgerError::is_retryable)
            .await
    }

    async fn call_once<T: DeserializeOwned>(&self, method: &'static str, params: &Value) -> Result<T, LedgerError> {
        let body = json!({ "jsonrpc": "2.0", "id": 1, "method": method, "params": params });
        let envelope: RpcEnvelope<T> = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| self.transport_error(e))?;
        envelope.into_result(method)
    }

    fn transport_error(&self, e: reqwest::Error) -> LedgerError {
        if e.is_timeout() {
            LedgerError::Timeout(self.timeout)
        } else {
            LedgerError::Transport(e)
        }
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn get_account_info(&self, address: &Address) -> Result<Option<Vec<u8>>, LedgerError> {
        let params = json!([address.to_string(), { "encoding": "base64", "commitment": COMMITMENT }]);
        let resp: WithContext<Option<AccountData>> = self.call("getAccountInfo", params).await?;
        resp.value.map(|a| a.decode()).transpose()
    }

    async fn get_program_accounts(
        &self,
        program: &Address,
        filters: &[AccountFilter],
    ) -> Result<Vec<RawAccount>, LedgerError> {
        let params = json!([
            program.to_string(),
            { "encoding": "base64", "commitment": COMMITMENT, "filters": filters_json(filters) }
        ]);
        let items: Vec<KeyedAccount> = self.call("getProgramAccounts", params).await?;
        tracing::debug!(program = %program, accounts = items.len(), "program accounts listed");
        items.into_iter().map(KeyedAccount::into_raw).collect()
    }
}

fn filters_json(filters: &[AccountFilter]) -> Value {
    Value::Array(
        filters
            .iter()
            .map(|f| match f {
                AccountFilter::DataSize(n) => json!({ "dataSize": n }),
                AccountFilter::Memcmp { offset, bytes } => json!({
                    "memcmp": { "offset": offset, "bytes": bs58::encode(bytes).into_string() }
                }),
            })
            .collect(),
    )
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

impl<T> RpcEnvelope<T> {
    fn into_result(self, method: &str) -> Result<T, LedgerError> {
        if let Some(e) = self.error {
            return Err(LedgerError::Rpc { code: e.code, message: e.message });
        }
        self.result
            .ok_or_else(|| LedgerError::Response(format!("{method}: neither result nor error")))
    }
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct AccountData {
    /// `[payload, encoding]`
    data: (String, String),
}

impl AccountData {
    fn decode(self) -> Result<Vec<u8>, LedgerError> {
        let (payload, encoding) = self.data;
        if encoding != "base64" {
            return Err(LedgerError::Response(format!("unexpected account encoding {encoding}")));
        }
        BASE64
            .decode(payload)
            .map_err(|e| LedgerError::Response(format!("bad base64 account data: {e}")))
    }
}

#[derive(Debug, Deserialize)]
struct KeyedAccount {
    pubkey: String,
    account: AccountData,
}

impl KeyedAccount {
    fn into_raw(self) -> Result<RawAccount, LedgerError> {
        let address = self
            .pubkey
            .parse::<Address>()
            .map_err(|e| LedgerError::Response(format!("bad pubkey {}: {e}", self.pubkey)))?;
        Ok(RawAccount { address, bytes: self.account.decode()? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_serialize_in_rpc_shape() {
        let market = Address::new([8u8; 32]);
        let v = filters_json(&[
            AccountFilter::DataSize(90),
            AccountFilter::Memcmp { offset: 40, bytes: market.as_bytes().to_vec() },
        ]);
        assert_eq!(v[0], json!({ "dataSize": 90 }));
        assert_eq!(v[1]["memcmp"]["offset"], json!(40));
        assert_eq!(v[1]["memcmp"]["bytes"], json!(market.to_string()));
    }

    #[test]
    fn account_info_decodes_base64_payload() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":5},
            "value":{"data":["AQID","base64"],"executable":false,"lamports":1,"owner":"x"}}}"#;
        let env: RpcEnvelope<WithContext<Option<AccountData>>> = serde_json::from_str(raw).unwrap();
        let data = env.into_result("getAccountInfo").unwrap().value.unwrap().decode().unwrap();
        assert_eq!(data, vec![1, 2, 3]);
    }

    #[test]
    fn missing_account_is_none() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":{"context":{"slot":5},"value":null}}"#;
        let env: RpcEnvelope<WithContext<Option<AccountData>>> = serde_json::from_str(raw).unwrap();
        assert!(env.into_result("getAccountInfo").unwrap().value.is_none());
    }

    #[test]
    fn rpc_error_object_wins() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid param"}}"#;
        let env: RpcEnvelope<Vec<KeyedAccount>> = serde_json::from_str(raw).unwrap();
        match env.into_result("getProgramAccounts") {
            Err(LedgerError::Rpc { code, message }) => {
                assert_eq!(code, -32602);
                assert_eq!(message, "Invalid param");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn program_accounts_parse_keys_and_data() {
        let key = Address::new([3u8; 32]);
        let raw = format!(
            r#"{{"jsonrpc":"2.0","id":1,"result":[{{"pubkey":"{key}","account":{{"data":["AAE=","base64"]}}}}]}}"#
        );
        let env: RpcEnvelope<Vec<KeyedAccount>> = serde_json::from_str(&raw).unwrap();
        let accounts: Vec<RawAccount> = env
            .into_result("getProgramAccounts")
            .unwrap()
            .into_iter()
            .map(|k| k.into_raw().unwrap())
            .collect();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].address, key);
        assert_eq!(accounts[0].bytes, vec![0, 1]);
    }

    #[test]
    fn non_base64_encoding_is_a_response_error() {
        let acct = AccountData { data: ("abc".into(), "base58".into()) };
        assert!(matches!(acct.decode(), Err(LedgerError::Response(_))));
    }
}
