//! In-process STEP peer for integration tests.
//!
//! Speaks the real wire codec over TCP on `127.0.0.1:0`. Files and records
//! live in memory. [`PeerBehavior`] switches on the misbehaviours the
//! client has to cope with.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use step_protocol::constants::{
    FIELD_BLOCK_INDEX, FIELD_KEY, FIELD_OPERATION, FIELD_PASSWORD, FIELD_SIZE, FIELD_TOKEN,
    FIELD_TYPE, FIELD_USERNAME, is_reserved_record_field,
};
use step_protocol::wire::{read_envelope, write_envelope};
use step_protocol::{Envelope, Metadata};
use step_transfer::{TransferPlan, md5_hex};
use tokio::net::{TcpListener, TcpStream};

pub const IDENTIFIER: &str = "2025123456";

#[derive(Debug, Clone)]
pub struct PeerBehavior {
    pub block_size: u64,
    /// Answer this block index (upload or download) with status 500.
    pub reject_block: Option<u64>,
    /// Drop the last byte of the final DOWNLOAD payload.
    pub short_final_chunk: bool,
    /// Add the md5 to the UPLOAD response of this block index.
    pub early_md5_at: Option<u64>,
    /// Add the md5 to the UPLOAD response of the final block.
    pub md5_on_last_block: bool,
    /// Token handed out on login; `None` omits the field.
    pub token: Option<String>,
}

impl Default for PeerBehavior {
    fn default() -> Self {
        Self {
            block_size: 1024,
            reject_block: None,
            short_final_chunk: false,
            early_md5_at: None,
            md5_on_last_block: true,
            token: Some("tok-2025123456".into()),
        }
    }
}

#[derive(Default)]
struct Store {
    files: HashMap<String, Vec<u8>>,
    records: HashMap<String, Metadata>,
    /// `TYPE OPERATION` of every request, in arrival order.
    log: Vec<String>,
    next_id: u64,
}

impl Store {
    fn fresh_key(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }
}

pub struct MockPeer {
    addr: SocketAddr,
    store: Arc<Mutex<Store>>,
}

impl MockPeer {
    pub async fn start(behavior: PeerBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = Arc::new(Mutex::new(Store::default()));
        let behavior = Arc::new(behavior);

        let shared = Arc::clone(&store);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, Arc::clone(&shared), Arc::clone(&behavior)));
            }
        });

        Self { addr, store }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Labels of all requests seen so far, e.g. `FILE UPLOAD`.
    pub fn requests(&self) -> Vec<String> {
        self.store.lock().unwrap().log.clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.requests().iter().filter(|l| *l == label).count()
    }

    pub fn file(&self, key: &str) -> Option<Vec<u8>> {
        self.store.lock().unwrap().files.get(key).cloned()
    }

    pub fn put_file(&self, key: &str, data: Vec<u8>) {
        self.store.lock().unwrap().files.insert(key.into(), data);
    }
}

async fn serve(mut stream: TcpStream, store: Arc<Mutex<Store>>, behavior: Arc<PeerBehavior>) {
    while let Ok(request) = read_envelope(&mut stream).await {
        let answer = {
            let mut store = store.lock().unwrap();
            handle(&mut store, &behavior, request)
        };
        if let Some(reply) = answer {
            if write_envelope(&mut stream, &reply).await.is_err() {
                break;
            }
        }
    }
}

fn field<'a>(m: &'a Metadata, name: &str) -> Option<&'a str> {
    m.get(name).and_then(Value::as_str)
}

fn number(m: &Metadata, name: &str) -> Option<u64> {
    m.get(name).and_then(Value::as_u64)
}

fn reply(request: &Metadata, status: i64, fields: Value) -> Envelope {
    let mut m = Metadata::new();
    m.insert("type".into(), request.get(FIELD_TYPE).cloned().unwrap_or(Value::Null));
    m.insert(
        "operation".into(),
        request.get(FIELD_OPERATION).cloned().unwrap_or(Value::Null),
    );
    m.insert("direction".into(), "RESPONSE".into());
    m.insert("status".into(), status.into());
    m.insert(
        "status_msg".into(),
        if status == 200 { "OK" } else { "ERROR" }.into(),
    );
    if let Value::Object(extra) = fields {
        m.extend(extra);
    }
    Envelope::new(m)
}

fn handle(store: &mut Store, behavior: &PeerBehavior, request: Envelope) -> Option<Envelope> {
    let m = &request.metadata;
    let kind = field(m, FIELD_TYPE).unwrap_or_default().to_owned();
    let op = field(m, FIELD_OPERATION).unwrap_or_default().to_owned();
    store.log.push(format!("{kind} {op}"));

    if kind == "AUTH" && op == "LOGIN" {
        let username = field(m, FIELD_USERNAME).unwrap_or_default();
        if field(m, FIELD_PASSWORD) != Some(md5_hex(username.as_bytes()).as_str()) {
            return Some(reply(m, 401, json!({})));
        }
        return Some(match &behavior.token {
            Some(token) => reply(m, 200, json!({ "token": token })),
            None => reply(m, 200, json!({})),
        });
    }
    if kind == "AUTH" && op == "BYE" {
        return None;
    }
    if field(m, FIELD_TOKEN).is_none() || field(m, FIELD_TOKEN) != behavior.token.as_deref() {
        return Some(reply(m, 403, json!({})));
    }

    let plan_of = |key: &str, size: u64| {
        TransferPlan::new(
            key,
            size,
            behavior.block_size,
            TransferPlan::expected_total_block(size, behavior.block_size),
            None,
        )
        .unwrap()
    };

    let response = match (kind.as_str(), op.as_str()) {
        ("FILE", "SAVE") => {
            let size = number(m, FIELD_SIZE).unwrap_or_default();
            let key = match field(m, FIELD_KEY) {
                Some(key) => key.to_owned(),
                None => store.fresh_key("file"),
            };
            let plan = plan_of(&key, size);
            store.files.insert(key.clone(), vec![0; size as usize]);
            reply(
                m,
                200,
                json!({ "key": key, "block_size": plan.block_size, "total_block": plan.total_block }),
            )
        }
        ("FILE", "GET") => {
            let key = field(m, FIELD_KEY).unwrap_or_default();
            match store.files.get(key) {
                Some(data) => {
                    let plan = plan_of(key, data.len() as u64);
                    reply(
                        m,
                        200,
                        json!({
                            "key": key,
                            "size": plan.total_size,
                            "block_size": plan.block_size,
                            "total_block": plan.total_block,
                            "md5": md5_hex(data),
                        }),
                    )
                }
                None => reply(m, 404, json!({})),
            }
        }
        ("FILE", "UPLOAD") => {
            let key = field(m, FIELD_KEY).unwrap_or_default().to_owned();
            let index = number(m, FIELD_BLOCK_INDEX).unwrap_or_default();
            if behavior.reject_block == Some(index) {
                return Some(reply(m, 500, json!({ "block_index": index })));
            }
            let Some(data) = store.files.get_mut(&key) else {
                return Some(reply(m, 404, json!({})));
            };
            let plan = plan_of(&key, data.len() as u64);
            let offset = plan.block_offset(index) as usize;
            let end = (offset + request.payload.len()).min(data.len());
            data[offset..end].copy_from_slice(&request.payload[..end - offset]);

            let last = index + 1 == plan.total_block;
            if behavior.early_md5_at == Some(index) || (last && behavior.md5_on_last_block) {
                reply(m, 200, json!({ "key": key, "block_index": index, "md5": md5_hex(data) }))
            } else {
                reply(m, 200, json!({ "key": key, "block_index": index }))
            }
        }
        ("FILE", "DOWNLOAD") => {
            let key = field(m, FIELD_KEY).unwrap_or_default();
            let index = number(m, FIELD_BLOCK_INDEX).unwrap_or_default();
            if behavior.reject_block == Some(index) {
                return Some(reply(m, 500, json!({ "block_index": index })));
            }
            let Some(data) = store.files.get(key) else {
                return Some(reply(m, 404, json!({})));
            };
            let plan = plan_of(key, data.len() as u64);
            let offset = plan.block_offset(index) as usize;
            let len = plan.block_len(index).unwrap_or_default() as usize;
            let mut chunk = data[offset..offset + len].to_vec();
            if behavior.short_final_chunk && index + 1 == plan.total_block {
                chunk.pop();
            }
            let mut envelope = reply(m, 200, json!({ "key": key, "block_index": index }));
            envelope.payload = chunk;
            envelope
        }
        ("DATA", "SAVE") => {
            let key = match field(m, FIELD_KEY) {
                Some(key) => key.to_owned(),
                None => store.fresh_key("data"),
            };
            let record: Metadata = m
                .iter()
                .filter(|(name, _)| !is_reserved_record_field(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            store.records.insert(key.clone(), record);
            reply(m, 200, json!({ "key": key }))
        }
        ("DATA", "GET") => {
            let key = field(m, FIELD_KEY).unwrap_or_default();
            match store.records.get(key) {
                Some(record) => {
                    let mut fields = record.clone();
                    fields.insert("key".into(), key.into());
                    reply(m, 200, Value::Object(fields))
                }
                None => reply(m, 404, json!({})),
            }
        }
        ("DATA", "DELETE") => {
            let key = field(m, FIELD_KEY).unwrap_or_default();
            match store.records.remove(key) {
                Some(_) => reply(m, 200, json!({ "key": key })),
                None => reply(m, 404, json!({})),
            }
        }
        _ => reply(m, 400, json!({})),
    };
    Some(response)
}
