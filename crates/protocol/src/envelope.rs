use serde_json::Value;

use crate::constants::{
    Direction, FIELD_BLOCK_INDEX, FIELD_DIRECTION, FIELD_KEY, FIELD_OPERATION, FIELD_PASSWORD,
    FIELD_SIZE, FIELD_STATUS, FIELD_STATUS_MSG, FIELD_TOKEN, FIELD_TYPE, FIELD_USERNAME,
    MessageType, Operation, STATUS_OK,
};

/// Ordered metadata section of an envelope.
///
/// Field order is preserved, so requests go out in the order their fields
/// were inserted.
pub type Metadata = serde_json::Map<String, Value>;

/// One framed unit on the wire: JSON metadata plus an opaque payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub metadata: Metadata,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Creates an envelope without a binary payload.
    pub fn new(metadata: Metadata) -> Self {
        Self {
            metadata,
            payload: Vec::new(),
        }
    }

    /// Creates an envelope carrying `payload` after the metadata.
    pub fn with_payload(metadata: Metadata, payload: Vec<u8>) -> Self {
        Self { metadata, payload }
    }
}

/// Requests a STEP client can issue.
///
/// Each variant fixes its `(type, operation)` pair, so building the
/// metadata for a request can never pair a domain with the wrong verb.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Login {
        username: String,
        password: String,
    },
    /// Asks for an upload plan for `size` bytes.
    FileSave {
        size: u64,
        key: Option<String>,
    },
    /// Asks for the plan (size, blocks, md5) of a stored file.
    FileGet {
        key: String,
    },
    Upload {
        key: String,
        block_index: u64,
    },
    Download {
        key: String,
        block_index: u64,
    },
    /// Stores `record`; its fields are merged into the request metadata.
    DataSave {
        key: Option<String>,
        record: Metadata,
    },
    DataGet {
        key: String,
    },
    DataDelete {
        key: String,
    },
    Bye,
}

impl Request {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Login { .. } | Self::Bye => MessageType::Auth,
            Self::FileSave { .. }
            | Self::FileGet { .. }
            | Self::Upload { .. }
            | Self::Download { .. } => MessageType::File,
            Self::DataSave { .. } | Self::DataGet { .. } | Self::DataDelete { .. } => {
                MessageType::Data
            }
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Login { .. } => Operation::Login,
            Self::Bye => Operation::Bye,
            Self::FileSave { .. } | Self::DataSave { .. } => Operation::Save,
            Self::FileGet { .. } | Self::DataGet { .. } => Operation::Get,
            Self::Upload { .. } => Operation::Upload,
            Self::Download { .. } => Operation::Download,
            Self::DataDelete { .. } => Operation::Delete,
        }
    }

    /// Whether the request must carry the session token.
    pub fn requires_token(&self) -> bool {
        !matches!(self, Self::Login { .. })
    }

    /// Human-readable name such as `FILE SAVE`, used in error reports.
    pub fn label(&self) -> String {
        format!("{} {}", self.message_type(), self.operation())
    }

    /// Builds the request metadata.
    ///
    /// Layout: `type`, `operation`, `direction`, then `token` when given,
    /// then the operation's own fields.
    pub fn to_metadata(&self, token: Option<&str>) -> Metadata {
        let mut m = Metadata::new();
        m.insert(FIELD_TYPE.into(), self.message_type().as_str().into());
        m.insert(FIELD_OPERATION.into(), self.operation().as_str().into());
        m.insert(FIELD_DIRECTION.into(), Direction::Request.as_str().into());
        if let Some(token) = token {
            m.insert(FIELD_TOKEN.into(), token.into());
        }

        match self {
            Self::Login { username, password } => {
                m.insert(FIELD_USERNAME.into(), username.as_str().into());
                m.insert(FIELD_PASSWORD.into(), password.as_str().into());
            }
            Self::FileSave { size, key } => {
                m.insert(FIELD_SIZE.into(), (*size).into());
                if let Some(key) = key {
                    m.insert(FIELD_KEY.into(), key.as_str().into());
                }
            }
            Self::FileGet { key } | Self::DataGet { key } | Self::DataDelete { key } => {
                m.insert(FIELD_KEY.into(), key.as_str().into());
            }
            Self::Upload { key, block_index } | Self::Download { key, block_index } => {
                m.insert(FIELD_KEY.into(), key.as_str().into());
                m.insert(FIELD_BLOCK_INDEX.into(), (*block_index).into());
            }
            Self::DataSave { key, record } => {
                for (name, value) in record {
                    m.insert(name.clone(), value.clone());
                }
                if let Some(key) = key {
                    m.insert(FIELD_KEY.into(), key.as_str().into());
                }
            }
            Self::Bye => {}
        }
        m
    }
}

/// A decoded response with typed accessors over its metadata.
///
/// Accessors return `None` for fields that are missing or carry the wrong
/// JSON type; unknown fields are kept untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    metadata: Metadata,
    payload: Vec<u8>,
}

impl From<Envelope> for Response {
    fn from(envelope: Envelope) -> Self {
        Self {
            metadata: envelope.metadata,
            payload: envelope.payload,
        }
    }
}

impl Response {
    pub fn status(&self) -> Option<i64> {
        self.metadata.get(FIELD_STATUS).and_then(Value::as_i64)
    }

    /// `true` when the peer reported status 200.
    pub fn is_ok(&self) -> bool {
        self.status() == Some(STATUS_OK)
    }

    pub fn status_msg(&self) -> Option<&str> {
        self.str_field(FIELD_STATUS_MSG)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).and_then(Value::as_str)
    }

    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.metadata.get(name).and_then(Value::as_u64)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metadata.contains_key(name)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn into_metadata(self) -> Metadata {
        self.metadata
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}
