use std::fmt;

use serde::{Deserialize, Serialize};

/// Port the STEP server listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 1379;

/// Status code carried by every successful response.
pub const STATUS_OK: i64 = 200;

pub const FIELD_TYPE: &str = "type";
pub const FIELD_OPERATION: &str = "operation";
pub const FIELD_DIRECTION: &str = "direction";
pub const FIELD_USERNAME: &str = "username";
pub const FIELD_PASSWORD: &str = "password";
pub const FIELD_TOKEN: &str = "token";
pub const FIELD_KEY: &str = "key";
pub const FIELD_SIZE: &str = "size";
pub const FIELD_TOTAL_BLOCK: &str = "total_block";
pub const FIELD_MD5: &str = "md5";
pub const FIELD_BLOCK_SIZE: &str = "block_size";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_STATUS_MSG: &str = "status_msg";
pub const FIELD_BLOCK_INDEX: &str = "block_index";

/// Field names a DATA request or response carries besides the record.
///
/// A record merged into a DATA request must not reuse these names. FILE
/// and AUTH fields such as `size` or `md5` mean nothing in the DATA domain
/// and are ordinary record fields there.
pub const RECORD_RESERVED_FIELDS: &[&str] = &[
    FIELD_TYPE,
    FIELD_OPERATION,
    FIELD_DIRECTION,
    FIELD_TOKEN,
    FIELD_KEY,
    FIELD_STATUS,
    FIELD_STATUS_MSG,
];

/// Returns `true` if `name` is one of [`RECORD_RESERVED_FIELDS`].
pub fn is_reserved_record_field(name: &str) -> bool {
    RECORD_RESERVED_FIELDS.contains(&name)
}

/// Domain a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    File,
    Data,
    Auth,
}

impl MessageType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "FILE",
            Self::Data => "DATA",
            Self::Auth => "AUTH",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operation requested within a [`MessageType`] domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Save,
    Delete,
    Get,
    Upload,
    Download,
    Bye,
    Login,
    Error,
}

impl Operation {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Save => "SAVE",
            Self::Delete => "DELETE",
            Self::Get => "GET",
            Self::Upload => "UPLOAD",
            Self::Download => "DOWNLOAD",
            Self::Bye => "BYE",
            Self::Login => "LOGIN",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a message travels client -> server or back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Request,
    Response,
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Response => "RESPONSE",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
