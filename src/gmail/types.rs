use serde::Deserialize;

/// Id-only reference returned by the list endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRef {
    pub id: String,
}

/// A full message record (`format=full`).
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub id: String,
    pub payload: Option<MessagePart>,
}

/// One node of the MIME payload tree. Leaves carry body data; containers
/// carry child parts.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    pub mime_type: Option<String>,
    pub body: Option<PartBody>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// Body of a leaf part; `data` is URL-safe base64.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartBody {
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}
