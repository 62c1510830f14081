use serde::{Deserialize, Deserializer, Serialize};

/// Payload of endpoints that only acknowledge (`data` is ignored).
pub type Ack = serde::de::IgnoredAny;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Asks whether content with this digest already exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreUploadCheckRequest {
    pub name: String,
    pub size: u64,
    pub hash: String,
    pub folder_id: i64,
}

/// Opens a chunk-upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitChunkedRequest {
    pub name: String,
    pub size: u64,
    pub hash: String,
    pub folder_id: i64,
    pub chunk_size: u64,
    pub total_chunks: u32,
}

/// Completion token of one uploaded part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkEtag {
    pub part_number: u32,
    pub etag: String,
}

/// Merges the uploaded parts. Parts must be in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteChunkedRequest {
    #[serde(rename = "chunkETags")]
    pub chunk_etags: Vec<ChunkEtag>,
}

/// Persists file metadata once the bytes are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmUploadRequest {
    pub name: String,
    pub size: u64,
    pub hash: String,
    pub url: String,
    pub folder_id: i64,
    pub device_id: String,
}

/// Points an existing file record at new content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    pub name: String,
    pub size: u64,
    pub hash: String,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Result of the dedup pre-check.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreUploadCheckResponse {
    #[serde(default)]
    pub file_exists: bool,
    #[serde(default, deserialize_with = "non_zero", skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
}

/// Presigned URL for one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUrl {
    pub part_number: u32,
    pub presigned_url: String,
}

/// Chunk-upload session issued by the backend.
///
/// The backend may also short-circuit here: `fileExists` means the content
/// is already stored and no session was opened.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitChunkedResponse {
    #[serde(default)]
    pub upload_id: String,
    #[serde(default)]
    pub chunk_urls: Vec<ChunkUrl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
    #[serde(default, deserialize_with = "non_zero_u32", skip_serializing_if = "Option::is_none")]
    pub recommended_concurrency: Option<u32>,
    #[serde(default)]
    pub file_exists: bool,
    #[serde(default, deserialize_with = "non_zero", skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
    #[serde(default, deserialize_with = "non_empty", skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

/// Result of merging a chunked upload.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteChunkedResponse {
    #[serde(default, alias = "fileID", deserialize_with = "non_zero", skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
    pub file_url: String,
}

// The backend fills absent values with zero values rather than omitting them.

fn non_empty<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let v: Option<String> = Option::deserialize(d)?;
    Ok(v.filter(|s| !s.is_empty()))
}

fn non_zero<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v: Option<i64> = Option::deserialize(d)?;
    Ok(v.filter(|n| *n != 0))
}

fn non_zero_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let v: Option<u32> = Option::deserialize(d)?;
    Ok(v.filter(|n| *n != 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pre_check_request_uses_camel_case() {
        let req = PreUploadCheckRequest {
            name: "a.txt".into(),
            size: 3,
            hash: "ab".into(),
            folder_id: 9,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["folderId"], 9);
        assert_eq!(json["hash"], "ab");
    }

    #[test]
    fn pre_check_response_treats_zero_values_as_absent() {
        let json = r#"{"fileExists":false,"fileId":0,"filePath":"","presignedUrl":"http://s/o?sig=1"}"#;
        let resp: PreUploadCheckResponse = serde_json::from_str(json).unwrap();
        assert!(!resp.file_exists);
        assert!(resp.file_id.is_none());
        assert!(resp.file_path.is_none());
        assert_eq!(resp.presigned_url.as_deref(), Some("http://s/o?sig=1"));
    }

    #[test]
    fn complete_request_field_name() {
        let req = CompleteChunkedRequest {
            chunk_etags: vec![ChunkEtag {
                part_number: 1,
                etag: "\"e1\"".into(),
            }],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"chunkETags\""));
        assert!(json.contains("\"partNumber\":1"));
    }

    #[test]
    fn init_response_parses_session() {
        let json = r#"{
            "uploadId":"12_abc_300",
            "chunkUrls":[{"partNumber":2,"presignedUrl":"u2"},{"partNumber":1,"presignedUrl":"u1"}],
            "expiresIn":3600,
            "recommendedConcurrency":0,
            "totalChunks":2,
            "uploadMethod":"direct-to-storage",
            "fileExists":false
        }"#;
        let resp: InitChunkedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.upload_id, "12_abc_300");
        assert_eq!(resp.chunk_urls.len(), 2);
        assert!(resp.recommended_concurrency.is_none());
        assert!(!resp.file_exists);
    }

    #[test]
    fn init_response_instant_upload() {
        let json = r#"{"fileExists":true,"fileId":5,"fileUrl":"http://s/o"}"#;
        let resp: InitChunkedResponse = serde_json::from_str(json).unwrap();
        assert!(resp.file_exists);
        assert!(resp.upload_id.is_empty());
        assert_eq!(resp.file_url.as_deref(), Some("http://s/o"));
    }

    #[test]
    fn complete_response_accepts_legacy_id_field() {
        let json = r#"{"fileID":44,"fileUrl":"http://s/o","message":"merged"}"#;
        let resp: CompleteChunkedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.file_id, Some(44));
        assert_eq!(resp.file_url, "http://s/o");
    }

    #[test]
    fn ack_accepts_anything() {
        let _: Ack = serde_json::from_str(r#"{"whatever":[1,2]}"#).unwrap();
        let _: Ack = serde_json::from_str("null").unwrap();
    }
}
