//! XML bodies exchanged with the object storage REST surface.

use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use md5::{Digest, Md5};
use serde::Deserialize;

use crate::types::error::CosError;
use crate::types::{
    BucketEntry, BucketList, DeleteObjectsOutcome, KeyDeleteError, ObjectListPage,
    ObjectMetadata, Owner,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlOwner {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlBucket {
    name: String,
    #[serde(default)]
    creation_date: String,
    #[serde(default)]
    location_constraint: String,
}

#[derive(Debug, Default, Deserialize)]
struct XmlBuckets {
    #[serde(rename = "Bucket", default)]
    bucket: Vec<XmlBucket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAllMyBucketsResult {
    #[serde(default)]
    owner: XmlOwner,
    #[serde(default)]
    buckets: XmlBuckets,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlObject {
    key: String,
    #[serde(default)]
    last_modified: String,
    #[serde(default)]
    size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    encoding_type: Option<String>,
    #[serde(default)]
    contents: Vec<XmlObject>,
    #[serde(default)]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlDeleted {
    #[serde(default)]
    key: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XmlDeleteError {
    #[serde(default)]
    key: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct DeleteResult {
    #[serde(rename = "Deleted", default)]
    deleted: Vec<XmlDeleted>,
    #[serde(rename = "Error", default)]
    errors: Vec<XmlDeleteError>,
}

fn parse_error(what: &str, e: impl std::fmt::Display) -> CosError {
    CosError::InvalidResponse(format!("error parsing {what}: {e}"))
}

fn body_str<'a>(what: &str, body: &'a [u8]) -> Result<&'a str, CosError> {
    std::str::from_utf8(body).map_err(|e| parse_error(what, e))
}

pub(crate) fn parse_bucket_list(body: &[u8]) -> Result<BucketList, CosError> {
    let parsed: ListAllMyBucketsResult =
        quick_xml::de::from_str(body_str("bucket list", body)?)
            .map_err(|e| parse_error("bucket list", e))?;

    Ok(BucketList {
        owner: Owner {
            id: parsed.owner.id,
            display_name: parsed.owner.display_name,
        },
        buckets: parsed
            .buckets
            .bucket
            .into_iter()
            .map(|bucket| BucketEntry {
                name: bucket.name,
                creation_date: bucket.creation_date,
                location_constraint: bucket.location_constraint,
            })
            .collect(),
    })
}

/// Undo `encoding-type=url` on a listed key. Spaces come back as `+` and
/// a literal `+` as `%2B`.
fn decode_listed_key(key: &str) -> Result<String, CosError> {
    urlencoding::decode(&key.replace('+', " "))
        .map(|decoded| decoded.into_owned())
        .map_err(|e| parse_error("object key", e))
}

/// Decode one ListObjectsV2 page.
///
/// Keys are percent-decoded when the service reports `EncodingType` `url`.
/// Raw keys lose leading and trailing whitespace to the XML deserializer, so
/// listings are requested URL-encoded.
pub(crate) fn parse_object_list_page(body: &[u8]) -> Result<ObjectListPage, CosError> {
    let parsed: ListBucketResult = quick_xml::de::from_str(body_str("object list", body)?)
        .map_err(|e| parse_error("object list", e))?;
    let url_encoded = parsed
        .encoding_type
        .is_some_and(|encoding| encoding.eq_ignore_ascii_case("url"));

    let objects = parsed
        .contents
        .into_iter()
        .map(|object| {
            let key = if url_encoded {
                decode_listed_key(&object.key)?
            } else {
                object.key
            };
            Ok(ObjectMetadata {
                key,
                last_modified: object.last_modified,
                size: object.size,
            })
        })
        .collect::<Result<Vec<_>, CosError>>()?;

    Ok(ObjectListPage {
        objects,
        next_continuation_token: parsed.next_continuation_token.filter(|t| !t.is_empty()),
    })
}

/// Decode a multi-object delete response.
///
/// An empty body means every key was accepted.
pub(crate) fn parse_delete_result(
    body: &[u8],
    requested: usize,
) -> Result<DeleteObjectsOutcome, CosError> {
    let text = body_str("delete result", body)?;
    if text.trim().is_empty() {
        return Ok(DeleteObjectsOutcome {
            deleted: requested,
            errors: Vec::new(),
        });
    }

    let parsed: DeleteResult =
        quick_xml::de::from_str(text).map_err(|e| parse_error("delete result", e))?;

    Ok(DeleteObjectsOutcome {
        deleted: parsed.deleted.len(),
        errors: parsed
            .errors
            .into_iter()
            .map(|error| KeyDeleteError {
                key: error.key,
                code: error.code,
                message: error.message,
            })
            .collect(),
    })
}

/// `<Delete><Object><Key>...</Key></Object>...</Delete>` with escaped keys.
///
/// Control characters go out as numeric character references.
pub fn build_delete_body<S: AsRef<str>>(keys: &[S]) -> String {
    let mut body = String::from("<Delete>");
    for key in keys {
        body.push_str("<Object><Key>");
        for c in quick_xml::escape::escape(key.as_ref()).chars() {
            if c.is_control() {
                let _ = write!(body, "&#x{:X};", u32::from(c));
            } else {
                body.push(c);
            }
        }
        body.push_str("</Key></Object>");
    }
    body.push_str("</Delete>");
    body
}

/// Base64 MD5 digest, as sent in the `Content-MD5` header.
pub fn content_md5(body: &[u8]) -> String {
    STANDARD.encode(Md5::digest(body))
}
