//! Request body reading for endpoints that accept either JSON or `multipart/form-data`.
//!
//! Multipart text fields are folded into a JSON object so the same `serde` + `validator`
//! structs serve both encodings. File parts go through the image allow-list before any
//! byte reaches the blob store.

use actix_multipart::{Field, Multipart, MultipartError};
use actix_web::{error::PayloadError, web, HttpMessage, HttpRequest};
use bytes::{Bytes, BytesMut};
use futures::{StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use validator::Validate;

use crate::blob::UploadedFile;
use crate::error::{AppError, FieldError};

/// Content types accepted for uploads.
pub const ALLOWED_IMAGE_TYPES: [&str; 5] = [
    "image/jpg",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

pub const MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;
/// Text parts accepted per multipart body, repeated names included.
pub const MAX_TEXT_FIELDS: usize = 64;
const MAX_JSON_BYTES: usize = 256 * 1024;

/// Which multipart field may carry files, and how many.
#[derive(Debug, Clone, Copy)]
pub struct UploadRules {
    pub field: &'static str,
    pub max_files: usize,
}

pub const TASK_FILES: UploadRules = UploadRules {
    field: "files",
    max_files: 12,
};

pub const AVATAR: UploadRules = UploadRules {
    field: "avatar",
    max_files: 1,
};

/// Endpoints that take no files.
pub const NO_FILES: UploadRules = UploadRules {
    field: "",
    max_files: 0,
};

/// A parsed request body: text fields plus accepted files.
#[derive(Debug, Default)]
pub struct RequestForm {
    pub fields: Map<String, Value>,
    pub files: Vec<UploadedFile>,
}

impl RequestForm {
    /// Reads the body according to its content type.
    pub async fn read(
        req: &HttpRequest,
        payload: web::Payload,
        rules: UploadRules,
    ) -> Result<Self, AppError> {
        if req.content_type().starts_with("multipart/form-data") {
            read_multipart(req, payload, rules).await
        } else {
            read_json(payload).await
        }
    }

    /// Deserializes the text fields into `T` and runs its validation rules.
    pub fn parse<T>(&self) -> Result<T, AppError>
    where
        T: DeserializeOwned + Validate,
    {
        let value: T = serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| AppError::Validation(vec![deserialize_error(&e)]))?;
        value.validate()?;
        Ok(value)
    }

    pub fn into_files(self) -> Vec<UploadedFile> {
        self.files
    }
}

fn deserialize_error(error: &serde_json::Error) -> FieldError {
    let message = error.to_string();
    // serde reports "missing field `title`"; surface the field as the path.
    let path = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
        .unwrap_or("body")
        .to_string();
    FieldError {
        path,
        error: message,
    }
}

fn multipart_error(error: MultipartError) -> AppError {
    AppError::BadRequest(format!("Invalid multipart body: {}", error))
}

fn payload_error(error: PayloadError) -> AppError {
    AppError::BadRequest(format!("Unreadable request body: {}", error))
}

async fn read_json(mut payload: web::Payload) -> Result<RequestForm, AppError> {
    let mut body = BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(payload_error)?;
        if body.len() + chunk.len() > MAX_JSON_BYTES {
            return Err(AppError::BadRequest("Request body too large".into()));
        }
        body.extend_from_slice(&chunk);
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RequestForm::default());
    }

    match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(fields)) => Ok(RequestForm {
            fields,
            files: Vec::new(),
        }),
        Ok(_) => Err(AppError::BadRequest("Request body must be a JSON object".into())),
        Err(e) => Err(AppError::BadRequest(format!("Invalid JSON body: {}", e))),
    }
}

async fn read_multipart(
    req: &HttpRequest,
    payload: web::Payload,
    rules: UploadRules,
) -> Result<RequestForm, AppError> {
    let mut multipart = Multipart::new(req.headers(), payload);
    let mut form = RequestForm::default();
    let mut text_fields = 0;

    while let Some(mut field) = multipart.try_next().await.map_err(multipart_error)? {
        let disposition = field.content_disposition().clone();
        let name = disposition.get_name().unwrap_or_default().to_string();

        match disposition.get_filename() {
            Some(file_name) => {
                let file = read_file(&mut field, &name, file_name, &rules, form.files.len()).await?;
                form.files.push(file);
            }
            None => {
                text_fields += 1;
                if text_fields > MAX_TEXT_FIELDS {
                    return Err(AppError::BadRequest(format!(
                        "Too many form fields: at most {} allowed",
                        MAX_TEXT_FIELDS
                    )));
                }
                let data = read_limited(&mut field, MAX_TEXT_FIELD_BYTES).await?;
                let text = String::from_utf8(data.to_vec()).map_err(|_| {
                    AppError::BadRequest(format!("Field '{}' is not valid UTF-8", name))
                })?;
                insert_text_field(&mut form.fields, &name, text);
            }
        }
    }

    Ok(form)
}

async fn read_file(
    field: &mut Field,
    name: &str,
    file_name: &str,
    rules: &UploadRules,
    already_accepted: usize,
) -> Result<UploadedFile, AppError> {
    if rules.max_files == 0 || name.trim_end_matches("[]") != rules.field {
        return Err(AppError::BadRequest(format!("Unexpected file field '{}'", name)));
    }
    if already_accepted >= rules.max_files {
        return Err(AppError::BadRequest(format!(
            "Too many files: at most {} allowed",
            rules.max_files
        )));
    }

    let content_type = field
        .content_type()
        .map(|mime| mime.essence_str().to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Invalid {}: allowed formats are jpg, jpeg, png, gif, webp",
            rules.field
        )));
    }

    let data = read_limited(field, MAX_FILE_BYTES).await?;
    Ok(UploadedFile {
        file_name: file_name.to_string(),
        content_type,
        data,
    })
}

async fn read_limited(field: &mut Field, limit: usize) -> Result<Bytes, AppError> {
    let mut buffer = BytesMut::new();
    while let Some(chunk) = field.try_next().await.map_err(multipart_error)? {
        if buffer.len() + chunk.len() > limit {
            return Err(AppError::BadRequest(format!(
                "Field exceeds the {} byte limit",
                limit
            )));
        }
        buffer.extend_from_slice(&chunk);
    }
    Ok(buffer.freeze())
}

/// Repeated names (or a `[]` suffix) collect into an array under the bare name.
fn insert_text_field(fields: &mut Map<String, Value>, name: &str, text: String) {
    let is_array = name.ends_with("[]");
    let key = name.trim_end_matches("[]").to_string();

    match fields.get_mut(&key) {
        Some(Value::Array(items)) => items.push(Value::String(text)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(text)]);
        }
        None if is_array => {
            fields.insert(key, Value::Array(vec![Value::String(text)]));
        }
        None => {
            fields.insert(key, Value::String(text));
        }
    }
}
