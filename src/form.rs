//! Multipart form bodies built from nested input.
//!
//! Nested maps and lists are flattened into bracket-notation field names:
//! `{a: 1, b: {c: 2}}` becomes `a=1`, `b[c]=2`. Dates and files are leaves.

use std::{fs, path::Path};

use anyhow::Context;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::blocking::multipart::{Form, Part};
use serde_json::{Number, Value};

/// A file to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub file_name: String,
    pub mime: Option<String>,
    pub bytes: Bytes,
}

impl FilePart {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: None,
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read upload file {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = guess_mime(path).map(str::to_owned);
        Ok(Self {
            file_name,
            mime,
            bytes: bytes.into(),
        })
    }

    fn to_part(&self) -> Part {
        let part = || Part::bytes(self.bytes.to_vec()).file_name(self.file_name.clone());
        match &self.mime {
            Some(mime) => part().mime_str(mime).unwrap_or_else(|_| {
                tracing::warn!("Ignoring invalid MIME type {mime} for {}", self.file_name);
                part()
            }),
            None => part(),
        }
    }
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "pdf" => "application/pdf",
        _ => return None,
    })
}

/// Nested input to a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub enum FormInput {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    Date(DateTime<Utc>),
    File(FilePart),
    List(Vec<FormInput>),
    /// Entries keep their insertion order.
    Map(Vec<(String, FormInput)>),
}

impl FormInput {
    /// JSON rendition, for sending the same input as a JSON body. Dates are
    /// RFC 3339 strings and files collapse to their file name.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Text(s) => Value::String(s.clone()),
            Self::Date(d) => Value::String(format_date(d)),
            Self::File(f) => Value::String(f.file_name.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for FormInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => Self::Number(n),
            Value::String(s) => Self::Text(s),
            Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
        }
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

/// Ordered multipart fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flatten nested input into bracket-notation fields.
    pub fn flatten(input: &FormInput) -> Self {
        let mut form = Self::new();
        form.append_flattened(input, "");
        form
    }

    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), FormValue::Text(value.into())));
    }

    pub fn append_file(&mut self, name: impl Into<String>, file: FilePart) {
        self.fields.push((name.into(), FormValue::File(file)));
    }

    pub fn fields(&self) -> &[(String, FormValue)] {
        &self.fields
    }

    /// First value appended under `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_multipart(self) -> Form {
        self.fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| match value {
                FormValue::Text(text) => form.text(name, text),
                FormValue::File(file) => form.part(name, file.to_part()),
            })
    }

    fn append_flattened(&mut self, input: &FormInput, parent: &str) {
        match input {
            FormInput::Map(entries) => {
                for (key, value) in entries {
                    self.append_flattened(value, &child_key(parent, key));
                }
            }
            FormInput::List(items) => {
                for (idx, value) in items.iter().enumerate() {
                    self.append_flattened(value, &child_key(parent, &idx.to_string()));
                }
            }
            FormInput::File(file) => self.append_file(parent, file.clone()),
            FormInput::Null => self.append_text(parent, "null"),
            FormInput::Bool(b) => self.append_text(parent, b.to_string()),
            FormInput::Number(n) => self.append_text(parent, n.to_string()),
            FormInput::Text(s) => self.append_text(parent, s.clone()),
            FormInput::Date(d) => self.append_text(parent, format_date(d)),
        }
    }
}

fn child_key(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_owned()
    } else {
        format!("{parent}[{key}]")
    }
}
