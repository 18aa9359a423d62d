//! Command-line form fields such as `details[0][title]=Logo design`.
//!
//! A value starting with `@` names a file to upload.

use std::path::PathBuf;

use anyhow::{Context, bail};
use pest::{Parser, iterators::Pair};
use pest_derive::Parser;

use crate::form::{FilePart, FormInput};

#[derive(Parser)]
#[grammar_inline = r#"
Assignment = {
    SOI ~ Path ~ "=" ~ Value ~ EOI
}

Path = ${
    Key ~ Index*
}

Key = @{ (!("[" | "]" | "=") ~ ANY)+ }

Index = ${
    "[" ~ Segment ~ "]"
}

Segment = @{ (!("[" | "]") ~ ANY)+ }

Value = @{ ANY* }
"#]
struct FieldParser;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAssignment {
    pub path: Vec<String>,
    pub value: FieldValue,
}

pub fn parse<S: AsRef<str>>(input: S) -> anyhow::Result<FieldAssignment> {
    let input = input.as_ref();
    let assignment = FieldParser::parse(Rule::Assignment, input)
        .with_context(|| format!("Invalid form field `{input}`, expected key[sub]=value"))?
        .next()
        .context("Empty form field")?;

    let mut path = vec![];
    let mut value = FieldValue::Text(String::new());
    for p in assignment.into_inner() {
        match p.as_rule() {
            Rule::Path => path = parse_path(p),
            Rule::Value => value = parse_value(p.as_str()),
            _ => {}
        }
    }
    Ok(FieldAssignment { path, value })
}

fn parse_path(p: Pair<'_, Rule>) -> Vec<String> {
    p.into_inner()
        .filter_map(|segment| match segment.as_rule() {
            Rule::Key => Some(segment.as_str().to_owned()),
            Rule::Index => segment.into_inner().next().map(|s| s.as_str().to_owned()),
            _ => None,
        })
        .collect()
}

fn parse_value(raw: &str) -> FieldValue {
    match raw.strip_prefix('@') {
        Some(path) if !path.is_empty() => FieldValue::File(PathBuf::from(path)),
        _ => FieldValue::Text(raw.to_owned()),
    }
}

/// Build nested input from assignments. Later assignments to the same path
/// replace earlier ones. Files are read from disk here.
pub fn assemble(assignments: Vec<FieldAssignment>) -> anyhow::Result<FormInput> {
    let mut root = vec![];
    for FieldAssignment { path, value } in assignments {
        let leaf = match value {
            FieldValue::Text(text) => FormInput::Text(text),
            FieldValue::File(file) => FormInput::File(FilePart::from_path(&file)?),
        };
        insert(&mut root, &path, leaf)?;
    }
    Ok(FormInput::Map(root))
}

fn insert(entries: &mut Vec<(String, FormInput)>, path: &[String], leaf: FormInput) -> anyhow::Result<()> {
    let Some((head, rest)) = path.split_first() else {
        bail!("Form field has an empty name");
    };
    let pos = entries.iter().position(|(key, _)| key == head);

    if rest.is_empty() {
        match pos {
            Some(idx) => entries[idx].1 = leaf,
            None => entries.push((head.clone(), leaf)),
        }
        return Ok(());
    }

    let idx = pos.unwrap_or_else(|| {
        entries.push((head.clone(), FormInput::Map(vec![])));
        entries.len() - 1
    });
    match &mut entries[idx].1 {
        FormInput::Map(children) => insert(children, rest, leaf),
        _ => bail!("Form field `{head}` is given both a value and sub-fields"),
    }
}
