use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde_json::{Value, json};

use crate::record::{Include, QueryMatch};

/// 导出图片的最大边长
const THUMBNAIL_SIZE: u32 = 256;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Table,
}

/// 打印查询结果，`labels` 与 `results` 一一对应
pub fn print_query_results(
    labels: &[String],
    results: &[Vec<QueryMatch>],
    include: &[Include],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let value = labels
                .iter()
                .zip(results)
                .map(|(label, matches)| Ok(json!({ "query": label, "results": matches_json(matches)? })))
                .collect::<Result<Vec<Value>>>()?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => print!("{}", format_query_results(labels, results, include)),
    }
    Ok(())
}

/// 打印读取到的记录
pub fn print_records(matches: &[QueryMatch], include: &[Include], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&matches_json(matches)?)?),
        OutputFormat::Table => print!("{}", format_records(matches, include)),
    }
    Ok(())
}

pub fn format_query_results(
    labels: &[String],
    results: &[Vec<QueryMatch>],
    include: &[Include],
) -> String {
    let mut out = String::new();
    for (label, matches) in labels.iter().zip(results) {
        let _ = writeln!(out, "Results for query: {}", label);
        out.push_str(&format_records(matches, include));
    }
    out
}

/// 每条结果一行，只输出 `include` 中的字段；请求了文本但记录没有文本时输出 None
pub fn format_records(matches: &[QueryMatch], include: &[Include]) -> String {
    let mut out = String::new();
    for m in matches {
        let _ = write!(out, "id: {}", m.id);
        if let Some(distance) = m.distance {
            let _ = write!(out, ", distance: {}", distance);
        }
        if let Some(metadata) = &m.metadata {
            let metadata = serde_json::to_string(metadata).unwrap_or_default();
            let _ = write!(out, ", metadata: {}", metadata);
        }
        if include.contains(&Include::Documents) {
            let _ = write!(out, ", document: {}", m.document.as_deref().unwrap_or("None"));
        }
        out.push('\n');

        match (&m.uri, &m.data) {
            (Some(uri), Some(data)) => {
                let _ = writeln!(out, "data: {} ({}x{})", uri.display(), data.width(), data.height());
            }
            (Some(uri), None) => {
                let _ = writeln!(out, "uri: {}", uri.display());
            }
            (None, Some(data)) => {
                let _ = writeln!(out, "data: {}x{}", data.width(), data.height());
            }
            (None, None) => {}
        }
    }
    out
}

fn matches_json(matches: &[QueryMatch]) -> Result<Vec<Value>> {
    matches
        .iter()
        .map(|m| -> Result<Value> {
            let mut value = serde_json::to_value(m)?;
            if let (Some(data), Value::Object(object)) = (&m.data, &mut value) {
                object.insert("data".to_string(), json!([data.width(), data.height()]));
            }
            Ok(value)
        })
        .collect()
}

/// 将结果中的图片缩略图保存到目录，返回写入的文件
///
/// 文件名为 `<查询序号>-<名次>-<ID>.png`
pub fn save_images(dir: &Path, results: &[Vec<QueryMatch>]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("无法创建目录 {}", dir.display()))?;
    let mut written = vec![];
    for (i, matches) in results.iter().enumerate() {
        for (j, m) in matches.iter().enumerate() {
            let Some(data) = &m.data else {
                continue;
            };
            let path = dir.join(format!("{}-{}-{}.png", i, j, sanitize(&m.id)));
            data.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE)
                .save(&path)
                .with_context(|| format!("无法保存图片 {}", path.display()))?;
            written.push(path);
        }
    }
    Ok(written)
}

fn sanitize(id: &str) -> String {
    id.chars().map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' }).collect()
}
