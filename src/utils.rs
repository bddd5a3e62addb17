use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use indicatif::ProgressStyle;

use crate::record::Metadata;

/// 计算文件的 blake3 哈希
pub fn hash_file(path: impl AsRef<Path>) -> std::io::Result<Vec<u8>> {
    let mut hasher = blake3::Hasher::new();
    let mut reader = BufReader::new(File::open(path)?);
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().as_bytes().to_vec())
}

/// 向量转换为 BLOB
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(embedding).to_vec()
}

/// BLOB 转换为向量，BLOB 不保证对齐
pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytemuck::pod_collect_to_vec(bytes)
}

/// 解析 `key=value` 形式的元数据
pub fn parse_metadata_pair(s: &str) -> anyhow::Result<(String, String)> {
    let (key, value) =
        s.split_once('=').ok_or_else(|| anyhow::anyhow!("无效的元数据 {s}，格式应为 key=value"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow::anyhow!("元数据的键不能为空: {s}"));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn to_metadata(pairs: &[(String, String)]) -> Metadata {
    pairs.iter().cloned().collect()
}

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap()
        .progress_chars("#>-")
}
