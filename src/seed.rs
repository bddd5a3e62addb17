//! 内置示例数据：食物、动物和运动图片

use std::path::Path;

use crate::record::{Include, QueryRequest, Record};

/// 默认的示例查询
pub const DEFAULT_QUERY: &str = "sports, lion";
/// 默认的示例查询结果数量
pub const DEFAULT_N_RESULTS: usize = 2;

/// (ID, 文件名, 分类, 名称)
const ITEMS: &[(&str, &str, &str, &str)] = &[
    ("E23", "E23-2.jpg", "food", "Braised Fried Tofu with Greens"),
    ("E25", "E25-2.jpg", "food", "Sauteed Assorted Vegetables"),
    ("E33", "E33-2.jpg", "food", "Kung Pao Tofu"),
    ("Lion", "lion.jpg", "animal", "Lion"),
    ("Tiger", "tiger.jpg", "animal", "Tiger"),
    ("S1", "archery.jpg", "sport", "Archery"),
    ("S2", "baseball.jpg", "sport", "Baseball"),
    ("S3", "basketball.jpg", "sport", "Basketball"),
    ("S4", "bowling.jpg", "sport", "Bowling"),
    ("S5", "football.jpg", "sport", "Football"),
    ("S6", "golf.jpg", "sport", "Golf"),
    ("S7", "hockey.jpg", "sport", "Hockey"),
    ("S8", "surfing.jpg", "sport", "Surfing"),
    ("S9", "tennis.jpg", "sport", "Tennis"),
    ("S10", "volleyball.jpg", "sport", "Volleyball"),
];

/// 第一批记录：只带分类的狮子和老虎
pub fn initial_records(images: &Path) -> Vec<Record> {
    [("0", "lion.jpg"), ("1", "tiger.jpg")]
        .into_iter()
        .map(|(id, file)| {
            Record::new(id).with_uri(images.join(file)).with_metadata([("category", "animal")])
        })
        .collect()
}

/// 第二批记录：带完整元数据的 15 张图片
pub fn catalog_records(images: &Path) -> Vec<Record> {
    ITEMS
        .iter()
        .map(|(id, file, category, name)| {
            Record::new(*id).with_uri(images.join(file)).with_metadata([
                ("item_id", *id),
                ("category", *category),
                ("item_name", *name),
            ])
        })
        .collect()
}

/// 示例数据用到的所有图片文件名
pub fn image_files() -> impl Iterator<Item = &'static str> {
    ITEMS.iter().map(|(_, file, _, _)| *file)
}

/// 示例查询，返回文本、距离、元数据、图片和路径
pub fn default_query() -> QueryRequest {
    QueryRequest::texts([DEFAULT_QUERY], DEFAULT_N_RESULTS).include(&[
        Include::Documents,
        Include::Distances,
        Include::Metadatas,
        Include::Data,
        Include::Uris,
    ])
}
