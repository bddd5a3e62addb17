use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use image::{Rgb, RgbImage};
use mmsearch::{
    ClientBuilder, CollectionError, Embeddable, Embedding, EmbeddingFunction, GetRequest,
    ImageLoader, Include, PersistentClient, QueryRequest, Record, Space, StoreDir, Where,
    WhereDocument, seed,
};
use rstest::*;
use tempfile::TempDir;

/// 图片取平均颜色，文本按颜色词映射到同一空间
struct ColorEmbedding {
    dimension: usize,
}

impl ColorEmbedding {
    fn text(&self, text: &str) -> Embedding {
        let mut v = vec![0.0; self.dimension];
        for (i, word) in ["red", "green", "blue"].iter().enumerate() {
            if text.contains(word) {
                v[i] = 1.0;
            }
        }
        v
    }

    fn image(&self, path: &Path) -> mmsearch::Result<Embedding> {
        let image = image::open(path)
            .map_err(|source| CollectionError::Load { uri: path.to_path_buf(), source })?
            .to_rgb8();
        let n = (image.width() * image.height()) as f32;
        let mut v = vec![0.0; self.dimension];
        for pixel in image.pixels() {
            for c in 0..3 {
                v[c] += pixel[c] as f32 / 255.0 / n;
            }
        }
        Ok(v)
    }
}

impl EmbeddingFunction for ColorEmbedding {
    fn embed(&self, inputs: &[Embeddable]) -> mmsearch::Result<Vec<Embedding>> {
        inputs
            .iter()
            .map(|input| match input {
                Embeddable::Text(text) => Ok(self.text(text)),
                Embeddable::Image(path) => self.image(path),
            })
            .collect()
    }
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn store(&self) -> StoreDir {
        StoreDir::new(self.dir.path().join("store"))
    }

    fn image(&self, name: &str, color: [u8; 3]) -> PathBuf {
        let path = self.dir.path().join(name);
        RgbImage::from_pixel(8, 8, Rgb(color)).save(&path).unwrap();
        path
    }

    async fn client(&self, dimension: usize) -> PersistentClient {
        self.client_with_loader(dimension, ImageLoader::new()).await
    }

    async fn client_with_loader(&self, dimension: usize, loader: ImageLoader) -> PersistentClient {
        ClientBuilder::new(self.store())
            .embedding(Arc::new(ColorEmbedding { dimension }))
            .loader(Arc::new(loader))
            .open()
            .await
            .unwrap()
    }

    /// 红、绿、蓝三张图片，分属两个分类
    fn records(&self) -> Vec<Record> {
        vec![
            Record::new("red")
                .with_uri(self.image("red.png", [255, 0, 0]))
                .with_metadata([("category", "warm"), ("item_name", "Red")]),
            Record::new("green")
                .with_uri(self.image("green.png", [0, 255, 0]))
                .with_metadata([("category", "cool"), ("item_name", "Green")]),
            Record::new("blue")
                .with_uri(self.image("blue.png", [0, 0, 255]))
                .with_metadata([("category", "cool"), ("item_name", "Blue")]),
        ]
    }
}

#[fixture]
fn fixture() -> Fixture {
    Fixture { dir: TempDir::new().unwrap() }
}

fn ids(matches: &[mmsearch::QueryMatch]) -> Vec<&str> {
    matches.iter().map(|m| m.id.as_str()).collect()
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn add_and_count(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    assert_eq!(collection.count().await?, 0);
    assert_eq!(collection.dimension(), None);

    collection.add(fixture.records()).await?;
    assert_eq!(collection.count().await?, 3);
    assert_eq!(collection.dimension(), Some(3));
    assert!(collection.index_path().exists());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_ids_are_rejected(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    let again = vec![Record::new("red").with_document("red again")];
    assert!(matches!(collection.add(again).await, Err(CollectionError::DuplicateId(id)) if id == "red"));

    let twice = vec![Record::new("x").with_document("a"), Record::new("x").with_document("b")];
    assert!(matches!(collection.add(twice).await, Err(CollectionError::DuplicateId(_))));

    // 失败的批次不会写入任何记录
    assert_eq!(collection.count().await?, 3);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn query_orders_by_distance(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    let result = collection.query(QueryRequest::texts(["red", "blue"], 2)).await?;
    assert_eq!(result.len(), 2);
    assert_eq!(result[0][0].id, "red");
    assert_eq!(result[1][0].id, "blue");
    for matches in &result {
        assert_eq!(matches.len(), 2);
        assert!(matches[0].distance <= matches[1].distance);
        assert!(matches[0].metadata.is_some());
    }

    let by_image = collection
        .query(QueryRequest::uris([fixture.image("query.png", [0, 240, 10])], 1))
        .await?;
    assert_eq!(ids(&by_image[0]), ["green"]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn query_clamps_n_results(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;

    // 空集合返回空结果
    let result = collection.query(QueryRequest::texts(["red"], 5)).await?;
    assert_eq!(result.len(), 1);
    assert!(result[0].is_empty());

    collection.add(fixture.records()).await?;
    let result = collection.query(QueryRequest::texts(["red"], 50)).await?;
    assert_eq!(result[0].len(), 3);
    Ok(())
}

#[rstest]
#[case(r#"{"category": "cool"}"#, &["blue", "green"])]
#[case(r#"{"category": {"$ne": "cool"}}"#, &["red"])]
#[case(r#"{"item_name": {"$in": ["Red", "Blue"]}}"#, &["blue", "red"])]
#[case(r#"{"$or": [{"item_name": "Green"}, {"category": "warm"}]}"#, &["green", "red"])]
#[tokio::test(flavor = "multi_thread")]
async fn query_with_where(
    fixture: Fixture,
    #[case] filter: &str,
    #[case] expected: &[&str],
) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    let request = QueryRequest::texts(["blue"], 10).filter(filter.parse::<Where>()?);
    let result = collection.query(request).await?;
    let mut found = ids(&result[0]);
    found.sort();
    assert_eq!(found, expected);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn get_by_ids_and_where(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    let found = collection.get(GetRequest::ids(["blue", "missing", "red"])).await?;
    assert_eq!(ids(&found), ["blue", "red"]);
    assert_eq!(found[0].metadata.as_ref().unwrap()["item_name"], "Blue");
    assert!(found[0].distance.is_none());

    let request = GetRequest { filter: Some(r#"{"category": "cool"}"#.parse()?), ..GetRequest::all() };
    assert_eq!(ids(&collection.get(request).await?), ["green", "blue"]);

    let request = GetRequest { offset: 1, limit: Some(1), ..GetRequest::all() };
    assert_eq!(ids(&collection.get(request).await?), ["green"]);

    assert_eq!(ids(&collection.peek(2).await?), ["red", "green"]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn include_controls_fields(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    let request = QueryRequest::texts(["green"], 1).include(&[Include::Data, Include::Embeddings]);
    let result = collection.query(request).await?;
    let m = &result[0][0];
    assert!(m.distance.is_none() && m.metadata.is_none() && m.uri.is_none());
    assert_eq!(m.data.as_ref().map(|d| (d.width(), d.height())), Some((8, 8)));
    assert_eq!(m.embedding.as_ref().map(Vec::len), Some(3));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_reembeds_changed_images(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    // 红色记录换成一张绿色图片，元数据合并
    let greenish = fixture.image("greenish.png", [0, 250, 0]);
    let update = Record::new("red").with_uri(greenish).with_metadata([("item_name", "Greenish")]);
    collection.update(vec![update]).await?;

    let found = collection.get(GetRequest::ids(["red"])).await?;
    let metadata = found[0].metadata.as_ref().unwrap();
    assert_eq!(metadata["item_name"], "Greenish");
    assert_eq!(metadata["category"], "warm");

    let result = collection.query(QueryRequest::texts(["green"], 2)).await?;
    let mut top = ids(&result[0]);
    top.sort();
    assert_eq!(top, ["green", "red"]);
    assert_eq!(collection.count().await?, 3);

    let missing = vec![Record::new("purple").with_document("purple")];
    assert!(matches!(collection.update(missing).await, Err(CollectionError::RecordNotFound(_))));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn upsert_adds_and_updates(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    collection
        .upsert(vec![
            Record::new("blue").with_metadata([("category", "deep")]),
            Record::new("note").with_document("a red note"),
        ])
        .await?;
    assert_eq!(collection.count().await?, 4);

    let found = collection.get(GetRequest::ids(["blue", "note"])).await?;
    assert_eq!(found[0].metadata.as_ref().unwrap()["category"], "deep");
    assert_eq!(found[1].document.as_deref(), Some("a red note"));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn delete_by_ids_and_where(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    assert_eq!(collection.delete(Some(vec!["red".to_string()]), None).await?, 1);
    assert_eq!(collection.delete(None, Some(r#"{"category": "cool"}"#.parse()?)).await?, 2);
    assert_eq!(collection.count().await?, 0);
    assert!(matches!(collection.delete(None, None).await, Err(CollectionError::EmptyDelete)));

    let result = collection.query(QueryRequest::texts(["red"], 3)).await?;
    assert!(result[0].is_empty());
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn index_is_rebuilt_from_database(fixture: Fixture) -> Result<()> {
    let index_path = {
        let client = fixture.client(3).await;
        let mut collection = client.get_or_create_collection("colors", Space::Cosine).await?;
        collection.add(fixture.records()).await?;
        collection.index_path().to_path_buf()
    };
    std::fs::remove_file(&index_path)?;

    let client = fixture.client(3).await;
    let collection = client.get_collection("colors").await?;
    assert_eq!(collection.space(), Space::Cosine);
    assert!(index_path.exists());

    let result = collection.query(QueryRequest::texts(["blue"], 1)).await?;
    assert_eq!(ids(&result[0]), ["blue"]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn dimension_mismatch(fixture: Fixture) -> Result<()> {
    {
        let client = fixture.client(3).await;
        let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
        collection.add(fixture.records()).await?;
    }

    let client = fixture.client(4).await;
    let mut collection = client.get_collection("colors").await?;
    let result = collection.add(vec![Record::new("x").with_document("red")]).await;
    assert!(matches!(
        result,
        Err(CollectionError::DimensionMismatch { expected: 3, actual: 4 })
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_records(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;

    let missing = Record::new("ghost").with_uri(fixture.dir.path().join("ghost.png"));
    assert!(matches!(collection.add(vec![missing]).await, Err(CollectionError::Load { .. })));
    assert!(matches!(
        collection.add(vec![Record::new("empty")]).await,
        Err(CollectionError::EmptyRecord(_))
    ));
    assert_eq!(collection.count().await?, 0);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn list_and_delete_collections(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut colors = client.get_or_create_collection("colors", Space::L2).await?;
    colors.add(fixture.records()).await?;
    client.get_or_create_collection("empty", Space::Ip).await?;

    let infos = client.list_collections().await?;
    let summary = infos.iter().map(|i| (i.name.as_str(), i.dimension, i.count)).collect::<Vec<_>>();
    assert_eq!(summary, [("colors", Some(3), 3), ("empty", None, 0)]);

    let index_path = colors.index_path().to_path_buf();
    client.delete_collection("colors").await?;
    assert!(!index_path.exists());
    assert!(matches!(
        client.get_collection("colors").await,
        Err(CollectionError::CollectionNotFound(_))
    ));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_upsert_writes_nothing(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    let batch = vec![
        Record::new("red").with_metadata([("item_name", "Crimson")]),
        Record::new("ghost").with_uri(fixture.dir.path().join("ghost.png")),
    ];
    assert!(matches!(collection.upsert(batch).await, Err(CollectionError::Load { .. })));

    let found = collection.get(GetRequest::ids(["red"])).await?;
    assert_eq!(found[0].metadata.as_ref().unwrap()["item_name"], "Red");
    assert_eq!(collection.count().await?, 3);

    // 一半更新一半添加，在同一批次中完成
    let batch = vec![
        Record::new("red").with_metadata([("item_name", "Crimson")]),
        Record::new("cyan").with_uri(fixture.image("cyan.png", [0, 255, 255])),
    ];
    collection.upsert(batch).await?;
    let found = collection.get(GetRequest::ids(["red", "cyan"])).await?;
    assert_eq!(found[0].metadata.as_ref().unwrap()["item_name"], "Crimson");
    assert_eq!(ids(&found), ["red", "cyan"]);
    assert_eq!(collection.count().await?, 4);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn seed_dataset_end_to_end(fixture: Fixture) -> Result<()> {
    let images = fixture.dir.path().join("images");
    std::fs::create_dir(&images)?;
    for (i, file) in seed::image_files().enumerate() {
        // 狮子为黑色，默认查询的文本向量为零向量时最接近
        let color = if file == "lion.jpg" { [0, 0, 0] } else { [120 + i as u8 * 8, 200, 160] };
        RgbImage::from_pixel(16, 16, Rgb(color)).save(images.join(file))?;
    }

    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("multimodal_collection", Space::L2).await?;
    collection.add(seed::initial_records(&images)).await?;
    collection.add(seed::catalog_records(&images)).await?;
    assert_eq!(collection.count().await?, 17);

    let result = collection.query(seed::default_query()).await?;
    assert_eq!(result.len(), 1);
    let matches = &result[0];
    assert_eq!(matches.len(), 2);
    assert!(matches[0].distance <= matches[1].distance);
    let mut top = ids(matches);
    top.sort();
    assert_eq!(top, ["0", "Lion"]);
    for m in matches {
        assert_eq!(m.uri.as_deref(), Some(images.join("lion.jpg").as_path()));
        assert_eq!(m.data.as_ref().map(|d| (d.width(), d.height())), Some((16, 16)));
        assert_eq!(m.metadata.as_ref().unwrap()["category"], "animal");
    }

    // 再次写入同一批数据时失败
    assert!(matches!(
        collection.add(seed::initial_records(&images)).await,
        Err(CollectionError::DuplicateId(_))
    ));
    assert!(matches!(
        collection.add(seed::catalog_records(&images)).await,
        Err(CollectionError::DuplicateId(_))
    ));
    assert_eq!(collection.count().await?, 17);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn where_document_filters(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("notes", Space::L2).await?;
    collection
        .add(vec![
            Record::new("t1").with_document("red tofu").with_metadata([("category", "food")]),
            Record::new("t2").with_document("green tofu").with_metadata([("category", "food")]),
            Record::new("t3").with_document("blue sky").with_metadata([("category", "scene")]),
        ])
        .await?;

    let request = QueryRequest::texts(["red"], 10)
        .document_filter(r#"{"$contains": "tofu"}"#.parse::<WhereDocument>()?);
    let result = collection.query(request).await?;
    assert_eq!(ids(&result[0]), ["t1", "t2"]);

    let request = GetRequest {
        document_filter: Some(r#"{"$not_contains": "tofu"}"#.parse()?),
        ..GetRequest::all()
    };
    let found = collection.get(request).await?;
    assert_eq!(ids(&found), ["t3"]);
    assert_eq!(found[0].document.as_deref(), Some("blue sky"));

    let request = QueryRequest::texts(["blue"], 10)
        .filter(r#"{"category": "food"}"#.parse()?)
        .document_filter(r#"{"$or": [{"$contains": "green"}, {"$contains": "sky"}]}"#.parse()?);
    let result = collection.query(request).await?;
    assert_eq!(ids(&result[0]), ["t2"]);
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn update_reembeds_changed_documents(fixture: Fixture) -> Result<()> {
    let client = fixture.client(3).await;
    let mut collection = client.get_or_create_collection("notes", Space::L2).await?;
    collection
        .add(vec![
            Record::new("note").with_document("red note"),
            Record::new("other").with_document("green note"),
        ])
        .await?;

    collection.update(vec![Record::new("note").with_document("blue note")]).await?;

    let request = QueryRequest::texts(["blue"], 1).include(&[Include::Documents, Include::Embeddings]);
    let result = collection.query(request).await?;
    assert_eq!(ids(&result[0]), ["note"]);
    assert_eq!(result[0][0].document.as_deref(), Some("blue note"));
    assert_eq!(result[0][0].embedding, Some(vec![0.0, 0.0, 1.0]));

    // 只修改元数据时保留原向量
    collection.update(vec![Record::new("other").with_metadata([("k", "v")])]).await?;
    let request = GetRequest { include: vec![Include::Embeddings], ..GetRequest::ids(["other"]) };
    let found = collection.get(request).await?;
    assert_eq!(found[0].embedding, Some(vec![0.0, 1.0, 0.0]));
    Ok(())
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn loader_limits_image_data(fixture: Fixture) -> Result<()> {
    let client = fixture.client_with_loader(3, ImageLoader::new().max_size(4, 4)).await;
    let mut collection = client.get_or_create_collection("colors", Space::L2).await?;
    collection.add(fixture.records()).await?;

    let request = QueryRequest::texts(["blue"], 1).include(&[Include::Data]);
    let result = collection.query(request).await?;
    assert_eq!(result[0][0].data.as_ref().map(|d| (d.width(), d.height())), Some((4, 4)));
    Ok(())
}

