// SPDX-License-Identifier: MIT OR Apache-2.0

use newsvec::config::Config;
use newsvec::embedding::{
    DistanceSpace, EmbeddingGenerator, HashingProvider, MetadataField, MetadataFilter,
    StoreSettings, VectorStore,
};
use newsvec::{NewsError, NewsRecord, QueryResult, RetrievalPipeline};
use tempfile::TempDir;

fn hashing() -> EmbeddingGenerator {
    EmbeddingGenerator::from_provider(Box::new(HashingProvider::new(256)))
}

fn pipeline(dir: &TempDir) -> RetrievalPipeline {
    let config = Config::default().with_persist_directory(dir.path());
    RetrievalPipeline::with_embedder(config, hashing()).expect("pipeline")
}

fn sample_records() -> Vec<NewsRecord> {
    vec![
        NewsRecord::new(
            "Banco Central mantiene tasa de interés",
            "El directorio del BCR decidió mantener la tasa de referencia en 6 por ciento",
            "https://rpp.pe/economia/bcr-tasa",
            "Thu, 09 May 2024 18:00:00 -0500",
        ),
        NewsRecord::new(
            "Selección peruana convoca nuevos jugadores",
            "El técnico anunció la lista para los amistosos de junio",
            "https://rpp.pe/futbol/seleccion-lista",
            "Fri, 10 May 2024 09:30:00 -0500",
        ),
        NewsRecord::new(
            "Lluvias intensas en la sierra sur",
            "Senamhi advierte precipitaciones de moderada a fuerte intensidad",
            "https://rpp.pe/peru/lluvias-sierra",
            "Sat, 11 May 2024 07:15:00 -0500",
        ),
    ]
}

#[test]
fn query_ranks_closest_article_first() {
    let dir = TempDir::new().expect("tempdir");
    let mut pipeline = pipeline(&dir);
    let records = sample_records();

    let result = pipeline
        .run_pipeline(
            &records,
            "Banco Central mantiene tasa de interés. El directorio del BCR decidió mantener la tasa de referencia en 6 por ciento",
            2,
        )
        .expect("run pipeline");

    assert_eq!(result.len(), 2);
    let top = &result.rows()[0];
    assert_eq!(top.title, records[0].title);
    assert_eq!(top.description, records[0].description);
    assert_eq!(top.link, records[0].link);
    assert_eq!(top.date_published, records[0].published);
}

#[test]
fn description_match_ranks_its_article_first() {
    let dir = TempDir::new().expect("tempdir");
    let mut pipeline = pipeline(&dir);
    let records = vec![
        NewsRecord::new("A", "mercado bursátil cierra al alza", "https://rpp.pe/a", "Mon, 13 May 2024"),
        NewsRecord::new("B", "huaico bloquea carretera central", "https://rpp.pe/b", "Tue, 14 May 2024"),
        NewsRecord::new("C", "festival de cine en Lima", "https://rpp.pe/c", "Wed, 15 May 2024"),
    ];

    let result = pipeline
        .run_pipeline(&records, "huaico bloquea carretera central", 3)
        .expect("run pipeline");

    assert_eq!(result.len(), 3);
    let top = &result.rows()[0];
    assert_eq!(top.title, "B");
    assert_eq!(top.link, "https://rpp.pe/b");
    assert_eq!(top.date_published, "Tue, 14 May 2024");
}

#[test]
fn k_larger_than_collection_returns_everything() {
    let dir = TempDir::new().expect("tempdir");
    let mut pipeline = pipeline(&dir);
    let result = pipeline
        .run_pipeline(&sample_records(), "noticias", 10)
        .expect("run pipeline");
    assert_eq!(result.len(), 3);
}

#[test]
fn empty_batch_yields_empty_results() {
    let dir = TempDir::new().expect("tempdir");
    let mut pipeline = pipeline(&dir);
    let result = pipeline.run_pipeline(&[], "anything", 5).expect("run pipeline");
    assert!(result.is_empty());
    assert!(pipeline.is_indexed());
}

#[test]
fn zero_k_is_invalid() {
    let dir = TempDir::new().expect("tempdir");
    let mut pipeline = pipeline(&dir);
    let docs = pipeline.load_and_process(&sample_records());
    pipeline.create_vectorstore(&docs).expect("index");
    assert!(matches!(
        pipeline.query("lluvias", 0),
        Err(NewsError::InvalidInput(_))
    ));
}

#[test]
fn query_where_restricts_by_metadata() {
    let dir = TempDir::new().expect("tempdir");
    let mut pipeline = pipeline(&dir);
    let docs = pipeline.load_and_process(&sample_records());
    pipeline.create_vectorstore(&docs).expect("index");

    let filter = MetadataFilter::new().and_eq(MetadataField::Link, "https://rpp.pe/peru/lluvias-sierra");
    let result = pipeline
        .query_where("Banco Central", 3, Some(&filter))
        .expect("query");
    assert_eq!(result.len(), 1);
    assert_eq!(result.rows()[0].title, "Lluvias intensas en la sierra sur");
}

#[test]
fn collection_survives_a_new_pipeline() {
    let dir = TempDir::new().expect("tempdir");
    {
        let mut first = pipeline(&dir);
        let docs = first.load_and_process(&sample_records());
        first.create_vectorstore(&docs).expect("index");
    }

    let mut second = pipeline(&dir);
    assert!(matches!(second.query("lluvias", 1), Err(NewsError::NotInitialized)));
    second.attach().expect("attach");
    assert_eq!(second.count().expect("count"), 3);

    let result = second.query("Lluvias intensas en la sierra sur", 1).expect("query");
    assert_eq!(result.rows()[0].link, "https://rpp.pe/peru/lluvias-sierra");
}

#[test]
fn named_collections_share_a_directory_without_mixing() {
    let dir = TempDir::new().expect("tempdir");
    let records = sample_records();

    let base = Config::default().with_persist_directory(dir.path());
    let mut economy =
        RetrievalPipeline::with_embedder(base.clone().with_collection_name("economia"), hashing())
            .expect("pipeline");
    let mut sports = RetrievalPipeline::with_embedder(
        base.with_collection_name("deportes"),
        economy.embedder().clone(),
    )
    .expect("pipeline");
    assert_eq!(sports.embedder().model_id(), "hashing-256");

    let economy_docs = economy.load_and_process(&records[..1]);
    economy.create_vectorstore(&economy_docs).expect("index economy");
    let sports_docs = sports.load_and_process(&records[1..2]);
    sports.create_vectorstore(&sports_docs).expect("index sports");

    assert_eq!(economy.count().expect("count"), 1);
    assert_eq!(sports.count().expect("count"), 1);

    let rows = economy.query("Selección peruana", 5).expect("query").into_rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, records[0].title);
}

#[test]
fn reopening_with_another_space_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let settings = StoreSettings::new(dir.path(), "rpp_news");
    VectorStore::open(&settings, hashing()).expect("open cosine");

    let reopened = VectorStore::open(&settings.clone().with_space(DistanceSpace::L2), hashing());
    assert!(matches!(reopened, Err(NewsError::SpaceMismatch { .. })));
}

#[test]
fn results_serialize_as_rows() {
    let dir = TempDir::new().expect("tempdir");
    let mut pipeline = pipeline(&dir);
    let result = pipeline
        .run_pipeline(&sample_records(), "Selección peruana", 1)
        .expect("run pipeline");

    let json: serde_json::Value = serde_json::to_value(&result).expect("json");
    let row = json.as_array().expect("array")[0].as_object().expect("object");
    let keys: Vec<&str> = row.keys().map(String::as_str).collect();
    for column in QueryResult::COLUMNS {
        assert!(keys.contains(&column), "missing column {}", column);
    }
    assert_eq!(keys.len(), QueryResult::COLUMNS.len());
}
