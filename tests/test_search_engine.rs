//! Integration tests for query composition and federated search

use anyhow::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiki_search::analyzer::Analyzer;
use wiki_search::config::WriterConfig;
use wiki_search::indexing::{IndexUpdater, PrimaryIndex};
use wiki_search::model::{DocumentReference, WikiDocument, WikiObject};
use wiki_search::registry::FieldRegistry;
use wiki_search::search::{
    QueryBuilder, SearchEngine, SearchRequest, SearcherPool, create_partitions,
};
use wiki_search::store::{InMemoryStore, PlainTextExtractor};
use wiki_search::SearchError;

/// One on-disk partition with its own store and updater
struct IndexedPartition {
    dir: PathBuf,
    store: Arc<InMemoryStore>,
    updater: IndexUpdater,
}

impl IndexedPartition {
    fn new(dir: &Path, registry: &FieldRegistry) -> Result<Self> {
        let writer_config = WriterConfig {
            memory_budget_mb: 15,
            num_threads: 1,
        };
        let primary = PrimaryIndex::open_or_create(dir, Analyzer::Standard, writer_config)?;
        let store = Arc::new(InMemoryStore::new());
        let updater = IndexUpdater::new(
            Arc::new(primary),
            store.clone(),
            Arc::new(PlainTextExtractor),
            registry.clone(),
            Duration::from_secs(60),
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            store,
            updater,
        })
    }

    fn add(&self, doc: WikiDocument) {
        let reference = doc.reference.clone();
        let language = doc.language.clone();
        let classes = doc.object_classes();
        self.store.put(doc);
        self.updater.enqueue_document(reference.clone(), language);
        for class_name in classes {
            self.updater.enqueue_object(reference.clone(), class_name);
        }
    }

    fn index(&self) {
        let report = self.updater.run_cycle();
        assert!(report.failures.is_empty(), "{:?}", report.failures);
    }
}

fn page(wiki: &str, name: &str, title: &str) -> WikiDocument {
    let mut doc = WikiDocument::new(DocumentReference::new(wiki, "Space", name));
    doc.title = title.to_string();
    doc
}

struct TestEnvironment {
    temp_dir: TempDir,
    registry: FieldRegistry,
    main: IndexedPartition,
}

impl TestEnvironment {
    fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let registry = FieldRegistry::new();
        let main = IndexedPartition::new(&temp_dir.path().join("main"), &registry)?;
        Ok(Self {
            temp_dir,
            registry,
            main,
        })
    }

    fn engine(&self, dirs: Vec<PathBuf>) -> Arc<SearchEngine> {
        let pool = Arc::new(SearcherPool::new(dirs, Analyzer::Standard));
        Arc::new(SearchEngine::new(pool, QueryBuilder::new(self.registry.clone())))
    }

    fn main_engine(&self) -> Arc<SearchEngine> {
        self.engine(vec![self.main.dir.clone()])
    }
}

fn names(engine: &SearchEngine, request: &SearchRequest) -> Result<Vec<String>> {
    Ok(engine
        .search(request)?
        .iter()
        .map(|hit| hit.reference.to_string())
        .collect())
}

#[test]
fn test_property_query_with_wiki_filter() -> Result<()> {
    let env = TestEnvironment::new()?;
    for (wiki, author) in [("wiki1", "alice"), ("wiki2", "alice"), ("wiki3", "alice"), ("wiki1", "bob")] {
        let mut doc = page(wiki, &format!("By{}", author), "Report");
        doc.author = author.to_string();
        env.main.add(doc);
    }
    env.main.index();
    let engine = env.main_engine();

    let request = SearchRequest::new("PROP author:alice").with_wikis(["wiki1", "wiki2"]);
    let mut hits = names(&engine, &request)?;
    hits.sort();
    assert_eq!(hits, vec!["wiki1:Space.Byalice", "wiki2:Space.Byalice"]);

    // A single wiki is a plain equality filter
    let request = SearchRequest::new("PROP author:alice").with_wikis(["wiki3"]);
    assert_eq!(names(&engine, &request)?, vec!["wiki3:Space.Byalice"]);
    Ok(())
}

#[test]
fn test_object_property_query() -> Result<()> {
    let env = TestEnvironment::new()?;
    let mut doc = page("xwiki", "Tagged", "Release notes");
    doc.objects.push(WikiObject {
        class_name: "XWiki.TagClass".to_string(),
        number: 0,
        properties: BTreeMap::from([("tags".to_string(), "rust search".to_string())]),
    });
    env.main.add(doc);
    env.main.add(page("xwiki", "Plain", "rust without tags"));
    env.main.index();
    let engine = env.main_engine();

    let results = engine.search(&SearchRequest::new("PROP XWiki.TagClass.tags:rust"))?;
    assert_eq!(results.len(), 1);
    assert_eq!(results.hits[0].doc_type, "objects");
    assert_eq!(results.hits[0].reference.name, "Tagged");

    // The explicit JSON path form is accepted too
    let results = engine.search(&SearchRequest::new("PROP props.XWiki.TagClass.tags:search"))?;
    assert_eq!(results.len(), 1);
    Ok(())
}

#[test]
fn test_property_names_with_spaces() -> Result<()> {
    let env = TestEnvironment::new()?;
    let mut doc = page("xwiki", "Tasks", "hello tasks");
    doc.objects.push(WikiObject {
        class_name: "My Apps.TaskClass".to_string(),
        number: 0,
        properties: BTreeMap::from([("status".to_string(), "open".to_string())]),
    });
    env.main.add(doc);
    env.main.add(page("xwiki", "Other", "hello again"));
    env.main.index();
    assert!(env.registry.contains("My Apps.TaskClass.status"));
    let engine = env.main_engine();

    let results = engine.search(&SearchRequest::new("PROP My Apps.TaskClass.status:open"))?;
    assert_eq!(results.len(), 1);
    assert_eq!(results.hits[0].doc_type, "objects");

    // The registered property does not break MULTI for anything else
    let mut hits = names(&engine, &SearchRequest::new("MULTI hello"))?;
    hits.sort();
    assert_eq!(hits, vec!["xwiki:Space.Other", "xwiki:Space.Tasks"]);

    let results = engine.search(&SearchRequest::new("MULTI open"))?;
    assert_eq!(results.len(), 1);
    assert_eq!(results.hits[0].doc_type, "objects");
    Ok(())
}

#[test]
fn test_multi_query_matches_any_field() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.main.add(page("xwiki", "Greeting", "hello"));
    let mut world = page("xwiki", "Planet", "Planet");
    world.content = "the world is round".to_string();
    env.main.add(world);
    env.main.add(page("xwiki", "Unrelated", "nothing here"));
    env.main.index();
    assert!(env.registry.contains("title"));

    let mut hits = names(&env.main_engine(), &SearchRequest::new("MULTI hello world"))?;
    hits.sort();
    assert_eq!(hits, vec!["xwiki:Space.Greeting", "xwiki:Space.Planet"]);
    Ok(())
}

#[test]
fn test_sort_by_date_descending() -> Result<()> {
    let env = TestEnvironment::new()?;
    for (name, date) in [("Old", 100), ("New", 300), ("Mid", 200)] {
        let mut doc = page("xwiki", name, "report");
        doc.date = date;
        env.main.add(doc);
    }
    env.main.index();
    let engine = env.main_engine();

    let request = SearchRequest::new("report").with_sort(["-date"]);
    assert_eq!(
        names(&engine, &request)?,
        vec!["xwiki:Space.New", "xwiki:Space.Mid", "xwiki:Space.Old"]
    );

    let request = SearchRequest::new("report").with_sort(["date"]).with_limit(2);
    assert_eq!(names(&engine, &request)?, vec!["xwiki:Space.Old", "xwiki:Space.Mid"]);

    // Unknown keys are dropped; relevance order is used instead
    let request = SearchRequest::new("report").with_sort(["bogus"]);
    let results = engine.search(&request)?;
    assert_eq!(results.len(), 3);
    assert!(results.hits.windows(2).all(|w| w[0].score >= w[1].score));
    Ok(())
}

#[test]
fn test_language_is_a_preference() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.main.add(page("xwiki", "Home", "welcome"));
    let mut fr = page("xwiki", "Home", "welcome");
    fr.language = Some("fr".to_string());
    env.main.add(fr);
    env.main.index();

    let request = SearchRequest::new("welcome").with_languages(["fr"]);
    let results = env.main_engine().search(&request)?;
    assert_eq!(results.len(), 2);
    assert_eq!(results.hits[0].language, "fr");
    assert_eq!(results.hits[1].language, "default");
    Ok(())
}

#[test]
fn test_parse_errors_are_surfaced() -> Result<()> {
    let env = TestEnvironment::new()?;
    let engine = env.main_engine();

    for query in ["", "PROP author"] {
        let err = engine.search(&SearchRequest::new(query)).err().expect("must fail");
        assert!(matches!(err, SearchError::QueryParse(_)), "{}", err);
    }
    Ok(())
}

#[test]
fn test_partition_fault_tolerance() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.main.add(page("xwiki", "Main", "shared topic"));
    env.main.index();

    let archive = IndexedPartition::new(&env.temp_dir.path().join("archive"), &env.registry)?;
    archive.add(page("xwiki", "Archived", "shared topic from the archive"));
    archive.index();

    let corrupt = env.temp_dir.path().join("corrupt");
    std::fs::create_dir_all(&corrupt)?;
    std::fs::write(corrupt.join("meta.json"), b"{ garbage")?;

    let dirs = vec![env.main.dir.clone(), corrupt.clone(), archive.dir.clone()];
    let set = create_partitions(&dirs, Analyzer::Standard);
    assert_eq!(set.len(), 2);

    let engine = env.engine(dirs);
    let mut hits = names(&engine, &SearchRequest::new("shared"))?;
    hits.sort();
    assert_eq!(hits, vec!["xwiki:Space.Archived", "xwiki:Space.Main"]);

    // Ad-hoc directory lists behave the same
    let list = format!(
        "{},{},{}",
        env.main.dir.display(),
        corrupt.display(),
        archive.dir.display()
    );
    let results = engine.search_in_dirs(&SearchRequest::new("archive"), &list)?;
    assert_eq!(results.len(), 1);
    assert_eq!(results.hits[0].partition, archive.dir);
    Ok(())
}

#[test]
fn test_lazy_fields() -> Result<()> {
    let env = TestEnvironment::new()?;
    let mut doc = page("xwiki", "Page", "Lazy title");
    doc.content = "body text".to_string();
    env.main.add(doc);
    env.main.index();

    let results = env.main_engine().search(&SearchRequest::new("body"))?;
    let hit = &results.hits[0];
    assert_eq!(hit.field_text("title")?.as_deref(), Some("Lazy title"));
    assert!(hit.fields()?.contains_key("content"));
    assert_eq!(hit.field_text("bogus")?, None);
    Ok(())
}

#[tokio::test]
async fn test_async_search() -> Result<()> {
    let env = TestEnvironment::new()?;
    env.main.add(page("xwiki", "Page", "async"));
    env.main.index();

    let results = env.main_engine().search_async(SearchRequest::new("async")).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results.total_hits, 1);
    Ok(())
}
