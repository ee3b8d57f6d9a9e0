use imglookup::fs_apply::read_sidecar;
use imglookup::run::{
    process_image, run, run_until_aborted, ImageOutcome, RunSummary, SkipReason,
};
use imglookup_core::models::LookupContext;
use imglookup_core::organize::{BaseDirs, OrganizeOptions};
use imglookup_core::pipeline::Lookup;
use imglookup_core::providers::saucenao::{parse_response, SimilarityResponse};
use imglookup_core::providers::{
    ImageUpload, MetadataProvider, PostId, PostTagSet, ProviderError, SimilarityProvider,
};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tempfile::tempdir;
use tokio::sync::Notify;

/// Answers each search with the next canned response.
struct QueuedSearch {
    responses: Mutex<VecDeque<String>>,
}

impl QueuedSearch {
    fn new(responses: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
        })
    }

    fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl SimilarityProvider for QueuedSearch {
    async fn search(&self, _upload: ImageUpload) -> Result<SimilarityResponse, ProviderError> {
        let body = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .expect("more searches than canned responses");
        parse_response(&body)
    }
}

#[derive(Default)]
struct Posts {
    by_id: HashMap<PostId, PostTagSet>,
    requested: Mutex<Vec<PostId>>,
}

impl Posts {
    fn with(mut self, id: u64, artists: Vec<&str>, general: Vec<&str>) -> Self {
        let tags = vec![("general", general), ("artist", artists)]
            .into_iter()
            .collect();
        self.by_id.insert(PostId(id), tags);
        self
    }
}

#[async_trait::async_trait]
impl MetadataProvider for Posts {
    async fn post_tags(&self, post_id: PostId) -> Result<PostTagSet, ProviderError> {
        self.requested.lock().unwrap().push(post_id);
        self.by_id
            .get(&post_id)
            .cloned()
            .ok_or(ProviderError::NotFound(post_id))
    }
}

fn response_with(ids: &[(u64, f64)]) -> String {
    let results: Vec<String> = ids
        .iter()
        .map(|(id, sim)| {
            format!(
                r#"{{"header": {{"similarity": "{}", "index_id": 29}}, "data": {{"e621_id": {}}}}}"#,
                sim, id
            )
        })
        .collect();
    format!(
        r#"{{"header": {{"user_id": "42", "status": 0, "long_remaining": 90, "long_limit": 100}}, "results": [{}]}}"#,
        results.join(",")
    )
}

fn write_png(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    image::RgbImage::from_pixel(8, 6, image::Rgb([200, 10, 10]))
        .save(path)
        .unwrap();
}

fn in_place(root: &Path) -> OrganizeOptions {
    OrganizeOptions {
        base: BaseDirs::discover(root, None),
        no_rename: false,
    }
}

fn lookup(search: Arc<QueuedSearch>, posts: Posts) -> Lookup {
    Lookup::new(search, Arc::new(posts), LookupContext::default())
}

fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn organizes_every_uniquely_matched_image() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("a.png");
    let second = dir.path().join("b.png");
    write_png(&first);
    write_png(&second);
    let search = QueuedSearch::new(vec![
        response_with(&[(100, 95.5), (999, 12.0)]),
        response_with(&[(200, 61.0)]),
    ]);
    let posts = Posts::default()
        .with(100, vec!["foo_(artist)", "bar"], vec!["solo"])
        .with(200, vec![], vec!["fox", "smile"]);

    let summary = run(
        &lookup(search.clone(), posts),
        &[first.clone(), second.clone()],
        &in_place(dir.path()),
        &AtomicBool::new(false),
    )
    .await
    .unwrap();

    assert_eq!(
        summary,
        RunSummary {
            scanned: 2,
            organized: 2,
            ..Default::default()
        }
    );
    assert_eq!(search.remaining(), 0);
    assert_eq!(
        files_in(dir.path()),
        vec![
            "foo-bar-100.png",
            "foo-bar-100.png.json",
            "unknown_artist-200.png",
            "unknown_artist-200.png.json"
        ]
    );
    assert_eq!(
        read_sidecar(&dir.path().join("unknown_artist-200.png.json")).unwrap(),
        vec!["fox", "smile"]
    );
}

#[tokio::test]
async fn ambiguous_match_leaves_the_image_untouched() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("a.png");
    write_png(&image);
    let search = QueuedSearch::new(vec![response_with(&[(1, 90.0), (2, 88.0)])]);
    let posts = Posts::default()
        .with(1, vec!["foo"], vec![])
        .with(2, vec!["bar"], vec![]);

    let outcome = process_image(&lookup(search, posts), &image, &in_place(dir.path()))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ImageOutcome::Skipped(SkipReason::Ambiguous(2))
    ));
    assert_eq!(files_in(dir.path()), vec!["a.png"]);
}

#[tokio::test]
async fn unfetchable_candidate_still_leaves_the_image_ambiguous() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("a.png");
    write_png(&image);
    let search = QueuedSearch::new(vec![response_with(&[(1, 90.0), (2, 88.0)])]);
    let posts = Arc::new(Posts::default().with(2, vec!["bar"], vec![]));
    let lookup = Lookup::new(search, posts.clone(), LookupContext::default());

    let outcome = process_image(&lookup, &image, &in_place(dir.path()))
        .await
        .unwrap();

    assert!(matches!(
        outcome,
        ImageOutcome::Skipped(SkipReason::Ambiguous(2))
    ));
    assert_eq!(
        *posts.requested.lock().unwrap(),
        vec![PostId(1), PostId(2)]
    );
    assert_eq!(files_in(dir.path()), vec!["a.png"]);
}

#[tokio::test]
async fn low_similarity_is_a_no_match() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("a.png");
    write_png(&image);
    let search = QueuedSearch::new(vec![response_with(&[(1, 60.0), (2, 30.0)])]);

    let outcome = process_image(
        &lookup(search, Posts::default()),
        &image,
        &in_place(dir.path()),
    )
    .await
    .unwrap();

    assert!(matches!(outcome, ImageOutcome::Skipped(SkipReason::NoMatch)));
    assert_eq!(files_in(dir.path()), vec!["a.png"]);
}

#[tokio::test]
async fn per_image_failures_do_not_stop_the_run() {
    let dir = tempdir().unwrap();
    let images: Vec<PathBuf> = ["a.png", "b.png", "c.png"]
        .iter()
        .map(|n| dir.path().join(n))
        .collect();
    images.iter().for_each(|p| write_png(p));
    let search = QueuedSearch::new(vec![
        r#"{"header": {"user_id": 42, "status": -2}, "results": []}"#.to_string(),
        response_with(&[(404, 80.0)]),
        response_with(&[(5, 80.0)]),
    ]);
    let posts = Posts::default().with(5, vec!["foo"], vec![]);

    let summary = run(
        &lookup(search, posts),
        &images,
        &in_place(dir.path()),
        &AtomicBool::new(false),
    )
    .await
    .unwrap();

    assert_eq!(summary.failed, 2);
    assert_eq!(summary.organized, 1);
    assert!(dir.path().join("foo-5.png.json").exists());
}

#[tokio::test]
async fn rejected_account_aborts_the_run() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("a.png");
    let second = dir.path().join("b.png");
    write_png(&first);
    write_png(&second);
    let search = QueuedSearch::new(vec![
        r#"{"header": {"user_id": 0, "status": 0}}"#.to_string(),
        response_with(&[(5, 80.0)]),
    ]);
    let posts = Posts::default().with(5, vec!["foo"], vec![]);

    let err = run(
        &lookup(search.clone(), posts),
        &[first, second],
        &in_place(dir.path()),
        &AtomicBool::new(false),
    )
    .await
    .unwrap_err();

    assert!(format!("{:#}", err).contains("a.png"));
    assert_eq!(search.remaining(), 1);
    assert_eq!(files_in(dir.path()), vec!["a.png", "b.png"]);
}

#[tokio::test]
async fn interrupt_stops_between_images() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("a.png");
    write_png(&image);
    let search = QueuedSearch::new(vec![response_with(&[(5, 80.0)])]);

    let summary = run(
        &lookup(search.clone(), Posts::default()),
        &[image],
        &in_place(dir.path()),
        &AtomicBool::new(true),
    )
    .await
    .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.organized + summary.skipped + summary.failed, 0);
    assert_eq!(search.remaining(), 1);
}

/// Never answers, like a search stuck in its retry backoff.
struct StalledSearch;

#[async_trait::async_trait]
impl SimilarityProvider for StalledSearch {
    async fn search(&self, _upload: ImageUpload) -> Result<SimilarityResponse, ProviderError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn abort_abandons_the_lookup_without_touching_files() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("a.png");
    write_png(&image);
    let lookup = Lookup::new(
        Arc::new(StalledSearch),
        Arc::new(Posts::default()),
        LookupContext::default(),
    );
    let abort = Notify::new();
    abort.notify_one();

    let summary = run_until_aborted(
        &lookup,
        &[image],
        &in_place(dir.path()),
        &AtomicBool::new(false),
        &abort,
    )
    .await
    .unwrap();

    assert!(summary.is_none());
    assert_eq!(files_in(dir.path()), vec!["a.png"]);
}

#[tokio::test]
async fn finished_run_is_not_aborted() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("a.png");
    write_png(&image);
    let search = QueuedSearch::new(vec![response_with(&[(5, 80.0)])]);
    let posts = Posts::default().with(5, vec!["foo"], vec![]);

    let summary = run_until_aborted(
        &lookup(search, posts),
        &[image],
        &in_place(dir.path()),
        &AtomicBool::new(false),
        &Notify::new(),
    )
    .await
    .unwrap();

    assert_eq!(summary.map(|s| s.organized), Some(1));
    assert_eq!(files_in(dir.path()), vec!["foo-5.png", "foo-5.png.json"]);
}

#[tokio::test]
async fn already_tagged_images_are_not_searched() {
    let dir = tempdir().unwrap();
    let image = dir.path().join("a.png");
    write_png(&image);
    fs::write(dir.path().join("a.png.json"), "[]").unwrap();
    let search = QueuedSearch::new(vec![response_with(&[(5, 80.0)])]);

    let outcome = process_image(
        &lookup(search.clone(), Posts::default()),
        &image,
        &in_place(dir.path()),
    )
    .await
    .unwrap();

    assert!(matches!(
        outcome,
        ImageOutcome::Skipped(SkipReason::AlreadyTagged)
    ));
    assert_eq!(search.remaining(), 1);
}

#[tokio::test]
async fn replayed_documents_are_tagged_without_renaming() {
    let dir = tempdir().unwrap();
    let search_doc = dir.path().join("debug-saucenao.json");
    let post_doc = dir.path().join("debug-e621.json");
    fs::write(&search_doc, response_with(&[(77, 99.0)])).unwrap();
    fs::write(
        &post_doc,
        r#"{"post": {"id": 77, "tags": {"general": ["a", "b"], "artist": ["zed"], "meta": ["c"]}}}"#,
    )
    .unwrap();
    let lookup = Lookup::new(
        QueuedSearch::new(vec![]),
        Arc::new(Posts::default()),
        LookupContext {
            metadata_replay: Some(post_doc.clone()),
            ..Default::default()
        },
    );

    let summary = run(
        &lookup,
        &[search_doc.clone()],
        &OrganizeOptions {
            base: BaseDirs::discover(&search_doc, None),
            no_rename: false,
        },
        &AtomicBool::new(false),
    )
    .await
    .unwrap();

    assert_eq!(summary.organized, 1);
    assert!(search_doc.exists());
    assert_eq!(
        read_sidecar(&dir.path().join("debug-saucenao.json.json")).unwrap(),
        vec!["a", "b", "c"]
    );
}

#[tokio::test]
async fn alternate_base_mirrors_the_tree() {
    let dir = tempdir().unwrap();
    let src_root = dir.path().join("in");
    let out_root = dir.path().join("out");
    let image = src_root.join("sub/a.png");
    write_png(&image);
    let search = QueuedSearch::new(vec![response_with(&[(8, 70.0)])]);
    let posts = Posts::default().with(8, vec!["foo"], vec!["x"]);
    let opts = OrganizeOptions {
        base: BaseDirs::discover(&src_root, Some(out_root.clone())),
        no_rename: false,
    };

    let outcome = process_image(&lookup(search, posts), &image, &opts)
        .await
        .unwrap();

    match outcome {
        ImageOutcome::Organized(applied) => {
            assert_eq!(applied.image, out_root.join("sub/foo-8.png"));
            assert!(applied.image.exists());
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(image.exists());
}
