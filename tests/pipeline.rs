//! Pipeline integration tests against a scripted inference client.
//!
//! No network access: every model reply comes from a [`ScriptedClient`]
//! queue. Backoff timing runs on tokio's paused clock, so the 2 s / 4 s / 8 s
//! waits complete instantly while `Instant` still observes them.

use async_trait::async_trait;
use edgequake_ocr::pipeline::encode::{encode_image, EncodedImage};
use edgequake_ocr::{
    call_with_retry, read_business_card, read_cards_stream, recognize_text, Completion,
    ErrorCategory, InferenceClient, InferenceError, Language, OcrConfig, OcrError,
    OcrProgressCallback, OutputFormat, RetryPolicy, SourceImage,
};
use futures::StreamExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

type Reply = Result<Completion, InferenceError>;

/// Replays a fixed list of replies and records every prompt it receives.
struct ScriptedClient {
    script: Mutex<VecDeque<Reply>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedClient {
    fn new(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, image: &EncodedImage) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        assert_eq!(image.mime_type, "image/png");
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(InferenceError::Other {
                    message: "script exhausted".into(),
                })
            })
    }
}

/// Library logs on the test writer; `RUST_LOG=debug` shows the retry trail.
fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn rate_limited() -> Reply {
    Err(InferenceError::RateLimited {
        detail: "HTTP 429: RESOURCE_EXHAUSTED".into(),
    })
}

fn ok(text: &str) -> Reply {
    Ok(Completion {
        text: text.to_string(),
        input_tokens: 1200,
        output_tokens: 40,
        retries: 0,
    })
}

fn png_source(name: &str, w: u32, h: u32) -> SourceImage {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([20, 20, 20, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    SourceImage::from_bytes(name, buf)
}

fn tiny_payload() -> EncodedImage {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255])));
    encode_image(&img).unwrap()
}

fn config_with(client: &Arc<ScriptedClient>) -> OcrConfig {
    let client: Arc<dyn InferenceClient> = Arc::clone(client) as Arc<dyn InferenceClient>;
    OcrConfig::builder()
        .client(client)
        .build()
        .expect("valid config")
}

const CARD_JSON: &str = "名刺の内容です:\n```json\n{\"name\": \"Taro Yamada\", \"company\": \"Acme\", \
                         \"email\": [\"t@acme.com\"], \"phone\": [\"03-1234-5678\"]}\n```";

// ── call_with_retry ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn succeeds_after_n_rate_limits_with_doubling_waits() {
    // (failures before success, cumulative wait in seconds)
    for (failures, expected_secs) in [(0u32, 0u64), (1, 2), (2, 6), (3, 14)] {
        let mut script: Vec<Reply> = (0..failures).map(|_| rate_limited()).collect();
        script.push(ok("done"));
        let client = ScriptedClient::new(script);

        let start = tokio::time::Instant::now();
        let completion = call_with_retry(
            client.as_ref(),
            "prompt",
            &tiny_payload(),
            &RetryPolicy::default(),
        )
        .await
        .expect("should succeed within the retry bound");
        let elapsed = start.elapsed();

        assert_eq!(completion.text, "done");
        assert_eq!(completion.retries, failures);
        assert_eq!(client.calls(), failures as usize + 1);
        assert!(
            elapsed >= Duration::from_secs(expected_secs)
                && elapsed < Duration::from_secs(expected_secs) + Duration::from_millis(100),
            "{failures} failures: waited {elapsed:?}, expected {expected_secs}s"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limit_exhaustion_after_four_attempts() {
    let client = ScriptedClient::new((0..5).map(|_| rate_limited()).collect());

    let start = tokio::time::Instant::now();
    let err = call_with_retry(
        client.as_ref(),
        "prompt",
        &tiny_payload(),
        &RetryPolicy::default(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::RateLimited);
    assert_eq!(client.calls(), 4, "1 attempt + 3 retries");
    assert!(start.elapsed() >= Duration::from_secs(14));
    assert!(start.elapsed() < Duration::from_secs(15));
}

#[tokio::test(start_paused = true)]
async fn other_categories_are_not_retried() {
    let failures = [
        InferenceError::Unauthorized {
            detail: "HTTP 403".into(),
        },
        InferenceError::Timeout {
            detail: "no response within 60s".into(),
        },
        InferenceError::Other {
            message: "HTTP 500".into(),
        },
    ];

    for failure in failures {
        let client = ScriptedClient::new(vec![Err(failure.clone()), ok("never reached")]);
        let start = tokio::time::Instant::now();
        let err = call_with_retry(
            client.as_ref(),
            "prompt",
            &tiny_payload(),
            &RetryPolicy::default(),
        )
        .await
        .unwrap_err();

        assert_eq!(err, failure);
        assert_eq!(client.calls(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}

#[tokio::test(start_paused = true)]
async fn each_call_gets_its_own_retry_budget() {
    let mut script = Vec::new();
    for _ in 0..2 {
        script.extend((0..3).map(|_| rate_limited()));
        script.push(ok("fine"));
    }
    let client = ScriptedClient::new(script);
    let payload = tiny_payload();

    for _ in 0..2 {
        let c = call_with_retry(client.as_ref(), "p", &payload, &RetryPolicy::default())
            .await
            .expect("three retries are allowed per call");
        assert_eq!(c.retries, 3);
    }
    assert_eq!(client.calls(), 8);
}

// ── Free-text OCR ────────────────────────────────────────────────────────────

#[tokio::test]
async fn recognize_text_builds_prompt_from_options() {
    let client = ScriptedClient::new(vec![ok("# 請求書\n合計 1,000円")]);
    let client_dyn: Arc<dyn InferenceClient> = Arc::clone(&client) as Arc<dyn InferenceClient>;
    let config = OcrConfig::builder()
        .client(client_dyn)
        .language(Language::Japanese)
        .output_format(OutputFormat::Markdown)
        .build()
        .unwrap();

    let out = recognize_text(png_source("invoice.png", 64, 32), &config)
        .await
        .expect("recognition should succeed");

    assert_eq!(out.text, "# 請求書\n合計 1,000円");
    assert_eq!(out.image.file_name, "invoice.png");
    assert_eq!((out.image.width, out.image.height), (64, 32));
    assert_eq!(out.stats.retries, 0);
    assert_eq!(out.stats.input_tokens, 1200);

    let prompts = client.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].starts_with("日本語で、"));
    assert!(prompts[0].contains("マークダウン形式"));
}

#[tokio::test]
async fn whitespace_only_text_is_empty_response() {
    let client = ScriptedClient::new(vec![ok("  \n\t ")]);
    let err = recognize_text(png_source("blank.jpg.png", 8, 8), &config_with(&client))
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::EmptyResponse { .. }), "{err:?}");
}

#[tokio::test]
async fn large_images_are_downscaled_before_upload() {
    let client = ScriptedClient::new(vec![ok("text")]);
    let client_dyn: Arc<dyn InferenceClient> = Arc::clone(&client) as Arc<dyn InferenceClient>;
    let config = OcrConfig::builder()
        .client(client_dyn)
        .max_dimension(100)
        .build()
        .unwrap();

    let out = recognize_text(png_source("wide.png", 400, 50), &config)
        .await
        .unwrap();
    assert_eq!((out.image.width, out.image.height), (400, 50));
    assert_eq!(
        (out.image.processed_width, out.image.processed_height),
        (100, 12)
    );
}

#[tokio::test]
async fn exhausted_rate_limit_surfaces_category() {
    let client = ScriptedClient::new((0..4).map(|_| rate_limited()).collect());
    let client_dyn: Arc<dyn InferenceClient> = Arc::clone(&client) as Arc<dyn InferenceClient>;
    let config = OcrConfig::builder()
        .client(client_dyn)
        .retry_initial_delay_ms(1)
        .build()
        .unwrap();

    let err = recognize_text(png_source("a.png", 8, 8), &config)
        .await
        .unwrap_err();
    assert_eq!(err.category(), Some(ErrorCategory::RateLimited));
    assert!(err.to_string().contains("429"));
    assert_eq!(client.calls(), 4);
}

// ── Business cards ───────────────────────────────────────────────────────────

#[tokio::test]
async fn business_card_is_parsed_from_fenced_json() {
    init_logging();
    let client = ScriptedClient::new(vec![rate_limited(), ok(CARD_JSON)]);
    let client_dyn: Arc<dyn InferenceClient> = Arc::clone(&client) as Arc<dyn InferenceClient>;
    let config = OcrConfig::builder()
        .client(client_dyn)
        .retry_initial_delay_ms(1)
        .build()
        .unwrap();

    let card = read_business_card(png_source("meishi.png", 90, 55), &config)
        .await
        .expect("card should parse");

    assert_eq!(card.record.name.as_deref(), Some("Taro Yamada"));
    assert_eq!(card.record.company.as_deref(), Some("Acme"));
    assert_eq!(card.record.email, vec!["t@acme.com"]);
    assert_eq!(card.record.phone, vec!["03-1234-5678"]);
    assert_eq!(card.record.title, None);
    assert_eq!(card.raw_response, CARD_JSON);
    assert_eq!(card.stats.retries, 1);
    assert!(client.prompts()[0].contains("\"name_kana\""));

    let vcard = edgequake_ocr::to_vcard(&card.record);
    assert!(vcard.contains("FN:Taro Yamada\r\n"));
    assert!(vcard.contains("ORG:Acme\r\n"));
    assert!(vcard.contains("EMAIL:t@acme.com\r\n"));
}

#[tokio::test]
async fn non_json_card_reply_is_no_card_data() {
    let client = ScriptedClient::new(vec![ok("I cannot read this image")]);
    let err = read_business_card(png_source("blurry.png", 8, 8), &config_with(&client))
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::NoCardData { .. }), "{err:?}");
    assert!(err.to_string().contains("text mode"));
}

#[tokio::test]
async fn all_null_card_reply_is_no_card_data() {
    let reply = r#"{"name": null, "phone": [], "email": [""], "company": "  "}"#;
    let client = ScriptedClient::new(vec![ok(reply)]);
    let err = read_business_card(png_source("empty.png", 8, 8), &config_with(&client))
        .await
        .unwrap_err();
    assert!(matches!(err, OcrError::NoCardData { .. }));
}

// ── Batches ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl OcrProgressCallback for Recorder {
    fn on_batch_start(&self, total: usize) {
        self.events.lock().unwrap().push(format!("start {total}"));
    }
    fn on_image_complete(&self, index: usize, _total: usize, name: &str) {
        self.events.lock().unwrap().push(format!("ok {index} {name}"));
    }
    fn on_image_error(&self, index: usize, _total: usize, name: &str, _error: &str) {
        self.events.lock().unwrap().push(format!("err {index} {name}"));
    }
    fn on_batch_complete(&self, total: usize, success_count: usize) {
        self.events
            .lock()
            .unwrap()
            .push(format!("done {success_count}/{total}"));
    }
}

#[tokio::test]
async fn batch_continues_past_failures_in_input_order() {
    init_logging();
    let client = ScriptedClient::new(vec![ok(CARD_JSON), ok(r#"{"name": "B"}"#)]);
    let recorder = Arc::new(Recorder::default());
    let client_dyn: Arc<dyn InferenceClient> = Arc::clone(&client) as Arc<dyn InferenceClient>;
    let config = OcrConfig::builder()
        .client(client_dyn)
        .progress_callback(Arc::clone(&recorder) as Arc<dyn OcrProgressCallback>)
        .build()
        .unwrap();

    let inputs = vec![
        png_source("a.png", 8, 8),
        SourceImage::from_bytes("doc.pdf", b"%PDF-1.7".to_vec()),
        png_source("b.png", 8, 8),
    ];
    let results: Vec<_> = read_cards_stream(inputs, &config)
        .expect("client resolves")
        .collect()
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(
        results[0].as_ref().unwrap().record.name.as_deref(),
        Some("Taro Yamada")
    );
    assert!(matches!(
        results[1],
        Err(OcrError::UnsupportedFormat { .. })
    ));
    assert_eq!(results[2].as_ref().unwrap().record.name.as_deref(), Some("B"));
    assert_eq!(client.calls(), 2, "the PDF never reaches the model");

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            "start 3",
            "ok 1 a.png",
            "err 2 doc.pdf",
            "ok 3 b.png",
            "done 2/3"
        ]
    );
}

#[tokio::test]
async fn batch_loads_paths_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("receipt.png");
    std::fs::write(&path, png_source("x.png", 16, 16).bytes).unwrap();
    let missing = dir.path().join("missing.png");

    let client = ScriptedClient::new(vec![ok("レシート")]);
    let results: Vec<_> = edgequake_ocr::recognize_stream(
        vec![
            path.to_string_lossy().into_owned(),
            missing.to_string_lossy().into_owned(),
        ],
        &config_with(&client),
    )
    .unwrap()
    .collect()
    .await;

    assert_eq!(results[0].as_ref().unwrap().text, "レシート");
    assert_eq!(results[0].as_ref().unwrap().image.file_name, "receipt.png");
    assert!(matches!(results[1], Err(OcrError::FileNotFound { .. })));
}
