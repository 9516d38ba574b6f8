//! Integration tests for exam-convert.
//!
//! Every input is generated in memory with the `image` crate, so these run
//! without fixtures or network access:
//!
//!   cargo test --test pipeline

use exam_convert::pipeline::encode::read_dimensions;
use exam_convert::{
    convert_to_dir, lookup, progress_channel, read_dpi, run_stream, BackendKind, BatchProgress,
    CancelFlag, ConversionOutcome, ConvertError, DocumentClass, DocumentFormat, FileReport,
    FormatCatalog, NoopProgressSink, Pipeline, PipelineConfig, RawDocument, ReasonCode, Stage,
};
use futures::StreamExt;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Deterministic RGB noise: compresses badly, so JPEGs come out big.
fn noise(w: u32, h: u32) -> RgbImage {
    let mut state = 0x9E37_79B9u32;
    RgbImage::from_fn(w, h, |_, _| {
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 8) as u8
        };
        Rgb([next(), next(), next()])
    })
}

fn jpeg_bytes(img: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode(img.as_raw(), img.width(), img.height(), ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x % 200) as u8, (y % 200) as u8, 240])
    }));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

fn converted(report: &FileReport) -> &exam_convert::ConvertedDocument {
    report
        .outcome
        .converted()
        .unwrap_or_else(|| panic!("{} failed: {:?}", report.filename, report.outcome))
}

// ── Exam scenarios ───────────────────────────────────────────────────────────

#[tokio::test]
async fn neet_passport_photo_is_brought_to_contract() {
    let input = jpeg_bytes(&noise(1200, 1380), 100);
    assert!(input.len() > 1_048_576, "fixture should exceed the limit");

    let spec = lookup("neet").unwrap();
    let files = [RawDocument::new("photo1.jpg", "image/jpeg", input)];
    let report = Pipeline::default()
        .run(&files, spec, &NoopProgressSink, None)
        .await
        .unwrap();

    let file = &report.files[0];
    assert_eq!(file.class, DocumentClass::PassportPhoto);
    let doc = converted(file);
    assert_eq!(doc.format, DocumentFormat::Jpeg);
    assert_eq!(read_dimensions(&doc.bytes), Some((200, 230)));
    assert_eq!(read_dpi(&doc.bytes), Some(200));
    assert!(doc.byte_len <= 1_048_576);
    assert_eq!(doc.byte_len, doc.bytes.len() as u64);
    assert_eq!(file.output_name.as_deref(), Some("NEET_passport_photo_photo1.jpg"));
}

#[tokio::test]
async fn every_builtin_exam_hits_exact_geometry() {
    let photo = jpeg_bytes(&noise(360, 480), 95);
    let signature = png_bytes(420, 90);
    let pipeline = Pipeline::default();

    for spec in FormatCatalog::builtin().specs() {
        let files = [
            RawDocument::new("a.jpg", "image/jpeg", photo.clone()),
            RawDocument::new("b.png", "image/png", signature.clone()),
        ];
        let report = pipeline
            .run(&files, spec, &NoopProgressSink, None)
            .await
            .unwrap();

        let targets = [
            (DocumentClass::PassportPhoto, spec.photo_size.unwrap()),
            (DocumentClass::Signature, spec.signature_size.unwrap()),
        ];
        for (file, (class, target)) in report.files.iter().zip(targets) {
            assert_eq!(file.class, class, "{}: {}", spec.id, file.filename);
            let doc = converted(file);
            assert_eq!(
                read_dimensions(&doc.bytes),
                Some((target.width, target.height)),
                "{}: {}",
                spec.id,
                file.filename
            );
            assert_eq!(read_dpi(&doc.bytes), Some(target.dpi));
            assert!(doc.byte_len <= spec.max_file_size);
        }
    }
}

#[tokio::test]
async fn reconverting_output_is_a_fixed_point() {
    let spec = lookup("jee").unwrap();
    let pipeline = Pipeline::default();
    let first = pipeline
        .run(
            &[RawDocument::new("me.jpg", "image/jpeg", jpeg_bytes(&noise(300, 400), 90))],
            spec,
            &NoopProgressSink,
            None,
        )
        .await
        .unwrap();
    let once = converted(&first.files[0]).clone();

    let second = pipeline
        .run(
            &[RawDocument::new("me.jpg", "image/jpeg", once.bytes.clone())],
            spec,
            &NoopProgressSink,
            None,
        )
        .await
        .unwrap();
    let twice = converted(&second.files[0]);

    assert_eq!(second.files[0].class, DocumentClass::PassportPhoto);
    assert_eq!(read_dimensions(&twice.bytes), read_dimensions(&once.bytes));
    assert_eq!(read_dpi(&twice.bytes), read_dpi(&once.bytes));
    assert_eq!(twice.format, once.format);
    assert_eq!(twice.geometry, once.geometry);
}

#[tokio::test]
async fn undecodable_signature_is_named_by_filename() {
    let files = [RawDocument::new(
        "signature_john.png",
        "image/png",
        b"\x89PNG but truncated".to_vec(),
    )];
    let report = Pipeline::default()
        .run(&files, lookup("cat").unwrap(), &NoopProgressSink, None)
        .await
        .unwrap();

    let file = &report.files[0];
    assert_eq!(file.class, DocumentClass::Signature);
    assert!(file.is_degraded());
    assert_eq!(file.outcome.reason(), Some(ReasonCode::Unsupported));
    assert_eq!(report.stats.degraded_files, 1);
}

// ── Batch behaviour ──────────────────────────────────────────────────────────

#[tokio::test]
async fn one_empty_file_fails_alone() {
    let photo = jpeg_bytes(&noise(300, 400), 90);
    let mut files: Vec<RawDocument> = (0..5)
        .map(|i| RawDocument::new(format!("photo_{i}.jpg"), "image/jpeg", photo.clone()))
        .collect();
    files[2] = RawDocument::new("photo_2.jpg", "image/jpeg", Vec::<u8>::new());

    let report = Pipeline::default()
        .run(&files, lookup("upsc").unwrap(), &NoopProgressSink, None)
        .await
        .unwrap();

    assert_eq!(report.files.len(), 5);
    for (i, file) in report.files.iter().enumerate() {
        assert_eq!(file.index, i);
        if i == 2 {
            assert_eq!(file.outcome.reason(), Some(ReasonCode::EmptyInput));
            assert!(file.output_name.is_none());
        } else {
            assert!(file.outcome.is_converted(), "file {i}: {:?}", file.outcome);
        }
    }
    assert_eq!(report.stats.failed_files, 1);
    assert_eq!(report.stats.converted_files, 4);
}

#[tokio::test]
async fn disallowed_pdf_does_not_affect_other_files() {
    let mut spec = lookup("neet").unwrap().clone();
    spec.document_formats = vec![DocumentFormat::Jpeg, DocumentFormat::Png];

    let files = [
        RawDocument::new("photo.jpg", "image/jpeg", jpeg_bytes(&noise(300, 400), 90)),
        RawDocument::new("10th_marksheet.pdf", "application/pdf", b"%PDF-1.7\n%...".to_vec()),
        RawDocument::new("sign.png", "image/png", png_bytes(420, 90)),
    ];
    let report = Pipeline::default()
        .run(&files, &spec, &NoopProgressSink, None)
        .await
        .unwrap();

    assert!(report.files[0].outcome.is_converted());
    assert_eq!(report.files[1].class, DocumentClass::Marksheet10th);
    match &report.files[1].outcome {
        ConversionOutcome::Failed { reason, message } => {
            assert_eq!(*reason, ReasonCode::UnsupportedFormat);
            assert!(message.contains("PDF"), "got: {message}");
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(report.files[2].outcome.is_converted());
}

#[tokio::test]
async fn progress_is_monotonic_and_completes_once() {
    let files: Vec<RawDocument> = ["photo.jpg", "blank.jpg", "aadhar.pdf"]
        .iter()
        .map(|name| match *name {
            "photo.jpg" => RawDocument::new(*name, "image/jpeg", jpeg_bytes(&noise(300, 400), 90)),
            "aadhar.pdf" => RawDocument::new(*name, "application/pdf", b"%PDF-1.4 id".to_vec()),
            _ => RawDocument::new(*name, "image/jpeg", Vec::<u8>::new()),
        })
        .collect();

    let (sink, events) = progress_channel();
    Pipeline::default()
        .run(&files, lookup("gate").unwrap(), &sink, None)
        .await
        .unwrap();
    drop(sink);
    let events: Vec<BatchProgress> = events.collect().await;

    assert_eq!(events.len(), files.len() * 3 + 1);
    assert!(events.windows(2).all(|w| w[0].progress <= w[1].progress));
    let last = events.last().unwrap();
    assert_eq!(last.stage, Stage::Completed);
    assert_eq!(last.progress, 100.0);
    assert_eq!(events.iter().filter(|e| e.stage == Stage::Completed).count(), 1);
}

#[tokio::test]
async fn all_failed_batch_still_completes() {
    let files = [
        RawDocument::new("a.jpg", "image/jpeg", Vec::<u8>::new()),
        RawDocument::new("b.docx", "application/msword", vec![1, 2, 3]),
    ];
    let (sink, events) = progress_channel();
    let report = Pipeline::default()
        .run(&files, lookup("cat").unwrap(), &sink, None)
        .await
        .unwrap();
    drop(sink);

    assert_eq!(report.failed().count(), 2);
    let events: Vec<BatchProgress> = events.collect().await;
    assert_eq!(events.last().map(|e| e.stage), Some(Stage::Completed));
}

#[tokio::test]
async fn fatal_errors_are_reported_before_any_work() {
    let pipeline = Pipeline::default();
    let (sink, events) = progress_channel();

    let err = pipeline
        .run(&[], lookup("neet").unwrap(), &sink, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::EmptyBatch));

    let mut spec = lookup("neet").unwrap().clone();
    spec.photo_size = None;
    let files = [RawDocument::new("photo.jpg", "image/jpeg", vec![0xFF, 0xD8])];
    let err = pipeline.run(&files, &spec, &sink, None).await.unwrap_err();
    assert!(matches!(err, ConvertError::InvalidSpec { .. }));

    // A target too large to allocate is rejected up front, not mid-batch.
    let catalog = FormatCatalog::from_json_str(
        r#"[{ "id": "huge", "name": "Huge", "requirements": {
            "photoSize": { "width": 4294967295, "height": 4294967295, "dpi": 200, "format": "JPEG" },
            "signatureSize": { "width": 140, "height": 60, "dpi": 200, "format": "JPEG" },
            "documentFormats": ["PDF"],
            "maxFileSize": 1048576 } }]"#,
    )
    .unwrap();
    let files = [
        RawDocument::new("photo.png", "image/png", png_bytes(200, 230)),
        RawDocument::new("x.pdf", "application/pdf", b"%PDF-1.4".to_vec()),
    ];
    let err = pipeline
        .run(&files, catalog.lookup("huge").unwrap(), &sink, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ConvertError::InvalidSpec { .. }));

    drop(sink);
    assert_eq!(events.count().await, 0);
}

#[tokio::test]
async fn cancellation_between_files() {
    let files = [
        RawDocument::new("photo.jpg", "image/jpeg", jpeg_bytes(&noise(300, 400), 90)),
        RawDocument::new("sign.png", "image/png", png_bytes(420, 90)),
    ];
    let cancel = CancelFlag::new();
    let pipeline = Pipeline::default();

    let report = pipeline
        .run(&files, lookup("neet").unwrap(), &NoopProgressSink, Some(&cancel))
        .await
        .unwrap();
    assert!(!report.cancelled);
    assert_eq!(report.stats.converted_files, 2);

    cancel.cancel();
    let report = pipeline
        .run(&files, lookup("neet").unwrap(), &NoopProgressSink, Some(&cancel))
        .await
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.files.len(), 2);
    assert!(report
        .files
        .iter()
        .all(|f| f.outcome.reason() == Some(ReasonCode::Cancelled)));
}

// ── Backends ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn pass_through_backend_degrades_gracefully() {
    let config = PipelineConfig::builder()
        .backend(BackendKind::PassThrough)
        .build()
        .unwrap();
    let pipeline = Pipeline::new(config);
    let photo = jpeg_bytes(&noise(200, 230), 80);

    let files = [
        RawDocument::new("passport.jpg", "image/jpeg", photo.clone()),
        RawDocument::new("sign.png", "image/png", png_bytes(140, 60)),
        RawDocument::new("IMG_0001.jpg", "image/jpeg", photo.clone()),
    ];
    let report = pipeline
        .run(&files, lookup("neet").unwrap(), &NoopProgressSink, None)
        .await
        .unwrap();

    // Already a JPEG under the limit: emitted byte-for-byte.
    let photo_report = &report.files[0];
    assert_eq!(photo_report.class, DocumentClass::PassportPhoto);
    assert!(photo_report.is_degraded());
    let doc = converted(photo_report);
    assert_eq!(doc.bytes, photo);
    assert!(!doc.reencoded);

    // NEET wants JPEG signatures; pass-through cannot transcode.
    assert_eq!(report.files[1].class, DocumentClass::Signature);
    assert_eq!(report.files[1].outcome.reason(), Some(ReasonCode::UnsupportedFormat));

    // No keyword, no geometry: generic document, passed through as JPEG.
    assert_eq!(report.files[2].class, DocumentClass::GenericDocument);
    assert!(report.files[2].outcome.is_converted());
    assert_eq!(report.stats.degraded_files, 3);
}

#[tokio::test]
async fn custom_catalog_png_signature_carries_dpi() {
    let json = r#"{ "ssc": {
        "name": "SSC",
        "requirements": {
            "photoSize":     { "width": 100, "height": 120, "dpi": 100, "format": "JPEG" },
            "signatureSize": { "width": 160, "height": 40,  "dpi": 150, "format": "PNG" },
            "documentFormats": ["PDF"],
            "maxFileSize": 51200,
            "requiredDocuments": ["photo", "signature"]
        }
    }}"#;
    let catalog = FormatCatalog::from_json_str(json).unwrap();
    let spec = catalog.lookup("SSC").unwrap();

    let config = PipelineConfig::builder()
        .grayscale_signatures(true)
        .build()
        .unwrap();
    let files = [RawDocument::new("my_sign.jpg", "image/jpeg", jpeg_bytes(&noise(480, 90), 90))];
    let report = Pipeline::new(config)
        .run(&files, spec, &NoopProgressSink, None)
        .await
        .unwrap();

    let doc = converted(&report.files[0]);
    assert_eq!(doc.format, DocumentFormat::Png);
    assert_eq!(read_dimensions(&doc.bytes), Some((160, 40)));
    assert_eq!(read_dpi(&doc.bytes), Some(150));
    let decoded = image::load_from_memory(&doc.bytes).unwrap();
    assert_eq!(decoded.color(), image::ColorType::L8);
    assert_eq!(report.missing_documents, vec![DocumentClass::PassportPhoto]);
}

// ── Streaming and output ─────────────────────────────────────────────────────

#[tokio::test]
async fn stream_matches_eager_run() {
    let pipeline = Pipeline::default();
    let spec = lookup("neet").unwrap();
    let files = [
        RawDocument::new("photo.jpg", "image/jpeg", jpeg_bytes(&noise(300, 400), 90)),
        RawDocument::new("", "", Vec::<u8>::new()),
        RawDocument::new("hsc.pdf", "application/pdf", b"%PDF-1.3 marks".to_vec()),
    ];

    let eager = pipeline
        .run(&files, spec, &NoopProgressSink, None)
        .await
        .unwrap();
    let streamed: Vec<FileReport> = run_stream(&pipeline, &files, spec, &NoopProgressSink)
        .unwrap()
        .collect()
        .await;

    assert_eq!(streamed.len(), eager.files.len());
    for (s, e) in streamed.iter().zip(&eager.files) {
        assert_eq!(s.index, e.index);
        assert_eq!(s.class, e.class);
        assert_eq!(s.output_name, e.output_name);
        assert_eq!(s.outcome, e.outcome);
    }
}

#[tokio::test]
async fn convert_to_dir_writes_named_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let files = [
        RawDocument::new("photo.jpg", "image/jpeg", jpeg_bytes(&noise(300, 400), 90)),
        RawDocument::new("empty.png", "image/png", Vec::<u8>::new()),
        RawDocument::new("aadhaar.pdf", "application/pdf", b"%PDF-1.6 card".to_vec()),
    ];
    let report = Pipeline::default()
        .run(&files, lookup("jee").unwrap(), &NoopProgressSink, None)
        .await
        .unwrap();

    let written = convert_to_dir(&report, dir.path()).await.unwrap();
    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["JEE_passport_photo_photo.jpg", "JEE_aadhar_card_aadhaar.pdf"]
    );

    let on_disk = std::fs::read(&written[1]).unwrap();
    assert_eq!(on_disk, b"%PDF-1.6 card");
    let leftovers = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
async fn convert_to_dir_keeps_same_named_uploads_apart() {
    let dir = tempfile::tempdir().unwrap();
    let files = [
        RawDocument::new("photo.jpg", "image/jpeg", jpeg_bytes(&noise(300, 400), 90)),
        RawDocument::new("photo.jpg", "image/jpeg", jpeg_bytes(&noise(330, 420), 80)),
    ];
    let report = Pipeline::default()
        .run(&files, lookup("neet").unwrap(), &NoopProgressSink, None)
        .await
        .unwrap();
    assert_eq!(report.files[0].output_name, report.files[1].output_name);

    let written = convert_to_dir(&report, dir.path()).await.unwrap();
    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["NEET_passport_photo_photo.jpg", "NEET_passport_photo_photo_2.jpg"]
    );
    for (path, file) in written.iter().zip(&report.files) {
        assert_eq!(std::fs::read(path).unwrap(), converted(file).bytes);
    }
}

#[test]
fn run_sync_from_plain_thread() {
    let files = [RawDocument::with_guessed_mime("sign.png", png_bytes(420, 90))];
    let report = Pipeline::default()
        .run_sync(&files, lookup("upsc").unwrap())
        .unwrap();
    assert_eq!(report.files[0].class, DocumentClass::Signature);
    assert!(report.files[0].outcome.is_converted());
}
