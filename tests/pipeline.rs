//! Photo + keypoints -> views -> presigned upload -> record, against an
//! in-memory storage backend.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use tokio_util::sync::CancellationToken;

use garment_views::error::ApiError;
use garment_views::pose::{PoseEstimator, PrecomputedPose};
use garment_views::record::BatchRecord;
use garment_views::upload::{FileSpec, PresignedSlot};
use garment_views::views::synth::estimate_and_synthesize;
use garment_views::{
    upload_batch, upload_views, ImageRecord, ImageSource, StorageApi, SynthesisOptions,
    UploadOptions, ViewName,
};

const POSE_JSON: &str = r#"{
  "keypoints": [
    { "part": "nose",          "position": { "x": 200, "y": 80 },  "score": 0.98 },
    { "part": "leftShoulder",  "position": { "x": 250, "y": 150 }, "score": 0.95 },
    { "part": "rightShoulder", "position": { "x": 150, "y": 150 }, "score": 0.95 },
    { "part": "leftHip",       "position": { "x": 230, "y": 330 }, "score": 0.9 },
    { "part": "rightHip",      "position": { "x": 170, "y": 330 }, "score": 0.9 },
    { "part": "leftKnee",      "position": { "x": 235, "y": 450 }, "score": 0.8 },
    { "part": "rightKnee",     "position": { "x": 165, "y": 450 }, "score": 0.8 },
    { "part": "leftAnkle",     "position": { "x": 240, "y": 560 }, "score": 0.7 },
    { "part": "rightAnkle",    "position": { "x": 160, "y": 560 }, "score": 0.7 }
  ]
}"#;

/// Stores PUT bodies by public URL and keeps the persisted records.
#[derive(Default)]
struct MemoryStorage {
    objects: Mutex<HashMap<String, (Bytes, String)>>,
    images: Mutex<Vec<ImageRecord>>,
    batches: Mutex<Vec<BatchRecord>>,
}

#[async_trait]
impl StorageApi for MemoryStorage {
    async fn request_slots(&self, files: &[FileSpec]) -> Result<Vec<PresignedSlot>, ApiError> {
        Ok(files
            .iter()
            .enumerate()
            .map(|(i, f)| PresignedSlot {
                upload_url: format!("https://bucket.test/put/{i}/{}", f.file_name),
                public_url: format!("https://cdn.test/{i}/{}", f.file_name),
                file_name: Some(f.file_name.clone()),
            })
            .collect())
    }

    async fn put_object(
        &self,
        slot: &PresignedSlot,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), ApiError> {
        self.objects
            .lock()
            .unwrap()
            .insert(slot.public_url.clone(), (body, content_type.to_string()));
        Ok(())
    }

    async fn persist_image(&self, record: &ImageRecord) -> Result<(), ApiError> {
        self.images.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn persist_batch(&self, record: &BatchRecord) -> Result<(), ApiError> {
        self.batches.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// Red upper half, green lower half.
fn photo() -> RgbaImage {
    RgbaImage::from_fn(400, 600, |_, y| {
        if y < 300 {
            Rgba([255, 0, 0, 255])
        } else {
            Rgba([0, 255, 0, 255])
        }
    })
}

#[tokio::test]
async fn single_photo_is_synthesized_uploaded_and_recorded() {
    let source = photo();
    let mut pose = PrecomputedPose::from_json(POSE_JSON, 0.5).unwrap();
    let synthesized =
        estimate_and_synthesize(&mut pose, &source, &SynthesisOptions::default()).unwrap();

    assert!(synthesized.warnings.is_empty());
    assert_eq!(synthesized.views.len(), 6);
    for (_, view) in synthesized.views.iter() {
        assert_eq!(view.dimensions(), (400, 600));
    }
    // neck box (150,0)-(250,150) sits entirely in the red half
    let neck = synthesized.views.get(ViewName::Neck).unwrap();
    assert_eq!(*neck.get_pixel(200, 300), Rgba([255, 0, 0, 255]));
    // length box (105,420)-(295,590) sits entirely in the green half
    let length = synthesized.views.get(ViewName::Length).unwrap();
    assert_eq!(*length.get_pixel(200, 300), Rgba([0, 255, 0, 255]));

    let storage = MemoryStorage::default();
    let record = upload_views(
        &storage,
        &synthesized.views,
        &UploadOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(record.views.len(), 6);
    assert_eq!(record.image_url, record.views[&ViewName::Full]);
    assert_eq!(storage.images.lock().unwrap().as_slice(), &[record.clone()]);

    let objects = storage.objects.lock().unwrap();
    assert_eq!(objects.len(), 6);
    let (body, content_type) = &objects[&record.views[&ViewName::Zoomed]];
    assert_eq!(content_type, "image/png");
    let decoded = image::load_from_memory(body).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (400, 600));
}

#[tokio::test]
async fn low_confidence_knees_fail_before_any_upload() {
    let source = photo();
    // knees score 0.8, so a 0.85 threshold drops them and length cannot be placed
    let mut pose = PrecomputedPose::from_json(POSE_JSON, 0.85).unwrap();
    let keypoints = pose.estimate(&source).unwrap();
    assert!(!keypoints.contains(garment_views::PartName::LeftKnee));

    let err = estimate_and_synthesize(&mut pose, &source, &SynthesisOptions::default())
        .unwrap_err()
        .to_string();
    assert!(err.contains("length"), "{err}");
}

#[tokio::test]
async fn mixed_batch_records_direct_then_uploaded() {
    let storage = MemoryStorage::default();
    let sources = vec![
        ImageSource::file("front.jpg", Bytes::from_static(b"jpeg-bytes"), "image/jpeg"),
        ImageSource::url("https://images.example.com/back.png").unwrap(),
        ImageSource::file("side.webp", Bytes::from_static(b"webp-bytes"), "image/webp"),
    ];

    let record = upload_batch(
        &storage,
        sources,
        &UploadOptions::default(),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        record.image_urls,
        vec![
            "https://images.example.com/back.png".to_string(),
            "https://cdn.test/0/front.jpg".to_string(),
            "https://cdn.test/1/side.webp".to_string(),
        ]
    );
    assert_eq!(storage.batches.lock().unwrap().len(), 1);
    let objects = storage.objects.lock().unwrap();
    assert_eq!(objects["https://cdn.test/1/side.webp"].1, "image/webp");
}
