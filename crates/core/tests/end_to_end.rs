//! End-to-end pipeline tests with fake extractor and encoder executables.
#![cfg(unix)]

use std::time::Duration;

use futures::StreamExt;
use tempfile::TempDir;

use audiograb_core::testing::fixtures::{self, FakeExtractor};
use audiograb_core::{
    ErrorClass, Identity, PipelineConfig, PipelineCoordinator, PipelineError, ToolsConfig,
};

const SOURCE: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

struct Setup {
    coordinator: PipelineCoordinator,
    output_dir: std::path::PathBuf,
    _temp: TempDir,
}

fn setup(behavior: FakeExtractor) -> Setup {
    setup_with(behavior, |tools| tools)
}

fn setup_with(behavior: FakeExtractor, adjust: impl FnOnce(ToolsConfig) -> ToolsConfig) -> Setup {
    let temp = TempDir::new().unwrap();
    let bin_dir = temp.path().join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();
    let tools = adjust(fixtures::tools_config(&bin_dir, &behavior).unwrap());

    let output_dir = temp.path().join("out");
    let config = PipelineConfig {
        max_concurrent_jobs: 2,
        output_dir: output_dir.clone(),
        ..Default::default()
    };
    let coordinator = PipelineCoordinator::with_tools(config, &tools).unwrap();

    Setup {
        coordinator,
        output_dir,
        _temp: temp,
    }
}

fn files_in(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[tokio::test]
async fn test_tools_validate() {
    let setup = setup(FakeExtractor::default());
    setup.coordinator.transcoder().validate().await.unwrap();
}

#[tokio::test]
async fn test_buffered_job_with_real_processes() {
    let setup = setup(FakeExtractor::default());

    let result = setup
        .coordinator
        .submit_buffered(SOURCE, Identity::anonymous())
        .await
        .unwrap();

    assert_eq!(result.title, "Fake Title");
    assert_eq!(result.author, "Fake Uploader");
    assert_eq!(result.artifact.file_name, "Fake Title.mp3");
    assert_eq!(
        std::fs::read_to_string(&result.artifact.path).unwrap(),
        "fake-audio-bytes"
    );
    assert_eq!(result.artifact.size_bytes, "fake-audio-bytes".len() as u64);
    assert_eq!(
        files_in(&setup.output_dir),
        vec![format!("{}.mp3", result.job_id)]
    );
    assert_eq!(setup.coordinator.gate().occupancy(), 0);
}

#[tokio::test]
async fn test_probe_and_size() {
    let setup = setup(FakeExtractor::default());

    let metadata = setup.coordinator.probe(SOURCE).await.unwrap();
    assert_eq!(metadata.title, "Fake Title");
    assert_eq!(metadata.duration_secs, Some(212.0));

    let estimate = setup.coordinator.probe_size(SOURCE).await.unwrap();
    assert_eq!(estimate.size, "5.0 MB");
    assert_eq!(estimate.size_bytes, Some(5 * 1024 * 1024));
    assert_eq!(setup.coordinator.status().totals.submitted, 0);
}

#[tokio::test]
async fn test_size_not_available() {
    let setup = setup(FakeExtractor {
        filesize_approx: None,
        ..Default::default()
    });
    let estimate = setup.coordinator.probe_size(SOURCE).await.unwrap();
    assert_eq!(estimate.size, "Unknown size");
    assert_eq!(estimate.size_bytes, None);
}

#[tokio::test]
async fn test_extractor_failure_reports_stderr_and_cleans_up() {
    let setup = setup(FakeExtractor {
        failure: Some((1, "ERROR: [youtube] dQw4w9WgXcQ: Video unavailable".to_string())),
        ..Default::default()
    });

    let err = setup
        .coordinator
        .submit_buffered(SOURCE, Identity::anonymous())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Resolution(_)));
    assert_eq!(err.class(), ErrorClass::Transient);
    assert_eq!(
        err.tool_detail(),
        Some("ERROR: [youtube] dQw4w9WgXcQ: Video unavailable")
    );

    assert!(files_in(&setup.output_dir).is_empty());
    assert_eq!(setup.coordinator.gate().occupancy(), 0);
}

#[tokio::test]
async fn test_missing_extractor_is_internal() {
    let setup = setup_with(FakeExtractor::default(), |mut tools| {
        tools.extractor_path = "/nonexistent/yt-dlp".into();
        tools
    });

    let err = setup
        .coordinator
        .submit_buffered(SOURCE, Identity::anonymous())
        .await
        .unwrap_err();
    assert_eq!(err.class(), ErrorClass::Internal);
    assert_eq!(setup.coordinator.gate().occupancy(), 0);
}

#[tokio::test]
async fn test_streamed_job_through_pipe() {
    let setup = setup(FakeExtractor::default());

    let mut stream = setup
        .coordinator
        .submit_streamed(SOURCE, Identity::anonymous())
        .unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }

    assert_eq!(body, b"fake-audio-bytes");
    assert!(files_in(&setup.output_dir).is_empty());
    let status = setup.coordinator.status();
    assert_eq!(status.totals.stream_ended, 1);
    assert_eq!(status.admission.occupancy, 0);
}

#[tokio::test]
async fn test_streamed_disconnect_stops_processes() {
    let setup = setup(FakeExtractor {
        endless: true,
        ..Default::default()
    });

    let mut stream = setup
        .coordinator
        .submit_streamed(SOURCE, Identity::anonymous())
        .unwrap();
    stream.next().await.unwrap().unwrap();
    drop(stream);
    assert_eq!(setup.coordinator.status().totals.aborted, 1);

    // The slot frees up once both processes are reaped.
    tokio::time::timeout(Duration::from_secs(5), async {
        while setup.coordinator.gate().occupancy() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("slot was not released");

    tokio::time::timeout(
        Duration::from_secs(5),
        setup
            .coordinator
            .submit_streamed(SOURCE, Identity::anonymous())
            .unwrap()
            .next(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_streamed_extractor_failure_surfaces() {
    let setup = setup(FakeExtractor {
        failure: Some((1, "ERROR: Private video".to_string())),
        ..Default::default()
    });

    let mut stream = setup
        .coordinator
        .submit_streamed(SOURCE, Identity::anonymous())
        .unwrap();
    let mut error = None;
    while let Some(chunk) = stream.next().await {
        if let Err(e) = chunk {
            error = Some(e);
        }
    }

    let error = error.expect("expected a tool error");
    assert_eq!(error.tool_detail(), Some("ERROR: Private video"));
    assert_eq!(setup.coordinator.status().totals.failed, 1);
}
