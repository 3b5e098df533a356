use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::{
    batch::events::{BatchEvent, BatchReport, EventSink, ItemFailure},
    compose::{Compositor, ImageCompositor},
    config::{Config, WatermarkConfig},
    error::{Result, WatermarkError},
    logo::Logo,
    media::{self, MediaFile, MediaKind},
    output::{ensure_output_dir, OutputPathAllocator},
    video::VideoCompositor,
};

/// Shared flag asking a running batch to stop before its next file
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sequential watermarking of a list of files.
///
/// A pipeline owns a snapshot of the watermark settings and the logo taken
/// at construction, so later edits by the caller never affect a batch that
/// is already running. `run` and `spawn` consume the pipeline; start a new
/// one for the next batch.
pub struct BatchPipeline {
    config: WatermarkConfig,
    logo: Arc<Logo>,
    output_dir: PathBuf,
    image: Box<dyn Compositor>,
    video: Box<dyn Compositor>,
    allocator: OutputPathAllocator,
    cancel: CancelToken,
}

impl BatchPipeline {
    /// Create a pipeline writing into `output_dir`, creating it if needed
    pub fn new<P: Into<PathBuf>>(
        config: WatermarkConfig,
        logo: Arc<Logo>,
        output_dir: P,
        image: Box<dyn Compositor>,
        video: Box<dyn Compositor>,
    ) -> Result<Self> {
        config.validate()?;

        let output_dir = output_dir.into();
        ensure_output_dir(&output_dir)?;

        Ok(Self {
            config,
            logo,
            output_dir,
            image,
            video,
            allocator: OutputPathAllocator::new(),
            cancel: CancelToken::new(),
        })
    }

    /// Pipeline with the built-in image and video compositors
    pub fn from_config(config: &Config, logo: Arc<Logo>) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.watermark,
            logo,
            config.output.directory.clone(),
            Box::new(ImageCompositor::new(config.output.jpeg_quality)),
            Box::new(VideoCompositor::new(config.video.clone())),
        )
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Token that stops this pipeline between files
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Enumerate `paths` and process every supported file on the calling thread
    pub fn run<P, S>(self, paths: &[P], sink: &S) -> BatchReport
    where
        P: AsRef<Path>,
        S: EventSink + ?Sized,
    {
        let files = media::enumerate(paths);
        self.run_files(files, sink)
    }

    /// Process already enumerated files in order.
    ///
    /// Emits `Progress` before each file, `ItemFailed` for each failure, and
    /// exactly one terminal event: `NothingToDo` for an empty list, otherwise
    /// `Completed` with the number of files attempted. An error that is not
    /// about the current file (the output folder vanished, say) is reported
    /// for that file and then stops the batch; see [`BatchReport::aborted`].
    pub fn run_files<S>(self, files: Vec<MediaFile>, sink: &S) -> BatchReport
    where
        S: EventSink + ?Sized,
    {
        let mut report = BatchReport::default();

        if files.is_empty() {
            info!("No supported media files to process");
            sink.emit(BatchEvent::NothingToDo);
            return report;
        }

        let total = files.len();
        let started = Instant::now();
        info!("Starting batch of {} files into {}", total, self.output_dir.display());

        for (i, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                let remaining = total - i;
                info!("Batch cancelled with {} files remaining", remaining);
                report.cancelled = true;
                sink.emit(BatchEvent::Cancelled { remaining });
                break;
            }

            let name = file.display_name();
            sink.emit(BatchEvent::progress(i + 1, total, &name));
            report.attempted += 1;

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.process(file)))
                .unwrap_or_else(|payload| Err(WatermarkError::generic(panic_message(payload.as_ref()))));

            match outcome {
                Ok(written) => {
                    debug!("{} -> {}", file.path.display(), written.display());
                    report.succeeded.push((file.path.clone(), written));
                }
                Err(e) => {
                    warn!("Failed to watermark {}: {}", file.path.display(), e);
                    let error = e.user_message();
                    sink.emit(BatchEvent::ItemFailed {
                        file_name: name,
                        error: error.clone(),
                    });
                    report.failed.push(ItemFailure {
                        path: file.path.clone(),
                        error: error.clone(),
                    });

                    if !e.is_per_item() {
                        error!("Stopping batch after {}: {}", file.path.display(), e);
                        report.aborted = Some(error);
                        break;
                    }
                }
            }
        }

        info!(
            "Batch finished: {} attempted, {} succeeded, {} failed in {:.1}s",
            report.attempted,
            report.succeeded.len(),
            report.failed.len(),
            started.elapsed().as_secs_f64()
        );
        sink.emit(BatchEvent::Completed { total: report.attempted });
        report
    }

    /// Run the batch on a blocking worker thread.
    ///
    /// Must be called from within a tokio runtime. Events arrive on the
    /// returned handle in order; the final report comes from
    /// [`BatchHandle::wait`].
    pub fn spawn(self, paths: Vec<PathBuf>) -> BatchHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = self.cancel_token();

        let join = tokio::task::spawn_blocking(move || self.run(&paths, &tx));

        BatchHandle {
            events: rx,
            cancel,
            join,
        }
    }

    fn process(&self, file: &MediaFile) -> Result<PathBuf> {
        let compositor: &dyn Compositor = match file.kind {
            MediaKind::Image => self.image.as_ref(),
            MediaKind::Video => self.video.as_ref(),
        };

        let desired = self.output_dir.join(compositor.output_file_name(&file.path));
        let output = self.allocator.allocate(&desired);
        debug!("{} compositor: {} -> {}", compositor.name(), file.path.display(), output.display());

        compositor.composite(&file.path, &output, &self.logo, &self.config)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("compositor panicked: {}", detail)
}

/// A batch running in the background
pub struct BatchHandle {
    events: UnboundedReceiver<BatchEvent>,
    cancel: CancelToken,
    join: JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// Next event, or `None` once the worker has finished and all events were read
    pub async fn next_event(&mut self) -> Option<BatchEvent> {
        self.events.recv().await
    }

    /// Ask the worker to stop before its next file
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the worker and return its report
    pub async fn wait(self) -> Result<BatchReport> {
        self.join
            .await
            .map_err(|e| WatermarkError::generic(format!("batch worker failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::events::EventLog;
    use crate::error::{FilesystemError, ImageError};
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::ffi::OsString;
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Copies the input to the output. Names containing "bad" fail as corrupt
    /// images, "gone" as a vanished output folder, and "crash" panic.
    struct CopyCompositor {
        seen: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl Compositor for CopyCompositor {
        fn name(&self) -> &str {
            "copy"
        }

        fn composite(&self, input: &Path, output: &Path, _: &Logo, _: &WatermarkConfig) -> Result<PathBuf> {
            self.seen.lock().unwrap().push(input.to_path_buf());
            let name = input.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            if name.contains("bad") {
                return Err(ImageError::DecodeFailed {
                    path: input.display().to_string(),
                    reason: "corrupt".to_string(),
                }
                .into());
            }
            if name.contains("gone") {
                return Err(FilesystemError::OutputDirUnavailable {
                    path: output.display().to_string(),
                    reason: "removed while running".to_string(),
                }
                .into());
            }
            if name.contains("crash") {
                panic!("decoder state corrupted");
            }
            std::fs::copy(input, output)?;
            Ok(output.to_path_buf())
        }
    }

    /// Cancels the batch as a side effect of processing its first file
    struct CancellingCompositor {
        token: Arc<Mutex<Option<CancelToken>>>,
    }

    impl Compositor for CancellingCompositor {
        fn name(&self) -> &str {
            "cancelling"
        }

        fn output_file_name(&self, _: &Path) -> OsString {
            OsString::from("same.out")
        }

        fn composite(&self, _: &Path, output: &Path, _: &Logo, _: &WatermarkConfig) -> Result<PathBuf> {
            if let Some(token) = self.token.lock().unwrap().as_ref() {
                token.cancel();
            }
            std::fs::write(output, b"x")?;
            Ok(output.to_path_buf())
        }
    }

    fn logo() -> Arc<Logo> {
        Arc::new(Logo::from_image(DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            4,
            4,
            Rgba([255, 255, 255, 255]),
        ))))
    }

    fn copy_pipeline(output: &Path) -> (BatchPipeline, Arc<Mutex<Vec<PathBuf>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let pipeline = BatchPipeline::new(
            WatermarkConfig::default(),
            logo(),
            output,
            Box::new(CopyCompositor { seen: seen.clone() }),
            Box::new(CopyCompositor { seen: seen.clone() }),
        )
        .unwrap();
        (pipeline, seen)
    }

    fn write_inputs(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_empty_batch_reports_nothing_to_do() {
        let dir = tempdir().unwrap();
        let (pipeline, _) = copy_pipeline(&dir.path().join("out"));
        let log = EventLog::new();

        let report = pipeline.run::<PathBuf, _>(&[], &log);
        assert_eq!(log.into_events(), vec![BatchEvent::NothingToDo]);
        assert_eq!(report.attempted, 0);
        assert!(report.is_clean());
    }

    #[test]
    fn test_failure_is_isolated_to_one_item() {
        let dir = tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["a.png", "b_bad.jpg", "c.mp4", "d.png"]);
        let (pipeline, seen) = copy_pipeline(&dir.path().join("out"));
        let log = EventLog::new();

        let report = pipeline.run(&inputs, &log);
        let events = log.into_events();

        let progress: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                BatchEvent::Progress { index, total, .. } => {
                    assert_eq!(*total, 4);
                    Some(*index)
                }
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2, 3, 4]);

        let failures: Vec<&BatchEvent> = events
            .iter()
            .filter(|e| matches!(e, BatchEvent::ItemFailed { .. }))
            .collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], BatchEvent::ItemFailed { file_name, .. } if file_name == "b_bad.jpg"));

        assert_eq!(events.last(), Some(&BatchEvent::Completed { total: 4 }));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        assert_eq!(*seen.lock().unwrap(), inputs);
        assert_eq!(report.attempted, 4);
        assert_eq!(report.succeeded.len(), 3);
        assert_eq!(report.failed[0].path, inputs[1]);
    }

    #[test]
    fn test_progress_precedes_failure_for_same_item() {
        let dir = tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["only_bad.png"]);
        let (pipeline, _) = copy_pipeline(&dir.path().join("out"));
        let log = EventLog::new();

        pipeline.run(&inputs, &log);
        let events = log.into_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], BatchEvent::progress(1, 1, "only_bad.png"));
        assert!(matches!(events[1], BatchEvent::ItemFailed { .. }));
        assert_eq!(events[2], BatchEvent::Completed { total: 1 });
    }

    #[test]
    fn test_output_folder_failure_stops_batch() {
        let dir = tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["a.png", "b_gone.png", "c.png"]);
        let (pipeline, seen) = copy_pipeline(&dir.path().join("out"));
        let log = EventLog::new();

        let report = pipeline.run(&inputs, &log);
        let events = log.into_events();

        assert_eq!(*seen.lock().unwrap(), inputs[..2].to_vec());
        assert_eq!(events.len(), 4);
        assert!(matches!(&events[2], BatchEvent::ItemFailed { file_name, .. } if file_name == "b_gone.png"));
        assert_eq!(events[3], BatchEvent::Completed { total: 2 });

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded.len(), 1);
        assert!(report.aborted.is_some());
        assert!(!report.is_clean());
    }

    #[test]
    fn test_panicking_compositor_is_an_item_failure() {
        let dir = tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["a_crash.png", "b.png"]);
        let (pipeline, seen) = copy_pipeline(&dir.path().join("out"));
        let log = EventLog::new();

        let report = pipeline.run(&inputs, &log);
        let events = log.into_events();

        assert_eq!(*seen.lock().unwrap(), inputs);
        assert!(matches!(
            &events[1],
            BatchEvent::ItemFailed { file_name, error }
                if file_name == "a_crash.png" && error.contains("decoder state corrupted")
        ));
        assert_eq!(events.last(), Some(&BatchEvent::Completed { total: 2 }));
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
        assert!(report.aborted.is_none());
    }

    #[tokio::test]
    async fn test_spawned_batch_completes_after_panic() {
        let dir = tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["crash.png"]);
        let (pipeline, _) = copy_pipeline(&dir.path().join("out"));

        let mut handle = pipeline.spawn(inputs);
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        let report = handle.wait().await.unwrap();

        assert_eq!(events.last(), Some(&BatchEvent::Completed { total: 1 }));
        assert_eq!(report.failed.len(), 1);
    }

    #[test]
    fn test_name_collisions_get_suffixes() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("one");
        let second = dir.path().join("two");
        std::fs::create_dir_all(&first).unwrap();
        std::fs::create_dir_all(&second).unwrap();
        std::fs::write(first.join("pic.png"), b"1").unwrap();
        std::fs::write(second.join("pic.png"), b"2").unwrap();

        let out = dir.path().join("out");
        let (pipeline, _) = copy_pipeline(&out);
        let report = pipeline.run(&[first, second], &EventLog::new());

        let outputs: Vec<PathBuf> = report.succeeded.iter().map(|(_, o)| o.clone()).collect();
        assert_eq!(outputs, vec![out.join("pic.png"), out.join("pic_watermarked_1.png")]);
        assert_eq!(std::fs::read(out.join("pic_watermarked_1.png")).unwrap(), b"2");
    }

    #[test]
    fn test_cancellation_between_items() {
        let dir = tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["1.png", "2.png", "3.png"]);
        let token_slot = Arc::new(Mutex::new(None));

        let pipeline = BatchPipeline::new(
            WatermarkConfig::default(),
            logo(),
            dir.path().join("out"),
            Box::new(CancellingCompositor { token: token_slot.clone() }),
            Box::new(CancellingCompositor { token: token_slot.clone() }),
        )
        .unwrap();
        *token_slot.lock().unwrap() = Some(pipeline.cancel_token());

        let log = EventLog::new();
        let report = pipeline.run(&inputs, &log);

        assert_eq!(
            log.into_events(),
            vec![
                BatchEvent::progress(1, 3, "1.png"),
                BatchEvent::Cancelled { remaining: 2 },
                BatchEvent::Completed { total: 1 },
            ]
        );
        assert!(report.cancelled);
        assert_eq!(report.attempted, 1);
    }

    #[test]
    fn test_unusable_output_dir_fails_construction() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let result = BatchPipeline::new(
            WatermarkConfig::default(),
            logo(),
            &blocker,
            Box::new(ImageCompositor::default()),
            Box::new(ImageCompositor::default()),
        );
        assert!(matches!(result, Err(WatermarkError::Filesystem(_))));
    }

    #[test]
    fn test_invalid_settings_fail_construction() {
        let dir = tempdir().unwrap();
        let config = WatermarkConfig { scale: 0.0, ..WatermarkConfig::default() };
        let result = BatchPipeline::new(
            config,
            logo(),
            dir.path(),
            Box::new(ImageCompositor::default()),
            Box::new(ImageCompositor::default()),
        );
        assert!(matches!(result, Err(WatermarkError::Config(_))));
    }

    #[tokio::test]
    async fn test_spawned_batch_streams_events() {
        let dir = tempdir().unwrap();
        let inputs = write_inputs(dir.path(), &["x.png", "y_bad.png", "notes.txt"]);
        let (pipeline, _) = copy_pipeline(&dir.path().join("out"));

        let mut handle = pipeline.spawn(inputs);
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        let report = handle.wait().await.unwrap();

        assert_eq!(events.first(), Some(&BatchEvent::progress(1, 2, "x.png")));
        assert_eq!(events.last(), Some(&BatchEvent::Completed { total: 2 }));
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.failed.len(), 1);
    }
}
