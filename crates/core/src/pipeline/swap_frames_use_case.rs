use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::frames::domain::image_reader::ImageReader;
use crate::frames::domain::image_writer::ImageWriter;
use crate::pipeline::frame_executor::{FrameExecutor, SendError};
use crate::pipeline::frame_processor::FrameProcessor;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::source_face::extract_source_face;
use crate::pipeline::swap_image_use_case::elapsed_ms;
use crate::shared::face::Face;

/// Swaps faces across a sequence of extracted video frames, overwriting each
/// frame file in place.
///
/// The source face is extracted once up front. Frames are independent, so the
/// executor may run them in any order and in parallel.
pub struct SwapFramesUseCase {
    reader: Box<dyn ImageReader>,
    writer: Box<dyn ImageWriter>,
    processor: FrameProcessor,
    executor: Box<dyn FrameExecutor>,
}

impl SwapFramesUseCase {
    pub fn new(
        reader: Box<dyn ImageReader>,
        writer: Box<dyn ImageWriter>,
        processor: FrameProcessor,
        executor: Box<dyn FrameExecutor>,
    ) -> Self {
        Self {
            reader,
            writer,
            processor,
            executor,
        }
    }

    pub fn execute(
        &self,
        source_path: &Path,
        frame_paths: &[PathBuf],
        logger: &mut dyn PipelineLogger,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let source =
            extract_source_face(&*self.reader, self.processor.analyser(), source_path)?;

        let total = frame_paths.len();
        logger.info(&format!("Swapping faces in {total} frames"));

        let done = AtomicUsize::new(0);
        let logger = Mutex::new(logger);
        let task = |position: usize, path: &Path| -> Result<(), SendError> {
            self.process_path(&source, position, path, &logger, &done, total)
                .map_err(|e| -> SendError { format!("{}: {e}", path.display()).into() })
        };

        self.executor
            .execute(frame_paths, &task)
            .map_err(|e| -> Box<dyn std::error::Error> { e })
    }

    fn process_path(
        &self,
        source: &Face,
        position: usize,
        path: &Path,
        logger: &Mutex<&mut dyn PipelineLogger>,
        done: &AtomicUsize,
        total: usize,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let t0 = Instant::now();
        let frame = self.reader.read(path, position)?;
        let read_ms = elapsed_ms(t0);

        let (frame, stats) = self.processor.process_frame_with_stats(source, frame)?;

        let t0 = Instant::now();
        self.writer.write(path, &frame)?;
        let write_ms = elapsed_ms(t0);

        let current = done.fetch_add(1, Ordering::SeqCst) + 1;
        let mut logger = lock(logger);
        logger.timing("read", read_ms);
        logger.timing("detect", stats.detect_ms);
        logger.timing("swap", stats.swap_ms);
        logger.timing("write", write_ms);
        logger.metric("faces", stats.faces as f64);
        logger.progress(current, total);
        Ok(())
    }
}

fn lock<'a, 'b>(
    logger: &'a Mutex<&'b mut dyn PipelineLogger>,
) -> MutexGuard<'a, &'b mut dyn PipelineLogger> {
    logger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::domain::face_analyser::FaceAnalyser;
    use crate::frames::infrastructure::image_file_reader::ImageFileReader;
    use crate::frames::infrastructure::image_file_writer::ImageFileWriter;
    use crate::pipeline::frame_processor::tests::{face_at, FixedAnalyser, MarkingSwapper};
    use crate::pipeline::infrastructure::sequential_frame_executor::SequentialFrameExecutor;
    use crate::pipeline::infrastructure::threaded_frame_executor::ThreadedFrameExecutor;
    use crate::pipeline::pipeline_logger::{NullPipelineLogger, StdoutPipelineLogger};
    use crate::shared::error::SwapError;
    use crate::shared::frame::Frame;
    use rstest::rstest;
    use std::sync::Arc;

    struct StubReader {
        reads: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl ImageReader for StubReader {
        fn read(&self, path: &Path, index: usize) -> Result<Frame, Box<dyn std::error::Error>> {
            self.reads.lock().unwrap().push(path.to_path_buf());
            if path.to_string_lossy().contains("corrupt") {
                return Err("invalid PNG signature".into());
            }
            Ok(Frame::blank(16, 4, index))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingWriter {
        written: Arc<Mutex<Vec<(PathBuf, Frame)>>>,
    }

    impl ImageWriter for RecordingWriter {
        fn write(&self, path: &Path, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
            self.written
                .lock()
                .unwrap()
                .push((path.to_path_buf(), frame.clone()));
            Ok(())
        }
    }

    struct Fixture {
        use_case: SwapFramesUseCase,
        reads: Arc<Mutex<Vec<PathBuf>>>,
        writer: RecordingWriter,
    }

    fn fixture(executor: Box<dyn FrameExecutor>, faces: Vec<Face>) -> Fixture {
        let reads = Arc::new(Mutex::new(Vec::new()));
        let writer = RecordingWriter::default();
        let analyser: Arc<dyn FaceAnalyser> = Arc::new(FixedAnalyser(faces));
        let use_case = SwapFramesUseCase::new(
            Box::new(StubReader {
                reads: reads.clone(),
            }),
            Box::new(writer.clone()),
            FrameProcessor::new(analyser, Arc::new(MarkingSwapper::default()), false),
            executor,
        );
        Fixture {
            use_case,
            reads,
            writer,
        }
    }

    fn frame_paths(n: usize) -> Vec<PathBuf> {
        (1..=n)
            .map(|i| PathBuf::from(format!("/tmp/frames/{i:04}.png")))
            .collect()
    }

    fn executor(threads: usize) -> Box<dyn FrameExecutor> {
        if threads <= 1 {
            Box::new(SequentialFrameExecutor::new())
        } else {
            Box::new(ThreadedFrameExecutor::new(threads))
        }
    }

    #[rstest]
    #[case(1, 7)]
    #[case(4, 7)]
    #[case(3, 40)]
    fn test_n_paths_give_n_writes_in_place(#[case] threads: usize, #[case] n: usize) {
        let f = fixture(executor(threads), vec![face_at(1.0).with_embedding(vec![1.0])]);
        let paths = frame_paths(n);

        f.use_case
            .execute(Path::new("source.jpg"), &paths, &mut NullPipelineLogger)
            .unwrap();

        let written = f.writer.written.lock().unwrap();
        assert_eq!(written.len(), n);
        let mut written_paths: Vec<PathBuf> = written.iter().map(|(p, _)| p.clone()).collect();
        written_paths.sort();
        assert_eq!(written_paths, paths);
        // Each frame was swapped at the stub face position.
        assert!(written.iter().all(|(_, frame)| frame.data()[3] == 2));
    }

    #[test]
    fn test_source_read_once_then_each_frame_once() {
        let f = fixture(executor(1), vec![face_at(1.0).with_embedding(vec![1.0])]);
        let paths = frame_paths(3);

        f.use_case
            .execute(Path::new("me.png"), &paths, &mut NullPipelineLogger)
            .unwrap();

        let reads = f.reads.lock().unwrap();
        assert_eq!(reads.len(), 4);
        assert_eq!(reads[0], PathBuf::from("me.png"));
        assert_eq!(&reads[1..], paths.as_slice());
    }

    #[test]
    fn test_frame_index_follows_position() {
        let f = fixture(executor(1), vec![face_at(1.0).with_embedding(vec![1.0])]);

        f.use_case
            .execute(Path::new("me.png"), &frame_paths(3), &mut NullPipelineLogger)
            .unwrap();

        let indices: Vec<usize> = f
            .writer
            .written
            .lock()
            .unwrap()
            .iter()
            .map(|(_, frame)| frame.index())
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_progress_and_timings_reported_per_frame() {
        let f = fixture(executor(2), vec![face_at(1.0).with_embedding(vec![1.0])]);
        let mut logger = StdoutPipelineLogger::new(1);

        f.use_case
            .execute(Path::new("me.png"), &frame_paths(5), &mut logger)
            .unwrap();

        for stage in ["read", "detect", "swap", "write"] {
            assert_eq!(logger.timings_for(stage).unwrap().len(), 5, "{stage}");
        }
        assert_eq!(logger.metrics_for("faces").unwrap(), &[1.0; 5]);
    }

    #[test]
    fn test_missing_source_face_writes_nothing() {
        let f = fixture(executor(4), Vec::new());

        let err = f
            .use_case
            .execute(Path::new("me.png"), &frame_paths(5), &mut NullPipelineLogger)
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<SwapError>(),
            Some(SwapError::NoSourceFace(_))
        ));
        assert!(f.writer.written.lock().unwrap().is_empty());
        assert_eq!(f.reads.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_frame_error_names_the_frame() {
        let f = fixture(executor(1), vec![face_at(1.0).with_embedding(vec![1.0])]);
        let mut paths = frame_paths(3);
        paths[1] = PathBuf::from("/tmp/frames/corrupt.png");

        let err = f
            .use_case
            .execute(Path::new("me.png"), &paths, &mut NullPipelineLogger)
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "/tmp/frames/corrupt.png: invalid PNG signature"
        );
        assert_eq!(f.writer.written.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_sequence_only_reads_source() {
        let f = fixture(executor(4), vec![face_at(1.0).with_embedding(vec![1.0])]);

        f.use_case
            .execute(Path::new("me.png"), &[], &mut NullPipelineLogger)
            .unwrap();

        assert!(f.writer.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_frames_on_disk_are_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.png");
        image::RgbImage::from_pixel(16, 4, image::Rgb([9, 9, 9]))
            .save(&source)
            .unwrap();
        let paths: Vec<PathBuf> = (1..=3)
            .map(|i| {
                let path = dir.path().join(format!("{i:04}.png"));
                image::RgbImage::new(16, 4).save(&path).unwrap();
                path
            })
            .collect();

        let analyser: Arc<dyn FaceAnalyser> =
            Arc::new(FixedAnalyser(vec![face_at(1.0).with_embedding(vec![1.0])]));
        let use_case = SwapFramesUseCase::new(
            Box::new(ImageFileReader::new()),
            Box::new(ImageFileWriter::new()),
            FrameProcessor::new(analyser, Arc::new(MarkingSwapper::default()), false),
            Box::new(ThreadedFrameExecutor::new(2)),
        );

        use_case
            .execute(&source, &paths, &mut NullPipelineLogger)
            .unwrap();

        for path in &paths {
            let img = image::open(path).unwrap().to_rgb8();
            assert_eq!(img.get_pixel(1, 0).0, [2, 0, 0]);
            assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        }
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 4);
    }
}
