use std::path::Path;
use std::time::Instant;

use crate::frames::domain::image_reader::ImageReader;
use crate::frames::domain::image_writer::ImageWriter;
use crate::pipeline::frame_processor::FrameProcessor;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::source_face::extract_source_face;

/// Single-image swap: source face → target image → output file.
pub struct SwapImageUseCase {
    reader: Box<dyn ImageReader>,
    writer: Box<dyn ImageWriter>,
    processor: FrameProcessor,
}

impl SwapImageUseCase {
    pub fn new(
        reader: Box<dyn ImageReader>,
        writer: Box<dyn ImageWriter>,
        processor: FrameProcessor,
    ) -> Self {
        Self {
            reader,
            writer,
            processor,
        }
    }

    pub fn execute(
        &self,
        source_path: &Path,
        target_path: &Path,
        output_path: &Path,
        logger: &mut dyn PipelineLogger,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let source =
            extract_source_face(&*self.reader, self.processor.analyser(), source_path)?;

        let t0 = Instant::now();
        let target = self.reader.read(target_path, 0)?;
        logger.timing("read", elapsed_ms(t0));

        let (result, stats) = self.processor.process_frame_with_stats(&source, target)?;
        logger.timing("detect", stats.detect_ms);
        logger.timing("swap", stats.swap_ms);
        logger.metric("faces", stats.faces as f64);
        if stats.faces == 0 {
            log::warn!("No face found in {}, writing it unchanged", target_path.display());
        }

        let t0 = Instant::now();
        self.writer.write(output_path, &result)?;
        logger.timing("write", elapsed_ms(t0));
        logger.progress(1, 1);
        Ok(())
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
