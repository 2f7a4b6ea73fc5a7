use std::sync::Arc;
use std::time::Instant;

use crate::analysis::domain::face_analyser::FaceAnalyser;
use crate::shared::face::Face;
use crate::shared::frame::Frame;
use crate::swapping::domain::face_swapper::FaceSwapper;

/// Per-frame counters collected while processing.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub faces: usize,
    pub detect_ms: f64,
    pub swap_ms: f64,
}

/// Swaps the source identity onto the faces of one frame.
///
/// Cheap to share across worker threads: the analyser and swapper are
/// reference-counted handles to the lazily loaded models.
pub struct FrameProcessor {
    analyser: Arc<dyn FaceAnalyser>,
    swapper: Arc<dyn FaceSwapper>,
    many_faces: bool,
}

impl FrameProcessor {
    pub fn new(
        analyser: Arc<dyn FaceAnalyser>,
        swapper: Arc<dyn FaceSwapper>,
        many_faces: bool,
    ) -> Self {
        Self {
            analyser,
            swapper,
            many_faces,
        }
    }

    pub fn analyser(&self) -> &dyn FaceAnalyser {
        &*self.analyser
    }

    /// Swap `source` onto `target` with paste-back; without a target the frame
    /// comes back untouched.
    pub fn swap_face(
        &self,
        source: &Face,
        target: Option<&Face>,
        frame: Frame,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        match target {
            Some(target) => self.swapper.swap(&frame, target, source, true),
            None => Ok(frame),
        }
    }

    /// Swap the left-most face, or every face when `many_faces` is set.
    pub fn process_frame(
        &self,
        source: &Face,
        frame: Frame,
    ) -> Result<Frame, Box<dyn std::error::Error>> {
        self.process_frame_with_stats(source, frame)
            .map(|(frame, _)| frame)
    }

    pub fn process_frame_with_stats(
        &self,
        source: &Face,
        frame: Frame,
    ) -> Result<(Frame, FrameStats), Box<dyn std::error::Error>> {
        let mut stats = FrameStats::default();

        let t0 = Instant::now();
        let targets = if self.many_faces {
            self.analyser.many_faces(&frame)?
        } else {
            self.analyser.one_face(&frame)?.into_iter().collect()
        };
        stats.detect_ms = t0.elapsed().as_secs_f64() * 1000.0;
        stats.faces = targets.len();

        let t0 = Instant::now();
        let mut frame = frame;
        // Targets were all detected on the input frame; each swap builds on
        // the previous result.
        for target in &targets {
            frame = self.swap_face(source, Some(target), frame)?;
        }
        stats.swap_ms = t0.elapsed().as_secs_f64() * 1000.0;

        Ok((frame, stats))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::shared::face::{BoundingBox, FaceLandmarks};
    use std::sync::Mutex;

    pub(crate) fn face_at(x1: f64) -> Face {
        Face::new(
            BoundingBox::new(x1, 0.0, x1 + 2.0, 2.0),
            0.9,
            FaceLandmarks::new([(x1 + 1.0, 1.0); 5]),
        )
    }

    pub(crate) fn source_face() -> Face {
        face_at(0.0).with_embedding(vec![1.0, 0.0])
    }

    /// Returns a fixed set of faces for every frame.
    pub(crate) struct FixedAnalyser(pub Vec<Face>);

    impl FaceAnalyser for FixedAnalyser {
        fn many_faces(&self, _frame: &Frame) -> Result<Vec<Face>, Box<dyn std::error::Error>> {
            Ok(self.0.clone())
        }
    }

    /// Writes the target's `x1` into the pixel at `(x1, 0)` and records targets.
    #[derive(Default)]
    pub(crate) struct MarkingSwapper {
        pub targets: Mutex<Vec<f64>>,
    }

    impl FaceSwapper for MarkingSwapper {
        fn swap(
            &self,
            frame: &Frame,
            target: &Face,
            source: &Face,
            paste_back: bool,
        ) -> Result<Frame, Box<dyn std::error::Error>> {
            assert!(paste_back);
            assert!(source.embedding.is_some());
            self.targets.lock().unwrap().push(target.bbox.x1);
            let mut out = frame.clone();
            let offset = target.bbox.x1 as usize * out.channels() as usize;
            out.data_mut()[offset] = 1 + target.bbox.x1 as u8;
            Ok(out)
        }
    }

    fn textured(width: u32, height: u32) -> Frame {
        let data = (0..width * height * 3).map(|i| (i % 97) as u8 + 100).collect();
        Frame::new(data, width, height, 3, 4)
    }

    fn processor(faces: Vec<Face>, many_faces: bool) -> (FrameProcessor, Arc<MarkingSwapper>) {
        let swapper = Arc::new(MarkingSwapper::default());
        let processor =
            FrameProcessor::new(Arc::new(FixedAnalyser(faces)), swapper.clone(), many_faces);
        (processor, swapper)
    }

    #[test]
    fn test_no_face_leaves_frame_identical() {
        let (processor, swapper) = processor(Vec::new(), false);
        let frame = textured(16, 8);

        let out = processor.process_frame(&source_face(), frame.clone()).unwrap();

        assert_eq!(out, frame);
        assert!(swapper.targets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_no_face_with_many_faces_leaves_frame_identical() {
        let (processor, _) = processor(Vec::new(), true);
        let frame = textured(16, 8);
        assert_eq!(processor.process_frame(&source_face(), frame.clone()).unwrap(), frame);
    }

    #[test]
    fn test_swap_face_without_target_returns_frame() {
        let (processor, swapper) = processor(Vec::new(), false);
        let frame = textured(4, 4);

        let out = processor.swap_face(&source_face(), None, frame.clone()).unwrap();

        assert_eq!(out, frame);
        assert!(swapper.targets.lock().unwrap().is_empty());
    }

    #[test]
    fn test_single_mode_swaps_only_leftmost_face() {
        let (processor, swapper) = processor(vec![face_at(9.0), face_at(3.0), face_at(6.0)], false);

        let (out, stats) = processor
            .process_frame_with_stats(&source_face(), Frame::blank(16, 4, 0))
            .unwrap();

        assert_eq!(*swapper.targets.lock().unwrap(), vec![3.0]);
        assert_eq!(stats.faces, 1);
        assert_eq!(out.data()[9], 4);
        assert_eq!(out.data()[27], 0);
    }

    #[test]
    fn test_many_mode_swaps_every_face_cumulatively() {
        let (processor, swapper) = processor(vec![face_at(9.0), face_at(3.0)], true);

        let (out, stats) = processor
            .process_frame_with_stats(&source_face(), Frame::blank(16, 4, 0))
            .unwrap();

        assert_eq!(*swapper.targets.lock().unwrap(), vec![9.0, 3.0]);
        assert_eq!(stats.faces, 2);
        // Both swaps survive in the final frame.
        assert_eq!(out.data()[27], 10);
        assert_eq!(out.data()[9], 4);
    }

    #[test]
    fn test_swap_error_propagates() {
        struct FailingSwapper;
        impl FaceSwapper for FailingSwapper {
            fn swap(
                &self,
                _frame: &Frame,
                _target: &Face,
                _source: &Face,
                _paste_back: bool,
            ) -> Result<Frame, Box<dyn std::error::Error>> {
                Err("session run failed".into())
            }
        }

        let processor = FrameProcessor::new(
            Arc::new(FixedAnalyser(vec![face_at(1.0)])),
            Arc::new(FailingSwapper),
            false,
        );
        let err = processor
            .process_frame(&source_face(), Frame::blank(4, 4, 0))
            .unwrap_err();
        assert_eq!(err.to_string(), "session run failed");
    }
}
