use std::thread;

use crossbeam_channel::Receiver;

use crate::detection::domain::detector_options::DetectorOptions;
use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::model_resolver::ProgressFn;

use super::onnx_blazeface_detector::{DetectorInitError, OnnxBlazefaceDetector};

/// Messages from a background detector initialization.
pub enum DetectorLoadMessage {
    DownloadProgress(u64, u64),
    Ready(Box<dyn FaceDetector>),
    Failed(String),
}

impl std::fmt::Debug for DetectorLoadMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DownloadProgress(dl, total) => write!(f, "DownloadProgress({dl}, {total})"),
            Self::Ready(_) => write!(f, "Ready"),
            Self::Failed(msg) => write!(f, "Failed({msg})"),
        }
    }
}

/// Starts building the ONNX BlazeFace detector off the caller's thread.
///
/// Exactly one `Ready` or `Failed` message is sent, preceded by any number
/// of download progress updates.
pub fn spawn(options: DetectorOptions) -> Receiver<DetectorLoadMessage> {
    spawn_with(move |progress| {
        OnnxBlazefaceDetector::create(&options, Some(progress))
            .map(|d| Box::new(d) as Box<dyn FaceDetector>)
    })
}

pub fn spawn_with<F>(load: F) -> Receiver<DetectorLoadMessage>
where
    F: FnOnce(ProgressFn) -> Result<Box<dyn FaceDetector>, DetectorInitError> + Send + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded::<DetectorLoadMessage>();

    thread::spawn(move || {
        let tx_progress = tx.clone();
        let progress: ProgressFn = Box::new(move |downloaded, total| {
            let _ = tx_progress.send(DetectorLoadMessage::DownloadProgress(downloaded, total));
        });
        let message = match load(progress) {
            Ok(detector) => DetectorLoadMessage::Ready(detector),
            Err(e) => {
                log::error!("Face detector initialization failed: {e}");
                DetectorLoadMessage::Failed(e.to_string())
            }
        };
        let _ = tx.send(message);
    });

    rx
}
