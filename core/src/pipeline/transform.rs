use crate::pipeline::context::{BoundedQueue, PipelineContext, SpectralFrame};
use crate::pipeline::frame::RawFrame;
use crate::pipeline::task::{StopSignal, WorkerHandle};
use crate::prelude::{DspError, OutputMode, PipelineError, SpectralOutput};
use crate::processing::{range_angle, range_doppler, range_profile, suggest_padding};
use crate::telemetry::LogManager;
use log::{error, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The three magnitude views produced from one raw frame.
#[derive(Debug, Clone)]
pub struct FrameResults {
    pub range_profile: SpectralFrame,
    pub range_doppler: SpectralFrame,
    pub range_angle: SpectralFrame,
}

/// Pulls raw frames, runs the spectral transforms and publishes the results.
pub struct FrameTransformer {
    context: Arc<PipelineContext>,
    worker: Option<WorkerHandle>,
}

impl FrameTransformer {
    pub fn new(context: Arc<PipelineContext>) -> Self {
        Self {
            context,
            worker: None,
        }
    }

    pub fn start(&mut self) -> Result<(), PipelineError> {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning("frame transformer"));
        }
        let context = Arc::clone(&self.context);
        self.worker = Some(WorkerHandle::spawn("frame-transformer", move |stop| {
            transform_loop(&context, &stop)
        })?);
        Ok(())
    }

    /// Changes the receiver used for display; ignored unless it names a configured receiver.
    pub fn set_channel(&self, channel: usize) -> bool {
        self.context.set_channel(channel)
    }

    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }

    pub fn request_stop(&self) {
        if let Some(worker) = &self.worker {
            worker.request_stop();
        }
    }

    pub fn join(&mut self, deadline: Duration) -> bool {
        match self.worker.as_mut() {
            Some(worker) => worker.join(deadline),
            None => true,
        }
    }
}

fn transform_loop(context: &PipelineContext, stop: &StopSignal) {
    let logger = LogManager::new("frame-transformer");
    let mut processed = 0u64;
    logger.record("waiting for frames");

    while !stop.is_requested() {
        let Some(frame) = context.raw_frames.take(context.settings().queue_get_timeout) else {
            continue;
        };
        match process_frame(context, frame) {
            Ok(results) => {
                processed += 1;
                context.metrics().record_frame_transformed();
                publish_results(context, results);
                logger.progress(processed);
            }
            Err(err) => {
                context.metrics().record_transform_error();
                error!("Error in frame processing: {}", err);
            }
        }
    }
    logger.record(&format!("stopped after {} frames", processed));
}

/// Runs [`transform_frame`], turning a panic inside the transforms into a frame error.
pub fn process_frame(
    context: &PipelineContext,
    frame: RawFrame,
) -> Result<FrameResults, PipelineError> {
    let sequence = frame.sequence;
    panic::catch_unwind(AssertUnwindSafe(|| transform_frame(context, &frame))).unwrap_or_else(
        |_| {
            Err(PipelineError::Transform {
                sequence,
                source: DspError::Transform("transform panicked".to_string()),
            })
        },
    )
}

/// Reshapes a raw frame and computes its range, range-doppler and range-angle magnitudes.
pub fn transform_frame(
    context: &PipelineContext,
    frame: &RawFrame,
) -> Result<FrameResults, PipelineError> {
    let sequence = frame.sequence;
    let wrap = |source: DspError| PipelineError::Transform { sequence, source };

    let cube = context.layout().to_cube(frame).map_err(wrap)?;
    let (samples, antennas, chirps) = cube.dim();
    let padding = suggest_padding([samples, antennas, chirps]);
    let channel = context.selected_channel();

    let spectral = |output: SpectralOutput| -> Result<SpectralFrame, PipelineError> {
        let data = output.into_magnitude().ok_or_else(|| {
            wrap(DspError::Transform("magnitude output missing".to_string()))
        })?;
        Ok(SpectralFrame {
            sequence,
            channel,
            padding,
            data,
        })
    };
    let mode = OutputMode::Magnitude;
    let profile = range_profile(&cube, mode, Some(padding)).map_err(wrap)?;
    let doppler = range_doppler(&cube, mode, Some(padding)).map_err(wrap)?;
    let angle = range_angle(&cube, mode, Some(padding)).map_err(wrap)?;

    Ok(FrameResults {
        range_profile: spectral(profile)?,
        range_doppler: spectral(doppler)?,
        range_angle: spectral(angle)?,
    })
}

/// Publishes each result without blocking, then waits on whichever queues were full,
/// sharing a single put-timeout deadline between them.
pub fn publish_results(context: &PipelineContext, results: FrameResults) -> usize {
    let outputs: [(&BoundedQueue<SpectralFrame>, SpectralFrame); 3] = [
        (&context.range_profiles, results.range_profile),
        (&context.range_doppler, results.range_doppler),
        (&context.range_angle, results.range_angle),
    ];
    let mut pending = Vec::new();
    for (queue, frame) in outputs {
        if let Err(frame) = queue.try_offer(frame) {
            pending.push((queue, frame));
        }
    }

    let deadline = Instant::now() + context.settings().queue_put_timeout;
    let mut dropped = 0;
    for (queue, frame) in pending {
        let sequence = frame.sequence;
        if !queue.offer_until(frame, deadline) {
            dropped += 1;
            context.metrics().record_result_dropped();
            warn!("{} queue full, dropping frame {}", queue.name(), sequence);
        }
    }
    dropped
}
