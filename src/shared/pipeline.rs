// This is free and unencumbered software released into the public domain.

//! Frame delivery: capture thread -> main queue -> render queue -> texture.
//!
//! Every hand-off re-checks that the destination texture is still alive. A
//! frame copy is owned by exactly one stage at a time and is released by
//! `Drop` on whatever path ends its journey.

use crate::shared::{
    CameraError, FrameBuffer, FrameStats, QueueHandle, TaskQueue, TextureHandle, TextureRegion,
};
use std::{
    sync::{Arc, RwLock, mpsc::sync_channel},
    time::Duration,
};
use tracing::{debug, trace, warn};

/// The session's current destination texture, if any.
#[derive(Debug, Default)]
pub struct TextureSlot {
    current: RwLock<Option<TextureHandle>>,
}

impl TextureSlot {
    pub fn get(&self) -> Option<TextureHandle> {
        self.current.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn set(&self, texture: TextureHandle) {
        *self.current.write().unwrap_or_else(|p| p.into_inner()) = Some(texture);
    }

    /// Empties the slot and marks the previous texture released.
    pub fn clear(&self) -> Option<TextureHandle> {
        let previous = self.current.write().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(texture) = &previous {
            texture.release();
        }
        previous
    }
}

/// Submission side of the pipeline, handed to capture callbacks.
#[derive(Clone, Debug)]
pub struct FrameRoute {
    main: QueueHandle,
    render: QueueHandle,
    target: Arc<TextureSlot>,
    stats: Arc<FrameStats>,
    max_in_flight: Option<usize>,
}

impl FrameRoute {
    /// Called on the platform's capture thread. Never blocks on downstream
    /// consumption; failures drop this one frame.
    pub fn on_frame_received(&self, raw: &[u8], width: u32, height: u32) {
        if let Some(limit) = self.max_in_flight {
            if self.stats.in_flight() >= limit as u64 {
                self.stats.record_backpressure();
                trace!(width, height, limit, "frame dropped: too many frames in flight");
                return;
            }
        }

        let frame = match FrameBuffer::copy_from(raw, width, height, Some(Arc::clone(&self.stats)))
        {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.record_rejected();
                warn!(%err, width, height, len = raw.len(), "frame dropped");
                return;
            },
        };

        let render = self.render.clone();
        let target = Arc::clone(&self.target);
        let stats = Arc::clone(&self.stats);
        let submitted = self.main.submit(move || {
            deliver_on_main(frame, &target, &render, stats);
        });
        if !submitted {
            self.stats.record_stale();
            debug!("frame dropped: main queue closed");
        }
    }
}

fn deliver_on_main(
    frame: FrameBuffer,
    target: &TextureSlot,
    render: &QueueHandle,
    stats: Arc<FrameStats>,
) {
    let Some(texture) = target.get() else {
        stats.record_stale();
        trace!("frame dropped: no destination texture");
        return;
    };

    let on_render = Arc::clone(&stats);
    let submitted = render.submit(move || {
        upload_on_render(frame, &texture, &on_render);
    });
    if !submitted {
        stats.record_stale();
        debug!("frame dropped: render queue closed");
    }
}

fn upload_on_render(frame: FrameBuffer, texture: &TextureHandle, stats: &FrameStats) {
    if texture.is_released() {
        stats.record_stale();
        trace!("frame dropped: texture released before upload");
        return;
    }
    let region = TextureRegion::full(frame.width(), frame.height());
    match texture.update_region(region, frame.stride(), frame.data()) {
        Ok(()) => stats.record_uploaded(),
        Err(CameraError::NotActive) => stats.record_stale(),
        Err(err) => {
            stats.record_rejected();
            warn!(%err, "texture upload failed");
        },
    }
}

/// Owns the two queues behind a [`FrameRoute`].
#[derive(Debug)]
pub struct FrameDeliveryPipeline {
    main: TaskQueue,
    render: TaskQueue,
    route: FrameRoute,
}

impl FrameDeliveryPipeline {
    pub fn spawn(
        target: Arc<TextureSlot>,
        stats: Arc<FrameStats>,
        max_in_flight: Option<usize>,
    ) -> Result<Self, CameraError> {
        let main = TaskQueue::spawn("camera2-main")?;
        let render = TaskQueue::spawn("camera2-render")?;
        let route = FrameRoute {
            main: main.handle(),
            render: render.handle(),
            target,
            stats,
            max_in_flight,
        };
        Ok(Self {
            main,
            render,
            route,
        })
    }

    pub fn route(&self) -> FrameRoute {
        self.route.clone()
    }

    pub fn on_frame_received(&self, raw: &[u8], width: u32, height: u32) {
        self.route.on_frame_received(raw, width, height)
    }

    /// Waits until everything submitted so far has passed both queues.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let (tx, rx) = sync_channel::<()>(1);
        let render = self.render.handle();
        let submitted = self.main.submit(move || {
            let tx2 = tx.clone();
            if !render.submit(move || {
                let _ = tx2.send(());
            }) {
                let _ = tx.send(());
            }
        });
        submitted && rx.recv_timeout(timeout).is_ok()
    }

    /// Drains the main queue (which may still feed the render queue), then
    /// the render queue.
    pub fn shutdown(&mut self) {
        self.main.shutdown();
        self.render.shutdown();
    }
}

impl Drop for FrameDeliveryPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
