//! Audio context: the shared graph plus whatever pulls samples out of it.
//!
//! An offline context is pulled by the host (tests, WAV export, FFI). A realtime
//! context owns a cpal output stream whose callback renders the same graph.
//! Both start suspended: while suspended the renderer writes silence and the
//! clock does not advance, so anything scheduled before [`AudioContext::resume`]
//! plays once the context runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::error::Result;
use crate::graph::Graph;
use crate::nodes::{Frame, SILENCE};

#[cfg(feature = "realtime")]
use crate::error::EngineError;
#[cfg(feature = "realtime")]
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
#[cfg(feature = "realtime")]
use log::{error, info};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContextState {
    Suspended,
    Running,
}

pub struct AudioContext {
    graph: Arc<Mutex<Graph>>,
    running: Arc<AtomicBool>,
    sample_rate: u32,
    #[cfg(feature = "realtime")]
    stream: Option<cpal::Stream>,
}

impl core::fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AudioContext")
            .field("sample_rate", &self.sample_rate)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Render into an interleaved buffer of `channels` channels.
///
/// Stereo goes to the first two channels; mono gets the average; extra
/// channels are zeroed. Returns the number of frames written.
fn fill_interleaved<T: Copy>(
    graph: &Mutex<Graph>,
    running: &AtomicBool,
    out: &mut [T],
    channels: usize,
    conv: impl Fn(f32) -> T,
) -> usize {
    let channels = channels.max(1);
    let frames = out.len() / channels;
    if !running.load(Ordering::Acquire) {
        out.iter_mut().for_each(|s| *s = conv(0.0));
        return frames;
    }
    let mut g = graph.lock();
    for frame in out.chunks_exact_mut(channels) {
        let [l, r] = g.render_frame();
        match frame {
            [mono] => *mono = conv(0.5 * (l + r)),
            [left, right, rest @ ..] => {
                *left = conv(l);
                *right = conv(r);
                rest.iter_mut().for_each(|s| *s = conv(0.0));
            }
            [] => {}
        }
    }
    g.end_block();
    frames
}

impl AudioContext {
    /// Host-pulled context at `sample_rate`.
    pub fn offline(sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        Self {
            graph: Arc::new(Mutex::new(Graph::new(sample_rate as f32))),
            running: Arc::new(AtomicBool::new(false)),
            sample_rate,
            #[cfg(feature = "realtime")]
            stream: None,
        }
    }

    /// Context driven by a cpal output stream on `device` (by name) or the
    /// default output device.
    #[cfg(feature = "realtime")]
    pub fn realtime(device: Option<&str>) -> Result<Self> {
        let device = pick_device(device)?;
        let supported = device.default_output_config().map_err(|e| EngineError::Device(e.to_string()))?;
        let format = supported.sample_format();
        let cfg = supported.config();
        let sample_rate = cfg.sample_rate.0;

        let graph = Arc::new(Mutex::new(Graph::new(sample_rate as f32)));
        let running = Arc::new(AtomicBool::new(false));

        let stream = match format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &cfg, &graph, &running)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &cfg, &graph, &running)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &cfg, &graph, &running)?,
            other => return Err(EngineError::UnsupportedFormat(format!("{other:?}"))),
        };

        info!(
            "audio: {} @ {} Hz, {} ch, {:?}",
            device.name().unwrap_or_else(|_| "<unnamed>".into()),
            sample_rate,
            cfg.channels,
            format
        );
        Ok(Self { graph, running, sample_rate, stream: Some(stream) })
    }

    #[inline] pub fn sample_rate(&self) -> u32 { self.sample_rate }

    /// Follow a host device that changed rate. The clock keeps its position in
    /// seconds. A device-driven context renders at the device rate and refuses.
    pub fn set_sample_rate(&mut self, sample_rate: u32) -> Result<()> {
        #[cfg(feature = "realtime")]
        if self.stream.is_some() {
            return Err(EngineError::FixedSampleRate);
        }
        let sample_rate = sample_rate.max(1);
        self.graph.lock().set_sample_rate(sample_rate as f32);
        debug!("context: {} Hz -> {sample_rate} Hz", self.sample_rate);
        self.sample_rate = sample_rate;
        Ok(())
    }

    pub fn state(&self) -> ContextState {
        if self.is_running() { ContextState::Running } else { ContextState::Suspended }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start (or restart) rendering.
    pub fn resume(&self) -> Result<()> {
        #[cfg(feature = "realtime")]
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| EngineError::Device(e.to_string()))?;
        }
        if !self.running.swap(true, Ordering::AcqRel) {
            debug!("context: running at {:.3}s", self.now());
        }
        Ok(())
    }

    /// Freeze the clock; the renderer writes silence until resumed.
    pub fn suspend(&self) -> Result<()> {
        self.running.store(false, Ordering::Release);
        #[cfg(feature = "realtime")]
        if let Some(stream) = &self.stream {
            stream.pause().map_err(|e| EngineError::Device(e.to_string()))?;
        }
        debug!("context: suspended at {:.3}s", self.now());
        Ok(())
    }

    /// Context time in seconds.
    pub fn now(&self) -> f64 {
        self.graph.lock().now()
    }

    /// Run `f` with exclusive access to the graph.
    pub fn with_graph<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        f(&mut self.graph.lock())
    }

    /// Pull interleaved f32 samples. Returns frames written.
    pub fn render(&self, out: &mut [f32], channels: usize) -> usize {
        fill_interleaved(&self.graph, &self.running, out, channels, |s| s)
    }

    /// Pull `frames` stereo frames; silence while suspended.
    pub fn render_frames(&self, frames: usize) -> Vec<Frame> {
        let mut buf = vec![SILENCE; frames];
        if self.is_running() {
            self.graph.lock().render(&mut buf);
        }
        buf
    }

    /// Pull `secs` seconds of stereo audio.
    pub fn render_seconds(&self, secs: f32) -> Vec<Frame> {
        let frames = (f64::from(secs.max(0.0)) * f64::from(self.sample_rate)).round() as usize;
        self.render_frames(frames)
    }
}

/// Names of the host's output devices.
#[cfg(feature = "realtime")]
pub fn output_device_names() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host.output_devices().map_err(|e| EngineError::Device(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

#[cfg(feature = "realtime")]
fn pick_device(name: Option<&str>) -> Result<cpal::Device> {
    let host = cpal::default_host();
    if let Some(name) = name {
        let mut devices = host.output_devices().map_err(|e| EngineError::Device(e.to_string()))?;
        return devices
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| EngineError::DeviceNotFound(name.to_string()));
    }
    host.default_output_device().ok_or(EngineError::NoDevice)
}

#[cfg(feature = "realtime")]
fn build_stream<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    graph: &Arc<Mutex<Graph>>,
    running: &Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::FromSample<f32> + cpal::SizedSample + Send + 'static,
{
    let channels = usize::from(cfg.channels);
    let graph = Arc::clone(graph);
    let running = Arc::clone(running);

    device
        .build_output_stream(
            cfg,
            move |output: &mut [T], _| {
                fill_interleaved(&graph, &running, output, channels, T::from_sample::<f32>);
            },
            |e| error!("audio stream error: {e}"),
            None,
        )
        .map_err(|e| EngineError::Device(e.to_string()))
}

// ------------------------------------ Tests --------------------------------------
