// src/engine/api.rs
//
// ImageEngine: the public entry point. Owns a worker pool and a memory budget and runs
// commands on them without blocking the caller's thread.

use crate::command::{Command, CommandFailure, CommandOutput, CommandResult, ProcessedImage};
use crate::config::EngineConfig;
use crate::engine::common::{run_with_panic_policy, PanicPolicy};
use crate::engine::inspect::ImageInfo;
use crate::engine::memory::{self, WeightedSemaphore};
use crate::engine::pool::build_pool;
use crate::engine::tasks::run_command;
use crate::error::{EngineError, Result};
use crate::ops::{ConvertParams, CropSpec, ResizeSpec};
use rayon::ThreadPool;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

struct EngineShared {
    config: EngineConfig,
    pool: ThreadPool,
    memory: Arc<WeightedSemaphore>,
}

/// The image processing engine.
///
/// Cheap to clone; clones share the worker pool and memory budget. Requests are
/// independent: nothing decoded by one command is visible to another.
///
/// ```no_run
/// use pixelsmith::{Command, EngineConfig, ImageEngine, ResizeSpec};
///
/// let engine = ImageEngine::new(EngineConfig::default())?;
/// let bytes = std::fs::read("photo.jpg").expect("read input");
/// let ticket = engine.submit(Command::ResizeImage {
///     data: bytes,
///     spec: ResizeSpec::fit(800, 600),
/// });
/// let output = ticket.wait()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct ImageEngine {
    shared: Arc<EngineShared>,
}

/// Handle to a submitted command. The result is delivered exactly once.
#[derive(Debug)]
pub struct CommandTicket {
    command: &'static str,
    receiver: Receiver<CommandResult>,
    taken: bool,
}

impl CommandTicket {
    pub fn command(&self) -> &'static str {
        self.command
    }

    fn lost(&self) -> CommandResult {
        Err(CommandFailure::from(EngineError::worker_lost(self.command)))
    }

    /// Block until the command finishes.
    pub fn wait(self) -> CommandResult {
        match self.receiver.recv() {
            Ok(result) => result,
            Err(_) => self.lost(),
        }
    }

    /// Block for at most `timeout`. `None` means still running.
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<CommandResult> {
        if self.taken {
            return None;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => {
                self.taken = true;
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                self.taken = true;
                Some(self.lost())
            }
        }
    }

    /// Non-blocking poll. Returns the result once, then `None`.
    pub fn try_take(&mut self) -> Option<CommandResult> {
        if self.taken {
            return None;
        }
        match self.receiver.try_recv() {
            Ok(result) => {
                self.taken = true;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.taken = true;
                Some(self.lost())
            }
        }
    }
}

fn task_stage(command: &Command) -> &'static str {
    match command {
        Command::CropImage { .. } => "task:crop_image",
        Command::ResizeImage { .. } => "task:resize_image",
        Command::ConvertImage { .. } => "task:convert_image",
        Command::CompareImages { .. } => "task:compare_images",
        Command::GetImageInfo { .. } => "task:get_image_info",
    }
}

fn process(shared: &EngineShared, command: Command) -> CommandResult {
    run_with_panic_policy(task_stage(&command), PanicPolicy::Internal, || {
        let weight = memory::estimate_command_bytes(&command);
        // released when the closure returns, before the result is sent
        let _permit = shared.memory.acquire(weight);
        run_command(&command, &shared.config)
    })
    .map_err(|err| {
        if err.category() == crate::error::ErrorCategory::ResourceLimit {
            warn!(command = command.name(), %err, "command rejected by limits");
        }
        CommandFailure::from(err)
    })
}

fn expect_image(result: CommandResult) -> std::result::Result<ProcessedImage, CommandFailure> {
    match result? {
        CommandOutput::Image(image) => Ok(image),
        CommandOutput::Info(_) => Err(CommandFailure::from(EngineError::internal_panic(
            "command produced metadata where an image was expected",
        ))),
    }
}

impl ImageEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let pool = build_pool(config.worker_threads);
        let memory = Arc::new(WeightedSemaphore::new(config.memory_budget_bytes));
        info!(
            threads = pool.current_num_threads(),
            memory_budget_bytes = config.memory_budget_bytes,
            firewall = config.firewall.policy.as_str(),
            "image engine ready"
        );
        Ok(Self {
            shared: Arc::new(EngineShared {
                config,
                pool,
                memory,
            }),
        })
    }

    /// Engine configured from `PIXELSMITH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(EngineConfig::from_env()?)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    pub fn worker_threads(&self) -> usize {
        self.shared.pool.current_num_threads()
    }

    /// Bytes of the memory budget not currently held by running commands.
    pub fn memory_available(&self) -> u64 {
        self.shared.memory.available()
    }

    /// Queue a command and return immediately.
    pub fn submit(&self, command: Command) -> CommandTicket {
        let (tx, rx) = mpsc::channel();
        let name = command.name();
        let shared = Arc::clone(&self.shared);
        self.shared.pool.spawn(move || {
            let result = process(&shared, command);
            // Receiver may be gone if the caller dropped the ticket.
            let _ = tx.send(result);
        });
        CommandTicket {
            command: name,
            receiver: rx,
            taken: false,
        }
    }

    /// Queue a command and deliver its result to `callback` on a worker thread.
    pub fn submit_with<F>(&self, command: Command, callback: F)
    where
        F: FnOnce(CommandResult) + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        self.shared.pool.spawn(move || {
            let result = process(&shared, command);
            if let Err(err) = run_with_panic_policy("callback", PanicPolicy::Internal, || {
                callback(result);
                Ok(())
            }) {
                warn!(%err, "result callback panicked");
            }
        });
    }

    /// Run a command and block until it finishes.
    pub fn execute(&self, command: Command) -> CommandResult {
        self.submit(command).wait()
    }

    pub fn crop_image(
        &self,
        data: Vec<u8>,
        spec: CropSpec,
    ) -> std::result::Result<ProcessedImage, CommandFailure> {
        expect_image(self.execute(Command::CropImage { data, spec }))
    }

    pub fn resize_image(
        &self,
        data: Vec<u8>,
        spec: ResizeSpec,
    ) -> std::result::Result<ProcessedImage, CommandFailure> {
        expect_image(self.execute(Command::ResizeImage { data, spec }))
    }

    pub fn convert_image(
        &self,
        data: Vec<u8>,
        params: ConvertParams,
    ) -> std::result::Result<ProcessedImage, CommandFailure> {
        expect_image(self.execute(Command::ConvertImage { data, params }))
    }

    pub fn compare_images(
        &self,
        first: Vec<u8>,
        second: Vec<u8>,
    ) -> std::result::Result<ProcessedImage, CommandFailure> {
        expect_image(self.execute(Command::CompareImages { first, second }))
    }

    pub fn get_image_info(&self, data: Vec<u8>) -> std::result::Result<ImageInfo, CommandFailure> {
        match self.execute(Command::GetImageInfo { data })? {
            CommandOutput::Info(info) => Ok(info),
            CommandOutput::Image(_) => Err(CommandFailure::from(EngineError::internal_panic(
                "command produced an image where metadata was expected",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::FormatKind;
    use crate::engine::encoder::encode;
    use crate::engine::raster::RasterBuffer;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> ImageEngine {
        ImageEngine::new(
            EngineConfig::default()
                .with_worker_threads(2)
                .with_memory_budget_bytes(256 * 1024 * 1024),
        )
        .unwrap()
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let raster = RasterBuffer::filled(width, height, [10, 20, 30, 255]).unwrap();
        encode(&raster, FormatKind::Png, None).unwrap().into_bytes()
    }

    #[test]
    fn submit_and_wait() {
        let ticket = engine().submit(Command::GetImageInfo { data: png(5, 6) });
        assert_eq!(ticket.command(), "get_image_info");
        let info = ticket.wait().unwrap().into_info().unwrap();
        assert_eq!((info.width, info.height), (5, 6));
    }

    #[test]
    fn try_take_delivers_once() {
        let mut ticket = engine().submit(Command::GetImageInfo { data: png(2, 2) });
        let first = loop {
            if let Some(result) = ticket.wait_timeout(Duration::from_millis(50)) {
                break result;
            }
        };
        assert!(first.is_ok());
        assert!(ticket.try_take().is_none());
    }

    #[test]
    fn submit_with_invokes_callback() {
        let engine = engine();
        let (tx, rx) = mpsc::channel();
        engine.submit_with(
            Command::CropImage {
                data: png(10, 10),
                spec: CropSpec::new(0, 0, 20, 20),
            },
            move |result| {
                tx.send(result).unwrap();
            },
        );
        let failure = rx.recv().unwrap().unwrap_err();
        assert_eq!(failure.kind, ErrorKind::InvalidCropRegion);
        assert!(failure.recoverable);
    }

    #[test]
    fn panicking_callback_does_not_take_down_pool() {
        let engine = engine();
        engine.submit_with(Command::GetImageInfo { data: png(1, 1) }, |_| {
            panic!("callback bug")
        });
        let info = engine.get_image_info(png(3, 3)).unwrap();
        assert_eq!(info.width, 3);
    }

    #[test]
    fn many_concurrent_commands_release_memory() {
        let engine = ImageEngine::new(
            EngineConfig::default()
                .with_worker_threads(4)
                .with_memory_budget_bytes(32 * 1024 * 1024),
        )
        .unwrap();
        let done = Arc::new(AtomicUsize::new(0));
        let tickets: Vec<_> = (0..16)
            .map(|i| {
                engine.submit(Command::ResizeImage {
                    data: png(64 + i, 64),
                    spec: ResizeSpec::exact(32, 32),
                })
            })
            .collect();
        for ticket in tickets {
            let image = ticket.wait().unwrap().into_image().unwrap();
            assert_eq!((image.width, image.height), (32, 32));
            done.fetch_add(1, Ordering::SeqCst);
        }
        assert_eq!(done.load(Ordering::SeqCst), 16);
        assert_eq!(engine.memory_available(), 32 * 1024 * 1024);
    }

    #[test]
    fn convenience_methods_map_failures() {
        let engine = engine();
        let failure = engine.get_image_info(Vec::new()).unwrap_err();
        assert_eq!(failure.kind, ErrorKind::UnsupportedFormat);
        let failure = engine
            .convert_image(png(2, 2), ConvertParams::new("heic", None))
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::InvalidFormat);
        let image = engine.compare_images(png(4, 4), png(8, 4)).unwrap();
        assert_eq!((image.width, image.height, image.format), (8, 4, FormatKind::Png));
    }

    #[test]
    fn oversized_parameters_fail_cleanly_and_engine_survives() {
        let engine = engine();
        let failure = engine
            .crop_image(png(8, 8), CropSpec::new(0, 0, u32::MAX, u32::MAX))
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::InvalidCropRegion);

        let failure = engine
            .resize_image(png(8, 8), ResizeSpec::exact(u32::MAX, u32::MAX))
            .unwrap_err();
        assert_eq!(failure.kind, ErrorKind::LimitExceeded);

        let info = engine.get_image_info(png(8, 8)).unwrap();
        assert_eq!((info.width, info.height), (8, 8));
        assert_eq!(engine.memory_available(), 256 * 1024 * 1024);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = ImageEngine::new(EngineConfig::default().with_memory_budget_bytes(0))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }
}
