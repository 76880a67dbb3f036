//! Engine control thread.
//!
//! Platform audio streams are pinned to the thread that created them, so
//! the [`AudioEngine`] lives on a dedicated control thread and the async
//! side talks to it through a command channel. Only lifecycle operations
//! travel this channel; effect mutations and telemetry go straight to the
//! engine's `Send + Sync` handles ([`EffectManager`], [`PipelineHandle`]),
//! which this controller clones out at spawn time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;

use amperio_engine::{AudioEngine, EffectManager, EngineConfig, EngineError, PipelineHandle};
use tokio::sync::oneshot;
use tracing::{debug, error};

enum Command {
    Start(oneshot::Sender<Result<(), EngineError>>),
    Stop(oneshot::Sender<Result<(), EngineError>>),
    Shutdown,
}

/// Async-friendly front of the engine thread.
pub struct EngineController {
    tx: mpsc::Sender<Command>,
    manager: Arc<EffectManager>,
    handle: Arc<PipelineHandle>,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl EngineController {
    /// Spawn the engine thread, initialize the audio driver on it, and
    /// hand back the controller. Fails if the driver cannot be acquired.
    pub fn spawn(config: EngineConfig) -> Result<Self, EngineError> {
        let (tx, rx) = mpsc::channel::<Command>();
        let (boot_tx, boot_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(false));
        let thread_running = Arc::clone(&running);

        let thread = std::thread::Builder::new()
            .name("amperio-engine".into())
            .spawn(move || {
                let mut engine = AudioEngine::new(config);
                let boot = engine
                    .initialize()
                    .map(|()| (engine.manager(), engine.handle()));
                let failed = boot.is_err();
                if boot_tx.send(boot).is_err() || failed {
                    return;
                }

                while let Ok(command) = rx.recv() {
                    match command {
                        Command::Start(reply) => {
                            let result = engine.start();
                            thread_running.store(engine.is_running(), Ordering::Relaxed);
                            let _ = reply.send(result);
                        }
                        Command::Stop(reply) => {
                            let result = engine.stop();
                            thread_running.store(engine.is_running(), Ordering::Relaxed);
                            let _ = reply.send(result);
                        }
                        Command::Shutdown => break,
                    }
                }
                engine.shutdown();
                thread_running.store(false, Ordering::Relaxed);
                debug!("engine thread exited");
            })
            .map_err(|e| EngineError::Stream(format!("failed to spawn engine thread: {e}")))?;

        let (manager, handle) = match boot_rx.recv() {
            Ok(Ok(handles)) => handles,
            Ok(Err(err)) => {
                let _ = thread.join();
                return Err(err);
            }
            Err(_) => {
                let _ = thread.join();
                return Err(EngineError::Stream("engine thread died during boot".into()));
            }
        };

        Ok(Self {
            tx,
            manager,
            handle,
            running,
            thread: Some(thread),
        })
    }

    async fn lifecycle(&self, make: impl FnOnce(oneshot::Sender<Result<(), EngineError>>) -> Command) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .map_err(|_| EngineError::Stream("engine thread gone".into()))?;
        reply_rx
            .await
            .map_err(|_| EngineError::Stream("engine thread dropped reply".into()))?
    }

    /// Start audio streaming.
    pub async fn start(&self) -> Result<(), EngineError> {
        self.lifecycle(Command::Start).await
    }

    /// Stop audio streaming.
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.lifecycle(Command::Stop).await
    }

    /// Whether the engine is currently streaming.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Effect-mutation surface (safe from any thread).
    pub fn manager(&self) -> &Arc<EffectManager> {
        &self.manager
    }

    /// Gains, tone, and telemetry surface (safe from any thread).
    pub fn handle(&self) -> &Arc<PipelineHandle> {
        &self.handle
    }

    /// Stop the engine and join its thread.
    pub fn shutdown(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("engine thread panicked during shutdown");
        }
    }
}

impl Drop for EngineController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
