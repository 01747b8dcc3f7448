use anyhow::{Context, Result};
use ouroboros::self_referencing;

use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, FrameCtx};
use crate::device::{Gpu, GpuInit};
use crate::input::platform::winit::translate_window_event;
use crate::input::{InputFrame, InputState};
use crate::time::FrameClock;

/// Window/runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    pub resizable: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            title: "penumbra".to_string(),
            initial_size: LogicalSize::new(1280.0, 960.0),
            resizable: true,
        }
    }
}

/// Entry point for the runtime.
pub struct Runtime;

impl Runtime {
    /// Opens one window, drives `app` until it exits or the window closes.
    ///
    /// Returns an error if the event loop, the window or the GPU context
    /// cannot be created.
    pub fn run<A>(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Result<A>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(config, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        if let Some(err) = state.startup_error.take() {
            return Err(err);
        }
        Ok(state.app)
    }
}

#[self_referencing]
struct WindowEntry {
    input_state: InputState,
    input_frame: InputFrame,
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    gpu: Gpu<'this>,
}

struct AppState<A: App + 'static> {
    config: RuntimeConfig,
    gpu_init: GpuInit,
    app: A,

    entry: Option<WindowEntry>,
    startup_error: Option<anyhow::Error>,
    exit_requested: bool,
}

impl<A: App + 'static> AppState<A> {
    fn new(config: RuntimeConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            config,
            gpu_init,
            app,
            entry: None,
            startup_error: None,
            exit_requested: false,
        }
    }

    fn create_entry(&self, event_loop: &ActiveEventLoop) -> Result<WindowEntry> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size)
            .with_resizable(self.config.resizable);

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;

        let gpu_init = self.gpu_init.clone();
        WindowEntryTryBuilder {
            input_state: InputState::default(),
            input_frame: InputFrame::default(),
            clock: FrameClock::default(),
            window,
            gpu_builder: |w| {
                pollster::block_on(Gpu::new(w, gpu_init)).context("GPU initialization failed")
            },
        }
        .try_build()
    }

    fn exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        // Drop GPU objects before the window goes away.
        self.entry = None;
        event_loop.exit();
    }

    fn resize(&mut self, size: PhysicalSize<u32>) -> AppControl {
        let Some(entry) = self.entry.as_mut() else {
            return AppControl::Continue;
        };

        let reconfigured = entry.with_gpu_mut(|gpu| gpu.resize(size));
        entry.with_window(|w| w.request_redraw());
        if !reconfigured {
            return AppControl::Continue;
        }

        let app = &mut self.app;
        entry.with_gpu(|gpu| app.on_resize(gpu, size))
    }

    fn redraw(&mut self) -> AppControl {
        let Some(entry) = self.entry.as_mut() else {
            return AppControl::Continue;
        };

        let app = &mut self.app;
        entry.with_mut(|fields| {
            let time = fields.clock.tick();
            let control = {
                let mut ctx = FrameCtx {
                    window: fields.window,
                    gpu: fields.gpu,
                    input: fields.input_state,
                    input_frame: fields.input_frame,
                    time,
                };
                app.on_frame(&mut ctx)
            };
            fields.input_frame.clear();
            control
        })
    }
}

impl<A: App + 'static> ApplicationHandler for AppState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.entry.is_some() || self.exit_requested {
            return;
        }

        match self.create_entry(event_loop) {
            Ok(entry) => {
                let size = entry.borrow_gpu().size();
                log::info!("window created ({}x{})", size.width, size.height);

                let control = entry.with_gpu(|gpu| self.app.on_resize(gpu, size));
                entry.with_window(|w| w.request_redraw());
                self.entry = Some(entry);
                if control == AppControl::Exit {
                    self.exit(event_loop);
                }
            }
            Err(e) => {
                log::error!("{e:#}");
                self.startup_error = Some(e);
                self.exit(event_loop);
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Real-time loop: redraw continuously.
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(entry) = self.entry.as_ref() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let Some(entry) = self.entry.as_mut() else { return };
        if let Some(ev) = translate_window_event(&event) {
            entry.with_mut(|fields| fields.input_state.apply_event(fields.input_frame, ev));
        }

        if self.app.on_window_event(&event) == AppControl::Exit {
            self.exit(event_loop);
            return;
        }

        let control = match event {
            WindowEvent::CloseRequested => AppControl::Exit,
            WindowEvent::Resized(size) => self.resize(size),
            WindowEvent::ScaleFactorChanged { .. } => {
                let size = self
                    .entry
                    .as_ref()
                    .map(|e| e.with_window(|w| w.inner_size()));
                match size {
                    Some(size) => self.resize(size),
                    None => AppControl::Continue,
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => AppControl::Continue,
        };

        if control == AppControl::Exit {
            self.exit(event_loop);
        }
    }
}
