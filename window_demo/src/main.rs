//! Video window demo
//!
//! Opens one scaler window, negotiates the first compatible mode at 60 Hz
//! and keeps presenting until the window is closed. Escape closes the
//! window and F11 toggles fullscreen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use video_window::foundation::logging;
use video_window::prelude::*;

const CONFIG_PATH: &str = "window_demo.toml";
const FRAME_RATE: Rate = Rate { num: 60, den: 1 };
const IDLE_SLEEP: Duration = Duration::from_millis(1);

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_or_default(CONFIG_PATH)?;
    config.validate()?;
    logging::init(&config.log_level);
    log::info!("Starting window demo");

    let instance = Instance::with_glfw(&config.toolkit)?;
    let extensions = instance.toolkit().execute(|tk| tk.required_instance_extensions());
    let context = Arc::new(VulkanContext::new(&config.renderer, &extensions)?);
    let factory = VulkanFactory::new(Arc::clone(&context), config.renderer.shaders.clone());

    let mut window = WindowConsumer::scaler(factory, config.window.clone(), config.present.clone());
    let requests = Arc::new(Requests::default());
    install_key_bindings(&window, Arc::clone(&requests));

    window.open(&mut instance.lock())?;
    let result = run(&instance, &mut window, &requests);
    window.close(&mut instance.lock());

    log::info!("Window demo finished");
    result
}

/// Flags set from the keyboard callback and consumed by the main loop
#[derive(Default)]
struct Requests {
    quit: AtomicBool,
    toggle_fullscreen: AtomicBool,
}

fn install_key_bindings(window: &WindowConsumer, requests: Arc<Requests>) {
    let mut callbacks = window.callbacks();
    callbacks.keyboard = Some(Box::new(move |key, _scancode, action, _modifiers| {
        if action != KeyAction::Press {
            return;
        }
        if key == Key::ESCAPE {
            requests.quit.store(true, Ordering::SeqCst);
        } else if key == Key::F11 {
            requests.toggle_fullscreen.store(true, Ordering::SeqCst);
        }
    }));
    callbacks.close = Some(Box::new(|()| log::info!("Close requested")));
}

fn run(
    instance: &Instance,
    window: &mut WindowConsumer,
    requests: &Requests,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        instance.poll_events();

        let mut lock = instance.lock();
        instance.dispatch_events(&mut lock);
        window.handle_window_events()?;

        if window.should_close() || requests.quit.load(Ordering::SeqCst) {
            return Ok(());
        }

        if requests.toggle_fullscreen.swap(false, Ordering::SeqCst) {
            let next = if window.window_state() == WindowState::Fullscreen {
                WindowState::Normal
            } else {
                WindowState::Fullscreen
            };
            window.set_window_state(next)?;
        }

        if window.poll_compatibility_change() {
            let mode = negotiate(window.video_mode_compatibility(), FRAME_RATE);
            match &mode {
                Some(mode) => log::info!(
                    "Presenting {}x{} {:?}",
                    mode.resolution.width,
                    mode.resolution.height,
                    mode.color_format
                ),
                None => log::warn!("No presentable video mode"),
            }
            window.set_video_mode(&mut lock, mode)?;
        }

        let now = Instant::now();
        if lock.scheduler.due(now).contains(&window.update_id()) {
            window.update()?;
        }

        let next = lock.scheduler.next_deadline();
        drop(lock);
        let wait = next.map_or(IDLE_SLEEP, |deadline| deadline.saturating_duration_since(Instant::now()));
        std::thread::sleep(wait.min(Duration::from_millis(16)));
    }
}
