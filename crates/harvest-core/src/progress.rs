use std::env;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

const PROGRESS_ENV: &str = "HARVEST_PROGRESS";

static SUPPRESSED: AtomicBool = AtomicBool::new(false);

/// Turn progress output off for the rest of the process, e.g. under `--quiet` or `--json`.
pub(crate) fn suppress() {
    SUPPRESSED.store(true, Ordering::Relaxed);
}

pub(crate) fn progress_enabled() -> bool {
    if SUPPRESSED.load(Ordering::Relaxed) {
        return false;
    }
    match env::var(PROGRESS_ENV) {
        Ok(value) => value != "0",
        Err(_) => io::stderr().is_terminal(),
    }
}

static OUTPUT_LOCK: Mutex<()> = Mutex::new(());
static RENDERER: OnceLock<Renderer> = OnceLock::new();

fn renderer() -> &'static Renderer {
    RENDERER.get_or_init(Renderer::new)
}

fn clear_line() {
    let _guard = OUTPUT_LOCK.lock().ok();
    let _ = io::stderr().write_all(b"\r\x1b[2K");
    let _ = io::stderr().flush();
}

#[derive(Clone)]
struct Task {
    id: u64,
    label: String,
    total: usize,
    current: usize,
    started_at: Instant,
}

struct Renderer {
    state: Mutex<RendererState>,
}

struct RendererState {
    next_id: u64,
    tasks: Vec<Task>,
    started: bool,
}

impl Renderer {
    fn new() -> Self {
        Self {
            state: Mutex::new(RendererState {
                next_id: 1,
                tasks: Vec::new(),
                started: false,
            }),
        }
    }

    fn ensure_started(&self) {
        let mut state = self.state.lock().expect("progress lock");
        if state.started {
            return;
        }
        state.started = true;
        drop(state);

        thread::spawn(|| {
            const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            const TICK: Duration = Duration::from_millis(80);
            const START_DELAY: Duration = Duration::from_millis(120);
            let mut frame_idx = 0usize;
            let mut rendered = false;
            loop {
                let task = renderer()
                    .state
                    .lock()
                    .expect("progress lock")
                    .tasks
                    .last()
                    .cloned();
                let visible = task.filter(|task| task.started_at.elapsed() >= START_DELAY);
                let Some(task) = visible else {
                    if rendered {
                        clear_line();
                        rendered = false;
                    }
                    thread::sleep(TICK);
                    continue;
                };

                let frame = FRAMES[frame_idx % FRAMES.len()];
                frame_idx = frame_idx.wrapping_add(1);
                let current = task.current.min(task.total);
                let line = format!(
                    "\r\x1b[2Kharvest ▸ {} [{current}/{}] {frame}",
                    task.label, task.total
                );
                {
                    let _guard = OUTPUT_LOCK.lock().ok();
                    let _ = io::stderr().write_all(line.as_bytes());
                    let _ = io::stderr().flush();
                }
                rendered = true;
                thread::sleep(TICK);
            }
        });
    }

    fn push(&self, label: String, total: usize) -> u64 {
        let mut state = self.state.lock().expect("progress lock");
        let id = state.next_id;
        state.next_id = state.next_id.saturating_add(1);
        state.tasks.push(Task {
            id,
            label,
            total,
            current: 0,
            started_at: Instant::now(),
        });
        id
    }

    fn advance(&self, id: u64) {
        let mut state = self.state.lock().expect("progress lock");
        if let Some(task) = state.tasks.iter_mut().find(|task| task.id == id) {
            task.current = task.current.saturating_add(1);
        }
    }

    fn remove(&self, id: u64) {
        let mut state = self.state.lock().expect("progress lock");
        state.tasks.retain(|task| task.id != id);
    }
}

/// A `[n/total]` line on stderr, drawn only when progress output is enabled.
pub struct ProgressReporter {
    id: Option<u64>,
}

impl ProgressReporter {
    pub fn bar(label: impl Into<String>, total: usize) -> Self {
        if total == 0 || !progress_enabled() {
            return Self { id: None };
        }
        renderer().ensure_started();
        Self {
            id: Some(renderer().push(label.into(), total)),
        }
    }

    pub fn increment(&self) {
        if let Some(id) = self.id {
            renderer().advance(id);
        }
    }

    pub fn finish(mut self, message: impl Into<String>) {
        let was_shown = self.id.is_some();
        self.stop();
        if was_shown {
            eprintln!("harvest ▸ {}", message.into());
        }
    }

    fn stop(&mut self) {
        if let Some(id) = self.id.take() {
            renderer().remove(id);
            clear_line();
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.stop();
    }
}
