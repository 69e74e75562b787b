use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use eframe::egui::{self, RichText};
use eframe::CreationContext;
use log::warn;
use tray_icon::menu::{Menu, MenuEvent, MenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder, TrayIconEvent};

use crate::api::PollinationsClient;
use crate::modes::{Mode, PROMPT_EXAMPLES};
use crate::settings::{
    self, AppSettings, AVAILABLE_MODELS, INTERVAL_RANGE, SUPPORTED_RESOLUTIONS,
};
use crate::startup;
use crate::wallpaper::{self, StyleMode};
use crate::worker::{GenerationWorker, JobSpec, WorkerEvent};

/// Signals raised by the tray threads and consumed on the UI thread.
#[derive(Default)]
struct TrayFlags {
    restore: AtomicBool,
    generate: AtomicBool,
    quit: AtomicBool,
}

pub struct PolliPaperApp {
    settings: AppSettings,
    /// Working copy of the selected mode; persisted as `last_mode`.
    mode: Mode,
    custom_prompt: String,
    status: String,
    /// UI-side in-flight guard: while set, the generate button is disabled
    /// and further manual requests are dropped.
    generating: bool,
    error_dialog: Option<String>,
    worker: Option<GenerationWorker>,
    event_buf: Vec<WorkerEvent>,
    last_applied: Option<PathBuf>,
    history: Vec<PathBuf>,
    history_dirty: bool,
    setup_test: Option<Receiver<bool>>,
    setup_test_result: Option<bool>,
    tray_icon: Option<TrayIcon>,
    tray_flags: Arc<TrayFlags>,
    minimize_pending: bool,
}

impl PolliPaperApp {
    pub fn new(cc: &CreationContext<'_>, started_from_startup: bool) -> Self {
        let mut settings = settings::load();
        if let Ok(enabled) = startup::is_enabled() {
            settings.auto_start = enabled;
        }
        let mode = settings.last_mode;
        let custom_prompt = settings.custom_prompt.clone();

        let tray_flags = Arc::new(TrayFlags::default());
        let tray_icon = create_tray_icon(&tray_flags, cc);

        let spec = job_spec(&settings, mode, &custom_prompt);
        let worker = GenerationWorker::start(spec, &settings.api_key, &settings.model);
        if settings.setup_complete && settings.auto_change {
            worker.set_auto_change(Some(settings.interval()));
        }

        let minimize_pending = settings.minimize_to_tray && started_from_startup;
        Self {
            settings,
            mode,
            custom_prompt,
            status: "Idle".to_string(),
            generating: false,
            error_dialog: None,
            worker: Some(worker),
            event_buf: Vec::new(),
            last_applied: None,
            history: Vec::new(),
            history_dirty: true,
            setup_test: None,
            setup_test_result: None,
            tray_icon,
            tray_flags,
            minimize_pending,
        }
    }

    fn ui(&mut self, ctx: &egui::Context) {
        self.drain_events();
        self.handle_tray_events(ctx);

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(RichText::new("PolliPaper").strong());
                ui.label(RichText::new("AI wallpapers from Pollinations").weak());
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.settings.setup_complete {
                self.main_ui(ui, ctx);
            } else {
                self.setup_ui(ui);
            }
        });

        self.error_dialog_ui(ctx);

        // Worker events arrive without user input; keep polling.
        ctx.request_repaint_after(Duration::from_millis(250));
    }

    fn main_ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let mut changed = false;

        ui.horizontal(|ui| {
            ui.label("Mode");
            egui::ComboBox::from_id_source("mode_combo")
                .selected_text(self.mode.label())
                .show_ui(ui, |ui| {
                    for mode in Mode::ALL {
                        if ui
                            .selectable_value(&mut self.mode, mode, mode.label())
                            .changed()
                        {
                            changed = true;
                        }
                    }
                });
            ui.label(RichText::new(self.mode.description()).weak());
        });

        if self.mode == Mode::Custom {
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.custom_prompt)
                    .hint_text(PROMPT_EXAMPLES[0])
                    .desired_width(f32::INFINITY),
            );
            if response.changed() {
                changed = true;
            }
        }

        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Resolution");
            egui::ComboBox::from_id_source("resolution_combo")
                .selected_text(&self.settings.resolution)
                .show_ui(ui, |ui| {
                    for res in SUPPORTED_RESOLUTIONS {
                        if ui
                            .selectable_value(
                                &mut self.settings.resolution,
                                res.to_string(),
                                res,
                            )
                            .changed()
                        {
                            changed = true;
                        }
                    }
                });

            egui::ComboBox::from_label("Style")
                .selected_text(self.settings.style.label())
                .show_ui(ui, |ui| {
                    for style in StyleMode::ALL {
                        if ui
                            .selectable_value(&mut self.settings.style, style, style.label())
                            .changed()
                        {
                            changed = true;
                        }
                    }
                });

            if ui
                .checkbox(&mut self.settings.enhance_prompts, "Enhance prompts")
                .changed()
            {
                changed = true;
            }
        });

        ui.horizontal(|ui| {
            ui.label("Save to");
            let folder = self.output_dir();
            ui.label(RichText::new(folder.display().to_string()).weak());
            if ui.button("Change...").clicked() {
                if let Some(path) = rfd::FileDialog::new().pick_folder() {
                    self.settings.save_folder = Some(path.display().to_string());
                    self.history_dirty = true;
                    changed = true;
                }
            }
        });

        ui.separator();

        ui.horizontal(|ui| {
            if ui
                .checkbox(&mut self.settings.auto_change, "Auto-change")
                .changed()
            {
                changed = true;
                if let Some(worker) = &self.worker {
                    if self.settings.auto_change {
                        worker.set_auto_change(Some(self.settings.interval()));
                        self.status = "Auto-change enabled".to_string();
                    } else {
                        worker.set_auto_change(None);
                        self.status = "Auto-change disabled".to_string();
                    }
                }
            }
            let slider = egui::Slider::new(
                &mut self.settings.interval_minutes,
                INTERVAL_RANGE,
            )
            .text("minutes");
            if ui.add(slider).changed() {
                changed = true;
                if self.settings.auto_change {
                    if let Some(worker) = &self.worker {
                        worker.set_auto_change(Some(self.settings.interval()));
                    }
                }
            }
        });

        ui.horizontal(|ui| {
            if ui
                .checkbox(&mut self.settings.auto_start, "Start with Windows")
                .changed()
            {
                let result = if self.settings.auto_start {
                    startup::enable()
                } else {
                    startup::disable()
                };
                if let Err(err) = result {
                    self.status = err.to_string();
                    self.settings.auto_start = !self.settings.auto_start;
                } else {
                    changed = true;
                }
            }
            if ui
                .checkbox(&mut self.settings.minimize_to_tray, "Minimize to tray on startup")
                .changed()
            {
                changed = true;
            }
            if ui.button("Hide to tray").clicked() {
                self.minimize_to_tray(ctx);
            }
        });

        ui.separator();

        ui.horizontal(|ui| {
            let generate = ui.add_enabled(
                !self.generating,
                egui::Button::new(if self.generating {
                    "Generating..."
                } else {
                    "Generate wallpaper"
                }),
            );
            if generate.clicked() {
                self.request_generation();
            }
            ui.label(format!("Status: {}", self.status));
        });

        ui.separator();
        self.history_ui(ui);

        if changed {
            self.persist();
            self.sync_worker();
        }
    }

    /// Recent wallpapers written to the output folder, with one-click
    /// re-apply. History is unbounded; the folder belongs to the user.
    fn history_ui(&mut self, ui: &mut egui::Ui) {
        if self.history_dirty {
            self.history = wallpaper::list_generated(&self.output_dir());
            self.history_dirty = false;
        }
        ui.label(format!("History ({} wallpapers)", self.history.len()));
        egui::ScrollArea::vertical()
            .id_source("history_list")
            .max_height(160.0)
            .show(ui, |ui| {
                let mut to_apply = None;
                for path in &self.history {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    ui.horizontal(|ui| {
                        let current = self.last_applied.as_deref() == Some(path.as_path());
                        let label = if current {
                            RichText::new(name).strong()
                        } else {
                            RichText::new(name)
                        };
                        ui.label(label);
                        if ui.button("Apply").clicked() {
                            to_apply = Some(path.clone());
                        }
                    });
                }
                if let Some(path) = to_apply {
                    match wallpaper::set_wallpaper(&path) {
                        Ok(()) => {
                            self.status = format!("Re-applied {}", path.display());
                            self.last_applied = Some(path);
                        }
                        Err(err) => self.status = err.to_string(),
                    }
                }
            });
    }

    /// First-run setup: resolution, credentials, auto-start.
    fn setup_ui(&mut self, ui: &mut egui::Ui) {
        ui.heading("Welcome to PolliPaper");
        ui.label("A couple of choices and you are ready to generate wallpapers.");
        ui.separator();

        ui.horizontal(|ui| {
            ui.label("Resolution");
            egui::ComboBox::from_id_source("setup_resolution")
                .selected_text(&self.settings.resolution)
                .show_ui(ui, |ui| {
                    for res in SUPPORTED_RESOLUTIONS {
                        ui.selectable_value(&mut self.settings.resolution, res.to_string(), res);
                    }
                });
        });

        ui.horizontal(|ui| {
            ui.label("API key (optional)");
            ui.add(
                egui::TextEdit::singleline(&mut self.settings.api_key)
                    .hint_text("leave empty for anonymous access")
                    .desired_width(280.0),
            );
        });

        ui.horizontal(|ui| {
            ui.label("Model");
            egui::ComboBox::from_id_source("setup_model")
                .selected_text(&self.settings.model)
                .show_ui(ui, |ui| {
                    for model in AVAILABLE_MODELS {
                        ui.selectable_value(&mut self.settings.model, model.to_string(), model);
                    }
                });
        });

        ui.checkbox(&mut self.settings.auto_start, "Start with Windows");

        ui.separator();
        ui.horizontal(|ui| {
            if ui
                .add_enabled(self.setup_test.is_none(), egui::Button::new("Test connection"))
                .clicked()
            {
                let (tx, rx) = mpsc::channel();
                let api_key = self.settings.api_key.clone();
                let model = self.settings.model.clone();
                thread::spawn(move || {
                    let client = PollinationsClient::new(&api_key, &model);
                    let _ = tx.send(client.test_connection());
                });
                self.setup_test = Some(rx);
                self.setup_test_result = None;
            }
            let mut finished = None;
            if let Some(rx) = &self.setup_test {
                match rx.try_recv() {
                    Ok(result) => finished = Some(result),
                    Err(mpsc::TryRecvError::Empty) => {
                        ui.label("Testing...");
                    }
                    Err(mpsc::TryRecvError::Disconnected) => finished = Some(false),
                }
            }
            if let Some(result) = finished {
                self.setup_test_result = Some(result);
                self.setup_test = None;
            }
            match self.setup_test_result {
                Some(true) => {
                    ui.label(RichText::new("Connection OK").strong());
                }
                Some(false) => {
                    ui.label("Connection failed. Check your network or key.");
                }
                None => {}
            }
        });

        ui.separator();
        if ui.button("Get started").clicked() {
            if self.settings.auto_start {
                if let Err(err) = startup::enable() {
                    warn!("could not enable auto-start: {err}");
                    self.settings.auto_start = false;
                }
            }
            self.settings.setup_complete = true;
            self.persist();
            if let Some(worker) = &self.worker {
                worker.set_credentials(&self.settings.api_key, &self.settings.model);
            }
            self.sync_worker();
        }
    }

    fn error_dialog_ui(&mut self, ctx: &egui::Context) {
        let mut close = false;
        if let Some(message) = &self.error_dialog {
            egui::Window::new("Generation failed")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(message);
                    ui.label(
                        RichText::new(
                            "Check your connection, API key, and wallpaper permissions.",
                        )
                        .weak(),
                    );
                    if ui.button("OK").clicked() {
                        close = true;
                    }
                });
        }
        if close {
            self.error_dialog = None;
        }
    }

    /// Folder wallpapers are written to, honoring the settings override.
    fn output_dir(&self) -> PathBuf {
        if let Some(folder) = &self.settings.save_folder {
            return PathBuf::from(folder);
        }
        wallpaper::default_output_dir().unwrap_or_else(|_| PathBuf::from("."))
    }

    /// Drop-while-busy manual trigger; the worker serializes anything that
    /// slips past this guard anyway.
    fn request_generation(&mut self) {
        if self.generating {
            return;
        }
        self.sync_worker();
        if let Some(worker) = &self.worker {
            worker.generate_now();
            self.generating = true;
            self.status = "Creating your wallpaper...".to_string();
        }
    }

    /// Push the current settings snapshot to the worker so the next cycle
    /// (manual or timer) uses them.
    fn sync_worker(&self) {
        if let Some(worker) = &self.worker {
            worker.configure(job_spec(&self.settings, self.mode, &self.custom_prompt));
            worker.set_credentials(&self.settings.api_key, &self.settings.model);
        }
    }

    fn persist(&mut self) {
        self.settings.last_mode = self.mode;
        self.settings.custom_prompt = self.custom_prompt.clone();
        if let Err(err) = settings::save(&self.settings) {
            self.status = err.to_string();
        }
    }

    fn drain_events(&mut self) {
        if let Some(worker) = &self.worker {
            worker.drain_events(&mut self.event_buf);
        }
        for event in self.event_buf.drain(..) {
            match event {
                WorkerEvent::Status(message) => self.status = message,
                WorkerEvent::Applied {
                    path,
                    sub_condition,
                } => {
                    self.generating = false;
                    self.status = format!("Set {sub_condition} wallpaper");
                    self.last_applied = Some(path);
                    self.history_dirty = true;
                }
                WorkerEvent::Failed(message) => {
                    self.generating = false;
                    self.status = "Generation failed".to_string();
                    self.error_dialog = Some(message);
                }
                WorkerEvent::Cancelled => {
                    self.generating = false;
                    self.status = "Cancelled".to_string();
                }
            }
        }
    }

    fn handle_tray_events(&mut self, ctx: &egui::Context) {
        if let Some(minimized) = ctx.input(|i| i.viewport().minimized) {
            if minimized {
                self.minimize_to_tray(ctx);
            }
        }

        if self.minimize_pending {
            self.minimize_pending = false;
            self.minimize_to_tray(ctx);
        }

        if self.tray_flags.restore.swap(false, Ordering::SeqCst) {
            self.restore_from_tray(ctx);
        }
        if self.tray_flags.generate.swap(false, Ordering::SeqCst) {
            self.request_generation();
        }
        if self.tray_flags.quit.swap(false, Ordering::SeqCst) {
            self.persist();
            if let Some(worker) = self.worker.take() {
                worker.stop();
            }
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn minimize_to_tray(&mut self, ctx: &egui::Context) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
        ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
        if let Some(tray_icon) = &self.tray_icon {
            let _ = tray_icon.set_visible(true);
        }
    }

    fn restore_from_tray(&mut self, ctx: &egui::Context) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
        ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(false));
        ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
        if let Some(tray_icon) = &self.tray_icon {
            let _ = tray_icon.set_visible(false);
        }
    }
}

impl Drop for PolliPaperApp {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}

impl eframe::App for PolliPaperApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.ui(ctx);
    }
}

/// Snapshot the settings into a worker job.
fn job_spec(settings: &AppSettings, mode: Mode, custom_prompt: &str) -> JobSpec {
    let (width, height) = settings.dimensions();
    let output_dir = settings
        .save_folder
        .as_ref()
        .map(PathBuf::from)
        .or_else(|| wallpaper::default_output_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    JobSpec {
        mode,
        custom_prompt: custom_prompt.to_string(),
        width,
        height,
        enhance: settings.enhance_prompts,
        style: settings.style,
        output_dir,
    }
}

fn create_tray_icon(flags: &Arc<TrayFlags>, cc: &CreationContext<'_>) -> Option<TrayIcon> {
    let icon = default_tray_icon()?;

    let open_item = MenuItem::with_id("open", "Open PolliPaper", true, None);
    let generate_item = MenuItem::with_id("generate", "Generate Now", true, None);
    let quit_item = MenuItem::with_id("quit", "Quit", true, None);
    let menu = Menu::with_items(&[&open_item, &generate_item, &quit_item]).ok()?;

    let tray_icon = TrayIconBuilder::new()
        .with_tooltip("PolliPaper")
        .with_icon(icon)
        .with_menu(Box::new(menu))
        .build()
        .ok()?;
    let _ = tray_icon.set_visible(false);

    spawn_tray_threads(flags, cc);
    Some(tray_icon)
}

fn spawn_tray_threads(flags: &Arc<TrayFlags>, cc: &CreationContext<'_>) {
    let click_flags = Arc::clone(flags);
    #[cfg(windows)]
    let hwnd = window_hwnd_from_context(cc);
    #[cfg(not(windows))]
    let _ = cc;
    thread::spawn(move || loop {
        let Ok(event) = TrayIconEvent::receiver().recv() else {
            break;
        };
        if matches!(
            event,
            TrayIconEvent::Click { .. } | TrayIconEvent::DoubleClick { .. }
        ) {
            #[cfg(windows)]
            if let Some(hwnd) = hwnd {
                use windows::Win32::UI::WindowsAndMessaging::{
                    SetForegroundWindow, ShowWindow, SW_RESTORE,
                };
                unsafe {
                    let _ = ShowWindow(hwnd, SW_RESTORE);
                    let _ = SetForegroundWindow(hwnd);
                }
            }
            click_flags.restore.store(true, Ordering::SeqCst);
        }
    });

    let menu_flags = Arc::clone(flags);
    thread::spawn(move || loop {
        let Ok(event) = MenuEvent::receiver().recv() else {
            break;
        };
        match event.id.0.as_str() {
            "open" => menu_flags.restore.store(true, Ordering::SeqCst),
            "generate" => menu_flags.generate.store(true, Ordering::SeqCst),
            "quit" => menu_flags.quit.store(true, Ordering::SeqCst),
            _ => {}
        }
    });
}

#[cfg(windows)]
fn window_hwnd_from_context(
    cc: &CreationContext<'_>,
) -> Option<windows::Win32::Foundation::HWND> {
    use raw_window_handle::{HasWindowHandle, RawWindowHandle};

    let handle = cc.window_handle().ok()?;
    match handle.as_raw() {
        RawWindowHandle::Win32(win32) => Some(windows::Win32::Foundation::HWND(win32.hwnd.get())),
        _ => None,
    }
}

fn default_tray_icon() -> Option<Icon> {
    let size = 16u32;
    let mut rgba = Vec::with_capacity((size * size * 4) as usize);
    // Simple generated icon so the tray is always visible.
    for y in 0..size {
        for x in 0..size {
            let border = x == 0 || y == 0 || x == size - 1 || y == size - 1;
            let (r, g, b) = if border {
                (251, 191, 36)
            } else {
                (139, 92, 246)
            };
            rgba.extend_from_slice(&[r, g, b, 255]);
        }
    }
    Icon::from_rgba(rgba, size, size).ok()
}
