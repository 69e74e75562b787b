mod api;
mod app;
mod context;
mod modes;
mod settings;
mod startup;
mod wallpaper;
mod worker;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let started_from_startup = std::env::args().any(|arg| arg == "--startup");
    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([560.0, 640.0])
            .with_min_inner_size([480.0, 480.0]),
        ..Default::default()
    };
    eframe::run_native(
        "PolliPaper",
        native_options,
        Box::new(move |cc| Box::new(app::PolliPaperApp::new(cc, started_from_startup))),
    )?;
    Ok(())
}
