use eframe::egui;
use crate::bootstrap::{game_assets, BootError, Bootstrap, Shell};
use crate::clicker::{ClickKind, Clicker};
use crate::config::*;
use crate::exit::{ExitGuard, PromptOutcome};
use crate::provision::{HttpTransport, Progress};
use crate::store::Store;
use crate::updates::{self, UpdateStatus};
use log::{debug, error, info, warn};
use rand::Rng;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

const BUTTON_SIZE: f32 = 256.0;
const MENU_ICON_SIZE: f32 = 40.0;
const POPUP_LIFETIME: Duration = Duration::from_millis(800);
const POPUP_RISE: f32 = 60.0;

/// Messages from the bootstrap thread to the UI thread.
pub enum BootEvent {
    ShowLoading,
    Progress(Progress),
    OpenMain(Sender<Result<(), String>>),
    CloseLoading,
    Failed(String),
}

pub struct ChannelShell {
    tx: Sender<BootEvent>,
    ctx: egui::Context,
}

impl ChannelShell {
    fn send(&self, event: BootEvent) {
        if self.tx.send(event).is_err() {
            debug!("UI is gone, dropping bootstrap event.");
        }
        self.ctx.request_repaint();
    }
}

impl Shell for ChannelShell {
    fn show_loading(&mut self) {
        self.send(BootEvent::ShowLoading);
    }

    fn report(&mut self, progress: &Progress) {
        self.send(BootEvent::Progress(progress.clone()));
    }

    fn open_main(&mut self) -> Result<(), BootError> {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.send(BootEvent::OpenMain(ack_tx));
        match ack_rx.recv_timeout(MAIN_LOAD_TIMEOUT) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(msg)) => Err(BootError::MainSurface(msg)),
            Err(e) => Err(BootError::MainSurface(e.to_string())),
        }
    }

    fn close_loading(&mut self) {
        self.send(BootEvent::CloseLoading);
    }
}

fn spawn_bootstrap(store: Store, ctx: egui::Context, tx: Sender<BootEvent>) {
    thread::spawn(move || {
        let assets = game_assets(store.paths());
        let transport = HttpTransport::new();
        let mut shell = ChannelShell { tx, ctx };

        let mut boot = Bootstrap::new(&store, &transport, &assets, &mut shell);
        let result = boot.run();
        info!("Startup ended in phase {:?}.", boot.phase());
        if let Err(e) = result {
            shell.send(BootEvent::Failed(e.to_string()));
            thread::sleep(FAIL_EXIT_DELAY);
            error!("Exiting after failed startup.");
            std::process::exit(EXIT_BOOT_FAILED);
        }
    });
}

fn progress_bar(ui: &mut egui::Ui, percent: u8) {
    let desired_width = ui.available_width().min(400.0);
    let height = 24.0;
    let (response, painter) = ui.allocate_painter(
        egui::vec2(desired_width, height),
        egui::Sense::hover(),
    );

    // Draw the track
    painter.rect_filled(
        response.rect,
        egui::Rounding::same(8.0),
        egui::Color32::from_rgb(60, 60, 60),
    );

    // Draw the fill
    let fill_width = response.rect.width() * percent.min(100) as f32 / 100.0;
    let fill_rect = egui::Rect::from_min_size(
        response.rect.left_top(),
        egui::vec2(fill_width, height),
    );
    painter.rect_filled(
        fill_rect,
        egui::Rounding::same(8.0),
        egui::Color32::from_rgb(100, 200, 255),
    );
}

fn custom_toggle(ui: &mut egui::Ui, enabled: bool, text: &str) -> egui::Response {
    let desired_size = egui::vec2(ui.available_width(), 34.0);
    let (response, painter) = ui.allocate_painter(desired_size, egui::Sense::click());

    let bg_color = if enabled {
        egui::Color32::from_rgb(0, 120, 212)
    } else {
        egui::Color32::from_rgb(60, 60, 60)
    };
    painter.rect_filled(response.rect, egui::Rounding::same(6.0), bg_color);

    let text_color = if enabled {
        egui::Color32::from_rgb(255, 255, 255)
    } else {
        egui::Color32::from_rgb(200, 200, 200)
    };
    painter.text(
        response.rect.left_center() + egui::vec2(12.0, 0.0),
        egui::Align2::LEFT_CENTER,
        text,
        egui::FontId::proportional(15.0),
        text_color,
    );
    painter.text(
        response.rect.right_center() - egui::vec2(12.0, 0.0),
        egui::Align2::RIGHT_CENTER,
        if enabled { "On" } else { "Off" },
        egui::FontId::proportional(15.0),
        text_color,
    );

    response
}

fn load_texture(ctx: &egui::Context, name: &str, path: &Path) -> Result<egui::TextureHandle, String> {
    // GIFs decode to their first frame.
    let image = image::open(path)
        .map_err(|e| format!("{}: {}", path.display(), e))?
        .to_rgba8();
    let size = [image.width() as usize, image.height() as usize];
    let color_image = egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
    Ok(ctx.load_texture(name, color_image, egui::TextureOptions::default()))
}

#[derive(Default)]
struct LoadingSurface {
    label: String,
    percent: u8,
}

impl LoadingSurface {
    fn show(&self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.add_space(ui.available_height() / 2.0 - 60.0);
                ui.heading(if self.label.is_empty() { "Loading..." } else { self.label.as_str() });
                ui.add_space(10.0);
                progress_bar(ui, self.percent);
                ui.add_space(6.0);
                ui.label(format!("{}%", self.percent));
            });
        });
    }
}

struct Popup {
    pos: egui::Pos2,
    born: Instant,
}

struct MainSurface {
    clicker: Clicker,
    button: egui::TextureHandle,
    menu: egui::TextureHandle,
    settings_open: bool,
    exit: ExitGuard,
    popups: Vec<Popup>,
    updates: Option<Receiver<UpdateStatus>>,
    update_notice: Option<String>,
}

impl MainSurface {
    /// Fully loaded on return: settings read and both textures uploaded.
    fn load(ctx: &egui::Context, store: Store) -> Result<Self, String> {
        let button = load_texture(ctx, "button", &store.paths().button_image)?;
        let menu = load_texture(ctx, "menu", &store.paths().menu_image)?;
        let clicker = Clicker::load(store);
        let updates = clicker
            .config()
            .get(OPT_CHECK_UPDATES)
            .then(|| updates::spawn_check(ctx.clone()));

        info!("Main window loaded with score {}.", clicker.score());
        Ok(Self {
            clicker,
            button,
            menu,
            settings_open: false,
            exit: ExitGuard::default(),
            popups: Vec::new(),
            updates,
            update_notice: None,
        })
    }

    fn poll_updates(&mut self) {
        let Some(rx) = &self.updates else { return };
        if let Ok(status) = rx.try_recv() {
            if let UpdateStatus::Available(version) = status {
                self.update_notice = Some(format!("Version {} is available!", version));
            }
            self.updates = None;
        }
    }

    fn score(&mut self, kind: ClickKind, at: Option<egui::Pos2>) {
        if !self.clicker.register(kind) {
            return;
        }
        if let Some(pos) = at {
            let mut rng = rand::thread_rng();
            let jitter = egui::vec2(rng.gen_range(-24.0..24.0), rng.gen_range(-8.0..8.0));
            self.popups.push(Popup {
                pos: pos + jitter,
                born: Instant::now(),
            });
        }
    }

    fn show_menu(&mut self, ui: &mut egui::Ui) {
        let icon = egui::load::SizedTexture::new(
            self.menu.id(),
            egui::vec2(MENU_ICON_SIZE, MENU_ICON_SIZE),
        );
        if ui
            .add(egui::Image::new(icon).sense(egui::Sense::click()))
            .on_hover_text("Settings")
            .clicked()
        {
            self.settings_open = !self.settings_open;
        }
        if ui.button("Exit").clicked() {
            self.exit.request_close();
        }
    }

    fn show_settings(&mut self, ctx: &egui::Context) {
        let mut open = self.settings_open;
        let mut toggled: Option<String> = None;
        egui::Window::new("Settings")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                for (key, enabled) in self.clicker.config().iter() {
                    if custom_toggle(ui, enabled, key).clicked() {
                        toggled = Some(key.to_string());
                    }
                    ui.add_space(4.0);
                }
            });
        if let Some(key) = toggled {
            self.clicker.toggle_option(&key);
        }
        self.settings_open = open;
    }

    // Returns true once the player confirmed leaving.
    fn show_exit_prompt(&mut self, ctx: &egui::Context) -> bool {
        if !self.exit.is_pending() {
            return false;
        }
        let mut outcome = None;
        egui::Window::new("Leave the game?")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(format!(
                    "Are you sure? Type '{}' and press Enter to leave, Esc to stay.",
                    EXIT_CONFIRM_WORD
                ));
                ui.text_edit_singleline(self.exit.input_mut()).request_focus();
                self.exit.clamp_input();
                if ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                    outcome = Some(self.exit.submit());
                } else if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                    self.exit.cancel();
                    outcome = Some(PromptOutcome::Cancelled);
                }
            });
        outcome == Some(PromptOutcome::Confirmed)
    }

    fn draw_popups(&mut self, ctx: &egui::Context) {
        self.popups.retain(|p| p.born.elapsed() < POPUP_LIFETIME);
        if self.popups.is_empty() {
            return;
        }
        let painter = ctx.layer_painter(egui::LayerId::new(
            egui::Order::Foreground,
            egui::Id::new("score_popups"),
        ));
        for popup in &self.popups {
            let t = popup.born.elapsed().as_secs_f32() / POPUP_LIFETIME.as_secs_f32();
            let alpha = ((1.0 - t) * 255.0) as u8;
            painter.text(
                popup.pos - egui::vec2(0.0, POPUP_RISE * t),
                egui::Align2::CENTER_CENTER,
                "+1",
                egui::FontId::proportional(24.0),
                egui::Color32::from_rgba_unmultiplied(255, 255, 255, alpha),
            );
        }
        ctx.request_repaint();
    }

    fn show(&mut self, ctx: &egui::Context) -> bool {
        self.poll_updates();

        let scroll_notches = ctx.input(|i| {
            i.events
                .iter()
                .filter(|e| matches!(e, egui::Event::Scroll(delta) if delta.y != 0.0))
                .count()
        });

        egui::TopBottomPanel::top("menu").show(ctx, |ui| {
            if self.clicker.config().get(OPT_VERTICAL_MENU) {
                ui.vertical(|ui| self.show_menu(ui));
            } else {
                ui.horizontal(|ui| self.show_menu(ui));
            }
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading(format!("Points: {}", self.clicker.score()));

                if let Some(notice) = &self.update_notice {
                    ui.label(notice.as_str());
                }
                if self.clicker.save_failed() {
                    ui.colored_label(
                        egui::Color32::from_rgb(230, 80, 80),
                        "Your progress could not be saved.",
                    );
                }

                ui.add_space(20.0);

                let size = self.button.size_vec2();
                let scale = BUTTON_SIZE / size.max_elem().max(1.0);
                let image = egui::load::SizedTexture::new(self.button.id(), size * scale);
                let response = ui.add(egui::Image::new(image).sense(egui::Sense::click()));

                // Input is frozen while the exit prompt is up.
                if self.exit.is_pending() {
                    return;
                }
                let at = response.interact_pointer_pos().or(response.hover_pos());
                if response.clicked() {
                    self.score(ClickKind::Left, at);
                }
                if response.secondary_clicked() {
                    self.score(ClickKind::Right, at);
                }
                if response.middle_clicked() {
                    self.score(ClickKind::Middle, at);
                }
                if response.hovered() {
                    for _ in 0..scroll_notches {
                        self.score(ClickKind::Scroll, at);
                    }
                }
            });
        });

        if self.settings_open {
            self.show_settings(ctx);
        }
        self.draw_popups(ctx);
        self.show_exit_prompt(ctx)
    }
}

pub struct ClickerApp {
    store: Store,
    events: Receiver<BootEvent>,
    loading: Option<LoadingSurface>,
    main: Option<MainSurface>,
    failure: Option<String>,
}

impl ClickerApp {
    pub fn new(cc: &eframe::CreationContext<'_>, store: Store) -> Self {
        // Set custom visual style
        let mut style = (*cc.egui_ctx.style()).clone();
        style.visuals.widgets.noninteractive.bg_fill = egui::Color32::from_rgb(40, 40, 40);
        style.visuals.widgets.inactive.bg_fill = egui::Color32::from_rgb(60, 60, 60);
        style.visuals.widgets.hovered.bg_fill = egui::Color32::from_rgb(80, 80, 80);
        style.visuals.widgets.active.bg_fill = egui::Color32::from_rgb(100, 100, 100);
        style.visuals.widgets.inactive.rounding = egui::Rounding::same(8.0);
        style.visuals.widgets.hovered.rounding = egui::Rounding::same(8.0);
        style.visuals.widgets.active.rounding = egui::Rounding::same(8.0);
        cc.egui_ctx.set_style(style);

        Self::start(&cc.egui_ctx, store)
    }

    // Waits for the first word from startup, so the first frame already
    // shows the loading surface or a fully loaded main surface.
    fn start(ctx: &egui::Context, store: Store) -> Self {
        let (tx, events) = mpsc::channel();
        spawn_bootstrap(store.clone(), ctx.clone(), tx);

        let mut app = Self {
            store,
            events,
            loading: None,
            main: None,
            failure: None,
        };
        match app.events.recv_timeout(MAIN_LOAD_TIMEOUT) {
            Ok(event) => app.handle_boot_event(ctx, event),
            Err(e) => warn!("No word from startup before the first frame: {}", e),
        }
        app
    }

    fn handle_boot_events(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_boot_event(ctx, event);
        }
    }

    fn handle_boot_event(&mut self, ctx: &egui::Context, event: BootEvent) {
        match event {
            BootEvent::ShowLoading => self.loading = Some(LoadingSurface::default()),
            BootEvent::Progress(progress) => {
                if let Some(loading) = &mut self.loading {
                    loading.label = progress.label;
                    loading.percent = progress.percent;
                }
            }
            BootEvent::OpenMain(ack) => {
                let loaded = MainSurface::load(ctx, self.store.clone());
                let reply = match loaded {
                    Ok(main) => {
                        self.main = Some(main);
                        Ok(())
                    }
                    Err(e) => {
                        error!("Could not load the main window: {}", e);
                        Err(e)
                    }
                };
                if ack.send(reply).is_err() {
                    debug!("Startup stopped waiting for the main window.");
                }
            }
            BootEvent::CloseLoading => self.loading = None,
            BootEvent::Failed(msg) => {
                self.loading = None;
                self.failure = Some(msg);
            }
        }
    }

    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.viewport().close_requested()) {
            return;
        }
        match (&mut self.main, &self.loading) {
            (Some(main), None) => {
                if !main.exit.may_close() {
                    ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                    main.exit.request_close();
                }
            }
            // Startup and the loading screen cannot be closed.
            _ if self.failure.is_none() => {
                ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            }
            _ => {}
        }
    }
}

impl eframe::App for ClickerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_boot_events(ctx);
        self.handle_close_request(ctx);

        if let Some(loading) = &self.loading {
            loading.show(ctx);
        } else if let Some(main) = &mut self.main {
            if main.show(ctx) {
                info!("Exit confirmed.");
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        } else if let Some(msg) = &self.failure {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading("The game could not start");
                    ui.label(msg.as_str());
                    ui.label("Closing shortly...");
                });
            });
        } else {
            egui::CentralPanel::default().show(ctx, |_ui| {});
        }
    }
}
