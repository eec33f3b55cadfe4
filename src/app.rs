use crate::catalog::{LibraryCatalog, LibrarySelection};
use crate::event::AppEvent;
use crate::health::ApiStatus;
use crate::session::{GenerationRequest, SessionController, SessionState, SessionStatus};
use crate::transport::Connector;
use eframe::egui::{self, Color32, RichText, ScrollArea};
use std::fs;
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const BUSY_REPAINT_INTERVAL: Duration = Duration::from_millis(100);

pub struct CodinitApp<C: Connector> {
    rx: Receiver<AppEvent>,
    controller: SessionController<C>,
    catalog: LibraryCatalog,
    selection: LibrarySelection,
    api_status: ApiStatus,
    source_path: String,
    source_code: String,
    prompt: String,
    last_status: SessionStatus,
    diagnostics_log: Vec<String>,
}

impl<C: Connector> CodinitApp<C> {
    pub fn new(
        rx: Receiver<AppEvent>,
        controller: SessionController<C>,
        catalog: LibraryCatalog,
    ) -> Self {
        Self {
            rx,
            controller,
            catalog,
            selection: LibrarySelection::default(),
            api_status: ApiStatus::Unknown,
            source_path: String::new(),
            source_code: String::new(),
            prompt: String::new(),
            last_status: SessionStatus::Idle,
            diagnostics_log: Vec::new(),
        }
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    fn status_label(status: SessionStatus) -> (&'static str, Color32) {
        match status {
            SessionStatus::Idle => ("Idle", Color32::GRAY),
            SessionStatus::Connecting => ("Connecting...", Color32::YELLOW),
            SessionStatus::Awaiting => ("Generating...", Color32::YELLOW),
            SessionStatus::Completed => ("Completed", Color32::LIGHT_GREEN),
            SessionStatus::Failed => ("Failed", Color32::RED),
        }
    }

    fn api_status_color(status: ApiStatus) -> Color32 {
        match status {
            ApiStatus::Unknown => Color32::GRAY,
            ApiStatus::Online => Color32::LIGHT_GREEN,
            ApiStatus::Offline => Color32::RED,
        }
    }

    fn load_source_file(&mut self) {
        let path = self.source_path.trim().to_string();
        if path.is_empty() {
            return;
        }
        match fs::read_to_string(&path) {
            Ok(contents) => {
                self.source_code = contents;
                self.log_diagnostic(format!("loaded source from {path}"));
            }
            Err(err) => {
                tracing::warn!(%path, error = %err, "failed to load source file");
                self.log_diagnostic(format!("failed to load {path}: {err}"));
            }
        }
    }

    fn submit_generation(&mut self) {
        if self.selection.is_empty() {
            self.log_diagnostic("no libraries selected");
        }
        let libraries = self.catalog.resolve_selection(&self.selection);
        let request =
            GenerationRequest::new(self.source_code.clone(), self.prompt.trim(), libraries);
        match self.controller.start(request) {
            Ok(session) => self.log_diagnostic(format!("{session} started")),
            Err(err) => self.log_diagnostic(format!("generate rejected: {err}")),
        }
        self.note_status_change();
    }

    fn note_status_change(&mut self) {
        let status = self.controller.status();
        if status == self.last_status {
            return;
        }
        self.last_status = status;
        let state = self.controller.snapshot();
        if status == SessionStatus::Failed {
            self.log_diagnostic(format!("session failed: {}", state.error));
        } else {
            self.log_diagnostic(format!("session status changed: {}", status.as_str()));
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, ctx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: &egui::Context) {
        match event {
            AppEvent::Channel(envelope) => {
                self.controller.handle(envelope);
                self.note_status_change();
            }
            AppEvent::HealthChecked(status) => {
                self.api_status = status;
                self.log_diagnostic(format!("api status: {}", status.label()));
            }
        }
        ctx.request_repaint();
    }

    fn render_top_bar(&mut self, ctx: &egui::Context, state: &SessionState) {
        let (status_label, status_color) = Self::status_label(state.status);
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("CodInit");
                ui.label(concat!("v", env!("CARGO_PKG_VERSION")));
                ui.separator();
                ui.label(
                    RichText::new(format!("API: {}", self.api_status.label()))
                        .color(Self::api_status_color(self.api_status)),
                );
                ui.separator();
                ui.label(RichText::new(status_label).color(status_color));
            });
        });
    }

    fn render_source_panel(&mut self, ctx: &egui::Context, state: &SessionState) {
        egui::SidePanel::left("source_panel")
            .resizable(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                ui.heading("my_code.py");
                ui.horizontal(|ui| {
                    ui.add(
                        egui::TextEdit::singleline(&mut self.source_path)
                            .hint_text("path to a source file"),
                    );
                    if ui
                        .add_enabled(!state.is_busy(), egui::Button::new("Load"))
                        .clicked()
                    {
                        self.load_source_file();
                    }
                });
                ui.separator();
                ScrollArea::vertical()
                    .id_salt("source_code")
                    .show(ui, |ui| {
                        ui.add_enabled(
                            !state.is_busy(),
                            egui::TextEdit::multiline(&mut self.source_code)
                                .code_editor()
                                .desired_width(f32::INFINITY)
                                .desired_rows(24),
                        );
                    });
            });
    }

    fn render_output_panel(&mut self, ctx: &egui::Context, state: &SessionState) {
        egui::SidePanel::right("output_panel")
            .resizable(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                ui.heading("magic_code.py");
                ui.separator();

                ui.strong("Plan");
                ScrollArea::vertical()
                    .id_salt("plan_output")
                    .max_height(140.0)
                    .show(ui, |ui| {
                        if state.plan.is_empty() {
                            ui.label(RichText::new("No plan yet").color(Color32::GRAY));
                        } else {
                            ui.label(state.plan.as_str());
                        }
                    });

                ui.separator();
                ui.strong("Code");
                let mut code = state.code.clone();
                ScrollArea::vertical()
                    .id_salt("code_output")
                    .max_height(320.0)
                    .show(ui, |ui| {
                        ui.add(
                            egui::TextEdit::multiline(&mut code)
                                .code_editor()
                                .interactive(false)
                                .desired_width(f32::INFINITY),
                        );
                    });

                if state.has_error() {
                    ui.separator();
                    ui.label(RichText::new(state.error.as_str()).color(Color32::RED));
                }
            });
    }

    fn render_center_panel(&mut self, ctx: &egui::Context, state: &SessionState) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Code Prompt");
            ui.separator();
            ui.add_enabled(
                !state.is_busy(),
                egui::TextEdit::multiline(&mut self.prompt)
                    .desired_width(f32::INFINITY)
                    .desired_rows(6)
                    .hint_text("What do you want to create?"),
            );

            ui.add_space(8.0);
            ui.label("Select the libraries you want to use");
            let mut toggled: Option<String> = None;
            ui.horizontal_wrapped(|ui| {
                for entry in self.catalog.entries() {
                    let selected = self.selection.contains(&entry.name);
                    let response = ui
                        .add_enabled(
                            !state.is_busy(),
                            egui::SelectableLabel::new(selected, entry.name.as_str()),
                        )
                        .on_hover_text(entry.reference.as_str());
                    if response.clicked() {
                        toggled = Some(entry.name.clone());
                    }
                }
            });
            if let Some(name) = toggled {
                self.selection.toggle(&name);
            }

            ui.add_space(8.0);
            let mut generate = false;
            let mut cancel = false;
            ui.horizontal(|ui| {
                generate = ui
                    .add_enabled(!state.is_busy(), egui::Button::new("Generate"))
                    .clicked();
                cancel = ui
                    .add_enabled(state.is_busy(), egui::Button::new("Cancel"))
                    .clicked();
                if state.is_busy() {
                    ui.spinner();
                }
            });
            if generate {
                self.submit_generation();
            }
            if cancel {
                self.controller.cancel();
                self.note_status_change();
            }

            ui.separator();
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(160.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics_log {
                                ui.label(entry);
                            }
                        });
                });
        });
    }
}

impl<C: Connector> eframe::App for CodinitApp<C> {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        let state = self.controller.snapshot();
        self.render_top_bar(ctx, &state);
        self.render_source_panel(ctx, &state);
        self.render_output_panel(ctx, &state);
        self.render_center_panel(ctx, &state);

        if self.controller.status().is_busy() {
            ctx.request_repaint_after(BUSY_REPAINT_INTERVAL);
        }
    }
}
