use eframe::egui;
use stillcam::config::{MAX_FPS, MIN_FPS, PRESET_RESOLUTIONS};
use stillcam::Controller;

/// File types offered first in the picker. Anything else still loads if
/// the decoder recognises it.
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

const WARNING_COLOR: egui::Color32 = egui::Color32::from_rgb(230, 160, 0);

pub struct StillcamApp {
    controller: Controller,
    preview: Option<(egui::TextureHandle, u64)>,
    error: Option<String>,
}

impl StillcamApp {
    pub fn new(controller: Controller) -> Self {
        Self {
            controller,
            preview: None,
            error: None,
        }
    }

    fn pick_image(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .set_title("Select image")
            .add_filter("Images", &IMAGE_EXTENSIONS)
            .add_filter("All files", &["*"])
            .pick_file()
        else {
            return;
        };

        // Failures come back through take_error
        let _ = self.controller.select_image(path);
    }

    fn sync_preview(&mut self, ctx: &egui::Context) {
        let Some((image, generation)) = self.controller.preview() else {
            return;
        };
        if self.preview.as_ref().is_some_and(|(_, g)| *g == generation) {
            return;
        }

        let size = [image.width() as usize, image.height() as usize];
        let color = egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw());
        let texture = ctx.load_texture("preview", color, egui::TextureOptions::LINEAR);
        self.preview = Some((texture, generation));
    }

    fn image_panel(&mut self, ui: &mut egui::Ui) {
        let running = self.controller.is_running();

        ui.group(|ui| {
            ui.label(egui::RichText::new("Image").strong());
            match &self.preview {
                Some((texture, _)) => {
                    ui.image((texture.id(), texture.size_vec2()));
                }
                None => {
                    ui.label("No image selected");
                }
            }

            if ui
                .add_enabled(!running, egui::Button::new("Select image..."))
                .clicked()
            {
                self.pick_image();
            }
        });
    }

    fn control_panel(&mut self, ui: &mut egui::Ui) {
        let running = self.controller.is_running();

        ui.group(|ui| {
            ui.label(egui::RichText::new("Camera").strong());

            ui.add_enabled_ui(!running, |ui| {
                let mut resolution = self.controller.resolution_text().to_owned();
                egui::ComboBox::from_label("Resolution")
                    .selected_text(resolution.clone())
                    .show_ui(ui, |ui| {
                        for preset in PRESET_RESOLUTIONS {
                            let text = preset.to_string();
                            ui.selectable_value(&mut resolution, text.clone(), text);
                        }
                    });
                if resolution != self.controller.resolution_text() {
                    self.controller.set_resolution(resolution);
                }

                let mut fps = self.controller.fps();
                ui.add(egui::Slider::new(&mut fps, MIN_FPS..=MAX_FPS).text("FPS"));
                if fps != self.controller.fps() {
                    self.controller.set_fps(fps);
                }
            });

            ui.label(format!("Pixel format: {}", self.controller.pixel_format()));

            ui.horizontal(|ui| {
                if ui
                    .add_enabled(
                        self.controller.can_start(),
                        egui::Button::new("Start virtual camera"),
                    )
                    .clicked()
                {
                    // Failures come back through take_error
                    let _ = self.controller.start();
                }
                if ui.add_enabled(running, egui::Button::new("Stop")).clicked() {
                    self.controller.stop();
                }
            });
        });
    }

    fn error_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.error.clone() else {
            return;
        };

        let mut dismissed = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(message.as_str());
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });

        if dismissed {
            self.error = None;
        }
    }
}

impl eframe::App for StillcamApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.controller.poll_events();
        if self.error.is_none() {
            self.error = self.controller.take_error();
        }
        self.sync_preview(ctx);

        if !self.controller.warnings().is_empty() {
            egui::TopBottomPanel::top("warnings").show(ctx, |ui| {
                for warning in self.controller.warnings() {
                    ui.colored_label(WARNING_COLOR, format!("Warning: {}", warning));
                }
            });
        }

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(self.controller.status());
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Virtual Camera Control Panel");
            ui.separator();
            ui.columns(2, |columns| {
                self.image_panel(&mut columns[0]);
                self.control_panel(&mut columns[1]);
            });
        });

        self.error_window(ctx);
    }
}
