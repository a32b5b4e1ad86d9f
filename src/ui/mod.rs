use std::sync::Arc;

use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div,
    img, px,
};
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};

use crate::{
    pipeline::NokhwaOpener,
    session::{DisplayState, SessionController},
    types::StylizedImage,
};

mod capture_view;
mod detail_view;
mod render_util;

type Controller = SessionController<NokhwaOpener>;

const PREVIEW_MAX_SIZE: (f32, f32) = (720.0, 540.0);

pub fn launch_ui(app: &mut App, controller: Controller) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Starry Camera".into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(controller));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    screen: Screen,
    controller: Controller,
    preview_image: Option<Arc<RenderImage>>,
    styled_source: Option<Arc<StylizedImage>>,
    styled_image: Option<Arc<RenderImage>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Screen {
    Start,
    Session,
}

impl AppView {
    fn new(controller: Controller) -> Self {
        Self {
            screen: Screen::Start,
            controller,
            preview_image: None,
            styled_source: None,
            styled_image: None,
        }
    }

    fn enter_session(&mut self) {
        self.controller.open_camera();
        self.screen = Screen::Session;
    }

    fn leave_session(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        self.controller.close();
        self.clear_images(window, cx);
        self.screen = Screen::Start;
    }

    fn retake(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        self.controller.retake();
        self.clear_images(window, cx);
    }

    fn sync_session(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        self.controller.poll();

        if let Some(frame) = self.controller.take_preview() {
            if let Some(image) = render_util::frame_to_image(&frame) {
                replace_image(&mut self.preview_image, image, window, cx);
            }
        }

        if let DisplayState::Displaying(stylized) = self.controller.state() {
            let fresh = self
                .styled_source
                .as_ref()
                .is_none_or(|shown| !Arc::ptr_eq(shown, stylized));
            if fresh {
                let stylized = stylized.clone();
                if let Some(image) = render_util::stylized_to_image(&stylized) {
                    replace_image(&mut self.styled_image, image, window, cx);
                }
                self.styled_source = Some(stylized);
            }
        }
    }

    fn clear_images(&mut self, window: &mut Window, cx: &mut Context<'_, Self>) {
        for slot in [&mut self.preview_image, &mut self.styled_image] {
            if let Some(old_image) = slot.take() {
                cx.drop_image(old_image, Some(window));
            }
        }
        self.styled_source = None;
    }

    fn render_start(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let (background, foreground, muted) = {
            let theme = cx.theme();
            (theme.background, theme.foreground, theme.muted_foreground)
        };

        v_flex()
            .size_full()
            .gap_4()
            .items_center()
            .justify_center()
            .bg(background)
            .child(
                div()
                    .text_xl()
                    .font_semibold()
                    .text_color(foreground)
                    .child("Starry Camera"),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(muted)
                    .child("Take a photo and see it painted as Starry Night"),
            )
            .child(
                Button::new(SharedString::from("start"))
                    .primary()
                    .label("Start")
                    .on_click(cx.listener(|this, _, _, cx| {
                        this.enter_session();
                        cx.notify();
                    })),
            )
            .into_any_element()
    }
}

// Explicitly drop the previous GPU texture; otherwise the sprite atlas keeps
// every frame and memory will climb rapidly while the camera is running.
fn replace_image(
    slot: &mut Option<Arc<RenderImage>>,
    new_image: Arc<RenderImage>,
    window: &mut Window,
    cx: &mut Context<'_, AppView>,
) {
    if let Some(old_image) = slot.replace(new_image) {
        cx.drop_image(old_image, Some(window));
    }
}

fn image_view(image: &Arc<RenderImage>) -> AnyElement {
    img(image.clone())
        .size_full()
        .object_fit(ObjectFit::Contain)
        .into_any_element()
}

fn centered_message(text: impl Into<SharedString>, color: gpui::Hsla) -> AnyElement {
    div()
        .size_full()
        .flex()
        .items_center()
        .justify_center()
        .text_sm()
        .text_color(color)
        .child(text.into())
        .into_any_element()
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        let body = match self.screen {
            Screen::Start => self.render_start(cx),
            Screen::Session => {
                // Keep rendering so camera frames and results show up promptly.
                cx.defer_in(window, |_, _, cx| {
                    cx.notify();
                });
                self.sync_session(window, cx);

                match self.controller.state().clone() {
                    DisplayState::AwaitingCapture => self.render_capture(cx),
                    DisplayState::Failed(kind) if self.controller.captured().is_none() => {
                        self.render_camera_failure(kind, cx)
                    }
                    state => self.render_detail(&state, cx),
                }
            }
        };

        let background = cx.theme().background;
        v_flex().size_full().bg(background).child(body)
    }
}
