use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, Context, IntoElement,
    PREVIEW_MAX_SIZE, ParentElement, SharedString, Styled, StyledExt, centered_message, div,
    h_flex, image_view, px, v_flex,
};
use crate::session::DisplayState;

impl AppView {
    pub(super) fn render_detail(
        &mut self,
        state: &DisplayState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let (foreground, muted, accent, border, panel) = {
            let theme = cx.theme();
            (
                theme.foreground,
                theme.muted_foreground,
                theme.accent,
                theme.border,
                theme.group_box,
            )
        };

        let (status, body) = match state {
            DisplayState::Predicting => (
                "⟳ Painting Starry Night...",
                centered_message("Painting Starry Night...", muted),
            ),
            DisplayState::Displaying(_) => match &self.styled_image {
                Some(image) => ("✓ Starry Night", image_view(image)),
                None => (
                    "⟳ Preparing image...",
                    centered_message("Preparing image...", muted),
                ),
            },
            DisplayState::Failed(kind) => (
                "✗ No image available",
                v_flex()
                    .size_full()
                    .gap_1()
                    .items_center()
                    .justify_center()
                    .child(
                        div()
                            .text_sm()
                            .font_semibold()
                            .text_color(accent)
                            .child("No image available"),
                    )
                    .child(div().text_xs().text_color(muted).child(kind.message()))
                    .into_any_element(),
            ),
            DisplayState::AwaitingCapture => ("", centered_message("", muted)),
        };

        let retake = Button::new(SharedString::from("retake-photo"))
            .primary()
            .label("Retake Photo")
            .on_click(cx.listener(|this, _, window, cx| {
                this.retake(window, cx);
                cx.notify();
            }));

        let back = Button::new(SharedString::from("detail-back"))
            .outline()
            .label("Back")
            .on_click(cx.listener(|this, _, window, cx| {
                this.leave_session(window, cx);
                cx.notify();
            }));

        v_flex()
            .size_full()
            .gap_3()
            .p_4()
            .items_center()
            .justify_center()
            .child(
                div()
                    .text_sm()
                    .font_semibold()
                    .text_color(foreground)
                    .child(status),
            )
            .child(
                div()
                    .relative()
                    .w(px(PREVIEW_MAX_SIZE.1))
                    .h(px(PREVIEW_MAX_SIZE.1))
                    .overflow_hidden()
                    .rounded_lg()
                    .border_1()
                    .border_color(border)
                    .bg(panel)
                    .child(body),
            )
            .child(h_flex().gap_2().child(back).child(retake))
            .into_any_element()
    }
}
