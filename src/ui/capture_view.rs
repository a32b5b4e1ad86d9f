use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, Context, IntoElement,
    PREVIEW_MAX_SIZE, ParentElement, SharedString, Styled, StyledExt, centered_message, div,
    h_flex, image_view, px, v_flex,
};
use crate::error::FailureKind;

impl AppView {
    pub(super) fn render_capture(&mut self, cx: &mut Context<'_, Self>) -> AnyElement {
        let (muted, border, panel) = {
            let theme = cx.theme();
            (theme.muted_foreground, theme.border, theme.group_box)
        };
        let busy = self.controller.is_busy();

        let preview = match &self.preview_image {
            Some(image) => image_view(image),
            None => centered_message("Waiting for camera...", muted),
        };

        let shutter_label = if busy { "Capturing..." } else { "Take Photo" };
        let shutter = Button::new(SharedString::from("take-photo"))
            .primary()
            .label(shutter_label)
            .on_click(cx.listener(|this, _, _, cx| {
                // The controller ignores the trigger while a capture is running.
                this.controller.take_photo();
                cx.notify();
            }));

        let back = Button::new(SharedString::from("leave-camera"))
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
                    .relative()
                    .w(px(PREVIEW_MAX_SIZE.0))
                    .h(px(PREVIEW_MAX_SIZE.1))
                    .overflow_hidden()
                    .rounded_lg()
                    .border_1()
                    .border_color(border)
                    .bg(gpui::rgb(0x000000))
                    .child(preview),
            )
            .child(
                h_flex()
                    .gap_2()
                    .p_2()
                    .rounded_lg()
                    .bg(panel)
                    .child(back)
                    .child(shutter),
            )
            .into_any_element()
    }

    pub(super) fn render_camera_failure(
        &mut self,
        kind: FailureKind,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let (accent, muted, border, panel) = {
            let theme = cx.theme();
            (
                theme.accent,
                theme.muted_foreground,
                theme.border,
                theme.group_box,
            )
        };

        let hint = match kind {
            FailureKind::DeviceUnavailable => "Check the camera connection or permission settings",
            _ => "Try again with the camera",
        };

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .child(
                v_flex()
                    .gap_2()
                    .p_4()
                    .rounded_lg()
                    .border_1()
                    .border_color(border)
                    .bg(panel)
                    .child(
                        div()
                            .text_sm()
                            .font_semibold()
                            .text_color(accent)
                            .child(format!("⚠ {}", kind.message())),
                    )
                    .child(div().text_xs().text_color(muted).child(hint))
                    .child(
                        h_flex()
                            .gap_2()
                            .mt_2()
                            .child(
                                Button::new(SharedString::from("camera-back"))
                                    .outline()
                                    .label("Back")
                                    .on_click(cx.listener(|this, _, window, cx| {
                                        this.leave_session(window, cx);
                                        cx.notify();
                                    })),
                            )
                            .child(
                                Button::new(SharedString::from("camera-retry"))
                                    .primary()
                                    .label("Try Again")
                                    .on_click(cx.listener(|this, _, window, cx| {
                                        this.retake(window, cx);
                                        cx.notify();
                                    })),
                            ),
                    ),
            )
            .into_any_element()
    }
}
