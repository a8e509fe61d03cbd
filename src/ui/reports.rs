use iced::widget::{button, column, container, pick_list, row, text, text_input, Column};
use iced::{Element, Length};

use water_map::state::data::REPORT_KINDS;
use water_map::state::forms::ReportDraft;

use crate::Message;

/// The water issue report form
pub fn form(form: &ReportDraft, submitting: bool) -> Element<'_, Message> {
    let kinds: Vec<String> = REPORT_KINDS.iter().map(|kind| kind.to_string()).collect();
    let photos = Column::with_children(form.photos.iter().map(|photo| {
        text(photo.display().to_string()).size(12).into()
    }));

    let content = column![
        row![
            text("Report an Issue").size(32).width(Length::Fill),
            button("X").on_press(Message::CloseReportForm),
        ],
        pick_list(kinds, Some(form.kind.clone()), Message::ReportKind),
        text_input("Description", &form.description)
            .on_input(Message::ReportDescription)
            .padding(10),
        text_input("Town", &form.town).on_input(Message::ReportTown).padding(10),
        text_input("District", &form.district)
            .on_input(Message::ReportDistrict)
            .padding(10),
        row![
            button("Submit").on_press_maybe((!submitting).then_some(Message::SubmitReport)),
            button("Attach Photo").on_press(Message::AttachReportPhoto),
        ]
        .spacing(10),
        photos,
    ]
    .spacing(10)
    .max_width(600);

    container(content)
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .padding(40)
        .into()
}
