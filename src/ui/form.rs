use iced::widget::{button, column, container, row, text, text_input, Column};
use iced::{Element, Length};

use water_map::state::forms::SourceDraft;

use crate::Message;

/// The "add water source" form
pub fn view(form: &SourceDraft, submitting: bool) -> Element<'_, Message> {
    let photos = Column::with_children(form.photos.iter().map(|photo| {
        text(photo.display().to_string()).size(12).into()
    }));

    let content = column![
        row![
            text("Add Water Source").size(32).width(Length::Fill),
            button("X").on_press(Message::CloseForm),
        ],
        text_input("Name", &form.title).on_input(Message::FormTitle).padding(10),
        text_input("Latitude", &form.latitude)
            .on_input(Message::FormLatitude)
            .padding(10),
        text_input("Longitude", &form.longitude)
            .on_input(Message::FormLongitude)
            .padding(10),
        text_input("Description", &form.description)
            .on_input(Message::FormDescription)
            .padding(10),
        row![
            button("Submit").on_press_maybe((!submitting).then_some(Message::SubmitSource)),
            button("Attach Photo").on_press(Message::AttachPhoto),
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
