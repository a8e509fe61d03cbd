use iced::widget::{button, column, row, scrollable, text, Column};
use iced::{Element, Length};

use water_map::state::discussion::{ReportCard, PLACEHOLDER_IMAGE};

use crate::Message;

/// Latest water issue reports
pub fn view(reports: &[ReportCard]) -> Element<'_, Message> {
    let cards = Column::with_children(reports.iter().map(|report| {
        let image = if report.image == PLACEHOLDER_IMAGE {
            "no photo".to_string()
        } else {
            report.image.clone()
        };
        column![
            row![
                text(report.title.as_str()).size(18).width(Length::Fill),
                button("Delete").on_press(Message::DeleteReport(report.id.clone())),
            ],
            text(report.description.as_str()),
            text(image).size(12),
        ]
        .spacing(4)
        .into()
    }))
    .spacing(16);

    column![
        row![
            text("Reports").size(24).width(Length::Fill),
            button("Report an issue").on_press(Message::OpenReportForm),
        ],
        scrollable(cards).height(Length::Fill),
    ]
    .spacing(10)
    .into()
}
