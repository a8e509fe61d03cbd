use iced::widget::{button, column, row, text};
use iced::{Alignment, Element, Length};

use water_map::state::votes::{Vote, VoteBook};
use water_map::GeoSync;

use crate::Message;

/// One card of the water source carousel with paging and vote buttons
pub fn view<'a>(sync: &'a GeoSync, votes: &VoteBook) -> Element<'a, Message> {
    let entries = sync.index().entries();
    if entries.is_empty() {
        return column![text("No water sources yet. Add one from the map.")]
            .width(Length::FillPortion(1))
            .into();
    }

    let page = sync.carousel().page().unwrap_or(0).min(entries.len() - 1);
    let entry = &entries[page];
    // The carousel loops around at both ends
    let previous = (page + entries.len() - 1) % entries.len();
    let next = (page + 1) % entries.len();

    let image = match entry.cover_image() {
        Some(uri) => text(format!("Photo: {uri}")),
        None => text("No photo yet"),
    };

    let (up, down) = match votes.current(entry.id.as_str()) {
        Some(Vote::Up) => ("▲ (you)", "▼"),
        Some(Vote::Down) => ("▲", "▼ (you)"),
        None => ("▲", "▼"),
    };

    column![
        text(entry.title.as_str()).size(24),
        image.size(12),
        text(entry.description.as_str()),
        row![
            button(text(format!("{up} {}", entry.up_votes)))
                .on_press(Message::Vote(entry.id.clone(), Vote::Up)),
            button(text(format!("{down} {}", entry.down_votes)))
                .on_press(Message::Vote(entry.id.clone(), Vote::Down)),
            button("Delete").on_press(Message::DeleteSource(entry.id.clone())),
        ]
        .spacing(10),
        row![
            button("‹").on_press(Message::CarouselSwiped(previous)),
            text(format!("{} / {}", page + 1, entries.len())),
            button("›").on_press(Message::CarouselSwiped(next)),
        ]
        .spacing(20)
        .align_y(Alignment::Center),
    ]
    .spacing(12)
    .padding(20)
    .width(Length::FillPortion(1))
    .into()
}
