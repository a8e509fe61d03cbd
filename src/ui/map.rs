use iced::widget::{button, column, scrollable, text, text_input, Column};
use iced::{Element, Length};

use water_map::{GeoSync, ViewportRegion};

use crate::Message;

fn region_label(region: ViewportRegion) -> String {
    format!(
        "{:.4}, {:.4} (span {:.4} x {:.4})",
        region.latitude, region.longitude, region.latitude_delta, region.longitude_delta
    )
}

/// Search bar, suggestion dropdown and the marker list standing in for the
/// map surface
pub fn view(sync: &GeoSync, camera: ViewportRegion, settled: Option<ViewportRegion>) -> Element<'_, Message> {
    let search = text_input("Search", sync.query())
        .on_input(Message::QueryChanged)
        .padding(10);

    let suggestions = Column::with_children(sync.suggestions().into_iter().map(|entry| {
        button(text(entry.title.as_str()))
            .on_press(Message::SuggestionChosen(entry.id.clone()))
            .width(Length::Fill)
            .into()
    }))
    .spacing(2);

    let selected = sync.selection().current();
    let markers = Column::with_children(sync.index().entries().iter().map(|entry| {
        let label = if selected == Some(&entry.id) {
            format!("● {}", entry.title)
        } else {
            format!("○ {}", entry.title)
        };
        button(text(label))
            .on_press(Message::MarkerPressed(entry.id.clone()))
            .width(Length::Fill)
            .into()
    }))
    .spacing(4);

    let camera_status = match settled {
        Some(settled) if settled == camera => format!("Camera at {}", region_label(camera)),
        _ => format!("Flying to {}", region_label(camera)),
    };

    column![
        search,
        suggestions,
        scrollable(markers).height(Length::Fill),
        text(camera_status).size(14),
        button("Add water source here").on_press(Message::AddSourceHere),
    ]
    .spacing(10)
    .width(Length::FillPortion(1))
    .into()
}
