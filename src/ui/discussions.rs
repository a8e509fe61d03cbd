use iced::widget::{button, column, container, pick_list, row, scrollable, text, text_input, Column};
use iced::{Element, Length};

use water_map::state::data::{Discussion, DISCUSSION_CATEGORIES};
use water_map::state::discussion::ThreadDraft;
use water_map::state::votes::{Vote, VoteBook};

use crate::{Message, OpenThread};

/// All threads with their like counters
pub fn list<'a>(discussions: &'a [Discussion], likes: &VoteBook) -> Element<'a, Message> {
    let threads = Column::with_children(discussions.iter().map(|discussion| {
        let (up, down) = match likes.current(&discussion.id) {
            Some(Vote::Up) => ("▲ (you)", "▼"),
            Some(Vote::Down) => ("▲", "▼ (you)"),
            None => ("▲", "▼"),
        };
        column![
            text(discussion.title.as_str()).size(18),
            text(format!("{} · {}", discussion.category, discussion.author)).size(12),
            row![
                button(up).on_press(Message::Like(discussion.id.clone(), Vote::Up)),
                text(discussion.likes.to_string()),
                button(down).on_press(Message::Like(discussion.id.clone(), Vote::Down)),
                button("Comments").on_press(Message::OpenThread(discussion.id.clone())),
                button("Edit").on_press(Message::EditThread(discussion.id.clone())),
            ]
            .spacing(10),
        ]
        .spacing(4)
        .into()
    }))
    .spacing(16);

    column![
        row![
            text("Discussions").size(24).width(Length::Fill),
            button("New thread").on_press(Message::NewThread),
        ],
        scrollable(threads).height(Length::Fill),
    ]
    .spacing(10)
    .into()
}

/// One thread with its comments and the reply box
pub fn thread<'a>(
    thread: &'a OpenThread,
    discussion: Option<&'a Discussion>,
    signed_in: bool,
) -> Element<'a, Message> {
    let header = match discussion {
        Some(discussion) => column![
            text(discussion.title.as_str()).size(24),
            text(discussion.content.as_str()),
        ],
        None => column![text("This thread was removed").size(24)],
    };

    let comments = Column::with_children(thread.comments.iter().map(|comment| {
        column![
            text(comment.author.as_str()).size(12),
            text(comment.content.as_str()),
        ]
        .into()
    }))
    .spacing(10);

    let reply: Element<'a, Message> = if signed_in {
        row![
            text_input("Add a comment", &thread.reply)
                .on_input(Message::ReplyChanged)
                .on_submit(Message::PostReply)
                .padding(10),
            button("Post").on_press(Message::PostReply),
        ]
        .spacing(10)
        .into()
    } else {
        text("Set user_email in config.json to comment").size(12).into()
    };

    column![
        row![header.width(Length::Fill), button("Back").on_press(Message::CloseThread)],
        scrollable(comments).height(Length::Fill),
        reply,
    ]
    .spacing(10)
    .into()
}

/// The new thread / edit thread form
pub fn form(form: &ThreadDraft, submitting: bool) -> Element<'_, Message> {
    let categories: Vec<String> = DISCUSSION_CATEGORIES.iter().map(|c| c.to_string()).collect();
    let selected = (!form.category.is_empty()).then(|| form.category.clone());
    let title = if form.editing.is_some() {
        "Update Discussion"
    } else {
        "New Discussion"
    };
    let photo = match &form.photo {
        Some(photo) => text(photo.display().to_string()).size(12),
        None if form.editing.is_some() => text("Keeping the current image").size(12),
        None => text("No image").size(12),
    };

    let content = column![
        row![
            text(title).size(32).width(Length::Fill),
            button("X").on_press(Message::CloseThreadForm),
        ],
        text_input("Add Title", &form.title)
            .on_input(Message::ThreadTitle)
            .padding(10),
        pick_list(categories, selected, Message::ThreadCategory).placeholder("Select Category"),
        text_input("Content", &form.content)
            .on_input(Message::ThreadContent)
            .padding(10),
        row![
            button("Submit").on_press_maybe((!submitting).then_some(Message::SubmitThread)),
            button("Attach Photo").on_press(Message::AttachThreadPhoto),
        ]
        .spacing(10),
        photo,
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
