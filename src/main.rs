use iced::widget::{button, column, container, row, text};
use iced::{Element, Length, Task, Theme};
use rfd::FileDialog;
use std::sync::{mpsc, Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use water_map::config::AppConfig;
use water_map::state::blob::FsBlobStore;
use water_map::state::data::{
    Comment, Discussion, EntryId, GeoEntry, ViewportRegion, WaterReport, DISCUSSION_COLLECTION,
    WATER_REPORT_COLLECTION, WATER_SOURCE_COLLECTION,
};
use water_map::state::discussion::{
    comments, comments_path, discussions, post_comment, report_cards, ReportCard, ThreadDraft,
};
use water_map::state::forms::{
    delete_report, delete_source, save_report, save_source, ReportDraft, SourceDraft,
};
use water_map::state::library::{
    EntryStore, Library, Snapshot, SnapshotHandler, StoreError, Subscription,
};
use water_map::state::votes::{Vote, VoteBook, DISCUSSION_LIKES, SOURCE_VOTES};
use water_map::{Effect, GeoSync};

mod ui;

/// A subscription delivery waiting to be applied on the UI thread
enum Delivery {
    Sources(Result<Snapshot, StoreError>),
    Reports(Result<Snapshot, StoreError>),
    Discussions(Result<Snapshot, StoreError>),
    /// Comments of the thread with this key
    Comments(String, Result<Snapshot, StoreError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Map,
    Reports,
    Discussions,
}

/// A discussion opened with its comments
pub struct OpenThread {
    pub id: String,
    pub comments: Vec<Comment>,
    pub reply: String,
    /// Comments stop arriving once the thread is closed
    _subscription: Option<Subscription>,
}

/// Main application state
struct WaterMap {
    config: AppConfig,
    /// Collection store shared by every screen
    library: Library,
    blobs: Arc<FsBlobStore>,
    /// Map screen: entries, selection, search, camera and carousel
    sync: GeoSync,
    votes: VoteBook,
    reports: Vec<ReportCard>,
    discussions: Vec<Discussion>,
    likes: VoteBook,
    tab: Tab,
    outbox: mpsc::Sender<Delivery>,
    inbox: mpsc::Receiver<Delivery>,
    /// Kept alive for as long as the window is open
    _subscriptions: Vec<Subscription>,
    /// Open "add water source" form
    form: Option<SourceDraft>,
    report_form: Option<ReportDraft>,
    thread_form: Option<ThreadDraft>,
    thread: Option<OpenThread>,
    submitting: bool,
    /// Status message to display to the user
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    TabSelected(Tab),
    QueryChanged(String),
    SuggestionChosen(EntryId),
    MarkerPressed(EntryId),
    /// The user swiped the carousel and it came to rest on this page
    CarouselSwiped(usize),
    AnimationFinished(u64),
    /// Long-press stand-in: create a source at the camera center
    AddSourceHere,
    FormTitle(String),
    FormLatitude(String),
    FormLongitude(String),
    FormDescription(String),
    AttachPhoto,
    SubmitSource,
    SourceReady(Result<GeoEntry, String>),
    CloseForm,
    Vote(EntryId, Vote),
    DeleteSource(EntryId),
    OpenReportForm,
    ReportKind(String),
    ReportDescription(String),
    ReportTown(String),
    ReportDistrict(String),
    AttachReportPhoto,
    SubmitReport,
    ReportReady(Result<WaterReport, String>),
    CloseReportForm,
    DeleteReport(String),
    /// Like or dislike a discussion thread
    Like(String, Vote),
    OpenThread(String),
    CloseThread,
    ReplyChanged(String),
    PostReply,
    NewThread,
    EditThread(String),
    ThreadTitle(String),
    ThreadCategory(String),
    ThreadContent(String),
    AttachThreadPhoto,
    SubmitThread,
    ThreadImageReady(Result<Option<String>, String>),
    CloseThreadForm,
}

fn pick_photo() -> Option<std::path::PathBuf> {
    // Show the native file picker dialog
    FileDialog::new()
        .set_title("Attach Photo")
        .add_filter("Images", &["jpg", "jpeg", "png"])
        .pick_file()
}

fn forward(outbox: &mpsc::Sender<Delivery>, wrap: fn(Result<Snapshot, StoreError>) -> Delivery) -> SnapshotHandler {
    let outbox = outbox.clone();
    Box::new(move |event| {
        let _ = outbox.send(wrap(event));
    })
}

impl WaterMap {
    /// Create a new instance of the application
    fn new() -> (Self, Task<Message>) {
        let config = AppConfig::load().unwrap_or_else(|e| {
            warn!(error = %e, "config unreadable, using defaults");
            AppConfig::default()
        });

        // The app cannot function without its store
        let library = config
            .database_path()
            .map_err(|e| e.to_string())
            .and_then(|path| Library::open(path).map_err(|e| e.to_string()))
            .or_else(|e| {
                error!(error = %e, "store unavailable, running in memory");
                Library::in_memory().map_err(|e| e.to_string())
            })
            .expect("Failed to initialize store. Check permissions and disk space.");

        let blob_dir = config
            .blob_dir()
            .unwrap_or_else(|_| std::env::temp_dir().join("water-map"));
        let blobs = Arc::new(FsBlobStore::new(blob_dir));

        let (outbox, inbox) = mpsc::channel();
        let mut subscriptions = Vec::new();
        let subscribed = [
            library.subscribe(WATER_SOURCE_COLLECTION, forward(&outbox, Delivery::Sources)),
            library.subscribe(WATER_REPORT_COLLECTION, forward(&outbox, Delivery::Reports)),
            library.subscribe(DISCUSSION_COLLECTION, forward(&outbox, Delivery::Discussions)),
        ];
        for subscription in subscribed {
            match subscription {
                Ok(subscription) => subscriptions.push(subscription),
                Err(e) => error!(error = %e, "subscription failed"),
            }
        }

        let sync = GeoSync::new(config.min_query_chars, config.animation());

        let mut app = WaterMap {
            config,
            library,
            blobs,
            sync,
            votes: VoteBook::new(),
            reports: Vec::new(),
            discussions: Vec::new(),
            likes: VoteBook::new(),
            tab: Tab::Map,
            outbox,
            inbox,
            _subscriptions: subscriptions,
            form: None,
            report_form: None,
            thread_form: None,
            thread: None,
            submitting: false,
            status: String::new(),
        };

        let task = app.drain_inbox();
        info!(
            sources = app.sync.index().len(),
            signed_in = app.config.user_email.is_some(),
            "water map initialized"
        );
        app.status = format!("Ready. {} water sources.", app.sync.index().len());

        (app, task)
    }

    /// Apply every snapshot the store delivered since the last message
    fn drain_inbox(&mut self) -> Task<Message> {
        let mut effects = Vec::new();
        while let Ok(delivery) = self.inbox.try_recv() {
            match delivery {
                Delivery::Sources(event) => effects.extend(self.sync.apply_snapshot(event)),
                Delivery::Reports(Ok(snapshot)) => self.reports = report_cards(&snapshot),
                Delivery::Reports(Err(e)) => {
                    error!(error = %e, "report subscription failed, keeping last snapshot")
                }
                Delivery::Discussions(Ok(snapshot)) => self.discussions = discussions(&snapshot),
                Delivery::Discussions(Err(e)) => {
                    error!(error = %e, "discussion subscription failed, keeping last snapshot")
                }
                Delivery::Comments(id, Ok(snapshot)) => {
                    // late deliveries for a thread that was already closed
                    if let Some(thread) = self.thread.as_mut().filter(|thread| thread.id == id) {
                        thread.comments = comments(&snapshot);
                    }
                }
                Delivery::Comments(id, Err(e)) => {
                    error!(thread = %id, error = %e, "comment subscription failed, keeping last snapshot")
                }
            }
        }
        self.run_effects(effects)
    }

    fn run_effects(&mut self, effects: Vec<Effect>) -> Task<Message> {
        let mut tasks = Vec::new();
        for effect in effects {
            match effect {
                Effect::AnimateCamera(request) => {
                    info!(ticket = request.ticket, source = ?request.source, "camera animation");
                    let ticket = request.ticket;
                    tasks.push(Task::perform(tokio::time::sleep(request.duration), move |_| {
                        Message::AnimationFinished(ticket)
                    }));
                }
                Effect::ScrollCarousel(request) => {
                    // The scroll lands immediately; its settle must not
                    // come back as a user swipe.
                    let echo = self.sync.page_settled(request.index);
                    tasks.push(self.run_effects(echo));
                }
                Effect::OpenCreationForm(point) => {
                    self.form = Some(SourceDraft::from_long_press(point));
                }
            }
        }
        Task::batch(tasks)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        let task = match message {
            Message::TabSelected(tab) => {
                self.tab = tab;
                Task::none()
            }
            Message::QueryChanged(query) => {
                let effects = self.sync.set_query(query);
                self.run_effects(effects)
            }
            Message::SuggestionChosen(id) => {
                let effects = self.sync.choose_suggestion(&id);
                self.run_effects(effects)
            }
            Message::MarkerPressed(id) => {
                let effects = self.sync.marker_pressed(id);
                self.run_effects(effects)
            }
            Message::CarouselSwiped(page) => {
                let effects = self.sync.page_settled(page);
                self.run_effects(effects)
            }
            Message::AnimationFinished(ticket) => {
                if !self.sync.animation_finished(ticket) {
                    info!(ticket, "superseded camera animation finished");
                }
                Task::none()
            }
            Message::AddSourceHere => {
                let effects = self.sync.long_press(Some(self.camera().center()));
                self.run_effects(effects)
            }
            Message::FormTitle(value) => {
                self.edit_form(|form| form.title = value);
                Task::none()
            }
            Message::FormLatitude(value) => {
                self.edit_form(|form| form.latitude = value);
                Task::none()
            }
            Message::FormLongitude(value) => {
                self.edit_form(|form| form.longitude = value);
                Task::none()
            }
            Message::FormDescription(value) => {
                self.edit_form(|form| form.description = value);
                Task::none()
            }
            Message::AttachPhoto => {
                if let Some(photo) = pick_photo() {
                    self.edit_form(|form| form.photos.push(photo));
                }
                Task::none()
            }
            Message::SubmitSource => match self.form.clone() {
                Some(draft) if !self.submitting => {
                    self.submitting = true;
                    self.status = "Uploading photos...".to_string();
                    let blobs = Arc::clone(&self.blobs);
                    Task::perform(
                        async move { draft.submit(&*blobs).await.map_err(|e| e.to_string()) },
                        Message::SourceReady,
                    )
                }
                _ => Task::none(),
            },
            Message::SourceReady(result) => {
                self.submitting = false;
                match result.map(|entry| save_source(&self.library, &entry).map(|()| entry)) {
                    Ok(Ok(entry)) => {
                        self.status = format!("Added {}.", entry.title);
                        self.form = None;
                    }
                    Ok(Err(e)) => self.status = format!("Could not save: {e}"),
                    Err(e) => self.status = format!("Could not submit: {e}"),
                }
                Task::none()
            }
            Message::CloseForm => {
                self.form = None;
                Task::none()
            }
            Message::Vote(id, vote) => {
                if let Err(e) = self.votes.press(
                    &self.library,
                    SOURCE_VOTES,
                    WATER_SOURCE_COLLECTION,
                    id.as_str(),
                    vote,
                ) {
                    self.status = format!("Vote failed: {e}");
                }
                Task::none()
            }
            Message::DeleteSource(id) => {
                if let Err(e) = delete_source(&self.library, &id) {
                    self.status = format!("Delete failed: {e}");
                }
                Task::none()
            }
            Message::OpenReportForm => {
                self.report_form = Some(ReportDraft::default());
                Task::none()
            }
            Message::ReportKind(kind) => {
                self.edit_report(|form| form.kind = kind);
                Task::none()
            }
            Message::ReportDescription(value) => {
                self.edit_report(|form| form.description = value);
                Task::none()
            }
            Message::ReportTown(value) => {
                self.edit_report(|form| form.town = value);
                Task::none()
            }
            Message::ReportDistrict(value) => {
                self.edit_report(|form| form.district = value);
                Task::none()
            }
            Message::AttachReportPhoto => {
                if let Some(photo) = pick_photo() {
                    self.edit_report(|form| form.photos.push(photo));
                }
                Task::none()
            }
            Message::SubmitReport => match self.report_form.clone() {
                Some(draft) if !self.submitting => {
                    self.submitting = true;
                    self.status = "Uploading photos...".to_string();
                    let blobs = Arc::clone(&self.blobs);
                    Task::perform(
                        async move { draft.submit(&*blobs).await.map_err(|e| e.to_string()) },
                        Message::ReportReady,
                    )
                }
                _ => Task::none(),
            },
            Message::ReportReady(result) => {
                self.submitting = false;
                match result.map(|report| save_report(&self.library, &report).map(|()| report)) {
                    Ok(Ok(report)) => {
                        self.status = format!("Reported: {}.", report.title);
                        self.report_form = None;
                    }
                    Ok(Err(e)) => self.status = format!("Could not save: {e}"),
                    Err(e) => self.status = format!("Could not submit: {e}"),
                }
                Task::none()
            }
            Message::CloseReportForm => {
                self.report_form = None;
                Task::none()
            }
            Message::DeleteReport(id) => {
                if let Err(e) = delete_report(&self.library, &id) {
                    self.status = format!("Delete failed: {e}");
                }
                Task::none()
            }
            Message::Like(id, vote) => {
                if let Err(e) =
                    self.likes
                        .press(&self.library, DISCUSSION_LIKES, DISCUSSION_COLLECTION, &id, vote)
                {
                    self.status = format!("Vote failed: {e}");
                }
                Task::none()
            }
            Message::OpenThread(id) => {
                // Replace the old thread first so its comments stop arriving
                self.thread = None;
                let subscription = self
                    .library
                    .subscribe(&comments_path(&id), {
                        let outbox = self.outbox.clone();
                        let thread_id = id.clone();
                        Box::new(move |event| {
                            let _ = outbox.send(Delivery::Comments(thread_id.clone(), event));
                        })
                    })
                    .inspect_err(|e| error!(thread = %id, error = %e, "comment subscription failed"))
                    .ok();
                self.thread = Some(OpenThread {
                    id,
                    comments: Vec::new(),
                    reply: String::new(),
                    _subscription: subscription,
                });
                Task::none()
            }
            Message::CloseThread => {
                self.thread = None;
                Task::none()
            }
            Message::ReplyChanged(value) => {
                if let Some(thread) = self.thread.as_mut() {
                    thread.reply = value;
                }
                Task::none()
            }
            Message::PostReply => {
                if let Some(thread) = self.thread.as_mut() {
                    let email = self.config.user_email.as_deref();
                    match post_comment(&self.library, &thread.id, email, &thread.reply) {
                        Ok(_) => thread.reply.clear(),
                        Err(e) => self.status = format!("Could not comment: {e}"),
                    }
                }
                Task::none()
            }
            Message::NewThread => {
                self.thread_form = Some(ThreadDraft::default());
                Task::none()
            }
            Message::EditThread(id) => {
                self.thread_form = self
                    .discussions
                    .iter()
                    .find(|discussion| discussion.id == id)
                    .map(ThreadDraft::edit);
                Task::none()
            }
            Message::ThreadTitle(value) => {
                self.edit_thread(|form| form.title = value);
                Task::none()
            }
            Message::ThreadCategory(value) => {
                self.edit_thread(|form| form.category = value);
                Task::none()
            }
            Message::ThreadContent(value) => {
                self.edit_thread(|form| form.content = value);
                Task::none()
            }
            Message::AttachThreadPhoto => {
                if let Some(photo) = pick_photo() {
                    self.edit_thread(|form| form.photo = Some(photo));
                }
                Task::none()
            }
            Message::SubmitThread => match self.thread_form.clone() {
                Some(draft) if !self.submitting => match draft.check() {
                    Ok(()) => {
                        self.submitting = true;
                        let blobs = Arc::clone(&self.blobs);
                        Task::perform(
                            async move { draft.upload_photo(&*blobs).await.map_err(|e| e.to_string()) },
                            Message::ThreadImageReady,
                        )
                    }
                    Err(e) => {
                        self.status = e.to_string();
                        Task::none()
                    }
                },
                _ => Task::none(),
            },
            Message::ThreadImageReady(result) => {
                self.submitting = false;
                match (result, self.thread_form.clone()) {
                    (Ok(image), Some(draft)) => {
                        let email = self.config.user_email.as_deref();
                        match draft.save(&self.library, email, image) {
                            Ok(_) => self.thread_form = None,
                            Err(e) => self.status = format!("Could not save: {e}"),
                        }
                    }
                    (Err(e), _) => self.status = format!("Could not upload: {e}"),
                    (Ok(_), None) => {}
                }
                Task::none()
            }
            Message::CloseThreadForm => {
                self.thread_form = None;
                Task::none()
            }
        };

        Task::batch([task, self.drain_inbox()])
    }

    fn edit_form(&mut self, edit: impl FnOnce(&mut SourceDraft)) {
        if let Some(form) = self.form.as_mut() {
            edit(form);
        }
    }

    fn edit_report(&mut self, edit: impl FnOnce(&mut ReportDraft)) {
        if let Some(form) = self.report_form.as_mut() {
            edit(form);
        }
    }

    fn edit_thread(&mut self, edit: impl FnOnce(&mut ThreadDraft)) {
        if let Some(form) = self.thread_form.as_mut() {
            edit(form);
        }
    }

    /// Where the map camera is (or is flying to)
    fn camera(&self) -> ViewportRegion {
        self.sync
            .viewport()
            .target()
            .unwrap_or(self.config.start_location)
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        if let Some(form) = &self.form {
            return ui::form::view(form, self.submitting);
        }
        if let Some(form) = &self.report_form {
            return ui::reports::form(form, self.submitting);
        }
        if let Some(form) = &self.thread_form {
            return ui::discussions::form(form, self.submitting);
        }

        let tab = |label: &'static str, target: Tab| {
            button(label).on_press_maybe((self.tab != target).then_some(Message::TabSelected(target)))
        };
        let tabs = row![
            tab("Map", Tab::Map),
            tab("Reports", Tab::Reports),
            tab("Discussions", Tab::Discussions),
        ]
        .spacing(10);

        let screen: Element<Message> = match self.tab {
            Tab::Map => {
                let map = ui::map::view(&self.sync, self.camera(), self.sync.viewport().settled());
                let carousel = ui::carousel::view(&self.sync, &self.votes);
                row![map, carousel].spacing(20).height(Length::Fill).into()
            }
            Tab::Reports => ui::feed::view(&self.reports),
            Tab::Discussions => match &self.thread {
                Some(thread) => ui::discussions::thread(
                    thread,
                    self.discussions.iter().find(|discussion| discussion.id == thread.id),
                    self.config.user_email.is_some(),
                ),
                None => ui::discussions::list(&self.discussions, &self.likes),
            },
        };

        let content = column![tabs, screen, text(&self.status).size(14)]
            .spacing(20)
            .padding(20);

        container(content)
            .width(Length::Fill)
            .height(Length::Fill)
            .into()
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }
}

fn main() -> iced::Result {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("water_map=info")),
        )
        .init();

    iced::application("Water Map", WaterMap::update, WaterMap::view)
        .theme(WaterMap::theme)
        .centered()
        .run_with(WaterMap::new)
}
