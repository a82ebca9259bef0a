use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::cache::CacheError;
use crate::capabilities::{
    edit_expense_mutation, expense_page_query, Capabilities, EditExpenseData,
    EditExpenseVariables, GraphqlClient, GraphqlResult, TimerOutput, EDIT_EXPENSE_OPERATION,
    EXPENSE_PAGE_OPERATION,
};
use crate::config::ExpensePageConfig;
use crate::event::{Event, FetchPurpose, ViewerId};
use crate::model::{CommentConnection, Expense, ExpensePageData, Model, PageMode, PageStatus};
use crate::polling::{
    ActivityDebouncer, DebounceElapsed, DebouncePulse, PollCommand, PollingMachine, PollingState,
    TimerKind,
};
use crate::response::{apply_page_status, ResponseContext};
use crate::route::ExpenseRoute;
use crate::submission::prepare_submission;
use crate::view::ViewModel;
use crate::{AppError, EXPENSE_TOP_ANCHOR};

#[derive(Default)]
pub struct App;

impl App {
    /// Server-side render: the view plus the response status for this page.
    pub fn respond(&self, model: &Model, ctx: &mut ResponseContext) -> ViewModel {
        apply_page_status(ctx, &model.status);
        ViewModel::from_model(model)
    }

    // --- Lifecycle ---

    fn mount(
        model: &mut Model,
        caps: &Capabilities,
        route: ExpenseRoute,
        config: Option<ExpensePageConfig>,
    ) {
        if model.mounted {
            debug!("remounting, tearing down previous page");
            Self::teardown(model, caps);
        }

        let config = match config {
            Some(config) => match config.validate() {
                Ok(()) => config,
                Err(e) => {
                    warn!(error = %e, "invalid page config, falling back to defaults");
                    ExpensePageConfig::default()
                }
            },
            None => ExpensePageConfig::default(),
        };

        let cache = model.cache.clone();
        cache.resize(config.max_cached_queries);
        model.fetches.supersede();
        *model = Model {
            polling: PollingMachine::new(config.polling_interval()),
            debouncer: ActivityDebouncer::new(config.activity_debounce()),
            route: Some(route),
            mounted: true,
            status: PageStatus::Loading,
            viewer: model.viewer.take(),
            fetches: model.fetches,
            timers: std::mem::take(&mut model.timers),
            config,
            ..Model::with_cache(cache)
        };

        if let Some((status, route)) = model
            .snapshot()
            .zip(model.route.as_ref())
            .map(|(cached, route)| (Model::evaluate(&cached.data, route), route))
        {
            debug!(href = %route.href(), ?status, "showing cached expense while fetching");
            model.status = status;
        }

        info!(
            legacy_expense_id = model.route.as_ref().map(|r| r.legacy_expense_id),
            "expense page mounted"
        );
        Self::fetch_page(model, caps, FetchPurpose::Initial);

        let commands = model.polling.pulse();
        Self::apply_poll_commands(model, caps, commands);
    }

    fn teardown(model: &mut Model, caps: &Capabilities) {
        let commands = model.polling.teardown();
        Self::apply_poll_commands(model, caps, commands);
        for id in model.timers.drain() {
            caps.timer.clear(id);
        }
        model.debouncer.reset();
        model.fetches.supersede();
        model.mounted = false;
        model.is_refreshing = false;
        model.is_submitting = false;
    }

    // --- Remote data ---

    #[instrument(skip(model, caps))]
    fn fetch_page(model: &mut Model, caps: &Capabilities, purpose: FetchPurpose) {
        let Some(variables) = model.page_variables() else {
            warn!("no route to fetch");
            return;
        };
        let seq = model.fetches.issue();

        let query = expense_page_query();
        let sent = GraphqlClient::new(&caps.http, &model.config.graphql_endpoint).execute(
            &query,
            EXPENSE_PAGE_OPERATION,
            &variables,
            move |result: GraphqlResult<ExpensePageData>| Event::PageFetched {
                purpose,
                seq,
                result: Box::new(result.map_err(AppError::from)),
            },
        );

        if let Err(e) = sent {
            Self::page_fetched(model, purpose, seq, Err(e.into()));
        }
    }

    fn page_fetched(
        model: &mut Model,
        purpose: FetchPurpose,
        seq: u64,
        result: Result<ExpensePageData, AppError>,
    ) {
        if purpose == FetchPurpose::ViewerUpgrade {
            model.is_refreshing = false;
        }
        if !model.mounted {
            debug!(purpose = purpose.as_str(), "page unmounted, dropping response");
            return;
        }
        if !model.fetches.accept(seq) {
            debug!(purpose = purpose.as_str(), seq, "dropping out-of-order response");
            return;
        }
        let Some(route) = model.route.clone() else {
            return;
        };

        match result {
            Ok(data) => {
                match model.cache_key() {
                    Some(Ok(key)) => {
                        if let Err(e) = model.cache.write(&key, &data) {
                            warn!(error = %e, "failed to cache expense page");
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "cannot build cache key"),
                    None => {}
                }
                model.refresh_error = None;

                let status = Model::evaluate(&data, &route);
                if let PageStatus::NotFound { search_term } = &status {
                    debug!(
                        collective = %route.collective_slug,
                        legacy_expense_id = route.legacy_expense_id,
                        ?search_term,
                        "expense not found for this collective"
                    );
                }
                model.status = status;
            }
            Err(error) if purpose == FetchPurpose::Initial && !model.status.is_loaded() => {
                if error.is_reportable() {
                    warn!(error = %error, "expense page failed to load");
                } else {
                    debug!(error = %error, "expense page unavailable");
                }
                model.status = PageStatus::Failed(error);
            }
            Err(error) => {
                warn!(purpose = purpose.as_str(), error = %error, "background refresh failed");
                model.refresh_error = Some(error);
            }
        }
    }

    fn submit_summary(model: &mut Model, caps: &Capabilities) {
        if model.is_submitting {
            debug!("submission already in flight");
            return;
        }
        let PageMode::ConfirmingSummary { draft } = &model.mode else {
            debug!("summary confirmed outside of summary mode");
            return;
        };

        let original = model.current_expense();
        let input = match prepare_submission(original.as_ref(), draft) {
            Ok(input) => input,
            Err(e) => {
                warn!(error = %e, "cannot prepare submission");
                model.set_error(e.into());
                caps.navigation.scroll_into_view(EXPENSE_TOP_ANCHOR);
                return;
            }
        };

        model.is_submitting = true;
        model.clear_error();

        let mutation = edit_expense_mutation();
        let sent = GraphqlClient::new(&caps.http, &model.config.graphql_endpoint).execute(
            &mutation,
            EDIT_EXPENSE_OPERATION,
            &EditExpenseVariables { expense: &input },
            |result: GraphqlResult<EditExpenseData>| {
                Event::ExpenseEdited(Box::new(
                    result.map(|d| d.edit_expense).map_err(AppError::from),
                ))
            },
        );

        if let Err(e) = sent {
            Self::expense_edited(model, caps, Err(e.into()));
        }
    }

    fn expense_edited(
        model: &mut Model,
        caps: &Capabilities,
        result: Result<Expense, AppError>,
    ) {
        if !model.mounted || !model.is_submitting {
            debug!("no submission in flight, dropping mutation result");
            return;
        }
        model.is_submitting = false;
        match result {
            Ok(expense)
                if model
                    .route
                    .as_ref()
                    .is_some_and(|r| r.legacy_expense_id != expense.legacy_id) =>
            {
                debug!(
                    legacy_id = expense.legacy_id,
                    "mutation result is for another expense, dropping"
                );
            }
            Ok(expense) => {
                if let Some(Ok(key)) = model.cache_key() {
                    let patched = model
                        .cache
                        .patch::<ExpensePageData, _>(&key, |data| data.expense = Some(expense));
                    if let Err(e) = patched {
                        warn!(error = %e, "could not write edited expense to cache");
                    }
                }
                if matches!(model.mode, PageMode::ConfirmingSummary { .. }) {
                    model.mode = PageMode::Viewing;
                }
                model.clear_error();
                info!("expense updated");
            }
            Err(error) => {
                warn!(error = %error, "expense update failed");
                model.set_error(error);
                caps.navigation.scroll_into_view(EXPENSE_TOP_ANCHOR);
            }
        }
    }

    fn patch_comments(model: &Model, f: impl FnOnce(&mut CommentConnection)) {
        let key = match model.cache_key() {
            Some(Ok(key)) => key,
            Some(Err(e)) => {
                warn!(error = %e, "cannot build cache key");
                return;
            }
            None => {
                debug!("no route, comment change ignored");
                return;
            }
        };

        let patched = model.cache.patch::<ExpensePageData, _>(&key, |data| {
            if let Some(expense) = data.expense.as_mut() {
                f(&mut expense.comments);
            }
        });
        match patched {
            Ok(revision) => debug!(revision, "comments patched"),
            Err(CacheError::Miss { key }) => debug!(%key, "no cached page, comment change ignored"),
            Err(e) => warn!(error = %e, "failed to patch comments"),
        }
    }

    // --- Page chrome ---

    fn dismiss_created_banner(model: &mut Model, caps: &Capabilities) {
        if !model.show_created_banner() {
            return;
        }
        model.created_banner_dismissed = true;
        if let Some(route) = &model.route {
            caps.navigation
                .replace_route(route.without_create_success().href(), true);
        }
    }

    fn viewer_changed(model: &mut Model, caps: &Capabilities, viewer: Option<ViewerId>) {
        let signed_in = model.viewer.is_none() && viewer.is_some();
        model.viewer = viewer;
        if !signed_in || !model.mounted {
            return;
        }
        if model.is_refreshing {
            debug!("viewer refresh already in flight");
            return;
        }
        info!("viewer signed in, refetching expense");
        model.is_refreshing = true;
        Self::fetch_page(model, caps, FetchPurpose::ViewerUpgrade);
    }

    // --- Timers ---

    fn arm_timer(model: &mut Model, caps: &Capabilities, kind: TimerKind, after: Duration) {
        let (id, replaced) = model.timers.allocate(kind);
        if let Some(old) = replaced {
            caps.timer.clear(old);
        }
        caps.timer.start(id, after, Event::TimerResolved);
    }

    fn clear_timer(model: &mut Model, caps: &Capabilities, kind: TimerKind) {
        if let Some(id) = model.timers.take(kind) {
            caps.timer.clear(id);
        }
    }

    fn apply_poll_commands(model: &mut Model, caps: &Capabilities, commands: Vec<PollCommand>) {
        for command in commands {
            match command {
                PollCommand::CancelIdleTimer => Self::clear_timer(model, caps, TimerKind::Idle),
                PollCommand::ArmIdleTimer(after) => {
                    Self::arm_timer(model, caps, TimerKind::Idle, after);
                }
                PollCommand::StartPolling(interval) => {
                    if !model.timers.is_armed(TimerKind::Poll) {
                        Self::arm_timer(model, caps, TimerKind::Poll, interval);
                    }
                }
                PollCommand::StopPolling => Self::clear_timer(model, caps, TimerKind::Poll),
                PollCommand::Refetch => Self::fetch_page(model, caps, FetchPurpose::Refresh),
            }
        }
    }

    fn activity_pulse(model: &mut Model, caps: &Capabilities) {
        if !model.mounted {
            return;
        }
        match model.debouncer.pulse() {
            DebouncePulse::Arm(window) => Self::arm_timer(model, caps, TimerKind::Debounce, window),
            DebouncePulse::Coalesced => {}
        }
    }

    fn timer_resolved(model: &mut Model, caps: &Capabilities, output: TimerOutput) {
        let id = match output {
            TimerOutput::Elapsed { id } => id,
            TimerOutput::Cleared { id } => {
                debug!(%id, "timer cleared");
                return;
            }
        };
        let Some(kind) = model.timers.resolve(id) else {
            debug!(%id, "ignoring stale timer");
            return;
        };

        match kind {
            TimerKind::Debounce => match model.debouncer.elapsed() {
                DebounceElapsed::Rearm(window) => {
                    Self::arm_timer(model, caps, TimerKind::Debounce, window);
                }
                DebounceElapsed::Flush => {
                    let commands = model.polling.pulse();
                    Self::apply_poll_commands(model, caps, commands);
                }
                DebounceElapsed::Ignore => {}
            },
            TimerKind::Idle => {
                let commands = model.polling.idle_timeout();
                Self::apply_poll_commands(model, caps, commands);
            }
            TimerKind::Poll => {
                Self::fetch_page(model, caps, FetchPurpose::Poll);
                if model.polling.state() == PollingState::Active {
                    let interval = model.polling.interval();
                    Self::arm_timer(model, caps, TimerKind::Poll, interval);
                }
            }
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    #[instrument(skip_all, fields(event = event.name()))]
    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        let mode_before = model.view_mode();
        let quiet = event.is_quiet();
        if event.is_user_initiated() {
            debug!("user action");
        }

        match event {
            Event::Mounted { route, config } => {
                Self::mount(model, caps, *route, config.map(|c| *c));
            }

            Event::Unmounted => {
                if model.mounted {
                    Self::teardown(model, caps);
                    info!("expense page unmounted");
                }
            }

            Event::ViewerChanged { viewer } => Self::viewer_changed(model, caps, viewer),

            Event::ActivityPulse => Self::activity_pulse(model, caps),

            Event::EditRequested => {
                if model.mode == PageMode::Viewing {
                    if let Some(expense) = model.current_expense() {
                        Self::dismiss_created_banner(model, caps);
                        model.mode = PageMode::Editing {
                            draft: Box::new(expense),
                        };
                    } else {
                        debug!("edit requested without a loaded expense");
                    }
                }
            }

            Event::EditCancelled => {
                if matches!(model.mode, PageMode::Editing { .. }) {
                    model.mode = PageMode::Viewing;
                    model.clear_error();
                }
            }

            Event::DraftSubmitted(draft) => {
                if matches!(model.mode, PageMode::Editing { .. }) {
                    model.mode = PageMode::ConfirmingSummary { draft };
                } else {
                    debug!("draft submitted outside of edit mode");
                }
            }

            Event::BackToEditRequested => {
                if model.is_submitting {
                    debug!("submission in flight, staying on summary");
                } else {
                    model.mode = match std::mem::take(&mut model.mode) {
                        PageMode::ConfirmingSummary { draft } => PageMode::Editing { draft },
                        other => other,
                    };
                }
            }

            Event::PrivateNoteChanged { note } => {
                if let PageMode::ConfirmingSummary { draft } = &mut model.mode {
                    draft.private_message = Some(note);
                }
            }

            Event::SummaryConfirmed => Self::submit_summary(model, caps),

            Event::CommentAdded(comment) => {
                Self::patch_comments(model, move |comments| {
                    if !comments.append_unique(*comment) {
                        debug!("comment already present");
                    }
                });
            }

            Event::CommentDeleted { id } => {
                Self::patch_comments(model, move |comments| {
                    comments.remove(&id);
                });
            }

            Event::CreatedBannerDismissed => Self::dismiss_created_banner(model, caps),

            Event::AdminActionFailed(error) => {
                warn!(error = %error, "expense action failed");
                model.set_error(*error);
            }

            Event::PageFetched {
                purpose,
                seq,
                result,
            } => Self::page_fetched(model, purpose, seq, *result),

            Event::ExpenseEdited(result) => Self::expense_edited(model, caps, *result),

            Event::TimerResolved(output) => Self::timer_resolved(model, caps, output),
        }

        if model.view_mode() != mode_before {
            debug!(from = ?mode_before, to = ?model.view_mode(), "mode changed");
            caps.navigation.scroll_into_view(EXPENSE_TOP_ANCHOR);
        }
        if !quiet {
            caps.render.render();
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        ViewModel::from_model(model)
    }
}
